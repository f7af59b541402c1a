//! Export and restore of the full note and insight collections.
//!
//! Export produces a single pretty-printed JSON document suitable for
//! backup and later re-import. Restore accepts either such a document or a
//! flat CSV with the `title,summary,type,priority` contract.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Insight, InsightDraft, Note, NoteDraft, NoteType, Priority};
use crate::store::NoteStore;

/// The serialized backup document.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub notes: Vec<Note>,
    pub insights: Vec<Insight>,
    pub exported_at: DateTime<Utc>,
}

/// Snapshot both collections for an owner.
pub async fn export_data(store: &dyn NoteStore, owner: &str) -> Result<ExportDocument> {
    Ok(ExportDocument {
        notes: store.list_notes(owner).await?,
        insights: store.list_insights(owner).await?,
        exported_at: Utc::now(),
    })
}

/// Export as JSON to a file, or to stdout for piping.
pub async fn run_export(store: &dyn NoteStore, owner: &str, output: Option<&Path>) -> Result<()> {
    let document = export_data(store, owner).await?;
    let note_count = document.notes.len();
    let insight_count = document.insights.len();
    let json = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} notes, {} insights to {}",
                note_count,
                insight_count,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Parse the flat CSV restore contract: header row required, one note per
/// data row, missing trailing fields default to empty/`custom`/`medium`.
pub fn parse_csv_notes(text: &str) -> Result<Vec<NoteDraft>> {
    let mut lines = text.lines();
    let header = match lines.next() {
        Some(line) => line,
        None => bail!("CSV restore file is empty"),
    };

    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .collect();
    let title_idx = columns.iter().position(|c| c == "title");
    let summary_idx = columns.iter().position(|c| c == "summary");
    let type_idx = columns.iter().position(|c| c == "type");
    let priority_idx = columns.iter().position(|c| c == "priority");

    let title_idx = match title_idx {
        Some(idx) => idx,
        None => bail!("CSV restore requires a header row with a 'title' column"),
    };

    let mut drafts = Vec::new();
    for line in lines.filter(|line| !line.trim().is_empty()) {
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        let field =
            |idx: Option<usize>| idx.and_then(|i| values.get(i).copied()).unwrap_or("");

        let mut draft = NoteDraft {
            title: field(Some(title_idx)).to_string(),
            summary: field(summary_idx).to_string(),
            note_type: NoteType::parse_lenient(field(type_idx)),
            priority: Priority::parse_lenient(field(priority_idx)),
            connections: vec![],
            metadata: None,
        };
        draft.normalize_title(None);
        drafts.push(draft);
    }

    Ok(drafts)
}

/// Outcome of a restore run.
#[derive(Debug, PartialEq, Eq)]
pub struct RestoreReport {
    pub notes: usize,
    pub insights: usize,
}

/// Restore notes (and, for JSON documents, insights) from a backup file.
///
/// Records are recreated under the current owner with fresh store-assigned
/// ids and timestamps; restore never triggers insight generation.
pub async fn restore_data(
    store: Arc<dyn NoteStore>,
    owner: &str,
    path: &Path,
) -> Result<RestoreReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read restore file: {}", path.display()))?;

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let document: ExportDocument = serde_json::from_str(&text)
                .with_context(|| "Failed to parse export document")?;

            let drafts: Vec<NoteDraft> = document
                .notes
                .into_iter()
                .map(|note| {
                    let mut draft = NoteDraft {
                        title: note.title,
                        summary: note.summary,
                        note_type: note.note_type,
                        priority: note.priority,
                        connections: note.connections,
                        metadata: note.metadata,
                    };
                    draft.normalize_title(None);
                    draft
                })
                .collect();
            let note_count = drafts.len();
            if note_count > 0 {
                store.create_notes(owner, drafts).await?;
            }

            let mut insight_count = 0;
            for insight in document.insights {
                store
                    .create_insight(
                        owner,
                        InsightDraft {
                            insight_type: insight.insight_type,
                            title: insight.title,
                            message: insight.message,
                            actionable: insight.actionable,
                        },
                    )
                    .await?;
                insight_count += 1;
            }

            Ok(RestoreReport {
                notes: note_count,
                insights: insight_count,
            })
        }
        "csv" => {
            let drafts = parse_csv_notes(&text)?;
            let note_count = drafts.len();
            if note_count > 0 {
                store.create_notes(owner, drafts).await?;
            }
            Ok(RestoreReport {
                notes: note_count,
                insights: 0,
            })
        }
        other => bail!(
            "unsupported restore format '{}': expected .json or .csv",
            if other.is_empty() { "(none)" } else { other }
        ),
    }
}

/// CLI entry point — restore and print the counts.
pub async fn run_restore(store: Arc<dyn NoteStore>, owner: &str, path: &Path) -> Result<()> {
    let report = restore_data(store, owner, path).await?;
    println!("restore {}", path.display());
    println!("  notes created: {}", report.notes);
    if report.insights > 0 {
        println!("  insights created: {}", report.insights);
    }
    println!("ok");
    Ok(())
}
