//! Ingestion pipeline orchestration.
//!
//! Coordinates the full import flow: file collection → extraction (local or
//! remote) → draft normalization → batch persistence → insight generation.
//! Extraction failures are isolated per file; the batch always finishes and
//! ends in a terminal report. Persistence of the whole batch completes, and
//! the refreshed note collection is read back, before any insight
//! generation starts, so generation always sees the new notes plus every
//! pre-existing note.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use walkdir::WalkDir;

use crate::extract::{self, ExtractError, FileFormat};
use crate::insight::{GenerationOutcome, GenerationSet};
use crate::llm::ChatService;
use crate::models::{NoteDraft, NoteMetadata, NoteType, Priority};
use crate::progress::GenerationProgressReporter;
use crate::remote::ExtractionService;
use crate::store::NoteStore;

/// One file that could not be turned into a note.
#[derive(Debug)]
pub struct ImportFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Terminal outcome of one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Paths considered, in processing order.
    pub files_found: usize,
    /// Persisted notes, in input order.
    pub imported: Vec<crate::models::Note>,
    /// Per-file failures; never abort the batch.
    pub failures: Vec<ImportFailure>,
    /// Insight generation outcomes for the imported notes.
    pub generation: Vec<GenerationOutcome>,
}

impl ImportReport {
    /// True when not a single file became a note.
    pub fn nothing_processed(&self) -> bool {
        self.imported.is_empty()
    }
}

/// Expand the given paths into individual files.
///
/// Directories are walked recursively and contribute only files with
/// supported extensions; explicitly named files are taken as-is so that an
/// unsupported one is reported as a per-file failure instead of silently
/// skipped. Missing paths count as failures.
pub fn collect_files(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<ImportFailure>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if FileFormat::from_name(&name).is_ok() {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            failures.push(ImportFailure {
                path: path.clone(),
                reason: "no such file or directory".to_string(),
            });
        }
    }

    (files, failures)
}

/// Extract one file and build the draft note for it.
///
/// The draft carries the import defaults: `type = imported`,
/// `priority = medium`, no connections, and provenance metadata. An empty
/// extraction becomes the placeholder body rather than an empty note.
pub async fn build_draft(
    extraction: &dyn ExtractionService,
    path: &Path,
    bytes: &[u8],
) -> Result<NoteDraft, ExtractError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let format = FileFormat::from_name(&file_name)?;

    let result = if format.is_remote() {
        extraction
            .extract(&file_name, format.media_type(), bytes)
            .await?
    } else {
        extract::extract_local(format, &file_name, bytes)?
    };

    let mut draft = NoteDraft {
        title: result.title,
        summary: extract::finalize_content(result.content),
        note_type: NoteType::Imported,
        priority: Priority::Medium,
        connections: vec![],
        metadata: Some(NoteMetadata {
            source: result.source,
            original_filename: file_name.clone(),
            imported_at: Utc::now(),
        }),
    };
    draft.normalize_title(Some(&extract::title_from_name(&file_name)));

    Ok(draft)
}

/// Run the full import pipeline for the given paths.
///
/// Files are processed sequentially to bound peak memory (binary payloads
/// are base64-encoded in full before transfer). Insight generation tasks
/// run concurrently once the batch is persisted.
pub async fn import_files(
    store: Arc<dyn NoteStore>,
    extraction: &dyn ExtractionService,
    chat: Arc<dyn ChatService>,
    owner: &str,
    paths: &[PathBuf],
    progress: &dyn GenerationProgressReporter,
) -> Result<ImportReport> {
    let (files, mut failures) = collect_files(paths);

    let mut drafts = Vec::new();
    for path in &files {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                failures.push(ImportFailure {
                    path: path.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        match build_draft(extraction, path, &bytes).await {
            Ok(draft) => {
                drafts.push(draft);
            }
            Err(err) => {
                failures.push(ImportFailure {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut report = ImportReport {
        files_found: files.len(),
        imported: Vec::new(),
        failures,
        generation: Vec::new(),
    };

    if drafts.is_empty() {
        return Ok(report);
    }

    // Persist the whole batch first; only then start generation so it reads
    // a collection that already includes the new notes.
    report.imported = store.create_notes(owner, drafts).await?;
    let all_notes = Arc::new(store.list_notes(owner).await?);

    let mut generation = GenerationSet::new();
    for note in &report.imported {
        generation.spawn(
            chat.clone(),
            store.clone(),
            owner.to_string(),
            note.clone(),
            all_notes.clone(),
        );
    }
    report.generation = generation.drain(progress).await;

    Ok(report)
}

/// Print the terminal report in the CLI's key-value style.
pub fn print_report(report: &ImportReport) {
    println!("import");
    println!("  files found: {}", report.files_found);

    if report.nothing_processed() {
        println!("  no files could be processed");
        for failure in &report.failures {
            println!("    - {}: {}", failure.path.display(), failure.reason);
        }
        return;
    }

    println!("  notes created: {}", report.imported.len());
    if !report.failures.is_empty() {
        println!("  failed: {}", report.failures.len());
        for failure in &report.failures {
            println!("    - {}: {}", failure.path.display(), failure.reason);
        }
    }

    let fallback = report.generation.iter().filter(|o| o.degraded).count();
    let persisted = report
        .generation
        .iter()
        .filter(|o| o.insight.is_some())
        .count();
    println!("  insights: {} persisted, {} fallback", persisted, fallback);
    for outcome in &report.generation {
        if let Some(warning) = &outcome.warning {
            eprintln!("  warning: {}", warning);
        }
    }
    println!("ok");
}
