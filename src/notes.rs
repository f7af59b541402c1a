//! Note CRUD and search operations behind the CLI.
//!
//! Each operation is a small compute function over the store plus a `run_*`
//! wrapper that prints in the CLI's key-value style. Adding a note kicks
//! off insight generation against the refreshed collection, exactly like
//! the import pipeline does for each imported file.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::insight::GenerationSet;
use crate::llm::ChatService;
use crate::models::{Note, NoteDraft, NoteType, Priority};
use crate::progress::GenerationProgressReporter;
use crate::store::{NoteChanges, NoteStore};

/// Case-insensitive substring filter over title and summary.
pub fn filter_notes<'a>(notes: &'a [Note], term: &str) -> Vec<&'a Note> {
    let needle = term.to_lowercase();
    notes
        .iter()
        .filter(|note| {
            note.title.to_lowercase().contains(&needle)
                || note.summary.to_lowercase().contains(&needle)
        })
        .collect()
}

fn print_note_line(note: &Note) {
    println!(
        "{}  [{}/{}]  {}",
        note.id,
        note.note_type,
        note.priority,
        note.title
    );
}

/// Create a note and generate its insight.
pub async fn run_add(
    store: Arc<dyn NoteStore>,
    chat: Arc<dyn ChatService>,
    owner: &str,
    mut draft: NoteDraft,
    skip_insight: bool,
    progress: &dyn GenerationProgressReporter,
) -> Result<Note> {
    draft.normalize_title(None);
    if draft.title == "Untitled" {
        bail!("a note needs a title");
    }

    let note = store.create_note(owner, draft).await?;
    println!("added {}", note.id);
    print_note_line(&note);

    if !skip_insight {
        // The freshly refreshed collection includes the new note.
        let all_notes = Arc::new(store.list_notes(owner).await?);
        let mut generation = GenerationSet::new();
        generation.spawn(
            chat,
            store.clone(),
            owner.to_string(),
            note.clone(),
            all_notes,
        );
        for outcome in generation.drain(progress).await {
            if let Some(warning) = outcome.warning {
                eprintln!("warning: {}", warning);
            }
        }
    }

    Ok(note)
}

/// List notes, optionally filtered, newest first. Also shows recent
/// insights so a terminal session mirrors the dashboard.
pub async fn run_list(
    store: &dyn NoteStore,
    owner: &str,
    filter: Option<&str>,
    with_insights: bool,
) -> Result<()> {
    let notes = store.list_notes(owner).await?;
    let visible: Vec<&Note> = match filter {
        Some(term) => filter_notes(&notes, term),
        None => notes.iter().collect(),
    };

    if visible.is_empty() {
        match filter {
            Some(term) => println!("no notes match '{}'", term),
            None => println!("no notes yet"),
        }
    } else {
        for note in &visible {
            print_note_line(note);
        }
        println!("{} note(s)", visible.len());
    }

    if with_insights {
        let insights = store.list_insights(owner).await?;
        if !insights.is_empty() {
            println!("--- insights ---");
            for insight in insights.iter().take(10) {
                println!("[{}] {}: {}", insight.insight_type, insight.title, insight.message);
            }
        }
    }

    Ok(())
}

/// Show one note in full.
pub async fn run_show(store: &dyn NoteStore, owner: &str, id: &str) -> Result<()> {
    let note = match store.get_note(owner, id).await? {
        Some(note) => note,
        None => bail!("note not found: {}", id),
    };

    println!("--- Note ---");
    println!("id:          {}", note.id);
    println!("title:       {}", note.title);
    println!("type:        {}", note.note_type);
    println!("priority:    {}", note.priority);
    println!("created_at:  {}", note.created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    println!("updated_at:  {}", note.updated_at.format("%Y-%m-%dT%H:%M:%SZ"));
    if !note.connections.is_empty() {
        println!("connections: {}", note.connections.join(", "));
    }
    if let Some(metadata) = &note.metadata {
        println!(
            "imported:    {} ({}, {})",
            metadata.imported_at.format("%Y-%m-%d"),
            metadata.source,
            metadata.original_filename
        );
    }
    println!();
    println!("{}", note.summary);

    Ok(())
}

/// Apply a partial edit. The store bumps `updated_at`.
pub async fn run_edit(
    store: &dyn NoteStore,
    owner: &str,
    id: &str,
    changes: NoteChanges,
) -> Result<()> {
    if changes.is_empty() {
        bail!("nothing to change; pass at least one of --title/--summary/--type/--priority");
    }
    let note = store.update_note(owner, id, changes).await?;
    println!("updated {}", note.id);
    print_note_line(&note);
    Ok(())
}

/// Delete a note. Insights generated from it remain.
pub async fn run_delete(store: &dyn NoteStore, owner: &str, id: &str) -> Result<()> {
    store.delete_note(owner, id).await?;
    println!("deleted {}", id);
    Ok(())
}

/// Delete a single insight record.
pub async fn run_delete_insight(store: &dyn NoteStore, owner: &str, id: &str) -> Result<()> {
    store.delete_insight(owner, id).await?;
    println!("deleted insight {}", id);
    Ok(())
}

/// Build a draft from the CLI's add arguments, parsing enums leniently.
pub fn draft_from_args(
    title: String,
    summary: Option<String>,
    note_type: Option<String>,
    priority: Option<String>,
    connections: Vec<String>,
) -> NoteDraft {
    NoteDraft {
        title,
        summary: summary.unwrap_or_default(),
        note_type: note_type
            .as_deref()
            .map(NoteType::parse_lenient)
            .unwrap_or_default(),
        priority: priority
            .as_deref()
            .map(Priority::parse_lenient)
            .unwrap_or_default(),
        connections,
        metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(title: &str, summary: &str) -> Note {
        Note {
            id: title.to_string(),
            owner_id: "u1".to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            note_type: NoteType::Custom,
            priority: Priority::Medium,
            connections: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: None,
        }
    }

    #[test]
    fn filter_matches_title_and_summary_case_insensitively() {
        let notes = vec![
            note("Spanish lessons", "weekly practice"),
            note("Launch", "ship the SPANISH landing page"),
            note("Unrelated", "nothing here"),
        ];
        let hits = filter_notes(&notes, "spanish");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn filter_with_no_match_is_empty() {
        let notes = vec![note("A", "b")];
        assert!(filter_notes(&notes, "zzz").is_empty());
    }

    #[test]
    fn draft_from_args_parses_enums_leniently() {
        let draft = draft_from_args(
            "T".to_string(),
            None,
            Some("project".to_string()),
            Some("nonsense".to_string()),
            vec![],
        );
        assert_eq!(draft.note_type, NoteType::Project);
        assert_eq!(draft.priority, Priority::Medium);
    }
}
