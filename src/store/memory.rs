//! In-memory [`NoteStore`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Ordering is
//! maintained at read time so the listing contracts match the SQLite
//! backend exactly.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Insight, InsightDraft, Note, NoteDraft};

use super::{NoteChanges, NoteStore};

/// In-memory store for tests and ephemeral runs.
pub struct MemoryStore {
    notes: RwLock<Vec<Note>>,
    insights: RwLock<Vec<Insight>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(Vec::new()),
            insights: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn materialize_note(owner: &str, draft: NoteDraft) -> Note {
    let now = Utc::now();
    Note {
        id: Uuid::new_v4().to_string(),
        owner_id: owner.to_string(),
        title: draft.title,
        summary: draft.summary,
        note_type: draft.note_type,
        priority: draft.priority,
        connections: draft.connections,
        created_at: now,
        updated_at: now,
        metadata: draft.metadata,
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn create_note(&self, owner: &str, draft: NoteDraft) -> Result<Note> {
        let note = materialize_note(owner, draft);
        self.notes.write().unwrap().push(note.clone());
        Ok(note)
    }

    async fn create_notes(&self, owner: &str, drafts: Vec<NoteDraft>) -> Result<Vec<Note>> {
        let created: Vec<Note> = drafts
            .into_iter()
            .map(|draft| materialize_note(owner, draft))
            .collect();
        self.notes.write().unwrap().extend(created.iter().cloned());
        Ok(created)
    }

    async fn list_notes(&self, owner: &str) -> Result<Vec<Note>> {
        let notes = self.notes.read().unwrap();
        let mut owned: Vec<Note> = notes
            .iter()
            .filter(|n| n.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    async fn get_note(&self, owner: &str, id: &str) -> Result<Option<Note>> {
        let notes = self.notes.read().unwrap();
        Ok(notes
            .iter()
            .find(|n| n.owner_id == owner && n.id == id)
            .cloned())
    }

    async fn update_note(&self, owner: &str, id: &str, changes: NoteChanges) -> Result<Note> {
        let mut notes = self.notes.write().unwrap();
        let note = match notes
            .iter_mut()
            .find(|n| n.owner_id == owner && n.id == id)
        {
            Some(note) => note,
            None => bail!("note not found: {}", id),
        };

        if let Some(title) = changes.title {
            note.title = title;
        }
        if let Some(summary) = changes.summary {
            note.summary = summary;
        }
        if let Some(note_type) = changes.note_type {
            note.note_type = note_type;
        }
        if let Some(priority) = changes.priority {
            note.priority = priority;
        }
        if let Some(connections) = changes.connections {
            note.connections = connections;
        }
        note.updated_at = Utc::now();

        Ok(note.clone())
    }

    async fn delete_note(&self, owner: &str, id: &str) -> Result<()> {
        let mut notes = self.notes.write().unwrap();
        let before = notes.len();
        notes.retain(|n| !(n.owner_id == owner && n.id == id));
        if notes.len() == before {
            bail!("note not found: {}", id);
        }
        Ok(())
    }

    async fn create_insight(&self, owner: &str, draft: InsightDraft) -> Result<Insight> {
        let insight = Insight {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            insight_type: draft.insight_type,
            title: draft.title,
            message: draft.message,
            actionable: draft.actionable,
            created_at: Utc::now(),
        };
        self.insights.write().unwrap().push(insight.clone());
        Ok(insight)
    }

    async fn list_insights(&self, owner: &str) -> Result<Vec<Insight>> {
        let insights = self.insights.read().unwrap();
        let mut owned: Vec<Insight> = insights
            .iter()
            .filter(|i| i.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete_insight(&self, owner: &str, id: &str) -> Result<()> {
        let mut insights = self.insights.write().unwrap();
        let before = insights.len();
        insights.retain(|i| !(i.owner_id == owner && i.id == id));
        if insights.len() == before {
            bail!("insight not found: {}", id);
        }
        Ok(())
    }
}
