//! Storage abstraction for notes and insights.
//!
//! The [`NoteStore`] trait defines every persistence operation the pipeline
//! needs, enabling pluggable backends: [`sqlite::SqliteStore`] in production
//! and [`memory::MemoryStore`] for tests. All operations are owner-scoped;
//! the pipeline never reads or writes another owner's records.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Insight, InsightDraft, Note, NoteDraft};

/// Partial update for a note; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub note_type: Option<crate::models::NoteType>,
    pub priority: Option<crate::models::Priority>,
    pub connections: Option<Vec<String>>,
}

impl NoteChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.note_type.is_none()
            && self.priority.is_none()
            && self.connections.is_none()
    }
}

/// Abstract storage backend for NoteFlow.
///
/// `create_*` operations return the persisted record including the
/// store-assigned id and timestamps. Listings are ordered newest-first:
/// notes by `updated_at`, insights by `created_at`.
///
/// Deleting a note never deletes the insights generated from it.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist a single note and return it with id and timestamps assigned.
    async fn create_note(&self, owner: &str, draft: NoteDraft) -> Result<Note>;

    /// Persist a batch of notes as one unit, preserving input order.
    async fn create_notes(&self, owner: &str, drafts: Vec<NoteDraft>) -> Result<Vec<Note>>;

    /// All notes for an owner, last-updated descending.
    async fn list_notes(&self, owner: &str) -> Result<Vec<Note>>;

    /// Fetch one note by id, or `None` when absent (or owned by someone else).
    async fn get_note(&self, owner: &str, id: &str) -> Result<Option<Note>>;

    /// Apply a partial update and bump `updated_at`. Fails when the note
    /// does not exist for this owner.
    async fn update_note(&self, owner: &str, id: &str, changes: NoteChanges) -> Result<Note>;

    /// Delete one note. Fails when the note does not exist for this owner.
    async fn delete_note(&self, owner: &str, id: &str) -> Result<()>;

    /// Persist an insight and return it with id and timestamp assigned.
    async fn create_insight(&self, owner: &str, draft: InsightDraft) -> Result<Insight>;

    /// All insights for an owner, created descending.
    async fn list_insights(&self, owner: &str) -> Result<Vec<Insight>>;

    /// Delete one insight. Fails when it does not exist for this owner.
    async fn delete_insight(&self, owner: &str, id: &str) -> Result<()>;
}
