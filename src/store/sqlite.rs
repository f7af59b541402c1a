//! SQLite-backed [`NoteStore`] implementation.
//!
//! Timestamps are stored as unix seconds; connections and import metadata
//! are stored as JSON text columns. Enum columns are parsed leniently on
//! read, so hand-edited rows degrade to `custom`/`medium` instead of
//! failing the whole listing.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Insight, InsightDraft, InsightType, Note, NoteDraft, NoteMetadata, NoteType, Priority,
};

use super::{NoteChanges, NoteStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Current time truncated to whole seconds, matching column precision.
fn now_secs() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

fn ts_from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn note_from_row(row: &sqlx::sqlite::SqliteRow) -> Note {
    let note_type: String = row.get("note_type");
    let priority: String = row.get("priority");
    let connections_json: String = row.get("connections_json");
    let metadata_json: Option<String> = row.get("metadata_json");

    Note {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        summary: row.get("summary"),
        note_type: NoteType::parse_lenient(&note_type),
        priority: Priority::parse_lenient(&priority),
        connections: serde_json::from_str(&connections_json).unwrap_or_default(),
        created_at: ts_from_secs(row.get("created_at")),
        updated_at: ts_from_secs(row.get("updated_at")),
        metadata: metadata_json.and_then(|json| serde_json::from_str::<NoteMetadata>(&json).ok()),
    }
}

fn insight_from_row(row: &sqlx::sqlite::SqliteRow) -> Insight {
    let insight_type: String = row.get("insight_type");
    let actionable: i64 = row.get("actionable");

    Insight {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        insight_type: InsightType::parse(&insight_type).unwrap_or(InsightType::Analysis),
        title: row.get("title"),
        message: row.get("message"),
        actionable: actionable != 0,
        created_at: ts_from_secs(row.get("created_at")),
    }
}

async fn insert_note(
    executor: &mut sqlx::SqliteConnection,
    owner: &str,
    draft: NoteDraft,
) -> Result<Note> {
    let now = now_secs();
    let note = Note {
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
    };

    let metadata_json = match &note.metadata {
        Some(metadata) => Some(serde_json::to_string(metadata)?),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO notes (id, owner_id, title, summary, note_type, priority, connections_json, created_at, updated_at, metadata_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&note.id)
    .bind(&note.owner_id)
    .bind(&note.title)
    .bind(&note.summary)
    .bind(note.note_type.as_str())
    .bind(note.priority.as_str())
    .bind(serde_json::to_string(&note.connections)?)
    .bind(note.created_at.timestamp())
    .bind(note.updated_at.timestamp())
    .bind(metadata_json)
    .execute(executor)
    .await?;

    Ok(note)
}

#[async_trait]
impl NoteStore for SqliteStore {
    async fn create_note(&self, owner: &str, draft: NoteDraft) -> Result<Note> {
        let mut conn = self.pool.acquire().await?;
        insert_note(&mut conn, owner, draft).await
    }

    async fn create_notes(&self, owner: &str, drafts: Vec<NoteDraft>) -> Result<Vec<Note>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            created.push(insert_note(&mut tx, owner, draft).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn list_notes(&self, owner: &str) -> Result<Vec<Note>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, summary, note_type, priority, connections_json, \
             created_at, updated_at, metadata_json \
             FROM notes WHERE owner_id = ? ORDER BY updated_at DESC, rowid ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    async fn get_note(&self, owner: &str, id: &str) -> Result<Option<Note>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, summary, note_type, priority, connections_json, \
             created_at, updated_at, metadata_json \
             FROM notes WHERE owner_id = ? AND id = ?",
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(note_from_row))
    }

    async fn update_note(&self, owner: &str, id: &str, changes: NoteChanges) -> Result<Note> {
        let mut note = match self.get_note(owner, id).await? {
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
        note.updated_at = now_secs();

        sqlx::query(
            "UPDATE notes SET title = ?, summary = ?, note_type = ?, priority = ?, \
             connections_json = ?, updated_at = ? WHERE owner_id = ? AND id = ?",
        )
        .bind(&note.title)
        .bind(&note.summary)
        .bind(note.note_type.as_str())
        .bind(note.priority.as_str())
        .bind(serde_json::to_string(&note.connections)?)
        .bind(note.updated_at.timestamp())
        .bind(owner)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(note)
    }

    async fn delete_note(&self, owner: &str, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE owner_id = ? AND id = ?")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
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
            created_at: now_secs(),
        };

        sqlx::query(
            "INSERT INTO insights (id, owner_id, insight_type, title, message, actionable, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&insight.id)
        .bind(&insight.owner_id)
        .bind(insight.insight_type.as_str())
        .bind(&insight.title)
        .bind(&insight.message)
        .bind(insight.actionable as i64)
        .bind(insight.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(insight)
    }

    async fn list_insights(&self, owner: &str) -> Result<Vec<Insight>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, insight_type, title, message, actionable, created_at \
             FROM insights WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(insight_from_row).collect())
    }

    async fn delete_insight(&self, owner: &str, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM insights WHERE owner_id = ? AND id = ?")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("insight not found: {}", id);
        }
        Ok(())
    }
}
