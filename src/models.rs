//! Core data models used throughout NoteFlow.
//!
//! These types represent the notes, insights, and transient extraction and
//! summary values that flow through the ingestion and generation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a note. Unknown input parses to [`NoteType::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Custom,
    Project,
    Personal,
    Professional,
    Document,
    Imported,
    Action,
}

impl NoteType {
    /// Parse a stored or user-supplied value, defaulting to `custom`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "project" => NoteType::Project,
            "personal" => NoteType::Personal,
            "professional" => NoteType::Professional,
            "document" => NoteType::Document,
            "imported" => NoteType::Imported,
            "action" => NoteType::Action,
            _ => NoteType::Custom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Custom => "custom",
            NoteType::Project => "project",
            NoteType::Personal => "personal",
            NoteType::Professional => "professional",
            NoteType::Document => "document",
            NoteType::Imported => "imported",
            NoteType::Action => "action",
        }
    }
}

impl Default for NoteType {
    fn default() -> Self {
        NoteType::Custom
    }
}

impl std::fmt::Display for NoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a note. Unknown input parses to [`Priority::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Parse a stored or user-supplied value, defaulting to `medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance recorded on notes created through file import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    /// Human-readable source label (e.g. `"CSV File"`, `"PDF Document"`).
    pub source: String,
    /// Original filename as uploaded.
    pub original_filename: String,
    /// When the import ran.
    pub imported_at: DateTime<Utc>,
}

/// A persisted note, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub summary: String,
    pub note_type: NoteType,
    pub priority: Priority,
    pub connections: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NoteMetadata>,
}

impl Note {
    /// Compact one-line rendering used when the full note collection is
    /// embedded into a language-model request.
    pub fn context_line(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.title,
            self.summary,
            self.priority,
            self.updated_at.format("%Y-%m-%d %H:%M")
        )
    }
}

/// A note before the store has assigned id and timestamps.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub title: String,
    pub summary: String,
    pub note_type: NoteType,
    pub priority: Priority,
    pub connections: Vec<String>,
    pub metadata: Option<NoteMetadata>,
}

impl NoteDraft {
    /// Enforce the non-empty-title invariant: blank titles fall back to the
    /// given name (usually a filename), then to `"Untitled"`.
    pub fn normalize_title(&mut self, fallback: Option<&str>) {
        let title = self.title.trim();
        if !title.is_empty() {
            self.title = title.to_string();
            return;
        }
        self.title = match fallback.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "Untitled".to_string(),
        };
    }
}

/// Kind of an AI-generated insight. Parsing is strict; anything the model
/// returns outside this set makes the orchestrator fall back to a degraded
/// analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Opportunity,
    Reminder,
    Conflict,
    Analysis,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Opportunity => "opportunity",
            InsightType::Reminder => "reminder",
            InsightType::Conflict => "conflict",
            InsightType::Analysis => "analysis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "opportunity" => Some(InsightType::Opportunity),
            "reminder" => Some(InsightType::Reminder),
            "conflict" => Some(InsightType::Conflict),
            "analysis" => Some(InsightType::Analysis),
            _ => None,
        }
    }
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted insight. References the note it was generated from only
/// informally (via its title in the message); deleting the note does not
/// delete the insight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub owner_id: String,
    pub insight_type: InsightType,
    pub title: String,
    pub message: String,
    pub actionable: bool,
    pub created_at: DateTime<Utc>,
}

/// An insight before the store has assigned id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightDraft {
    pub insight_type: InsightType,
    pub title: String,
    pub message: String,
    pub actionable: bool,
}

/// Result of extracting one uploaded file. Transient: consumed immediately
/// by the ingestion dispatcher to build a [`NoteDraft`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: String,
    pub content: String,
    pub source: String,
}

/// Recap of the notes created on one calendar day. Recomputed on demand,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailySummary {
    /// No notes were created on the given day; the language-model service
    /// is not contacted in this case.
    Empty { day: chrono::NaiveDate },
    /// At least one note was created; `narrative` is the model's recap or
    /// the templated fallback sentence.
    Digest {
        day: chrono::NaiveDate,
        note_count: usize,
        narrative: String,
    },
}

/// Role of a chat transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
