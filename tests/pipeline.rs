//! Integration tests for the import → insight pipeline.
//!
//! Runs the real dispatcher and generation set against the in-memory store
//! and stub services, so every scenario holds without a network, a built
//! binary, or an API credential.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use noteflow::extract::{ExtractError, EMPTY_CONTENT_PLACEHOLDER};
use noteflow::ingest;
use noteflow::insight::GenerationSet;
use noteflow::llm::{ChatRequest, ChatService, LlmError};
use noteflow::models::{
    ExtractionResult, InsightType, NoteDraft, NoteType, Priority,
};
use noteflow::progress::NoProgress;
use noteflow::remote::ExtractionService;
use noteflow::store::memory::MemoryStore;
use noteflow::store::NoteStore;

/// Chat double that records every system instruction it sees and answers
/// with a fixed, well-formed insight.
struct RecordingChat {
    systems: Mutex<Vec<String>>,
    content: String,
}

impl RecordingChat {
    fn new(content: &str) -> Arc<Self> {
        Arc::new(Self {
            systems: Mutex::new(Vec::new()),
            content: content.to_string(),
        })
    }

    fn seen_systems(&self) -> Vec<String> {
        self.systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatService for RecordingChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.systems.lock().unwrap().push(request.system.clone());
        Ok(self.content.clone())
    }
}

/// Extraction double for remote formats.
struct StubExtraction;

#[async_trait]
impl ExtractionService for StubExtraction {
    async fn extract(
        &self,
        file_name: &str,
        _media_type: &str,
        _bytes: &[u8],
    ) -> Result<ExtractionResult, ExtractError> {
        Ok(ExtractionResult {
            title: file_name.to_string(),
            content: "remote text".to_string(),
            source: "PDF Document".to_string(),
        })
    }
}

const WELL_FORMED: &str =
    r#"{"type": "opportunity", "title": "Follow up", "message": "Do it", "actionable": true}"#;

fn write_files(dir: &tempfile::TempDir, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, body)| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path
        })
        .collect()
}

#[tokio::test]
async fn batch_with_one_unsupported_file_still_imports_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(
        &dir,
        &[
            ("a.txt", "first note"),
            ("b.csv", "title,summary\nrow,body"),
            ("c.exe", "binary junk"),
        ],
    );

    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let chat = RecordingChat::new(WELL_FORMED);

    let report = ingest::import_files(
        store.clone(),
        &StubExtraction,
        chat.clone(),
        "u1",
        &paths,
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(report.files_found, 3);
    assert_eq!(report.imported.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].reason.contains("unsupported"));
    assert!(!report.nothing_processed());

    // The successfully extracted notes persisted despite the failure.
    let notes = store.list_notes("u1").await.unwrap();
    assert_eq!(notes.len(), 2);
    for note in &notes {
        assert_eq!(note.note_type, NoteType::Imported);
        assert_eq!(note.priority, Priority::Medium);
        assert!(note.metadata.is_some());
    }

    // One insight per imported note.
    let insights = store.list_insights("u1").await.unwrap();
    assert_eq!(insights.len(), 2);
    assert!(insights
        .iter()
        .all(|i| i.insight_type == InsightType::Opportunity));
}

#[tokio::test]
async fn all_files_failing_reports_nothing_processed() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &[("x.bin", "junk")]);

    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let chat = RecordingChat::new(WELL_FORMED);

    let report = ingest::import_files(
        store.clone(),
        &StubExtraction,
        chat,
        "u1",
        &paths,
        &NoProgress,
    )
    .await
    .unwrap();

    assert!(report.nothing_processed());
    assert_eq!(report.failures.len(), 1);
    assert!(store.list_notes("u1").await.unwrap().is_empty());
    assert!(store.list_insights("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_only_file_gets_the_placeholder_body() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &[("empty.txt", "   \n\t")]);

    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let chat = RecordingChat::new(WELL_FORMED);

    let report = ingest::import_files(
        store.clone(),
        &StubExtraction,
        chat,
        "u1",
        &paths,
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.imported[0].summary, EMPTY_CONTENT_PLACEHOLDER);
    assert_eq!(report.imported[0].title, "empty");
}

#[tokio::test]
async fn generation_observes_new_and_preexisting_notes() {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    store
        .create_note(
            "u1",
            NoteDraft {
                title: "Existing context".to_string(),
                summary: "already here".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &[("fresh.txt", "brand new")]);
    let chat = RecordingChat::new(WELL_FORMED);

    ingest::import_files(
        store.clone(),
        &StubExtraction,
        chat.clone(),
        "u1",
        &paths,
        &NoProgress,
    )
    .await
    .unwrap();

    // Persistence completed before generation: the system instruction for
    // the new note lists the new note and every pre-existing one.
    let systems = chat.seen_systems();
    assert_eq!(systems.len(), 1);
    assert!(systems[0].contains("Existing context"));
    assert!(systems[0].contains("fresh"));
}

#[tokio::test]
async fn malformed_model_output_degrades_per_note() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &[("note.txt", "content")]);

    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let chat = RecordingChat::new("I would rather write prose.");

    let report = ingest::import_files(
        store.clone(),
        &StubExtraction,
        chat,
        "u1",
        &paths,
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(report.generation.len(), 1);
    assert!(report.generation[0].degraded);

    let insights = store.list_insights("u1").await.unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].insight_type, InsightType::Analysis);
    assert_eq!(insights[0].title, "Analysis: note");
    assert_eq!(insights[0].message, "I would rather write prose.");
    assert!(!insights[0].actionable);
}

#[tokio::test]
async fn deleting_an_imported_note_keeps_its_insight() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &[("keeper.txt", "body")]);

    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let chat = RecordingChat::new(WELL_FORMED);

    let report = ingest::import_files(
        store.clone(),
        &StubExtraction,
        chat,
        "u1",
        &paths,
        &NoProgress,
    )
    .await
    .unwrap();

    let note_id = report.imported[0].id.clone();
    store.delete_note("u1", &note_id).await.unwrap();

    assert!(store.list_notes("u1").await.unwrap().is_empty());
    assert_eq!(store.list_insights("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn double_generation_for_one_note_yields_two_records() {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let note = store
        .create_note(
            "u1",
            NoteDraft {
                title: "Twice".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let chat = RecordingChat::new(WELL_FORMED);
    let all = Arc::new(store.list_notes("u1").await.unwrap());

    let mut set = GenerationSet::new();
    set.spawn(
        chat.clone(),
        store.clone(),
        "u1".to_string(),
        note.clone(),
        all.clone(),
    );
    set.spawn(chat, store.clone(), "u1".to_string(), note, all);
    set.drain(&NoProgress).await;

    assert_eq!(store.list_insights("u1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn csv_restore_round_trips_the_four_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.csv");
    std::fs::write(
        &path,
        "title,summary,type,priority\nQ4 Launch,Ship the release,project,high\n",
    )
    .unwrap();

    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let report = noteflow::export::restore_data(store.clone(), "u1", &path)
        .await
        .unwrap();
    assert_eq!(report.notes, 1);

    let notes = store.list_notes("u1").await.unwrap();
    assert_eq!(notes[0].title, "Q4 Launch");
    assert_eq!(notes[0].summary, "Ship the release");
    assert_eq!(notes[0].note_type, NoteType::Project);
    assert_eq!(notes[0].priority, Priority::High);
}

#[tokio::test]
async fn export_then_restore_preserves_note_fields() {
    let source: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    source
        .create_note(
            "u1",
            NoteDraft {
                title: "Original".to_string(),
                summary: "kept through backup".to_string(),
                note_type: NoteType::Personal,
                priority: Priority::Low,
                connections: vec!["travel".to_string()],
                metadata: None,
            },
        )
        .await
        .unwrap();

    let document = noteflow::export::export_data(source.as_ref(), "u1")
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");
    std::fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();

    let target: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    noteflow::export::restore_data(target.clone(), "u1", &path)
        .await
        .unwrap();

    let notes = target.list_notes("u1").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Original");
    assert_eq!(notes[0].summary, "kept through backup");
    assert_eq!(notes[0].note_type, NoteType::Personal);
    assert_eq!(notes[0].priority, Priority::Low);
    assert_eq!(notes[0].connections, vec!["travel".to_string()]);
}
