//! Insight generation orchestration.
//!
//! Builds the prompt contract for one note against the full note
//! collection, parses the model's structured output, and applies the
//! fallback policy: a malformed or unreachable response always degrades to
//! an `analysis` insight so the caller receives a result either way.
//!
//! Concurrent generations are modeled as explicit tokio tasks collected in
//! a [`GenerationSet`]; each task persists its insight as soon as it exists
//! and completions are fed to the progress reporter while any task is
//! outstanding.

use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinSet;

use crate::llm::{ChatRequest, ChatService, LlmError};
use crate::models::{ChatMessage, Insight, InsightDraft, InsightType, Note};
use crate::progress::{GenerationEvent, GenerationProgressReporter};
use crate::store::NoteStore;

const INSIGHT_TEMPERATURE: f32 = 0.7;
const INSIGHT_MAX_TOKENS: u32 = 200;

/// Result of one generation attempt. `warning` is set when the insight was
/// degraded by a transport or persistence failure and the user should see
/// why.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub note_title: String,
    pub insight: Option<Insight>,
    pub degraded: bool,
    pub warning: Option<String>,
}

/// System instruction: analysis persona, the current note collection, and
/// the structured response contract.
pub fn build_system_instruction(all_notes: &[Note]) -> String {
    let context_lines = if all_notes.is_empty() {
        "(none yet)".to_string()
    } else {
        all_notes
            .iter()
            .map(|note| format!("- {}", note.context_line()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are NoteFlow, an AI assistant that maintains a continuous understanding \
         of the user's work, life, and goals. You analyze their notes, detect patterns, \
         and surface proactive insights.\n\n\
         Current user notes:\n{}\n\n\
         Analyze the provided note and generate a relevant, actionable insight. Focus on:\n\
         - Connections between different notes\n\
         - Long-term goals that may need attention\n\
         - Opportunities for optimization or reconnection\n\
         - Time-sensitive actions\n\n\
         Respond in JSON format with: \
         {{ \"type\": \"opportunity|reminder|conflict|analysis\", \"title\": \"string\", \
         \"message\": \"string\", \"actionable\": boolean }}",
        context_lines
    )
}

/// Build the request for one note.
pub fn build_request(note: &Note, all_notes: &[Note]) -> ChatRequest {
    let target = serde_json::json!({
        "title": note.title,
        "summary": note.summary,
        "type": note.note_type.as_str(),
        "priority": note.priority.as_str(),
    });

    ChatRequest {
        system: build_system_instruction(all_notes),
        messages: vec![ChatMessage::user(format!("Analyze this note: {}", target))],
        temperature: INSIGHT_TEMPERATURE,
        max_tokens: INSIGHT_MAX_TOKENS,
    }
}

/// Wire shape of the structured response content.
#[derive(Debug, Deserialize)]
struct RawInsight {
    #[serde(rename = "type")]
    insight_type: String,
    title: String,
    message: String,
    actionable: bool,
}

/// Parse the model's content into an insight draft. `None` when the content
/// does not conform to the contract.
pub fn parse_insight(content: &str) -> Option<InsightDraft> {
    let raw: RawInsight = serde_json::from_str(content.trim()).ok()?;
    let insight_type = InsightType::parse(&raw.insight_type)?;
    Some(InsightDraft {
        insight_type,
        title: raw.title,
        message: raw.message,
        actionable: raw.actionable,
    })
}

/// Degraded analysis insight used whenever the model's answer is unusable.
pub fn degraded_insight(note: &Note, message: String) -> InsightDraft {
    InsightDraft {
        insight_type: InsightType::Analysis,
        title: format!("Analysis: {}", note.title),
        message,
        actionable: false,
    }
}

/// Templated restatement used when there is no model content at all.
fn restatement(note: &Note) -> String {
    if note.summary.trim().is_empty() {
        format!("\"{}\" was captured for later analysis.", note.title)
    } else {
        format!(
            "\"{}\" was captured for later analysis. Summary on record: {}",
            note.title, note.summary
        )
    }
}

/// A generated draft plus how it came to be.
#[derive(Debug)]
pub struct GeneratedInsight {
    pub draft: InsightDraft,
    /// True when the fallback policy produced the draft instead of the model.
    pub degraded: bool,
    /// Transport detail the user should see, independent of the draft.
    pub warning: Option<String>,
}

/// Generate an insight draft for one note. Never fails: transport and parse
/// problems degrade to the fallback shape, with the transport detail
/// returned as a separate warning.
pub async fn generate(
    service: &dyn ChatService,
    note: &Note,
    all_notes: &[Note],
) -> GeneratedInsight {
    let request = build_request(note, all_notes);

    match service.complete(&request).await {
        Ok(content) => match parse_insight(&content) {
            Some(draft) => GeneratedInsight {
                draft,
                degraded: false,
                warning: None,
            },
            // Unparseable content still reaches the user, verbatim.
            None => GeneratedInsight {
                draft: degraded_insight(note, content),
                degraded: true,
                warning: None,
            },
        },
        Err(err) => {
            let warning = match &err {
                LlmError::MissingCredential => err.to_string(),
                LlmError::Transport { .. } | LlmError::Malformed(_) => {
                    format!("insight generation for \"{}\" fell back: {}", note.title, err)
                }
            };
            GeneratedInsight {
                draft: degraded_insight(note, restatement(note)),
                degraded: true,
                warning: Some(warning),
            }
        }
    }
}

/// A set of in-flight generation tasks.
///
/// Each spawned task generates, persists, and returns its outcome
/// independently; there is no cross-note ordering and no deduplication —
/// spawning twice for the same note yields two insight records.
pub struct GenerationSet {
    tasks: JoinSet<GenerationOutcome>,
    total: u64,
}

impl GenerationSet {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            total: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Spawn one fire-and-forget generation task.
    pub fn spawn(
        &mut self,
        service: Arc<dyn ChatService>,
        store: Arc<dyn NoteStore>,
        owner: String,
        note: Note,
        all_notes: Arc<Vec<Note>>,
    ) {
        self.total += 1;
        self.tasks.spawn(async move {
            let generated = generate(service.as_ref(), &note, &all_notes).await;
            let degraded = generated.degraded;
            let mut warning = generated.warning;

            let insight = match store.create_insight(&owner, generated.draft).await {
                Ok(insight) => Some(insight),
                Err(err) => {
                    // A store failure must not vanish silently.
                    warning = Some(format!(
                        "could not persist insight for \"{}\": {}",
                        note.title, err
                    ));
                    None
                }
            };

            GenerationOutcome {
                note_title: note.title,
                insight,
                degraded,
                warning,
            }
        });
    }

    /// Await every outstanding task, reporting each completion. Panicked
    /// tasks are recorded as failed outcomes rather than propagated.
    pub async fn drain(
        mut self,
        progress: &dyn GenerationProgressReporter,
    ) -> Vec<GenerationOutcome> {
        if self.total > 0 {
            progress.report(GenerationEvent::Started { total: self.total });
        }

        let mut outcomes = Vec::with_capacity(self.total as usize);
        let mut finished = 0u64;

        while let Some(joined) = self.tasks.join_next().await {
            finished += 1;
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => GenerationOutcome {
                    note_title: "(unknown)".to_string(),
                    insight: None,
                    degraded: true,
                    warning: Some(format!("generation task failed: {}", err)),
                },
            };
            progress.report(GenerationEvent::Finished {
                n: finished,
                total: self.total,
                note_title: outcome.note_title.clone(),
                degraded: outcome.degraded,
            });
            outcomes.push(outcome);
        }

        outcomes
    }
}

impl Default for GenerationSet {
    fn default() -> Self {
        Self::new()
    }
}

/// CLI entry point: regenerate an insight for one existing note.
pub async fn run_insight(
    store: Arc<dyn NoteStore>,
    service: Arc<dyn ChatService>,
    owner: &str,
    note_id: &str,
    progress: &dyn GenerationProgressReporter,
) -> anyhow::Result<()> {
    let note = match store.get_note(owner, note_id).await? {
        Some(note) => note,
        None => anyhow::bail!("note not found: {}", note_id),
    };
    let all_notes = std::sync::Arc::new(store.list_notes(owner).await?);

    let mut set = GenerationSet::new();
    set.spawn(service, store, owner.to_string(), note, all_notes);

    for outcome in set.drain(progress).await {
        if let Some(insight) = &outcome.insight {
            println!("[{}] {}", insight.insight_type, insight.title);
            println!("  {}", insight.message);
            if insight.actionable {
                println!("  actionable");
            }
        }
        if let Some(warning) = &outcome.warning {
            eprintln!("warning: {}", warning);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteType, Priority};
    use crate::progress::NoProgress;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;

    fn note(title: &str, summary: &str) -> Note {
        Note {
            id: "n1".to_string(),
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

    struct FixedChat(String);

    #[async_trait]
    impl ChatService for FixedChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatService for FailingChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
            Err(LlmError::Transport {
                status: Some(503),
                detail: "upstream down".to_string(),
            })
        }
    }

    #[test]
    fn parse_accepts_conforming_content() {
        let draft = parse_insight(
            r#"{"type": "reminder", "title": "Check in", "message": "Do it", "actionable": true}"#,
        )
        .unwrap();
        assert_eq!(draft.insight_type, InsightType::Reminder);
        assert!(draft.actionable);
    }

    #[test]
    fn parse_rejects_unknown_type_and_prose() {
        assert!(parse_insight("Here are my thoughts on your note...").is_none());
        assert!(parse_insight(
            r#"{"type": "suggestion", "title": "t", "message": "m", "actionable": false}"#
        )
        .is_none());
    }

    #[tokio::test]
    async fn malformed_content_degrades_with_verbatim_message() {
        let service = FixedChat("not json at all".to_string());
        let target = note("Spanish", "practice weekly");
        let generated = generate(&service, &target, &[target.clone()]).await;

        assert!(generated.degraded);
        assert_eq!(generated.draft.insight_type, InsightType::Analysis);
        assert_eq!(generated.draft.title, "Analysis: Spanish");
        assert_eq!(generated.draft.message, "not json at all");
        assert!(!generated.draft.actionable);
        assert!(generated.warning.is_none());
    }

    #[tokio::test]
    async fn transport_failure_degrades_and_warns() {
        let target = note("Launch", "ship Q4");
        let generated = generate(&FailingChat, &target, &[]).await;

        assert!(generated.degraded);
        assert_eq!(generated.draft.insight_type, InsightType::Analysis);
        assert!(generated.draft.message.contains("Launch"));
        assert!(generated.draft.message.contains("ship Q4"));
        let warning = generated.warning.unwrap();
        assert!(warning.contains("503"));
    }

    #[tokio::test]
    async fn well_formed_response_is_not_degraded() {
        let service = FixedChat(
            r#"{"type": "opportunity", "title": "Reconnect", "message": "Reach out", "actionable": true}"#
                .to_string(),
        );
        let target = note("Networking", "met Sarah");
        let generated = generate(&service, &target, &[]).await;

        assert!(!generated.degraded);
        assert_eq!(generated.draft.insight_type, InsightType::Opportunity);
        assert!(generated.warning.is_none());
    }

    #[tokio::test]
    async fn system_instruction_lists_every_note() {
        let a = note("Alpha", "first");
        let b = note("Beta", "second");
        let system = build_system_instruction(&[a, b]);
        assert!(system.contains("- Alpha, first,"));
        assert!(system.contains("- Beta, second,"));
        assert!(system.contains("\"opportunity|reminder|conflict|analysis\""));
    }

    #[tokio::test]
    async fn spawning_twice_for_one_note_creates_two_insights() {
        let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
        let service: Arc<dyn ChatService> = Arc::new(FixedChat(
            r#"{"type": "analysis", "title": "T", "message": "M", "actionable": false}"#
                .to_string(),
        ));
        let target = note("Dup", "twice");
        let all = Arc::new(vec![target.clone()]);

        let mut set = GenerationSet::new();
        set.spawn(
            service.clone(),
            store.clone(),
            "u1".to_string(),
            target.clone(),
            all.clone(),
        );
        set.spawn(service, store.clone(), "u1".to_string(), target, all);

        let outcomes = set.drain(&NoProgress).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(store.list_insights("u1").await.unwrap().len(), 2);
    }
}
