//! Daily summary aggregation.
//!
//! Groups notes by creation day (UTC, time-of-day truncated) and asks the
//! language-model service for a short narrative recap. Shares the fallback
//! pattern of the insight orchestrator: a transport failure yields a
//! templated sentence, never an error. No side effects; safe to recompute
//! whenever the note collection changes.

use chrono::NaiveDate;

use crate::llm::{ChatRequest, ChatService};
use crate::models::{ChatMessage, DailySummary, Note};

const DIGEST_TEMPERATURE: f32 = 0.7;
const DIGEST_MAX_TOKENS: u32 = 150;

/// Templated fallback when the service is unreachable.
fn fallback_sentence(note_count: usize) -> String {
    format!(
        "You added {} note{} today.",
        note_count,
        if note_count == 1 { "" } else { "s" }
    )
}

fn build_request(todays_notes: &[Note]) -> ChatRequest {
    let lines = todays_notes
        .iter()
        .map(|note| format!("{}: {}", note.title, note.summary))
        .collect::<Vec<_>>()
        .join("\n");

    ChatRequest {
        system: "You are NoteFlow, a personal AI assistant. Summarize the notes the user \
                 added today as a 2-3 sentence narrative. Be concrete and mention the most \
                 important items by name."
            .to_string(),
        messages: vec![ChatMessage::user(format!("Today's notes:\n{}", lines))],
        temperature: DIGEST_TEMPERATURE,
        max_tokens: DIGEST_MAX_TOKENS,
    }
}

/// Summarize the notes created on `today`.
///
/// An empty day returns [`DailySummary::Empty`] without contacting the
/// service at all.
pub async fn summarize_today(
    service: &dyn ChatService,
    notes: &[Note],
    today: NaiveDate,
) -> DailySummary {
    let todays_notes: Vec<&Note> = notes
        .iter()
        .filter(|note| note.created_at.date_naive() == today)
        .collect();

    if todays_notes.is_empty() {
        return DailySummary::Empty { day: today };
    }

    let owned: Vec<Note> = todays_notes.iter().map(|n| (*n).clone()).collect();
    let request = build_request(&owned);
    let note_count = owned.len();

    let narrative = match service.complete(&request).await {
        Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
        _ => fallback_sentence(note_count),
    };

    DailySummary::Digest {
        day: today,
        note_count,
        narrative,
    }
}

/// CLI entry point: compute today's digest and print it.
pub async fn run_digest(service: &dyn ChatService, notes: &[Note]) -> DailySummary {
    let today = chrono::Utc::now().date_naive();
    let summary = summarize_today(service, notes, today).await;

    match &summary {
        DailySummary::Empty { day } => {
            println!("digest {}", day);
            println!("  no notes were added today");
        }
        DailySummary::Digest {
            day,
            note_count,
            narrative,
        } => {
            println!("digest {}", day);
            println!("  notes today: {}", note_count);
            println!("  {}", narrative);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::models::{NoteType, Priority};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn note_created(title: &str, days_ago: i64) -> Note {
        let created = Utc::now() - Duration::days(days_ago);
        Note {
            id: title.to_string(),
            owner_id: "u1".to_string(),
            title: title.to_string(),
            summary: format!("about {}", title),
            note_type: NoteType::Custom,
            priority: Priority::Medium,
            connections: vec![],
            created_at: created,
            updated_at: created,
            metadata: None,
        }
    }

    /// Test double that counts calls and returns a fixed narrative.
    struct CountingChat {
        calls: AtomicUsize,
        response: Result<String, ()>,
    }

    impl CountingChat {
        fn ok(narrative: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(narrative.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatService for CountingChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(narrative) => Ok(narrative.clone()),
                Err(()) => Err(LlmError::Transport {
                    status: None,
                    detail: "down".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn empty_day_skips_the_service() {
        let service = CountingChat::ok("unused");
        let today = Utc::now().date_naive();
        let notes = vec![note_created("old", 3)];

        let summary = summarize_today(&service, &notes, today).await;
        assert_eq!(summary, DailySummary::Empty { day: today });
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn narrative_and_count_are_returned() {
        let service = CountingChat::ok("You planned the launch and met Sarah.");
        let today = Utc::now().date_naive();
        let notes = vec![
            note_created("launch", 0),
            note_created("sarah", 0),
            note_created("old", 5),
        ];

        let summary = summarize_today(&service, &notes, today).await;
        assert_eq!(
            summary,
            DailySummary::Digest {
                day: today,
                note_count: 2,
                narrative: "You planned the launch and met Sarah.".to_string(),
            }
        );
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_template() {
        let service = CountingChat::failing();
        let today = Utc::now().date_naive();
        let notes = vec![note_created("solo", 0)];

        let summary = summarize_today(&service, &notes, today).await;
        match summary {
            DailySummary::Digest {
                note_count,
                narrative,
                ..
            } => {
                assert_eq!(note_count, 1);
                assert_eq!(narrative, "You added 1 note today.");
            }
            other => panic!("expected digest, got {:?}", other),
        }
    }

    #[test]
    fn fallback_sentence_pluralizes() {
        assert_eq!(fallback_sentence(1), "You added 1 note today.");
        assert_eq!(fallback_sentence(4), "You added 4 notes today.");
    }

    #[test]
    fn request_serializes_title_colon_summary_lines() {
        let notes = vec![note_created("a", 0), note_created("b", 0)];
        let request = build_request(&notes);
        assert!(request.messages[0].content.contains("a: about a\nb: about b"));
    }
}
