//! Context-aware chat orchestration.
//!
//! Builds a system prompt embedding the user's full note collection and
//! forwards the running transcript to the language-model service. Failures
//! surface as a typed [`ChatError`] whose detail the CLI renders as an
//! apology message instead of crashing the session.

use std::io::Write;

use crate::llm::{ChatRequest, ChatService, LlmError};
use crate::models::{ChatMessage, Note};

const CHAT_TEMPERATURE: f32 = 0.8;
const CHAT_MAX_TOKENS: u32 = 500;

/// Typed chat failure with a human-readable detail string.
#[derive(Debug)]
pub struct ChatError {
    pub detail: String,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for ChatError {}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError {
            detail: err.to_string(),
        }
    }
}

/// System prompt embedding each note as a compact context line.
pub fn build_system_instruction(notes: &[Note]) -> String {
    let context_summary = if notes.is_empty() {
        "No contexts yet".to_string()
    } else {
        notes
            .iter()
            .map(|note| {
                format!(
                    "- {}: {} (Priority: {}, Last updated: {})",
                    note.title,
                    note.summary,
                    note.priority,
                    note.updated_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are NoteFlow, a personal AI assistant with persistent memory of the user's \
         life, work, and goals. You have access to their complete context graph.\n\n\
         User's Current Contexts:\n{}\n\n\
         Use this context to provide personalized, relevant responses. Reference specific \
         contexts when relevant. Be proactive about surfacing connections, reminders, and \
         opportunities based on what you know about the user.",
        context_summary
    )
}

/// Send the transcript (whose last entry is the new user message) and return
/// the assistant's reply.
pub async fn send_message(
    service: &dyn ChatService,
    transcript: &[ChatMessage],
    notes: &[Note],
) -> Result<ChatMessage, ChatError> {
    let request = ChatRequest {
        system: build_system_instruction(notes),
        messages: transcript.to_vec(),
        temperature: CHAT_TEMPERATURE,
        max_tokens: CHAT_MAX_TOKENS,
    };

    let content = service.complete(&request).await?;
    Ok(ChatMessage::assistant(content))
}

/// Apology rendered into the transcript when a send fails.
pub fn apology(error: &ChatError) -> ChatMessage {
    ChatMessage::assistant(format!(
        "Sorry, I encountered an error: {}",
        error.detail
    ))
}

/// One-shot send: prints the reply (or the apology) and returns.
pub async fn run_once(service: &dyn ChatService, notes: &[Note], message: &str) -> anyhow::Result<()> {
    let transcript = vec![ChatMessage::user(message)];
    match send_message(service, &transcript, notes).await {
        Ok(reply) => println!("{}", reply.content),
        Err(err) => println!("{}", apology(&err).content),
    }
    Ok(())
}

/// Interactive chat loop on stdin. The transcript grows for the lifetime of
/// the session; an empty line or EOF ends it.
pub async fn run_interactive(service: &dyn ChatService, notes: &[Note]) -> anyhow::Result<()> {
    let mut transcript: Vec<ChatMessage> = Vec::new();
    let stdin = std::io::stdin();

    println!("Chat with your notes ({} in context). Empty line to exit.", notes.len());

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        transcript.push(ChatMessage::user(line));
        let reply = match send_message(service, &transcript, notes).await {
            Ok(reply) => reply,
            Err(err) => apology(&err),
        };
        println!("{}", reply.content);
        transcript.push(reply);
    }

    Ok(())
}
