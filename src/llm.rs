//! Language-model chat service abstraction and implementations.
//!
//! Defines the [`ChatService`] trait and concrete implementations:
//! - **[`DisabledChat`]** — returns errors; used when no provider is configured.
//! - **[`OpenAiChat`]** — calls an OpenAI-compatible chat-completions API
//!   with bounded timeout, retry, and backoff.
//!
//! # Retry Strategy
//!
//! Transient errors are retried with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// A single chat-completion request: system instruction plus ordered
/// transcript, with per-call sampling bounds.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Failure of a language-model call.
///
/// Callers in the generation pipeline degrade these to fallback content;
/// only [`LlmError::MissingCredential`] at client construction is surfaced
/// as a configuration error before any call is attempted.
#[derive(Debug)]
pub enum LlmError {
    /// The API credential is not present in the environment.
    MissingCredential,
    /// Network failure, timeout, or non-success HTTP status.
    Transport {
        status: Option<u16>,
        detail: String,
    },
    /// The service answered but the response body missed the expected field.
    Malformed(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::MissingCredential => {
                write!(f, "{} environment variable not set", API_KEY_ENV)
            }
            LlmError::Transport { status, detail } => match status {
                Some(code) => write!(f, "chat service error {}: {}", code, detail),
                None => write!(f, "chat service unreachable: {}", detail),
            },
            LlmError::Malformed(detail) => {
                write!(f, "invalid response from chat service: {}", detail)
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Trait for language-model chat backends.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send one request and return the assistant's content string.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// A no-op chat service that always fails.
///
/// Used when `llm.provider = "disabled"` in the configuration; the
/// generation pipeline then exercises its fallback paths.
pub struct DisabledChat;

#[async_trait]
impl ChatService for DisabledChat {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::Transport {
            status: None,
            detail: "chat provider is disabled".to_string(),
        })
    }
}

/// Sentinel used when the credential is missing at operation startup: every
/// call fails with the configuration error without attempting a request, so
/// the generation pipeline degrades while the ingestion of notes proceeds.
pub struct UnconfiguredChat;

#[async_trait]
impl ChatService for UnconfiguredChat {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::MissingCredential)
    }
}

/// Chat service backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiChat {
    api_base: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiChat {
    /// Create a client from configuration.
    ///
    /// Fails with [`LlmError::MissingCredential`] when the API key is not in
    /// the environment, so a misconfigured deployment is caught before the
    /// first request.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| LlmError::MissingCredential)?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatService for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Transport {
                status: None,
                detail: e.to_string(),
            })?;

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system,
        })];
        for message in &request.messages {
            messages.push(serde_json::json!({
                "role": message.role.as_str(),
                "content": message.content,
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let url = format!("{}/chat/completions", self.api_base);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| LlmError::Malformed(
                                e.to_string(),
                            ))?;
                        return parse_completion(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(LlmError::Transport {
                            status: Some(status.as_u16()),
                            detail: body_text,
                        });
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(LlmError::Transport {
                        status: Some(status.as_u16()),
                        detail: body_text,
                    });
                }
                Err(e) => {
                    last_err = Some(LlmError::Transport {
                        status: None,
                        detail: e.to_string(),
                    });
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::Transport {
            status: None,
            detail: "chat request failed after retries".to_string(),
        }))
    }
}

/// Create the appropriate [`ChatService`] based on configuration.
///
/// | Config value | Service |
/// |--------------|---------|
/// | `"disabled"` | [`DisabledChat`] |
/// | `"openai"` | [`OpenAiChat`], or [`UnconfiguredChat`] when the key is absent |
///
/// A missing credential is reported once on stderr here; individual
/// operations then degrade per their fallback policy instead of attempting
/// doomed requests.
pub fn service_from_config(config: &LlmConfig) -> std::sync::Arc<dyn ChatService> {
    if !config.is_enabled() {
        return std::sync::Arc::new(DisabledChat);
    }
    match OpenAiChat::new(config) {
        Ok(service) => std::sync::Arc::new(service),
        Err(err) => {
            eprintln!("warning: {}; insight and chat requests will fall back", err);
            std::sync::Arc::new(UnconfiguredChat)
        }
    }
}

/// Pull the assistant content out of a chat-completions response body.
///
/// An `error` object in the body is reported as a transport failure (the
/// service answered, but with a refusal); a missing `choices[0].message.content`
/// is a malformed response.
fn parse_completion(json: &serde_json::Value) -> Result<String, LlmError> {
    if let Some(error) = json.get("error") {
        let detail = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown service error")
            .to_string();
        return Err(LlmError::Transport {
            status: None,
            detail,
        });
    }

    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_completion_extracts_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "hello");
    }

    #[test]
    fn parse_completion_reports_service_error() {
        let json = serde_json::json!({"error": {"message": "quota exceeded"}});
        let err = parse_completion(&json).unwrap_err();
        assert!(matches!(err, LlmError::Transport { ref detail, .. } if detail == "quota exceeded"));
    }

    #[test]
    fn parse_completion_flags_missing_field() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_completion(&json).unwrap_err(),
            LlmError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn disabled_chat_always_fails() {
        let request = ChatRequest {
            system: String::new(),
            messages: vec![],
            temperature: 0.7,
            max_tokens: 16,
        };
        let err = DisabledChat.complete(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::Transport { status: None, .. }));
    }
}
