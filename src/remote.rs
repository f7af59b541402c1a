//! Remote extraction service client.
//!
//! Binary container formats (docx, pdf) and images are not decoded locally:
//! the bytes are base64-encoded in full and forwarded to the extraction
//! service together with the filename and declared media type. The service
//! answers with `{title, content, source}` or an error carrying a
//! human-readable message.
//!
//! The HTTP client retries transient failures (5xx, network) with the same
//! backoff shape as the chat client; other non-success statuses fail
//! immediately so a malformed upload is not retried.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::extract::ExtractError;
use crate::models::ExtractionResult;

/// Trait for the extraction service consumed by the ingestion dispatcher.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Extract text from one file's bytes.
    async fn extract(
        &self,
        file_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<ExtractionResult, ExtractError>;
}

/// Wire request for `POST /api/process-file`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessFileRequest {
    file_data: String,
    file_name: String,
    file_type: String,
}

/// Wire response for `POST /api/process-file`.
#[derive(Debug, Deserialize)]
struct ProcessFileResponse {
    result: Option<ExtractionResult>,
}

/// Error body returned by the service on failure.
#[derive(Debug, Deserialize)]
struct ProcessFileError {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client for the extraction service endpoint.
pub struct HttpExtractionService {
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    max_file_bytes: usize,
}

impl HttpExtractionService {
    /// Build a client from configuration. Fails when no endpoint is
    /// configured, so binary imports report a configuration problem instead
    /// of a connection error.
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ExtractError::Remote(
                "no extraction endpoint configured; set [extraction].endpoint \
                 (e.g. http://127.0.0.1:7878/api/process-file) or run `nf serve`"
                    .to_string(),
            )
        })?;
        Ok(Self {
            endpoint,
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            max_file_bytes: config.max_file_bytes,
        })
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionService {
    async fn extract(
        &self,
        file_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<ExtractionResult, ExtractError> {
        if bytes.len() > self.max_file_bytes {
            return Err(ExtractError::Remote(format!(
                "file exceeds the {} byte upload limit ({} bytes)",
                self.max_file_bytes,
                bytes.len()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ExtractError::Remote(e.to_string()))?;

        let request = ProcessFileRequest {
            file_data: BASE64.encode(bytes),
            file_name: file_name.to_string(),
            file_type: media_type.to_string(),
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client.post(&self.endpoint).json(&request).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: ProcessFileResponse = response
                            .json()
                            .await
                            .map_err(|e| ExtractError::Remote(e.to_string()))?;
                        return parsed.result.ok_or_else(|| {
                            ExtractError::Remote(
                                "service response missing result field".to_string(),
                            )
                        });
                    }

                    if status.is_server_error() {
                        last_err = Some(ExtractError::Remote(format!(
                            "service error {}: {}",
                            status,
                            error_detail(response).await
                        )));
                        continue;
                    }

                    // 4xx: the upload itself is bad — don't retry
                    return Err(ExtractError::Remote(error_detail(response).await));
                }
                Err(e) => {
                    last_err = Some(ExtractError::Remote(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ExtractError::Remote("extraction failed after retries".to_string())))
    }
}

/// Sentinel used when no extraction endpoint is configured: every binary
/// file fails per-file with the configuration message while text formats
/// (which never reach the service) import normally.
pub struct UnconfiguredExtraction(pub String);

#[async_trait]
impl ExtractionService for UnconfiguredExtraction {
    async fn extract(
        &self,
        _file_name: &str,
        _media_type: &str,
        _bytes: &[u8],
    ) -> Result<ExtractionResult, ExtractError> {
        Err(ExtractError::Remote(self.0.clone()))
    }
}

/// Best-effort human-readable detail from an error response body.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ProcessFileError>().await {
        Ok(body) => body
            .message
            .or(body.error)
            .unwrap_or_else(|| format!("service returned {}", status)),
        Err(_) => format!("service returned {}", status),
    }
}
