use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Owner scope for every store operation. Authentication is out of scope;
/// the CLI acts as one configured user.
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
        }
    }
}

fn default_owner() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_base: default_llm_api_base(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4".to_string()
}
fn default_llm_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Full URL of the extraction service (`.../api/process-file`). Binary
    /// imports fail with a configuration error when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_extraction_retries")]
    pub max_retries: u32,
    /// Upload size limit in bytes (payloads are base64-encoded in full).
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    /// External OCR command used by the server for image uploads
    /// (e.g. `"tesseract"`). Images fail with a clear message when unset.
    #[serde(default)]
    pub ocr_command: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_extraction_retries(),
            max_file_bytes: default_max_file_bytes(),
            ocr_command: None,
        }
    }
}

fn default_extraction_retries() -> u32 {
    2
}
fn default_max_file_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    match config.llm.provider.as_str() {
        "openai" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or disabled.",
            other
        ),
    }

    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    if config.extraction.timeout_secs == 0 {
        anyhow::bail!("extraction.timeout_secs must be > 0");
    }

    if config.extraction.max_file_bytes == 0 {
        anyhow::bail!("extraction.max_file_bytes must be > 0");
    }

    if let Some(ref endpoint) = config.extraction.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            anyhow::bail!(
                "extraction.endpoint must be an http(s) URL, got '{}'",
                endpoint
            );
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let file = write_config("[db]\npath = \"data/noteflow.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.user.owner, "local");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.extraction.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(config.server.bind, "127.0.0.1:7878");
        assert!(config.extraction.endpoint.is_none());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let file = write_config("[db]\npath = \"x.sqlite\"\n[llm]\nprovider = \"claude\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let file = write_config(
            "[db]\npath = \"x.sqlite\"\n[extraction]\nendpoint = \"file:///etc/passwd\"\n",
        );
        assert!(load_config(file.path()).is_err());
    }
}
