//! Configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
#[cfg(feature = "http")]
use std::sync::Arc;
#[cfg(feature = "http")]
use std::time::Duration;

#[cfg(feature = "http")]
use crate::llm::ChatModel;

pub const CONFIG_FILE: &str = ".qag.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/qag/
///
/// Returns the path if found, None otherwise.
pub fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("qag").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

// ============================================================================
// Run Configuration (.qag.toml)
// ============================================================================

/// Top-level configuration (from .qag.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QagConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Which wire protocol the completion service speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    OpenAi,
    Ollama,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => anyhow::bail!("unknown backend {:?} (expected openai or ollama)", other),
        }
    }
}

/// LLM configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: Backend,
    /// Service URL; the backend default applies when absent
    pub url: Option<String>,
    /// Model name; the first model the service lists is used when absent
    pub model: Option<String>,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Dataset locations
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

/// Batch execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Examples processed at once; 1 means sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Answer-phase passes allowed per question; unbounded when absent
    pub max_answer_attempts: Option<usize>,
}

// Default value functions
fn default_api_key() -> String {
    "EMPTY".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_data_path() -> String {
    "data/contexts.jsonl".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_concurrency() -> usize {
    1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: None,
            model: None,
            api_key: default_api_key(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_answer_attempts: None,
        }
    }
}

impl LlmConfig {
    /// Service URL, falling back to the backend's local default
    pub fn resolved_url(&self) -> String {
        match (&self.url, self.backend) {
            (Some(url), _) => url.clone(),
            (None, Backend::OpenAi) => "http://localhost:8000".to_string(),
            (None, Backend::Ollama) => "http://localhost:11434".to_string(),
        }
    }

    /// API key with `$VAR` / `${VAR}` references expanded
    pub fn resolved_api_key(&self) -> Result<String> {
        let expanded = shellexpand::env(&self.api_key)
            .with_context(|| format!("failed to expand api_key {:?}", self.api_key))?;
        Ok(expanded.into_owned())
    }

    /// Model name, asking the service when none is configured
    #[cfg(feature = "http")]
    pub async fn resolve_model(&self) -> Result<String> {
        if let Some(model) = self.model.as_deref().filter(|m| !m.trim().is_empty()) {
            return Ok(model.to_string());
        }

        let url = self.resolved_url();
        let first = match self.backend {
            Backend::OpenAi => crate::llm::list_openai_models(&url, &self.resolved_api_key()?)
                .await
                .with_context(|| format!("failed to list models at {}", url))?
                .into_iter()
                .next(),
            Backend::Ollama => crate::llm::list_ollama_models(&url)
                .await
                .with_context(|| format!("failed to list models at {}", url))?
                .into_iter()
                .next()
                .map(|m| m.name),
        };

        let model = first.with_context(|| format!("no models served at {}", url))?;
        tracing::info!("Using model: {}", model);
        Ok(model)
    }

    /// Build the configured chat backend
    #[cfg(feature = "http")]
    pub async fn build_model(&self) -> Result<Arc<dyn ChatModel>> {
        let model = self.resolve_model().await?;
        let url = self.resolved_url();
        let timeout = Duration::from_secs(self.timeout_secs);

        let client: Arc<dyn ChatModel> = match self.backend {
            Backend::OpenAi => Arc::new(
                crate::llm::OpenAiClient::new(&url, &model)
                    .with_api_key(self.resolved_api_key()?)
                    .with_temperature(self.temperature)
                    .with_timeout(timeout),
            ),
            Backend::Ollama => Arc::new(
                crate::llm::OllamaClient::new(&url, &model)
                    .with_temperature(self.temperature)
                    .with_timeout(timeout),
            ),
        };
        Ok(client)
    }
}

impl DataConfig {
    /// Input path with `~` and environment references expanded
    pub fn data_path(&self) -> Result<PathBuf> {
        expand_path(&self.data_path)
    }

    /// Output directory with `~` and environment references expanded
    pub fn output_dir(&self) -> Result<PathBuf> {
        expand_path(&self.output_dir)
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("failed to expand path {:?}", raw))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

impl QagConfig {
    /// Load config from .qag.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .qag.toml
    /// 2. Check ~/.config/qag/.qag.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: QagConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = QagConfig::default();

        assert_eq!(config.llm.backend, Backend::OpenAi);
        assert_eq!(config.llm.api_key, "EMPTY");
        assert_eq!(config.llm.temperature, 0.8);
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.llm.resolved_url(), "http://localhost:8000");
        assert_eq!(config.run.concurrency, 1);
        assert!(config.run.max_answer_attempts.is_none());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
backend = "ollama"
model = "qwen2.5:14b"
temperature = 0.2

[data]
data_path = "contexts.jsonl"

[run]
concurrency = 4
max_answer_attempts = 5
"#
        )
        .unwrap();

        let config = QagConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.llm.backend, Backend::Ollama);
        assert_eq!(config.llm.model.as_deref(), Some("qwen2.5:14b"));
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.resolved_url(), "http://localhost:11434");
        assert_eq!(config.data.data_path, "contexts.jsonl");
        assert_eq!(config.data.output_dir, "output");
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.run.max_answer_attempts, Some(5));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm\nbackend = ").unwrap();

        assert!(QagConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_api_key_expansion() {
        std::env::set_var("QAG_TEST_API_KEY", "sk-test");
        let config = LlmConfig {
            api_key: "${QAG_TEST_API_KEY}".to_string(),
            ..LlmConfig::default()
        };

        assert_eq!(config.resolved_api_key().unwrap(), "sk-test");
        assert_eq!(LlmConfig::default().resolved_api_key().unwrap(), "EMPTY");
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("OpenAI".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert_eq!("ollama".parse::<Backend>().unwrap(), Backend::Ollama);
        assert!("vertex".parse::<Backend>().is_err());
    }
}
