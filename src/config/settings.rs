use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_analysis_function")]
    pub analysis_function: String,
    #[serde(default = "default_report_function")]
    pub report_function: String,
    /// Reads a stored analysis by document id.
    #[serde(default = "default_analysis_fetch_function")]
    pub analysis_fetch_function: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// Characters of document text sent to the model.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_bucket() -> String {
    "contracts".to_string()
}

fn default_analysis_function() -> String {
    "process_document".to_string()
}

fn default_report_function() -> String {
    "generate_report".to_string()
}

fn default_analysis_fetch_function() -> String {
    "analysis".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_chars() -> usize {
    12_000
}

fn default_true() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            bucket: default_bucket(),
            analysis_function: default_analysis_function(),
            report_function: default_report_function(),
            analysis_fetch_function: default_analysis_fetch_function(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            model: default_model(),
            base_url: None,
            max_chars: default_max_chars(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            enabled: true,
        }
    }
}

impl BackendConfig {
    /// Service URL, trailing slash stripped. Falls back to `SUPABASE_URL`.
    pub fn resolved_url(&self) -> Option<String> {
        self.url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| std::env::var("SUPABASE_URL").ok())
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
    }

    pub fn resolved_anon_key(&self) -> Option<String> {
        self.anon_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("SUPABASE_ANON_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

impl LlmConfig {
    /// Environment variable holding the key for the configured provider.
    pub fn api_key_var(&self) -> &'static str {
        match self.provider {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key_from(|var| std::env::var(var).ok())
    }

    /// Configured key, else whatever `lookup` returns for [`api_key_var`](Self::api_key_var).
    pub fn api_key_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| lookup(self.api_key_var()))
            .filter(|k| !k.is_empty())
    }

    pub fn resolved_base_url(&self) -> String {
        let url = self.base_url.clone().unwrap_or_else(|| match self.provider {
            LlmProvider::OpenAi => "https://api.openai.com".to_string(),
            LlmProvider::Anthropic => "https://api.anthropic.com".to_string(),
        });
        url.trim_end_matches('/').to_string()
    }
}

pub fn lexdesk_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LEXDESK_HOME") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".lexdesk")
}

pub fn db_path() -> PathBuf {
    lexdesk_dir().join("lexdesk.db")
}

pub fn config_path() -> PathBuf {
    lexdesk_dir().join("config.toml")
}

pub fn env_file() -> PathBuf {
    lexdesk_dir().join("env")
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped.
pub fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

pub fn load_env_file() {
    let path = env_file();
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return,
    };
    for (key, value) in parse_env_lines(&content) {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse config.toml")
}

pub fn load_config() -> Result<Config> {
    load_env_file();
    let path = config_path();
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&content)
}

pub fn ensure_lexdesk_dir() -> Result<()> {
    let dir = lexdesk_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}
