//! Application configuration
//!
//! Config is resolved in three layers:
//! 1. Embedded defaults (compiled into binary)
//! 2. A TOML file: `--config <path>`, else ~/.local/share/expensewise/config.toml
//! 3. Environment variables (`OLLAMA_HOST`, `OLLAMA_MODEL`, `OLLAMA_CLOUD_URL`,
//!    `EXPENSEWISE_RATE_LIMIT`, `EXPENSEWISE_RATES_FILE`)
//!
//! Keys missing from the file keep their default values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub ollama: OllamaConfig,
    pub providers: ProviderConfig,
    pub agent: AgentConfig,
    pub currency: CurrencyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins allowed to call the API (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

/// Fixed-window limits for the chat endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_secs: u64,
    pub max_entries: usize,
    /// Key callers by the first `X-Forwarded-For` hop (only behind a proxy
    /// that sets it)
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            window_secs: 60,
            max_entries: 1000,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Local Ollama server
    pub host: String,
    /// Model used when a request names none
    pub model: String,
    /// Hosted Ollama endpoint
    pub cloud_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            cloud_url: "https://ollama.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub openai_url: String,
    pub openai_model: String,
    pub anthropic_url: String,
    pub anthropic_model: String,
    /// Per-request timeout for every provider
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_url: "https://api.openai.com".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            anthropic_url: "https://api.anthropic.com".to_string(),
            anthropic_model: "claude-3-5-haiku-latest".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_iterations: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Exchange-rate snapshot replacing the embedded one
    pub rates_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load config from an explicit path or the default location, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::parse(DEFAULT_CONFIG)?,
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("OLLAMA_HOST") {
            self.ollama.host = normalize_host(&host);
        }
        if let Some(model) = var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(url) = var("OLLAMA_CLOUD_URL") {
            self.ollama.cloud_url = url.trim_end_matches('/').to_string();
        }
        if let Some(limit) = var("EXPENSEWISE_RATE_LIMIT") {
            self.rate_limit.requests = limit.trim().parse().map_err(|_| {
                Error::Config(format!("EXPENSEWISE_RATE_LIMIT must be a number, got '{}'", limit))
            })?;
        }
        if let Some(path) = var("EXPENSEWISE_RATES_FILE") {
            self.currency.rates_file = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("expensewise").join("config.toml"))
}

/// Default database path
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("expensewise")
        .join("expensewise.db")
}

/// `OLLAMA_HOST` is often set as a bare `host:port`
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_matches_defaults() {
        let config = AppConfig::embedded().unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rate_limit.requests, 10);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert!(!config.rate_limit.trust_forwarded_for);
        assert_eq!(config.agent.max_iterations, 5);
        assert!(config.currency.rates_file.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::parse("[server]\nport = 8080\n[ollama]\nmodel = \"qwen2.5\"\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.ollama.model, "qwen2.5");
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(AppConfig::parse("[server\nport ="), Err(Error::Toml(_))));
        assert!(AppConfig::parse("[server]\nport = \"high\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("OLLAMA_HOST", "0.0.0.0:11434"),
            ("OLLAMA_MODEL", "mistral"),
            ("EXPENSEWISE_RATE_LIMIT", "25"),
            ("EXPENSEWISE_RATES_FILE", "/tmp/rates.json"),
            ("OLLAMA_CLOUD_URL", ""),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.ollama.host, "http://0.0.0.0:11434");
        assert_eq!(config.ollama.model, "mistral");
        assert_eq!(config.rate_limit.requests, 25);
        assert_eq!(config.currency.rates_file, Some(PathBuf::from("/tmp/rates.json")));
        // empty values are ignored
        assert_eq!(config.ollama.cloud_url, "https://ollama.com");
    }

    #[test]
    fn test_env_rate_limit_must_be_numeric() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "EXPENSEWISE_RATE_LIMIT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmax_iterations = 3\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.agent.max_iterations, 3);

        let missing = dir.path().join("nope.toml");
        assert!(matches!(AppConfig::load(Some(&missing)), Err(Error::Config(_))));
    }
}
