//! JSON Configuration Management
//!
//! Loads the agent configuration from a JSON file, writing defaults on first
//! run. The API key is never stored in the file; it is read from the
//! environment at provider construction time.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use triage_llm::ProviderConfig;

use crate::error::{AgentError, AgentResult};

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "TRIAGE_API_KEY";

/// Agent configuration, persisted as pretty-printed JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model used for the investigation loop
    pub model: String,
    /// Model used for the report extraction pass
    pub formatter_model: String,
    /// Override for the chat-completions endpoint, for OpenAI-compatible APIs
    pub base_url: Option<String>,
    /// Fixed HTTP request timeout, seconds
    pub timeout_secs: u64,
    /// Retry budget for transient provider errors
    pub max_retries: u32,
    /// Maximum reasoning rounds before the run is aborted
    pub max_rounds: u32,
    /// Consecutive identical tool calls tolerated before abort
    pub repeat_threshold: u32,
    /// Evidence database path; relative paths resolve against the cwd
    pub db_path: PathBuf,
    /// HTTP bind address for the webhook ingress
    pub bind_addr: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            formatter_model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout_secs: 60,
            max_retries: 3,
            max_rounds: 12,
            repeat_threshold: 3,
            db_path: PathBuf::from("evidence.db"),
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> AgentResult<()> {
        if self.model.trim().is_empty() || self.formatter_model.trim().is_empty() {
            return Err(AgentError::config("model names must not be empty"));
        }
        if self.max_rounds == 0 {
            return Err(AgentError::config("max_rounds must be at least 1"));
        }
        if self.repeat_threshold == 0 {
            return Err(AgentError::config("repeat_threshold must be at least 1"));
        }
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(AgentError::config(format!(
                "invalid bind address: {}",
                self.bind_addr
            )));
        }
        Ok(())
    }

    /// Provider config for the investigation model.
    pub fn investigator_provider(&self) -> ProviderConfig {
        self.provider_for(&self.model)
    }

    /// Provider config for the extraction model.
    pub fn formatter_provider(&self) -> ProviderConfig {
        self.provider_for(&self.formatter_model)
    }

    fn provider_for(&self, model: &str) -> ProviderConfig {
        ProviderConfig {
            model: model.to_string(),
            api_key: std::env::var(API_KEY_ENV).ok(),
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
            ..ProviderConfig::default()
        }
    }
}

/// Configuration service: load existing config or write defaults.
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AgentConfig,
}

impl ConfigService {
    /// Load from the default location (`$XDG_CONFIG_HOME/triage-agent/config.json`).
    pub fn new() -> AgentResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| AgentError::config("could not determine config directory"))?
            .join("triage-agent");
        fs::create_dir_all(&dir)?;
        Self::from_path(dir.join("config.json"))
    }

    /// Load from an explicit path, creating the file with defaults if absent.
    pub fn from_path(config_path: PathBuf) -> AgentResult<Self> {
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AgentConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    fn load_from_file(path: &Path) -> AgentResult<AgentConfig> {
        let content = fs::read_to_string(path)?;
        let config: AgentConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn save_to_file(path: &Path, config: &AgentConfig) -> AgentResult<()> {
        config.validate()?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AgentResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }
}
