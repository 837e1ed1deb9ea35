//! Configuration loading: a single JSON file, overridable by `MARCUS_`-prefixed
//! environment variables, using the `config` crate's usual layering (default
//! source, then file, then env).

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Planka,
    Github,
    Linear,
    #[serde(rename = "in_memory")]
    InMemory,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub board_id: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub project_number: Option<u32>,
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AiConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssignmentConfig {
    pub stale_ttl_seconds: i64,
    pub stale_check_seconds: u64,
    pub assignment_retry_limit: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ToolDispatcherConfig {
    pub deadline_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReconciliationConfig {
    pub push_retry_interval_seconds: u64,
    pub push_retry_limit: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    #[serde(default)]
    pub provider_config: ProviderConfig,
    pub ai: AiConfig,
    pub assignment: AssignmentConfig,
    pub tool_dispatcher: ToolDispatcherConfig,
    pub reconciliation: ReconciliationConfig,
    pub logging: LoggingConfig,
    /// If true, an unreachable provider at startup is a fatal error (exit
    /// code 69) rather than a warning; the server otherwise starts and lets
    /// the first `refresh_project_state` surface the outage.
    #[serde(default)]
    pub require_provider_on_start: bool,
}

impl Config {
    /// Load configuration from the bundled default, an optional file named
    /// by `CONFIG_FILE`, then `MARCUS_`-prefixed environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder().add_source(File::from_str(
            include_str!("../config/default.json"),
            FileFormat::Json,
        ));

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false).format(FileFormat::Json));
        }

        builder = builder.add_source(Environment::with_prefix("MARCUS").separator("_").try_parsing(true));

        let config = builder.build().context("failed to build configuration")?;
        let result: Config = config.try_deserialize().context("failed to deserialize configuration")?;
        Ok(result)
    }

    /// Load configuration from a specific file path, still honoring
    /// `MARCUS_`-prefixed env overrides on top of it.
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::from_str(
                include_str!("../config/default.json"),
                FileFormat::Json,
            ))
            .add_source(File::with_name(path).format(FileFormat::Json))
            .add_source(Environment::with_prefix("MARCUS").separator("_").try_parsing(true));

        let config = builder.build().context("failed to build configuration from file")?;
        config.try_deserialize().context("failed to deserialize configuration from file")
    }

    /// Validate the configuration's provider/ai/assignment/logging shape.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(anyhow::anyhow!(
                    "invalid log level: {other}. must be one of: trace, debug, info, warn, error"
                ));
            }
        }

        if self.assignment.stale_ttl_seconds <= 0 {
            return Err(anyhow::anyhow!("assignment.stale_ttl_seconds must be positive"));
        }
        if self.assignment.stale_check_seconds == 0 {
            return Err(anyhow::anyhow!("assignment.stale_check_seconds must be greater than 0"));
        }
        if self.tool_dispatcher.deadline_ms == 0 {
            return Err(anyhow::anyhow!("tool_dispatcher.deadline_ms must be greater than 0"));
        }
        if self.reconciliation.push_retry_interval_seconds == 0 {
            return Err(anyhow::anyhow!("reconciliation.push_retry_interval_seconds must be greater than 0"));
        }
        if self.reconciliation.push_retry_limit == 0 {
            return Err(anyhow::anyhow!("reconciliation.push_retry_limit must be greater than 0"));
        }

        match self.provider {
            ProviderKind::Planka => {
                if self.provider_config.base_url.is_none() || self.provider_config.board_id.is_none() {
                    return Err(anyhow::anyhow!("planka provider requires base_url and board_id"));
                }
            }
            ProviderKind::Github => {
                if self.provider_config.owner.is_none() || self.provider_config.repo.is_none() {
                    return Err(anyhow::anyhow!("github provider requires owner and repo"));
                }
            }
            ProviderKind::Linear => {
                if self.provider_config.team_id.is_none() {
                    return Err(anyhow::anyhow!("linear provider requires team_id"));
                }
            }
            ProviderKind::InMemory => {}
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::InMemory,
            provider_config: ProviderConfig::default(),
            ai: AiConfig {
                enabled: false,
                timeout_ms: 5_000,
                api_key_env: "MARCUS_AI_API_KEY".to_string(),
            },
            assignment: AssignmentConfig {
                stale_ttl_seconds: 300,
                stale_check_seconds: 60,
                assignment_retry_limit: 3,
            },
            tool_dispatcher: ToolDispatcherConfig { deadline_ms: 30_000 },
            reconciliation: ReconciliationConfig {
                push_retry_interval_seconds: 30,
                push_retry_limit: 5,
            },
            logging: LoggingConfig {
                directory: None,
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            require_provider_on_start: false,
        }
    }
}
