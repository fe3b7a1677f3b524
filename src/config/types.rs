use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilient_generator::ResilienceConfig;

use super::ConfigError;

const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CONCURRENCY: usize = 1;
const DEFAULT_RESULTS_DIR: &str = "results";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for a single generator call.
    pub generation_timeout_secs: u64,
    /// Engine-level reprompt cap per exchange; unset leaves the bound to the game.
    pub max_reprompts: Option<usize>,
    /// Episodes played at the same time by the runner.
    pub concurrency: usize,
    pub results_dir: PathBuf,
    /// Default log filter, one of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
    pub participants: Vec<ParticipantConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            max_reprompts: None,
            concurrency: DEFAULT_CONCURRENCY,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            participants: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Parsed `log_level`.
    pub fn log_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log_level.parse().map_err(|_| {
            ConfigError::Invalid(format!("unknown log_level '{}'", self.log_level))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "generation_timeout_secs must be positive".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        self.log_filter()?;
        for participant in &self.participants {
            if let Some(resilience) = &participant.resilience {
                if resilience.max_attempts == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "participant '{}' needs at least one attempt",
                        participant.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One participant slot and the generator behind it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParticipantConfig {
    pub name: String,
    /// Role label for the players directory; defaults to the generator's description.
    #[serde(default)]
    pub descriptor: Option<String>,
    pub backend: BackendConfig,
    /// Retry settings for model-backed generators.
    #[serde(default)]
    pub resilience: Option<ResilienceConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// OpenAI-compatible chat completions endpoint.
    OpenaiCompatible {
        base_url: String,
        model: String,
        /// Environment variable holding the API key.
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        system: Option<String>,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        timeout_seconds: Option<u64>,
    },
    /// Programmatic participant answering with a constant.
    Fixed { response: String },
    /// Programmatic participant replaying a script.
    Scripted { responses: Vec<String> },
}
