//! Engine configuration loaded from TOML.

mod error;
mod load;
mod types;

pub use error::ConfigError;
pub use load::load_config;
pub use types::{BackendConfig, EngineConfig, ParticipantConfig};
