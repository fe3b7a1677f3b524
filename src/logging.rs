//! Logger initialisation for binaries and tests embedding the engine.

use crate::config::EngineConfig;

/// Initialises `env_logger`, honouring `RUST_LOG` over `default_filter`.
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn init_logging(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Initialises logging with the configured `log_level` as the default filter.
pub fn init_logging_from(config: &EngineConfig) {
    init_logging(&config.log_level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_becomes_the_default_filter() {
        let config = EngineConfig::from_toml_str("log_level = \"debug\"").expect("config");
        init_logging_from(&config);
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(log::max_level(), log::LevelFilter::Debug);
        }
    }
}
