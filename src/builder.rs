//! Builds participants and their generators from configuration.

use secrecy::SecretString;

use crate::{
    config::{BackendConfig, ConfigError, ParticipantConfig},
    error::GameError,
    generator::{HttpGenerator, HttpGeneratorConfig, ProgrammedGenerator, ResponseGenerator},
    participant::Participant,
    resilient_generator::{ResilienceConfig, ResilientGenerator},
};

/// Creates the generator described by `backend`.
///
/// Model-backed generators are wrapped in retry logic when `resilience` is set;
/// programmatic ones never fail and are returned as is.
pub fn build_generator(
    backend: &BackendConfig,
    resilience: Option<&ResilienceConfig>,
) -> Result<Box<dyn ResponseGenerator>, GameError> {
    match backend {
        BackendConfig::OpenaiCompatible {
            base_url,
            model,
            api_key_env,
            system,
            temperature,
            max_tokens,
            timeout_seconds,
        } => {
            let mut config = HttpGeneratorConfig::new(base_url.clone(), model.clone());
            config.api_key = api_key_env.as_deref().map(api_key_from_env).transpose()?;
            config.system = system.clone();
            config.temperature = *temperature;
            config.max_tokens = *max_tokens;
            config.timeout_seconds = *timeout_seconds;

            let generator = HttpGenerator::new(config).map_err(|err| {
                ConfigError::Invalid(format!("cannot create client for {model}: {err}"))
            })?;
            Ok(wrap_with_resilience(Box::new(generator), resilience))
        }
        BackendConfig::Fixed { response } => Ok(Box::new(ProgrammedGenerator::fixed(response.clone()))),
        BackendConfig::Scripted { responses } => {
            Ok(Box::new(ProgrammedGenerator::scripted(responses.iter().cloned())))
        }
    }
}

pub fn build_participant(config: &ParticipantConfig) -> Result<Participant, GameError> {
    let generator = build_generator(&config.backend, config.resilience.as_ref())?;
    let participant = Participant::new(config.name.clone(), generator)?;
    Ok(match &config.descriptor {
        Some(descriptor) => participant.with_descriptor(descriptor.clone()),
        None => participant,
    })
}

/// Builds all configured participants in order.
pub fn build_participants(configs: &[ParticipantConfig]) -> Result<Vec<Participant>, GameError> {
    configs.iter().map(build_participant).collect()
}

fn wrap_with_resilience(
    generator: Box<dyn ResponseGenerator>,
    resilience: Option<&ResilienceConfig>,
) -> Box<dyn ResponseGenerator> {
    match resilience {
        Some(cfg) => Box::new(ResilientGenerator::new(generator, cfg.clone())),
        None => generator,
    }
}

fn api_key_from_env(var: &str) -> Result<SecretString, GameError> {
    let value = std::env::var(var).map_err(|_| {
        ConfigError::Invalid(format!("environment variable {var} is not set"))
    })?;
    Ok(SecretString::new(value))
}
