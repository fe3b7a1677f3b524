//! Generator backed by an OpenAI-compatible chat completions endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{
    chat::{ChatMessage, ChatRole},
    error::BackendError,
};

use super::ResponseGenerator;

/// Configuration for the HTTP generator.
#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Bearer token sent with every request.
    pub api_key: Option<SecretString>,
    /// System prompt prepended to every request.
    pub system: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate in responses.
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

impl HttpGeneratorConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            system: None,
            temperature: None,
            max_tokens: None,
            timeout_seconds: None,
        }
    }
}

/// Client for a model-serving backend speaking the chat completions protocol.
///
/// The client uses `Arc` internally for configuration, making cloning cheap.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    config: Arc<HttpGeneratorConfig>,
    client: Client,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize, Debug)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(sec) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(sec));
        }
        Ok(Self::with_client(builder.build()?, config))
    }

    /// Creates a new generator with a custom HTTP client.
    pub fn with_client(client: Client, config: HttpGeneratorConfig) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn wire_messages<'a>(&'a self, history: &'a [ChatMessage]) -> Vec<WireMessage<'a>> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(system) = &self.config.system {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(history.iter().map(|m| WireMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: &m.content,
        }));
        messages
    }
}

#[async_trait]
impl ResponseGenerator for HttpGenerator {
    async fn generate(&self, history: &[ChatMessage]) -> Result<String, BackendError> {
        let body = WireChatRequest {
            model: &self.config.model,
            messages: self.wire_messages(history),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("chat completions payload: {json}");
            }
        }

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        if let Some(timeout) = self.config.timeout_seconds {
            request = request.timeout(Duration::from_secs(timeout));
        }

        let resp = request.send().await?;
        let status = resp.status();
        log::debug!("{} HTTP status: {status}", self.config.model);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Auth(format!("{status} from {}", self.endpoint())));
        }
        let raw = resp.text().await?;
        if !status.is_success() {
            return Err(BackendError::Provider(format!("{status}: {raw}")));
        }

        let parsed: WireChatResponse =
            serde_json::from_str(&raw).map_err(|err| BackendError::ResponseFormat {
                message: err.to_string(),
                raw_response: raw.clone(),
            })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::ResponseFormat {
                message: "no message content in first choice".to_string(),
                raw_response: raw,
            })
    }

    fn describe(&self) -> String {
        format!("model-backed ({})", self.config.model)
    }
}
