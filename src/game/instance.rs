use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GameError;

/// Parameter bundle for one play-through. Read-only once bound to an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInstance {
    #[serde(alias = "game_id")]
    pub id: u64,
    /// Rendered initial prompt.
    pub prompt: String,
    /// Game-specific named parameters.
    #[serde(default, deserialize_with = "unique_params")]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl GameInstance {
    pub fn new(id: u64, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Parses an instance; duplicate parameter keys and an empty prompt are rejected.
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let instance: GameInstance =
            serde_json::from_str(json).map_err(|err| GameError::InvalidInstance(err.to_string()))?;
        instance.validate()?;
        Ok(instance)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.prompt.trim().is_empty() {
            return Err(GameError::InvalidInstance(format!(
                "instance {} has an empty prompt",
                self.id
            )));
        }
        Ok(())
    }

    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(serde_json::Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, GameError> {
        self.param_str(key).ok_or_else(|| {
            GameError::InvalidInstance(format!(
                "instance {} misses string parameter '{key}'",
                self.id
            ))
        })
    }
}

fn unique_params<'de, D>(deserializer: D) -> Result<BTreeMap<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueKeys;

    impl<'de> Visitor<'de> for UniqueKeys {
        type Value = BTreeMap<String, serde_json::Value>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of parameters with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut params = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                if params.contains_key(&key) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate parameter '{key}'"
                    )));
                }
                params.insert(key, value);
            }
            Ok(params)
        }
    }

    deserializer.deserialize_map(UniqueKeys)
}
