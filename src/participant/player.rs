//! Participant types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    chat::ChatMessage,
    error::GameError,
    generator::ResponseGenerator,
};

/// Slot name of the game master in transcripts.
pub const GAME_MASTER: &str = "GM";

/// Stable name of a participant, e.g. "Player 1".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantName(String);

impl ParticipantName {
    pub fn new(name: impl Into<String>) -> Result<Self, GameError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GameError::InvalidParticipant(
                "participant name cannot be empty".to_string(),
            ));
        }
        if name == GAME_MASTER {
            return Err(GameError::InvalidParticipant(format!(
                "'{GAME_MASTER}' is reserved for the game master"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantName {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantName> for String {
    fn from(name: ParticipantName) -> Self {
        name.0
    }
}

impl Borrow<str> for ParticipantName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named actor of an episode, bound to a single generator.
pub struct Participant {
    name: ParticipantName,
    descriptor: String,
    generator: Box<dyn ResponseGenerator>,
    history: Vec<ChatMessage>,
    pending: Vec<String>,
    last_prompt: Option<String>,
}

impl Participant {
    /// Creates a participant; the descriptor defaults to the generator's description.
    pub fn new(
        name: impl Into<String>,
        generator: Box<dyn ResponseGenerator>,
    ) -> Result<Self, GameError> {
        let descriptor = generator.describe();
        Ok(Self {
            name: ParticipantName::new(name)?,
            descriptor,
            generator,
            history: Vec::new(),
            pending: Vec::new(),
            last_prompt: None,
        })
    }

    /// Sets the role label written to the players directory.
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    pub fn name(&self) -> &ParticipantName {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn generator(&self) -> &dyn ResponseGenerator {
        self.generator.as_ref()
    }

    /// Whether a prompt is queued for the next dispatch.
    pub fn has_pending_prompt(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn queue_prompt(&mut self, content: String) {
        self.pending.push(content);
    }

    /// Takes the queued prompt, joining multiple queued parts.
    ///
    /// Falls back to the previously sent prompt when `resend` is set and
    /// nothing new was queued.
    pub(crate) fn take_prompt(&mut self, resend: bool) -> Option<String> {
        if self.pending.is_empty() {
            return if resend { self.last_prompt.clone() } else { None };
        }
        let prompt = self.pending.drain(..).collect::<Vec<_>>().join("\n\n");
        self.last_prompt = Some(prompt.clone());
        Some(prompt)
    }

    pub(crate) fn push_history(&mut self, message: ChatMessage) {
        self.history.push(message);
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("generator", &"<dyn ResponseGenerator>")
            .field("history_len", &self.history.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
