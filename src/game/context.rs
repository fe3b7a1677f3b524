use serde::Serialize;

use crate::{
    chat::ChatMessage,
    error::GameError,
    participant::{ParticipantName, ParticipantRegistry},
    transcript::TranscriptRecorder,
};

use super::instance::GameInstance;

/// Typed state of one episode, owned by the game master and handed to the
/// game's hooks. Dropped when the episode ends.
#[derive(Debug)]
pub struct EpisodeContext {
    pub(crate) instance: GameInstance,
    pub(crate) registry: ParticipantRegistry,
    pub(crate) recorder: TranscriptRecorder,
    pub(crate) turn_index: usize,
}

impl EpisodeContext {
    pub(crate) fn new(game: &str, instance: GameInstance) -> Self {
        Self {
            instance,
            registry: ParticipantRegistry::new(),
            recorder: TranscriptRecorder::new(game),
            turn_index: 0,
        }
    }

    pub fn instance(&self) -> &GameInstance {
        &self.instance
    }

    /// Index of the current turn; the number of completed turns between turns.
    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    /// Participant names in registration order.
    pub fn participants(&self) -> Vec<ParticipantName> {
        self.registry.names()
    }

    pub fn history_of(&self, name: &str) -> Result<&[ChatMessage], GameError> {
        self.registry.history_of(name)
    }

    /// Queues a game-master message for the participant's next dispatch.
    pub fn add_user_message(
        &mut self,
        name: &str,
        content: impl Into<String>,
    ) -> Result<(), GameError> {
        self.registry.get_mut(name)?.queue_prompt(content.into());
        Ok(())
    }

    pub fn has_pending_prompt(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .map(|p| p.has_pending_prompt())
            .unwrap_or(false)
    }

    /// Logs an episode-level value into the interaction log.
    pub fn log_key(&mut self, key: &str, value: impl Serialize) -> Result<(), GameError> {
        self.recorder.log_key(key, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn logged(&self, key: &str) -> Option<&serde_json::Value> {
        self.recorder.keys().get(key)
    }
}
