use crate::{chat::ChatMessage, error::GameError};

use super::player::{Participant, ParticipantName};

/// Ordered participants of one episode.
///
/// Registration order is the default prompting order of a turn.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant under its unique name.
    pub fn register(&mut self, participant: Participant) -> Result<(), GameError> {
        if self.contains(participant.name().as_str()) {
            return Err(GameError::DuplicateParticipant(
                participant.name().to_string(),
            ));
        }
        log::debug!(
            "registered participant {} ({})",
            participant.name(),
            participant.descriptor()
        );
        self.participants.push(participant);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name().as_str() == name)
    }

    /// Retrieves a participant by name.
    pub fn get(&self, name: &str) -> Result<&Participant, GameError> {
        self.participants
            .iter()
            .find(|p| p.name().as_str() == name)
            .ok_or_else(|| GameError::UnknownParticipant(name.to_string()))
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Result<&mut Participant, GameError> {
        self.participants
            .iter_mut()
            .find(|p| p.name().as_str() == name)
            .ok_or_else(|| GameError::UnknownParticipant(name.to_string()))
    }

    /// Message history of a participant, for composing its next prompt.
    pub fn history_of(&self, name: &str) -> Result<&[ChatMessage], GameError> {
        Ok(self.get(name)?.history())
    }

    /// Participant names in registration order.
    pub fn names(&self) -> Vec<ParticipantName> {
        self.participants.iter().map(|p| p.name().clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
