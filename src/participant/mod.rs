//! Participants of an episode and the registry holding them.

mod player;
mod registry;

pub use player::{Participant, ParticipantName, GAME_MASTER};
pub use registry::ParticipantRegistry;
