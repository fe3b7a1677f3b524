//! Episode events for observing a running game master.

use crate::transcript::EpisodeStatus;

/// Events emitted while an episode is played.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeEvent {
    /// The first turn is about to start.
    Started {
        /// Name of the game.
        game: String,
        /// Id of the game instance.
        instance_id: u64,
    },

    /// A new turn is starting.
    TurnStarted {
        /// Index of the turn.
        turn: usize,
    },

    /// A prompt was sent to a participant.
    Prompted {
        /// Name of the participant.
        participant: String,
        /// Whether this is a reprompt within the same exchange.
        reprompt: bool,
    },

    /// A participant's utterance was rejected by the game.
    ResponseRejected {
        /// Name of the participant.
        participant: String,
        /// Reason given by the validation.
        reason: String,
        /// Whether the game asked for another attempt.
        will_reprompt: bool,
    },

    /// A turn has completed.
    TurnCompleted {
        /// Index of the turn.
        turn: usize,
    },

    /// The episode reached its terminal state.
    Finished {
        /// How the episode ended.
        status: EpisodeStatus,
    },
}
