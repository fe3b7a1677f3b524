//! The capability set a concrete game supplies to the game master.

mod context;
mod instance;

pub use context::EpisodeContext;
pub use instance::GameInstance;

use crate::{
    error::GameError,
    participant::ParticipantName,
    scoring::{Scorer, StandardScorer},
    validation::Verdict,
};

/// Lifecycle hooks of a concrete game.
///
/// Outcome state lives in the implementing value. Every hook has a default,
/// so a game only overrides what it needs.
pub trait Game: Send {
    /// Name used for the transcript and the results directory.
    fn name(&self) -> &str;

    /// Runs once before turn 0, typically to queue the initial prompt.
    fn setup(&mut self, _ctx: &mut EpisodeContext) -> Result<(), GameError> {
        Ok(())
    }

    /// Number of turns the default [`should_continue`](Game::should_continue) allows.
    fn turn_budget(&self) -> usize {
        1
    }

    /// Evaluated before the episode, before each dispatch and after each turn.
    fn should_continue(&self, ctx: &EpisodeContext) -> bool {
        ctx.turn_index() < self.turn_budget()
    }

    /// Order in which participants act during a turn.
    fn turn_order(&self, ctx: &EpisodeContext) -> Vec<ParticipantName> {
        ctx.participants()
    }

    fn before_turn(&mut self, _turn: usize, _ctx: &mut EpisodeContext) -> Result<(), GameError> {
        Ok(())
    }

    /// Conventional place to update and log per-turn outcome state.
    fn after_turn(&mut self, _turn: usize, _ctx: &mut EpisodeContext) -> Result<(), GameError> {
        Ok(())
    }

    /// Form and content checks of an utterance. Failure bookkeeping happens here too.
    fn validate(
        &mut self,
        _participant: &ParticipantName,
        _utterance: &str,
        _ctx: &mut EpisodeContext,
    ) -> Verdict {
        Verdict::Accept
    }

    /// Fires once the participant's utterance was accepted for the exchange.
    fn on_accepted(
        &mut self,
        _participant: &ParticipantName,
        _utterance: &str,
        _ctx: &mut EpisodeContext,
    ) -> Result<(), GameError> {
        Ok(())
    }

    /// Whether a rejected utterance is asked again. The game bounds its own retries.
    fn should_reprompt(&self, _participant: &ParticipantName, _ctx: &EpisodeContext) -> bool {
        false
    }

    /// Runs before a reprompt, typically to queue feedback for the participant.
    fn before_reprompt(
        &mut self,
        _participant: &ParticipantName,
        _ctx: &mut EpisodeContext,
    ) -> Result<(), GameError> {
        Ok(())
    }

    fn scorer(&self) -> &dyn Scorer {
        &StandardScorer
    }
}
