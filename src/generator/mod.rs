//! Response generators backing the participants of an episode.
//!
//! Every participant owns exactly one [`ResponseGenerator`]. The engine does
//! not care whether it talks to a model-serving backend over HTTP
//! ([`HttpGenerator`]) or answers from a fixed script ([`ProgrammedGenerator`]).

mod http;
mod programmed;

use async_trait::async_trait;

use crate::{chat::ChatMessage, error::BackendError};

pub use http::{HttpGenerator, HttpGeneratorConfig};
pub use programmed::ProgrammedGenerator;

/// Produces the next utterance of one participant from its message history.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generates the next utterance for the given history.
    ///
    /// The last message of `history` is the prompt that was just sent by
    /// the game master.
    async fn generate(&self, history: &[ChatMessage]) -> Result<String, BackendError>;

    /// Human readable description used in the players directory of the transcript.
    fn describe(&self) -> String;
}
