//! Concrete games shipped with the engine.

mod greeting;

pub use greeting::{GreetingGame, GreetingScorer, GREETING_PREFIX, KEY_SUCCESS, KEY_SUCCESS_PER_TURN};
