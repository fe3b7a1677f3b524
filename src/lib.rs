//! Orchestration engine for scripted, turn-based dialogue games.
//!
//! A [`GameMaster`] plays one episode of a [`Game`] between registered
//! [`Participant`]s, each answering through a [`ResponseGenerator`]. Every
//! prompt and answer is recorded in an [`InteractionLog`] that can be
//! persisted with an [`EpisodeStore`] and rescored offline.
//!
//! ```no_run
//! use gamemaster::{GameInstance, GameMaster, GreetingGame, Participant, ProgrammedGenerator};
//!
//! # async fn play() -> Result<(), gamemaster::GameError> {
//! let instance = GameInstance::new(0, "Greet Peter.").with_param("target", "Peter".into());
//! let report = GameMaster::builder(GreetingGame::new(), instance)
//!     .participant(Participant::new(
//!         "Player 1",
//!         Box::new(ProgrammedGenerator::fixed("GREET: Hello Peter, welcome!")),
//!     )?)
//!     .participant(Participant::new("Player 2", Box::new(ProgrammedGenerator::fixed("Thanks!")))?)
//!     .build()?
//!     .play()
//!     .await;
//! println!("{:?}", report.scores);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod chat;
pub mod config;
pub mod error;
pub mod game;
pub mod games;
pub mod generator;
#[cfg(feature = "logging")]
pub mod logging;
pub mod master;
pub mod participant;
pub mod resilient_generator;
pub mod runner;
pub mod scoring;
pub mod transcript;
pub mod validation;

pub use builder::{build_generator, build_participant, build_participants};
pub use chat::{ChatMessage, ChatRole};
pub use config::{load_config, EngineConfig};
pub use error::{BackendError, GameError};
pub use game::{EpisodeContext, Game, GameInstance};
pub use games::GreetingGame;
pub use generator::{HttpGenerator, ProgrammedGenerator, ResponseGenerator};
pub use master::{EpisodeEvent, EpisodeReport, EpisodeState, GameMaster};
pub use participant::{Participant, ParticipantName, ParticipantRegistry};
pub use resilient_generator::{ResilienceConfig, ResilientGenerator};
pub use runner::EpisodeRunner;
pub use scoring::{score_episode, EpisodeScores, Scorer};
pub use transcript::{EpisodeStore, InteractionLog, TranscriptRecorder};
pub use validation::{ResponseRules, Verdict};
