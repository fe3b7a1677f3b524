//! Transcript recording, persistence and replay validation.

mod record;
mod recorder;
mod replay;
mod store;

pub use record::{EpisodeMeta, EpisodeStatus, InteractionLog, Message, MessageKind, Turn};
pub use recorder::TranscriptRecorder;
pub use replay::{rescore, validate_log};
pub use store::EpisodeStore;
