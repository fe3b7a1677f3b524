//! Persisted record types of an episode.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::participant::GAME_MASTER;

/// Direction of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Game master delivering a prompt to a participant
    Send,
    /// A participant's utterance returned to the game master
    Receive,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Send => write!(f, "send"),
            MessageKind::Receive => write!(f, "receive"),
        }
    }
}

/// One immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub content: String,
}

impl Message {
    /// The participant on the other side of the game master.
    pub fn participant(&self) -> &str {
        match self.kind {
            MessageKind::Send => &self.to,
            MessageKind::Receive => &self.from,
        }
    }
}

/// Messages produced during one pass through the participant order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub index: usize,
    pub messages: Vec<Message>,
}

/// Terminal state of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EpisodeStatus {
    /// The game decided to stop.
    Finished,
    /// A backend failure, cancellation or reprompt cap ended the episode early.
    Aborted { reason: String },
}

impl EpisodeStatus {
    pub fn is_aborted(&self) -> bool {
        matches!(self, EpisodeStatus::Aborted { .. })
    }
}

/// Identifies the episode a log belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub game: String,
    pub instance_id: u64,
    pub status: EpisodeStatus,
}

/// The durable, replayable record of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    pub meta: EpisodeMeta,
    /// Role slot to human-readable descriptor, including the game master.
    pub players: BTreeMap<String, String>,
    pub turns: Vec<Turn>,
    /// Episode-level values logged by the engine and the game.
    #[serde(default)]
    pub keys: BTreeMap<String, serde_json::Value>,
}

impl InteractionLog {
    /// All messages in chronological order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.turns.iter().flat_map(|t| t.messages.iter())
    }

    /// Number of messages of `kind` exchanged with `participant`.
    pub fn count(&self, kind: MessageKind, participant: &str) -> usize {
        self.messages()
            .filter(|m| m.kind == kind && m.participant() == participant)
            .count()
    }

    /// Participant slots, without the game master.
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.players
            .keys()
            .map(String::as_str)
            .filter(|name| *name != GAME_MASTER)
    }

    pub fn key(&self, name: &str) -> Option<&serde_json::Value> {
        self.keys.get(name)
    }
}
