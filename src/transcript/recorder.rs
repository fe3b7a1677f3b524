use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{error::GameError, participant::GAME_MASTER};

use super::record::{EpisodeMeta, InteractionLog, Message, MessageKind, Turn};

/// Append-only recorder of everything exchanged during one episode.
#[derive(Debug)]
pub struct TranscriptRecorder {
    players: BTreeMap<String, String>,
    turns: Vec<Turn>,
    keys: BTreeMap<String, serde_json::Value>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl TranscriptRecorder {
    pub fn new(game: &str) -> Self {
        let mut players = BTreeMap::new();
        players.insert(GAME_MASTER.to_string(), format!("Game master for {game}"));
        Self {
            players,
            turns: Vec::new(),
            keys: BTreeMap::new(),
            last_timestamp: None,
        }
    }

    pub(crate) fn log_player(&mut self, name: &str, descriptor: &str) {
        self.players.insert(name.to_string(), descriptor.to_string());
    }

    /// Opens the next turn and returns its index.
    pub(crate) fn begin_turn(&mut self) -> usize {
        let index = self.turns.len();
        self.turns.push(Turn {
            index,
            messages: Vec::new(),
        });
        index
    }

    /// Appends a message to the current turn.
    pub(crate) fn record(
        &mut self,
        kind: MessageKind,
        participant: &str,
        content: &str,
    ) -> Result<&Message, GameError> {
        let timestamp = self.next_timestamp();
        let (from, to) = match kind {
            MessageKind::Send => (GAME_MASTER, participant),
            MessageKind::Receive => (participant, GAME_MASTER),
        };
        let turn = self
            .turns
            .last_mut()
            .ok_or_else(|| GameError::InvalidState("no turn has been started".to_string()))?;
        log::trace!("turn {} {kind} {from} -> {to}: {content}", turn.index);
        turn.messages.push(Message {
            from: from.to_string(),
            to: to.to_string(),
            timestamp,
            kind,
            content: content.to_string(),
        });
        turn.messages
            .last()
            .ok_or_else(|| GameError::InvalidState("message was not recorded".to_string()))
    }

    /// Records an episode-level value, replacing an earlier value under the same key.
    pub(crate) fn log_key(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.keys.insert(key.into(), value);
    }

    pub fn players(&self) -> &BTreeMap<String, String> {
        &self.players
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn keys(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.keys
    }

    pub fn into_log(self, meta: EpisodeMeta) -> InteractionLog {
        InteractionLog {
            meta,
            players: self.players,
            turns: self.turns,
            keys: self.keys,
        }
    }

    // Wall clock may step backwards; ties keep append order.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}
