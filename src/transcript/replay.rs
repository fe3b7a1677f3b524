//! Offline checks of persisted interaction logs.

use chrono::{DateTime, Utc};

use crate::{
    error::GameError,
    participant::GAME_MASTER,
    scoring::{score_episode, EpisodeScores, Scorer, KEY_REQUEST_COUNT},
};

use super::record::{InteractionLog, Message, MessageKind};

/// Verifies that a log could have been produced by the recorder.
pub fn validate_log(log: &InteractionLog) -> Result<(), GameError> {
    let mut last: Option<DateTime<Utc>> = None;
    let mut outstanding: Option<&str> = None;
    let mut receives = 0u64;

    for (position, turn) in log.turns.iter().enumerate() {
        if turn.index != position {
            return Err(inconsistent(format!(
                "turn at position {position} has index {}",
                turn.index
            )));
        }
        for message in &turn.messages {
            check_endpoints(log, message)?;
            if last.is_some_and(|prev| message.timestamp < prev) {
                return Err(inconsistent(format!(
                    "timestamp {} in turn {} goes backwards",
                    message.timestamp, turn.index
                )));
            }
            last = Some(message.timestamp);

            match (message.kind, outstanding) {
                (MessageKind::Send, None) => outstanding = Some(&message.to),
                (MessageKind::Send, Some(waiting)) => {
                    return Err(inconsistent(format!(
                        "send to {} while {waiting} has not answered",
                        message.to
                    )))
                }
                (MessageKind::Receive, Some(waiting)) if waiting == message.from => {
                    outstanding = None;
                    receives += 1;
                }
                (MessageKind::Receive, _) => {
                    return Err(inconsistent(format!(
                        "receive from {} without a matching send",
                        message.from
                    )))
                }
            }
        }
    }

    if let Some(waiting) = outstanding {
        if !log.meta.status.is_aborted() {
            return Err(inconsistent(format!(
                "finished episode ends with an unanswered send to {waiting}"
            )));
        }
    }

    if let Some(count) = log.key(KEY_REQUEST_COUNT).and_then(serde_json::Value::as_u64) {
        if count != receives {
            return Err(inconsistent(format!(
                "request counter is {count} but {receives} answers were recorded"
            )));
        }
    }
    Ok(())
}

/// Validates a persisted log and recomputes its scores without replaying the episode.
pub fn rescore(log: &InteractionLog, scorer: &dyn Scorer) -> Result<EpisodeScores, GameError> {
    validate_log(log)?;
    score_episode(log, scorer)
}

fn check_endpoints(log: &InteractionLog, message: &Message) -> Result<(), GameError> {
    let (gm_side, participant) = match message.kind {
        MessageKind::Send => (&message.from, &message.to),
        MessageKind::Receive => (&message.to, &message.from),
    };
    if gm_side != GAME_MASTER {
        return Err(inconsistent(format!(
            "{} message must involve the game master, found {gm_side}",
            message.kind
        )));
    }
    if participant == GAME_MASTER || !log.players.contains_key(participant.as_str()) {
        return Err(inconsistent(format!("unknown participant {participant}")));
    }
    Ok(())
}

fn inconsistent(detail: String) -> GameError {
    GameError::ReplayInconsistency(detail)
}
