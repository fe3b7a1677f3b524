//! Episode-level scoring.
//!
//! Scores are a pure function of an [`InteractionLog`], so a persisted log
//! can be rescored offline and yields the same numbers as the live run.

use std::collections::BTreeMap;

use crate::{error::GameError, transcript::InteractionLog};

/// Metric name to value, attached once per completed episode.
pub type EpisodeScores = BTreeMap<String, f64>;

pub const METRIC_ABORTED: &str = "Aborted";
pub const METRIC_SUCCESS: &str = "Success";
pub const METRIC_LOSE: &str = "Lose";
pub const METRIC_MAIN_SCORE: &str = "Main Score";
pub const METRIC_REQUEST_COUNT: &str = "Request Count";
pub const METRIC_REQUEST_COUNT_PARSED: &str = "Parsed Request Count";
pub const METRIC_REQUEST_COUNT_VIOLATED: &str = "Violated Request Count";
pub const METRIC_REQUEST_SUCCESS: &str = "Request Success Ratio";

/// Log keys maintained by the game master.
pub const KEY_REQUEST_COUNT: &str = "request_count";
pub const KEY_REQUEST_COUNT_PARSED: &str = "parsed_request_count";
pub const KEY_REQUEST_COUNT_VIOLATED: &str = "violated_request_count";
/// Set when the game scorer failed and only the engine metrics were kept.
pub const KEY_SCORING_ERROR: &str = "scoring_error";

/// Game-specific metrics computed from a finished episode's log.
pub trait Scorer: Send + Sync {
    fn score(&self, log: &InteractionLog) -> Result<EpisodeScores, GameError>;
}

/// Scorer for games without metrics of their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardScorer;

impl Scorer for StandardScorer {
    fn score(&self, _log: &InteractionLog) -> Result<EpisodeScores, GameError> {
        Ok(EpisodeScores::new())
    }
}

/// Computes the full score set of an episode.
///
/// Aborted episodes only get the engine metrics and are never scored as a
/// regular loss by the game scorer.
pub fn score_episode(log: &InteractionLog, scorer: &dyn Scorer) -> Result<EpisodeScores, GameError> {
    let mut scores = standard_metrics(log)?;
    if log.meta.status.is_aborted() {
        scores.insert(METRIC_SUCCESS.to_string(), 0.0);
        scores.insert(METRIC_LOSE.to_string(), 0.0);
        return Ok(scores);
    }
    scores.extend(scorer.score(log)?);
    Ok(scores)
}

/// Metrics every episode carries, read from the counters logged by the game master.
pub fn standard_metrics(log: &InteractionLog) -> Result<EpisodeScores, GameError> {
    let requests = counter(log, KEY_REQUEST_COUNT)?;
    let parsed = counter(log, KEY_REQUEST_COUNT_PARSED)?;
    let violated = counter(log, KEY_REQUEST_COUNT_VIOLATED)?;
    let ratio = if requests == 0 {
        0.0
    } else {
        parsed as f64 / requests as f64
    };
    let aborted = if log.meta.status.is_aborted() { 1.0 } else { 0.0 };

    let mut scores = EpisodeScores::new();
    scores.insert(METRIC_ABORTED.to_string(), aborted);
    scores.insert(METRIC_REQUEST_COUNT.to_string(), requests as f64);
    scores.insert(METRIC_REQUEST_COUNT_PARSED.to_string(), parsed as f64);
    scores.insert(METRIC_REQUEST_COUNT_VIOLATED.to_string(), violated as f64);
    scores.insert(METRIC_REQUEST_SUCCESS.to_string(), ratio);
    Ok(scores)
}

fn counter(log: &InteractionLog, key: &str) -> Result<u64, GameError> {
    log.key(key)
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| GameError::ReplayInconsistency(format!("missing counter '{key}'")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transcript::{EpisodeMeta, EpisodeStatus};

    fn log(status: EpisodeStatus) -> InteractionLog {
        let mut keys = BTreeMap::new();
        keys.insert(KEY_REQUEST_COUNT.to_string(), json!(4));
        keys.insert(KEY_REQUEST_COUNT_PARSED.to_string(), json!(3));
        keys.insert(KEY_REQUEST_COUNT_VIOLATED.to_string(), json!(1));
        InteractionLog {
            meta: EpisodeMeta {
                game: "test".to_string(),
                instance_id: 1,
                status,
            },
            players: BTreeMap::new(),
            turns: Vec::new(),
            keys,
        }
    }

    struct Fixed;

    impl Scorer for Fixed {
        fn score(&self, _log: &InteractionLog) -> Result<EpisodeScores, GameError> {
            Ok(EpisodeScores::from([(METRIC_SUCCESS.to_string(), 1.0)]))
        }
    }

    #[test]
    fn finished_episode_merges_game_metrics() {
        let scores = score_episode(&log(EpisodeStatus::Finished), &Fixed).expect("score");
        assert_eq!(scores[METRIC_ABORTED], 0.0);
        assert_eq!(scores[METRIC_SUCCESS], 1.0);
        assert_eq!(scores[METRIC_REQUEST_SUCCESS], 0.75);
    }

    #[test]
    fn aborted_episode_skips_game_metrics() {
        let status = EpisodeStatus::Aborted {
            reason: "backend down".to_string(),
        };
        let scores = score_episode(&log(status), &Fixed).expect("score");
        assert_eq!(scores[METRIC_ABORTED], 1.0);
        assert_eq!(scores[METRIC_SUCCESS], 0.0);
        assert_eq!(scores[METRIC_LOSE], 0.0);
        assert!(!scores.contains_key(METRIC_MAIN_SCORE));
    }

    #[test]
    fn missing_counters_are_inconsistent() {
        let mut log = log(EpisodeStatus::Finished);
        log.keys.clear();
        assert!(matches!(
            score_episode(&log, &StandardScorer),
            Err(GameError::ReplayInconsistency(_))
        ));
    }
}
