use std::fs;
use std::path::{Path, PathBuf};

use crate::{error::GameError, scoring::EpisodeScores};

use super::record::InteractionLog;

const INTERACTIONS_FILE: &str = "interactions.json";
const SCORES_FILE: &str = "scores.json";

/// JSON files of finished episodes, one directory per game instance.
#[derive(Debug, Clone)]
pub struct EpisodeStore {
    dir: PathBuf,
}

impl EpisodeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes the interaction log and the scores of one episode.
    pub fn save(&self, log: &InteractionLog, scores: &EpisodeScores) -> Result<PathBuf, GameError> {
        let episode_dir = self.episode_dir(&log.meta.game, log.meta.instance_id);
        fs::create_dir_all(&episode_dir)?;
        fs::write(
            episode_dir.join(INTERACTIONS_FILE),
            serde_json::to_vec_pretty(log)?,
        )?;
        fs::write(
            episode_dir.join(SCORES_FILE),
            serde_json::to_vec_pretty(scores)?,
        )?;
        log::info!(
            "stored episode {}/{} in {}",
            log.meta.game,
            log.meta.instance_id,
            episode_dir.display()
        );
        Ok(episode_dir)
    }

    pub fn load_log(&self, game: &str, instance_id: u64) -> Result<InteractionLog, GameError> {
        read_json(&self.episode_dir(game, instance_id).join(INTERACTIONS_FILE))
    }

    pub fn load_scores(&self, game: &str, instance_id: u64) -> Result<EpisodeScores, GameError> {
        read_json(&self.episode_dir(game, instance_id).join(SCORES_FILE))
    }

    /// Loads every stored log of a game, skipping unreadable episodes.
    pub fn load_all(&self, game: &str) -> Result<Vec<InteractionLog>, GameError> {
        let mut logs = Vec::new();
        let game_dir = self.dir.join(game);
        if !game_dir.exists() {
            return Ok(logs);
        }
        for entry in fs::read_dir(&game_dir)? {
            let path = entry?.path().join(INTERACTIONS_FILE);
            match read_json::<InteractionLog>(&path) {
                Ok(log) => logs.push(log),
                Err(err) => log::warn!("skipping {}: {err}", path.display()),
            }
        }
        logs.sort_by_key(|log| log.meta.instance_id);
        Ok(logs)
    }

    fn episode_dir(&self, game: &str, instance_id: u64) -> PathBuf {
        self.dir.join(game).join(format!("instance_{instance_id:05}"))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, GameError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
