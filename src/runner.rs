//! Plays many independent episodes with bounded concurrency.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{
    config::EngineConfig,
    game::Game,
    master::{EpisodeReport, GameMaster},
    transcript::EpisodeStore,
};

/// Runs episodes concurrently. Episodes share nothing but the cancellation token.
#[derive(Debug, Clone)]
pub struct EpisodeRunner {
    concurrency: usize,
    cancel: CancellationToken,
    store: Option<EpisodeStore>,
}

impl Default for EpisodeRunner {
    fn default() -> Self {
        Self::new(1)
    }
}

impl EpisodeRunner {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
            store: None,
        }
    }

    /// Uses the configured concurrency and stores results in the results directory.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.concurrency).with_store(EpisodeStore::new(config.results_dir.clone()))
    }

    /// Persists every finished episode, aborted ones included.
    pub fn with_store(mut self, store: EpisodeStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Token cancelling every episode this runner plays.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Plays all episodes and returns their reports ordered by instance id.
    ///
    /// A report that cannot be stored is still returned; the failure is logged.
    pub async fn run<G: Game>(&self, masters: Vec<GameMaster<G>>) -> Vec<EpisodeReport> {
        log::info!(
            "running {} episodes with concurrency {}",
            masters.len(),
            self.concurrency
        );
        let episodes = masters
            .into_iter()
            .map(|master| master.with_cancellation(self.cancel.child_token()).play());
        let mut reports: Vec<EpisodeReport> = stream::iter(episodes)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        reports.sort_by_key(|report| report.log.meta.instance_id);

        if let Some(store) = &self.store {
            for report in &reports {
                if let Err(err) = store.save(&report.log, &report.scores) {
                    log::warn!(
                        "failed to store {} instance {}: {err}",
                        report.log.meta.game,
                        report.log.meta.instance_id
                    );
                }
            }
        }

        let aborted = reports.iter().filter(|report| report.is_aborted()).count();
        if aborted > 0 {
            log::warn!("{aborted} of {} episodes aborted", reports.len());
        }
        reports
    }
}
