//! The game master: the state machine that plays one episode.

mod events;
mod state;

#[cfg(test)]
mod tests;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    chat::ChatMessage,
    config::EngineConfig,
    error::{BackendError, GameError},
    game::{EpisodeContext, Game, GameInstance},
    participant::{Participant, ParticipantName},
    scoring::{
        score_episode, standard_metrics, EpisodeScores, KEY_REQUEST_COUNT,
        KEY_REQUEST_COUNT_PARSED, KEY_REQUEST_COUNT_VIOLATED, KEY_SCORING_ERROR,
    },
    transcript::{EpisodeMeta, EpisodeStatus, InteractionLog, MessageKind},
    validation::Verdict,
};

pub use events::EpisodeEvent;
pub use state::EpisodeState;

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a played episode.
///
/// Aborted episodes keep their partial transcript and carry the abort
/// reason in the log's status.
#[derive(Debug, Clone)]
pub struct EpisodeReport {
    pub log: InteractionLog,
    pub scores: EpisodeScores,
}

impl EpisodeReport {
    pub fn status(&self) -> &EpisodeStatus {
        &self.log.meta.status
    }

    pub fn is_aborted(&self) -> bool {
        self.log.meta.status.is_aborted()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RequestCounters {
    requests: u64,
    parsed: u64,
    violated: u64,
}

/// Builder for a [`GameMaster`]. Building performs the episode setup.
pub struct GameMasterBuilder<G: Game> {
    game: G,
    instance: GameInstance,
    participants: Vec<Participant>,
    timeout: Duration,
    max_reprompts: Option<usize>,
    cancel: Option<CancellationToken>,
}

impl<G: Game> GameMasterBuilder<G> {
    /// Adds a participant; registration order is the default turn order.
    pub fn participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    pub fn participants(mut self, participants: impl IntoIterator<Item = Participant>) -> Self {
        self.participants.extend(participants);
        self
    }

    /// Upper bound for a single generator call.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Engine-level cap on reprompts per exchange. Unset by default.
    pub fn max_reprompts(mut self, limit: Option<usize>) -> Self {
        self.max_reprompts = limit;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Applies timeout and reprompt cap from the engine configuration.
    pub fn config(self, config: &EngineConfig) -> Self {
        self.generation_timeout(config.generation_timeout())
            .max_reprompts(config.max_reprompts)
    }

    /// Registers the participants and runs the game's setup hook.
    ///
    /// Fails before any turn is played, so no transcript exists on error.
    pub fn build(self) -> Result<GameMaster<G>, GameError> {
        let mut game = self.game;
        self.instance.validate()?;
        if self.participants.is_empty() {
            return Err(GameError::InvalidParticipant(
                "an episode needs at least one participant".to_string(),
            ));
        }

        let mut ctx = EpisodeContext::new(game.name(), self.instance);
        for participant in self.participants {
            let name = participant.name().to_string();
            let descriptor = participant.descriptor().to_string();
            ctx.registry.register(participant)?;
            ctx.recorder.log_player(&name, &descriptor);
        }
        game.setup(&mut ctx)?;
        log::debug!(
            "{} instance {} set up with {} participants",
            game.name(),
            ctx.instance.id,
            ctx.registry.len()
        );

        Ok(GameMaster {
            game,
            ctx,
            state: EpisodeState::NotStarted,
            timeout: self.timeout,
            max_reprompts: self.max_reprompts,
            cancel: self.cancel.unwrap_or_default(),
            counters: RequestCounters::default(),
            event_sender: None,
        })
    }
}

/// Drives one episode: turn sequencing, prompting, validation with
/// reprompts, transcript recording and final scoring.
pub struct GameMaster<G: Game> {
    game: G,
    ctx: EpisodeContext,
    state: EpisodeState,
    timeout: Duration,
    max_reprompts: Option<usize>,
    cancel: CancellationToken,
    counters: RequestCounters,
    event_sender: Option<mpsc::UnboundedSender<EpisodeEvent>>,
}

impl<G: Game> GameMaster<G> {
    pub fn builder(game: G, instance: GameInstance) -> GameMasterBuilder<G> {
        GameMasterBuilder {
            game,
            instance,
            participants: Vec::new(),
            timeout: DEFAULT_GENERATION_TIMEOUT,
            max_reprompts: None,
            cancel: None,
        }
    }

    /// Replaces the cancellation token checked before every turn and dispatch.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Creates an event receiver channel.
    #[must_use]
    pub fn create_event_channel(&mut self) -> mpsc::UnboundedReceiver<EpisodeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_sender = Some(tx);
        rx
    }

    #[must_use]
    pub const fn state(&self) -> EpisodeState {
        self.state
    }

    pub fn context(&self) -> &EpisodeContext {
        &self.ctx
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    /// Plays the episode to its terminal state.
    ///
    /// Backend failures, cancellation and the reprompt cap abort the
    /// episode; they are reported through the returned log's status.
    pub async fn play(mut self) -> EpisodeReport {
        self.state = EpisodeState::Running { turn: 0 };
        self.emit_event(EpisodeEvent::Started {
            game: self.game.name().to_string(),
            instance_id: self.ctx.instance.id,
        });

        let status = match self.run_turns().await {
            Ok(()) => EpisodeStatus::Finished,
            Err(err) => {
                log::warn!(
                    "{} instance {} aborted: {err}",
                    self.game.name(),
                    self.ctx.instance.id
                );
                EpisodeStatus::Aborted {
                    reason: err.to_string(),
                }
            }
        };
        self.finish(status)
    }

    async fn run_turns(&mut self) -> Result<(), GameError> {
        if !self.game.should_continue(&self.ctx) {
            return Ok(());
        }
        loop {
            self.check_cancelled()?;
            let turn = self.ctx.recorder.begin_turn();
            self.state = EpisodeState::Running { turn };
            self.emit_event(EpisodeEvent::TurnStarted { turn });
            self.game.before_turn(turn, &mut self.ctx)?;

            let mut cut_short = false;
            for name in self.game.turn_order(&self.ctx) {
                self.check_cancelled()?;
                if !self.game.should_continue(&self.ctx) {
                    log::debug!("turn {turn} cut short before {name}");
                    cut_short = true;
                    break;
                }
                if !self.ctx.registry.get(name.as_str())?.has_pending_prompt() {
                    log::debug!("{name} has nothing to answer in turn {turn}");
                    continue;
                }
                self.exchange(&name).await?;
            }

            self.game.after_turn(turn, &mut self.ctx)?;
            self.emit_event(EpisodeEvent::TurnCompleted { turn });
            self.ctx.turn_index += 1;
            if cut_short || !self.game.should_continue(&self.ctx) {
                return Ok(());
            }
        }
    }

    /// One prompt/answer exchange including reprompts.
    async fn exchange(&mut self, name: &ParticipantName) -> Result<(), GameError> {
        let mut reprompts = 0usize;
        loop {
            let utterance = self.dispatch(name, reprompts > 0).await?;
            let reason = match self.game.validate(name, &utterance, &mut self.ctx) {
                Verdict::Accept => {
                    self.counters.parsed += 1;
                    return self.game.on_accepted(name, &utterance, &mut self.ctx);
                }
                Verdict::Reject(reason) => reason,
            };

            self.counters.violated += 1;
            let will_reprompt = self.game.should_reprompt(name, &self.ctx);
            let rejection = GameError::ValidationRejected {
                participant: name.to_string(),
                reason: reason.clone(),
            };
            log::info!("{rejection} (reprompt: {will_reprompt})");
            self.emit_event(EpisodeEvent::ResponseRejected {
                participant: name.to_string(),
                reason,
                will_reprompt,
            });
            if !will_reprompt {
                return Ok(());
            }
            if let Some(limit) = self.max_reprompts {
                if reprompts >= limit {
                    return Err(GameError::RepromptLimitExceeded {
                        participant: name.to_string(),
                        limit,
                    });
                }
            }
            reprompts += 1;
            self.game.before_reprompt(name, &mut self.ctx)?;
        }
    }

    /// Sends the queued prompt and awaits the answer; the only suspension point.
    async fn dispatch(&mut self, name: &ParticipantName, resend: bool) -> Result<String, GameError> {
        let participant = self.ctx.registry.get_mut(name.as_str())?;
        let prompt = participant.take_prompt(resend).ok_or_else(|| {
            GameError::InvalidState(format!("no prompt queued for {name}"))
        })?;
        participant.push_history(ChatMessage::user().content(prompt.clone()).build());
        self.ctx
            .recorder
            .record(MessageKind::Send, name.as_str(), &prompt)?;
        self.emit_event(EpisodeEvent::Prompted {
            participant: name.to_string(),
            reprompt: resend,
        });

        let timeout = self.timeout;
        let cancel = self.cancel.clone();
        let participant = self.ctx.registry.get(name.as_str())?;
        let generated = tokio::select! {
            _ = cancel.cancelled() => Err(GameError::Cancelled),
            outcome = tokio::time::timeout(
                timeout,
                participant.generator().generate(participant.history()),
            ) => match outcome {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(source)) => Err(GameError::Backend {
                    participant: name.to_string(),
                    source,
                }),
                Err(_) => Err(GameError::Backend {
                    participant: name.to_string(),
                    source: BackendError::Timeout(timeout),
                }),
            },
        };
        let utterance = generated?;

        self.ctx
            .recorder
            .record(MessageKind::Receive, name.as_str(), &utterance)?;
        self.ctx
            .registry
            .get_mut(name.as_str())?
            .push_history(ChatMessage::assistant().content(utterance.clone()).build());
        self.counters.requests += 1;
        Ok(utterance)
    }

    fn finish(mut self, status: EpisodeStatus) -> EpisodeReport {
        self.state = EpisodeState::Finished;
        let counters = self.counters;
        let recorder = &mut self.ctx.recorder;
        recorder.log_key(KEY_REQUEST_COUNT, counters.requests.into());
        recorder.log_key(KEY_REQUEST_COUNT_PARSED, counters.parsed.into());
        recorder.log_key(KEY_REQUEST_COUNT_VIOLATED, counters.violated.into());
        self.emit_event(EpisodeEvent::Finished {
            status: status.clone(),
        });

        let GameMaster { game, ctx, .. } = self;
        let meta = EpisodeMeta {
            game: game.name().to_string(),
            instance_id: ctx.instance.id,
            status,
        };
        let mut log = ctx.recorder.into_log(meta);
        let scores = match score_episode(&log, game.scorer()) {
            Ok(scores) => scores,
            Err(err) => {
                log::warn!("scoring {} instance {} failed: {err}", log.meta.game, log.meta.instance_id);
                log.keys
                    .insert(KEY_SCORING_ERROR.to_string(), err.to_string().into());
                standard_metrics(&log).unwrap_or_default()
            }
        };
        log::info!(
            "{} instance {} finished after {} turns",
            log.meta.game,
            log.meta.instance_id,
            log.turns.len()
        );
        EpisodeReport { log, scores }
    }

    fn check_cancelled(&self) -> Result<(), GameError> {
        if self.cancel.is_cancelled() {
            return Err(GameError::Cancelled);
        }
        Ok(())
    }

    /// Emits an event to listeners.
    fn emit_event(&self, event: EpisodeEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }
}

impl<G: Game> std::fmt::Debug for GameMaster<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameMaster")
            .field("game", &self.game.name())
            .field("state", &self.state)
            .field("participants", &self.ctx.registry.len())
            .field("turn_index", &self.ctx.turn_index)
            .finish()
    }
}
