//! Two-participant greeting game.
//!
//! The greeter must welcome the target named by the instance with an
//! answer of the form `GREET: ...` containing "hello", "welcome" and the
//! target's name. An accepted greeting is forwarded to the guest, whose
//! answer is not checked.

use crate::{
    error::GameError,
    game::{EpisodeContext, Game},
    participant::ParticipantName,
    scoring::{EpisodeScores, Scorer, METRIC_LOSE, METRIC_MAIN_SCORE, METRIC_SUCCESS},
    transcript::InteractionLog,
    validation::{OnViolation, ResponseRules, Verdict, Violation},
};

pub const GREETING_PREFIX: &str = "GREET:";

/// Log key holding the episode outcome.
pub const KEY_SUCCESS: &str = "success";

/// Log key holding the outcome after every completed turn.
pub const KEY_SUCCESS_PER_TURN: &str = "success_per_turn";

const METRIC_ACCURACY: &str = "Accuracy";
const DEFAULT_MAX_REPROMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct GreetingGame {
    on_form: OnViolation,
    on_content: OnViolation,
    max_reprompts: usize,
    rules: ResponseRules,
    roles: Option<(ParticipantName, ParticipantName)>,
    reprompts: usize,
    last_violation: Option<Violation>,
    greeted: bool,
    failed: bool,
    turn_outcomes: Vec<bool>,
}

impl Default for GreetingGame {
    fn default() -> Self {
        Self {
            on_form: OnViolation::RecordFailure,
            on_content: OnViolation::RecordFailure,
            max_reprompts: DEFAULT_MAX_REPROMPTS,
            rules: ResponseRules::new(),
            roles: None,
            reprompts: 0,
            last_violation: None,
            greeted: false,
            failed: false,
            turn_outcomes: Vec::new(),
        }
    }
}

impl GreetingGame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_form(mut self, policy: OnViolation) -> Self {
        self.on_form = policy;
        self
    }

    pub fn on_content(mut self, policy: OnViolation) -> Self {
        self.on_content = policy;
        self
    }

    /// Attempts granted after a rejected greeting before the episode is failed.
    pub fn max_reprompts(mut self, max_reprompts: usize) -> Self {
        self.max_reprompts = max_reprompts;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn is_greeter(&self, participant: &ParticipantName) -> bool {
        matches!(&self.roles, Some((greeter, _)) if greeter == participant)
    }

    fn guest(&self) -> Result<&ParticipantName, GameError> {
        self.roles
            .as_ref()
            .map(|(_, guest)| guest)
            .ok_or_else(|| GameError::InvalidState("greeting game was not set up".to_string()))
    }
}

impl Game for GreetingGame {
    fn name(&self) -> &str {
        "greeting"
    }

    fn setup(&mut self, ctx: &mut EpisodeContext) -> Result<(), GameError> {
        let mut participants = ctx.participants().into_iter();
        let (Some(greeter), Some(guest), None) =
            (participants.next(), participants.next(), participants.next())
        else {
            return Err(GameError::InvalidParticipant(format!(
                "greeting is played by exactly two participants, got {}",
                ctx.participants().len()
            )));
        };

        let target = ctx.instance().require_str("target")?.to_string();
        self.rules = ResponseRules::new()
            .prefix(GREETING_PREFIX)
            .require(["hello", "welcome", target.as_str()])
            .on_form(self.on_form)
            .on_content(self.on_content);

        let prompt = ctx.instance().prompt.clone();
        ctx.add_user_message(greeter.as_str(), prompt)?;
        ctx.log_key("target", &target)?;
        log::debug!("{greeter} greets {target}, {guest} answers");
        self.roles = Some((greeter, guest));
        Ok(())
    }

    fn before_turn(&mut self, _turn: usize, _ctx: &mut EpisodeContext) -> Result<(), GameError> {
        self.reprompts = 0;
        Ok(())
    }

    fn validate(
        &mut self,
        participant: &ParticipantName,
        utterance: &str,
        _ctx: &mut EpisodeContext,
    ) -> Verdict {
        if !self.is_greeter(participant) {
            return Verdict::Accept;
        }
        let judgement = self.rules.judge(utterance);
        if let Some(violation) = &judgement.violation {
            log::info!("{participant}: {violation}");
        }
        if judgement.records_failure() {
            self.failed = true;
        }
        if !judgement.verdict.is_accept() && self.reprompts >= self.max_reprompts {
            log::info!("{participant} exhausted {} reprompts", self.max_reprompts);
            self.failed = true;
        }
        self.last_violation = judgement.violation;
        judgement.verdict
    }

    fn on_accepted(
        &mut self,
        participant: &ParticipantName,
        utterance: &str,
        ctx: &mut EpisodeContext,
    ) -> Result<(), GameError> {
        if self.is_greeter(participant) {
            self.greeted = true;
            let guest = self.guest()?.clone();
            ctx.add_user_message(guest.as_str(), utterance)?;
        }
        Ok(())
    }

    fn should_reprompt(&self, participant: &ParticipantName, _ctx: &EpisodeContext) -> bool {
        self.is_greeter(participant) && self.reprompts < self.max_reprompts
    }

    fn before_reprompt(
        &mut self,
        participant: &ParticipantName,
        ctx: &mut EpisodeContext,
    ) -> Result<(), GameError> {
        self.reprompts += 1;
        let problem = self
            .last_violation
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "the answer was not accepted".to_string());
        ctx.add_user_message(
            participant.as_str(),
            format!("Your answer was invalid ({problem}). Please greet again, starting with '{GREETING_PREFIX}'."),
        )
    }

    fn after_turn(&mut self, turn: usize, ctx: &mut EpisodeContext) -> Result<(), GameError> {
        let success = self.greeted && !self.failed;
        log::debug!("greeting turn {turn} done, success: {success}");
        self.turn_outcomes.push(success);
        ctx.log_key(KEY_SUCCESS_PER_TURN, &self.turn_outcomes)?;
        ctx.log_key(KEY_SUCCESS, success)
    }

    fn scorer(&self) -> &dyn Scorer {
        &GreetingScorer
    }
}

/// Reads the logged outcome; accuracy is 1 for a correct greeting, else 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreetingScorer;

impl Scorer for GreetingScorer {
    fn score(&self, log: &InteractionLog) -> Result<EpisodeScores, GameError> {
        let success = log
            .key(KEY_SUCCESS)
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| {
                GameError::ReplayInconsistency(format!("log misses boolean key '{KEY_SUCCESS}'"))
            })?;
        let accuracy = if success { 1.0 } else { 0.0 };

        let mut scores = EpisodeScores::new();
        scores.insert(METRIC_ACCURACY.to_string(), accuracy);
        scores.insert(METRIC_SUCCESS.to_string(), accuracy);
        scores.insert(METRIC_LOSE.to_string(), 1.0 - accuracy);
        scores.insert(METRIC_MAIN_SCORE.to_string(), accuracy * 100.0);
        Ok(scores)
    }
}
