use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::{
    games::{GreetingGame, GreetingScorer},
    scoring::{Scorer, KEY_SCORING_ERROR},
    generator::{ProgrammedGenerator, ResponseGenerator},
    transcript::{rescore, validate_log},
    validation::OnViolation,
};

const SEED: &str =
    "Greet Peter. Start with 'GREET:' and include 'Hello' and 'welcome' and 'Peter'.";
const GUEST_ANSWER: &str = "Peter: Hi, thanks for having me!";

struct FailingGenerator;

#[async_trait]
impl ResponseGenerator for FailingGenerator {
    async fn generate(&self, _history: &[ChatMessage]) -> Result<String, BackendError> {
        Err(BackendError::Http("connection refused".to_string()))
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

struct StalledGenerator;

#[async_trait]
impl ResponseGenerator for StalledGenerator {
    async fn generate(&self, _history: &[ChatMessage]) -> Result<String, BackendError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }

    fn describe(&self) -> String {
        "stalled".to_string()
    }
}

fn instance() -> GameInstance {
    GameInstance::new(0, SEED).with_param("target", "Peter".into())
}

fn player(name: &str, generator: impl ResponseGenerator + 'static) -> Participant {
    Participant::new(name, Box::new(generator)).expect("valid name")
}

fn greeting(greeter: impl ResponseGenerator + 'static) -> GameMaster<GreetingGame> {
    GameMaster::builder(GreetingGame::new(), instance())
        .participant(player("A", greeter))
        .participant(player("B", ProgrammedGenerator::fixed(GUEST_ANSWER)))
        .build()
        .expect("setup")
}

fn contents(log: &InteractionLog) -> Vec<(MessageKind, String, String)> {
    log.messages()
        .map(|m| (m.kind, m.participant().to_string(), m.content.clone()))
        .collect()
}

#[tokio::test]
async fn correct_greeting_scores_full_accuracy() {
    let report = greeting(ProgrammedGenerator::fixed("GREET: Hello Peter! Welcome!"))
        .play()
        .await;

    assert_eq!(report.status(), &EpisodeStatus::Finished);
    assert_eq!(report.scores["Accuracy"], 1.0);
    assert_eq!(report.scores["Main Score"], 100.0);
    assert_eq!(report.scores["Aborted"], 0.0);
    assert_eq!(report.log.turns.len(), 1);
    assert_eq!(
        contents(&report.log),
        vec![
            (MessageKind::Send, "A".to_string(), SEED.to_string()),
            (MessageKind::Receive, "A".to_string(), "GREET: Hello Peter! Welcome!".to_string()),
            (MessageKind::Send, "B".to_string(), "GREET: Hello Peter! Welcome!".to_string()),
            (MessageKind::Receive, "B".to_string(), GUEST_ANSWER.to_string()),
        ]
    );
}

#[tokio::test]
async fn form_violation_fails_without_reprompt() {
    let report = greeting(ProgrammedGenerator::fixed("Hi Peter, welcome!"))
        .play()
        .await;

    assert_eq!(report.status(), &EpisodeStatus::Finished);
    assert_eq!(report.scores["Accuracy"], 0.0);
    assert_eq!(report.log.count(MessageKind::Send, "A"), 1);
    assert_eq!(report.log.count(MessageKind::Receive, "B"), 1);
    assert_eq!(report.scores["Violated Request Count"], 0.0);
}

#[tokio::test]
async fn content_violation_keeps_both_exchanges() {
    let report = greeting(ProgrammedGenerator::fixed("GREET: Hi Peter!"))
        .play()
        .await;

    assert_eq!(report.scores["Accuracy"], 0.0);
    assert_eq!(report.scores["Lose"], 1.0);
    let log = &report.log;
    assert_eq!(log.messages().count(), 4);
    assert_eq!(log.count(MessageKind::Receive, "A"), 1);
    assert_eq!(log.count(MessageKind::Receive, "B"), 1);
}

#[tokio::test]
async fn backend_failure_aborts_with_partial_transcript() {
    let report = greeting(FailingGenerator).play().await;

    assert!(report.is_aborted());
    let messages = contents(&report.log);
    assert_eq!(messages, vec![(MessageKind::Send, "A".to_string(), SEED.to_string())]);
    assert_eq!(report.scores["Aborted"], 1.0);
    assert_eq!(report.scores["Success"], 0.0);
    assert_eq!(report.scores["Lose"], 0.0);
    assert!(!report.scores.contains_key("Accuracy"));
    validate_log(&report.log).expect("unanswered send is allowed when aborted");
    match report.status() {
        EpisodeStatus::Aborted { reason } => assert!(reason.contains("connection refused")),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_participant_is_rejected_before_play() {
    let err = GameMaster::builder(GreetingGame::new(), instance())
        .participant(player("A", ProgrammedGenerator::fixed("x")))
        .participant(player("A", ProgrammedGenerator::fixed("y")))
        .build()
        .expect_err("duplicate");
    assert!(matches!(err, GameError::DuplicateParticipant(name) if name == "A"));
}

#[tokio::test]
async fn missing_instance_parameter_is_rejected_before_play() {
    let err = GameMaster::builder(GreetingGame::new(), GameInstance::new(1, SEED))
        .participant(player("A", ProgrammedGenerator::fixed("x")))
        .participant(player("B", ProgrammedGenerator::fixed("y")))
        .build()
        .expect_err("no target");
    assert!(matches!(err, GameError::InvalidInstance(_)));
}

#[tokio::test]
async fn live_scores_equal_rescored_log() {
    for answer in ["GREET: Hello Peter! Welcome!", "GREET: Hi Peter!", "Hi"] {
        let report = greeting(ProgrammedGenerator::fixed(answer)).play().await;
        validate_log(&report.log).expect("consistent log");
        let persisted: InteractionLog =
            serde_json::from_str(&serde_json::to_string(&report.log).expect("serialize"))
                .expect("deserialize");
        assert_eq!(rescore(&persisted, &GreetingScorer).expect("rescore"), report.scores);
    }
}

#[tokio::test]
async fn reprompted_greeting_succeeds_on_second_attempt() {
    let greeter = ProgrammedGenerator::scripted(["Hi Peter", "GREET: Hello Peter, welcome!"]);
    let report = GameMaster::builder(GreetingGame::new().on_form(OnViolation::Reprompt), instance())
        .participant(player("A", greeter))
        .participant(player("B", ProgrammedGenerator::fixed(GUEST_ANSWER)))
        .build()
        .expect("setup")
        .play()
        .await;

    assert_eq!(report.scores["Accuracy"], 1.0);
    assert_eq!(report.scores["Violated Request Count"], 1.0);
    assert_eq!(report.scores["Parsed Request Count"], 2.0);
    assert_eq!(report.log.count(MessageKind::Send, "A"), 2);
    let feedback = &report.log.turns[0].messages[2].content;
    assert!(feedback.contains("form violation"));
}

#[tokio::test]
async fn engine_reprompt_cap_aborts_episode() {
    let game = GreetingGame::new()
        .on_form(OnViolation::Reprompt)
        .max_reprompts(10);
    let report = GameMaster::builder(game, instance())
        .participant(player("A", ProgrammedGenerator::fixed("Hi")))
        .participant(player("B", ProgrammedGenerator::fixed(GUEST_ANSWER)))
        .max_reprompts(Some(1))
        .build()
        .expect("setup")
        .play()
        .await;

    assert!(report.is_aborted());
    assert_eq!(report.log.count(MessageKind::Receive, "A"), 2);
    assert_eq!(report.log.count(MessageKind::Send, "B"), 0);
}

#[tokio::test]
async fn cancelled_episode_plays_no_turn() {
    let token = CancellationToken::new();
    token.cancel();
    let report = greeting(ProgrammedGenerator::fixed("GREET: Hello Peter! Welcome!"))
        .with_cancellation(token)
        .play()
        .await;

    assert!(report.is_aborted());
    assert!(report.log.turns.is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_pending_generation() {
    let token = CancellationToken::new();
    let master = greeting(StalledGenerator).with_cancellation(token.clone());
    let handle = tokio::spawn(master.play());
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    let report = handle.await.expect("join");

    assert_eq!(
        report.status(),
        &EpisodeStatus::Aborted {
            reason: GameError::Cancelled.to_string()
        }
    );
    assert_eq!(
        contents(&report.log),
        vec![(MessageKind::Send, "A".to_string(), SEED.to_string())]
    );
    assert_eq!(report.log.count(MessageKind::Receive, "A"), 0);
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_aborts_episode() {
    let report = GameMaster::builder(GreetingGame::new(), instance())
        .participant(player("A", StalledGenerator))
        .participant(player("B", ProgrammedGenerator::fixed(GUEST_ANSWER)))
        .generation_timeout(Duration::from_secs(5))
        .build()
        .expect("setup")
        .play()
        .await;

    match report.status() {
        EpisodeStatus::Aborted { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(report.log.messages().count(), 1);
}

#[tokio::test]
async fn events_cover_the_episode_lifecycle() {
    let mut master = greeting(ProgrammedGenerator::fixed("GREET: Hello Peter! Welcome!"));
    let mut events = master.create_event_channel();
    assert_eq!(master.state(), EpisodeState::NotStarted);
    master.play().await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(matches!(received.first(), Some(EpisodeEvent::Started { .. })));
    assert!(received.contains(&EpisodeEvent::TurnCompleted { turn: 0 }));
    assert!(matches!(
        received.last(),
        Some(EpisodeEvent::Finished {
            status: EpisodeStatus::Finished
        })
    ));
}

/// Talks to a single participant for a fixed number of turns.
struct Interview {
    turns: usize,
    stop_after_first_answer: bool,
    answered: bool,
    after_turn_calls: Arc<Mutex<Vec<usize>>>,
}

impl Interview {
    fn new(turns: usize) -> Self {
        Self {
            turns,
            stop_after_first_answer: false,
            answered: false,
            after_turn_calls: Arc::default(),
        }
    }
}

impl Game for Interview {
    fn name(&self) -> &str {
        "interview"
    }

    fn turn_budget(&self) -> usize {
        self.turns
    }

    fn should_continue(&self, ctx: &EpisodeContext) -> bool {
        !(self.stop_after_first_answer && self.answered) && ctx.turn_index() < self.turn_budget()
    }

    fn before_turn(&mut self, turn: usize, ctx: &mut EpisodeContext) -> Result<(), GameError> {
        for name in ctx.participants() {
            ctx.add_user_message(name.as_str(), format!("question {turn}"))?;
        }
        Ok(())
    }

    fn on_accepted(
        &mut self,
        _participant: &ParticipantName,
        _utterance: &str,
        _ctx: &mut EpisodeContext,
    ) -> Result<(), GameError> {
        self.answered = true;
        Ok(())
    }

    fn after_turn(&mut self, turn: usize, _ctx: &mut EpisodeContext) -> Result<(), GameError> {
        self.after_turn_calls.lock().expect("lock").push(turn);
        Ok(())
    }
}

#[tokio::test]
async fn turn_indices_are_contiguous() {
    let report = GameMaster::builder(Interview::new(3), GameInstance::new(7, "interview"))
        .participant(player("A", ProgrammedGenerator::fixed("answer")))
        .build()
        .expect("setup")
        .play()
        .await;

    let indices: Vec<usize> = report.log.turns.iter().map(|t| t.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(report.scores["Request Count"], 3.0);
    assert_eq!(report.log.meta.instance_id, 7);
    validate_log(&report.log).expect("consistent");
}

#[tokio::test]
async fn cut_short_turn_runs_after_turn_once_and_ends() {
    let mut game = Interview::new(5);
    game.stop_after_first_answer = true;
    let calls = Arc::clone(&game.after_turn_calls);
    let report = GameMaster::builder(game, GameInstance::new(0, "interview"))
        .participant(player("A", ProgrammedGenerator::fixed("one")))
        .participant(player("B", ProgrammedGenerator::fixed("two")))
        .build()
        .expect("setup")
        .play()
        .await;

    assert_eq!(*calls.lock().expect("lock"), vec![0]);
    assert_eq!(report.log.turns.len(), 1);
    assert_eq!(report.log.count(MessageKind::Receive, "B"), 0);
    assert_eq!(report.status(), &EpisodeStatus::Finished);
}

#[tokio::test]
async fn game_that_never_continues_plays_no_turn() {
    let report = GameMaster::builder(Interview::new(0), GameInstance::new(0, "interview"))
        .participant(player("A", ProgrammedGenerator::fixed("answer")))
        .build()
        .expect("setup")
        .play()
        .await;
    assert!(report.log.turns.is_empty());
    assert_eq!(report.status(), &EpisodeStatus::Finished);
}

struct RefusingScorer;

impl Scorer for RefusingScorer {
    fn score(&self, _log: &InteractionLog) -> Result<EpisodeScores, GameError> {
        Err(GameError::ReplayInconsistency("outcome flag missing".to_string()))
    }
}

struct Unscorable;

impl Game for Unscorable {
    fn name(&self) -> &str {
        "unscorable"
    }

    fn setup(&mut self, ctx: &mut EpisodeContext) -> Result<(), GameError> {
        ctx.add_user_message("A", "hello")
    }

    fn scorer(&self) -> &dyn Scorer {
        &RefusingScorer
    }
}

#[tokio::test]
async fn scorer_failure_is_recorded_in_the_log() {
    let report = GameMaster::builder(Unscorable, GameInstance::new(0, "unscorable"))
        .participant(player("A", ProgrammedGenerator::fixed("hi")))
        .build()
        .expect("setup")
        .play()
        .await;

    assert_eq!(report.status(), &EpisodeStatus::Finished);
    let error = report
        .log
        .key(KEY_SCORING_ERROR)
        .and_then(serde_json::Value::as_str)
        .expect("scoring error logged");
    assert!(error.contains("outcome flag missing"));
    assert_eq!(report.scores["Request Count"], 1.0);
    assert!(!report.scores.contains_key("Success"));
}

#[tokio::test]
async fn greeting_logs_per_turn_outcomes() {
    let report = greeting(ProgrammedGenerator::fixed("GREET: Hello Peter! Welcome!"))
        .play()
        .await;
    assert_eq!(
        report.log.key("success_per_turn"),
        Some(&serde_json::json!([true]))
    );
    assert!(report.log.key(KEY_SCORING_ERROR).is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn exchanges_per_turn_are_bounded_by_reprompt_budget(limit in 0usize..4, good_at in 0usize..6) {
        let mut script = vec!["Hi".to_string(); good_at];
        script.push("GREET: Hello Peter, welcome!".to_string());
        let game = GreetingGame::new().on_form(OnViolation::Reprompt).max_reprompts(limit);
        let master = GameMaster::builder(game, instance())
            .participant(player("A", ProgrammedGenerator::scripted(script)))
            .participant(player("B", ProgrammedGenerator::fixed(GUEST_ANSWER)))
            .build()
            .expect("setup");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let report = runtime.block_on(master.play());

        let exchanges = report.log.count(MessageKind::Receive, "A");
        prop_assert!(exchanges <= limit + 1);
        prop_assert_eq!(exchanges, (good_at + 1).min(limit + 1));
        let expected = if good_at <= limit { 1.0 } else { 0.0 };
        prop_assert_eq!(report.scores["Accuracy"], expected);
    }
}
