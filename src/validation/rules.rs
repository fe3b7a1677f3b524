use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::verdict::Verdict;

/// What a game does when one of its rules is violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnViolation {
    /// Accept the utterance as the answer but flag the episode as failed.
    #[default]
    RecordFailure,
    /// Reject the utterance so the game can reprompt.
    Reprompt,
}

/// Which layer of the grammar was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The utterance does not start with the expected tag.
    Form,
    /// The utterance misses required content.
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layer = match self.kind {
            ViolationKind::Form => "form",
            ViolationKind::Content => "content",
        };
        write!(f, "{layer} violation: {}", self.detail)
    }
}

/// Verdict plus the violation that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgement {
    pub verdict: Verdict,
    pub violation: Option<Violation>,
}

impl Judgement {
    /// Accepted despite a violation, i.e. a recorded failure.
    pub fn records_failure(&self) -> bool {
        self.verdict.is_accept() && self.violation.is_some()
    }
}

/// Two-layer grammar of accepted utterances: a tagged prefix and a set of
/// required tokens, compared case-insensitively without punctuation.
#[derive(Debug, Clone, Default)]
pub struct ResponseRules {
    prefix: Option<String>,
    required: Vec<String>,
    on_form: OnViolation,
    on_content: OnViolation,
}

impl ResponseRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Utterances must begin with this tag, e.g. `GREET:`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Adds tokens every utterance must contain.
    pub fn require<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            for normalized in normalize_tokens(token.as_ref()) {
                if !self.required.contains(&normalized) {
                    self.required.push(normalized);
                }
            }
        }
        self
    }

    pub fn on_form(mut self, policy: OnViolation) -> Self {
        self.on_form = policy;
        self
    }

    pub fn on_content(mut self, policy: OnViolation) -> Self {
        self.on_content = policy;
        self
    }

    /// Checks form first, then content.
    pub fn check(&self, utterance: &str) -> Result<(), Violation> {
        if let Some(prefix) = &self.prefix {
            if !utterance.trim_start().starts_with(prefix.as_str()) {
                return Err(Violation {
                    kind: ViolationKind::Form,
                    detail: format!("answer must start with '{prefix}'"),
                });
            }
        }

        let tokens = normalize_tokens(utterance);
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|t| !tokens.contains(*t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Violation {
                kind: ViolationKind::Content,
                detail: format!("missing required words: {}", missing.join(", ")),
            });
        }
        Ok(())
    }

    /// Applies the configured policies to the outcome of [`check`](Self::check).
    pub fn judge(&self, utterance: &str) -> Judgement {
        match self.check(utterance) {
            Ok(()) => Judgement {
                verdict: Verdict::Accept,
                violation: None,
            },
            Err(violation) => {
                let policy = match violation.kind {
                    ViolationKind::Form => self.on_form,
                    ViolationKind::Content => self.on_content,
                };
                let verdict = match policy {
                    OnViolation::RecordFailure => Verdict::Accept,
                    OnViolation::Reprompt => Verdict::reject(violation.to_string()),
                };
                Judgement {
                    verdict,
                    violation: Some(violation),
                }
            }
        }
    }
}

/// Lowercases `text`, strips punctuation and splits it into words.
pub fn normalize_tokens(text: &str) -> Vec<String> {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    let re = PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"));
    re.replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
