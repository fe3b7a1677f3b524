#[path = "validation/verdict.rs"]
mod verdict;

#[path = "validation/rules.rs"]
mod rules;

pub use rules::{normalize_tokens, Judgement, OnViolation, ResponseRules, Violation, ViolationKind};
pub use verdict::Verdict;
