/// Outcome of validating one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The utterance is taken as the participant's answer for this exchange.
    Accept,
    /// The utterance is refused; the game may ask for a reprompt.
    Reject(String),
}

impl Verdict {
    pub fn reject(reason: impl Into<String>) -> Self {
        Verdict::Reject(reason.into())
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}
