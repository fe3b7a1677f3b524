use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{chat::ChatMessage, error::BackendError};

use super::ResponseGenerator;

/// Response function of a programmatic participant.
pub type ResponseFn = dyn Fn(&[ChatMessage]) -> String + Send + Sync + 'static;

enum Program {
    Fixed(String),
    Scripted {
        responses: Vec<String>,
        cursor: AtomicUsize,
    },
    Func(Box<ResponseFn>),
}

/// Deterministic in-process generator. Never fails and never blocks.
pub struct ProgrammedGenerator {
    program: Program,
    label: String,
}

impl ProgrammedGenerator {
    /// Always answers with the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self {
            program: Program::Fixed(response.into()),
            label: "programmatic (fixed)".to_string(),
        }
    }

    /// Answers with the given responses in order, repeating the last one
    /// once the script is exhausted.
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: Program::Scripted {
                responses: responses.into_iter().map(Into::into).collect(),
                cursor: AtomicUsize::new(0),
            },
            label: "programmatic (scripted)".to_string(),
        }
    }

    /// Computes the answer from the history with a pure function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> String + Send + Sync + 'static,
    {
        Self {
            program: Program::Func(Box::new(f)),
            label: "programmatic".to_string(),
        }
    }

    /// Overrides the descriptor shown in the players directory.
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn respond(&self, history: &[ChatMessage]) -> String {
        match &self.program {
            Program::Fixed(text) => text.clone(),
            Program::Scripted { responses, cursor } => {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                responses
                    .get(idx)
                    .or_else(|| responses.last())
                    .cloned()
                    .unwrap_or_default()
            }
            Program::Func(f) => f(history),
        }
    }
}

#[async_trait]
impl ResponseGenerator for ProgrammedGenerator {
    async fn generate(&self, history: &[ChatMessage]) -> Result<String, BackendError> {
        Ok(self.respond(history))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl fmt::Debug for ProgrammedGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgrammedGenerator")
            .field("label", &self.label)
            .finish()
    }
}
