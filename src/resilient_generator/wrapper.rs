use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;

use crate::{chat::ChatMessage, error::BackendError, generator::ResponseGenerator};

use super::config::ResilienceConfig;

/// Resilient wrapper that retries transient backend failures using exponential backoff.
///
/// This is the generator's own retry concern. It never looks at the content
/// of an utterance; reprompting on invalid answers is driven by the game.
pub struct ResilientGenerator {
    inner: Box<dyn ResponseGenerator>,
    cfg: ResilienceConfig,
}

impl ResilientGenerator {
    /// Creates a new resilient wrapper around an existing generator.
    pub fn new(inner: Box<dyn ResponseGenerator>, cfg: ResilienceConfig) -> Self {
        Self { inner, cfg }
    }

    fn is_retryable(err: &BackendError) -> bool {
        match err {
            BackendError::Http(_) => true,
            BackendError::Provider(_) => true,
            BackendError::ResponseFormat { .. } => true,
            BackendError::Json(_) => true,
            BackendError::Timeout(_) => true,
            BackendError::Auth(_) => false,
            BackendError::RetryExceeded { .. } => false,
        }
    }

    fn backoff_delay(&self, attempt_index: usize) -> Duration {
        let mut delay = self
            .cfg
            .base_delay_ms
            .saturating_mul(1u64 << attempt_index.min(16));
        delay = delay.min(self.cfg.max_delay_ms);
        if self.cfg.jitter {
            let span = (delay / 2).max(1);
            delay = delay.saturating_sub(rand::thread_rng().gen_range(0..span));
        }
        Duration::from_millis(delay)
    }
}

#[async_trait]
impl ResponseGenerator for ResilientGenerator {
    async fn generate(&self, history: &[ChatMessage]) -> Result<String, BackendError> {
        let max_attempts = self.cfg.max_attempts.max(1);
        let mut attempts = 0usize;

        loop {
            match self.inner.generate(history).await {
                Ok(text) => return Ok(text),
                Err(err) if !Self::is_retryable(&err) => return Err(err),
                Err(err) => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        return Err(BackendError::RetryExceeded {
                            attempts,
                            last_error: err.to_string(),
                        });
                    }
                    log::warn!("retrying generation after transient error: {err}");
                    sleep(self.backoff_delay(attempts - 1)).await;
                }
            }
        }
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct Flaky {
        failures: usize,
        calls: Arc<AtomicUsize>,
        auth: bool,
    }

    #[async_trait]
    impl ResponseGenerator for Flaky {
        async fn generate(&self, _history: &[ChatMessage]) -> Result<String, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.auth {
                return Err(BackendError::Auth("bad key".to_string()));
            }
            if call < self.failures {
                return Err(BackendError::Http("connection reset".to_string()));
            }
            Ok("ok".to_string())
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn fast_config(max_attempts: usize) -> ResilienceConfig {
        ResilienceConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Flaky {
            failures: 2,
            calls: calls.clone(),
            auth: false,
        };
        let generator = ResilientGenerator::new(Box::new(inner), fast_config(3));
        assert_eq!(generator.generate(&[]).await.expect("third try"), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Flaky {
            failures: 10,
            calls: calls.clone(),
            auth: false,
        };
        let generator = ResilientGenerator::new(Box::new(inner), fast_config(2));
        let err = generator.generate(&[]).await.expect_err("exhausted");
        assert!(matches!(
            err,
            BackendError::RetryExceeded { attempts: 2, ref last_error }
                if last_error.contains("connection reset")
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Flaky {
            failures: 0,
            calls: calls.clone(),
            auth: true,
        };
        let generator = ResilientGenerator::new(Box::new(inner), fast_config(5));
        assert!(matches!(
            generator.generate(&[]).await,
            Err(BackendError::Auth(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let inner = Flaky {
            failures: 0,
            calls: Arc::new(AtomicUsize::new(0)),
            auth: false,
        };
        let cfg = ResilienceConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 250,
            jitter: false,
        };
        let generator = ResilientGenerator::new(Box::new(inner), cfg);
        assert_eq!(generator.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(generator.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(generator.backoff_delay(5), Duration::from_millis(250));
    }
}
