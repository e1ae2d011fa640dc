use std::time::Duration;

use sondar_core::{ChatCompletion, CompletionRequest, LlmError};

/// Retries retriable gateway failures (timeout, rate limit, unavailable)
/// with exponential delay. Non-retriable failures propagate immediately.
pub struct Backoff<C> {
    inner: C,
    max_attempts: usize,
    base_delay: Duration,
}

impl<C> Backoff<C> {
    pub fn new(inner: C, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(250),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

#[async_trait::async_trait]
impl<C> ChatCompletion for Backoff<C>
where
    C: ChatCompletion,
{
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let mut delay = self.base_delay;
        for attempt in 1..=self.max_attempts {
            match self.inner.complete(request.clone()).await {
                Ok(content) => return Ok(content),
                Err(error) if !error.is_retriable() => return Err(error),
                Err(error) => {
                    if attempt == self.max_attempts {
                        tracing::warn!(%error, attempt, "LLM retries exhausted");
                        return Err(LlmError::RetriesExhausted {
                            max: self.max_attempts,
                        });
                    }
                    tracing::debug!(%error, attempt, ?delay, "retrying LLM call");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
        Err(LlmError::RetriesExhausted {
            max: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedClient;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let client = ScriptedClient::new(vec!["final".to_string()])
            .with_leading_failures(2);
        let backoff = Backoff::new(client, 3).with_base_delay(Duration::from_millis(1));
        let content = backoff
            .complete(CompletionRequest::new("s", "u"))
            .await
            .unwrap();
        assert_eq!(content, "final");
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let client = ScriptedClient::new(vec!["never".to_string()])
            .with_leading_failures(5);
        let backoff = Backoff::new(client, 2).with_base_delay(Duration::from_millis(1));
        let err = backoff
            .complete(CompletionRequest::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RetriesExhausted { max: 2 }));
    }
}
