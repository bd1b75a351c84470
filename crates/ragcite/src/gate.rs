//! Admission gate for upstream calls.
//!
//! A [`Gate`] bounds how many calls to one collaborator (embedder or
//! generator) are in flight at once. Excess callers queue on a
//! `tokio::sync::Semaphore` instead of being rejected.
//!
//! Calls that fail with a rate-limit or quota condition (see
//! [`is_transient`]) are retried with exponential backoff plus jitter:
//! `base_delay * 2^(attempt - 1) + uniform(0, base_delay)`. Every other
//! failure surfaces immediately. The permit is released while sleeping so
//! a backing-off caller does not starve the others.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;

use ragcite_core::error::{is_transient, RagError};

#[derive(Debug, Clone)]
pub struct Gate {
    name: &'static str,
    permits: Arc<Semaphore>,
    max_attempts: u32,
    base_delay: Duration,
}

impl Gate {
    pub fn new(name: &'static str, max_concurrent: usize, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            name,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Run `op` under the gate, retrying transient failures.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RagError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| RagError::UpstreamFatal(format!("{} gate closed: {}", self.name, e)))?;
                op().await
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !is_transient(&err) {
                return Err(RagError::UpstreamFatal(format!("{:#}", err)));
            }
            if attempt >= self.max_attempts {
                return Err(RagError::UpstreamTransient {
                    attempts: attempt,
                    message: format!("{:#}", err),
                });
            }

            let delay = self.backoff(attempt);
            tracing::warn!(
                gate = self.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %format!("{:#}", err),
                "rate limited; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp = base_ms.saturating_mul(1 << (attempt - 1).min(10));
        let jitter = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base_ms)
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }
}
