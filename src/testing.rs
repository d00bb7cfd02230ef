//! Test support: a scriptable transport.
//!
//! Used by the crate's own tests; exported so embedders can exercise the
//! pipeline without an upstream relay.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::RelayError;
use crate::request::{SendRequest, SenderIdentity};
use crate::transport::Transport;

/// Outcome of one scripted attempt.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Attempt succeeds.
    Succeed,
    /// Attempt fails with a transport error carrying this detail.
    Fail(String),
    /// Attempt fails with a non-retryable attachment error.
    FailAttachment(String),
    /// Attempt never completes.
    Hang,
    /// Attempt panics, exercising worker supervision.
    Panic,
}

/// Transport that replays a script of outcomes, then falls back to a
/// default outcome; records the (tokio-clock) instant of every attempt.
///
/// ```
/// use mailroom::testing::MockTransport;
///
/// // Two transport failures, then success.
/// let transport = MockTransport::fail_times(2, "connection refused");
/// ```
pub struct MockTransport {
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    attempts: Mutex<Vec<Instant>>,
}

impl MockTransport {
    /// Transport that succeeds on every attempt.
    pub fn succeeding() -> Self {
        Self::with_script(Vec::new(), MockOutcome::Succeed)
    }

    /// Transport that fails every attempt with the given detail.
    pub fn always_failing(detail: impl Into<String>) -> Self {
        Self::with_script(Vec::new(), MockOutcome::Fail(detail.into()))
    }

    /// Transport that fails `n` attempts with the given detail, then
    /// succeeds.
    pub fn fail_times(n: usize, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let script = (0..n).map(|_| MockOutcome::Fail(detail.clone())).collect();
        Self::with_script(script, MockOutcome::Succeed)
    }

    /// Transport whose attempts never complete.
    pub fn hanging() -> Self {
        Self::with_script(Vec::new(), MockOutcome::Hang)
    }

    /// Transport replaying `script`, then repeating `fallback`.
    pub fn with_script(script: Vec<MockOutcome>, fallback: MockOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Number of attempts observed so far.
    pub fn attempts(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Gaps between consecutive attempts, for asserting backoff.
    pub fn attempt_gaps(&self) -> Vec<Duration> {
        let attempts = self.attempts.lock();
        attempts
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_once(
        &self,
        _sender: &SenderIdentity,
        _request: &SendRequest,
    ) -> Result<(), RelayError> {
        self.attempts.lock().push(Instant::now());

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Succeed => Ok(()),
            MockOutcome::Fail(detail) => Err(RelayError::Transport(detail)),
            MockOutcome::FailAttachment(path) => Err(RelayError::AttachmentFileNotFound(path)),
            MockOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            MockOutcome::Panic => panic!("scripted transport panic"),
        }
    }
}
