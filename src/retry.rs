//! Retry scheduling with exponential backoff.
//!
//! The scheduler fully owns transport-failure recovery: nothing above it
//! sees a raised fault, only the eventual ledger state. Backoff sleeps block
//! the owning worker's job, never the pool or the API boundary.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::audit::{AuditLog, AuditRecord};
use crate::ledger::{DeliveryStatus, StatusLedger};
use crate::request::DeliveryJob;
use crate::transport::Transport;

/// Attempt-bounded backoff policy.
///
/// Deliberately not time-bounded: a slow upstream cannot cause unbounded
/// retry loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts per job (including the first).
    pub max_retries: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// The backoff delays a fully exhausting job would sleep, in order.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay;
        let mut delays = Vec::new();
        for _ in 1..self.max_retries {
            delays.push(delay);
            delay *= 2;
        }
        delays
    }
}

/// Drive one job to a terminal state.
///
/// Writes one audit record per attempt and updates the ledger exactly once,
/// at the terminal transition.
pub async fn run_to_completion(
    job: DeliveryJob,
    transport: &dyn Transport,
    ledger: &StatusLedger,
    audit: &AuditLog,
    policy: &RetryPolicy,
) {
    let mut delay = policy.initial_delay;
    // A misconfigured ceiling of zero still gets one attempt; every job must
    // reach a terminal state.
    let max_retries = policy.max_retries.max(1);

    for attempt in 1..=max_retries {
        match transport.send_once(&job.sender, &job.request).await {
            Ok(()) => {
                append(
                    audit,
                    AuditRecord::sent(
                        job.id,
                        &job.sender.email,
                        &job.request.recipient,
                        &job.request.subject,
                    ),
                );
                ledger.set(job.id, DeliveryStatus::Sent);
                info!(request_id = %job.id, attempt, "email delivered");
                return;
            }
            Err(err) => {
                append(
                    audit,
                    AuditRecord::failed(
                        job.id,
                        &job.sender.email,
                        &job.request.recipient,
                        &job.request.subject,
                        err.to_string(),
                    ),
                );

                let exhausted = attempt == max_retries;
                if exhausted || !err.is_retryable() {
                    ledger.set(job.id, DeliveryStatus::Failed(err.to_string()));
                    error!(
                        request_id = %job.id,
                        attempt,
                        error = %err,
                        retryable = err.is_retryable(),
                        "delivery failed terminally"
                    );
                    return;
                }

                warn!(
                    request_id = %job.id,
                    attempt,
                    error = %err,
                    retry_in_secs = delay.as_secs(),
                    "delivery attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

fn append(audit: &AuditLog, record: AuditRecord) {
    // The attempt outcome already lives in the ledger; a sink failure is
    // logged rather than allowed to change delivery behavior.
    if let Err(err) = audit.append(&record) {
        error!(request_id = %record.request_id, error = %err, "audit append failed");
    }
}
