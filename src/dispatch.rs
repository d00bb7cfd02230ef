//! Bounded worker pool for asynchronous delivery.
//!
//! Replaces fire-and-forget per-request tasks with a fixed worker count and
//! an explicit back-pressure signal: when the queue stays full past a short
//! timeout, submission fails with `Overloaded` instead of growing
//! unboundedly.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditLog, AuditRecord};
use crate::error::RelayError;
use crate::ledger::{DeliveryStatus, StatusLedger};
use crate::request::DeliveryJob;
use crate::retry::{self, RetryPolicy};
use crate::transport::Transport;

/// Dispatch pool sizing.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of concurrent delivery workers.
    pub workers: usize,
    /// Jobs that may wait in the queue beyond the ones being executed.
    pub queue_capacity: usize,
    /// How long a submission may block on a full queue before failing.
    pub submit_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 32,
            submit_timeout: Duration::from_millis(250),
        }
    }
}

/// Fixed-width worker pool fed by a bounded queue.
///
/// Each worker pulls one job and runs the retry scheduler to completion
/// before becoming available again, so total in-flight work is bounded by
/// the worker count plus the queue capacity. Once submitted, a job always
/// runs to a terminal state; there is no cancellation path.
pub struct DispatchPool {
    tx: Mutex<Option<mpsc::Sender<DeliveryJob>>>,
    submit_timeout: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchPool {
    /// Spawn the workers and return the pool handle.
    pub fn new(
        config: DispatchConfig,
        transport: Arc<dyn Transport>,
        ledger: Arc<StatusLedger>,
        audit: Arc<AuditLog>,
        policy: RetryPolicy,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<DeliveryJob>(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "spawning delivery workers"
        );

        let handles = (0..config.workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let transport = Arc::clone(&transport);
                let ledger = Arc::clone(&ledger);
                let audit = Arc::clone(&audit);
                let policy = policy.clone();

                tokio::spawn(async move {
                    debug!(worker_id, "delivery worker starting");
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        run_supervised(job, &transport, &ledger, &audit, &policy).await;
                    }
                    debug!(worker_id, "delivery worker stopped");
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            submit_timeout: config.submit_timeout,
            handles: Mutex::new(handles),
        }
    }

    /// Hand a job to the pool.
    ///
    /// Blocks the caller for at most the configured submit timeout when the
    /// queue is full, then fails with [`RelayError::Overloaded`].
    pub async fn submit(&self, job: DeliveryJob) -> Result<(), RelayError> {
        let Some(tx) = self.tx.lock().clone() else {
            return Err(RelayError::Overloaded);
        };

        match tx.send_timeout(job, self.submit_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(job)) => {
                warn!(request_id = %job.id, "dispatch queue full, rejecting submission");
                Err(RelayError::Overloaded)
            }
            Err(SendTimeoutError::Closed(_)) => Err(RelayError::Overloaded),
        }
    }

    /// Stop accepting submissions and wait for in-flight jobs to finish.
    pub async fn shutdown(&self) {
        // Dropping the sender lets workers drain the queue and exit.
        self.tx.lock().take();

        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        info!(workers = handles.len(), "waiting for delivery workers to drain");
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "delivery worker terminated abnormally");
            }
        }
    }
}

/// Run one job in its own task so a panic is contained: the job is marked
/// failed and the worker keeps accepting work.
async fn run_supervised(
    job: DeliveryJob,
    transport: &Arc<dyn Transport>,
    ledger: &Arc<StatusLedger>,
    audit: &Arc<AuditLog>,
    policy: &RetryPolicy,
) {
    let id = job.id;
    let sender = job.sender.email.clone();
    let recipient = job.request.recipient.clone();
    let subject = job.request.subject.clone();

    let task = {
        let transport = Arc::clone(transport);
        let ledger = Arc::clone(ledger);
        let audit = Arc::clone(audit);
        let policy = policy.clone();
        tokio::spawn(async move {
            retry::run_to_completion(job, transport.as_ref(), &ledger, &audit, &policy).await;
        })
    };

    if let Err(join_err) = task.await {
        let reason = if join_err.is_panic() {
            "internal error: delivery task panicked"
        } else {
            "internal error: delivery task aborted"
        };
        error!(request_id = %id, error = %join_err, "delivery task did not complete");

        if let Err(err) = audit.append(&AuditRecord::failed(
            id, &sender, &recipient, &subject, reason,
        )) {
            error!(request_id = %id, error = %err, "audit append failed");
        }
        ledger.set(id, DeliveryStatus::Failed(reason.to_string()));
    }
}
