//! Retry scheduler and dispatch pool tests.
//!
//! Timing-sensitive cases run on tokio's paused clock, so backoff delays
//! are observed exactly without real sleeping.

use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use mailroom::testing::{MockOutcome, MockTransport};
use mailroom::{
    run_to_completion, AttemptOutcome, AuditLog, DeliveryJob, DeliveryStatus, DispatchConfig,
    DispatchPool, RelayError, RequestId, RetryPolicy, SendRequest, SenderIdentity, StatusLedger,
};

fn sender() -> SenderIdentity {
    SenderIdentity {
        email: "relay@example.com".into(),
        app_password: "secret".into(),
        display_name: Some("Relay".into()),
    }
}

fn request(subject: &str) -> SendRequest {
    SendRequest {
        subject: subject.into(),
        recipient: "user@example.com".into(),
        body: "Hello".into(),
        html: false,
        cc: None,
        bcc: None,
        attachments: Vec::new(),
    }
}

fn job(subject: &str) -> DeliveryJob {
    DeliveryJob::new(RequestId::new(), request(subject), sender())
}

fn audit() -> (Arc<AuditLog>, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let log = AuditLog::shared(file.path()).unwrap();
    (log, file)
}

/// Poll the ledger until the id reaches a terminal state.
async fn wait_terminal(ledger: &StatusLedger, id: RequestId) -> DeliveryStatus {
    loop {
        if let Some(status) = ledger.get(id) {
            if status.is_terminal() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Retry Scheduler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn two_failures_then_success_yields_three_records_and_sent() {
    let transport = MockTransport::fail_times(2, "connection refused");
    let ledger = StatusLedger::new();
    let (audit, _file) = audit();
    let job = job("flaky");
    let id = job.id;

    run_to_completion(job, &transport, &ledger, &audit, &RetryPolicy::default()).await;

    assert_eq!(ledger.get(id), Some(DeliveryStatus::Sent));
    assert_eq!(transport.attempts(), 3);

    let records = audit.read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.request_id == id));
    assert_eq!(records[0].status, AttemptOutcome::Failed);
    assert_eq!(records[1].status, AttemptOutcome::Failed);
    assert_eq!(records[2].status, AttemptOutcome::Sent);
    assert!(records[2].error.is_none());
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_double_between_attempts() {
    let transport = MockTransport::fail_times(2, "connection refused");
    let ledger = StatusLedger::new();
    let (audit, _file) = audit();
    let policy = RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_secs(5),
    };

    run_to_completion(job("backoff"), &transport, &ledger, &audit, &policy).await;

    assert_eq!(
        transport.attempt_gaps(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
}

#[tokio::test(start_paused = true)]
async fn exhaustion_stops_after_max_retries_with_last_error() {
    let transport = MockTransport::always_failing("relay down");
    let ledger = StatusLedger::new();
    let (audit, _file) = audit();
    let job = job("doomed");
    let id = job.id;

    run_to_completion(job, &transport, &ledger, &audit, &RetryPolicy::default()).await;

    assert_eq!(transport.attempts(), 3);
    let status = ledger.get(id).unwrap();
    match status {
        DeliveryStatus::Failed(reason) => assert!(reason.contains("relay down")),
        other => panic!("expected failed, got {other:?}"),
    }

    let records = audit.read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.status == AttemptOutcome::Failed
            && r.error.as_deref().unwrap().contains("relay down")));
}

#[tokio::test(start_paused = true)]
async fn attachment_failure_aborts_without_retry() {
    let transport = MockTransport::with_script(
        vec![MockOutcome::FailAttachment("/gone/report.pdf".into())],
        MockOutcome::Succeed,
    );
    let ledger = StatusLedger::new();
    let (audit, _file) = audit();
    let job = job("attachment");
    let id = job.id;

    run_to_completion(job, &transport, &ledger, &audit, &RetryPolicy::default()).await;

    // No second attempt even though the fallback would succeed.
    assert_eq!(transport.attempts(), 1);
    assert!(matches!(ledger.get(id), Some(DeliveryStatus::Failed(_))));
    assert_eq!(audit.read_all().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_on_first_attempt_writes_single_record() {
    let transport = MockTransport::succeeding();
    let ledger = StatusLedger::new();
    let (audit, _file) = audit();
    let job = job("clean");
    let id = job.id;

    run_to_completion(job, &transport, &ledger, &audit, &RetryPolicy::default()).await;

    assert_eq!(transport.attempts(), 1);
    assert_eq!(ledger.get(id), Some(DeliveryStatus::Sent));

    let records = audit.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sender, "relay@example.com");
    assert_eq!(records[0].recipient, "user@example.com");
    assert_eq!(records[0].subject, "clean");
}

// ============================================================================
// Dispatch Pool
// ============================================================================

#[tokio::test(start_paused = true)]
async fn excess_submissions_fail_with_overloaded_instead_of_hanging() {
    let transport = Arc::new(MockTransport::hanging());
    let ledger = StatusLedger::shared();
    let (audit, _file) = audit();
    let pool = DispatchPool::new(
        DispatchConfig {
            workers: 1,
            queue_capacity: 1,
            submit_timeout: Duration::from_millis(50),
        },
        transport,
        Arc::clone(&ledger),
        audit,
        RetryPolicy::default(),
    );

    // First job is picked up by the worker and hangs there.
    pool.submit(job("in-flight")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Second job fills the queue.
    pool.submit(job("queued")).await.unwrap();

    // The pool is saturated: this submission must fail, not hang.
    let err = pool.submit(job("rejected")).await.unwrap_err();
    assert!(matches!(err, RelayError::Overloaded));
}

#[tokio::test(start_paused = true)]
async fn panicking_job_is_marked_failed_and_worker_survives() {
    let transport = Arc::new(MockTransport::with_script(
        vec![MockOutcome::Panic],
        MockOutcome::Succeed,
    ));
    let ledger = StatusLedger::shared();
    let (audit, _file) = audit();
    let pool = DispatchPool::new(
        DispatchConfig {
            workers: 1,
            ..Default::default()
        },
        transport,
        Arc::clone(&ledger),
        Arc::clone(&audit),
        RetryPolicy::default(),
    );

    let poisoned = job("poisoned");
    let poisoned_id = poisoned.id;
    ledger.set(poisoned_id, DeliveryStatus::Pending);
    pool.submit(poisoned).await.unwrap();

    match wait_terminal(&ledger, poisoned_id).await {
        DeliveryStatus::Failed(reason) => assert!(reason.contains("internal error")),
        other => panic!("expected failed, got {other:?}"),
    }

    // The same worker keeps accepting jobs.
    let healthy = job("healthy");
    let healthy_id = healthy.id;
    ledger.set(healthy_id, DeliveryStatus::Pending);
    pool.submit(healthy).await.unwrap();
    assert_eq!(
        wait_terminal(&ledger, healthy_id).await,
        DeliveryStatus::Sent
    );

    // The panicked attempt still left an audit trail.
    let records = audit.read_all().unwrap();
    assert!(records
        .iter()
        .any(|r| r.request_id == poisoned_id && r.status == AttemptOutcome::Failed));
}

#[tokio::test(start_paused = true)]
async fn jobs_run_concurrently_across_workers() {
    let transport = Arc::new(MockTransport::succeeding());
    let ledger = StatusLedger::shared();
    let (audit, _file) = audit();
    let pool = DispatchPool::new(
        DispatchConfig::default(),
        Arc::clone(&transport) as Arc<dyn mailroom::Transport>,
        Arc::clone(&ledger),
        audit,
        RetryPolicy::default(),
    );

    let mut ids = Vec::new();
    for i in 0..10 {
        let job = job(&format!("bulk {i}"));
        ids.push(job.id);
        ledger.set(job.id, DeliveryStatus::Pending);
        pool.submit(job).await.unwrap();
    }

    for id in ids {
        assert_eq!(wait_terminal(&ledger, id).await, DeliveryStatus::Sent);
    }
    assert_eq!(transport.attempts(), 10);
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_queued_jobs_before_returning() {
    let transport = Arc::new(MockTransport::succeeding());
    let ledger = StatusLedger::shared();
    let (audit, _file) = audit();
    let pool = DispatchPool::new(
        DispatchConfig {
            workers: 2,
            ..Default::default()
        },
        transport,
        Arc::clone(&ledger),
        audit,
        RetryPolicy::default(),
    );

    let job = job("drained");
    let id = job.id;
    ledger.set(id, DeliveryStatus::Pending);
    pool.submit(job).await.unwrap();

    pool.shutdown().await;
    assert_eq!(ledger.get(id), Some(DeliveryStatus::Sent));

    // Submissions after shutdown are rejected.
    let err = pool.submit(self::job("late")).await.unwrap_err();
    assert!(matches!(err, RelayError::Overloaded));
}
