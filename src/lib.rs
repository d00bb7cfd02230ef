//! # Mailroom
//!
//! HTTP-fronted SMTP relay: accept a send request over REST, hand it to a
//! bounded worker pool, deliver through an upstream SMTP relay with
//! exponential-backoff retries, and keep both a pollable status ledger and
//! a durable audit log of every attempt.
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! SMTP_SERVER=smtp.example.com
//! SMTP_PORT=587
//! USER_EMAIL=relay@example.com
//! USER_APP_PASSWORD=app-password
//! EMAIL_FROM_NAME=Example Relay
//! ```
//!
//! Run the relay and drive it over HTTP:
//! ```bash
//! curl -X POST localhost:5000/send-email \
//!   -H 'content-type: application/json' \
//!   -d '{"subject": "Hi", "recipient": "user@example.com", "body": "Hello"}'
//! # => {"message":"Email request accepted","request_id":"..."}
//!
//! curl localhost:5000/email-status/<request_id>
//! # => {"request_id":"...","status":"pending"}   then "sent" / "failed (...)"
//! ```
//!
//! Delivery is asynchronous: the POST returns as soon as the job is queued,
//! and clients poll the status endpoint for the outcome.
//!
//! ## Embedding
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mailroom::{
//!     AppState, AuditLog, DispatchPool, EnvCredentials, RelayConfig, SmtpRelay, StatusLedger,
//! };
//!
//! let config = RelayConfig::from_env();
//! let ledger = StatusLedger::shared();
//! let audit = AuditLog::shared(&config.audit_path)?;
//! let transport = Arc::new(SmtpRelay::new(&config.smtp_host, config.smtp_port));
//! let pool = Arc::new(DispatchPool::new(
//!     config.dispatch.clone(), transport, ledger.clone(), audit, config.retry.clone(),
//! ));
//! let state = AppState { ledger, pool, credentials: Arc::new(EnvCredentials::new()) };
//! mailroom::serve(state, config.bind_addr).await?;
//! ```

/// The version of the mailroom crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod attachment;
mod audit;
mod config;
mod credentials;
mod dispatch;
mod error;
mod ledger;
mod request;
mod retry;
mod server;
mod transport;
mod validate;

pub mod testing;

// Re-exports
pub use attachment::Attachment;
pub use audit::{AttemptOutcome, AuditLog, AuditRecord};
pub use config::RelayConfig;
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use dispatch::{DispatchConfig, DispatchPool};
pub use error::RelayError;
pub use ledger::{DeliveryStatus, StatusLedger};
pub use request::{DeliveryJob, RequestId, SendRequest, SenderIdentity};
pub use retry::{run_to_completion, RetryPolicy};
pub use server::{create_router, serve, AppState};
pub use transport::{SmtpRelay, TlsMode, Transport};
pub use validate::{validate, SendPayload, MAX_BODY_LEN, MAX_SUBJECT_LEN};
