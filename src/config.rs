//! Environment-driven configuration.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::retry::RetryPolicy;

/// Relay configuration, read once at startup.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `MAILROOM_BIND` | `127.0.0.1:5000` | HTTP listen address |
/// | `SMTP_SERVER` | `smtp.gmail.com` | Upstream relay host |
/// | `SMTP_PORT` | `587` | Upstream relay port |
/// | `MAILROOM_WORKERS` | `5` | Delivery worker count |
/// | `MAILROOM_QUEUE_CAPACITY` | `32` | Waiting jobs before back-pressure |
/// | `MAILROOM_MAX_RETRIES` | `3` | Delivery attempts per request |
/// | `MAILROOM_RETRY_DELAY_SECS` | `5` | Initial backoff delay |
/// | `MAILROOM_AUDIT_LOG` | `email_audit.log` | Audit log path |
///
/// Sender credentials (`USER_EMAIL`, `USER_APP_PASSWORD`,
/// `EMAIL_FROM_NAME`) are read by the credential provider, not here.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub dispatch: DispatchConfig,
    pub retry: RetryPolicy,
    pub audit_path: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            dispatch: DispatchConfig::default(),
            retry: RetryPolicy::default(),
            audit_path: PathBuf::from("email_audit.log"),
        }
    }
}

impl RelayConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: parsed("MAILROOM_BIND", defaults.bind_addr),
            smtp_host: env::var("SMTP_SERVER").unwrap_or(defaults.smtp_host),
            smtp_port: parsed("SMTP_PORT", defaults.smtp_port),
            dispatch: DispatchConfig {
                workers: parsed("MAILROOM_WORKERS", defaults.dispatch.workers),
                queue_capacity: parsed(
                    "MAILROOM_QUEUE_CAPACITY",
                    defaults.dispatch.queue_capacity,
                ),
                submit_timeout: defaults.dispatch.submit_timeout,
            },
            retry: RetryPolicy {
                max_retries: parsed("MAILROOM_MAX_RETRIES", defaults.retry.max_retries),
                initial_delay: Duration::from_secs(parsed(
                    "MAILROOM_RETRY_DELAY_SECS",
                    defaults.retry.initial_delay.as_secs(),
                )),
            },
            audit_path: env::var("MAILROOM_AUDIT_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.audit_path),
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
