use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mailroom::{
    AppState, AuditLog, CredentialProvider, DispatchPool, EnvCredentials, RelayConfig, SmtpRelay,
    StatusLedger,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RelayConfig::from_env();
    info!(version = mailroom::VERSION, ?config, "starting mailroom");

    let credentials = Arc::new(EnvCredentials::new());
    if credentials.resolve().is_none() {
        // Provisioning happens out of band; until then every admission
        // fails with a 400.
        warn!("sender credentials unset (USER_EMAIL / USER_APP_PASSWORD); rejecting sends");
    }

    let ledger = StatusLedger::shared();
    let audit = AuditLog::shared(&config.audit_path)?;
    let transport = Arc::new(SmtpRelay::new(&config.smtp_host, config.smtp_port));
    let pool = Arc::new(DispatchPool::new(
        config.dispatch.clone(),
        transport,
        Arc::clone(&ledger),
        audit,
        config.retry.clone(),
    ));

    let state = AppState {
        ledger,
        pool: Arc::clone(&pool),
        credentials,
    };

    mailroom::serve(state, config.bind_addr).await?;

    pool.shutdown().await;
    Ok(())
}
