//! Sender credential resolution.
//!
//! Credentials are provisioned out of band; the relay only ever reads them.
//! The provider is injected into the API boundary so nothing in the pipeline
//! reaches into ambient process state mid-request.

use std::env;

use crate::request::SenderIdentity;

/// Supplies the sender identity used for outbound delivery.
///
/// Returning `None` means "unset": admission fails with missing credentials
/// and is never retried.
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self) -> Option<SenderIdentity>;
}

/// Reads `USER_EMAIL`, `USER_APP_PASSWORD`, and `EMAIL_FROM_NAME` from the
/// environment.
#[derive(Debug, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialProvider for EnvCredentials {
    fn resolve(&self) -> Option<SenderIdentity> {
        let email = env::var("USER_EMAIL").ok().filter(|v| !v.is_empty())?;
        let app_password = env::var("USER_APP_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty())?;
        let display_name = env::var("EMAIL_FROM_NAME").ok().filter(|v| !v.is_empty());

        Some(SenderIdentity {
            email,
            app_password,
            display_name,
        })
    }
}

/// Fixed credentials, for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    identity: Option<SenderIdentity>,
}

impl StaticCredentials {
    /// Provider that always resolves to the given identity.
    pub fn new(identity: SenderIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Provider that signals "unset".
    pub fn unset() -> Self {
        Self { identity: None }
    }
}

impl CredentialProvider for StaticCredentials {
    fn resolve(&self) -> Option<SenderIdentity> {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_resolves_configured_identity() {
        let provider = StaticCredentials::new(SenderIdentity {
            email: "relay@example.com".into(),
            app_password: "secret".into(),
            display_name: Some("Relay".into()),
        });
        let identity = provider.resolve().unwrap();
        assert_eq!(identity.email, "relay@example.com");
    }

    #[test]
    fn unset_provider_resolves_none() {
        assert!(StaticCredentials::unset().resolve().is_none());
    }
}
