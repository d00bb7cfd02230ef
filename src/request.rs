//! Request identifiers and the values that travel through the dispatch
//! pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::Attachment;

/// Opaque unique token identifying one send request across its lifecycle.
///
/// Minted once at admission; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated send request.
///
/// Immutable once admitted; owned by the dispatch job until the job reaches
/// a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    /// Subject line (at most 255 characters).
    pub subject: String,
    /// Primary recipient address.
    pub recipient: String,
    /// Message body (at most 10000 characters).
    pub body: String,
    /// Whether the body is HTML rather than plain text.
    pub html: bool,
    /// Optional carbon-copy recipient.
    pub cc: Option<String>,
    /// Optional blind-carbon-copy recipient.
    pub bcc: Option<String>,
    /// File attachments, read from disk at delivery time.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// The sender identity used for one delivery.
///
/// Resolved from the credential provider at admission and cached in the job,
/// so retries never re-read credentials.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    /// Address the message is sent from.
    pub email: String,
    /// App password used for SMTP AUTH.
    pub app_password: String,
    /// Optional display name ("Name <email>").
    pub display_name: Option<String>,
}

impl SenderIdentity {
    /// The RFC 5322 mailbox string for the From header.
    pub fn mailbox(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// One unit of work for the dispatch pool.
///
/// Owned exclusively by the worker executing it and dropped when delivery
/// reaches a terminal state.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub id: RequestId,
    pub request: SendRequest,
    pub sender: SenderIdentity,
}

impl DeliveryJob {
    pub fn new(id: RequestId, request: SendRequest, sender: SenderIdentity) -> Self {
        Self {
            id,
            request,
            sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn request_id_round_trips_through_display() {
        let id = RequestId::new();
        assert_eq!(RequestId::parse(&id.to_string()), Some(id));
        assert_eq!(RequestId::parse("not-a-uuid"), None);
    }

    #[test]
    fn mailbox_includes_display_name_when_present() {
        let named = SenderIdentity {
            email: "relay@example.com".into(),
            app_password: "secret".into(),
            display_name: Some("Relay".into()),
        };
        assert_eq!(named.mailbox(), "Relay <relay@example.com>");

        let bare = SenderIdentity {
            display_name: None,
            ..named
        };
        assert_eq!(bare.mailbox(), "relay@example.com");
    }
}
