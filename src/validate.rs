//! Admission checks for inbound send payloads.

use serde::Deserialize;

use crate::attachment::Attachment;
use crate::error::RelayError;
use crate::request::SendRequest;

/// Maximum subject length in characters.
pub const MAX_SUBJECT_LEN: usize = 255;
/// Maximum body length in characters.
pub const MAX_BODY_LEN: usize = 10_000;

/// Raw JSON body of `POST /send-email`, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendPayload {
    pub subject: Option<String>,
    pub recipient: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub is_html: bool,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    /// Paths of files to attach, read from disk at delivery time.
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Check a raw payload for structural and semantic well-formedness.
///
/// Returns a typed [`SendRequest`] on success. No side effects; nothing is
/// submitted to the pool on failure.
pub fn validate(payload: SendPayload) -> Result<SendRequest, RelayError> {
    let subject = required_field(payload.subject, "subject")?;
    let recipient = required_field(payload.recipient, "recipient")?;
    let body = required_field(payload.body, "body")?;

    if !is_valid_address(&recipient) {
        return Err(RelayError::Validation(format!(
            "invalid recipient address: {recipient}"
        )));
    }
    if let Some(cc) = payload.cc.as_deref() {
        if !is_valid_address(cc) {
            return Err(RelayError::Validation(format!("invalid cc address: {cc}")));
        }
    }
    if let Some(bcc) = payload.bcc.as_deref() {
        if !is_valid_address(bcc) {
            return Err(RelayError::Validation(format!(
                "invalid bcc address: {bcc}"
            )));
        }
    }

    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(RelayError::Validation(format!(
            "subject exceeds {MAX_SUBJECT_LEN} characters"
        )));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(RelayError::Validation(format!(
            "body exceeds {MAX_BODY_LEN} characters"
        )));
    }

    Ok(SendRequest {
        subject,
        recipient,
        body,
        html: payload.is_html,
        cc: payload.cc,
        bcc: payload.bcc,
        attachments: payload
            .attachments
            .iter()
            .map(Attachment::from_path)
            .collect(),
    })
}

fn required_field(value: Option<String>, name: &str) -> Result<String, RelayError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RelayError::Validation(format!(
            "missing required field: {name}"
        ))),
    }
}

/// Basic `local@domain.tld` shape check: exactly one split on `@` with a
/// non-empty local part, and a domain containing a `.` with no embedded `@`.
///
/// This is deliberately not full RFC 5321 parsing; the upstream relay is the
/// final authority on deliverability.
fn is_valid_address(addr: &str) -> bool {
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    // A dot is required after the @, but not as the first or last character.
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
