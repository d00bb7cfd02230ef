//! Single-attempt SMTP transport.
//!
//! # Architecture: Why `async_trait`?
//!
//! The dispatch pool holds the transport as `Arc<dyn Transport>` so tests can
//! substitute a scripted implementation. Native async traits are not
//! object-safe; the `async_trait` macro boxes the future, and the one heap
//! allocation per attempt is noise next to SMTP round-trip latency.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::error::RelayError;
use crate::request::{SendRequest, SenderIdentity};

/// One delivery attempt to the upstream relay.
///
/// Implementations must not retry internally; retries are the scheduler's
/// responsibility, which keeps this a pure, testable single-attempt
/// primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect, authenticate, transmit one message, disconnect.
    async fn send_once(
        &self,
        sender: &SenderIdentity,
        request: &SendRequest,
    ) -> Result<(), RelayError>;
}

/// TLS mode for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// No TLS (dangerous, only for localhost/testing)
    None,
    /// STARTTLS - upgrade to TLS after connecting (port 587)
    StartTls,
    /// Implicit TLS - connect with TLS from start (port 465)
    Tls,
}

/// SMTP transport against a configured upstream relay.
///
/// A fresh connection is opened per attempt and authenticated with the
/// job's sender credentials, so concurrently running jobs never share
/// authentication state.
pub struct SmtpRelay {
    host: String,
    port: u16,
    tls: TlsMode,
}

impl SmtpRelay {
    /// Relay with STARTTLS negotiation (the common port-587 setup).
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: TlsMode::StartTls,
        }
    }

    /// Set the TLS mode.
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    fn build_transport(
        &self,
        sender: &SenderIdentity,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, RelayError> {
        let credentials = Credentials::new(sender.email.clone(), sender.app_password.clone());

        let builder = match self.tls {
            TlsMode::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            }
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .map_err(|e| RelayError::Transport(e.to_string()))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
                .map_err(|e| RelayError::Transport(e.to_string()))?,
        };

        Ok(builder.port(self.port).credentials(credentials).build())
    }

    /// Build the wire message from a request.
    fn build_message(
        &self,
        sender: &SenderIdentity,
        request: &SendRequest,
    ) -> Result<Message, RelayError> {
        let from = Mailbox::new(sender.display_name.clone(), sender.email.parse()?);

        let mut builder = Message::builder()
            .from(from)
            .to(request.recipient.parse()?)
            .subject(&request.subject);

        if let Some(cc) = request.cc.as_deref() {
            builder = builder.cc(cc.parse()?);
        }
        if let Some(bcc) = request.bcc.as_deref() {
            builder = builder.bcc(bcc.parse()?);
        }

        let body_type = if request.html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let message = if request.attachments.is_empty() {
            builder.header(body_type).body(request.body.clone())?
        } else {
            let mut multipart = MultiPart::mixed().singlepart(
                SinglePart::builder()
                    .header(body_type)
                    .body(request.body.clone()),
            );

            for attachment in &request.attachments {
                // Attachment errors abort the attempt and are not retried.
                let data = attachment.get_data()?;
                let content_type: ContentType = attachment
                    .content_type
                    .parse()
                    .unwrap_or(ContentType::TEXT_PLAIN);
                multipart = multipart.singlepart(
                    LettreAttachment::new(attachment.filename.clone()).body(data, content_type),
                );
            }

            builder.multipart(multipart)?
        };

        Ok(message)
    }
}

#[async_trait]
impl Transport for SmtpRelay {
    async fn send_once(
        &self,
        sender: &SenderIdentity,
        request: &SendRequest,
    ) -> Result<(), RelayError> {
        let message = self.build_message(sender, request)?;
        let transport = self.build_transport(sender)?;

        transport
            .send(message)
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;

    fn sender() -> SenderIdentity {
        SenderIdentity {
            email: "relay@example.com".into(),
            app_password: "secret".into(),
            display_name: Some("Relay".into()),
        }
    }

    fn request() -> SendRequest {
        SendRequest {
            subject: "Hello".into(),
            recipient: "user@example.com".into(),
            body: "Hi there".into(),
            html: false,
            cc: None,
            bcc: None,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn builds_plain_message_with_cc_and_bcc() {
        let relay = SmtpRelay::new("smtp.example.com", 587);
        let mut req = request();
        req.cc = Some("cc@example.com".into());
        req.bcc = Some("bcc@example.com".into());

        let message = relay.build_message(&sender(), &req).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("relay@example.com"));
        assert!(rendered.contains("To: user@example.com"));
        assert!(rendered.contains("Cc: cc@example.com"));
        assert!(rendered.contains("Hi there"));
    }

    #[test]
    fn html_flag_switches_content_type() {
        let relay = SmtpRelay::new("smtp.example.com", 587);
        let mut req = request();
        req.html = true;
        req.body = "<h1>Hi</h1>".into();

        let message = relay.build_message(&sender(), &req).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("Content-Type: text/html"));
    }

    #[test]
    fn attachments_become_mime_parts() {
        let relay = SmtpRelay::new("smtp.example.com", 587);
        let mut req = request();
        req.attachments
            .push(Attachment::from_bytes("notes.txt", b"attached".to_vec()));

        let message = relay.build_message(&sender(), &req).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("notes.txt"));
    }

    #[test]
    fn unreadable_attachment_aborts_message_build() {
        let relay = SmtpRelay::new("smtp.example.com", 587);
        let mut req = request();
        req.attachments
            .push(Attachment::from_path("/no/such/file.pdf"));

        let err = relay.build_message(&sender(), &req).unwrap_err();
        assert!(matches!(err, RelayError::AttachmentFileNotFound(_)));
        assert!(!err.is_retryable());
    }
}
