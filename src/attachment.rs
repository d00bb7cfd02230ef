//! File attachments resolved at delivery time.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RelayError;

/// An email attachment.
///
/// Attachments can be created from bytes (eager) or from a file path, in
/// which case the file is read when the delivery attempt builds the message.
/// A path that has become unreadable by then surfaces as an attachment error
/// and aborts the attempt without retry.
///
/// ```
/// use mailroom::Attachment;
///
/// let report = Attachment::from_bytes("report.pdf", b"PDF content".to_vec())
///     .content_type("application/pdf");
///
/// let deferred = Attachment::from_path("/var/spool/mailroom/invoice.pdf");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename presented to the recipient.
    pub filename: String,
    /// MIME content type (e.g., "application/pdf", "image/png")
    pub content_type: String,
    /// Raw attachment data (empty for path-based attachments).
    pub data: Vec<u8>,
    /// File path to read at delivery time.
    #[serde(default)]
    pub path: Option<String>,
}

impl Attachment {
    /// Create an attachment from raw bytes.
    ///
    /// Content type is guessed from the filename extension.
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        Self {
            filename,
            content_type,
            data,
            path: None,
        }
    }

    /// Create an attachment that reads `path` at delivery time.
    ///
    /// The path is not checked here; admission never fails on attachments.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        Self {
            filename,
            content_type,
            data: Vec::new(),
            path: Some(path.to_string_lossy().to_string()),
        }
    }

    /// Set the content type explicitly.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Get the attachment data, reading from the path if necessary.
    ///
    /// # Errors
    ///
    /// - `AttachmentFileNotFound` - file path doesn't exist
    /// - `AttachmentReadError` - failed to read file
    /// - `AttachmentMissingContent` - no data and no path provided
    pub fn get_data(&self) -> Result<Vec<u8>, RelayError> {
        if let Some(ref path) = self.path {
            std::fs::read(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RelayError::AttachmentFileNotFound(path.clone())
                } else {
                    RelayError::AttachmentReadError(format!("{}: {}", path, e))
                }
            })
        } else if self.data.is_empty() {
            Err(RelayError::AttachmentMissingContent(self.filename.clone()))
        } else {
            Ok(self.data.clone())
        }
    }
}
