//! In-memory delivery status tracking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::request::RequestId;

/// Current delivery state of one request.
///
/// `Pending` is initial; `Sent` and `Failed` are terminal and never revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed(String),
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Sent => f.write_str("sent"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Process-wide map from request id to delivery status.
///
/// Workers write distinct keys concurrently while the API boundary reads;
/// same-key writes are ordered by the single worker owning that job. Status
/// polling is eventually consistent: a read racing a write may observe the
/// earlier state.
#[derive(Debug, Default)]
pub struct StatusLedger {
    entries: RwLock<HashMap<RequestId, DeliveryStatus>>,
}

impl StatusLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Record the current status for a request.
    pub fn set(&self, id: RequestId, status: DeliveryStatus) {
        self.entries.write().insert(id, status);
    }

    /// Look up the current status for a request.
    pub fn get(&self, id: RequestId) -> Option<DeliveryStatus> {
        self.entries.read().get(&id).cloned()
    }

    /// Number of tracked requests.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the ledger tracks no requests.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Admission rollback: drop a single entry whose job was never accepted
    /// by the pool, so no id without delivery history lingers.
    pub fn remove(&self, id: RequestId) {
        self.entries.write().remove(&id);
    }

    /// Maintenance sweep: drop entries that reached a terminal state,
    /// keeping in-flight (`pending`) requests visible. Returns the number
    /// of entries removed.
    pub fn remove_terminal(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, status| !status.is_terminal());
        before - entries.len()
    }
}
