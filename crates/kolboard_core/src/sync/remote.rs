//! Remote store boundary.
//!
//! # Responsibility
//! - Define the narrow typed contract the engine consumes from the backing
//!   store: a list read and a partial update keyed by item id.
//! - Carry remote failures as a stable error envelope.
//!
//! # Invariants
//! - `fetch_all` is idempotent and side-effect free.
//! - `mutate` is not assumed idempotent; callers issue at most one in-flight
//!   mutate per item and never retry automatically.

use crate::model::item::{Item, ItemId, ItemPatch};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote call that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Fetch,
    Mutate,
}

impl RemoteOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Mutate => "mutate",
        }
    }
}

/// Error envelope returned by remote adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub operation: RemoteOperation,
    /// Stable machine-readable code, e.g. `network_unavailable`.
    pub code: String,
    pub message: String,
    /// Whether repeating the user action may succeed.
    pub retryable: bool,
}

impl RemoteError {
    pub fn new(
        operation: RemoteOperation,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            operation,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "remote {} failed [{}]: {}",
            self.operation.as_str(),
            self.code,
            self.message
        )
    }
}

impl Error for RemoteError {}

/// Acknowledgement of an accepted partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateAck {
    pub item_id: ItemId,
    /// Row revision reported by the remote, when it tracks one.
    pub revision: Option<u64>,
}

/// Typed contract of the backing store.
#[async_trait]
pub trait RemoteSyncClient: Send + Sync {
    /// Reads the full item list.
    async fn fetch_all(&self) -> RemoteResult<Vec<Item>>;

    /// Applies a partial update to one item.
    async fn mutate(&self, id: &ItemId, patch: &ItemPatch) -> RemoteResult<MutateAck>;
}
