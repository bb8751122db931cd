use thiserror::Error;

use crate::cache::snapshot::SnapshotError;
use crate::cache::store::StoreError;
use crate::gateway::fetcher::FetchError;
use crate::gateway::lifecycle::LifecycleState;
use crate::gateway::sync::SyncError;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport failure with no offline substitute.
    #[error(transparent)]
    Network(#[from] FetchError),

    #[error("Install failed at {path}: {reason}")]
    Install { path: String, reason: String },

    #[error("Invalid lifecycle state: expected {expected}, got {actual}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Sync queue error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed push payload: {0}")]
    PushPayload(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
