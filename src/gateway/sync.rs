//! Durable queue of submissions deferred while offline.
//!
//! Submissions are replayed in FIFO order when a sync event fires. A `2xx`
//! answer delivers a submission and a `4xx` rejects it; both remove it from
//! the queue. A `5xx` or a network failure stops the replay and leaves that
//! submission and everything after it queued for the next sync.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::http::Method;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::gateway::fetcher::Fetcher;
use crate::gateway::request::{resolve_on_origin, GatewayRequest};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid method {0}")]
    InvalidMethod(String),

    #[error("Invalid submission path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// A request held back until the network is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredSubmission {
    pub id: String,
    pub method: String,
    /// Path and query on the origin. Must start with a single `/`.
    pub path: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Bytes,
    pub queued_at: SystemTime,
}

impl DeferredSubmission {
    pub fn new(method: impl Into<String>, path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            body: body.into(),
            queued_at: SystemTime::now(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Check that the submission can be replayed against `origin`.
    pub fn validate(&self, origin: &Url) -> Result<(), SyncError> {
        self.to_request(origin).map(|_| ())
    }

    fn to_request(&self, origin: &Url) -> Result<GatewayRequest, SyncError> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| SyncError::InvalidMethod(self.method.clone()))?;
        let url = resolve_on_origin(origin, &self.path).map_err(|e| SyncError::InvalidPath {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let mut request = GatewayRequest::new(method, url).with_body(self.body.clone());
        request.headers = self.headers.clone();
        Ok(request)
    }
}

/// Outcome of one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub delivered: usize,
    pub rejected: usize,
    pub remaining: usize,
}

pub struct SyncQueue {
    pending: Mutex<VecDeque<DeferredSubmission>>,
    path: Option<PathBuf>,
}

impl SyncQueue {
    /// A queue that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            path: None,
        }
    }

    /// Open a queue persisted at `path`, loading anything left from a previous run.
    pub async fn open(path: &Path) -> Result<Self, SyncError> {
        let pending = match fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), pending = pending.len(), "Opened sync queue");
        Ok(Self {
            pending: Mutex::new(pending),
            path: Some(path.to_path_buf()),
        })
    }

    /// Append a submission and persist the queue.
    pub async fn enqueue(&self, submission: DeferredSubmission) -> Result<(), SyncError> {
        let mut pending = self.pending.lock().await;
        info!(id = %submission.id, method = %submission.method, path = %submission.path, "Deferred submission");
        pending.push_back(submission);
        self.persist(&pending).await
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    pub async fn pending(&self) -> Vec<DeferredSubmission> {
        self.pending.lock().await.iter().cloned().collect()
    }

    /// Replay queued submissions against `origin`, oldest first.
    pub async fn replay(&self, fetcher: &dyn Fetcher, origin: &Url) -> Result<SyncReport, SyncError> {
        let mut pending = self.pending.lock().await;
        let mut report = SyncReport::default();

        while let Some(submission) = pending.front() {
            let request = match submission.to_request(origin) {
                Ok(request) => request,
                Err(e) => {
                    warn!(id = %submission.id, error = %e, "Dropping malformed submission");
                    pending.pop_front();
                    report.rejected += 1;
                    continue;
                }
            };

            match fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    debug!(id = %submission.id, status = response.status, "Delivered submission");
                    pending.pop_front();
                    report.delivered += 1;
                }
                Ok(response) if (400..500).contains(&response.status) => {
                    warn!(id = %submission.id, status = response.status, "Submission rejected by origin");
                    pending.pop_front();
                    report.rejected += 1;
                }
                Ok(response) => {
                    warn!(id = %submission.id, status = response.status, "Origin unavailable, keeping queue");
                    break;
                }
                Err(e) => {
                    debug!(id = %submission.id, error = %e, "Still offline, keeping queue");
                    break;
                }
            }
        }

        report.remaining = pending.len();
        self.persist(&pending).await?;
        info!(
            delivered = report.delivered,
            rejected = report.rejected,
            remaining = report.remaining,
            "Background sync finished"
        );
        Ok(report)
    }

    async fn persist(&self, pending: &VecDeque<DeferredSubmission>) -> Result<(), SyncError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(pending)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}
