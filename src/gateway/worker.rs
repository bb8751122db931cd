//! The offline cache gateway.
//!
//! [`OfflineGateway`] owns the lifecycle state machine and handles every
//! event delivered by its host:
//!
//! 1. `install` fetches the whole manifest into the static generation (all or nothing)
//! 2. `activate` deletes every generation that is not current
//! 3. `fetch` answers cache-first, stores cacheable misses, falls back when offline
//! 4. `sync`, `push` and `notificationclick` drive the auxiliary handlers
//!
//! All persistent state lives in the shared [`CacheStore`](crate::cache::store::CacheStore),
//! so any number of fetches may be handled concurrently.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::future::try_join_all;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::entry::{GenerationKind, RequestKey, ResponseSnapshot};
use crate::cache::snapshot;
use crate::cache::store::{GenerationStats, SharedStore};
use crate::cache::trimmer::Trimmer;
use crate::config::Config;
use crate::gateway::error::GatewayError;
use crate::gateway::fallback::placeholder_image;
use crate::gateway::fetcher::{FetchError, Fetcher};
use crate::gateway::host::ClientHost;
use crate::gateway::lifecycle::LifecycleState;
use crate::gateway::notify::{build_notification, NotificationClick, PushPayload, ACTION_EXPLORE};
use crate::gateway::policy::{PassReason, RequestPolicy, Route};
use crate::gateway::request::{Destination, GatewayRequest};
use crate::gateway::sync::{DeferredSubmission, SyncQueue, SyncReport};
use crate::metrics::GatewayMetrics;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
    Fallback,
    PassThrough,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Cache => "cache",
            ServedFrom::Network => "network",
            ServedFrom::Fallback => "fallback",
            ServedFrom::PassThrough => "pass-through",
        }
    }
}

/// A response together with its source.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub source: ServedFrom,
}

/// Events the host delivers to the gateway.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(GatewayRequest),
    Sync { tag: String },
    /// Raw push message data, if the message carried any.
    Push(Option<Bytes>),
    NotificationClick(NotificationClick),
}

/// Result of a settled event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Settled,
    Responded(Served),
    Synced(SyncReport),
}

pub struct OfflineGateway {
    config: Arc<Config>,
    origin: Url,
    policy: RequestPolicy,
    static_name: String,
    dynamic_name: String,
    store: SharedStore,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn ClientHost>,
    sync_queue: SyncQueue,
    metrics: Arc<GatewayMetrics>,
    state: RwLock<LifecycleState>,
    /// Work started on behalf of an event that outlives its response (cache writes).
    tasks: TaskTracker,
    settle_lock: Mutex<()>,
}

impl OfflineGateway {
    pub fn new(
        config: Arc<Config>,
        store: SharedStore,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn ClientHost>,
        sync_queue: SyncQueue,
    ) -> Result<Self, GatewayError> {
        let origin = Url::parse(&config.upstream.origin)?;
        let metrics = Arc::new(GatewayMetrics::new()?);

        Ok(Self {
            policy: RequestPolicy::new(&config.cache),
            static_name: config.cache.static_cache_name(),
            dynamic_name: config.cache.dynamic_cache_name(),
            origin,
            config,
            store,
            fetcher,
            host,
            sync_queue,
            metrics,
            state: RwLock::new(LifecycleState::Installing),
            tasks: TaskTracker::new(),
            settle_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn sync_queue(&self) -> &SyncQueue {
        &self.sync_queue
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn generation_stats(&self) -> Vec<GenerationStats> {
        self.store.read().await.stats()
    }

    /// Dispatch one host event. The returned future settles when every step
    /// the event started has finished, except fire-and-forget cache writes
    /// (see [`settle`](Self::settle)).
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, GatewayError> {
        match event {
            WorkerEvent::Install => self.install().await.map(|_| EventOutcome::Settled),
            WorkerEvent::Activate => self.activate().await.map(|_| EventOutcome::Settled),
            WorkerEvent::Fetch(request) => self.handle(request).await.map(EventOutcome::Responded),
            WorkerEvent::Sync { tag } => {
                if tag == self.config.sync.tag {
                    self.sync().await.map(EventOutcome::Synced)
                } else {
                    debug!(tag, "Ignoring unknown sync tag");
                    Ok(EventOutcome::Settled)
                }
            }
            WorkerEvent::Push(data) => self.push(data).await.map(|_| EventOutcome::Settled),
            WorkerEvent::NotificationClick(click) => {
                self.notification_click(click).await;
                Ok(EventOutcome::Settled)
            }
        }
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────

    /// Populate the static generation from the install manifest.
    ///
    /// Every manifest path must fetch with a `2xx` status; otherwise nothing
    /// is stored and the gateway stays in `installing`.
    pub async fn install(&self) -> Result<(), GatewayError> {
        self.expect_state(LifecycleState::Installing).await?;
        info!(
            generation = %self.static_name,
            assets = self.config.cache.static_assets.len(),
            "Installing"
        );

        let fetches = self
            .config
            .cache
            .static_assets
            .iter()
            .map(|path| self.fetch_manifest_entry(path));
        let staged = try_join_all(fetches).await?;

        self.store.write().await.put_all(&self.static_name, staged)?;
        self.advance(LifecycleState::Installing).await;
        self.host.skip_waiting().await;
        info!(generation = %self.static_name, "Installed");
        Ok(())
    }

    async fn fetch_manifest_entry(
        &self,
        path: &str,
    ) -> Result<(RequestKey, ResponseSnapshot), GatewayError> {
        let url = self.origin.join(path)?;
        let request = GatewayRequest::get(url);
        let install_error = |reason: String| GatewayError::Install {
            path: path.to_string(),
            reason,
        };

        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| install_error(e.to_string()))?;
        if !response.is_success() {
            return Err(install_error(format!("status {}", response.status)));
        }
        Ok((request.key(), response))
    }

    /// Delete every generation that is not the current static or dynamic one,
    /// then claim open clients.
    pub async fn activate(&self) -> Result<(), GatewayError> {
        self.expect_state(LifecycleState::Activating).await?;

        let deleted = {
            let mut store = self.store.write().await;
            let stale: Vec<String> = store
                .keys()
                .into_iter()
                .filter(|name| *name != self.static_name && *name != self.dynamic_name)
                .collect();
            for name in &stale {
                info!(generation = %name, "Deleting old generation");
                store.delete(name);
            }
            store.open(&self.static_name);
            store.open(&self.dynamic_name);
            stale.len()
        };

        self.advance(LifecycleState::Activating).await;
        self.host.claim_clients().await;
        info!(deleted, "Activated");
        Ok(())
    }

    async fn expect_state(&self, expected: LifecycleState) -> Result<(), GatewayError> {
        let actual = *self.state.read().await;
        if actual != expected {
            return Err(GatewayError::InvalidState { expected, actual });
        }
        Ok(())
    }

    async fn advance(&self, from: LifecycleState) {
        let mut state = self.state.write().await;
        if *state == from {
            if let Some(next) = from.next() {
                debug!(from = %from, to = %next, "Lifecycle transition");
                *state = next;
            }
        }
    }

    // ─── Fetch interception ────────────────────────────────────────────────

    /// Answer a request.
    ///
    /// Returns `Err(GatewayError::Network)` only when the network failed and
    /// no offline substitute applies.
    pub async fn handle(&self, request: GatewayRequest) -> Result<Served, GatewayError> {
        let route = if self.state().await.can_intercept() {
            self.policy.route(&request)
        } else {
            Route::PassThrough(PassReason::NotActive)
        };

        match route {
            Route::PassThrough(reason) => self.pass_through(&request, reason).await,
            Route::Intercept => self.cache_first(request).await,
        }
    }

    async fn pass_through(
        &self,
        request: &GatewayRequest,
        reason: PassReason,
    ) -> Result<Served, GatewayError> {
        debug!(url = %request.url, method = %request.method, reason = reason.as_str(), "Passing through");
        self.metrics
            .pass_throughs
            .with_label_values(&[reason.as_str()])
            .inc();
        let response = self.fetcher.fetch(request).await?;
        Ok(Served {
            response,
            source: ServedFrom::PassThrough,
        })
    }

    async fn cache_first(&self, request: GatewayRequest) -> Result<Served, GatewayError> {
        let key = request.key();

        let cached = self
            .store
            .read()
            .await
            .match_any(&key)
            .map(|entry| entry.response.clone());
        if let Some(response) = cached {
            debug!(key = %key, "Cache hit");
            self.metrics.cache_hits.inc();
            return Ok(Served {
                response,
                source: ServedFrom::Cache,
            });
        }
        self.metrics.cache_misses.inc();

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    let kind = self.policy.classify(request.path());
                    self.store_in_background(kind, key, response.clone());
                } else {
                    debug!(key = %key, status = response.status, kind = ?response.kind, "Not caching response");
                }
                Ok(Served {
                    response,
                    source: ServedFrom::Network,
                })
            }
            Err(err) => {
                self.metrics.network_failures.inc();
                self.fallback(&request, err).await
            }
        }
    }

    /// Write a response copy without delaying the caller. Failures are logged only.
    fn store_in_background(&self, kind: GenerationKind, key: RequestKey, response: ResponseSnapshot) {
        let generation = match kind {
            GenerationKind::Static => self.static_name.clone(),
            GenerationKind::Dynamic => self.dynamic_name.clone(),
        };
        let store = self.store.clone();
        let metrics = self.metrics.clone();

        self.tasks.spawn(async move {
            let result = store.write().await.put(&generation, key.clone(), response);
            match result {
                Ok(()) => {
                    debug!(key = %key, generation = %generation, "Stored response");
                    metrics
                        .cache_stores
                        .with_label_values(&[kind.to_string().as_str()])
                        .inc();
                }
                Err(e) => {
                    warn!(key = %key, generation = %generation, error = %e, "Cache write failed");
                    metrics.store_failures.inc();
                }
            }
        });
    }

    async fn fallback(&self, request: &GatewayRequest, err: FetchError) -> Result<Served, GatewayError> {
        match request.destination {
            Destination::Document => {
                let offline = self.offline_page().await?;
                match offline {
                    Some(response) => {
                        info!(url = %request.url, error = %err, "Offline, serving offline page");
                        self.metrics.fallbacks.with_label_values(&["offline_page"]).inc();
                        Ok(Served {
                            response,
                            source: ServedFrom::Fallback,
                        })
                    }
                    None => {
                        warn!(url = %request.url, "Offline page missing from cache");
                        Err(err.into())
                    }
                }
            }
            Destination::Image => {
                debug!(url = %request.url, error = %err, "Offline, serving placeholder image");
                self.metrics
                    .fallbacks
                    .with_label_values(&["placeholder_image"])
                    .inc();
                Ok(Served {
                    response: placeholder_image(),
                    source: ServedFrom::Fallback,
                })
            }
            _ => {
                debug!(url = %request.url, destination = %request.destination, error = %err, "Offline, no fallback");
                Err(err.into())
            }
        }
    }

    async fn offline_page(&self) -> Result<Option<ResponseSnapshot>, GatewayError> {
        let key = RequestKey::get(self.origin.join(&self.config.cache.offline_page)?.as_str());
        Ok(self
            .store
            .read()
            .await
            .match_any(&key)
            .map(|entry| entry.response.clone()))
    }

    /// Wait for every background cache write started so far.
    ///
    /// Concurrent callers are serialized so none reopens the tracker while
    /// another is still waiting on it.
    pub async fn settle(&self) {
        let _guard = self.settle_lock.lock().await;
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    // ─── Maintenance ───────────────────────────────────────────────────────

    /// Run one trim cycle over the dynamic generation.
    pub async fn trim_dynamic(&self) -> Option<RequestKey> {
        let trimmer = self.trimmer();
        let evicted = trimmer.trim_once(&mut *self.store.write().await);
        if evicted.is_some() {
            self.metrics.trimmed_entries.inc();
        }
        evicted
    }

    fn trimmer(&self) -> Trimmer {
        Trimmer::new(
            self.dynamic_name.clone(),
            self.config.cache.dynamic_max_entries,
        )
    }

    /// Start the periodic trimmer. It stops when `shutdown` is cancelled.
    pub fn spawn_trimmer(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let metrics = self.metrics.clone();
        tokio::spawn(self.trimmer().run(
            self.store.clone(),
            self.config.cache.trim_interval(),
            shutdown,
            move |_| metrics.trimmed_entries.inc(),
        ))
    }

    /// Persist the store if a snapshot path is configured.
    pub async fn save_snapshot(&self) -> Result<(), GatewayError> {
        if let Some(path) = &self.config.cache.snapshot_path {
            let store = self.store.read().await;
            let bytes = snapshot::save(&store, path).await?;
            info!(path = %path.display(), bytes, "Saved cache snapshot");
        }
        Ok(())
    }

    // ─── Auxiliary handlers ────────────────────────────────────────────────

    /// Queue a submission for the next background sync.
    ///
    /// Submissions that cannot be replayed against the origin are refused.
    pub async fn defer(&self, submission: DeferredSubmission) -> Result<(), GatewayError> {
        submission.validate(&self.origin)?;
        self.sync_queue.enqueue(submission).await?;
        Ok(())
    }

    async fn sync(&self) -> Result<SyncReport, GatewayError> {
        Ok(self
            .sync_queue
            .replay(self.fetcher.as_ref(), &self.origin)
            .await?)
    }

    async fn push(&self, data: Option<Bytes>) -> Result<(), GatewayError> {
        let Some(data) = data else {
            debug!("Push without data, nothing to show");
            return Ok(());
        };
        let payload: PushPayload = serde_json::from_slice(&data)?;
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let notification = build_notification(&self.config.notifications, payload, now_ms);
        self.host.show_notification(notification).await;
        Ok(())
    }

    async fn notification_click(&self, click: NotificationClick) {
        self.host.close_notification(&click.notification_id).await;
        if click.action.as_deref() == Some(ACTION_EXPLORE) {
            self.host.open_window(&self.config.notifications.open_url).await;
        }
    }
}
