//! Shared test fixtures: an in-memory origin and a recording host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::Method;
use url::Url;

use offline_gateway::cache::entry::{ResponseSnapshot, ResponseType};
use offline_gateway::cache::store::new_shared_store;
use offline_gateway::config::Config;
use offline_gateway::gateway::fetcher::{FetchError, Fetcher};
use offline_gateway::gateway::host::ClientHost;
use offline_gateway::gateway::notify::Notification;
use offline_gateway::gateway::request::GatewayRequest;
use offline_gateway::gateway::sync::SyncQueue;
use offline_gateway::gateway::OfflineGateway;

pub const ORIGIN: &str = "http://site.test";

/// A scripted origin. Unknown paths answer `404`.
#[derive(Default)]
pub struct MemoryOrigin {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    offline: AtomicBool,
    requests: Mutex<Vec<(Method, String)>>,
    urls: Mutex<Vec<String>>,
}

impl MemoryOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` as a same-origin `200` at `path` (path plus optional query).
    pub fn page(&self, path: &str, body: &str) {
        self.route(path, ResponseSnapshot::ok(body.to_string()));
    }

    pub fn route(&self, path: &str, response: ResponseSnapshot) {
        self.routes.lock().unwrap().insert(path.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of requests for `path` that reached the origin (or failed offline).
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p == path)
            .count()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Absolute URLs of every request, in arrival order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

fn path_of(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

#[async_trait]
impl Fetcher for MemoryOrigin {
    async fn fetch(&self, request: &GatewayRequest) -> Result<ResponseSnapshot, FetchError> {
        let path = path_of(&request.url);
        self.requests
            .lock()
            .unwrap()
            .push((request.method.clone(), path.clone()));
        self.urls.lock().unwrap().push(request.url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("connection refused".to_string()));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| ResponseSnapshot::new(404, ResponseType::Basic, "not found")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SkipWaiting,
    ClaimClients,
    Shown(Notification),
    Closed(String),
    Opened(String),
}

#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ClientHost for RecordingHost {
    async fn skip_waiting(&self) {
        self.record(HostEvent::SkipWaiting);
    }

    async fn claim_clients(&self) {
        self.record(HostEvent::ClaimClients);
    }

    async fn show_notification(&self, notification: Notification) {
        self.record(HostEvent::Shown(notification));
    }

    async fn close_notification(&self, id: &str) {
        self.record(HostEvent::Closed(id.to_string()));
    }

    async fn open_window(&self, url: &str) {
        self.record(HostEvent::Opened(url.to_string()));
    }
}

pub struct Fixture {
    pub gateway: Arc<OfflineGateway>,
    pub origin: Arc<MemoryOrigin>,
    pub host: Arc<RecordingHost>,
}

impl Fixture {
    pub fn url(&self, path: &str) -> Url {
        self.gateway.origin().join(path).unwrap()
    }
}

/// Small manifest used by most tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.upstream.origin = ORIGIN.to_string();
    config.cache.app_name = "app".to_string();
    config.cache.version = "1".to_string();
    config.cache.static_assets = vec!["/".to_string(), "/offline.html".to_string()];
    config
}

/// An origin that serves every manifest path of `config`.
pub fn origin_for(config: &Config) -> Arc<MemoryOrigin> {
    let origin = MemoryOrigin::new();
    for path in &config.cache.static_assets {
        origin.page(path, &format!("asset {path}"));
    }
    origin.page("/offline.html", "<h1>Du er offline</h1>");
    origin
}

pub fn fixture_with(config: Config, origin: Arc<MemoryOrigin>) -> Fixture {
    let host = Arc::new(RecordingHost::default());
    let store = new_shared_store(config.cache.quota_bytes);
    let gateway = OfflineGateway::new(
        Arc::new(config),
        store,
        origin.clone(),
        host.clone(),
        SyncQueue::in_memory(),
    )
    .unwrap();
    Fixture {
        gateway: Arc::new(gateway),
        origin,
        host,
    }
}

/// A gateway that has been installed and activated.
pub async fn active_fixture() -> Fixture {
    let config = test_config();
    let origin = origin_for(&config);
    let fixture = fixture_with(config, origin);
    fixture.gateway.install().await.unwrap();
    fixture.gateway.activate().await.unwrap();
    fixture
}
