//! Network access for the gateway.
//!
//! The [`Fetcher`] trait is the gateway's only view of the network, so tests
//! and embedders can substitute their own origin.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use thiserror::Error;
use tracing::debug;
use url::{Origin, Url};

use crate::cache::entry::{ResponseSnapshot, ResponseType};
use crate::config::UpstreamConfig;
use crate::gateway::request::{is_hop_by_hop, GatewayRequest};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a network request. Any HTTP status is a successful fetch;
    /// only transport failures are errors.
    async fn fetch(&self, request: &GatewayRequest) -> Result<ResponseSnapshot, FetchError>;
}

/// Fetches from the upstream site over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Origin,
}

impl HttpFetcher {
    pub fn new(config: &UpstreamConfig, origin: &Url) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .redirect(Policy::limited(10));
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            origin: origin.origin(),
        })
    }

    /// Same-origin responses are `basic`; cross-origin ones are `cors` when
    /// the server opted in, `opaque` otherwise.
    fn response_type(&self, final_url: &Url, headers: &reqwest::header::HeaderMap) -> ResponseType {
        if final_url.origin() == self.origin {
            ResponseType::Basic
        } else if headers.contains_key(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN) {
            ResponseType::Cors
        } else {
            ResponseType::Opaque
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &GatewayRequest) -> Result<ResponseSnapshot, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let kind = self.response_type(response.url(), response.headers());
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        debug!(
            url = %request.url,
            status,
            kind = ?kind,
            bytes = body.len(),
            "Fetched from network"
        );

        Ok(ResponseSnapshot {
            status,
            headers,
            body,
            kind,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err.to_string())
    }
}
