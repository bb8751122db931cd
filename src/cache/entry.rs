//! Cached entry types: request keys, response snapshots and generation kinds.
//!
//! An entry is the unit of storage in a generation. It pairs the request key
//! it answers with a fully buffered response, so the same snapshot can be
//! handed to a caller and persisted independently.

use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which of the two current generations a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationKind {
    /// Pre-declared build assets, populated at install.
    Static,
    /// Runtime responses stored as they succeed. Size-bounded.
    Dynamic,
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationKind::Static => write!(f, "static"),
            GenerationKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// How the response relates to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response. The only kind eligible for caching.
    Basic,
    /// Cross-origin response that opted in via CORS headers.
    Cors,
    /// Cross-origin response without CORS headers.
    Opaque,
    /// Network error placeholder.
    Error,
    /// Built locally by the gateway (fallbacks).
    Synthetic,
}

/// Lookup key for a cached entry: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    /// Key for a GET of `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseType,
}

impl ResponseSnapshot {
    pub fn new(status: u16, kind: ResponseType, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            kind,
        }
    }

    /// A same-origin `200 OK`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, ResponseType::Basic, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// `2xx` status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only same-origin `200` responses are stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseType::Basic
    }

    /// Approximate stored size, used for quota accounting.
    pub fn size(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(n, v)| n.len() + v.len())
                .sum::<usize>()
    }
}

/// A stored request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: RequestKey,
    pub response: ResponseSnapshot,
    pub stored_at: SystemTime,
}

impl CachedEntry {
    pub fn new(key: RequestKey, response: ResponseSnapshot) -> Self {
        Self {
            key,
            response,
            stored_at: SystemTime::now(),
        }
    }

    pub fn size(&self) -> usize {
        self.key.url.len() + self.response.size()
    }
}
