//! Intercepted request model.

use axum::http::Method;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::cache::entry::RequestKey;

/// What the client intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Full page navigation.
    Document,
    Image,
    Style,
    Script,
    Font,
    /// `fetch()` / XHR and anything unclassified.
    Empty,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` header value.
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => Destination::Document,
            "image" => Destination::Image,
            "style" => Destination::Style,
            "script" | "worker" | "sharedworker" => Destination::Script,
            "font" => Destination::Font,
            _ => Destination::Empty,
        }
    }

    /// Work out the destination from request headers.
    ///
    /// `Sec-Fetch-Dest` wins when present; otherwise the `Accept` header is used.
    pub fn from_headers(headers: &[(String, String)]) -> Self {
        if let Some(dest) = header(headers, "sec-fetch-dest") {
            return Self::from_fetch_dest(dest);
        }
        match header(headers, "accept") {
            Some(accept) if accept.contains("text/html") => Destination::Document,
            Some(accept) if accept.starts_with("image/") => Destination::Image,
            Some(accept) if accept.starts_with("text/css") => Destination::Style,
            _ => Destination::Empty,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Destination::Document => "document",
            Destination::Image => "image",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Font => "font",
            Destination::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// A request as seen by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::Empty,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_destination(Destination::Document)
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("{0} is not an origin-relative path")]
    NotOriginRelative(String),

    #[error("{0} resolves outside the origin")]
    OffOrigin(String),
}

/// Resolve `path_and_query` against `origin` without ever leaving it.
///
/// Only a path starting with a single `/` is accepted. Scheme-relative
/// (`//host/..`) and absolute references are rejected rather than resolved.
pub fn resolve_on_origin(origin: &Url, path_and_query: &str) -> Result<Url, TargetError> {
    let not_relative = || TargetError::NotOriginRelative(path_and_query.to_string());
    let mut chars = path_and_query.chars();
    if chars.next() != Some('/') || matches!(chars.next(), Some('/') | Some('\\')) {
        return Err(not_relative());
    }

    let without_fragment = path_and_query.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let mut url = origin.clone();
    url.set_path(path);
    url.set_query(query);
    url.set_fragment(None);

    if url.origin() != origin.origin() {
        return Err(TargetError::OffOrigin(path_and_query.to_string()));
    }
    Ok(url)
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Connection-level headers that must not be forwarded between hops.
pub fn is_hop_by_hop(name: &str) -> bool {
    const HOP_BY_HOP: &[&str] = &[
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
        "host",
        "content-length",
    ];
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fetch_dest_wins_over_accept() {
        let h = headers(&[("Sec-Fetch-Dest", "image"), ("Accept", "text/html")]);
        assert_eq!(Destination::from_headers(&h), Destination::Image);
    }

    #[test]
    fn test_accept_heuristic() {
        let h = headers(&[("accept", "text/html,application/xhtml+xml")]);
        assert_eq!(Destination::from_headers(&h), Destination::Document);

        let h = headers(&[("accept", "image/avif,image/webp,*/*")]);
        assert_eq!(Destination::from_headers(&h), Destination::Image);

        assert_eq!(Destination::from_headers(&[]), Destination::Empty);
    }

    #[test]
    fn test_key_includes_query() {
        let url = Url::parse("http://site.test/search?q=seo").unwrap();
        let key = GatewayRequest::get(url).key();
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "http://site.test/search?q=seo");
    }

    #[test]
    fn test_resolve_keeps_path_and_query() {
        let origin = Url::parse("http://site.test").unwrap();
        let url = resolve_on_origin(&origin, "/artikler/seo/?side=2#top").unwrap();
        assert_eq!(url.as_str(), "http://site.test/artikler/seo/?side=2");
    }

    #[test]
    fn test_resolve_rejects_other_hosts() {
        let origin = Url::parse("http://site.test").unwrap();
        for target in [
            "//evil.example/steal",
            "/\\evil.example/steal",
            "http://evil.example/collect",
            "evil.example/x",
            "",
        ] {
            assert!(
                matches!(
                    resolve_on_origin(&origin, target),
                    Err(TargetError::NotOriginRelative(_))
                ),
                "{target}"
            );
        }
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(!is_hop_by_hop("content-type"));
    }
}
