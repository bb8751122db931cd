//! Request routing and response classification rules.

use axum::http::Method;

use crate::cache::entry::GenerationKind;
use crate::config::CacheConfig;
use crate::gateway::request::GatewayRequest;

/// Why a request bypasses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NonGet,
    Excluded,
    NotActive,
}

impl PassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::NonGet => "non_get",
            PassReason::Excluded => "excluded",
            PassReason::NotActive => "not_active",
        }
    }
}

/// What the gateway does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Cache-first handling.
    Intercept,
    /// Straight to the network, no cache reads or writes.
    PassThrough(PassReason),
}

#[derive(Debug, Clone)]
pub struct RequestPolicy {
    excluded_prefixes: Vec<String>,
    static_prefix: String,
    static_extensions: Vec<String>,
}

impl RequestPolicy {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            excluded_prefixes: config.excluded_prefixes.clone(),
            static_prefix: config.static_prefix.clone(),
            static_extensions: config.static_extensions.clone(),
        }
    }

    /// Route a request while the gateway is active.
    ///
    /// Exclusion is checked first so administrative paths are never touched
    /// whatever the method.
    pub fn route(&self, request: &GatewayRequest) -> Route {
        if self.is_excluded(request.path()) {
            Route::PassThrough(PassReason::Excluded)
        } else if request.method != Method::GET {
            Route::PassThrough(PassReason::NonGet)
        } else {
            Route::Intercept
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn is_static_asset(&self, path: &str) -> bool {
        if path.starts_with(self.static_prefix.as_str()) {
            return true;
        }
        // Case-sensitive: `/hero.JPG` is dynamic.
        self.static_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Pick the generation a cacheable response is stored in.
    pub fn classify(&self, path: &str) -> GenerationKind {
        if self.is_static_asset(path) {
            GenerationKind::Static
        } else {
            GenerationKind::Dynamic
        }
    }
}
