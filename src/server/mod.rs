//! HTTP server fronting the gateway.
//!
//! - [`api`]: control routes, router and shared state
//! - [`proxy`]: intercepting fallback route for every other path

pub mod api;
pub mod proxy;
