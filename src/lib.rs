//! offline-gateway: cache-first offline gateway for a news site.
//!
//! Sits between clients and the site origin and behaves like the site's
//! caching worker:
//!   install manifest → static generation, runtime responses → dynamic generation,
//!   cache-first lookups, offline page / placeholder image when the network fails.
//!
//! Generations are versioned; bumping the version discards the previous
//! deployment's caches on activation.

pub mod cache;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod server;
