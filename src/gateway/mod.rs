//! The offline cache gateway and the pieces it is built from.
//!
//! - [`worker`]: lifecycle, event dispatch and cache-first request handling
//! - [`request`]: intercepted request model and fetch destinations
//! - [`policy`]: pass-through rules and static/dynamic classification
//! - [`fetcher`]: network access (trait + reqwest implementation)
//! - [`fallback`]: offline substitutes
//! - [`lifecycle`]: `installing → activating → active`
//! - [`host`]: client/window/notification hooks of the hosting environment
//! - [`notify`]: push payloads and notifications
//! - [`sync`]: durable queue of deferred submissions

pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod host;
pub mod lifecycle;
pub mod notify;
pub mod policy;
pub mod request;
pub mod sync;
pub mod worker;

pub use error::GatewayError;
pub use worker::{EventOutcome, OfflineGateway, Served, ServedFrom, WorkerEvent};
