//! Prometheus counters for the gateway.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct GatewayMetrics {
    registry: Registry,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    /// Labelled by generation kind.
    pub cache_stores: IntCounterVec,
    pub store_failures: IntCounter,
    /// Labelled by fallback kind (`offline_page`, `placeholder_image`).
    pub fallbacks: IntCounterVec,
    pub network_failures: IntCounter,
    /// Labelled by pass-through reason.
    pub pass_throughs: IntCounterVec,
    pub trimmed_entries: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("offline_gateway".to_string()), None)?;

        let cache_hits = IntCounter::new("cache_hits_total", "Requests answered from a cache generation")?;
        let cache_misses = IntCounter::new("cache_misses_total", "Intercepted requests not found in any generation")?;
        let cache_stores = IntCounterVec::new(
            Opts::new("cache_stores_total", "Network responses written to a generation"),
            &["generation"],
        )?;
        let store_failures = IntCounter::new("store_failures_total", "Cache writes that failed")?;
        let fallbacks = IntCounterVec::new(
            Opts::new("fallbacks_total", "Offline substitutes served"),
            &["kind"],
        )?;
        let network_failures = IntCounter::new("network_failures_total", "Fetches that failed at the transport level")?;
        let pass_throughs = IntCounterVec::new(
            Opts::new("pass_throughs_total", "Requests forwarded without touching the cache"),
            &["reason"],
        )?;
        let trimmed_entries = IntCounter::new("trimmed_entries_total", "Entries removed by the dynamic trimmer")?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_stores.clone()))?;
        registry.register(Box::new(store_failures.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(network_failures.clone()))?;
        registry.register(Box::new(pass_throughs.clone()))?;
        registry.register(Box::new(trimmed_entries.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            cache_stores,
            store_failures,
            fallbacks,
            network_failures,
            pass_throughs,
            trimmed_entries,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
