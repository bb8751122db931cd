//! The cache store: every generation the gateway knows about.
//!
//! The store is the only state shared between concurrent fetches. Individual
//! operations are atomic under the store lock, but nothing coordinates
//! operations across requests: two concurrent misses for the same URL may both
//! write, and the last write wins.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::entry::{CachedEntry, RequestKey, ResponseSnapshot};
use crate::cache::generation::Generation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },
}

/// Per-generation usage statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStats {
    pub name: String,
    pub entries: usize,
    pub bytes_used: usize,
}

/// All generations, in creation order.
#[derive(Debug, Clone)]
pub struct CacheStore {
    generations: Vec<Generation>,

    /// Total bytes allowed across all generations.
    quota_bytes: usize,
}

impl CacheStore {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            generations: Vec::new(),
            quota_bytes,
        }
    }

    /// Rebuild a store from previously saved generations.
    pub fn from_generations(quota_bytes: usize, generations: Vec<Generation>) -> Self {
        Self {
            generations,
            quota_bytes,
        }
    }

    /// Get a generation, creating it empty if it does not exist.
    pub fn open(&mut self, name: &str) -> &mut Generation {
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => {
                debug!(generation = name, "Created generation");
                self.generations.push(Generation::new(name));
                self.generations.len() - 1
            }
        };
        &mut self.generations[idx]
    }

    pub fn get(&self, name: &str) -> Option<&Generation> {
        self.generations.iter().find(|g| g.name() == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Generation names in creation order.
    pub fn keys(&self) -> Vec<String> {
        self.generations.iter().map(|g| g.name().to_string()).collect()
    }

    /// Delete a whole generation. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(idx) => {
                let removed = self.generations.remove(idx);
                info!(
                    generation = name,
                    entries = removed.len(),
                    "Deleted generation"
                );
                true
            }
            None => false,
        }
    }

    /// Find an exact match in any generation, oldest generation first.
    pub fn match_any(&self, key: &RequestKey) -> Option<&CachedEntry> {
        self.generations.iter().find_map(|g| g.get(key))
    }

    /// Store one response in `generation`, creating the generation if needed.
    pub fn put(
        &mut self,
        generation: &str,
        key: RequestKey,
        response: ResponseSnapshot,
    ) -> Result<(), StoreError> {
        self.put_all(generation, vec![(key, response)])
    }

    /// Store a batch of responses. Either every response is stored or none is.
    pub fn put_all(
        &mut self,
        generation: &str,
        batch: Vec<(RequestKey, ResponseSnapshot)>,
    ) -> Result<(), StoreError> {
        let entries: Vec<CachedEntry> = batch
            .into_iter()
            .map(|(key, response)| CachedEntry::new(key, response))
            .collect();

        // Bytes freed by entries this batch replaces.
        let replaced: usize = self
            .get(generation)
            .map(|g| {
                entries
                    .iter()
                    .filter_map(|e| g.get(&e.key))
                    .map(CachedEntry::size)
                    .sum()
            })
            .unwrap_or(0);
        let needed: usize = entries.iter().map(CachedEntry::size).sum();
        let available = self
            .quota_bytes
            .saturating_sub(self.bytes_used().saturating_sub(replaced));
        if needed > available {
            return Err(StoreError::QuotaExceeded { needed, available });
        }

        let target = self.open(generation);
        for entry in entries {
            target.insert(entry);
        }
        Ok(())
    }

    /// Total bytes used across all generations.
    pub fn bytes_used(&self) -> usize {
        self.generations.iter().map(Generation::bytes_used).sum()
    }

    pub fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    pub fn generations(&self) -> impl Iterator<Item = &Generation> {
        self.generations.iter()
    }

    pub fn stats(&self) -> Vec<GenerationStats> {
        self.generations
            .iter()
            .map(|g| GenerationStats {
                name: g.name().to_string(),
                entries: g.len(),
                bytes_used: g.bytes_used(),
            })
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.generations.iter().position(|g| g.name() == name)
    }
}

/// Thread-safe wrapper around the store.
pub type SharedStore = Arc<RwLock<CacheStore>>;

/// Create a new thread-safe store.
pub fn new_shared_store(quota_bytes: usize) -> SharedStore {
    Arc::new(RwLock::new(CacheStore::new(quota_bytes)))
}
