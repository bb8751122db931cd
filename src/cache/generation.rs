//! A named cache generation with insertion-ordered entries.
//!
//! Entries are looked up by exact key. Iteration, and therefore trimming,
//! follows insertion order: re-storing a key replaces the old entry and moves
//! it to the back.

use std::collections::{HashMap, VecDeque};

use crate::cache::entry::{CachedEntry, RequestKey, ResponseSnapshot};

#[derive(Debug, Clone)]
pub struct Generation {
    name: String,
    entries: HashMap<RequestKey, CachedEntry>,
    order: VecDeque<RequestKey>,
    bytes_used: usize,
}

impl Generation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            order: VecDeque::new(),
            bytes_used: 0,
        }
    }

    /// Rebuild a generation from entries listed oldest first.
    pub fn from_entries(name: impl Into<String>, entries: Vec<CachedEntry>) -> Self {
        let mut generation = Self::new(name);
        for entry in entries {
            generation.insert(entry);
        }
        generation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `response` under `key`, replacing any previous entry.
    pub fn put(&mut self, key: RequestKey, response: ResponseSnapshot) {
        self.insert(CachedEntry::new(key, response));
    }

    pub(crate) fn insert(&mut self, entry: CachedEntry) {
        self.remove(&entry.key);
        self.bytes_used += entry.size();
        self.order.push_back(entry.key.clone());
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn get(&self, key: &RequestKey) -> Option<&CachedEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove one entry. Returns it if it was present.
    pub fn remove(&mut self, key: &RequestKey) -> Option<CachedEntry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.bytes_used = self.bytes_used.saturating_sub(entry.size());
        Some(entry)
    }

    /// Remove the first-inserted entry.
    pub fn pop_oldest(&mut self) -> Option<CachedEntry> {
        let key = self.order.pop_front()?;
        let entry = self.entries.remove(&key)?;
        self.bytes_used = self.bytes_used.saturating_sub(entry.size());
        Some(entry)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &RequestKey> {
        self.order.iter()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &CachedEntry> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }
}
