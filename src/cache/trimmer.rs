//! Dynamic generation trimming.
//!
//! A growth guard, not an LRU: on every tick, if the dynamic generation holds
//! more than `max_entries`, the single first-inserted entry is removed. Reads
//! never refresh an entry's position.

use std::time::Duration;

use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::entry::RequestKey;
use crate::cache::store::{CacheStore, SharedStore};

pub struct Trimmer {
    generation: String,
    max_entries: usize,
}

impl Trimmer {
    pub fn new(generation: impl Into<String>, max_entries: usize) -> Self {
        Self {
            generation: generation.into(),
            max_entries,
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Run one trim cycle. Returns the evicted key, if any.
    pub fn trim_once(&self, store: &mut CacheStore) -> Option<RequestKey> {
        let generation = match store.get(&self.generation) {
            Some(g) if g.len() > self.max_entries => g,
            _ => return None,
        };
        debug!(
            generation = generation.name(),
            entries = generation.len(),
            max = self.max_entries,
            "Dynamic generation over bound"
        );

        let evicted = store.open(&self.generation).pop_oldest()?;
        info!(generation = %self.generation, key = %evicted.key, "Trimmed oldest entry");
        Some(evicted.key)
    }

    /// Trim on a fixed interval until `shutdown` fires.
    ///
    /// `on_trim` runs after every cycle that evicted something.
    pub async fn run<F>(
        self,
        store: SharedStore,
        period: Duration,
        shutdown: CancellationToken,
        mut on_trim: F,
    ) where
        F: FnMut(&RequestKey),
    {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; skip it so the first trim happens one period in.
        interval.tick().await;
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                tick = ticks.next() => {
                    if tick.is_none() {
                        break;
                    }
                    let evicted = {
                        let mut store = store.write().await;
                        self.trim_once(&mut store)
                    };
                    if let Some(key) = evicted {
                        on_trim(&key);
                    }
                }
            }
        }
        debug!(generation = %self.generation, "Trimmer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::ResponseSnapshot;
    use crate::cache::store::new_shared_store;

    fn key(i: usize) -> RequestKey {
        RequestKey::get(format!("http://site.test/article/{i}"))
    }

    #[test]
    fn test_trim_below_bound_is_noop() {
        let mut store = CacheStore::new(1 << 20);
        for i in 0..3 {
            store.put("dyn", key(i), ResponseSnapshot::ok("x")).unwrap();
        }
        let trimmer = Trimmer::new("dyn", 3);
        assert!(trimmer.trim_once(&mut store).is_none());
        assert_eq!(store.get("dyn").unwrap().len(), 3);
    }

    #[test]
    fn test_trim_missing_generation_is_noop() {
        let mut store = CacheStore::new(1 << 20);
        assert!(Trimmer::new("dyn", 1).trim_once(&mut store).is_none());
        assert!(!store.has("dyn"));
    }

    #[test]
    fn test_trim_removes_only_one_per_cycle() {
        let mut store = CacheStore::new(1 << 20);
        for i in 0..5 {
            store.put("dyn", key(i), ResponseSnapshot::ok("x")).unwrap();
        }
        let trimmer = Trimmer::new("dyn", 2);
        assert_eq!(trimmer.trim_once(&mut store), Some(key(0)));
        assert_eq!(store.get("dyn").unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_trims_on_interval() {
        let store = new_shared_store(1 << 20);
        {
            let mut s = store.write().await;
            for i in 0..4 {
                s.put("dyn", key(i), ResponseSnapshot::ok("x")).unwrap();
            }
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Trimmer::new("dyn", 2).run(
            store.clone(),
            Duration::from_secs(60),
            shutdown.clone(),
            |_| {},
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.read().await.get("dyn").unwrap().len(), 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.read().await.get("dyn").unwrap().len(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.read().await.get("dyn").unwrap().len(), 2);

        shutdown.cancel();
        task.await.unwrap();
    }
}
