//! Snapshot persistence for the cache store.
//!
//! The store is serialized to JSON and zstd-compressed into a single file so
//! generations survive a process restart. Writes go to a temporary sibling
//! first and are renamed into place.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cache::entry::CachedEntry;
use crate::cache::generation::Generation;
use crate::cache::store::CacheStore;

/// Bumped when the on-disk layout changes.
const SNAPSHOT_FORMAT: u32 = 1;

/// zstd compression level used for snapshots.
const ZSTD_LEVEL: i32 = 3;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot format {found} in {path}")]
    UnsupportedFormat { found: u32, path: PathBuf },
}

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    format: u32,
    generations: Vec<GenerationSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct GenerationSnapshot {
    name: String,
    /// Oldest first.
    entries: Vec<CachedEntry>,
}

/// Write the store to `path`. Returns the compressed size in bytes.
pub async fn save(store: &CacheStore, path: &Path) -> Result<usize, SnapshotError> {
    let snapshot = StoreSnapshot {
        format: SNAPSHOT_FORMAT,
        generations: store
            .generations()
            .map(|g| GenerationSnapshot {
                name: g.name().to_string(),
                entries: g.entries().cloned().collect(),
            })
            .collect(),
    };

    let json = serde_json::to_vec(&snapshot)?;
    let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &compressed).await?;
    fs::rename(&tmp, path).await?;

    debug!(
        path = %path.display(),
        raw = json.len(),
        compressed = compressed.len(),
        "Wrote cache snapshot"
    );
    Ok(compressed.len())
}

/// Load a store from `path`. Returns `None` if no snapshot exists yet.
pub async fn load(path: &Path, quota_bytes: usize) -> Result<Option<CacheStore>, SnapshotError> {
    let compressed = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let json = zstd::decode_all(&compressed[..])?;
    let snapshot: StoreSnapshot = serde_json::from_slice(&json)?;
    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(SnapshotError::UnsupportedFormat {
            found: snapshot.format,
            path: path.to_path_buf(),
        });
    }

    let mut generations: Vec<Generation> = snapshot
        .generations
        .into_iter()
        .map(|g| Generation::from_entries(g.name, g.entries))
        .collect();

    // A snapshot taken under a larger quota must still leave room to write.
    let mut bytes_used: usize = generations.iter().map(Generation::bytes_used).sum();
    while bytes_used > quota_bytes && !generations.is_empty() {
        let dropped = generations.remove(0);
        bytes_used -= dropped.bytes_used();
        warn!(
            generation = dropped.name(),
            bytes = dropped.bytes_used(),
            quota_bytes,
            "Snapshot over quota, dropping oldest generation"
        );
    }

    info!(
        path = %path.display(),
        generations = generations.len(),
        "Loaded cache snapshot"
    );
    Ok(Some(CacheStore::from_generations(quota_bytes, generations)))
}
