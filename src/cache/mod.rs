//! Cache generations and the store that holds them.
//!
//! - [`entry`]: request keys, response snapshots, generation kinds
//! - [`generation`]: one named, insertion-ordered bucket of entries
//! - [`store`]: every generation, with quota accounting
//! - [`trimmer`]: periodic FIFO bound on the dynamic generation
//! - [`snapshot`]: zstd-compressed persistence across restarts

pub mod entry;
pub mod generation;
pub mod snapshot;
pub mod store;
pub mod trimmer;
