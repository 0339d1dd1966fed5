//! # Hearth Memory
//!
//! Per-persona conversation memory, persisted as a single JSON file next to
//! the persona's configuration. The store enforces size caps on individual
//! fields and on the file as a whole (oldest-first eviction), and owns the
//! lifecycle of generated image artifacts referenced by entries.

pub mod artifact;
pub mod store;

pub use artifact::{artifact_url, new_image_filename, resolve_artifact};
pub use store::{EntryPatch, MemoryStore, StoreLimits};
