//! File-backed persona memory store.
//!
//! One JSON file per persona, shaped as `{ "entries": [...] }` (a legacy
//! bare-array file is still accepted on read). All mutating operations
//! rewrite the whole file under a per-path async lock, so concurrent turns
//! against the same persona serialize instead of clobbering each other.

use crate::artifact::resolve_artifact;
use chrono::{DateTime, Utc};
use hearth_core::{EntryRole, MemoryEntry, MemoryError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Size caps applied on write.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Ceiling for the pretty-printed memory file, in characters.
    pub max_file_chars: usize,
    /// Cap for entry content and generated image prompts.
    pub max_item_chars: usize,
    /// Cap for image context summaries.
    pub max_image_context_chars: usize,
    /// Maximum number of source URLs kept per entry.
    pub max_sources: usize,
    /// Cap for each source URL.
    pub max_source_url_chars: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_file_chars: 50_000,
            max_item_chars: 1_000,
            max_image_context_chars: 2_000,
            max_sources: 20,
            max_source_url_chars: 500,
        }
    }
}

/// Partial update for an existing entry. `None` fields are left untouched;
/// `generated_image_path` is doubly optional so it can be cleared.
#[derive(Debug, Default, Clone)]
pub struct EntryPatch {
    pub content: Option<String>,
    pub generated_image_path: Option<Option<String>>,
    pub generated_image_prompt: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
struct MemoryDoc {
    #[serde(default)]
    entries: Vec<MemoryEntry>,
}

/// Handle to one persona's memory file.
#[derive(Clone)]
pub struct MemoryStore {
    path: PathBuf,
    personas_root: PathBuf,
    limits: StoreLimits,
    lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    /// Open the store at `path`. `personas_root` is used to resolve artifact
    /// URLs back to files for cascade deletion.
    pub fn new(
        path: impl Into<PathBuf>,
        personas_root: impl Into<PathBuf>,
        limits: StoreLimits,
    ) -> Self {
        let path = path.into();
        let lock = lock_for(&path);
        Self {
            path,
            personas_root: personas_root.into(),
            limits,
            lock,
        }
    }

    /// All entries, oldest first. A missing file is an empty store; a file
    /// that fails to parse is an error, never silently discarded.
    pub async fn load_all(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    /// Append an entry and return its assigned id.
    ///
    /// The entry's fields are capped, role-inappropriate fields dropped, and
    /// oldest entries evicted until the file fits under the ceiling (always
    /// keeping at least the newest entry).
    pub async fn append(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        self.sanitize(&mut entry);
        entry.timestamp = next_timestamp(entries.last().map(|e| e.timestamp.as_str()));
        let id = entry.timestamp.clone();
        entries.push(entry);

        self.persist(entries).await?;
        Ok(id)
    }

    /// Patch the entry with the given id. Returns `false` (and leaves the
    /// file untouched) when no entry matches.
    pub async fn update(&self, id: &str, patch: EntryPatch) -> Result<bool, MemoryError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        let Some(entry) = entries.iter_mut().find(|e| e.timestamp == id) else {
            return Ok(false);
        };
        if let Some(content) = patch.content {
            entry.content = cap(&content, self.limits.max_item_chars);
        }
        if let Some(path) = patch.generated_image_path {
            entry.generated_image_path = path;
        }
        if let Some(prompt) = patch.generated_image_prompt {
            entry.generated_image_prompt = Some(cap(&prompt, self.limits.max_item_chars));
        }

        self.persist(entries).await?;
        Ok(true)
    }

    /// Delete the entry with the given id, removing any generated image it
    /// references. Returns `false` when no entry matches.
    pub async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        let Some(pos) = entries.iter().position(|e| e.timestamp == id) else {
            return Ok(false);
        };
        let removed = entries.remove(pos);
        self.remove_artifact(&removed).await;

        self.persist(entries).await?;
        Ok(true)
    }

    /// Delete every entry and every generated image they reference.
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize, MemoryError> {
        let _guard = self.lock.lock().await;
        let entries = self.read_entries().await?;

        for entry in &entries {
            self.remove_artifact(entry).await;
        }
        let count = entries.len();

        self.persist(Vec::new()).await?;
        Ok(count)
    }

    async fn read_entries(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let doc_err = match serde_json::from_str::<MemoryDoc>(&text) {
            Ok(doc) => return Ok(doc.entries),
            Err(e) => e,
        };
        if let Ok(entries) = serde_json::from_str::<Vec<MemoryEntry>>(&text) {
            return Ok(entries);
        }
        warn!(path = %self.path.display(), error = %doc_err, "Memory file is corrupt");
        Err(MemoryError::Corrupt(doc_err))
    }

    async fn persist(&self, mut entries: Vec<MemoryEntry>) -> Result<(), MemoryError> {
        let mut text = serde_json::to_string_pretty(&MemoryDoc {
            entries: std::mem::take(&mut entries),
        })?;

        // Evict oldest-first until the file fits, keeping at least one entry.
        loop {
            let mut doc: MemoryDoc = serde_json::from_str(&text)?;
            if text.chars().count() <= self.limits.max_file_chars || doc.entries.len() <= 1 {
                break;
            }
            let evicted = doc.entries.remove(0);
            debug!(id = %evicted.timestamp, "Evicting oldest memory entry");
            text = serde_json::to_string_pretty(&doc)?;
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }

    fn sanitize(&self, entry: &mut MemoryEntry) {
        entry.content = cap(&entry.content, self.limits.max_item_chars);
        if let Some(ctx) = &entry.image_context {
            // Summaries are stored as a single line.
            let normalized = ctx.replace(['\n', '\r'], " ").trim().to_string();
            entry.image_context = Some(cap(&normalized, self.limits.max_image_context_chars));
        }
        match entry.role {
            EntryRole::User => {
                entry.persona_name = None;
                entry.sources.clear();
                entry.generated_image_path = None;
                entry.generated_image_prompt = None;
            }
            EntryRole::Assistant => {
                entry.sources = entry
                    .sources
                    .iter()
                    .map(|url| cap(url.trim(), self.limits.max_source_url_chars))
                    .filter(|url| !url.is_empty())
                    .take(self.limits.max_sources)
                    .collect();
                if let Some(prompt) = &entry.generated_image_prompt {
                    entry.generated_image_prompt =
                        Some(cap(prompt, self.limits.max_item_chars));
                }
            }
        }
    }

    async fn remove_artifact(&self, entry: &MemoryEntry) {
        let Some(url) = &entry.generated_image_path else {
            return;
        };
        let Some(path) = resolve_artifact(&self.personas_root, url) else {
            warn!(url, "Refusing to delete artifact with suspicious path");
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "Failed to delete generated image");
        }
    }
}

/// Cap `text` to `max` characters, replacing the tail with `...`.
fn cap(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}

/// Next entry id: current UTC time at microsecond precision, bumped past the
/// previous entry's id if the clock has not advanced.
fn next_timestamp(last: Option<&str>) -> String {
    let mut candidate = Utc::now();
    if let Some(last) = last
        && let Ok(prev) = DateTime::parse_from_rfc3339(last)
    {
        let prev = prev.with_timezone(&Utc);
        if candidate <= prev {
            candidate = prev + chrono::Duration::microseconds(1);
        }
    }
    candidate.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Process-wide lock registry keyed by resolved file path, so every handle
/// to the same memory file shares one lock.
fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let registry = LOCKS.get_or_init(|| StdMutex::new(HashMap::new()));
    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
    registry.entry(key).or_default().clone()
}
