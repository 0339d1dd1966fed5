//! Generated image artifact paths.
//!
//! Artifacts are stored under `<personas_root>/<persona_id>/images/` and
//! referenced from memory entries by URL path, never by filesystem path.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// URL path for a generated image, as stored in memory entries and served
/// by the gateway.
pub fn artifact_url(persona_id: &str, filename: &str) -> String {
    format!("/personas/{persona_id}/images/{filename}")
}

/// Timestamp-derived filename for a new image, unique to the microsecond.
pub fn new_image_filename(now: DateTime<Utc>) -> String {
    format!(
        "{}_{}.png",
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_micros()
    )
}

/// Resolve an artifact URL path back to a filesystem path.
///
/// Returns `None` unless the path has the exact shape
/// `/personas/<id>/images/<filename>` with a plain filename: path
/// separators, `..`, and empty components are rejected.
pub fn resolve_artifact(personas_root: &Path, url_path: &str) -> Option<PathBuf> {
    let rest = url_path.strip_prefix("/personas/")?;
    let (persona_id, rest) = rest.split_once('/')?;
    let (dir, filename) = rest.split_once('/')?;
    if dir != "images" || !is_plain_component(persona_id) || !is_plain_component(filename) {
        return None;
    }
    Some(personas_root.join(persona_id).join("images").join(filename))
}

fn is_plain_component(s: &str) -> bool {
    !s.is_empty() && !s.contains("..") && !s.contains('/') && !s.contains('\\')
}
