//! Web augmentation stage.
//!
//! Turns search hits into a snippet block for the prompt plus a source URL
//! list for memory. Search failures degrade to "no web context" rather than
//! failing the turn.

use hearth_core::SearchProvider;
use tracing::warn;

const MAX_RESULTS: usize = 5;

/// Run a web search for `query` and return `(snippet_block, source_urls)`.
///
/// Hits without body text are dropped. Returns `(None, [])` when the search
/// fails or nothing usable comes back.
pub async fn fetch_web_context(
    search: &dyn SearchProvider,
    query: &str,
) -> (Option<String>, Vec<String>) {
    let hits = match search.search(query, MAX_RESULTS).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "Web search failed");
            return (None, Vec::new());
        }
    };

    let mut bodies = Vec::new();
    let mut sources = Vec::new();
    for hit in hits {
        let Some(snippet) = hit.snippet else {
            continue;
        };
        if snippet.is_empty() {
            continue;
        }
        bodies.push(snippet);
        if let Some(url) = hit.url {
            let url = url.trim();
            if !url.is_empty() {
                sources.push(url.to_string());
            }
        }
    }

    if bodies.is_empty() {
        (None, Vec::new())
    } else {
        (Some(bodies.join("\n")), sources)
    }
}
