//! Error types for the Hearth domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context (inference, memory, search, render) has its own
//! error enum; callers handle them at the boundary they care about.

use thiserror::Error;

/// Errors from the inference collaborator (Ollama or compatible).
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors from the persona memory store.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt memory file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors from the web search provider.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed search response: {0}")]
    Malformed(String),
}

/// Errors from the image render collaborator (ComfyUI or compatible).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render server unreachable: {0}")]
    Unreachable(String),

    #[error("Render request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Render job reported an error: {0}")]
    JobFailed(String),

    #[error("Render did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Failed to write image: {0}")]
    Write(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_error_displays_correctly() {
        let err = InferenceError::ApiError {
            status_code: 500,
            message: "model runner crashed".into(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("model runner crashed"));
    }

    #[test]
    fn render_timeout_displays_seconds() {
        let err = RenderError::Timeout(520);
        assert!(err.to_string().contains("520"));
    }

    #[test]
    fn memory_error_wraps_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = MemoryError::from(io);
        assert!(err.to_string().contains("denied"));
    }
}
