//! # Hearth Core
//!
//! Domain types, collaborator traits, and error definitions for the Hearth
//! persona chat runtime. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (inference service, search provider, image
//! renderer) is defined as a trait here. Implementations live in
//! `hearth-providers`. This enables:
//! - Swapping collaborators via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod entry;
pub mod error;
pub mod event;
pub mod inference;
pub mod persona;
pub mod render;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use entry::{EntryRole, MemoryEntry};
pub use error::{InferenceError, MemoryError, RenderError, SearchError};
pub use event::TurnEvent;
pub use inference::{GenerateRequest, Inference, StreamFragment};
pub use persona::{DecisionToggles, Persona};
pub use render::ImageRenderer;
pub use search::{SearchHit, SearchProvider};
