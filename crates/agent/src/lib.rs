//! # Hearth Agent
//!
//! Turn orchestration: given a persona and a user question, decide what the
//! turn needs (web search, prior image context, image generation), assemble
//! the prompt, stream the answer, and persist both sides of the exchange to
//! the persona's memory.

pub mod caption;
pub mod gate;
pub mod prompt;
pub mod turn;
pub mod web;

pub use caption::describe_images;
pub use gate::{DecisionGate, GateTemplates};
pub use prompt::{PromptAssembly, DEFAULT_SYSTEM_PROMPT};
pub use turn::{TurnConfig, TurnRequest, TurnRunner};
pub use web::fetch_web_context;
