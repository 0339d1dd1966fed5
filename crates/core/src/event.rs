//! Turn-level streaming events.
//!
//! `TurnEvent` is what the orchestrator emits while answering a turn and
//! what the gateway forwards to clients over SSE. A turn produces zero or
//! more progress events followed by exactly one [`TurnEvent::Done`].

use serde::{Deserialize, Serialize};

/// Events emitted by the turn orchestrator.
///
/// - `searching` — a web search is in flight
/// - `thinking`  — advisory reasoning/progress text, not part of the answer
/// - `token`     — partial answer text from the LLM
/// - `done`      — the turn is complete (exactly one per turn, always last)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A web search is running.
    Searching,

    /// Advisory reasoning or progress text. Never part of the final answer.
    Thinking { content: String },

    /// Partial answer text from the LLM.
    Token { content: String },

    /// The turn is complete — final metadata.
    Done {
        /// Web source URLs used for this answer (possibly empty).
        sources: Vec<String>,
        /// The final answer text, when it was not already delivered as
        /// `token` events (image branch, failure messages).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_text: Option<String>,
        /// Id of the persisted user entry for this turn.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        /// Id of the persisted assistant entry, when one was written.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assistant_id: Option<String>,
        /// Error description when the turn failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// True when an image render is still running in the background.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        image_generating: bool,
    },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Thinking { .. } => "thinking",
            Self::Token { .. } => "token",
            Self::Done { .. } => "done",
        }
    }

    /// True for the terminal event of a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_token() {
        let event = TurnEvent::Token {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_done_omits_empty_fields() {
        let event = TurnEvent::Done {
            sources: vec![],
            final_text: None,
            user_id: Some("2026-01-01T00:00:00.000000Z".into()),
            assistant_id: None,
            error: None,
            image_generating: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(!json.contains("final_text"));
        assert!(!json.contains("error"));
        assert!(!json.contains("image_generating"));
    }

    #[test]
    fn event_serialization_done_background_image() {
        let event = TurnEvent::Done {
            sources: vec![],
            final_text: Some("Generating image...".into()),
            user_id: None,
            assistant_id: None,
            error: None,
            image_generating: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""image_generating":true"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(TurnEvent::Searching.event_type(), "searching");
        assert_eq!(
            TurnEvent::Thinking { content: "x".into() }.event_type(),
            "thinking"
        );
        assert_eq!(
            TurnEvent::Token { content: "x".into() }.event_type(),
            "token"
        );
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(!TurnEvent::Searching.is_terminal());
        let done = TurnEvent::Done {
            sources: vec![],
            final_text: None,
            user_id: None,
            assistant_id: None,
            error: None,
            image_generating: false,
        };
        assert!(done.is_terminal());
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"thinking","content":"hmm"}"#;
        let event: TurnEvent = serde_json::from_str(json).unwrap();
        match event {
            TurnEvent::Thinking { content } => assert_eq!(content, "hmm"),
            _ => panic!("Wrong variant"),
        }
    }
}
