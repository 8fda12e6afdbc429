//! Document rendering: drives a headless engine from compiled template output to
//! PDF bytes, with per-call isolation and retry.
//!
//! Only [`RenderError::GenerationExhausted`] leaves this module as a final
//! outcome; the other kinds are per-attempt causes recorded for operators.

use thiserror::Error;

pub mod engine;
pub mod renderer;

pub use engine::{ChromiumEngine, EngineSettings, RenderEngine};
pub use renderer::{DocumentRenderer, RetryPolicy};

/// Substrings that mean the engine's control connection went away.
const CONNECTION_DROP_MARKERS: &[&str] = &[
    "connection closed",
    "connection reset",
    "target closed",
    "websocket",
    "broken pipe",
    "channel closed",
];

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Template '{name}' could not be loaded: {reason}")]
    TemplateLoad { name: String, reason: String },

    #[error("Asset '{path}' could not be loaded: {reason}")]
    AssetLoad { path: String, reason: String },

    #[error("Render engine launch failed: {0}")]
    EngineLaunch(String),

    #[error("Render surface failed: {0}")]
    Surface(String),

    #[error("Render engine connection dropped: {0}")]
    ConnectionDropped(String),

    #[error("Template produced no markup: {0}")]
    Markup(String),

    #[error("Document generation failed after {attempts} attempt(s)")]
    GenerationExhausted {
        attempts: u32,
        causes: Vec<RenderError>,
    },
}

impl RenderError {
    /// Classifies an engine-side failure message, promoting it to
    /// `ConnectionDropped` when it reports a lost connection.
    pub fn from_engine(stage: &str, message: impl std::fmt::Display, launch: bool) -> Self {
        let message = format!("{stage}: {message}");
        let lowered = message.to_lowercase();
        if CONNECTION_DROP_MARKERS.iter().any(|m| lowered.contains(m)) {
            RenderError::ConnectionDropped(message)
        } else if launch {
            RenderError::EngineLaunch(message)
        } else {
            RenderError::Surface(message)
        }
    }

    /// The engine process needs extra time to exit before a relaunch.
    pub fn is_connection_dropped(&self) -> bool {
        matches!(self, RenderError::ConnectionDropped(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_engine_detects_connection_drop() {
        let err = RenderError::from_engine("export", "WebSocket protocol error: Connection reset", false);
        assert!(err.is_connection_dropped());

        let err = RenderError::from_engine("page", "Target closed", true);
        assert!(err.is_connection_dropped());
    }

    #[test]
    fn test_from_engine_classifies_by_stage() {
        let err = RenderError::from_engine("launch", "Could not auto detect a chrome executable", true);
        assert!(matches!(err, RenderError::EngineLaunch(_)));

        let err = RenderError::from_engine("export", "Request timed out", false);
        assert!(matches!(err, RenderError::Surface(ref m) if m == "export: Request timed out"));
    }

    #[test]
    fn test_exhausted_message_hides_causes() {
        let err = RenderError::GenerationExhausted {
            attempts: 2,
            causes: vec![RenderError::Surface("secret detail".to_string())],
        };
        assert_eq!(err.to_string(), "Document generation failed after 2 attempt(s)");
    }
}
