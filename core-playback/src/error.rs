//! # Playback Error Types
//!
//! Error types for engine orchestration, plus the player-level
//! [`MediaError`] object that is cached on the controller and surfaced
//! through the `error` event.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during playback orchestration.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Selection Errors
    // ========================================================================
    /// No registered engine can play any of the candidate sources.
    #[error("No compatible source was found for this media")]
    NoSupportedSource,

    /// A source could not be normalised (empty URL, malformed descriptor).
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// An allowed operation threw on a live engine after construction.
    ///
    /// The engine is marked not-ready before this is re-raised.
    #[error("Method `{method}` is unavailable on the current engine{}", engine_suffix(.engine))]
    MethodUnavailable {
        engine: Option<String>,
        method: String,
    },

    /// The engine does not implement the requested method at all.
    #[error("Engine does not implement `{method}`")]
    UndefinedMethod { method: String },

    /// The engine failed during construction.
    #[error("Failed to create engine `{engine}`: {reason}")]
    EngineCreation { engine: String, reason: String },

    /// The engine's own play request was rejected.
    #[error("Playback was rejected: {0}")]
    PlaybackRejected(String),

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// An engine is already registered under this name.
    #[error("Engine `{0}` is already registered")]
    DuplicateEngine(String),

    /// No engine is registered under this name.
    #[error("Unknown engine `{0}`")]
    UnknownEngine(String),

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// A setter received a value it cannot accept.
    #[error("Invalid value for `{operation}`: expected {expected}")]
    InvalidValue {
        operation: &'static str,
        expected: &'static str,
    },

    /// Player configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Track snapshot or configuration JSON could not be (de)serialised.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The controller has been disposed.
    #[error("Player has been disposed")]
    Disposed,

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn engine_suffix(engine: &Option<String>) -> String {
    engine
        .as_ref()
        .map(|name| format!(" ({})", name))
        .unwrap_or_default()
}

impl PlaybackError {
    /// Shorthand for a [`PlaybackError::MethodUnavailable`] raised by `engine`.
    pub fn unavailable(engine: impl Into<String>, method: impl Into<String>) -> Self {
        PlaybackError::MethodUnavailable {
            engine: Some(engine.into()),
            method: method.into(),
        }
    }

    /// Shorthand for a [`PlaybackError::UndefinedMethod`].
    pub fn undefined(method: impl Into<String>) -> Self {
        PlaybackError::UndefinedMethod {
            method: method.into(),
        }
    }

    /// Returns `true` if the controller must mark its engine not-ready when
    /// this error surfaces from an engine call.
    pub fn marks_engine_unready(&self) -> bool {
        matches!(self, PlaybackError::MethodUnavailable { .. })
    }

    /// Returns `true` if a fallback candidate may still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoSupportedSource
                | PlaybackError::InvalidSource(_)
                | PlaybackError::EngineCreation { .. }
                | PlaybackError::PlaybackRejected(_)
                | PlaybackError::MethodUnavailable { .. }
        )
    }

    /// Returns `true` if this error is about the media source itself.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoSupportedSource | PlaybackError::InvalidSource(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

// ============================================================================
// Player-level Media Error
// ============================================================================

/// Numeric media error codes, matching the HTML media error codes plus a
/// custom code for errors raised by the player itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaErrorCode {
    Custom,
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    Encrypted,
}

impl MediaErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            MediaErrorCode::Custom => 0,
            MediaErrorCode::Aborted => 1,
            MediaErrorCode::Network => 2,
            MediaErrorCode::Decode => 3,
            MediaErrorCode::SrcNotSupported => 4,
            MediaErrorCode::Encrypted => 5,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(MediaErrorCode::Custom),
            1 => Some(MediaErrorCode::Aborted),
            2 => Some(MediaErrorCode::Network),
            3 => Some(MediaErrorCode::Decode),
            4 => Some(MediaErrorCode::SrcNotSupported),
            5 => Some(MediaErrorCode::Encrypted),
            _ => None,
        }
    }

    /// Message used when the error carries none of its own.
    pub fn default_message(self) -> &'static str {
        match self {
            MediaErrorCode::Custom => "An unknown error occurred.",
            MediaErrorCode::Aborted => "You aborted the media playback",
            MediaErrorCode::Network => {
                "A network error caused the media download to fail part-way."
            }
            MediaErrorCode::Decode => {
                "The media playback was aborted due to a corruption problem or because the media used features your browser did not support."
            }
            MediaErrorCode::SrcNotSupported => {
                "The media could not be loaded, either because the server or network failed or because the format is not supported."
            }
            MediaErrorCode::Encrypted => {
                "The media is encrypted and we do not have the keys to decrypt it."
            }
        }
    }
}

/// The single active error of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaError {
    pub code: MediaErrorCode,
    pub message: String,
}

impl MediaError {
    pub fn new(code: MediaErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
        }
    }

    pub fn with_message(code: MediaErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            return Self::new(code);
        }
        Self { code, message }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::with_message(MediaErrorCode::Custom, message)
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MEDIA_ERR ({}): {}", self.code.as_u16(), self.message)
    }
}

impl From<&PlaybackError> for MediaError {
    fn from(err: &PlaybackError) -> Self {
        match err {
            PlaybackError::NoSupportedSource | PlaybackError::InvalidSource(_) => {
                MediaError::with_message(MediaErrorCode::SrcNotSupported, err.to_string())
            }
            PlaybackError::PlaybackRejected(_) => {
                MediaError::with_message(MediaErrorCode::Aborted, err.to_string())
            }
            _ => MediaError::custom(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PlaybackError::unavailable("html5", "play").marks_engine_unready());
        assert!(!PlaybackError::undefined("played").marks_engine_unready());
        assert!(PlaybackError::NoSupportedSource.is_source_error());
        assert!(PlaybackError::NoSupportedSource.is_recoverable());
        assert!(!PlaybackError::Disposed.is_recoverable());
        assert!(!PlaybackError::DuplicateEngine("html5".into()).is_recoverable());
    }

    #[test]
    fn test_method_unavailable_message() {
        let err = PlaybackError::unavailable("html5", "currentTime");
        assert_eq!(
            err.to_string(),
            "Method `currentTime` is unavailable on the current engine (html5)"
        );

        let err = PlaybackError::MethodUnavailable {
            engine: None,
            method: "play".into(),
        };
        assert_eq!(err.to_string(), "Method `play` is unavailable on the current engine");
    }

    #[test]
    fn test_no_supported_source_maps_to_code_four() {
        let media = MediaError::from(&PlaybackError::NoSupportedSource);
        assert_eq!(media.code, MediaErrorCode::SrcNotSupported);
        assert_eq!(media.code.as_u16(), 4);
    }

    #[test]
    fn test_empty_message_uses_default() {
        let media = MediaError::with_message(MediaErrorCode::Network, "");
        assert_eq!(media.message, MediaErrorCode::Network.default_message());
        assert_eq!(MediaErrorCode::from_u16(5), Some(MediaErrorCode::Encrypted));
        assert_eq!(MediaErrorCode::from_u16(9), None);
    }
}
