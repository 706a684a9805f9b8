//! Error types for the sprite animator.
//!
//! Playback itself never fails: controls on unknown sprites are no-ops. Errors
//! only surface for caller mistakes (unknown control names, malformed
//! arguments or configuration).

use serde::{Deserialize, Serialize};

/// Usage and configuration errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SpriteError {
    /// Control name not recognized by [`crate::SpriteCommand::parse`]
    #[error("Method {name} does not exist on sprite animator")]
    UnknownControl { name: String },

    /// Control argument missing or of the wrong shape
    #[error("Invalid argument for {control}: {reason}")]
    InvalidArgument { control: String, reason: String },

    /// Configuration rejected before it reached the engine
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl SpriteError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownControl { .. } | Self::InvalidArgument { .. } => "usage",
            Self::InvalidConfig { .. } => "config",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for SpriteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
