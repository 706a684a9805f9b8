//! Control contracts for the engine.
//!
//! Hosts either call the typed `Engine` methods directly or build a
//! [`SpriteCommand`] (for example from a button handler's method name) and
//! pass it to `Engine::apply`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SpriteError;
use crate::Result;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpriteCommand {
    /// Show one frame without touching the timer.
    Frame { index: u32 },
    Stop,
    Resume,
    Restart,
    Play {
        #[serde(default)]
        animation: Option<String>,
    },
    Fps { value: f64 },
}

impl SpriteCommand {
    /// Build a command from a control name and its optional argument.
    ///
    /// Accepts the long aliases `stopAnimation`, `resumeAnimation` and
    /// `restartAnimation`. `play` only treats a string argument as a sequence
    /// name; anything else plays the current state.
    pub fn parse(method: &str, arg: Option<&JsonValue>) -> Result<Self> {
        match method {
            "frame" => {
                let index = arg
                    .and_then(JsonValue::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| invalid(method, "expected a frame index"))?;
                Ok(Self::Frame { index })
            }
            "stop" | "stopAnimation" => Ok(Self::Stop),
            "resume" | "resumeAnimation" => Ok(Self::Resume),
            "restart" | "restartAnimation" => Ok(Self::Restart),
            "play" => Ok(Self::Play {
                animation: arg.and_then(JsonValue::as_str).map(str::to_string),
            }),
            "fps" => {
                let value = arg
                    .and_then(JsonValue::as_f64)
                    .ok_or_else(|| invalid(method, "expected a number"))?;
                Ok(Self::Fps { value })
            }
            "init" => Err(invalid(method, "init takes options, use Engine::init")),
            _ => Err(SpriteError::UnknownControl {
                name: method.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Frame { .. } => "frame",
            Self::Stop => "stop",
            Self::Resume => "resume",
            Self::Restart => "restart",
            Self::Play { .. } => "play",
            Self::Fps { .. } => "fps",
        }
    }
}

fn invalid(control: &str, reason: &str) -> SpriteError {
    SpriteError::InvalidArgument {
        control: control.to_string(),
        reason: reason.to_string(),
    }
}
