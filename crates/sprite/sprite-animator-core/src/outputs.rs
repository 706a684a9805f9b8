//! Output contracts from the core engine.
//!
//! Outputs carry the background offsets written since the last drain and a
//! separate list of semantic events. Adapters apply changes to the host
//! element (e.g. `style.backgroundPosition`) and transport events.

use serde::{Deserialize, Serialize};

use crate::frame::BackgroundPosition;
use crate::ids::SpriteId;

/// One rendered frame.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Change {
    pub sprite: SpriteId,
    pub frame: u32,
    pub position: BackgroundPosition,
}

/// Discrete semantic signals emitted by controls and timer expiries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub enum CoreEvent {
    PlaybackStarted {
        sprite: SpriteId,
        animation: Option<String>,
    },
    PlaybackStopped {
        sprite: SpriteId,
    },
    /// A non-looping range reached its end; the last frame stays rendered.
    PlaybackEnded {
        sprite: SpriteId,
        animation: Option<String>,
    },
    SheetResolved {
        sprite: SpriteId,
        columns: u32,
        total_frames: Option<u32>,
    },
    SheetProbeFailed {
        sprite: SpriteId,
        url: String,
    },
}

/// Effects accumulated until the host drains them with `Engine::take_outputs`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<CoreEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    #[inline]
    pub fn push_event(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    /// Latest offset written for `sprite`, if any.
    pub fn last_position(&self, sprite: SpriteId) -> Option<BackgroundPosition> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.sprite == sprite)
            .map(|c| c.position)
    }
}
