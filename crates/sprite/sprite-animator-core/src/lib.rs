//! Sprite Animator Core (host-agnostic)
//!
//! Drives timed playback of sprite-sheet frames rendered as a background
//! offset on an element. The engine owns one playback state per attached
//! element and never touches a clock itself: hosts supply a [`Scheduler`]
//! for timers and a [`SheetProbe`] (or a manual answer) for the one-time
//! sheet size lookup, and apply the [`Outputs`] it produces.

pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod ids;
pub mod inputs;
pub mod outputs;
pub mod sheet;
pub mod timer;

// Re-exports for consumers (adapters)
pub use config::{Config, Settings, SpriteConfig, SpriteElement};
pub use engine::{Attach, Engine, PendingSheet, PlaybackState};
pub use error::SpriteError;
pub use frame::{frame_position, BackgroundPosition};
pub use ids::{SpriteId, TimerId};
pub use inputs::SpriteCommand;
pub use outputs::{Change, CoreEvent, Outputs};
#[cfg(feature = "image-probe")]
pub use sheet::FileProbe;
pub use sheet::{parse_background_url, resolve_grid, KnownSizes, SheetGrid, SheetProbe, SheetSize};
pub use timer::{Armed, ManualScheduler, Scheduler};

/// Sprite animator result type
pub type Result<T> = core::result::Result<T, SpriteError>;
