//! Identifiers and simple allocators for sprites and timers.

use serde::{Deserialize, Serialize};

/// Handle returned by `Engine::init`; owns one playback state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SpriteId(pub u32);

/// Handle for one pending frame-advance timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Monotonic allocator for SpriteId.
/// Ids are never reused while the engine lives, so a released handle stays dead.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_sprite: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_sprite(&mut self) -> SpriteId {
        let id = SpriteId(self.next_sprite);
        self.next_sprite = self.next_sprite.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_sprite(), SpriteId(0));
        assert_eq!(alloc.alloc_sprite(), SpriteId(1));
        assert_eq!(alloc.alloc_sprite(), SpriteId(2));
    }
}
