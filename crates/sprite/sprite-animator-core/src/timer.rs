//! Timer primitive consumed by the engine.
//!
//! The engine never sleeps. It asks a [`Scheduler`] to call back after a
//! delay and the host reports the expiry through `Engine::fire`. Browsers
//! back this with `setTimeout`; tests and fixed-step hosts use
//! [`ManualScheduler`].

use std::collections::BTreeMap;

use crate::ids::{SpriteId, TimerId};

/// "Invoke after N milliseconds" and "cancel a pending invocation".
/// Adapters implement this and pass it into every engine call that may arm.
pub trait Scheduler {
    fn schedule(&mut self, sprite: SpriteId, delay_ms: f64) -> TimerId;
    fn cancel(&mut self, timer: TimerId);
}

/// Non-finite and negative delays run as soon as possible, like `setTimeout`.
#[inline]
pub fn clamp_delay(delay_ms: f64) -> f64 {
    if delay_ms.is_finite() && delay_ms > 0.0 {
        delay_ms
    } else {
        0.0
    }
}

/// One scheduled timer as recorded by [`ManualScheduler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Armed {
    pub timer: TimerId,
    pub sprite: SpriteId,
    pub delay_ms: f64,
    pub due_ms: f64,
}

/// Virtual-clock scheduler. Timers fire in due-time order; ties fire in the
/// order they were armed.
///
/// Only the most recent arming is kept unless the scheduler was built with
/// [`ManualScheduler::recording`], so long-running hosts stay bounded.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now_ms: f64,
    next_id: u64,
    // (due time bits, id) keeps ordering total; due times are never negative
    pending: BTreeMap<(u64, TimerId), SpriteId>,
    last: Option<Armed>,
    history: Option<Vec<Armed>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler that also keeps every arming in [`history`](Self::history).
    pub fn recording() -> Self {
        Self {
            history: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Number of timers armed and not yet fired or cancelled.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, sprite: SpriteId) -> usize {
        self.pending.values().filter(|s| **s == sprite).count()
    }

    /// Every timer armed so far, in arming order. Empty unless recording.
    pub fn history(&self) -> &[Armed] {
        self.history.as_deref().unwrap_or_default()
    }

    /// Drain the recorded history, keeping recording on.
    pub fn take_history(&mut self) -> Vec<Armed> {
        self.history.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn last_armed(&self) -> Option<&Armed> {
        self.last.as_ref()
    }

    /// Remove and return the earliest timer due at or before `until_ms`,
    /// moving the clock to its due time.
    pub fn pop_due(&mut self, until_ms: f64) -> Option<(TimerId, SpriteId)> {
        let (&(due_bits, timer), _) = self.pending.iter().next()?;
        let due = f64::from_bits(due_bits);
        if due > until_ms {
            return None;
        }
        let sprite = self.pending.remove(&(due_bits, timer))?;
        self.now_ms = self.now_ms.max(due);
        Some((timer, sprite))
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now_ms: f64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, sprite: SpriteId, delay_ms: f64) -> TimerId {
        let delay_ms = clamp_delay(delay_ms);
        let timer = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let due_ms = self.now_ms + delay_ms;
        self.pending.insert((due_ms.to_bits(), timer), sprite);
        let armed = Armed {
            timer,
            sprite,
            delay_ms,
            due_ms,
        };
        if let Some(history) = self.history.as_mut() {
            history.push(armed);
        }
        self.last = Some(armed);
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        self.pending.retain(|(_, t), _| *t != timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_like_set_timeout() {
        assert_eq!(clamp_delay(f64::INFINITY), 0.0);
        assert_eq!(clamp_delay(f64::NAN), 0.0);
        assert_eq!(clamp_delay(-5.0), 0.0);
        assert_eq!(clamp_delay(83.5), 83.5);
    }

    #[test]
    fn fires_in_due_order() {
        let mut s = ManualScheduler::new();
        let late = s.schedule(SpriteId(0), 200.0);
        let early = s.schedule(SpriteId(1), 100.0);
        let tie = s.schedule(SpriteId(2), 100.0);

        assert_eq!(s.pop_due(50.0), None);
        assert_eq!(s.pop_due(1000.0), Some((early, SpriteId(1))));
        assert_eq!(s.now_ms(), 100.0);
        assert_eq!(s.pop_due(1000.0), Some((tie, SpriteId(2))));
        assert_eq!(s.pop_due(1000.0), Some((late, SpriteId(0))));
        assert_eq!(s.pop_due(1000.0), None);
        assert_eq!(s.now_ms(), 200.0);
    }

    #[test]
    fn cancel_removes_pending_and_is_idempotent() {
        let mut s = ManualScheduler::recording();
        let t = s.schedule(SpriteId(0), 10.0);
        assert_eq!(s.pending_len(), 1);
        s.cancel(t);
        s.cancel(t);
        assert_eq!(s.pending_len(), 0);
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn delays_are_relative_to_now() {
        let mut s = ManualScheduler::new();
        s.set_now(500.0);
        s.schedule(SpriteId(3), 25.0);
        let armed = s.last_armed().unwrap();
        assert_eq!(armed.delay_ms, 25.0);
        assert_eq!(armed.due_ms, 525.0);
        assert_eq!(s.pending_for(SpriteId(3)), 1);
    }

    #[test]
    fn history_is_opt_in() {
        let mut plain = ManualScheduler::new();
        plain.schedule(SpriteId(0), 10.0);
        plain.schedule(SpriteId(0), 20.0);
        assert!(plain.history().is_empty());
        assert_eq!(plain.last_armed().unwrap().delay_ms, 20.0);

        let mut rec = ManualScheduler::recording();
        rec.schedule(SpriteId(0), 10.0);
        rec.schedule(SpriteId(1), 20.0);
        assert_eq!(rec.take_history().len(), 2);
        assert!(rec.history().is_empty());
        rec.schedule(SpriteId(0), 30.0);
        assert_eq!(rec.history().len(), 1);
    }
}
