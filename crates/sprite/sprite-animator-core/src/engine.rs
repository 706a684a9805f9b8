//! Engine: per-sprite ownership of settings and playback state, plus the
//! timer-driven advance cycle.
//!
//! Methods:
//! - init / complete_sheet / fail_sheet / init_with_probe (attach and resolve the sheet grid)
//! - set_frame, fire (render and advance)
//! - stop, resume, restart, play, set_fps, apply (controls)
//! - release, take_outputs, drive

use std::collections::HashMap;
use std::fmt;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::config::{Config, Settings, SpriteConfig, SpriteElement};
use crate::frame::{frame_position, BackgroundPosition};
use crate::ids::{IdAllocator, SpriteId, TimerId};
use crate::inputs::SpriteCommand;
use crate::outputs::{Change, CoreEvent, Outputs};
use crate::sheet::{parse_background_url, resolve_grid, SheetProbe, SheetSize};
use crate::timer::{ManualScheduler, Scheduler};

/// Upper bound on expiries handled by one `drive` call, so zero-delay looping
/// sprites cannot spin forever.
const MAX_FIRES_PER_DRIVE: usize = 100_000;

/// Cursor state for one sprite.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Position inside the active range (a named sequence or `0..total_frames`).
    pub frame_cursor: u32,
    pub active_sequence: Option<String>,
    /// At most one outstanding timer per sprite.
    pub timer: Option<TimerId>,
}

#[derive(Clone, Debug, PartialEq)]
enum SheetStatus {
    /// Waiting for the image probe. `start_requested` records controls that
    /// asked to play before the grid was known.
    Pending {
        url: Option<String>,
        start_requested: bool,
    },
    Resolved,
}

/// Everything the engine owns for one attached element.
#[derive(Debug)]
struct Sprite {
    id: SpriteId,
    key: String,
    settings: Settings,
    state: PlaybackState,
    sheet: SheetStatus,
    position: Option<BackgroundPosition>,
}

impl Sprite {
    fn is_pending(&self) -> bool {
        matches!(self.sheet, SheetStatus::Pending { .. })
    }

    /// Sequence the advance cycle reads from: the chosen one, or the first
    /// declared one when sequences exist.
    fn effective_sequence(&self) -> Option<&str> {
        self.state
            .active_sequence
            .as_deref()
            .or_else(|| self.settings.first_sequence())
    }

    /// Length of the range the cursor walks.
    fn range_len(&self) -> usize {
        match self.effective_sequence() {
            Some(name) => self.settings.sequence(name).map_or(0, <[u32]>::len),
            None => self.settings.total_frames.unwrap_or(0) as usize,
        }
    }

    /// `duration / len(range)` when a duration is set, else `1000 / fps`.
    fn frame_delay_ms(&self) -> f64 {
        match self.settings.duration {
            Some(duration) => duration / self.range_len() as f64,
            None => 1000.0 / self.settings.fps,
        }
    }

    fn arm(&mut self, sched: &mut dyn Scheduler) {
        if let Some(old) = self.state.timer.take() {
            sched.cancel(old);
        }
        let delay = self.frame_delay_ms();
        let timer = sched.schedule(self.id, delay);
        trace!("sprite {:?}: armed {:?} in {delay}ms", self.id, timer);
        self.state.timer = Some(timer);
    }

    /// Cancel the pending timer; returns whether one was pending.
    fn disarm(&mut self, sched: &mut dyn Scheduler) -> bool {
        if let SheetStatus::Pending {
            start_requested, ..
        } = &mut self.sheet
        {
            *start_requested = false;
        }
        match self.state.timer.take() {
            Some(timer) => {
                sched.cancel(timer);
                true
            }
            None => false,
        }
    }

    /// Arm now, or remember the request until the grid is resolved.
    fn start(&mut self, sched: &mut dyn Scheduler) -> bool {
        match &mut self.sheet {
            SheetStatus::Pending {
                start_requested, ..
            } => {
                *start_requested = true;
                false
            }
            SheetStatus::Resolved => {
                self.arm(sched);
                true
            }
        }
    }

    fn render(&mut self, frame: u32) -> Option<Change> {
        if self.is_pending() {
            return None;
        }
        let columns = self.settings.columns.unwrap_or(0);
        let Some(position) = frame_position(
            frame,
            columns,
            self.settings.frame_width,
            self.settings.frame_height,
        ) else {
            warn!("sprite {:?}: zero columns, frame {frame} not rendered", self.id);
            return None;
        };
        self.position = Some(position);
        Some(Change {
            sprite: self.id,
            frame,
            position,
        })
    }
}

/// Result of attaching an element.
#[derive(Clone, Debug, PartialEq)]
pub enum Attach {
    /// The element already had a sprite; nothing changed.
    Existing(SpriteId),
    /// Grid known up front; autoplay (if enabled) is armed.
    Ready(SpriteId),
    /// The sheet must be probed before anything can play.
    Pending(PendingSheet),
}

impl Attach {
    pub fn sprite(&self) -> SpriteId {
        match self {
            Attach::Existing(id) | Attach::Ready(id) => *id,
            Attach::Pending(p) => p.sprite,
        }
    }
}

/// Probe request handed to the host. Answer it with `Engine::complete_sheet`
/// or `Engine::fail_sheet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingSheet {
    pub sprite: SpriteId,
    /// `None` when the element has no usable `background-image`.
    pub url: Option<String>,
}

struct CompletionHook(Box<dyn FnMut(SpriteId)>);

impl fmt::Debug for CompletionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionHook")
    }
}

/// Sprite animation controller.
#[derive(Debug)]
pub struct Engine {
    cfg: Config,
    ids: IdAllocator,
    sprites: Vec<Sprite>,
    by_key: HashMap<String, SpriteId>,
    hooks: HashMap<SpriteId, CompletionHook>,
    outputs: Outputs,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    /// Create a new engine with the given defaults.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            ids: IdAllocator::new(),
            sprites: Vec::new(),
            by_key: HashMap::new(),
            hooks: HashMap::new(),
            outputs: Outputs::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.id == id)
    }

    fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        let found = self.sprites.iter_mut().find(|s| s.id == id);
        if found.is_none() {
            debug!("sprite {id:?} is not attached, ignoring");
        }
        found
    }

    /// Attach `element`, merging `cfg` over the engine defaults.
    ///
    /// A second call for the same element key is a no-op. With `columns`
    /// supplied the grid is known and autoplay arms immediately; otherwise the
    /// returned [`PendingSheet`] must be resolved first.
    pub fn init(
        &mut self,
        element: SpriteElement,
        cfg: SpriteConfig,
        sched: &mut dyn Scheduler,
    ) -> Attach {
        if let Some(id) = self.by_key.get(&element.key) {
            debug!("element {:?} already attached as {id:?}", element.key);
            return Attach::Existing(*id);
        }

        let id = self.ids.alloc_sprite();
        let settings = Settings::merge(&self.cfg, &element, cfg);
        let pending = settings.columns.is_none();
        let url = parse_background_url(&element.background_image);
        let mut sprite = Sprite {
            id,
            key: element.key.clone(),
            sheet: if pending {
                SheetStatus::Pending {
                    url: url.clone(),
                    start_requested: false,
                }
            } else {
                SheetStatus::Resolved
            },
            settings,
            state: PlaybackState::default(),
            position: None,
        };

        let attach = if pending {
            Attach::Pending(PendingSheet { sprite: id, url })
        } else {
            if sprite.settings.autoplay {
                sprite.arm(sched);
                self.outputs.push_event(CoreEvent::PlaybackStarted {
                    sprite: id,
                    animation: None,
                });
            }
            Attach::Ready(id)
        };

        self.by_key.insert(element.key, id);
        self.sprites.push(sprite);
        attach
    }

    /// Finish a pending attach with the probed sheet size. Derives `columns`
    /// (and `total_frames` when it was not supplied), then starts playback if
    /// autoplay is on or a control asked to play meanwhile. Returns false when
    /// the sprite is unknown or already resolved.
    pub fn complete_sheet(
        &mut self,
        id: SpriteId,
        size: SheetSize,
        sched: &mut dyn Scheduler,
    ) -> bool {
        let Some(sprite) = self.sprite_mut(id) else {
            return false;
        };
        let SheetStatus::Pending {
            start_requested, ..
        } = sprite.sheet
        else {
            debug!("sprite {id:?}: sheet already resolved");
            return false;
        };

        let grid = resolve_grid(
            size,
            sprite.settings.frame_width,
            sprite.settings.frame_height,
            sprite.settings.total_frames,
        );
        sprite.settings.columns = Some(grid.columns);
        sprite.settings.total_frames = Some(grid.total_frames);
        sprite.sheet = SheetStatus::Resolved;
        debug!(
            "sprite {id:?}: sheet {}x{} -> {} columns, {} frames",
            size.width, size.height, grid.columns, grid.total_frames
        );

        let start = sprite.settings.autoplay || start_requested;
        let animation = sprite.state.active_sequence.clone();
        if start {
            sprite.arm(sched);
        }
        self.outputs.push_event(CoreEvent::SheetResolved {
            sprite: id,
            columns: grid.columns,
            total_frames: Some(grid.total_frames),
        });
        if start {
            self.outputs
                .push_event(CoreEvent::PlaybackStarted { sprite: id, animation });
        }
        true
    }

    /// Record a failed probe. The sprite stays unresolved and never plays.
    pub fn fail_sheet(&mut self, id: SpriteId) {
        let Some(sprite) = self.sprite_mut(id) else {
            return;
        };
        let SheetStatus::Pending { url, .. } = &sprite.sheet else {
            return;
        };
        let url = url.clone().unwrap_or_default();
        warn!("sprite {id:?}: could not load sheet {url:?}");
        self.outputs
            .push_event(CoreEvent::SheetProbeFailed { sprite: id, url });
    }

    /// `init` followed by the probe, with the first timer armed strictly
    /// after the probe completes.
    pub async fn init_with_probe(
        &mut self,
        element: SpriteElement,
        cfg: SpriteConfig,
        probe: &dyn SheetProbe,
        sched: &mut dyn Scheduler,
    ) -> SpriteId {
        let pending = match self.init(element, cfg, sched) {
            Attach::Pending(pending) => pending,
            other => return other.sprite(),
        };
        let size = match pending.url.as_deref() {
            Some(url) => probe.probe(url).await,
            None => None,
        };
        match size {
            Some(size) => {
                self.complete_sheet(pending.sprite, size, sched);
            }
            None => self.fail_sheet(pending.sprite),
        }
        pending.sprite
    }

    /// Show frame `index` now. No-op for unknown or unresolved sprites.
    pub fn set_frame(&mut self, id: SpriteId, index: u32) {
        let Some(sprite) = self.sprite_mut(id) else {
            return;
        };
        if let Some(change) = sprite.render(index) {
            self.outputs.push_change(change);
        }
    }

    /// Timer expiry: render the frame under the cursor, advance, and either
    /// re-arm, wrap (looping) or end. Stale or unknown timers are ignored.
    /// Returns whether a sprite advanced.
    pub fn fire(&mut self, timer: TimerId, sched: &mut dyn Scheduler) -> bool {
        let Some(sprite) = self
            .sprites
            .iter_mut()
            .find(|s| s.state.timer == Some(timer))
        else {
            debug!("timer {timer:?} is stale, ignoring");
            return false;
        };
        sprite.state.timer = None;

        if sprite.state.active_sequence.is_none() {
            sprite.state.active_sequence = sprite.settings.first_sequence().map(str::to_string);
        }
        let cursor = sprite.state.frame_cursor;
        let frame = match sprite.state.active_sequence.as_deref() {
            Some(name) => sprite
                .settings
                .sequence(name)
                .and_then(|seq| seq.get(cursor as usize).copied()),
            None => Some(cursor),
        };
        match frame {
            Some(frame) => {
                if let Some(change) = sprite.render(frame) {
                    self.outputs.push_change(change);
                }
            }
            None => debug!("sprite {:?}: cursor {cursor} is past the sequence", sprite.id),
        }

        let next = cursor.saturating_add(1);
        sprite.state.frame_cursor = next;
        if next as usize >= sprite.range_len() {
            if sprite.settings.looping {
                sprite.state.frame_cursor = 0;
                sprite.arm(sched);
            } else {
                let id = sprite.id;
                let animation = sprite.state.active_sequence.clone();
                trace!("sprite {id:?}: playback ended");
                self.outputs
                    .push_event(CoreEvent::PlaybackEnded { sprite: id, animation });
                if let Some(hook) = self.hooks.get_mut(&id) {
                    (hook.0)(id);
                }
            }
        } else {
            sprite.arm(sched);
        }
        true
    }

    /// Cancel the pending timer. Idempotent.
    pub fn stop(&mut self, id: SpriteId, sched: &mut dyn Scheduler) {
        let Some(sprite) = self.sprite_mut(id) else {
            return;
        };
        if sprite.disarm(sched) {
            self.outputs
                .push_event(CoreEvent::PlaybackStopped { sprite: id });
        }
    }

    /// Continue from the current cursor with a single fresh timer.
    pub fn resume(&mut self, id: SpriteId, sched: &mut dyn Scheduler) {
        let Some(sprite) = self.sprite_mut(id) else {
            return;
        };
        sprite.disarm(sched);
        if sprite.start(sched) {
            let animation = sprite.state.active_sequence.clone();
            self.outputs
                .push_event(CoreEvent::PlaybackStarted { sprite: id, animation });
        }
    }

    /// Rewind the cursor to 0 and start timing again.
    pub fn restart(&mut self, id: SpriteId, sched: &mut dyn Scheduler) {
        let Some(sprite) = self.sprite_mut(id) else {
            return;
        };
        sprite.disarm(sched);
        sprite.state.frame_cursor = 0;
        if sprite.start(sched) {
            let animation = sprite.state.active_sequence.clone();
            self.outputs
                .push_event(CoreEvent::PlaybackStarted { sprite: id, animation });
        }
    }

    /// Start timing, switching to `animation` first when it differs from the
    /// active sequence (which rewinds the cursor). Without a name the current
    /// cursor and sequence are kept. An unknown name clears the active
    /// sequence, so the first declared one is used.
    pub fn play(&mut self, id: SpriteId, animation: Option<&str>, sched: &mut dyn Scheduler) {
        let Some(sprite) = self.sprite_mut(id) else {
            return;
        };
        sprite.disarm(sched);
        if let Some(name) = animation {
            let target = if sprite.settings.sequence(name).is_some() {
                Some(name.to_string())
            } else {
                warn!("sprite {id:?}: no animation named {name:?}");
                None
            };
            if target != sprite.state.active_sequence {
                sprite.state.frame_cursor = 0;
                sprite.state.active_sequence = target;
            }
        }
        if sprite.start(sched) {
            let animation = sprite.state.active_sequence.clone();
            self.outputs
                .push_event(CoreEvent::PlaybackStarted { sprite: id, animation });
        }
    }

    /// Change fps for the next scheduling decision; a timer already armed
    /// keeps its delay.
    pub fn set_fps(&mut self, id: SpriteId, fps: f64) {
        if let Some(sprite) = self.sprite_mut(id) {
            sprite.settings.fps = fps;
        }
    }

    /// Dispatch a parsed control.
    pub fn apply(&mut self, id: SpriteId, cmd: SpriteCommand, sched: &mut dyn Scheduler) {
        match cmd {
            SpriteCommand::Frame { index } => self.set_frame(id, index),
            SpriteCommand::Stop => self.stop(id, sched),
            SpriteCommand::Resume => self.resume(id, sched),
            SpriteCommand::Restart => self.restart(id, sched),
            SpriteCommand::Play { animation } => self.play(id, animation.as_deref(), sched),
            SpriteCommand::Fps { value } => self.set_fps(id, value),
        }
    }

    /// Register a callback run each time a non-looping range ends.
    pub fn on_complete(&mut self, id: SpriteId, hook: impl FnMut(SpriteId) + 'static) {
        if self.sprite(id).is_some() {
            self.hooks.insert(id, CompletionHook(Box::new(hook)));
        }
    }

    /// Detach a sprite, cancelling its timer. The element key may be
    /// attached again afterwards.
    pub fn release(&mut self, id: SpriteId, sched: &mut dyn Scheduler) -> bool {
        let Some(idx) = self.sprites.iter().position(|s| s.id == id) else {
            return false;
        };
        let mut sprite = self.sprites.swap_remove(idx);
        sprite.disarm(sched);
        self.by_key.remove(&sprite.key);
        self.hooks.remove(&id);
        true
    }

    /// Fire every timer of `clock` falling due within the next `elapsed_ms`,
    /// including timers armed along the way. Returns the number of advances.
    pub fn drive(&mut self, clock: &mut ManualScheduler, elapsed_ms: f64) -> usize {
        let until = clock.now_ms() + elapsed_ms.max(0.0);
        let mut fired = 0;
        while let Some((timer, _)) = clock.pop_due(until) {
            if self.fire(timer, clock) {
                fired += 1;
            }
            if fired >= MAX_FIRES_PER_DRIVE {
                warn!("drive: stopped after {fired} expiries");
                return fired;
            }
        }
        clock.set_now(until);
        fired
    }

    /// Effects produced since the last call.
    pub fn take_outputs(&mut self) -> Outputs {
        std::mem::take(&mut self.outputs)
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn sprite_for(&self, key: &str) -> Option<SpriteId> {
        self.by_key.get(key).copied()
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn settings(&self, id: SpriteId) -> Option<&Settings> {
        self.sprite(id).map(|s| &s.settings)
    }

    pub fn state(&self, id: SpriteId) -> Option<&PlaybackState> {
        self.sprite(id).map(|s| &s.state)
    }

    /// Offset last rendered for the sprite.
    pub fn position(&self, id: SpriteId) -> Option<BackgroundPosition> {
        self.sprite(id).and_then(|s| s.position)
    }

    pub fn is_playing(&self, id: SpriteId) -> bool {
        self.sprite(id).is_some_and(|s| s.state.timer.is_some())
    }

    pub fn is_pending(&self, id: SpriteId) -> bool {
        self.sprite(id).is_some_and(Sprite::is_pending)
    }
}
