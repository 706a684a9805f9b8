use js_sys::{Function, Object, Reflect};
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use sprite_animator_core::{
    Attach, Config, Engine, Scheduler, SheetSize, SpriteCommand, SpriteConfig, SpriteElement,
    SpriteId, TimerId,
};

/// Page-facing sprite controller. Timers are delegated to a JS host object:
///
/// ```js
/// const timers = new Map();
/// const animator = new SpriteAnimator(null, {
///   schedule(timer, sprite, delayMs) {
///     timers.set(timer, setTimeout(() => {
///       animator.fire(timer);
///       apply(animator.take_outputs());
///     }, delayMs));
///   },
///   cancel(timer) { clearTimeout(timers.get(timer)); timers.delete(timer); },
/// });
/// ```
///
/// `schedule` and `cancel` are called as methods of the host object.
#[wasm_bindgen]
pub struct SpriteAnimator {
    core: Engine,
    timers: JsScheduler,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

/// Bridges the core `Scheduler` to `host.schedule(timer, sprite, delayMs)` and
/// `host.cancel(timer)`. Timer ids are allocated here so JS never has to
/// return anything.
struct JsScheduler {
    host: JsValue,
    schedule: Function,
    cancel: Function,
    next_timer: u64,
}

/// `obj[name]` if it is a function.
fn function_field(obj: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(obj, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
}

impl JsScheduler {
    fn from_host(host: JsValue) -> Result<Self, JsError> {
        let method = |name: &str| -> Result<Function, JsError> {
            function_field(&host, name).ok_or_else(|| {
                JsError::new(&format!("scheduler error: `{name}` must be a function"))
            })
        };
        let schedule = method("schedule")?;
        let cancel = method("cancel")?;
        Ok(Self {
            host,
            schedule,
            cancel,
            next_timer: 0,
        })
    }
}

impl Scheduler for JsScheduler {
    fn schedule(&mut self, sprite: SpriteId, delay_ms: f64) -> TimerId {
        let timer = TimerId(self.next_timer);
        self.next_timer = self.next_timer.wrapping_add(1);
        let args = (
            JsValue::from_f64(timer.0 as f64),
            JsValue::from(sprite.0),
            JsValue::from_f64(delay_ms),
        );
        if let Err(e) = self.schedule.call3(&self.host, &args.0, &args.1, &args.2) {
            log::warn!("scheduler.schedule threw: {e:?}");
        }
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        let arg = JsValue::from_f64(timer.0 as f64);
        if let Err(e) = self.cancel.call1(&self.host, &arg) {
            log::warn!("scheduler.cancel threw: {e:?}");
        }
    }
}

/// Returned by `init`.
#[derive(Serialize)]
struct InitResult {
    sprite: u32,
    /// True when the page must probe `url` and answer with `resolve_sheet`.
    pending: bool,
    existing: bool,
    url: Option<String>,
}

#[wasm_bindgen]
impl SpriteAnimator {
    /// Create a controller. `config` is an optional JSON engine config
    /// (`{ default_fps: 24 }`); `scheduler` is the timer host object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, scheduler: JsValue) -> Result<SpriteAnimator, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };

        Ok(SpriteAnimator {
            core: Engine::new(cfg),
            timers: JsScheduler::from_host(scheduler)?,
        })
    }

    /// Attach an element. `background_image` is its computed CSS
    /// `background-image`; the rendered size is the default frame size.
    /// `options` uses the plugin option names (`width`, `height`,
    /// `totalFrames`, `columns`, `fps`, `duration`, `loop`, `autoplay`,
    /// `animations`, `complete`). `complete(sprite)` runs inside `fire`, so
    /// it must not call back into the animator synchronously.
    #[wasm_bindgen]
    pub fn init(
        &mut self,
        key: String,
        background_image: String,
        rendered_width: f64,
        rendered_height: f64,
        options: JsValue,
    ) -> Result<JsValue, JsError> {
        let (cfg, complete) = if jsvalue_is_undefined_or_null(&options) {
            (SpriteConfig::default(), None)
        } else {
            split_options(&options)?
        };
        cfg.validate().map_err(|e| JsError::new(&format!("options error: {e}")))?;
        let element = SpriteElement::new(key, background_image, rendered_width, rendered_height);
        let attach = self.core.init(element, cfg, &mut self.timers);
        // a repeated init keeps the callback registered the first time
        if let Some(f) = complete.filter(|_| !matches!(attach, Attach::Existing(_))) {
            self.register_complete(attach.sprite(), f);
        }
        let result = match attach {
            Attach::Existing(id) => InitResult {
                sprite: id.0,
                pending: false,
                existing: true,
                url: None,
            },
            Attach::Ready(id) => InitResult {
                sprite: id.0,
                pending: false,
                existing: false,
                url: None,
            },
            Attach::Pending(p) => InitResult {
                sprite: p.sprite.0,
                pending: true,
                existing: false,
                url: p.url,
            },
        };
        swb::to_value(&result).map_err(|e| JsError::new(&format!("init error: {e}")))
    }

    /// Answer a pending probe with the image's natural size.
    #[wasm_bindgen(js_name = resolve_sheet)]
    pub fn resolve_sheet(&mut self, sprite: u32, width: u32, height: u32) -> bool {
        self.core
            .complete_sheet(SpriteId(sprite), SheetSize { width, height }, &mut self.timers)
    }

    /// Report that the sheet image failed to load.
    #[wasm_bindgen(js_name = fail_sheet)]
    pub fn fail_sheet(&mut self, sprite: u32) {
        self.core.fail_sheet(SpriteId(sprite));
    }

    /// Call when a timer handed to `scheduler.schedule` elapses.
    #[wasm_bindgen]
    pub fn fire(&mut self, timer: f64) -> bool {
        self.core.fire(TimerId(timer as u64), &mut self.timers)
    }

    /// Run a control by name: `frame`, `stop`, `resume`, `restart`, `play`,
    /// `fps` (and the `*Animation` aliases). Unknown names are an error.
    #[wasm_bindgen]
    pub fn control(&mut self, sprite: u32, method: &str, arg: JsValue) -> Result<(), JsError> {
        let arg: Option<serde_json::Value> = if jsvalue_is_undefined_or_null(&arg) {
            None
        } else {
            let value =
                swb::from_value(arg).map_err(|e| JsError::new(&format!("{method} error: {e}")))?;
            Some(value)
        };
        let cmd =
            SpriteCommand::parse(method, arg.as_ref()).map_err(|e| JsError::new(&e.to_string()))?;
        self.core.apply(SpriteId(sprite), cmd, &mut self.timers);
        Ok(())
    }

    /// Replace the completion callback of an attached sprite.
    #[wasm_bindgen(js_name = on_complete)]
    pub fn on_complete(&mut self, sprite: u32, callback: Function) {
        self.register_complete(SpriteId(sprite), callback);
    }

    #[wasm_bindgen]
    pub fn frame(&mut self, sprite: u32, index: u32) {
        self.core.set_frame(SpriteId(sprite), index);
    }

    #[wasm_bindgen(js_name = sprite_for)]
    pub fn sprite_for(&self, key: &str) -> Option<u32> {
        self.core.sprite_for(key).map(|id| id.0)
    }

    #[wasm_bindgen]
    pub fn release(&mut self, sprite: u32) -> bool {
        self.core.release(SpriteId(sprite), &mut self.timers)
    }

    /// Drain `{ changes, events }` produced since the last call.
    #[wasm_bindgen(js_name = take_outputs)]
    pub fn take_outputs(&mut self) -> Result<JsValue, JsError> {
        let out = self.core.take_outputs();
        swb::to_value(&out).map_err(|e| JsError::new(&format!("outputs error: {e}")))
    }
}

impl SpriteAnimator {
    fn register_complete(&mut self, sprite: SpriteId, callback: Function) {
        self.core.on_complete(sprite, move |id| {
            if let Err(e) = callback.call1(&JsValue::UNDEFINED, &JsValue::from(id.0)) {
                log::warn!("complete callback threw: {e:?}");
            }
        });
    }
}

/// Split page options into the serde part and the `complete` callback.
/// The caller's object is left untouched.
fn split_options(options: &JsValue) -> Result<(SpriteConfig, Option<Function>), JsError> {
    let complete = function_field(options, "complete");
    let plain = if complete.is_some() {
        let copy = Object::assign(&Object::new(), options.unchecked_ref());
        Reflect::delete_property(&copy, &JsValue::from_str("complete"))
            .map_err(|e| JsError::new(&format!("options error: {e:?}")))?;
        copy.into()
    } else {
        options.clone()
    };
    let cfg = swb::from_value(plain).map_err(|e| JsError::new(&format!("options error: {e}")))?;
    Ok((cfg, complete))
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
