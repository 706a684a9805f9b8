use std::cell::Cell;
use std::rc::Rc;

use sprite_animator_core::{
    frame_position, BackgroundPosition, CoreEvent, Engine, ManualScheduler, SpriteConfig,
    SpriteElement, SpriteId,
};

fn element(key: &str) -> SpriteElement {
    SpriteElement::new(key, r#"url("sheet.png")"#, 100.0, 100.0)
}

fn strip(total_frames: u32, looping: bool) -> SpriteConfig {
    SpriteConfig {
        columns: Some(5),
        total_frames: Some(total_frames),
        looping: Some(looping),
        ..Default::default()
    }
}

/// Fire the next pending timer, whatever its due time.
fn step(eng: &mut Engine, clock: &mut ManualScheduler) -> bool {
    match clock.pop_due(f64::INFINITY) {
        Some((timer, _)) => eng.fire(timer, clock),
        None => false,
    }
}

fn completion_counter(eng: &mut Engine, id: SpriteId) -> Rc<Cell<u32>> {
    let count = Rc::new(Cell::new(0));
    let seen = Rc::clone(&count);
    eng.on_complete(id, move |_| seen.set(seen.get() + 1));
    count
}

#[test]
fn set_frame_matches_grid_offsets() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let cfg = SpriteConfig {
        frame_width: Some(32.0),
        frame_height: Some(48.0),
        columns: Some(3),
        total_frames: Some(9),
        autoplay: Some(false),
        ..Default::default()
    };
    let id = eng.init(element("grid"), cfg, &mut clock).sprite();

    for index in 0..9u32 {
        eng.set_frame(id, index);
        let expected = BackgroundPosition {
            x: -32.0 * f64::from(index % 3),
            y: -48.0 * f64::from(index / 3),
        };
        assert_eq!(eng.position(id), Some(expected), "frame {index}");
        assert_eq!(frame_position(index, 3, 32.0, 48.0), Some(expected));
    }
    // rendering never touches the timer
    assert_eq!(clock.pending_len(), 0);
}

#[test]
fn non_looping_run_ends_once_on_last_frame() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let id = eng.init(element("once"), strip(5, false), &mut clock).sprite();
    let completions = completion_counter(&mut eng, id);

    for _ in 0..5 {
        assert!(step(&mut eng, &mut clock));
    }

    assert_eq!(completions.get(), 1);
    assert_eq!(clock.pending_len(), 0);
    assert!(!eng.is_playing(id));
    assert_eq!(eng.position(id), frame_position(4, 5, 100.0, 100.0));
    assert!(!step(&mut eng, &mut clock));
    assert_eq!(completions.get(), 1);

    let out = eng.take_outputs();
    let frames: Vec<u32> = out.changes.iter().map(|c| c.frame).collect();
    assert_eq!(frames, vec![0, 1, 2, 3, 4]);
    let ended = out
        .events
        .iter()
        .filter(|e| matches!(e, CoreEvent::PlaybackEnded { .. }))
        .count();
    assert_eq!(ended, 1);
}

#[test]
fn looping_run_wraps_and_rearms() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let id = eng.init(element("loop"), strip(5, true), &mut clock).sprite();
    let completions = completion_counter(&mut eng, id);

    for _ in 0..5 {
        assert!(step(&mut eng, &mut clock));
    }

    assert_eq!(eng.state(id).unwrap().frame_cursor, 0);
    assert!(eng.is_playing(id));
    assert_eq!(clock.pending_for(id), 1);
    assert_eq!(completions.get(), 0);

    // next tick starts over at frame 0
    assert!(step(&mut eng, &mut clock));
    assert_eq!(eng.position(id), frame_position(0, 5, 100.0, 100.0));
    assert_eq!(completions.get(), 0);
}

#[test]
fn drive_runs_a_finite_animation_to_the_end() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let id = eng
        .init(
            element("drive"),
            SpriteConfig {
                fps: Some(10.0),
                ..strip(5, false)
            },
            &mut clock,
        )
        .sprite();

    // 100ms per frame: three frames due within 350ms
    assert_eq!(eng.drive(&mut clock, 350.0), 3);
    assert_eq!(eng.state(id).unwrap().frame_cursor, 3);
    assert_eq!(clock.now_ms(), 350.0);

    assert_eq!(eng.drive(&mut clock, 10_000.0), 2);
    assert!(!eng.is_playing(id));
}

#[test]
fn duration_overrides_fps() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::recording();
    let cfg = SpriteConfig {
        columns: Some(5),
        total_frames: Some(10),
        duration: Some(1000.0),
        ..Default::default()
    };
    let id = eng.init(element("timed"), cfg, &mut clock).sprite();

    for _ in 0..4 {
        step(&mut eng, &mut clock);
    }
    assert!(eng.is_playing(id));
    assert!(clock.history().iter().all(|a| a.delay_ms == 100.0));
    assert_eq!(clock.history().len(), 5);
}

#[test]
fn default_fps_is_twelve() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    eng.init(element("default"), strip(5, false), &mut clock);
    assert_eq!(clock.last_armed().unwrap().delay_ms, 1000.0 / 12.0);
}

#[test]
fn duration_divides_by_active_sequence_length() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let cfg: SpriteConfig = serde_json::from_str(
        r#"{
            "columns": 5, "totalFrames": 10, "duration": 900, "autoplay": false,
            "animations": { "walk": [2, 3, 4], "idle": [0, 1] }
        }"#,
    )
    .unwrap();
    let id = eng.init(element("seq-timed"), cfg, &mut clock).sprite();

    eng.play(id, Some("walk"), &mut clock);
    assert_eq!(clock.last_armed().unwrap().delay_ms, 300.0);
    eng.play(id, Some("idle"), &mut clock);
    assert_eq!(clock.last_armed().unwrap().delay_ms, 450.0);
}

#[test]
fn columns_without_total_frames_ends_after_first_frame() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let cfg = SpriteConfig {
        columns: Some(4),
        ..Default::default()
    };
    let id = eng.init(element("no-total"), cfg, &mut clock).sprite();

    assert!(step(&mut eng, &mut clock));
    assert_eq!(eng.position(id), Some(BackgroundPosition { x: 0.0, y: 0.0 }));
    assert!(!eng.is_playing(id));
}

#[test]
fn sprites_keep_independent_state() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let a = eng.init(element("a"), strip(5, true), &mut clock).sprite();
    let b = eng
        .init(
            element("b"),
            SpriteConfig {
                fps: Some(6.0),
                ..strip(5, true)
            },
            &mut clock,
        )
        .sprite();

    // a ticks every 83.3ms (5 ticks, wrapped), b every 166.7ms (2 ticks)
    assert_eq!(eng.drive(&mut clock, 450.0), 7);
    assert_eq!(eng.state(a).unwrap().frame_cursor, 0);
    assert_eq!(eng.state(b).unwrap().frame_cursor, 2);
    assert_eq!(clock.pending_for(a), 1);
    assert_eq!(clock.pending_for(b), 1);

    eng.stop(a, &mut clock);
    assert!(!eng.is_playing(a));
    assert!(eng.is_playing(b));
}

#[test]
fn long_looping_run_keeps_scheduler_bounded() {
    let mut eng = Engine::default();
    let mut clock = ManualScheduler::new();
    let id = eng.init(element("forever"), strip(5, true), &mut clock).sprite();

    let mut fired = 0;
    for _ in 0..1_000 {
        fired += eng.drive(&mut clock, 1_000.0);
        eng.take_outputs();
    }

    // 12 fps over 1000 simulated seconds
    assert!(fired >= 11_900, "fired {fired}");
    assert!(eng.is_playing(id));
    assert_eq!(clock.pending_len(), 1);
    assert!(clock.history().is_empty());
    assert!(eng.outputs().is_empty());
}
