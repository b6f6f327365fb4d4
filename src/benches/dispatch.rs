// Cost of pushing a full pinch (two fingers down, thirty moves, both up)
// through zoom gesture and touch guide. Each iteration builds a fresh
// pipeline so no state carries over between runs.

use std::hint::black_box;
use std::sync::Arc;
use criterion::{criterion_group, criterion_main, Criterion};
use a11y_gesture_filter::{
    init::config::Configuration,
    runtime::{
        geometry::Rect,
        loopback::{LoopbackActions, LoopbackMagnifier, LoopbackMenu, LoopbackWindows, RecordingSink},
        pipeline::{Collaborators, Pipeline, FEATURE_SCREEN_MAGNIFICATION, FEATURE_TOUCH_EXPLORATION},
        pointer_event::{PointerAction, PointerEvent, PointerItem},
        transmission::DownstreamLog,
    },
};

fn pinch() -> Vec<PointerEvent> {
    let pair = |t: u64, action, id, d: i32| {
        PointerEvent::new(t, action, id, vec![
            PointerItem::at(0, 400 - d, 1000),
            PointerItem::at(1, 600 + d, 1000),
        ])
    };

    let mut events = vec![PointerEvent::single(0, PointerAction::Down, 0, 400, 1000)];
    events.push(pair(10, PointerAction::Down, 1, 0));
    for k in 1..=30 {
        events.push(pair(10 + 10 * k as u64, PointerAction::Move, 0, 5 * k));
    }
    events.push(pair(400, PointerAction::Up, 1, 150));
    events.push(PointerEvent::single(410, PointerAction::Up, 0, 250, 1000));
    events
}

fn build(cfg: &Configuration) -> Pipeline {
    let collaborators = Collaborators {
        sink: Arc::new(RecordingSink::default()),
        magnifier: Some(Arc::new(LoopbackMagnifier::new(Rect::new(0, 0, 1080, 2340), 0))),
        menu: Some(Arc::new(LoopbackMenu::default())),
        windows: Arc::new(LoopbackWindows::default()),
        actions: Arc::new(LoopbackActions::new(true)),
    };
    Pipeline::build(
        cfg,
        FEATURE_SCREEN_MAGNIFICATION | FEATURE_TOUCH_EXPLORATION,
        collaborators,
        Box::new(DownstreamLog::new()),
    )
}

fn dispatch_pinch(c: &mut Criterion) {
    let cfg = Configuration::default();
    let events = pinch();

    c.bench_function("pinch through full pipeline", |b| {
        b.iter(|| {
            let mut pipeline = build(&cfg);
            for ev in &events {
                black_box(pipeline.on_pointer_event(ev));
            }
            pipeline.advance_clock(5_000);
        });
    });
}

fn dispatch_pinch_zoomed(c: &mut Criterion) {
    let cfg = Configuration::default();
    let events = pinch();

    c.bench_function("pinch while magnified", |b| {
        b.iter(|| {
            let mut pipeline = build(&cfg);
            if let Some(zoom) = pipeline.zoom.as_ref() {
                zoom.borrow_mut().start_magnification_interact();
            }
            for ev in &events {
                black_box(pipeline.on_pointer_event(ev));
            }
        });
    });
}

criterion_group!(dispatch, dispatch_pinch, dispatch_pinch_zoomed);
criterion_main!(dispatch);
