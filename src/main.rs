use std::{
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use clap::Parser;
use log::{debug, info};
use serde::Serialize;

use a11y_gesture_filter::{
    error::ReplayError,
    init::{config, trace},
    runtime::{
        capabilities::{AccessibilityEventInfo, EventSink, MagnifierCapability},
        geometry::Rect,
        loopback::{LoopbackActions, LoopbackMagnifier, LoopbackMenu, LoopbackWindows, MagnifierCall, MenuCall},
        pipeline::{Collaborators, Pipeline},
        pointer_event::PointerEvent,
        touch_guider::TouchGuideState,
        transmission::EventTransmission,
        zoom_gesture::ZoomState,
    },
};


/// Replays a recorded touch trace through the accessibility gesture
/// filters and prints what comes out, one JSON object per line.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Trace file (JSON).
    trace: PathBuf,

    /// Configuration file to use instead of the one in the config dir.
    #[arg(long)]
    config: Option<PathBuf>,
}


#[derive(Serialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Line {
    Pointer { event: PointerEvent },
    Accessibility { info: AccessibilityEventInfo },
    #[serde(rename_all = "camelCase")]
    Summary {
        zoom_state: Option<ZoomState>,
        touch_guide_state: Option<TouchGuideState>,
        magnifier_calls: Vec<MagnifierCall>,
        menu_calls: Vec<MenuCall>,
    },
}


// Both outputs land in one transcript so they print in the order the
// recognizers produced them.
#[derive(Default)]
struct Transcript {
    lines: Mutex<Vec<Line>>,
}

impl Transcript {
    fn push(&self, line: Line) {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).push(line);
    }

    fn drain(&self) -> Vec<Line> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl EventSink for Transcript {
    fn send_event(&self, info: AccessibilityEventInfo) {
        self.push(Line::Accessibility { info });
    }
}

// Stands in for the window system at the end of the chain.
struct WindowSystem(Arc<Transcript>);

impl EventTransmission for WindowSystem {
    fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
        self.0.push(Line::Pointer { event: event.clone() });
        true
    }

    fn advance_clock(&mut self, _now: u64) {}

    fn clear_events(&mut self, _input_source: u32) {}

    fn destroy_events(&mut self) {}

    fn set_next(&mut self, _next: Box<dyn EventTransmission>) {}
}


fn print_lines(transcript: &Transcript, out: &mut impl Write) -> Result<(), ReplayError> {
    for line in transcript.drain() {
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    }
    Ok(())
}


fn main() -> Result<(), ReplayError> {

    let cli = Cli::parse();

    let cfg = config::init_cfg(cli.config.as_deref());
    config::init_logger(&cfg)?;

    let trace = trace::load_trace(&cli.trace)?;
    info!("Loaded {} events from {:?}", trace.events.len(), cli.trace);

    let screen = Rect::new(0, 0, cfg.screen_width, cfg.screen_height);
    let magnifier = Arc::new(LoopbackMagnifier::new(screen, trace.hot_area_margin));
    let menu = Arc::new(LoopbackMenu::new(trace.menu));
    let transcript = Arc::new(Transcript::default());

    let collaborators = Collaborators {
        sink: transcript.clone(),
        magnifier: trace
            .magnifier_available
            .then(|| magnifier.clone() as Arc<dyn MagnifierCapability>),
        menu: Some(menu.clone()),
        windows: Arc::new(LoopbackWindows::new(trace.layout.clone())),
        actions: Arc::new(LoopbackActions::new(trace.click_accepted)),
    };

    let mut pipeline = Pipeline::build(
        &cfg,
        trace.features,
        collaborators,
        Box::new(WindowSystem(transcript.clone())),
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for event in &trace.events {
        debug!("Replaying {:?} at t={}", event.action, event.action_time);
        pipeline.on_pointer_event(event);
        print_lines(&transcript, &mut out)?;
    }

    pipeline.advance_clock(trace.end_time());
    pipeline.destroy_events();
    print_lines(&transcript, &mut out)?;

    let summary = Line::Summary {
        zoom_state: pipeline.zoom.as_ref().map(|z| z.borrow().state()),
        touch_guide_state: pipeline.touch_guide.as_ref().map(|g| g.borrow().state()),
        magnifier_calls: magnifier.take_calls(),
        menu_calls: menu.take_calls(),
    };
    writeln!(out, "{}", serde_json::to_string(&summary)?)?;

    info!("Replay finished at t={}", trace.end_time());
    Ok(())
}
