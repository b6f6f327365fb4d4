//! In-process stand-ins for the window system and the magnifier.
//!
//! They keep a log of every call (and write it to the logger) so the
//! replay tool can print what the recognizers asked for, and tests can
//! assert on it.

use std::sync::{Mutex, MutexGuard};

use log::info;
use serde::{Deserialize, Serialize};

use super::capabilities::{
    AccessibilityEventInfo, ActionCapability, ActionType, EventSink, HotArea,
    MagnificationMode, MagnifierCapability, MenuCapability, WindowQueryCapability,
};
use super::geometry::Rect;


// A poisoned log only means a test panicked mid-call; keep going with
// whatever was recorded.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}


#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AccessibilityEventInfo>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AccessibilityEventInfo> {
        lock(&self.events).clone()
    }

    pub fn take(&self) -> Vec<AccessibilityEventInfo> {
        std::mem::take(&mut *lock(&self.events))
    }
}

impl EventSink for RecordingSink {
    fn send_event(&self, info: AccessibilityEventInfo) {
        info!("a11y event: {:?}", info);
        lock(&self.events).push(info);
    }
}


#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", tag = "call")]
pub enum MagnifierCall {
    Enable { x: i32, y: i32 },
    Disable { persist: bool },
    Move { dx: i32, dy: i32 },
    SetScale { delta_span: f32 },
    PersistScale,
}

#[derive(Debug)]
struct MagnifierState {
    shown: bool,
    scale: f32,
    center: (i32, i32),
    calls: Vec<MagnifierCall>,
}

/// Magnifier that tracks shown/scale/center and nothing else.
#[derive(Debug)]
pub struct LoopbackMagnifier {
    state: Mutex<MagnifierState>,
    screen: Rect,
    hot_area_margin: i32,
}

impl LoopbackMagnifier {
    pub fn new(screen: Rect, hot_area_margin: i32) -> Self {
        LoopbackMagnifier {
            state: Mutex::new(MagnifierState {
                shown: false,
                scale: 2.0,
                center: screen.center(),
                calls: Vec::new(),
            }),
            screen,
            hot_area_margin,
        }
    }

    pub fn calls(&self) -> Vec<MagnifierCall> {
        lock(&self.state).calls.clone()
    }

    pub fn take_calls(&self) -> Vec<MagnifierCall> {
        std::mem::take(&mut lock(&self.state).calls)
    }

    /// Turns the overlay on without recording a call, as if another part of
    /// the system had enabled magnification.
    pub fn force_shown(&self, shown: bool) {
        lock(&self.state).shown = shown;
    }

    fn record(&self, call: MagnifierCall) -> MutexGuard<'_, MagnifierState> {
        info!("magnifier: {:?}", call);
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }
}

impl MagnifierCapability for LoopbackMagnifier {

    fn enable_magnification(&self, center_x: i32, center_y: i32) {
        let mut state = self.record(MagnifierCall::Enable { x: center_x, y: center_y });
        state.shown = true;
        state.center = (center_x, center_y);
    }

    fn disable_magnification(&self, persist: bool) {
        self.record(MagnifierCall::Disable { persist }).shown = false;
    }

    fn move_magnification(&self, dx: i32, dy: i32) {
        let mut state = self.record(MagnifierCall::Move { dx, dy });
        state.center = (state.center.0 - dx, state.center.1 - dy);
    }

    fn set_scale(&self, delta_span: f32) {
        let mut state = self.record(MagnifierCall::SetScale { delta_span });
        state.scale = (state.scale + delta_span / 100.0).clamp(1.0, 8.0);
    }

    fn persist_scale(&self) {
        self.record(MagnifierCall::PersistScale);
    }

    fn is_magnification_window_show(&self) -> bool {
        lock(&self.state).shown
    }

    fn scale(&self) -> f32 {
        lock(&self.state).scale
    }

    fn check_tap_on_hot_area(&self, x: i32, y: i32) -> Option<HotArea> {
        let m = self.hot_area_margin;
        if m <= 0 || !self.screen.contains(x, y) {
            return None;
        }
        if x < self.screen.left + m {
            Some(HotArea::Left)
        } else if x >= self.screen.right - m {
            Some(HotArea::Right)
        } else if y < self.screen.top + m {
            Some(HotArea::Top)
        } else if y >= self.screen.bottom - m {
            Some(HotArea::Bottom)
        } else {
            None
        }
    }

    fn convert_coordinates(&self, x: i32, y: i32) -> (i32, i32) {
        let state = lock(&self.state);
        let (cx, cy) = state.center;
        let (sx, sy) = self.screen.center();
        (
            cx + ((x - sx) as f32 / state.scale) as i32,
            cy + ((y - sy) as f32 / state.scale) as i32,
        )
    }

    fn convert_gesture(&self, area: HotArea, (x, y): (i32, i32)) -> (i32, i32) {
        let m = self.hot_area_margin;
        match area {
            HotArea::Left => (x - m, y),
            HotArea::Right => (x + m, y),
            HotArea::Top => (x, y - m),
            HotArea::Bottom => (x, y + m),
        }
    }
}


#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", tag = "call")]
pub enum MenuCall {
    Tap,
    Move { dx: i32, dy: i32 },
    AttachToEdge,
    Show { mode: MagnificationMode },
    Disable,
}

/// Menu button occupying a fixed rectangle.
#[derive(Debug, Default)]
pub struct LoopbackMenu {
    rect: Mutex<Option<Rect>>,
    calls: Mutex<Vec<MenuCall>>,
}

impl LoopbackMenu {
    pub fn new(rect: Option<Rect>) -> Self {
        LoopbackMenu { rect: Mutex::new(rect), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<MenuCall> {
        lock(&self.calls).clone()
    }

    pub fn take_calls(&self) -> Vec<MenuCall> {
        std::mem::take(&mut *lock(&self.calls))
    }

    fn record(&self, call: MenuCall) {
        info!("menu: {:?}", call);
        lock(&self.calls).push(call);
    }
}

impl MenuCapability for LoopbackMenu {

    fn is_tap_on_menu(&self, x: i32, y: i32) -> bool {
        lock(&self.rect).is_some_and(|r| r.contains(x, y))
    }

    fn on_menu_tap(&self) {
        self.record(MenuCall::Tap);
    }

    fn move_menu_window(&self, dx: i32, dy: i32) {
        self.record(MenuCall::Move { dx, dy });
        if let Some(r) = lock(&self.rect).as_mut() {
            *r = Rect::new(r.left + dx, r.top + dy, r.right + dx, r.bottom + dy);
        }
    }

    fn attach_to_edge(&self) {
        self.record(MenuCall::AttachToEdge);
    }

    fn show_menu_window(&self, mode: MagnificationMode) {
        self.record(MenuCall::Show { mode });
    }

    fn disable_menu_window(&self) {
        self.record(MenuCall::Disable);
    }
}


/// Snapshot of the window geometry the touch guide may query.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowLayout {
    #[serde(default)]
    pub active_window_id: i32,
    #[serde(default)]
    pub input_method: Option<Rect>,
    #[serde(default)]
    pub accessibility_focus: Option<Rect>,
    #[serde(default)]
    pub focused_window: Option<Rect>,
    #[serde(default)]
    pub display: Option<Rect>,
}

#[derive(Debug, Default)]
pub struct LoopbackWindows {
    layout: Mutex<WindowLayout>,
}

impl LoopbackWindows {
    pub fn new(layout: WindowLayout) -> Self {
        LoopbackWindows { layout: Mutex::new(layout) }
    }

    pub fn set_layout(&self, layout: WindowLayout) {
        *lock(&self.layout) = layout;
    }
}

impl WindowQueryCapability for LoopbackWindows {

    fn active_window_id(&self) -> i32 {
        lock(&self.layout).active_window_id
    }

    fn input_method_rect(&self) -> Option<Rect> {
        lock(&self.layout).input_method
    }

    fn accessibility_focus_rect(&self) -> Option<Rect> {
        lock(&self.layout).accessibility_focus
    }

    fn focused_window_rect(&self) -> Option<Rect> {
        lock(&self.layout).focused_window
    }

    fn display_rect(&self) -> Option<Rect> {
        lock(&self.layout).display
    }
}


/// Focused element that accepts (or refuses) every action it is sent.
#[derive(Debug, Default)]
pub struct LoopbackActions {
    accept: bool,
    calls: Mutex<Vec<ActionType>>,
}

impl LoopbackActions {
    pub fn new(accept: bool) -> Self {
        LoopbackActions { accept, calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<ActionType> {
        lock(&self.calls).clone()
    }
}

impl ActionCapability for LoopbackActions {
    fn execute_action_on_accessibility_focused(&self, action: ActionType) -> bool {
        info!("focused element asked to {:?}, accepting: {}", action, self.accept);
        lock(&self.calls).push(action);
        self.accept
    }
}
