use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use serde::Serialize;

use super::capabilities::{
    HotArea, MagnificationMode, MagnifierCapability, MenuCapability, WindowQueryCapability,
};
use super::geometry::distance;
use super::pointer_event::{PointerAction, PointerEvent};
use super::timers::TimerQueue;
use super::transmission::{EventTransmission, NextLink};
use crate::init::config::Configuration;

const TRIPLE_TAP_COUNT: usize = 3;
const SCALE_EPS: f32 = 1e-6;

/// Screenshot tooling injects its scroll with this pointer id; it is never
/// a zoom gesture.
const SCROLL_SHOT_POINTER_ID: i32 = 10000;


#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoomState {
    Ready,
    ZoomIn,
    Sliding,
    MenuSliding,
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoomTimer {
    MultiTap,
}


/// Collaborators of the zoom gesture. Magnifier and menu may be missing, in
/// which case gestures are still recognized but have no visible effect.
#[derive(Clone)]
pub struct ZoomServices {
    pub magnifier: Option<Arc<dyn MagnifierCapability>>,
    pub menu: Option<Arc<dyn MenuCapability>>,
    pub windows: Arc<dyn WindowQueryCapability>,
}


pub struct ZoomGesture {
    state: ZoomState,
    timers: TimerQueue<ZoomTimer>,

    multi_tap_distance: f32,
    tap_distance: f32,
    long_press_ms: u64,
    cfg: Configuration,

    // everything seen while undecided, replayed if it wasn't a zoom gesture
    cache: Vec<PointerEvent>,
    pre_last_down: Option<PointerEvent>,
    last_down: Option<PointerEvent>,
    last_up: Option<PointerEvent>,
    current_move: Option<PointerEvent>,

    long_press_down: Option<PointerEvent>,
    down_pointer_id: i32,
    is_long_press: bool,
    is_tap_on_menu: bool,
    is_triple_down: bool,
    hot_area: Option<HotArea>,
    last_sliding: Option<PointerEvent>,

    // pinch / pan bookkeeping
    scale_at_start: f32,
    is_scale: bool,
    start_scaling: bool,
    pre_span: f32,
    last_span: f32,
    last_scroll_focus: (f32, f32),

    shielded: bool,
    services: ZoomServices,
    next: NextLink,
}


impl ZoomGesture {

    pub fn new(cfg: &Configuration, services: ZoomServices) -> Self {
        ZoomGesture {
            state: ZoomState::Ready,
            timers: TimerQueue::new(),
            multi_tap_distance: cfg.double_tap_slop_px(),
            tap_distance: cfg.tap_min_distance,
            long_press_ms: cfg.zoom_long_press_timer.as_millis() as u64,
            cfg: cfg.clone(),
            cache: Vec::new(),
            pre_last_down: None,
            last_down: None,
            last_up: None,
            current_move: None,
            long_press_down: None,
            down_pointer_id: -1,
            is_long_press: false,
            is_tap_on_menu: false,
            is_triple_down: false,
            hot_area: None,
            last_sliding: None,
            scale_at_start: 1.0,
            is_scale: false,
            start_scaling: false,
            pre_span: 0.0,
            last_span: 0.0,
            last_scroll_focus: (0.0, 0.0),
            shielded: false,
            services,
            next: NextLink::default(),
        }
    }

    pub fn state(&self) -> ZoomState {
        self.state
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_shielded(&self) -> bool {
        self.shielded
    }

    /// While shielded every event is passed on untouched.
    pub fn shield_zoom_gesture(&mut self, shield: bool) {
        info!("Shield zoom gesture: {}", shield);
        self.shielded = shield;
        if !shield {
            return;
        }

        self.clear();
        match &self.services.menu {
            Some(menu) => menu.disable_menu_window(),
            None => warn!("No menu to hide"),
        }
        match &self.services.magnifier {
            Some(magnifier) => magnifier.disable_magnification(true),
            None => error!("No magnifier to disable"),
        }
    }

    /// Magnification was switched on somewhere else (settings, shortcut).
    pub fn start_magnification_interact(&mut self) {
        self.transfer_state(ZoomState::ZoomIn);
    }

    /// Magnification was switched off somewhere else.
    pub fn disable_gesture(&mut self) {
        self.transfer_state(ZoomState::Ready);
    }

    fn transfer_state(&mut self, state: ZoomState) {
        info!("Zoom state {:?} -> {:?}", self.state, state);
        self.state = state;
    }


    // ---- timers ----

    fn fire_due_timers(&mut self, now: u64) {
        while let Some(timer) = self.timers.pop_due(now) {
            match timer {
                ZoomTimer::MultiTap => {
                    debug!("Multi-tap window closed");
                    if self.is_triple_down && self.cfg.zoom_drag_enabled {
                        self.on_drag();
                    } else {
                        self.send_cache_events_to_next();
                    }
                },
            }
        }
        self.timers.observe(now);
    }

    fn post_multi_tap(&mut self) {
        self.timers.post_delayed(ZoomTimer::MultiTap, self.cfg.multi_tap_timer);
    }


    // ---- cache ----

    fn cache_event(&mut self, event: &PointerEvent) {
        if event.pointer_count() == 1 {
            match event.action {
                PointerAction::Down => {
                    self.pre_last_down = self.last_down.replace(event.clone());
                },
                PointerAction::Up => self.last_up = Some(event.clone()),
                PointerAction::Move => self.current_move = Some(event.clone()),
                _ => {}
            }
        }
        self.cache.push(event.clone());
    }

    fn clear_cache_events_and_msg(&mut self) {
        self.cache.clear();
        self.pre_last_down = None;
        self.last_down = None;
        self.last_up = None;
        self.is_triple_down = false;
        self.timers.cancel(ZoomTimer::MultiTap);
    }

    /// Gives up on the cached sequence: every cached event goes downstream
    /// as if nothing had intercepted it. A trailing DOWN may start a new
    /// zoom gesture, so it is recognized again instead.
    fn send_cache_events_to_next(&mut self) {
        let cached = std::mem::take(&mut self.cache);
        self.clear_cache_events_and_msg();
        debug!("Replaying {} cached events", cached.len());

        let total = cached.len();
        for (i, mut event) in cached.into_iter().enumerate() {
            if total > 1 && i + 1 == total && event.action == PointerAction::Down {
                trace!("Trailing DOWN is parsed again");
                self.on_pointer_event(&event);
                continue;
            }

            if self.state != ZoomState::Ready {
                self.convert_to_screen(&mut event);
            }
            self.next.forward(&event);
        }
    }

    fn convert_to_screen(&self, event: &mut PointerEvent) {
        let Some(magnifier) = &self.services.magnifier else { return };
        if !magnifier.is_magnification_window_show() {
            return;
        }

        let mut item = event.acting_item();
        let mut pos = magnifier.convert_coordinates(item.display_x, item.display_y);
        if let Some(area) = self.hot_area {
            pos = magnifier.convert_gesture(area, pos);
        }
        item.set_pos(pos.0, pos.1);
        event.upsert_item(item);
    }


    // ---- validity ----

    fn interval(first: Option<&PointerEvent>, second: Option<&PointerEvent>) -> u64 {
        match (first, second) {
            (Some(a), Some(b)) => b.action_time.saturating_sub(a.action_time),
            _ => 0,
        }
    }

    fn separation(first: Option<&PointerEvent>, second: Option<&PointerEvent>) -> f32 {
        match (first, second) {
            (Some(a), Some(b)) => {
                distance(a.acting_item().display_pos(), b.acting_item().display_pos())
            },
            _ => 0.0,
        }
    }

    fn is_down_valid(&self) -> bool {
        if self.pre_last_down.is_none() {
            return true;
        }
        Self::separation(self.pre_last_down.as_ref(), self.last_down.as_ref()) < self.multi_tap_distance
    }

    fn is_up_valid(&self) -> bool {
        if self.last_down.is_none() {
            return false;
        }
        if Self::interval(self.last_down.as_ref(), self.last_up.as_ref()) >= self.long_press_ms {
            debug!("Held past the long press time");
            return false;
        }
        Self::separation(self.last_down.as_ref(), self.last_up.as_ref()) < self.tap_distance
    }

    fn is_move_valid(&self) -> bool {
        if self.last_down.is_none() {
            return false;
        }
        if Self::interval(self.last_down.as_ref(), self.current_move.as_ref()) >= self.long_press_ms {
            return false;
        }
        Self::separation(self.last_down.as_ref(), self.current_move.as_ref()) < self.tap_distance
    }

    fn is_long_press(&mut self) -> bool {
        if Self::interval(self.long_press_down.as_ref(), self.current_move.as_ref()) >= self.long_press_ms {
            self.is_long_press = true;
            return true;
        }
        false
    }

    fn is_tap_on_input_method(&self, event: &PointerEvent) -> bool {
        if event.pointer_count() != 1 {
            return false;
        }
        let Some(rect) = self.services.windows.input_method_rect() else {
            return false;
        };
        let (x, y) = event.acting_item().display_pos();
        let on_ime = rect.contains(x, y);
        if on_ime {
            info!("Tap landed on the input method window");
        }
        on_ime
    }

    fn is_triple_taps(&mut self) -> bool {
        let ups = self.cache.iter().filter(|e| e.action == PointerAction::Up).count();
        let downs = self.cache.iter().filter(|e| e.action == PointerAction::Down).count();

        if downs == TRIPLE_TAP_COUNT && ups == TRIPLE_TAP_COUNT - 1 {
            debug!("Triple down detected");
            self.is_triple_down = true;
        }
        if ups >= TRIPLE_TAP_COUNT {
            debug!("Triple tap detected");
            self.is_triple_down = false;
            return true;
        }
        false
    }


    // ---- recognition ----

    fn recognize_in_ready_state(&mut self, event: &PointerEvent) {
        let single = event.pointer_count() == 1;
        let mut is_triple_taps = false;

        match event.action {
            PointerAction::Down => {
                self.timers.cancel(ZoomTimer::MultiTap);
                if single && self.is_down_valid() {
                    self.post_multi_tap();
                    self.is_triple_taps();
                } else {
                    self.send_cache_events_to_next();
                }
            },
            PointerAction::Up => {
                if single && self.is_up_valid() && !self.is_tap_on_input_method(event) {
                    is_triple_taps = self.is_triple_taps();
                } else {
                    self.send_cache_events_to_next();
                }
            },
            PointerAction::Move => {
                if !(single && self.is_move_valid()) {
                    self.send_cache_events_to_next();
                }
            },
            PointerAction::Cancel => self.send_cache_events_to_next(),
            _ => {}
        }

        if is_triple_taps {
            self.on_triple_tap(event);
        }
    }

    fn recognize_in_zoom_state_down(&mut self, event: &PointerEvent) {
        self.hot_area = None;
        self.timers.cancel(ZoomTimer::MultiTap);

        match event.pointer_count() {
            1 => {
                self.is_long_press = false;
                let (x, y) = event.acting_item().display_pos();
                self.hot_area = self.services.magnifier.as_ref().and_then(|m| m.check_tap_on_hot_area(x, y));
                self.is_tap_on_menu = self.services.menu.as_ref().is_some_and(|m| m.is_tap_on_menu(x, y));
                self.long_press_down = Some(event.clone());
                self.down_pointer_id = event.pointer_id;

                if self.is_down_valid() {
                    if !self.is_tap_on_menu {
                        self.post_multi_tap();
                    }
                } else {
                    self.send_cache_events_to_next();
                }
            },
            2 => {
                if self.is_long_press || event.is_knuckle() {
                    info!("Long press or knuckle, not sliding");
                    self.send_cache_events_to_next();
                    return;
                }
                self.transfer_state(ZoomState::Sliding);
                self.scale_at_start = self.services.magnifier.as_ref().map_or(1.0, |m| m.scale());
                self.is_scale = false;
                self.start_scaling = false;
                self.clear_cache_events_and_msg();

                let focus = calc_focus_coordinate(event);
                self.last_scroll_focus = focus;
                let span = calc_scale_span(event, focus);
                self.pre_span = span;
                self.last_span = span;
            },
            n => {
                debug!("{} pointers down while zoomed, passing through", n);
                self.send_cache_events_to_next();
            },
        }
    }

    fn recognize_in_zoom_state_move(&mut self, event: &PointerEvent) {
        if event.pointer_count() == 1 && !self.is_long_press() && self.is_move_valid() {
            return;
        }

        if self.is_tap_on_menu && (!self.is_move_valid() || self.is_long_press()) {
            self.transfer_state(ZoomState::MenuSliding);
            self.clear_cache_events_and_msg();
        } else {
            self.send_cache_events_to_next();
        }
    }

    fn recognize_in_zoom_state(&mut self, event: &PointerEvent) {
        let mut is_triple_taps = false;

        match event.action {
            PointerAction::Down => self.recognize_in_zoom_state_down(event),
            PointerAction::Up => {
                if self.down_pointer_id == event.pointer_id {
                    self.is_long_press = false;
                }
                if event.pointer_count() == 1 && self.is_up_valid() && !self.is_tap_on_input_method(event) {
                    match (&self.services.menu, self.is_tap_on_menu) {
                        (Some(menu), true) => {
                            menu.on_menu_tap();
                            self.clear_cache_events_and_msg();
                        },
                        _ => is_triple_taps = self.is_triple_taps(),
                    }
                } else {
                    self.send_cache_events_to_next();
                }
            },
            PointerAction::Move => self.recognize_in_zoom_state_move(event),
            PointerAction::Cancel => self.send_cache_events_to_next(),
            _ => {}
        }

        if is_triple_taps {
            self.on_triple_tap(event);
        }
    }

    fn recognize_in_sliding_state(&mut self, event: &PointerEvent) {
        let focus = calc_focus_coordinate(event);
        if event.pointer_count() == 2 {
            self.recognize_scale(event, focus);
            self.recognize_scroll(event, focus);
        }

        match event.action {
            PointerAction::Up if event.pointer_count() == 1 => {
                self.transfer_state(ZoomState::ZoomIn);
                if self.is_scale {
                    if let Some(magnifier) = &self.services.magnifier {
                        if (self.scale_at_start - magnifier.scale()).abs() > self.cfg.min_persist_scale_delta {
                            magnifier.persist_scale();
                        }
                    }
                    self.is_scale = false;
                }
            },
            PointerAction::Cancel => {
                self.transfer_state(ZoomState::ZoomIn);
                self.is_scale = false;
            },
            _ => {}
        }
    }

    fn recognize_in_menu_sliding_state(&mut self, event: &PointerEvent) {
        match event.action {
            PointerAction::Move => {
                if !self.is_tap_on_menu {
                    self.last_sliding = None;
                    return;
                }
                self.clear_cache_events_and_msg();

                let last = self.last_sliding.get_or_insert_with(|| event.clone()).acting_item();
                let current = event.acting_item();
                let (dx, dy) = (current.display_x - last.display_x, current.display_y - last.display_y);
                match &self.services.menu {
                    Some(menu) => menu.move_menu_window(dx, dy),
                    None => error!("No menu to move"),
                }
                self.last_sliding = Some(event.clone());
            },
            PointerAction::Up => {
                self.last_sliding = None;
                self.is_tap_on_menu = false;
                if let Some(menu) = &self.services.menu {
                    menu.attach_to_edge();
                }
                self.transfer_state(ZoomState::ZoomIn);
                self.clear_cache_events_and_msg();
            },
            _ => {}
        }
    }

    fn recognize_in_dragging_state(&mut self, event: &PointerEvent) {
        let drag_pointer = self.long_press_down.as_ref().map_or(0, |e| e.pointer_id);
        if event.pointer_id != drag_pointer {
            return;
        }

        match event.action {
            PointerAction::Move => {
                let (x, y) = event.acting_item().display_pos();
                let offset = (self.last_scroll_focus.0 - x as f32, self.last_scroll_focus.1 - y as f32);
                if offset.0.abs() > self.cfg.min_scroll_span || offset.1.abs() > self.cfg.min_scroll_span {
                    self.last_scroll_focus = (x as f32, y as f32);
                    self.on_scroll(offset.0, offset.1);
                }
            },
            PointerAction::Up => {
                self.off_zoom();
                self.transfer_state(ZoomState::Ready);
            },
            _ => {}
        }
    }

    fn recognize_scroll(&mut self, event: &PointerEvent, focus: (f32, f32)) {
        match event.action {
            PointerAction::Down | PointerAction::Up => self.last_scroll_focus = focus,
            PointerAction::Move => {
                let dx = focus.0 - self.last_scroll_focus.0;
                let dy = focus.1 - self.last_scroll_focus.1;
                if dx.abs() > self.cfg.min_scroll_span || dy.abs() > self.cfg.min_scroll_span {
                    self.last_scroll_focus = focus;
                    self.on_scroll(dx, dy);
                }
            },
            _ => {}
        }
    }

    fn recognize_scale(&mut self, event: &PointerEvent, focus: (f32, f32)) {
        let action = event.action;
        if (action == PointerAction::Up && event.pointer_count() != 2) || action == PointerAction::Cancel {
            debug!("Scaling ended");
            self.start_scaling = false;
            self.pre_span = 0.0;
            self.last_span = 0.0;
            return;
        }

        let span = calc_scale_span(event, focus);

        if !self.start_scaling {
            if (self.pre_span - span).abs() >= self.cfg.min_scale_span {
                debug!("Scaling started");
                self.start_scaling = true;
            }
        } else {
            // span settled: wait for the next real pinch
            if (self.last_span - span).abs() < 1.0 {
                self.start_scaling = false;
                self.pre_span = span;
                self.last_span = span;
            }
            if matches!(action, PointerAction::Up | PointerAction::Down) {
                self.pre_span = span;
                self.last_span = span;
            }
        }

        if !self.start_scaling || action != PointerAction::Move {
            return;
        }

        let delta = span - self.last_span;
        if delta.abs() > SCALE_EPS {
            self.on_scale(delta);
            self.last_span = span;
            self.is_scale = true;
        }
    }


    // ---- magnifier side effects ----

    fn on_triple_tap(&mut self, event: &PointerEvent) {
        match self.state {
            ZoomState::Ready => {
                self.transfer_state(ZoomState::ZoomIn);
                let (x, y) = event.acting_item().display_pos();
                self.on_zoom(x, y, true);
            },
            ZoomState::ZoomIn => {
                self.transfer_state(ZoomState::Ready);
                self.off_zoom();
            },
            _ => {}
        }
        self.clear_cache_events_and_msg();
    }

    fn on_drag(&mut self) {
        self.transfer_state(ZoomState::Dragging);
        let Some(down) = self.last_down.clone() else {
            error!("Zoom drag with no DOWN to anchor on");
            return;
        };

        let (x, y) = down.acting_item().display_pos();
        self.on_zoom(x, y, false);
        self.long_press_down = Some(down);
        self.last_scroll_focus = (x as f32, y as f32);
        self.clear_cache_events_and_msg();
    }

    fn on_zoom(&self, x: i32, y: i32, show_menu: bool) {
        info!("Zoom on at ({}, {})", x, y);
        let Some(magnifier) = &self.services.magnifier else {
            error!("No magnifier, zoom has no effect");
            return;
        };
        magnifier.enable_magnification(x, y);
        if show_menu {
            if let Some(menu) = &self.services.menu {
                menu.show_menu_window(MagnificationMode::FullScreen);
            }
        }
    }

    fn off_zoom(&self) {
        info!("Zoom off");
        let Some(magnifier) = &self.services.magnifier else {
            error!("No magnifier, zoom off has no effect");
            return;
        };
        if magnifier.is_magnification_window_show() {
            magnifier.disable_magnification(false);
            if let Some(menu) = &self.services.menu {
                menu.disable_menu_window();
            }
        }
    }

    fn on_scroll(&self, dx: f32, dy: f32) {
        trace!("Pan by ({}, {})", dx, dy);
        match &self.services.magnifier {
            Some(magnifier) => magnifier.move_magnification(dx as i32, dy as i32),
            None => error!("No magnifier to pan"),
        }
    }

    fn on_scale(&self, delta_span: f32) {
        trace!("Scale by span {}", delta_span);
        match &self.services.magnifier {
            Some(magnifier) => magnifier.set_scale(delta_span),
            None => error!("No magnifier to scale"),
        }
    }

    /// Flushes whatever is cached and goes back to waiting for a triple tap.
    pub fn clear(&mut self) {
        self.send_cache_events_to_next();
        self.transfer_state(ZoomState::Ready);
    }
}


/// Centroid of the pointers still down (an UP's own pointer is leaving).
fn calc_focus_coordinate(event: &PointerEvent) -> (f32, f32) {
    let staying = staying_items(event);
    if staying.is_empty() {
        return (0.0, 0.0);
    }
    let n = staying.len() as f32;
    let (sx, sy) = staying.iter().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}

/// Mean distance of the staying pointers from `focus`.
fn calc_scale_span(event: &PointerEvent, focus: (f32, f32)) -> f32 {
    let staying = staying_items(event);
    if staying.is_empty() {
        return 0.0;
    }
    let n = staying.len() as f32;
    let (sx, sy) = staying
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + (x - focus.0).abs(), sy + (y - focus.1).abs()));
    (sx / n).hypot(sy / n) / 2.0
}

fn staying_items(event: &PointerEvent) -> Vec<(f32, f32)> {
    let leaving = (event.action == PointerAction::Up).then_some(event.pointer_id);
    event.items
        .iter()
        .filter(|item| Some(item.pointer_id) != leaving)
        .map(|item| {
            let (x, y) = item.raw_pos();
            (x as f32, y as f32)
        })
        .collect()
}


impl EventTransmission for ZoomGesture {

    fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
        self.fire_due_timers(event.action_time);

        if self.shielded {
            self.next.forward(event);
            return true;
        }

        if matches!(event.action, PointerAction::Down | PointerAction::Up) {
            debug!("Zoom gesture received {:?} in {:?}", event.action, self.state);
        }

        if (self.state == ZoomState::Ready && !event.is_touchscreen())
            || event.pointer_id == SCROLL_SHOT_POINTER_ID
        {
            self.next.forward(event);
            return false;
        }

        match self.state {
            ZoomState::Ready => {
                self.cache_event(event);
                self.recognize_in_ready_state(event);
            },
            ZoomState::ZoomIn => {
                self.cache_event(event);
                self.recognize_in_zoom_state(event);
            },
            ZoomState::Sliding => self.recognize_in_sliding_state(event),
            ZoomState::MenuSliding => self.recognize_in_menu_sliding_state(event),
            ZoomState::Dragging => self.recognize_in_dragging_state(event),
        }
        true
    }

    fn advance_clock(&mut self, now: u64) {
        self.fire_due_timers(now);
        self.next.advance_clock(now);
    }

    fn clear_events(&mut self, input_source: u32) {
        self.clear();
        self.next.clear_events(input_source);
    }

    fn destroy_events(&mut self) {
        self.clear();
        self.off_zoom();
        self.next.destroy_events();
    }

    fn set_next(&mut self, next: Box<dyn EventTransmission>) {
        self.next = NextLink::new(next);
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::runtime::geometry::Rect;
    use crate::runtime::loopback::{
        LoopbackMagnifier, LoopbackMenu, LoopbackWindows, MagnifierCall, MenuCall, WindowLayout,
    };
    use crate::runtime::pointer_event::PointerItem;
    use crate::runtime::transmission::DownstreamLog;
    use PointerAction::*;

    struct Rig {
        zoom: ZoomGesture,
        out: Rc<RefCell<DownstreamLog>>,
        magnifier: Arc<LoopbackMagnifier>,
        menu: Arc<LoopbackMenu>,
    }

    impl Rig {
        fn with(cfg: Configuration, layout: WindowLayout, menu_rect: Option<Rect>) -> Self {
            let magnifier = Arc::new(LoopbackMagnifier::new(Rect::new(0, 0, 1080, 2340), 0));
            let menu = Arc::new(LoopbackMenu::new(menu_rect));
            let services = ZoomServices {
                magnifier: Some(magnifier.clone()),
                menu: Some(menu.clone()),
                windows: Arc::new(LoopbackWindows::new(layout)),
            };
            let out = Rc::new(RefCell::new(DownstreamLog::new()));
            let mut zoom = ZoomGesture::new(&cfg, services);
            zoom.set_next(Box::new(out.clone()));
            Rig { zoom, out, magnifier, menu }
        }

        fn new() -> Self {
            Self::with(Configuration::default(), WindowLayout::default(), None)
        }

        fn feed(&mut self, ev: PointerEvent) -> bool {
            self.zoom.on_pointer_event(&ev)
        }

        fn tap(&mut self, t: u64, x: i32, y: i32) {
            self.feed(one(t, Down, x, y));
            self.feed(one(t + 50, Up, x, y));
        }

        fn downstream(&self) -> Vec<PointerEvent> {
            self.out.borrow_mut().take()
        }
    }

    fn one(t: u64, action: PointerAction, x: i32, y: i32) -> PointerEvent {
        PointerEvent::single(t, action, 0, x, y)
    }

    fn two(t: u64, action: PointerAction, id: i32, a: (i32, i32), b: (i32, i32)) -> PointerEvent {
        PointerEvent::new(t, action, id, vec![PointerItem::at(0, a.0, a.1), PointerItem::at(1, b.0, b.1)])
    }


    #[test]
    fn triple_tap_zooms_in_at_the_tap() {
        let mut rig = Rig::new();
        rig.tap(0, 500, 500);
        rig.tap(100, 503, 498);
        rig.tap(200, 498, 503);
        rig.zoom.advance_clock(1_000);

        assert_eq!(rig.zoom.state(), ZoomState::ZoomIn);
        assert_eq!(rig.magnifier.calls(), vec![MagnifierCall::Enable { x: 498, y: 503 }]);
        assert_eq!(rig.menu.calls(), vec![MenuCall::Show { mode: MagnificationMode::FullScreen }]);
        assert!(rig.downstream().is_empty());
        assert_eq!(rig.zoom.cached_len(), 0);
    }

    #[test]
    fn second_triple_tap_zooms_out() {
        let mut rig = Rig::new();
        rig.tap(0, 500, 500);
        rig.tap(100, 500, 500);
        rig.tap(200, 500, 500);
        rig.magnifier.take_calls();
        rig.menu.take_calls();

        rig.tap(1_000, 700, 700);
        rig.tap(1_100, 700, 700);
        rig.tap(1_200, 700, 700);

        assert_eq!(rig.zoom.state(), ZoomState::Ready);
        assert_eq!(rig.magnifier.calls(), vec![MagnifierCall::Disable { persist: false }]);
        assert_eq!(rig.menu.calls(), vec![MenuCall::Disable]);
        assert!(rig.downstream().is_empty());
    }

    #[test]
    fn lone_tap_is_replayed_when_window_closes() {
        let mut rig = Rig::new();
        rig.tap(0, 500, 500);
        assert!(rig.downstream().is_empty());

        rig.zoom.advance_clock(400);
        let out = rig.downstream();
        assert_eq!(out, vec![one(0, Down, 500, 500), one(50, Up, 500, 500)]);
        assert_eq!(rig.zoom.state(), ZoomState::Ready);
    }

    #[test]
    fn moving_finger_is_not_a_tap() {
        let mut rig = Rig::new();
        rig.feed(one(0, Down, 500, 500));
        rig.feed(one(20, Move, 600, 500));

        let out = rig.downstream();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].action, Move);
        assert_eq!(rig.zoom.cached_len(), 0);
    }

    #[test]
    fn taps_on_the_keyboard_never_zoom() {
        let layout = WindowLayout { input_method: Some(Rect::new(0, 1500, 1080, 2340)), ..Default::default() };
        let mut rig = Rig::with(Configuration::default(), layout, None);
        rig.tap(0, 500, 2000);
        rig.tap(100, 500, 2000);
        rig.tap(200, 500, 2000);

        assert_eq!(rig.zoom.state(), ZoomState::Ready);
        assert!(rig.magnifier.calls().is_empty());
        assert_eq!(rig.downstream().len(), 6);
    }

    #[test]
    fn steady_pinch_only_scales_up() {
        let mut rig = Rig::new();
        rig.zoom.start_magnification_interact();
        rig.feed(one(0, Down, 400, 1000));
        rig.feed(two(10, Down, 1, (400, 1000), (600, 1000)));
        assert_eq!(rig.zoom.state(), ZoomState::Sliding);

        for k in 1..=5 {
            let d = 10 * k;
            rig.feed(two(10 + 10 * k as u64, Move, 0, (400 - d, 1000), (600 + d, 1000)));
        }
        rig.feed(two(100, Up, 1, (350, 1000), (650, 1000)));
        rig.feed(one(110, Up, 350, 1000));

        let calls = rig.magnifier.calls();
        let deltas: Vec<f32> = calls
            .iter()
            .filter_map(|c| match c {
                MagnifierCall::SetScale { delta_span } => Some(*delta_span),
                _ => None,
            })
            .collect();
        assert_eq!(deltas.len(), 5);
        assert!(deltas.iter().all(|d| *d > 0.0));
        assert_eq!(calls.last(), Some(&MagnifierCall::PersistScale));
        assert_eq!(rig.zoom.state(), ZoomState::ZoomIn);
        assert!(rig.downstream().is_empty());
    }

    #[test]
    fn two_finger_pan_moves_the_viewport() {
        let mut rig = Rig::new();
        rig.zoom.start_magnification_interact();
        rig.feed(one(0, Down, 400, 1000));
        rig.feed(two(10, Down, 1, (400, 1000), (600, 1000)));
        rig.feed(two(30, Move, 0, (400, 1050), (600, 1050)));

        assert_eq!(rig.magnifier.calls(), vec![MagnifierCall::Move { dx: 0, dy: 50 }]);
    }

    #[test]
    fn knuckle_pair_is_passed_through() {
        let mut rig = Rig::new();
        rig.zoom.start_magnification_interact();
        rig.feed(one(0, Down, 400, 1000));
        let mut down = two(10, Down, 1, (400, 1000), (600, 1000));
        down.items[1].tool_type = crate::runtime::pointer_event::ToolType::Knuckle;
        rig.feed(down);

        assert_eq!(rig.zoom.state(), ZoomState::ZoomIn);
        assert_eq!(rig.downstream().len(), 2);
    }

    #[test]
    fn menu_tap_and_drag() {
        let mut rig = Rig::with(Configuration::default(), WindowLayout::default(), Some(Rect::new(0, 0, 100, 100)));
        rig.zoom.start_magnification_interact();

        rig.tap(0, 50, 50);
        assert_eq!(rig.menu.take_calls(), vec![MenuCall::Tap]);

        rig.feed(one(1_000, Down, 50, 50));
        rig.feed(one(1_020, Move, 80, 50));
        assert_eq!(rig.zoom.state(), ZoomState::MenuSliding);
        rig.feed(one(1_040, Move, 120, 60));
        rig.feed(one(1_060, Move, 150, 70));
        rig.feed(one(1_080, Up, 150, 70));

        assert_eq!(
            rig.menu.calls(),
            vec![MenuCall::Move { dx: 0, dy: 0 }, MenuCall::Move { dx: 30, dy: 10 }, MenuCall::AttachToEdge],
        );
        assert_eq!(rig.zoom.state(), ZoomState::ZoomIn);
        assert!(rig.downstream().is_empty());
    }

    #[test]
    fn shielded_gesture_passes_everything() {
        let mut rig = Rig::new();
        rig.zoom.shield_zoom_gesture(true);
        assert_eq!(rig.magnifier.calls(), vec![MagnifierCall::Disable { persist: true }]);
        assert_eq!(rig.menu.calls(), vec![MenuCall::Disable]);

        rig.tap(0, 500, 500);
        rig.tap(100, 500, 500);
        rig.tap(200, 500, 500);
        assert_eq!(rig.downstream().len(), 6);
        assert_eq!(rig.zoom.state(), ZoomState::Ready);
    }

    #[test]
    fn missing_magnifier_still_changes_state() {
        let services = ZoomServices {
            magnifier: None,
            menu: None,
            windows: Arc::new(LoopbackWindows::default()),
        };
        let mut zoom = ZoomGesture::new(&Configuration::default(), services);
        for t in [0u64, 100, 200] {
            zoom.on_pointer_event(&one(t, Down, 500, 500));
            zoom.on_pointer_event(&one(t + 50, Up, 500, 500));
        }
        assert_eq!(zoom.state(), ZoomState::ZoomIn);
    }

    #[test]
    fn triple_down_then_drag_pans_when_enabled() {
        let cfg = Configuration { zoom_drag_enabled: true, ..Default::default() };
        let mut rig = Rig::with(cfg, WindowLayout::default(), None);
        rig.tap(0, 500, 500);
        rig.tap(100, 500, 500);
        rig.feed(one(200, Down, 500, 500));
        rig.zoom.advance_clock(450);
        assert_eq!(rig.zoom.state(), ZoomState::Dragging);

        rig.feed(one(500, Move, 500, 600));
        rig.feed(one(550, Up, 500, 600));

        assert_eq!(
            rig.magnifier.calls(),
            vec![
                MagnifierCall::Enable { x: 500, y: 500 },
                MagnifierCall::Move { dx: 0, dy: -100 },
                MagnifierCall::Disable { persist: false },
            ],
        );
        assert_eq!(rig.zoom.state(), ZoomState::Ready);
        assert!(rig.downstream().is_empty());
    }

    #[test]
    fn triple_down_is_replayed_without_drag_variant() {
        let mut rig = Rig::new();
        rig.tap(0, 500, 500);
        rig.tap(100, 500, 500);
        rig.feed(one(200, Down, 500, 500));
        rig.zoom.advance_clock(450);

        // the held third DOWN is recognized again as a fresh first tap
        assert_eq!(rig.zoom.state(), ZoomState::Ready);
        assert_eq!(rig.downstream().len(), 4);
        assert_eq!(rig.zoom.cached_len(), 1);
    }
}
