use std::sync::Arc;

use log::{debug, info, trace, warn};
use serde::Serialize;

use super::capabilities::{
    AccessibilityEventInfo, AccessibilityEventType, ActionCapability, ActionType, EventSink,
    GestureType, WindowQueryCapability,
};
use super::gesture_recognizer::{GestureNotice, GestureRecognizer};
use super::pointer_event::{PointerAction, PointerEvent, PointerItem};
use super::recorder::{InjectedEventRecorder, ReceivedEventRecorder};
use super::timers::TimerQueue;
use super::transmission::{EventTransmission, NextLink};
use crate::init::config::Configuration;

/// A second focus click this soon after the previous one is swallowed.
const IGNORE_REPEAT_EXECUTE_INTERVAL: u64 = 300;


#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TouchGuideState {
    TouchGuiding,
    Dragging,
    Transmitting,
    GestureRecognizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideTimer {
    ExitGestureRec,
    SendHoverEnterMove,
    SendHoverExit,
    SendTouchInteractionEnd,
    SendTouchGuideEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickLocation {
    AccessibilityFocus,
    LastTouchGuide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LongPressOffset {
    pointer_id: i32,
    dx: i32,
    dy: i32,
}


/// Collaborators the touch guide reports to.
#[derive(Clone)]
pub struct TouchGuideServices {
    pub sink: Arc<dyn EventSink>,
    pub windows: Arc<dyn WindowQueryCapability>,
    pub actions: Arc<dyn ActionCapability>,
}


/// Touch exploration for screen-reader users.
///
/// One finger explores (hover events go downstream instead of touches), two
/// fingers moving together drag, anything else is passed through as real
/// touches. Single-finger swipes and double taps are handed to the
/// accessibility service as gestures and never reach the window system.
pub struct TouchGuider {
    cfg: Configuration,
    state: TouchGuideState,
    timers: TimerQueue<GuideTimer>,
    recognizer: GestureRecognizer,
    received: ReceivedEventRecorder,
    injected: InjectedEventRecorder,

    // touches held back until we know they aren't the start of a gesture
    hover_buffer: Vec<PointerEvent>,

    is_touch_guiding: bool,
    is_touch_start: bool,
    touch_end_owed: bool,
    dragging_pointer_id: Option<i32>,
    long_press: Option<LongPressOffset>,
    last_focus_click: Option<u64>,

    services: TouchGuideServices,
    next: NextLink,
}


impl TouchGuider {

    pub fn new(cfg: &Configuration, services: TouchGuideServices) -> Self {
        TouchGuider {
            cfg: cfg.clone(),
            state: TouchGuideState::TouchGuiding,
            timers: TimerQueue::new(),
            recognizer: GestureRecognizer::new(cfg),
            received: ReceivedEventRecorder::default(),
            injected: InjectedEventRecorder::default(),
            hover_buffer: Vec::new(),
            is_touch_guiding: false,
            is_touch_start: false,
            touch_end_owed: false,
            dragging_pointer_id: None,
            long_press: None,
            last_focus_click: None,
            services,
            next: NextLink::default(),
        }
    }

    pub fn state(&self) -> TouchGuideState {
        self.state
    }

    pub fn is_touch_guiding(&self) -> bool {
        self.is_touch_guiding
    }

    pub fn injected(&self) -> &InjectedEventRecorder {
        &self.injected
    }

    pub fn is_pending(&self, timer: GuideTimer) -> bool {
        self.timers.is_pending(timer)
    }


    // ---- timers ----

    fn fire_due_timers(&mut self, now: u64) {
        loop {
            let guide = self.timers.next_deadline().filter(|d| *d <= now);
            let rec = self.recognizer.timers.next_deadline().filter(|d| *d <= now);

            match (guide, rec) {
                (None, None) => break,
                // the recognizer always posts before the guide reacts to the
                // same event, so it wins ties
                (Some(g), Some(r)) if g < r => self.fire_guide_timer(now),
                (Some(_), None) => self.fire_guide_timer(now),
                (_, Some(_)) => self.fire_recognizer_timer(now),
            }
        }
        self.timers.observe(now);
        self.recognizer.timers.observe(now);
    }

    fn fire_guide_timer(&mut self, now: u64) {
        let Some(timer) = self.timers.pop_due(now) else { return };
        self.recognizer.timers.observe(self.timers.now());
        debug!("Touch guide timer {:?} fired at t={}", timer, self.timers.now());

        match timer {
            GuideTimer::ExitGestureRec => {
                self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureEnd);
                if self.state == TouchGuideState::GestureRecognizing {
                    info!("Gesture recognition timed out");
                    self.recognizer.clear();
                    self.state = TouchGuideState::TouchGuiding;
                }
            },
            GuideTimer::SendHoverEnterMove => self.hover_enter_and_move(),
            GuideTimer::SendHoverExit => {
                if let Some(last) = self.received.last_event().cloned() {
                    let mut exit = last;
                    exit.action_time = self.timers.now();
                    self.send_to_next(&exit, Some(PointerAction::HoverExit));
                }
                if !self.timers.is_pending(GuideTimer::SendTouchGuideEnd) {
                    self.post_accessibility_event(GuideTimer::SendTouchGuideEnd);
                }
                if self.timers.is_pending(GuideTimer::SendTouchInteractionEnd) {
                    self.post_accessibility_event(GuideTimer::SendTouchInteractionEnd);
                }
            },
            GuideTimer::SendTouchInteractionEnd => {
                self.send_accessibility_event(AccessibilityEventType::TouchEnd);
            },
            GuideTimer::SendTouchGuideEnd => {
                self.send_accessibility_event(AccessibilityEventType::TouchGuideEnd);
            },
        }
    }

    fn fire_recognizer_timer(&mut self, now: u64) {
        let cur_down = self.recognizer.cur_down().cloned();
        let Some(timer) = self.recognizer.timers.pop_due(now) else { return };
        self.timers.observe(self.recognizer.timers.now());

        if let Some(notice) = self.recognizer.fire_timer(timer) {
            let event = cur_down.or_else(|| self.received.last_event().cloned());
            match event {
                Some(event) => { self.handle_notice(notice, &event); },
                None => warn!("{:?} from {:?} with no event to act on", notice, timer),
            }
        }
    }

    fn post_hover_enter_and_move(&mut self, event: &PointerEvent) {
        self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
        self.hover_buffer.push(event.clone());
        self.timers.post_delayed(GuideTimer::SendHoverEnterMove, self.cfg.double_tap_timeout);
    }

    fn post_hover_exit(&mut self) {
        self.timers.post_delayed(GuideTimer::SendHoverExit, self.cfg.double_tap_timeout);
    }

    fn post_accessibility_event(&mut self, timer: GuideTimer) {
        self.timers.post_delayed(timer, self.cfg.exit_gesture_rec_timeout);
    }

    fn post_gesture_recognize_exit(&mut self) {
        self.timers.post_delayed(GuideTimer::ExitGestureRec, self.cfg.exit_gesture_rec_timeout);
    }

    fn cancel_post_event_if_need(&mut self, timer: GuideTimer) {
        if self.timers.is_pending(timer) {
            self.timers.cancel(timer);
            if timer == GuideTimer::SendHoverEnterMove {
                self.hover_buffer.clear();
            }
        }
    }

    /// Runs a pending timer's effect right now instead of later.
    fn force_send_and_remove(&mut self, timer: GuideTimer) {
        if !self.timers.is_pending(timer) {
            return;
        }
        self.timers.cancel(timer);

        match timer {
            GuideTimer::SendHoverEnterMove => self.hover_enter_and_move(),
            GuideTimer::SendTouchInteractionEnd => {
                self.send_accessibility_event(AccessibilityEventType::TouchEnd);
            },
            GuideTimer::SendTouchGuideEnd => {
                self.send_accessibility_event(AccessibilityEventType::TouchGuideEnd);
            },
            _ => {}
        }
    }

    fn send_exit_events(&mut self) {
        if !self.timers.is_pending(GuideTimer::SendTouchGuideEnd) {
            self.post_accessibility_event(GuideTimer::SendTouchGuideEnd);
        }
    }


    // ---- output ----

    fn send_accessibility_event(&mut self, event_type: AccessibilityEventType) {
        // ends are only ever sent for a begin that went out
        let unpaired = match event_type {
            AccessibilityEventType::TouchGuideEnd => !std::mem::replace(&mut self.is_touch_guiding, false),
            AccessibilityEventType::TouchEnd => !std::mem::replace(&mut self.touch_end_owed, false),
            AccessibilityEventType::TouchGuideBegin => {
                self.is_touch_guiding = true;
                false
            },
            AccessibilityEventType::TouchBegin => {
                self.touch_end_owed = true;
                false
            },
            _ => false,
        };
        if unpaired {
            trace!("{:?} with no matching begin, dropped", event_type);
            return;
        }

        let info = AccessibilityEventInfo {
            event_type,
            window_id: self.services.windows.active_window_id(),
            gesture: None,
        };
        debug!("Sending {:?} to the accessibility service", event_type);
        self.services.sink.send_event(info);
    }

    fn send_gesture_event(&mut self, gesture: GestureType) {
        let info = AccessibilityEventInfo {
            event_type: AccessibilityEventType::Gesture,
            window_id: self.services.windows.active_window_id(),
            gesture: Some(gesture),
        };
        info!("Gesture recognized: {:?}", gesture);
        self.services.sink.send_event(info);
    }

    /// Forwards a copy of `event`, with its action replaced for touchscreen
    /// sources, and records what was sent.
    fn send_to_next(&mut self, event: &PointerEvent, action: Option<PointerAction>) {
        let mut out = event.clone();
        if let Some(action) = action {
            if out.is_touchscreen() {
                out.action = action;
            }
        }

        if let Some(lp) = self.long_press {
            if let Some(item) = out.item_mut(lp.pointer_id) {
                item.translate(lp.dx, lp.dy);
            }
        }

        trace!("Injecting {:?} for pointer {}", out.action, out.pointer_id);
        self.next.forward(&out);
        self.injected.record(&out);
    }

    /// DOWN for every pointer of `event` the consumer doesn't have yet.
    fn send_all_down_events(&mut self, event: &PointerEvent) {
        for id in event.pointer_ids() {
            if self.injected.is_down(id) {
                continue;
            }
            let mut down = event.clone();
            down.pointer_id = id;
            self.send_to_next(&down, Some(PointerAction::Down));
        }
    }

    /// UP for every pointer the consumer still holds, at the position it
    /// last saw. `event` only supplies time and source.
    fn send_up_for_all_injected(&mut self, event: Option<&PointerEvent>) {
        let base = match event {
            Some(ev) => ev.clone(),
            None => PointerEvent::new(self.timers.now(), PointerAction::Up, 0, Vec::new()),
        };

        for id in self.injected.down_pointer_ids() {
            let mut item = self.injected.last_item(id)
                .unwrap_or(PointerItem { pointer_id: id, ..Default::default() });
            // recorded with the long-press offset, which send_to_next adds again
            if let Some(lp) = self.long_press.filter(|lp| lp.pointer_id == id) {
                item.translate(-lp.dx, -lp.dy);
            }
            self.send_to_next(&base.only_pointer(item, PointerAction::Up), None);
        }
    }

    fn hover_enter_and_move(&mut self) {
        self.send_accessibility_event(AccessibilityEventType::TouchGuideBegin);
        let buffered = std::mem::take(&mut self.hover_buffer);
        for (i, ev) in buffered.iter().enumerate() {
            let action = if i == 0 || ev.action == PointerAction::Down {
                PointerAction::HoverEnter
            } else {
                PointerAction::HoverMove
            };
            self.send_to_next(ev, Some(action));
        }
        self.recognizer.clear();
    }

    fn on_touch_interaction_start(&mut self) {
        self.is_touch_start = true;
    }

    fn on_touch_interaction_end(&mut self) {
        self.is_touch_start = false;
    }


    // ---- recognizer callbacks ----

    fn handle_notice(&mut self, notice: GestureNotice, event: &PointerEvent) -> bool {
        trace!("Recognizer notice {:?} in {:?}", notice, self.state);
        match notice {
            GestureNotice::Started => self.on_started(),
            GestureNotice::Completed(gesture) => self.on_completed(gesture),
            GestureNotice::Cancelled => self.on_cancelled(event),
            GestureNotice::DoubleTap => self.on_double_tap(event),
            GestureNotice::DoubleTapLongPress => {
                self.on_double_tap_long_press(event);
                true
            },
        }
    }

    fn on_started(&mut self) -> bool {
        if self.state != TouchGuideState::TouchGuiding {
            return false;
        }
        self.state = TouchGuideState::GestureRecognizing;
        self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
        self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
        self.post_gesture_recognize_exit();
        self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureBegin);
        true
    }

    fn on_completed(&mut self, gesture: GestureType) -> bool {
        if self.state != TouchGuideState::GestureRecognizing {
            debug!("Gesture {:?} completed outside recognition, ignoring", gesture);
            return false;
        }
        self.on_touch_interaction_end();
        self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureEnd);
        self.send_accessibility_event(AccessibilityEventType::TouchEnd);
        self.timers.cancel(GuideTimer::ExitGestureRec);
        self.state = TouchGuideState::TouchGuiding;

        self.send_gesture_event(gesture);
        true
    }

    fn on_cancelled(&mut self, event: &PointerEvent) -> bool {
        match self.state {
            TouchGuideState::GestureRecognizing => {
                self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureEnd);
                if event.action == PointerAction::Up && event.pointer_count() == 1 {
                    self.on_touch_interaction_end();
                    self.send_accessibility_event(AccessibilityEventType::TouchEnd);
                }
                self.timers.cancel(GuideTimer::ExitGestureRec);
                self.state = TouchGuideState::TouchGuiding;
            },
            TouchGuideState::TouchGuiding => {
                // too slow for a swipe: the user is exploring
                self.timers.cancel(GuideTimer::SendHoverEnterMove);
                self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
                if self.is_touch_guiding {
                    self.hover_buffer.clear();
                    self.send_to_next(event, Some(PointerAction::HoverMove));
                } else {
                    self.hover_buffer.push(event.clone());
                    self.hover_enter_and_move();
                }
            },
            _ => return false,
        }
        true
    }

    fn on_double_tap(&mut self, event: &PointerEvent) -> bool {
        if self.state != TouchGuideState::TouchGuiding {
            return false;
        }
        self.on_touch_interaction_end();
        self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
        self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
        self.force_send_and_remove(GuideTimer::SendTouchGuideEnd);
        self.send_accessibility_event(AccessibilityEventType::TouchEnd);

        if self.ignore_repeat_execute_action(event.action_time) {
            debug!("Double tap repeated within {}ms, absorbing", IGNORE_REPEAT_EXECUTE_INTERVAL);
            return true;
        }

        if self.services.actions.execute_action_on_accessibility_focused(ActionType::Click) {
            return true;
        }

        match self.click_position() {
            Some((point, location)) => {
                debug!("Focused element did not click itself, tapping at {:?} ({:?})", point, location);
                self.transform_to_single_tap(event, point);
            },
            None => warn!("Double tap with nothing focused and nothing explored, dropped"),
        }
        true
    }

    fn on_double_tap_long_press(&mut self, event: &PointerEvent) {
        if self.state != TouchGuideState::TouchGuiding {
            return;
        }

        let Some((click, _)) = self.click_position() else {
            warn!("Double tap and hold with nowhere to press");
            return;
        };

        let item = event.acting_item();
        self.long_press = Some(LongPressOffset {
            pointer_id: item.pointer_id,
            dx: click.0 - item.display_x,
            dy: click.1 - item.display_y,
        });
        info!("Long press forwarded to {:?}", click);

        self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
        self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
        if self.is_touch_guiding {
            self.send_exit_events();
        }
        self.state = TouchGuideState::Transmitting;

        let current = self.received.last_event().cloned().unwrap_or_else(|| event.clone());
        self.send_all_down_events(&current);
    }

    fn ignore_repeat_execute_action(&mut self, now: u64) -> bool {
        let previous = self.last_focus_click.replace(now);
        previous.is_some_and(|t| now.saturating_sub(t) < IGNORE_REPEAT_EXECUTE_INTERVAL)
    }

    fn transform_to_single_tap(&mut self, event: &PointerEvent, point: (i32, i32)) {
        let mut item = event.acting_item();
        item.set_pos(point.0, point.1);
        let down = event.only_pointer(item, PointerAction::Down);
        let up = event.only_pointer(item, PointerAction::Up);
        self.send_to_next(&down, None);
        self.send_to_next(&up, None);
    }

    /// Midpoint of the accessibility-focused element, clipped to its window
    /// and the display.
    fn accessibility_focus_click_point(&self) -> Option<(i32, i32)> {
        let windows = &self.services.windows;
        let focus = windows.accessibility_focus_rect()?;
        let clipped = focus
            .intersect(&windows.focused_window_rect()?)?
            .intersect(&windows.display_rect()?)?;
        Some(clipped.center())
    }

    /// Where a synthesized click should land.
    pub fn click_position(&self) -> Option<((i32, i32), ClickLocation)> {
        let focus_point = self.accessibility_focus_click_point();

        let Some(hover) = self.injected.last_hover_event() else {
            return focus_point.map(|p| (p, ClickLocation::AccessibilityFocus));
        };
        let explored = hover.acting_item().display_pos();

        // focus somewhere other than where the user last explored
        if let Some(focus_rect) = self.services.windows.accessibility_focus_rect() {
            if !focus_rect.contains(explored.0, explored.1) {
                return Some((explored, ClickLocation::LastTouchGuide));
            }
        }

        match focus_point {
            Some(p) => Some((p, ClickLocation::AccessibilityFocus)),
            None => Some((explored, ClickLocation::LastTouchGuide)),
        }
    }


    // ---- state handling ----

    fn handle_touch_guiding_state(&mut self, event: &PointerEvent) {
        match event.action {
            PointerAction::Down => {
                if event.pointer_count() == 1 {
                    self.handle_touch_guiding_state_inner_down(event);
                } else {
                    self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
                    self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
                }
            },
            PointerAction::Move => self.handle_touch_guiding_state_inner_move(event),
            PointerAction::Up => {
                if event.pointer_count() == 1 && self.is_touch_start {
                    self.on_touch_interaction_end();
                    if self.timers.is_pending(GuideTimer::SendHoverEnterMove) {
                        self.post_hover_exit();
                    } else if self.is_touch_guiding {
                        self.send_exit_events();
                        self.post_hover_exit();
                    }
                    if !self.timers.is_pending(GuideTimer::SendTouchInteractionEnd) {
                        self.post_accessibility_event(GuideTimer::SendTouchInteractionEnd);
                    }
                }
            },
            _ => {}
        }
    }

    fn handle_touch_guiding_state_inner_down(&mut self, event: &PointerEvent) {
        self.on_touch_interaction_start();
        self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
        self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
        if self.is_touch_guiding {
            self.send_exit_events();
        }

        if !self.recognizer.is_first_tap() {
            self.force_send_and_remove(GuideTimer::SendTouchGuideEnd);
            self.force_send_and_remove(GuideTimer::SendTouchInteractionEnd);
            self.send_accessibility_event(AccessibilityEventType::TouchBegin);
            if !self.is_touch_guiding {
                self.post_hover_enter_and_move(event);
            }
        } else {
            self.timers.cancel(GuideTimer::SendTouchInteractionEnd);
        }
    }

    fn handle_touch_guiding_state_inner_move(&mut self, event: &PointerEvent) {
        match event.pointer_count() {
            0 => {},
            1 => {
                if self.timers.is_pending(GuideTimer::SendHoverEnterMove) {
                    self.hover_buffer.push(event.clone());
                } else if self.is_touch_guiding {
                    self.send_to_next(event, Some(PointerAction::HoverMove));
                }
            },
            2 => {
                self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
                self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
                if !self.is_real_move_state(event) {
                    trace!("Two fingers still inside the touch slop");
                    return;
                }
                if self.is_drag_gesture_accept(event) {
                    self.state = TouchGuideState::Dragging;
                    self.start_dragging(event);
                } else {
                    self.state = TouchGuideState::Transmitting;
                    self.send_all_down_events(event);
                }
            },
            _ => {
                if self.timers.is_pending(GuideTimer::SendHoverEnterMove) {
                    self.cancel_post_event_if_need(GuideTimer::SendHoverEnterMove);
                    self.cancel_post_event_if_need(GuideTimer::SendHoverExit);
                } else {
                    self.send_exit_events();
                }
                self.state = TouchGuideState::Transmitting;
                self.send_all_down_events(event);
            },
        }
    }

    /// Both fingers have left the touch slop around where they went down.
    fn is_real_move_state(&self, event: &PointerEvent) -> bool {
        let ids = event.pointer_ids();
        let (Some(&first_id), Some(&second_id)) = (ids.first(), ids.get(1)) else {
            return false;
        };

        let travelled = |id: i32| -> f32 {
            let Some(now) = event.item(id).map(|it| it.display_pos()) else { return 0.0 };
            let down = self.received.down_position(id);
            ((now.0 - down.0) as f32).hypot((now.1 - down.1) as f32)
        };
        travelled(first_id) >= self.cfg.touch_slop && travelled(second_id) >= self.cfg.touch_slop
    }

    /// Two fingers moving in roughly the same direction drag; anything else
    /// is a multi-finger interaction for the app.
    fn is_drag_gesture_accept(&self, event: &PointerEvent) -> bool {
        let ids = event.pointer_ids();
        let (Some(&first_id), Some(&second_id)) = (ids.first(), ids.get(1)) else {
            return false;
        };

        let offset = |id: i32| -> (f32, f32) {
            let now = event.item(id).map(|it| it.display_pos()).unwrap_or((0, 0));
            let down = self.received.down_position(id);
            ((now.0 - down.0) as f32, (now.1 - down.1) as f32)
        };
        let first = offset(first_id);
        let second = offset(second_id);

        let first_len = first.0.hypot(first.1);
        let second_len = second.0.hypot(second.1);
        if first_len == 0.0 || second_len == 0.0 {
            return true;
        }

        let cosine = (first.0 * second.0 + first.1 * second.1) / (first_len * second_len);
        trace!("Drag cosine {}", cosine);
        cosine >= self.cfg.max_drag_gesture_cosine
    }

    fn start_dragging(&mut self, event: &PointerEvent) {
        let ids = event.pointer_ids();
        let Some(&drag_id) = ids.first() else { return };
        self.dragging_pointer_id = Some(drag_id);

        let (x, y) = self.received.down_position(drag_id);
        let mut item = event.item(drag_id).copied().unwrap_or_default();
        item.set_pos(x, y);
        debug!("Dragging with pointer {}", drag_id);
        self.send_to_next(&event.only_pointer(item, PointerAction::Down), None);
        self.send_drag_move(event);
    }

    /// MOVE for the dragging pointer, at the fingers' midpoint once they
    /// are far enough apart.
    fn send_drag_move(&mut self, event: &PointerEvent) {
        let Some(drag_id) = self.dragging_pointer_id else { return };
        let ids = event.pointer_ids();
        let (Some(first), Some(second)) = (
            ids.first().and_then(|id| event.item(*id)),
            ids.get(1).and_then(|id| event.item(*id)),
        ) else {
            return;
        };
        let mut item = event.item(drag_id).copied().unwrap_or(*first);

        let spacing = (first.display_x - second.display_x) as f32;
        let spacing = spacing.hypot((first.display_y - second.display_y) as f32);
        if spacing > self.cfg.mini_pointer_distance_px() {
            item.set_pos(
                (first.display_x + second.display_x) / 2,
                (first.display_y + second.display_y) / 2,
            );
        }
        self.send_to_next(&event.only_pointer(item, PointerAction::Move), None);
    }

    fn handle_dragging_state(&mut self, event: &PointerEvent) {
        match event.action {
            PointerAction::Down => {
                if event.pointer_count() == 1 {
                    self.clear(Some(event));
                } else {
                    self.state = TouchGuideState::Transmitting;
                    self.send_up_for_all_injected(Some(event));
                    self.dragging_pointer_id = None;
                    self.send_all_down_events(event);
                }
            },
            PointerAction::Move => self.handle_dragging_state_inner_move(event),
            PointerAction::Up => {
                let last_finger = event.pointer_count() == 1;
                if last_finger || Some(event.pointer_id) == self.dragging_pointer_id {
                    self.send_up_for_all_injected(None);
                }
                if last_finger {
                    self.on_touch_interaction_end();
                    self.send_accessibility_event(AccessibilityEventType::TouchEnd);
                    self.dragging_pointer_id = None;
                    self.state = TouchGuideState::TouchGuiding;
                }
            },
            _ => {}
        }
    }

    fn handle_dragging_state_inner_move(&mut self, event: &PointerEvent) {
        let ids = event.pointer_ids();

        if ids.len() == 1 {
            debug!("Only two pointers can be received in the dragging state");
        } else if ids.len() == 2 && self.is_drag_gesture_accept(event) {
            self.send_drag_move(event);
        } else {
            self.state = TouchGuideState::Transmitting;
            self.send_up_for_all_injected(Some(event));
            self.dragging_pointer_id = None;
            self.send_all_down_events(event);
        }
    }

    fn handle_transmitting_state(&mut self, event: &PointerEvent) {
        match event.action {
            PointerAction::Down if event.pointer_count() == 1 => self.clear(Some(event)),
            PointerAction::Up if event.pointer_count() == 1 => {
                self.send_to_next(event, None);
                self.long_press = None;
                self.on_touch_interaction_end();
                self.send_accessibility_event(AccessibilityEventType::TouchEnd);
                self.state = TouchGuideState::TouchGuiding;
            },
            _ => self.send_to_next(event, None),
        }
    }

    fn handle_gesture_recognizing_state(&mut self, event: &PointerEvent) {
        match event.action {
            PointerAction::Down if event.pointer_count() > 1 => {
                debug!("Second finger during a swipe, passing the touch through");
                self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureEnd);
                self.timers.cancel(GuideTimer::ExitGestureRec);
                self.recognizer.clear();
                self.state = TouchGuideState::Transmitting;
                self.send_all_down_events(event);
            },
            PointerAction::Up if event.pointer_count() == 1 => {
                self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureEnd);
                self.timers.cancel(GuideTimer::ExitGestureRec);
                self.on_touch_interaction_end();
                self.send_accessibility_event(AccessibilityEventType::TouchEnd);
                self.state = TouchGuideState::TouchGuiding;
            },
            _ => trace!("Swipe in progress, {:?} consumed", event.action),
        }
    }


    /// Drops the interaction in flight. Every pointer the consumer holds
    /// gets an UP and every begin event gets its end.
    pub fn clear(&mut self, event: Option<&PointerEvent>) {
        debug!("Clearing touch guide in {:?}", self.state);

        self.send_up_for_all_injected(event);

        if self.state == TouchGuideState::GestureRecognizing {
            self.send_accessibility_event(AccessibilityEventType::TouchGuideGestureEnd);
        }
        self.timers.cancel_all();
        self.send_accessibility_event(AccessibilityEventType::TouchGuideEnd);
        self.send_accessibility_event(AccessibilityEventType::TouchEnd);

        self.injected.clear();
        self.received.clear();
        self.hover_buffer.clear();
        self.state = TouchGuideState::TouchGuiding;
        self.recognizer.clear();
        self.long_press = None;
        self.dragging_pointer_id = None;
        self.on_touch_interaction_end();
    }
}


impl EventTransmission for TouchGuider {

    fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
        self.fire_due_timers(event.action_time);

        if !event.is_touchscreen() {
            self.next.forward(event);
            return false;
        }

        debug!("Touch guide received {:?} ({} pointers) in {:?}", event.action, event.pointer_count(), self.state);

        if event.action == PointerAction::Cancel {
            self.clear(Some(event));
            return true;
        }

        self.received.record(event);

        if let Some(notice) = self.recognizer.on_pointer_event(event) {
            if self.handle_notice(notice, event) {
                return true;
            }
        }

        match self.state {
            TouchGuideState::TouchGuiding => self.handle_touch_guiding_state(event),
            TouchGuideState::Dragging => self.handle_dragging_state(event),
            TouchGuideState::Transmitting => self.handle_transmitting_state(event),
            TouchGuideState::GestureRecognizing => self.handle_gesture_recognizing_state(event),
        }
        true
    }

    fn advance_clock(&mut self, now: u64) {
        self.fire_due_timers(now);
        self.next.advance_clock(now);
    }

    fn clear_events(&mut self, input_source: u32) {
        let last = self.received.last_event().cloned();
        self.clear(last.as_ref());
        self.next.clear_events(input_source);
    }

    fn destroy_events(&mut self) {
        let last = self.received.last_event().cloned();
        self.clear(last.as_ref());
        self.next.destroy_events();
    }

    fn set_next(&mut self, next: Box<dyn EventTransmission>) {
        self.next = NextLink::new(next);
    }
}
