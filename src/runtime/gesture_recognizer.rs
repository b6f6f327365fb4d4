use log::{debug, trace};

use super::capabilities::GestureType;
use super::pointer_event::{PointerAction, PointerEvent};
use super::timers::TimerQueue;
use crate::init::config::Configuration;

const DIRECTION_NUM: usize = 4;
const SWIPE_UP: usize = 0;
const SWIPE_DOWN: usize = 1;
const SWIPE_LEFT: usize = 2;
const SWIPE_RIGHT: usize = 3;

/// Cosine below which the route is split into a new stroke (90°).
const DEGREES_THRESHOLD: f32 = 0.0;

const GESTURE_DIRECTION: [GestureType; DIRECTION_NUM] = [
    GestureType::SwipeUp,
    GestureType::SwipeDown,
    GestureType::SwipeLeft,
    GestureType::SwipeRight,
];

// [first stroke][second stroke]
const GESTURE_DIRECTION_TO_ID: [[GestureType; DIRECTION_NUM]; DIRECTION_NUM] = [
    [
        GestureType::SwipeUp,
        GestureType::SwipeUpThenDown,
        GestureType::SwipeUpThenLeft,
        GestureType::SwipeUpThenRight,
    ],
    [
        GestureType::SwipeDownThenUp,
        GestureType::SwipeDown,
        GestureType::SwipeDownThenLeft,
        GestureType::SwipeDownThenRight,
    ],
    [
        GestureType::SwipeLeftThenUp,
        GestureType::SwipeLeftThenDown,
        GestureType::SwipeLeft,
        GestureType::SwipeLeftThenRight,
    ],
    [
        GestureType::SwipeRightThenUp,
        GestureType::SwipeRightThenDown,
        GestureType::SwipeRightThenLeft,
        GestureType::SwipeRight,
    ],
];


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerTimer {
    LongPress,
    SingleTap,
}

/// What the recognizer wants its owner to react to. The owner decides
/// whether the triggering event is consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureNotice {
    Started,
    Completed(GestureType),
    Cancelled,
    DoubleTap,
    DoubleTapLongPress,
}


#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f32,
    y: f32,
}

impl Point {
    fn of(event: &PointerEvent) -> Self {
        let (x, y) = event.acting_item().display_pos();
        Point { x: x as f32, y: y as f32 }
    }
}


/// Single-finger tap, double-tap, long-press and swipe classification.
///
/// Timer-driven results (long press) come back out of `fire_timer`, so the
/// owner has to route `RecognizerTimer`s from `timers` back in here.
#[derive(Debug)]
pub struct GestureRecognizer {
    pub timers: TimerQueue<RecognizerTimer>,

    threshold: f32,
    x_min_pixels: f32,
    y_min_pixels: f32,
    double_tap_scaled_slop: f32,
    double_tap_timeout: u64,
    min_double_tap_time: u64,
    started_time_threshold: u64,
    not_started_time_threshold: u64,
    cfg: Configuration,

    is_recognizing_gesture: bool,
    is_gesture_started: bool,
    is_first_tap_up: bool,
    is_double_tap: bool,
    is_double_tap_detecting: bool,
    is_tap_down: bool,
    is_longpress: bool,
    continue_down: bool,

    start_pointer: Point,
    pre_pointer: Point,
    start_time: u64,
    pointer_route: Vec<Point>,

    cur_down: Option<PointerEvent>,
    pre_up: Option<PointerEvent>,
}


impl GestureRecognizer {

    pub fn new(cfg: &Configuration) -> Self {
        let slop = cfg.double_tap_slop_px().trunc();
        let (x_min_pixels, y_min_pixels) = cfg.route_min_pixels();

        GestureRecognizer {
            timers: TimerQueue::new(),
            threshold: cfg.swipe_threshold_px(),
            x_min_pixels,
            y_min_pixels,
            double_tap_scaled_slop: slop * slop,
            double_tap_timeout: cfg.double_tap_timeout.as_millis() as u64,
            min_double_tap_time: cfg.min_double_tap_time.as_millis() as u64,
            started_time_threshold: cfg.gesture_started_time_threshold.as_millis() as u64,
            not_started_time_threshold: cfg.gesture_not_started_time_threshold.as_millis() as u64,
            cfg: cfg.clone(),
            is_recognizing_gesture: false,
            is_gesture_started: false,
            is_first_tap_up: false,
            is_double_tap: false,
            is_double_tap_detecting: false,
            is_tap_down: false,
            is_longpress: false,
            continue_down: false,
            start_pointer: Point { x: 0.0, y: 0.0 },
            pre_pointer: Point { x: 0.0, y: 0.0 },
            start_time: 0,
            pointer_route: Vec::new(),
            cur_down: None,
            pre_up: None,
        }
    }

    /// True between the first tap's UP and the moment the recognizer gives
    /// up waiting for a second one.
    pub fn is_first_tap(&self) -> bool {
        self.is_first_tap_up
    }

    pub fn is_gesture_started(&self) -> bool {
        self.is_gesture_started
    }

    /// The DOWN that started the current tap, if any.
    pub fn cur_down(&self) -> Option<&PointerEvent> {
        self.cur_down.as_ref()
    }


    pub fn on_pointer_event(&mut self, event: &PointerEvent) -> Option<GestureNotice> {
        self.timers.observe(event.action_time);
        let single = event.pointer_count() <= 1;

        match event.action {
            PointerAction::Down if single => self.handle_touch_down(event),
            PointerAction::Down => {
                // a second finger ends any single-finger gesture
                trace!("Other pointer down, abandoning gesture");
                self.is_recognizing_gesture = false;
                self.is_gesture_started = false;
                self.pointer_route.clear();
                self.standard_gesture_cancelled();
                None
            },
            PointerAction::Move => self.handle_touch_move(event),
            PointerAction::Up if single => self.handle_touch_up(event),
            PointerAction::Cancel => {
                self.clear();
                None
            },
            _ => None,
        }
    }


    /// Handles an expired recognizer timer.
    pub fn fire_timer(&mut self, timer: RecognizerTimer) -> Option<GestureNotice> {
        match timer {
            RecognizerTimer::LongPress => {
                self.timers.cancel(RecognizerTimer::SingleTap);
                self.is_longpress = true;
                self.maybe_recognize_long_press()
            },
            RecognizerTimer::SingleTap => {
                if !self.continue_down {
                    debug!("Single tap detected");
                    self.clear();
                }
                None
            },
        }
    }


    pub fn clear(&mut self) {
        self.is_first_tap_up = false;
        self.is_double_tap = false;
        self.is_gesture_started = false;
        self.is_recognizing_gesture = false;
        self.pointer_route.clear();
        self.continue_down = false;
        self.standard_gesture_cancelled();
    }


    fn handle_touch_down(&mut self, event: &PointerEvent) -> Option<GestureNotice> {
        let point = Point::of(event);
        self.is_double_tap = false;
        self.is_recognizing_gesture = true;
        self.is_gesture_started = false;
        self.pointer_route.clear();
        self.pointer_route.push(point);
        self.pre_pointer = point;
        self.start_pointer = point;
        self.start_time = event.action_time;

        self.standard_gesture_recognizer(event)
    }


    fn handle_touch_move(&mut self, event: &PointerEvent) -> Option<GestureNotice> {
        let point = Point::of(event);

        if self.is_recognizing_gesture {
            let travelled = (self.start_pointer.x - point.x).hypot(self.start_pointer.y - point.y);

            if travelled > self.threshold {
                self.start_pointer = point;
                self.start_time = event.action_time;
                self.is_first_tap_up = false;
                self.is_double_tap = false;
                if !self.is_gesture_started {
                    debug!("Swipe started");
                    self.is_gesture_started = true;
                    self.add_route_point(point);
                    return Some(GestureNotice::Started);
                }
            } else if !self.is_first_tap_up {
                let held = event.action_time.saturating_sub(self.start_time);
                let limit = if self.is_gesture_started {
                    self.started_time_threshold
                } else {
                    self.not_started_time_threshold
                };
                if held > limit {
                    debug!("Finger too slow for a swipe ({}ms), cancelling", held);
                    self.is_recognizing_gesture = false;
                    self.is_gesture_started = false;
                    self.pointer_route.clear();
                    return Some(GestureNotice::Cancelled);
                }
            }
            self.add_route_point(point);
        }

        if !self.is_recognizing_gesture {
            return None;
        }
        self.standard_gesture_recognizer(event)
    }


    fn handle_touch_up(&mut self, event: &PointerEvent) -> Option<GestureNotice> {
        if self.is_double_tap {
            debug!("Double tap recognized");
            self.clear();
            return Some(GestureNotice::DoubleTap);
        }

        if self.is_gesture_started {
            self.add_route_point(Point::of(event));
            return Some(self.recognize_direction_gesture());
        }

        if !self.is_recognizing_gesture {
            return None;
        }
        self.standard_gesture_recognizer(event)
    }


    fn add_route_point(&mut self, point: Point) {
        if (point.x - self.pre_pointer.x).abs() >= self.x_min_pixels
            || (point.y - self.pre_pointer.y).abs() >= self.y_min_pixels
        {
            self.pre_pointer = point;
            self.pointer_route.push(point);
        }
    }


    fn standard_gesture_recognizer(&mut self, event: &PointerEvent) -> Option<GestureNotice> {
        match event.action {
            PointerAction::Down => {
                if self.cur_down.is_some() && self.pre_up.is_some() && self.is_double_tap_candidate(event) {
                    self.is_double_tap_detecting = true;
                    self.is_double_tap = true;
                } else {
                    self.timers.post_delayed(RecognizerTimer::SingleTap, self.cfg.double_tap_timeout);
                }
                self.cur_down = Some(event.clone());
                self.is_tap_down = true;
                self.continue_down = true;
                self.is_longpress = false;
                self.timers.post_delayed(RecognizerTimer::LongPress, self.cfg.long_press_timeout);
            },
            PointerAction::Up => {
                self.continue_down = false;
                if self.is_longpress {
                    self.timers.cancel(RecognizerTimer::SingleTap);
                    self.is_longpress = false;
                } else if !self.is_double_tap_detecting && self.is_tap_down {
                    self.is_first_tap_up = true;
                }
                self.pre_up = Some(event.clone());
                self.is_double_tap_detecting = false;
                self.timers.cancel(RecognizerTimer::LongPress);
            },
            _ => {}
        }
        None
    }


    fn standard_gesture_cancelled(&mut self) {
        self.timers.cancel(RecognizerTimer::LongPress);
        self.timers.cancel(RecognizerTimer::SingleTap);
        self.is_longpress = false;
        self.is_double_tap_detecting = false;
        self.is_tap_down = false;
    }


    fn maybe_recognize_long_press(&mut self) -> Option<GestureNotice> {
        if !self.is_double_tap {
            return None;
        }
        debug!("Double tap and hold recognized");
        self.clear();
        Some(GestureNotice::DoubleTapLongPress)
    }


    fn is_double_tap_candidate(&self, event: &PointerEvent) -> bool {
        let (Some(cur_down), Some(pre_up)) = (&self.cur_down, &self.pre_up) else {
            return false;
        };

        let interval = event.action_time.saturating_sub(pre_up.action_time);
        if interval > self.double_tap_timeout || interval < self.min_double_tap_time {
            return false;
        }

        let first = Point::of(cur_down);
        let second = Point::of(event);
        let dx = first.x - second.x;
        let dy = first.y - second.y;
        dx * dx + dy * dy < self.double_tap_scaled_slop
    }


    fn recognize_direction_gesture(&mut self) -> GestureNotice {
        if self.pointer_route.len() < 2 {
            return GestureNotice::Cancelled;
        }

        let path = pointer_path(&self.pointer_route);
        match path.as_slice() {
            [a, b] => GestureNotice::Completed(GESTURE_DIRECTION[swipe_direction(*a, *b)]),
            [a, b, c] => {
                let first = swipe_direction(*a, *b);
                let second = swipe_direction(*b, *c);
                GestureNotice::Completed(GESTURE_DIRECTION_TO_ID[first][second])
            },
            _ => GestureNotice::Cancelled,
        }
    }
}


// Screen y grows downwards, so a negative dy is an upward swipe.
fn swipe_direction(first: Point, second: Point) -> usize {
    let dx = second.x - first.x;
    let dy = second.y - first.y;
    if dx.abs() > dy.abs() {
        if dx > 0.0 { SWIPE_RIGHT } else { SWIPE_LEFT }
    } else if dy < 0.0 {
        SWIPE_UP
    } else {
        SWIPE_DOWN
    }
}


/// Collapses a sampled route into stroke corners: a new corner starts
/// wherever the next segment turns 90° or more away from the running
/// average direction of the current stroke.
fn pointer_path(route: &[Point]) -> Vec<Point> {
    let Some(&first) = route.first() else {
        return Vec::new();
    };

    let mut path = vec![first];
    let mut first_separation = first;
    let mut x_unit = 0.0f32;
    let mut y_unit = 0.0f32;
    let mut vector_length = 0.0f32;
    let mut num_since_first_sep = 0u32;
    let mut next_point = first;

    for &point in &route[1..] {
        next_point = point;

        if num_since_first_sep > 0 {
            let x_vector = x_unit / num_since_first_sep as f32;
            let y_vector = y_unit / num_since_first_sep as f32;
            let new_separation = Point {
                x: vector_length * x_vector + first_separation.x,
                y: vector_length * y_vector + first_separation.y,
            };

            let x_next = next_point.x - new_separation.x;
            let y_next = next_point.y - new_separation.y;
            let next_length = x_next.hypot(y_next);

            if next_length > 0.0
                && (x_vector * x_next / next_length + y_vector * y_next / next_length) < DEGREES_THRESHOLD
            {
                path.push(new_separation);
                first_separation = new_separation;
                x_unit = 0.0;
                y_unit = 0.0;
                num_since_first_sep = 0;
            }
        }

        let x_vector = next_point.x - first_separation.x;
        let y_vector = next_point.y - first_separation.y;
        vector_length = x_vector.hypot(y_vector);
        num_since_first_sep += 1;
        if vector_length > 0.0 {
            x_unit += x_vector / vector_length;
            y_unit += y_vector / vector_length;
        }
    }

    path.push(next_point);
    path
}


#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> GestureRecognizer {
        GestureRecognizer::new(&Configuration::default())
    }

    fn ev(t: u64, action: PointerAction, x: i32, y: i32) -> PointerEvent {
        PointerEvent::single(t, action, 0, x, y)
    }

    // Drives timers the way an owner would.
    fn advance(rec: &mut GestureRecognizer, now: u64) -> Vec<GestureNotice> {
        let mut out = Vec::new();
        while let Some(timer) = rec.timers.pop_due(now) {
            out.extend(rec.fire_timer(timer));
        }
        out
    }

    #[test]
    fn single_tap_sets_first_tap_then_expires() {
        let mut rec = recognizer();
        assert_eq!(rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 500)), None);
        assert_eq!(rec.on_pointer_event(&ev(80, PointerAction::Up, 500, 500)), None);
        assert!(rec.is_first_tap());

        assert!(advance(&mut rec, 400).is_empty());
        assert!(!rec.is_first_tap());
    }

    #[test]
    fn second_tap_in_window_is_double_tap() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 500));
        rec.on_pointer_event(&ev(60, PointerAction::Up, 500, 500));
        rec.on_pointer_event(&ev(160, PointerAction::Down, 510, 505));
        let notice = rec.on_pointer_event(&ev(220, PointerAction::Up, 510, 505));
        assert_eq!(notice, Some(GestureNotice::DoubleTap));
        assert!(!rec.is_first_tap());
    }

    #[test]
    fn second_tap_too_soon_or_far_is_not_double_tap() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 500));
        rec.on_pointer_event(&ev(60, PointerAction::Up, 500, 500));
        // 20ms after the up: below the minimum interval
        rec.on_pointer_event(&ev(80, PointerAction::Down, 500, 500));
        assert_eq!(rec.on_pointer_event(&ev(120, PointerAction::Up, 500, 500)), None);

        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 100, 100));
        rec.on_pointer_event(&ev(60, PointerAction::Up, 100, 100));
        rec.on_pointer_event(&ev(160, PointerAction::Down, 400, 400));
        assert_eq!(rec.on_pointer_event(&ev(220, PointerAction::Up, 400, 400)), None);
    }

    #[test]
    fn double_tap_hold_fires_long_press() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 500));
        rec.on_pointer_event(&ev(60, PointerAction::Up, 500, 500));
        rec.on_pointer_event(&ev(160, PointerAction::Down, 500, 500));

        assert_eq!(advance(&mut rec, 600), vec![GestureNotice::DoubleTapLongPress]);
    }

    #[test]
    fn plain_long_press_is_silent() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 500));
        assert!(advance(&mut rec, 1_000).is_empty());
        assert_eq!(rec.on_pointer_event(&ev(1_000, PointerAction::Up, 500, 500)), None);
    }

    #[test]
    fn straight_swipe_right() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 100, 1000));
        assert_eq!(rec.on_pointer_event(&ev(20, PointerAction::Move, 250, 1000)), Some(GestureNotice::Started));
        rec.on_pointer_event(&ev(40, PointerAction::Move, 400, 1000));
        rec.on_pointer_event(&ev(60, PointerAction::Move, 600, 1000));
        let notice = rec.on_pointer_event(&ev(80, PointerAction::Up, 800, 1000));
        assert_eq!(notice, Some(GestureNotice::Completed(GestureType::SwipeRight)));
    }

    #[test]
    fn swipe_up_then_down() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 1800));
        assert_eq!(rec.on_pointer_event(&ev(20, PointerAction::Move, 500, 1550)), Some(GestureNotice::Started));
        for (i, y) in [1300, 1050, 800, 1050, 1300].into_iter().enumerate() {
            assert_eq!(rec.on_pointer_event(&ev(40 + 20 * i as u64, PointerAction::Move, 500, y)), None);
        }
        let notice = rec.on_pointer_event(&ev(160, PointerAction::Up, 500, 1550));
        assert_eq!(notice, Some(GestureNotice::Completed(GestureType::SwipeUpThenDown)));
    }

    #[test]
    fn slow_move_cancels_recognition() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 500, 500));
        assert_eq!(rec.on_pointer_event(&ev(100, PointerAction::Move, 505, 505)), None);
        assert_eq!(rec.on_pointer_event(&ev(200, PointerAction::Move, 510, 510)), Some(GestureNotice::Cancelled));
        // no longer recognizing: further moves are ignored
        assert_eq!(rec.on_pointer_event(&ev(220, PointerAction::Move, 900, 900)), None);
    }

    #[test]
    fn second_finger_abandons_swipe() {
        let mut rec = recognizer();
        rec.on_pointer_event(&ev(0, PointerAction::Down, 100, 1000));
        rec.on_pointer_event(&ev(20, PointerAction::Move, 300, 1000));
        assert!(rec.is_gesture_started());

        let two = PointerEvent::new(
            30,
            PointerAction::Down,
            1,
            vec![
                crate::runtime::pointer_event::PointerItem::at(0, 300, 1000),
                crate::runtime::pointer_event::PointerItem::at(1, 600, 1000),
            ],
        );
        assert_eq!(rec.on_pointer_event(&two), None);
        assert!(!rec.is_gesture_started());
        assert!(rec.timers.next_deadline().is_none());
    }

    #[test]
    fn path_splits_when_stroke_turns_back() {
        let route = [
            Point { x: 0.0, y: 0.0 },
            Point { x: 0.0, y: -300.0 },
            Point { x: 0.0, y: -600.0 },
            Point { x: -300.0, y: -400.0 },
        ];
        assert_eq!(pointer_path(&route).len(), 3);
        assert_eq!(swipe_direction(route[0], route[2]), SWIPE_UP);
    }
}
