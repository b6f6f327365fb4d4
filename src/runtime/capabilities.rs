//! Collaborators the recognizers talk to but don't own.
//!
//! Every capability is shared behind an `Arc` and takes `&self`, so
//! implementations are expected to do their own synchronization. A
//! capability a recognizer was built without is treated as unavailable:
//! the call is skipped and logged, state handling carries on.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;


#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessibilityEventType {
    TouchBegin,
    TouchEnd,
    TouchGuideBegin,
    TouchGuideEnd,
    TouchGuideGestureBegin,
    TouchGuideGestureEnd,
    Gesture,
}

/// Recognized swipe shape, one or two strokes.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureType {
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,
    SwipeUpThenDown,
    SwipeUpThenLeft,
    SwipeUpThenRight,
    SwipeDownThenUp,
    SwipeDownThenLeft,
    SwipeDownThenRight,
    SwipeLeftThenUp,
    SwipeLeftThenDown,
    SwipeLeftThenRight,
    SwipeRightThenUp,
    SwipeRightThenDown,
    SwipeRightThenLeft,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityEventInfo {
    pub event_type: AccessibilityEventType,
    pub window_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture: Option<GestureType>,
}

/// Actions the touch guide can ask the accessibility-focused element to
/// perform on its own.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Click,
    LongClick,
}

/// Shape of the magnification overlay when it is shown.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MagnificationMode {
    #[default]
    FullScreen,
    Window,
}

/// Named edge/corner regions of the magnified viewport. A tap there is
/// interpreted as a pan towards that edge when cached events are replayed.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HotArea {
    Left,
    Right,
    Top,
    Bottom,
}


/// Receives accessibility events (not pointer events).
pub trait EventSink: Send + Sync {
    fn send_event(&self, info: AccessibilityEventInfo);
}

pub trait MagnifierCapability: Send + Sync {
    fn enable_magnification(&self, center_x: i32, center_y: i32);
    /// `persist` keeps the current scale for the next session.
    fn disable_magnification(&self, persist: bool);
    fn move_magnification(&self, dx: i32, dy: i32);
    fn set_scale(&self, delta_span: f32);
    fn persist_scale(&self);
    fn is_magnification_window_show(&self) -> bool;
    fn scale(&self) -> f32;
    fn check_tap_on_hot_area(&self, x: i32, y: i32) -> Option<HotArea>;
    /// Maps a point on the magnified view back to screen coordinates.
    fn convert_coordinates(&self, x: i32, y: i32) -> (i32, i32);

    /// Adjusts an already-converted point for a tap that landed on a hot
    /// area. Implementations without hot areas leave it as is.
    fn convert_gesture(&self, _area: HotArea, point: (i32, i32)) -> (i32, i32) {
        point
    }
}

pub trait MenuCapability: Send + Sync {
    fn is_tap_on_menu(&self, x: i32, y: i32) -> bool;
    fn on_menu_tap(&self);
    fn move_menu_window(&self, dx: i32, dy: i32);
    fn attach_to_edge(&self);
    fn show_menu_window(&self, mode: MagnificationMode);
    fn disable_menu_window(&self);
}

/// Read-only view of the window system. `None` means the query failed,
/// which callers treat the same as "no intersection".
pub trait WindowQueryCapability: Send + Sync {
    fn active_window_id(&self) -> i32;
    fn input_method_rect(&self) -> Option<Rect>;
    fn accessibility_focus_rect(&self) -> Option<Rect>;
    fn focused_window_rect(&self) -> Option<Rect>;
    fn display_rect(&self) -> Option<Rect>;
}

pub trait ActionCapability: Send + Sync {
    /// Returns whether the focused element handled the action.
    fn execute_action_on_accessibility_focused(&self, action: ActionType) -> bool;
}
