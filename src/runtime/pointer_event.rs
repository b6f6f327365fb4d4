use serde::{Deserialize, Serialize};

/// Highest pointer id (exclusive) any recorder will track.
pub const MAX_POINTER_COUNT: usize = 32;


#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
    HoverEnter,
    HoverMove,
    HoverExit,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    Touchscreen,
    Mouse,
    Touchpad,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ToolType {
    #[default]
    Finger,
    Pen,
    Knuckle,
}


/// One finger (or stylus) inside a `PointerEvent`.
///
/// `display_*` is the position on the logical display, `raw_*` is the
/// unscaled panel position that focus/span math runs on. When a sample has
/// no separate raw position the display position stands in for it.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PointerItem {
    pub pointer_id: i32,

    pub display_x: i32,
    pub display_y: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_y: Option<i32>,

    #[serde(default)]
    pub tool_type: ToolType,
}

impl PointerItem {
    /// Item whose raw and display positions coincide.
    pub fn at(pointer_id: i32, x: i32, y: i32) -> Self {
        PointerItem {
            pointer_id,
            display_x: x,
            display_y: y,
            raw_x: None,
            raw_y: None,
            tool_type: ToolType::Finger,
        }
    }

    pub fn display_pos(&self) -> (i32, i32) {
        (self.display_x, self.display_y)
    }

    pub fn raw_pos(&self) -> (i32, i32) {
        (
            self.raw_x.unwrap_or(self.display_x),
            self.raw_y.unwrap_or(self.display_y),
        )
    }

    /// Moves both coordinate spaces by the same amount.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.display_x += dx;
        self.display_y += dy;
        self.raw_x = self.raw_x.map(|x| x + dx);
        self.raw_y = self.raw_y.map(|y| y + dy);
    }

    /// Places the pointer at `(x, y)` in both coordinate spaces.
    pub fn set_pos(&mut self, x: i32, y: i32) {
        self.display_x = x;
        self.display_y = y;
        self.raw_x = None;
        self.raw_y = None;
    }
}


/// A multi-touch sample.
///
/// `pointer_id` names the pointer this event is *about* (the finger that went
/// down or up); `items` is a snapshot of every pointer currently in contact,
/// kept sorted by id. For UP events the lifting pointer is still present.
///
/// Events handed to a recognizer are never modified in place. Anything that
/// needs an altered event works on a clone.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    /// Milliseconds on the session clock.
    pub action_time: u64,
    pub action: PointerAction,
    #[serde(default = "default_source")]
    pub source_type: SourceType,
    pub pointer_id: i32,
    pub items: Vec<PointerItem>,
}

fn default_source() -> SourceType { SourceType::Touchscreen }


impl PointerEvent {
    pub fn new(action_time: u64, action: PointerAction, pointer_id: i32, items: Vec<PointerItem>) -> Self {
        let mut event = PointerEvent {
            action_time,
            action,
            source_type: SourceType::Touchscreen,
            pointer_id,
            items,
        };
        event.items.sort_by_key(|item| item.pointer_id);
        event
    }

    /// Single-finger touchscreen event at `(x, y)`.
    pub fn single(action_time: u64, action: PointerAction, pointer_id: i32, x: i32, y: i32) -> Self {
        PointerEvent::new(action_time, action, pointer_id, vec![PointerItem::at(pointer_id, x, y)])
    }

    pub fn with_source(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn pointer_count(&self) -> usize {
        self.items.len()
    }

    pub fn pointer_ids(&self) -> Vec<i32> {
        self.items.iter().map(|item| item.pointer_id).collect()
    }

    pub fn is_touchscreen(&self) -> bool {
        self.source_type == SourceType::Touchscreen
    }

    pub fn item(&self, pointer_id: i32) -> Option<&PointerItem> {
        self.items.iter().find(|item| item.pointer_id == pointer_id)
    }

    pub fn item_mut(&mut self, pointer_id: i32) -> Option<&mut PointerItem> {
        self.items.iter_mut().find(|item| item.pointer_id == pointer_id)
    }

    /// Item for the pointer this event is about. A malformed event whose
    /// `pointer_id` has no item yields a zeroed item carrying that id.
    pub fn acting_item(&self) -> PointerItem {
        self.item(self.pointer_id)
            .copied()
            .unwrap_or(PointerItem { pointer_id: self.pointer_id, ..Default::default() })
    }

    /// Replaces the item with the same id, or inserts it in id order.
    pub fn upsert_item(&mut self, item: PointerItem) {
        match self.items.iter_mut().find(|it| it.pointer_id == item.pointer_id) {
            Some(existing) => *existing = item,
            None => {
                self.items.push(item);
                self.items.sort_by_key(|it| it.pointer_id);
            }
        }
    }

    /// Copy of this event reduced to a single pointer.
    pub fn only_pointer(&self, item: PointerItem, action: PointerAction) -> PointerEvent {
        PointerEvent {
            action_time: self.action_time,
            action,
            source_type: self.source_type,
            pointer_id: item.pointer_id,
            items: vec![item],
        }
    }

    pub fn is_knuckle(&self) -> bool {
        self.items.iter().any(|item| item.tool_type == ToolType::Knuckle)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_stay_sorted_by_id() {
        let mut ev = PointerEvent::new(
            0,
            PointerAction::Down,
            3,
            vec![PointerItem::at(3, 1, 1), PointerItem::at(1, 2, 2)],
        );
        assert_eq!(ev.pointer_ids(), vec![1, 3]);

        ev.upsert_item(PointerItem::at(2, 5, 5));
        assert_eq!(ev.pointer_ids(), vec![1, 2, 3]);

        ev.upsert_item(PointerItem::at(2, 9, 9));
        assert_eq!(ev.item(2).map(|it| it.display_pos()), Some((9, 9)));
        assert_eq!(ev.pointer_count(), 3);
    }

    #[test]
    fn missing_acting_item_is_zeroed() {
        let ev = PointerEvent::new(0, PointerAction::Move, 4, vec![PointerItem::at(0, 7, 7)]);
        let item = ev.acting_item();
        assert_eq!(item.pointer_id, 4);
        assert_eq!(item.display_pos(), (0, 0));
    }

    #[test]
    fn trace_json_defaults_to_touchscreen() {
        let json = r#"{
            "actionTime": 12,
            "action": "down",
            "pointerId": 0,
            "items": [{ "pointerId": 0, "displayX": 10, "displayY": 20 }]
        }"#;
        let ev: PointerEvent = serde_json::from_str(json).unwrap();
        assert!(ev.is_touchscreen());
        assert_eq!(ev.acting_item().tool_type, ToolType::Finger);
        assert_eq!(ev.acting_item().raw_pos(), (10, 20));
        assert_eq!(ev.action, PointerAction::Down);
    }
}
