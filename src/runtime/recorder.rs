use log::warn;

use super::pointer_event::{PointerAction, PointerEvent, PointerItem, MAX_POINTER_COUNT};


fn slot(pointer_id: i32) -> Option<usize> {
    usize::try_from(pointer_id)
        .ok()
        .filter(|id| *id < MAX_POINTER_COUNT)
}


/// What the touch guide has seen come *in*: the last event and where
/// each pointer first touched down.
#[derive(Debug, Clone, Default)]
pub struct ReceivedEventRecorder {
    down_positions: [Option<(i32, i32)>; MAX_POINTER_COUNT],
    last_event: Option<PointerEvent>,
}

impl ReceivedEventRecorder {

    pub fn record(&mut self, event: &PointerEvent) {
        self.last_event = Some(event.clone());

        let Some(idx) = slot(event.pointer_id) else {
            warn!("Pointer id {} out of range, down position not tracked", event.pointer_id);
            return;
        };

        match event.action {
            PointerAction::Down => {
                self.down_positions[idx] = Some(event.acting_item().display_pos());
            },
            PointerAction::Up => self.down_positions[idx] = None,
            _ => {}
        }
    }

    /// Where `pointer_id` went down. Unknown pointers read as the origin.
    pub fn down_position(&self, pointer_id: i32) -> (i32, i32) {
        slot(pointer_id)
            .and_then(|idx| self.down_positions[idx])
            .unwrap_or((0, 0))
    }

    pub fn last_event(&self) -> Option<&PointerEvent> {
        self.last_event.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}


/// What the touch guide has sent *out*: which pointers the downstream
/// consumer believes are pressed, plus the last hover sample.
#[derive(Debug, Clone, Default)]
pub struct InjectedEventRecorder {
    down_pointers: u32,
    down_pointer_num: u32,
    last_down_time: u64,
    last_items: [Option<PointerItem>; MAX_POINTER_COUNT],
    last_hover_event: Option<PointerEvent>,
}

impl InjectedEventRecorder {

    pub fn record(&mut self, event: &PointerEvent) {
        let idx = slot(event.pointer_id);

        match event.action {
            PointerAction::Down => {
                let Some(idx) = idx else { return };
                if self.down_pointers & (1 << idx) == 0 {
                    self.down_pointer_num += 1;
                }
                self.down_pointers |= 1 << idx;
                self.last_down_time = event.action_time;
            },
            PointerAction::Up => {
                let Some(idx) = idx else { return };
                if self.down_pointers & (1 << idx) != 0 {
                    self.down_pointer_num = self.down_pointer_num.saturating_sub(1);
                }
                self.down_pointers &= !(1 << idx);
                if self.down_pointers == 0 {
                    self.last_down_time = 0;
                }
            },
            PointerAction::HoverEnter | PointerAction::HoverMove => {
                self.last_hover_event = Some(event.clone());
            },
            _ => {}
        }

        for item in &event.items {
            if let Some(i) = slot(item.pointer_id) {
                self.last_items[i] = Some(*item);
            }
        }
    }

    pub fn is_down(&self, pointer_id: i32) -> bool {
        slot(pointer_id).is_some_and(|idx| self.down_pointers & (1 << idx) != 0)
    }

    pub fn down_pointer_num(&self) -> u32 {
        self.down_pointer_num
    }

    /// Ids the downstream consumer still holds pressed, ascending.
    pub fn down_pointer_ids(&self) -> Vec<i32> {
        (0..MAX_POINTER_COUNT as i32)
            .filter(|id| self.is_down(*id))
            .collect()
    }

    pub fn last_down_time(&self) -> u64 {
        self.last_down_time
    }

    /// Last position sent downstream for `pointer_id`.
    pub fn last_item(&self, pointer_id: i32) -> Option<PointerItem> {
        slot(pointer_id).and_then(|idx| self.last_items[idx])
    }

    pub fn last_hover_event(&self) -> Option<&PointerEvent> {
        self.last_hover_event.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
