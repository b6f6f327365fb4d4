use std::cell::RefCell;
use std::rc::Rc;

use log::{trace, warn};

use super::pointer_event::PointerEvent;


/// One link in the pointer-event pipeline.
///
/// A link either consumes an event, alters a copy and passes that on, or
/// passes it on unchanged to its successor. The last link is whatever
/// stands in for the downstream window system.
pub trait EventTransmission {

    /// Returns `true` when this link took responsibility for the event.
    fn on_pointer_event(&mut self, event: &PointerEvent) -> bool;

    /// Fires every timer due at or before `now`, then lets the rest of the
    /// chain do the same.
    fn advance_clock(&mut self, now: u64);

    /// Drops any in-flight state for `input_source`.
    fn clear_events(&mut self, input_source: u32);

    /// Tear-down before the link is discarded.
    fn destroy_events(&mut self);

    fn set_next(&mut self, next: Box<dyn EventTransmission>);
}


/// The optional successor of a link, with forwarding helpers.
#[derive(Default)]
pub struct NextLink {
    inner: Option<Box<dyn EventTransmission>>,
}

impl NextLink {
    pub fn new(next: Box<dyn EventTransmission>) -> Self {
        NextLink { inner: Some(next) }
    }

    pub fn is_set(&self) -> bool {
        self.inner.is_some()
    }

    /// Passes the event on. With no successor the event is dropped.
    pub fn forward(&mut self, event: &PointerEvent) -> bool {
        match self.inner.as_mut() {
            Some(next) => next.on_pointer_event(event),
            None => {
                trace!("No successor, dropping {:?}", event.action);
                false
            }
        }
    }

    pub fn advance_clock(&mut self, now: u64) {
        if let Some(next) = self.inner.as_mut() {
            next.advance_clock(now);
        }
    }

    pub fn clear_events(&mut self, input_source: u32) {
        if let Some(next) = self.inner.as_mut() {
            next.clear_events(input_source);
        }
    }

    pub fn destroy_events(&mut self) {
        if let Some(next) = self.inner.as_mut() {
            next.destroy_events();
        }
    }
}


// Lets a host keep a handle on a link after handing it to the chain.
impl<H: EventTransmission> EventTransmission for Rc<RefCell<H>> {

    fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
        self.borrow_mut().on_pointer_event(event)
    }

    fn advance_clock(&mut self, now: u64) {
        self.borrow_mut().advance_clock(now);
    }

    fn clear_events(&mut self, input_source: u32) {
        self.borrow_mut().clear_events(input_source);
    }

    fn destroy_events(&mut self) {
        self.borrow_mut().destroy_events();
    }

    fn set_next(&mut self, next: Box<dyn EventTransmission>) {
        self.borrow_mut().set_next(next);
    }
}


/// Terminal link that keeps everything it receives. Stands in for the
/// window system in the replay tool and in tests.
#[derive(Default)]
pub struct DownstreamLog {
    pub events: Vec<PointerEvent>,
    pub clears: u32,
    pub destroys: u32,
}

impl DownstreamLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<PointerEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventTransmission for DownstreamLog {

    fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
        self.events.push(event.clone());
        true
    }

    fn advance_clock(&mut self, _now: u64) {}

    fn clear_events(&mut self, _input_source: u32) {
        self.clears += 1;
    }

    fn destroy_events(&mut self) {
        self.destroys += 1;
    }

    fn set_next(&mut self, _next: Box<dyn EventTransmission>) {
        warn!("Downstream log is terminal, successor ignored");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::pointer_event::PointerAction;

    struct PassThrough {
        seen: u32,
        next: NextLink,
    }

    impl EventTransmission for PassThrough {
        fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
            self.seen += 1;
            self.next.forward(event)
        }

        fn advance_clock(&mut self, now: u64) {
            self.next.advance_clock(now);
        }

        fn clear_events(&mut self, input_source: u32) {
            self.next.clear_events(input_source);
        }

        fn destroy_events(&mut self) {
            self.next.destroy_events();
        }

        fn set_next(&mut self, next: Box<dyn EventTransmission>) {
            self.next = NextLink::new(next);
        }
    }

    #[test]
    fn shared_link_stays_observable() {
        let log = Rc::new(RefCell::new(DownstreamLog::new()));
        let mut head = PassThrough { seen: 0, next: NextLink::default() };
        head.set_next(Box::new(Rc::clone(&log)));

        let ev = PointerEvent::single(0, PointerAction::Down, 0, 1, 2);
        assert!(head.on_pointer_event(&ev));
        head.clear_events(0);
        head.destroy_events();

        assert_eq!(head.seen, 1);
        assert_eq!(log.borrow().events, vec![ev]);
        assert_eq!(log.borrow().clears, 1);
        assert_eq!(log.borrow().destroys, 1);
    }

    #[test]
    fn missing_successor_drops_event() {
        let mut head = PassThrough { seen: 0, next: NextLink::default() };
        let ev = PointerEvent::single(0, PointerAction::Move, 0, 1, 2);
        assert!(!head.on_pointer_event(&ev));
        assert!(!head.next.is_set());
    }
}
