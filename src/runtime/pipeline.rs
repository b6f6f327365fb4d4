use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use log::info;

use super::capabilities::{
    ActionCapability, EventSink, MagnifierCapability, MenuCapability, WindowQueryCapability,
};
use super::pointer_event::PointerEvent;
use super::touch_guider::{TouchGuideServices, TouchGuider};
use super::transmission::EventTransmission;
use super::zoom_gesture::{ZoomGesture, ZoomServices};
use crate::init::config::Configuration;

pub const FEATURE_SCREEN_MAGNIFICATION: u32 = 0x0000_0001;
pub const FEATURE_TOUCH_EXPLORATION: u32 = 0x0000_0002;


/// Everything either recognizer may call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub sink: Arc<dyn EventSink>,
    pub magnifier: Option<Arc<dyn MagnifierCapability>>,
    pub menu: Option<Arc<dyn MenuCapability>>,
    pub windows: Arc<dyn WindowQueryCapability>,
    pub actions: Arc<dyn ActionCapability>,
}


/// The recognizers enabled by `features`, linked zoom first, then touch
/// guide, then `downstream`.
///
/// Handles to the recognizers are kept so the host can drive their
/// out-of-band controls (shielding, external zoom on/off) and inspect state.
pub struct Pipeline {
    head: Box<dyn EventTransmission>,
    pub zoom: Option<Rc<RefCell<ZoomGesture>>>,
    pub touch_guide: Option<Rc<RefCell<TouchGuider>>>,
}

impl Pipeline {

    pub fn build(
        cfg: &Configuration,
        features: u32,
        collaborators: Collaborators,
        downstream: Box<dyn EventTransmission>,
    ) -> Self {
        let mut head = downstream;
        let mut touch_guide = None;
        let mut zoom = None;

        if features & FEATURE_TOUCH_EXPLORATION != 0 {
            let guide = Rc::new(RefCell::new(TouchGuider::new(cfg, TouchGuideServices {
                sink: collaborators.sink.clone(),
                windows: collaborators.windows.clone(),
                actions: collaborators.actions.clone(),
            })));
            guide.borrow_mut().set_next(head);
            head = Box::new(guide.clone());
            touch_guide = Some(guide);
        }

        if features & FEATURE_SCREEN_MAGNIFICATION != 0 {
            let gesture = Rc::new(RefCell::new(ZoomGesture::new(cfg, ZoomServices {
                magnifier: collaborators.magnifier.clone(),
                menu: collaborators.menu.clone(),
                windows: collaborators.windows.clone(),
            })));
            gesture.borrow_mut().set_next(head);
            head = Box::new(gesture.clone());
            zoom = Some(gesture);
        }

        info!(
            "Pipeline built: zoom gesture {}, touch guide {}",
            if zoom.is_some() { "on" } else { "off" },
            if touch_guide.is_some() { "on" } else { "off" },
        );

        Pipeline { head, zoom, touch_guide }
    }

    pub fn on_pointer_event(&mut self, event: &PointerEvent) -> bool {
        self.head.on_pointer_event(event)
    }

    pub fn advance_clock(&mut self, now: u64) {
        self.head.advance_clock(now);
    }

    pub fn clear_events(&mut self, input_source: u32) {
        self.head.clear_events(input_source);
    }

    pub fn destroy_events(&mut self) {
        self.head.destroy_events();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::geometry::Rect;
    use crate::runtime::loopback::{LoopbackActions, LoopbackMagnifier, LoopbackMenu, LoopbackWindows, RecordingSink};
    use crate::runtime::pointer_event::PointerAction;
    use crate::runtime::transmission::DownstreamLog;

    fn collaborators() -> Collaborators {
        Collaborators {
            sink: Arc::new(RecordingSink::default()),
            magnifier: Some(Arc::new(LoopbackMagnifier::new(Rect::new(0, 0, 1080, 2340), 0))),
            menu: Some(Arc::new(LoopbackMenu::default())),
            windows: Arc::new(LoopbackWindows::default()),
            actions: Arc::new(LoopbackActions::new(true)),
        }
    }

    #[test]
    fn no_features_is_a_straight_wire() {
        let out = Rc::new(RefCell::new(DownstreamLog::new()));
        let mut pipeline = Pipeline::build(&Configuration::default(), 0, collaborators(), Box::new(out.clone()));
        assert!(pipeline.zoom.is_none() && pipeline.touch_guide.is_none());

        let ev = PointerEvent::single(0, PointerAction::Down, 0, 1, 1);
        pipeline.on_pointer_event(&ev);
        pipeline.clear_events(1);
        assert_eq!(out.borrow().events, vec![ev]);
        assert_eq!(out.borrow().clears, 1);
    }

    #[test]
    fn zoom_sits_in_front_of_touch_guide() {
        let out = Rc::new(RefCell::new(DownstreamLog::new()));
        let features = FEATURE_SCREEN_MAGNIFICATION | FEATURE_TOUCH_EXPLORATION;
        let mut pipeline = Pipeline::build(&Configuration::default(), features, collaborators(), Box::new(out.clone()));

        // the zoom gesture holds the DOWN, so the touch guide hasn't started
        pipeline.on_pointer_event(&PointerEvent::single(0, PointerAction::Down, 0, 500, 500));
        let guide = pipeline.touch_guide.clone().unwrap();
        assert!(guide.borrow().injected().last_hover_event().is_none());
        assert_eq!(pipeline.zoom.as_ref().unwrap().borrow().cached_len(), 1);

        pipeline.destroy_events();
        assert_eq!(out.borrow().destroys, 1);
    }
}
