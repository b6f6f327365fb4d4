use serde::Deserialize;
use serde_json::from_str;
use std::{fs::read_to_string, path::Path};

use crate::error::ReplayError;
use crate::runtime::{
    geometry::Rect,
    loopback::WindowLayout,
    pipeline::{FEATURE_SCREEN_MAGNIFICATION, FEATURE_TOUCH_EXPLORATION},
    pointer_event::PointerEvent,
};

/// How long past the last event the replay keeps the clock running, so
/// that every delayed a11y event gets a chance to fire.
const DEFAULT_TAIL_MS: u64 = 5000;


/// A recorded touch session plus the window state it was recorded against.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Trace {

    #[serde(default = "default_features")]
    pub features: u32,

    #[serde(default)]
    pub layout: WindowLayout,

    // the magnifier's menu button, if it is on screen
    #[serde(default)]
    pub menu: Option<Rect>,

    #[serde(default)]
    pub hot_area_margin: i32,

    #[serde(default = "default_true")]
    pub magnifier_available: bool,

    /// Whether the focused element performs clicks itself.
    #[serde(default)]
    pub click_accepted: bool,

    pub events: Vec<PointerEvent>,

    #[serde(default)]
    pub end_time: Option<u64>,
}

fn default_features() -> u32  { FEATURE_SCREEN_MAGNIFICATION | FEATURE_TOUCH_EXPLORATION }
fn default_true()     -> bool { true }


impl Trace {

    /// Event times have to be non-decreasing; the recognizers run on the
    /// trace's own clock.
    pub fn validate(&self) -> Result<(), ReplayError> {
        let mut previous = 0;
        for (index, event) in self.events.iter().enumerate() {
            if event.action_time < previous {
                return Err(ReplayError::NonMonotonic { index, time: event.action_time, previous });
            }
            previous = event.action_time;
        }
        Ok(())
    }

    pub fn end_time(&self) -> u64 {
        let last = self.events.last().map_or(0, |e| e.action_time);
        self.end_time.unwrap_or(last + DEFAULT_TAIL_MS).max(last)
    }
}


pub fn load_trace(filepath: &Path) -> Result<Trace, ReplayError> {
    let jsonfile = read_to_string(filepath)?;
    let trace = from_str::<Trace>(&jsonfile)?;
    trace.validate()?;
    Ok(trace)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_trace_gets_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{
            "events": [
                {{ "actionTime": 0, "action": "down", "pointerId": 0,
                   "items": [{{ "pointerId": 0, "displayX": 10, "displayY": 20 }}] }},
                {{ "actionTime": 40, "action": "up", "pointerId": 0,
                   "items": [{{ "pointerId": 0, "displayX": 10, "displayY": 20 }}] }}
            ]
        }}"#).unwrap();

        let trace = load_trace(file.path()).unwrap();
        assert_eq!(trace.features, FEATURE_SCREEN_MAGNIFICATION | FEATURE_TOUCH_EXPLORATION);
        assert!(trace.magnifier_available);
        assert_eq!(trace.events.len(), 2);
        assert!(trace.events[0].is_touchscreen());
        assert_eq!(trace.end_time(), 5040);
    }

    #[test]
    fn time_travel_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{
            "events": [
                {{ "actionTime": 100, "action": "down", "pointerId": 0, "items": [] }},
                {{ "actionTime": 50, "action": "up", "pointerId": 0, "items": [] }}
            ]
        }}"#).unwrap();

        let err = load_trace(file.path()).unwrap_err();
        assert!(matches!(err, ReplayError::NonMonotonic { index: 1, time: 50, previous: 100 }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_trace(Path::new("/no/such/trace.json")).unwrap_err();
        assert!(matches!(err, ReplayError::Io(_)));
    }
}
