pub mod error;

pub mod init {
    pub mod config;
    pub mod trace;
}

pub mod runtime {
    pub mod capabilities;
    pub mod geometry;
    pub mod gesture_recognizer;
    pub mod loopback;
    pub mod pipeline;
    pub mod pointer_event;
    pub mod recorder;
    pub mod timers;
    pub mod touch_guider;
    pub mod transmission;
    pub mod zoom_gesture;
}
