use serde::Deserialize;
use serde_json::from_str;
use std::{
    fs::{read_to_string, File, OpenOptions},
    path::{Path, PathBuf},
    time::Duration,
};
use log::SetLoggerError;
use simplelog::{LevelFilter, SimpleLogger, WriteLogger};

use crate::error::ConfigError;

// This is simply a wrapper to allow deserialization of the
// logLevel field into a simplelog::LevelFilter, albeit in
// a roundabout way.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Off   => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn  => LevelFilter::Warn,
            LogLevel::Info  => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}


#[serde_with::serde_as]  // this has to be before the #[derive]
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {

    // --- touch guide ---

    #[serde(default = "default_300ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub double_tap_timeout: Duration,

    #[serde(default = "default_40ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub min_double_tap_time: Duration,

    #[serde(default = "default_400ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub long_press_timeout: Duration,

    #[serde(default = "default_2000ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub exit_gesture_rec_timeout: Duration,

    #[serde(default = "default_300ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub gesture_started_time_threshold: Duration,

    #[serde(default = "default_150ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub gesture_not_started_time_threshold: Duration,

    #[serde(default = "default_drag_cosine")]
    pub max_drag_gesture_cosine: f32,

    #[serde(default = "default_200")]
    pub mini_pointer_distance_dip: f32,

    #[serde(default = "default_100")]
    pub double_tap_slop: f32,

    // px both fingers must travel before a two-finger touch counts as moving
    #[serde(default = "default_8")]
    pub touch_slop: f32,

    // --- zoom gesture ---

    #[serde(default = "default_250ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub multi_tap_timer: Duration,

    #[serde(default = "default_300ms")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub zoom_long_press_timer: Duration,

    #[serde(default = "default_8")]
    pub tap_min_distance: f32,

    #[serde(default = "default_2")]
    pub min_scroll_span: f32,

    #[serde(default = "default_2")]
    pub min_scale_span: f32,

    #[serde(default = "default_pt_one")]
    pub min_persist_scale_delta: f32,

    #[serde(default = "default_false")]
    pub zoom_drag_enabled: bool,

    // --- display ---

    #[serde(default = "default_width")]
    pub screen_width: i32,

    #[serde(default = "default_height")]
    pub screen_height: i32,

    #[serde(default = "default_dpi")]
    pub screen_dpi: f32,

    #[serde(default = "default_1")]
    pub virtual_pixel_ratio: f32,

    // --- logging ---

    #[serde(default = "default_stdout")]
    pub log_file: String,

    #[serde(default = "default_info")]
    pub log_level: LogLevel,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            double_tap_timeout: default_300ms(),
            min_double_tap_time: default_40ms(),
            long_press_timeout: default_400ms(),
            exit_gesture_rec_timeout: default_2000ms(),
            gesture_started_time_threshold: default_300ms(),
            gesture_not_started_time_threshold: default_150ms(),
            max_drag_gesture_cosine: default_drag_cosine(),
            mini_pointer_distance_dip: default_200(),
            double_tap_slop: default_100(),
            touch_slop: default_8(),
            multi_tap_timer: default_250ms(),
            zoom_long_press_timer: default_300ms(),
            tap_min_distance: default_8(),
            min_scroll_span: default_2(),
            min_scale_span: default_2(),
            min_persist_scale_delta: default_pt_one(),
            zoom_drag_enabled: false,
            screen_width: default_width(),
            screen_height: default_height(),
            screen_dpi: default_dpi(),
            virtual_pixel_ratio: default_1(),
            log_file: default_stdout(),
            log_level: default_info(),
        }
    }
}

// for some reason, default literals don't seem to be okay
// with the serde crate, despite several issues and PRs on the
// subject. Using functions to yield the values is the only
// accepted way.
fn default_40ms()        -> Duration { Duration::from_millis(40) }
fn default_150ms()       -> Duration { Duration::from_millis(150) }
fn default_250ms()       -> Duration { Duration::from_millis(250) }
fn default_300ms()       -> Duration { Duration::from_millis(300) }
fn default_400ms()       -> Duration { Duration::from_millis(400) }
fn default_2000ms()      -> Duration { Duration::from_millis(2000) }
fn default_drag_cosine() -> f32      { 0.525321989 }     // cos(58.3°)
fn default_200()         -> f32      { 200.0 }
fn default_100()         -> f32      { 100.0 }
fn default_8()           -> f32      { 8.0 }
fn default_2()           -> f32      { 2.0 }
fn default_1()           -> f32      { 1.0 }
fn default_pt_one()      -> f32      { 0.1 }
fn default_false()       -> bool     { false }
fn default_width()       -> i32      { 1080 }
fn default_height()      -> i32      { 2340 }
fn default_dpi()         -> f32      { 320.0 }
fn default_stdout()      -> String   { "stdout".to_string() }
fn default_info()        -> LogLevel { LogLevel::Info }


impl Configuration {

    /// Finger travel (px) that turns a touch into a swipe: one centimetre.
    pub fn swipe_threshold_px(&self) -> f32 {
        self.screen_dpi / 25.4 * 10.0
    }

    /// Minimum travel between two sampled swipe route points, per axis.
    pub fn route_min_pixels(&self) -> (f32, f32) {
        (self.screen_width as f32 * 0.1, self.screen_height as f32 * 0.1)
    }

    pub fn double_tap_slop_px(&self) -> f32 {
        self.double_tap_slop * self.virtual_pixel_ratio + 0.5
    }

    pub fn mini_pointer_distance_px(&self) -> f32 {
        self.mini_pointer_distance_dip * self.virtual_pixel_ratio
    }
}


pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let config_folder = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(config_dir) => PathBuf::from(config_dir),
        None => {
            // yes, this case has in fact happened, so it IS worth catching
            let home = std::env::var_os("HOME").ok_or(ConfigError::NoConfigDir)?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_folder.join("a11y-gesture-filter/config.json"))
}


// Configs are so optional that their absence should not crash the program,
// so any problem with the JSON file yields `Configuration::default()`
// in `init_cfg` below. The user is warned about this, so they can address
// the issues if they want to tune the recognizers.
pub fn parse_config_file(filepath: &Path) -> Result<Configuration, ConfigError> {
    let jsonfile = read_to_string(filepath)
        .map_err(|source| ConfigError::Io { path: filepath.to_path_buf(), source })?;

    // use serde's error as is
    let config = from_str::<Configuration>(&jsonfile)?;

    Ok(config)
}


/// Loads `explicit` if given, otherwise the file under the user's config dir.
pub fn init_cfg(explicit: Option<&Path>) -> Configuration {

    println!("[PRE-LOG: INFO]: Loading configuration...");
    let parsed = match explicit {
        Some(path) => parse_config_file(path),
        None => config_file_path().and_then(|path| parse_config_file(&path)),
    };

    match parsed {
        Ok(cfg) => {
            println!("[PRE-LOG: INFO]: Successfully loaded your configuration (with defaults for unspecified values): \n{:#?}", &cfg);
            cfg
        },
        Err(err) => {
            let cfg = Default::default();
            println!("\n[PRE-LOG: WARNING]: {err}\n\nThe configuration file could not be \
                loaded, so the program will continue with defaults of:\n{cfg:#?}",
            );
            cfg
        }
    }
}


/// Opens the configured log file for appending. `None` means log to the
/// console, either because that was asked for or because the file is unusable.
fn open_log_file(cfg: &Configuration) -> Option<File> {
    if cfg.log_file == "stdout" {
        return None;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)
        .inspect_err(|err| println!(
            "[PRE-LOG: WARN]: Cannot write to '{}' ({}), the recognizers will log to the console.",
            cfg.log_file, err
        ))
        .ok()
}


pub fn init_logger(cfg: &Configuration) -> Result<(), SetLoggerError> {

    let level: LevelFilter = cfg.log_level.into();
    let destination = match open_log_file(cfg) {
        Some(file) => {
            WriteLogger::init(level, simplelog::Config::default(), file)?;
            cfg.log_file.as_str()
        },
        None => {
            SimpleLogger::init(level, simplelog::Config::default())?;
            "console"
        },
    };

    println!("[PRE-LOG: INFO]: Gesture filter logging at {level} to {destination}.");
    Ok(())
}
