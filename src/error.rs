use std::path::PathBuf;

use thiserror::Error;


#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither $XDG_CONFIG_HOME nor $HOME is defined in the environment")]
    NoConfigDir,

    #[error("unable to read JSON file at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad formatting found in JSON file: {0}")]
    Parse(#[from] serde_json::Error),
}


// Errors the replay binary can stop on.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("could not read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed trace: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("logger setup failed: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("trace event {index} goes back in time ({time} < {previous})")]
    NonMonotonic { index: usize, time: u64, previous: u64 },
}
