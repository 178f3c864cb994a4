use thiserror::Error;

use crate::BarRejection;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid bar for {instrument}: {reason}")]
    InvalidBar {
        instrument: String,
        reason: BarRejection,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Bar feed line {line}: {source}")]
    Feed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors that only affect a single bar and leave the loop usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidBar { .. } | Error::Execution(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
