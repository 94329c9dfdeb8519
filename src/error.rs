use std::path::PathBuf;

use thiserror::Error;

/// Problems with the experiment parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("number of trials must be positive")]
    NoTrials,

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("invalid range for {field}: {min} > {max}")]
    InvertedRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("larger-later minimum {large_min} must exceed the smaller-sooner amount {small}")]
    LargeNotLarger { small: f64, large_min: f64 },

    #[error("delay minimum must be at least one day, got {0}")]
    ZeroDelay(u32),

    #[error("{field} of {value} ms exceeds the {max} ms limit")]
    DurationTooLong {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("smaller-sooner and larger-later keys are both {0}")]
    DuplicateChoiceKey(u32),

    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Session misuse by the host.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("timeline references trial {index} but only {count} trials exist")]
    UnknownTrial { index: usize, count: usize },
}
