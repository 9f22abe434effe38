//! Request-level error types.
//!
//! Each layer owns its error enum ([`BackendError`] for collaborators,
//! [`ConfigError`](crate::config::ConfigError) for config loading) and
//! [`DownscaleError`] composes them for the request surface.
//!
//! | Variant | Raised in | Cache touched? |
//! |---|---|---|
//! | [`DownscaleError::Argument`] | validation, before anything else | no |
//! | [`DownscaleError::Acquisition`] | decode / fetch of the source | entry removed, retry allowed |
//! | [`DownscaleError::Production`] | encoding the result | no (source stays cached) |
//! | [`DownscaleError::Task`] | a spawned task panicked or was cancelled | no |

use crate::imaging::BackendError;
use thiserror::Error;

/// Malformed request: wrong arity, wrong types, unsupported source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("3 arguments required, but only {0} present.")]
    MissingArguments(usize),
    #[error("First argument should be a file path or an http(s) URL, got {0:?}")]
    UnsupportedSource(String),
    #[error("Second argument should be a number")]
    WidthNotNumeric,
    #[error("Third argument should be a number")]
    HeightNotNumeric,
    #[error("{argument} argument should be a positive whole number, got {value:?}")]
    NotWholeNumber {
        argument: &'static str,
        value: String,
    },
    #[error("destination dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("invalid option {0:?}")]
    InvalidOption(String),
}

/// Failure delivered to every request waiting on a source that could not be acquired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("source acquisition failed: {0}")]
    AcquisitionFailed(String),
}

#[derive(Error, Debug)]
pub enum DownscaleError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Acquisition(#[from] CacheError),
    #[error("result production failed: {0}")]
    Production(#[source] BackendError),
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for DownscaleError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
