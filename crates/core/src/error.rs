//! Typed errors for asset loading and session configuration.
//!
//! Most of the crate propagates `anyhow::Error`. The types here exist where a
//! caller has to tell recoverable faults apart from fatal ones.

use std::collections::TryReserveError;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading an audio asset from the library.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("out of memory while loading {}", path.display())]
    Exhausted {
        path: PathBuf,
        #[source]
        source: TryReserveError,
    },

    #[error("failed to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("no audio track in {}", path.display())]
    NoTrack { path: PathBuf },

    #[error("failed to resample {}: {message}", path.display())]
    Resample { path: PathBuf, message: String },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssetError {
    /// Missing assets and allocation failures are skipped with a warning;
    /// everything else aborts the job.
    pub fn is_soft(&self) -> bool {
        matches!(self, AssetError::Missing { .. } | AssetError::Exhausted { .. })
    }
}

/// A session configuration that cannot drive the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("round script is empty")]
    EmptyScript,

    #[error("phase windows: {0}")]
    PhaseWindows(String),

    #[error("{name} probability {value} is outside [0, 1]")]
    Probability { name: String, value: f64 },

    #[error("{name} range is invalid: [{min}, {max}]")]
    Range { name: String, min: f64, max: f64 },

    #[error("{name} peak target {value} must be in (0, 1]")]
    Peak { name: String, value: f64 },

    #[error("inter-round pause must last at least one sample")]
    InterRoundTooShort,
}
