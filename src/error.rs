//! Crate error type.
//!
//! Only the build-side surfaces (classification, configuration) can fail.
//! The tracker and the preload polyfill absorb every irregular signal as a
//! no-op and never return errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A streamed (non-buffered) asset reached the bundler.
    #[error("streaming input is not supported: {}", path.display())]
    StreamingUnsupported { path: PathBuf },

    /// A classification pattern failed to compile.
    #[error("invalid {kind} pattern {pattern:?}: {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to serialize fragment data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
