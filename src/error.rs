// THEORY:
// A single error type for the whole library. The binaries wrap it in `anyhow`
// and add context; library code only ever returns `OracleError`.
//
// Most failures in a live session are not errors at all: a malformed frame or a
// hand with missing landmarks simply means "no gesture this frame". The variants
// below are reserved for things a caller has to act on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid landmark count: expected {expected}, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("outcome list is empty")]
    EmptyDeck,

    #[error("invalid timing: {0}")]
    InvalidTiming(&'static str),

    #[error("failed to start detector `{command}`: {source}")]
    DetectorSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("detector did not signal ready, got: {0:?}")]
    DetectorNotReady(String),

    #[error("detector closed its output stream")]
    DetectorClosed,
}

pub type Result<T> = std::result::Result<T, OracleError>;
