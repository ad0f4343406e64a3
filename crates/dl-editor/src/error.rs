//! Error types for draw-layer operations.
//!
//! `NotFound` and `InconsistentState` are normally logged and answered with
//! an absent value; they only surface as errors where a caller explicitly
//! asks for strictness. The remaining variants abort the operation.

use dl_core::SceneError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("inconsistent draw layer: {0}")]
    InconsistentState(String),

    #[error("malformed scene: {0}")]
    MalformedScene(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("no active position group; activate a position first")]
    NotActivated,

    #[error("the draw layer has been released")]
    Released,

    #[error("invalid position group key {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Scene(#[from] SceneError),
}
