//! Error kinds of the rig core. Optional lookups return `Option` instead;
//! these are for operations that genuinely fail.

use rigkit_api_core::{ItemId, SceneError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RigError {
    /// Entity asked for by identifier/path does not exist. Common, expected,
    /// never fatal at command boundaries.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Constructing a typed wrapper on an item lacking the required tag.
    #[error("item {item:?} is not a '{expected}'")]
    TypeMismatch { item: ItemId, expected: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying host operation failed.
    #[error(transparent)]
    Host(#[from] SceneError),

    /// Preset or module authored at a newer system version. The caller may
    /// log and proceed.
    #[error("authored at system version {found}, current is {current}")]
    Version { found: u32, current: u32 },

    #[error("unknown transform link type: {0}")]
    UnknownLinkType(String),
}

pub type Result<T> = std::result::Result<T, RigError>;
