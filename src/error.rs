//! Unified error types for Rangekeeper

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Rangekeeper operations
#[derive(Error, Debug)]
pub enum Error {
    // Allocation errors
    #[error("range is full")]
    Full,

    #[error("provided IP is already allocated")]
    AlreadyAllocated,

    #[error("the provided network does not match the current range")]
    MismatchedNetwork,

    #[error("provided IP is not in the valid range. The range of valid IPs is {valid_range}")]
    NotInRange { valid_range: String },

    #[error("can't generate IP with index {index} from subnet. subnet too small. subnet: \"{subnet}\"")]
    SubnetTooSmall { index: usize, subnet: String },

    // Backing store errors
    #[error("not a snapshottable allocator")]
    NotSnapshottable,

    #[error("restoring snapshot encountered {0}")]
    Restore(Box<Error>),

    #[error("allocation store error: {0}")]
    Store(String),

    // Input errors
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // State file errors
    #[error("Failed to read state file '{path}': {source}")]
    StateRead { path: PathBuf, source: io::Error },

    #[error("Failed to write state file '{path}': {source}")]
    StateWrite { path: PathBuf, source: io::Error },

    #[error("Failed to parse state: {0}")]
    StateParse(#[from] serde_json::Error),

    #[error("Corrupt state payload: {0}")]
    StateData(#[from] hex::FromHexError),
}

/// Result type alias for Rangekeeper operations
pub type Result<T> = std::result::Result<T, Error>;
