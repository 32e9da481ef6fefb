//! Persisted allocation state
//!
//! A range snapshot is stored as JSON next to the configuration:
//!
//! ```json
//! {
//!   "cidr": "10.96.0.0/24",
//!   "label": "10.96.0.0/24",
//!   "data": "0201",
//!   "version": "0.1.0"
//! }
//! ```
//!
//! `data` is the hex-encoded snapshot payload.

use crate::error::{Error, Result};
use crate::range::{Allocator, Range};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Snapshot of a range as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeState {
    /// Network the snapshot was taken from
    pub cidr: String,
    /// Label reported by the backing store
    pub label: String,
    /// Hex-encoded snapshot payload
    pub data: String,
    /// Rangekeeper version that wrote the state
    pub version: String,
}

impl RangeState {
    /// Capture the current state of `range`
    pub fn capture(range: &Range) -> Result<Self> {
        let (label, data) = range.snapshot()?;
        Ok(Self {
            cidr: range.cidr().to_string(),
            label,
            data: hex::encode(data),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Restore this state into `range`
    ///
    /// Fails with `MismatchedNetwork` if the state belongs to another network
    /// or its store label disagrees with the recorded network.
    pub fn apply(&self, range: &Range) -> Result<()> {
        let network: IpNet = self
            .cidr
            .parse()
            .map_err(|e| Error::InvalidCidr(format!("'{}': {}", self.cidr, e)))?;
        if self.label != network.to_string() {
            return Err(Error::MismatchedNetwork);
        }
        let data = hex::decode(&self.data)?;
        range.restore(&network, &data)
    }

    /// Read state from `path`, or `None` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::StateRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write state to `path`
    ///
    /// The file is written beside its destination and renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");

        let write_err = |e| Error::StateWrite {
            path: path.to_path_buf(),
            source: e,
        };
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;

        debug!(path = %path.display(), cidr = %self.cidr, "saved range state");
        Ok(())
    }
}

/// Delete the state file at `path`. Returns whether a file was removed.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::StateWrite {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
