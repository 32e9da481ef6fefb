//! A configured range bound to its state file
//!
//! Opening a session builds the range from configuration and replays the
//! persisted snapshot, so allocations survive between runs.

use crate::config::RangekeeperConfig;
use crate::error::Result;
use crate::range::{Allocator, Range};
use crate::state::{self, RangeState};
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Point-in-time usage figures for a range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeStatus {
    pub cidr: String,
    pub size: usize,
    pub used: usize,
    pub free: usize,
}

/// Range plus the file its state lives in
#[derive(Debug)]
pub struct Session {
    range: Range,
    state_path: PathBuf,
}

impl Session {
    /// Build the configured range and restore any saved state
    pub fn open(config: &RangekeeperConfig) -> Result<Self> {
        let range = config.build_range()?;
        let state_path = config.state.path.clone();

        match RangeState::load(&state_path)? {
            Some(saved) => {
                saved.apply(&range)?;
                info!(
                    range = %range.cidr(),
                    used = range.used(),
                    path = %state_path.display(),
                    "restored allocation state"
                );
            }
            None => debug!(path = %state_path.display(), "no saved state, starting empty"),
        }

        Ok(Self { range, state_path })
    }

    /// The managed range
    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Path of the state file
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Reserve `ip` and persist
    ///
    /// The reservation is undone if the state cannot be written.
    pub fn allocate(&self, ip: IpAddr) -> Result<()> {
        self.range.allocate(ip)?;
        if let Err(e) = self.persist() {
            self.range.release(ip)?;
            return Err(e);
        }
        Ok(())
    }

    /// Reserve any free address and persist
    ///
    /// The reservation is undone if the state cannot be written.
    pub fn allocate_next(&self) -> Result<IpAddr> {
        let ip = self.range.allocate_next()?;
        if let Err(e) = self.persist() {
            self.range.release(ip)?;
            return Err(e);
        }
        Ok(ip)
    }

    /// Release `ip` and persist
    ///
    /// The address is reserved again if the state cannot be written.
    pub fn release(&self, ip: IpAddr) -> Result<()> {
        let was_allocated = self.range.has(ip);
        self.range.release(ip)?;
        if let Err(e) = self.persist() {
            if was_allocated {
                self.range.allocate(ip)?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Allocated addresses in ascending order
    pub fn list(&self) -> Vec<IpAddr> {
        let mut ips = self.range.allocated();
        ips.sort();
        ips
    }

    /// Current usage figures
    pub fn status(&self) -> RangeStatus {
        RangeStatus {
            cidr: self.range.cidr().to_string(),
            size: self.range.size(),
            used: self.range.used(),
            free: self.range.free(),
        }
    }

    /// Write the current state to disk
    pub fn persist(&self) -> Result<()> {
        RangeState::capture(&self.range)?.save(&self.state_path)
    }

    /// Forget all allocations, removing the state file
    pub fn reset(self) -> Result<bool> {
        state::remove(&self.state_path)
    }
}
