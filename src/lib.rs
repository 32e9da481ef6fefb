//! Rangekeeper - IP address allocation out of a fixed CIDR block
//!
//! Provides:
//! - `Range`, which maps addresses of a CIDR block onto dense offsets
//! - Pluggable offset stores with an in-memory bitmap default
//! - Snapshot and restore of allocation state
//! - TOML configuration and JSON state persistence for the CLI

pub mod allocator;
pub mod config;
pub mod error;
pub mod range;
pub mod session;
pub mod state;

pub use allocator::{AllocationBitmap, AllocationStore, ScanStrategy, Snapshottable};
pub use error::{Error, Result};
pub use range::{Allocator, Range, indexed_ip, range_size};
pub use session::{RangeStatus, Session};
pub use state::RangeState;
