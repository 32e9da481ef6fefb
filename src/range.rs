//! Contiguous CIDR ranges of allocatable addresses
//!
//! The internal structure of a range is:
//!
//! ```text
//! For CIDR 10.0.0.0/24
//! 254 addresses usable out of 256 total (minus network and broadcast)
//!
//! CIDR network            CIDR broadcast
//! 10.0.0.0                     10.0.0.255
//! |                                     |
//! 0 1 2 3 4 5 ...         ... 253 254 255
//!   |                              |
//! base                         base + max
//!   |                              |
//! offset #0 of store      last offset of store
//! ```

pub mod offset;
pub mod size;

pub use offset::indexed_ip;
pub use size::range_size;

use crate::allocator::{AllocationBitmap, AllocationStore, ScanStrategy};
use crate::error::{Error, Result};
use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use tracing::debug;

/// Address-level allocation interface
///
/// Implementations must be safe to share between threads.
pub trait Allocator: Send + Sync {
    /// Reserve a specific address
    fn allocate(&self, ip: IpAddr) -> Result<()>;

    /// Reserve any free address
    fn allocate_next(&self) -> Result<IpAddr>;

    /// Return an address to the pool
    fn release(&self, ip: IpAddr) -> Result<()>;

    /// Visit every allocated address
    fn for_each(&self, visit: &mut dyn FnMut(IpAddr));

    /// Network block covered by this allocator
    fn cidr(&self) -> IpNet;

    /// Whether `ip` is allocated, so that `allocate(ip)` would fail
    fn has(&self, ip: IpAddr) -> bool;
}

/// A contiguous block of addresses that can be allocated atomically
pub struct Range {
    /// Network block, host bits cleared
    network: IpNet,
    /// First usable address (network address + 1) in the 128-bit space
    base: u128,
    /// Number of usable addresses
    max: usize,
    store: Box<dyn AllocationStore>,
}

impl Range {
    /// Create a range backed by an in-memory bitmap
    pub fn new(cidr: IpNet) -> Result<Self> {
        Self::with_strategy(cidr, ScanStrategy::default())
    }

    /// Create a range backed by an in-memory bitmap using `strategy`
    pub fn with_strategy(cidr: IpNet, strategy: ScanStrategy) -> Result<Self> {
        Self::with_factory(cidr, |max, range_spec| {
            Ok(Box::new(AllocationBitmap::with_strategy(max, range_spec, strategy)))
        })
    }

    /// Create a range, calling `factory` with the usable size and the
    /// range description to construct the backing store
    pub fn with_factory<F>(cidr: IpNet, factory: F) -> Result<Self>
    where
        F: FnOnce(usize, &str) -> Result<Box<dyn AllocationStore>>,
    {
        let network = cidr.trunc();
        let usable = range_size(&network).saturating_sub(2);
        let max = usize::try_from(usable)
            .map_err(|_| Error::InvalidCidr(format!("{} is too large to track", network)))?;
        // Don't hand out the network address. Saturates only for a /128 at the
        // very top of the space, where max is 0 anyway.
        let base = offset::to_integer(network.network()).saturating_add(1);

        let store = factory(max, &network.to_string())?;
        debug!(range = %network, usable = max, "created range");

        Ok(Self {
            network,
            base,
            max,
            store,
        })
    }

    /// Number of usable addresses in the range
    pub fn size(&self) -> usize {
        self.max
    }

    /// Count of addresses left in the range
    pub fn free(&self) -> usize {
        self.store.free()
    }

    /// Count of addresses allocated in the range
    pub fn used(&self) -> usize {
        self.max.saturating_sub(self.store.free())
    }

    /// Save the current allocation state
    ///
    /// Returns the range label and an opaque payload for `restore`.
    pub fn snapshot(&self) -> Result<(String, Vec<u8>)> {
        let snapshottable = self.store.snapshotter().ok_or(Error::NotSnapshottable)?;
        Ok(snapshottable.snapshot())
    }

    /// Replace the allocation state with a previously captured snapshot
    ///
    /// Fails with `MismatchedNetwork` unless `network` is exactly this range's network.
    pub fn restore(&self, network: &IpNet, data: &[u8]) -> Result<()> {
        if *network != self.network {
            return Err(Error::MismatchedNetwork);
        }
        let snapshottable = self.store.snapshotter().ok_or(Error::NotSnapshottable)?;
        snapshottable
            .restore(&network.to_string(), data)
            .map_err(|e| Error::Restore(Box::new(e)))?;

        debug!(range = %self.network, used = self.used(), "restored range");
        Ok(())
    }

    /// Collect every allocated address
    pub fn allocated(&self) -> Vec<IpAddr> {
        let mut ips = Vec::with_capacity(self.used());
        self.for_each(&mut |ip| ips.push(ip));
        ips
    }

    /// Offset of `ip` if it is a usable address of this range.
    /// The network and broadcast addresses are never usable.
    fn offset(&self, ip: IpAddr) -> Option<usize> {
        if !offset::contains(&self.network, ip) {
            return None;
        }
        offset::offset_of(self.base, ip)
            .and_then(|o| usize::try_from(o).ok())
            .filter(|o| *o < self.max)
    }

    fn not_in_range(&self) -> Error {
        Error::NotInRange {
            valid_range: self.network.to_string(),
        }
    }
}

impl Allocator for Range {
    /// Fails with `NotInRange` or `AlreadyAllocated` if the address is not
    /// valid for this range or has already been reserved.
    fn allocate(&self, ip: IpAddr) -> Result<()> {
        let offset = self.offset(ip).ok_or_else(|| self.not_in_range())?;

        if !self.store.allocate(offset)? {
            return Err(Error::AlreadyAllocated);
        }
        debug!(%ip, range = %self.network, "allocated address");
        Ok(())
    }

    /// Fails with `Full` if there are no addresses left.
    fn allocate_next(&self) -> Result<IpAddr> {
        let offset = self.store.allocate_next()?.ok_or(Error::Full)?;
        let ip = offset::from_offset(self.base, offset).ok_or_else(|| Error::SubnetTooSmall {
            index: offset + 1,
            subnet: self.network.to_string(),
        })?;

        debug!(%ip, range = %self.network, "allocated next address");
        Ok(ip)
    }

    /// Releasing an unallocated address or one outside the range is a no-op.
    fn release(&self, ip: IpAddr) -> Result<()> {
        let Some(offset) = self.offset(ip) else {
            return Ok(());
        };

        self.store.release(offset)?;
        debug!(%ip, range = %self.network, "released address");
        Ok(())
    }

    fn for_each(&self, visit: &mut dyn FnMut(IpAddr)) {
        self.store.for_each(&mut |offset| {
            // +1 because offset 0 is the first address after the network address
            if let Ok(ip) = indexed_ip(&self.network, offset + 1) {
                visit(ip);
            }
        });
    }

    fn cidr(&self) -> IpNet {
        self.network
    }

    fn has(&self, ip: IpAddr) -> bool {
        self.offset(ip).is_some_and(|offset| self.store.has(offset))
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range")
            .field("network", &self.network)
            .field("max", &self.max)
            .field("free", &self.free())
            .finish_non_exhaustive()
    }
}
