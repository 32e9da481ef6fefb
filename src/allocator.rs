//! Offset-indexed allocation stores
//!
//! Provides:
//! - The `AllocationStore` contract consumed by a `Range`
//! - The optional `Snapshottable` capability
//! - An in-memory bitmap store with pluggable scan strategies

pub mod bitmap;

pub use bitmap::{AllocationBitmap, ScanStrategy};

use crate::error::Result;

/// Thread-safe store tracking which offsets of a range are allocated.
///
/// Offsets are dense integers in `[0, max)` where `max` is the size the
/// store was created with. Implementations must make every operation
/// linearizable per offset, and `allocate_next` must never hand the same
/// offset to two callers.
pub trait AllocationStore: Send + Sync {
    /// Mark `offset` as allocated. Returns `false` if it was already taken.
    fn allocate(&self, offset: usize) -> Result<bool>;

    /// Pick and mark any free offset, or `None` when the store is full.
    fn allocate_next(&self) -> Result<Option<usize>>;

    /// Mark `offset` as free. Releasing a free offset is a no-op.
    fn release(&self, offset: usize) -> Result<()>;

    /// Whether `offset` is currently allocated
    fn has(&self, offset: usize) -> bool;

    /// Number of offsets still free
    fn free(&self) -> usize;

    /// Visit every allocated offset
    fn for_each(&self, visit: &mut dyn FnMut(usize));

    /// Snapshot capability, if this store supports persistence.
    fn snapshotter(&self) -> Option<&dyn Snapshottable> {
        None
    }
}

/// Capture and replace the full allocation state of a store
pub trait Snapshottable {
    /// Returns the range label the state belongs to and the opaque payload.
    fn snapshot(&self) -> (String, Vec<u8>);

    /// Replace the store's state with a payload produced by `snapshot`.
    ///
    /// `range_spec` must match the label the store was created with.
    fn restore(&self, range_spec: &str, data: &[u8]) -> Result<()>;
}
