//! In-memory bitmap allocation store
//!
//! One bit per offset, packed into 64-bit words behind a mutex.
//! Snapshots encode the bitmap as a big-endian unsigned integer where
//! bit `i` is offset `i`, with leading zero bytes stripped.

use crate::allocator::{AllocationStore, Snapshottable};
use crate::error::{Error, Result};
use rand::{Rng, rng};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const WORD_BITS: usize = u64::BITS as usize;

/// How `allocate_next` chooses among free offsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Start at a random offset and take the first free one after it
    #[default]
    Random,
    /// Always take the lowest free offset
    Contiguous,
}

#[derive(Debug)]
struct BitmapState {
    words: Vec<u64>,
    /// Number of set bits
    count: usize,
}

impl BitmapState {
    fn get(&self, offset: usize) -> bool {
        self.words[offset / WORD_BITS] & (1u64 << (offset % WORD_BITS)) != 0
    }

    fn set(&mut self, offset: usize) {
        self.words[offset / WORD_BITS] |= 1u64 << (offset % WORD_BITS);
        self.count += 1;
    }

    fn clear(&mut self, offset: usize) {
        self.words[offset / WORD_BITS] &= !(1u64 << (offset % WORD_BITS));
        self.count -= 1;
    }
}

/// Bitmap-backed allocation store
#[derive(Debug)]
pub struct AllocationBitmap {
    /// Label of the range this bitmap tracks (e.g. "10.0.0.0/24")
    range_spec: String,
    /// Number of offsets
    max: usize,
    strategy: ScanStrategy,
    state: Mutex<BitmapState>,
}

impl AllocationBitmap {
    /// Create a bitmap of `max` offsets using random scanning
    pub fn new(max: usize, range_spec: impl Into<String>) -> Self {
        Self::with_strategy(max, range_spec, ScanStrategy::default())
    }

    /// Create a bitmap of `max` offsets with a specific scan strategy
    pub fn with_strategy(max: usize, range_spec: impl Into<String>, strategy: ScanStrategy) -> Self {
        Self {
            range_spec: range_spec.into(),
            max,
            strategy,
            state: Mutex::new(BitmapState {
                words: vec![0; max.div_ceil(WORD_BITS)],
                count: 0,
            }),
        }
    }

    // Every mutation leaves words and count in agreement, so a poisoned
    // lock still guards a consistent bitmap.
    fn lock(&self) -> MutexGuard<'_, BitmapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn first_free(&self, state: &BitmapState) -> Option<usize> {
        state
            .words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(i, word)| i * WORD_BITS + word.trailing_ones() as usize)
            .filter(|offset| *offset < self.max)
    }

    fn free_from_random_start(&self, state: &BitmapState) -> Option<usize> {
        let start = rng().random_range(0..self.max);
        (0..self.max)
            .map(|i| (start + i) % self.max)
            .find(|offset| !state.get(*offset))
    }
}

impl AllocationStore for AllocationBitmap {
    fn allocate(&self, offset: usize) -> Result<bool> {
        if offset >= self.max {
            return Err(Error::Store(format!(
                "offset {} out of range for {}",
                offset, self.range_spec
            )));
        }

        let mut state = self.lock();
        if state.get(offset) {
            return Ok(false);
        }
        state.set(offset);
        Ok(true)
    }

    fn allocate_next(&self) -> Result<Option<usize>> {
        let mut state = self.lock();
        if state.count >= self.max {
            return Ok(None);
        }

        let found = match self.strategy {
            ScanStrategy::Random => self.free_from_random_start(&state),
            ScanStrategy::Contiguous => self.first_free(&state),
        };
        if let Some(offset) = found {
            state.set(offset);
        }
        Ok(found)
    }

    fn release(&self, offset: usize) -> Result<()> {
        if offset >= self.max {
            return Ok(());
        }

        let mut state = self.lock();
        if state.get(offset) {
            state.clear(offset);
        }
        Ok(())
    }

    fn has(&self, offset: usize) -> bool {
        offset < self.max && self.lock().get(offset)
    }

    fn free(&self) -> usize {
        self.max.saturating_sub(self.lock().count)
    }

    fn for_each(&self, visit: &mut dyn FnMut(usize)) {
        // Copy out so `visit` may call back into the store
        let words = self.lock().words.clone();
        for (i, word) in words.into_iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                visit(i * WORD_BITS + bit);
                bits &= bits - 1;
            }
        }
    }

    fn snapshotter(&self) -> Option<&dyn Snapshottable> {
        Some(self)
    }
}

impl Snapshottable for AllocationBitmap {
    fn snapshot(&self) -> (String, Vec<u8>) {
        let state = self.lock();
        let mut bytes: Vec<u8> = state.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes.reverse();
        (self.range_spec.clone(), bytes)
    }

    fn restore(&self, range_spec: &str, data: &[u8]) -> Result<()> {
        if range_spec != self.range_spec {
            return Err(Error::Store(
                "the provided range does not match the current range".into(),
            ));
        }

        let mut words = vec![0u64; self.max.div_ceil(WORD_BITS)];
        for (k, byte) in data.iter().rev().enumerate() {
            if *byte == 0 {
                continue;
            }
            let word = words.get_mut(k / 8).ok_or_else(|| {
                Error::Store(format!("snapshot has {} bytes, too large for {}", data.len(), self.range_spec))
            })?;
            *word |= u64::from(*byte) << ((k % 8) * 8);
        }

        let tail = self.max % WORD_BITS;
        if tail != 0 {
            if let Some(last) = words.last() {
                if last >> tail != 0 {
                    return Err(Error::Store(format!(
                        "snapshot marks offsets beyond {} for {}",
                        self.max, self.range_spec
                    )));
                }
            }
        }

        let count: usize = words.iter().map(|w| w.count_ones() as usize).sum();
        let mut state = self.lock();
        state.words = words;
        state.count = count;
        debug!(range = %self.range_spec, allocated = count, "restored allocation bitmap");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocated(bitmap: &AllocationBitmap) -> Vec<usize> {
        let mut offsets = Vec::new();
        bitmap.for_each(&mut |offset| offsets.push(offset));
        offsets
    }

    #[test]
    fn test_allocate_and_release() {
        let bitmap = AllocationBitmap::new(10, "test");
        assert_eq!(bitmap.free(), 10);

        assert!(bitmap.allocate(3).unwrap());
        assert!(!bitmap.allocate(3).unwrap());
        assert!(bitmap.has(3));
        assert_eq!(bitmap.free(), 9);

        bitmap.release(3).unwrap();
        assert!(!bitmap.has(3));
        assert_eq!(bitmap.free(), 10);

        // Releasing again is harmless
        bitmap.release(3).unwrap();
        assert_eq!(bitmap.free(), 10);
    }

    #[test]
    fn test_allocate_out_of_bounds() {
        let bitmap = AllocationBitmap::new(10, "test");
        assert!(matches!(bitmap.allocate(10), Err(Error::Store(_))));
        assert!(!bitmap.has(10));
        bitmap.release(10).unwrap();
        assert_eq!(bitmap.free(), 10);
    }

    #[test]
    fn test_contiguous_scan() {
        let bitmap = AllocationBitmap::with_strategy(70, "test", ScanStrategy::Contiguous);
        for expected in 0..70 {
            assert_eq!(bitmap.allocate_next().unwrap(), Some(expected));
        }
        assert_eq!(bitmap.allocate_next().unwrap(), None);

        bitmap.release(65).unwrap();
        bitmap.release(2).unwrap();
        assert_eq!(bitmap.allocate_next().unwrap(), Some(2));
        assert_eq!(bitmap.allocate_next().unwrap(), Some(65));
    }

    #[test]
    fn test_random_scan_fills_everything() {
        let bitmap = AllocationBitmap::new(100, "test");
        let mut seen = std::collections::HashSet::new();
        while let Some(offset) = bitmap.allocate_next().unwrap() {
            assert!(offset < 100);
            assert!(seen.insert(offset), "offset {} handed out twice", offset);
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(bitmap.free(), 0);
    }

    #[test]
    fn test_empty_bitmap() {
        let bitmap = AllocationBitmap::new(0, "test");
        assert_eq!(bitmap.free(), 0);
        assert_eq!(bitmap.allocate_next().unwrap(), None);
        assert!(!bitmap.has(0));
        assert_eq!(bitmap.snapshot(), ("test".to_string(), Vec::new()));
    }

    #[test]
    fn test_for_each_ascending() {
        let bitmap = AllocationBitmap::new(200, "test");
        for offset in [150, 0, 64, 63, 199] {
            bitmap.allocate(offset).unwrap();
        }
        assert_eq!(allocated(&bitmap), vec![0, 63, 64, 150, 199]);
    }

    #[test]
    fn test_snapshot_encoding() {
        let bitmap = AllocationBitmap::new(16, "10.0.0.0/28");
        bitmap.allocate(0).unwrap();
        bitmap.allocate(9).unwrap();

        let (label, data) = bitmap.snapshot();
        assert_eq!(label, "10.0.0.0/28");
        // bit 9 -> 0x02 in the high byte, bit 0 -> 0x01 in the low byte
        assert_eq!(data, vec![0x02, 0x01]);
    }

    #[test]
    fn test_snapshot_restore() {
        let source = AllocationBitmap::new(254, "10.0.0.0/24");
        for offset in [1, 7, 100, 253] {
            source.allocate(offset).unwrap();
        }
        let (label, data) = source.snapshot();

        let target = AllocationBitmap::new(254, "10.0.0.0/24");
        target.allocate(5).unwrap();
        target.restore(&label, &data).unwrap();

        assert_eq!(allocated(&target), vec![1, 7, 100, 253]);
        assert_eq!(target.free(), 250);
    }

    #[test]
    fn test_restore_rejects_other_range() {
        let bitmap = AllocationBitmap::new(254, "10.0.0.0/24");
        bitmap.allocate(4).unwrap();

        let err = bitmap.restore("10.0.1.0/24", &[0x01]).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(bitmap.has(4));
    }

    #[test]
    fn test_restore_rejects_oversized_payload() {
        let bitmap = AllocationBitmap::new(6, "test");
        bitmap.allocate(2).unwrap();

        // Bit 6 is past the end
        assert!(matches!(bitmap.restore("test", &[0x40]), Err(Error::Store(_))));
        assert!(bitmap.has(2));
        assert_eq!(bitmap.free(), 5);

        // Bit 8
        assert!(matches!(bitmap.restore("test", &[0x01, 0x00]), Err(Error::Store(_))));
        assert!(bitmap.has(2));
        assert_eq!(bitmap.free(), 5);

        // More bytes than words
        assert!(matches!(bitmap.restore("test", &[0x01; 9]), Err(Error::Store(_))));
        assert_eq!(allocated(&bitmap), vec![2]);
        assert_eq!(bitmap.free(), 5);

        bitmap.restore("test", &[0x3f]).unwrap();
        assert_eq!(bitmap.free(), 0);
    }
}
