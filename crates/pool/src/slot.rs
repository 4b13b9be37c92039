//! Generic arena-of-slots pool.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use ctxhub_core::sync::Mutex;
use ctxhub_core::{HubError, HubResult, SlotHandle};

/// Occupancy statistics for a pool, including the low-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of slots.
    pub capacity: usize,
    /// Slots currently allocated.
    pub used: usize,
    /// Minimum number of free slots ever observed.
    pub min_free: usize,
    /// Allocation attempts that failed with exhaustion.
    pub failed_allocs: usize,
}

impl PoolStats {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            min_free: capacity,
            failed_allocs: 0,
        }
    }

    fn on_alloc(&mut self) {
        self.used += 1;
        let free = self.capacity - self.used;
        if free < self.min_free {
            self.min_free = free;
        }
    }

    fn on_release(&mut self) {
        self.used -= 1;
    }
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

struct PoolInner<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    stats: PoolStats,
}

/// Thread-safe fixed-capacity pool handing out generation-checked handles.
///
/// A released slot bumps its generation, so a handle held past release is
/// detected and reported as [`HubError::StaleHandle`] instead of aliasing
/// whatever occupies the slot next.
pub struct SlotPool<T> {
    inner: Mutex<PoolInner<T>>,
}

impl<T> SlotPool<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        let mut free = Vec::with_capacity(capacity);
        for index in 0..capacity {
            slots.push(Slot {
                generation: 0,
                entry: None,
            });
            free.push(index as u32);
        }
        // Hand out low indices first.
        free.reverse();
        Self {
            inner: Mutex::new(PoolInner {
                slots,
                free,
                stats: PoolStats::new(capacity),
            }),
        }
    }

    /// Allocates a slot for `value`.
    ///
    /// Returns [`HubError::PoolExhausted`] when no slot is free. The caller
    /// decides whether exhaustion is recoverable or fatal.
    pub fn insert(&self, value: T) -> HubResult<SlotHandle> {
        let mut inner = self.inner.lock();
        let Some(index) = inner.free.pop() else {
            inner.stats.failed_allocs += 1;
            return Err(HubError::PoolExhausted);
        };
        let generation = {
            let slot = &mut inner.slots[index as usize];
            slot.entry = Some(value);
            slot.generation
        };
        inner.stats.on_alloc();
        Ok(SlotHandle::new(index, generation))
    }

    /// Runs `f` against the entry referenced by `handle`.
    pub fn with_mut<R>(&self, handle: SlotHandle, f: impl FnOnce(&mut T) -> R) -> HubResult<R> {
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .get_mut(handle.index as usize)
            .ok_or(HubError::StaleHandle)?;
        if slot.generation != handle.generation {
            return Err(HubError::StaleHandle);
        }
        let entry = slot.entry.as_mut().ok_or(HubError::StaleHandle)?;
        Ok(f(entry))
    }

    /// Removes the entry referenced by `handle` and frees its slot.
    pub fn take(&self, handle: SlotHandle) -> HubResult<T> {
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .get_mut(handle.index as usize)
            .ok_or(HubError::StaleHandle)?;
        if slot.generation != handle.generation {
            return Err(HubError::StaleHandle);
        }
        let value = slot.entry.take().ok_or(HubError::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(handle.index);
        inner.stats.on_release();
        Ok(value)
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().stats.capacity
    }

    pub fn used(&self) -> usize {
        self.inner.lock().stats.used
    }
}
