//! Locking primitives for `std` and `lock-free` builds.
//!
//! The event pool, the host message pool, and the inbound queue are the only
//! structures touched from both the event-loop thread and platform driver
//! threads, so they need genuine cross-thread synchronization. With the
//! default `std` feature this wraps `parking_lot`; the opt-in `lock-free`
//! build substitutes `spin` for targets without an OS. Lock poisoning is not
//! a concern with either backend.

#[cfg(not(feature = "std"))]
pub use alloc::sync::Arc;
#[cfg(feature = "std")]
pub use std::sync::Arc;

#[cfg(feature = "std")]
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
#[cfg(not(feature = "std"))]
pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;

/// Platform-agnostic mutex wrapper.
pub struct Mutex<T> {
    #[cfg(feature = "std")]
    inner: parking_lot::Mutex<T>,
    #[cfg(not(feature = "std"))]
    inner: spin::Mutex<T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "std")]
            inner: parking_lot::Mutex::new(value),
            #[cfg(not(feature = "std"))]
            inner: spin::Mutex::new(value),
        }
    }

    /// Acquires the mutex, blocking (or spinning) until available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Condition variable used by the blocking inbound-queue pop.
///
/// Only available with the `std` feature; the `lock-free` build falls back
/// to a spin wait with a CPU relax hint at the single blocking point in the
/// event loop.
#[cfg(feature = "std")]
pub struct Condvar {
    inner: parking_lot::Condvar,
}

#[cfg(feature = "std")]
impl Condvar {
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
        }
    }

    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        self.inner.wait(guard);
    }

    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}

#[cfg(feature = "std")]
impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
