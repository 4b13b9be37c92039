//! # ctxhub-pool
//!
//! Fixed-capacity, generation-checked object pools. Capacity is chosen once
//! at construction as a deliberate bound on worst-case memory; exhaustion is
//! a first-class return value, never a growth trigger.
//!
//! [`SlotPool`] is the generic arena-of-slots allocator, safe to call from
//! the event-loop thread and from platform callback threads. [`EventPool`]
//! layers delivery reference counting and the exactly-once free-hook
//! guarantee on top of it.

#[cfg(not(feature = "std"))]
extern crate alloc;

mod event_pool;
mod slot;

pub use event_pool::{EventHandle, EventPool, ReleasedEvent};
pub use slot::{PoolStats, SlotPool};
