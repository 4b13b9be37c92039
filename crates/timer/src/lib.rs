//! # ctxhub-timer
//!
//! Multiplexes many one-shot and periodic delayed-callback requests onto a
//! single underlying [`SystemTimer`] that can only track one deadline at a
//! time. Expiry notifications arrive as deferred callbacks through the
//! inbound queue; [`TimerPool::handle_expired`] then posts `TIMER` events to
//! the owning nanoapps on the loop thread.

#[cfg(not(feature = "std"))]
extern crate alloc;

mod pool;
#[cfg(feature = "std")]
mod sys;

pub use pool::{Clock, SystemTimer, TimerPool};
#[cfg(feature = "std")]
pub use sys::{StdClock, ThreadTimer};
