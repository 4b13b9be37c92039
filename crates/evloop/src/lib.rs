//! # ctxhub-evloop
//!
//! The cooperative scheduling core of the runtime: per-nanoapp bookkeeping
//! records, the blocking cross-thread inbound queue, and the event loop's
//! fan-out / round-robin delivery machinery.
//!
//! Nanoapp *behavior* (the handler objects and the API surface they call)
//! lives one layer up in `ctxhub-system`; this crate deliberately knows
//! nothing about it, which keeps the routing engine testable in isolation.
//!
//! ## Module Overview
//! - [`inbound`]  – Blocking MPSC queue carrying events and deferred
//!   callbacks from any thread onto the loop thread.
//! - [`nanoapp`]  – Per-app identity, broadcast subscription set, and
//!   private event queue.
//! - [`eventloop`] – The scheduler state: app registry, instance-id
//!   allocation, broadcast fan-out, and delivery bookkeeping.

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod eventloop;
pub mod inbound;
pub mod nanoapp;

pub use eventloop::{EventLoop, StopHandle};
pub use inbound::{EventPoster, Inbound, InboundQueue};
pub use nanoapp::Nanoapp;

#[cfg(test)]
mod tests;
