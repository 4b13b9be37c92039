//! # ctxhub-system
//!
//! The top of the runtime: the [`Hub`] context object that ties the event
//! loop, timer pool, resource managers, and host comms together, the
//! [`Nanoapp`] trait nanoapps implement, and the [`HubApi`] surface they
//! call. The hub is an explicit value, never a global; construct one per
//! process (or per test) and drive it with [`Hub::run`] or
//! [`Hub::run_until_idle`].
//!
//! ## Module Overview
//! - [`config`] – Pool and queue sizing, chosen once at startup.
//! - [`api`]    – The nanoapp trait and its runtime API surface.
//! - [`hub`]    – The context object, lifecycle, and run loop.

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod api;
pub mod config;
pub mod hub;

pub use api::{HubApi, Nanoapp};
pub use config::{HubConfig, HubConfigBuilder};
pub use hub::{Hub, Platform};
