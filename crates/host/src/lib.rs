//! # ctxhub-host
//!
//! Outbound nanoapp-to-host messaging and inbound host-to-nanoapp delivery.
//! Wire encoding lives entirely behind the [`HostLink`] trait; this crate
//! only manages message-record ownership across the send lifecycle, which
//! spans the nanoapp's call, the transport's thread, and the deferred
//! release back on the loop thread.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use log::{debug, warn};

use ctxhub_core::{
    AppId, AsyncError, Event, EventType, FreeHook, InstanceId, SlotHandle,
};
use ctxhub_evloop::EventLoop;
use ctxhub_pool::{PoolStats, SlotPool};

/// Destination meaning "no particular host endpoint"; never a valid send
/// target.
pub const HOST_ENDPOINT_UNSPECIFIED: u16 = 0xfffe;
/// Destination meaning "every host client".
pub const HOST_ENDPOINT_BROADCAST: u16 = 0xffff;

/// One outbound message record, owned by the pool from acceptance until the
/// transport reports completion.
#[derive(Debug)]
pub struct HostMessage {
    /// Stable identity of the sending nanoapp, for host-side attribution.
    pub app_id: AppId,
    pub sender: InstanceId,
    pub message_type: u32,
    pub host_endpoint: u16,
    pub data: Vec<u8>,
}

/// Payload of [`EventType::HOST_MESSAGE`] events delivered to nanoapps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessageReceived {
    pub message_type: u32,
    pub host_endpoint: u16,
    pub data: Vec<u8>,
}

/// The transport under the host connection.
///
/// `send` accepts or rejects synchronously and must not block. After
/// acceptance the transport owns the referenced record until it reports
/// completion by posting `SystemCallback::HostMessageDelivered { handle }`
/// from whatever thread it runs on.
pub trait HostLink: Send {
    fn send(&mut self, handle: SlotHandle, message: &HostMessage) -> bool;
}

struct OutboundRecord {
    message: HostMessage,
    free_hook: Option<FreeHook>,
}

/// Manages the outbound message pool and the host-link send lifecycle.
pub struct HostCommsManager {
    link: Box<dyn HostLink>,
    outbound: SlotPool<OutboundRecord>,
    max_message_size: usize,
}

impl HostCommsManager {
    pub fn new(link: Box<dyn HostLink>, pool_capacity: usize, max_message_size: usize) -> Self {
        Self {
            link,
            outbound: SlotPool::new(pool_capacity),
            max_message_size,
        }
    }

    /// Sends one message from a nanoapp to the host.
    ///
    /// Oversized data and the unspecified endpoint are rejected before any
    /// allocation. Whatever the outcome, the free hook runs exactly once: on
    /// any synchronous `false` it runs inline (we are in the nanoapp's
    /// context), otherwise it runs on the loop thread when the transport
    /// reports completion.
    pub fn send_message_to_host(
        &mut self,
        app_id: AppId,
        sender: InstanceId,
        data: Vec<u8>,
        message_type: u32,
        host_endpoint: u16,
        free_hook: Option<FreeHook>,
    ) -> bool {
        if data.len() > self.max_message_size {
            warn!(
                "host: rejecting {} byte message from {sender} (max {})",
                data.len(),
                self.max_message_size
            );
            run_hook(free_hook);
            return false;
        }
        if host_endpoint == HOST_ENDPOINT_UNSPECIFIED {
            warn!("host: rejecting message from {sender} to the unspecified endpoint");
            run_hook(free_hook);
            return false;
        }

        let message = HostMessage {
            app_id,
            sender,
            message_type,
            host_endpoint,
            data,
        };
        // The hook enters the record only once the slot exists, so an
        // exhausted pool can still run it inline.
        let handle = match self.outbound.insert(OutboundRecord {
            message,
            free_hook: None,
        }) {
            Ok(handle) => handle,
            Err(err) => {
                warn!("host: dropping message from {sender}: {err}");
                run_hook(free_hook);
                return false;
            }
        };

        let Self { link, outbound, .. } = self;
        let accepted = outbound
            .with_mut(handle, |record| {
                record.free_hook = free_hook;
                link.send(handle, &record.message)
            })
            .unwrap_or(false);
        if !accepted {
            // Transport rejection: release inline, still in app context.
            if let Ok(record) = self.outbound.take(handle) {
                run_hook(record.free_hook);
            }
            return false;
        }
        debug!("host: accepted message {handle} from {sender}");
        true
    }

    /// Deferred completion for an accepted message; loop thread only, so the
    /// free hook runs in nanoapp-executable context.
    pub fn handle_delivered(&mut self, handle: SlotHandle, error: AsyncError) {
        match self.outbound.take(handle) {
            Ok(record) => {
                if !error.is_success() {
                    warn!(
                        "host: transport failed to deliver {handle} from {}: {error}",
                        record.message.sender
                    );
                }
                run_hook(record.free_hook);
            }
            Err(err) => warn!("host: completion for unknown message {handle}: {err}"),
        }
    }

    /// Delivers a host-originated message to one nanoapp or, with
    /// [`InstanceId::BROADCAST`], to every nanoapp registered for
    /// [`EventType::HOST_MESSAGE`]. Droppable under pressure.
    pub fn deliver_host_message(
        &self,
        ev: &EventLoop,
        target: InstanceId,
        message_type: u32,
        host_endpoint: u16,
        data: Vec<u8>,
    ) {
        let message = HostMessageReceived {
            message_type,
            host_endpoint,
            data,
        };
        if ev
            .post_event(Event::system(
                EventType::HOST_MESSAGE,
                target,
                Arc::new(message),
            ))
            .is_err()
        {
            debug!("host: inbound message for {target} dropped");
        }
    }

    pub fn outbound_stats(&self) -> PoolStats {
        self.outbound.stats()
    }
}

fn run_hook(hook: Option<FreeHook>) {
    if let Some(hook) = hook {
        hook();
    }
}

#[cfg(test)]
mod tests;
