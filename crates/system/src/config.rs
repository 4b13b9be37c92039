//! Hub sizing configuration.

/// Fixed sizing knobs for one hub instance.
///
/// Every pool and queue in the runtime has its capacity chosen here, once,
/// at startup; nothing grows afterwards.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Slots in the shared event pool.
    pub event_pool_capacity: usize,
    /// Depth of the cross-thread inbound queue.
    pub inbound_queue_depth: usize,
    /// Maximum simultaneously pending timer requests.
    pub timer_capacity: usize,
    /// Slots in the outbound host message pool.
    pub host_message_pool_size: usize,
    /// Largest accepted outbound host message, in bytes.
    pub max_host_message_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            event_pool_capacity: 64,
            inbound_queue_depth: 64,
            timer_capacity: 32,
            host_message_pool_size: 16,
            max_host_message_size: 1024,
        }
    }
}

impl HubConfig {
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }
}

/// Builder for ergonomic hub configuration construction.
#[derive(Debug, Clone, Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    pub fn event_pool_capacity(mut self, capacity: usize) -> Self {
        self.config.event_pool_capacity = capacity;
        self
    }

    pub fn inbound_queue_depth(mut self, depth: usize) -> Self {
        self.config.inbound_queue_depth = depth;
        self
    }

    pub fn timer_capacity(mut self, capacity: usize) -> Self {
        self.config.timer_capacity = capacity;
        self
    }

    pub fn host_message_pool_size(mut self, size: usize) -> Self {
        self.config.host_message_pool_size = size;
        self
    }

    pub fn max_host_message_size(mut self, size: usize) -> Self {
        self.config.max_host_message_size = size;
        self
    }

    pub fn build(self) -> HubConfig {
        self.config
    }
}
