use serde::{Deserialize, Serialize};

/// Configuration for a [`ValueStore`](crate::ValueStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Once the encoded bytes waiting in the write buffer exceed this, the
    /// next write drains the buffer into the backing store.
    pub pending_threshold_bytes: u64,
    /// Maximum number of decoded values kept in the read cache. Zero turns
    /// the cache off.
    pub cache_capacity: usize,
    /// Capacity of the channel carrying `read_many_values` results.
    pub read_many_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pending_threshold_bytes: 64 * 1024 * 1024, // 64 MiB
            cache_capacity: 4096,
            read_many_buffer: 256,
        }
    }
}

impl StoreConfig {
    /// Default settings with a different buffering threshold.
    pub fn with_threshold(pending_threshold_bytes: u64) -> Self {
        Self {
            pending_threshold_bytes,
            ..Default::default()
        }
    }
}
