use std::time::Duration;

/// Tuning for a [`MemoryDb`](crate::MemoryDb).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Entries kept per stream. Older entries are trimmed on append.
    pub max_stream_len: usize,

    /// How often the sweeper purges expired keys.
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_stream_len: 64,
            sweep_interval: Duration::from_secs(30),
        }
    }
}
