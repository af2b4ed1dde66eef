//! Watcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling watcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Poll interval, written as `interval_ms` in config files (default: 50ms)
    ///
    /// Config files only carry whole milliseconds; [`with_interval`](Self::with_interval)
    /// keeps the duration exactly as given.
    #[serde(rename = "interval_ms", with = "millis", default = "default_interval")]
    pub poll_interval: Duration,

    /// Event queue capacity; the polling loop blocks when it is full (default: 1024)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Error queue capacity (default: 16)
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
}

impl WatcherConfig {
    /// Poll interval, never zero
    pub fn interval(&self) -> Duration {
        self.poll_interval.max(MIN_INTERVAL)
    }

    /// Set the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_interval(),
            event_capacity: default_event_capacity(),
            error_capacity: default_error_capacity(),
        }
    }
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

fn default_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_event_capacity() -> usize {
    1024
}

fn default_error_capacity() -> usize {
    16
}

/// Durations as integer milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
