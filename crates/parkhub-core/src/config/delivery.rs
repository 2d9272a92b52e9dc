//! Outbound notification configuration.

use serde::{Deserialize, Serialize};

/// Delivery retry and channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Attempts per message before it counts as a per-user failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each subsequent attempt.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Upper bound for the retry delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Name of the admin/broadcast channel for announcements and summaries.
    #[serde(default = "default_channel")]
    pub channel_name: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            channel_name: default_channel(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_channel() -> String {
    "parkhub-admin".to_string()
}
