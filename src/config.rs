//! Link Configuration
//!
//! Timing knobs for a device handle. Each [`Device`](crate::Device) owns its
//! own copy so tests can shrink the intervals without touching globals.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing configuration for a device link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Default bound for connect, disconnect and discovery waits.
    pub operation_timeout: Duration,
    /// Total attempts for essential property reads. The bus may transiently
    /// fail to answer while the stack is still loading the object.
    pub read_attempts: u32,
    /// Pause between essential read attempts.
    pub retry_delay: Duration,
    /// Pause between discovery poll iterations.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
            read_attempts: 3,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        }
    }
}
