//! Microphone availability check for cpal hosts.
//!
//! Desktop hosts have no portable consent API. An input device that reports
//! a usable default config is treated as permission granted.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};

use recorder_core::PolledPermission;

/// Default interval between availability probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Whether the default input device can currently be configured.
pub fn default_input_available() -> bool {
    cpal::default_host()
        .default_input_device()
        .map(|device| device.default_input_config().is_ok())
        .unwrap_or(false)
}

/// Permission oracle that polls the default input device.
pub fn cpal_permission(interval: Duration) -> PolledPermission {
    PolledPermission::new(Arc::new(default_input_available), interval)
}
