use std::sync::Arc;

use crate::models::config::AudioSourceConfig;
use crate::models::error::RecorderError;

/// Callback receiving each captured buffer's peak level in dBFS.
///
/// Runs on the capture thread; must return quickly.
pub type PeakCallback = Arc<dyn Fn(f32) + Send + Sync + 'static>;

/// Callback receiving device and encoder errors from the capture thread.
pub type ErrorCallback = Arc<dyn Fn(RecorderError) + Send + Sync + 'static>;

/// Failure of a single blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Nothing was available this time; retry shortly.
    Transient,
    /// The device is gone or broken.
    Fatal(String),
}

/// An opened microphone.
///
/// Lives entirely on the capture thread that opened it, so implementations
/// may wrap handles that are not `Send`.
pub trait CaptureDevice {
    /// Number of samples the device prefers per read.
    fn buffer_size(&self) -> usize;

    /// Block until samples are available and copy them into `buf`.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ReadError>;

    /// Stop the physical device.
    fn pause(&mut self) -> Result<(), RecorderError>;

    /// Restart the physical device after `pause`.
    fn resume(&mut self) -> Result<(), RecorderError>;

    /// Enable or disable platform noise suppression. Returns the live setting.
    fn set_noise_suppression(&mut self, enabled: bool) -> Result<bool, RecorderError>;

    /// Whether platform noise suppression is currently applied.
    fn noise_suppression_enabled(&self) -> bool;

    /// Release native capture resources. Called exactly once.
    fn release(&mut self) -> Result<(), RecorderError>;
}

/// Opens capture devices.
///
/// `open` is called on the capture thread; it must fail with
/// `PermissionDenied` or `DeviceUnavailable` when no device can be opened.
pub trait DeviceProvider: Send + Sync {
    fn open(&self, config: &AudioSourceConfig) -> Result<Box<dyn CaptureDevice>, RecorderError>;
}
