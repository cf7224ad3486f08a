//! Scripted devices and codecs shared by the unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::config::{AudioSourceConfig, RecorderConfig};
use crate::models::error::RecorderError;
use crate::traits::capture_device::{CaptureDevice, DeviceProvider, ReadError};
use crate::traits::codec::{CodecFormat, CodecOutput, CodecRegistry, HardwareCodec};

/// Poll `cond` until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Recorder config with short loop intervals, writing into `dir`.
pub(crate) fn test_config(dir: &Path) -> RecorderConfig {
    RecorderConfig {
        sample_rate: 16_000,
        refresh_interval: Duration::from_millis(10),
        pause_poll_interval: Duration::from_millis(2),
        read_retry_delay: Duration::from_millis(1),
        fault_backoff: Duration::from_millis(5),
        ..RecorderConfig::with_cache_dir(dir)
    }
}

#[derive(Default)]
struct ScriptState {
    buffers: Mutex<VecDeque<Vec<i16>>>,
    open_error: Mutex<Option<RecorderError>>,
    fatal: Mutex<Option<String>>,
    reads: AtomicUsize,
    releases: AtomicUsize,
    device_active: AtomicBool,
    noise_suppression: AtomicBool,
}

/// Device provider that plays back queued buffers.
#[derive(Clone)]
pub(crate) struct ScriptedProvider {
    state: Arc<ScriptState>,
    buffer_size: usize,
    supports_noise_suppression: bool,
}

impl ScriptedProvider {
    pub(crate) fn new(buffer_size: usize) -> Self {
        Self {
            state: Arc::new(ScriptState::default()),
            buffer_size,
            supports_noise_suppression: false,
        }
    }

    pub(crate) fn with_noise_suppression(mut self) -> Self {
        self.supports_noise_suppression = true;
        self
    }

    pub(crate) fn push(&self, samples: Vec<i16>) {
        self.state.buffers.lock().push_back(samples);
    }

    pub(crate) fn fail_open(&self, error: RecorderError) {
        *self.state.open_error.lock() = Some(error);
    }

    pub(crate) fn fault(&self, message: &str) {
        *self.state.fatal.lock() = Some(message.to_string());
    }

    /// Successful reads delivered so far.
    pub(crate) fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn device_active(&self) -> bool {
        self.state.device_active.load(Ordering::SeqCst)
    }
}

impl DeviceProvider for ScriptedProvider {
    fn open(&self, _config: &AudioSourceConfig) -> Result<Box<dyn CaptureDevice>, RecorderError> {
        if let Some(e) = self.state.open_error.lock().clone() {
            return Err(e);
        }
        self.state.device_active.store(true, Ordering::SeqCst);
        Ok(Box::new(ScriptedDevice {
            state: Arc::clone(&self.state),
            buffer_size: self.buffer_size,
            supports_noise_suppression: self.supports_noise_suppression,
        }))
    }
}

struct ScriptedDevice {
    state: Arc<ScriptState>,
    buffer_size: usize,
    supports_noise_suppression: bool,
}

impl CaptureDevice for ScriptedDevice {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ReadError> {
        if let Some(msg) = self.state.fatal.lock().clone() {
            return Err(ReadError::Fatal(msg));
        }
        let next = self.state.buffers.lock().pop_front();
        match next {
            Some(samples) => {
                let n = samples.len().min(buf.len());
                buf[..n].copy_from_slice(&samples[..n]);
                self.state.reads.fetch_add(1, Ordering::SeqCst);
                Ok(n)
            }
            None => {
                thread::sleep(Duration::from_millis(1));
                Err(ReadError::Transient)
            }
        }
    }

    fn pause(&mut self) -> Result<(), RecorderError> {
        self.state.device_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), RecorderError> {
        self.state.device_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_noise_suppression(&mut self, enabled: bool) -> Result<bool, RecorderError> {
        let live = enabled && self.supports_noise_suppression;
        self.state.noise_suppression.store(live, Ordering::SeqCst);
        Ok(live)
    }

    fn noise_suppression_enabled(&self) -> bool {
        self.state.noise_suppression.load(Ordering::SeqCst)
    }

    fn release(&mut self) -> Result<(), RecorderError> {
        self.state.device_active.store(false, Ordering::SeqCst);
        self.state.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// How a `ScriptedCodec` misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodecFault {
    /// `configure` fails, forcing the fallback strategy.
    Configure,
    /// Every `queue_input` fails.
    Input,
    /// The input queue never has a free slot.
    QueueFull,
}

pub(crate) struct ScriptedCodec {
    fault: CodecFault,
    released: Arc<AtomicUsize>,
}

impl HardwareCodec for ScriptedCodec {
    fn name(&self) -> &str {
        "scripted"
    }

    fn configure(&mut self, _format: CodecFormat) -> Result<(), RecorderError> {
        match self.fault {
            CodecFault::Configure => Err(RecorderError::ConfigurationFailed("codec refused format".into())),
            _ => Ok(()),
        }
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    fn queue_input(&mut self, _pcm: &[u8], _timeout: Duration) -> Result<bool, RecorderError> {
        match self.fault {
            CodecFault::Input => Err(RecorderError::EncodeFailure("codec rejected input".into())),
            _ => Ok(false),
        }
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<CodecOutput, RecorderError> {
        thread::sleep(timeout.min(Duration::from_millis(1)));
        Ok(CodecOutput::Pending)
    }

    fn signal_end_of_stream(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry handing out `ScriptedCodec`s with a fixed fault.
#[derive(Clone)]
pub(crate) struct ScriptedCodecs {
    fault: CodecFault,
    released: Arc<AtomicUsize>,
}

impl ScriptedCodecs {
    pub(crate) fn new(fault: CodecFault) -> Self {
        Self {
            fault,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn releases(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl CodecRegistry for ScriptedCodecs {
    fn find_encoder(&self, _mime: &str) -> Option<Box<dyn HardwareCodec>> {
        Some(Box::new(ScriptedCodec {
            fault: self.fault,
            released: Arc::clone(&self.released),
        }))
    }
}
