//! Microphone capture: one dedicated thread per session running a blocking
//! read loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::clock::ElapsedClock;
use crate::models::config::{AudioSourceConfig, RecorderConfig};
use crate::models::error::RecorderError;
use crate::processing::sample_buffer::SampleBuffer;
use crate::traits::capture_device::{CaptureDevice, DeviceProvider, ErrorCallback, ReadError};

/// Sleep intervals used by the capture loop.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTiming {
    pub pause_poll: Duration,
    pub read_retry: Duration,
    pub fault_backoff: Duration,
}

impl From<&RecorderConfig> for CaptureTiming {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            pause_poll: config.pause_poll_interval,
            read_retry: config.read_retry_delay,
            fault_backoff: config.fault_backoff,
        }
    }
}

/// Flags shared between a session handle and its capture thread.
struct CaptureControl {
    running: AtomicBool,
    paused: AtomicBool,
    noise_suppression: AtomicBool,
    live_noise_suppression: AtomicBool,
}

/// Starts capture sessions on devices from a `DeviceProvider`.
pub struct AudioSource {
    provider: Arc<dyn DeviceProvider>,
    timing: CaptureTiming,
}

impl AudioSource {
    pub fn new(provider: Arc<dyn DeviceProvider>, timing: CaptureTiming) -> Self {
        Self { provider, timing }
    }

    /// Open a device and start the capture loop.
    ///
    /// `on_data` receives every captured buffer on the capture thread.
    /// Device faults after a successful open go to `on_error`; the loop keeps
    /// running until the session is stopped.
    pub fn start<F>(
        &self,
        config: AudioSourceConfig,
        on_data: F,
        on_error: ErrorCallback,
    ) -> Result<AudioSourceSession, RecorderError>
    where
        F: FnMut(&mut [i16]) + Send + 'static,
    {
        config.validate().map_err(RecorderError::ConfigurationFailed)?;

        let control = Arc::new(CaptureControl {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            noise_suppression: AtomicBool::new(false),
            live_noise_suppression: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let provider = Arc::clone(&self.provider);
        let thread_control = Arc::clone(&control);
        let timing = self.timing;

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let device = match provider.open(&config) {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let live = device.noise_suppression_enabled();
                thread_control.noise_suppression.store(live, Ordering::SeqCst);
                thread_control.live_noise_suppression.store(live, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(device.buffer_size()));

                run_capture_loop(device, &thread_control, timing, on_data, &on_error);
            })
            .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to spawn capture thread: {}", e)))?;

        let buffer_size = match ready_rx.recv() {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(RecorderError::DeviceUnavailable("capture thread exited during open".into()));
            }
        };

        log::info!(
            "Capture started: {} Hz, {} ch, buffer {} samples",
            config.sample_rate,
            config.channel_count,
            buffer_size
        );

        Ok(AudioSourceSession {
            control,
            clock: Arc::new(ElapsedClock::started()),
            buffer_size,
            handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }
}

/// Handle to one open capture device.
///
/// Dropping the handle closes it.
pub struct AudioSourceSession {
    control: Arc<CaptureControl>,
    clock: Arc<ElapsedClock>,
    buffer_size: usize,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    closed: AtomicBool,
}

impl AudioSourceSession {
    /// Stop the physical device and close the current active interval.
    pub fn pause(&self) {
        if self.control.paused.swap(true, Ordering::SeqCst) {
            return;
        }
        self.clock.pause();
        log::debug!("Capture paused at {} ms", self.clock.elapsed_millis());
    }

    /// Restart the device and open a new active interval.
    pub fn resume(&self) {
        if self.is_stopped() || !self.control.paused.swap(false, Ordering::SeqCst) {
            return;
        }
        self.clock.resume();
        log::debug!("Capture resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.control.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        !self.control.running.load(Ordering::SeqCst)
    }

    /// End the capture loop and wait for the device to be released.
    pub fn stop(&self) {
        self.control.running.store(false, Ordering::SeqCst);
        self.clock.pause();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }

    /// Release all capture resources. Safe to call any number of times.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop();
    }

    /// Request a noise-suppression change; applied by the capture thread.
    pub fn update_noise_suppressor(&self, enabled: bool) {
        self.control.noise_suppression.store(enabled, Ordering::SeqCst);
    }

    /// The setting the device last reported as applied.
    pub fn noise_suppression_enabled(&self) -> bool {
        self.control.live_noise_suppression.load(Ordering::SeqCst)
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.clock.elapsed_millis()
    }

    pub fn clock(&self) -> Arc<ElapsedClock> {
        Arc::clone(&self.clock)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Drop for AudioSourceSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_capture_loop<F>(
    mut device: Box<dyn CaptureDevice>,
    control: &CaptureControl,
    timing: CaptureTiming,
    mut on_data: F,
    on_error: &ErrorCallback,
) where
    F: FnMut(&mut [i16]),
{
    let mut buffer = SampleBuffer::with_capacity(device.buffer_size());
    let mut device_running = true;
    let mut applied_noise_suppression = device.noise_suppression_enabled();
    let mut faulted = false;

    while control.running.load(Ordering::SeqCst) {
        if control.paused.load(Ordering::SeqCst) {
            if device_running {
                if let Err(e) = device.pause() {
                    log::warn!("Failed to pause capture device: {}", e);
                }
                device_running = false;
            }
            thread::sleep(timing.pause_poll);
            continue;
        }

        if !device_running {
            if let Err(e) = device.resume() {
                if !faulted {
                    log::error!("Failed to resume capture device: {}", e);
                    on_error(e);
                    faulted = true;
                }
                thread::sleep(timing.fault_backoff);
                continue;
            }
            device_running = true;
        }

        let wanted = control.noise_suppression.load(Ordering::SeqCst);
        if wanted != applied_noise_suppression {
            match device.set_noise_suppression(wanted) {
                Ok(live) => control.live_noise_suppression.store(live, Ordering::SeqCst),
                Err(e) => log::warn!("Noise suppressor update failed: {}", e),
            }
            applied_noise_suppression = wanted;
        }

        match buffer.fill(|buf| device.read(buf)) {
            Ok(0) => thread::sleep(timing.read_retry),
            Ok(_) => {
                faulted = false;
                on_data(buffer.valid_mut());
            }
            Err(ReadError::Transient) => thread::sleep(timing.read_retry),
            Err(ReadError::Fatal(msg)) => {
                if !faulted {
                    log::error!("Capture device fault: {}", msg);
                    on_error(RecorderError::DeviceUnavailable(msg));
                    faulted = true;
                }
                thread::sleep(timing.fault_backoff);
            }
        }
    }

    if let Err(e) = device.release() {
        log::warn!("{}", RecorderError::ResourceReleaseFailure(e.to_string()));
    }
    log::debug!("Capture loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::SampleEncoding;
    use crate::test_support::{wait_until, ScriptedProvider};
    use std::sync::atomic::AtomicUsize;

    fn config() -> AudioSourceConfig {
        AudioSourceConfig {
            sample_rate: 16_000,
            channel_count: 1,
            sample_encoding: SampleEncoding::Pcm16,
            noise_suppression_enabled: false,
        }
    }

    fn timing() -> CaptureTiming {
        CaptureTiming {
            pause_poll: Duration::from_millis(2),
            read_retry: Duration::from_millis(1),
            fault_backoff: Duration::from_millis(5),
        }
    }

    fn source(provider: &ScriptedProvider) -> AudioSource {
        AudioSource::new(Arc::new(provider.clone()), timing())
    }

    fn no_errors() -> ErrorCallback {
        Arc::new(|e| panic!("unexpected capture error: {}", e))
    }

    #[test]
    fn delivers_buffers_to_callback() {
        let provider = ScriptedProvider::new(160);
        provider.push(vec![7; 160]);
        provider.push(vec![-3; 80]);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let session = source(&provider)
            .start(config(), move |samples| sink.lock().push(samples.to_vec()), no_errors())
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || received.lock().len() == 2));
        session.close();

        let received = received.lock();
        assert_eq!(received[0], vec![7; 160]);
        assert_eq!(received[1], vec![-3; 80]);
        assert_eq!(session.buffer_size(), 160);
    }

    #[test]
    fn open_failure_surfaces_before_session() {
        let provider = ScriptedProvider::new(160);
        provider.fail_open(RecorderError::DeviceUnavailable("no microphone".into()));

        let result = source(&provider).start(config(), |_| {}, no_errors());
        assert_eq!(
            result.err(),
            Some(RecorderError::DeviceUnavailable("no microphone".into()))
        );
        assert_eq!(provider.releases(), 0);
    }

    #[test]
    fn close_releases_device_exactly_once() {
        let provider = ScriptedProvider::new(160);
        let session = source(&provider).start(config(), |_| {}, no_errors()).unwrap();

        session.close();
        session.close();
        drop(session);

        assert_eq!(provider.releases(), 1);
    }

    #[test]
    fn pause_stops_the_physical_device() {
        let provider = ScriptedProvider::new(160);
        let session = source(&provider).start(config(), |_| {}, no_errors()).unwrap();

        session.pause();
        assert!(wait_until(Duration::from_secs(1), || !provider.device_active()));

        provider.push(vec![1; 160]);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(provider.reads(), 0);

        session.resume();
        assert!(wait_until(Duration::from_secs(1), || provider.reads() == 1));
        assert!(provider.device_active());
        session.close();
    }

    #[test]
    fn paused_elapsed_time_does_not_advance() {
        let provider = ScriptedProvider::new(160);
        let session = source(&provider).start(config(), |_| {}, no_errors()).unwrap();

        session.pause();
        let first = session.elapsed_millis();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(session.elapsed_millis(), first);

        session.resume();
        std::thread::sleep(Duration::from_millis(100));
        let advanced = session.elapsed_millis() - first;
        assert!(advanced >= 100, "advanced {} ms", advanced);
        session.close();
    }

    #[test]
    fn empty_reads_back_off_instead_of_spinning() {
        let provider = ScriptedProvider::new(160);
        for _ in 0..1000 {
            provider.push(Vec::new());
        }
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let timing = CaptureTiming {
            read_retry: Duration::from_millis(20),
            ..timing()
        };

        let session = AudioSource::new(Arc::new(provider.clone()), timing)
            .start(
                config(),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                no_errors(),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        session.close();

        assert!(provider.reads() > 0);
        assert!(provider.reads() < 20, "{} empty reads", provider.reads());
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fatal_error_is_reported_once_and_loop_survives() {
        let provider = ScriptedProvider::new(160);
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let on_error: ErrorCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let session = source(&provider).start(config(), |_| {}, on_error).unwrap();
        provider.fault("device unplugged");

        assert!(wait_until(Duration::from_secs(1), || errors.load(Ordering::SeqCst) == 1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(!session.is_stopped());

        session.close();
        assert!(session.is_stopped());
        assert_eq!(provider.releases(), 1);
    }

    #[test]
    fn noise_suppression_update_is_applied_by_capture_thread() {
        let provider = ScriptedProvider::new(160).with_noise_suppression();
        let session = source(&provider).start(config(), |_| {}, no_errors()).unwrap();
        assert!(!session.noise_suppression_enabled());

        session.update_noise_suppressor(true);
        assert!(wait_until(Duration::from_secs(1), || session.noise_suppression_enabled()));
        session.close();
    }
}
