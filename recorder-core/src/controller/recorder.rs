use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::model_store::ModelStore;
use super::ticker::RefreshTicker;
use crate::models::error::RecorderError;
use crate::models::model::{Intent, Model};
use crate::models::recording_result::RecordingResult;
use crate::models::state::RecorderState;
use crate::processing::gain::{PeakCell, PEAK_FLOOR_DB};
use crate::session::gateway::AudioGateway;
use crate::session::recording::RecordingSession;
use crate::traits::capture_device::{ErrorCallback, PeakCallback};
use crate::traits::model_observer::ModelObserver;
use crate::traits::permission::{PermissionEvent, PermissionOracle};

/// Error text published when the microphone permission disappears mid-recording.
pub const PERMISSION_REVOKED_MESSAGE: &str = "Microphone permission revoked";

/// Turns user intents into recording sessions and keeps the model current.
///
/// ```text
///            Start                 Pause
///   Idle ───────────▶ Recording ◀───────▶ Paused
///    ▲                   │        Resume     │
///    └──── Finish/Cancel/revoke/fault ───────┘
/// ```
///
/// Intents are processed one at a time. Permission revocations and session
/// faults arrive on the `recorder-events` thread and are handled like a
/// `Cancel`, after the model's error has been set.
///
/// Observers are called while intent processing holds its lock; they must
/// not dispatch intents synchronously.
pub struct RecordingController {
    shared: Arc<Shared>,
    shutdown: Option<Sender<()>>,
    events: Option<thread::JoinHandle<()>>,
}

struct Shared {
    gateway: AudioGateway,
    permissions: Arc<dyn PermissionOracle>,
    refresh_interval: Duration,
    state: Mutex<ControllerState>,
    store: Arc<ModelStore>,
    faults: Sender<SessionFault>,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveRecording>,
    ticker: Option<RefreshTicker>,
    generation: u64,
    last_result: Option<RecordingResult>,
}

struct ActiveRecording {
    session: RecordingSession,
    peak: Arc<PeakCell>,
    generation: u64,
}

/// An error raised by the session started in `generation`.
struct SessionFault {
    generation: u64,
    error: RecorderError,
}

impl RecordingController {
    pub fn new(gateway: AudioGateway, permissions: Arc<dyn PermissionOracle>) -> Result<Self, RecorderError> {
        let (fault_tx, fault_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let permission_rx = permissions.subscribe();

        let shared = Arc::new(Shared {
            refresh_interval: gateway.config().refresh_interval,
            gateway,
            permissions,
            state: Mutex::new(ControllerState::default()),
            store: Arc::new(ModelStore::default()),
            faults: fault_tx,
        });

        let events = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("recorder-events".into())
                .spawn(move || run_event_loop(&shared, permission_rx, fault_rx, shutdown_rx))
                .map_err(|e| RecorderError::ConfigurationFailed(format!("event thread: {}", e)))?
        };

        Ok(Self {
            shared,
            shutdown: Some(shutdown_tx),
            events: Some(events),
        })
    }

    /// Register the observer notified after every model change.
    pub fn set_observer(&self, observer: Arc<dyn ModelObserver>) {
        self.shared.store.set_observer(observer);
    }

    pub fn model(&self) -> Model {
        self.shared.store.snapshot()
    }

    pub fn state(&self) -> RecorderState {
        self.model().state()
    }

    /// Result of the most recent successful `Finish`.
    pub fn last_recording(&self) -> Option<RecordingResult> {
        self.shared.state.lock().last_result.clone()
    }

    pub fn gateway(&self) -> &AudioGateway {
        &self.shared.gateway
    }

    pub fn dispatch(&self, intent: Intent) {
        self.shared.handle(intent.normalized());
    }

    pub fn start(&self) {
        self.dispatch(Intent::Start);
    }

    pub fn pause(&self) {
        self.dispatch(Intent::Pause);
    }

    pub fn resume(&self) {
        self.dispatch(Intent::Resume);
    }

    pub fn finish(&self) {
        self.dispatch(Intent::Finish);
    }

    pub fn cancel(&self) {
        self.dispatch(Intent::Cancel);
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(handle) = self.events.take() {
            let _ = handle.join();
        }
        // An unfinished recording is discarded with the controller.
        self.shared.handle(Intent::Cancel);
    }
}

fn run_event_loop(
    shared: &Shared,
    permission_rx: Receiver<PermissionEvent>,
    fault_rx: Receiver<SessionFault>,
    shutdown_rx: Receiver<()>,
) {
    log::debug!("Recorder event loop started");
    let mut permission_rx = Some(permission_rx);
    loop {
        let permissions = permission_rx.clone().unwrap_or_else(crossbeam_channel::never);
        crossbeam_channel::select! {
            recv(permissions) -> event => match event {
                Ok(PermissionEvent::Revoked) => shared.on_permission_revoked(),
                Ok(PermissionEvent::Granted) => log::debug!("Microphone permission granted"),
                Err(_) => {
                    log::debug!("Permission events closed");
                    permission_rx = None;
                }
            },
            recv(fault_rx) -> fault => match fault {
                Ok(fault) => shared.on_fault(fault),
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }
    log::debug!("Recorder event loop stopped");
}

impl Shared {
    fn handle(&self, intent: Intent) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        log::debug!("Intent: {:?}", intent);

        match intent {
            Intent::Start => self.start(state),
            Intent::Pause => self.pause(state),
            Intent::Resume => self.resume(state),
            Intent::Finish => self.finish(state),
            Intent::Cancel => self.cancel(state),
            Intent::ToggleLock => self.store.update(|model| model.is_locked = !model.is_locked),
            Intent::UpdateGain(gain) => {
                self.store.update(|model| model.gain = gain);
                if let Some(active) = &state.active {
                    active.session.update_gain(gain);
                }
            }
            Intent::UpdateNoiseSuppress(enabled) => {
                self.store.update(|model| model.noise_suppression_enabled = enabled);
                if let Some(active) = &state.active {
                    active.session.update_noise_suppressor(enabled);
                }
            }
        }
    }

    fn start(&self, state: &mut ControllerState) {
        if state.active.is_some() {
            log::debug!("Start ignored, already recording");
            return;
        }
        if !self.permissions.has_permission() {
            log::warn!("Start refused: {}", RecorderError::PermissionDenied);
            self.store
                .update(|model| model.error = Some(RecorderError::PermissionDenied.to_string()));
            return;
        }

        let requested = self.store.snapshot();
        state.generation += 1;
        let generation = state.generation;

        let peak = Arc::new(PeakCell::new());
        let on_peak: PeakCallback = {
            let peak = Arc::clone(&peak);
            Arc::new(move |db| peak.set(db))
        };
        let on_error: ErrorCallback = {
            let faults = self.faults.clone();
            Arc::new(move |error| {
                let _ = faults.send(SessionFault { generation, error });
            })
        };

        let session = match self.gateway.start_recording(
            requested.gain,
            requested.noise_suppression_enabled,
            on_peak,
            on_error,
        ) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Failed to start recording: {}", e);
                self.store.update(|model| {
                    model.is_recording = false;
                    model.is_paused = false;
                    model.error = Some(e.to_string());
                });
                return;
            }
        };

        let path = session.file_path().to_path_buf();
        let clock = session.clock();
        state.active = Some(ActiveRecording {
            session,
            peak: Arc::clone(&peak),
            generation,
        });
        self.store.update(|model| {
            model.is_recording = true;
            model.is_paused = false;
            model.elapsed_ms = 0;
            model.peak_level_db = PEAK_FLOOR_DB;
            model.temp_file_path = Some(path);
            model.error = None;
        });
        state.ticker = RefreshTicker::spawn(self.refresh_interval, clock, peak, Arc::clone(&self.store));
    }

    fn pause(&self, state: &mut ControllerState) {
        let Some(active) = state.active.as_ref() else {
            return;
        };
        if active.session.is_paused() {
            return;
        }
        active.session.pause();
        state.ticker = None;

        let elapsed = active.session.elapsed_millis();
        self.store.update(|model| {
            model.is_paused = true;
            model.elapsed_ms = elapsed;
        });
    }

    fn resume(&self, state: &mut ControllerState) {
        let Some(active) = state.active.as_ref() else {
            return;
        };
        if !active.session.is_paused() {
            return;
        }
        active.session.resume();
        self.store.update(|model| model.is_paused = false);
        state.ticker = RefreshTicker::spawn(
            self.refresh_interval,
            active.session.clock(),
            Arc::clone(&active.peak),
            Arc::clone(&self.store),
        );
    }

    fn finish(&self, state: &mut ControllerState) {
        let Some(active) = state.active.take() else {
            return;
        };
        state.ticker = None;

        match active.session.stop_and_finalize() {
            Ok(result) => {
                log::info!(
                    "Recording finished: {} ({} ms)",
                    result.file_path.display(),
                    result.duration_ms
                );
                self.store.update(|model| {
                    model.is_recording = false;
                    model.is_paused = false;
                    model.elapsed_ms = result.duration_ms;
                    model.temp_file_path = Some(result.file_path.clone());
                });
                state.last_result = Some(result);
            }
            Err(e) => {
                log::error!("Failed to finish recording: {}", e);
                self.store.update(|model| {
                    model.is_recording = false;
                    model.is_paused = false;
                    model.elapsed_ms = 0;
                    model.temp_file_path = None;
                    model.error = Some(e.to_string());
                });
            }
        }
    }

    fn cancel(&self, state: &mut ControllerState) {
        let Some(active) = state.active.take() else {
            return;
        };
        state.ticker = None;
        active.session.cancel_and_delete();

        self.store.update(|model| {
            model.is_recording = false;
            model.is_paused = false;
            model.elapsed_ms = 0;
            model.peak_level_db = PEAK_FLOOR_DB;
            model.temp_file_path = None;
        });
    }

    fn on_permission_revoked(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.active.is_none() {
            return;
        }
        log::warn!("Microphone permission revoked, discarding recording");
        self.store
            .update(|model| model.error = Some(PERMISSION_REVOKED_MESSAGE.to_string()));
        self.cancel(state);
    }

    fn on_fault(&self, fault: SessionFault) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match &state.active {
            Some(active) if active.generation == fault.generation => {}
            _ => {
                log::debug!("Ignoring fault from an ended session: {}", fault.error);
                return;
            }
        }
        log::error!("Recording failed: {}", fault.error);
        self.store.update(|model| model.error = Some(fault.error.to_string()));
        self.cancel(state);
    }
}
