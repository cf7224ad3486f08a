//! Permission oracles: one driven by the host, one polling a probe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::traits::permission::{PermissionEvent, PermissionOracle};

#[derive(Default)]
struct Subscribers(Mutex<Vec<Sender<PermissionEvent>>>);

impl Subscribers {
    fn add(&self) -> Receiver<PermissionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.0.lock().push(tx);
        rx
    }

    fn publish(&self, event: PermissionEvent) {
        self.0.lock().retain(|tx| tx.send(event).is_ok());
    }
}

fn event_for(granted: bool) -> PermissionEvent {
    if granted {
        PermissionEvent::Granted
    } else {
        PermissionEvent::Revoked
    }
}

/// Permission state pushed in by the host application, e.g. from an OS
/// settings callback.
pub struct ManualPermission {
    granted: AtomicBool,
    subscribers: Subscribers,
}

impl ManualPermission {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            subscribers: Subscribers::default(),
        }
    }

    /// Update the state, notifying subscribers if it changed.
    pub fn set_granted(&self, granted: bool) {
        if self.granted.swap(granted, Ordering::SeqCst) != granted {
            log::info!("Microphone permission {:?}", event_for(granted));
            self.subscribers.publish(event_for(granted));
        }
    }

    pub fn grant(&self) {
        self.set_granted(true);
    }

    pub fn revoke(&self) {
        self.set_granted(false);
    }
}

impl PermissionOracle for ManualPermission {
    fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Receiver<PermissionEvent> {
        self.subscribers.add()
    }
}

/// Function answering "may we capture right now?".
pub type PermissionProbe = Arc<dyn Fn() -> bool + Send + Sync + 'static>;

struct Poller {
    stop: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Permission derived from a probe, re-checked on a background thread
/// while anyone is subscribed.
pub struct PolledPermission {
    probe: PermissionProbe,
    interval: Duration,
    last: Arc<AtomicBool>,
    subscribers: Arc<Subscribers>,
    poller: Mutex<Option<Poller>>,
}

impl PolledPermission {
    pub fn new(probe: PermissionProbe, interval: Duration) -> Self {
        let initial = probe();
        Self {
            probe,
            interval,
            last: Arc::new(AtomicBool::new(initial)),
            subscribers: Arc::new(Subscribers::default()),
            poller: Mutex::new(None),
        }
    }

    fn ensure_polling(&self) {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let probe = Arc::clone(&self.probe);
        let last = Arc::clone(&self.last);
        let subscribers = Arc::clone(&self.subscribers);
        let interval = self.interval;

        let spawned = thread::Builder::new()
            .name("permission-poll".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let granted = probe();
                        if last.swap(granted, Ordering::SeqCst) != granted {
                            subscribers.publish(event_for(granted));
                        }
                    }
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => *poller = Some(Poller { stop: stop_tx, handle }),
            Err(e) => log::error!("Failed to spawn permission poller: {}", e),
        }
    }
}

impl PermissionOracle for PolledPermission {
    fn has_permission(&self) -> bool {
        (self.probe)()
    }

    fn subscribe(&self) -> Receiver<PermissionEvent> {
        let rx = self.subscribers.add();
        self.ensure_polling();
        rx
    }
}

impl Drop for PolledPermission {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.lock().take() {
            drop(poller.stop);
            let _ = poller.handle.join();
        }
    }
}
