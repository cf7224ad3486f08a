use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use super::model_store::ModelStore;
use crate::capture::clock::ElapsedClock;
use crate::processing::gain::PeakCell;

/// Periodically copies elapsed time and peak level into the model.
///
/// Dropping the ticker stops it and waits for the thread, so no refresh can
/// land after the drop returns.
pub(crate) struct RefreshTicker {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RefreshTicker {
    pub(crate) fn spawn(
        interval: Duration,
        clock: Arc<ElapsedClock>,
        peak: Arc<PeakCell>,
        store: Arc<ModelStore>,
    ) -> Option<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let spawned = thread::Builder::new()
            .name("elapsed-refresh".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => store.update(|model| {
                        model.elapsed_ms = clock.elapsed_millis();
                        model.peak_level_db = peak.get();
                    }),
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => Some(Self {
                stop: Some(stop_tx),
                handle: Some(handle),
            }),
            Err(e) => {
                log::error!("Failed to spawn elapsed-time refresh: {}", e);
                None
            }
        }
    }
}

impl Drop for RefreshTicker {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wait_until;

    #[test]
    fn publishes_until_dropped() {
        let store = Arc::new(ModelStore::default());
        let clock = Arc::new(ElapsedClock::started());
        let peak = Arc::new(PeakCell::new());
        peak.set(-12.0);

        let ticker = RefreshTicker::spawn(Duration::from_millis(5), clock, peak, Arc::clone(&store)).unwrap();
        assert!(wait_until(Duration::from_secs(1), || store.snapshot().elapsed_ms >= 20));
        assert_eq!(store.snapshot().peak_level_db, -12.0);

        drop(ticker);
        let frozen = store.snapshot().elapsed_ms;
        thread::sleep(Duration::from_millis(30));
        assert_eq!(store.snapshot().elapsed_ms, frozen);
    }
}
