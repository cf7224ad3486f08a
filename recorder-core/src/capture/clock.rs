use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct ClockState {
    accumulated: Duration,
    active_since: Option<Instant>,
}

/// Wall-clock time spent in active (unpaused) intervals.
///
/// Starts running at creation. Elapsed time is the sum of completed
/// intervals plus the current one, if any.
pub struct ElapsedClock {
    state: Mutex<ClockState>,
}

impl ElapsedClock {
    pub fn started() -> Self {
        Self {
            state: Mutex::new(ClockState {
                accumulated: Duration::ZERO,
                active_since: Some(Instant::now()),
            }),
        }
    }

    /// Close the current interval. No-op when already stopped.
    pub fn pause(&self) {
        let mut s = self.state.lock();
        if let Some(since) = s.active_since.take() {
            s.accumulated += since.elapsed();
        }
    }

    /// Open a new interval. No-op when already running.
    pub fn resume(&self) {
        let mut s = self.state.lock();
        if s.active_since.is_none() {
            s.active_since = Some(Instant::now());
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().active_since.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        let s = self.state.lock();
        match s.active_since {
            Some(since) => s.accumulated + since.elapsed(),
            None => s.accumulated,
        }
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}
