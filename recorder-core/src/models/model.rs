use std::path::PathBuf;

use serde::Serialize;

use super::state::RecorderState;
use crate::processing::gain::{clamp_gain, PEAK_FLOOR_DB};

/// Externally observable recorder model.
///
/// Written only by the controller, read by any number of observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub is_recording: bool,
    pub is_paused: bool,
    pub is_locked: bool,
    pub elapsed_ms: u64,
    pub peak_level_db: f32,
    pub temp_file_path: Option<PathBuf>,
    pub error: Option<String>,
    pub gain: f32,
    pub noise_suppression_enabled: bool,
}

impl Model {
    pub fn state(&self) -> RecorderState {
        match (self.is_recording, self.is_paused) {
            (false, _) => RecorderState::Idle,
            (true, false) => RecorderState::Recording,
            (true, true) => RecorderState::Paused,
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self {
            is_recording: false,
            is_paused: false,
            is_locked: false,
            elapsed_ms: 0,
            peak_level_db: PEAK_FLOOR_DB,
            temp_file_path: None,
            error: None,
            gain: 1.0,
            noise_suppression_enabled: false,
        }
    }
}

/// A request from the user interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Start,
    Pause,
    Resume,
    Cancel,
    Finish,
    ToggleLock,
    UpdateGain(f32),
    UpdateNoiseSuppress(bool),
}

impl Intent {
    /// Gain intents carry the clamped value the model will hold.
    pub fn normalized(self) -> Self {
        match self {
            Self::UpdateGain(value) => Self::UpdateGain(clamp_gain(value)),
            other => other,
        }
    }
}
