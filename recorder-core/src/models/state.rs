/// Recorder state derived from the observable model.
///
/// State transitions:
/// ```text
/// idle → recording ⇄ paused
///            ↓         ↓
///           idle (finish / cancel)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
}

impl RecorderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }
}
