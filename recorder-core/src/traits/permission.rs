use crossbeam_channel::Receiver;

/// Change in microphone permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionEvent {
    Granted,
    Revoked,
}

/// Answers whether capture is permitted and reports changes asynchronously.
pub trait PermissionOracle: Send + Sync {
    fn has_permission(&self) -> bool;

    /// A fresh stream of permission changes.
    fn subscribe(&self) -> Receiver<PermissionEvent>;
}
