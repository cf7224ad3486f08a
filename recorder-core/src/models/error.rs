use thiserror::Error;

/// Errors that can occur while recording.
///
/// The `Display` text is what the controller surfaces in `Model::error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("encoding failed: {0}")]
    EncodeFailure(String),

    #[error("failed to release resource: {0}")]
    ResourceReleaseFailure(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("recording session already closed")]
    SessionClosed,
}

impl RecorderError {
    /// Wraps an I/O failure from the encoded output stream.
    pub(crate) fn encode_io(e: std::io::Error) -> Self {
        Self::EncodeFailure(e.to_string())
    }

    pub(crate) fn storage_io(context: &str, e: std::io::Error) -> Self {
        Self::StorageError(format!("{}: {}", context, e))
    }
}
