//! # recorder-core
//!
//! Platform-agnostic voice recorder core library.
//!
//! Captures microphone PCM on a dedicated thread, applies gain, encodes to a
//! temp file (hardware codec or raw PCM fallback) and drives it all from a
//! small intent-based state machine. Platform backends implement the
//! `DeviceProvider` and `PermissionOracle` traits and plug into `AudioGateway`.
//!
//! ## Architecture
//!
//! ```text
//! recorder-core (this crate)
//! ├── traits/       ← DeviceProvider, CaptureDevice, CodecRegistry, PermissionOracle, ModelObserver
//! ├── models/       ← RecorderError, RecorderConfig, Model, Intent, RecordingResult
//! ├── processing/   ← gain and peak, SampleBuffer, WAV and RPCM headers
//! ├── capture/      ← AudioSource capture loop, ElapsedClock
//! ├── encoder/      ← Encoder strategies, QueuedPcmCodec
//! ├── session/      ← AudioGateway, RecordingSession
//! ├── controller/   ← RecordingController state machine
//! ├── storage/      ← TempFileStore, metadata sidecar
//! └── permissions   ← ManualPermission, PolledPermission
//! ```

pub mod capture;
pub mod controller;
pub mod encoder;
pub mod models;
pub mod permissions;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use capture::clock::ElapsedClock;
pub use capture::source::{AudioSource, AudioSourceSession, CaptureTiming};
pub use controller::recorder::{RecordingController, PERMISSION_REVOKED_MESSAGE};
pub use encoder::queued_codec::{BuiltinCodecs, NoHardwareCodecs, QueuedPcmCodec};
pub use encoder::{EncodedOutput, Encoder, EncoderSettings};
pub use models::config::{AudioSourceConfig, RecorderConfig, SampleEncoding};
pub use models::error::RecorderError;
pub use models::model::{Intent, Model};
pub use models::recording_result::{EncoderKind, RecordingMetadata, RecordingResult};
pub use models::state::RecorderState;
pub use permissions::{ManualPermission, PermissionProbe, PolledPermission};
pub use session::gateway::AudioGateway;
pub use session::recording::RecordingSession;
pub use storage::temp_files::TempFileStore;
pub use traits::capture_device::{CaptureDevice, DeviceProvider, ErrorCallback, PeakCallback, ReadError};
pub use traits::codec::{CodecFormat, CodecOutput, CodecRegistry, HardwareCodec, TARGET_CODEC};
pub use traits::model_observer::ModelObserver;
pub use traits::permission::{PermissionEvent, PermissionOracle};
