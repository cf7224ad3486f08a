use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::capture::clock::ElapsedClock;
use crate::capture::source::AudioSourceSession;
use crate::encoder::{EncodedOutput, Encoder};
use crate::models::error::RecorderError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::processing::gain::GainCell;
use crate::storage::metadata;
use crate::storage::temp_files::TempFileStore;

enum Termination {
    Active,
    Finalized(RecordingResult),
    Cancelled,
}

/// Exclusive owner of one capture session, its encoder and its output file.
///
/// `stop_and_finalize` and `cancel_and_delete` are mutually exclusive and
/// each takes effect at most once; later calls are no-ops. Dropping an
/// active session cancels it.
pub struct RecordingSession {
    file_path: PathBuf,
    capture: AudioSourceSession,
    encoder: Arc<Mutex<Encoder>>,
    gain: Arc<GainCell>,
    files: Arc<TempFileStore>,
    write_metadata: bool,
    termination: Mutex<Termination>,
    released: AtomicBool,
}

impl RecordingSession {
    pub(crate) fn new(
        file_path: PathBuf,
        capture: AudioSourceSession,
        encoder: Arc<Mutex<Encoder>>,
        gain: Arc<GainCell>,
        files: Arc<TempFileStore>,
        write_metadata: bool,
    ) -> Self {
        Self {
            file_path,
            capture,
            encoder,
            gain,
            files,
            write_metadata,
            termination: Mutex::new(Termination::Active),
            released: AtomicBool::new(false),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.termination.lock(), Termination::Active)
    }

    pub fn pause(&self) {
        self.capture.pause();
    }

    pub fn resume(&self) {
        self.capture.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.capture.is_paused()
    }

    /// Store the clamped gain; the capture loop picks it up on the next buffer.
    pub fn update_gain(&self, value: f32) -> f32 {
        self.gain.set(value)
    }

    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    pub fn update_noise_suppressor(&self, enabled: bool) {
        self.capture.update_noise_suppressor(enabled);
    }

    pub fn noise_suppression_enabled(&self) -> bool {
        self.capture.noise_suppression_enabled()
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.capture.elapsed_millis()
    }

    pub fn clock(&self) -> Arc<ElapsedClock> {
        self.capture.clock()
    }

    /// Stop capture, flush the encoder and keep the file.
    ///
    /// If finalizing fails the partial file is deleted and the error returned.
    pub fn stop_and_finalize(&self) -> Result<RecordingResult, RecorderError> {
        let mut termination = self.termination.lock();
        match &*termination {
            Termination::Finalized(result) => return Ok(result.clone()),
            Termination::Cancelled => return Err(RecorderError::SessionClosed),
            Termination::Active => {}
        }

        self.capture.stop();
        let duration_ms = self.capture.elapsed_millis();
        let encoded = self.encoder.lock().finalize_encoding();
        self.close();

        match encoded.and_then(|output| self.build_result(output, duration_ms)) {
            Ok(result) => {
                log::info!(
                    "Recording finalized: {} ({} ms, {})",
                    result.file_path.display(),
                    result.duration_ms,
                    result.strategy
                );
                *termination = Termination::Finalized(result.clone());
                Ok(result)
            }
            Err(e) => {
                log::error!("Failed to finalize recording: {}", e);
                self.files.discard(&self.file_path);
                *termination = Termination::Cancelled;
                Err(e)
            }
        }
    }

    /// Stop capture, release everything and delete the file.
    pub fn cancel_and_delete(&self) {
        let mut termination = self.termination.lock();
        if !matches!(*termination, Termination::Active) {
            return;
        }

        self.capture.stop();
        self.close();
        self.files.discard(&self.file_path);
        *termination = Termination::Cancelled;
        log::info!("Recording cancelled: {}", self.file_path.display());
    }

    /// Release the encoder, then the capture device. Runs once.
    pub fn close(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.encoder.lock().close();
        self.capture.close();
    }

    fn build_result(&self, output: EncodedOutput, duration_ms: u64) -> Result<RecordingResult, RecorderError> {
        let checksum = metadata::sha256_file(&self.file_path)?;
        let metadata = RecordingMetadata::new(
            duration_ms,
            &self.file_path.to_string_lossy(),
            &checksum,
            output.strategy,
            output.sample_rate,
            output.channel_count,
            output.bytes_encoded,
        );

        if self.write_metadata {
            if let Err(e) = metadata::write_metadata(&metadata, &self.file_path) {
                log::warn!("Recording kept without metadata sidecar: {}", e);
            }
        }

        Ok(RecordingResult {
            file_path: self.file_path.clone(),
            duration_ms,
            strategy: output.strategy,
            checksum,
            metadata,
        })
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.cancel_and_delete();
        self.close();
    }
}
