use std::sync::Arc;

use parking_lot::Mutex;

use super::recording::RecordingSession;
use crate::capture::source::{AudioSource, CaptureTiming};
use crate::encoder::queued_codec::BuiltinCodecs;
use crate::encoder::{Encoder, EncoderSettings};
use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::processing::gain::{apply_gain, GainCell};
use crate::storage::temp_files::TempFileStore;
use crate::traits::capture_device::{DeviceProvider, ErrorCallback, PeakCallback};
use crate::traits::codec::CodecRegistry;

/// Sets up one recording attempt at a time.
///
/// Data flow per captured buffer:
/// ```text
/// [DeviceProvider] → capture thread → gain → peak callback
///                                          └→ Encoder → temp file
/// ```
pub struct AudioGateway {
    config: RecorderConfig,
    source: AudioSource,
    codecs: Arc<dyn CodecRegistry>,
    files: Arc<TempFileStore>,
}

impl AudioGateway {
    pub fn new(config: RecorderConfig, provider: Arc<dyn DeviceProvider>) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::ConfigurationFailed)?;
        Ok(Self {
            source: AudioSource::new(provider, CaptureTiming::from(&config)),
            codecs: Arc::new(BuiltinCodecs::default()),
            files: Arc::new(TempFileStore::new(config.cache_dir.clone())),
            config,
        })
    }

    /// Replace the codec registry used to discover hardware encoders.
    pub fn with_codecs(mut self, codecs: Arc<dyn CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Allocate a temp file, start capture and encoding, and hand back the session.
    ///
    /// Nothing is left behind on failure: the encoder is closed and the temp
    /// file deleted before the error is returned.
    pub fn start_recording(
        &self,
        gain: f32,
        noise_suppression: bool,
        on_peak: PeakCallback,
        on_error: ErrorCallback,
    ) -> Result<RecordingSession, RecorderError> {
        self.files.sweep_leaked();

        let source_config = self.config.source_config(noise_suppression);
        let file_path = self.files.allocate()?;
        let encoder = Arc::new(Mutex::new(Encoder::new(
            file_path.clone(),
            Arc::clone(&self.codecs),
            EncoderSettings::from(&self.config),
        )));
        let gain = Arc::new(GainCell::new(gain));

        let sink = {
            let encoder = Arc::clone(&encoder);
            let gain = Arc::clone(&gain);
            let on_error = Arc::clone(&on_error);
            move |samples: &mut [i16]| {
                on_peak(apply_gain(samples, gain.get()));
                match encoder.lock().encode(samples) {
                    Ok(()) | Err(RecorderError::SessionClosed) => {}
                    Err(e) => on_error(e),
                }
            }
        };

        // Captured buffers wait on this lock until the encoder has started.
        let mut pending_encoder = encoder.lock();

        let capture = match self.source.start(source_config, sink, on_error) {
            Ok(capture) => capture,
            Err(e) => {
                pending_encoder.close();
                drop(pending_encoder);
                self.files.discard(&file_path);
                log::warn!("Recording not started: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = pending_encoder.start(source_config.sample_rate, source_config.channel_count) {
            pending_encoder.close();
            drop(pending_encoder);
            capture.close();
            self.files.discard(&file_path);
            log::warn!("Recording not started, encoder failed: {}", e);
            return Err(e);
        }
        drop(pending_encoder);

        let session = RecordingSession::new(
            file_path,
            capture,
            encoder,
            gain,
            Arc::clone(&self.files),
            self.config.write_metadata,
        );

        if session.noise_suppression_enabled() != noise_suppression {
            session.update_noise_suppressor(noise_suppression);
        }

        log::info!("Recording started: {}", session.file_path().display());
        Ok(session)
    }
}
