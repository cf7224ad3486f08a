//! Turns captured sample buffers into a persisted file.
//!
//! The strategy is chosen once, at `start`:
//! ```text
//! registry has a codec for audio/L16 and it configures → Hardware (WAV container)
//! otherwise                                             → Fallback (RPCM header + raw PCM)
//! ```

pub mod fallback;
pub mod hardware;
pub mod queued_codec;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::models::recording_result::EncoderKind;
use crate::processing::pcm_header::samples_to_le_bytes;
use crate::traits::codec::{CodecFormat, CodecRegistry, TARGET_CODEC};

use self::fallback::PcmFileWriter;
use self::hardware::HardwareEncoder;

/// Encoder tuning taken from `RecorderConfig`.
#[derive(Debug, Clone, Copy)]
pub struct EncoderSettings {
    pub prefer_hardware: bool,
    pub input_timeout: Duration,
    pub drain_timeout: Duration,
}

impl From<&RecorderConfig> for EncoderSettings {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            prefer_hardware: config.prefer_hardware_encoder,
            input_timeout: config.codec_input_timeout,
            drain_timeout: config.finalize_drain_timeout,
        }
    }
}

enum Strategy {
    Hardware(HardwareEncoder),
    Fallback(PcmFileWriter),
}

impl Strategy {
    fn kind(&self) -> EncoderKind {
        match self {
            Self::Hardware(_) => EncoderKind::Hardware,
            Self::Fallback(_) => EncoderKind::Fallback,
        }
    }
}

/// Summary of a finalized encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedOutput {
    pub strategy: EncoderKind,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Audio bytes persisted after the container header.
    pub bytes_encoded: u64,
}

/// Encoder lifecycle: `start` → `encode`* → `finalize_encoding` → `close`.
pub struct Encoder {
    file_path: PathBuf,
    codecs: Arc<dyn CodecRegistry>,
    settings: EncoderSettings,
    strategy: Option<Strategy>,
    format: Option<CodecFormat>,
    scratch: Vec<u8>,
    finalized: Option<EncodedOutput>,
    closed: bool,
}

impl Encoder {
    pub fn new(file_path: PathBuf, codecs: Arc<dyn CodecRegistry>, settings: EncoderSettings) -> Self {
        Self {
            file_path,
            codecs,
            settings,
            strategy: None,
            format: None,
            scratch: Vec::new(),
            finalized: None,
            closed: false,
        }
    }

    /// Select a strategy and open the output file.
    ///
    /// A missing or unconfigurable hardware codec is never an error; only a
    /// failure to open the fallback output is.
    pub fn start(&mut self, sample_rate: u32, channel_count: u16) -> Result<EncoderKind, RecorderError> {
        if self.closed {
            return Err(RecorderError::SessionClosed);
        }
        if let Some(strategy) = &self.strategy {
            return Ok(strategy.kind());
        }

        let format = CodecFormat {
            sample_rate,
            channel_count,
        };

        let strategy = match self.start_hardware(format) {
            Some(hardware) => Strategy::Hardware(hardware),
            None => Strategy::Fallback(PcmFileWriter::create(&self.file_path, sample_rate, channel_count)?),
        };

        let kind = strategy.kind();
        log::info!("Encoder started ({}) for {}", kind, self.file_path.display());
        self.strategy = Some(strategy);
        self.format = Some(format);
        Ok(kind)
    }

    /// Encode one buffer of interleaved samples.
    pub fn encode(&mut self, samples: &[i16]) -> Result<(), RecorderError> {
        if self.closed || self.finalized.is_some() {
            return Err(RecorderError::SessionClosed);
        }
        let strategy = self
            .strategy
            .as_mut()
            .ok_or_else(|| RecorderError::EncodeFailure("encoder not started".into()))?;

        samples_to_le_bytes(samples, &mut self.scratch);
        match strategy {
            Strategy::Hardware(hardware) => hardware.encode(&self.scratch),
            Strategy::Fallback(writer) => writer.write(&self.scratch),
        }
    }

    /// Flush the active strategy's output. Repeated calls return the first result.
    pub fn finalize_encoding(&mut self) -> Result<EncodedOutput, RecorderError> {
        if let Some(output) = self.finalized {
            return Ok(output);
        }
        if self.closed {
            return Err(RecorderError::SessionClosed);
        }
        let (strategy, format) = match (self.strategy.as_mut(), self.format) {
            (Some(strategy), Some(format)) => (strategy, format),
            _ => return Err(RecorderError::EncodeFailure("encoder not started".into())),
        };

        let bytes_encoded = match strategy {
            Strategy::Hardware(hardware) => {
                hardware.finish()?;
                hardware.data_bytes()
            }
            Strategy::Fallback(writer) => {
                writer.finish()?;
                writer.data_bytes()
            }
        };

        let output = EncodedOutput {
            strategy: strategy.kind(),
            sample_rate: format.sample_rate,
            channel_count: format.channel_count,
            bytes_encoded,
        };
        self.finalized = Some(output);
        Ok(output)
    }

    /// Release the strategy's resources. Never fails; safe to call repeatedly.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.strategy.take() {
            Some(Strategy::Hardware(mut hardware)) => {
                if hardware.dropped_buffers() > 0 {
                    log::debug!("Closing hardware encoder after {} dropped buffers", hardware.dropped_buffers());
                }
                hardware.release();
            }
            Some(Strategy::Fallback(_)) | None => {}
        }
    }

    fn start_hardware(&self, format: CodecFormat) -> Option<HardwareEncoder> {
        if !self.settings.prefer_hardware {
            return None;
        }
        let Some(codec) = self.codecs.find_encoder(TARGET_CODEC) else {
            log::info!("No hardware encoder for {}, using fallback", TARGET_CODEC);
            return None;
        };
        match HardwareEncoder::start(
            &self.file_path,
            codec,
            format,
            self.settings.input_timeout,
            self.settings.drain_timeout,
        ) {
            Ok(hardware) => Some(hardware),
            Err(e) => {
                log::warn!("Hardware encoder failed to start, using fallback: {}", e);
                None
            }
        }
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::queued_codec::{BuiltinCodecs, NoHardwareCodecs};
    use crate::processing::pcm_header::{PcmHeader, PCM_HEADER_SIZE};
    use crate::processing::wav_format::WAV_HEADER_SIZE;
    use crate::test_support::{CodecFault, ScriptedCodecs};
    use std::fs;

    fn settings() -> EncoderSettings {
        EncoderSettings {
            prefer_hardware: true,
            input_timeout: Duration::from_millis(50),
            drain_timeout: Duration::from_secs(1),
        }
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn hardware_strategy_writes_wav_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hw.rec");
        let mut encoder = Encoder::new(path.clone(), Arc::new(BuiltinCodecs::default()), settings());

        assert_eq!(encoder.start(16_000, 1).unwrap(), EncoderKind::Hardware);
        encoder.encode(&[100; 160]).unwrap();
        encoder.encode(&[-100; 160]).unwrap();
        let output = encoder.finalize_encoding().unwrap();
        encoder.close();

        assert_eq!(output.strategy, EncoderKind::Hardware);
        assert_eq!(output.bytes_encoded, 640);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(bytes.len(), WAV_HEADER_SIZE + 640);
        assert_eq!(u32_at(&bytes, 40), 640);
        assert_eq!(u32_at(&bytes, 24), 16_000);
        assert_eq!(&bytes[WAV_HEADER_SIZE..WAV_HEADER_SIZE + 2], &100i16.to_le_bytes());
    }

    #[test]
    fn missing_codec_falls_back_to_raw_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fb.rec");
        let mut encoder = Encoder::new(path.clone(), Arc::new(NoHardwareCodecs), settings());

        assert_eq!(encoder.start(44_100, 1).unwrap(), EncoderKind::Fallback);
        encoder.encode(&[1, 2, 3]).unwrap();
        let output = encoder.finalize_encoding().unwrap();
        assert_eq!(output.bytes_encoded, 6);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(PcmHeader::parse(&bytes).unwrap().sample_rate, 44_100);
        assert_eq!(&bytes[PCM_HEADER_SIZE..], &[1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn unconfigurable_codec_falls_back_and_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let codecs = ScriptedCodecs::new(CodecFault::Configure);
        let mut encoder = Encoder::new(dir.path().join("x.rec"), Arc::new(codecs.clone()), settings());

        assert_eq!(encoder.start(16_000, 1).unwrap(), EncoderKind::Fallback);
        assert_eq!(codecs.releases(), 1);
    }

    #[test]
    fn hardware_preference_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = Encoder::new(
            dir.path().join("x.rec"),
            Arc::new(BuiltinCodecs::default()),
            EncoderSettings {
                prefer_hardware: false,
                ..settings()
            },
        );
        assert_eq!(encoder.start(16_000, 1).unwrap(), EncoderKind::Fallback);
    }

    #[test]
    fn full_input_queue_drops_buffer_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let codecs = ScriptedCodecs::new(CodecFault::QueueFull);
        let mut encoder = Encoder::new(dir.path().join("x.rec"), Arc::new(codecs), settings());

        assert_eq!(encoder.start(16_000, 1).unwrap(), EncoderKind::Hardware);
        assert!(encoder.encode(&[5; 160]).is_ok());
    }

    #[test]
    fn codec_that_never_drains_fails_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let codecs = ScriptedCodecs::new(CodecFault::QueueFull);
        let mut encoder = Encoder::new(
            dir.path().join("x.rec"),
            Arc::new(codecs),
            EncoderSettings {
                drain_timeout: Duration::from_millis(50),
                ..settings()
            },
        );

        assert_eq!(encoder.start(16_000, 1).unwrap(), EncoderKind::Hardware);
        encoder.encode(&[5; 160]).unwrap();
        match encoder.finalize_encoding() {
            Err(RecorderError::EncodeFailure(msg)) => assert!(msg.contains("did not drain"), "{}", msg),
            other => panic!("expected drain failure, got {:?}", other),
        }
    }

    #[test]
    fn codec_input_failure_is_an_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let codecs = ScriptedCodecs::new(CodecFault::Input);
        let mut encoder = Encoder::new(dir.path().join("x.rec"), Arc::new(codecs), settings());

        encoder.start(16_000, 1).unwrap();
        assert!(matches!(encoder.encode(&[5; 160]), Err(RecorderError::EncodeFailure(_))));
    }

    #[test]
    fn encode_before_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = Encoder::new(dir.path().join("x.rec"), Arc::new(NoHardwareCodecs), settings());
        assert!(encoder.encode(&[1]).is_err());
        assert!(encoder.finalize_encoding().is_err());
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_use() {
        let dir = tempfile::tempdir().unwrap();
        let codecs = ScriptedCodecs::new(CodecFault::QueueFull);
        let mut encoder = Encoder::new(dir.path().join("x.rec"), Arc::new(codecs.clone()), settings());
        encoder.start(16_000, 1).unwrap();

        encoder.close();
        encoder.close();
        drop(encoder);

        assert_eq!(codecs.releases(), 1);
    }

    #[test]
    fn finalize_twice_returns_same_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = Encoder::new(dir.path().join("x.rec"), Arc::new(NoHardwareCodecs), settings());
        encoder.start(8_000, 1).unwrap();
        encoder.encode(&[1; 10]).unwrap();

        let first = encoder.finalize_encoding().unwrap();
        let second = encoder.finalize_encoding().unwrap();
        assert_eq!(first, second);
        assert!(matches!(encoder.encode(&[1]), Err(RecorderError::SessionClosed)));
    }
}
