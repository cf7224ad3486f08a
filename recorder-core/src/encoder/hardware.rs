use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::models::error::RecorderError;
use crate::processing::wav_format;
use crate::traits::codec::{CodecFormat, CodecOutput, HardwareCodec};

/// Drives a queue-based codec and muxes its output into a WAV container.
pub(crate) struct HardwareEncoder {
    codec: Box<dyn HardwareCodec>,
    out: BufWriter<File>,
    data_bytes: u64,
    dropped_buffers: u64,
    input_timeout: Duration,
    drain_timeout: Duration,
}

impl HardwareEncoder {
    /// Configure and start `codec`, then write a placeholder header to `path`.
    ///
    /// The codec is released if any step fails.
    pub(crate) fn start(
        path: &Path,
        mut codec: Box<dyn HardwareCodec>,
        format: CodecFormat,
        input_timeout: Duration,
        drain_timeout: Duration,
    ) -> Result<Self, RecorderError> {
        if let Err(e) = codec.configure(format).and_then(|_| codec.start()) {
            codec.release();
            return Err(e);
        }

        let file = match OpenOptions::new().write(true).create(true).truncate(true).open(path) {
            Ok(file) => file,
            Err(e) => {
                codec.release();
                return Err(RecorderError::storage_io("failed to open output file", e));
            }
        };

        let mut encoder = Self {
            codec,
            out: BufWriter::new(file),
            data_bytes: 0,
            dropped_buffers: 0,
            input_timeout,
            drain_timeout,
        };

        let header = wav_format::generate_wav_header(format.sample_rate, 16, format.channel_count, 0);
        if let Err(e) = encoder.out.write_all(&header) {
            encoder.release();
            return Err(RecorderError::encode_io(e));
        }
        log::info!("Hardware encoder started: {}", encoder.codec.name());
        Ok(encoder)
    }

    /// Submit one buffer and write whatever output is ready.
    ///
    /// A buffer the codec cannot accept within the input timeout is dropped.
    pub(crate) fn encode(&mut self, pcm: &[u8]) -> Result<(), RecorderError> {
        if !self.codec.queue_input(pcm, self.input_timeout)? {
            self.dropped_buffers += 1;
            log::trace!("Codec input queue full, dropped {} bytes", pcm.len());
        }
        self.drain(Duration::ZERO)?;
        Ok(())
    }

    /// Signal end-of-stream, drain the codec and patch the container sizes.
    ///
    /// A codec that has not reported end-of-stream by the drain deadline fails
    /// the encode; its output would be missing the tail of the recording.
    pub(crate) fn finish(&mut self) -> Result<(), RecorderError> {
        self.codec.signal_end_of_stream()?;

        let deadline = Instant::now() + self.drain_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::error!("Codec did not reach end of stream within {:?}", self.drain_timeout);
                return Err(RecorderError::EncodeFailure(format!(
                    "codec did not drain within {:?}",
                    self.drain_timeout
                )));
            }
            if self.drain(remaining)? {
                break;
            }
        }

        wav_format::patch_sizes(&mut self.out, self.data_bytes).map_err(RecorderError::encode_io)?;
        self.out.flush().map_err(RecorderError::encode_io)?;
        self.out.get_ref().sync_data().map_err(RecorderError::encode_io)?;

        if self.dropped_buffers > 0 {
            log::warn!("{} buffers dropped under codec back-pressure", self.dropped_buffers);
        }
        Ok(())
    }

    pub(crate) fn release(&mut self) {
        self.codec.release();
    }

    pub(crate) fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub(crate) fn dropped_buffers(&self) -> u64 {
        self.dropped_buffers
    }

    /// Write packets until the codec reports pending or end-of-stream.
    /// Returns true on end-of-stream.
    fn drain(&mut self, timeout: Duration) -> Result<bool, RecorderError> {
        loop {
            match self.codec.dequeue_output(timeout)? {
                CodecOutput::Packet(packet) => {
                    self.out.write_all(&packet).map_err(RecorderError::encode_io)?;
                    self.data_bytes += packet.len() as u64;
                }
                CodecOutput::Pending => return Ok(false),
                CodecOutput::EndOfStream => return Ok(true),
            }
        }
    }
}
