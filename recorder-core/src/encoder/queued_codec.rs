//! Built-in asynchronous L16 codec and codec registries.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};

use crate::models::error::RecorderError;
use crate::traits::codec::{CodecFormat, CodecOutput, CodecRegistry, HardwareCodec, TARGET_CODEC};

/// Input slots the built-in codec accepts before submissions time out.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Output packet length in milliseconds of audio.
const PACKET_MS: u32 = 20;

enum CodecInput {
    Data(Vec<u8>),
    EndOfStream,
}

/// L16 codec with a bounded input queue drained by its own worker thread.
///
/// The worker repacketizes input into fixed 20 ms packets, flushing the
/// remainder at end-of-stream.
pub struct QueuedPcmCodec {
    queue_depth: usize,
    format: Option<CodecFormat>,
    input: Option<Sender<CodecInput>>,
    output: Option<Receiver<CodecOutput>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl QueuedPcmCodec {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth: queue_depth.max(1),
            format: None,
            input: None,
            output: None,
            worker: None,
        }
    }

    fn worker_stopped() -> RecorderError {
        RecorderError::EncodeFailure("codec worker stopped".into())
    }
}

impl HardwareCodec for QueuedPcmCodec {
    fn name(&self) -> &str {
        "queued-l16"
    }

    fn configure(&mut self, format: CodecFormat) -> Result<(), RecorderError> {
        if format.sample_rate == 0 || ![1, 2].contains(&format.channel_count) {
            return Err(RecorderError::ConfigurationFailed(format!(
                "unsupported codec format: {} Hz, {} ch",
                format.sample_rate, format.channel_count
            )));
        }
        self.format = Some(format);
        Ok(())
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        let format = self
            .format
            .ok_or_else(|| RecorderError::ConfigurationFailed("codec not configured".into()))?;
        if self.worker.is_some() {
            return Ok(());
        }

        let packet_bytes = (format.sample_rate * PACKET_MS / 1000) as usize * format.channel_count as usize * 2;
        let (input_tx, input_rx) = crossbeam_channel::bounded::<CodecInput>(self.queue_depth);
        let (output_tx, output_rx) = crossbeam_channel::unbounded();

        let worker = thread::Builder::new()
            .name("codec-worker".into())
            .spawn(move || {
                let mut pending: Vec<u8> = Vec::with_capacity(packet_bytes * 2);
                for input in input_rx {
                    match input {
                        CodecInput::Data(data) => {
                            pending.extend_from_slice(&data);
                            while pending.len() >= packet_bytes {
                                let packet: Vec<u8> = pending.drain(..packet_bytes).collect();
                                if output_tx.send(CodecOutput::Packet(packet)).is_err() {
                                    return;
                                }
                            }
                        }
                        CodecInput::EndOfStream => {
                            if !pending.is_empty() {
                                let _ = output_tx.send(CodecOutput::Packet(std::mem::take(&mut pending)));
                            }
                            let _ = output_tx.send(CodecOutput::EndOfStream);
                            return;
                        }
                    }
                }
            })
            .map_err(|e| RecorderError::ConfigurationFailed(format!("failed to spawn codec worker: {}", e)))?;

        self.input = Some(input_tx);
        self.output = Some(output_rx);
        self.worker = Some(worker);
        Ok(())
    }

    fn queue_input(&mut self, pcm: &[u8], timeout: Duration) -> Result<bool, RecorderError> {
        let input = self.input.as_ref().ok_or_else(Self::worker_stopped)?;
        match input.send_timeout(CodecInput::Data(pcm.to_vec()), timeout) {
            Ok(()) => Ok(true),
            Err(SendTimeoutError::Timeout(_)) => Ok(false),
            Err(SendTimeoutError::Disconnected(_)) => Err(Self::worker_stopped()),
        }
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<CodecOutput, RecorderError> {
        let output = self.output.as_ref().ok_or_else(Self::worker_stopped)?;
        if timeout.is_zero() {
            return match output.try_recv() {
                Ok(out) => Ok(out),
                Err(TryRecvError::Empty) => Ok(CodecOutput::Pending),
                Err(TryRecvError::Disconnected) => Ok(CodecOutput::EndOfStream),
            };
        }
        match output.recv_timeout(timeout) {
            Ok(out) => Ok(out),
            Err(RecvTimeoutError::Timeout) => Ok(CodecOutput::Pending),
            Err(RecvTimeoutError::Disconnected) => Ok(CodecOutput::EndOfStream),
        }
    }

    fn signal_end_of_stream(&mut self) -> Result<(), RecorderError> {
        let input = self.input.as_ref().ok_or_else(Self::worker_stopped)?;
        input.send(CodecInput::EndOfStream).map_err(|_| Self::worker_stopped())
    }

    fn release(&mut self) {
        self.input = None;
        self.output = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Codec worker panicked");
            }
        }
    }
}

impl Drop for QueuedPcmCodec {
    fn drop(&mut self) {
        self.release();
    }
}

/// Registry offering the built-in `QueuedPcmCodec` for `audio/L16`.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinCodecs {
    pub queue_depth: usize,
}

impl Default for BuiltinCodecs {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl CodecRegistry for BuiltinCodecs {
    fn find_encoder(&self, mime: &str) -> Option<Box<dyn HardwareCodec>> {
        (mime == TARGET_CODEC).then(|| Box::new(QueuedPcmCodec::new(self.queue_depth)) as Box<dyn HardwareCodec>)
    }
}

/// Registry with no codecs; every encoder uses the fallback strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHardwareCodecs;

impl CodecRegistry for NoHardwareCodecs {
    fn find_encoder(&self, _mime: &str) -> Option<Box<dyn HardwareCodec>> {
        None
    }
}
