use std::time::Duration;

use crate::models::error::RecorderError;

/// MIME type the hardware strategy looks for.
pub const TARGET_CODEC: &str = "audio/L16";

/// Stream format handed to a codec at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecFormat {
    pub sample_rate: u32,
    pub channel_count: u16,
}

/// One poll of a codec's output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecOutput {
    /// Encoded bytes ready to be written.
    Packet(Vec<u8>),
    /// Nothing available yet.
    Pending,
    /// The codec has emitted everything after end-of-stream.
    EndOfStream,
}

/// A queue-driven codec, typically backed by platform hardware.
pub trait HardwareCodec: Send {
    fn name(&self) -> &str;

    fn configure(&mut self, format: CodecFormat) -> Result<(), RecorderError>;

    fn start(&mut self) -> Result<(), RecorderError>;

    /// Submit raw little-endian PCM. Returns `Ok(false)` if no input slot
    /// became free within `timeout`.
    fn queue_input(&mut self, pcm: &[u8], timeout: Duration) -> Result<bool, RecorderError>;

    /// Poll the output queue, waiting at most `timeout`.
    fn dequeue_output(&mut self, timeout: Duration) -> Result<CodecOutput, RecorderError>;

    fn signal_end_of_stream(&mut self) -> Result<(), RecorderError>;

    /// Release codec resources. Must tolerate being called more than once.
    fn release(&mut self);
}

/// Discovers codecs able to encode a given MIME type.
pub trait CodecRegistry: Send + Sync {
    fn find_encoder(&self, mime: &str) -> Option<Box<dyn HardwareCodec>>;
}
