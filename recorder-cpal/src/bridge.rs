//! Bridges a push-style device callback to the blocking `CaptureDevice::read`.
//!
//! ```text
//! device callback ─▶ PacketSink ══(bounded channel)══▶ PacketReader ─▶ capture loop
//! error callback  ─▶ PacketSink ══(fault channel)════▶ PacketReader
//! ```

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use recorder_core::ReadError;

/// Packets buffered between the device callback and the capture loop.
pub const PACKET_QUEUE_DEPTH: usize = 64;

/// Create a connected sink/reader pair.
pub fn packet_bridge(depth: usize) -> (PacketSink, PacketReader) {
    let (packet_tx, packet_rx) = crossbeam_channel::bounded(depth);
    let (fault_tx, fault_rx) = crossbeam_channel::unbounded();
    (
        PacketSink {
            packets: packet_tx,
            faults: fault_tx,
        },
        PacketReader {
            packets: packet_rx,
            faults: fault_rx,
            pending: Vec::new(),
            position: 0,
        },
    )
}

/// Callback side. Never blocks.
#[derive(Clone)]
pub struct PacketSink {
    packets: Sender<Vec<i16>>,
    faults: Sender<String>,
}

impl PacketSink {
    /// Queue a packet, dropping it if the reader has fallen behind.
    pub fn push(&self, packet: Vec<i16>) {
        if packet.is_empty() {
            return;
        }
        if let Err(TrySendError::Full(packet)) = self.packets.try_send(packet) {
            log::trace!("Capture queue full, dropped {} samples", packet.len());
        }
    }

    pub fn fault(&self, message: String) {
        let _ = self.faults.send(message);
    }
}

/// Capture-loop side.
pub struct PacketReader {
    packets: Receiver<Vec<i16>>,
    faults: Receiver<String>,
    pending: Vec<i16>,
    position: usize,
}

impl PacketReader {
    /// Copy up to `buf.len()` samples, waiting at most `timeout` for a packet.
    ///
    /// Packets larger than `buf` are handed out over several reads.
    pub fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, ReadError> {
        if let Ok(message) = self.faults.try_recv() {
            return Err(ReadError::Fatal(message));
        }

        if self.position >= self.pending.len() {
            match self.packets.recv_timeout(timeout) {
                Ok(packet) => {
                    self.pending = packet;
                    self.position = 0;
                }
                Err(RecvTimeoutError::Timeout) => return Err(ReadError::Transient),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReadError::Fatal("input stream closed".into()))
                }
            }
        }

        let remaining = &self.pending[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}
