use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::config::SampleEncoding;
use crate::models::error::RecorderError;
use crate::processing::pcm_header::{PcmHeader, PCM_HEADER_SIZE};

/// Streaming writer for the fallback format.
///
/// ## File Format
/// ```text
/// [20-byte RPCM header]
/// [raw 16-bit little-endian PCM...]
/// ```
pub(crate) struct PcmFileWriter {
    out: BufWriter<File>,
    total_bytes_written: u64,
}

impl PcmFileWriter {
    /// Truncate `path` and write the header.
    pub(crate) fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, RecorderError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| RecorderError::storage_io("failed to open output file", e))?;

        let mut writer = Self {
            out: BufWriter::new(file),
            total_bytes_written: 0,
        };

        let header = PcmHeader {
            sample_rate,
            channels,
            encoding_tag: SampleEncoding::Pcm16.tag(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        writer.write_raw(&header.to_bytes())?;
        Ok(writer)
    }

    pub(crate) fn write(&mut self, pcm: &[u8]) -> Result<(), RecorderError> {
        self.write_raw(pcm)
    }

    /// Flush buffered bytes and sync them to disk.
    pub(crate) fn finish(&mut self) -> Result<(), RecorderError> {
        self.out.flush().map_err(RecorderError::encode_io)?;
        self.out.get_ref().sync_data().map_err(RecorderError::encode_io)?;
        Ok(())
    }

    /// PCM bytes written after the header.
    pub(crate) fn data_bytes(&self) -> u64 {
        self.total_bytes_written.saturating_sub(PCM_HEADER_SIZE as u64)
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), RecorderError> {
        self.out.write_all(data).map_err(RecorderError::encode_io)?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}
