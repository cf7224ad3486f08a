use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which encoder strategy produced a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// Codec output in a RIFF/WAVE container.
    Hardware,
    /// Self-describing header followed by raw little-endian PCM.
    Fallback,
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => f.write_str("hardware"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Result returned when a recording is finalized and kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_ms: u64,
    pub strategy: EncoderKind,
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata stored alongside a finished recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_ms: u64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub strategy: EncoderKind,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub bytes_encoded: u64,
}

impl RecordingMetadata {
    pub fn new(
        duration_ms: u64,
        file_path: &str,
        checksum: &str,
        strategy: EncoderKind,
        sample_rate: u32,
        channel_count: u16,
        bytes_encoded: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_ms,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            strategy,
            sample_rate,
            channel_count,
            bytes_encoded,
        }
    }
}
