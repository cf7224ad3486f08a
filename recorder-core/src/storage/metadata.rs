use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingMetadata;

/// Path of the JSON sidecar for a recording: `{recording}.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    let mut name = recording_path.as_os_str().to_owned();
    name.push(".metadata.json");
    PathBuf::from(name)
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecorderError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecorderError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| RecorderError::storage_io("failed to write metadata", e))?;
    Ok(())
}

/// Read recording metadata from its JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, RecorderError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| RecorderError::storage_io("failed to read metadata", e))?;
    serde_json::from_str(&json)
        .map_err(|e| RecorderError::StorageError(format!("failed to parse metadata: {}", e)))
}

/// Compute the SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, RecorderError> {
    let data = fs::read(path).map_err(|e| RecorderError::storage_io("failed to read file for checksum", e))?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recording_result::EncoderKind;

    #[test]
    fn sidecar_sits_next_to_recording() {
        let path = Path::new("/cache/recording_1.rec");
        assert_eq!(metadata_path(path), PathBuf::from("/cache/recording_1.rec.metadata.json"));
    }

    #[test]
    fn metadata_round_trips_through_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("take.rec");
        let metadata = RecordingMetadata::new(
            1_500,
            &recording.to_string_lossy(),
            "abc123",
            EncoderKind::Fallback,
            44_100,
            1,
            132_300,
        );

        write_metadata(&metadata, &recording).unwrap();
        let json = fs::read_to_string(metadata_path(&recording)).unwrap();
        assert!(json.contains("\"strategy\": \"fallback\""));
        assert_eq!(read_metadata(&recording).unwrap(), metadata);
    }

    #[test]
    fn checksum_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
