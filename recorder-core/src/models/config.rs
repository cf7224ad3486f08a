use std::path::PathBuf;
use std::time::Duration;

/// Sample encoding delivered by the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian PCM.
    Pcm16,
}

impl SampleEncoding {
    /// Tag written into the fallback file header.
    pub fn tag(self) -> u16 {
        match self {
            Self::Pcm16 => 1,
        }
    }
}

/// Capture parameters for one session. Immutable once the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSourceConfig {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub sample_encoding: SampleEncoding,
    pub noise_suppression_enabled: bool,
}

impl AudioSourceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channel_count) {
            return Err(format!("unsupported channel count: {}", self.channel_count));
        }
        Ok(())
    }
}

/// Configuration for the recorder as a whole.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory where in-progress and finished recordings are written.
    pub cache_dir: PathBuf,

    /// Capture sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Capture channel count (default: 1).
    pub channel_count: u16,

    /// How often the controller samples elapsed time and peak level.
    pub refresh_interval: Duration,

    /// Poll granularity of the capture loop while paused.
    pub pause_poll_interval: Duration,

    /// Delay before retrying after a transient read error.
    pub read_retry_delay: Duration,

    /// Loop period after a fatal device error, until the session is stopped.
    pub fault_backoff: Duration,

    /// Bounded wait for a hardware codec input slot before the buffer is dropped.
    pub codec_input_timeout: Duration,

    /// How long finalize waits for the hardware codec to flush its output.
    pub finalize_drain_timeout: Duration,

    /// Try a hardware codec before falling back to raw PCM (default: true).
    pub prefer_hardware_encoder: bool,

    /// Write a `.metadata.json` sidecar next to finished recordings (default: true).
    pub write_metadata: bool,
}

impl RecorderConfig {
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channel_count) {
            return Err(format!("unsupported channel count: {}", self.channel_count));
        }
        if self.refresh_interval.is_zero() {
            return Err("refresh interval must be positive".into());
        }
        if self.pause_poll_interval.is_zero() {
            return Err("pause poll interval must be positive".into());
        }
        Ok(())
    }

    pub fn source_config(&self, noise_suppression_enabled: bool) -> AudioSourceConfig {
        AudioSourceConfig {
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
            sample_encoding: SampleEncoding::Pcm16,
            noise_suppression_enabled,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("recordings"),
            sample_rate: 44_100,
            channel_count: 1,
            refresh_interval: Duration::from_millis(50),
            pause_poll_interval: Duration::from_millis(10),
            read_retry_delay: Duration::from_millis(5),
            fault_backoff: Duration::from_millis(100),
            codec_input_timeout: Duration::from_millis(10),
            finalize_drain_timeout: Duration::from_millis(500),
            prefer_hardware_encoder: true,
            write_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RecorderConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_channel_count() {
        let config = RecorderConfig {
            channel_count: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn source_config_carries_noise_suppression() {
        let config = RecorderConfig::default();
        let source = config.source_config(true);
        assert!(source.noise_suppression_enabled);
        assert_eq!(source.sample_rate, 44_100);
        assert_eq!(source.sample_encoding, SampleEncoding::Pcm16);
    }
}
