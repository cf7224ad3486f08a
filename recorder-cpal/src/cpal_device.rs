//! cpal microphone capture.
//!
//! The stream is built inside `DeviceProvider::open`, which the capture loop
//! calls on its own thread, so the non-`Send` `cpal::Stream` never leaves it.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream};

use recorder_core::{AudioSourceConfig, CaptureDevice, DeviceProvider, ReadError, RecorderError};

use crate::bridge::{packet_bridge, PacketReader, PacketSink, PACKET_QUEUE_DEPTH};
use crate::convert::{f32_to_i16, remix};

/// How long a single `read` waits for the next device packet.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Opens cpal input streams for the default or a named input device.
pub struct CpalProvider {
    device_name: Option<String>,
    read_timeout: Duration,
}

impl CpalProvider {
    /// Capture from the host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Capture from the input device with this exact name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    fn find_device(&self) -> Result<cpal::Device, RecorderError> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| RecorderError::DeviceUnavailable(format!("no input device named '{}'", name))),
            None => host
                .default_input_device()
                .ok_or_else(|| RecorderError::DeviceUnavailable("no default input device".into())),
        }
    }
}

impl Default for CpalProvider {
    fn default() -> Self {
        Self::default_device()
    }
}

/// Pick a supported i16/f32 config at `sample_rate`, preferring `channels`.
fn find_input_config(device: &cpal::Device, sample_rate: u32, channels: u16) -> Option<cpal::SupportedStreamConfig> {
    let ranges: Vec<_> = device
        .supported_input_configs()
        .ok()?
        .filter(|r| r.min_sample_rate().0 <= sample_rate && sample_rate <= r.max_sample_rate().0)
        .filter(|r| matches!(r.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .collect();

    ranges
        .iter()
        .find(|r| r.channels() == channels)
        .or_else(|| ranges.first())
        .cloned()
        .map(|r| r.with_sample_rate(SampleRate(sample_rate)))
}

impl DeviceProvider for CpalProvider {
    fn open(&self, config: &AudioSourceConfig) -> Result<Box<dyn CaptureDevice>, RecorderError> {
        let device = self.find_device()?;
        let supported = find_input_config(&device, config.sample_rate, config.channel_count).ok_or_else(|| {
            RecorderError::ConfigurationFailed(format!(
                "input device does not support {} Hz PCM",
                config.sample_rate
            ))
        })?;

        let device_channels = supported.channels() as usize;
        let output_channels = config.channel_count as usize;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();

        let (sink, reader) = packet_bridge(PACKET_QUEUE_DEPTH);
        let stream = build_stream(&device, &stream_config, sample_format, sink, device_channels, output_channels)?;
        stream
            .play()
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;

        log::info!(
            "Opened input '{}' at {} Hz, {} ch ({:?}), delivering {} ch",
            device.name().unwrap_or_else(|_| "unknown".into()),
            config.sample_rate,
            device_channels,
            sample_format,
            output_channels
        );

        Ok(Box::new(CpalDevice {
            stream,
            reader,
            read_timeout: self.read_timeout,
            // 20 ms of interleaved samples.
            buffer_size: (config.sample_rate as usize / 50).max(1) * output_channels,
            released: false,
        }))
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: SampleFormat,
    sink: PacketSink,
    device_channels: usize,
    output_channels: usize,
) -> Result<Stream, RecorderError> {
    let err_sink = sink.clone();
    let err_fn = move |err: cpal::StreamError| {
        log::error!("Input stream error: {}", err);
        err_sink.fault(err.to_string());
    };

    let stream = match format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut packet = Vec::with_capacity(data.len() / device_channels * output_channels);
                remix(data, device_channels, output_channels, &mut packet);
                sink.push(packet);
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                let mut packet = Vec::with_capacity(converted.len() / device_channels * output_channels);
                remix(&converted, device_channels, output_channels, &mut packet);
                sink.push(packet);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(RecorderError::ConfigurationFailed(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => RecorderError::DeviceUnavailable(e.to_string()),
        other => RecorderError::ConfigurationFailed(other.to_string()),
    })
}

struct CpalDevice {
    stream: Stream,
    reader: PacketReader,
    read_timeout: Duration,
    buffer_size: usize,
    released: bool,
}

impl CaptureDevice for CpalDevice {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ReadError> {
        self.reader.read(buf, self.read_timeout)
    }

    fn pause(&mut self) -> Result<(), RecorderError> {
        self.stream
            .pause()
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))
    }

    fn resume(&mut self) -> Result<(), RecorderError> {
        self.stream
            .play()
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))
    }

    fn set_noise_suppression(&mut self, enabled: bool) -> Result<bool, RecorderError> {
        // cpal exposes no input effects.
        if enabled {
            log::debug!("Noise suppression unavailable on cpal inputs");
        }
        Ok(false)
    }

    fn noise_suppression_enabled(&self) -> bool {
        false
    }

    fn release(&mut self) -> Result<(), RecorderError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.stream
            .pause()
            .map_err(|e| RecorderError::ResourceReleaseFailure(e.to_string()))
    }
}
