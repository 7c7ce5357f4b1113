//! Capture source: an open input device feeding a bounded sample ring

use super::{AudioFrame, CaptureConfig};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig, SupportedStreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Audio capture errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Invalid capture configuration: {0}")]
    InvalidConfig(String),

    #[error("No input device available")]
    DeviceUnavailable,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Failed to build audio stream: {0}")]
    Stream(String),

    #[error("Failed to start stream: {0}")]
    Start(String),

    #[error("Failed to stop stream: {0}")]
    Stop(String),

    #[error("Device read failed: {0}")]
    Read(String),
}

/// An open, exclusively owned capture device.
///
/// Lifecycle: `start` once, then any number of `available_samples`/`drain`
/// calls, then `stop` before `close`. `close` must be safe to call on every
/// exit path, including after a failed `start`.
pub trait CaptureDevice {
    /// Sample rate the device is actually delivering
    fn sample_rate(&self) -> u32;

    /// Begin filling the internal buffer. Calling it again is a no-op.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Number of samples buffered and ready to drain. Never blocks.
    fn available_samples(&self) -> Result<usize, CaptureError>;

    /// Move up to `max_count` ready samples into `frame`, replacing its contents.
    ///
    /// Returns the number of samples copied, which may be smaller than
    /// `max_count` (including zero).
    fn drain(&mut self, frame: &mut AudioFrame, max_count: usize) -> Result<usize, CaptureError>;

    /// Samples lost to ring overflow since the device was opened
    fn overruns(&self) -> u64 {
        0
    }

    fn stop(&mut self) -> Result<(), CaptureError>;

    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Something that can open capture devices
pub trait CaptureBackend {
    type Device: CaptureDevice;

    fn open(&self, config: &CaptureConfig) -> Result<Self::Device, CaptureError>;
}

/// Reject configurations no device can honour
pub(crate) fn validate_config(config: &CaptureConfig) -> Result<(), CaptureError> {
    if config.sample_rate == 0 {
        return Err(CaptureError::InvalidConfig(
            "sample rate must be greater than zero".to_string(),
        ));
    }
    if config.buffer_capacity == 0 {
        return Err(CaptureError::InvalidConfig(
            "buffer capacity must be greater than zero".to_string(),
        ));
    }
    if config.frame_len == 0 {
        return Err(CaptureError::InvalidConfig(
            "frame length must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Bounded FIFO of mono samples.
///
/// The writer never blocks: when the ring is full the oldest unread sample is
/// overwritten and counted as an overrun.
pub struct SampleRing {
    samples: Vec<i16>,
    read_pos: usize,
    len: usize,
    overruns: u64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity.max(1)],
            read_pos: 0,
            len: 0,
            overruns: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn available(&self) -> usize {
        self.len
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn push_samples(&mut self, data: &[i16]) {
        let capacity = self.capacity();
        for &sample in data {
            let write_pos = (self.read_pos + self.len) % capacity;
            self.samples[write_pos] = sample;
            if self.len == capacity {
                self.read_pos = (self.read_pos + 1) % capacity;
                self.overruns += 1;
            } else {
                self.len += 1;
            }
        }
    }

    /// Append up to `max_count` of the oldest samples to `out`, removing them.
    pub fn drain_into(&mut self, out: &mut AudioFrame, max_count: usize) -> usize {
        let count = max_count.min(self.len);
        let capacity = self.capacity();

        // At most two contiguous runs: read_pos..end, then 0..
        let first = count.min(capacity - self.read_pos);
        out.extend_from_slice(&self.samples[self.read_pos..self.read_pos + first]);
        out.extend_from_slice(&self.samples[..count - first]);

        self.read_pos = (self.read_pos + count) % capacity;
        self.len -= count;
        count
    }
}

/// Opens input devices through the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CaptureBackend for CpalBackend {
    type Device = CpalCapture;

    fn open(&self, config: &CaptureConfig) -> Result<CpalCapture, CaptureError> {
        CpalCapture::open(config)
    }
}

/// Live capture from a cpal input stream.
///
/// The stream callback runs on the audio thread and only pushes into the
/// shared ring; all draining happens on the pipeline thread.
pub struct CpalCapture {
    stream: Option<cpal::Stream>,
    ring: Arc<Mutex<SampleRing>>,
    stream_error: Arc<Mutex<Option<String>>>,
    sample_rate: u32,
    device_name: String,
    started: bool,
}

impl CpalCapture {
    /// Open the configured (or default) input device. The stream is built
    /// paused; call `start` to begin capturing.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        validate_config(config)?;

        let host = cpal::default_host();
        let device = match &config.device {
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::Config(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.clone()))?,
            None => host
                .default_input_device()
                .ok_or(CaptureError::DeviceUnavailable)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = select_stream_config(&device, config.sample_rate)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();
        let mut stream_config: StreamConfig = supported.into();
        stream_config.buffer_size = cpal::BufferSize::Default;

        log::info!(
            "Opening '{}': {} Hz, {} channel(s), {:?}",
            device_name,
            sample_rate,
            channels,
            sample_format
        );

        let ring = Arc::new(Mutex::new(SampleRing::new(config.ring_capacity())));
        let stream_error = Arc::new(Mutex::new(None));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(
                &device,
                &stream_config,
                ring.clone(),
                stream_error.clone(),
                channels,
            ),
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &stream_config,
                ring.clone(),
                stream_error.clone(),
                channels,
            ),
            SampleFormat::U16 => build_stream::<u16>(
                &device,
                &stream_config,
                ring.clone(),
                stream_error.clone(),
                channels,
            ),
            other => {
                return Err(CaptureError::Config(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

        Ok(Self {
            stream: Some(stream),
            ring,
            stream_error,
            sample_rate,
            device_name,
            started: false,
        })
    }

    fn check_stream(&self) -> Result<(), CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::Read("device is closed".to_string()));
        }
        match self.stream_error.lock().as_ref() {
            Some(message) => Err(CaptureError::Read(message.clone())),
            None => Ok(()),
        }
    }
}

impl CaptureDevice for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.started {
            return Ok(());
        }
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| CaptureError::Start("device is closed".to_string()))?;
        stream
            .play()
            .map_err(|e| CaptureError::Start(e.to_string()))?;
        self.started = true;
        log::info!("Audio capture started on '{}'", self.device_name);
        Ok(())
    }

    fn available_samples(&self) -> Result<usize, CaptureError> {
        self.check_stream()?;
        Ok(self.ring.lock().available())
    }

    fn drain(&mut self, frame: &mut AudioFrame, max_count: usize) -> Result<usize, CaptureError> {
        self.check_stream()?;
        frame.clear();
        Ok(self.ring.lock().drain_into(frame, max_count))
    }

    fn overruns(&self) -> u64 {
        self.ring.lock().overruns()
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| CaptureError::Stop(e.to_string()))?;
        }
        log::info!("Audio capture stopped on '{}'", self.device_name);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        // Dropping the stream releases the OS device
        if self.stream.take().is_some() {
            log::info!("Closed input device '{}'", self.device_name);
        }
        Ok(())
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if self.stream.is_some() {
            log::warn!("Input device '{}' dropped without close", self.device_name);
            let _ = self.stop();
            let _ = self.close();
        }
    }
}

/// Pick a stream config at the requested rate, preferring fewer channels and
/// native 16-bit samples. Falls back to the device default.
fn select_stream_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig, CaptureError> {
    let requested = cpal::SampleRate(sample_rate);
    let ranges = device
        .supported_input_configs()
        .map_err(|e| CaptureError::Config(e.to_string()))?;

    let best = ranges
        .filter(|range| range.min_sample_rate() <= requested && requested <= range.max_sample_rate())
        .map(|range| range.with_sample_rate(requested))
        .min_by_key(|config| (config.channels(), format_rank(config.sample_format())));

    match best {
        Some(config) => Ok(config),
        None => {
            let fallback = device
                .default_input_config()
                .map_err(|e| CaptureError::Config(e.to_string()))?;
            log::warn!(
                "Device does not support {} Hz, using default {} Hz",
                sample_rate,
                fallback.sample_rate().0
            );
            Ok(fallback)
        }
    }
}

fn format_rank(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::I16 => 0,
        SampleFormat::F32 => 1,
        SampleFormat::U16 => 2,
        _ => 3,
    }
}

/// Build an input stream that downmixes to mono i16 and feeds the ring
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    ring: Arc<Mutex<SampleRing>>,
    stream_error: Arc<Mutex<Option<String>>>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    let channels = channels.max(1);
    let mut mono: Vec<i16> = Vec::new();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            mono.clear();
            mono.extend(data.chunks(channels).map(|frame| {
                let sum: f32 = frame
                    .iter()
                    .map(|s| -> f32 { cpal::Sample::from_sample(*s) })
                    .sum();
                let sample: i16 = cpal::Sample::from_sample(sum / frame.len() as f32);
                sample
            }));
            ring.lock().push_samples(&mono);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            *stream_error.lock() = Some(err.to_string());
        },
        None,
    )
}
