//! Audio capture, transform and spectrum analysis

mod analyzer;
mod capture;
mod fft;
mod sources;
mod tone;

pub use analyzer::{Analysis, AnalyzerConfig, DisplayScale, MagnitudeSeries, PeakInfo, SpectrumAnalyzer};
pub use capture::{CaptureBackend, CaptureDevice, CaptureError, CpalBackend, CpalCapture, SampleRing};
pub use fft::{SpectrumFrame, SpectrumTransform, TransformError, TransformPlan};
pub use sources::{list_input_devices, SourceError};
pub use tone::{ToneBackend, ToneDevice};

use std::time::Duration;

/// Sample layout delivered by a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Single channel, signed 16-bit
    #[default]
    Mono16,
}

/// Capture configuration, fixed at startup
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Sample format
    pub format: SampleFormat,

    /// Frame length N (also the transform size)
    pub frame_len: usize,

    /// Capacity of the device-side ring buffer, in samples
    pub buffer_capacity: usize,

    /// Input device name; `None` selects the host default
    pub device: Option<String>,
}

impl CaptureConfig {
    /// Ring capacity actually allocated; never smaller than one frame.
    pub fn ring_capacity(&self) -> usize {
        self.buffer_capacity.max(self.frame_len)
    }

    /// Time the device needs to deliver one frame
    pub fn frame_period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_len as f64 / self.sample_rate as f64)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            format: SampleFormat::Mono16,
            frame_len: 1024,
            buffer_capacity: 1024,
            device: None,
        }
    }
}

/// One window of mono PCM samples.
///
/// Owned by the pipeline driver and overwritten in place every iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn extend_from_slice(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn push(&mut self, sample: i16) {
        self.samples.push(sample);
    }
}
