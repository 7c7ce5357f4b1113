//! Synthetic sine capture source for device-free runs

use super::capture::validate_config;
use super::{AudioFrame, CaptureBackend, CaptureConfig, CaptureDevice, CaptureError};
use std::cell::Cell;
use std::f64::consts::PI;

/// Opens `ToneDevice`s producing a fixed sine
#[derive(Debug, Clone, PartialEq)]
pub struct ToneBackend {
    /// Tone frequency in Hz
    pub frequency: f64,

    /// Peak amplitude in 16-bit sample units
    pub amplitude: f64,

    /// Samples made ready by each `available_samples` poll; `None` means one frame
    pub samples_per_poll: Option<usize>,
}

impl ToneBackend {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
            samples_per_poll: None,
        }
    }
}

impl CaptureBackend for ToneBackend {
    type Device = ToneDevice;

    fn open(&self, config: &CaptureConfig) -> Result<ToneDevice, CaptureError> {
        validate_config(config)?;
        log::info!(
            "Opening synthetic tone: {:.1} Hz at amplitude {:.0}",
            self.frequency,
            self.amplitude
        );
        Ok(ToneDevice {
            frequency: self.frequency,
            amplitude: self.amplitude.clamp(0.0, i16::MAX as f64),
            sample_rate: config.sample_rate,
            capacity: config.ring_capacity(),
            samples_per_poll: self.samples_per_poll.unwrap_or(config.frame_len),
            ready: Cell::new(0),
            generated: Cell::new(0),
            overruns: Cell::new(0),
            started: false,
            closed: false,
        })
    }
}

/// Sine generator behaving like a capture device.
///
/// Each poll of `available_samples` while started "captures" another
/// `samples_per_poll` samples; the ready count saturates at the configured
/// capacity just like a device ring would.
#[derive(Debug)]
pub struct ToneDevice {
    frequency: f64,
    amplitude: f64,
    sample_rate: u32,
    capacity: usize,
    samples_per_poll: usize,
    ready: Cell<usize>,
    generated: Cell<u64>,
    overruns: Cell<u64>,
    started: bool,
    closed: bool,
}

impl ToneDevice {
    fn sample_at(&self, index: u64) -> i16 {
        let t = index as f64 / self.sample_rate as f64;
        (self.amplitude * (2.0 * PI * self.frequency * t).sin()).round() as i16
    }
}

impl CaptureDevice for ToneDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.closed {
            return Err(CaptureError::Start("device is closed".to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn available_samples(&self) -> Result<usize, CaptureError> {
        if self.closed {
            return Err(CaptureError::Read("device is closed".to_string()));
        }
        if self.started {
            let total = self.ready.get() + self.samples_per_poll;
            if total > self.capacity {
                // The oldest samples are lost; skip them in the waveform too
                let dropped = (total - self.capacity) as u64;
                self.overruns.set(self.overruns.get() + dropped);
                self.generated.set(self.generated.get() + dropped);
            }
            self.ready.set(total.min(self.capacity));
        }
        Ok(self.ready.get())
    }

    fn drain(&mut self, frame: &mut AudioFrame, max_count: usize) -> Result<usize, CaptureError> {
        if self.closed {
            return Err(CaptureError::Read("device is closed".to_string()));
        }
        frame.clear();
        let count = max_count.min(self.ready.get());
        let start = self.generated.get();
        for index in start..start + count as u64 {
            frame.push(self.sample_at(index));
        }
        self.generated.set(start + count as u64);
        self.ready.set(self.ready.get() - count);
        Ok(count)
    }

    fn overruns(&self) -> u64 {
        self.overruns.get()
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.started = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.closed = true;
        Ok(())
    }
}
