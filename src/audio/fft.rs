//! Transform engine - a reusable forward FFT plan over one frame length

use super::AudioFrame;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use thiserror::Error;

/// Borrowed view of one transform output: N complex bins, 0 Hz first.
pub type SpectrumFrame<'a> = &'a [Complex<f64>];

/// Transform errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Transform size must be greater than zero")]
    InvalidSize,

    #[error("Failed to allocate transform buffers: {0}")]
    Allocation(String),

    #[error("Frame of {len} samples exceeds transform size {size}")]
    FrameTooLong { len: usize, size: usize },

    #[error("Plan size {actual} does not match frame length {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Forward transform of real PCM frames into frequency bins
pub trait SpectrumTransform {
    /// Transform length N
    fn size(&self) -> usize;

    /// Transform one frame. Frames shorter than N are zero-padded.
    ///
    /// The returned bins live in the plan's buffer and are overwritten by the
    /// next call.
    fn transform(&mut self, frame: &AudioFrame) -> Result<SpectrumFrame<'_>, TransformError>;
}

/// Precomputed forward FFT with its own input/output and scratch buffers.
///
/// Unwindowed and unnormalized: bin magnitudes scale with N and with the
/// sample amplitude.
pub struct TransformPlan {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl TransformPlan {
    /// Plan a forward transform of `size` points
    pub fn new(size: usize) -> Result<Self, TransformError> {
        if size == 0 {
            return Err(TransformError::InvalidSize);
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);

        let buffer = zeroed(size)?;
        let scratch = zeroed(fft.get_inplace_scratch_len())?;

        log::info!("Created forward FFT plan for N={}", size);

        Ok(Self {
            fft,
            buffer,
            scratch,
        })
    }
}

impl SpectrumTransform for TransformPlan {
    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn transform(&mut self, frame: &AudioFrame) -> Result<SpectrumFrame<'_>, TransformError> {
        let size = self.size();
        if frame.len() > size {
            return Err(TransformError::FrameTooLong {
                len: frame.len(),
                size,
            });
        }

        let padded = frame
            .samples()
            .iter()
            .copied()
            .chain(std::iter::repeat(0));
        for (slot, sample) in self.buffer.iter_mut().zip(padded) {
            *slot = Complex::new(sample as f64, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        Ok(&self.buffer)
    }
}

impl Drop for TransformPlan {
    fn drop(&mut self) {
        log::debug!("Destroyed FFT plan for N={}", self.buffer.len());
    }
}

fn zeroed(len: usize) -> Result<Vec<Complex<f64>>, TransformError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| TransformError::Allocation(e.to_string()))?;
    buffer.resize(len, Complex::new(0.0, 0.0));
    Ok(buffer)
}
