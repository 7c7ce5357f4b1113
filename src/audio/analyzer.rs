//! Spectrum analysis - magnitudes, peak search and display scaling

use rustfft::num_complex::Complex;
use serde::Serialize;

/// Per-bin magnitudes over the lower half of the spectrum (bins 0..N/2)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagnitudeSeries {
    magnitudes: Vec<f64>,
}

impl MagnitudeSeries {
    pub fn from_magnitudes(magnitudes: Vec<f64>) -> Self {
        Self { magnitudes }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// `(bin_index, magnitude)` pairs in ascending bin order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.magnitudes.iter().copied().enumerate()
    }
}

/// Strongest bin of one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PeakInfo {
    pub bin: usize,
    pub magnitude: f64,
    pub frequency_hz: f64,
}

/// Result of analyzing one spectrum frame
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub magnitudes: MagnitudeSeries,
    pub peak: PeakInfo,

    /// Peak magnitude exceeded the salience threshold
    pub significant: bool,
}

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Sample rate of the analyzed frames, for bin-to-Hz conversion
    pub sample_rate: u32,

    /// Minimum peak magnitude for the peak marker to be drawn
    pub salience_threshold: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            salience_threshold: 17.0,
        }
    }
}

/// Stateless spectrum analyzer
#[derive(Debug, Clone)]
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
}

impl SpectrumAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Compute magnitudes for bins 0..N/2 and locate the peak.
    ///
    /// The upper half of the spectrum mirrors the lower half for real input
    /// and is not inspected. Ties go to the lowest bin.
    pub fn analyze(&self, spectrum: &[Complex<f64>]) -> Analysis {
        let size = spectrum.len();
        let magnitudes: Vec<f64> = spectrum[..size / 2].iter().map(|c| c.norm()).collect();

        let mut peak = PeakInfo::default();
        for (bin, &magnitude) in magnitudes.iter().enumerate() {
            if bin == 0 || magnitude > peak.magnitude {
                peak.bin = bin;
                peak.magnitude = magnitude;
            }
        }
        peak.frequency_hz = bin_to_hz(peak.bin, self.config.sample_rate, size);

        Analysis {
            significant: peak.magnitude > self.config.salience_threshold,
            magnitudes: MagnitudeSeries::from_magnitudes(magnitudes),
            peak,
        }
    }
}

/// Center frequency of `bin` for an N-point transform
pub fn bin_to_hz(bin: usize, sample_rate: u32, size: usize) -> f64 {
    if size == 0 {
        return 0.0;
    }
    bin as f64 * sample_rate as f64 / size as f64
}

/// Magnitude-to-pixel mapping for the spectrum canvas.
///
/// The vertical axis origin sits at the canvas center: a magnitude of zero
/// maps to `height / 2` and the reference magnitude maps to the top edge.
/// Horizontally, displayed bin `i` lands at column `compression * i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayScale {
    /// Magnitude drawn at the top of the canvas
    pub reference_magnitude: f64,

    /// Canvas height in pixels
    pub height: u32,

    /// Pixel columns per displayed bin
    pub compression: usize,
}

impl Default for DisplayScale {
    fn default() -> Self {
        Self {
            reference_magnitude: 65536.0 * 32.0,
            height: 600,
            compression: 4,
        }
    }
}

impl DisplayScale {
    /// Vertical pixel offset for a magnitude; not clamped to the canvas
    pub fn offset(&self, magnitude: f64) -> f64 {
        let half = self.height as f64 / 2.0;
        half - magnitude * half / self.reference_magnitude
    }

    /// Number of bins shown for an N-point transform: `min(N/2, N/C)`
    pub fn displayed_bins(&self, frame_len: usize) -> usize {
        (frame_len / 2).min(frame_len / self.compression.max(1))
    }

    /// Canvas width for an N-point transform
    pub fn width(&self, frame_len: usize) -> usize {
        self.displayed_bins(frame_len) * self.compression.max(1)
    }

    /// Polyline vertices for a magnitude series
    pub fn trace_points(&self, series: &MagnitudeSeries) -> Vec<(i32, i32)> {
        let shown = self.displayed_bins(series.len() * 2).min(series.len());
        series
            .iter()
            .take(shown)
            .map(|(bin, magnitude)| (self.column(bin), self.offset(magnitude).round() as i32))
            .collect()
    }

    /// Column of the peak marker
    pub fn marker_x(&self, peak: &PeakInfo) -> i32 {
        self.column(peak.bin)
    }

    /// Pixel column of a bin, saturating past the drawable range
    fn column(&self, bin: usize) -> i32 {
        i32::try_from(bin.saturating_mul(self.compression.max(1))).unwrap_or(i32::MAX)
    }
}
