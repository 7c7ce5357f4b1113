//! Command-line interface

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectrum-scope", about = "Real-time audio spectrum analyzer")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input device name (default input device when omitted)
    #[arg(short, long)]
    pub device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Print the device list as JSON
    #[arg(long, requires = "list_devices")]
    pub json: bool,

    /// Capture sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Frame length N (transform size)
    #[arg(long)]
    pub frame_len: Option<usize>,

    /// Device ring buffer capacity in samples
    #[arg(long)]
    pub buffer_capacity: Option<usize>,

    /// Spectrum canvas height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Magnitude drawn at the top edge of the canvas
    #[arg(long)]
    pub reference_magnitude: Option<f64>,

    /// Minimum peak magnitude for the peak marker
    #[arg(long)]
    pub salience_threshold: Option<f64>,

    /// Pixel columns per displayed bin
    #[arg(long)]
    pub compression: Option<usize>,

    /// Maximum time spent presenting each frame, in ms
    #[arg(long)]
    pub frame_budget_ms: Option<u64>,

    /// Loop period in ms (0 = as fast as presentation allows)
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Transform whatever is buffered instead of waiting for a full frame
    #[arg(long)]
    pub allow_partial_frames: bool,

    /// Stop after this many loop iterations
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Write one JSON line per frame to stdout instead of drawing
    #[arg(long)]
    pub headless: bool,

    /// Analyze a synthetic sine at this frequency instead of a device
    #[arg(long, value_name = "HZ")]
    pub tone: Option<f64>,

    /// Peak amplitude of the synthetic sine
    #[arg(long, default_value_t = 10000.0)]
    pub tone_amplitude: f64,
}

impl Cli {
    /// Apply command-line overrides on top of file configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.capture.device = Some(device.clone());
        }
        if let Some(v) = self.sample_rate { config.capture.sample_rate = v; }
        if let Some(v) = self.frame_len { config.capture.frame_len = v; }
        if let Some(v) = self.buffer_capacity { config.capture.buffer_capacity = v; }
        if let Some(v) = self.height { config.display.height = v; }
        if let Some(v) = self.reference_magnitude { config.display.reference_magnitude = v; }
        if let Some(v) = self.salience_threshold { config.display.salience_threshold = v; }
        if let Some(v) = self.compression { config.display.compression = v; }
        if let Some(v) = self.frame_budget_ms { config.pipeline.frame_budget_ms = v; }
        if let Some(v) = self.tick_ms { config.pipeline.tick_ms = v; }
        if self.allow_partial_frames {
            config.pipeline.require_full_frame = false;
        }
        if self.max_frames.is_some() {
            config.pipeline.max_frames = self.max_frames;
        }
    }
}
