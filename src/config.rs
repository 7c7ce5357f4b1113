//! Configuration file loading, defaults and validation

use crate::audio::{CaptureConfig, DisplayScale, SampleFormat};
use crate::pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE: &str = "spectrum-scope.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct CaptureSection {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frame_len")]
    pub frame_len: usize,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct DisplaySection {
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_reference_magnitude")]
    pub reference_magnitude: f64,
    #[serde(default = "default_salience_threshold")]
    pub salience_threshold: f64,
    #[serde(default = "default_compression")]
    pub compression: usize,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct PipelineSection {
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,
    #[serde(default)]
    pub tick_ms: u64,
    #[serde(default = "default_require_full_frame")]
    pub require_full_frame: bool,
    #[serde(default)]
    pub max_frames: Option<u64>,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frame_len: default_frame_len(),
            buffer_capacity: default_buffer_capacity(),
            device: None,
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            height: default_height(),
            reference_magnitude: default_reference_magnitude(),
            salience_threshold: default_salience_threshold(),
            compression: default_compression(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            frame_budget_ms: default_frame_budget_ms(),
            tick_ms: 0,
            require_full_frame: default_require_full_frame(),
            max_frames: None,
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_frame_len() -> usize { 1024 }
fn default_buffer_capacity() -> usize { 1024 }
fn default_height() -> u32 { 600 }
fn default_reference_magnitude() -> f64 { 65536.0 * 32.0 }
fn default_salience_threshold() -> f64 { 17.0 }
fn default_compression() -> usize { 4 }
fn default_frame_budget_ms() -> u64 { 5 }
fn default_require_full_frame() -> bool { true }

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));

        if self.capture.sample_rate == 0 {
            return invalid("capture.sample_rate must be greater than zero");
        }
        if self.capture.frame_len == 0 {
            return invalid("capture.frame_len must be greater than zero");
        }
        if self.capture.buffer_capacity == 0 {
            return invalid("capture.buffer_capacity must be greater than zero");
        }
        if self.display.compression == 0 {
            return invalid("display.compression must be at least 1");
        }
        if self.display.compression > self.capture.frame_len {
            return invalid("display.compression must not exceed capture.frame_len");
        }
        if self.display.height < 2 {
            return invalid("display.height must be at least 2");
        }
        if !(self.display.reference_magnitude > 0.0) {
            return invalid("display.reference_magnitude must be positive");
        }
        if self.display.salience_threshold.is_nan() {
            return invalid("display.salience_threshold must be a number");
        }
        Ok(())
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            capture: CaptureConfig {
                sample_rate: self.capture.sample_rate,
                format: SampleFormat::Mono16,
                frame_len: self.capture.frame_len,
                buffer_capacity: self.capture.buffer_capacity,
                device: self.capture.device.clone(),
            },
            scale: DisplayScale {
                reference_magnitude: self.display.reference_magnitude,
                height: self.display.height,
                compression: self.display.compression,
            },
            salience_threshold: self.display.salience_threshold,
            frame_budget: Duration::from_millis(self.pipeline.frame_budget_ms),
            tick: Duration::from_millis(self.pipeline.tick_ms),
            require_full_frame: self.pipeline.require_full_frame,
            max_frames: self.pipeline.max_frames,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Explicit path, else `./spectrum-scope.toml`, else the platform config dir
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let platform = dirs::config_dir()?.join("spectrum-scope").join("config.toml");
    platform.exists().then_some(platform)
}
