//! Rendering surfaces for the spectrum trace and peak marker
//!
//! The pipeline only talks to the `Renderer` trait:
//! - `draw_trace` / `draw_marker` accumulate the next frame
//! - `present` shows it and waits at most the frame budget
//!
//! Implementations:
//! - `CanvasRenderer` - in-memory raster, headless
//! - `TerminalRenderer` - crossterm full-screen view with keyboard quit
//! - `JsonLinesRenderer` - one JSON object per frame on any `Write`

mod canvas;
mod json;
mod terminal;

pub use canvas::{Canvas, CanvasRenderer, Pixel};
pub use json::{FrameRecord, JsonLinesRenderer};
pub use terminal::TerminalRenderer;

use crate::audio::{DisplayScale, MagnitudeSeries, PeakInfo};
use std::time::Duration;
use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the surface wants after presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Continue,
    StopRequested,
}

/// Drawing surface consumed by the pipeline driver
pub trait Renderer {
    /// Draw the magnitude trace for the pending frame
    fn draw_trace(&mut self, series: &MagnitudeSeries, scale: &DisplayScale) -> Result<(), RenderError>;

    /// Draw the vertical peak marker for the pending frame
    fn draw_marker(&mut self, peak: &PeakInfo, scale: &DisplayScale) -> Result<(), RenderError>;

    /// Show the pending frame and start a new one.
    ///
    /// Must return within roughly `budget`; the capture ring keeps filling
    /// while this runs.
    fn present(&mut self, budget: Duration) -> Result<PresentOutcome, RenderError>;
}
