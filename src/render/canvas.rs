//! In-memory raster surface

use super::{PresentOutcome, RenderError, Renderer};
use crate::audio::{DisplayScale, MagnitudeSeries, PeakInfo};
use std::time::Duration;

/// Canvas pixel contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pixel {
    #[default]
    Background,
    Trace,
    Marker,
}

/// Fixed-size raster. Drawing outside the bounds is clipped silently.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Pixel::Background; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Pixel> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Pixel::Background);
    }

    pub fn count(&self, pixel: Pixel) -> usize {
        self.pixels.iter().filter(|&&p| p == pixel).count()
    }

    pub fn set(&mut self, x: i32, y: i32, pixel: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = pixel;
        }
    }

    /// Bresenham line between two points, endpoints included
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), pixel: Pixel) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set(x, y, pixel);
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Open polyline through `points`
    pub fn draw_polyline(&mut self, points: &[(i32, i32)], pixel: Pixel) {
        match points {
            [] => {}
            [only] => self.set(only.0, only.1, pixel),
            _ => {
                for pair in points.windows(2) {
                    self.draw_line(pair[0], pair[1], pixel);
                }
            }
        }
    }

    /// Full-height vertical line at column `x`
    pub fn draw_vline(&mut self, x: i32, pixel: Pixel) {
        for y in 0..self.height as i32 {
            self.set(x, y, pixel);
        }
    }
}

/// Headless renderer drawing into a `Canvas`.
///
/// `present` never waits; it snapshots the pending canvas and starts a new one.
/// Presenting with nothing drawn keeps the previous frame on display.
pub struct CanvasRenderer {
    canvas: Canvas,
    drawn: bool,
    last_frame: Option<Canvas>,
    last_marker: Option<PeakInfo>,
    pending_marker: Option<PeakInfo>,
    presented: u64,
}

impl CanvasRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            drawn: false,
            last_frame: None,
            last_marker: None,
            pending_marker: None,
            presented: 0,
        }
    }

    /// Most recently presented frame
    pub fn last_frame(&self) -> Option<&Canvas> {
        self.last_frame.as_ref()
    }

    /// Marker drawn in the most recently presented frame, if any
    pub fn last_marker(&self) -> Option<&PeakInfo> {
        self.last_marker.as_ref()
    }

    /// Number of `present` calls, including ones that kept the previous frame
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Renderer for CanvasRenderer {
    fn draw_trace(&mut self, series: &MagnitudeSeries, scale: &DisplayScale) -> Result<(), RenderError> {
        self.canvas
            .draw_polyline(&scale.trace_points(series), Pixel::Trace);
        self.drawn = true;
        Ok(())
    }

    fn draw_marker(&mut self, peak: &PeakInfo, scale: &DisplayScale) -> Result<(), RenderError> {
        self.canvas.draw_vline(scale.marker_x(peak), Pixel::Marker);
        self.pending_marker = Some(*peak);
        self.drawn = true;
        Ok(())
    }

    fn present(&mut self, _budget: Duration) -> Result<PresentOutcome, RenderError> {
        if self.drawn {
            self.last_frame = Some(self.canvas.clone());
            self.last_marker = self.pending_marker.take();
            self.canvas.clear();
            self.drawn = false;
        }
        self.presented += 1;
        Ok(PresentOutcome::Continue)
    }
}
