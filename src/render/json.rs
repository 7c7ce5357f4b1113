//! JSON-lines output, one record per presented frame

use super::{PresentOutcome, RenderError, Renderer};
use crate::audio::{DisplayScale, MagnitudeSeries, PeakInfo};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// One presented frame
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameRecord {
    pub seq: u64,

    /// Number of bins in the drawn trace
    pub bins: usize,

    /// Peak marker, present only when one was drawn
    pub peak: Option<PeakInfo>,
}

/// Writes each presented frame as a single JSON line.
///
/// Frames where nothing was drawn produce no output.
pub struct JsonLinesRenderer<W: Write> {
    out: W,
    seq: u64,
    bins: Option<usize>,
    marker: Option<PeakInfo>,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            seq: 0,
            bins: None,
            marker: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn draw_trace(&mut self, series: &MagnitudeSeries, scale: &DisplayScale) -> Result<(), RenderError> {
        self.bins = Some(scale.trace_points(series).len());
        Ok(())
    }

    fn draw_marker(&mut self, peak: &PeakInfo, _scale: &DisplayScale) -> Result<(), RenderError> {
        self.marker = Some(*peak);
        Ok(())
    }

    fn present(&mut self, _budget: Duration) -> Result<PresentOutcome, RenderError> {
        if self.bins.is_none() && self.marker.is_none() {
            return Ok(PresentOutcome::Continue);
        }

        let record = FrameRecord {
            seq: self.seq,
            bins: self.bins.take().unwrap_or(0),
            peak: self.marker.take(),
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.seq += 1;

        Ok(PresentOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(renderer: JsonLinesRenderer<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8(renderer.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn writes_one_line_per_drawn_frame() {
        let scale = DisplayScale::default();
        let series = MagnitudeSeries::from_magnitudes(vec![0.0; 512]);
        let peak = PeakInfo {
            bin: 23,
            magnitude: 5.0e6,
            frequency_hz: 990.5,
        };
        let mut renderer = JsonLinesRenderer::new(Vec::new());

        renderer.draw_trace(&series, &scale).unwrap();
        renderer.draw_marker(&peak, &scale).unwrap();
        renderer.present(Duration::ZERO).unwrap();
        renderer.draw_trace(&series, &scale).unwrap();
        renderer.present(Duration::ZERO).unwrap();

        let records = lines(renderer);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["seq"], 0);
        assert_eq!(records[0]["bins"], 256);
        assert_eq!(records[0]["peak"]["bin"], 23);
        assert_eq!(records[1]["seq"], 1);
        assert!(records[1]["peak"].is_null());
    }

    #[test]
    fn empty_frames_are_skipped() {
        let mut renderer = JsonLinesRenderer::new(Vec::new());

        renderer.present(Duration::ZERO).unwrap();
        renderer.present(Duration::ZERO).unwrap();

        assert!(lines(renderer).is_empty());
    }
}
