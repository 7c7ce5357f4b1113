//! Full-screen terminal view

use super::canvas::{Canvas, Pixel};
use super::{PresentOutcome, RenderError, Renderer};
use crate::audio::{DisplayScale, MagnitudeSeries, PeakInfo};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::{cursor, queue, terminal};
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

/// Draws into a full-resolution canvas and downsamples it to terminal cells.
///
/// Owns the terminal while alive: raw mode and the alternate screen are
/// entered on creation and restored on drop. The screen is only redrawn
/// after something new was drawn, so iterations without a ready frame leave
/// the last spectrum on display.
pub struct TerminalRenderer {
    canvas: Canvas,
    drawn: bool,
    marker: Option<PeakInfo>,
    out: Stdout,
}

impl TerminalRenderer {
    pub fn new(width: usize, height: usize) -> Result<Self, RenderError> {
        let mut out = io::stdout();
        terminal::enable_raw_mode()?;
        queue!(out, terminal::EnterAlternateScreen, cursor::Hide)?;
        out.flush()?;

        Ok(Self {
            canvas: Canvas::new(width, height),
            drawn: false,
            marker: None,
            out,
        })
    }

    fn draw_screen(&mut self) -> Result<(), RenderError> {
        let (cols, rows) = terminal::size()?;
        let cols = cols.max(1) as usize;
        let plot_rows = rows.saturating_sub(1).max(1) as usize;

        for row in 0..plot_rows {
            let cells: Vec<Pixel> = (0..cols)
                .map(|col| cell_pixel(&self.canvas, col, row, cols, plot_rows))
                .collect();

            queue!(self.out, cursor::MoveTo(0, row as u16))?;
            for pixel in cells {
                match pixel {
                    Pixel::Background => queue!(self.out, Print(' '))?,
                    Pixel::Trace => queue!(self.out, Print('•'))?,
                    Pixel::Marker => queue!(self.out, PrintStyledContent('│'.red()))?,
                }
            }
        }

        let status = match &self.marker {
            Some(peak) => format!(
                " peak {:8.1} Hz  bin {:4}  |X| {:12.0}   [q] quit",
                peak.frequency_hz, peak.bin, peak.magnitude
            ),
            None => " peak        -               [q] quit".to_string(),
        };
        let status: String = format!("{:<width$}", status, width = cols)
            .chars()
            .take(cols)
            .collect();
        queue!(
            self.out,
            cursor::MoveTo(0, plot_rows as u16),
            PrintStyledContent(status.reverse())
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// Strongest pixel inside the canvas block covered by one terminal cell
fn cell_pixel(canvas: &Canvas, col: usize, row: usize, cols: usize, rows: usize) -> Pixel {
    let x0 = col * canvas.width() / cols;
    let x1 = ((col + 1) * canvas.width() / cols).max(x0 + 1);
    let y0 = row * canvas.height() / rows;
    let y1 = ((row + 1) * canvas.height() / rows).max(y0 + 1);

    let mut strongest = Pixel::Background;
    for y in y0..y1 {
        for x in x0..x1 {
            match canvas.get(x, y) {
                Some(Pixel::Marker) => return Pixel::Marker,
                Some(Pixel::Trace) => strongest = Pixel::Trace,
                _ => {}
            }
        }
    }
    strongest
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

impl Renderer for TerminalRenderer {
    fn draw_trace(&mut self, series: &MagnitudeSeries, scale: &DisplayScale) -> Result<(), RenderError> {
        self.canvas
            .draw_polyline(&scale.trace_points(series), Pixel::Trace);
        self.drawn = true;
        Ok(())
    }

    fn draw_marker(&mut self, peak: &PeakInfo, scale: &DisplayScale) -> Result<(), RenderError> {
        self.canvas.draw_vline(scale.marker_x(peak), Pixel::Marker);
        self.marker = Some(*peak);
        self.drawn = true;
        Ok(())
    }

    fn present(&mut self, budget: Duration) -> Result<PresentOutcome, RenderError> {
        if self.drawn {
            self.draw_screen()?;
            self.canvas.clear();
            self.marker = None;
            self.drawn = false;
        }

        // Wait for input at most `budget`, like a GUI event pump
        let deadline = Instant::now() + budget;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                return Ok(PresentOutcome::Continue);
            }
            if let Event::Key(key) = event::read()? {
                if is_quit_key(&key) {
                    return Ok(PresentOutcome::StopRequested);
                }
            }
            if remaining.is_zero() {
                return Ok(PresentOutcome::Continue);
            }
        }
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = queue!(self.out, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }
}
