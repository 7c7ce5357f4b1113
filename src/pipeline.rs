//! Pipeline driver - capture, transform, analyze and render in lockstep
//!
//! One thread runs every stage in sequence. The only wait is the renderer's
//! bounded `present` plus the optional tick pacing; the loop must keep up with
//! the device or the capture ring overwrites unread samples.

use crate::audio::{
    AnalyzerConfig, AudioFrame, CaptureBackend, CaptureConfig, CaptureDevice, CaptureError,
    DisplayScale, SpectrumAnalyzer, SpectrumTransform, TransformError,
};
use crate::render::{PresentOutcome, RenderError, Renderer};
use crate::state::{PipelineState, RunSummary, StateLog, StopReason};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Fatal pipeline errors. None are retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to open capture device: {0}")]
    DeviceOpen(CaptureError),

    #[error("Capture device failed: {0}")]
    DeviceRead(CaptureError),

    #[error("Failed to create transform plan: {0}")]
    Allocation(TransformError),

    #[error("Transform failed: {0}")]
    Transform(TransformError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),
}

/// Pipeline configuration, fixed for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub capture: CaptureConfig,

    pub scale: DisplayScale,

    /// Minimum peak magnitude for the marker to be drawn
    pub salience_threshold: f64,

    /// Upper bound handed to `Renderer::present`
    pub frame_budget: Duration,

    /// Loop cadence; zero paces only through `present`
    pub tick: Duration,

    /// Only transform once a whole frame is buffered
    pub require_full_frame: bool,

    /// Stop after this many loop iterations
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            scale: DisplayScale::default(),
            salience_threshold: 17.0,
            frame_budget: Duration::from_millis(5),
            tick: Duration::ZERO,
            require_full_frame: true,
            max_frames: None,
        }
    }
}

/// Time source for loop pacing
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock: `sleep` advances time instantly
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Total time spent in `sleep`
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.advance(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Fixed-period scheduler.
///
/// A late tick is not made up: the schedule restarts from the current time
/// instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next: Option<Duration>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Sleep until the next tick is due
    pub fn wait(&mut self, clock: &impl Clock) {
        if self.period.is_zero() {
            return;
        }

        let now = clock.now();
        let due = self.next.unwrap_or(now + self.period);
        if due > now {
            clock.sleep(due - now);
            self.next = Some(due + self.period);
        } else {
            self.next = Some(now + self.period);
        }
    }
}

/// Shared flag checked at the top of every loop iteration
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns one run of the acquisition-transform-render loop
pub struct Pipeline<C: Clock = SystemClock> {
    config: PipelineConfig,
    clock: C,
    stop: StopSignal,
    state: StateLog,
}

impl Pipeline<SystemClock> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> Pipeline<C> {
    pub fn with_clock(config: PipelineConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            stop: StopSignal::new(),
            state: StateLog::new(),
        }
    }

    /// Handle that stops the loop at its next iteration
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> &StateLog {
        &self.state
    }

    /// Run the pipeline to completion.
    ///
    /// The plan factory is only called once the device is open. Whatever the
    /// exit path, the plan is destroyed first, then the device is stopped and
    /// closed, and the state ends at `Stopped`.
    pub fn run<B, T, F, R>(
        &mut self,
        backend: &B,
        create_plan: F,
        renderer: &mut R,
    ) -> Result<RunSummary, PipelineError>
    where
        B: CaptureBackend,
        T: SpectrumTransform,
        F: FnOnce(usize) -> Result<T, TransformError>,
        R: Renderer + ?Sized,
    {
        let mut device = match backend.open(&self.config.capture) {
            Ok(device) => device,
            Err(e) => {
                log::error!("Could not open capture device: {}", e);
                self.state.enter(PipelineState::Stopped);
                return Err(PipelineError::DeviceOpen(e));
            }
        };
        self.state.enter(PipelineState::DeviceOpen);

        let result = self.capture_loop(&mut device, create_plan, renderer);

        if let Err(e) = device.stop() {
            log::warn!("Failed to stop capture device: {}", e);
        }
        if let Err(e) = device.close() {
            log::warn!("Failed to close capture device: {}", e);
        }
        self.state.enter(PipelineState::Stopped);

        match &result {
            Ok(summary) => log::info!(
                "Pipeline stopped ({:?}) after {} frames",
                summary.stop_reason,
                summary.frames_analyzed
            ),
            Err(e) => log::error!("Pipeline terminated: {}", e),
        }
        result
    }

    fn capture_loop<D, T, F, R>(
        &mut self,
        device: &mut D,
        create_plan: F,
        renderer: &mut R,
    ) -> Result<RunSummary, PipelineError>
    where
        D: CaptureDevice,
        T: SpectrumTransform,
        F: FnOnce(usize) -> Result<T, TransformError>,
        R: Renderer + ?Sized,
    {
        let frame_len = self.config.capture.frame_len;
        let mut plan = create_plan(frame_len).map_err(PipelineError::Allocation)?;
        if plan.size() != frame_len {
            return Err(PipelineError::Transform(TransformError::SizeMismatch {
                expected: frame_len,
                actual: plan.size(),
            }));
        }

        device.start().map_err(PipelineError::DeviceOpen)?;
        self.state.enter(PipelineState::Capturing);

        let analyzer = SpectrumAnalyzer::new(AnalyzerConfig {
            sample_rate: device.sample_rate(),
            salience_threshold: self.config.salience_threshold,
        });
        let scale = self.config.scale.clone();
        let mut ticker = Ticker::new(self.config.tick);
        let mut frame = AudioFrame::with_capacity(frame_len);

        let mut iterations = 0u64;
        let mut frames_analyzed = 0u64;
        let mut short_frames = 0u64;
        let mut overruns = 0u64;

        let stop_reason = loop {
            if self.stop.is_requested() {
                break StopReason::StopSignal;
            }
            if self.config.max_frames.is_some_and(|max| iterations >= max) {
                break StopReason::FrameLimit;
            }
            iterations += 1;

            self.state.enter(PipelineState::Draining);
            let available = device
                .available_samples()
                .map_err(PipelineError::DeviceRead)?;

            let dropped = device.overruns();
            if dropped > overruns {
                log::warn!(
                    "Capture ring overflowed, {} samples lost",
                    dropped - overruns
                );
                overruns = dropped;
            }

            let ready = if self.config.require_full_frame {
                available >= frame_len
            } else {
                available > 0
            };

            if ready {
                let drained = device
                    .drain(&mut frame, frame_len)
                    .map_err(PipelineError::DeviceRead)?;
                if drained < frame_len {
                    short_frames += 1;
                }

                self.state.enter(PipelineState::Transforming);
                let spectrum = plan
                    .transform(&frame)
                    .map_err(PipelineError::Transform)?;

                self.state.enter(PipelineState::Analyzing);
                let analysis = analyzer.analyze(spectrum);
                frames_analyzed += 1;
                log::debug!(
                    "Frame {}: peak bin {} ({:.1} Hz) magnitude {:.0}{}",
                    frames_analyzed,
                    analysis.peak.bin,
                    analysis.peak.frequency_hz,
                    analysis.peak.magnitude,
                    if analysis.significant { "" } else { " (below threshold)" }
                );

                self.state.enter(PipelineState::Rendering);
                renderer.draw_trace(&analysis.magnitudes, &scale)?;
                if analysis.significant {
                    renderer.draw_marker(&analysis.peak, &scale)?;
                }
            }

            self.state.enter(PipelineState::Rendering);
            if renderer.present(self.config.frame_budget)? == PresentOutcome::StopRequested {
                break StopReason::RendererRequested;
            }

            ticker.wait(&self.clock);
        };

        drop(plan);

        Ok(RunSummary {
            iterations,
            frames_analyzed,
            short_frames,
            overruns,
            stop_reason,
        })
    }
}
