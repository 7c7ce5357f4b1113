use spectrum_scope::audio::{
    AudioFrame, CaptureBackend, CaptureConfig, CaptureDevice, CaptureError, DisplayScale,
    MagnitudeSeries, PeakInfo, ToneBackend, TransformError, TransformPlan,
};
use spectrum_scope::pipeline::{ManualClock, Pipeline, PipelineConfig, PipelineError};
use spectrum_scope::render::{CanvasRenderer, Pixel, PresentOutcome, RenderError, Renderer};
use spectrum_scope::state::{PipelineState, StopReason};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

const LIFECYCLE: [PipelineState; 4] = [
    PipelineState::Idle,
    PipelineState::DeviceOpen,
    PipelineState::Capturing,
    PipelineState::Stopped,
];

type CallLog = Rc<RefCell<Vec<&'static str>>>;

/// Device yielding a constant sample value, scripted to fail on demand
struct MockBackend {
    log: CallLog,
    fail_open: bool,
    samples_per_poll: usize,
    value: i16,
    ready_every: usize,
    fail_read_on_poll: Option<usize>,
}

impl MockBackend {
    fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_open: false,
            samples_per_poll: 1024,
            value: 0,
            ready_every: 1,
            fail_read_on_poll: None,
        }
    }
}

struct MockDevice {
    log: CallLog,
    samples_per_poll: usize,
    value: i16,
    ready_every: usize,
    fail_read_on_poll: Option<usize>,
    polls: Cell<usize>,
}

impl CaptureBackend for MockBackend {
    type Device = MockDevice;

    fn open(&self, config: &CaptureConfig) -> Result<MockDevice, CaptureError> {
        self.log.borrow_mut().push("open");
        if self.fail_open {
            return Err(CaptureError::DeviceNotFound(
                config.device.clone().unwrap_or_default(),
            ));
        }
        Ok(MockDevice {
            log: self.log.clone(),
            samples_per_poll: self.samples_per_poll,
            value: self.value,
            ready_every: self.ready_every,
            fail_read_on_poll: self.fail_read_on_poll,
            polls: Cell::new(0),
        })
    }
}

impl CaptureDevice for MockDevice {
    fn sample_rate(&self) -> u32 {
        44100
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.log.borrow_mut().push("start");
        Ok(())
    }

    fn available_samples(&self) -> Result<usize, CaptureError> {
        let poll = self.polls.get() + 1;
        self.polls.set(poll);
        if self.fail_read_on_poll == Some(poll) {
            return Err(CaptureError::Read("device unplugged".to_string()));
        }
        if poll % self.ready_every == 0 {
            Ok(self.samples_per_poll)
        } else {
            Ok(0)
        }
    }

    fn drain(&mut self, frame: &mut AudioFrame, max_count: usize) -> Result<usize, CaptureError> {
        frame.clear();
        let count = max_count.min(self.samples_per_poll);
        for _ in 0..count {
            frame.push(self.value);
        }
        Ok(count)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.log.borrow_mut().push("stop");
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.log.borrow_mut().push("close");
        Ok(())
    }
}

/// Asks to stop after a fixed number of presented frames
struct QuitAfter {
    inner: CanvasRenderer,
    remaining: u32,
}

impl Renderer for QuitAfter {
    fn draw_trace(&mut self, series: &MagnitudeSeries, scale: &DisplayScale) -> Result<(), RenderError> {
        self.inner.draw_trace(series, scale)
    }

    fn draw_marker(&mut self, peak: &PeakInfo, scale: &DisplayScale) -> Result<(), RenderError> {
        self.inner.draw_marker(peak, scale)
    }

    fn present(&mut self, budget: Duration) -> Result<PresentOutcome, RenderError> {
        self.inner.present(budget)?;
        self.remaining -= 1;
        if self.remaining == 0 {
            Ok(PresentOutcome::StopRequested)
        } else {
            Ok(PresentOutcome::Continue)
        }
    }
}

fn limited(max_frames: u64) -> PipelineConfig {
    PipelineConfig {
        max_frames: Some(max_frames),
        ..Default::default()
    }
}

fn canvas() -> CanvasRenderer {
    CanvasRenderer::new(1024, 600)
}

#[test]
fn tone_run_marks_the_dominant_bin() {
    let clock = ManualClock::new();
    let mut pipeline = Pipeline::with_clock(limited(5), &clock);
    let mut renderer = canvas();

    let summary = pipeline
        .run(&ToneBackend::new(1000.0, 10000.0), TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.iterations, 5);
    assert_eq!(summary.frames_analyzed, 5);
    assert_eq!(summary.short_frames, 0);
    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert_eq!(renderer.presented(), 5);

    let peak = renderer.last_marker().expect("1 kHz tone should be salient");
    assert!((22..=24).contains(&peak.bin), "peak bin {}", peak.bin);
    assert!((peak.frequency_hz - 1000.0).abs() < 50.0);

    let frame = renderer.last_frame().unwrap();
    assert!(frame.count(Pixel::Trace) > 0);
    assert!(frame.count(Pixel::Marker) > 0);

    assert_eq!(pipeline.state().history(), LIFECYCLE);
    assert_eq!(pipeline.state().current(), PipelineState::Stopped);
}

#[test]
fn silence_draws_trace_without_marker() {
    let log = CallLog::default();
    let mut pipeline = Pipeline::with_clock(limited(2), ManualClock::new());
    let mut renderer = canvas();

    let summary = pipeline
        .run(&MockBackend::new(&log), TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.frames_analyzed, 2);
    assert!(renderer.last_marker().is_none());
    let frame = renderer.last_frame().unwrap();
    assert_eq!(frame.count(Pixel::Marker), 0);
    // Zero magnitude sits on the midline
    assert_eq!(frame.get(0, 300), Some(Pixel::Trace));
}

#[test]
fn open_failure_never_creates_a_plan() {
    let log = CallLog::default();
    let backend = MockBackend {
        fail_open: true,
        ..MockBackend::new(&log)
    };
    let plan_created = Cell::new(false);
    let mut pipeline = Pipeline::with_clock(limited(1), ManualClock::new());

    let result = pipeline.run(
        &backend,
        |size| {
            plan_created.set(true);
            TransformPlan::new(size)
        },
        &mut canvas(),
    );

    assert!(matches!(
        result,
        Err(PipelineError::DeviceOpen(CaptureError::DeviceNotFound(_)))
    ));
    assert!(!plan_created.get());
    assert_eq!(*log.borrow(), ["open"]);
    assert_eq!(pipeline.state().current(), PipelineState::Stopped);
}

#[test]
fn plan_failure_still_closes_the_device() {
    let log = CallLog::default();
    let mut pipeline = Pipeline::with_clock(limited(1), ManualClock::new());

    let result = pipeline.run(
        &MockBackend::new(&log),
        |_size: usize| -> Result<TransformPlan, TransformError> {
            Err(TransformError::Allocation("out of memory".to_string()))
        },
        &mut canvas(),
    );

    assert!(matches!(result, Err(PipelineError::Allocation(_))));
    assert_eq!(*log.borrow(), ["open", "stop", "close"]);
    assert_eq!(
        pipeline.state().history(),
        [PipelineState::Idle, PipelineState::DeviceOpen, PipelineState::Stopped]
    );
}

#[test]
fn read_error_mid_run_stops_then_closes() {
    let log = CallLog::default();
    let backend = MockBackend {
        fail_read_on_poll: Some(3),
        ..MockBackend::new(&log)
    };
    let mut pipeline = Pipeline::with_clock(PipelineConfig::default(), ManualClock::new());
    let mut renderer = canvas();

    let result = pipeline.run(&backend, TransformPlan::new, &mut renderer);

    assert!(matches!(
        result,
        Err(PipelineError::DeviceRead(CaptureError::Read(_)))
    ));
    assert_eq!(renderer.presented(), 2);
    assert_eq!(*log.borrow(), ["open", "start", "stop", "close"]);
    assert_eq!(pipeline.state().history(), LIFECYCLE);
}

#[test]
fn stop_requested_before_run_does_no_work() {
    let log = CallLog::default();
    let mut pipeline = Pipeline::with_clock(PipelineConfig::default(), ManualClock::new());
    pipeline.stop_signal().request();
    let mut renderer = canvas();

    let summary = pipeline
        .run(&MockBackend::new(&log), TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.iterations, 0);
    assert_eq!(summary.stop_reason, StopReason::StopSignal);
    assert_eq!(renderer.presented(), 0);
    assert_eq!(*log.borrow(), ["open", "start", "stop", "close"]);
}

#[test]
fn renderer_can_end_the_run() {
    let log = CallLog::default();
    let mut pipeline = Pipeline::with_clock(PipelineConfig::default(), ManualClock::new());
    let mut renderer = QuitAfter {
        inner: canvas(),
        remaining: 3,
    };

    let summary = pipeline
        .run(&MockBackend::new(&log), TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.iterations, 3);
    assert_eq!(summary.stop_reason, StopReason::RendererRequested);
}

#[test]
fn short_buffers_wait_for_a_full_frame() {
    let log = CallLog::default();
    let backend = MockBackend {
        samples_per_poll: 100,
        ..MockBackend::new(&log)
    };
    let mut pipeline = Pipeline::with_clock(limited(4), ManualClock::new());
    let mut renderer = canvas();

    let summary = pipeline
        .run(&backend, TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.iterations, 4);
    assert_eq!(summary.frames_analyzed, 0);
    // Still presented every iteration
    assert_eq!(renderer.presented(), 4);
}

#[test]
fn partial_frames_are_zero_padded_and_counted() {
    let log = CallLog::default();
    let backend = MockBackend {
        samples_per_poll: 100,
        value: 500,
        ..MockBackend::new(&log)
    };
    let config = PipelineConfig {
        require_full_frame: false,
        ..limited(3)
    };
    let mut pipeline = Pipeline::with_clock(config, ManualClock::new());
    let mut renderer = canvas();

    let summary = pipeline
        .run(&backend, TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.frames_analyzed, 3);
    assert_eq!(summary.short_frames, 3);
    // 100 samples of DC dominate bin 0
    assert_eq!(renderer.last_marker().map(|p| p.bin), Some(0));
}

#[test]
fn tick_paces_each_iteration() {
    let log = CallLog::default();
    let clock = ManualClock::new();
    let config = PipelineConfig {
        tick: Duration::from_millis(10),
        ..limited(3)
    };
    let mut pipeline = Pipeline::with_clock(config, &clock);

    pipeline
        .run(&MockBackend::new(&log), TransformPlan::new, &mut canvas())
        .unwrap();

    assert_eq!(clock.slept(), Duration::from_millis(30));
}

#[test]
fn idle_iterations_keep_the_last_spectrum_on_screen() {
    let log = CallLog::default();
    let backend = MockBackend {
        value: 500,
        ready_every: 2,
        ..MockBackend::new(&log)
    };
    let mut pipeline = Pipeline::with_clock(limited(3), ManualClock::new());
    let mut renderer = canvas();

    let summary = pipeline
        .run(&backend, TransformPlan::new, &mut renderer)
        .unwrap();

    assert_eq!(summary.frames_analyzed, 1);
    assert_eq!(renderer.presented(), 3);
    let frame = renderer.last_frame().unwrap();
    assert!(frame.count(Pixel::Trace) > 0);
    assert!(frame.count(Pixel::Marker) > 0);
    assert_eq!(renderer.last_marker().map(|p| p.bin), Some(0));
}

#[test]
fn overruns_are_totalled_in_the_summary() {
    let backend = ToneBackend {
        samples_per_poll: Some(2048),
        ..ToneBackend::new(1000.0, 10000.0)
    };
    let mut pipeline = Pipeline::with_clock(limited(3), ManualClock::new());
    let mut renderer = canvas();

    let summary = pipeline
        .run(&backend, TransformPlan::new, &mut renderer)
        .unwrap();

    // Each poll offers 2048 samples to a 1024-sample ring
    assert_eq!(summary.frames_analyzed, 3);
    assert_eq!(summary.overruns, 3 * 1024);
}

#[test]
fn stop_signal_from_another_thread_ends_the_run() {
    let log = CallLog::default();
    let mut pipeline = Pipeline::with_clock(PipelineConfig::default(), ManualClock::new());
    let stop = pipeline.stop_signal();
    let mut renderer = canvas();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        stop.request();
    });
    let summary = pipeline
        .run(&MockBackend::new(&log), TransformPlan::new, &mut renderer)
        .unwrap();
    handle.join().unwrap();

    assert_eq!(summary.stop_reason, StopReason::StopSignal);
    assert_eq!(*log.borrow(), ["open", "start", "stop", "close"]);
    assert_eq!(pipeline.state().current(), PipelineState::Stopped);
}
