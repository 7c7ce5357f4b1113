//! Pipeline state machine bookkeeping

/// Pipeline driver states.
///
/// `Idle -> DeviceOpen -> Capturing -> (Draining -> Transforming -> Analyzing
/// -> Rendering)* -> Stopped`, with any failure jumping straight to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    DeviceOpen,
    Capturing,
    Draining,
    Transforming,
    Analyzing,
    Rendering,
    Stopped,
}

impl PipelineState {
    /// Per-iteration stages of the capture loop
    pub fn is_stage(self) -> bool {
        matches!(
            self,
            PipelineState::Draining
                | PipelineState::Transforming
                | PipelineState::Analyzing
                | PipelineState::Rendering
        )
    }
}

/// Why the capture loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// External stop signal observed at the loop top
    StopSignal,
    /// The renderer asked to stop (window closed, quit key)
    RendererRequested,
    /// Configured frame limit reached
    FrameLimit,
}

/// Current state plus the lifecycle transitions taken so far.
///
/// Loop stages only update `current`; recording them would grow without bound.
#[derive(Debug, Clone)]
pub struct StateLog {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl StateLog {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn enter(&mut self, state: PipelineState) {
        if state.is_stage() {
            log::trace!("Pipeline stage: {:?}", state);
        } else {
            log::info!("Pipeline state: {:?} -> {:?}", self.current, state);
            self.history.push(state);
        }
        self.current = state;
    }
}

impl Default for StateLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Loop iterations started
    pub iterations: u64,

    /// Frames transformed and analyzed
    pub frames_analyzed: u64,

    /// Analyzed frames drained with fewer than N samples
    pub short_frames: u64,

    /// Samples the device dropped because the loop fell behind
    pub overruns: u64,

    pub stop_reason: StopReason,
}
