//! Spectrum Scope Library
//!
//! Real-time audio spectrum analyzer: captures mono PCM from an input
//! device, transforms fixed-size frames with a forward FFT, finds the
//! dominant frequency and draws a live magnitude trace with a peak marker.

pub mod audio;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod render;
pub mod state;

use audio::{CpalBackend, SourceError, ToneBackend, TransformPlan};
use cli::Cli;
use config::{Config, ConfigError};
use pipeline::{Pipeline, PipelineConfig, PipelineError};
use render::{JsonLinesRenderer, RenderError, Renderer, TerminalRenderer};
use state::RunSummary;

use std::io::{self, Write};
use thiserror::Error;

/// Top-level errors, each mapped to a distinct process exit code
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Enumeration(#[from] SourceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to initialize renderer: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Enumeration(_) => 2,
            AppError::Pipeline(PipelineError::DeviceOpen(_)) => 3,
            AppError::Pipeline(PipelineError::DeviceRead(_)) => 4,
            AppError::Pipeline(PipelineError::Allocation(_) | PipelineError::Transform(_)) => 5,
            AppError::Pipeline(PipelineError::Render(_)) | AppError::Render(_) | AppError::Output(_) => 6,
            AppError::Config(_) => 64,
        }
    }
}

/// Resolve file configuration and command-line overrides
pub fn resolve_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match config::find_config(cli.config.as_deref()) {
        Some(path) => {
            let config = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            config
        }
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Run the analyzer as configured by the command line
pub fn run(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;

    if cli.list_devices {
        let devices = audio::list_input_devices()?;
        let mut out = io::stdout().lock();
        if cli.json {
            let json = serde_json::to_string(&devices).map_err(io::Error::from)?;
            writeln!(out, "{}", json)?;
        } else {
            for name in &devices {
                writeln!(out, "{}", name)?;
            }
        }
        return Ok(());
    }

    let mut pipeline_config = config.to_pipeline_config();

    if cli.tone.is_none() {
        // Diagnostic listing; an unusable enumeration API aborts startup
        let devices = audio::list_input_devices()?;
        for name in &devices {
            log::info!("Input device: {}", name);
        }
    }
    apply_default_tick(&cli, &mut pipeline_config);

    let summary = if cli.headless {
        let mut renderer = JsonLinesRenderer::new(io::stdout().lock());
        run_pipeline(&cli, pipeline_config, &mut renderer)?
    } else {
        let width = pipeline_config.scale.width(pipeline_config.capture.frame_len);
        let height = pipeline_config.scale.height as usize;
        let mut renderer = TerminalRenderer::new(width, height)?;
        run_pipeline(&cli, pipeline_config, &mut renderer)?
    };

    log::info!(
        "Analyzed {} frames in {} iterations ({} short, {} samples dropped)",
        summary.frames_analyzed,
        summary.iterations,
        summary.short_frames,
        summary.overruns
    );
    Ok(())
}

/// Tick at the frame period when no renderer wait paces the loop.
///
/// The JSON renderer never waits in `present` and the tone source makes a
/// frame ready on every poll. The terminal view waits the frame budget.
fn apply_default_tick(cli: &Cli, config: &mut PipelineConfig) {
    if config.tick.is_zero() && (cli.headless || cli.tone.is_some()) {
        config.tick = config.capture.frame_period();
        log::debug!("Loop tick set to the frame period, {:?}", config.tick);
    }
}

fn run_pipeline<R: Renderer>(
    cli: &Cli,
    config: PipelineConfig,
    renderer: &mut R,
) -> Result<RunSummary, PipelineError> {
    let mut pipeline = Pipeline::new(config);
    if cli.headless {
        // Raw mode hands Ctrl-C to the terminal view as a key instead
        let stop = pipeline.stop_signal();
        if let Err(e) = ctrlc::set_handler(move || stop.request()) {
            log::warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }
    match cli.tone {
        Some(frequency) => pipeline.run(
            &ToneBackend::new(frequency, cli.tone_amplitude),
            TransformPlan::new,
            renderer,
        ),
        None => pipeline.run(&CpalBackend, TransformPlan::new, renderer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{CaptureError, TransformError};
    use std::time::Duration;

    #[test]
    fn exit_codes_distinguish_failure_kinds() {
        let enumeration = AppError::from(SourceError::EnumerationUnsupported("no host".into()));
        let open = AppError::from(PipelineError::DeviceOpen(CaptureError::DeviceUnavailable));
        let read = AppError::from(PipelineError::DeviceRead(CaptureError::Read("xrun".into())));
        let alloc = AppError::from(PipelineError::Allocation(TransformError::InvalidSize));
        let config = AppError::from(ConfigError::Invalid("bad".into()));

        assert_eq!(enumeration.exit_code(), 2);
        assert_eq!(open.exit_code(), 3);
        assert_eq!(read.exit_code(), 4);
        assert_eq!(alloc.exit_code(), 5);
        assert_eq!(config.exit_code(), 64);
    }

    fn parsed(args: &[&str]) -> Cli {
        use clap::Parser;
        Cli::parse_from(std::iter::once("spectrum-scope").chain(args.iter().copied()))
    }

    #[test]
    fn headless_and_tone_runs_tick_at_the_frame_period() {
        let frame_period = Duration::from_secs_f64(1024.0 / 44100.0);

        for args in [&["--headless"][..], &["--tone", "440"][..]] {
            let mut config = PipelineConfig::default();
            apply_default_tick(&parsed(args), &mut config);
            assert_eq!(config.tick, frame_period, "{args:?}");
        }
    }

    #[test]
    fn terminal_device_runs_and_explicit_ticks_are_left_alone() {
        let mut config = PipelineConfig::default();
        apply_default_tick(&parsed(&[]), &mut config);
        assert_eq!(config.tick, Duration::ZERO);

        let mut config = PipelineConfig {
            tick: Duration::from_millis(20),
            ..Default::default()
        };
        apply_default_tick(&parsed(&["--headless"]), &mut config);
        assert_eq!(config.tick, Duration::from_millis(20));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = parsed(&["--config", "/nonexistent/spectrum-scope.toml"]);

        assert!(matches!(
            resolve_config(&cli),
            Err(ConfigError::Read { .. })
        ));
    }
}
