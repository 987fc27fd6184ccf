// Replays a recorded detector session (one JSON frame per line) through the
// oracle pipeline, using the recorded timestamps as the clock. Optionally writes
// one overlay PNG per frame.

use anyhow::{Context, Result};
use clap::Parser;
use oracle_vision::config::OracleConfig;
use oracle_vision::core_modules::overlay;
use oracle_vision::detector::{DetectionFrame, decode_frame};
use oracle_vision::pipeline::{OraclePipeline, ReplayClock, Report};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Frame spacing assumed when a recorded frame has no timestamp.
const FALLBACK_FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Replay a recorded landmark stream through the oracle")]
struct Cli {
    /// Recorded detector output, one JSON frame per line
    input: PathBuf,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write one overlay PNG per frame into this directory
    #[arg(long)]
    overlay_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oracle_vision=info,replay=info".into()),
        )
        .init();

    let config = match &cli.config {
        Some(path) => OracleConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OracleConfig::default(),
    };
    if let Some(dir) = &cli.overlay_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create overlay directory {}", dir.display()))?;
    }

    let input = File::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;

    let mut pipeline = OraclePipeline::new(&config).context("Invalid oracle configuration")?;
    let style = config.overlay.style();
    let mut clock = ReplayClock::new(Instant::now(), FALLBACK_FRAME_INTERVAL);
    let mut frame_index = 0u64;

    println!("{}", pipeline.display().text());

    for line in BufReader::new(input).lines() {
        let line = line.context("Failed to read input")?;
        let line = line.trim();
        if line.is_empty() || line == config.detector.ready_signal {
            continue;
        }

        let frame = decode_frame(line).unwrap_or_else(|e| {
            warn!("Malformed frame on input: {}", e);
            DetectionFrame::default()
        });
        let now = clock.advance(frame.timestamp_ms);

        for (at, report) in pipeline.run_timers_until(now) {
            announce(&pipeline, &report, clock.offset(at));
        }
        let report = pipeline.process_frame(&frame.hands, now);
        announce(&pipeline, &report, clock.offset(now));

        if let Some(dir) = &cli.overlay_dir {
            let canvas = overlay::render(config.overlay.width, config.overlay.height, &frame.hands, &style);
            let path = dir.join(format!("frame_{:06}.png", frame_index));
            overlay::save_png(&canvas, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        frame_index += 1;
    }

    // Let the last ritual finish, as a live session would.
    for (at, report) in pipeline.run_pending_timers() {
        announce(&pipeline, &report, clock.offset(at));
    }

    let stats = pipeline.stats();
    info!(
        "Replayed {} frames: {} gestures accepted, {} ignored, {} readings",
        stats.frames, stats.gestures_accepted, stats.gestures_ignored, stats.readings
    );
    Ok(())
}

fn announce(pipeline: &OraclePipeline, report: &Report, at: Duration) {
    match report {
        Report::GestureAccepted { .. } | Report::Revealed(_) => {
            println!("[{:>8.3}s] {}", at.as_secs_f64(), pipeline.display().text());
        }
        Report::CooldownElapsed => info!("[{:>8.3}s] ready for the next gesture", at.as_secs_f64()),
        Report::GestureIgnored | Report::NoChange => {}
    }
}
