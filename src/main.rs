use anyhow::{Context, Result};
use clap::Parser;
use oracle_vision::config::OracleConfig;
use oracle_vision::core_modules::overlay;
use oracle_vision::detector::{DetectionFrame, HandDetector};
use oracle_vision::pipeline::OraclePipeline;
use oracle_vision::service::{OracleBus, OracleService, Status};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "oracle_vision.toml";
const BUS_CAPACITY: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "oracle_vision", about = "Point at the camera, receive a reading")]
struct Cli {
    /// Path to a TOML config file (defaults to ./oracle_vision.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write one overlay PNG per frame into this directory
    #[arg(long)]
    overlay_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oracle_vision=info".into()),
        )
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.overlay_dir {
        config.overlay.output_dir = Some(dir.to_string_lossy().into_owned());
    }

    let pipeline = OraclePipeline::new(&config).context("Invalid oracle configuration")?;
    let bus = OracleBus::new(pipeline.display().clone(), BUS_CAPACITY);
    let service = OracleService::new(pipeline, bus);

    let mut display_rx = service.bus().display_tx.subscribe();
    let mut status_rx = service.bus().status_tx.subscribe();
    let text = config.text.clone();
    let printer = tokio::spawn(async move {
        println!("{}", display_rx.borrow_and_update().text());
        loop {
            tokio::select! {
                changed = display_rx.changed() => {
                    if changed.is_err() { break; }
                    println!("{}", display_rx.borrow_and_update().text());
                }
                changed = status_rx.changed() => {
                    if changed.is_err() { break; }
                    println!("[{}]", status_rx.borrow_and_update().line(&text));
                }
            }
        }
    });

    let overlay_writer = config.overlay.output_dir.clone().map(|dir| {
        let frames_rx = service.bus().frames_tx.subscribe();
        tokio::spawn(write_overlays(frames_rx, PathBuf::from(dir), config.clone()))
    });

    let detector = match HandDetector::spawn(&config.detector).await {
        Ok(detector) => detector,
        Err(e) => {
            let status = Status::Failed(e.to_string());
            service.bus().status_tx.send_replace(status.clone());
            eprintln!("{}", status.line(&config.text));
            return Err(e).context("Hand detector failed to start");
        }
    };

    tokio::select! {
        stats = service.run(detector.into_stream()) => {
            info!(
                "Done: {} frames, {} gestures accepted, {} readings",
                stats.frames, stats.gestures_accepted, stats.readings
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping detector");
        }
    }

    printer.await.ok();
    if let Some(writer) = overlay_writer {
        writer.await.ok();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OracleConfig> {
    match path {
        Some(path) => OracleConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => OracleConfig::load(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG)),
        None => Ok(OracleConfig::default()),
    }
}

async fn write_overlays(
    mut frames_rx: broadcast::Receiver<Arc<DetectionFrame>>,
    dir: PathBuf,
    config: OracleConfig,
) {
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        warn!("Cannot create overlay directory {}: {}", dir.display(), e);
        return;
    }

    let style = config.overlay.style();
    let mut index = 0u64;
    loop {
        let frame = match frames_rx.recv().await {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Overlay writer fell behind, skipped {} frames", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let path = dir.join(format!("frame_{:06}.png", index));
        index += 1;
        let style = style.clone();
        let (width, height) = (config.overlay.width, config.overlay.height);
        let result = tokio::task::spawn_blocking(move || {
            let canvas = overlay::render(width, height, &frame.hands, &style);
            overlay::save_png(&canvas, &path)
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to write overlay: {}", e),
            Err(e) => warn!("Overlay task panicked: {}", e),
        }
    }
}
