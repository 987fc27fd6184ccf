// THEORY:
// The `service` module is the live driver around `OraclePipeline`. It owns the
// pipeline outright and is the only code that ever touches it, so no locking is
// needed even though frames arrive asynchronously.
//
// Its loop waits on two things at once:
//   - the next detector frame (a `futures::Stream`), and
//   - the trigger's next deadline (reveal or end of cooldown), via `sleep_until`.
// Whichever comes first advances the pipeline. Deadlines win ties so a reveal is
// never delayed behind a burst of frames.
//
// Results leave the service through an `OracleBus`: a `watch` channel for the
// text surface (latest value wins), a `watch` for the status line, and two
// `broadcast` channels for per-frame landmarks (overlay rendering) and for
// reports. Nothing is cancelled: when the frame stream ends, the service keeps
// running until any pending reveal and cooldown complete.

use crate::detector::DetectionFrame;
use crate::pipeline::{DisplayText, OraclePipeline, Report, SessionStats};
use crate::config::TextConfig;
use futures::{Stream, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

const IDLE_WAKE: Duration = Duration::from_secs(3600);

/// The status line shown next to the text surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Initializing,
    Ready,
    Failed(String),
}

impl Status {
    pub fn line(&self, text: &TextConfig) -> String {
        match self {
            Status::Initializing => String::new(),
            Status::Ready => text.ready.clone(),
            Status::Failed(error) => format!("{}{}", text.failed_prefix, error),
        }
    }
}

/// A report plus the instant the service produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub at: std::time::Instant,
    pub report: Report,
}

/// Output channels of a running service.
pub struct OracleBus {
    pub display_tx: watch::Sender<DisplayText>,
    pub status_tx: watch::Sender<Status>,
    pub frames_tx: broadcast::Sender<Arc<DetectionFrame>>,
    pub events_tx: broadcast::Sender<ServiceEvent>,
}

impl OracleBus {
    pub fn new(initial: DisplayText, capacity: usize) -> Self {
        let (display_tx, _) = watch::channel(initial);
        let (status_tx, _) = watch::channel(Status::Initializing);
        let (frames_tx, _) = broadcast::channel(capacity.max(1));
        let (events_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            display_tx,
            status_tx,
            frames_tx,
            events_tx,
        }
    }
}

pub struct OracleService<R: Rng> {
    pipeline: OraclePipeline<R>,
    bus: OracleBus,
    last_timestamp_ms: Option<f64>,
}

impl<R: Rng> OracleService<R> {
    pub fn new(pipeline: OraclePipeline<R>, bus: OracleBus) -> Self {
        bus.display_tx.send_replace(pipeline.display().clone());
        Self {
            pipeline,
            bus,
            last_timestamp_ms: None,
        }
    }

    pub fn bus(&self) -> &OracleBus {
        &self.bus
    }

    /// Runs until `frames` ends and the current ritual, if any, has completed.
    pub async fn run<S>(mut self, frames: S) -> SessionStats
    where
        S: Stream<Item = DetectionFrame>,
    {
        let mut frames = std::pin::pin!(frames);
        self.bus.status_tx.send_replace(Status::Ready);

        loop {
            let deadline = self.pipeline.next_deadline();
            let wake = deadline
                .map(Instant::from_std)
                .unwrap_or_else(|| Instant::now() + IDLE_WAKE);

            tokio::select! {
                biased;
                _ = sleep_until(wake), if deadline.is_some() => {
                    let report = self.pipeline.tick(now());
                    self.publish(report);
                }
                frame = frames.next() => match frame {
                    Some(frame) => self.handle_frame(frame),
                    None => break,
                },
            }
        }

        debug!("Frame stream ended, finishing pending ritual");
        while let Some(deadline) = self.pipeline.next_deadline() {
            sleep_until(Instant::from_std(deadline)).await;
            let report = self.pipeline.tick(now());
            self.publish(report);
        }

        let stats = self.pipeline.stats();
        info!(
            "Session finished: {} frames, {} readings, {} gestures ignored",
            stats.frames, stats.readings, stats.gestures_ignored
        );
        stats
    }

    fn handle_frame(&mut self, frame: DetectionFrame) {
        // The same video frame can be reported twice; only new ones are classified.
        if let Some(ts) = frame.timestamp_ms {
            if self.last_timestamp_ms == Some(ts) {
                return;
            }
            self.last_timestamp_ms = Some(ts);
        }

        let report = self.pipeline.process_frame(&frame.hands, now());
        if self.bus.frames_tx.receiver_count() > 0 {
            let _ = self.bus.frames_tx.send(Arc::new(frame));
        }
        self.publish(report);
    }

    fn publish(&self, report: Report) {
        if report == Report::NoChange {
            return;
        }

        let display = self.pipeline.display();
        self.bus.display_tx.send_if_modified(|current| {
            if current != display {
                *current = display.clone();
                true
            } else {
                false
            }
        });

        let _ = self.bus.events_tx.send(ServiceEvent { at: now(), report });
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}
