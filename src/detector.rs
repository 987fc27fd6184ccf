// THEORY:
// The hand-landmark model, the camera and the GPU delegate all live outside this
// crate. They are owned by a helper process (typically a small MediaPipe script)
// which this module starts and then listens to. The contract is line based:
//
//   READY                                   <- once, after the model has loaded
//   {"timestamp_ms": 33.4, "hands": [...]}  <- one JSON object per video frame
//
// Decoding is lenient. A line that cannot be parsed, a frame that reports an
// `error`, or a hand with the wrong number of landmarks is logged and becomes
// "no hand" for that frame. Only failures before the helper is ready are
// surfaced as errors.

use crate::config::DetectorConfig;
use crate::core_modules::landmark::{Landmark, LandmarkSet};
use crate::error::{OracleError, Result};
use futures::Stream;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

/// One video frame as reported by the detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionFrame {
    /// Presentation time of the video frame, if the helper reports it.
    pub timestamp_ms: Option<f64>,
    /// Every well-formed hand in the frame, in detector order.
    pub hands: Vec<LandmarkSet>,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    score: Option<f32>,
    landmarks: Vec<Landmark>,
}

#[derive(Deserialize, Debug)]
struct FrameJson {
    #[serde(default)]
    timestamp_ms: Option<f64>,
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Strictly decodes one JSON line. Malformed hands are dropped, malformed JSON is an error.
pub fn decode_frame(line: &str) -> Result<DetectionFrame> {
    let raw: FrameJson = serde_json::from_str(line)?;

    if let Some(error) = raw.error {
        warn!("Detector reported an error: {}", error);
        return Ok(DetectionFrame {
            timestamp_ms: raw.timestamp_ms,
            hands: Vec::new(),
        });
    }

    let mut hands = Vec::with_capacity(raw.hands.len());
    for hand in raw.hands {
        match LandmarkSet::from_points(&hand.landmarks) {
            Ok(set) => {
                debug!(
                    "Hand detected: {} (score={:.2})",
                    hand.handedness.as_deref().unwrap_or("unknown"),
                    hand.score.unwrap_or(f32::NAN)
                );
                hands.push(set);
            }
            Err(e) => warn!("Dropping hand: {}", e),
        }
    }

    Ok(DetectionFrame {
        timestamp_ms: raw.timestamp_ms,
        hands,
    })
}

/// Reads detection frames from any line-oriented async source.
pub struct FrameReader<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Waits for the helper's readiness line. Blank lines are skipped.
    pub async fn wait_ready(&mut self, signal: &str) -> Result<()> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) if line.trim() == signal => return Ok(()),
                Some(line) => return Err(OracleError::DetectorNotReady(line)),
                None => return Err(OracleError::DetectorClosed),
            }
        }
    }

    /// Next frame, or `None` at end of stream. Undecodable lines become empty frames.
    pub async fn next_frame(&mut self) -> Result<Option<DetectionFrame>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(decode_frame(&line).unwrap_or_else(|e| {
                warn!("Malformed detector frame: {}", e);
                DetectionFrame::default()
            })));
        }
    }

    /// Turns the reader into a stream that ends at EOF or on the first read error.
    pub fn into_stream(self) -> impl Stream<Item = DetectionFrame> {
        frame_stream(self, ())
    }
}

// `guard` rides along with the reader and is dropped when the stream is.
fn frame_stream<R, G>(reader: FrameReader<R>, guard: G) -> impl Stream<Item = DetectionFrame>
where
    R: AsyncBufRead + Unpin,
{
    futures::stream::unfold((reader, guard), |(mut reader, guard)| async move {
        match reader.next_frame().await {
            Ok(Some(frame)) => Some((frame, (reader, guard))),
            Ok(None) => None,
            Err(e) => {
                warn!("Detector stream failed: {}", e);
                None
            }
        }
    })
}

/// The running helper process plus its decoded output.
pub struct HandDetector {
    child: Child,
    reader: FrameReader<BufReader<ChildStdout>>,
}

impl HandDetector {
    /// Starts the helper and waits until it reports ready.
    pub async fn spawn(config: &DetectorConfig) -> Result<Self> {
        info!("Starting hand detector: {} {:?}", config.command, config.args);
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OracleError::DetectorSpawn {
                command: config.command.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(OracleError::DetectorClosed)?;
        let mut reader = FrameReader::new(BufReader::new(stdout));
        reader.wait_ready(&config.ready_signal).await?;
        info!("Hand detector ready");

        Ok(Self { child, reader })
    }

    /// Streams frames; the helper is killed when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = DetectionFrame> {
        frame_stream(self.reader, self.child)
    }
}

#[cfg(test)]
pub(crate) fn frame_json(timestamp_ms: f64, hand: Option<&LandmarkSet>) -> String {
    let hands: Vec<serde_json::Value> = hand
        .into_iter()
        .map(|set| {
            serde_json::json!({
                "handedness": "Right",
                "score": 0.95,
                "landmarks": set.points().to_vec(),
            })
        })
        .collect();
    serde_json::json!({ "timestamp_ms": timestamp_ms, "hands": hands }).to_string()
}
