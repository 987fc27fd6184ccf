// THEORY:
// The `pipeline` module is the top-level synchronous API of the oracle. It wires
// the pieces together for a single frame:
//
//   detected hands ─▶ first hand only ─▶ classifier ─▶ trigger ─▶ deck
//
// and keeps the text surface (`DisplayText`) in step with the trigger. The
// pipeline never reads a clock: every call takes `now`, so the same code is driven
// by a live tokio loop, by recorded timestamps in replay, or by a test.
//
// The caller feeds it frames (`process_frame`) and, between frames, timer ticks
// (`tick`) at the instant returned by `next_deadline`. Either call returns a
// `Report` describing what changed. Offline callers use `ReplayClock` to turn
// recorded timestamps into instants and `run_timers_until` to fire the deadlines
// that fell between two recorded frames.

use crate::config::OracleConfig;
use crate::core_modules::debounced_trigger::{DebouncedTrigger, TriggerEffect, TriggerState};
use crate::core_modules::gesture_classifier;
use crate::core_modules::landmark::LandmarkSet;
use crate::core_modules::outcome_deck::OutcomeDeck;
use crate::error::Result;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::outcome_deck::Reading;

/// What the text surface currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayText {
    /// Shown until the first gesture is accepted.
    Instruction(String),
    /// Shown from the moment a gesture is accepted until the reveal.
    Sensing(String),
    /// The latest reading; stays until the next gesture is accepted.
    Reading(Reading),
}

impl DisplayText {
    pub fn text(&self) -> &str {
        match self {
            DisplayText::Instruction(text) | DisplayText::Sensing(text) => text,
            DisplayText::Reading(reading) => &reading.text,
        }
    }
}

/// The outcome of one `process_frame` or `tick` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Nothing changed.
    NoChange,
    /// A pointing gesture started a new ritual.
    GestureAccepted { reveal_at: Instant },
    /// A pointing gesture arrived during cooldown and was dropped.
    GestureIgnored,
    /// The reveal delay elapsed and a reading was drawn.
    Revealed(Reading),
    /// The cooldown elapsed; the next gesture will be accepted.
    CooldownElapsed,
}

/// Running totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub gestures_accepted: u64,
    pub gestures_ignored: u64,
    pub readings: u64,
}

/// The main, top-level struct of the oracle.
pub struct OraclePipeline<R: Rng = StdRng> {
    trigger: DebouncedTrigger,
    state: TriggerState,
    deck: OutcomeDeck,
    rng: R,
    sensing_text: String,
    display: DisplayText,
    stats: SessionStats,
}

impl OraclePipeline<StdRng> {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng> OraclePipeline<R> {
    pub fn with_rng(config: &OracleConfig, rng: R) -> Result<Self> {
        Ok(Self {
            trigger: config.timing.trigger()?,
            state: TriggerState::Idle,
            deck: OutcomeDeck::new(config.outcomes.clone())?,
            rng,
            sensing_text: config.text.sensing.clone(),
            display: DisplayText::Instruction(config.text.instruction.clone()),
            stats: SessionStats::default(),
        })
    }

    /// Processes one detector frame. Only the first hand is considered.
    pub fn process_frame(&mut self, hands: &[LandmarkSet], now: Instant) -> Report {
        self.stats.frames += 1;
        let gesture_detected = hands.first().is_some_and(gesture_classifier::is_pointing);
        self.advance(gesture_detected, now)
    }

    /// Advances timers without a frame.
    pub fn tick(&mut self, now: Instant) -> Report {
        self.advance(false, now)
    }

    /// When the caller should `tick` next if no frame arrives first.
    pub fn next_deadline(&self) -> Option<Instant> {
        DebouncedTrigger::next_deadline(self.state)
    }

    pub fn display(&self) -> &DisplayText {
        &self.display
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn deck(&self) -> &OutcomeDeck {
        &self.deck
    }

    /// Fires every deadline at or before `now`, each at its own instant.
    pub fn run_timers_until(&mut self, now: Instant) -> Vec<(Instant, Report)> {
        let mut fired = Vec::new();
        while let Some(deadline) = self.next_deadline() {
            if deadline > now {
                break;
            }
            fired.push((deadline, self.tick(deadline)));
        }
        fired
    }

    /// Fires every pending deadline, letting the current ritual finish.
    pub fn run_pending_timers(&mut self) -> Vec<(Instant, Report)> {
        let mut fired = Vec::new();
        while let Some(deadline) = self.next_deadline() {
            fired.push((deadline, self.tick(deadline)));
        }
        fired
    }

    fn advance(&mut self, gesture_detected: bool, now: Instant) -> Report {
        let was_in_cooldown = self.state.in_cooldown();
        let transition = self.trigger.step(self.state, gesture_detected, now);
        self.state = transition.state;

        match transition.effect {
            Some(TriggerEffect::Armed { reveal_at }) => {
                self.stats.gestures_accepted += 1;
                self.display = DisplayText::Sensing(self.sensing_text.clone());
                debug!("Gesture accepted, reveal in {:?}", self.trigger.reveal_delay);
                Report::GestureAccepted { reveal_at }
            }
            Some(TriggerEffect::Reveal) => {
                let reading = self.deck.draw(&mut self.rng);
                self.stats.readings += 1;
                info!("Reading #{} revealed: {}", reading.index, reading.text);
                self.display = DisplayText::Reading(reading.clone());
                if gesture_detected {
                    self.stats.gestures_ignored += 1;
                }
                Report::Revealed(reading)
            }
            Some(TriggerEffect::Released) => {
                debug!("Cooldown elapsed");
                Report::CooldownElapsed
            }
            None if gesture_detected && was_in_cooldown => {
                self.stats.gestures_ignored += 1;
                Report::GestureIgnored
            }
            None => Report::NoChange,
        }
    }
}

/// Maps recorded frame timestamps onto a monotonic clock.
///
/// A frame without a usable timestamp (missing, negative, NaN or too large to
/// represent) is placed `fallback` after the previous one. The clock never runs
/// backwards.
#[derive(Debug, Clone, Copy)]
pub struct ReplayClock {
    origin: Instant,
    now: Instant,
    fallback: Duration,
}

impl ReplayClock {
    pub fn new(origin: Instant, fallback: Duration) -> Self {
        Self {
            origin,
            now: origin,
            fallback,
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Time since the origin of `at`, or zero if `at` is earlier.
    pub fn offset(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.origin)
    }

    /// Moves the clock to the frame's timestamp and returns the new instant.
    pub fn advance(&mut self, timestamp_ms: Option<f64>) -> Instant {
        let recorded = timestamp_ms.map(|ts| {
            Duration::try_from_secs_f64(ts / 1000.0)
                .ok()
                .and_then(|offset| self.origin.checked_add(offset))
                .ok_or(ts)
        });

        self.now = match recorded {
            Some(Ok(at)) => at.max(self.now),
            Some(Err(ts)) => {
                warn!("Unusable frame timestamp {} ms, assuming {:?} spacing", ts, self.fallback);
                self.step()
            }
            None => self.step(),
        };
        self.now
    }

    fn step(&self) -> Instant {
        self.now.checked_add(self.fallback).unwrap_or(self.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::gesture_classifier::{hand_with, pointing_hand};
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn pipeline() -> OraclePipeline<StdRng> {
        OraclePipeline::with_rng(&OracleConfig::default(), StdRng::seed_from_u64(3)).unwrap()
    }

    #[test]
    fn starts_with_instruction_text() {
        let pipeline = pipeline();
        let config = OracleConfig::default();
        assert_eq!(pipeline.display(), &DisplayText::Instruction(config.text.instruction));
        assert_eq!(pipeline.state(), TriggerState::Idle);
        assert_eq!(pipeline.next_deadline(), None);
    }

    #[test]
    fn full_ritual_updates_display_and_reports() {
        let mut pipeline = pipeline();
        let t0 = Instant::now();
        let hand = pointing_hand();

        let report = pipeline.process_frame(std::slice::from_ref(&hand), t0);
        assert_eq!(report, Report::GestureAccepted { reveal_at: t0 + ms(1500) });
        assert_eq!(pipeline.display().text(), OracleConfig::default().text.sensing);

        assert_eq!(pipeline.tick(t0 + ms(1499)), Report::NoChange);

        let reading = match pipeline.tick(t0 + ms(1500)) {
            Report::Revealed(reading) => reading,
            other => panic!("expected a reading, got {:?}", other),
        };
        assert!(reading.index < pipeline.deck().len());
        assert_eq!(pipeline.display(), &DisplayText::Reading(reading.clone()));

        // Still suppressed right up to D1 + D2.
        assert_eq!(
            pipeline.process_frame(std::slice::from_ref(&hand), t0 + ms(4499)),
            Report::GestureIgnored
        );
        assert_eq!(pipeline.tick(t0 + ms(4500)), Report::CooldownElapsed);
        assert_eq!(pipeline.state(), TriggerState::Idle);

        // The reading stays visible after the cooldown.
        assert_eq!(pipeline.display(), &DisplayText::Reading(reading));
    }

    #[test]
    fn repeated_gestures_during_cooldown_draw_nothing() {
        let mut pipeline = pipeline();
        let t0 = Instant::now();
        let hands = [pointing_hand()];

        pipeline.process_frame(&hands, t0);
        pipeline.process_frame(&hands, t0 + ms(100));
        // Hand held through the reveal at 1500 ms.
        for step in 2..=15 {
            pipeline.process_frame(&hands, t0 + ms(step * 100));
        }

        let stats = pipeline.stats();
        assert_eq!(stats.gestures_accepted, 1);
        assert_eq!(stats.readings, 1);
        assert_eq!(stats.gestures_ignored, 15);
        assert_eq!(stats.frames, 16);
    }

    #[test]
    fn only_the_first_hand_is_classified() {
        let mut pipeline = pipeline();
        let open_hand = hand_with(&[(6, 0.5), (8, 0.3), (10, 0.4), (12, 0.2)]);
        let report = pipeline.process_frame(&[open_hand, pointing_hand()], Instant::now());
        assert_eq!(report, Report::NoChange);
        assert_eq!(pipeline.stats().gestures_accepted, 0);
    }

    #[test]
    fn no_hands_is_no_gesture() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.process_frame(&[], Instant::now()), Report::NoChange);
        assert_eq!(pipeline.stats().frames, 1);
    }

    #[test]
    fn readings_cover_the_deck_over_many_rituals() {
        let mut pipeline = pipeline();
        let hands = [pointing_hand()];
        let mut t = Instant::now();
        let mut seen = vec![0usize; pipeline.deck().len()];

        for _ in 0..200 {
            pipeline.process_frame(&hands, t);
            t += ms(1500);
            if let Report::Revealed(reading) = pipeline.tick(t) {
                seen[reading.index] += 1;
            }
            t += ms(3000);
            pipeline.tick(t);
        }

        assert_eq!(seen.iter().sum::<usize>(), 200);
        assert!(seen.iter().all(|&count| count > 0), "distribution {:?}", seen);
    }

    #[test]
    fn replay_clock_follows_recorded_timestamps() {
        let origin = Instant::now();
        let mut clock = ReplayClock::new(origin, ms(33));

        assert_eq!(clock.advance(Some(0.0)), origin);
        assert_eq!(clock.advance(Some(250.0)), origin + ms(250));
        // Out-of-order frames never move the clock backwards.
        assert_eq!(clock.advance(Some(100.0)), origin + ms(250));
        assert_eq!(clock.advance(None), origin + ms(283));
        assert_eq!(clock.offset(clock.now()), ms(283));
    }

    #[test]
    fn replay_clock_steps_over_unusable_timestamps() {
        let origin = Instant::now();
        let mut clock = ReplayClock::new(origin, ms(33));

        assert_eq!(clock.advance(Some(1e300)), origin + ms(33));
        assert_eq!(clock.advance(Some(f64::MAX)), origin + ms(66));
        assert_eq!(clock.advance(Some(-5.0)), origin + ms(99));
        assert_eq!(clock.advance(Some(f64::NAN)), origin + ms(132));
        assert_eq!(clock.advance(Some(f64::INFINITY)), origin + ms(165));
        assert_eq!(clock.advance(Some(1000.0)), origin + ms(1000));
    }

    #[test]
    fn timers_fire_at_their_own_deadlines_between_frames() {
        let mut pipeline = pipeline();
        let t0 = Instant::now();
        pipeline.process_frame(&[pointing_hand()], t0);

        assert!(pipeline.run_timers_until(t0 + ms(1499)).is_empty());

        // A gap in the recording spans both the reveal and the end of cooldown.
        let fired = pipeline.run_timers_until(t0 + ms(10_000));
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].0, t0 + ms(1500));
        assert!(matches!(fired[0].1, Report::Revealed(_)));
        assert_eq!(fired[1], (t0 + ms(4500), Report::CooldownElapsed));
        assert_eq!(pipeline.state(), TriggerState::Idle);
    }

    #[test]
    fn pending_timers_finish_the_ritual() {
        let mut pipeline = pipeline();
        let t0 = Instant::now();
        pipeline.process_frame(&[pointing_hand()], t0);

        let fired = pipeline.run_pending_timers();
        let instants: Vec<Instant> = fired.iter().map(|(at, _)| *at).collect();
        assert_eq!(instants, vec![t0 + ms(1500), t0 + ms(4500)]);
        assert_eq!(pipeline.next_deadline(), None);
        assert!(pipeline.run_pending_timers().is_empty());
    }
}
