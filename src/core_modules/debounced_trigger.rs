// THEORY:
// The `debounced_trigger` module turns a noisy per-frame boolean ("is the hand
// pointing right now?") into at most one reading per ritual. It is a small timed
// state machine driven by an external clock:
//
//   Idle ──gesture──▶ Revealing ──reveal_at──▶ CoolingDown ──release_at──▶ Idle
//
// Revealing and CoolingDown together form the "cooldown" window: any gesture seen
// while in either of them is ignored, never queued.
//
// Key architectural principles:
// 1.  **Owned state, pure transition**: `TriggerState` is a plain value owned by
//     the caller. `DebouncedTrigger::step` maps (state, gesture, now) to the next
//     state and at most one effect. There is no hidden flag and no timer thread.
// 2.  **Sequential delays**: the cooldown only starts counting when the reveal has
//     actually fired, so a late clock tick stretches the window instead of
//     shortening it.
// 3.  **One deadline at a time**: a step crosses at most one deadline. A caller
//     that was asleep for a long time cannot skip the reveal; it just needs one more
//     step, which `next_deadline` tells it about.
// 4.  **No cancellation**: once armed, the ritual always runs to completion.

use crate::error::{OracleError, Result};
use std::time::{Duration, Instant};

/// The trigger's lifecycle. `Idle` is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    /// Ready to accept a gesture.
    #[default]
    Idle,
    /// A gesture was accepted; the reading is revealed at `reveal_at`.
    Revealing { reveal_at: Instant },
    /// The reading is visible; new gestures are accepted again from `release_at`.
    CoolingDown { release_at: Instant },
}

impl TriggerState {
    /// True while new gestures are being suppressed.
    pub fn in_cooldown(&self) -> bool {
        !matches!(self, TriggerState::Idle)
    }
}

/// The side effect requested by a single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEffect {
    /// A gesture was accepted; show the waiting message until `reveal_at`.
    Armed { reveal_at: Instant },
    /// The reveal delay elapsed; draw and show a reading now.
    Reveal,
    /// The cooldown elapsed; the next gesture will be accepted.
    Released,
}

/// Result of `DebouncedTrigger::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: TriggerState,
    pub effect: Option<TriggerEffect>,
}

impl Transition {
    fn stay(state: TriggerState) -> Self {
        Self { state, effect: None }
    }
}

/// Timing parameters of the trigger. Holds no per-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncedTrigger {
    /// Delay between accepting a gesture and revealing the reading.
    pub reveal_delay: Duration,
    /// Delay between the reveal and accepting the next gesture.
    pub cooldown: Duration,
}

impl DebouncedTrigger {
    pub fn new(reveal_delay: Duration, cooldown: Duration) -> Result<Self> {
        if reveal_delay.checked_add(cooldown).is_none() {
            return Err(OracleError::InvalidTiming("reveal delay plus cooldown overflows"));
        }
        Ok(Self {
            reveal_delay,
            cooldown,
        })
    }

    /// Total time a ritual keeps the trigger busy when the clock is punctual.
    pub fn window(&self) -> Duration {
        self.reveal_delay + self.cooldown
    }

    /// Advances the state machine for one observation at time `now`.
    pub fn step(&self, state: TriggerState, gesture_detected: bool, now: Instant) -> Transition {
        match state {
            TriggerState::Idle if gesture_detected => self.arm(now),
            TriggerState::Idle => Transition::stay(state),
            TriggerState::Revealing { reveal_at } if now >= reveal_at => Transition {
                state: TriggerState::CoolingDown {
                    release_at: now + self.cooldown,
                },
                effect: Some(TriggerEffect::Reveal),
            },
            TriggerState::CoolingDown { release_at } if now >= release_at => {
                if gesture_detected {
                    self.arm(now)
                } else {
                    Transition {
                        state: TriggerState::Idle,
                        effect: Some(TriggerEffect::Released),
                    }
                }
            }
            // Gestures during cooldown are dropped.
            TriggerState::Revealing { .. } | TriggerState::CoolingDown { .. } => {
                Transition::stay(state)
            }
        }
    }

    /// Advances the clock without an observation (a timer tick).
    pub fn poll(&self, state: TriggerState, now: Instant) -> Transition {
        self.step(state, false, now)
    }

    /// The next instant at which `poll` would change the state, if any.
    pub fn next_deadline(state: TriggerState) -> Option<Instant> {
        match state {
            TriggerState::Idle => None,
            TriggerState::Revealing { reveal_at } => Some(reveal_at),
            TriggerState::CoolingDown { release_at } => Some(release_at),
        }
    }

    fn arm(&self, now: Instant) -> Transition {
        let reveal_at = now + self.reveal_delay;
        Transition {
            state: TriggerState::Revealing { reveal_at },
            effect: Some(TriggerEffect::Armed { reveal_at }),
        }
    }
}

impl Default for DebouncedTrigger {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_millis(1500),
            cooldown: Duration::from_millis(3000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Feeds the trigger a frame every `frame_ms` and collects (time, effect) pairs.
    fn run(
        trigger: &DebouncedTrigger,
        frames: u64,
        frame_ms: u64,
        gesture: impl Fn(u64) -> bool,
    ) -> (TriggerState, Vec<(u64, TriggerEffect)>) {
        let t0 = Instant::now();
        let mut state = TriggerState::Idle;
        let mut effects = Vec::new();
        for frame in 0..frames {
            let at = frame * frame_ms;
            let transition = trigger.step(state, gesture(at), t0 + ms(at));
            state = transition.state;
            if let Some(effect) = transition.effect {
                effects.push((at, effect));
            }
        }
        (state, effects)
    }

    #[test]
    fn starts_idle_and_ignores_no_gesture() {
        let trigger = DebouncedTrigger::default();
        let now = Instant::now();
        let transition = trigger.step(TriggerState::Idle, false, now);
        assert_eq!(transition, Transition::stay(TriggerState::Idle));
        assert_eq!(DebouncedTrigger::next_deadline(TriggerState::Idle), None);
    }

    #[test]
    fn gesture_arms_then_reveals_then_releases() {
        let trigger = DebouncedTrigger::default();
        let t0 = Instant::now();

        let armed = trigger.step(TriggerState::Idle, true, t0);
        assert_eq!(armed.effect, Some(TriggerEffect::Armed { reveal_at: t0 + ms(1500) }));
        assert!(armed.state.in_cooldown());

        let early = trigger.poll(armed.state, t0 + ms(1499));
        assert_eq!(early.effect, None);

        let revealed = trigger.poll(early.state, t0 + ms(1500));
        assert_eq!(revealed.effect, Some(TriggerEffect::Reveal));
        assert_eq!(
            revealed.state,
            TriggerState::CoolingDown { release_at: t0 + ms(4500) }
        );

        let still_busy = trigger.poll(revealed.state, t0 + ms(4499));
        assert!(still_busy.state.in_cooldown());

        let released = trigger.poll(still_busy.state, t0 + ms(4500));
        assert_eq!(released.effect, Some(TriggerEffect::Released));
        assert_eq!(released.state, TriggerState::Idle);
    }

    #[test]
    fn second_gesture_100ms_later_is_ignored() {
        let trigger = DebouncedTrigger::default();
        let (_, effects) = run(&trigger, 60, 100, |at| at == 0 || at == 100);

        let reveals = effects.iter().filter(|(_, e)| *e == TriggerEffect::Reveal).count();
        let arms = effects
            .iter()
            .filter(|(_, e)| matches!(e, TriggerEffect::Armed { .. }))
            .count();
        assert_eq!(arms, 1);
        assert_eq!(reveals, 1);
    }

    #[test]
    fn continuous_gesture_yields_one_reading_per_window() {
        let trigger = DebouncedTrigger::default();
        // 10 seconds at 10 ms per frame with the hand held the whole time.
        let (_, effects) = run(&trigger, 1_000, 10, |_| true);

        let reveal_times: Vec<u64> = effects
            .iter()
            .filter(|(_, e)| *e == TriggerEffect::Reveal)
            .map(|(at, _)| *at)
            .collect();
        // Armed at 0, 4500, 9000; revealed at 1500 and 6000.
        assert_eq!(reveal_times, vec![1500, 6000]);

        // Release and re-arm collapse into one effect when the hand is still up.
        assert!(!effects.iter().any(|(_, e)| *e == TriggerEffect::Released));
    }

    #[test]
    fn late_tick_cannot_skip_the_reveal() {
        let trigger = DebouncedTrigger::default();
        let t0 = Instant::now();
        let armed = trigger.step(TriggerState::Idle, true, t0);

        // Woken up long after both deadlines would have passed.
        let late = t0 + ms(10_000);
        let revealed = trigger.step(armed.state, true, late);
        assert_eq!(revealed.effect, Some(TriggerEffect::Reveal));

        // Cooldown counts from the moment the reveal actually fired.
        assert_eq!(
            DebouncedTrigger::next_deadline(revealed.state),
            Some(late + ms(3000))
        );
    }

    #[test]
    fn zero_delays_still_take_one_step_per_phase() {
        let trigger = DebouncedTrigger::new(Duration::ZERO, Duration::ZERO).unwrap();
        let t0 = Instant::now();
        let armed = trigger.step(TriggerState::Idle, true, t0);
        let revealed = trigger.step(armed.state, true, t0);
        assert_eq!(revealed.effect, Some(TriggerEffect::Reveal));
        let released = trigger.step(revealed.state, false, t0);
        assert_eq!(released.effect, Some(TriggerEffect::Released));
    }

    #[test]
    fn overflowing_timing_is_rejected() {
        assert!(matches!(
            DebouncedTrigger::new(Duration::MAX, ms(1)),
            Err(OracleError::InvalidTiming(_))
        ));
        assert_eq!(DebouncedTrigger::default().window(), ms(4500));
    }
}
