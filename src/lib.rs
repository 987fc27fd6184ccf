// THEORY:
// This file is the main entry point for the `oracle_vision` library crate.
// It exposes the `OraclePipeline` (synchronous, one call per frame) and the
// `OracleService` (async driver fed by a detector stream) as the high-level
// interface. The building blocks live in `core_modules`:
//
//   landmark           - the 21-point hand skeleton produced by the external model
//   gesture_classifier - the pure "is this hand pointing?" rule
//   debounced_trigger  - the timed state machine that turns gestures into rituals
//   outcome_deck       - the fixed list of readings and uniform selection
//   overlay            - skeleton drawing for visual feedback
//
// Camera capture and the hand model itself are not part of this crate; they are
// reached through the `detector` module, which talks to an external helper.

pub mod config;
pub mod core_modules;
pub mod detector;
pub mod error;
pub mod pipeline;
pub mod service;
