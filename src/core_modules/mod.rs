pub mod debounced_trigger;
pub mod gesture_classifier;
pub mod landmark;
pub mod outcome_deck;
pub mod overlay;
pub mod utils;
