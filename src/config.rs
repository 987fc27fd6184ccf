// THEORY:
// Configuration is read once at startup and handed to the pieces that need it:
// timing builds the trigger, the outcome list builds the deck, the text table
// feeds the display and status lines, and the detector section says which helper
// to start. Every field has a default, so an empty or partial TOML file still
// yields a complete ritual (1.5 s reveal delay, 3 s cooldown, five readings).
// Values are validated where they are used, not here.

use crate::core_modules::debounced_trigger::DebouncedTrigger;
use crate::core_modules::overlay::OverlayStyle;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, loaded from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub outcomes: Vec<String>,
    pub timing: TimingConfig,
    pub text: TextConfig,
    pub detector: DetectorConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between an accepted gesture and the reveal.
    pub reveal_delay_ms: u64,
    /// Delay between the reveal and accepting the next gesture.
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub instruction: String,
    pub sensing: String,
    pub ready: String,
    pub failed_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Helper program that owns the camera and the hand model.
    pub command: String,
    pub args: Vec<String>,
    /// Line the helper prints once it is ready to stream frames.
    pub ready_signal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub width: u32,
    pub height: u32,
    pub connector_color: [u8; 4],
    pub point_color: [u8; 4],
    pub line_width: u32,
    pub point_radius: u32,
    /// When set, one PNG per frame is written here.
    pub output_dir: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            outcomes: default_outcomes(),
            timing: TimingConfig::default(),
            text: TextConfig::default(),
            detector: DetectorConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: 1500,
            cooldown_ms: 3000,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            instruction: "Point your index finger at the camera to draw a card.".to_string(),
            sensing: "Sensing your energy...".to_string(),
            ready: "Star engine ready".to_string(),
            failed_prefix: "Initialization failed: ".to_string(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["helpers/hand_detect.py".to_string()],
            ready_signal: "READY".to_string(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            width: 640,
            height: 480,
            connector_color: style.connector_color,
            point_color: style.point_color,
            line_width: style.line_width,
            point_radius: style.point_radius,
            output_dir: None,
        }
    }
}

fn default_outcomes() -> Vec<String> {
    [
        "[Major Arcana · The Fool] Innocence and a new journey. Let go of fear; the unknown is waiting for you.",
        "[Major Arcana · The High Priestess] Intuition and the subconscious. No action is needed now; listen to your inner voice.",
        "[Major Arcana · Wheel of Fortune] Irresistible change. Go with the tide; good fortune is coming around.",
        "[Major Arcana · The Star] Hope and healing. The long night is over; starlight will guide your way.",
        "[Major Arcana · The Hermit] Reflection and guidance. Look inward for answers instead of seeking approval outside.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl TimingConfig {
    pub fn trigger(&self) -> Result<DebouncedTrigger> {
        DebouncedTrigger::new(
            Duration::from_millis(self.reveal_delay_ms),
            Duration::from_millis(self.cooldown_ms),
        )
    }
}

impl OverlayConfig {
    pub fn style(&self) -> OverlayStyle {
        OverlayStyle {
            connector_color: self.connector_color,
            point_color: self.point_color,
            line_width: self.line_width,
            point_radius: self.point_radius,
        }
    }
}

impl OracleConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_ritual() {
        let config = OracleConfig::default();
        assert_eq!(config.timing.reveal_delay_ms, 1500);
        assert_eq!(config.timing.cooldown_ms, 3000);
        assert_eq!(config.outcomes.len(), 5);
        assert_eq!(config.timing.trigger().unwrap().window(), Duration::from_millis(4500));
        assert_eq!(config.overlay.style(), OverlayStyle::default());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: OracleConfig = toml::from_str(
            r#"
            outcomes = ["yes", "no"]

            [timing]
            cooldown_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.outcomes, vec!["yes".to_string(), "no".to_string()]);
        assert_eq!(config.timing.cooldown_ms, 500);
        assert_eq!(config.timing.reveal_delay_ms, 1500);
        assert_eq!(config.detector, DetectorConfig::default());
    }

    #[test]
    fn save_then_load_preserves_config() {
        let mut config = OracleConfig::default();
        config.overlay.output_dir = Some("frames".to_string());
        config.detector.args.push("--camera=1".to_string());

        let path = std::env::temp_dir().join("oracle_vision_config_test.toml");
        config.save(&path).expect("save config");
        let loaded = OracleConfig::load(&path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = OracleConfig::load("/nonexistent/oracle_vision.toml");
        assert!(matches!(result, Err(crate::error::OracleError::Io(_))));
    }
}
