//! Engine configuration
//!
//! Every threshold the analyzers use lives here so deployments can tune them
//! from a TOML file without recompiling. Missing keys fall back to defaults.

use crate::error::Result;
use crate::types::BodyProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum detector confidence for a required landmark
    pub min_visibility: f64,

    /// Seed for coaching phrase selection; `None` seeds from entropy
    pub feedback_seed: Option<u64>,

    /// Capacity of the outbound persistence / live-cue channels
    pub channel_capacity: usize,

    /// Profile used when a session is started without one
    pub default_profile: BodyProfile,

    pub squat: SquatConfig,
    pub deadlift: DeadliftConfig,
    pub overhead_press: OverheadPressConfig,
    pub bench_press: BenchPressConfig,
    pub plank: PlankConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.7,
            feedback_seed: None,
            channel_capacity: 256,
            default_profile: BodyProfile::default(),
            squat: SquatConfig::default(),
            deadlift: DeadliftConfig::default(),
            overhead_press: OverheadPressConfig::default(),
            bench_press: BenchPressConfig::default(),
            plank: PlankConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Pretty TOML rendering, used by `pose-coach config`
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquatConfig {
    /// Inward knee travel past the ankle that counts as valgus
    pub valgus_threshold: f64,
    /// Extra spine flexion at the bottom, in degrees, that counts as butt wink
    pub butt_wink_threshold: f64,
}

impl Default for SquatConfig {
    fn default() -> Self {
        Self {
            valgus_threshold: 0.02,
            butt_wink_threshold: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadliftConfig {
    /// Horizontal bar distance from mid-foot that is penalized
    pub bar_drift_threshold: f64,
    /// Number of bar positions kept for the path-consistency metric
    pub bar_path_window: usize,
}

impl Default for DeadliftConfig {
    fn default() -> Self {
        Self {
            bar_drift_threshold: 0.10,
            bar_path_window: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverheadPressConfig {
    /// Horizontal bar distance from the face that is penalized
    pub bar_deviation_threshold: f64,
    /// Shoulder-to-ear distance below which shoulders count as shrugged
    pub shrug_distance: f64,
}

impl Default for OverheadPressConfig {
    fn default() -> Self {
        Self {
            bar_deviation_threshold: 0.10,
            shrug_distance: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchPressConfig {
    /// Ideal elbow-to-torso angle window, degrees
    pub elbow_window: (f64, f64),
    /// Allowed touch-point deviation as a fraction of torso length
    pub touch_point_tolerance: f64,
    /// Wrist extension beyond which the wrist counts as bent back, degrees
    pub wrist_extension_limit: f64,
}

impl Default for BenchPressConfig {
    fn default() -> Self {
        Self {
            elbow_window: (45.0, 75.0),
            touch_point_tolerance: 0.10,
            wrist_extension_limit: 30.0,
        }
    }
}

/// Plank fatigue and hold heuristics. The constants are empirical and kept
/// configurable rather than derived from a physiological model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlankConfig {
    /// Rolling window of hip-height samples (~1s at 30fps)
    pub tremor_window: usize,
    /// Mean frame-to-frame hip delta for high fatigue
    pub tremor_high: f64,
    /// Mean frame-to-frame hip delta for medium fatigue
    pub tremor_medium: f64,
    pub maintain_after_secs: f64,
    pub endurance_after_secs: f64,
    /// Score at which the hold timer starts
    pub hold_enter_score: f64,
    /// Score below which the hold breaks and the timer resets
    pub hold_break_score: f64,
}

impl Default for PlankConfig {
    fn default() -> Self {
        Self {
            tremor_window: 30,
            tremor_high: 0.005,
            tremor_medium: 0.002,
            maintain_after_secs: 20.0,
            endurance_after_secs: 45.0,
            hold_enter_score: 70.0,
            hold_break_score: 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            min_visibility = 0.5
            feedback_seed = 7

            [plank]
            tremor_window = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.min_visibility, 0.5);
        assert_eq!(config.feedback_seed, Some(7));
        assert_eq!(config.plank.tremor_window, 15);
        assert_eq!(config.plank.maintain_after_secs, 20.0);
        assert_eq!(config.squat, SquatConfig::default());
        assert_eq!(config.default_profile.weight_kg, 70.0);
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("min_visibility = \"high\"").unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Config(_)));
    }
}
