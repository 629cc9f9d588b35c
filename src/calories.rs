//! Calorie estimation from MET values
//!
//! `calories = baseMET * repMultiplier * formMultiplier * weight_kg * hours`,
//! floored at half a calorie per repetition.

use crate::types::ExerciseKind;
use serde::{Deserialize, Serialize};

/// Intensity tier chosen from the frame's form score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    /// >= 85 is high, >= 70 is medium, anything else is low
    pub fn from_score(intensity_score: f64) -> Self {
        if intensity_score >= 85.0 {
            Self::High
        } else if intensity_score >= 70.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Compendium-style MET value for an exercise family at a given intensity
pub fn met_value(exercise: ExerciseKind, intensity: Intensity) -> f64 {
    use ExerciseKind::*;
    use Intensity::*;
    match (exercise, intensity) {
        (Squat, Low) => 3.5,
        (Squat, Medium) => 5.0,
        (Squat, High) => 8.0,
        (Deadlift, Low) => 3.5,
        (Deadlift, Medium) => 6.0,
        (Deadlift, High) => 9.0,
        (OverheadPress, Low) => 3.0,
        (OverheadPress, Medium) => 5.0,
        (OverheadPress, High) => 7.0,
        (BenchPress, Low) => 3.5,
        (BenchPress, Medium) => 5.0,
        (BenchPress, High) => 6.0,
        (Plank, Low) => 2.8,
        (Plank, Medium) => 3.8,
        (Plank, High) => 4.5,
        (Generic, Low) => 3.0,
        (Generic, Medium) => 4.5,
        (Generic, High) => 6.0,
    }
}

/// Calories burned over `duration_seconds` of work.
///
/// Negative or non-finite durations count as zero. The result is never below
/// `reps * 0.5`, so any completed repetition registers some expenditure.
pub fn calculate_calories_burned(
    exercise: ExerciseKind,
    duration_seconds: f64,
    reps: u32,
    intensity_score: f64,
    body_weight_kg: f64,
) -> f64 {
    let intensity_score = if intensity_score.is_finite() {
        intensity_score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let duration = if duration_seconds.is_finite() { duration_seconds.max(0.0) } else { 0.0 };
    let weight = if body_weight_kg.is_finite() { body_weight_kg.max(0.0) } else { 0.0 };

    let base_met = met_value(exercise, Intensity::from_score(intensity_score));
    let rep_multiplier = 1.0 + 0.02 * reps as f64;
    let form_multiplier = 0.8 + (intensity_score / 100.0) * 0.4;
    let adjusted_met = base_met * rep_multiplier * form_multiplier;

    let calories = adjusted_met * weight * (duration / 3600.0);
    calories.max(reps as f64 * 0.5)
}
