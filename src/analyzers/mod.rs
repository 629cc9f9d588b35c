//! Exercise analyzers - per-frame scoring, phase tracking and violations
//!
//! Each exercise family implements [`ExerciseAnalyzer`]. Analyzers own only
//! their rolling buffers (rep counters, bar path, tremor samples); one
//! analyzer instance belongs to exactly one session.
//!
//! Shared services live here as free functions: spine/torso measures, the
//! injury-risk model, motion tracking, rep counting and voice-cue selection.

use crate::config::EngineConfig;
use crate::geometry::{self, EPSILON};
use crate::types::{AnalysisResult, ExerciseKind, Landmark, LandmarkName, Pose, Severity, Violation};

mod bench_press;
mod deadlift;
mod generic;
mod overhead_press;
mod plank;
mod squat;

pub use bench_press::BenchPressAnalyzer;
pub use deadlift::DeadliftAnalyzer;
pub use generic::GenericAnalyzer;
pub use overhead_press::OverheadPressAnalyzer;
pub use plank::PlankAnalyzer;
pub use squat::SquatAnalyzer;

/// Per-frame analysis contract shared by every exercise
pub trait ExerciseAnalyzer: Send {
    fn kind(&self) -> ExerciseKind;

    /// Landmarks that must be visible before `analyze` may be called
    fn required_landmarks(&self) -> &'static [LandmarkName];

    /// Score one frame. `timestamp` is seconds since an arbitrary origin.
    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult;

    /// Repetitions completed so far (0 for hold-based exercises)
    fn reps(&self) -> u32 {
        0
    }
}

/// Build the analyzer registered for `kind`
pub fn analyzer_for(kind: ExerciseKind, config: &EngineConfig) -> Box<dyn ExerciseAnalyzer> {
    match kind {
        ExerciseKind::Squat => Box::new(SquatAnalyzer::new(config.squat.clone())),
        ExerciseKind::Deadlift => Box::new(DeadliftAnalyzer::new(config.deadlift.clone())),
        ExerciseKind::OverheadPress => Box::new(OverheadPressAnalyzer::new(config.overhead_press.clone())),
        ExerciseKind::BenchPress => Box::new(BenchPressAnalyzer::new(config.bench_press.clone())),
        ExerciseKind::Plank => Box::new(PlankAnalyzer::new(config.plank.clone())),
        ExerciseKind::Generic => Box::new(GenericAnalyzer::new()),
    }
}

/// Resolve an exercise id to an analyzer, falling back to the generic one
pub fn resolve_analyzer(exercise_id: &str, config: &EngineConfig) -> Box<dyn ExerciseAnalyzer> {
    let kind = ExerciseKind::from_id(exercise_id).unwrap_or_else(|| {
        log::warn!("No analyzer registered for exercise '{exercise_id}', using generic analysis");
        ExerciseKind::Generic
    });
    analyzer_for(kind, config)
}

pub(crate) fn shoulder_mid(pose: &Pose) -> Landmark {
    pose.midpoint(LandmarkName::LeftShoulder, LandmarkName::RightShoulder)
}

pub(crate) fn hip_mid(pose: &Pose) -> Landmark {
    pose.midpoint(LandmarkName::LeftHip, LandmarkName::RightHip)
}

pub(crate) fn ear_mid(pose: &Pose) -> Landmark {
    pose.midpoint(LandmarkName::LeftEar, LandmarkName::RightEar)
}

pub(crate) fn ankle_mid(pose: &Pose) -> Landmark {
    pose.midpoint(LandmarkName::LeftAnkle, LandmarkName::RightAnkle)
}

pub(crate) fn wrist_mid(pose: &Pose) -> Landmark {
    pose.midpoint(LandmarkName::LeftWrist, LandmarkName::RightWrist)
}

/// Spine flexion: how far ear, shoulder and hip midpoints bend away from a
/// straight line, in degrees (0 = neutral).
pub(crate) fn spine_angle(pose: &Pose) -> f64 {
    let bend = geometry::angle_3d(&ear_mid(pose), &shoulder_mid(pose), &hip_mid(pose));
    if bend == 0.0 {
        // degenerate torso; treat as neutral
        return 0.0;
    }
    (180.0 - bend).max(0.0)
}

/// Torso inclination from vertical, hip midpoint to shoulder midpoint
pub(crate) fn torso_lean(pose: &Pose) -> f64 {
    geometry::angle_from_vertical(&hip_mid(pose), &shoulder_mid(pose))
}

/// Left and right joint angles, each given as (end, vertex, end)
pub(crate) fn bilateral_angle(
    pose: &Pose,
    left: (LandmarkName, LandmarkName, LandmarkName),
    right: (LandmarkName, LandmarkName, LandmarkName),
) -> (f64, f64) {
    let l = geometry::angle_3d(pose.get(left.0), pose.get(left.1), pose.get(left.2));
    let r = geometry::angle_3d(pose.get(right.0), pose.get(right.1), pose.get(right.2));
    (l, r)
}

/// Contribution of one violation to injury risk
pub(crate) fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 0.5,
        Severity::High => 0.3,
        Severity::Medium => 0.15,
        Severity::Low => 0.05,
    }
}

/// Weighted violation severities plus an exercise-specific angle excess, in [0, 1]
pub fn injury_risk(violations: &[Violation], angle_excess: f64) -> f64 {
    let base: f64 = violations.iter().map(|v| severity_weight(v.severity)).sum();
    let excess = if angle_excess.is_finite() { angle_excess.max(0.0) } else { 0.0 };
    (base + excess).clamp(0.0, 1.0)
}

/// Close out a frame: overall score, injury risk and rep count
pub(crate) fn finish(result: &mut AnalysisResult, angle_excess: f64, reps: u32) {
    result.finalize();
    let risk = injury_risk(&result.violations, angle_excess);
    result.set_metric("injury_risk", risk);
    result.set_metric("rep_count", reps as f64);
}

/// Hip-midpoint motion between consecutive analyzed frames
#[derive(Debug, Default)]
pub(crate) struct MotionTracker {
    previous: Option<(Landmark, f64)>,
}

impl MotionTracker {
    /// Returns (speed, upward vertical velocity) in normalized units per second
    pub(crate) fn update(&mut self, pose: &Pose, timestamp: f64) -> (f64, f64) {
        let hip = hip_mid(pose);
        let motion = match self.previous {
            Some((prev, prev_t)) => {
                let dt = timestamp - prev_t;
                let speed = geometry::velocity(&hip, Some(&prev), dt);
                let vertical = if dt > EPSILON { (prev.y - hip.y) / dt } else { 0.0 };
                (speed, vertical)
            }
            None => (0.0, 0.0),
        };
        self.previous = Some((hip, timestamp));
        motion
    }

    pub(crate) fn record(&mut self, result: &mut AnalysisResult, pose: &Pose, timestamp: f64) {
        let (speed, vertical) = self.update(pose, timestamp);
        result.set_metric("movement_velocity", speed);
        result.set_metric("vertical_velocity", vertical);
    }
}

/// Counts a repetition each time the movement returns to the top after
/// reaching the bottom.
#[derive(Debug, Default)]
pub(crate) struct RepCounter {
    reps: u32,
    reached_bottom: bool,
}

impl RepCounter {
    /// Returns true on the frame a repetition completes
    pub(crate) fn update(&mut self, at_bottom: bool, at_top: bool) -> bool {
        if at_bottom {
            self.reached_bottom = true;
            return false;
        }
        if at_top && self.reached_bottom {
            self.reached_bottom = false;
            self.reps += 1;
            return true;
        }
        false
    }

    pub(crate) fn count(&self) -> u32 {
        self.reps
    }
}

const POSITIVE_CUES: [&str; 6] = [
    "Perfect form!",
    "Excellent, keep it up!",
    "Great rep!",
    "Textbook technique!",
    "Strong and steady!",
    "That's how it's done!",
];

/// Short spoken cue for a frame.
///
/// 90+ picks a positive phrase; 70-89 voices the first correction (or first
/// feedback line); below 70 voices the first violation (or first feedback line).
pub fn generate_voice_feedback(result: &AnalysisResult, rng: &mut fastrand::Rng) -> String {
    if result.overall_score >= 90.0 {
        return POSITIVE_CUES[rng.usize(..POSITIVE_CUES.len())].to_string();
    }

    let spoken = if result.overall_score >= 70.0 {
        result
            .corrections
            .first()
            .map(|code| match crate::types::ViolationKind::from_code(code) {
                Some(kind) => kind.cue().to_string(),
                None => code.replace('_', " "),
            })
            .or_else(|| result.feedback.first().cloned())
    } else {
        result
            .violations
            .first()
            .map(|v| v.message.clone())
            .or_else(|| result.feedback.first().cloned())
    };

    spoken.unwrap_or_else(|| {
        if result.overall_score >= 70.0 {
            "Good, stay focused".to_string()
        } else {
            "Reset and focus on your form".to_string()
        }
    })
}

#[cfg(test)]
pub(crate) mod test_poses {
    //! Hand-built poses for analyzer tests.
    //!
    //! Side-plane geometry lives in y (down) and z (forward); the two body
    //! sides sit at x = 0.45 (left) and x = 0.55 (right).

    use crate::types::{AnalysisResult, Landmark, LandmarkName, Pose};

    pub const LEFT_X: f64 = 0.45;
    pub const RIGHT_X: f64 = 0.55;

    pub fn lm(x: f64, y: f64, z: f64) -> Landmark {
        Landmark::new(x, y, z, 1.0)
    }

    /// Every landmark present at a neutral spot, fully visible
    pub fn blank() -> Vec<Landmark> {
        vec![lm(0.5, 0.5, 0.0); 33]
    }

    pub fn set(landmarks: &mut [Landmark], name: LandmarkName, value: Landmark) {
        landmarks[name.index()] = value;
    }

    /// Set the left and right variants of a landmark at the same (y, z)
    pub fn set_pair(landmarks: &mut [Landmark], left: LandmarkName, right: LandmarkName, y: f64, z: f64) {
        set(landmarks, left, lm(LEFT_X, y, z));
        set(landmarks, right, lm(RIGHT_X, y, z));
    }

    /// Ear position `len` above `shoulder` rotated forward by `degrees`, giving
    /// a spine angle of `degrees` when the hip sits straight below the shoulder.
    pub fn ear_for_spine(shoulder_y: f64, shoulder_z: f64, degrees: f64, len: f64) -> (f64, f64) {
        let rad = degrees.to_radians();
        (shoulder_y - len * rad.cos(), shoulder_z + len * rad.sin())
    }

    pub fn build(landmarks: Vec<Landmark>) -> Pose {
        Pose::new(landmarks).unwrap()
    }

    /// Scores within [0, 100], overall their mean, injury risk within [0, 1]
    pub fn assert_scores_consistent(result: &AnalysisResult) {
        assert!(!result.scores.is_empty());
        assert!(result.scores.values().all(|s| (0.0..=100.0).contains(s)));
        let mean = result.scores.values().sum::<f64>() / result.scores.len() as f64;
        assert!((result.overall_score - mean).abs() < 1e-9);
        let risk = result.metric("injury_risk").unwrap();
        assert!((0.0..=1.0).contains(&risk));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViolationKind;

    fn violation(severity: Severity) -> Violation {
        Violation {
            kind: ViolationKind::SpineFlexion,
            severity,
            message: "test".to_string(),
            magnitude: 1.0,
        }
    }

    #[test]
    fn test_injury_risk_is_clamped() {
        assert_eq!(injury_risk(&[], 0.0), 0.0);
        let many = vec![violation(Severity::Critical); 4];
        assert_eq!(injury_risk(&many, 0.5), 1.0);
        let risk = injury_risk(&[violation(Severity::Medium)], f64::NAN);
        assert!((risk - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_rep_counter() {
        let mut counter = RepCounter::default();
        assert!(!counter.update(false, true));
        assert!(!counter.update(true, false));
        assert!(!counter.update(false, false));
        assert!(counter.update(false, true));
        assert!(!counter.update(false, true));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_voice_feedback_tiers() {
        let mut rng = fastrand::Rng::with_seed(3);

        let mut result = AnalysisResult::new(ExerciseKind::Squat, 0.0);
        result.overall_score = 95.0;
        assert!(POSITIVE_CUES.contains(&generate_voice_feedback(&result, &mut rng).as_str()));

        result.overall_score = 80.0;
        result.add_violation(ViolationKind::KneeValgus, Severity::Low, "Knees caving in", 0.03);
        assert_eq!(generate_voice_feedback(&result, &mut rng), "Push your knees out");

        result.overall_score = 50.0;
        assert_eq!(generate_voice_feedback(&result, &mut rng), "Knees caving in");
    }

    #[test]
    fn test_voice_feedback_seeded_is_deterministic() {
        let mut result = AnalysisResult::new(ExerciseKind::Plank, 0.0);
        result.overall_score = 99.0;
        let a = generate_voice_feedback(&result, &mut fastrand::Rng::with_seed(11));
        let b = generate_voice_feedback(&result, &mut fastrand::Rng::with_seed(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_exercise_falls_back_to_generic() {
        let analyzer = resolve_analyzer("turkish_getup", &EngineConfig::default());
        assert_eq!(analyzer.kind(), ExerciseKind::Generic);
        let analyzer = resolve_analyzer("deadlift", &EngineConfig::default());
        assert_eq!(analyzer.kind(), ExerciseKind::Deadlift);
    }
}
