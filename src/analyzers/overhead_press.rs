//! Overhead press analyzer

use super::{
    bilateral_angle, finish, shoulder_mid, torso_lean, wrist_mid, ExerciseAnalyzer, MotionTracker, RepCounter,
};
use crate::config::OverheadPressConfig;
use crate::geometry::{self, DEFAULT_SYMMETRY_TOLERANCE, EPSILON};
use crate::types::{AnalysisResult, ExerciseKind, LandmarkName, Phase, Pose, Severity, ViolationKind};

use LandmarkName::*;

const REQUIRED: &[LandmarkName] = &[
    Nose,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
];

const LOCKOUT_ELBOW: f64 = 160.0;
const FULL_LOCKOUT_ELBOW: f64 = 165.0;
const MAX_ELBOW_FLARE: f64 = 45.0;

pub struct OverheadPressAnalyzer {
    config: OverheadPressConfig,
    reps: RepCounter,
    motion: MotionTracker,
}

impl OverheadPressAnalyzer {
    pub fn new(config: OverheadPressConfig) -> Self {
        Self {
            config,
            reps: RepCounter::default(),
            motion: MotionTracker::default(),
        }
    }

    fn phase(pose: &Pose, elbow_angle: f64) -> Phase {
        let bar_y = wrist_mid(pose).y;
        if bar_y >= shoulder_mid(pose).y {
            Phase::RackPosition
        } else if bar_y > pose.get(Nose).y {
            Phase::Pressing
        } else if elbow_angle >= LOCKOUT_ELBOW {
            Phase::Lockout
        } else {
            Phase::MidPress
        }
    }

    /// Sideways angle of the upper arm, in degrees (0 = elbow straight under
    /// or over the shoulder)
    fn elbow_flare(pose: &Pose) -> f64 {
        [(LeftShoulder, LeftElbow), (RightShoulder, RightElbow)]
            .iter()
            .map(|&(shoulder, elbow)| {
                let (s, e) = (pose.get(shoulder), pose.get(elbow));
                let upper_arm = geometry::distance_3d(s, e);
                if upper_arm < EPSILON {
                    return 0.0;
                }
                ((e.x - s.x).abs() / upper_arm).min(1.0).asin().to_degrees()
            })
            .fold(0.0, f64::max)
    }

    /// Nearest shoulder-to-ear gap; small gaps mean the traps are doing the work
    fn shrug_gap(pose: &Pose) -> f64 {
        let left = geometry::distance_3d(pose.get(LeftShoulder), pose.get(LeftEar));
        let right = geometry::distance_3d(pose.get(RightShoulder), pose.get(RightEar));
        left.min(right)
    }
}

impl ExerciseAnalyzer for OverheadPressAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::OverheadPress
    }

    fn required_landmarks(&self) -> &'static [LandmarkName] {
        REQUIRED
    }

    fn reps(&self) -> u32 {
        self.reps.count()
    }

    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(ExerciseKind::OverheadPress, timestamp);

        let (left_elbow, right_elbow) =
            bilateral_angle(pose, (LeftShoulder, LeftElbow, LeftWrist), (RightShoulder, RightElbow, RightWrist));
        let elbow = (left_elbow + right_elbow) / 2.0;
        let lean = torso_lean(pose);
        let phase = Self::phase(pose, elbow);
        result.phase = phase;

        result.set_angle("left_elbow", left_elbow);
        result.set_angle("right_elbow", right_elbow);
        result.set_angle("torso_lean", lean);

        // Lumbar control
        if lean > 20.0 {
            result.set_score("lumbar_control", 40.0);
            result.add_violation(
                ViolationKind::LumbarExtension,
                Severity::High,
                "You're leaning back too far. Squeeze your glutes and keep your ribs down",
                lean - 20.0,
            );
        } else if lean > 10.0 {
            result.set_score("lumbar_control", 70.0);
            result.add_violation(
                ViolationKind::LumbarExtension,
                Severity::Medium,
                "Slight lean back. Brace your core",
                lean - 10.0,
            );
        } else {
            result.set_score("lumbar_control", 100.0);
        }

        // Bar path: the bar should travel straight up past the face
        let deviation = (wrist_mid(pose).x - pose.get(Nose).x).abs();
        result.set_metric("bar_deviation", deviation);
        let limit = self.config.bar_deviation_threshold;
        if deviation <= limit {
            result.set_score("bar_path", 100.0);
        } else {
            result.set_score("bar_path", 100.0 - (deviation - limit) * 400.0);
            result.add_violation(
                ViolationKind::BarPathDeviation,
                Severity::Medium,
                "Press in a straight line. Move your head back and let the bar pass over your face",
                deviation,
            );
        }

        let flare = Self::elbow_flare(pose);
        result.set_angle("elbow_flare", flare);
        if flare > MAX_ELBOW_FLARE {
            result.set_score("elbow_position", 100.0 - (flare - MAX_ELBOW_FLARE) * 3.0);
            result.add_violation(
                ViolationKind::ElbowFlare,
                Severity::Medium,
                "Elbows are flaring out. Keep them slightly in front of the bar",
                flare - MAX_ELBOW_FLARE,
            );
        } else {
            result.set_score("elbow_position", 100.0);
        }

        let gap = Self::shrug_gap(pose);
        if gap < self.config.shrug_distance {
            result.set_score("shoulder_position", 60.0);
            result.add_violation(
                ViolationKind::ShoulderShrug,
                Severity::Low,
                "Don't shrug. Keep your shoulders away from your ears",
                self.config.shrug_distance - gap,
            );
        } else {
            result.set_score("shoulder_position", 100.0);
        }

        if phase == Phase::Lockout && elbow < FULL_LOCKOUT_ELBOW {
            result.set_score("lockout", 70.0);
            result.add_violation(
                ViolationKind::SoftLockout,
                Severity::Low,
                "Finish the press. Lock your elbows out overhead",
                FULL_LOCKOUT_ELBOW - elbow,
            );
        } else {
            result.set_score("lockout", 100.0);
        }
        self.reps.update(phase == Phase::RackPosition, phase == Phase::Lockout);

        let (balanced, symmetry_score) = geometry::symmetry(left_elbow, right_elbow, DEFAULT_SYMMETRY_TOLERANCE);
        result.set_score("symmetry", symmetry_score);
        if !balanced {
            result.add_violation(
                ViolationKind::Asymmetry,
                Severity::Low,
                "One arm is lagging. Press both sides evenly",
                (left_elbow - right_elbow).abs(),
            );
        }

        if result.violations.is_empty() {
            result.feedback.push(match phase {
                Phase::Lockout => "Solid lockout, bar stacked over your shoulders".to_string(),
                _ => "Good press, stay tight".to_string(),
            });
        } else {
            let messages: Vec<String> = result.violations.iter().map(|v| v.message.clone()).collect();
            result.feedback.extend(messages);
        }

        self.motion.record(&mut result, pose, timestamp);
        let excess = (lean - 10.0).max(0.0) / 40.0;
        finish(&mut result, excess, self.reps.count());
        result.is_in_position = result.overall_score > 70.0 && lean <= 20.0;
        result
    }
}
