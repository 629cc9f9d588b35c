//! Deadlift analyzer
//!
//! Spine neutrality is a hard gate: more than 10° of flexion zeroes the
//! category and raises a critical violation regardless of everything else.

use std::collections::VecDeque;

use super::{
    ankle_mid, bilateral_angle, finish, hip_mid, shoulder_mid, spine_angle, wrist_mid, ExerciseAnalyzer, MotionTracker,
    RepCounter,
};
use crate::config::DeadliftConfig;
use crate::geometry::{self, DEFAULT_SYMMETRY_TOLERANCE};
use crate::types::{AnalysisResult, ExerciseKind, LandmarkName, Phase, Pose, Severity, ViolationKind};

use LandmarkName::*;

const REQUIRED: &[LandmarkName] = &[
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
];

const LOCKOUT_ANGLE: f64 = 165.0;

pub struct DeadliftAnalyzer {
    config: DeadliftConfig,
    /// Horizontal bar offsets from mid-foot, most recent last
    bar_path: VecDeque<f64>,
    reps: RepCounter,
    motion: MotionTracker,
}

impl DeadliftAnalyzer {
    pub fn new(config: DeadliftConfig) -> Self {
        let window = config.bar_path_window.max(1);
        Self {
            config,
            bar_path: VecDeque::with_capacity(window),
            reps: RepCounter::default(),
            motion: MotionTracker::default(),
        }
    }

    /// Bar below the knees is the floor portion of the pull; above it the
    /// lifter is finishing, until hips and knees are both extended.
    fn phase(pose: &Pose, hip_angle: f64, knee_angle: f64) -> Phase {
        if hip_angle >= LOCKOUT_ANGLE && knee_angle >= LOCKOUT_ANGLE {
            return Phase::Lockout;
        }
        let bar_y = wrist_mid(pose).y;
        let knee_y = pose.midpoint(LeftKnee, RightKnee).y;
        if bar_y >= knee_y {
            if hip_angle < 110.0 {
                Phase::Setup
            } else {
                Phase::Pull
            }
        } else {
            Phase::Ascending
        }
    }

    fn hinge_score(ratio: f64, at_lockout: bool) -> f64 {
        if at_lockout || ratio <= 0.85 {
            100.0
        } else if ratio <= 1.0 {
            100.0 - (ratio - 0.85) * 200.0
        } else {
            70.0 - (ratio - 1.0) * 200.0
        }
    }

    /// Full marks while the bar stays within `threshold` of mid-foot
    fn bar_score(drift: f64, threshold: f64) -> f64 {
        if drift <= threshold {
            100.0
        } else {
            100.0 - (drift - threshold) * 400.0
        }
    }

    fn bar_path_deviation(&self) -> f64 {
        let n = self.bar_path.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.bar_path.iter().sum::<f64>() / n as f64;
        let variance = self.bar_path.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        variance.sqrt()
    }
}

/// Degrees the torso tips behind the hips at the top, 0 when upright or forward
fn lean_back(pose: &Pose) -> f64 {
    let shoulder = shoulder_mid(pose);
    let hip = hip_mid(pose);
    let rise = hip.y - shoulder.y;
    let behind = hip.z - shoulder.z;
    if behind <= 0.0 || rise <= 0.0 {
        return 0.0;
    }
    behind.atan2(rise).to_degrees()
}

impl ExerciseAnalyzer for DeadliftAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Deadlift
    }

    fn required_landmarks(&self) -> &'static [LandmarkName] {
        REQUIRED
    }

    fn reps(&self) -> u32 {
        self.reps.count()
    }

    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(ExerciseKind::Deadlift, timestamp);

        let (left_hip, right_hip) = bilateral_angle(pose, (LeftShoulder, LeftHip, LeftKnee), (RightShoulder, RightHip, RightKnee));
        let (left_knee, right_knee) = bilateral_angle(pose, (LeftHip, LeftKnee, LeftAnkle), (RightHip, RightKnee, RightAnkle));
        let hip = (left_hip + right_hip) / 2.0;
        let knee = (left_knee + right_knee) / 2.0;
        let spine = spine_angle(pose);
        let phase = Self::phase(pose, hip, knee);
        result.phase = phase;

        result.set_angle("left_hip", left_hip);
        result.set_angle("right_hip", right_hip);
        result.set_angle("hip", hip);
        result.set_angle("knee", knee);
        result.set_angle("spine", spine);

        if spine > 10.0 {
            result.set_score("spine_neutrality", 0.0);
            result.add_violation(
                ViolationKind::SpineFlexion,
                Severity::Critical,
                "Stop immediately! Your back is rounding under load. Reset with a neutral spine",
                spine - 10.0,
            );
        } else if spine > 5.0 {
            result.set_score("spine_neutrality", 50.0);
            result.add_violation(
                ViolationKind::SpineFlexion,
                Severity::Medium,
                "Your back is starting to round. Pull your chest up and lats tight",
                spine - 5.0,
            );
        } else {
            result.set_score("spine_neutrality", 100.0);
        }

        // Hip hinge
        let at_lockout = phase == Phase::Lockout;
        let ratio = if knee > 0.0 { hip / knee } else { 0.0 };
        result.set_metric("hip_hinge_ratio", ratio);
        result.set_score("hip_hinge", Self::hinge_score(ratio, at_lockout));
        if ratio > 1.0 && !at_lockout {
            result.add_violation(
                ViolationKind::KneeDominant,
                Severity::Medium,
                "This looks like a squat. Push your hips back and keep the shins vertical",
                ratio - 1.0,
            );
        }

        // Bar path
        let drift = geometry::horizontal_distance(&wrist_mid(pose), &ankle_mid(pose));
        let threshold = self.config.bar_drift_threshold;
        result.set_score("bar_path", Self::bar_score(drift, threshold));
        if drift > threshold {
            result.add_violation(
                ViolationKind::BarDrift,
                Severity::High,
                "The bar is drifting away from you. Keep it dragging up your legs",
                drift,
            );
        }
        if self.bar_path.len() >= self.config.bar_path_window.max(1) {
            self.bar_path.pop_front();
        }
        self.bar_path.push_back(drift);
        result.set_metric("bar_path_deviation", self.bar_path_deviation());

        // Lockout
        if at_lockout {
            let lean = lean_back(pose);
            result.set_angle("lockout_lean", lean);
            if lean > 10.0 {
                result.set_score("lockout", 60.0);
                result.add_violation(
                    ViolationKind::LockoutHyperextension,
                    Severity::Low,
                    "Don't lean back at the top. Finish tall with glutes squeezed",
                    lean - 10.0,
                );
            } else {
                result.set_score("lockout", 100.0);
            }
        } else {
            result.set_score("lockout", 100.0);
        }
        self.reps.update(matches!(phase, Phase::Setup | Phase::Pull), at_lockout);

        let (balanced, symmetry_score) = geometry::symmetry(left_hip, right_hip, DEFAULT_SYMMETRY_TOLERANCE);
        result.set_score("symmetry", symmetry_score);
        if !balanced {
            result.add_violation(
                ViolationKind::Asymmetry,
                Severity::Low,
                "Hips are rising unevenly. Drive evenly through both legs",
                (left_hip - right_hip).abs(),
            );
        }

        if result.violations.is_empty() {
            result.feedback.push(match phase {
                Phase::Lockout => "Strong lockout".to_string(),
                _ => "Good hinge, keep the bar close".to_string(),
            });
        } else {
            let messages: Vec<String> = result.violations.iter().map(|v| v.message.clone()).collect();
            result.feedback.extend(messages);
        }

        self.motion.record(&mut result, pose, timestamp);
        let excess = (spine - 5.0).max(0.0) / 20.0 + (drift - threshold).max(0.0) * 2.0;
        finish(&mut result, excess, self.reps.count());
        result.is_in_position = result.overall_score > 70.0 && spine <= 10.0;
        result
    }
}
