//! Bench press analyzer
//!
//! Bar height is measured as arm reach: the shoulder-to-wrist distance over
//! the upper arm plus forearm length. That keeps the phase independent of
//! where the camera sits relative to the bench.

use super::{bilateral_angle, finish, hip_mid, shoulder_mid, wrist_mid, ExerciseAnalyzer, MotionTracker, RepCounter};
use crate::config::BenchPressConfig;
use crate::geometry::{self, DEFAULT_SYMMETRY_TOLERANCE, EPSILON};
use crate::types::{AnalysisResult, ExerciseKind, LandmarkName, Phase, Pose, Severity, ViolationKind};

use LandmarkName::*;

const REQUIRED: &[LandmarkName] = &[
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftIndex,
    RightIndex,
    LeftHip,
    RightHip,
];

const LOCKOUT_REACH: f64 = 0.97;
const BOTTOM_REACH: f64 = 0.78;

/// Where the bar should touch, as a fraction of the shoulder-to-hip line
const CHEST_FRACTION: f64 = 0.25;

/// Shoulder-to-ear gap below which the shoulder blades are not depressed
const DEPRESSION_GAP: f64 = 0.08;

pub struct BenchPressAnalyzer {
    config: BenchPressConfig,
    reps: RepCounter,
    motion: MotionTracker,
}

impl BenchPressAnalyzer {
    pub fn new(config: BenchPressConfig) -> Self {
        Self {
            config,
            reps: RepCounter::default(),
            motion: MotionTracker::default(),
        }
    }

    /// Mean reach of both arms in [0, 1]
    fn reach(pose: &Pose) -> f64 {
        let sides = [(LeftShoulder, LeftElbow, LeftWrist), (RightShoulder, RightElbow, RightWrist)];
        let total: f64 = sides
            .iter()
            .map(|&(s, e, w)| {
                let (s, e, w) = (pose.get(s), pose.get(e), pose.get(w));
                let arm = geometry::distance_3d(s, e) + geometry::distance_3d(e, w);
                if arm < EPSILON {
                    0.0
                } else {
                    (geometry::distance_3d(s, w) / arm).min(1.0)
                }
            })
            .sum();
        total / 2.0
    }

    fn phase(reach: f64) -> Phase {
        if reach >= LOCKOUT_REACH {
            Phase::Lockout
        } else if reach <= BOTTOM_REACH {
            Phase::Bottom
        } else {
            Phase::Pressing
        }
    }

    /// Distance of the bar from the ideal touch point along the torso, as a
    /// fraction of torso length
    fn touch_point_deviation(pose: &Pose) -> f64 {
        let shoulder = shoulder_mid(pose);
        let hip = hip_mid(pose);
        let torso = geometry::distance_3d(&shoulder, &hip);
        if torso < EPSILON {
            return 0.0;
        }
        let bar = wrist_mid(pose);
        let along = ((bar.x - shoulder.x) * (hip.x - shoulder.x)
            + (bar.y - shoulder.y) * (hip.y - shoulder.y)
            + (bar.z - shoulder.z) * (hip.z - shoulder.z))
            / (torso * torso);
        (along - CHEST_FRACTION).abs()
    }

    fn wrist_extension(pose: &Pose) -> f64 {
        let (left, right) = bilateral_angle(pose, (LeftElbow, LeftWrist, LeftIndex), (RightElbow, RightWrist, RightIndex));
        // a straight wrist reads 180°
        (180.0 - left).max(180.0 - right).max(0.0)
    }

    fn shoulder_stability(pose: &Pose) -> f64 {
        let (left, right) = (pose.get(LeftShoulder), pose.get(RightShoulder));
        let level = (100.0 - (left.y - right.y).abs() * 1000.0).max(0.0);
        let gap = geometry::distance_3d(left, pose.get(LeftEar)).min(geometry::distance_3d(right, pose.get(RightEar)));
        let depression = if gap < DEPRESSION_GAP { 70.0 } else { 100.0 };
        (level + depression) / 2.0
    }
}

impl ExerciseAnalyzer for BenchPressAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::BenchPress
    }

    fn required_landmarks(&self) -> &'static [LandmarkName] {
        REQUIRED
    }

    fn reps(&self) -> u32 {
        self.reps.count()
    }

    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(ExerciseKind::BenchPress, timestamp);

        let (left_elbow, right_elbow) =
            bilateral_angle(pose, (LeftShoulder, LeftElbow, LeftWrist), (RightShoulder, RightElbow, RightWrist));
        let (left_tuck, right_tuck) =
            bilateral_angle(pose, (LeftHip, LeftShoulder, LeftElbow), (RightHip, RightShoulder, RightElbow));
        let tuck = (left_tuck + right_tuck) / 2.0;
        let reach = Self::reach(pose);
        let phase = Self::phase(reach);
        result.phase = phase;

        result.set_angle("left_elbow", left_elbow);
        result.set_angle("right_elbow", right_elbow);
        result.set_angle("elbow_torso", tuck);
        result.set_metric("bar_height", reach);

        // Elbow tuck window
        let (low, high) = self.config.elbow_window;
        if tuck > high {
            let severity = if tuck > high + 10.0 { Severity::High } else { Severity::Medium };
            result.set_score("elbow_position", 100.0 - (tuck - high) * 3.0);
            result.add_violation(
                ViolationKind::ElbowFlare,
                severity,
                "Elbows are flared too wide. Tuck them toward your sides to protect your shoulders",
                tuck - high,
            );
        } else if tuck < low {
            result.set_score("elbow_position", 100.0 - (low - tuck) * 3.0);
            result.add_violation(
                ViolationKind::NarrowGrip,
                Severity::Low,
                "Elbows are tucked too tight. Let them drift out a little",
                low - tuck,
            );
        } else {
            result.set_score("elbow_position", 100.0);
        }

        // Touch point is only meaningful with the bar on the chest
        let tolerance = self.config.touch_point_tolerance;
        let deviation = if phase == Phase::Bottom { Self::touch_point_deviation(pose) } else { 0.0 };
        if deviation > tolerance {
            result.set_score("touch_point", 100.0 - (deviation - tolerance) * 300.0);
            result.add_violation(
                ViolationKind::TouchPointDeviation,
                Severity::Medium,
                "Touch the bar to your mid-chest, just below the nipple line",
                deviation,
            );
        } else {
            result.set_score("touch_point", 100.0);
        }

        let extension = Self::wrist_extension(pose);
        let limit = self.config.wrist_extension_limit;
        result.set_angle("wrist_extension", extension);
        if extension > limit {
            let severity = if extension > limit + 15.0 { Severity::Medium } else { Severity::Low };
            result.set_score("wrist_alignment", 100.0 - (extension - limit) * 2.5);
            result.add_violation(
                ViolationKind::WristHyperextension,
                severity,
                "Wrists are bent back. Stack the bar over your forearms",
                extension - limit,
            );
        } else {
            result.set_score("wrist_alignment", 100.0);
        }

        let stability = Self::shoulder_stability(pose);
        result.set_score("shoulder_stability", stability);
        if stability < 70.0 {
            result.add_violation(
                ViolationKind::ShoulderInstability,
                Severity::Medium,
                "Shoulders are shifting. Pull your shoulder blades together and down",
                70.0 - stability,
            );
        }
        self.reps.update(phase == Phase::Bottom, phase == Phase::Lockout);

        let (balanced, symmetry_score) = geometry::symmetry(left_elbow, right_elbow, DEFAULT_SYMMETRY_TOLERANCE);
        result.set_score("symmetry", symmetry_score);
        if !balanced {
            result.add_violation(
                ViolationKind::Asymmetry,
                Severity::Low,
                "The bar is tilting. Press evenly with both arms",
                (left_elbow - right_elbow).abs(),
            );
        }

        if result.violations.is_empty() {
            result.feedback.push("Good bar path, stay tight on the bench".to_string());
        } else {
            let messages: Vec<String> = result.violations.iter().map(|v| v.message.clone()).collect();
            result.feedback.extend(messages);
        }

        self.motion.record(&mut result, pose, timestamp);
        let excess = (tuck - high).max(0.0) / 60.0;
        finish(&mut result, excess, self.reps.count());
        result.is_in_position = result.overall_score > 70.0 && (low..=high).contains(&tuck);
        result
    }
}
