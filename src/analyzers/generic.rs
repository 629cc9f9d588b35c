//! Fallback analysis for exercises without a dedicated analyzer: body-line
//! alignment and left/right balance only.

use super::{ankle_mid, bilateral_angle, finish, hip_mid, shoulder_mid, ExerciseAnalyzer, MotionTracker};
use crate::geometry::{self, DEFAULT_SYMMETRY_TOLERANCE};
use crate::types::{AnalysisResult, ExerciseKind, LandmarkName, Phase, Pose, Severity, ViolationKind};

use LandmarkName::*;

const REQUIRED: &[LandmarkName] = &[
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
];

#[derive(Default)]
pub struct GenericAnalyzer {
    motion: MotionTracker,
}

impl GenericAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExerciseAnalyzer for GenericAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Generic
    }

    fn required_landmarks(&self) -> &'static [LandmarkName] {
        REQUIRED
    }

    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(ExerciseKind::Generic, timestamp);
        result.phase = Phase::Active;

        let alignment = geometry::alignment(&[shoulder_mid(pose), hip_mid(pose), ankle_mid(pose)]);
        result.set_score("body_alignment", alignment);
        if alignment < 70.0 {
            result.add_violation(
                ViolationKind::Misalignment,
                Severity::Low,
                "Keep your body in a controlled line",
                70.0 - alignment,
            );
        }

        let (left_hip, right_hip) =
            bilateral_angle(pose, (LeftShoulder, LeftHip, LeftKnee), (RightShoulder, RightHip, RightKnee));
        result.set_angle("left_hip", left_hip);
        result.set_angle("right_hip", right_hip);
        let (balanced, symmetry_score) = geometry::symmetry(left_hip, right_hip, DEFAULT_SYMMETRY_TOLERANCE);
        result.set_score("symmetry", symmetry_score);
        if !balanced {
            result.add_violation(
                ViolationKind::Asymmetry,
                Severity::Low,
                "Work both sides evenly",
                (left_hip - right_hip).abs(),
            );
        }

        if result.violations.is_empty() {
            result.feedback.push("Keep moving with control".to_string());
        } else {
            let messages: Vec<String> = result.violations.iter().map(|v| v.message.clone()).collect();
            result.feedback.extend(messages);
        }

        self.motion.record(&mut result, pose, timestamp);
        finish(&mut result, 0.0, 0);
        result.is_in_position = result.overall_score > 70.0;
        result
    }
}
