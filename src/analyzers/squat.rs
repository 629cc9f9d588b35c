//! Squat analyzer
//!
//! Phase is a pure function of the average knee angle:
//! standing > 160°, descending 120-160°, parallel 100-120°, bottom <= 100°.

use super::{bilateral_angle, finish, hip_mid, spine_angle, ExerciseAnalyzer, MotionTracker, RepCounter};
use crate::config::SquatConfig;
use crate::geometry::{self, decay_score, DEFAULT_SYMMETRY_TOLERANCE, EPSILON};
use crate::types::{AnalysisResult, ExerciseKind, Landmark, LandmarkName, Phase, Pose, Severity, ViolationKind};

use LandmarkName::*;

const REQUIRED: &[LandmarkName] = &[
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
];

/// A descent that never gets below this knee angle is not counted as an attempt
const ATTEMPT_KNEE_ANGLE: f64 = 140.0;

pub struct SquatAnalyzer {
    config: SquatConfig,
    reps: RepCounter,
    motion: MotionTracker,
    /// Lowest knee angle since the lifter last stood up
    rep_min_knee: f64,
    /// Spine angle seen on the way down, compared against at the bottom
    reference_spine: Option<f64>,
}

impl SquatAnalyzer {
    pub fn new(config: SquatConfig) -> Self {
        Self {
            config,
            reps: RepCounter::default(),
            motion: MotionTracker::default(),
            rep_min_knee: f64::INFINITY,
            reference_spine: None,
        }
    }

    pub fn phase_for(knee_angle: f64) -> Phase {
        if !knee_angle.is_finite() {
            Phase::Ascending
        } else if knee_angle > 160.0 {
            Phase::Standing
        } else if knee_angle >= 120.0 {
            Phase::Descending
        } else if knee_angle > 100.0 {
            Phase::Parallel
        } else {
            Phase::Bottom
        }
    }

    /// 100 at or below 90°, -2/° to 100°, then -3/° floored at 0
    pub fn depth_score(knee_angle: f64) -> f64 {
        if knee_angle <= 90.0 {
            100.0
        } else if knee_angle <= 100.0 {
            100.0 - (knee_angle - 90.0) * 2.0
        } else {
            (80.0 - (knee_angle - 100.0) * 3.0).max(0.0)
        }
    }

    fn spine_score(spine: f64) -> f64 {
        if spine <= 10.0 {
            100.0
        } else if spine <= 20.0 {
            100.0 - (spine - 10.0) * 5.0
        } else {
            (50.0 - (spine - 20.0) * 5.0).max(0.0)
        }
    }

    /// Largest inward knee travel past the ankle, relative to the body midline
    fn valgus(pose: &Pose) -> f64 {
        let mid_x = hip_mid(pose).x;
        [(LeftKnee, LeftAnkle), (RightKnee, RightAnkle)]
            .iter()
            .map(|&(knee, ankle)| (pose.get(ankle).x - mid_x).abs() - (pose.get(knee).x - mid_x).abs())
            .fold(0.0, f64::max)
    }

    /// How far each knee travels past its toes along the foot direction
    fn knee_travel(pose: &Pose) -> f64 {
        [(LeftKnee, LeftHeel, LeftFootIndex), (RightKnee, RightHeel, RightFootIndex)]
            .iter()
            .map(|&(knee, heel, toe)| forward_of(pose.get(knee), pose.get(heel), pose.get(toe)))
            .fold(0.0, f64::max)
    }
}

/// Signed distance of `point` beyond `toe` along heel→toe, on the ground plane
fn forward_of(point: &Landmark, heel: &Landmark, toe: &Landmark) -> f64 {
    let (fx, fz) = (toe.x - heel.x, toe.z - heel.z);
    let len = (fx * fx + fz * fz).sqrt();
    if len < EPSILON {
        return 0.0;
    }
    ((point.x - toe.x) * fx + (point.z - toe.z) * fz) / len
}

impl ExerciseAnalyzer for SquatAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Squat
    }

    fn required_landmarks(&self) -> &'static [LandmarkName] {
        REQUIRED
    }

    fn reps(&self) -> u32 {
        self.reps.count()
    }

    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(ExerciseKind::Squat, timestamp);

        let (left_knee, right_knee) = bilateral_angle(pose, (LeftHip, LeftKnee, LeftAnkle), (RightHip, RightKnee, RightAnkle));
        let (left_hip, right_hip) = bilateral_angle(pose, (LeftShoulder, LeftHip, LeftKnee), (RightShoulder, RightHip, RightKnee));
        let knee = (left_knee + right_knee) / 2.0;
        let spine = spine_angle(pose);
        let phase = Self::phase_for(knee);
        result.phase = phase;

        result.set_angle("left_knee", left_knee);
        result.set_angle("right_knee", right_knee);
        result.set_angle("knee", knee);
        result.set_angle("left_hip", left_hip);
        result.set_angle("right_hip", right_hip);
        result.set_angle("spine", spine);

        // Spine neutrality
        result.set_score("spine_neutrality", Self::spine_score(spine));
        if spine > 20.0 {
            result.add_violation(
                ViolationKind::SpineFlexion,
                Severity::High,
                "Your back is rounding. Keep your chest up and brace your core",
                spine - 20.0,
            );
        } else if spine > 10.0 {
            result.add_violation(
                ViolationKind::SpineFlexion,
                Severity::Medium,
                "Slight back rounding. Keep your chest proud",
                spine - 10.0,
            );
        }

        // Depth, checked per rep when the lifter stands back up
        result.set_score("depth", Self::depth_score(knee));
        if phase == Phase::Standing {
            if self.rep_min_knee < ATTEMPT_KNEE_ANGLE && self.rep_min_knee > 100.0 {
                result.add_violation(
                    ViolationKind::InsufficientDepth,
                    Severity::Medium,
                    format!("Only reached {:.0}° of knee bend. Aim for thighs parallel or lower", self.rep_min_knee),
                    self.rep_min_knee - 100.0,
                );
            }
            self.rep_min_knee = f64::INFINITY;
        } else {
            self.rep_min_knee = self.rep_min_knee.min(knee);
        }
        self.reps.update(phase == Phase::Bottom, phase == Phase::Standing);

        // Knee tracking
        let inward = Self::valgus(pose);
        let threshold = self.config.valgus_threshold;
        if inward > threshold {
            let severity = if inward > threshold * 3.0 {
                Severity::High
            } else if inward > threshold * 2.0 {
                Severity::Medium
            } else {
                Severity::Low
            };
            result.set_score("knee_tracking", 90.0 - (inward - threshold) * 1000.0);
            result.add_violation(
                ViolationKind::KneeValgus,
                severity,
                "Knees are caving inward. Push them out over your toes",
                inward,
            );
        } else {
            result.set_score("knee_tracking", 100.0);
        }

        // Pelvic control: butt wink only matters at the bottom
        match phase {
            Phase::Bottom => {
                let wink = self.reference_spine.map(|reference| spine - reference).unwrap_or(0.0);
                let limit = self.config.butt_wink_threshold;
                if wink > limit {
                    let severity = if wink > limit * 2.0 { Severity::High } else { Severity::Medium };
                    result.set_score("pelvic_control", 80.0 - (wink - limit) * 4.0);
                    result.add_violation(
                        ViolationKind::ButtWink,
                        severity,
                        "Pelvis is tucking under at the bottom. Stop just above this depth",
                        wink,
                    );
                } else {
                    result.set_score("pelvic_control", 100.0);
                }
            }
            Phase::Descending | Phase::Parallel => {
                self.reference_spine = Some(spine);
                result.set_score("pelvic_control", 100.0);
            }
            _ => {
                self.reference_spine = None;
                result.set_score("pelvic_control", 100.0);
            }
        }

        // Left/right balance
        let (balanced, symmetry_score) = geometry::symmetry(left_knee, right_knee, DEFAULT_SYMMETRY_TOLERANCE);
        result.set_score("symmetry", symmetry_score);
        if !balanced {
            let diff = (left_knee - right_knee).abs();
            let severity = if diff > 20.0 { Severity::Medium } else { Severity::Low };
            result.add_violation(
                ViolationKind::Asymmetry,
                severity,
                "Uneven knee bend. Shift your weight evenly across both feet",
                diff,
            );
        }

        // Knees over toes
        let travel = Self::knee_travel(pose);
        result.set_score("knee_position", decay_score(travel, 0.02, 400.0));
        if travel > 0.05 {
            result.add_violation(
                ViolationKind::KneesPastToes,
                Severity::Low,
                "Knees are drifting well past your toes. Sit back into your hips",
                travel,
            );
        }

        if result.violations.is_empty() {
            result.feedback.push(match phase {
                Phase::Bottom | Phase::Parallel => "Great depth, drive up through your heels".to_string(),
                _ => "Good form, keep the descent controlled".to_string(),
            });
        } else {
            let messages: Vec<String> = result.violations.iter().map(|v| v.message.clone()).collect();
            result.feedback.extend(messages);
        }

        self.motion.record(&mut result, pose, timestamp);
        let excess = (spine - 10.0).max(0.0) / 50.0 + (inward - threshold).max(0.0) * 5.0;
        finish(&mut result, excess, self.reps.count());
        result.is_in_position =
            result.overall_score > 70.0 && matches!(phase, Phase::Parallel | Phase::Bottom);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::test_poses::*;

    /// Side-on squat with the shin vertical, a given knee angle and spine flexion
    fn squat_pose(knee_deg: f64, spine_deg: f64) -> Vec<Landmark> {
        let mut lms = blank();
        let (knee_y, knee_z) = (0.6, 0.0);
        let rad = knee_deg.to_radians();
        let hip_y = knee_y + 0.2 * rad.cos();
        let hip_z = knee_z - 0.2 * rad.sin();
        let shoulder_y = hip_y - 0.25;
        let (ear_y, ear_z) = ear_for_spine(shoulder_y, hip_z, spine_deg, 0.1);

        set_pair(&mut lms, LeftAnkle, RightAnkle, 0.8, 0.0);
        set_pair(&mut lms, LeftHeel, RightHeel, 0.82, -0.03);
        set_pair(&mut lms, LeftFootIndex, RightFootIndex, 0.82, 0.08);
        set_pair(&mut lms, LeftKnee, RightKnee, knee_y, knee_z);
        set_pair(&mut lms, LeftHip, RightHip, hip_y, hip_z);
        set_pair(&mut lms, LeftShoulder, RightShoulder, shoulder_y, hip_z);
        set_pair(&mut lms, LeftEar, RightEar, ear_y, ear_z);
        lms
    }

    fn analyze(analyzer: &mut SquatAnalyzer, lms: Vec<Landmark>, t: f64) -> AnalysisResult {
        analyzer.analyze(&build(lms), t)
    }

    #[test]
    fn test_parallel_squat_scores_full_depth() {
        let mut analyzer = SquatAnalyzer::new(SquatConfig::default());
        let result = analyze(&mut analyzer, squat_pose(90.0, 5.0), 0.0);

        assert!((result.angles["knee"] - 90.0).abs() < 1e-6);
        assert!((result.angles["spine"] - 5.0).abs() < 1e-6);
        assert!((result.score("depth").unwrap() - 100.0).abs() < 1e-6);
        assert!(matches!(result.phase, Phase::Parallel | Phase::Bottom));
        assert!(result.violations.is_empty());
        assert!(result.is_in_position);
    }

    #[test]
    fn test_phase_bands() {
        assert_eq!(SquatAnalyzer::phase_for(175.0), Phase::Standing);
        assert_eq!(SquatAnalyzer::phase_for(140.0), Phase::Descending);
        assert_eq!(SquatAnalyzer::phase_for(110.0), Phase::Parallel);
        assert_eq!(SquatAnalyzer::phase_for(100.0), Phase::Bottom);
        assert_eq!(SquatAnalyzer::phase_for(f64::NAN), Phase::Ascending);
    }

    #[test]
    fn test_depth_score_decay() {
        assert_eq!(SquatAnalyzer::depth_score(85.0), 100.0);
        assert!((SquatAnalyzer::depth_score(95.0) - 90.0).abs() < 1e-9);
        assert!((SquatAnalyzer::depth_score(110.0) - 50.0).abs() < 1e-9);
        assert_eq!(SquatAnalyzer::depth_score(170.0), 0.0);
    }

    #[test]
    fn test_knee_valgus_detected() {
        let mut analyzer = SquatAnalyzer::new(SquatConfig::default());
        let mut lms = squat_pose(95.0, 5.0);
        // both knees collapse 4cm toward the midline
        lms[LeftKnee.index()].x = LEFT_X + 0.04;
        lms[RightKnee.index()].x = RIGHT_X - 0.04;
        let result = analyze(&mut analyzer, lms, 0.0);

        let valgus = result
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::KneeValgus)
            .expect("valgus violation");
        assert!((valgus.magnitude - 0.04).abs() < 1e-9);
        assert!(result.score("knee_tracking").unwrap() < 100.0);
        assert!(result.corrections.contains(&"knee_valgus".to_string()));
    }

    #[test]
    fn test_rep_counted_after_bottom() {
        let mut analyzer = SquatAnalyzer::new(SquatConfig::default());
        analyze(&mut analyzer, squat_pose(175.0, 2.0), 0.0);
        analyze(&mut analyzer, squat_pose(130.0, 4.0), 0.5);
        analyze(&mut analyzer, squat_pose(88.0, 5.0), 1.0);
        let result = analyze(&mut analyzer, squat_pose(175.0, 2.0), 1.8);

        assert_eq!(analyzer.reps(), 1);
        assert_eq!(result.metric("rep_count"), Some(1.0));
    }

    #[test]
    fn test_shallow_rep_flags_depth() {
        let mut analyzer = SquatAnalyzer::new(SquatConfig::default());
        analyze(&mut analyzer, squat_pose(175.0, 2.0), 0.0);
        analyze(&mut analyzer, squat_pose(112.0, 4.0), 0.6);
        let result = analyze(&mut analyzer, squat_pose(175.0, 2.0), 1.2);

        assert_eq!(analyzer.reps(), 0);
        assert!(result.violations.iter().any(|v| v.kind == ViolationKind::InsufficientDepth));
    }

    #[test]
    fn test_butt_wink_at_bottom() {
        let mut analyzer = SquatAnalyzer::new(SquatConfig::default());
        analyze(&mut analyzer, squat_pose(125.0, 3.0), 0.0);
        let result = analyze(&mut analyzer, squat_pose(85.0, 18.0), 0.5);

        assert!(result.violations.iter().any(|v| v.kind == ViolationKind::ButtWink));
        assert!(result.score("pelvic_control").unwrap() < 100.0);
    }

    #[test]
    fn test_scores_bounded_and_mean() {
        let mut analyzer = SquatAnalyzer::new(SquatConfig::default());
        for (i, (knee, spine)) in [(170.0, 0.0), (60.0, 45.0), (100.0, 25.0), (140.0, 12.0)].iter().enumerate() {
            let result = analyze(&mut analyzer, squat_pose(*knee, *spine), i as f64);
            assert_scores_consistent(&result);
        }
    }
}
