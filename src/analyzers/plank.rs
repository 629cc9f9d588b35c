//! Plank analyzer
//!
//! The only analyzer whose phase depends on elapsed time. A hold starts when
//! the overall score first reaches `hold_enter_score`, progresses through
//! establishing / maintaining / endurance bands, and resets whenever the
//! score drops below `hold_break_score`.

use std::collections::VecDeque;

use super::{ankle_mid, ear_mid, finish, hip_mid, shoulder_mid, ExerciseAnalyzer, MotionTracker};
use crate::config::PlankConfig;
use crate::geometry::{self, decay_score, EPSILON};
use crate::types::{AnalysisResult, ExerciseKind, LandmarkName, Phase, Pose, Severity, ViolationKind};

use LandmarkName::*;

const REQUIRED: &[LandmarkName] = &[
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftHip,
    RightHip,
    LeftAnkle,
    RightAnkle,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatigueLevel {
    Low,
    Medium,
    High,
}

impl FatigueLevel {
    fn as_metric(self) -> f64 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 1.0,
            Self::High => 2.0,
        }
    }
}

pub struct PlankAnalyzer {
    config: PlankConfig,
    hip_heights: VecDeque<f64>,
    hold_started: Option<f64>,
    motion: MotionTracker,
}

impl PlankAnalyzer {
    pub fn new(config: PlankConfig) -> Self {
        let window = config.tremor_window.max(2);
        Self {
            config,
            hip_heights: VecDeque::with_capacity(window),
            hold_started: None,
            motion: MotionTracker::default(),
        }
    }

    /// Signed hip offset from the shoulder-ankle line; positive is sagging
    fn hip_deviation(pose: &Pose) -> f64 {
        let shoulder = shoulder_mid(pose);
        let hip = hip_mid(pose);
        let ankle = ankle_mid(pose);
        let span = ankle.x - shoulder.x;
        let fraction = if span.abs() < EPSILON {
            0.5
        } else {
            ((hip.x - shoulder.x) / span).clamp(0.0, 1.0)
        };
        let ideal = shoulder.y + fraction * (ankle.y - shoulder.y);
        hip.y - ideal
    }

    /// Mean absolute frame-to-frame hip movement over the window
    fn tremor(&mut self, hip_y: f64) -> f64 {
        if self.hip_heights.len() >= self.config.tremor_window.max(2) {
            self.hip_heights.pop_front();
        }
        self.hip_heights.push_back(hip_y);

        if self.hip_heights.len() < 2 {
            return 0.0;
        }
        let deltas: f64 = self
            .hip_heights
            .iter()
            .zip(self.hip_heights.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .sum();
        deltas / (self.hip_heights.len() - 1) as f64
    }

    fn fatigue(&self, tremor: f64) -> FatigueLevel {
        if tremor > self.config.tremor_high {
            FatigueLevel::High
        } else if tremor > self.config.tremor_medium {
            FatigueLevel::Medium
        } else {
            FatigueLevel::Low
        }
    }

    /// Advance the hold timer and return (phase, seconds held)
    fn hold_phase(&mut self, overall: f64, timestamp: f64) -> (Phase, f64) {
        if overall < self.config.hold_break_score {
            if self.hold_started.take().is_some() {
                log::debug!("Plank hold broken at t={timestamp:.2}s (score {overall:.1})");
            }
            return (Phase::Breaking, 0.0);
        }
        if self.hold_started.is_none() && overall >= self.config.hold_enter_score {
            self.hold_started = Some(timestamp);
        }
        let held = match self.hold_started {
            Some(start) => (timestamp - start).max(0.0),
            None => return (Phase::Establishing, 0.0),
        };
        let phase = if held < self.config.maintain_after_secs {
            Phase::Establishing
        } else if held < self.config.endurance_after_secs {
            Phase::Maintaining
        } else {
            Phase::Endurance
        };
        (phase, held)
    }
}

impl ExerciseAnalyzer for PlankAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Plank
    }

    fn required_landmarks(&self) -> &'static [LandmarkName] {
        REQUIRED
    }

    fn analyze(&mut self, pose: &Pose, timestamp: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(ExerciseKind::Plank, timestamp);

        let ear = ear_mid(pose);
        let shoulder = shoulder_mid(pose);
        let hip = hip_mid(pose);
        let ankle = ankle_mid(pose);

        let body_line = geometry::angle_3d(&shoulder, &hip, &ankle);
        let neck = geometry::angle_3d(&ear, &shoulder, &hip);
        result.set_angle("body_line", body_line);
        result.set_angle("neck", neck);

        let alignment = geometry::alignment(&[ear, shoulder, hip, ankle]);
        result.set_score("body_alignment", alignment);
        if alignment < 70.0 {
            result.add_violation(
                ViolationKind::Misalignment,
                Severity::Medium,
                "Your body isn't in a straight line. Squeeze glutes and brace your core",
                70.0 - alignment,
            );
        }

        // Hip height
        let deviation = Self::hip_deviation(pose);
        result.set_metric("hip_deviation", deviation);
        let band = if deviation.abs() <= 0.05 {
            100.0
        } else if deviation.abs() <= 0.10 {
            80.0
        } else {
            60.0
        };
        result.set_score("hip_height", band);
        if deviation > 0.05 {
            let severity = if deviation > 0.10 { Severity::High } else { Severity::Medium };
            result.add_violation(
                ViolationKind::HipSag,
                severity,
                "Your hips are sagging. Lift them in line with your shoulders",
                deviation,
            );
        } else if deviation < -0.05 {
            let severity = if deviation < -0.10 { Severity::Medium } else { Severity::Low };
            result.add_violation(
                ViolationKind::HipPike,
                severity,
                "Your hips are too high. Lower them until your body is flat",
                -deviation,
            );
        }

        let neck_bend = if neck > 0.0 { 180.0 - neck } else { 0.0 };
        result.set_score("head_position", decay_score(neck_bend, 10.0, 3.0));
        if neck_bend > 20.0 {
            result.add_violation(
                ViolationKind::HeadPosition,
                Severity::Low,
                "Keep your neck neutral. Look at the floor just ahead of your hands",
                neck_bend,
            );
        }

        // Stability from hip tremor
        let tremor = self.tremor(hip.y);
        let fatigue = self.fatigue(tremor);
        result.set_metric("tremor", tremor);
        result.set_metric("fatigue_level", fatigue.as_metric());
        match fatigue {
            FatigueLevel::High => {
                result.set_score("stability", 60.0);
                result.add_violation(
                    ViolationKind::Fatigue,
                    Severity::Medium,
                    "You're starting to shake. Breathe steadily, or rest if form breaks",
                    tremor,
                );
            }
            FatigueLevel::Medium => result.set_score("stability", 80.0),
            FatigueLevel::Low => result.set_score("stability", 100.0),
        }

        let stack = [(LeftShoulder, LeftElbow), (RightShoulder, RightElbow)]
            .iter()
            .map(|&(s, e)| (pose.get(s).x - pose.get(e).x).abs())
            .fold(0.0, f64::max);
        result.set_score("shoulder_position", decay_score(stack, 0.05, 500.0));
        if stack > 0.05 {
            result.add_violation(
                ViolationKind::ShoulderStacking,
                Severity::Low,
                "Stack your shoulders directly over your elbows",
                stack,
            );
        }

        self.motion.record(&mut result, pose, timestamp);
        let sag_excess = (deviation.abs() - 0.05).max(0.0) * 4.0;
        finish(&mut result, sag_excess, 0);

        let (phase, held) = self.hold_phase(result.overall_score, timestamp);
        result.phase = phase;
        result.set_metric("hold_time", held);
        result.is_in_position = self.hold_started.is_some() && result.overall_score > 70.0;

        if result.violations.is_empty() {
            result.feedback.push(match phase {
                Phase::Endurance => "Outstanding hold, stay strong".to_string(),
                Phase::Maintaining => "Solid plank, keep breathing".to_string(),
                _ => "Good position, hold it".to_string(),
            });
        } else {
            let messages: Vec<String> = result.violations.iter().map(|v| v.message.clone()).collect();
            result.feedback.extend(messages);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::test_poses::*;
    use crate::types::Landmark;

    /// Side-on plank along the x axis with hips offset by `hip_offset` (down is +)
    fn plank_pose(hip_offset: f64) -> Vec<Landmark> {
        let mut lms = blank();
        for (name, x, y) in [
            (LeftEar, 0.2, 0.5),
            (RightEar, 0.2, 0.5),
            (LeftShoulder, 0.3, 0.5),
            (RightShoulder, 0.3, 0.5),
            (LeftElbow, 0.3, 0.6),
            (RightElbow, 0.3, 0.6),
            (LeftHip, 0.55, 0.5 + hip_offset),
            (RightHip, 0.55, 0.5 + hip_offset),
            (LeftAnkle, 0.85, 0.5),
            (RightAnkle, 0.85, 0.5),
        ] {
            let z = if name.as_str().starts_with("left") { -0.05 } else { 0.05 };
            set(&mut lms, name, lm(x, y, z));
        }
        lms
    }

    #[test]
    fn test_straight_plank() {
        let mut analyzer = PlankAnalyzer::new(PlankConfig::default());
        let result = analyzer.analyze(&build(plank_pose(0.0)), 0.0);

        assert_eq!(result.score("body_alignment"), Some(100.0));
        assert_eq!(result.score("hip_height"), Some(100.0));
        assert!(result.violations.is_empty());
        assert_eq!(result.phase, Phase::Establishing);
        assert!(result.is_in_position);
    }

    #[test]
    fn test_hip_sag_bands() {
        let mut analyzer = PlankAnalyzer::new(PlankConfig::default());
        let result = analyzer.analyze(&build(plank_pose(0.08)), 0.0);
        assert_eq!(result.score("hip_height"), Some(80.0));
        let sag = result.violations.iter().find(|v| v.kind == ViolationKind::HipSag).unwrap();
        assert_eq!(sag.severity, Severity::Medium);

        let result = analyzer.analyze(&build(plank_pose(0.15)), 0.1);
        assert_eq!(result.score("hip_height"), Some(60.0));

        let result = analyzer.analyze(&build(plank_pose(-0.07)), 0.2);
        assert!(result.violations.iter().any(|v| v.kind == ViolationKind::HipPike));
    }

    #[test]
    fn test_hold_bands_follow_elapsed_time() {
        let mut analyzer = PlankAnalyzer::new(PlankConfig::default());
        let pose = build(plank_pose(0.0));
        assert_eq!(analyzer.analyze(&pose, 10.0).phase, Phase::Establishing);
        assert_eq!(analyzer.analyze(&pose, 25.0).phase, Phase::Establishing);
        let maintaining = analyzer.analyze(&pose, 31.0);
        assert_eq!(maintaining.phase, Phase::Maintaining);
        assert!((maintaining.metric("hold_time").unwrap() - 21.0).abs() < 1e-9);
        assert_eq!(analyzer.analyze(&pose, 56.0).phase, Phase::Endurance);
    }

    #[test]
    fn test_hold_resets_when_form_breaks() {
        let mut analyzer = PlankAnalyzer::new(PlankConfig::default());
        let good = build(plank_pose(0.0));
        analyzer.analyze(&good, 0.0);
        analyzer.analyze(&good, 30.0);

        // collapsed hips, dropped head and elbows far out of stack
        let mut lms = plank_pose(0.2);
        set(&mut lms, LeftEar, lm(0.2, 0.7, -0.05));
        set(&mut lms, RightEar, lm(0.2, 0.7, 0.05));
        set(&mut lms, LeftElbow, lm(0.5, 0.6, -0.05));
        set(&mut lms, RightElbow, lm(0.5, 0.6, 0.05));
        let broken = analyzer.analyze(&build(lms), 31.0);
        assert!(broken.overall_score < 60.0);
        assert_eq!(broken.phase, Phase::Breaking);
        assert!(!broken.is_in_position);

        let restart = analyzer.analyze(&good, 40.0);
        assert_eq!(restart.phase, Phase::Establishing);
        assert_eq!(restart.metric("hold_time"), Some(0.0));
    }

    #[test]
    fn test_tremor_raises_fatigue() {
        let mut analyzer = PlankAnalyzer::new(PlankConfig::default());
        let mut last = None;
        for i in 0..30 {
            let offset = if i % 2 == 0 { 0.0 } else { 0.01 };
            last = Some(analyzer.analyze(&build(plank_pose(offset)), i as f64 / 30.0));
        }
        let result = last.unwrap();
        assert_eq!(result.metric("fatigue_level"), Some(2.0));
        assert_eq!(result.score("stability"), Some(60.0));
        assert!(result.violations.iter().any(|v| v.kind == ViolationKind::Fatigue));
    }

    #[test]
    fn test_scores_bounded_and_mean() {
        let mut analyzer = PlankAnalyzer::new(PlankConfig::default());
        for (i, offset) in [0.0, 0.07, 0.3, -0.12, -0.4, 0.02].iter().enumerate() {
            assert_scores_consistent(&analyzer.analyze(&build(plank_pose(*offset)), i as f64 * 0.5));
        }
    }
}
