//! Per-session frame processing
//!
//! A [`Session`] owns everything that changes between frames: the active
//! analyzer and its rolling buffers, the feedback random source and the
//! accumulated [`SessionState`]. Frames for one session must arrive from a
//! single writer with strictly increasing timestamps.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzers::{resolve_analyzer, ExerciseAnalyzer};
use crate::calories::calculate_calories_burned;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::feedback::FeedbackGenerator;
use crate::geometry::{self, EPSILON};
use crate::types::{
    AnalysisResult, BodyProfile, ExerciseKind, Landmark, LandmarkName, Phase, Pose, SessionId, Violation,
};

const GRAVITY: f64 = 9.81;

/// Landmarks spanning the body height, used to scale image units to meters
const SCALE_LANDMARKS: &[LandmarkName] = &[LandmarkName::Nose, LandmarkName::LeftAnkle, LandmarkName::RightAnkle];

/// Everything a session accumulates, handed to the reporter on completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    /// Exercise of the most recent frame
    pub exercise: ExerciseKind,
    pub profile: BodyProfile,
    pub started_at: DateTime<Utc>,
    pub last_timestamp: Option<f64>,
    /// Sum of frame-to-frame time deltas, seconds
    pub duration_seconds: f64,
    pub total_calories: f64,
    pub total_reps: u32,
    pub frames_processed: u64,
    pub frames_not_detected: u64,

    // Histories of analyzed (detected) frames only, index-aligned
    pub score_history: Vec<f64>,
    pub violation_history: Vec<Vec<Violation>>,
    pub phase_history: Vec<Phase>,
    pub metrics_history: Vec<BTreeMap<String, f64>>,
}

impl SessionState {
    pub fn new(id: SessionId, exercise: ExerciseKind, profile: BodyProfile) -> Self {
        Self {
            id,
            exercise,
            profile,
            started_at: Utc::now(),
            last_timestamp: None,
            duration_seconds: 0.0,
            total_calories: 0.0,
            total_reps: 0,
            frames_processed: 0,
            frames_not_detected: 0,
            score_history: Vec::new(),
            violation_history: Vec::new(),
            phase_history: Vec::new(),
            metrics_history: Vec::new(),
        }
    }

    /// Check the timestamp contract and return this frame's `dt`
    fn advance_clock(&mut self, timestamp: f64) -> Result<f64> {
        if !timestamp.is_finite() {
            return Err(EngineError::InvalidTimestamp(timestamp));
        }
        let dt = match self.last_timestamp {
            Some(previous) if timestamp <= previous => {
                return Err(EngineError::OutOfOrderTimestamp {
                    session: self.id,
                    previous,
                    received: timestamp,
                });
            }
            Some(previous) => timestamp - previous,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);
        self.duration_seconds += dt;
        Ok(dt)
    }

    fn record(&mut self, result: &AnalysisResult) {
        self.score_history.push(result.overall_score);
        self.violation_history.push(result.violations.clone());
        self.phase_history.push(result.phase);
        self.metrics_history.push(result.performance_metrics.clone());
    }
}

pub struct Session {
    state: SessionState,
    analyzer: Box<dyn ExerciseAnalyzer>,
    feedback: FeedbackGenerator,
    config: Arc<EngineConfig>,
    /// Analyzer rep count already credited to `state.total_reps`
    reps_credited: u32,
}

impl Session {
    pub fn new(
        id: SessionId,
        exercise_id: &str,
        profile: BodyProfile,
        config: Arc<EngineConfig>,
        feedback_seed: Option<u64>,
    ) -> Result<Self> {
        profile.validate()?;
        let analyzer = resolve_analyzer(exercise_id, &config);
        Ok(Self {
            state: SessionState::new(id, analyzer.kind(), profile),
            analyzer,
            feedback: FeedbackGenerator::new(feedback_seed),
            config,
            reps_credited: 0,
        })
    }

    pub fn id(&self) -> SessionId {
        self.state.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Analyze one frame.
    ///
    /// Fails only on a timestamp contract violation. Incomplete or
    /// low-confidence landmarks produce a not-detected result instead.
    pub fn process_frame(&mut self, landmarks: &[Landmark], exercise_id: &str, timestamp: f64) -> Result<AnalysisResult> {
        let dt = self.state.advance_clock(timestamp)?;
        let frame_index = self.state.frames_processed;
        self.state.frames_processed += 1;

        self.switch_exercise(exercise_id);
        let kind = self.analyzer.kind();

        let pose = match self.validate(landmarks) {
            Ok(pose) => pose,
            Err(reason) => {
                log::debug!("Session {} frame {frame_index}: not detected ({reason})", self.state.id);
                self.state.frames_not_detected += 1;
                let mut result = AnalysisResult::not_detected(kind, timestamp, &reason);
                result.frame_index = frame_index;
                result.total_calories = self.state.total_calories;
                result.coaching = Some(self.feedback.generate(&result));
                return Ok(result);
            }
        };

        let mut result = self.analyzer.analyze(&pose, timestamp);
        result.frame_index = frame_index;

        let reps = self.analyzer.reps();
        let new_reps = reps.saturating_sub(self.reps_credited);
        self.reps_credited = reps;
        self.state.total_reps += new_reps;

        let weight = self.state.profile.weight_kg;
        result.calories_burned = calculate_calories_burned(kind, dt, new_reps, result.overall_score, weight);
        self.state.total_calories += result.calories_burned;
        result.total_calories = self.state.total_calories;

        if let Some(power) = self.power_output(&pose, result.metric("vertical_velocity").unwrap_or(0.0)) {
            result.set_metric("power_output", power);
        }

        self.state.record(&result);
        result.coaching = Some(self.feedback.generate(&result));

        log::trace!(
            "Session {} frame {frame_index}: {} score={:.1} phase={}",
            self.state.id,
            kind,
            result.overall_score,
            result.phase.as_str()
        );
        Ok(result)
    }

    /// Hand over the accumulated state. Consumes the session.
    pub fn into_state(self) -> SessionState {
        self.state
    }

    fn switch_exercise(&mut self, exercise_id: &str) {
        let requested = ExerciseKind::from_id(exercise_id).unwrap_or(ExerciseKind::Generic);
        if requested == self.analyzer.kind() {
            return;
        }
        log::info!(
            "Session {} switching exercise {} -> {}",
            self.state.id,
            self.analyzer.kind(),
            requested
        );
        self.analyzer = resolve_analyzer(exercise_id, &self.config);
        self.state.exercise = self.analyzer.kind();
        self.reps_credited = 0;
    }

    fn validate(&self, landmarks: &[Landmark]) -> std::result::Result<Pose, String> {
        let pose = Pose::from_slice(landmarks).map_err(|e| e.to_string())?;
        match pose.first_unusable(self.analyzer.required_landmarks(), self.config.min_visibility) {
            Some(name) => Err(format!("{} not visible", name.as_str())),
            None => Ok(pose),
        }
    }

    /// Mechanical power of moving body weight vertically, in watts.
    ///
    /// Image units are scaled to meters using the lifter's height against the
    /// nose-to-ankle span in the frame. `None` when those landmarks are not
    /// reliably visible, since the scale would be meaningless.
    fn power_output(&self, pose: &Pose, vertical_velocity: f64) -> Option<f64> {
        if pose.first_unusable(SCALE_LANDMARKS, self.config.min_visibility).is_some() {
            return None;
        }
        let ankles = pose.midpoint(LandmarkName::LeftAnkle, LandmarkName::RightAnkle);
        let span = geometry::distance_3d(pose.get(LandmarkName::Nose), &ankles);
        if span < EPSILON {
            return None;
        }
        let meters_per_unit = (self.state.profile.height_cm / 100.0) / span;
        Some(self.state.profile.weight_kg * GRAVITY * vertical_velocity.abs() * meters_per_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::POSE_LANDMARK_COUNT;

    fn session(exercise: &str) -> Session {
        Session::new(
            SessionId::new(),
            exercise,
            BodyProfile::default(),
            Arc::new(EngineConfig::default()),
            Some(7),
        )
        .unwrap()
    }

    /// Upright standing body, fully visible
    fn standing() -> Vec<Landmark> {
        let mut lms = vec![Landmark::new(0.5, 0.5, 0.0, 1.0); POSE_LANDMARK_COUNT];
        let mut put = |name: LandmarkName, x: f64, y: f64| lms[name.index()] = Landmark::new(x, y, 0.0, 1.0);
        put(LandmarkName::Nose, 0.5, 0.12);
        put(LandmarkName::LeftEar, 0.46, 0.13);
        put(LandmarkName::RightEar, 0.54, 0.13);
        put(LandmarkName::LeftShoulder, 0.44, 0.25);
        put(LandmarkName::RightShoulder, 0.56, 0.25);
        put(LandmarkName::LeftHip, 0.46, 0.5);
        put(LandmarkName::RightHip, 0.54, 0.5);
        put(LandmarkName::LeftKnee, 0.46, 0.7);
        put(LandmarkName::RightKnee, 0.54, 0.7);
        put(LandmarkName::LeftAnkle, 0.46, 0.9);
        put(LandmarkName::RightAnkle, 0.54, 0.9);
        lms
    }

    #[test]
    fn test_first_frame_has_zero_dt() {
        let mut s = session("generic_stretch");
        let result = s.process_frame(&standing(), "generic_stretch", 5.0).unwrap();
        assert_eq!(result.frame_index, 0);
        assert_eq!(result.calories_burned, 0.0);
        assert_eq!(s.state().duration_seconds, 0.0);
        assert!(result.coaching.is_some());
    }

    #[test]
    fn test_out_of_order_rejected_without_side_effects() {
        let mut s = session("generic");
        s.process_frame(&standing(), "generic", 1.0).unwrap();
        let err = s.process_frame(&standing(), "generic", 1.0).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrderTimestamp { previous, received, .. } if previous == 1.0 && received == 1.0));
        assert_eq!(s.state().frames_processed, 1);

        let err = s.process_frame(&standing(), "generic", f64::NAN).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_short_landmark_list_is_not_detected() {
        let mut s = session("squat");
        let result = s.process_frame(&standing()[..20], "squat", 0.0).unwrap();
        assert_eq!(result.phase, Phase::NotDetected);
        assert_eq!(result.overall_score, 0.0);
        assert!(result.scores.values().all(|&v| v == 0.0));
        assert_eq!(s.state().frames_not_detected, 1);
        assert!(s.state().score_history.is_empty());
    }

    #[test]
    fn test_calories_accumulate_over_time() {
        let mut s = session("generic");
        let mut last = 0.0;
        for i in 0..10 {
            let result = s.process_frame(&standing(), "generic", i as f64 * 0.5).unwrap();
            assert!(result.total_calories >= last);
            last = result.total_calories;
        }
        assert!(last > 0.0);
        assert!((s.state().duration_seconds - 4.5).abs() < 1e-9);
        assert_eq!(s.state().score_history.len(), 10);
    }

    #[test]
    fn test_exercise_switch_replaces_analyzer() {
        let mut s = session("squat");
        assert_eq!(s.state().exercise, ExerciseKind::Squat);
        let result = s.process_frame(&standing(), "plank", 0.0).unwrap();
        assert_eq!(result.exercise, ExerciseKind::Plank);
        assert_eq!(s.state().exercise, ExerciseKind::Plank);
    }

    #[test]
    fn test_power_output_uses_body_scale() {
        let mut s = session("generic");
        s.process_frame(&standing(), "generic", 0.0).unwrap();
        let mut risen = standing();
        for lm in risen.iter_mut() {
            lm.y -= 0.078;
        }
        let result = s.process_frame(&risen, "generic", 1.0).unwrap();
        // 0.078 units/s over a 0.78 unit body of 1.7 m => 0.17 m/s
        let expected = 70.0 * GRAVITY * 0.17;
        assert!((result.metric("power_output").unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_power_output_skipped_without_visible_scale() {
        let mut s = session("generic");
        let mut first = standing();
        first[LandmarkName::Nose.index()] = Landmark::new(0.5, 0.85, 0.0, 0.0);
        s.process_frame(&first, "generic", 0.0).unwrap();

        let mut risen = first.clone();
        for lm in risen.iter_mut() {
            lm.y -= 0.078;
        }
        let result = s.process_frame(&risen, "generic", 1.0).unwrap();
        assert_ne!(result.phase, Phase::NotDetected);
        assert!(result.metric("vertical_velocity").unwrap() > 0.0);
        assert_eq!(result.metric("power_output"), None);
        assert!(s.state().metrics_history.iter().all(|m| !m.contains_key("power_output")));
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let profile = BodyProfile {
            weight_kg: -1.0,
            ..BodyProfile::default()
        };
        let err = Session::new(SessionId::new(), "squat", profile, Arc::new(EngineConfig::default()), None);
        assert!(matches!(err, Err(EngineError::InvalidProfile(_))));
    }
}
