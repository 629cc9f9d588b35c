//! Core data types for the form-analysis engine

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Number of landmarks in a full-body pose (MediaPipe Pose topology)
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Unique identifier for an analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single body keypoint in normalized image space.
///
/// `x` grows to the right, `y` grows downward, `z` is relative depth.
/// Detectors that do not report depth leave `z` at 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Detector confidence (0.0-1.0)
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// The 33 anatomical landmark names, in detector output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
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
}

impl LandmarkName {
    pub const ALL: [LandmarkName; POSE_LANDMARK_COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Position of this landmark in the detector's output array
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }
}

/// One frame of body keypoints. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    landmarks: Vec<Landmark>,
}

impl Pose {
    /// Build a pose from detector output; exactly 33 landmarks are required.
    pub fn new(landmarks: Vec<Landmark>) -> Result<Self> {
        if landmarks.len() != POSE_LANDMARK_COUNT {
            return Err(EngineError::InvalidPose {
                expected: POSE_LANDMARK_COUNT,
                got: landmarks.len(),
            });
        }
        Ok(Self { landmarks })
    }

    pub fn from_slice(landmarks: &[Landmark]) -> Result<Self> {
        Self::new(landmarks.to_vec())
    }

    pub fn get(&self, name: LandmarkName) -> &Landmark {
        &self.landmarks[name.index()]
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Midpoint of two landmarks; visibility is the lower of the two
    pub fn midpoint(&self, a: LandmarkName, b: LandmarkName) -> Landmark {
        let (a, b) = (self.get(a), self.get(b));
        Landmark {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
            z: (a.z + b.z) / 2.0,
            visibility: a.visibility.min(b.visibility),
        }
    }

    /// First required landmark that is missing, non-finite or below `min_visibility`
    pub fn first_unusable(&self, required: &[LandmarkName], min_visibility: f64) -> Option<LandmarkName> {
        required.iter().copied().find(|&name| {
            let lm = self.get(name);
            !lm.is_finite() || !(lm.visibility >= min_visibility)
        })
    }
}

/// Exercise families with a dedicated analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Squat,
    Deadlift,
    OverheadPress,
    BenchPress,
    Plank,
    /// Fallback for exercise ids without a registered analyzer
    Generic,
}

impl ExerciseKind {
    /// Resolve a caller-supplied exercise id. Unknown ids return `None`.
    pub fn from_id(id: &str) -> Option<Self> {
        let normalized: String = id
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "squat" | "squats" | "back_squat" | "bodyweight_squat" | "air_squat" => Some(Self::Squat),
            "deadlift" | "deadlifts" | "conventional_deadlift" | "romanian_deadlift" => Some(Self::Deadlift),
            "overhead_press" | "ohp" | "shoulder_press" | "military_press" => Some(Self::OverheadPress),
            "bench_press" | "bench" | "flat_bench" => Some(Self::BenchPress),
            "plank" | "forearm_plank" | "high_plank" => Some(Self::Plank),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Squat => "squat",
            Self::Deadlift => "deadlift",
            Self::OverheadPress => "overhead_press",
            Self::BenchPress => "bench_press",
            Self::Plank => "plank",
            Self::Generic => "generic",
        }
    }

    /// Human-readable name used in coaching text
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Squat => "squat",
            Self::Deadlift => "deadlift",
            Self::OverheadPress => "overhead press",
            Self::BenchPress => "bench press",
            Self::Plank => "plank",
            Self::Generic => "exercise",
        }
    }

    /// Score categories reported by this exercise's analyzer
    pub fn score_categories(self) -> &'static [&'static str] {
        match self {
            Self::Squat => &[
                "spine_neutrality",
                "depth",
                "knee_tracking",
                "pelvic_control",
                "symmetry",
                "knee_position",
            ],
            Self::Deadlift => &["spine_neutrality", "hip_hinge", "bar_path", "lockout", "symmetry"],
            Self::OverheadPress => &[
                "lumbar_control",
                "bar_path",
                "elbow_position",
                "shoulder_position",
                "lockout",
                "symmetry",
            ],
            Self::BenchPress => &[
                "elbow_position",
                "touch_point",
                "wrist_alignment",
                "shoulder_stability",
                "symmetry",
            ],
            Self::Plank => &[
                "body_alignment",
                "hip_height",
                "head_position",
                "stability",
                "shoulder_position",
            ],
            Self::Generic => &["body_alignment", "symmetry"],
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exercise phase. Each analyzer uses its own subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    // squat
    Standing,
    Descending,
    Parallel,
    Bottom,
    Ascending,
    // deadlift
    Setup,
    Pull,
    Lockout,
    // overhead / bench press
    RackPosition,
    Pressing,
    MidPress,
    // plank hold
    Establishing,
    Maintaining,
    Endurance,
    Breaking,
    // generic analyzer
    Active,
    /// Landmarks missing or below the confidence threshold
    NotDetected,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standing => "standing",
            Self::Descending => "descending",
            Self::Parallel => "parallel",
            Self::Bottom => "bottom",
            Self::Ascending => "ascending",
            Self::Setup => "setup",
            Self::Pull => "pull",
            Self::Lockout => "lockout",
            Self::RackPosition => "rack_position",
            Self::Pressing => "pressing",
            Self::MidPress => "mid_press",
            Self::Establishing => "establishing",
            Self::Maintaining => "maintaining",
            Self::Endurance => "endurance",
            Self::Breaking => "breaking",
            Self::Active => "active",
            Self::NotDetected => "not_detected",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Priority rank: critical = 1 ... low = 4
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// Body regions that visual indicators can highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    Head,
    Neck,
    Shoulders,
    Elbows,
    Wrists,
    Chest,
    Spine,
    Core,
    Hips,
    Knees,
    Ankles,
}

/// Every form fault the analyzers can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    SpineFlexion,
    InsufficientDepth,
    KneeValgus,
    ButtWink,
    Asymmetry,
    KneesPastToes,
    KneeDominant,
    BarDrift,
    LockoutHyperextension,
    LumbarExtension,
    BarPathDeviation,
    ElbowFlare,
    ShoulderShrug,
    SoftLockout,
    NarrowGrip,
    TouchPointDeviation,
    WristHyperextension,
    ShoulderInstability,
    HipSag,
    HipPike,
    HeadPosition,
    Fatigue,
    ShoulderStacking,
    Misalignment,
}

impl ViolationKind {
    /// Issue code used in `AnalysisResult::corrections`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpineFlexion => "spine_flexion",
            Self::InsufficientDepth => "insufficient_depth",
            Self::KneeValgus => "knee_valgus",
            Self::ButtWink => "butt_wink",
            Self::Asymmetry => "asymmetry",
            Self::KneesPastToes => "knees_past_toes",
            Self::KneeDominant => "knee_dominant",
            Self::BarDrift => "bar_drift",
            Self::LockoutHyperextension => "lockout_hyperextension",
            Self::LumbarExtension => "lumbar_extension",
            Self::BarPathDeviation => "bar_path_deviation",
            Self::ElbowFlare => "elbow_flare",
            Self::ShoulderShrug => "shoulder_shrug",
            Self::SoftLockout => "soft_lockout",
            Self::NarrowGrip => "narrow_grip",
            Self::TouchPointDeviation => "touch_point_deviation",
            Self::WristHyperextension => "wrist_hyperextension",
            Self::ShoulderInstability => "shoulder_instability",
            Self::HipSag => "hip_sag",
            Self::HipPike => "hip_pike",
            Self::HeadPosition => "head_position",
            Self::Fatigue => "fatigue",
            Self::ShoulderStacking => "shoulder_stacking",
            Self::Misalignment => "misalignment",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == code)
    }

    pub const ALL: [ViolationKind; 24] = [
        Self::SpineFlexion,
        Self::InsufficientDepth,
        Self::KneeValgus,
        Self::ButtWink,
        Self::Asymmetry,
        Self::KneesPastToes,
        Self::KneeDominant,
        Self::BarDrift,
        Self::LockoutHyperextension,
        Self::LumbarExtension,
        Self::BarPathDeviation,
        Self::ElbowFlare,
        Self::ShoulderShrug,
        Self::SoftLockout,
        Self::NarrowGrip,
        Self::TouchPointDeviation,
        Self::WristHyperextension,
        Self::ShoulderInstability,
        Self::HipSag,
        Self::HipPike,
        Self::HeadPosition,
        Self::Fatigue,
        Self::ShoulderStacking,
        Self::Misalignment,
    ];

    /// Score category this fault is charged against
    pub fn category(self) -> &'static str {
        match self {
            Self::SpineFlexion => "spine_neutrality",
            Self::InsufficientDepth => "depth",
            Self::KneeValgus => "knee_tracking",
            Self::ButtWink => "pelvic_control",
            Self::Asymmetry => "symmetry",
            Self::KneesPastToes => "knee_position",
            Self::KneeDominant => "hip_hinge",
            Self::BarDrift | Self::BarPathDeviation => "bar_path",
            Self::LockoutHyperextension | Self::SoftLockout => "lockout",
            Self::LumbarExtension => "lumbar_control",
            Self::ElbowFlare | Self::NarrowGrip => "elbow_position",
            Self::ShoulderShrug | Self::ShoulderStacking => "shoulder_position",
            Self::TouchPointDeviation => "touch_point",
            Self::WristHyperextension => "wrist_alignment",
            Self::ShoulderInstability => "shoulder_stability",
            Self::HipSag | Self::HipPike => "hip_height",
            Self::HeadPosition => "head_position",
            Self::Fatigue => "stability",
            Self::Misalignment => "body_alignment",
        }
    }

    /// Short spoken cue for this fault
    pub fn cue(self) -> &'static str {
        match self {
            Self::SpineFlexion => "Chest up, keep your back flat",
            Self::InsufficientDepth => "Sit deeper",
            Self::KneeValgus => "Push your knees out",
            Self::ButtWink => "Control the bottom, keep your pelvis neutral",
            Self::Asymmetry => "Even out both sides",
            Self::KneesPastToes => "Sit back into your hips",
            Self::KneeDominant => "Hinge at the hips",
            Self::BarDrift => "Keep the bar close",
            Self::LockoutHyperextension => "Stand tall, don't lean back",
            Self::LumbarExtension => "Squeeze your glutes, ribs down",
            Self::BarPathDeviation => "Press straight up",
            Self::ElbowFlare => "Tuck your elbows",
            Self::ShoulderShrug => "Shoulders down",
            Self::SoftLockout => "Finish the lockout",
            Self::NarrowGrip => "Widen your elbows slightly",
            Self::TouchPointDeviation => "Touch mid-chest",
            Self::WristHyperextension => "Stack your wrists",
            Self::ShoulderInstability => "Pin your shoulder blades",
            Self::HipSag => "Lift your hips",
            Self::HipPike => "Lower your hips",
            Self::HeadPosition => "Neutral neck, eyes down",
            Self::Fatigue => "Breathe and brace",
            Self::ShoulderStacking => "Shoulders over elbows",
            Self::Misalignment => "Straighten your body line",
        }
    }

    pub fn body_regions(self) -> &'static [BodyRegion] {
        use BodyRegion::*;
        match self {
            Self::SpineFlexion | Self::LumbarExtension => &[Spine],
            Self::InsufficientDepth => &[Hips, Knees],
            Self::KneeValgus => &[Knees],
            Self::ButtWink => &[Hips, Spine],
            Self::Asymmetry => &[Hips, Shoulders],
            Self::KneesPastToes => &[Knees, Ankles],
            Self::KneeDominant => &[Hips, Knees],
            Self::BarDrift | Self::BarPathDeviation => &[Wrists],
            Self::LockoutHyperextension => &[Spine, Hips],
            Self::ElbowFlare | Self::SoftLockout => &[Elbows],
            Self::ShoulderShrug => &[Shoulders, Neck],
            Self::NarrowGrip => &[Elbows, Wrists],
            Self::TouchPointDeviation => &[Chest, Wrists],
            Self::WristHyperextension => &[Wrists],
            Self::ShoulderInstability | Self::ShoulderStacking => &[Shoulders],
            Self::HipSag | Self::HipPike => &[Hips, Core],
            Self::HeadPosition => &[Head, Neck],
            Self::Fatigue => &[Core],
            Self::Misalignment => &[Spine, Hips],
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected biomechanical fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    /// How far past the threshold the fault went, in the check's own units
    pub magnitude: f64,
}

/// A body region to highlight on the client overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualIndicator {
    pub region: BodyRegion,
    pub urgency: Severity,
    pub issue: ViolationKind,
}

/// One entry of the top-3 correction list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedCorrection {
    pub issue: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub category_score: f64,
}

/// Presentation layer built from an `AnalysisResult`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coaching {
    pub instant_feedback: String,
    pub voice_cue: String,
    pub visual_indicators: Vec<VisualIndicator>,
    pub corrections: Vec<PrioritizedCorrection>,
    pub motivation: String,
    pub next_rep_focus: String,
}

/// Per-frame output of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub exercise: ExerciseKind,
    pub timestamp: f64,
    pub frame_index: u64,
    /// Joint angles in degrees
    pub angles: BTreeMap<String, f64>,
    /// Category scores (0-100)
    pub scores: BTreeMap<String, f64>,
    /// Arithmetic mean of `scores`
    pub overall_score: f64,
    pub feedback: Vec<String>,
    /// Issue codes, in detection order
    pub corrections: Vec<String>,
    pub is_in_position: bool,
    pub phase: Phase,
    pub violations: Vec<Violation>,
    pub performance_metrics: BTreeMap<String, f64>,
    /// Calories burned since the previous frame
    pub calories_burned: f64,
    /// Session total including this frame
    pub total_calories: f64,
    pub coaching: Option<Coaching>,
}

impl AnalysisResult {
    pub fn new(exercise: ExerciseKind, timestamp: f64) -> Self {
        Self {
            exercise,
            timestamp,
            frame_index: 0,
            angles: BTreeMap::new(),
            scores: BTreeMap::new(),
            overall_score: 0.0,
            feedback: Vec::new(),
            corrections: Vec::new(),
            is_in_position: false,
            phase: Phase::Active,
            violations: Vec::new(),
            performance_metrics: BTreeMap::new(),
            calories_burned: 0.0,
            total_calories: 0.0,
            coaching: None,
        }
    }

    /// Result for a frame whose landmarks could not be trusted
    pub fn not_detected(exercise: ExerciseKind, timestamp: f64, reason: &str) -> Self {
        let mut result = Self::new(exercise, timestamp);
        for category in exercise.score_categories() {
            result.scores.insert((*category).to_string(), 0.0);
        }
        result.phase = Phase::NotDetected;
        result.feedback.push(format!(
            "Body not fully detected ({reason}). Step back so your whole body is in frame and well lit."
        ));
        result
    }

    pub fn set_angle(&mut self, name: &str, degrees: f64) {
        self.angles.insert(name.to_string(), degrees);
    }

    /// Record a category score, clamped to 0-100 (non-finite becomes 0)
    pub fn set_score(&mut self, category: &str, score: f64) {
        let score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
        self.scores.insert(category.to_string(), score);
    }

    pub fn score(&self, category: &str) -> Option<f64> {
        self.scores.get(category).copied()
    }

    pub fn set_metric(&mut self, name: &str, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.performance_metrics.insert(name.to_string(), value);
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.performance_metrics.get(name).copied()
    }

    /// Record a violation and its correction code
    pub fn add_violation(&mut self, kind: ViolationKind, severity: Severity, message: impl Into<String>, magnitude: f64) {
        let code = kind.as_str();
        if !self.corrections.iter().any(|c| c == code) {
            self.corrections.push(code.to_string());
        }
        self.violations.push(Violation {
            kind,
            severity,
            message: message.into(),
            magnitude: if magnitude.is_finite() { magnitude } else { 0.0 },
        });
    }

    pub fn has_urgent_violation(&self) -> bool {
        self.violations.iter().any(|v| v.severity.is_urgent())
    }

    /// Set `overall_score` to the mean of the category scores
    pub fn finalize(&mut self) {
        self.overall_score = if self.scores.is_empty() {
            0.0
        } else {
            self.scores.values().sum::<f64>() / self.scores.len() as f64
        };
    }
}

/// Self-reported training experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl FitnessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

/// Body measurements used for calorie and power estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyProfile {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub fitness_level: FitnessLevel,
}

impl Default for BodyProfile {
    fn default() -> Self {
        Self {
            weight_kg: 70.0,
            height_cm: 170.0,
            fitness_level: FitnessLevel::Intermediate,
        }
    }
}

impl BodyProfile {
    pub fn validate(&self) -> Result<()> {
        if !(self.weight_kg.is_finite() && self.weight_kg > 0.0) {
            return Err(EngineError::InvalidProfile(format!("weight_kg must be positive, got {}", self.weight_kg)));
        }
        if !(self.height_cm.is_finite() && self.height_cm > 0.0) {
            return Err(EngineError::InvalidProfile(format!("height_cm must be positive, got {}", self.height_cm)));
        }
        Ok(())
    }
}

/// One analyzed frame, as handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub session_id: SessionId,
    pub frame_index: u64,
    pub result: AnalysisResult,
}

/// Live coaching pushed to the lifter's client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveCue {
    pub session_id: SessionId,
    pub frame_index: u64,
    pub instant_feedback: String,
    pub voice_cue: String,
}

/// A frame submitted through batch processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFrame {
    pub session_id: SessionId,
    pub exercise_id: String,
    pub timestamp: f64,
    pub landmarks: Vec<Landmark>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_order_matches_detector() {
        assert_eq!(LandmarkName::Nose.index(), 0);
        assert_eq!(LandmarkName::LeftShoulder.index(), 11);
        assert_eq!(LandmarkName::LeftHip.index(), 23);
        assert_eq!(LandmarkName::RightFootIndex.index(), 32);
        for (i, name) in LandmarkName::ALL.iter().enumerate() {
            assert_eq!(name.index(), i);
        }
    }

    #[test]
    fn test_pose_requires_33_landmarks() {
        assert!(Pose::new(vec![Landmark::default(); 32]).is_err());
        assert!(Pose::new(vec![Landmark::default(); 33]).is_ok());
    }

    #[test]
    fn test_exercise_id_resolution() {
        assert_eq!(ExerciseKind::from_id("Squat"), Some(ExerciseKind::Squat));
        assert_eq!(ExerciseKind::from_id("bench-press"), Some(ExerciseKind::BenchPress));
        assert_eq!(ExerciseKind::from_id("overhead press"), Some(ExerciseKind::OverheadPress));
        assert_eq!(ExerciseKind::from_id("burpee"), None);
    }

    #[test]
    fn test_finalize_is_mean_of_scores() {
        let mut result = AnalysisResult::new(ExerciseKind::Squat, 0.0);
        result.set_score("a", 100.0);
        result.set_score("b", 50.0);
        result.set_score("c", 150.0); // clamped to 100
        result.finalize();
        assert!((result.overall_score - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_detected_has_zero_scores() {
        let result = AnalysisResult::not_detected(ExerciseKind::Plank, 1.0, "low confidence");
        assert_eq!(result.phase, Phase::NotDetected);
        assert_eq!(result.scores.len(), ExerciseKind::Plank.score_categories().len());
        assert!(result.scores.values().all(|s| *s == 0.0));
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_violation_codes_round_trip() {
        for kind in ViolationKind::ALL {
            assert_eq!(ViolationKind::from_code(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
        assert_eq!(Severity::Critical.rank(), 1);
        assert_eq!(Severity::Low.rank(), 4);
    }
}
