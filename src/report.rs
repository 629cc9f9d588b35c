//! Session reporting: a pure reduction over a completed [`SessionState`]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionState;
use crate::types::{ExerciseKind, SessionId, ViolationKind};

const MAX_IMPROVEMENT_AREAS: usize = 3;
const TREND_WINDOW: usize = 5;
const HIGHLIGHT_SCORE: f64 = 95.0;
const HIGHLIGHT_IMPROVEMENT: f64 = 5.0;

/// Frame counts per score band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    /// >= 90
    pub excellent: usize,
    /// 70-89
    pub good: usize,
    /// 50-69
    pub fair: usize,
    /// < 50
    pub poor: usize,
}

impl ScoreDistribution {
    fn add(&mut self, score: f64) {
        if score >= 90.0 {
            self.excellent += 1;
        } else if score >= 70.0 {
            self.good += 1;
        } else if score >= 50.0 {
            self.fair += 1;
        } else {
            self.poor += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementArea {
    pub issue: ViolationKind,
    pub occurrences: usize,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub exercise: ExerciseKind,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub frames_processed: u64,
    pub frames_analyzed: usize,
    pub frames_not_detected: u64,
    pub average_score: f64,
    pub best_score: f64,
    pub worst_score: f64,
    pub score_distribution: ScoreDistribution,
    /// Violation code -> number of occurrences
    pub violation_summary: BTreeMap<String, usize>,
    /// Phase -> number of analyzed frames spent in it
    pub phase_distribution: BTreeMap<String, usize>,
    pub improvement_areas: Vec<ImprovementArea>,
    pub highlights: Vec<String>,
    pub next_session_focus: Vec<String>,
    /// Mean of each performance metric over analyzed frames
    pub average_metrics: BTreeMap<String, f64>,
    pub total_reps: u32,
    pub total_calories: f64,
}

impl SessionReport {
    pub fn from_state(state: &SessionState) -> Self {
        let scores = &state.score_history;
        let average_score = mean(scores);
        let best_score = scores.iter().copied().reduce(f64::max);
        let worst_score = scores.iter().copied().reduce(f64::min);

        let mut score_distribution = ScoreDistribution::default();
        for &score in scores {
            score_distribution.add(score);
        }

        let mut violation_counts: BTreeMap<ViolationKind, usize> = BTreeMap::new();
        for violation in state.violation_history.iter().flatten() {
            *violation_counts.entry(violation.kind).or_default() += 1;
        }
        let mut ranked: Vec<(ViolationKind, usize)> = violation_counts.iter().map(|(&k, &n)| (k, n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut phase_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for phase in &state.phase_history {
            *phase_distribution.entry(phase.as_str().to_string()).or_default() += 1;
        }

        let improvement_areas = ranked
            .iter()
            .take(MAX_IMPROVEMENT_AREAS)
            .map(|&(issue, occurrences)| ImprovementArea {
                issue,
                occurrences,
                topic: remediation(issue).0.to_string(),
            })
            .collect();

        let mut metric_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for metrics in &state.metrics_history {
            for (name, value) in metrics {
                let entry = metric_sums.entry(name.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        let average_metrics = metric_sums
            .into_iter()
            .map(|(name, (sum, n))| (name, sum / n as f64))
            .collect();

        Self {
            session_id: state.id,
            exercise: state.exercise,
            started_at: state.started_at,
            completed_at: Utc::now(),
            duration_seconds: state.duration_seconds,
            frames_processed: state.frames_processed,
            frames_analyzed: scores.len(),
            frames_not_detected: state.frames_not_detected,
            average_score,
            best_score: best_score.unwrap_or(0.0),
            worst_score: worst_score.unwrap_or(0.0),
            score_distribution,
            violation_summary: violation_counts.iter().map(|(k, &n)| (k.as_str().to_string(), n)).collect(),
            phase_distribution,
            improvement_areas,
            highlights: highlights(scores, best_score),
            next_session_focus: next_session_focus(average_score, ranked.first().map(|&(kind, _)| kind)),
            average_metrics,
            total_reps: state.total_reps,
            total_calories: state.total_calories,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn highlights(scores: &[f64], best: Option<f64>) -> Vec<String> {
    let mut highlights = Vec::new();
    if let Some(best) = best.filter(|&b| b >= HIGHLIGHT_SCORE) {
        highlights.push(format!("Peak form score of {best:.0}. That rep was near perfect"));
    }
    if !scores.is_empty() {
        let window = TREND_WINDOW.min(scores.len());
        let first = mean(&scores[..window]);
        let last = mean(&scores[scores.len() - window..]);
        if last - first >= HIGHLIGHT_IMPROVEMENT {
            highlights.push(format!(
                "Form improved by {:.0} points from the start to the end of the session",
                last - first
            ));
        }
    }
    highlights
}

fn next_session_focus(average_score: f64, most_frequent: Option<ViolationKind>) -> Vec<String> {
    let mut focus = vec![if average_score < 70.0 {
        "Reduce the load and rebuild technique with slow, controlled reps".to_string()
    } else if average_score < 85.0 {
        "Keep the current load and aim for the same quality on every rep".to_string()
    } else {
        "Form is solid. Progress the load or volume gradually".to_string()
    }];
    if let Some(kind) = most_frequent {
        focus.push(remediation(kind).1.to_string());
    }
    focus
}

/// (improvement topic, next-session drill) for each fault
fn remediation(kind: ViolationKind) -> (&'static str, &'static str) {
    use ViolationKind::*;
    match kind {
        SpineFlexion => ("Core bracing and spinal control", "Practice bracing with dead bugs and paused reps"),
        InsufficientDepth => ("Squat depth and hip mobility", "Add goblet squats with a pause at the bottom"),
        KneeValgus => ("Knee tracking and hip strength", "Warm up with banded lateral walks and clamshells"),
        ButtWink => ("Pelvic control at depth", "Work hamstring and ankle mobility, squat to a box at controlled depth"),
        Asymmetry => ("Left/right balance", "Include single-leg or single-arm work to even out both sides"),
        KneesPastToes => ("Hip-dominant movement pattern", "Practice box squats to learn to sit back"),
        KneeDominant => ("Hip hinge pattern", "Drill the hinge with Romanian deadlifts and dowel hinges"),
        BarDrift => ("Bar path control", "Keep the bar in contact with your legs using paused deadlifts"),
        LockoutHyperextension => ("Lockout position", "Finish reps with a glute squeeze, not a lean back"),
        LumbarExtension => ("Core stability overhead", "Strengthen with planks and half-kneeling presses"),
        BarPathDeviation => ("Vertical bar path", "Film your presses and practice moving your head out of the way"),
        ElbowFlare => ("Elbow position", "Use lighter sets focused on elbow tuck"),
        ShoulderShrug => ("Shoulder blade control", "Add face pulls and scapular depression drills"),
        SoftLockout => ("Full lockout", "Add overhead holds at lockout"),
        NarrowGrip => ("Grip width", "Experiment with a slightly wider grip on light sets"),
        TouchPointDeviation => ("Touch point consistency", "Use paused bench reps on the same spot of the chest"),
        WristHyperextension => ("Wrist stacking", "Keep the bar low in the palm and consider wrist wraps"),
        ShoulderInstability => ("Shoulder stability", "Set the shoulder blades before unracking, add rows"),
        HipSag => ("Core endurance", "Build up with shorter, perfect plank holds"),
        HipPike => ("Plank body line", "Hold planks in front of a mirror to keep hips level"),
        HeadPosition => ("Neck position", "Fix your gaze on a spot just ahead of your hands"),
        Fatigue => ("Muscular endurance", "Use several shorter sets instead of one long hold"),
        ShoulderStacking => ("Shoulder stacking", "Set elbows directly under shoulders before each hold"),
        Misalignment => ("Full-body alignment", "Practice the position in front of a mirror"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BodyProfile, Phase, Severity, Violation};

    fn state_with(scores: &[f64]) -> SessionState {
        let mut state = SessionState::new(SessionId::new(), ExerciseKind::Squat, BodyProfile::default());
        for &score in scores {
            state.score_history.push(score);
            state.violation_history.push(Vec::new());
            state.phase_history.push(Phase::Standing);
            state.metrics_history.push(BTreeMap::from([("injury_risk".to_string(), 0.1)]));
        }
        state.frames_processed = scores.len() as u64;
        state
    }

    fn violation(kind: ViolationKind) -> Violation {
        Violation {
            kind,
            severity: Severity::Medium,
            message: String::new(),
            magnitude: 1.0,
        }
    }

    #[test]
    fn test_constant_80_session() {
        let report = SessionReport::from_state(&state_with(&[80.0; 12]));
        assert!((report.average_score - 80.0).abs() < 1e-9);
        assert_eq!(report.best_score, 80.0);
        assert_eq!(report.worst_score, 80.0);
        assert!(report.violation_summary.is_empty());
        assert!(report.highlights.is_empty());
        assert!(report.improvement_areas.is_empty());
        assert_eq!(report.score_distribution.good, 12);
        assert_eq!(report.next_session_focus.len(), 1);
        assert_eq!(report.phase_distribution.get("standing"), Some(&12));
        assert!((report.average_metrics["injury_risk"] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_session() {
        let report = SessionReport::from_state(&state_with(&[]));
        assert_eq!(report.average_score, 0.0);
        assert_eq!(report.best_score, 0.0);
        assert_eq!(report.frames_analyzed, 0);
        assert!(report.highlights.is_empty());
    }

    #[test]
    fn test_highlights() {
        let report = SessionReport::from_state(&state_with(&[60.0, 62.0, 64.0, 66.0, 68.0, 75.0, 78.0, 80.0, 82.0, 84.0]));
        assert_eq!(report.highlights.len(), 1);
        assert!(report.highlights[0].starts_with("Form improved by 16"));

        let report = SessionReport::from_state(&state_with(&[96.0, 90.0]));
        assert_eq!(report.highlights.len(), 1);
        assert!(report.highlights[0].contains("96"));
    }

    #[test]
    fn test_improvement_areas_by_frequency() {
        let mut state = state_with(&[60.0, 65.0, 55.0]);
        state.violation_history[0] = vec![violation(ViolationKind::KneeValgus), violation(ViolationKind::SpineFlexion)];
        state.violation_history[1] = vec![violation(ViolationKind::KneeValgus)];
        state.violation_history[2] = vec![
            violation(ViolationKind::KneeValgus),
            violation(ViolationKind::Asymmetry),
            violation(ViolationKind::ButtWink),
            violation(ViolationKind::ButtWink),
        ];

        let report = SessionReport::from_state(&state);
        assert_eq!(report.violation_summary["knee_valgus"], 3);
        assert_eq!(report.violation_summary["butt_wink"], 2);
        let issues: Vec<ViolationKind> = report.improvement_areas.iter().map(|a| a.issue).collect();
        assert_eq!(
            issues,
            vec![ViolationKind::KneeValgus, ViolationKind::ButtWink, ViolationKind::SpineFlexion]
        );
        assert_eq!(report.next_session_focus.len(), 2);
        assert_eq!(report.next_session_focus[1], remediation(ViolationKind::KneeValgus).1);
        assert_eq!(report.score_distribution.fair, 3);
    }
}
