//! Coaching feedback
//!
//! Turns an [`AnalysisResult`] into what the lifter sees and hears. This is a
//! presentation layer only: scores and violations are read, never changed.
//!
//! Template pool selection:
//! - any critical/high violation: warning pool, whatever the score
//! - overall score >= 90: perfect-form pool
//! - otherwise: good-form pool

use std::collections::BTreeMap;

use crate::analyzers::generate_voice_feedback;
use crate::types::{
    AnalysisResult, BodyRegion, Coaching, Phase, PrioritizedCorrection, Severity, ViolationKind, VisualIndicator,
};

const MAX_CORRECTIONS: usize = 3;

const PERFECT_TEMPLATES: [&str; 4] = [
    "Perfect {exercise} form! Keep it exactly like that",
    "Textbook {exercise}, everything is lined up",
    "Flawless rep. That's how a {exercise} should look",
    "Excellent {exercise} technique, stay consistent",
];

const GOOD_TEMPLATES: [&str; 4] = [
    "Good {exercise}. {cue}",
    "Solid work. {cue}",
    "Nice rep, small fix: {cue}",
    "You're close. {cue}",
];

const WARNING_TEMPLATES: [&str; 3] = [
    "Careful! {issue}",
    "Form check: {issue}",
    "Watch out. {issue}",
];

const MOTIVATION_EXCELLENT: [&str; 2] = ["You're crushing it!", "Elite form, keep stacking reps like this!"];
const MOTIVATION_GOOD: [&str; 2] = ["Great work, you're getting stronger!", "Nice and steady, keep it up!"];
const MOTIVATION_FAIR: [&str; 2] = ["Stay focused, every rep is practice", "You've got this, one fix at a time"];
const MOTIVATION_LOW: [&str; 2] = [
    "Slow it down and own each rep",
    "Quality over quantity. Lighten up if you need to",
];

/// Per-session feedback generator. Owns its random source so phrase choice
/// is reproducible from a seed.
pub struct FeedbackGenerator {
    rng: fastrand::Rng,
}

impl FeedbackGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self { rng }
    }

    pub fn generate(&mut self, result: &AnalysisResult) -> Coaching {
        if result.phase == Phase::NotDetected {
            return Coaching {
                instant_feedback: result
                    .feedback
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Step into the frame".to_string()),
                voice_cue: "Step into the frame".to_string(),
                visual_indicators: Vec::new(),
                corrections: Vec::new(),
                motivation: "Get set up and we'll start tracking".to_string(),
                next_rep_focus: "Make sure your whole body is visible".to_string(),
            };
        }

        let corrections = prioritize_corrections(result);
        let instant_feedback = self.instant_feedback(result, &corrections);
        let voice_cue = match corrections.first() {
            Some(top) if top.severity.is_urgent() => top.issue.cue().to_string(),
            _ => generate_voice_feedback(result, &mut self.rng),
        };

        Coaching {
            instant_feedback,
            voice_cue,
            visual_indicators: visual_indicators(result),
            motivation: self.motivation(result.overall_score),
            next_rep_focus: next_rep_focus(result, &corrections),
            corrections,
        }
    }

    fn instant_feedback(&mut self, result: &AnalysisResult, corrections: &[PrioritizedCorrection]) -> String {
        let exercise = result.exercise.display_name();

        if result.has_urgent_violation() {
            let issue = corrections
                .iter()
                .find(|c| c.severity.is_urgent())
                .map(|c| c.message.as_str())
                .unwrap_or("Reset your position");
            return self.pick(&WARNING_TEMPLATES).replace("{issue}", issue);
        }

        if result.overall_score >= 90.0 {
            return self.pick(&PERFECT_TEMPLATES).replace("{exercise}", exercise);
        }

        let cue = corrections
            .first()
            .map(|c| c.issue.cue())
            .unwrap_or("Keep the movement smooth and controlled");
        self.pick(&GOOD_TEMPLATES).replace("{exercise}", exercise).replace("{cue}", cue)
    }

    fn motivation(&mut self, score: f64) -> String {
        let pool: &[&str] = if score >= 90.0 {
            &MOTIVATION_EXCELLENT
        } else if score >= 75.0 {
            &MOTIVATION_GOOD
        } else if score >= 60.0 {
            &MOTIVATION_FAIR
        } else {
            &MOTIVATION_LOW
        };
        self.pick(pool).to_string()
    }

    fn pick<'a>(&mut self, pool: &[&'a str]) -> &'a str {
        pool[self.rng.usize(..pool.len())]
    }
}

/// Violations ordered by severity rank, then by the weakest category score.
/// At most three, one per issue.
pub fn prioritize_corrections(result: &AnalysisResult) -> Vec<PrioritizedCorrection> {
    let mut corrections: Vec<PrioritizedCorrection> = result
        .violations
        .iter()
        .map(|v| PrioritizedCorrection {
            issue: v.kind,
            severity: v.severity,
            message: v.message.clone(),
            category_score: result.score(v.kind.category()).unwrap_or(100.0),
        })
        .collect();

    corrections.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then(a.category_score.total_cmp(&b.category_score))
    });

    let mut seen: Vec<ViolationKind> = Vec::with_capacity(MAX_CORRECTIONS);
    corrections.retain(|c| {
        if seen.contains(&c.issue) {
            false
        } else {
            seen.push(c.issue);
            true
        }
    });
    corrections.truncate(MAX_CORRECTIONS);
    corrections
}

/// One indicator per body region, carrying the most urgent violation there
pub fn visual_indicators(result: &AnalysisResult) -> Vec<VisualIndicator> {
    let mut regions: BTreeMap<BodyRegion, (Severity, ViolationKind)> = BTreeMap::new();
    for violation in &result.violations {
        for &region in violation.kind.body_regions() {
            regions
                .entry(region)
                .and_modify(|current| {
                    if violation.severity.rank() < current.0.rank() {
                        *current = (violation.severity, violation.kind);
                    }
                })
                .or_insert((violation.severity, violation.kind));
        }
    }

    let mut indicators: Vec<VisualIndicator> = regions
        .into_iter()
        .map(|(region, (urgency, issue))| VisualIndicator { region, urgency, issue })
        .collect();
    indicators.sort_by_key(|i| (i.urgency.rank(), i.region));
    indicators
}

fn next_rep_focus(result: &AnalysisResult, corrections: &[PrioritizedCorrection]) -> String {
    if let Some(top) = corrections.first() {
        return format!("Next rep: {}", top.issue.cue().to_lowercase());
    }
    match result.phase {
        Phase::Establishing | Phase::Maintaining | Phase::Endurance => "Keep breathing and hold the line".to_string(),
        _ if result.overall_score >= 90.0 => "Next rep: repeat that exact movement".to_string(),
        _ => format!("Next rep: slow, controlled {}", result.exercise.display_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExerciseKind;

    fn scored(exercise: ExerciseKind, score: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new(exercise, 0.0);
        for category in exercise.score_categories() {
            result.set_score(category, score);
        }
        result.finalize();
        result
    }

    #[test]
    fn test_high_severity_uses_warning_pool() {
        let mut result = scored(ExerciseKind::Deadlift, 95.0);
        result.add_violation(ViolationKind::BarDrift, Severity::High, "Bar is drifting forward", 0.2);

        let coaching = FeedbackGenerator::new(Some(1)).generate(&result);
        assert!(coaching.instant_feedback.ends_with("Bar is drifting forward"));
        assert!(WARNING_TEMPLATES
            .iter()
            .any(|t| coaching.instant_feedback == t.replace("{issue}", "Bar is drifting forward")));
        assert_eq!(coaching.voice_cue, ViolationKind::BarDrift.cue());
    }

    #[test]
    fn test_perfect_pool_above_90() {
        let result = scored(ExerciseKind::Squat, 92.0);
        let coaching = FeedbackGenerator::new(Some(5)).generate(&result);
        assert!(PERFECT_TEMPLATES
            .iter()
            .any(|t| coaching.instant_feedback == t.replace("{exercise}", "squat")));
        assert!(MOTIVATION_EXCELLENT.contains(&coaching.motivation.as_str()));
        assert!(coaching.corrections.is_empty());
    }

    #[test]
    fn test_good_pool_mentions_top_cue() {
        let mut result = scored(ExerciseKind::Squat, 80.0);
        result.add_violation(ViolationKind::KneesPastToes, Severity::Low, "Knees forward", 0.06);
        let coaching = FeedbackGenerator::new(Some(9)).generate(&result);
        assert!(coaching.instant_feedback.contains(ViolationKind::KneesPastToes.cue()));
        assert_eq!(coaching.next_rep_focus, "Next rep: sit back into your hips");
    }

    #[test]
    fn test_corrections_sorted_and_capped() {
        let mut result = scored(ExerciseKind::Squat, 80.0);
        result.set_score("symmetry", 40.0);
        result.set_score("knee_position", 20.0);
        result.add_violation(ViolationKind::Asymmetry, Severity::Low, "a", 1.0);
        result.add_violation(ViolationKind::KneesPastToes, Severity::Low, "b", 1.0);
        result.add_violation(ViolationKind::ButtWink, Severity::Medium, "c", 1.0);
        result.add_violation(ViolationKind::SpineFlexion, Severity::High, "d", 1.0);

        let corrections = prioritize_corrections(&result);
        let order: Vec<ViolationKind> = corrections.iter().map(|c| c.issue).collect();
        assert_eq!(
            order,
            vec![ViolationKind::SpineFlexion, ViolationKind::ButtWink, ViolationKind::KneesPastToes]
        );
        assert_eq!(corrections[2].category_score, 20.0);
    }

    #[test]
    fn test_indicators_keep_most_urgent_per_region() {
        let mut result = scored(ExerciseKind::Squat, 60.0);
        result.add_violation(ViolationKind::Asymmetry, Severity::Low, "a", 1.0);
        result.add_violation(ViolationKind::ButtWink, Severity::High, "b", 1.0);

        let indicators = visual_indicators(&result);
        let hips = indicators.iter().find(|i| i.region == BodyRegion::Hips).unwrap();
        assert_eq!(hips.urgency, Severity::High);
        assert_eq!(hips.issue, ViolationKind::ButtWink);
        assert_eq!(indicators.iter().filter(|i| i.region == BodyRegion::Hips).count(), 1);
        assert_eq!(indicators[0].urgency, Severity::High);
    }

    #[test]
    fn test_generation_does_not_touch_result() {
        let mut result = scored(ExerciseKind::BenchPress, 72.0);
        result.add_violation(ViolationKind::ElbowFlare, Severity::Medium, "Tuck", 5.0);
        let before = result.clone();
        FeedbackGenerator::new(None).generate(&result);
        assert_eq!(result, before);
    }

    #[test]
    fn test_same_seed_same_phrases() {
        let result = scored(ExerciseKind::Plank, 97.0);
        let a = FeedbackGenerator::new(Some(42)).generate(&result);
        let b = FeedbackGenerator::new(Some(42)).generate(&result);
        assert_eq!(a, b);
    }
}
