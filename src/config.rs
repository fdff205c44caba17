//! Fixed weight, threshold and keyword tables owned by the calculators.
//!
//! `EngineConfig::default()` carries the production constants. A JSON file
//! may override any subset of them; unnamed fields keep their defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GrowthError, Result};
use crate::models::{AttendanceMetric, Dimension, Skill};

const WEIGHT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneDefinition {
    pub level: u32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingRule {
    /// Actions fire when the weakest track scores below this.
    pub threshold: f64,
    pub action: String,
    pub timeline: String,
    pub target_gain: f64,
}

/// Keyword scoring for a dimension when only written feedback exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackKeywords {
    /// Matched in the strengths text, two points each.
    pub positive: Vec<String>,
    /// Matched in the improvements text, one point each.
    pub negative: Vec<String>,
    /// Attendance metric blended into the keyword score.
    pub metric: AttendanceMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Entries per recent/older comparison window.
    pub window_size: usize,
    /// Growth rate (%) beyond which a track is improving or declining.
    pub trend_band: f64,
    pub consistent_above: f64,
    pub variable_below: f64,
    pub momentum_band: f64,
    pub goal_target: f64,
    pub on_track_progress: f64,
    pub velocity_benchmark: f64,
    pub velocity_weeks: usize,
    pub history_weeks: usize,
    pub milestone_limit: usize,
    pub max_milestone_weeks: u32,
    pub unreachable_weeks: u32,
    pub insight_limit: usize,
    pub insight_max_chars: usize,
    /// Share of a keyword-scored dimension taken from feedback; the rest
    /// comes from attendance.
    pub feedback_blend: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            window_size: 5,
            trend_band: 5.0,
            consistent_above: 80.0,
            variable_below: 40.0,
            momentum_band: 0.5,
            goal_target: 85.0,
            on_track_progress: 70.0,
            velocity_benchmark: 5.0,
            velocity_weeks: 8,
            history_weeks: 12,
            milestone_limit: 5,
            max_milestone_weeks: 52,
            unreachable_weeks: 999,
            insight_limit: 3,
            insight_max_chars: 100,
            feedback_blend: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub skill_weights: BTreeMap<Skill, f64>,
    pub skill_metrics: BTreeMap<Skill, AttendanceMetric>,
    pub skill_keywords: BTreeMap<Skill, Vec<String>>,
    pub dimension_weights: BTreeMap<Dimension, f64>,
    /// Attendance metric used for a dimension when no rubric feedback exists.
    pub dimension_fallback_metrics: BTreeMap<Dimension, AttendanceMetric>,
    pub dimension_keywords: BTreeMap<Dimension, Vec<String>>,
    /// Primary students without rubric feedback are scored from these.
    pub primary_feedback: BTreeMap<Dimension, FeedbackKeywords>,
    pub milestones: Vec<MilestoneDefinition>,
    pub coaching: BTreeMap<String, CoachingRule>,
    pub thresholds: Thresholds,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn rule(threshold: f64, action: &str, timeline: &str, target_gain: f64) -> CoachingRule {
    CoachingRule {
        threshold,
        action: action.to_string(),
        timeline: timeline.to_string(),
        target_gain,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        use AttendanceMetric::*;

        let skill_weights = BTreeMap::from([
            (Skill::Speaking, 0.25),
            (Skill::Argumentation, 0.20),
            (Skill::CriticalThinking, 0.20),
            (Skill::Research, 0.15),
            (Skill::Writing, 0.10),
            (Skill::Confidence, 0.10),
        ]);

        let skill_metrics = BTreeMap::from([
            (Skill::Speaking, ApplicationSkills),
            (Skill::Argumentation, AskingQuestions),
            (Skill::CriticalThinking, ApplicationFeedback),
            (Skill::Research, ApplicationSkills),
            (Skill::Writing, ApplicationFeedback),
            (Skill::Confidence, AttitudeEfforts),
        ]);

        let skill_keywords = BTreeMap::from([
            (
                Skill::Speaking,
                words(&["voice", "clarity", "volume", "pace", "articulation", "presentation"]),
            ),
            (
                Skill::Argumentation,
                words(&["argument", "evidence", "reasoning", "logic", "rebuttal", "counter"]),
            ),
            (
                Skill::CriticalThinking,
                words(&["analysis", "evaluation", "synthesis", "problem-solving", "critical"]),
            ),
            (
                Skill::Research,
                words(&["research", "sources", "data", "investigation", "evidence", "facts"]),
            ),
            (
                Skill::Writing,
                words(&["writing", "grammar", "structure", "vocabulary", "composition", "essay"]),
            ),
            (
                Skill::Confidence,
                words(&["confidence", "engagement", "participation", "initiative", "leadership"]),
            ),
        ]);

        let dimension_weights = BTreeMap::from([
            (Dimension::Content, 0.4),
            (Dimension::Style, 0.3),
            (Dimension::Strategy, 0.3),
        ]);

        let dimension_fallback_metrics = BTreeMap::from([
            (Dimension::Content, ApplicationFeedback),
            (Dimension::Style, ApplicationSkills),
            (Dimension::Strategy, AskingQuestions),
        ]);

        let dimension_keywords = BTreeMap::from([
            (
                Dimension::Content,
                words(&["argument", "evidence", "example", "theory", "logic", "reasoning"]),
            ),
            (
                Dimension::Style,
                words(&["voice", "eye contact", "confident", "persuasive", "timing", "delivery"]),
            ),
            (
                Dimension::Strategy,
                words(&["rebuttal", "poi", "team", "strategy", "signposting", "structure"]),
            ),
        ]);

        let primary_feedback = BTreeMap::from([
            (
                Dimension::Content,
                FeedbackKeywords {
                    positive: words(&["strong argument", "good examples", "evidence", "logical", "persuasive"]),
                    negative: words(&["weak argument", "no examples", "illogical", "unclear", "unconvincing"]),
                    metric: AskingQuestions,
                },
            ),
            (
                Dimension::Style,
                FeedbackKeywords {
                    positive: words(&["confident", "good eye contact", "clear voice", "good gestures", "engaging"]),
                    negative: words(&["nervous", "quiet", "looking down", "monotone", "stiff"]),
                    metric: AttitudeEfforts,
                },
            ),
            (
                Dimension::Strategy,
                FeedbackKeywords {
                    positive: words(&["good hook", "clear structure", "signposting", "well-organized", "good timing"]),
                    negative: words(&["no hook", "unclear structure", "disorganized", "rushed", "too short"]),
                    metric: ApplicationSkills,
                },
            ),
        ]);

        let milestones = [
            (25, "Foundation Builder", "Established basic skills across all areas"),
            (50, "Skill Developer", "Reached intermediate proficiency"),
            (75, "Advanced Practitioner", "Demonstrated advanced capabilities"),
            (90, "Excellence Achiever", "Approaching mastery level"),
            (100, "Master Debater", "Achieved exceptional proficiency"),
        ]
        .into_iter()
        .map(|(level, title, description)| MilestoneDefinition {
            level,
            title: title.to_string(),
            description: description.to_string(),
        })
        .collect();

        let coaching = BTreeMap::from([
            (
                "content".to_string(),
                rule(60.0, "Focus on argument depth and evidence quality", "2 weeks intensive practice", 15.0),
            ),
            (
                "style".to_string(),
                rule(60.0, "Work on delivery, timing, and persuasive impact", "2 weeks focused practice", 15.0),
            ),
            (
                "strategy".to_string(),
                rule(50.0, "Enhance POI engagement and team coordination", "3 weeks of team practice", 20.0),
            ),
            (
                "speaking".to_string(),
                rule(60.0, "Practise timed speeches with attention to pace and clarity", "2 weeks focused practice", 15.0),
            ),
            (
                "argumentation".to_string(),
                rule(60.0, "Build arguments with explicit evidence and counter-arguments", "2 weeks intensive practice", 15.0),
            ),
            (
                "critical_thinking".to_string(),
                rule(60.0, "Analyse motions from both sides before each session", "3 weeks of guided analysis", 15.0),
            ),
            (
                "research".to_string(),
                rule(60.0, "Prepare a sourced fact sheet for each motion", "3 weeks of preparation drills", 15.0),
            ),
            (
                "writing".to_string(),
                rule(60.0, "Draft and revise speech outlines in writing", "2 weeks focused practice", 15.0),
            ),
            (
                "confidence".to_string(),
                rule(60.0, "Volunteer for an opening speech each session", "2 weeks focused practice", 15.0),
            ),
        ]);

        EngineConfig {
            skill_weights,
            skill_metrics,
            skill_keywords,
            dimension_weights,
            dimension_fallback_metrics,
            dimension_keywords,
            primary_feedback,
            milestones,
            coaching,
            thresholds: Thresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_weights("skill", self.skill_weights.values())?;
        check_weights("dimension", self.dimension_weights.values())?;

        if let Some(skill) = Skill::ALL
            .iter()
            .find(|skill| !self.skill_metrics.contains_key(skill))
        {
            return Err(GrowthError::Config(format!(
                "no attendance metric mapped for skill {}",
                skill.as_str()
            )));
        }

        if !(0.0..=1.0).contains(&self.thresholds.feedback_blend) {
            return Err(GrowthError::Config(
                "feedback_blend must be between 0 and 1".to_string(),
            ));
        }

        if self.thresholds.window_size == 0 {
            return Err(GrowthError::Config("window_size must be positive".to_string()));
        }

        Ok(())
    }

    pub fn skill_weight(&self, skill: Skill) -> f64 {
        self.skill_weights.get(&skill).copied().unwrap_or(0.0)
    }

    pub fn dimension_weight(&self, dimension: Dimension) -> f64 {
        self.dimension_weights.get(&dimension).copied().unwrap_or(0.0)
    }
}

fn check_weights<'a>(kind: &str, weights: impl Iterator<Item = &'a f64>) -> Result<()> {
    let total: f64 = weights.sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(GrowthError::Config(format!(
            "{kind} weights must sum to 1.0, got {total}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_tables_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.skill_weight(Skill::Speaking), 0.25);
        assert_eq!(config.dimension_weight(Dimension::Content), 0.4);
        let ladder: Vec<u32> = config.milestones.iter().map(|m| m.level).collect();
        assert_eq!(ladder, vec![25, 50, 75, 90, 100]);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"thresholds": {{"goal_target": 90.0}}}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.thresholds.goal_target, 90.0);
        assert_eq!(config.thresholds.window_size, 5);
        assert_eq!(config.skill_weights, EngineConfig::default().skill_weights);
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dimension_weights": {{"content": 0.5, "style": 0.5, "strategy": 0.5}}}}"#
        )
        .unwrap();

        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, GrowthError::Config(_)));
    }
}
