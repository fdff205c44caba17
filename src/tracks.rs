//! Turns fetched rows into per-skill or per-dimension score series.
//!
//! Both scoring paths produce the same `Track` shape, so every downstream
//! calculator is shared.

use chrono::NaiveDate;

use crate::config::{EngineConfig, FeedbackKeywords};
use crate::models::{
    AttendanceMetric, AttendanceRecord, Dimension, DimensionBreakdown, HistoricalPoint,
    RubricFeedback, Skill, StudentLevel,
};
use crate::rubric::{self, RubricScores};
use crate::stats::{self, SCALE};

/// Keyword score for feedback that matches nothing either way.
const UNMATCHED_SCORE: f64 = 50.0;
/// Attendance score when no session carries the blended metric.
const NO_ATTENDANCE_SCORE: f64 = 50.0;
const POSITIVE_POINTS: f64 = 2.0;
const NEGATIVE_POINTS: f64 = 1.0;

/// Where dimension scores come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSource {
    Rubric,
    /// Keyword hits in written feedback blended with attendance.
    Keywords,
    Attendance,
}

/// A scored series on the raw 1-5 scale.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: &'static str,
    pub weight: f64,
    /// Most recent first; feeds the recent/older comparison windows.
    pub recent_first: Vec<f64>,
    /// Chronological; used to date milestone achievements.
    pub timeline: Vec<(Option<NaiveDate>, f64)>,
    pub keywords: Vec<String>,
}

fn attendance_track(
    name: &'static str,
    weight: f64,
    metric: AttendanceMetric,
    keywords: Vec<String>,
    attendance: &[AttendanceRecord],
    history: &[HistoricalPoint],
) -> Track {
    Track {
        name,
        weight,
        recent_first: attendance.iter().map(|a| a.ratings.get(metric)).collect(),
        timeline: history
            .iter()
            .map(|p| (p.date, p.ratings.get(metric)))
            .collect(),
        keywords,
    }
}

pub fn skill_tracks(
    config: &EngineConfig,
    attendance: &[AttendanceRecord],
    history: &[HistoricalPoint],
) -> Vec<(Skill, Track)> {
    Skill::ALL
        .iter()
        .map(|&skill| {
            let metric = config
                .skill_metrics
                .get(&skill)
                .copied()
                .unwrap_or(AttendanceMetric::ApplicationSkills);
            let keywords = config.skill_keywords.get(&skill).cloned().unwrap_or_default();
            let track = attendance_track(
                skill.as_str(),
                config.skill_weight(skill),
                metric,
                keywords,
                attendance,
                history,
            );
            (skill, track)
        })
        .collect()
}

/// Feedback rows carrying rubric entries, most recent first.
fn rated_feedback(feedback: &[RubricFeedback]) -> Vec<(NaiveDate, RubricScores)> {
    let mut rated: Vec<(NaiveDate, RubricScores)> = feedback
        .iter()
        .filter_map(|f| Some((f.date(), rubric::decode(f.rubric_scores.as_ref()?)?)))
        .collect();
    rated.sort_by(|a, b| b.0.cmp(&a.0));
    rated
}

pub fn has_rubric_feedback(feedback: &[RubricFeedback]) -> bool {
    !rated_feedback(feedback).is_empty()
}

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

/// Feedback rows with strengths or improvements text, most recent first.
fn written_feedback(feedback: &[RubricFeedback]) -> Vec<&RubricFeedback> {
    let mut written: Vec<&RubricFeedback> = feedback
        .iter()
        .filter(|f| has_text(f.strengths.as_deref()) || has_text(f.improvements.as_deref()))
        .collect();
    written.sort_by(|a, b| b.date().cmp(&a.date()));
    written
}

/// Rubrics win whenever present. Primary students without them are scored
/// from written feedback; everyone else falls back to attendance.
pub fn dimension_source(level: StudentLevel, feedback: &[RubricFeedback]) -> DimensionSource {
    if has_rubric_feedback(feedback) {
        DimensionSource::Rubric
    } else if level == StudentLevel::Primary && !written_feedback(feedback).is_empty() {
        DimensionSource::Keywords
    } else {
        DimensionSource::Attendance
    }
}

/// Keyword hits in one feedback row on a 0-100 scale, with the matched
/// positive and negative keywords.
pub fn keyword_score(record: &RubricFeedback, keywords: &FeedbackKeywords) -> (f64, Vec<String>, Vec<String>) {
    let strengths = record.strengths.as_deref().unwrap_or_default().to_lowercase();
    let improvements = record.improvements.as_deref().unwrap_or_default().to_lowercase();

    let positive: Vec<String> = keywords
        .positive
        .iter()
        .filter(|k| strengths.contains(&k.to_lowercase()))
        .cloned()
        .collect();
    let negative: Vec<String> = keywords
        .negative
        .iter()
        .filter(|k| improvements.contains(&k.to_lowercase()))
        .cloned()
        .collect();

    let gained = positive.len() as f64 * POSITIVE_POINTS;
    let total = gained + negative.len() as f64 * NEGATIVE_POINTS;
    let score = if total > 0.0 {
        gained / total * 100.0
    } else {
        UNMATCHED_SCORE
    };
    (score, positive, negative)
}

/// Mean of the present ratings for `metric` on a 0-100 scale.
fn attendance_score(attendance: &[AttendanceRecord], metric: AttendanceMetric) -> f64 {
    let values: Vec<f64> = attendance
        .iter()
        .filter_map(|a| a.ratings.value(metric))
        .map(f64::from)
        .collect();
    if values.is_empty() {
        NO_ATTENDANCE_SCORE
    } else {
        stats::mean(&values) * SCALE
    }
}

fn push_unique(list: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

fn keyword_track(
    config: &EngineConfig,
    dimension: Dimension,
    weight: f64,
    keywords: Vec<String>,
    written: &[&RubricFeedback],
    attendance: &[AttendanceRecord],
) -> (Track, DimensionBreakdown) {
    let Some(table) = config.primary_feedback.get(&dimension) else {
        let track = Track {
            name: dimension.as_str(),
            weight,
            recent_first: Vec::new(),
            timeline: Vec::new(),
            keywords,
        };
        return (track, DimensionBreakdown::default());
    };

    let blend = config.thresholds.feedback_blend;
    let from_attendance = attendance_score(attendance, table.metric);
    let mut breakdown = DimensionBreakdown::default();
    let mut window_scores = Vec::new();
    let mut scored = Vec::with_capacity(written.len());

    for (index, record) in written.iter().enumerate() {
        let (score, positive, negative) = keyword_score(record, table);
        if index < config.thresholds.window_size {
            window_scores.push(score);
            push_unique(&mut breakdown.strengths, positive);
            push_unique(&mut breakdown.weaknesses, negative);
        }
        let blended = score * blend + from_attendance * (1.0 - blend);
        scored.push((record.date(), blended / SCALE));
    }

    breakdown
        .components
        .insert("Feedback keywords".to_string(), stats::mean(&window_scores).round());
    breakdown
        .components
        .insert("Attendance".to_string(), from_attendance.round());

    let track = Track {
        name: dimension.as_str(),
        weight,
        recent_first: scored.iter().map(|(_, value)| *value).collect(),
        timeline: scored.iter().rev().map(|(date, value)| (Some(*date), *value)).collect(),
        keywords,
    };
    (track, breakdown)
}

/// Dimension series from rubric feedback, keyword-scored written feedback,
/// or each dimension's mapped attendance metric, per `dimension_source`.
pub fn dimension_tracks(
    config: &EngineConfig,
    level: StudentLevel,
    feedback: &[RubricFeedback],
    attendance: &[AttendanceRecord],
    history: &[HistoricalPoint],
) -> Vec<(Dimension, Track, DimensionBreakdown)> {
    let source = dimension_source(level, feedback);
    let written = written_feedback(feedback);
    let rated = rated_feedback(feedback);
    let window: Vec<RubricScores> = rated
        .iter()
        .take(config.thresholds.window_size)
        .map(|(_, scores)| *scores)
        .collect();

    Dimension::ALL
        .iter()
        .map(|&dimension| {
            let weight = config.dimension_weight(dimension);
            let keywords = config
                .dimension_keywords
                .get(&dimension)
                .cloned()
                .unwrap_or_default();

            if source == DimensionSource::Keywords {
                let (track, parts) =
                    keyword_track(config, dimension, weight, keywords, &written, attendance);
                return (dimension, track, parts);
            }

            if source == DimensionSource::Attendance {
                let metric = config
                    .dimension_fallback_metrics
                    .get(&dimension)
                    .copied()
                    .unwrap_or(AttendanceMetric::ApplicationSkills);
                let track = attendance_track(
                    dimension.as_str(),
                    weight,
                    metric,
                    keywords,
                    attendance,
                    history,
                );
                return (dimension, track, DimensionBreakdown::default());
            }

            let scored: Vec<(NaiveDate, f64)> = rated
                .iter()
                .map(|(date, scores)| (*date, rubric::score_dimensions(scores).get(dimension) / SCALE))
                .collect();
            let track = Track {
                name: dimension.as_str(),
                weight,
                recent_first: scored.iter().map(|(_, value)| *value).collect(),
                timeline: scored.iter().rev().map(|(date, value)| (Some(*date), *value)).collect(),
                keywords,
            };
            (dimension, track, rubric::breakdown(dimension, &window))
        })
        .collect()
}
