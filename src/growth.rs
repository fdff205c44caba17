use std::collections::HashSet;

use chrono::NaiveDate;

use crate::config::{EngineConfig, Thresholds};
use crate::models::{NextMilestone, RubricFeedback, SkillGrowth};
use crate::stats::{self, SCALE};
use crate::tracks::Track;

/// With no older window the previous level is assumed 10% lower.
const ASSUMED_PRIOR_RATIO: f64 = 0.9;
/// Weeks over which `required_growth_rate` spreads the remaining gap.
const MILESTONE_HORIZON_WEEKS: f64 = 12.0;

/// A track after scoring, carrying what milestone dating still needs.
#[derive(Debug, Clone)]
pub struct ScoredTrack {
    pub name: &'static str,
    pub weight: f64,
    pub growth: SkillGrowth,
    /// Unrounded; `growth.growth_rate` is rounded for display.
    pub raw_growth_rate: f64,
    pub timeline: Vec<(Option<NaiveDate>, f64)>,
}

pub fn score_track(track: &Track, feedback: &[RubricFeedback], config: &EngineConfig) -> ScoredTrack {
    let thresholds = &config.thresholds;
    let series = &track.recent_first;
    let window = thresholds.window_size;

    let recent = &series[..window.min(series.len())];
    let older = &series[recent.len()..(window * 2).min(series.len())];

    let current = stats::mean(recent);
    let previous = if older.is_empty() {
        current * ASSUMED_PRIOR_RATIO
    } else {
        stats::mean(older)
    };
    let growth = stats::growth_rate(current, previous);

    let chronological: Vec<f64> = series.iter().rev().copied().collect();
    let current_level = (current * SCALE).round();
    let growth_rate = stats::round1(growth);
    let (strengths, focus_areas) = extract_insights(feedback, &track.keywords, thresholds);

    ScoredTrack {
        name: track.name,
        weight: track.weight,
        growth: SkillGrowth {
            current_level,
            previous_level: (previous * SCALE).round(),
            growth_rate,
            consistency: stats::consistency(recent).round(),
            momentum: stats::round1(stats::momentum(&chronological)),
            trend: stats::classify_trend(growth, thresholds.trend_band),
            next_milestone: next_milestone(current_level, growth, config),
            strengths,
            focus_areas,
        },
        raw_growth_rate: growth,
        timeline: track.timeline.clone(),
    }
}

/// Next ladder rung above `current_level`, with weeks to reach it at a
/// quarter of `growth_rate` per week.
pub fn next_milestone(current_level: f64, growth_rate: f64, config: &EngineConfig) -> NextMilestone {
    let thresholds = &config.thresholds;
    let top = config.milestones.iter().map(|m| m.level).max().unwrap_or(100);
    let level = config
        .milestones
        .iter()
        .map(|m| m.level)
        .filter(|level| f64::from(*level) > current_level)
        .min()
        .unwrap_or(top);

    let required = f64::from(level) - current_level;
    let estimated_weeks = if growth_rate > 0.0 {
        let weeks = (required / (growth_rate / 4.0)).ceil().max(0.0) as u32;
        weeks.min(thresholds.max_milestone_weeks)
    } else {
        thresholds.unreachable_weeks
    };

    NextMilestone {
        level,
        estimated_weeks,
        required_growth_rate: stats::round1(required / MILESTONE_HORIZON_WEEKS),
    }
}

/// Keyword-matched sentences from the strengths and improvements text,
/// deduplicated and capped per list.
pub fn extract_insights(
    feedback: &[RubricFeedback],
    keywords: &[String],
    thresholds: &Thresholds,
) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut focus_areas = Vec::new();

    for record in feedback {
        if let Some(text) = &record.strengths {
            strengths.extend(mentions(text, keywords, thresholds.insight_max_chars));
        }
        if let Some(text) = &record.improvements {
            focus_areas.extend(mentions(text, keywords, thresholds.insight_max_chars));
        }
    }

    (
        unique(strengths, thresholds.insight_limit),
        unique(focus_areas, thresholds.insight_limit),
    )
}

/// First sentence mentioning each keyword, case-insensitively.
pub fn mentions(text: &str, keywords: &[String], max_chars: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .filter_map(|keyword| {
            let keyword = keyword.to_lowercase();
            if !lower.contains(&keyword) {
                return None;
            }
            text.split(['.', '!', '?'])
                .find(|sentence| sentence.to_lowercase().contains(&keyword))
                .map(|sentence| sentence.trim().chars().take(max_chars).collect())
        })
        .collect()
}

fn unique(items: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .take(limit)
        .collect()
}
