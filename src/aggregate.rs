//! Weighted overall score, weekly history and trajectory projection.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::config::EngineConfig;
use crate::growth::ScoredTrack;
use crate::models::{HistoricalPoint, HistoryPoint, Level, OverallGrowth, ScoreComponent, Trajectory};
use crate::stats::{self, SCALE};

pub fn overall(tracks: &[ScoredTrack], history: &[HistoricalPoint], config: &EngineConfig) -> OverallGrowth {
    let score: f64 = tracks.iter().map(|t| t.growth.current_level * t.weight).sum();
    let trend: f64 = tracks.iter().map(|t| t.growth.growth_rate * t.weight).sum();
    let level = classify_level(score);

    OverallGrowth {
        score: score.round(),
        trend: stats::round1(trend),
        level,
        percentile: estimated_percentile(score),
        description: describe(trend, level),
        history: weekly_history(history, config.thresholds.history_weeks),
        components: tracks
            .iter()
            .map(|t| ScoreComponent {
                name: t.name.to_string(),
                value: t.growth.current_level,
                weight: t.weight,
                contribution: stats::round1(t.growth.current_level * t.weight),
            })
            .collect(),
    }
}

pub fn classify_level(score: f64) -> Level {
    if score < 25.0 {
        Level::Beginner
    } else if score < 50.0 {
        Level::Intermediate
    } else if score < 75.0 {
        Level::Advanced
    } else {
        Level::Expert
    }
}

/// Score-derived estimate only; the cohort percentile lives in the peer comparison.
pub fn estimated_percentile(score: f64) -> u32 {
    (score * 0.9 + 10.0).round().clamp(1.0, 99.0) as u32
}

fn describe(trend: f64, level: Level) -> String {
    let level = level.as_str();
    if trend > 10.0 {
        format!("Exceptional growth! Currently at {level} level with rapid improvement across all skills.")
    } else if trend > 5.0 {
        format!("Strong progress at {level} level. Consistent improvement showing great potential.")
    } else if trend > 0.0 {
        format!("Steady development at {level} level. Building solid foundations for future growth.")
    } else {
        format!("Maintaining {level} level. Focus on consistent practice to accelerate growth.")
    }
}

/// Composite average per ISO week, most recent `limit` weeks, oldest first.
pub fn weekly_history(history: &[HistoricalPoint], limit: usize) -> Vec<HistoryPoint> {
    let mut weeks: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
    for point in history {
        let Some(date) = point.date else { continue };
        let week = date.iso_week();
        weeks
            .entry((week.year(), week.week()))
            .or_default()
            .push(point.ratings.composite());
    }

    let skip = weeks.len().saturating_sub(limit);
    weeks
        .into_iter()
        .skip(skip)
        .map(|((year, week), values)| HistoryPoint {
            date: format!("{year}-W{week:02}"),
            score: (stats::mean(&values) * SCALE).round(),
        })
        .collect()
}

pub fn trajectory(tracks: &[ScoredTrack]) -> Trajectory {
    let levels: Vec<f64> = tracks.iter().map(|t| t.growth.current_level).collect();
    let rates: Vec<f64> = tracks.iter().map(|t| t.growth.growth_rate).collect();
    let consistencies: Vec<f64> = tracks.iter().map(|t| t.growth.consistency).collect();

    let current = stats::mean(&levels);
    let monthly_growth = stats::mean(&rates) / 4.0;
    let projected_3 = (current + monthly_growth * 3.0).min(100.0);
    let projected_6 = (current + monthly_growth * 6.0).min(100.0);
    let spread = (100.0 - stats::mean(&consistencies)) / 2.0;

    Trajectory {
        projected_3_months: projected_3.round(),
        projected_6_months: projected_6.round(),
        confidence_interval: ((projected_3 - spread).round(), (projected_3 + spread).round()),
    }
}
