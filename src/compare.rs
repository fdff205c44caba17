//! Peer-cohort, previous-period and goal comparisons.

use chrono::{DateTime, Duration, Utc};

use crate::config::EngineConfig;
use crate::models::{
    Comparisons, GoalComparison, HistoricalPoint, PeerAggregate, PeerComparison,
    PreviousComparison,
};
use crate::stats;

pub fn compare(
    score: f64,
    peers: &[PeerAggregate],
    history: &[HistoricalPoint],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Comparisons {
    let improvement = period_improvement(history);
    Comparisons {
        to_peers: to_peers(score, peers),
        to_previous: to_previous(history, improvement),
        to_goals: to_goals(score, improvement, config, now),
    }
}

/// Rank is one more than the number of peers strictly above `score`.
/// An empty cohort ranks first of zero at the 0th percentile.
pub fn to_peers(score: f64, peers: &[PeerAggregate]) -> PeerComparison {
    let mut scores: Vec<f64> = peers.iter().map(PeerAggregate::composite_score).collect();
    scores.sort_by(|a, b| b.total_cmp(a));

    let total = scores.len();
    let ranking = scores.iter().filter(|s| **s > score).count() + 1;
    if total == 0 {
        return PeerComparison {
            percentile: 0.0,
            ranking,
            total_peers: 0,
            above_average: false,
        };
    }

    PeerComparison {
        percentile: ((total + 1).saturating_sub(ranking) as f64 / total as f64 * 100.0).round(),
        ranking,
        total_peers: total,
        above_average: score > stats::mean(&scores),
    }
}

fn halves(history: &[HistoricalPoint]) -> (Vec<f64>, Vec<f64>) {
    let composites: Vec<f64> = history.iter().map(|p| p.ratings.composite()).collect();
    let (older, recent) = composites.split_at(composites.len() / 2);
    (older.to_vec(), recent.to_vec())
}

/// Percentage change between the older and recent halves of the history.
fn period_improvement(history: &[HistoricalPoint]) -> f64 {
    let (older, recent) = halves(history);
    let old_avg = stats::mean(&older);
    let base = if old_avg != 0.0 { old_avg } else { 1.0 };
    (stats::mean(&recent) - old_avg) / base * 100.0
}

fn to_previous(history: &[HistoricalPoint], improvement: f64) -> PreviousComparison {
    let (older, recent) = halves(history);
    let (consistency_change, momentum_change) = if older.is_empty() {
        (0.0, 0.0)
    } else {
        (
            stats::consistency(&recent) - stats::consistency(&older),
            stats::momentum(&recent) - stats::momentum(&older),
        )
    };
    PreviousComparison {
        improvement: stats::round1(improvement),
        consistency_change: stats::round1(consistency_change),
        momentum_change: stats::round1(momentum_change),
    }
}

/// `now` plus `weeks` rounded up and clamped at zero. `None` if the date
/// would overflow.
pub fn after_weeks(now: DateTime<Utc>, weeks: f64) -> Option<DateTime<Utc>> {
    let weeks = weeks.ceil().max(0.0) as i64;
    Duration::try_weeks(weeks).and_then(|offset| now.checked_add_signed(offset))
}

fn to_goals(score: f64, improvement: f64, config: &EngineConfig, now: DateTime<Utc>) -> GoalComparison {
    let thresholds = &config.thresholds;
    let target = thresholds.goal_target;
    let progress = if target > 0.0 { score / target * 100.0 } else { 100.0 };
    let weekly_rate = improvement / 4.0;

    let estimated_completion = if weekly_rate > 0.0 {
        after_weeks(now, (target - score) / weekly_rate)
    } else {
        None
    };

    GoalComparison {
        target,
        on_track: progress >= thresholds.on_track_progress,
        progress_percentage: progress.round(),
        estimated_completion,
    }
}
