use crate::config::EngineConfig;
use crate::models::{AttendanceRecord, GrowthPattern, HistoricalPoint, PatternKind};
use crate::stats;

fn pattern(kind: PatternKind) -> GrowthPattern {
    let (description, recommendation) = match kind {
        PatternKind::Consistent => (
            "Showing remarkable consistency in performance",
            "Challenge yourself with advanced exercises to break through to the next level",
        ),
        PatternKind::Variable => (
            "Performance varies significantly between sessions",
            "Focus on establishing consistent practice routines",
        ),
        PatternKind::Accelerating => (
            "Growth rate is increasing - excellent momentum!",
            "Maintain current practices and consider additional challenges",
        ),
        PatternKind::Plateau => (
            "Growth has slowed recently",
            "Try new learning approaches or seek additional feedback",
        ),
    };
    GrowthPattern {
        kind,
        description: description.to_string(),
        recommendation: recommendation.to_string(),
    }
}

/// Consistency of the latest composites and momentum of the full history
/// are checked independently, so zero to two patterns come back. Without
/// attendance in the window the consistency check is skipped.
pub fn detect(
    attendance: &[AttendanceRecord],
    history: &[HistoricalPoint],
    config: &EngineConfig,
) -> Vec<GrowthPattern> {
    let thresholds = &config.thresholds;
    let mut patterns = Vec::new();

    let recent: Vec<f64> = attendance
        .iter()
        .take(thresholds.window_size)
        .map(|a| a.ratings.composite())
        .collect();
    if !recent.is_empty() {
        let consistency = stats::consistency(&recent);
        if consistency > thresholds.consistent_above {
            patterns.push(pattern(PatternKind::Consistent));
        } else if consistency < thresholds.variable_below {
            patterns.push(pattern(PatternKind::Variable));
        }
    }

    let series: Vec<f64> = history.iter().map(|p| p.ratings.composite()).collect();
    let momentum = stats::momentum(&series);
    if momentum > thresholds.momentum_band {
        patterns.push(pattern(PatternKind::Accelerating));
    } else if momentum < -thresholds.momentum_band {
        patterns.push(pattern(PatternKind::Plateau));
    }

    patterns
}
