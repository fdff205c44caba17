use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::EngineConfig;
use crate::models::{HistoricalPoint, VelocityPoint};
use crate::stats;

/// Week-over-week percentage change of the weekly composite average.
///
/// Weeks start on Monday and are labelled like "Mar 02". Undated points are
/// skipped. A zero previous week divides by one.
pub fn weekly_velocity(history: &[HistoricalPoint], config: &EngineConfig) -> Vec<VelocityPoint> {
    let thresholds = &config.thresholds;

    let mut weeks: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for point in history {
        let Some(date) = point.date else { continue };
        weeks
            .entry(week_start(date))
            .or_default()
            .push(point.ratings.composite());
    }

    let averages: Vec<(NaiveDate, f64)> = weeks
        .into_iter()
        .map(|(start, values)| (start, stats::mean(&values)))
        .collect();

    let points: Vec<VelocityPoint> = averages
        .windows(2)
        .map(|pair| {
            let (_, previous) = pair[0];
            let (start, current) = pair[1];
            let base = if previous != 0.0 { previous } else { 1.0 };
            VelocityPoint {
                week: start.format("%b %d").to_string(),
                velocity: stats::round1((current - previous) / base * 100.0),
                benchmark: thresholds.velocity_benchmark,
            }
        })
        .collect();

    let skip = points.len().saturating_sub(thresholds.velocity_weeks);
    points.into_iter().skip(skip).collect()
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ratings;

    fn point(date: NaiveDate, value: i32) -> HistoricalPoint {
        HistoricalPoint {
            date: Some(date),
            ratings: Ratings::uniform(value),
        }
    }

    #[test]
    fn change_is_measured_between_calendar_weeks() {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let history = vec![
            point(monday, 2),
            point(monday + Duration::days(3), 4),
            point(monday + Duration::days(7), 4),
            HistoricalPoint { date: None, ratings: Ratings::uniform(1) },
            point(monday + Duration::days(15), 2),
        ];
        let series = weekly_velocity(&history, &EngineConfig::default());
        assert_eq!(
            series,
            vec![
                VelocityPoint { week: "Mar 09".to_string(), velocity: 33.3, benchmark: 5.0 },
                VelocityPoint { week: "Mar 16".to_string(), velocity: -50.0, benchmark: 5.0 },
            ]
        );
    }

    #[test]
    fn keeps_at_most_eight_weeks() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let history: Vec<HistoricalPoint> = (0..12)
            .map(|week| point(start + Duration::weeks(week), 1 + (week % 5) as i32))
            .collect();
        let series = weekly_velocity(&history, &EngineConfig::default());
        assert_eq!(series.len(), 8);
        assert!(series.iter().all(|p| p.benchmark == 5.0));
        assert_eq!(series.last().unwrap().week, "Mar 23");
    }

    #[test]
    fn zero_week_does_not_divide_by_zero() {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let history = vec![
            HistoricalPoint { date: Some(monday), ratings: Ratings::default() },
            point(monday + Duration::days(7), 3),
        ];
        let series = weekly_velocity(&history, &EngineConfig::default());
        assert_eq!(series[0].velocity, 300.0);
    }

    #[test]
    fn single_week_has_no_velocity() {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(weekly_velocity(&[point(monday, 3)], &EngineConfig::default()).is_empty());
    }
}
