use chrono::{DateTime, NaiveDate, Utc};

use crate::compare::after_weeks;
use crate::config::EngineConfig;
use crate::growth::ScoredTrack;
use crate::models::{Milestone, Milestones};
use crate::stats::SCALE;

/// Achieved and upcoming ladder rungs across every track.
///
/// An achieved rung with no dated point at or above its threshold is left
/// out entirely. Upcoming rungs are dated at a quarter of the track's growth
/// rate per week.
pub fn identify(tracks: &[ScoredTrack], config: &EngineConfig, now: DateTime<Utc>) -> Milestones {
    let mut achieved = Vec::new();
    let mut upcoming = Vec::new();

    for track in tracks {
        let current = track.growth.current_level;
        for definition in &config.milestones {
            let level = f64::from(definition.level);
            let id = format!("{}-{}", track.name, definition.level);
            let title = format!("{} in {}", definition.title, track.name);

            if current >= level {
                if let Some(date) = first_reached(&track.timeline, level) {
                    achieved.push(Milestone {
                        id,
                        title,
                        description: definition.description.clone(),
                        achieved_date: Some(date),
                        estimated_completion: None,
                        achieved: true,
                        progress: 100.0,
                        skills: vec![track.name.to_string()],
                    });
                }
            } else {
                upcoming.push(Milestone {
                    id,
                    title,
                    description: format!("{}% more to achieve", (level - current).round()),
                    achieved_date: None,
                    estimated_completion: completion(level - current, track.raw_growth_rate, config, now),
                    achieved: false,
                    progress: (current / level * 100.0).round(),
                    skills: vec![track.name.to_string()],
                });
            }
        }
    }

    achieved.sort_by(|a, b| b.achieved_date.cmp(&a.achieved_date));
    upcoming.sort_by(|a, b| b.progress.total_cmp(&a.progress));
    achieved.truncate(config.thresholds.milestone_limit);
    upcoming.truncate(config.thresholds.milestone_limit);

    Milestones { achieved, upcoming }
}

/// No date without positive growth or past the milestone horizon.
fn completion(gap: f64, growth_rate: f64, config: &EngineConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if growth_rate <= 0.0 {
        return None;
    }
    let weeks = (gap / (growth_rate / 4.0)).ceil();
    if weeks >= f64::from(config.thresholds.max_milestone_weeks) {
        return None;
    }
    after_weeks(now, weeks)
}

/// Earliest dated point whose raw score reaches `level` on the 0-100 scale.
fn first_reached(timeline: &[(Option<NaiveDate>, f64)], level: f64) -> Option<NaiveDate> {
    let threshold = level / SCALE;
    timeline
        .iter()
        .find_map(|(date, raw)| if *raw >= threshold { *date } else { None })
}
