use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{Breakdown, Dimension, GrowthReport, SkillGrowth, Trend};
use crate::rubric;
use crate::snapshot::RubricRow;

fn tracks(breakdown: &Breakdown) -> Vec<(&'static str, &SkillGrowth)> {
    match breakdown {
        Breakdown::Skills { skills } => skills.iter().map(|(s, g)| (s.as_str(), g)).collect(),
        Breakdown::Dimensions { dimensions } => dimensions
            .iter()
            .map(|(d, g)| (d.as_str(), &g.growth))
            .collect(),
    }
}

fn trend_label(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => "improving",
        Trend::Stable => "stable",
        Trend::Declining => "declining",
    }
}

fn milestone_eta(growth: &SkillGrowth, unreachable_weeks: u32) -> String {
    let next = &growth.next_milestone;
    if next.estimated_weeks >= unreachable_weeks {
        format!("{} not reachable at current pace", next.level)
    } else {
        format!("{} in ~{} weeks", next.level, next.estimated_weeks)
    }
}

/// Markdown digest of one student's growth report.
pub fn build_report(report: &GrowthReport, unreachable_weeks: u32) -> String {
    let mut output = String::new();
    let overall = &report.overall;

    let _ = writeln!(output, "# Growth Report: {}", report.student_name);
    let _ = writeln!(
        output,
        "Generated {} covering the last {} ({} student)",
        report.generated_at.format("%Y-%m-%d"),
        format!("{:?}", report.timeframe).to_lowercase(),
        format!("{:?}", report.student_level).to_lowercase()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");
    let _ = writeln!(
        output,
        "- Score {} ({}), trend {:+.1}%, estimated percentile {}",
        overall.score,
        overall.level.as_str(),
        overall.trend,
        overall.percentile
    );
    let _ = writeln!(output, "- {}", overall.description);
    for component in &overall.components {
        let _ = writeln!(
            output,
            "- {}: {} x {:.2} = {:.1}",
            component.name, component.value, component.weight, component.contribution
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Breakdown");
    for (name, growth) in tracks(&report.breakdown) {
        let _ = writeln!(
            output,
            "- {}: {} (was {}, {:+.1}%, {}), consistency {}, next milestone {}",
            name,
            growth.current_level,
            growth.previous_level,
            growth.growth_rate,
            trend_label(growth.trend),
            growth.consistency,
            milestone_eta(growth, unreachable_weeks)
        );
        for strength in &growth.strengths {
            let _ = writeln!(output, "  - Strength: {strength}");
        }
        for focus in &growth.focus_areas {
            let _ = writeln!(output, "  - Focus: {focus}");
        }
    }
    if let Breakdown::Dimensions { dimensions } = &report.breakdown {
        for (dimension, growth) in dimensions {
            let parts = &growth.breakdown;
            if parts.components.is_empty() {
                continue;
            }
            let components: Vec<String> = parts
                .components
                .iter()
                .map(|(label, value)| format!("{label} {value}"))
                .collect();
            let _ = writeln!(output, "- {} rubric: {}", dimension.as_str(), components.join(", "));
        }
    }

    let trajectory = &report.trajectory;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Trajectory");
    let _ = writeln!(
        output,
        "- 3 months: {} (range {} to {})",
        trajectory.projected_3_months, trajectory.confidence_interval.0, trajectory.confidence_interval.1
    );
    let _ = writeln!(output, "- 6 months: {}", trajectory.projected_6_months);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Milestones");
    if report.milestones.achieved.is_empty() && report.milestones.upcoming.is_empty() {
        let _ = writeln!(output, "No milestones tracked yet.");
    }
    for milestone in &report.milestones.achieved {
        let date = milestone
            .achieved_date
            .map(|d| d.to_string())
            .unwrap_or_default();
        let _ = writeln!(output, "- [x] {} ({})", milestone.title, date);
    }
    for milestone in &report.milestones.upcoming {
        let eta = milestone
            .estimated_completion
            .map(|d| format!(", expected by {}", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "- [ ] {}: {}% there, {}{}",
            milestone.title, milestone.progress, milestone.description, eta
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Patterns");
    if report.patterns.is_empty() {
        let _ = writeln!(output, "No clear pattern yet.");
    } else {
        for pattern in &report.patterns {
            let _ = writeln!(output, "- {} {}", pattern.description, pattern.recommendation);
        }
    }

    let comparisons = &report.comparisons;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Comparisons");
    if comparisons.to_peers.total_peers == 0 {
        let _ = writeln!(output, "- No peers in this grade level.");
    } else {
        let _ = writeln!(
            output,
            "- Rank {} of {} peers ({} percentile)",
            comparisons.to_peers.ranking, comparisons.to_peers.total_peers, comparisons.to_peers.percentile
        );
    }
    let _ = writeln!(
        output,
        "- {:+.1}% against the earlier half of sessions",
        comparisons.to_previous.improvement
    );
    let goal = &comparisons.to_goals;
    let eta = goal
        .estimated_completion
        .map(|d| format!("expected by {}", d.format("%Y-%m-%d")))
        .unwrap_or_else(|| "no completion estimate".to_string());
    let _ = writeln!(
        output,
        "- Goal {}: {}% of target, {}, {}",
        goal.target,
        goal.progress_percentage,
        if goal.on_track { "on track" } else { "behind" },
        eta
    );

    if !report.velocity.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Weekly Velocity");
        for point in &report.velocity {
            let _ = writeln!(
                output,
                "- {}: {:+.1}% (benchmark {}%)",
                point.week, point.velocity, point.benchmark
            );
        }
    }

    if !report.coaching.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Coaching");
        for action in &report.coaching {
            let _ = writeln!(
                output,
                "- {} ({}): {}. Goal: {}",
                action.action, action.track, action.timeline, action.measurable_goal
            );
        }
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommendations");
        for recommendation in &report.recommendations {
            let _ = writeln!(
                output,
                "- [{}] {}: {}",
                recommendation.priority, recommendation.recommendation_type, recommendation.content
            );
        }
    }

    output
}

/// Markdown table of dimension scores for offline rubric rows.
pub fn build_rubric_summary(rows: &[RubricRow], weights: &BTreeMap<Dimension, f64>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| Student | Content | Style | Strategy | Overall |");
    let _ = writeln!(output, "|---|---|---|---|---|");

    for row in rows {
        match &row.scores {
            Some(scores) => {
                let dims = rubric::score_dimensions(scores);
                let note = if scores.is_empty() { " (all N/A)" } else { "" };
                let _ = writeln!(
                    output,
                    "| {} | {:.0} | {:.0} | {:.0} | {}{} |",
                    row.student_name,
                    dims.content,
                    dims.style,
                    dims.strategy,
                    dims.overall(weights),
                    note
                );
            }
            None => {
                let _ = writeln!(output, "| {} | - | - | - | no rubric scores |", row.student_name);
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{assemble, ReportInputs};
    use crate::models::{Ratings, StudentProfile, Timeframe, Variant};
    use crate::rubric::RubricScores;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample_report() -> GrowthReport {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        let inputs = ReportInputs {
            profile: StudentProfile {
                id: Uuid::new_v4(),
                name: "Priya Nair".to_string(),
                grade_level: Some("Grade 4".to_string()),
                student_number: None,
            },
            timeframe: Timeframe::Month,
            attendance: Vec::new(),
            feedback: Vec::new(),
            peers: Vec::new(),
            history: vec![crate::models::HistoricalPoint {
                date: None,
                ratings: Ratings::uniform(3),
            }],
            recommendations: Vec::new(),
        };
        assemble(&EngineConfig::default(), inputs, Variant::Skills, now)
    }

    #[test]
    fn digest_lists_every_section() {
        let output = build_report(&sample_report(), 999);
        assert!(output.starts_with("# Growth Report: Priya Nair"));
        for heading in ["## Overall", "## Breakdown", "## Trajectory", "## Milestones", "## Patterns", "## Comparisons"] {
            assert!(output.contains(heading), "missing {heading}");
        }
        assert!(output.contains("- speaking: 0 (was 0, +0.0%, stable)"));
        assert!(output.contains("25 not reachable at current pace"));
        assert!(output.contains("No peers in this grade level."));
        assert!(!output.contains("## Weekly Velocity"));
    }

    #[test]
    fn rubric_summary_marks_rows_without_scores() {
        let rows = vec![
            RubricRow {
                student_name: "Ana Silva".to_string(),
                scores: Some(RubricScores::default().with(1, 5.0).with(3, 5.0).with(8, 5.0)),
            },
            RubricRow {
                student_name: "Ben Cho".to_string(),
                scores: None,
            },
            RubricRow {
                student_name: "Cara Diaz".to_string(),
                scores: Some(RubricScores::default()),
            },
        ];
        let output = build_rubric_summary(&rows, &EngineConfig::default().dimension_weights);
        assert!(output.contains("| Ana Silva | 50 | 100 | 50 | 65 |"));
        assert!(output.contains("| Ben Cho | - | - | - | no rubric scores |"));
        assert!(output.contains("| Cara Diaz | 50 | 50 | 50 | 50 (all N/A) |"));
    }
}
