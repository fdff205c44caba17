use crate::config::EngineConfig;
use crate::growth::ScoredTrack;
use crate::models::{CoachingAction, Priority};

/// High-priority actions for the weakest track and for a falling overall trend.
pub fn actions(tracks: &[ScoredTrack], overall_trend: f64, config: &EngineConfig) -> Vec<CoachingAction> {
    let mut actions = Vec::new();
    let Some(weakest) = tracks
        .iter()
        .min_by(|a, b| a.growth.current_level.total_cmp(&b.growth.current_level))
    else {
        return actions;
    };
    let current = weakest.growth.current_level;

    if let Some(rule) = config.coaching.get(weakest.name) {
        if current < rule.threshold {
            actions.push(CoachingAction {
                priority: Priority::High,
                track: weakest.name.to_string(),
                action: rule.action.clone(),
                timeline: rule.timeline.clone(),
                measurable_goal: format!(
                    "Increase {} score from {} to {}",
                    weakest.name,
                    current,
                    current + rule.target_gain
                ),
            });
        }
    }

    if overall_trend < 0.0 {
        actions.push(CoachingAction {
            priority: Priority::High,
            track: weakest.name.to_string(),
            action: "Address performance plateau with intensive practice".to_string(),
            timeline: "Immediate action required".to_string(),
            measurable_goal: "Restore positive growth trajectory within 2 weeks".to_string(),
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NextMilestone, SkillGrowth, Trend};

    fn track(name: &'static str, level: f64) -> ScoredTrack {
        ScoredTrack {
            name,
            weight: 0.3,
            growth: SkillGrowth {
                current_level: level,
                previous_level: level,
                growth_rate: 0.0,
                consistency: 100.0,
                momentum: 0.0,
                trend: Trend::Stable,
                next_milestone: NextMilestone {
                    level: 100,
                    estimated_weeks: 999,
                    required_growth_rate: 0.0,
                },
                strengths: Vec::new(),
                focus_areas: Vec::new(),
            },
            raw_growth_rate: 0.0,
            timeline: Vec::new(),
        }
    }

    #[test]
    fn weakest_dimension_below_threshold() {
        let tracks = vec![track("content", 55.0), track("style", 70.0), track("strategy", 45.0)];
        let actions = actions(&tracks, 2.0, &EngineConfig::default());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].track, "strategy");
        assert_eq!(actions[0].action, "Enhance POI engagement and team coordination");
        assert_eq!(actions[0].measurable_goal, "Increase strategy score from 45 to 65");
    }

    #[test]
    fn declining_trend_adds_plateau_action() {
        let tracks = vec![track("speaking", 80.0), track("writing", 75.0)];
        let actions = actions(&tracks, -3.5, &EngineConfig::default());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].track, "writing");
        assert_eq!(actions[0].timeline, "Immediate action required");
    }

    #[test]
    fn strong_steady_student_needs_nothing() {
        let tracks = vec![track("content", 90.0)];
        assert!(actions(&tracks, 0.0, &EngineConfig::default()).is_empty());
        assert!(actions(&[], -10.0, &EngineConfig::default()).is_empty());
    }
}
