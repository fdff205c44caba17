//! Report assembly: fetch everything, then run the calculators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{GrowthError, Result};
use crate::growth::{self, ScoredTrack};
use crate::models::{
    AttendanceRecord, Breakdown, DimensionGrowth, GrowthReport, HistoricalPoint, PeerAggregate,
    Recommendation, RubricFeedback, StudentLevel, StudentProfile, Timeframe, Variant,
};
use crate::source::GrowthSource;
use crate::tracks::DimensionSource;
use crate::{aggregate, coaching, compare, milestones, patterns, tracks, velocity};

/// Everything a report is computed from.
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub profile: StudentProfile,
    pub timeframe: Timeframe,
    pub attendance: Vec<AttendanceRecord>,
    pub feedback: Vec<RubricFeedback>,
    pub peers: Vec<PeerAggregate>,
    pub history: Vec<HistoricalPoint>,
    pub recommendations: Vec<Recommendation>,
}

/// Stateless apart from its data source and the fixed tables.
pub struct GrowthEngine<S> {
    source: S,
    config: EngineConfig,
}

impl<S: GrowthSource> GrowthEngine<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn report(
        &self,
        student_id: Uuid,
        timeframe: Timeframe,
        variant: Variant,
    ) -> Result<GrowthReport> {
        self.report_at(student_id, timeframe, variant, Utc::now()).await
    }

    /// Any failed read aborts the report except recommendations, which
    /// degrade to an empty list.
    pub async fn report_at(
        &self,
        student_id: Uuid,
        timeframe: Timeframe,
        variant: Variant,
        now: DateTime<Utc>,
    ) -> Result<GrowthReport> {
        let profile = self
            .source
            .student(student_id)
            .await?
            .ok_or(GrowthError::StudentNotFound(student_id))?;
        let since = timeframe.since(now);
        debug!(%student_id, %since, "fetching growth inputs");

        let peers = async {
            match profile.grade_level.as_deref() {
                Some(grade) => self.source.peer_aggregates(grade).await,
                None => Ok(Vec::new()),
            }
        };
        let (fetched, recommendations) = tokio::join!(
            async {
                tokio::try_join!(
                    self.source.attendance_since(student_id, since),
                    self.source.feedback_since(student_id, since),
                    peers,
                    self.source.history(student_id),
                )
            },
            self.source.recommendations(student_id),
        );
        let (attendance, feedback, peers, history) = fetched?;
        let recommendations = recommendations.unwrap_or_else(|err| {
            warn!(%student_id, error = %err, "recommendations unavailable, continuing without them");
            Vec::new()
        });

        info!(
            %student_id,
            attendance = attendance.len(),
            feedback = feedback.len(),
            peers = peers.len(),
            history = history.len(),
            "computing growth report"
        );

        let inputs = ReportInputs {
            profile,
            timeframe,
            attendance,
            feedback,
            peers,
            history,
            recommendations,
        };
        Ok(assemble(&self.config, inputs, variant, now))
    }
}

/// Dimensions for secondary students, and for primary students with rubric
/// or written feedback.
pub fn uses_dimensions(variant: Variant, level: StudentLevel, feedback: &[RubricFeedback]) -> bool {
    match variant {
        Variant::Skills => false,
        Variant::Dimensions => true,
        Variant::Auto => {
            level == StudentLevel::Secondary
                || tracks::dimension_source(level, feedback) != DimensionSource::Attendance
        }
    }
}

/// Pure computation over already-fetched inputs.
pub fn assemble(
    config: &EngineConfig,
    inputs: ReportInputs,
    variant: Variant,
    now: DateTime<Utc>,
) -> GrowthReport {
    let ReportInputs {
        profile,
        timeframe,
        attendance,
        feedback,
        peers,
        history,
        recommendations,
    } = inputs;
    let student_level = StudentLevel::from_grade(profile.grade_level.as_deref());

    let (scored, breakdown) = if uses_dimensions(variant, student_level, &feedback) {
        let mut dimensions = BTreeMap::new();
        let mut scored: Vec<ScoredTrack> = Vec::new();
        for (dimension, track, parts) in tracks::dimension_tracks(config, student_level, &feedback, &attendance, &history) {
            let result = growth::score_track(&track, &feedback, config);
            dimensions.insert(
                dimension,
                DimensionGrowth {
                    growth: result.growth.clone(),
                    breakdown: parts,
                },
            );
            scored.push(result);
        }
        (scored, Breakdown::Dimensions { dimensions })
    } else {
        let mut skills = BTreeMap::new();
        let mut scored: Vec<ScoredTrack> = Vec::new();
        for (skill, track) in tracks::skill_tracks(config, &attendance, &history) {
            let result = growth::score_track(&track, &feedback, config);
            skills.insert(skill, result.growth.clone());
            scored.push(result);
        }
        (scored, Breakdown::Skills { skills })
    };

    let overall = aggregate::overall(&scored, &history, config);
    let trajectory = aggregate::trajectory(&scored);
    let milestones = milestones::identify(&scored, config, now);
    let patterns = patterns::detect(&attendance, &history, config);
    let comparisons = compare::compare(overall.score, &peers, &history, config, now);
    let velocity = velocity::weekly_velocity(&history, config);
    let coaching = coaching::actions(&scored, overall.trend, config);

    GrowthReport {
        student_id: profile.id,
        student_name: profile.name,
        student_level,
        timeframe,
        generated_at: now,
        overall,
        breakdown,
        trajectory,
        milestones,
        patterns,
        comparisons,
        velocity,
        coaching,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, Dimension, Ratings, Skill, Trend};
    use crate::snapshot::Snapshot;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn profile(grade: &str) -> StudentProfile {
        StudentProfile {
            id: Uuid::new_v4(),
            name: "Maya Okafor".to_string(),
            grade_level: Some(grade.to_string()),
            student_number: Some("S-1042".to_string()),
        }
    }

    fn session(student_id: Uuid, days_ago: i64, value: i32) -> AttendanceRecord {
        let at = now() - Duration::days(days_ago);
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            session_id: Uuid::new_v4(),
            session_date: Some(at.date_naive()),
            ratings: Ratings::uniform(value),
            status: AttendanceStatus::Present,
            created_at: at,
        }
    }

    fn rubric_feedback(student: &StudentProfile, days_ago: i64, rubric: serde_json::Value) -> RubricFeedback {
        let at = now() - Duration::days(days_ago);
        RubricFeedback {
            id: Uuid::new_v4(),
            student_id: Some(student.id),
            student_name: student.name.clone(),
            rubric_scores: Some(rubric),
            strengths: Some("Confident delivery and strong voice throughout.".to_string()),
            improvements: Some("Rebuttal lacked structure.".to_string()),
            feedback_date: Some(at.date_naive()),
            created_at: at,
        }
    }

    fn snapshot_with_perfect_sessions(grade: &str) -> (Snapshot, Uuid) {
        let student = profile(grade);
        let id = student.id;
        let attendance = (1..=5).map(|d| session(id, d, 5)).collect();
        (Snapshot::new(vec![student], attendance, Vec::new(), Vec::new()), id)
    }

    #[tokio::test]
    async fn perfect_recent_sessions_without_history() {
        let (snapshot, id) = snapshot_with_perfect_sessions("Grade 5");
        let engine = GrowthEngine::new(snapshot, EngineConfig::default());
        let report = engine
            .report_at(id, Timeframe::Month, Variant::Auto, now())
            .await
            .unwrap();

        let Breakdown::Skills { skills } = &report.breakdown else {
            panic!("primary student without rubrics should use skills");
        };
        assert_eq!(skills.len(), 6);
        let speaking = &skills[&Skill::Speaking];
        assert_eq!(speaking.current_level, 100.0);
        assert_eq!(speaking.previous_level, 90.0);
        assert_eq!(speaking.growth_rate, 11.1);
        assert_eq!(speaking.trend, Trend::Improving);

        assert_eq!(report.overall.score, 100.0);
        assert_eq!(report.overall.percentile, 99);
        assert_eq!(report.comparisons.to_peers.ranking, 1);
        assert_eq!(report.comparisons.to_peers.total_peers, 1);
        assert_eq!(report.comparisons.to_peers.percentile, 100.0);
        assert!(report.velocity.len() <= 8);
        assert!(report.recommendations.is_empty());
    }

    #[tokio::test]
    async fn unknown_student_is_an_error() {
        let engine = GrowthEngine::new(Snapshot::default(), EngineConfig::default());
        let err = engine
            .report_at(Uuid::new_v4(), Timeframe::Week, Variant::Auto, now())
            .await
            .unwrap_err();
        assert!(matches!(err, GrowthError::StudentNotFound(_)));
    }

    #[tokio::test]
    async fn timeframe_bounds_the_recent_window() {
        let student = profile("Grade 4");
        let id = student.id;
        let attendance = vec![session(id, 2, 4), session(id, 20, 1)];
        let snapshot = Snapshot::new(vec![student], attendance, Vec::new(), Vec::new());
        let engine = GrowthEngine::new(snapshot, EngineConfig::default());

        let report = engine.report_at(id, Timeframe::Week, Variant::Skills, now()).await.unwrap();
        let Breakdown::Skills { skills } = &report.breakdown else {
            panic!("skills requested");
        };
        assert_eq!(skills[&Skill::Confidence].current_level, 80.0);
        // history is unbounded
        assert_eq!(report.comparisons.to_previous.improvement, 300.0);
    }

    #[tokio::test]
    async fn style_only_feedback_scores_dimensions() {
        let student = profile("Year 9");
        let feedback = vec![rubric_feedback(
            &student,
            1,
            json!({"rubric_1": 5, "rubric_3": 5, "rubric_8": 5, "rubric_2": "N/A"}),
        )];
        let id = student.id;
        let snapshot = Snapshot::new(vec![student], Vec::new(), feedback, Vec::new());
        let engine = GrowthEngine::new(snapshot, EngineConfig::default());

        let report = engine.report_at(id, Timeframe::Term, Variant::Auto, now()).await.unwrap();
        assert_eq!(report.student_level, StudentLevel::Secondary);
        let Breakdown::Dimensions { dimensions } = &report.breakdown else {
            panic!("secondary student should use dimensions");
        };
        assert_eq!(dimensions[&Dimension::Style].growth.current_level, 100.0);
        assert_eq!(dimensions[&Dimension::Content].growth.current_level, 50.0);
        assert_eq!(dimensions[&Dimension::Strategy].growth.current_level, 50.0);
        // 50 * 0.4 + 100 * 0.3 + 50 * 0.3
        assert_eq!(report.overall.score, 65.0);
        assert!(dimensions[&Dimension::Style]
            .growth
            .strengths
            .contains(&"Confident delivery and strong voice throughout".to_string()));
        assert_eq!(
            dimensions[&Dimension::Style].breakdown.strengths,
            vec!["Excellent time management", "Highly persuasive delivery", "Great at applying feedback"]
        );
    }

    #[test]
    fn auto_variant_prefers_rubrics_for_primary_students() {
        let student = profile("Grade 3");
        let feedback = vec![rubric_feedback(&student, 3, json!({"rubric_4": 4}))];
        assert!(uses_dimensions(Variant::Auto, StudentLevel::Primary, &feedback));
        assert!(!uses_dimensions(Variant::Auto, StudentLevel::Primary, &[]));
        assert!(uses_dimensions(Variant::Auto, StudentLevel::Secondary, &[]));
        assert!(!uses_dimensions(Variant::Skills, StudentLevel::Secondary, &feedback));
        let notes_only = vec![rubric_feedback(&student, 3, json!({}))];
        assert!(uses_dimensions(Variant::Auto, StudentLevel::Primary, &notes_only));
    }

    #[test]
    fn empty_inputs_still_produce_a_full_report() {
        let inputs = ReportInputs {
            profile: profile("Grade 2"),
            timeframe: Timeframe::Month,
            attendance: Vec::new(),
            feedback: Vec::new(),
            peers: Vec::new(),
            history: Vec::new(),
            recommendations: Vec::new(),
        };
        let report = assemble(&EngineConfig::default(), inputs, Variant::Auto, now());
        assert_eq!(report.overall.score, 0.0);
        assert_eq!(report.comparisons.to_peers.percentile, 0.0);
        assert!(report.velocity.is_empty());
        assert!(report.patterns.is_empty());
        assert!(report.milestones.achieved.is_empty());
        assert_eq!(report.milestones.upcoming.len(), 5);
    }

    #[test]
    fn dated_history_yields_achievements() {
        let student = profile("Grade 6");
        let id = student.id;
        let history: Vec<HistoricalPoint> = [2, 3, 4, 4]
            .iter()
            .enumerate()
            .map(|(i, v)| HistoricalPoint {
                date: NaiveDate::from_ymd_opt(2026, 9, 1 + 7 * i as u32),
                ratings: Ratings::uniform(*v),
            })
            .collect();
        let attendance = vec![session(id, 1, 4), session(id, 8, 4)];
        let inputs = ReportInputs {
            profile: student,
            timeframe: Timeframe::Term,
            attendance,
            feedback: Vec::new(),
            peers: Vec::new(),
            history,
            recommendations: Vec::new(),
        };
        let report = assemble(&EngineConfig::default(), inputs, Variant::Skills, now());
        assert!(!report.milestones.achieved.is_empty());
        assert!(report
            .milestones
            .achieved
            .iter()
            .all(|m| m.achieved_date.is_some()));
        assert_eq!(report.velocity.len(), 3);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Fetch {
        Attendance,
        History,
        Recommendations,
    }

    /// Delegates to a snapshot but fails one fetch.
    struct Flaky {
        inner: Snapshot,
        fails: Fetch,
    }

    impl Flaky {
        fn check(&self, fetch: Fetch) -> Result<()> {
            if self.fails == fetch {
                return Err(GrowthError::Config("store offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl GrowthSource for Flaky {
        async fn student(&self, id: Uuid) -> Result<Option<StudentProfile>> {
            self.inner.student(id).await
        }
        async fn attendance_since(&self, id: Uuid, since: DateTime<Utc>) -> Result<Vec<AttendanceRecord>> {
            self.check(Fetch::Attendance)?;
            self.inner.attendance_since(id, since).await
        }
        async fn feedback_since(&self, id: Uuid, since: DateTime<Utc>) -> Result<Vec<RubricFeedback>> {
            self.inner.feedback_since(id, since).await
        }
        async fn peer_aggregates(&self, grade_level: &str) -> Result<Vec<PeerAggregate>> {
            self.inner.peer_aggregates(grade_level).await
        }
        async fn history(&self, id: Uuid) -> Result<Vec<HistoricalPoint>> {
            self.check(Fetch::History)?;
            self.inner.history(id).await
        }
        async fn recommendations(&self, id: Uuid) -> Result<Vec<Recommendation>> {
            self.check(Fetch::Recommendations)?;
            self.inner.recommendations(id).await
        }
    }

    #[tokio::test]
    async fn recommendation_failure_degrades_to_empty() {
        let (inner, id) = snapshot_with_perfect_sessions("Grade 5");
        let source = Flaky { inner, fails: Fetch::Recommendations };
        let engine = GrowthEngine::new(source, EngineConfig::default());
        let report = engine.report_at(id, Timeframe::Month, Variant::Auto, now()).await.unwrap();
        assert!(report.recommendations.is_empty());
        assert_eq!(report.overall.score, 100.0);
    }

    #[tokio::test]
    async fn other_fetch_failures_abort_the_report() {
        for fails in [Fetch::Attendance, Fetch::History] {
            let (inner, id) = snapshot_with_perfect_sessions("Grade 5");
            let engine = GrowthEngine::new(Flaky { inner, fails }, EngineConfig::default());
            let err = engine
                .report_at(id, Timeframe::Month, Variant::Auto, now())
                .await
                .unwrap_err();
            assert!(matches!(err, GrowthError::Config(_)));
        }
    }
}
