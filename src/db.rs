use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    parse_date, AttendanceRecord, HistoricalPoint, PeerAggregate, Ratings, Recommendation,
    RubricFeedback, StudentProfile,
};
use crate::source::{GrowthSource, RECOMMENDATION_LIMIT};

/// Reads growth inputs from the academy's Postgres schema.
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ratings(row: &PgRow) -> Result<Ratings> {
    let ratings = Ratings {
        attitude_efforts: row.get("attitude_efforts"),
        asking_questions: row.get("asking_questions"),
        application_skills: row.get("application_skills"),
        application_feedback: row.get("application_feedback"),
    };
    ratings.validate()?;
    Ok(ratings)
}

/// `created_at` is nullable in the academy schema. A missing value falls
/// back to midnight UTC on the row's own date, then to the epoch.
fn created_or(created_at: Option<DateTime<Utc>>, date: Option<NaiveDate>) -> DateTime<Utc> {
    created_at
        .or_else(|| date.map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc()))
        .unwrap_or_default()
}

#[async_trait]
impl GrowthSource for PgSource {
    async fn student(&self, student_id: Uuid) -> Result<Option<StudentProfile>> {
        let row = sqlx::query(
            r#"
            SELECT s.id, u.name, s.grade_level, s.student_number
            FROM students s
            JOIN users u ON u.id = s.id
            WHERE s.id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| StudentProfile {
            id: row.get("id"),
            name: row.get("name"),
            grade_level: row.get("grade_level"),
            student_number: row.get("student_number"),
        }))
    }

    async fn attendance_since(
        &self,
        student_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query(
            r#"
            SELECT a.id, a.session_id, a.student_id, cs.session_date::date AS session_date,
                   a.attitude_efforts, a.asking_questions, a.application_skills,
                   a.application_feedback, a.status::text AS status, a.created_at
            FROM attendances a
            JOIN class_sessions cs ON cs.id = a.session_id
            WHERE a.student_id = $1 AND a.created_at >= $2
            ORDER BY a.created_at DESC
            "#,
        )
        .bind(student_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut attendance = Vec::with_capacity(records.len());
        for row in records {
            let status: String = row.get("status");
            let session_date: Option<NaiveDate> = row.get("session_date");
            attendance.push(AttendanceRecord {
                id: row.get("id"),
                student_id: row.get("student_id"),
                session_id: row.get("session_id"),
                session_date,
                ratings: ratings(&row)?,
                status: status.parse()?,
                created_at: created_or(row.try_get("created_at")?, session_date),
            });
        }

        Ok(attendance)
    }

    async fn feedback_since(
        &self,
        student_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<RubricFeedback>> {
        let records = sqlx::query(
            r#"
            SELECT f.id, f.student_id, f.student_name, f.rubric_scores, f.strengths,
                   f.improvements, f.feedback_date::text AS feedback_date, f.created_at
            FROM parsed_student_feedback f
            WHERE f.student_id = $1 AND f.created_at >= $2
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(student_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut feedback = Vec::with_capacity(records.len());
        for row in records {
            let feedback_date: Option<String> = row.get("feedback_date");
            let feedback_date = parse_date(feedback_date.as_deref());
            feedback.push(RubricFeedback {
                id: row.get("id"),
                student_id: row.get("student_id"),
                student_name: row.get("student_name"),
                rubric_scores: row.get("rubric_scores"),
                strengths: row.get("strengths"),
                improvements: row.get("improvements"),
                feedback_date,
                created_at: created_or(row.try_get("created_at")?, feedback_date),
            });
        }

        Ok(feedback)
    }

    async fn peer_aggregates(&self, grade_level: &str) -> Result<Vec<PeerAggregate>> {
        let records = sqlx::query(
            r#"
            SELECT a.student_id,
                   AVG(a.attitude_efforts)::float8 AS avg_attitude,
                   AVG(a.asking_questions)::float8 AS avg_questions,
                   AVG(a.application_skills)::float8 AS avg_skills,
                   AVG(a.application_feedback)::float8 AS avg_feedback
            FROM attendances a
            JOIN students s ON s.id = a.student_id
            WHERE s.grade_level = $1
            GROUP BY a.student_id
            "#,
        )
        .bind(grade_level)
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(|row| PeerAggregate {
                student_id: row.get("student_id"),
                avg_attitude: row.get("avg_attitude"),
                avg_questions: row.get("avg_questions"),
                avg_skills: row.get("avg_skills"),
                avg_feedback: row.get("avg_feedback"),
            })
            .collect())
    }

    async fn history(&self, student_id: Uuid) -> Result<Vec<HistoricalPoint>> {
        let records = sqlx::query(
            r#"
            SELECT cs.session_date::date AS session_date,
                   a.attitude_efforts, a.asking_questions, a.application_skills,
                   a.application_feedback
            FROM attendances a
            JOIN class_sessions cs ON cs.id = a.session_id
            WHERE a.student_id = $1
            ORDER BY cs.session_date
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut history = Vec::with_capacity(records.len());
        for row in records {
            history.push(HistoricalPoint {
                date: row.get("session_date"),
                ratings: ratings(&row)?,
            });
        }

        Ok(history)
    }

    /// Recommendations are keyed by student number rather than id.
    async fn recommendations(&self, student_id: Uuid) -> Result<Vec<Recommendation>> {
        let records = sqlx::query(
            r#"
            SELECT r.id, r.recommendation_type, r.content,
                   COALESCE(r.priority, 'medium') AS priority, r.created_at
            FROM ai_recommendations r
            JOIN students s ON s.student_number = r.student_name
            WHERE s.id = $1
            ORDER BY r.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(student_id)
        .bind(RECOMMENDATION_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut recommendations = Vec::with_capacity(records.len());
        for row in records {
            recommendations.push(Recommendation {
                id: row.get("id"),
                recommendation_type: row.get("recommendation_type"),
                content: row.get("content"),
                priority: row.get("priority"),
                created_at: created_or(row.try_get("created_at")?, None),
            });
        }
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn null_created_at_falls_back_to_row_date() {
        let stamped = Utc.with_ymd_and_hms(2026, 9, 14, 16, 30, 0).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 9, 12);

        assert_eq!(created_or(Some(stamped), day), stamped);
        assert_eq!(
            created_or(None, day),
            Utc.with_ymd_and_hms(2026, 9, 12, 0, 0, 0).unwrap()
        );
        assert_eq!(created_or(None, None), DateTime::<Utc>::default());
    }
}
