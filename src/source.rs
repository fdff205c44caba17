//! Data-access seam consumed by the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AttendanceRecord, HistoricalPoint, PeerAggregate, Recommendation, RubricFeedback,
    StudentProfile,
};

/// Maximum recommendations attached to one report.
pub const RECOMMENDATION_LIMIT: usize = 10;

#[async_trait]
pub trait GrowthSource: Send + Sync {
    async fn student(&self, student_id: Uuid) -> Result<Option<StudentProfile>>;

    /// Attendance created at or after `since`, most recent first.
    async fn attendance_since(
        &self,
        student_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>>;

    /// Feedback created at or after `since`, most recent first.
    async fn feedback_since(
        &self,
        student_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<RubricFeedback>>;

    /// Per-student rating averages for everyone in `grade_level`.
    async fn peer_aggregates(&self, grade_level: &str) -> Result<Vec<PeerAggregate>>;

    /// Every attendance row for the student, oldest session first.
    async fn history(&self, student_id: Uuid) -> Result<Vec<HistoricalPoint>>;

    /// Newest first, at most `RECOMMENDATION_LIMIT`.
    async fn recommendations(&self, student_id: Uuid) -> Result<Vec<Recommendation>>;
}
