//! In-memory data source, loadable from a directory of CSV exports.
//!
//! Expected files: `students.csv`, `attendance.csv`, `feedback.csv` and an
//! optional `recommendations.csv`.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    parse_date, AttendanceRecord, AttendanceStatus, HistoricalPoint, PeerAggregate, Ratings,
    Recommendation, RubricFeedback, StudentProfile,
};
use crate::rubric::{self, RubricScores, RUBRIC_SLOTS};
use crate::source::{GrowthSource, RECOMMENDATION_LIMIT};

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    students: Vec<StudentProfile>,
    attendance: Vec<AttendanceRecord>,
    feedback: Vec<RubricFeedback>,
    recommendations: Vec<(Uuid, Recommendation)>,
}

#[derive(Deserialize)]
struct StudentRow {
    id: Uuid,
    name: String,
    grade_level: Option<String>,
    student_number: Option<String>,
}

#[derive(Deserialize)]
struct AttendanceRow {
    id: Option<Uuid>,
    student_id: Uuid,
    session_id: Option<Uuid>,
    session_date: Option<String>,
    attitude_efforts: Option<i32>,
    asking_questions: Option<i32>,
    application_skills: Option<i32>,
    application_feedback: Option<i32>,
    status: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct FeedbackRow {
    id: Option<Uuid>,
    student_id: Option<Uuid>,
    student_name: String,
    feedback_date: Option<String>,
    created_at: DateTime<Utc>,
    strengths: Option<String>,
    improvements: Option<String>,
    rubric_1: Option<String>,
    rubric_2: Option<String>,
    rubric_3: Option<String>,
    rubric_4: Option<String>,
    rubric_5: Option<String>,
    rubric_6: Option<String>,
    rubric_7: Option<String>,
    rubric_8: Option<String>,
}

impl FeedbackRow {
    fn rubric_cells(&self) -> [&Option<String>; RUBRIC_SLOTS] {
        [
            &self.rubric_1,
            &self.rubric_2,
            &self.rubric_3,
            &self.rubric_4,
            &self.rubric_5,
            &self.rubric_6,
            &self.rubric_7,
            &self.rubric_8,
        ]
    }

    /// Blank cells are absent; anything else, "N/A" included, is kept for
    /// the rubric parser to judge.
    fn rubric_json(&self) -> Option<Value> {
        let mut fields = Map::new();
        for (index, cell) in self.rubric_cells().into_iter().enumerate() {
            if let Some(text) = cell.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                fields.insert(format!("rubric_{}", index + 1), Value::String(text.to_string()));
            }
        }
        (!fields.is_empty()).then_some(Value::Object(fields))
    }
}

#[derive(Deserialize)]
struct RecommendationRow {
    id: Option<Uuid>,
    student_id: Uuid,
    recommendation_type: String,
    content: String,
    priority: Option<String>,
    created_at: DateTime<Utc>,
}

/// One row of the offline `rubric` command's input.
#[derive(Debug)]
pub struct RubricRow {
    pub student_name: String,
    pub scores: Option<RubricScores>,
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Reads `student_name` plus any `rubric_N` columns; other columns are ignored.
pub fn read_rubric_csv(path: &Path) -> Result<Vec<RubricRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let mut student_name = String::new();
        let mut fields = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            if header == "student_name" {
                student_name = cell.to_string();
            } else if header.starts_with("rubric_") && !cell.is_empty() {
                fields.insert(header.to_string(), Value::String(cell.to_string()));
            }
        }
        rows.push(RubricRow {
            student_name,
            scores: rubric::decode(&Value::Object(fields)),
        });
    }

    Ok(rows)
}

impl Snapshot {
    pub fn new(
        students: Vec<StudentProfile>,
        attendance: Vec<AttendanceRecord>,
        feedback: Vec<RubricFeedback>,
        recommendations: Vec<(Uuid, Recommendation)>,
    ) -> Self {
        Self {
            students,
            attendance,
            feedback,
            recommendations,
        }
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let students = read_rows::<StudentRow>(&dir.join("students.csv"))?
            .into_iter()
            .map(|row| StudentProfile {
                id: row.id,
                name: row.name,
                grade_level: row.grade_level,
                student_number: row.student_number,
            })
            .collect();

        let mut attendance = Vec::new();
        for row in read_rows::<AttendanceRow>(&dir.join("attendance.csv"))? {
            let ratings = Ratings {
                attitude_efforts: row.attitude_efforts,
                asking_questions: row.asking_questions,
                application_skills: row.application_skills,
                application_feedback: row.application_feedback,
            };
            ratings.validate()?;
            let status = match row.status.as_deref() {
                Some(text) if !text.trim().is_empty() => text.parse()?,
                _ => AttendanceStatus::Present,
            };
            attendance.push(AttendanceRecord {
                id: row.id.unwrap_or_else(Uuid::new_v4),
                student_id: row.student_id,
                session_id: row.session_id.unwrap_or_else(Uuid::new_v4),
                session_date: parse_date(row.session_date.as_deref()),
                ratings,
                status,
                created_at: row.created_at,
            });
        }

        let feedback = read_rows::<FeedbackRow>(&dir.join("feedback.csv"))?
            .into_iter()
            .map(|row| RubricFeedback {
                id: row.id.unwrap_or_else(Uuid::new_v4),
                student_id: row.student_id,
                rubric_scores: row.rubric_json(),
                feedback_date: parse_date(row.feedback_date.as_deref()),
                student_name: row.student_name,
                strengths: row.strengths,
                improvements: row.improvements,
                created_at: row.created_at,
            })
            .collect();

        let recommendations_path = dir.join("recommendations.csv");
        let recommendations = if recommendations_path.exists() {
            read_rows::<RecommendationRow>(&recommendations_path)?
                .into_iter()
                .map(|row| {
                    (
                        row.student_id,
                        Recommendation {
                            id: row.id.unwrap_or_else(Uuid::new_v4),
                            recommendation_type: row.recommendation_type,
                            content: row.content,
                            priority: row.priority.unwrap_or_else(|| "medium".to_string()),
                            created_at: row.created_at,
                        },
                    )
                })
                .collect()
        } else {
            debug!(dir = %dir.display(), "snapshot has no recommendations.csv");
            Vec::new()
        };

        let snapshot = Self::new(students, attendance, feedback, recommendations);
        debug!(
            students = snapshot.students.len(),
            attendance = snapshot.attendance.len(),
            feedback = snapshot.feedback.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    fn attendance_for(&self, student_id: Uuid) -> impl Iterator<Item = &AttendanceRecord> {
        self.attendance.iter().filter(move |a| a.student_id == student_id)
    }
}

fn average(values: impl Iterator<Item = Option<i32>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().map(f64::from).collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

#[async_trait]
impl GrowthSource for Snapshot {
    async fn student(&self, student_id: Uuid) -> Result<Option<StudentProfile>> {
        Ok(self.students.iter().find(|s| s.id == student_id).cloned())
    }

    async fn attendance_since(
        &self,
        student_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>> {
        let mut rows: Vec<AttendanceRecord> = self
            .attendance_for(student_id)
            .filter(|a| a.created_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn feedback_since(
        &self,
        student_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<RubricFeedback>> {
        let mut rows: Vec<RubricFeedback> = self
            .feedback
            .iter()
            .filter(|f| f.student_id == Some(student_id) && f.created_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn peer_aggregates(&self, grade_level: &str) -> Result<Vec<PeerAggregate>> {
        let peers = self
            .students
            .iter()
            .filter(|s| s.grade_level.as_deref() == Some(grade_level))
            .filter_map(|student| {
                let rows: Vec<&Ratings> = self.attendance_for(student.id).map(|a| &a.ratings).collect();
                if rows.is_empty() {
                    return None;
                }
                Some(PeerAggregate {
                    student_id: student.id,
                    avg_attitude: average(rows.iter().map(|r| r.attitude_efforts)),
                    avg_questions: average(rows.iter().map(|r| r.asking_questions)),
                    avg_skills: average(rows.iter().map(|r| r.application_skills)),
                    avg_feedback: average(rows.iter().map(|r| r.application_feedback)),
                })
            })
            .collect();
        Ok(peers)
    }

    async fn history(&self, student_id: Uuid) -> Result<Vec<HistoricalPoint>> {
        let mut points: Vec<HistoricalPoint> = self
            .attendance_for(student_id)
            .map(|a| HistoricalPoint {
                date: a.session_date,
                ratings: a.ratings,
            })
            .collect();
        // undated sessions sort last, as NULLs do in Postgres
        points.sort_by_key(|p| (p.date.is_none(), p.date));
        Ok(points)
    }

    async fn recommendations(&self, student_id: Uuid) -> Result<Vec<Recommendation>> {
        let mut rows: Vec<Recommendation> = self
            .recommendations
            .iter()
            .filter(|(owner, _)| *owner == student_id)
            .map(|(_, rec)| rec.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(RECOMMENDATION_LIMIT);
        Ok(rows)
    }
}
