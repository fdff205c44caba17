use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GrowthError, Result};

/// Lookback window for the attendance and feedback fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Week,
    Month,
    Term,
    Year,
}

impl Timeframe {
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Timeframe::Week => return now - Duration::weeks(1),
            Timeframe::Month => 1,
            Timeframe::Term => 3,
            Timeframe::Year => 12,
        };
        now.checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Which scoring path produces the per-track breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Variant {
    #[default]
    Auto,
    Skills,
    Dimensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentLevel {
    Primary,
    Secondary,
}

impl StudentLevel {
    /// Grades 7 and above are secondary. Unparseable grades count as primary.
    pub fn from_grade(grade_level: Option<&str>) -> Self {
        let digits: String = grade_level
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        match digits.parse::<u32>() {
            Ok(grade) if grade >= 7 => StudentLevel::Secondary,
            _ => StudentLevel::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMetric {
    AttitudeEfforts,
    AskingQuestions,
    ApplicationSkills,
    ApplicationFeedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Speaking,
    Argumentation,
    CriticalThinking,
    Research,
    Writing,
    Confidence,
}

impl Skill {
    pub const ALL: [Skill; 6] = [
        Skill::Speaking,
        Skill::Argumentation,
        Skill::CriticalThinking,
        Skill::Research,
        Skill::Writing,
        Skill::Confidence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Skill::Speaking => "speaking",
            Skill::Argumentation => "argumentation",
            Skill::CriticalThinking => "critical_thinking",
            Skill::Research => "research",
            Skill::Writing => "writing",
            Skill::Confidence => "confidence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Content,
    Style,
    Strategy,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Content, Dimension::Style, Dimension::Strategy];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Content => "content",
            Dimension::Style => "style",
            Dimension::Strategy => "strategy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Makeup,
}

impl FromStr for AttendanceStatus {
    type Err = GrowthError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "makeup" => Ok(AttendanceStatus::Makeup),
            other => Err(GrowthError::InvalidStatus(other.to_string())),
        }
    }
}

/// The four instructor ratings recorded per session, each 1-5 when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub attitude_efforts: Option<i32>,
    pub asking_questions: Option<i32>,
    pub application_skills: Option<i32>,
    pub application_feedback: Option<i32>,
}

impl Ratings {
    pub fn uniform(value: i32) -> Self {
        Ratings {
            attitude_efforts: Some(value),
            asking_questions: Some(value),
            application_skills: Some(value),
            application_feedback: Some(value),
        }
    }

    pub fn value(&self, metric: AttendanceMetric) -> Option<i32> {
        match metric {
            AttendanceMetric::AttitudeEfforts => self.attitude_efforts,
            AttendanceMetric::AskingQuestions => self.asking_questions,
            AttendanceMetric::ApplicationSkills => self.application_skills,
            AttendanceMetric::ApplicationFeedback => self.application_feedback,
        }
    }

    /// Missing ratings read as zero.
    pub fn get(&self, metric: AttendanceMetric) -> f64 {
        self.value(metric).map(f64::from).unwrap_or(0.0)
    }

    pub fn composite(&self) -> f64 {
        (self.get(AttendanceMetric::AttitudeEfforts)
            + self.get(AttendanceMetric::AskingQuestions)
            + self.get(AttendanceMetric::ApplicationSkills)
            + self.get(AttendanceMetric::ApplicationFeedback))
            / 4.0
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("attitude_efforts", self.attitude_efforts),
            ("asking_questions", self.asking_questions),
            ("application_skills", self.application_skills),
            ("application_feedback", self.application_feedback),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                if !(1..=5).contains(&value) {
                    return Err(GrowthError::InvalidRating { field, value });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub grade_level: Option<String>,
    pub student_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub session_id: Uuid,
    pub session_date: Option<NaiveDate>,
    pub ratings: Ratings,
    pub status: AttendanceStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RubricFeedback {
    pub id: Uuid,
    /// Unlinked records carry only the student name.
    pub student_id: Option<Uuid>,
    pub student_name: String,
    /// Raw rubric JSON: `rubric_1`..`rubric_8` mapped to a number, "N/A" or null.
    pub rubric_scores: Option<serde_json::Value>,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub feedback_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl RubricFeedback {
    pub fn date(&self) -> NaiveDate {
        self.feedback_date
            .unwrap_or_else(|| self.created_at.date_naive())
    }
}

/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`, or a timestamp starting with an ISO
/// date. Anything else is treated as undated.
pub fn parse_date(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok())
}

/// Per-student averages of the four ratings across a grade-level cohort.
#[derive(Debug, Clone)]
pub struct PeerAggregate {
    pub student_id: Uuid,
    pub avg_attitude: Option<f64>,
    pub avg_questions: Option<f64>,
    pub avg_skills: Option<f64>,
    pub avg_feedback: Option<f64>,
}

impl PeerAggregate {
    pub fn composite_score(&self) -> f64 {
        let sum = self.avg_attitude.unwrap_or(0.0)
            + self.avg_questions.unwrap_or(0.0)
            + self.avg_skills.unwrap_or(0.0)
            + self.avg_feedback.unwrap_or(0.0);
        sum / 4.0 * 20.0
    }
}

#[derive(Debug, Clone)]
pub struct HistoricalPoint {
    pub date: Option<NaiveDate>,
    pub ratings: Ratings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: Uuid,
    pub recommendation_type: String,
    pub content: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
}

// ── Report values ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
            Level::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextMilestone {
    pub level: u32,
    /// 999 means not reachable at the current pace.
    pub estimated_weeks: u32,
    pub required_growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGrowth {
    pub current_level: f64,
    pub previous_level: f64,
    pub growth_rate: f64,
    pub consistency: f64,
    pub momentum: f64,
    pub trend: Trend,
    pub next_milestone: NextMilestone,
    pub strengths: Vec<String>,
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DimensionBreakdown {
    pub components: BTreeMap<String, f64>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionGrowth {
    #[serde(flatten)]
    pub growth: SkillGrowth,
    pub breakdown: DimensionBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "lowercase")]
pub enum Breakdown {
    Skills {
        skills: BTreeMap<Skill, SkillGrowth>,
    },
    Dimensions {
        dimensions: BTreeMap<Dimension, DimensionGrowth>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallGrowth {
    pub score: f64,
    pub trend: f64,
    pub level: Level,
    /// Heuristic placement, distinct from the cohort percentile in `comparisons`.
    pub percentile: u32,
    pub description: String,
    pub history: Vec<HistoryPoint>,
    pub components: Vec<ScoreComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    #[serde(rename = "projected3Months")]
    pub projected_3_months: f64,
    #[serde(rename = "projected6Months")]
    pub projected_6_months: f64,
    #[serde(rename = "confidenceInterval")]
    pub confidence_interval: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub description: String,
    pub achieved_date: Option<NaiveDate>,
    /// Upcoming rungs only, when reachable within the milestone horizon.
    pub estimated_completion: Option<DateTime<Utc>>,
    pub achieved: bool,
    pub progress: f64,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Milestones {
    pub achieved: Vec<Milestone>,
    pub upcoming: Vec<Milestone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Consistent,
    Accelerating,
    Plateau,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthPattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerComparison {
    pub percentile: f64,
    pub ranking: usize,
    pub total_peers: usize,
    pub above_average: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousComparison {
    pub improvement: f64,
    pub consistency_change: f64,
    pub momentum_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalComparison {
    pub target: f64,
    pub on_track: bool,
    pub progress_percentage: f64,
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparisons {
    pub to_peers: PeerComparison,
    pub to_previous: PreviousComparison,
    pub to_goals: GoalComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityPoint {
    pub week: String,
    pub velocity: f64,
    pub benchmark: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingAction {
    pub priority: Priority,
    pub track: String,
    pub action: String,
    pub timeline: String,
    pub measurable_goal: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthReport {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_level: StudentLevel,
    pub timeframe: Timeframe,
    pub generated_at: DateTime<Utc>,
    pub overall: OverallGrowth,
    pub breakdown: Breakdown,
    pub trajectory: Trajectory,
    pub milestones: Milestones,
    pub patterns: Vec<GrowthPattern>,
    pub comparisons: Comparisons,
    pub velocity: Vec<VelocityPoint>,
    pub coaching: Vec<CoachingAction>,
    pub recommendations: Vec<Recommendation>,
}
