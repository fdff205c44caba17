//! Error types for the growth analytics engine.
//!
//! Calculators never fail; only the data layer and configuration loading do.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum GrowthError {
    /// Postgres query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// CSV snapshot could not be read or decoded
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No student row for the requested identifier
    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),

    /// Attendance rating outside the 1-5 scale
    #[error("Invalid rating for {field}: {value} (expected 1-5)")]
    InvalidRating { field: &'static str, value: i32 },

    #[error("Unknown attendance status: {0}")]
    InvalidStatus(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GrowthError>;
