use thiserror::Error;
use uuid::Uuid;

/// Per-student conditions raised by the engine. None of these abort a
/// cohort run; callers exclude the student and carry on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("student {student_id} is not enrolled in course {course_id}")]
    NotEnrolled { student_id: Uuid, course_id: String },

    #[error("student {student_id} has no enrolled courses")]
    NoData { student_id: Uuid },

    #[error("score {value} is outside the 0-50 range")]
    InvalidScore { value: f64 },

    #[error("unknown attendance status: {0}")]
    UnknownStatus(String),
}
