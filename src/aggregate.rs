use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{AssessmentRecord, AttendanceRecord, CourseAggregate};
use crate::snapshot::Snapshot;

const PERIODIC_WEIGHT: f64 = 0.7;
const ASSIGNMENT_WEIGHT: f64 = 0.3;
const SCORE_MAX: f64 = 50.0;
const INTERNAL_MAX: f64 = 40.0;

pub fn aggregate_course(
    snapshot: &Snapshot,
    student_id: Uuid,
    course_id: &str,
) -> Result<CourseAggregate, EngineError> {
    if !snapshot.is_enrolled(student_id, course_id) {
        return Err(EngineError::NotEnrolled {
            student_id,
            course_id: course_id.to_string(),
        });
    }

    Ok(reduce(
        student_id,
        course_id,
        snapshot.course_attendance(student_id, course_id),
        snapshot.assessment(student_id, course_id),
    ))
}

/// One aggregate per enrolled course, in course code order.
pub fn aggregate_student(snapshot: &Snapshot, student_id: Uuid) -> Vec<CourseAggregate> {
    snapshot
        .courses_for(student_id)
        .map(|course_id| {
            reduce(
                student_id,
                course_id,
                snapshot.course_attendance(student_id, course_id),
                snapshot.assessment(student_id, course_id),
            )
        })
        .collect()
}

pub fn reduce<'a>(
    student_id: Uuid,
    course_id: &str,
    attendance: impl IntoIterator<Item = &'a AttendanceRecord>,
    assessment: Option<&AssessmentRecord>,
) -> CourseAggregate {
    let mut present_count = 0u32;
    let mut total_count = 0u32;
    for record in attendance {
        total_count += 1;
        if record.status.is_attended() {
            present_count += 1;
        }
    }

    let avg_periodic = assessment.and_then(|record| mean(&record.periodic_scores));
    let avg_assignment = assessment.and_then(|record| mean(&record.assignment_scores));

    CourseAggregate {
        student_id,
        course_id: course_id.to_string(),
        attendance_pct: attendance_pct(present_count, total_count),
        avg_periodic,
        avg_assignment,
        present_count,
        total_count,
        internal_total: internal_total(avg_periodic, avg_assignment),
    }
}

/// `None` when no classes have been held, so an empty course never reads as 0%.
pub fn attendance_pct(present: u32, total: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((f64::from(present) / f64::from(total) * 100.0).round())
}

pub fn mean(slots: &[Option<f64>]) -> Option<f64> {
    let graded: Vec<f64> = slots.iter().flatten().copied().collect();
    if graded.is_empty() {
        None
    } else {
        Some(graded.iter().sum::<f64>() / graded.len() as f64)
    }
}

/// Internal mark out of 40: periodic tests weigh 70%, assignments 30%.
/// A side with nothing graded counts as zero; nothing graded at all is `None`.
pub fn internal_total(avg_periodic: Option<f64>, avg_assignment: Option<f64>) -> Option<f64> {
    if avg_periodic.is_none() && avg_assignment.is_none() {
        return None;
    }
    let weighted = avg_periodic.unwrap_or(0.0) * PERIODIC_WEIGHT
        + avg_assignment.unwrap_or(0.0) * ASSIGNMENT_WEIGHT;
    Some((weighted / SCORE_MAX * INTERNAL_MAX * 100.0).round() / 100.0)
}
