use rayon::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate;
use crate::models::{AssessmentRecord, CourseAggregate, Student};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub attendance_pct: f64,
    pub periodic_score: f64,
    pub internal_total: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            attendance_pct: 75.0,
            periodic_score: 25.0,
            internal_total: 23.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    LowAttendance { attendance_pct: f64, present: u32, total: u32 },
    /// `test` is 1-based.
    LowPeriodic { test: usize, score: f64 },
    LowInternal { internal_total: f64 },
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::LowAttendance { .. } => "low_attendance",
            AlertKind::LowPeriodic { .. } => "low_periodic",
            AlertKind::LowInternal { .. } => "low_internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub student_id: Uuid,
    pub course_id: String,
    #[serde(flatten)]
    pub kind: AlertKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub low_attendance: usize,
    pub low_periodic: usize,
    pub low_internal: usize,
}

pub fn course_alerts(
    aggregate: &CourseAggregate,
    assessment: Option<&AssessmentRecord>,
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut kinds = Vec::new();

    if let Some(pct) = aggregate.attendance_pct {
        if pct < thresholds.attendance_pct {
            kinds.push(AlertKind::LowAttendance {
                attendance_pct: pct,
                present: aggregate.present_count,
                total: aggregate.total_count,
            });
        }
    }

    if let Some(record) = assessment {
        for (slot, score) in record.periodic_scores.iter().enumerate() {
            if let Some(score) = *score {
                if score < thresholds.periodic_score {
                    kinds.push(AlertKind::LowPeriodic { test: slot + 1, score });
                }
            }
        }
    }

    if let Some(internal) = aggregate.internal_total {
        if internal < thresholds.internal_total {
            kinds.push(AlertKind::LowInternal {
                internal_total: internal,
            });
        }
    }

    kinds
        .into_iter()
        .map(|kind| Alert {
            student_id: aggregate.student_id,
            course_id: aggregate.course_id.clone(),
            kind,
        })
        .collect()
}

/// Alerts for every enrolled course of each student, grouped by student
/// then course code.
pub fn cohort_alerts(
    snapshot: &Snapshot,
    students: &[&Student],
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let per_student: Vec<Vec<Alert>> = students
        .par_iter()
        .map(|student| {
            aggregate::aggregate_student(snapshot, student.student_id)
                .iter()
                .flat_map(|course| {
                    let assessment = snapshot.assessment(course.student_id, &course.course_id);
                    course_alerts(course, assessment, thresholds)
                })
                .collect()
        })
        .collect();

    let mut alerts: Vec<Alert> = per_student.into_iter().flatten().collect();
    alerts.sort_by(|a, b| {
        a.student_id
            .cmp(&b.student_id)
            .then_with(|| a.course_id.cmp(&b.course_id))
    });
    alerts
}

pub fn count(alerts: &[Alert]) -> AlertCounts {
    let mut counts = AlertCounts::default();
    for alert in alerts {
        match alert.kind {
            AlertKind::LowAttendance { .. } => counts.low_attendance += 1,
            AlertKind::LowPeriodic { .. } => counts.low_periodic += 1,
            AlertKind::LowInternal { .. } => counts.low_internal += 1,
        }
    }
    counts
}
