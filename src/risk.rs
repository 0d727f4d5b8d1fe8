use rayon::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate;
use crate::error::EngineError;
use crate::models::{CourseAggregate, RiskFactors, RiskLevel, RiskProfile, Student};
use crate::snapshot::Snapshot;

pub const ATTENDANCE_RISK_MAX: f64 = 40.0;
pub const MARKS_RISK_MAX: f64 = 40.0;
pub const ASSIGNMENT_RISK_MAX: f64 = 20.0;

/// Attendance at or above this percentage carries no risk.
pub const ATTENDANCE_SAFE_PCT: f64 = 75.0;
/// Pass line for periodic tests and assignments, out of 50.
pub const PASS_MARK: f64 = 25.0;

#[derive(Debug, Clone, Default)]
pub struct CohortRisk {
    pub profiles: Vec<RiskProfile>,
    /// Students with no enrolled courses, left out of the ranking.
    pub skipped: Vec<Uuid>,
}

pub fn score_student(
    student_id: Uuid,
    aggregates: &[CourseAggregate],
) -> Result<RiskProfile, EngineError> {
    if aggregates.is_empty() {
        return Err(EngineError::NoData { student_id });
    }

    let factors = RiskFactors {
        attendance_risk: attendance_risk(aggregates),
        marks_risk: marks_risk(aggregates),
        assignment_risk: assignment_risk(aggregates),
    };
    let total = u16::from(factors.attendance_risk)
        + u16::from(factors.marks_risk)
        + u16::from(factors.assignment_risk);
    let risk_score = total.min(100) as u8;

    Ok(RiskProfile {
        student_id,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        factors,
    })
}

/// Driven by the worst course, not the average.
pub fn attendance_risk(aggregates: &[CourseAggregate]) -> u8 {
    aggregates
        .iter()
        .filter_map(|aggregate| aggregate.attendance_pct)
        .min_by(f64::total_cmp)
        .map(|worst| linear_risk(worst, ATTENDANCE_SAFE_PCT, ATTENDANCE_RISK_MAX))
        .unwrap_or(0)
}

pub fn marks_risk(aggregates: &[CourseAggregate]) -> u8 {
    course_mean(aggregates.iter().map(|aggregate| aggregate.avg_periodic))
        .map(|avg| linear_risk(avg, PASS_MARK, MARKS_RISK_MAX))
        .unwrap_or(0)
}

pub fn assignment_risk(aggregates: &[CourseAggregate]) -> u8 {
    course_mean(aggregates.iter().map(|aggregate| aggregate.avg_assignment))
        .map(|avg| linear_risk(avg, PASS_MARK, ASSIGNMENT_RISK_MAX))
        .unwrap_or(0)
}

fn course_mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let graded: Vec<f64> = values.flatten().collect();
    if graded.is_empty() {
        None
    } else {
        Some(graded.iter().sum::<f64>() / graded.len() as f64)
    }
}

/// `ceiling` at zero, falling linearly to 0 at `safe_at`, truncated.
fn linear_risk(value: f64, safe_at: f64, ceiling: f64) -> u8 {
    if value >= safe_at {
        return 0;
    }
    let risk = ceiling * (safe_at - value) / safe_at;
    risk.clamp(0.0, ceiling).trunc() as u8
}

/// Scores every student in parallel, then ranks highest risk first.
pub fn score_cohort(snapshot: &Snapshot, students: &[&Student]) -> CohortRisk {
    let results: Vec<Result<RiskProfile, EngineError>> = students
        .par_iter()
        .map(|student| {
            let aggregates = aggregate::aggregate_student(snapshot, student.student_id);
            score_student(student.student_id, &aggregates)
        })
        .collect();

    let mut cohort = CohortRisk::default();
    for result in results {
        match result {
            Ok(profile) => cohort.profiles.push(profile),
            Err(EngineError::NoData { student_id }) => {
                debug!(%student_id, "no enrolled courses, excluded from risk ranking");
                cohort.skipped.push(student_id);
            }
            Err(err) => debug!(error = %err, "risk scoring skipped a student"),
        }
    }

    cohort.profiles.sort_by(|a, b| {
        b.risk_score
            .cmp(&a.risk_score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    cohort.skipped.sort();
    cohort
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{student_id, SnapshotBuilder};

    fn course(attendance_pct: Option<f64>, periodic: Option<f64>, assignment: Option<f64>) -> CourseAggregate {
        CourseAggregate {
            student_id: student_id(1),
            course_id: "CS301".to_string(),
            attendance_pct,
            avg_periodic: periodic,
            avg_assignment: assignment,
            present_count: 0,
            total_count: if attendance_pct.is_some() { 10 } else { 0 },
            internal_total: None,
        }
    }

    #[test]
    fn healthy_student_scores_zero() {
        let aggregates = vec![
            course(Some(75.0), Some(25.0), Some(25.0)),
            course(Some(98.0), Some(48.0), Some(40.0)),
        ];
        let profile = score_student(student_id(1), &aggregates).unwrap();
        assert_eq!(profile.risk_score, 0);
        assert_eq!(profile.risk_level, RiskLevel::Low);
    }

    #[test]
    fn absent_everywhere_without_marks_scores_attendance_only() {
        let aggregates = vec![course(Some(0.0), None, None), course(Some(0.0), None, None)];
        let profile = score_student(student_id(1), &aggregates).unwrap();
        assert_eq!(profile.factors.attendance_risk, 40);
        assert_eq!(profile.factors.marks_risk, 0);
        assert_eq!(profile.factors.assignment_risk, 0);
        assert_eq!(profile.risk_score, 40);
        // 40 falls in the 25..50 band.
        assert_eq!(profile.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn worst_course_drives_attendance_risk() {
        let aggregates = vec![
            course(Some(100.0), None, None),
            course(Some(30.0), None, None),
            course(None, None, None),
        ];
        // 40 * (75 - 30) / 75 = 24
        assert_eq!(attendance_risk(&aggregates), 24);
    }

    #[test]
    fn courses_without_classes_do_not_count_as_zero_attendance() {
        let aggregates = vec![course(None, None, None), course(Some(80.0), None, None)];
        assert_eq!(attendance_risk(&aggregates), 0);
    }

    #[test]
    fn sparse_marks_follow_linear_mapping() {
        // periodic [10, -, -], assignments [40, 45, -]
        let aggregates = vec![course(Some(90.0), Some(10.0), Some(42.5))];
        let profile = score_student(student_id(1), &aggregates).unwrap();
        // 40 * (25 - 10) / 25 = 24
        assert_eq!(profile.factors.marks_risk, 24);
        assert_eq!(profile.factors.assignment_risk, 0);
    }

    #[test]
    fn marks_average_excludes_ungraded_courses() {
        let aggregates = vec![
            course(None, Some(20.0), None),
            course(None, None, Some(5.0)),
            course(None, Some(10.0), Some(15.0)),
        ];
        // periodic mean 15 -> 40 * 10 / 25 = 16; assignment mean 10 -> 20 * 15 / 25 = 12
        assert_eq!(marks_risk(&aggregates), 16);
        assert_eq!(assignment_risk(&aggregates), 12);
    }

    #[test]
    fn fractional_risk_truncates() {
        // 40 * (75 - 74) / 75 = 0.53
        assert_eq!(attendance_risk(&[course(Some(74.0), None, None)]), 0);
        // 40 * (75 - 60) / 75 = 8
        assert_eq!(attendance_risk(&[course(Some(60.0), None, None)]), 8);
        // 20 * (25 - 24) / 25 = 0.8
        assert_eq!(assignment_risk(&[course(None, None, Some(24.0))]), 0);
    }

    #[test]
    fn factors_never_exceed_ceilings() {
        let worst = vec![course(Some(0.0), Some(0.0), Some(0.0))];
        let profile = score_student(student_id(1), &worst).unwrap();
        assert_eq!(profile.factors.attendance_risk, 40);
        assert_eq!(profile.factors.marks_risk, 40);
        assert_eq!(profile.factors.assignment_risk, 20);
        assert_eq!(profile.risk_score, 100);
        assert_eq!(profile.risk_level, RiskLevel::Critical);

        for pct in [0.0, 12.5, 50.0, 74.9, 100.0] {
            for mark in [0.0, 3.3, 24.9, 25.0, 50.0] {
                let profile =
                    score_student(student_id(1), &[course(Some(pct), Some(mark), Some(mark))]).unwrap();
                assert!(profile.factors.attendance_risk <= 40);
                assert!(profile.factors.marks_risk <= 40);
                assert!(profile.factors.assignment_risk <= 20);
                assert!(profile.risk_score <= 100);
            }
        }
    }

    #[test]
    fn no_courses_is_no_data() {
        let err = score_student(student_id(3), &[]).unwrap_err();
        assert_eq!(err, EngineError::NoData { student_id: student_id(3) });
    }

    #[test]
    fn scoring_is_repeatable() {
        let aggregates = vec![course(Some(61.0), Some(17.5), Some(22.0))];
        let first = score_student(student_id(1), &aggregates).unwrap();
        let second = score_student(student_id(1), &aggregates).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn cohort_skips_unenrolled_students_and_ranks_by_risk() {
        let snapshot = SnapshotBuilder::new()
            .student(1, "CSE", 2024)
            .student(2, "CSE", 2024)
            .student(3, "CSE", 2024)
            .enroll(1, "CS301")
            .enroll(2, "CS301")
            .attendance_run(1, "CS301", 9, 1)
            .attendance_run(2, "CS301", 3, 7)
            .build();
        let students: Vec<_> = snapshot.students().collect();

        let cohort = score_cohort(&snapshot, &students);
        let ranked: Vec<_> = cohort.profiles.iter().map(|p| p.student_id).collect();
        assert_eq!(ranked, vec![student_id(2), student_id(1)]);
        assert_eq!(cohort.skipped, vec![student_id(3)]);
    }
}
