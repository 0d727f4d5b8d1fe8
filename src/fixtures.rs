//! Builders shared by the unit tests.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{AssessmentRecord, AttendanceRecord, AttendanceStatus, Enrollment, Student};
use crate::snapshot::Snapshot;

pub fn student_id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Day `n` of September 2025; tests only care about ordering and gaps.
pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 1).unwrap() + chrono::Duration::days(i64::from(n))
}

pub fn record(student: u128, course: &str, date: NaiveDate, status: AttendanceStatus) -> AttendanceRecord {
    AttendanceRecord {
        student_id: student_id(student),
        course_id: course.to_string(),
        date,
        status,
    }
}

#[derive(Default)]
pub struct SnapshotBuilder {
    students: Vec<Student>,
    enrollments: Vec<Enrollment>,
    attendance: Vec<AttendanceRecord>,
    assessments: Vec<AssessmentRecord>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn student(mut self, n: u128, department: &str, batch_year: i32) -> Self {
        self.students.push(Student {
            student_id: student_id(n),
            register_number: format!("REG{n:04}"),
            full_name: format!("Student {n}"),
            email: format!("student{n}@college.edu"),
            department: department.to_string(),
            batch_year,
        });
        self
    }

    pub fn enroll(mut self, n: u128, course: &str) -> Self {
        self.enrollments.push(Enrollment {
            student_id: student_id(n),
            course_id: course.to_string(),
        });
        self
    }

    pub fn attend(mut self, n: u128, course: &str, date: NaiveDate, status: AttendanceStatus) -> Self {
        self.attendance.push(record(n, course, date, status));
        self
    }

    /// `present` attended classes followed by `absent` missed ones, one per day.
    pub fn attendance_run(mut self, n: u128, course: &str, present: u32, absent: u32) -> Self {
        for offset in 0..present {
            self.attendance
                .push(record(n, course, day(offset), AttendanceStatus::Present));
        }
        for offset in present..present + absent {
            self.attendance
                .push(record(n, course, day(offset), AttendanceStatus::Absent));
        }
        self
    }

    pub fn marks(
        mut self,
        n: u128,
        course: &str,
        periodic: [Option<f64>; 3],
        assignments: [Option<f64>; 3],
    ) -> Self {
        self.assessments.push(AssessmentRecord {
            student_id: student_id(n),
            course_id: course.to_string(),
            periodic_scores: periodic,
            assignment_scores: assignments,
        });
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot::new(self.students, self.enrollments, self.attendance, self.assessments)
    }
}
