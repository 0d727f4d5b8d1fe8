use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::models::{AssessmentRecord, AttendanceRecord, Enrollment, Student};

/// Read-only view over the roster, attendance and assessment stores, taken
/// once per command. Every engine computation works off one of these.
#[derive(Debug, Default)]
pub struct Snapshot {
    students: BTreeMap<Uuid, Student>,
    courses: HashMap<Uuid, BTreeSet<String>>,
    attendance: HashMap<Uuid, Vec<AttendanceRecord>>,
    assessments: HashMap<(Uuid, String), AssessmentRecord>,
}

impl Snapshot {
    pub fn new(
        students: Vec<Student>,
        enrollments: Vec<Enrollment>,
        attendance: Vec<AttendanceRecord>,
        assessments: Vec<AssessmentRecord>,
    ) -> Self {
        let students = students
            .into_iter()
            .map(|student| (student.student_id, student))
            .collect();

        let mut courses: HashMap<Uuid, BTreeSet<String>> = HashMap::new();
        for enrollment in enrollments {
            courses
                .entry(enrollment.student_id)
                .or_default()
                .insert(enrollment.course_id);
        }

        let mut keyed: BTreeMap<(Uuid, String, NaiveDate), AttendanceRecord> = BTreeMap::new();
        for record in attendance {
            let key = (record.student_id, record.course_id.clone(), record.date);
            if let Some(previous) = keyed.insert(key, record) {
                warn!(
                    student_id = %previous.student_id,
                    course_id = %previous.course_id,
                    date = %previous.date,
                    "duplicate attendance record, keeping the later one"
                );
            }
        }

        let mut by_student: HashMap<Uuid, Vec<AttendanceRecord>> = HashMap::new();
        for record in keyed.into_values() {
            by_student.entry(record.student_id).or_default().push(record);
        }
        for history in by_student.values_mut() {
            history.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.course_id.cmp(&b.course_id)));
        }

        let assessments = assessments
            .into_iter()
            .map(|record| ((record.student_id, record.course_id.clone()), record))
            .collect();

        Self {
            students,
            courses,
            attendance: by_student,
            assessments,
        }
    }

    /// Roster in student id order.
    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    pub fn student(&self, student_id: Uuid) -> Option<&Student> {
        self.students.get(&student_id)
    }

    pub fn student_by_email(&self, email: &str) -> Option<&Student> {
        self.students
            .values()
            .find(|student| student.email.eq_ignore_ascii_case(email))
    }

    pub fn is_enrolled(&self, student_id: Uuid, course_id: &str) -> bool {
        self.courses
            .get(&student_id)
            .is_some_and(|courses| courses.contains(course_id))
    }

    /// Enrolled course codes, sorted.
    pub fn courses_for(&self, student_id: Uuid) -> impl Iterator<Item = &str> {
        self.courses
            .get(&student_id)
            .into_iter()
            .flat_map(|courses| courses.iter().map(String::as_str))
    }

    /// Full attendance history across every course, ordered by date.
    pub fn attendance_history(&self, student_id: Uuid) -> &[AttendanceRecord] {
        self.attendance
            .get(&student_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn course_attendance<'a>(
        &'a self,
        student_id: Uuid,
        course_id: &'a str,
    ) -> impl Iterator<Item = &'a AttendanceRecord> + 'a {
        self.attendance_history(student_id)
            .iter()
            .filter(move |record| record.course_id == course_id)
    }

    pub fn assessment(&self, student_id: Uuid, course_id: &str) -> Option<&AssessmentRecord> {
        self.assessments.get(&(student_id, course_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{day, student_id, SnapshotBuilder};
    use crate::models::AttendanceStatus;

    #[test]
    fn keeps_last_duplicate_attendance_record() {
        let snapshot = SnapshotBuilder::new()
            .student(1, "CSE", 2024)
            .enroll(1, "CS301")
            .attend(1, "CS301", day(1), AttendanceStatus::Absent)
            .attend(1, "CS301", day(1), AttendanceStatus::Present)
            .build();

        let history = snapshot.attendance_history(student_id(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AttendanceStatus::Present);
    }

    #[test]
    fn history_is_ordered_by_date() {
        let snapshot = SnapshotBuilder::new()
            .student(1, "CSE", 2024)
            .attend(1, "MA201", day(5), AttendanceStatus::Present)
            .attend(1, "CS301", day(2), AttendanceStatus::Present)
            .attend(1, "CS301", day(9), AttendanceStatus::Absent)
            .build();

        let dates: Vec<_> = snapshot
            .attendance_history(student_id(1))
            .iter()
            .map(|record| record.date)
            .collect();
        assert_eq!(dates, vec![day(2), day(5), day(9)]);
    }

    #[test]
    fn unknown_student_has_empty_views() {
        let snapshot = Snapshot::default();
        assert!(snapshot.attendance_history(student_id(7)).is_empty());
        assert_eq!(snapshot.courses_for(student_id(7)).count(), 0);
        assert!(!snapshot.is_enrolled(student_id(7), "CS301"));
    }
}
