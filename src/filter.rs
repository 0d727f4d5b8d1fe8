use crate::models::Student;
use crate::snapshot::Snapshot;

/// Narrows the roster before any scoring runs. Unset fields match everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortFilter {
    pub department: Option<String>,
    pub batch_year: Option<i32>,
    pub course_id: Option<String>,
}

impl CohortFilter {
    pub fn matches(&self, snapshot: &Snapshot, student: &Student) -> bool {
        let department = self
            .department
            .as_deref()
            .map_or(true, |department| student.department.eq_ignore_ascii_case(department));
        let batch_year = self.batch_year.map_or(true, |year| student.batch_year == year);
        let course = self
            .course_id
            .as_deref()
            .map_or(true, |course_id| snapshot.is_enrolled(student.student_id, course_id));

        department && batch_year && course
    }

    /// Matching students in student id order.
    pub fn apply<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a Student> {
        snapshot
            .students()
            .filter(|student| self.matches(snapshot, student))
            .collect()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(department) = &self.department {
            parts.push(format!("department {department}"));
        }
        if let Some(year) = self.batch_year {
            parts.push(format!("batch {year}"));
        }
        if let Some(course_id) = &self.course_id {
            parts.push(format!("course {course_id}"));
        }

        if parts.is_empty() {
            "all students".to_string()
        } else {
            parts.join(", ")
        }
    }
}
