use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{AssessmentRecord, AttendanceRecord, AttendanceStatus, Enrollment, Student};
use crate::snapshot::Snapshot;

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 50.0;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "21CS001",
            "Avery Lee",
            "avery.lee@college.edu",
            "CSE",
            2024,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "21CS014",
            "Jules Moreno",
            "jules.moreno@college.edu",
            "CSE",
            2024,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "20EC007",
            "Kiara Patel",
            "kiara.patel@college.edu",
            "ECE",
            2023,
        ),
    ];

    for (id, register_number, name, email, department, batch_year) in &students {
        upsert_student(pool, *id, register_number, name, email, department, *batch_year).await?;
    }

    let courses = ["CS301", "MA201"];
    for (id, ..) in &students {
        for course_id in courses {
            insert_enrollment(pool, *id, course_id).await?;
        }
    }

    let start = NaiveDate::from_ymd_opt(2026, 1, 5).context("invalid date")?;
    for (index, (id, ..)) in students.iter().enumerate() {
        for (day, date) in class_days(start, 30).into_iter().enumerate() {
            for course_id in courses {
                let status = seeded_status(index, day);
                insert_attendance(pool, *id, course_id, date, status).await?;
            }
        }
    }

    let marks = [
        ([Some(42.0), Some(38.5), None], [Some(45.0), Some(47.0), None]),
        ([Some(22.0), Some(27.0), None], [Some(30.0), None, None]),
        ([Some(10.0), None, None], [Some(40.0), Some(45.0), None]),
    ];
    for ((id, ..), (periodic, assignments)) in students.iter().zip(marks) {
        for course_id in courses {
            upsert_assessment(pool, *id, course_id, &periodic, &assignments).await?;
        }
    }

    Ok(())
}

/// Weekdays only, starting at `start`.
fn class_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut date = start;
    while days.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(date);
        }
        date += Duration::days(1);
    }
    days
}

fn seeded_status(student_index: usize, day: usize) -> AttendanceStatus {
    match student_index {
        0 => {
            if day % 10 == 9 {
                AttendanceStatus::OnDuty
            } else {
                AttendanceStatus::Present
            }
        }
        1 => {
            if day % 4 == 3 {
                AttendanceStatus::Absent
            } else {
                AttendanceStatus::Present
            }
        }
        _ => {
            if day % 2 == 0 {
                AttendanceStatus::Absent
            } else {
                AttendanceStatus::Present
            }
        }
    }
}

async fn upsert_student(
    pool: &PgPool,
    id: Uuid,
    register_number: &str,
    full_name: &str,
    email: &str,
    department: &str,
    batch_year: i32,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_engine.students
        (id, register_number, full_name, email, department, batch_year)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE
        SET register_number = EXCLUDED.register_number,
            full_name = EXCLUDED.full_name,
            department = EXCLUDED.department,
            batch_year = EXCLUDED.batch_year
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(register_number)
    .bind(full_name)
    .bind(email)
    .bind(department)
    .bind(batch_year)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn insert_enrollment(pool: &PgPool, student_id: Uuid, course_id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO academic_engine.enrollments (student_id, course_id)
        VALUES ($1, $2)
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Attendance is immutable once marked, so a repeat import leaves the
/// existing row alone.
async fn insert_attendance(
    pool: &PgPool,
    student_id: Uuid,
    course_id: &str,
    date: NaiveDate,
    status: AttendanceStatus,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO academic_engine.attendance (student_id, course_id, class_date, status)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (student_id, course_id, class_date) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(date)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn upsert_assessment(
    pool: &PgPool,
    student_id: Uuid,
    course_id: &str,
    periodic: &[Option<f64>; 3],
    assignments: &[Option<f64>; 3],
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO academic_engine.assessments
        (student_id, course_id, periodic_1, periodic_2, periodic_3,
         assignment_1, assignment_2, assignment_3)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (student_id, course_id) DO UPDATE
        SET periodic_1 = EXCLUDED.periodic_1,
            periodic_2 = EXCLUDED.periodic_2,
            periodic_3 = EXCLUDED.periodic_3,
            assignment_1 = EXCLUDED.assignment_1,
            assignment_2 = EXCLUDED.assignment_2,
            assignment_3 = EXCLUDED.assignment_3,
            updated_at = now()
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(periodic[0])
    .bind(periodic[1])
    .bind(periodic[2])
    .bind(assignments[0])
    .bind(assignments[1])
    .bind(assignments[2])
    .execute(pool)
    .await?;
    Ok(())
}

async fn student_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM academic_engine.students WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no student with email {email}; import the roster first"))?;
    Ok(row.get("id"))
}

#[derive(Debug, serde::Deserialize)]
struct RosterRow {
    register_number: String,
    full_name: String,
    email: String,
    department: String,
    batch_year: i32,
}

#[derive(Debug, serde::Deserialize)]
struct EnrollmentRow {
    email: String,
    course_id: String,
}

#[derive(Debug, serde::Deserialize)]
struct AttendanceRow {
    email: String,
    course_id: String,
    date: NaiveDate,
    status: String,
}

#[derive(Debug, serde::Deserialize)]
struct AssessmentRow {
    email: String,
    course_id: String,
    periodic_1: Option<f64>,
    periodic_2: Option<f64>,
    periodic_3: Option<f64>,
    assignment_1: Option<f64>,
    assignment_2: Option<f64>,
    assignment_3: Option<f64>,
}

impl AssessmentRow {
    fn scores(&self) -> Result<([Option<f64>; 3], [Option<f64>; 3]), EngineError> {
        Ok((
            [
                validate_score(self.periodic_1)?,
                validate_score(self.periodic_2)?,
                validate_score(self.periodic_3)?,
            ],
            [
                validate_score(self.assignment_1)?,
                validate_score(self.assignment_2)?,
                validate_score(self.assignment_3)?,
            ],
        ))
    }
}

/// Range check applied at the import boundary; the engine trusts what is stored.
pub fn validate_score(score: Option<f64>) -> Result<Option<f64>, EngineError> {
    match score {
        Some(value) if !(SCORE_MIN..=SCORE_MAX).contains(&value) => {
            Err(EngineError::InvalidScore { value })
        }
        _ => Ok(score),
    }
}

pub async fn import_roster(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for result in reader.deserialize::<RosterRow>() {
        let row = result?;
        upsert_student(
            pool,
            Uuid::new_v4(),
            &row.register_number,
            &row.full_name,
            &row.email,
            &row.department,
            row.batch_year,
        )
        .await?;
        imported += 1;
    }

    Ok(imported)
}

pub async fn import_enrollments(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<EnrollmentRow>() {
        let row = result?;
        let student_id = student_id_by_email(pool, &row.email).await?;
        if insert_enrollment(pool, student_id, &row.course_id).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_attendance(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<AttendanceRow>().enumerate() {
        let row = result?;
        let status: AttendanceStatus = row
            .status
            .parse()
            .with_context(|| format!("row {} of {}", line + 1, csv_path.display()))?;
        let student_id = student_id_by_email(pool, &row.email).await?;
        if insert_attendance(pool, student_id, &row.course_id, row.date, status).await? {
            inserted += 1;
        } else {
            warn!(
                email = %row.email,
                course_id = %row.course_id,
                date = %row.date,
                "attendance already marked, keeping the existing record"
            );
        }
    }

    Ok(inserted)
}

pub async fn import_assessments(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for (line, result) in reader.deserialize::<AssessmentRow>().enumerate() {
        let row = result?;
        let (periodic, assignments) = row
            .scores()
            .with_context(|| format!("row {} of {}", line + 1, csv_path.display()))?;
        let student_id = student_id_by_email(pool, &row.email).await?;
        upsert_assessment(pool, student_id, &row.course_id, &periodic, &assignments).await?;
        imported += 1;
    }

    Ok(imported)
}

pub async fn fetch_snapshot(pool: &PgPool) -> anyhow::Result<Snapshot> {
    let students = sqlx::query(
        "SELECT id, register_number, full_name, email, department, batch_year \
         FROM academic_engine.students",
    )
    .fetch_all(pool)
    .await
    .context("failed to load roster")?
    .into_iter()
    .map(|row| Student {
        student_id: row.get("id"),
        register_number: row.get("register_number"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        department: row.get("department"),
        batch_year: row.get("batch_year"),
    })
    .collect::<Vec<_>>();

    let enrollments = sqlx::query("SELECT student_id, course_id FROM academic_engine.enrollments")
        .fetch_all(pool)
        .await
        .context("failed to load enrollments")?
        .into_iter()
        .map(|row| Enrollment {
            student_id: row.get("student_id"),
            course_id: row.get("course_id"),
        })
        .collect::<Vec<_>>();

    let mut attendance = Vec::new();
    for row in sqlx::query(
        "SELECT student_id, course_id, class_date, status FROM academic_engine.attendance",
    )
    .fetch_all(pool)
    .await
    .context("failed to load attendance")?
    {
        let status: String = row.get("status");
        attendance.push(AttendanceRecord {
            student_id: row.get("student_id"),
            course_id: row.get("course_id"),
            date: row.get("class_date"),
            status: status.parse()?,
        });
    }

    let assessments = sqlx::query(
        "SELECT student_id, course_id, periodic_1, periodic_2, periodic_3, \
         assignment_1, assignment_2, assignment_3 FROM academic_engine.assessments",
    )
    .fetch_all(pool)
    .await
    .context("failed to load assessments")?
    .into_iter()
    .map(|row| AssessmentRecord {
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        periodic_scores: [row.get("periodic_1"), row.get("periodic_2"), row.get("periodic_3")],
        assignment_scores: [
            row.get("assignment_1"),
            row.get("assignment_2"),
            row.get("assignment_3"),
        ],
    })
    .collect::<Vec<_>>();

    info!(
        students = students.len(),
        enrollments = enrollments.len(),
        attendance = attendance.len(),
        assessments = assessments.len(),
        "loaded snapshot"
    );

    Ok(Snapshot::new(students, enrollments, attendance, assessments))
}
