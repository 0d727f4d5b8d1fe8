use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    OnDuty,
}

impl AttendanceStatus {
    /// Present and on-duty both count as an attended class.
    pub fn is_attended(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::OnDuty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::OnDuty => "on_duty",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => Ok(AttendanceStatus::Present),
            "absent" | "a" => Ok(AttendanceStatus::Absent),
            "on_duty" | "on-duty" | "od" => Ok(AttendanceStatus::OnDuty),
            _ => Err(EngineError::UnknownStatus(value.to_string())),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub student_id: Uuid,
    pub register_number: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub batch_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Enrollment {
    pub student_id: Uuid,
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub course_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Up to three periodic tests and three assignments, each out of 50.
/// `None` means the slot has not been graded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRecord {
    pub student_id: Uuid,
    pub course_id: String,
    pub periodic_scores: [Option<f64>; 3],
    pub assignment_scores: [Option<f64>; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseAggregate {
    pub student_id: Uuid,
    pub course_id: String,
    pub attendance_pct: Option<f64>,
    pub avg_periodic: Option<f64>,
    pub avg_assignment: Option<f64>,
    pub present_count: u32,
    pub total_count: u32,
    pub internal_total: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            70.. => RiskLevel::Critical,
            50..=69 => RiskLevel::High,
            25..=49 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskFactors {
    pub attendance_risk: u8,
    pub marks_risk: u8,
    pub assignment_risk: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskProfile {
    pub student_id: Uuid,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub factors: RiskFactors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    #[serde(rename = "streak_7")]
    WeekStreak,
    #[serde(rename = "streak_30")]
    MonthStreak,
    #[serde(rename = "attendance_95")]
    AttendanceStar,
    #[serde(rename = "classes_100")]
    Centurion,
}

impl Badge {
    pub const ALL: [Badge; 4] = [
        Badge::WeekStreak,
        Badge::MonthStreak,
        Badge::AttendanceStar,
        Badge::Centurion,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Badge::WeekStreak => "streak_7",
            Badge::MonthStreak => "streak_30",
            Badge::AttendanceStar => "attendance_95",
            Badge::Centurion => "classes_100",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Badge::WeekStreak => "7-Day Streak",
            Badge::MonthStreak => "30-Day Streak",
            Badge::AttendanceStar => "Attendance Star",
            Badge::Centurion => "100 Classes Attended",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionProfile {
    pub student_id: Uuid,
    pub xp: u32,
    pub level: u32,
    pub level_progress_pct: u8,
    pub streak: u32,
    pub max_streak: u32,
    pub classes_attended: u32,
    pub attendance_pct: Option<f64>,
    pub badges: BTreeSet<Badge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub student_id: Uuid,
    pub xp: u32,
    pub level: u32,
    pub attendance_pct: Option<f64>,
}
