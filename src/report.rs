use std::collections::BTreeMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::alerts::{self, Alert};
use crate::models::{LeaderboardEntry, RiskLevel, RiskProfile};
use crate::risk::CohortRisk;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskBandSummary {
    pub level: RiskLevel,
    pub count: usize,
}

/// Every band appears, most severe first, even when empty.
pub fn summarize_by_level(profiles: &[RiskProfile]) -> Vec<RiskBandSummary> {
    let mut counts: BTreeMap<RiskLevel, usize> = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ]
    .into_iter()
    .map(|level| (level, 0))
    .collect();

    for profile in profiles {
        *counts.entry(profile.risk_level).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .rev()
        .map(|(level, count)| RiskBandSummary { level, count })
        .collect()
}

fn display_name(snapshot: &Snapshot, student_id: Uuid) -> String {
    match snapshot.student(student_id) {
        Some(student) => format!(
            "{} ({}, {} {})",
            student.full_name, student.register_number, student.department, student.batch_year
        ),
        None => student_id.to_string(),
    }
}

pub fn build_report(
    snapshot: &Snapshot,
    scope: &str,
    risk: &CohortRisk,
    leaderboard: &[LeaderboardEntry],
    alert_list: &[Alert],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Risk & Progression Report");
    let _ = writeln!(output, "Generated for {scope}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Bands");

    if risk.profiles.is_empty() {
        let _ = writeln!(output, "No students with enrolled courses in this scope.");
    } else {
        for summary in summarize_by_level(&risk.profiles) {
            let _ = writeln!(output, "- {}: {} students", summary.level, summary.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    let flagged: Vec<_> = risk
        .profiles
        .iter()
        .filter(|profile| profile.risk_level != RiskLevel::Low)
        .take(10)
        .collect();
    if flagged.is_empty() {
        let _ = writeln!(output, "No students above low risk.");
    } else {
        for profile in flagged {
            let _ = writeln!(
                output,
                "- {} score {} ({}): attendance {}, marks {}, assignments {}",
                display_name(snapshot, profile.student_id),
                profile.risk_score,
                profile.risk_level,
                profile.factors.attendance_risk,
                profile.factors.marks_risk,
                profile.factors.assignment_risk
            );
        }
    }

    if !risk.skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Insufficient Data");
        for student_id in &risk.skipped {
            let _ = writeln!(
                output,
                "- {}: no enrolled courses",
                display_name(snapshot, *student_id)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Leaderboard");

    if leaderboard.is_empty() {
        let _ = writeln!(output, "No students in this scope.");
    } else {
        for entry in leaderboard.iter().take(10) {
            let attendance = entry
                .attendance_pct
                .map_or_else(|| "no classes yet".to_string(), |pct| format!("{pct:.0}% attendance"));
            let _ = writeln!(
                output,
                "{}. {} {} xp, level {}, {}",
                entry.rank,
                display_name(snapshot, entry.student_id),
                entry.xp,
                entry.level,
                attendance
            );
        }
    }

    let counts = alerts::count(alert_list);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    let _ = writeln!(output, "- low attendance: {}", counts.low_attendance);
    let _ = writeln!(output, "- low periodic test: {}", counts.low_periodic);
    let _ = writeln!(output, "- low internal mark: {}", counts.low_internal);

    output
}
