use std::cmp::Ordering;

use crate::models::{LeaderboardEntry, ProgressionProfile};

/// Ranks are 1..=n with no shared positions: xp, then attendance, then
/// student id settle every tie.
pub fn build(mut profiles: Vec<ProgressionProfile>) -> Vec<LeaderboardEntry> {
    profiles.sort_by(compare);
    profiles
        .into_iter()
        .enumerate()
        .map(|(index, profile)| LeaderboardEntry {
            rank: index + 1,
            student_id: profile.student_id,
            xp: profile.xp,
            level: profile.level,
            attendance_pct: profile.attendance_pct,
        })
        .collect()
}

fn compare(a: &ProgressionProfile, b: &ProgressionProfile) -> Ordering {
    b.xp
        .cmp(&a.xp)
        .then_with(|| compare_attendance(b.attendance_pct, a.attendance_pct))
        .then_with(|| a.student_id.cmp(&b.student_id))
}

/// A student with no records sorts below any recorded percentage.
fn compare_attendance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
