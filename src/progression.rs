use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rayon::prelude::*;
use uuid::Uuid;

use crate::aggregate;
use crate::models::{AttendanceRecord, AttendanceStatus, Badge, ProgressionProfile, Student};
use crate::snapshot::Snapshot;

pub const XP_PER_PRESENT: u32 = 10;
pub const XP_PER_ON_DUTY: u32 = 5;
pub const XP_PER_LEVEL: u32 = 200;

/// Everything the badge predicates look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeStats {
    pub max_streak: u32,
    pub classes_attended: u32,
    pub attendance_pct: Option<f64>,
}

impl Badge {
    pub fn earned(self, stats: &BadgeStats) -> bool {
        match self {
            Badge::WeekStreak => stats.max_streak >= 7,
            Badge::MonthStreak => stats.max_streak >= 30,
            Badge::AttendanceStar => stats.attendance_pct.is_some_and(|pct| pct >= 95.0),
            Badge::Centurion => stats.classes_attended >= 100,
        }
    }
}

/// Replays the whole history every time; nothing is carried over between calls.
pub fn progression(student_id: Uuid, history: &[AttendanceRecord]) -> ProgressionProfile {
    let xp = experience(history);
    let (streak, max_streak) = streaks(history);
    let classes_attended = history
        .iter()
        .filter(|record| record.status.is_attended())
        .count() as u32;
    let attendance_pct = aggregate::attendance_pct(classes_attended, history.len() as u32);

    let stats = BadgeStats {
        max_streak,
        classes_attended,
        attendance_pct,
    };

    ProgressionProfile {
        student_id,
        xp,
        level: level_for(xp),
        level_progress_pct: level_progress_pct(xp),
        streak,
        max_streak,
        classes_attended,
        attendance_pct,
        badges: badges(&stats),
    }
}

pub fn experience(history: &[AttendanceRecord]) -> u32 {
    history
        .iter()
        .map(|record| match record.status {
            AttendanceStatus::Present => XP_PER_PRESENT,
            AttendanceStatus::OnDuty => XP_PER_ON_DUTY,
            AttendanceStatus::Absent => 0,
        })
        .sum()
}

pub fn level_for(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

pub fn level_progress_pct(xp: u32) -> u8 {
    ((xp % XP_PER_LEVEL) * 100 / XP_PER_LEVEL) as u8
}

/// Returns `(current, longest)` over distinct recorded dates. A date counts
/// once no matter how many classes it had; an absent-only date resets the
/// run and dates without any record are skipped entirely.
pub fn streaks(history: &[AttendanceRecord]) -> (u32, u32) {
    let mut days: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for record in history {
        *days.entry(record.date).or_insert(false) |= record.status.is_attended();
    }

    let mut current = 0u32;
    let mut longest = 0u32;
    for attended in days.into_values() {
        if attended {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (current, longest)
}

pub fn badges(stats: &BadgeStats) -> BTreeSet<Badge> {
    Badge::ALL
        .into_iter()
        .filter(|badge| badge.earned(stats))
        .collect()
}

/// Progression for each student, in the order given.
pub fn cohort_progression(snapshot: &Snapshot, students: &[&Student]) -> Vec<ProgressionProfile> {
    students
        .par_iter()
        .map(|student| {
            progression(
                student.student_id,
                snapshot.attendance_history(student.student_id),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{day, record, student_id};
    use AttendanceStatus::{Absent, OnDuty, Present};

    fn daily(statuses: &[AttendanceStatus]) -> Vec<AttendanceRecord> {
        statuses
            .iter()
            .enumerate()
            .map(|(offset, status)| record(1, "CS301", day(offset as u32), *status))
            .collect()
    }

    #[test]
    fn empty_history_is_the_zero_state() {
        let profile = progression(student_id(1), &[]);
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.level, 1);
        assert_eq!(profile.level_progress_pct, 0);
        assert_eq!(profile.streak, 0);
        assert_eq!(profile.max_streak, 0);
        assert_eq!(profile.attendance_pct, None);
        assert!(profile.badges.is_empty());
    }

    #[test]
    fn xp_weights_statuses() {
        let history = daily(&[Present, OnDuty, Absent, Present]);
        assert_eq!(experience(&history), 25);
    }

    #[test]
    fn xp_ignores_record_order_and_never_drops_when_records_are_added() {
        let mut history = daily(&[Present, Absent, OnDuty, Present, Present]);
        let forward = experience(&history);
        history.reverse();
        assert_eq!(experience(&history), forward);

        let mut previous = 0;
        let mut growing = Vec::new();
        for status in [OnDuty, Absent, Present, Present, OnDuty] {
            growing.insert(0, record(1, "MA201", day(growing.len() as u32), status));
            let xp = experience(&growing);
            assert!(xp >= previous);
            previous = xp;
        }
    }

    #[test]
    fn levels_turn_over_every_200_xp() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(199), 1);
        assert_eq!(level_for(200), 2);
        assert_eq!(level_for(399), 2);
        assert_eq!(level_for(400), 3);

        assert_eq!(level_progress_pct(0), 0);
        assert_eq!(level_progress_pct(199), 99);
        assert_eq!(level_progress_pct(200), 0);
        assert_eq!(level_progress_pct(250), 25);
    }

    #[test]
    fn absent_only_day_breaks_the_streak() {
        let history = daily(&[Present, Present, Present, Absent, Present, OnDuty]);
        assert_eq!(streaks(&history), (2, 3));
    }

    #[test]
    fn days_without_records_do_not_break_the_streak() {
        let history = vec![
            record(1, "CS301", day(0), Present),
            record(1, "CS301", day(1), Present),
            // weekend, nothing recorded
            record(1, "CS301", day(4), Present),
            record(1, "CS301", day(11), OnDuty),
        ];
        assert_eq!(streaks(&history), (4, 4));
    }

    #[test]
    fn a_day_counts_once_across_courses() {
        let history = vec![
            record(1, "CS301", day(0), Present),
            record(1, "MA201", day(0), Present),
            record(1, "PH101", day(0), Absent),
            record(1, "CS301", day(1), Absent),
            record(1, "MA201", day(1), OnDuty),
        ];
        assert_eq!(streaks(&history), (2, 2));
    }

    #[test]
    fn badges_follow_their_thresholds() {
        let mut history = daily(&[Present; 7]);
        let profile = progression(student_id(1), &history);
        assert!(profile.badges.contains(&Badge::WeekStreak));
        assert!(profile.badges.contains(&Badge::AttendanceStar));
        assert!(!profile.badges.contains(&Badge::MonthStreak));
        assert!(!profile.badges.contains(&Badge::Centurion));

        history.extend((7..100).map(|offset| record(1, "CS301", day(offset), Present)));
        let profile = progression(student_id(1), &history);
        assert_eq!(profile.badges, Badge::ALL.into_iter().collect());
    }

    #[test]
    fn corrections_retract_badges() {
        // Badges are recomputed from current records, so lowering a metric
        // takes the badge away again.
        let mut history = daily(&[Present; 7]);
        assert!(progression(student_id(1), &history).badges.contains(&Badge::WeekStreak));

        history[3].status = Absent;
        let corrected = progression(student_id(1), &history);
        assert!(!corrected.badges.contains(&Badge::WeekStreak));
        assert!(!corrected.badges.contains(&Badge::AttendanceStar));
    }

    #[test]
    fn progression_is_repeatable() {
        let history = daily(&[Present, OnDuty, Absent, Present, Present, Absent]);
        let first = serde_json::to_string(&progression(student_id(1), &history)).unwrap();
        let second = serde_json::to_string(&progression(student_id(1), &history)).unwrap();
        assert_eq!(first, second);
    }
}
