//! Pure habit metrics.
//!
//! Everything here is a function of a habit's log history, its interval, the
//! instant being evaluated and the calendar used to bucket instants into
//! local days. Nothing mutates a habit, so these can be recomputed on every
//! tick of an external clock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;

use crate::clock::Clock;
use crate::models::{Habit, HabitStatus};

const MS_PER_MINUTE: i64 = 60_000;

/// Streak for a habit after its logs were last changed.
///
/// Daily habits (`interval_minutes == 0`) count consecutive local days with at
/// least one log, walking backward from the day of `now`; the walk stops at
/// the first empty day, so a habit not logged today has a streak of 0.
///
/// Interval habits report the total number of logs. This is a repetition
/// count kept for compatibility with stored data, not a consistency streak.
pub fn compute_streak<C: Clock + ?Sized>(
    logs: &[DateTime<Utc>],
    interval_minutes: u32,
    now: DateTime<Utc>,
    calendar: &C,
) -> u32 {
    if interval_minutes > 0 {
        return u32::try_from(logs.len()).unwrap_or(u32::MAX);
    }

    let logged_days: HashSet<NaiveDate> = logs.iter().map(|ts| calendar.local_date(*ts)).collect();

    let mut streak = 0;
    let mut day = Some(calendar.local_date(now));
    while let Some(current) = day {
        if !logged_days.contains(&current) {
            break;
        }
        streak += 1;
        day = current.pred_opt();
    }
    streak
}

/// Readiness of `habit` at `now`
pub fn habit_status<C: Clock + ?Sized>(habit: &Habit, now: DateTime<Utc>, calendar: &C) -> HabitStatus {
    if habit.is_daily() {
        let today = calendar.local_date(now);
        let done_today = habit.logs.iter().any(|ts| calendar.local_date(*ts) == today);
        return if done_today {
            HabitStatus::Completed
        } else {
            HabitStatus::Ready
        };
    }

    let Some(last) = habit.last_log() else {
        return HabitStatus::Ready;
    };

    let elapsed = (now - last).num_milliseconds();
    let required = i64::from(habit.interval_minutes) * MS_PER_MINUTE;
    if elapsed < required {
        let remaining = required - elapsed;
        HabitStatus::Cooldown {
            minutes_remaining: ceil_div(remaining, MS_PER_MINUTE),
        }
    } else {
        HabitStatus::Ready
    }
}

/// Longest trailing window `habit_activity` will build
pub const MAX_ACTIVITY_DAYS: u32 = 365;

/// Per-day log counts for a trailing window of local days
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitActivity {
    /// Oldest day first, ending with `today`
    pub days: Vec<(NaiveDate, usize)>,
    pub total_reps: usize,
}

impl HabitActivity {
    pub fn active_days(&self) -> usize {
        self.days.iter().filter(|(_, count)| *count > 0).count()
    }
}

pub fn habit_activity<C: Clock + ?Sized>(
    habit: &Habit,
    today: NaiveDate,
    days: u32,
    calendar: &C,
) -> HabitActivity {
    let window: Vec<NaiveDate> = (0..i64::from(days.min(MAX_ACTIVITY_DAYS)))
        .rev()
        .filter_map(|back| today.checked_sub_signed(Duration::days(back)))
        .collect();

    let days = window
        .into_iter()
        .map(|day| {
            let count = habit
                .logs
                .iter()
                .filter(|ts| calendar.local_date(**ts) == day)
                .count();
            (day, count)
        })
        .collect();

    HabitActivity {
        days,
        total_reps: habit.logs.len(),
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1).div_euclid(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{FixedOffset, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn habit(interval_minutes: u32, logs: Vec<DateTime<Utc>>) -> Habit {
        let mut habit = Habit::new("h".to_string(), interval_minutes, at(1, 0));
        habit.logs = logs;
        habit
    }

    #[test]
    fn daily_streak_counts_back_to_first_gap() {
        let clock = ManualClock::new(at(10, 12));
        let logs = vec![at(6, 9), at(8, 9), at(9, 20), at(10, 7), at(10, 12)];
        assert_eq!(compute_streak(&logs, 0, clock.now(), &clock), 3);
    }

    #[test]
    fn daily_streak_is_zero_without_a_log_today() {
        let clock = ManualClock::new(at(10, 12));
        let logs = vec![at(8, 9), at(9, 9)];
        assert_eq!(compute_streak(&logs, 0, clock.now(), &clock), 0);
    }

    #[test]
    fn daily_streak_uses_local_days() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let clock = ManualClock::with_offset(at(10, 8), plus_two);
        let logs = vec![Utc.with_ymd_and_hms(2024, 6, 9, 23, 30, 0).unwrap()];
        assert_eq!(compute_streak(&logs, 0, clock.now(), &clock), 1);
    }

    #[test]
    fn interval_streak_is_repetition_count() {
        let clock = ManualClock::new(at(10, 12));
        let logs = vec![at(1, 1), at(5, 1), at(10, 1)];
        assert_eq!(compute_streak(&logs, 45, clock.now(), &clock), 3);
    }

    #[test]
    fn interval_cooldown_rounds_remaining_minutes_up() {
        let t0 = at(10, 8);
        let clock = ManualClock::new(t0);
        let hydrate = habit(60, vec![t0]);

        let status = habit_status(&hydrate, t0 + Duration::minutes(30), &clock);
        assert_eq!(status, HabitStatus::Cooldown { minutes_remaining: 30 });

        let status = habit_status(&hydrate, t0 + Duration::seconds(30), &clock);
        assert_eq!(status, HabitStatus::Cooldown { minutes_remaining: 60 });

        let status = habit_status(&hydrate, t0 + Duration::minutes(61), &clock);
        assert_eq!(status, HabitStatus::Ready);

        let status = habit_status(&hydrate, t0 + Duration::minutes(60), &clock);
        assert_eq!(status, HabitStatus::Ready);
    }

    #[test]
    fn interval_habit_without_logs_is_ready() {
        let clock = ManualClock::new(at(10, 8));
        assert_eq!(habit_status(&habit(30, vec![]), clock.now(), &clock), HabitStatus::Ready);
    }

    #[test]
    fn daily_status_is_completed_only_for_today() {
        let clock = ManualClock::new(at(10, 20));
        let journal = habit(0, vec![at(9, 22)]);
        assert_eq!(habit_status(&journal, clock.now(), &clock), HabitStatus::Ready);

        let journal = habit(0, vec![at(9, 22), at(10, 6)]);
        assert_eq!(habit_status(&journal, clock.now(), &clock), HabitStatus::Completed);
    }

    #[test]
    fn activity_window_ends_today_oldest_first() {
        let clock = ManualClock::new(at(10, 20));
        let h = habit(0, vec![at(4, 1), at(8, 1), at(8, 5), at(10, 1)]);
        let activity = habit_activity(&h, clock.today(), 3, &clock);

        let counts: Vec<usize> = activity.days.iter().map(|(_, c)| *c).collect();
        assert_eq!(counts, vec![2, 0, 1]);
        assert_eq!(activity.days[2].0, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(activity.total_reps, 4);
        assert_eq!(activity.active_days(), 2);
    }

    #[test]
    fn activity_window_is_capped() {
        let clock = ManualClock::new(at(10, 20));
        let h = habit(0, vec![at(10, 1)]);
        let activity = habit_activity(&h, clock.today(), u32::MAX, &clock);

        assert_eq!(activity.days.len(), MAX_ACTIVITY_DAYS as usize);
        assert_eq!(activity.days.last().map(|(day, _)| *day), Some(clock.today()));
    }
}
