//! Day-advancement and streak rules for a single (user, challenge) record.

use chrono::{DateTime, Duration, Utc};

use crate::models::progress::UserProgress;
use crate::utils::time::same_calendar_day;

/// Upper bound on the gap between two activities that still continues a streak
pub const STREAK_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct Advancement {
    pub progress: UserProgress,
    pub streak_continued: bool,
}

/// A streak continues when the previous activity is less than 48 hours old
/// and happened on another calendar day.
pub fn is_consecutive(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_activity {
        Some(last) => {
            now - last < Duration::hours(STREAK_WINDOW_HOURS) && !same_calendar_day(last, now)
        }
        None => false,
    }
}

/// Applies a completed task's day to `progress`.
///
/// Returns `None` when `day_number` does not exceed the highest day already
/// reached; the record is then left exactly as it was. Otherwise
/// `completed_days` jumps straight to `day_number`.
pub fn advance(progress: &UserProgress, day_number: u32, now: DateTime<Utc>) -> Option<Advancement> {
    if day_number <= progress.completed_days {
        return None;
    }

    let streak_continued = is_consecutive(progress.last_activity_date, now);
    let mut next = progress.clone();
    next.streak_count = if streak_continued {
        progress.streak_count + 1
    } else {
        1
    };
    next.completed_days = day_number;
    next.last_activity_date = Some(now);

    Some(Advancement {
        progress: next,
        streak_continued,
    })
}
