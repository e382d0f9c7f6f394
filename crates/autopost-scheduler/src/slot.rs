//! Local-time slot arithmetic.
//!
//! All persisted instants are UTC; every scheduling decision converts to
//! the configured timezone first so that slots stay pinned to local
//! wall-clock time across daylight-saving transitions.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::SlotTime;

/// Resolve `slot` on `date` in `tz` to a concrete instant.
///
/// Ambiguous local times (fall-back) take the earliest mapping.
/// Nonexistent local times (spring-forward gap) shift forward one hour.
fn localize(tz: Tz, date: NaiveDate, slot: SlotTime) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(u32::from(slot.hour()), u32::from(slot.minute()), 0)
        .unwrap_or(NaiveTime::MIN); // SlotTime is range-checked at construction
    let naive = date.and_time(time);

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        }
    }
}

/// The next occurrence of `slot` in `tz` strictly after `now`.
///
/// Today's slot if it is still in the future, otherwise tomorrow's.
pub fn next_occurrence(tz: Tz, slot: SlotTime, now: DateTime<Utc>) -> DateTime<Utc> {
    let now_local = now.with_timezone(&tz);
    let today = now_local.date_naive();

    let candidate = localize(tz, today, slot);
    if candidate > now_local {
        candidate.with_timezone(&Utc)
    } else {
        localize(tz, today + Days::new(1), slot).with_timezone(&Utc)
    }
}

/// Advance a fired run to the next local calendar day at the same slot.
///
/// Re-localizes rather than adding 24 hours of UTC, so the local fire
/// time is preserved even when the UTC offset changes between the two
/// days.
pub fn advance_one_day(prev: DateTime<Utc>, slot: SlotTime, tz: Tz) -> DateTime<Utc> {
    let next_date = prev.with_timezone(&tz).date_naive() + Days::new(1);
    localize(tz, next_date, slot).with_timezone(&Utc)
}
