//! Pure expiry-date computation for quota lots (spec §4.1).
//!
//! No I/O, no trait: a strategy or transfer caller decides *when* to call
//! this; what comes back is always the same function of `(now, expiry_days,
//! tz)`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Lots issued without an explicit flip window stay useful for at least this
/// many days; end-of-current-month windows shorter than this flip to the
/// following month (spec §4.1).
const MIN_REMAINING_DAYS: i64 = 30;

/// Compute the expiry timestamp for a newly issued lot.
///
/// - If `expiry_days` is set: `end_of_day(now + expiry_days days)` in `tz`.
/// - Else: `end_of_current_month(now)` in `tz`, unless fewer than
///   [`MIN_REMAINING_DAYS`] remain until then, in which case
///   `end_of_next_month(now)`.
#[must_use]
pub fn compute_expiry(now: DateTime<Utc>, expiry_days: Option<u32>, tz: Tz) -> DateTime<Utc> {
    let local_now = now.with_timezone(&tz);

    if let Some(days) = expiry_days {
        let target_date = local_now.date_naive() + Duration::days(i64::from(days));
        return end_of_day(target_date, tz);
    }

    let current_month_end = end_of_month(local_now.year(), local_now.month(), tz);
    let remaining = current_month_end - now;

    if remaining < Duration::days(MIN_REMAINING_DAYS) {
        let (next_year, next_month) = next_month(local_now.year(), local_now.month());
        end_of_month(next_year, next_month, tz)
    } else {
        current_month_end
    }
}

/// Resolve `23:59:59` on `date` in `tz` to a UTC instant.
///
/// Falls back to the earliest valid local representation for DST-gap dates
/// (there is no such thing as a missing 23:59:59 in practice, but the API
/// must still be total).
fn end_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_hms_opt(23, 59, 59).expect("23:59:59 is valid");
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// The last calendar day of `(year, month)` at `23:59:59` local, as UTC.
fn end_of_month(year: i32, month: u32, tz: Tz) -> DateTime<Utc> {
    let (next_year, next_month) = next_month(year, month);
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid date");
    let last_day = first_of_next - Duration::days(1);
    end_of_day(last_day, tz)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn explicit_expiry_days_end_of_day() {
        let now = dt("2026-02-10T08:00:00Z");
        let expiry = compute_expiry(now, Some(5), UTC);
        assert_eq!(expiry, dt("2026-02-15T23:59:59Z"));
    }

    #[test]
    fn no_flip_when_plenty_of_month_remains() {
        // Feb 2026 has 28 days; on the 1st, 27 days remain -> still flips
        // because that's under 30. Use an earlier month with more runway.
        let now = dt("2026-01-01T00:00:00Z");
        let expiry = compute_expiry(now, None, UTC);
        // 30 days remain until Jan 31 23:59:59, which is not < 30, so no flip.
        assert_eq!(expiry, dt("2026-01-31T23:59:59Z"));
    }

    #[test]
    fn flips_to_next_month_near_month_end() {
        let now = dt("2026-02-20T12:00:00Z");
        let expiry = compute_expiry(now, None, UTC);
        // Only 8-ish days remain in February -> flip to end of March.
        assert_eq!(expiry, dt("2026-03-31T23:59:59Z"));
    }

    #[test]
    fn flips_across_year_boundary() {
        let now = dt("2026-12-20T00:00:00Z");
        let expiry = compute_expiry(now, None, UTC);
        assert_eq!(expiry, dt("2027-01-31T23:59:59Z"));
    }

    #[test]
    fn expiry_days_zero_is_today() {
        let now = dt("2026-06-15T03:00:00Z");
        let expiry = compute_expiry(now, Some(0), UTC);
        assert_eq!(expiry, dt("2026-06-15T23:59:59Z"));
    }
}
