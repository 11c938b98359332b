//! Cron expression and timezone validation for periodic strategies.
//!
//! Adapted from the teacher's recurring-action validation helpers: parse
//! eagerly at `create` time so a malformed `cron_expr` never reaches the
//! scheduler.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;

use crate::error::CronError;

/// Parse and validate a cron expression, returning the compiled form.
pub fn validate_cron_expr(expr: &str) -> Result<Cron, CronError> {
    Cron::new(expr).parse().map_err(|e| CronError::InvalidExpression(e.to_string()))
}

/// Parse an IANA timezone name.
pub fn validate_timezone(tz: &str) -> Result<Tz, CronError> {
    tz.parse::<Tz>().map_err(|_| CronError::InvalidTimezone(tz.to_owned()))
}

/// The next fire time at or after `after`, localized to `tz`.
#[must_use]
pub fn next_occurrence(cron: &Cron, tz: Tz, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let after_tz = after.with_timezone(&tz);
    cron.find_next_occurrence(&after_tz, false).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_expression() {
        assert!(validate_cron_expr("not a cron").is_err());
    }

    #[test]
    fn accepts_standard_expression() {
        assert!(validate_cron_expr("0 0 * * *").is_ok());
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(validate_timezone("Nowhere/Imaginary").is_err());
    }

    #[test]
    fn next_occurrence_advances() {
        let cron = validate_cron_expr("0 0 * * *").unwrap();
        let tz = validate_timezone("UTC").unwrap();
        let after = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let next = next_occurrence(&cron, tz, &after).unwrap();
        assert_eq!(next, DateTime::parse_from_rfc3339("2026-03-02T00:00:00Z").unwrap().with_timezone(&Utc));
    }
}
