//! Time source and timestamp formatting.
//!
//! Stored timestamps are UTC with a fixed six-digit fraction so that string
//! order matches chronological order.

use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(OffsetDateTime::now_utc)
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    at.to_offset(UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| "unknown".to_string())
}

pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).ok()
}

/// `dd/mm/yyyy` for list views, "No date" when unparseable.
pub fn format_list_date(s: &str) -> String {
    let format = format_description!("[day]/[month]/[year]");
    parse_timestamp(s)
        .and_then(|at| at.format(&format).ok())
        .unwrap_or_else(|| "No date".to_string())
}

/// `YYYY-MM-DD`, used in generated document names.
pub fn file_date(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]");
    at.format(&format)
        .unwrap_or_else(|_| at.year().to_string())
}

/// Relative age such as "5 minutes ago".
pub fn time_ago(s: &str, now: OffsetDateTime) -> String {
    let Some(then) = parse_timestamp(s) else {
        return "some time ago".to_string();
    };
    let seconds = (now - then).whole_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = hours / 24;
    if days < 30 {
        return plural(days, "day");
    }
    if days < 365 {
        return plural(days / 30, "month");
    }
    plural(days / 365, "year")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_have_fixed_width() {
        let a = format_timestamp(datetime!(2025-03-04 05:06:07 UTC));
        let b = format_timestamp(datetime!(2025-03-04 05:06:07.5 UTC));
        assert_eq!(a, "2025-03-04T05:06:07.000000Z");
        assert_eq!(b, "2025-03-04T05:06:07.500000Z");
        assert!(a < b);
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let at = datetime!(2025-03-04 23:30:00 -03:00);
        assert_eq!(format_timestamp(at), "2025-03-05T02:30:00.000000Z");
    }

    #[test]
    fn list_date_falls_back_on_garbage() {
        assert_eq!(format_list_date("2025-07-09T10:00:00.000000Z"), "09/07/2025");
        assert_eq!(format_list_date("yesterday"), "No date");
    }

    #[test]
    fn time_ago_buckets() {
        let now = datetime!(2025-06-15 12:00:00 UTC);
        assert_eq!(time_ago("2025-06-15T11:59:30.000000Z", now), "just now");
        assert_eq!(time_ago("2025-06-15T11:59:00.000000Z", now), "1 minute ago");
        assert_eq!(time_ago("2025-06-15T09:00:00.000000Z", now), "3 hours ago");
        assert_eq!(time_ago("2025-06-10T12:00:00.000000Z", now), "5 days ago");
        assert_eq!(time_ago("2025-03-15T12:00:00.000000Z", now), "3 months ago");
        assert_eq!(time_ago("2023-06-15T12:00:00.000000Z", now), "2 years ago");
        assert_eq!(time_ago("not a date", now), "some time ago");
    }
}
