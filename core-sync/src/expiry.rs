//! Cache expiry intervals
//!
//! Sources may set an `expires` value such as `30 days` or `1 year 6 months`.
//! Uploaded objects then carry `Cache-Control: max-age=<seconds>, must-revalidate`,
//! where the seconds are measured from the write time so month and year
//! lengths follow the calendar.

use chrono::{DateTime, Duration, Months, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        let singular = word.strip_suffix('s').unwrap_or(&word);
        match singular {
            "second" | "sec" => Some(Unit::Second),
            "minute" | "min" => Some(Unit::Minute),
            "hour" => Some(Unit::Hour),
            "day" => Some(Unit::Day),
            "week" => Some(Unit::Week),
            "month" => Some(Unit::Month),
            "year" => Some(Unit::Year),
            _ => None,
        }
    }
}

/// Parse an interval into `(amount, unit)` pairs; `None` if malformed or empty
fn parse_interval(expires: &str) -> Option<Vec<(u32, Unit)>> {
    let tokens: Vec<&str> = expires.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return None;
    }

    tokens
        .chunks(2)
        .map(|pair| {
            let amount = pair[0].parse::<u32>().ok()?;
            let unit = Unit::parse(pair[1])?;
            Some((amount, unit))
        })
        .collect()
}

/// Whether `expires` is a usable interval
pub fn is_valid_interval(expires: &str) -> bool {
    parse_interval(expires).is_some()
}

/// Seconds between `now` and `now + expires`
///
/// Returns `None` for an empty or malformed interval, or one that overflows
/// the calendar.
pub fn expiry_seconds(expires: &str, now: DateTime<Utc>) -> Option<i64> {
    let mut target = now;
    for (amount, unit) in parse_interval(expires)? {
        let amount = i64::from(amount);
        target = match unit {
            Unit::Second => target.checked_add_signed(Duration::seconds(amount))?,
            Unit::Minute => target.checked_add_signed(Duration::minutes(amount))?,
            Unit::Hour => target.checked_add_signed(Duration::hours(amount))?,
            Unit::Day => target.checked_add_signed(Duration::days(amount))?,
            Unit::Week => target.checked_add_signed(Duration::weeks(amount))?,
            Unit::Month => target.checked_add_months(Months::new(u32::try_from(amount).ok()?))?,
            Unit::Year => {
                target.checked_add_months(Months::new(u32::try_from(amount * 12).ok()?))?
            }
        };
    }

    Some((target - now).num_seconds())
}

/// `Cache-Control` value for an expiry interval, if one is configured
pub fn cache_control_header(expires: &str, now: DateTime<Utc>) -> Option<String> {
    expiry_seconds(expires, now).map(|seconds| format!("max-age={}, must-revalidate", seconds))
}
