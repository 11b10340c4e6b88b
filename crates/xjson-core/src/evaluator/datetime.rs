//! Date/time formatting for `now()`, `.utc()`, and `.add()`.
//!
//! The format language is the subset of tokens this codebase's expressions
//! support (`yyyy MM dd HH mm ss W q`), not `chrono`'s own strftime syntax,
//! so formatting is done with a small manual scanner rather than handing
//! the format string straight to `chrono`.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, Timelike, Utc};

pub fn now_local() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

pub fn to_utc(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_timezone(&Utc).fixed_offset()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Weeks,
}

impl DurationUnit {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "days" => Some(Self::Days),
            "hours" => Some(Self::Hours),
            "minutes" => Some(Self::Minutes),
            "seconds" => Some(Self::Seconds),
            "weeks" => Some(Self::Weeks),
            _ => None,
        }
    }

    fn to_duration(self, amount: i64) -> Duration {
        match self {
            Self::Days => Duration::days(amount),
            Self::Hours => Duration::hours(amount),
            Self::Minutes => Duration::minutes(amount),
            Self::Seconds => Duration::seconds(amount),
            Self::Weeks => Duration::weeks(amount),
        }
    }
}

pub fn add(dt: DateTime<FixedOffset>, unit: DurationUnit, amount: i64) -> DateTime<FixedOffset> {
    dt + unit.to_duration(amount)
}

/// ISO 8601 with a colon in the UTC offset, e.g. `2024-01-02T03:04:05+01:00`.
pub fn to_iso8601(dt: DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

/// Render `dt` using the token subset `yyyy MM dd HH mm ss W q`; any other
/// character passes through unchanged.
pub fn format_tokens(dt: DateTime<FixedOffset>, fmt: &str) -> String {
    const TOKENS: &[(&str, fn(DateTime<FixedOffset>) -> String)] = &[
        ("yyyy", |d| format!("{:04}", d.year())),
        ("MM", |d| format!("{:02}", d.month())),
        ("dd", |d| format!("{:02}", d.day())),
        ("HH", |d| format!("{:02}", d.hour())),
        ("mm", |d| format!("{:02}", d.minute())),
        ("ss", |d| format!("{:02}", d.second())),
        ("W", |d| d.iso_week().week().to_string()),
        ("q", |d| (((d.month() - 1) / 3) + 1).to_string()),
    ];

    let mut out = String::with_capacity(fmt.len());
    let bytes = fmt.as_bytes();
    let mut i = 0;
    'outer: while i < bytes.len() {
        for (token, render) in TOKENS {
            if fmt[i..].starts_with(token) {
                out.push_str(&render(dt));
                i += token.len();
                continue 'outer;
            }
        }
        // advance by one char, not one byte, to stay UTF-8 safe.
        let ch = fmt[i..].chars().next().expect("index within bounds");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 9, 7, 2)
            .unwrap()
    }

    #[test]
    fn formats_date_tokens() {
        assert_eq!(format_tokens(sample(), "yyyy-MM-dd HH:mm"), "2024-03-05 09:07");
    }

    #[test]
    fn quarter_token() {
        assert_eq!(format_tokens(sample(), "q"), "1");
    }

    #[test]
    fn add_days() {
        let shifted = add(sample(), DurationUnit::Days, 1);
        assert_eq!(format_tokens(shifted, "yyyy-MM-dd"), "2024-03-06");
    }

    #[test]
    fn iso8601_has_colon_offset() {
        let s = to_iso8601(sample());
        assert!(s.ends_with("+00:00"));
    }
}
