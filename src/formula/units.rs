//! Time-unit and weekday vocabularies.
//!
//! Translates the unit and day names users write in formulas into each
//! dialect's native keywords, and describes how each dialect numbers the
//! days of the week.

use chrono::Weekday;

use super::dialect::Dialect;

/// Units accepted by `DATEADD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl DateUnit {
    pub const NAMES: &'static [&'static str] =
        &["day", "week", "month", "year", "hour", "minute", "second"];

    /// Case-insensitive, singular or plural.
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "second" => Some(DateUnit::Second),
            "minute" => Some(DateUnit::Minute),
            "hour" => Some(DateUnit::Hour),
            "day" => Some(DateUnit::Day),
            "week" => Some(DateUnit::Week),
            "month" => Some(DateUnit::Month),
            "year" => Some(DateUnit::Year),
            _ => None,
        }
    }

    /// Native keyword for interval arithmetic in `dialect`.
    pub fn keyword(self, dialect: Dialect) -> &'static str {
        match dialect {
            Dialect::Mysql | Dialect::Oracle => match self {
                DateUnit::Second => "SECOND",
                DateUnit::Minute => "MINUTE",
                DateUnit::Hour => "HOUR",
                DateUnit::Day => "DAY",
                DateUnit::Week => "WEEK",
                DateUnit::Month => "MONTH",
                DateUnit::Year => "YEAR",
            },
            Dialect::Postgres | Dialect::Mssql => match self {
                DateUnit::Second => "second",
                DateUnit::Minute => "minute",
                DateUnit::Hour => "hour",
                DateUnit::Day => "day",
                DateUnit::Week => "week",
                DateUnit::Month => "month",
                DateUnit::Year => "year",
            },
            // SQLite date modifiers have no week unit; callers scale by 7.
            Dialect::Sqlite => match self {
                DateUnit::Second => "seconds",
                DateUnit::Minute => "minutes",
                DateUnit::Hour => "hours",
                DateUnit::Day | DateUnit::Week => "days",
                DateUnit::Month => "months",
                DateUnit::Year => "years",
            },
        }
    }
}

/// Units accepted by `DATETIME_DIFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
}

impl DiffUnit {
    pub const NAMES: &'static [&'static str] = &[
        "milliseconds",
        "ms",
        "seconds",
        "s",
        "minutes",
        "m",
        "hours",
        "h",
        "days",
        "d",
        "weeks",
        "w",
        "months",
        "M",
        "quarters",
        "Q",
        "years",
        "y",
    ];

    /// Short forms are case-sensitive (`m` is minutes, `M` is months);
    /// long forms are not.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let short = match name {
            "ms" => Some(DiffUnit::Milliseconds),
            "s" => Some(DiffUnit::Seconds),
            "m" => Some(DiffUnit::Minutes),
            "h" => Some(DiffUnit::Hours),
            "d" => Some(DiffUnit::Days),
            "w" => Some(DiffUnit::Weeks),
            "M" => Some(DiffUnit::Months),
            "Q" => Some(DiffUnit::Quarters),
            "y" => Some(DiffUnit::Years),
            _ => None,
        };
        if short.is_some() {
            return short;
        }
        let lower = name.to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "millisecond" => Some(DiffUnit::Milliseconds),
            "second" => Some(DiffUnit::Seconds),
            "minute" => Some(DiffUnit::Minutes),
            "hour" => Some(DiffUnit::Hours),
            "day" => Some(DiffUnit::Days),
            "week" => Some(DiffUnit::Weeks),
            "month" => Some(DiffUnit::Months),
            "quarter" => Some(DiffUnit::Quarters),
            "year" => Some(DiffUnit::Years),
            _ => None,
        }
    }

    /// Seconds per unit for fixed-length units; `None` for calendar units.
    pub fn seconds(self) -> Option<f64> {
        match self {
            DiffUnit::Milliseconds => Some(0.001),
            DiffUnit::Seconds => Some(1.0),
            DiffUnit::Minutes => Some(60.0),
            DiffUnit::Hours => Some(3_600.0),
            DiffUnit::Days => Some(86_400.0),
            DiffUnit::Weeks => Some(604_800.0),
            DiffUnit::Months | DiffUnit::Quarters | DiffUnit::Years => None,
        }
    }

    /// `TIMESTAMPDIFF` unit for MySQL, `DATEDIFF` datepart for SQL Server.
    pub fn keyword(self, dialect: Dialect) -> &'static str {
        match dialect {
            Dialect::Mssql => match self {
                DiffUnit::Milliseconds => "millisecond",
                DiffUnit::Seconds => "second",
                DiffUnit::Minutes => "minute",
                DiffUnit::Hours => "hour",
                DiffUnit::Days => "day",
                DiffUnit::Weeks => "week",
                DiffUnit::Months => "month",
                DiffUnit::Quarters => "quarter",
                DiffUnit::Years => "year",
            },
            _ => match self {
                DiffUnit::Milliseconds => "MICROSECOND",
                DiffUnit::Seconds => "SECOND",
                DiffUnit::Minutes => "MINUTE",
                DiffUnit::Hours => "HOUR",
                DiffUnit::Days => "DAY",
                DiffUnit::Weeks => "WEEK",
                DiffUnit::Months => "MONTH",
                DiffUnit::Quarters => "QUARTER",
                DiffUnit::Years => "YEAR",
            },
        }
    }
}

/// Day names accepted by `WEEKDAY` (`mon`, `Monday`, ...).
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    name.trim().parse::<Weekday>().ok()
}

/// How a dialect's native weekday expression numbers days: `zero_day`
/// maps to `base`, and each following day adds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayConvention {
    pub zero_day: Weekday,
    pub base: u32,
}

pub fn weekday_convention(dialect: Dialect) -> WeekdayConvention {
    match dialect {
        // WEEKDAY(d): Monday = 0
        Dialect::Mysql => WeekdayConvention {
            zero_day: Weekday::Mon,
            base: 0,
        },
        // EXTRACT(ISODOW ...): Monday = 1 .. Sunday = 7
        Dialect::Postgres => WeekdayConvention {
            zero_day: Weekday::Mon,
            base: 1,
        },
        // (DATEPART(WEEKDAY, d) + @@DATEFIRST + 5) % 7: Monday = 0
        Dialect::Mssql => WeekdayConvention {
            zero_day: Weekday::Mon,
            base: 0,
        },
        // STRFTIME('%w', d): Sunday = 0
        Dialect::Sqlite => WeekdayConvention {
            zero_day: Weekday::Sun,
            base: 0,
        },
        // TRUNC(d) - TRUNC(d, 'IW'): Monday = 0
        Dialect::Oracle => WeekdayConvention {
            zero_day: Weekday::Mon,
            base: 0,
        },
    }
}

/// The `k` in `(native + k) % 7` that yields 0 for `start_day`.
pub fn weekday_offset(dialect: Dialect, start_day: Weekday) -> u32 {
    let convention = weekday_convention(dialect);
    (convention.zero_day.num_days_from_monday() + 14
        - start_day.num_days_from_monday()
        - convention.base)
        % 7
}

/// Whether the native expression must be wrapped in `(native + k) % 7`.
/// Only a zero-based convention with no shift can be used as is.
pub fn weekday_needs_wrap(dialect: Dialect, start_day: Weekday) -> bool {
    weekday_offset(dialect, start_day) != 0 || weekday_convention(dialect).base != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    const START_DAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// What the dialect's native expression returns for `date`.
    fn native_weekday(dialect: Dialect, date: NaiveDate) -> u32 {
        let c = weekday_convention(dialect);
        (date.weekday().num_days_from_monday() + 7 - c.zero_day.num_days_from_monday()) % 7
            + c.base
    }

    #[test]
    fn test_weekday_index_agrees_across_dialects() {
        let mut date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        for _ in 0..14 {
            for start in START_DAYS {
                let expected = (date.weekday().num_days_from_monday() + 7
                    - start.num_days_from_monday())
                    % 7;
                for dialect in Dialect::ALL {
                    // Mirrors the emitted SQL: the modulo is only applied when wrapped.
                    let native = native_weekday(dialect, date);
                    let got = if weekday_needs_wrap(dialect, start) {
                        (native + weekday_offset(dialect, start)) % 7
                    } else {
                        native
                    };
                    assert_eq!(got, expected, "{} {:?} {}", dialect, start, date);
                }
            }
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_weekday_offset_values() {
        assert_eq!(weekday_offset(Dialect::Mysql, Weekday::Mon), 0);
        assert_eq!(weekday_offset(Dialect::Postgres, Weekday::Mon), 6);
        assert_eq!(weekday_offset(Dialect::Sqlite, Weekday::Mon), 6);
        assert_eq!(weekday_offset(Dialect::Sqlite, Weekday::Sun), 0);
    }

    #[test]
    fn test_one_based_convention_always_wraps() {
        assert_eq!(weekday_offset(Dialect::Postgres, Weekday::Sun), 0);
        assert!(weekday_needs_wrap(Dialect::Postgres, Weekday::Sun));
        assert!(!weekday_needs_wrap(Dialect::Mysql, Weekday::Mon));
        assert!(!weekday_needs_wrap(Dialect::Sqlite, Weekday::Sun));
        // ISODOW of a Sunday is 7; wrapped it is 0.
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(native_weekday(Dialect::Postgres, sunday), 7);
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("Monday"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("SUNDAY"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("tue"), Some(Weekday::Tue));
        assert_eq!(parse_weekday("funday"), None);
    }

    #[test]
    fn test_parse_date_units() {
        assert_eq!(DateUnit::parse("Days"), Some(DateUnit::Day));
        assert_eq!(DateUnit::parse("month"), Some(DateUnit::Month));
        assert_eq!(DateUnit::parse("fortnight"), None);
        assert_eq!(DateUnit::Week.keyword(Dialect::Sqlite), "days");
    }

    #[test]
    fn test_parse_diff_units() {
        assert_eq!(DiffUnit::parse("m"), Some(DiffUnit::Minutes));
        assert_eq!(DiffUnit::parse("M"), Some(DiffUnit::Months));
        assert_eq!(DiffUnit::parse("Quarters"), Some(DiffUnit::Quarters));
        assert_eq!(DiffUnit::parse("ms"), Some(DiffUnit::Milliseconds));
        assert_eq!(DiffUnit::parse("fortnights"), None);
        assert_eq!(DiffUnit::Hours.seconds(), Some(3_600.0));
        assert_eq!(DiffUnit::Years.seconds(), None);
    }
}
