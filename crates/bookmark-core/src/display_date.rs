//! Variable-precision display dates.
//!
//! Users enter a bookmark's event date at whatever precision they know it:
//! a year, a month, a day, an hour or a minute. The date is reduced to a
//! single UTC instant (the sort key) with every unspecified component set to
//! the start of its period, while the granularity is kept so the date can be
//! rendered back without inventing precision.
//!
//! | Granularity | Input shape        | Stored pattern     | Example            |
//! |-------------|--------------------|--------------------|--------------------|
//! | `Minute`    | `Y.M.D H:MM`       | `%Y.%m.%d %H:%M`   | `2017.06.15 09:30` |
//! | `Hour`      | `Y.M.D H`          | `%Y.%m.%d %H`      | `2017.06.15 09`    |
//! | `Day`       | `Y.M.D`            | `%Y.%m.%d`         | `2017.06.15`       |
//! | `Month`     | `Y.M`              | `%Y.%m`            | `2017.06`          |
//! | `Year`      | `Y`                | `%Y`               | `2017`             |
//!
//! Years take exactly four digits; every other component takes one or two.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Precision of a user-supplied display date.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl Granularity {
    /// Granularities in the order input patterns are tried: most specific first.
    pub const MOST_SPECIFIC_FIRST: [Granularity; 5] = [
        Granularity::Minute,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Month,
        Granularity::Year,
    ];

    /// The strftime pattern persisted in `display_date_format`.
    pub fn pattern(self) -> &'static str {
        match self {
            Granularity::Year => "%Y",
            Granularity::Month => "%Y.%m",
            Granularity::Day => "%Y.%m.%d",
            Granularity::Hour => "%Y.%m.%d %H",
            Granularity::Minute => "%Y.%m.%d %H:%M",
        }
    }

    /// Look up the granularity for a persisted pattern.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        Self::MOST_SPECIFIC_FIRST
            .into_iter()
            .find(|g| g.pattern() == pattern)
    }

    /// Zero every component finer than this granularity.
    fn truncate(self, dt: NaiveDateTime) -> NaiveDateTime {
        let (month, day, hour, minute) = match self {
            Granularity::Year => (1, 1, 0, 0),
            Granularity::Month => (dt.month(), 1, 0, 0),
            Granularity::Day => (dt.month(), dt.day(), 0, 0),
            Granularity::Hour => (dt.month(), dt.day(), dt.hour(), 0),
            Granularity::Minute => (dt.month(), dt.day(), dt.hour(), dt.minute()),
        };
        // Components come from a valid datetime, so the truncated one exists.
        NaiveDate::from_ymd_opt(dt.year(), month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap_or(dt)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Year => "year",
            Granularity::Month => "month",
            Granularity::Day => "day",
            Granularity::Hour => "hour",
            Granularity::Minute => "minute",
        };
        f.write_str(name)
    }
}

/// A full-string matcher for one input shape.
struct DateMatcher {
    granularity: Granularity,
    regex: Regex,
}

impl DateMatcher {
    fn new(granularity: Granularity, pattern: &str) -> Self {
        Self {
            granularity,
            regex: Regex::new(pattern).expect("display date pattern is a valid regex"),
        }
    }

    /// Match the whole input, returning the captured numeric components.
    ///
    /// Components are `[year, month, day, hour, minute]`, with the ones this
    /// shape doesn't carry filled with the start of their period.
    fn components(&self, input: &str) -> Option<[u32; 5]> {
        let caps = self.regex.captures(input)?;
        let mut out = [0, 1, 1, 0, 0];
        for (slot, value) in out.iter_mut().enumerate() {
            if let Some(m) = caps.get(slot + 1) {
                *value = m.as_str().parse().ok()?;
            }
        }
        Some(out)
    }
}

// ASCII digits only: `\d` would also accept other Unicode digit classes.
static MATCHERS: Lazy<Vec<DateMatcher>> = Lazy::new(|| {
    vec![
        DateMatcher::new(
            Granularity::Minute,
            r"^([0-9]{4})\.([0-9]{1,2})\.([0-9]{1,2}) ([0-9]{1,2}):([0-9]{1,2})$",
        ),
        DateMatcher::new(
            Granularity::Hour,
            r"^([0-9]{4})\.([0-9]{1,2})\.([0-9]{1,2}) ([0-9]{1,2})$",
        ),
        DateMatcher::new(
            Granularity::Day,
            r"^([0-9]{4})\.([0-9]{1,2})\.([0-9]{1,2})$",
        ),
        DateMatcher::new(Granularity::Month, r"^([0-9]{4})\.([0-9]{1,2})$"),
        DateMatcher::new(Granularity::Year, r"^([0-9]{4})$"),
    ]
});

/// A user-entered date together with the precision it was entered at.
///
/// Invariant: `instant` is the start of the period named at `granularity`,
/// so `DisplayDate::parse(&d.format()) == Ok(d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayDate {
    granularity: Granularity,
    instant: DateTime<Utc>,
}

impl DisplayDate {
    /// Parse a display date string.
    ///
    /// Patterns are tried from most to least specific; the first one that
    /// matches the whole string decides the granularity.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::InvalidDateFormat(
                "display date cannot be empty".to_string(),
            ));
        }

        let (granularity, [year, month, day, hour, minute]) = MATCHERS
            .iter()
            .find_map(|m| m.components(input).map(|c| (m.granularity, c)))
            .ok_or_else(|| {
                Error::InvalidDateFormat(format!(
                    "can't parse date from: \"{}\"; expected YYYY, YYYY.mm, YYYY.mm.dd, \
                     YYYY.mm.dd HH or YYYY.mm.dd HH:MM",
                    input
                ))
            })?;

        let out_of_range =
            || Error::InvalidDateFormat(format!("date out of range: \"{}\"", input));
        if year == 0 {
            return Err(out_of_range());
        }
        let naive = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .ok_or_else(out_of_range)?;

        Ok(Self {
            granularity,
            instant: naive.and_utc(),
        })
    }

    /// Rebuild a display date from its persisted `(sort_date, display_date_format)`.
    ///
    /// The stored instant is the row's pagination key, so one carrying precision
    /// finer than its granularity is rejected rather than truncated.
    pub fn from_stored(sort_date: DateTime<Utc>, pattern: &str) -> Result<Self> {
        let granularity = Granularity::from_pattern(pattern).ok_or_else(|| {
            Error::Internal(format!("unknown display date format '{}'", pattern))
        })?;
        let date = Self::at(granularity, sort_date);
        if date.instant != sort_date {
            return Err(Error::Internal(format!(
                "stored sort date {} is not aligned to display format '{}'",
                sort_date.to_rfc3339(),
                pattern
            )));
        }
        Ok(date)
    }

    /// Build a display date for an instant, dropping precision finer than `granularity`.
    pub fn at(granularity: Granularity, instant: DateTime<Utc>) -> Self {
        Self {
            granularity,
            instant: granularity.truncate(instant.naive_utc()).and_utc(),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// The comparable instant used for ordering.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.instant
    }

    /// The persisted pattern for this date's granularity.
    pub fn pattern(&self) -> &'static str {
        self.granularity.pattern()
    }

    /// Canonical display string, showing only the components the user supplied.
    pub fn format(&self) -> String {
        self.instant.format(self.granularity.pattern()).to_string()
    }

    /// First instant after the period this date names.
    ///
    /// `2017` ends at `2018-01-01T00:00`, `2017.06.15 09` at `2017-06-15T10:00`.
    pub fn period_end(&self) -> Result<DateTime<Utc>> {
        let dt = self.instant.naive_utc();
        let end = match self.granularity {
            Granularity::Year => NaiveDate::from_ymd_opt(dt.year() + 1, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Granularity::Month => {
                let (year, month) = if dt.month() == 12 {
                    (dt.year() + 1, 1)
                } else {
                    (dt.year(), dt.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
            }
            Granularity::Day => dt.checked_add_signed(Duration::days(1)),
            Granularity::Hour => dt.checked_add_signed(Duration::hours(1)),
            Granularity::Minute => dt.checked_add_signed(Duration::minutes(1)),
        };
        end.map(|n| n.and_utc()).ok_or_else(|| {
            Error::InvalidDateFormat(format!("date out of range: \"{}\"", self.format()))
        })
    }
}

impl fmt::Display for DisplayDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for DisplayDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DisplayDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse_each_granularity() {
        let cases = [
            ("2017", Granularity::Year, utc(2017, 1, 1, 0, 0)),
            ("2017.06", Granularity::Month, utc(2017, 6, 1, 0, 0)),
            ("2017.06.15", Granularity::Day, utc(2017, 6, 15, 0, 0)),
            ("2017.06.15 09", Granularity::Hour, utc(2017, 6, 15, 9, 0)),
            ("2017.06.15 09:30", Granularity::Minute, utc(2017, 6, 15, 9, 30)),
        ];
        for (input, granularity, instant) in cases {
            let d = DisplayDate::parse(input).unwrap();
            assert_eq!(d.granularity(), granularity, "input {}", input);
            assert_eq!(d.sort_key(), instant, "input {}", input);
        }
    }

    #[test]
    fn test_format_never_reveals_zero_filled_components() {
        assert_eq!(DisplayDate::parse("2017").unwrap().format(), "2017");
        assert_eq!(DisplayDate::parse("2017.06").unwrap().format(), "2017.06");
        assert_eq!(
            DisplayDate::parse("2017.06.15 9").unwrap().format(),
            "2017.06.15 09"
        );
    }

    #[test]
    fn test_padding_is_normalized() {
        let short = DisplayDate::parse("2017.3.5").unwrap();
        let padded = DisplayDate::parse("2017.03.05").unwrap();
        assert_eq!(short, padded);
        assert_eq!(short.format(), "2017.03.05");
        assert_eq!(
            DisplayDate::parse("2017.3.5 7:5").unwrap().format(),
            "2017.03.05 07:05"
        );
    }

    #[test]
    fn test_round_trip_law() {
        let inputs = [
            ("1999", "1999"),
            ("2017.1", "2017.01"),
            ("2017.12", "2017.12"),
            ("2016.2.29", "2016.02.29"),
            ("2017.06.15 0", "2017.06.15 00"),
            ("2017.06.15 23:59", "2017.06.15 23:59"),
            ("0001.01.01 00:00", "0001.01.01 00:00"),
        ];
        for (input, canonical) in inputs {
            let parsed = DisplayDate::parse(input).unwrap();
            let formatted = parsed.format();
            assert_eq!(formatted, canonical);
            assert_eq!(DisplayDate::parse(&formatted).unwrap(), parsed);
        }
    }

    #[test]
    fn test_granularity_monotonicity() {
        let keys: Vec<_> = [
            "2017",
            "2017.06",
            "2017.06.15",
            "2017.06.15 9",
            "2017.06.15 09:30",
        ]
        .iter()
        .map(|s| DisplayDate::parse(s).unwrap().sort_key())
        .collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_rejects_garbage_and_empty() {
        for input in [
            "",
            " 2017",
            "2017 ",
            "17",
            "20170",
            "2017-06-15",
            "2017.06.15T09:30",
            "2017.06.15 09:30:00",
            "2017.",
            "2017.06.15 ",
            "yesterday",
            "２０１７",
        ] {
            let err = DisplayDate::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidDateFormat(_)),
                "expected InvalidDateFormat for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range_components() {
        for input in [
            "0000",
            "2017.0",
            "2017.13",
            "2017.02.29",
            "2017.04.31",
            "2017.06.00",
            "2017.06.15 24",
            "2017.06.15 23:60",
        ] {
            assert!(
                matches!(
                    DisplayDate::parse(input),
                    Err(Error::InvalidDateFormat(_))
                ),
                "expected InvalidDateFormat for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_from_stored_round_trips() {
        let d = DisplayDate::parse("2017.06").unwrap();
        let stored = DisplayDate::from_stored(d.sort_key(), d.pattern()).unwrap();
        assert_eq!(stored, d);
    }

    #[test]
    fn test_from_stored_rejects_unaligned_instant() {
        let err = DisplayDate::from_stored(utc(2017, 6, 15, 9, 30), "%Y.%m").unwrap_err();
        assert!(matches!(err, Error::Internal(msg) if msg.contains("not aligned")));

        let aligned = DisplayDate::from_stored(utc(2017, 6, 15, 9, 30), "%Y.%m.%d %H:%M").unwrap();
        assert_eq!(aligned.sort_key(), utc(2017, 6, 15, 9, 30));
    }

    #[test]
    fn test_from_stored_unknown_pattern() {
        let err = DisplayDate::from_stored(utc(2017, 1, 1, 0, 0), "%d/%m/%Y").unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_period_end() {
        let end = |s: &str| DisplayDate::parse(s).unwrap().period_end().unwrap();
        assert_eq!(end("2017"), utc(2018, 1, 1, 0, 0));
        assert_eq!(end("2017.12"), utc(2018, 1, 1, 0, 0));
        assert_eq!(end("2017.02"), utc(2017, 3, 1, 0, 0));
        assert_eq!(end("2017.02.28"), utc(2017, 3, 1, 0, 0));
        assert_eq!(end("2017.06.15 23"), utc(2017, 6, 16, 0, 0));
        assert_eq!(end("2017.06.15 09:59"), utc(2017, 6, 15, 10, 0));
    }

    #[test]
    fn test_pattern_lookup() {
        for g in Granularity::MOST_SPECIFIC_FIRST {
            assert_eq!(Granularity::from_pattern(g.pattern()), Some(g));
        }
        assert_eq!(Granularity::from_pattern("%Y-%m"), None);
    }

    #[test]
    fn test_serializes_as_display_string() {
        let d = DisplayDate::parse("2017.6.1").unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2017.06.01\"");
    }
}
