//! List filters and their fingerprints.
//!
//! A list request selects bookmarks either by topic membership or by a
//! sort-date range. Each filter reduces to a deterministic fingerprint so a
//! pagination cursor issued under one filter can be recognized and rejected
//! when replayed under another.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::defaults;
use crate::display_date::DisplayDate;
use crate::error::{Error, Result};

/// Length in bytes of a filter fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Deterministic hash of a filter's normalized contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterFingerprint([u8; FINGERPRINT_LEN]);

impl FilterFingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl fmt::Display for FilterFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Bookmarks carrying at least one of `topics`. An empty set selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilter {
    pub topics: BTreeSet<String>,
}

impl TopicFilter {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// The "no filter" case: every bookmark.
    pub fn all() -> Self {
        Self::default()
    }
}

/// Bookmarks whose sort date falls in `[start, end)`; no `end` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeFilter {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRangeFilter {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if let Some(end) = end {
            if end <= start {
                return Err(Error::InvalidInput(format!(
                    "date range end ({}) must be after start ({})",
                    end.to_rfc3339(),
                    start.to_rfc3339()
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Build a range from user-facing display dates.
    ///
    /// `end` is inclusive of the whole period it names: `end=2017.06` keeps
    /// everything dated in June 2017.
    pub fn from_display_dates(start: &DisplayDate, end: Option<&DisplayDate>) -> Result<Self> {
        let end = end.map(DisplayDate::period_end).transpose()?;
        Self::new(start.sort_key(), end)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && self.end.map_or(true, |end| instant < end)
    }
}

/// The filter applied to a list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookmarkFilter {
    Topics(TopicFilter),
    DateRange(DateRangeFilter),
}

impl Default for BookmarkFilter {
    fn default() -> Self {
        BookmarkFilter::Topics(TopicFilter::all())
    }
}

impl BookmarkFilter {
    /// Build a filter from already-split request parameters.
    ///
    /// Topic and date-range filtering are mutually exclusive; with neither,
    /// every bookmark is selected.
    pub fn from_params(
        topics: Vec<String>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self> {
        match (start, end) {
            (None, None) => {
                if topics.len() > defaults::FILTER_MAX_TOPICS {
                    return Err(Error::InvalidInput(format!(
                        "at most {} topics may be filtered on",
                        defaults::FILTER_MAX_TOPICS
                    )));
                }
                Ok(BookmarkFilter::Topics(TopicFilter::new(topics)))
            }
            (Some(_), _) if !topics.is_empty() => Err(Error::InvalidInput(
                "topic and date range filters cannot be combined".to_string(),
            )),
            (None, Some(_)) => Err(Error::InvalidInput(
                "end requires start".to_string(),
            )),
            (Some(start), end) => {
                let start = DisplayDate::parse(start)?;
                let end = end.map(DisplayDate::parse).transpose()?;
                Ok(BookmarkFilter::DateRange(DateRangeFilter::from_display_dates(
                    &start,
                    end.as_ref(),
                )?))
            }
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            BookmarkFilter::Topics(_) => "topics",
            BookmarkFilter::DateRange(_) => "date_range",
        }
    }

    /// Whether a `COUNT` over this filter is expected to be cheap.
    ///
    /// Narrow filters name at least one topic or close the date range.
    pub fn is_narrow(&self) -> bool {
        match self {
            BookmarkFilter::Topics(t) => !t.topics.is_empty(),
            BookmarkFilter::DateRange(r) => r.end.is_some(),
        }
    }

    /// Deterministic fingerprint of the normalized filter.
    ///
    /// Topics are hashed as a sorted, de-duplicated set; instants as
    /// microseconds since the Unix epoch. Each field is length- or
    /// tag-delimited so distinct filters never share an encoding.
    pub fn fingerprint(&self) -> FilterFingerprint {
        let mut hasher = Sha256::new();
        match self {
            BookmarkFilter::Topics(filter) => {
                hasher.update(b"topics:v1");
                hasher.update((filter.topics.len() as u64).to_be_bytes());
                for topic in &filter.topics {
                    hasher.update((topic.len() as u64).to_be_bytes());
                    hasher.update(topic.as_bytes());
                }
            }
            BookmarkFilter::DateRange(range) => {
                hasher.update(b"date_range:v1");
                hasher.update(range.start.timestamp_micros().to_be_bytes());
                match range.end {
                    Some(end) => {
                        hasher.update([1u8]);
                        hasher.update(end.timestamp_micros().to_be_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&digest[..FINGERPRINT_LEN]);
        FilterFingerprint(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_topic_fingerprint_ignores_order_and_duplicates() {
        let a = BookmarkFilter::Topics(TopicFilter::new(["rust", "go", "rust"]));
        let b = BookmarkFilter::Topics(TopicFilter::new(["go", "rust"]));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_topic_fingerprint_distinguishes_sets() {
        let a = BookmarkFilter::Topics(TopicFilter::new(["a"]));
        let b = BookmarkFilter::Topics(TopicFilter::new(["b"]));
        let ab = BookmarkFilter::Topics(TopicFilter::new(["a", "b"]));
        let joined = BookmarkFilter::Topics(TopicFilter::new(["ab"]));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), ab.fingerprint());
        assert_ne!(ab.fingerprint(), joined.fingerprint());
    }

    #[test]
    fn test_topics_are_case_sensitive() {
        let lower = BookmarkFilter::Topics(TopicFilter::new(["rust"]));
        let upper = BookmarkFilter::Topics(TopicFilter::new(["Rust"]));
        assert_ne!(lower.fingerprint(), upper.fingerprint());
    }

    #[test]
    fn test_range_fingerprint() {
        let open = BookmarkFilter::DateRange(DateRangeFilter::new(utc(2017, 1, 1), None).unwrap());
        let closed = BookmarkFilter::DateRange(
            DateRangeFilter::new(utc(2017, 1, 1), Some(utc(2018, 1, 1))).unwrap(),
        );
        let same = BookmarkFilter::DateRange(
            DateRangeFilter::new(utc(2017, 1, 1), Some(utc(2018, 1, 1))).unwrap(),
        );
        assert_ne!(open.fingerprint(), closed.fingerprint());
        assert_eq!(closed.fingerprint(), same.fingerprint());
        assert_ne!(
            open.fingerprint(),
            BookmarkFilter::Topics(TopicFilter::all()).fingerprint()
        );
    }

    #[test]
    fn test_fingerprint_displays_as_hex() {
        let fp = BookmarkFilter::default().fingerprint();
        let shown = fp.to_string();
        assert_eq!(shown.len(), FINGERPRINT_LEN * 2);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let err = DateRangeFilter::new(utc(2018, 1, 1), Some(utc(2017, 1, 1))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(DateRangeFilter::new(utc(2017, 1, 1), Some(utc(2017, 1, 1))).is_err());
    }

    #[test]
    fn test_range_end_covers_named_period() {
        let filter = BookmarkFilter::from_params(vec![], Some("2017"), Some("2017.06")).unwrap();
        let BookmarkFilter::DateRange(range) = filter else {
            panic!("expected date range filter");
        };
        assert_eq!(range.start, utc(2017, 1, 1));
        assert_eq!(range.end, Some(utc(2017, 7, 1)));
        assert!(range.contains(Utc.with_ymd_and_hms(2017, 6, 30, 23, 59, 0).unwrap()));
        assert!(!range.contains(utc(2017, 7, 1)));
        assert!(!range.contains(Utc.with_ymd_and_hms(2016, 12, 31, 23, 59, 0).unwrap()));
    }

    #[test]
    fn test_single_period_range() {
        let filter = BookmarkFilter::from_params(vec![], Some("2017.06"), Some("2017.06")).unwrap();
        let BookmarkFilter::DateRange(range) = filter else {
            panic!("expected date range filter");
        };
        assert_eq!(range.start, utc(2017, 6, 1));
        assert_eq!(range.end, Some(utc(2017, 7, 1)));
    }

    #[test]
    fn test_from_params_defaults_to_all() {
        let filter = BookmarkFilter::from_params(vec![], None, None).unwrap();
        assert_eq!(filter, BookmarkFilter::default());
        assert!(!filter.is_narrow());
    }

    #[test]
    fn test_from_params_rejects_mixed_filters() {
        let err = BookmarkFilter::from_params(vec!["a".into()], Some("2017"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_params_rejects_end_without_start() {
        let err = BookmarkFilter::from_params(vec![], None, Some("2017")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_params_propagates_date_errors() {
        let err = BookmarkFilter::from_params(vec![], Some("2017.13"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidDateFormat(_)));
    }

    #[test]
    fn test_narrow_filters() {
        assert!(BookmarkFilter::Topics(TopicFilter::new(["a"])).is_narrow());
        let open = DateRangeFilter::new(utc(2017, 1, 1), None).unwrap();
        assert!(!BookmarkFilter::DateRange(open).is_narrow());
        let closed = DateRangeFilter::new(utc(2017, 1, 1), Some(utc(2017, 2, 1))).unwrap();
        assert!(BookmarkFilter::DateRange(closed).is_narrow());
    }
}
