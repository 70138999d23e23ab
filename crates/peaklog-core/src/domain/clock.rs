//! Logical clock for syncable records
//!
//! Every record carries a `LastModified` marker: a UTC timestamp in a fixed
//! width, zero padded encoding (`YYYY-MM-DDTHH:MM:SS.mmmZ`) whose lexical
//! order equals chronological order. Conflict resolution never parses the
//! marker; it only compares strings.
//!
//! The encoding is enforced where markers are minted ([`LastModified::now`]
//! and [`LastModified::advance`]), not where they are compared. Markers that
//! arrive from the remote store or a backup file are kept verbatim.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::record::SyncableRecord;

/// Length of a canonical marker, e.g. `2024-01-01T00:00:00.000Z`
const CANONICAL_LEN: usize = 24;

/// Last-modified marker of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LastModified(String);

impl LastModified {
    /// Marker for the current instant
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Canonical marker for a given instant
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Parses a marker, requiring the canonical encoding
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTimestamp` when the string is not a
    /// fixed-width UTC timestamp with millisecond precision.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        if s.len() != CANONICAL_LEN || !s.ends_with('Z') {
            return Err(DomainError::InvalidTimestamp(s.to_string()));
        }
        DateTime::parse_from_rfc3339(s)
            .map_err(|e| DomainError::InvalidTimestamp(format!("{s}: {e}")))?;
        Ok(Self(s.to_string()))
    }

    /// Wraps a marker without validation
    ///
    /// Used for markers that originate outside this device. Ordering stays
    /// lexical.
    #[must_use]
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Next marker for a record whose current marker is `previous`
    ///
    /// Returns the current instant when it is already ahead of `previous`;
    /// otherwise returns a marker just past `previous`, so a mutation always
    /// moves the clock forward even when the local wall clock lags behind
    /// another device's.
    #[must_use]
    pub fn advance(previous: &LastModified) -> Self {
        Self::advance_at(previous, Utc::now())
    }

    fn advance_at(previous: &LastModified, now: DateTime<Utc>) -> Self {
        let candidate = Self::from_datetime(now);
        if candidate > *previous {
            return candidate;
        }

        if let Ok(prev) = DateTime::parse_from_rfc3339(&previous.0) {
            let prev = prev.with_timezone(&Utc);
            for step in [Duration::milliseconds(1), Duration::seconds(1)] {
                let bumped = Self::from_datetime(prev + step);
                if bumped > *previous {
                    return bumped;
                }
            }
        }

        // Opaque foreign marker: '~' sorts after every printable ASCII byte.
        Self(format!("{}~", previous.0))
    }

    /// Returns true if this marker lexically exceeds `other`
    pub fn is_newer_than(&self, other: &LastModified) -> bool {
        self.0.cmp(&other.0) == Ordering::Greater
    }

    /// Returns the marker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the marker back into an instant, if it is a timestamp
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Display for LastModified {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True iff `a` was modified strictly after `b`
///
/// Equal markers are "not newer", so callers that keep the existing copy on
/// `false` never oscillate between two copies carrying the same marker.
pub fn newer<R: SyncableRecord>(a: &R, b: &R) -> bool {
    a.last_modified().is_newer_than(b.last_modified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_now_is_canonical() {
        let marker = LastModified::now();
        assert_eq!(marker.as_str().len(), CANONICAL_LEN);
        assert!(LastModified::parse(marker.as_str()).is_ok());
    }

    #[test]
    fn test_from_datetime_is_zero_padded() {
        let marker = LastModified::from_datetime(at(2024, 1, 2, 3, 4, 5));
        assert_eq!(marker.as_str(), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        assert!(LastModified::parse("2024-01-01T00:00:00Z").is_err());
        assert!(LastModified::parse("2024-1-1T00:00:00.000Z").is_err());
        assert!(LastModified::parse("2024-01-01T00:00:00.000+09:00").is_err());
        assert!(LastModified::parse("not a timestamp at all!!").is_err());
    }

    #[test]
    fn test_lexical_order_matches_chronological_order() {
        let earlier = LastModified::from_datetime(at(2024, 9, 30, 23, 59, 59));
        let later = LastModified::from_datetime(at(2024, 10, 1, 0, 0, 0));
        assert!(later.is_newer_than(&earlier));
        assert!(!earlier.is_newer_than(&later));
    }

    #[test]
    fn test_equal_markers_are_not_newer() {
        let a = LastModified::from_raw("2024-01-01T00:00:00.000Z");
        let b = a.clone();
        assert!(!a.is_newer_than(&b));
        assert!(!b.is_newer_than(&a));
    }

    #[test]
    fn test_advance_uses_wall_clock_when_ahead() {
        let previous = LastModified::from_datetime(at(2024, 1, 1, 0, 0, 0));
        let now = at(2024, 6, 1, 12, 0, 0);
        let next = LastModified::advance_at(&previous, now);
        assert_eq!(next, LastModified::from_datetime(now));
    }

    #[test]
    fn test_advance_bumps_past_a_future_marker() {
        // Another device with a fast clock wrote this marker.
        let previous = LastModified::from_datetime(at(2030, 1, 1, 0, 0, 0));
        let next = LastModified::advance_at(&previous, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(next.as_str(), "2030-01-01T00:00:00.001Z");
        assert!(next.is_newer_than(&previous));
    }

    #[test]
    fn test_advance_handles_second_precision_foreign_marker() {
        // '.' sorts before 'Z', so a millisecond bump is not enough here.
        let previous = LastModified::from_raw("2030-01-01T00:00:00Z");
        let next = LastModified::advance_at(&previous, at(2024, 1, 1, 0, 0, 0));
        assert!(next.is_newer_than(&previous));
        assert_eq!(next.as_str(), "2030-01-01T00:00:01.000Z");
    }

    #[test]
    fn test_advance_handles_opaque_marker() {
        let previous = LastModified::from_raw("~~~~");
        let next = LastModified::advance_at(&previous, at(2024, 1, 1, 0, 0, 0));
        assert!(next.is_newer_than(&previous));
    }

    #[test]
    fn test_to_datetime_round_trips() {
        let instant = at(2025, 3, 1, 8, 30, 0);
        let marker = LastModified::from_datetime(instant);
        assert_eq!(marker.to_datetime(), Some(instant));
        assert_eq!(LastModified::from_raw("T2").to_datetime(), None);
    }
}
