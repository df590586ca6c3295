//! Time-series price data: intraday/daily bars and the find-closest lookup.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single bar in an intraday or resampled series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// RFC3339 UTC timestamp of the bar.
    pub timestamp: DateTime<Utc>,
    /// Closing price; always finite.
    pub close: f64,
}

/// An ascending-by-timestamp sequence of [`SeriesPoint`]s.
///
/// Invariant: monotonic non-decreasing timestamps, no duplicate timestamps. Construction
/// helpers enforce this; callers that receive unsorted data from a provider should go
/// through [`Series::from_unsorted`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series(Vec<SeriesPoint>);

impl Series {
    /// Build a series from points already known to be ascending and deduplicated.
    #[must_use]
    pub fn new_ascending(points: Vec<SeriesPoint>) -> Self {
        Self(points)
    }

    /// Build a series from points in unknown order, sorting and deduplicating by timestamp
    /// (keeping the last occurrence of each timestamp).
    #[must_use]
    pub fn from_unsorted(mut points: Vec<SeriesPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self(points)
    }

    /// Borrow the underlying ascending slice.
    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.0
    }

    /// True if the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.0.last()
    }

    /// Find the point whose timestamp is the greatest not exceeding `target`.
    ///
    /// Algorithm (§4.10): walk from the end backward; the first point with
    /// `ts <= target` is the match. If none qualifies, fall through to the earliest
    /// point. Empty series yields `None`. Exact ties match.
    #[must_use]
    pub fn find_closest(&self, target: DateTime<Utc>) -> Option<&SeriesPoint> {
        find_closest(&self.0, target)
    }
}

/// Find-closest over an arbitrary ascending slice, reused by [`Series::find_closest`] and
/// by daily-series lookups after they are projected to timestamps.
#[must_use]
pub fn find_closest(ascending: &[SeriesPoint], target: DateTime<Utc>) -> Option<&SeriesPoint> {
    if ascending.is_empty() {
        return None;
    }
    ascending
        .iter()
        .rev()
        .find(|p| p.timestamp <= target)
        .or_else(|| ascending.first())
}

/// A daily bar keyed by calendar date rather than timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    /// Calendar date (YYYY-MM-DD), timezone-naive.
    pub date: NaiveDate,
    /// Closing price; always finite.
    pub close: f64,
}

/// An ascending-by-date sequence of daily bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries(Vec<DailyPoint>);

/// Hour (UTC) imputed onto a daily bar's date when it needs to be compared against a
/// timestamp target (§3: "16:00 UTC is imputed for timestamp comparisons").
pub const DAILY_BAR_IMPUTED_HOUR_UTC: u32 = 16;

impl DailySeries {
    /// Build a series from points already known to be ascending.
    #[must_use]
    pub fn new_ascending(points: Vec<DailyPoint>) -> Self {
        Self(points)
    }

    /// Build from unsorted rows (e.g. freshly parsed CSV), sorting by date and
    /// deduplicating (last occurrence of a date wins).
    #[must_use]
    pub fn from_unsorted(mut points: Vec<DailyPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self(points)
    }

    /// Borrow the underlying ascending slice.
    #[must_use]
    pub fn points(&self) -> &[DailyPoint] {
        &self.0
    }

    /// True if the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&DailyPoint> {
        self.0.last()
    }

    /// Project every daily bar onto a UTC timestamp using [`DAILY_BAR_IMPUTED_HOUR_UTC`],
    /// then run the same find-closest algorithm as [`Series::find_closest`].
    #[must_use]
    pub fn find_closest(&self, target: DateTime<Utc>) -> Option<SeriesPoint> {
        let projected: Vec<SeriesPoint> = self
            .0
            .iter()
            .map(|p| SeriesPoint {
                timestamp: impute_daily_timestamp(p.date),
                close: p.close,
            })
            .collect();
        find_closest(&projected, target).copied()
    }
}

/// Impute a UTC timestamp for a daily bar's date at [`DAILY_BAR_IMPUTED_HOUR_UTC`].
#[must_use]
pub fn impute_daily_timestamp(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(DAILY_BAR_IMPUTED_HOUR_UTC, 0, 0).expect("valid hour"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pt(h: u32, close: f64) -> SeriesPoint {
        SeriesPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap(),
            close,
        }
    }

    #[test]
    fn find_closest_walks_backward_to_first_le() {
        let s = Series::new_ascending(vec![pt(9, 1.0), pt(10, 2.0), pt(11, 3.0)]);
        let target = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(s.find_closest(target).unwrap().close, 2.0);
    }

    #[test]
    fn find_closest_ties_match_exactly() {
        let s = Series::new_ascending(vec![pt(9, 1.0), pt(10, 2.0)]);
        let target = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(s.find_closest(target).unwrap().close, 2.0);
    }

    #[test]
    fn find_closest_falls_through_to_earliest_when_all_after_target() {
        let s = Series::new_ascending(vec![pt(9, 1.0), pt(10, 2.0)]);
        let target = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();
        assert_eq!(s.find_closest(target).unwrap().close, 1.0);
    }

    #[test]
    fn find_closest_empty_series_is_none() {
        let s = Series::default();
        assert!(s.find_closest(Utc::now()).is_none());
    }

    proptest::proptest! {
        #[test]
        fn find_closest_is_monotone(
            offsets in proptest::collection::vec(0i64..100_000, 1..20),
            t1_off in 0i64..100_000,
            t2_off in 0i64..100_000,
        ) {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut seen = std::collections::BTreeSet::new();
            let mut points = Vec::new();
            for off in offsets {
                if seen.insert(off) {
                    points.push(SeriesPoint { timestamp: base + chrono::Duration::seconds(off), close: 1.0 });
                }
            }
            points.sort_by_key(|p| p.timestamp);
            let series = Series::new_ascending(points);

            let (lo, hi) = if t1_off <= t2_off { (t1_off, t2_off) } else { (t2_off, t1_off) };
            let t1 = base + chrono::Duration::seconds(lo);
            let t2 = base + chrono::Duration::seconds(hi);
            if let (Some(m1), Some(m2)) = (series.find_closest(t1), series.find_closest(t2)) {
                proptest::prop_assert!(m1.timestamp <= m2.timestamp);
            }
        }
    }
}
