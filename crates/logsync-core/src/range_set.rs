//! SortedRangeSet: a compact set of sequence numbers.
//!
//! A set is stored as an ascending list of disjoint [`Range`]s, so a log
//! holding ids `1..=1_000_000` with a single hole costs two ranges, not a
//! million entries. Set difference walks both range lists once and never
//! touches individual integers.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::range::Range;

const FULL_RANGES: &[Range] = &[Range::new_unchecked(0, i64::MAX)];

/// The set of every non-negative sequence number.
///
/// Used as the "send me everything" marker: any finite set diffed out of it
/// leaves the rest of the id space.
pub const FULL_SET: SortedRangeSet = SortedRangeSet {
    ranges: Cow::Borrowed(FULL_RANGES),
};

/// An ordered set of disjoint ranges.
///
/// Invariant: ranges are ascending and never overlap. Output of
/// [`from_values`](Self::from_values) and [`difference`](Self::difference)
/// is additionally coalesced (no two ranges are adjacent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SortedRangeSet {
    ranges: Cow<'static, [Range]>,
}

impl SortedRangeSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self {
            ranges: Cow::Borrowed(&[]),
        }
    }

    /// Parse a comma separated representation such as `"1,3,5-8"`.
    ///
    /// The empty string is the empty set. Tokens must be ascending and must
    /// not overlap; adjacent tokens are kept as written.
    pub fn parse(repr: &str) -> Result<Self> {
        if repr.is_empty() {
            return Ok(Self::empty());
        }

        let mut ranges: Vec<Range> = Vec::new();
        for token in repr.split(',') {
            let range = Range::parse(token)
                .map_err(|e| CoreError::range_set(repr, e.to_string()))?;
            if let Some(prev) = ranges.last() {
                if range.low() <= prev.high() {
                    return Err(CoreError::range_set(
                        repr,
                        format!("range {} is out of order or overlaps {}", range, prev),
                    ));
                }
            }
            ranges.push(range);
        }

        Ok(Self {
            ranges: Cow::Owned(ranges),
        })
    }

    /// Build a set from arbitrary values. Order and duplicates do not matter.
    pub fn from_values(values: &[i64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges = Vec::new();
        for value in sorted {
            push_coalesced(&mut ranges, value, value);
        }
        Self {
            ranges: Cow::Owned(ranges),
        }
    }

    /// Build a set from ranges that are already ascending and disjoint.
    pub fn from_ranges(ranges: Vec<Range>) -> Result<Self> {
        for pair in ranges.windows(2) {
            if pair[1].low() <= pair[0].high() {
                return Err(CoreError::range_set(
                    &format!("{},{}", pair[0], pair[1]),
                    "ranges are out of order or overlap",
                ));
            }
        }
        Ok(Self {
            ranges: Cow::Owned(ranges),
        })
    }

    /// Build a set from a single range.
    pub fn from_range(range: Range) -> Self {
        Self {
            ranges: Cow::Owned(vec![range]),
        }
    }

    /// The underlying ranges, ascending.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of integers covered, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.len()))
    }

    /// Smallest covered value.
    pub fn low(&self) -> Option<i64> {
        self.ranges.first().map(Range::low)
    }

    /// Largest covered value.
    pub fn high(&self) -> Option<i64> {
        self.ranges.last().map(Range::high)
    }

    pub fn is_full(&self) -> bool {
        *self == FULL_SET
    }

    pub fn contains(&self, n: i64) -> bool {
        // First range whose high is >= n is the only candidate.
        let idx = self.ranges.partition_point(|r| r.high() < n);
        self.ranges.get(idx).is_some_and(|r| r.contains(n))
    }

    /// Lazily yield every covered integer in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            ranges: self.ranges.iter(),
            current: None,
        }
    }

    /// Values in `self` that are absent from `other`.
    ///
    /// Cost is linear in the number of ranges on both sides.
    pub fn difference(&self, other: &SortedRangeSet) -> SortedRangeSet {
        let other = other.ranges();
        let mut out: Vec<Range> = Vec::new();
        let mut j = 0;

        for range in self.ranges.iter() {
            let mut low = range.low();
            let high = range.high();

            while j < other.len() && other[j].high() < low {
                j += 1;
            }

            let mut k = j;
            loop {
                match other.get(k) {
                    Some(cover) if cover.low() <= high => {
                        if cover.low() > low {
                            push_coalesced(&mut out, low, cover.low() - 1);
                        }
                        if cover.high() >= high {
                            break;
                        }
                        low = cover.high() + 1;
                        k += 1;
                    }
                    _ => {
                        push_coalesced(&mut out, low, high);
                        break;
                    }
                }
            }
        }

        SortedRangeSet {
            ranges: Cow::Owned(out),
        }
    }

    /// Values present in `dest` that are absent from `self`.
    ///
    /// `self` is the side that already holds its values; the result is what
    /// `dest` has that `self` lacks. `"1-20".diff_dest("5-25")` is `"21-25"`.
    pub fn diff_dest(&self, dest: &SortedRangeSet) -> SortedRangeSet {
        dest.difference(self)
    }

    /// The wire representation, e.g. `"1-4,6,8,10-20"`.
    pub fn to_representation(&self) -> String {
        self.to_string()
    }
}

/// Append `low..=high` to an ascending list, merging with an adjacent tail.
fn push_coalesced(ranges: &mut Vec<Range>, low: i64, high: i64) {
    if let Some(last) = ranges.last_mut() {
        if last.high().checked_add(1) == Some(low) {
            last.set_high(high);
            return;
        }
    }
    ranges.push(Range::new_unchecked(low, high));
}

impl fmt::Display for SortedRangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}

impl FromStr for SortedRangeSet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'a> IntoIterator for &'a SortedRangeSet {
    type Item = i64;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Ascending iterator over every integer in a [`SortedRangeSet`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    ranges: std::slice::Iter<'a, Range>,
    /// Next value to yield and the end of the range it belongs to.
    current: Option<(i64, i64)>,
}

impl Iterator for Iter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        loop {
            if let Some((next, high)) = self.current {
                self.current = if next < high {
                    Some((next + 1, high))
                } else {
                    None
                };
                return Some(next);
            }
            let range = self.ranges.next()?;
            self.current = Some((range.low(), range.high()));
        }
    }
}
