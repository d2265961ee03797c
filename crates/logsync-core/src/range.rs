//! Range: an inclusive interval of sequence numbers.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// An inclusive integer interval `[low, high]` with `low <= high`.
///
/// Textual form is `"n"` for a single value and `"low-high"` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    low: i64,
    high: i64,
}

impl Range {
    /// A range covering a single value.
    pub const fn single(n: i64) -> Self {
        Self { low: n, high: n }
    }

    /// A range covering `low..=high`.
    pub fn new(low: i64, high: i64) -> Result<Self> {
        if low > high {
            return Err(CoreError::range(
                &format!("{}-{}", low, high),
                "low is greater than high",
            ));
        }
        Ok(Self { low, high })
    }

    /// Construct without checking the invariant. Callers guarantee `low <= high`.
    pub(crate) const fn new_unchecked(low: i64, high: i64) -> Self {
        Self { low, high }
    }

    /// Parse `"n"` or `"low-high"`.
    pub fn parse(repr: &str) -> Result<Self> {
        let parse_bound = |s: &str| {
            s.parse::<i64>()
                .map_err(|e| CoreError::range(repr, format!("bad number {:?}: {}", s, e)))
        };

        // A leading '-' is the sign of the low bound, not the separator.
        let separator = repr
            .get(1..)
            .and_then(|rest| rest.find('-'))
            .map(|i| i + 1);

        match separator.map(|i| (&repr[..i], &repr[i + 1..])) {
            Some((low, high)) => {
                let low = parse_bound(low)?;
                let high = parse_bound(high)?;
                if low > high {
                    return Err(CoreError::range(repr, "low is greater than high"));
                }
                Ok(Self { low, high })
            }
            None => Ok(Self::single(parse_bound(repr)?)),
        }
    }

    pub const fn low(&self) -> i64 {
        self.low
    }

    pub const fn high(&self) -> i64 {
        self.high
    }

    /// Move the lower bound. If it passes `high`, `high` snaps up to it.
    pub fn set_low(&mut self, low: i64) {
        self.low = low;
        if self.high < low {
            self.high = low;
        }
    }

    /// Move the upper bound. If it drops below `low`, `low` snaps down to it.
    pub fn set_high(&mut self, high: i64) {
        self.high = high;
        if self.low > high {
            self.low = high;
        }
    }

    pub const fn contains(&self, n: i64) -> bool {
        self.low <= n && n <= self.high
    }

    /// Number of values covered, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        (self.high as i128 - self.low as i128 + 1).min(u64::MAX as i128) as u64
    }

    /// Always false; a range covers at least one value.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The wire representation.
    pub fn to_representation(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

impl FromStr for Range {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
