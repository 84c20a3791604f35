//! Half-open booking interval `[start, end)`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;

const SECONDS_PER_DAY: i64 = 86_400;

/// A validated half-open interval `[start, end)`.
///
/// `end` itself is not part of the stay, so a range ending at midnight on the
/// 3rd and another starting at that same midnight do not overlap. Every range
/// spans at least one full day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

impl DateRange {
    /// Minimum span of a booking.
    pub fn minimum_span() -> Duration {
        Duration::days(1)
    }

    /// Creates a new DateRange, rejecting inverted or sub-day intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::InvalidInterval(
                "start date must be before end date".into(),
            ));
        }
        if end - start < Self::minimum_span() {
            return Err(DomainError::InvalidInterval(
                "booking must span at least one day".into(),
            ));
        }
        Ok(Self {
            start_date: start,
            end_date: end,
        })
    }

    /// Returns the inclusive start of the range.
    pub fn start(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Returns the exclusive end of the range.
    pub fn end(&self) -> DateTime<Utc> {
        self.end_date
    }

    /// True when the two half-open ranges share any instant.
    ///
    /// Ranges that merely touch (one ends exactly where the other starts)
    /// do not overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start_date < other.end_date && self.end_date > other.start_date
    }

    /// Number of billable days, rounding partial days up.
    pub fn number_of_days(&self) -> i64 {
        // `i64::div_ceil` is unstable (int_roundings); this is its exact
        // expansion for a positive divisor.
        let seconds = (self.end_date - self.start_date).num_seconds();
        let days = seconds / SECONDS_PER_DAY;
        if seconds % SECONDS_PER_DAY > 0 {
            days + 1
        } else {
            days
        }
    }
}
