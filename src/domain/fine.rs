use crate::error::{LibraryError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fine charged for each day a loan is returned after its due date.
pub const DEFAULT_FINE_PER_DAY: Decimal = dec!(0.50);

/// A non-negative monetary penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fine(Decimal);

impl Fine {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LibraryError::ValidationError(
                "Fine must not be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Fine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// The per-day fine policy.
///
/// Dates are compared at day granularity; returning on or before the due date
/// costs nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineRule {
    per_day: Decimal,
}

impl Default for FineRule {
    fn default() -> Self {
        Self {
            per_day: DEFAULT_FINE_PER_DAY,
        }
    }
}

impl FineRule {
    pub fn new(per_day: Decimal) -> Result<Self> {
        if per_day < Decimal::ZERO {
            return Err(LibraryError::ValidationError(
                "Fine per day must not be negative".to_string(),
            ));
        }
        Ok(Self { per_day })
    }

    pub fn per_day(&self) -> Decimal {
        self.per_day
    }

    pub fn calculate(&self, due_date: NaiveDate, return_date: NaiveDate) -> Fine {
        let days_late = days_late(due_date, return_date);
        if days_late == 0 {
            return Fine::ZERO;
        }
        Fine(self.per_day * Decimal::from(days_late))
    }
}

/// Whole days between `due_date` and `return_date`, zero when not late.
pub fn days_late(due_date: NaiveDate, return_date: NaiveDate) -> i64 {
    return_date
        .signed_duration_since(due_date)
        .num_days()
        .max(0)
}

/// Fine under the default policy of 0.50 per day late.
pub fn calculate_fine(due_date: NaiveDate, return_date: NaiveDate) -> Fine {
    FineRule::default().calculate(due_date, return_date)
}
