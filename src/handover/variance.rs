use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::models::HandoverStatus;

/// Tolerance for the gap between what should have been handed over and
/// what was counted. A count passes only when it is inside both limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariancePolicy {
    /// Inclusive ceiling on |actual - expected| / expected.
    pub max_relative: Decimal,
    /// Exclusive ceiling on |actual - expected|, in currency units.
    pub max_absolute: Decimal,
}

impl Default for VariancePolicy {
    fn default() -> Self {
        Self {
            max_relative: Decimal::new(2, 2),
            max_absolute: Decimal::from(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variance {
    /// actual - expected; negative means cash went missing.
    pub difference: Decimal,
    /// None when the ratio does not fit in a decimal.
    pub relative: Option<Decimal>,
    pub status: HandoverStatus,
}

impl VariancePolicy {
    pub fn new(max_relative: Decimal, max_absolute: Decimal) -> Self {
        Self { max_relative, max_absolute }
    }

    pub fn assess(&self, expected: Decimal, actual: Decimal) -> Variance {
        let difference = actual - expected;
        let diff = difference.abs();
        let relative = if expected.is_zero() {
            Some(Decimal::ZERO)
        } else {
            diff.checked_div(expected.abs())
        };

        let within_relative = relative.is_some_and(|r| r <= self.max_relative);
        let within_absolute = diff < self.max_absolute;

        let status = if within_relative && within_absolute {
            HandoverStatus::Confirmed
        } else {
            HandoverStatus::Disputed
        };

        Variance { difference, relative, status }
    }

    pub fn classify(&self, expected: Decimal, actual: Decimal) -> HandoverStatus {
        self.assess(expected, actual).status
    }

    pub fn within_tolerance(&self, expected: Decimal, actual: Decimal) -> bool {
        self.classify(expected, actual) == HandoverStatus::Confirmed
    }
}
