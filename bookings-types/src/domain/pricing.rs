//! Deterministic booking price calculation.
//!
//! `total = unit_rate * quantity * number_of_days + service_fee + tax`, all
//! in checked integer arithmetic on the smallest currency unit. Fee and tax
//! lines are produced by a pluggable [`FeePolicy`]; the default policy
//! charges nothing for either.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::date_range::DateRange;
use super::money::Money;
use crate::error::DomainError;

/// Computes the fee lines added on top of the base charge.
pub trait FeePolicy: Send + Sync {
    /// Service fee for a given base amount.
    fn service_fee(&self, base: Money) -> Result<Money, DomainError>;

    /// Tax for a given base amount.
    fn tax(&self, base: Money) -> Result<Money, DomainError>;
}

/// Fee policy that charges no service fee and no tax.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroFees;

impl FeePolicy for ZeroFees {
    fn service_fee(&self, base: Money) -> Result<Money, DomainError> {
        Ok(Money::zero(base.currency()))
    }

    fn tax(&self, base: Money) -> Result<Money, DomainError> {
        Ok(Money::zero(base.currency()))
    }
}

/// Fully priced booking, ready to be recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    /// Billable days in the range
    pub number_of_days: i64,
    /// Per-day rate the quote was computed from
    pub unit_rate: Money,
    /// Number of units booked
    pub quantity: i64,
    /// Service fee line
    pub service_fee: Money,
    /// Tax line
    pub tax: Money,
    /// Grand total
    pub total: Money,
}

/// Prices a booking for the given rate, quantity and date range.
pub fn quote(
    unit_rate: Money,
    quantity: i64,
    range: &DateRange,
    fees: &dyn FeePolicy,
) -> Result<Quote, DomainError> {
    if quantity < 1 {
        return Err(DomainError::InvalidQuantity(quantity));
    }
    let number_of_days = range.number_of_days();
    let base = unit_rate
        .checked_mul(quantity)?
        .checked_mul(number_of_days)?;
    let service_fee = fees.service_fee(base)?;
    let tax = fees.tax(base)?;
    let total = base.checked_add(service_fee)?.checked_add(tax)?;
    Ok(Quote {
        number_of_days,
        unit_rate,
        quantity,
        service_fee,
        tax,
        total,
    })
}
