//! Type-safe monetary value with embedded currency.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::DomainError;

/// Currencies supported by the booking service.
///
/// Serialized uppercase; lowercase aliases are accepted on input because
/// payment gateways spell currency codes in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[serde(alias = "usd")]
    USD,
    #[serde(alias = "eur")]
    EUR,
    #[serde(alias = "gbp")]
    GBP,
    #[serde(alias = "inr")]
    INR,
}

impl Currency {
    /// Returns the lowercase ISO code used on the payment gateway wire.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::INR => "inr",
        }
    }

    /// Returns the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::INR => "₹",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Type-safe money representation with embedded currency.
///
/// Amount is stored in the smallest unit of the currency (cents, paise, etc.)
/// to avoid floating-point precision issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value.
    pub fn new(amount: i64, currency: Currency) -> Result<Self, DomainError> {
        if amount < 0 {
            return Err(DomainError::NegativeAmount);
        }
        Ok(Self { amount, currency })
    }

    /// Creates a zero-value Money for the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Returns the amount in smallest currency unit.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Checked addition - returns error if currencies don't match.
    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(DomainError::AmountOverflow)?;
        Ok(Money {
            amount,
            currency: self.currency,
        })
    }

    /// Checked multiplication by a non-negative scalar (days, quantity).
    pub fn checked_mul(&self, factor: i64) -> Result<Money, DomainError> {
        if factor < 0 {
            return Err(DomainError::NegativeAmount);
        }
        let amount = self
            .amount
            .checked_mul(factor)
            .ok_or(DomainError::AmountOverflow)?;
        Ok(Money {
            amount,
            currency: self.currency,
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.amount / 100;
        let minor = (self.amount % 100).abs();
        write!(f, "{}{}.{:02}", self.currency.symbol(), major, minor)
    }
}
