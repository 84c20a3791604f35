//! Booking domain model and the payment state machine attached to it.

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::date_range::DateRange;
use super::money::Money;
use super::pricing::Quote;
use super::space::SpaceId;
use super::user::UserId;

/// Unique identifier for a Booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random BookingId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a BookingId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BookingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Human-facing booking reference handed to the renter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ConfirmationCode(String);

impl ConfirmationCode {
    /// Length of a generated confirmation code.
    pub const LEN: usize = 12;

    /// Generates a fresh random alphanumeric code.
    pub fn generate() -> Self {
        let code: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(Self::LEN)
            .map(char::from)
            .collect();
        Self(code)
    }

    /// Wraps a code read back from storage.
    pub fn from_string(code: String) -> Self {
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment lifecycle of a booking.
///
/// ```text
/// Created ──► Initiated ──► Succeeded ──► Refunded
///                   │
///                   ├──────► Failed ────► Refunded
///                   └──────► Canceled
/// ```
///
/// `Failed -> Refunded` exists because a confirmed-at-creation charge can
/// partially capture before the failure is reported, so the compensating
/// refund is issued unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Booking persisted, no payment attempted yet
    Created,
    /// A payment intent exists at the gateway
    Initiated,
    /// Gateway confirmed the charge
    Succeeded,
    /// Gateway reported the charge failed
    Failed,
    /// Intent was canceled before completion
    Canceled,
    /// A refund was applied
    Refunded,
}

impl PaymentState {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: PaymentState) -> bool {
        use PaymentState::*;
        matches!(
            (self, next),
            (Created, Initiated)
                | (Initiated, Succeeded)
                | (Initiated, Failed)
                | (Initiated, Canceled)
                | (Succeeded, Refunded)
                | (Failed, Refunded)
        )
    }
}

impl AsRef<str> for PaymentState {
    fn as_ref(&self) -> &str {
        match self {
            PaymentState::Created => "CREATED",
            PaymentState::Initiated => "INITIATED",
            PaymentState::Succeeded => "SUCCEEDED",
            PaymentState::Failed => "FAILED",
            PaymentState::Canceled => "CANCELED",
            PaymentState::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A reservation of a space for a date range.
///
/// The priced fields are computed once at creation and never recomputed;
/// a booking is a record of what was agreed, not a live quote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Unique identifier
    pub id: BookingId,
    /// Reference code shown to the renter
    pub confirmation_code: ConfirmationCode,
    /// The renter who made the booking
    pub renter_id: UserId,
    /// The space being booked
    pub space_id: SpaceId,
    /// Booked interval, half-open `[start, end)`
    #[serde(flatten)]
    pub dates: DateRange,
    /// Number of units booked
    pub quantity: i64,
    /// Per-day rate at the time of booking
    pub unit_rate: Money,
    /// Billable days, partial days rounded up
    pub number_of_days: i64,
    /// Service fee applied at creation
    pub service_fee: Money,
    /// Tax applied at creation
    pub tax: Money,
    /// Total charged: rate * quantity * days + fees
    pub total: Money,
    /// Gateway payment intent, set once payment is initiated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Where the booking sits in the payment lifecycle
    pub payment_state: PaymentState,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a new booking from a priced quote.
    pub fn new(renter_id: UserId, space_id: SpaceId, dates: DateRange, quote: Quote) -> Self {
        Self {
            id: BookingId::new(),
            confirmation_code: ConfirmationCode::generate(),
            renter_id,
            space_id,
            dates,
            quantity: quote.quantity,
            unit_rate: quote.unit_rate,
            number_of_days: quote.number_of_days,
            service_fee: quote.service_fee,
            tax: quote.tax,
            total: quote.total,
            payment_intent_id: None,
            payment_state: PaymentState::Created,
            created_at: Utc::now(),
        }
    }

    /// Reconstructs a booking from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: BookingId,
        confirmation_code: ConfirmationCode,
        renter_id: UserId,
        space_id: SpaceId,
        dates: DateRange,
        quantity: i64,
        unit_rate: Money,
        number_of_days: i64,
        service_fee: Money,
        tax: Money,
        total: Money,
        payment_intent_id: Option<String>,
        payment_state: PaymentState,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            confirmation_code,
            renter_id,
            space_id,
            dates,
            quantity,
            unit_rate,
            number_of_days,
            service_fee,
            tax,
            total,
            payment_intent_id,
            payment_state,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;
    use crate::domain::pricing::{ZeroFees, quote};
    use chrono::TimeZone;

    fn sample_range() -> DateRange {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2030, 1, 3, 0, 0, 0).unwrap();
        DateRange::new(start, end).unwrap()
    }

    #[test]
    fn test_confirmation_code_shape() {
        let code = ConfirmationCode::generate();
        assert_eq!(code.as_str().len(), ConfirmationCode::LEN);
        assert!(code.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_confirmation_codes_are_random() {
        let a = ConfirmationCode::generate();
        let b = ConfirmationCode::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_booking_starts_in_created() {
        let rate = Money::new(100, Currency::USD).unwrap();
        let range = sample_range();
        let q = quote(rate, 1, &range, &ZeroFees).unwrap();
        let booking = Booking::new(UserId::new(), SpaceId::new(), range, q);

        assert_eq!(booking.payment_state, PaymentState::Created);
        assert!(booking.payment_intent_id.is_none());
        assert_eq!(booking.number_of_days, 2);
    }

    #[test]
    fn test_legal_transitions() {
        use PaymentState::*;
        assert!(Created.can_transition_to(Initiated));
        assert!(Initiated.can_transition_to(Succeeded));
        assert!(Initiated.can_transition_to(Failed));
        assert!(Initiated.can_transition_to(Canceled));
        assert!(Succeeded.can_transition_to(Refunded));
        assert!(Failed.can_transition_to(Refunded));
    }

    #[test]
    fn test_illegal_transitions() {
        use PaymentState::*;
        assert!(!Created.can_transition_to(Succeeded));
        assert!(!Created.can_transition_to(Refunded));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Succeeded.can_transition_to(Canceled));
        assert!(!Canceled.can_transition_to(Refunded));
        assert!(!Refunded.can_transition_to(Succeeded));
        assert!(!Failed.can_transition_to(Succeeded));
        assert!(!Initiated.can_transition_to(Initiated));
    }

    #[test]
    fn test_booking_serializes_camel_case() {
        let rate = Money::new(100, Currency::USD).unwrap();
        let range = sample_range();
        let q = quote(rate, 2, &range, &ZeroFees).unwrap();
        let booking = Booking::new(UserId::new(), SpaceId::new(), range, q);

        let json = serde_json::to_value(&booking).unwrap();
        assert!(json.get("confirmationCode").is_some());
        assert!(json.get("startDate").is_some());
        assert!(json.get("endDate").is_some());
        assert!(json.get("numberOfDays").is_some());
        assert_eq!(json["paymentState"], "CREATED");
    }
}
