//! Data Transfer Objects (DTOs) for requests and responses.
//!
//! The external HTTP contract is camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Booking, BookingId, Currency, Space};

// ─────────────────────────────────────────────────────────────────────────────
// Booking DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to book a space.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Start of the stay (inclusive)
    #[schema(example = "2030-02-01T00:00:00Z")]
    pub start_date: DateTime<Utc>,
    /// End of the stay (exclusive)
    #[schema(example = "2030-02-05T00:00:00Z")]
    pub end_date: DateTime<Utc>,
    /// Number of units to book
    #[schema(example = 2)]
    pub quantity: i64,
}

/// Which slice of a renter's bookings to list, relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingFilter {
    /// Starts in the future
    Upcoming,
    /// In progress right now
    Current,
    /// Already ended
    Past,
    /// Everything
    #[default]
    All,
}

impl BookingFilter {
    /// Parses a `?filter=` query value; anything unrecognized means all.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("upcoming") => BookingFilter::Upcoming,
            Some("current") => BookingFilter::Current,
            Some("past") => BookingFilter::Past,
            _ => BookingFilter::All,
        }
    }
}

/// A booking joined with the space it reserves.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    /// The booked space, expanded
    pub space: Space,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to start payment for a booking.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    /// The booking being paid for
    pub booking_id: BookingId,
    /// Amount to charge in smallest currency unit
    #[schema(example = 400)]
    pub amount: i64,
    pub currency: Currency,
    /// Gateway payment method id
    #[schema(example = "pm_card_visa")]
    pub payment_method: String,
}

/// Response after payment has been initiated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    #[schema(example = "Payment initiated successfully")]
    pub message: String,
    /// Gateway id of the created intent
    #[schema(example = "pi_3OqjQx2eZvKYlo2C1kXr4Pbq")]
    pub payment_intent_id: String,
}

/// Request to look up a payment intent.
///
/// The id is optional at the type level so a missing field produces a clean
/// 400 rather than a deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "pi_3OqjQx2eZvKYlo2C1kXr4Pbq")]
    pub payment_intent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parsing() {
        assert_eq!(BookingFilter::parse(Some("upcoming")), BookingFilter::Upcoming);
        assert_eq!(BookingFilter::parse(Some("current")), BookingFilter::Current);
        assert_eq!(BookingFilter::parse(Some("past")), BookingFilter::Past);
        assert_eq!(BookingFilter::parse(Some("everything")), BookingFilter::All);
        assert_eq!(BookingFilter::parse(None), BookingFilter::All);
    }

    #[test]
    fn test_create_booking_request_is_camel_case() {
        let json = r#"{
            "startDate": "2030-02-01T00:00:00Z",
            "endDate": "2030-02-05T00:00:00Z",
            "quantity": 2
        }"#;
        let req: CreateBookingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.quantity, 2);
    }

    #[test]
    fn test_payment_detail_tolerates_missing_id() {
        let req: PaymentDetailRequest = serde_json::from_str("{}").unwrap();
        assert!(req.payment_intent_id.is_none());
    }
}
