//! Wire-shaped objects returned by the payment gateway.
//!
//! These mirror the gateway's snake_case REST payloads and are passed
//! through to API clients as-is. Amounts are raw minor units and currencies
//! are lowercase codes, exactly as the gateway reports them - converting
//! them into [`Money`](super::money::Money) would invent precision the
//! gateway does not guarantee for third-party objects.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle states a payment intent can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    /// A status this service does not model; kept rather than rejected so
    /// gateway API additions do not break deserialization.
    #[serde(other)]
    Unknown,
}

/// A payment intent as the gateway reports it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    /// Gateway identifier, e.g. `pi_...`
    pub id: String,
    /// Amount in smallest currency unit
    pub amount: i64,
    /// Lowercase currency code
    pub currency: String,
    pub status: IntentStatus,
    /// Payment method the intent was confirmed with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// Secret handed to browser-side confirmation flows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Most recent charge created by this intent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_charge: Option<String>,
    /// Free-form key/value pairs attached by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// A refund issued against a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Refund {
    /// Gateway identifier, e.g. `re_...`
    pub id: String,
    /// The intent this refund compensates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<String>,
    /// Refund status as reported by the gateway
    pub status: String,
}

/// A settled or attempted charge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Charge {
    /// Gateway identifier, e.g. `ch_...`
    pub id: String,
    /// Amount in smallest currency unit
    pub amount: i64,
    /// Lowercase currency code
    pub currency: String,
    /// Charge status as reported by the gateway
    pub status: String,
    /// The intent that produced this charge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<String>,
}

/// A customer record at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    /// Gateway identifier, e.g. `cus_...`
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Raw card details used to mint a gateway token.
///
/// These pass through to the gateway and are never persisted here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CardDetails {
    /// Primary account number
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

/// A stored payment instrument attached to a gateway customer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentSource {
    /// Gateway identifier, e.g. `card_...` or `pm_...`
    pub id: String,
    /// Card network, e.g. `visa`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Last four digits of the card number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_month: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_year: Option<u16>,
    /// Customer the instrument is attached to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}
