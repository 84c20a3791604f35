//! Gateway webhook events: the wire envelope and the durable queue row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Event types this service acts on.
///
/// The gateway emits many more; anything unrecognized is carried as
/// [`Unknown`](GatewayEventKind::Unknown) and completes as a no-op instead
/// of failing the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    PaymentIntentCanceled,
    ChargeRefunded,
    SubscriptionScheduleCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    Unknown(String),
}

impl GatewayEventKind {
    /// Returns the gateway wire name of this event type.
    pub fn as_str(&self) -> &str {
        match self {
            GatewayEventKind::PaymentIntentSucceeded => "payment_intent.succeeded",
            GatewayEventKind::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            GatewayEventKind::PaymentIntentCanceled => "payment_intent.canceled",
            GatewayEventKind::ChargeRefunded => "charge.refunded",
            GatewayEventKind::SubscriptionScheduleCreated => "subscription_schedule.created",
            GatewayEventKind::CustomerSubscriptionUpdated => "customer.subscription.updated",
            GatewayEventKind::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            GatewayEventKind::Unknown(s) => s,
        }
    }

    /// True for the `payment_intent.*` family, whose envelope object is the
    /// intent itself.
    pub fn is_payment_intent(&self) -> bool {
        matches!(
            self,
            GatewayEventKind::PaymentIntentSucceeded
                | GatewayEventKind::PaymentIntentPaymentFailed
                | GatewayEventKind::PaymentIntentCanceled
        )
    }
}

impl From<&str> for GatewayEventKind {
    fn from(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => GatewayEventKind::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => GatewayEventKind::PaymentIntentPaymentFailed,
            "payment_intent.canceled" => GatewayEventKind::PaymentIntentCanceled,
            "charge.refunded" => GatewayEventKind::ChargeRefunded,
            "subscription_schedule.created" => GatewayEventKind::SubscriptionScheduleCreated,
            "customer.subscription.updated" => GatewayEventKind::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => GatewayEventKind::CustomerSubscriptionDeleted,
            other => GatewayEventKind::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for GatewayEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `data` wrapper inside a gateway event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The affected gateway object, kept as raw JSON because its shape
    /// depends entirely on the event type.
    pub object: serde_json::Value,
}

/// A gateway event as delivered to the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Gateway event id, e.g. `evt_...`; the deduplication key
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix timestamp the gateway created the event
    #[serde(default)]
    pub created: Option<i64>,
    pub data: EventData,
}

impl EventEnvelope {
    /// Classifies the envelope by its wire type string.
    pub fn kind(&self) -> GatewayEventKind {
        GatewayEventKind::from(self.event_type.as_str())
    }

    /// `data.object.id`, whatever object that is.
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }

    /// Customer email carried in `data.object.metadata.email`, if any.
    pub fn customer_email(&self) -> Option<&str> {
        self.data
            .object
            .get("metadata")
            .and_then(|m| m.get("email"))
            .and_then(|v| v.as_str())
    }

    /// The payment intent this event concerns.
    ///
    /// For `payment_intent.*` events the object is the intent; for charge
    /// events the intent is referenced by the charge. Subscription events
    /// carry no intent.
    pub fn intent_reference(&self) -> Option<&str> {
        match self.kind() {
            k if k.is_payment_intent() => self.object_id(),
            GatewayEventKind::ChargeRefunded => self
                .data
                .object
                .get("payment_intent")
                .and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

/// Processing status of a queued gateway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Waiting to be processed (or to be retried)
    Pending,
    /// Processed successfully
    Completed,
    /// Gave up after repeated failures; needs manual reconciliation
    Failed,
}

impl AsRef<str> for EventStatus {
    fn as_ref(&self) -> &str {
        match self {
            EventStatus::Pending => "PENDING",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A gateway event persisted to the processing queue.
///
/// The webhook handler writes one of these and immediately acknowledges the
/// gateway; all side effects happen later when the worker picks the row up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Gateway event id; primary key, so redeliveries collapse into one row
    pub id: String,
    /// Wire event type string
    pub event_type: String,
    /// Full event payload as received
    pub payload: serde_json::Value,
    pub status: EventStatus,
    /// Processing attempts so far
    pub attempts: i32,
    /// Error from the most recent failed attempt
    pub last_error: Option<String>,
    /// When the webhook endpoint accepted the event
    pub received_at: DateTime<Utc>,
    /// When the event was last worked on
    pub processed_at: Option<DateTime<Utc>>,
    /// Do not retry before this instant
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl StoredEvent {
    /// Creates a fresh pending queue row.
    pub fn new(id: String, event_type: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            event_type,
            payload,
            status: EventStatus::Pending,
            attempts: 0,
            last_error: None,
            received_at: Utc::now(),
            processed_at: None,
            next_attempt_at: None,
        }
    }

    /// Reconstructs a queue row from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: String,
        event_type: String,
        payload: serde_json::Value,
        status: EventStatus,
        attempts: i32,
        last_error: Option<String>,
        received_at: DateTime<Utc>,
        processed_at: Option<DateTime<Utc>>,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            event_type,
            payload,
            status,
            attempts,
            last_error,
            received_at,
            processed_at,
            next_attempt_at,
        }
    }

    /// Classifies the stored event by its wire type string.
    pub fn kind(&self) -> GatewayEventKind {
        GatewayEventKind::from(self.event_type.as_str())
    }
}
