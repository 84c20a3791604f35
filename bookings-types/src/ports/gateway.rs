//! Payment gateway port trait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{
    CardDetails, Charge, Currency, Customer, PaymentIntent, PaymentSource, Refund,
};

/// Errors from the payment gateway adapter.
///
/// `Timeout` is split out from other transport failures because callers
/// treat a timed-out call as retryable.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request timed out")]
    Timeout,

    #[error("Gateway rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gateway transport error: {0}")]
    Http(String),

    #[error("Could not decode gateway response: {0}")]
    Decode(String),
}

/// Instruction to create (and usually immediately confirm) a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    /// Gateway payment method id, e.g. `pm_card_visa`
    pub payment_method: String,
    /// Confirm the intent in the same call
    pub confirm: bool,
    /// Key the gateway uses to collapse duplicate submissions
    pub idempotency_key: Option<String>,
}

/// Outbound port to the card payment gateway.
///
/// Implementations are thin REST clients; nothing here retries, the worker
/// and its queue own retry policy.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Creates a payment intent.
    async fn create_payment_intent(
        &self,
        req: CreateIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Fetches the current state of a payment intent.
    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Refunds a payment intent in full.
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Refund, GatewayError>;

    /// Lists recent charges on the gateway account.
    async fn list_charges(&self, limit: Option<u32>) -> Result<Vec<Charge>, GatewayError>;

    /// Creates a customer record at the gateway.
    async fn create_customer(
        &self,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Customer, GatewayError>;

    /// Tokenizes raw card details and attaches the result to a customer.
    async fn attach_payment_method(
        &self,
        customer_id: &str,
        card: CardDetails,
    ) -> Result<PaymentSource, GatewayError>;

    /// Lists card payment methods stored for a customer.
    async fn list_payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentSource>, GatewayError>;
}

#[async_trait::async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_payment_intent(
        &self,
        req: CreateIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        (**self).create_payment_intent(req).await
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        (**self).retrieve_payment_intent(id).await
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Refund, GatewayError> {
        (**self)
            .create_refund(payment_intent_id, idempotency_key)
            .await
    }

    async fn list_charges(&self, limit: Option<u32>) -> Result<Vec<Charge>, GatewayError> {
        (**self).list_charges(limit).await
    }

    async fn create_customer(
        &self,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Customer, GatewayError> {
        (**self).create_customer(email, name).await
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        card: CardDetails,
    ) -> Result<PaymentSource, GatewayError> {
        (**self).attach_payment_method(customer_id, card).await
    }

    async fn list_payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentSource>, GatewayError> {
        (**self).list_payment_methods(customer_id).await
    }
}
