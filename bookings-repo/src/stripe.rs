//! Stripe-compatible payment gateway client.
//!
//! A thin REST adapter over the gateway's form-encoded API. It never
//! retries; callers own retry policy. Every request carries an explicit
//! deadline so a stalled gateway cannot hold a request handler or the
//! event worker hostage.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use bookings_types::{
    CardDetails, Charge, CreateIntentRequest, Customer, GatewayError, PaymentGateway,
    PaymentIntent, PaymentSource, Refund,
};

/// Default live API endpoint.
const DEFAULT_API_URL: &str = "https://api.stripe.com";

/// Per-request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// List envelope the gateway wraps collection responses in.
#[derive(Debug, Deserialize)]
struct GatewayList<T> {
    data: Vec<T>,
}

/// Error body shape: `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: String,
}

/// Token minted from raw card details.
#[derive(Debug, Deserialize)]
struct CardToken {
    id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway client
// ─────────────────────────────────────────────────────────────────────────────

/// REST client for the card payment gateway.
pub struct StripeGateway {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    /// Creates a client against the live gateway endpoint.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base_url(secret_key, DEFAULT_API_URL)
    }

    /// Creates a client against a specific API host (test servers, mocks).
    pub fn with_base_url(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    // The gateway authenticates with the secret key as basic-auth username.
    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .timeout(REQUEST_TIMEOUT)
    }

    // Writes are form-encoded, not JSON.
    fn post_form(&self, path: &str, params: &[(&str, String)]) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .timeout(REQUEST_TIMEOUT)
            .form(params)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Http(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        req: CreateIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let params = [
            ("amount", req.amount.to_string()),
            ("currency", req.currency.code().to_string()),
            ("payment_method", req.payment_method.clone()),
            ("confirm", req.confirm.to_string()),
            // Redirect-based methods need a return_url this service cannot
            // provide, so they are excluded up front.
            ("automatic_payment_methods[enabled]", "true".to_string()),
            (
                "automatic_payment_methods[allow_redirects]",
                "never".to_string(),
            ),
        ];

        let mut request = self.post_form("/v1/payment_intents", &params);
        if let Some(key) = &req.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        self.send(request).await
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        self.send(self.get(&format!("/v1/payment_intents/{id}")))
            .await
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Refund, GatewayError> {
        let params = [("payment_intent", payment_intent_id.to_string())];

        let mut request = self.post_form("/v1/refunds", &params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        self.send(request).await
    }

    async fn list_charges(&self, limit: Option<u32>) -> Result<Vec<Charge>, GatewayError> {
        let mut request = self.get("/v1/charges");
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let list: GatewayList<Charge> = self.send(request).await?;
        Ok(list.data)
    }

    async fn create_customer(
        &self,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Customer, GatewayError> {
        let mut params = Vec::new();
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.send(self.post_form("/v1/customers", &params)).await
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        card: CardDetails,
    ) -> Result<PaymentSource, GatewayError> {
        // Raw card details may only hit the tokens endpoint; what gets
        // attached to the customer is the minted token.
        let token: CardToken = self
            .send(self.post_form(
                "/v1/tokens",
                &[
                    ("card[number]", card.number.clone()),
                    ("card[exp_month]", card.exp_month.to_string()),
                    ("card[exp_year]", card.exp_year.to_string()),
                    ("card[cvc]", card.cvc.clone()),
                ],
            ))
            .await?;

        self.send(self.post_form(
            &format!("/v1/customers/{customer_id}/sources"),
            &[("source", token.id)],
        ))
        .await
    }

    async fn list_payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentSource>, GatewayError> {
        let request = self
            .get("/v1/payment_methods")
            .query(&[("customer", customer_id), ("type", "card")]);
        let list: GatewayList<PaymentSource> = self.send(request).await?;
        Ok(list.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults_to_live_endpoint() {
        let gateway = StripeGateway::new("sk_test_123");
        assert_eq!(gateway.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let gateway = StripeGateway::with_base_url("sk_test_123", "http://localhost:12111/");
        assert_eq!(gateway.base_url, "http://localhost:12111");
    }

    #[test]
    fn test_list_envelope_unwraps_data() {
        let json = r#"{"object": "list", "data": [
            {"id": "ch_1", "amount": 400, "currency": "usd", "status": "succeeded"}
        ], "has_more": false}"#;
        let list: GatewayList<Charge> = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].id, "ch_1");
    }

    #[test]
    fn test_error_body_extracts_message() {
        let json = r#"{"error": {"type": "invalid_request_error", "message": "No such payment_intent"}}"#;
        let body: GatewayErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.error.message, "No such payment_intent");
    }
}
