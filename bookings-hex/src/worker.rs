//! Gateway event worker.
//!
//! Consumes the durable webhook queue and applies each event to the booking
//! it concerns. The webhook endpoint only stores events; every side effect
//! (state transitions, refunds, notifications) happens here, so a crash
//! after acknowledgement loses nothing - the row is still pending.

use chrono::{Duration, Utc};

use bookings_types::{
    BookingRepository, EventEnvelope, EventStatus, GatewayEventKind, Notifier, PaymentGateway,
    PaymentState, StoredEvent,
};

/// How many due events to pull per poll.
const BATCH_SIZE: i64 = 10;

/// Give up on an event once it has been attempted this many times.
const MAX_ATTEMPTS: i32 = 5;

/// Retry delay doubles per attempt from this base, capped at [`MAX_BACKOFF_SECS`].
const BACKOFF_BASE_SECS: i64 = 5;
const MAX_BACKOFF_SECS: i64 = 300;

/// Delay before the given attempt number is retried.
fn backoff_delay(attempts: i32) -> Duration {
    let exp = attempts.clamp(0, 16) as u32;
    let secs = (BACKOFF_BASE_SECS << exp).min(MAX_BACKOFF_SECS);
    Duration::seconds(secs)
}

/// Background worker that drains the gateway event queue.
///
/// Holds its own handles to the ports; the HTTP server and the worker share
/// adapters through `Arc`.
pub struct EventWorker<R: BookingRepository, G: PaymentGateway, N: Notifier> {
    repo: R,
    gateway: G,
    notifier: N,
}

impl<R: BookingRepository, G: PaymentGateway, N: Notifier> EventWorker<R, G, N> {
    /// Creates a new worker over the given ports.
    pub fn new(repo: R, gateway: G, notifier: N) -> Self {
        Self {
            repo,
            gateway,
            notifier,
        }
    }

    /// Runs the worker loop forever, polling for due events every second.
    pub async fn run(self) {
        tracing::info!("Gateway event worker started");

        loop {
            self.run_once().await;
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    /// Fetches one batch of due events and processes it.
    ///
    /// Returns how many events were handled. Split out from [`run`] so the
    /// queue can be drained deterministically.
    pub async fn run_once(&self) -> usize {
        let events = match self.repo.pending_gateway_events(BATCH_SIZE).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Failed to fetch pending gateway events: {}", e);
                return 0;
            }
        };

        let count = events.len();
        for event in &events {
            self.process_event(event).await;
        }
        count
    }

    /// Processes a single queued event and records the outcome.
    ///
    /// Success marks the row `Completed`. Any error schedules a retry with
    /// exponential backoff until [`MAX_ATTEMPTS`], then the row is marked
    /// `Failed` with the last error kept for reconciliation.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn process_event(&self, event: &StoredEvent) {
        let outcome = match serde_json::from_value::<EventEnvelope>(event.payload.clone()) {
            Ok(envelope) => self.dispatch(event, &envelope).await,
            Err(e) => Err(format!("malformed event payload: {}", e)),
        };

        // update_gateway_event increments the attempt count itself.
        let attempts = event.attempts + 1;

        let (status, last_error, next_attempt_at) = match outcome {
            Ok(()) => (EventStatus::Completed, None, None),
            Err(error) if attempts >= MAX_ATTEMPTS => {
                tracing::error!(
                    "Giving up on gateway event after {} attempts: {}",
                    attempts,
                    error
                );
                (EventStatus::Failed, Some(error), None)
            }
            Err(error) => {
                let delay = backoff_delay(attempts);
                tracing::warn!(
                    "Gateway event attempt {} failed, retrying in {}s: {}",
                    attempts,
                    delay.num_seconds(),
                    error
                );
                (EventStatus::Pending, Some(error), Some(Utc::now() + delay))
            }
        };

        if let Err(e) = self
            .repo
            .update_gateway_event(&event.id, status, last_error, next_attempt_at)
            .await
        {
            tracing::error!("Failed to record gateway event outcome: {}", e);
        }
    }

    /// Applies an event to the system according to its type.
    async fn dispatch(&self, event: &StoredEvent, envelope: &EventEnvelope) -> Result<(), String> {
        match envelope.kind() {
            GatewayEventKind::PaymentIntentSucceeded => {
                if self
                    .apply_transition(envelope, PaymentState::Succeeded)
                    .await?
                {
                    let body = format!(
                        "Payment with ID {} was successful.",
                        envelope.object_id().unwrap_or("unknown")
                    );
                    self.notify(envelope, "Payment Succeeded", &body).await;
                }
                Ok(())
            }

            GatewayEventKind::PaymentIntentPaymentFailed => {
                if self
                    .apply_transition(envelope, PaymentState::Failed)
                    .await?
                {
                    let body = format!(
                        "Payment with ID {} has failed.",
                        envelope.object_id().unwrap_or("unknown")
                    );
                    self.notify(envelope, "Payment Failed", &body).await;
                    self.refund_failed_intent(event, envelope).await?;
                }
                Ok(())
            }

            GatewayEventKind::PaymentIntentCanceled => {
                if self
                    .apply_transition(envelope, PaymentState::Canceled)
                    .await?
                {
                    let body = format!(
                        "Payment with ID {} was canceled.",
                        envelope.object_id().unwrap_or("unknown")
                    );
                    self.notify(envelope, "Payment Canceled", &body).await;
                }
                Ok(())
            }

            GatewayEventKind::ChargeRefunded => {
                if self
                    .apply_transition(envelope, PaymentState::Refunded)
                    .await?
                {
                    let body = format!(
                        "Payment with ID {} has been refunded.",
                        envelope.intent_reference().unwrap_or("unknown")
                    );
                    self.notify(envelope, "Payment Refunded", &body).await;
                }
                Ok(())
            }

            // Subscription lifecycle events carry no booking linkage; they
            // only keep the customer informed.
            GatewayEventKind::SubscriptionScheduleCreated => {
                self.notify_subscription(envelope, "Subscription Created", "created")
                    .await;
                Ok(())
            }
            GatewayEventKind::CustomerSubscriptionUpdated => {
                self.notify_subscription(envelope, "Subscription Updated", "updated")
                    .await;
                Ok(())
            }
            GatewayEventKind::CustomerSubscriptionDeleted => {
                self.notify_subscription(envelope, "Subscription Deleted", "deleted")
                    .await;
                Ok(())
            }

            GatewayEventKind::Unknown(kind) => {
                tracing::info!(event_type = %kind, "Unhandled gateway event type");
                Ok(())
            }
        }
    }

    /// Moves the booking referenced by the event's intent to `next`.
    ///
    /// Returns `Ok(true)` when the booking is in `next` afterwards, either
    /// freshly transitioned or already there (a redelivered outcome must not
    /// block the side effects its first delivery may have missed). Returns
    /// `Ok(false)` when the transition is not legal from the current state;
    /// the event then completes without touching the booking.
    ///
    /// A missing booking is an error, not a skip: the initiating request may
    /// still be writing the intent id, so the event gets retried.
    async fn apply_transition(
        &self,
        envelope: &EventEnvelope,
        next: PaymentState,
    ) -> Result<bool, String> {
        let intent_id = envelope
            .intent_reference()
            .ok_or_else(|| format!("event {} has no payment intent reference", envelope.id))?;

        let booking = self
            .repo
            .find_booking_by_intent(intent_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no booking for payment intent {}", intent_id))?;

        if booking.payment_state == next {
            return Ok(true);
        }

        if !booking.payment_state.can_transition_to(next) {
            tracing::warn!(
                booking_id = %booking.id,
                from = %booking.payment_state,
                to = %next,
                "Ignoring gateway event: transition not permitted"
            );
            return Ok(false);
        }

        self.repo
            .update_payment_state(booking.id, next)
            .await
            .map_err(|e| e.to_string())?;

        tracing::info!(
            booking_id = %booking.id,
            from = %booking.payment_state,
            to = %next,
            "Booking payment state updated"
        );

        Ok(true)
    }

    /// Issues the compensating refund for a failed intent.
    ///
    /// A confirmed-at-creation charge can partially capture before the
    /// failure is reported, so every failed intent gets a refund. The
    /// idempotency key ties the refund to the event id, making redelivered
    /// failures and retries safe.
    async fn refund_failed_intent(
        &self,
        event: &StoredEvent,
        envelope: &EventEnvelope,
    ) -> Result<(), String> {
        let intent_id = envelope
            .intent_reference()
            .ok_or_else(|| format!("event {} has no payment intent reference", envelope.id))?;

        let key = format!("refund-{}", event.id);
        let refund = self
            .gateway
            .create_refund(intent_id, Some(&key))
            .await
            .map_err(|e| e.to_string())?;

        tracing::info!(refund_id = %refund.id, intent_id, "Refund created for failed payment");

        let body = format!(
            "Refund {} was created for payment {}.",
            refund.id, intent_id
        );
        self.notify(envelope, "Refund Created", &body).await;

        Ok(())
    }

    /// Sends a best-effort notification to the event's customer email.
    ///
    /// Events without an email skip notification; send failures are logged
    /// and never fail the event.
    async fn notify(&self, envelope: &EventEnvelope, subject: &str, body: &str) {
        let Some(email) = envelope.customer_email() else {
            tracing::debug!(
                event_id = %envelope.id,
                "Event carries no customer email, skipping notification"
            );
            return;
        };

        if let Err(e) = self.notifier.notify(email, subject, body).await {
            tracing::error!("Failed to send notification: {}", e);
        }
    }

    async fn notify_subscription(&self, envelope: &EventEnvelope, subject: &str, verb: &str) {
        let body = format!(
            "Subscription {} was {}.",
            envelope.object_id().unwrap_or("unknown"),
            verb
        );
        self.notify(envelope, subject, &body).await;
    }
}
