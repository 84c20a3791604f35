//! Booking Application Service
//!
//! Orchestrates domain operations through the repository and gateway ports.
//! Contains NO infrastructure logic - pure business orchestration.

use chrono::Utc;

use bookings_types::{
    AppError, Booking, BookingDetail, BookingFilter, BookingRepository, Charge,
    CreateBookingRequest, CreateIntentRequest, DateRange, DomainError, FeePolicy,
    InitiatePaymentRequest, InitiatePaymentResponse, PaymentDetailRequest, PaymentGateway,
    PaymentIntent, SpaceId, UserId, UserRole, ZeroFees, quote,
};

/// Application service for booking and payment operations.
///
/// Generic over `R: BookingRepository` and `G: PaymentGateway` - the adapters
/// are injected at compile time. This enables:
/// - Swapping the database or gateway without code changes
/// - Testing with in-memory ports
/// - Compile-time checks for port implementation
pub struct BookingService<R: BookingRepository, G: PaymentGateway> {
    repo: R,
    gateway: G,
    fees: Box<dyn FeePolicy>,
}

impl<R: BookingRepository, G: PaymentGateway> BookingService<R, G> {
    /// Creates a new booking service charging no service fee and no tax.
    pub fn new(repo: R, gateway: G) -> Self {
        Self::with_fees(repo, gateway, Box::new(ZeroFees))
    }

    /// Creates a booking service with a custom fee policy.
    pub fn with_fees(repo: R, gateway: G, fees: Box<dyn FeePolicy>) -> Self {
        Self {
            repo,
            gateway,
            fees,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns a reference to the underlying payment gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Booking Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Books a space for a renter.
    ///
    /// Checks run in a fixed order so callers see stable errors: renter,
    /// space, interval shape, dates in the past, quantity, then the insert.
    /// The no-overlap guarantee is NOT checked here - it lives inside the
    /// repository's conflict-checked insert, where it holds under races.
    pub async fn create_booking(
        &self,
        renter_id: UserId,
        space_id: SpaceId,
        req: CreateBookingRequest,
    ) -> Result<Booking, AppError> {
        let renter = self
            .repo
            .get_user(renter_id)
            .await?
            .filter(|user| user.role == UserRole::Renter)
            .ok_or_else(|| AppError::BadRequest("Invalid user or user role".into()))?;

        let space = self
            .repo
            .get_space(space_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Space {}", space_id)))?;

        let dates = DateRange::new(req.start_date, req.end_date)?;

        let now = Utc::now();
        if dates.start() < now || dates.end() < now {
            return Err(DomainError::PastDate.into());
        }

        let priced = quote(space.day_rate, req.quantity, &dates, self.fees.as_ref())?;
        let booking = Booking::new(renter.id, space.id, dates, priced);

        self.repo.create_booking(&booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            space_id = %space.id,
            total = booking.total.amount(),
            "Booking created"
        );

        Ok(booking)
    }

    /// Lists the renter's bookings with their spaces, newest range first.
    pub async fn list_bookings(
        &self,
        renter_id: UserId,
        filter: BookingFilter,
    ) -> Result<Vec<BookingDetail>, AppError> {
        let rows = self
            .repo
            .list_bookings_for_renter(renter_id, filter)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(booking, space)| BookingDetail { booking, space })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts payment for a booking: creates a confirmed intent at the
    /// gateway and records it on the booking, moving it to `Initiated`.
    ///
    /// The gateway call carries an idempotency key derived from the booking
    /// id, so a retried request cannot create a second charge.
    pub async fn initiate_payment(
        &self,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, AppError> {
        let booking = self
            .repo
            .get_booking(req.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", req.booking_id)))?;

        let intent = self
            .gateway
            .create_payment_intent(CreateIntentRequest {
                amount: req.amount,
                currency: req.currency,
                payment_method: req.payment_method,
                confirm: true,
                idempotency_key: Some(format!("booking-{}-intent", booking.id)),
            })
            .await?;

        self.repo.set_payment_intent(booking.id, &intent.id).await?;

        tracing::info!(booking_id = %booking.id, intent_id = %intent.id, "Payment initiated");

        Ok(InitiatePaymentResponse {
            message: "Payment initiated successfully".into(),
            payment_intent_id: intent.id,
        })
    }

    /// Looks up the current state of a payment intent at the gateway.
    pub async fn payment_intent_details(
        &self,
        req: PaymentDetailRequest,
    ) -> Result<PaymentIntent, AppError> {
        let intent_id = req
            .payment_intent_id
            .ok_or_else(|| AppError::BadRequest("Missing payment intent id".into()))?;

        self.gateway
            .retrieve_payment_intent(&intent_id)
            .await
            .map_err(Into::into)
    }

    /// Lists recent charges on the gateway account.
    pub async fn list_charges(&self) -> Result<Vec<Charge>, AppError> {
        self.gateway.list_charges(None).await.map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhook intake
    // ─────────────────────────────────────────────────────────────────────────────

    /// Durably queues a verified gateway event for the worker.
    ///
    /// Returns `false` when the event id is already queued; redeliveries are
    /// acknowledged without a second row and without reprocessing.
    pub async fn enqueue_gateway_event(
        &self,
        id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, AppError> {
        self.repo
            .record_gateway_event(id, event_type, payload)
            .await
            .map_err(Into::into)
    }
}
