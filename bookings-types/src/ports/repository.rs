//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite) will implement this trait.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    Booking, BookingId, EventStatus, PaymentState, Space, SpaceId, StoredEvent, User, UserId,
};
use crate::dto::BookingFilter;
use crate::error::RepoError;

/// The main repository port for booking persistence.
///
/// `create_booking` carries the no-overlap guarantee: two overlapping
/// bookings for the same space must never both be stored, no matter how
/// they race. Implementations enforce that inside the database, not in
/// application code.
#[async_trait::async_trait]
pub trait BookingRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Users & Spaces (boundary collaborators)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Stores a user.
    async fn create_user(&self, user: &User) -> Result<(), RepoError>;

    /// Gets a user by ID.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError>;

    /// Stores a space listing.
    async fn create_space(&self, space: &Space) -> Result<(), RepoError>;

    /// Gets a space by ID.
    async fn get_space(&self, id: SpaceId) -> Result<Option<Space>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Bookings (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Persists a booking, failing with [`RepoError::Conflict`] if its date
    /// range overlaps an existing booking for the same space.
    async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError>;

    /// Gets a booking by ID.
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError>;

    /// Lists a renter's bookings with their spaces, newest range first
    /// filtered by where the range sits relative to now.
    async fn list_bookings_for_renter(
        &self,
        renter_id: UserId,
        filter: BookingFilter,
    ) -> Result<Vec<(Booking, Space)>, RepoError>;

    /// Finds the booking a gateway payment intent belongs to.
    async fn find_booking_by_intent(&self, intent_id: &str)
    -> Result<Option<Booking>, RepoError>;

    /// Records the gateway intent on a booking and moves it to
    /// [`PaymentState::Initiated`] in the same statement.
    async fn set_payment_intent(&self, id: BookingId, intent_id: &str) -> Result<(), RepoError>;

    /// Moves a booking to a new payment state.
    async fn update_payment_state(
        &self,
        id: BookingId,
        state: PaymentState,
    ) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Gateway event queue
    // ─────────────────────────────────────────────────────────────────────────────

    /// Durably records a gateway event for asynchronous processing.
    ///
    /// Returns `false` when an event with the same id is already recorded;
    /// redelivered events must not enqueue twice.
    async fn record_gateway_event(
        &self,
        id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, RepoError>;

    /// Fetches pending events that are due, oldest first.
    async fn pending_gateway_events(&self, limit: i64) -> Result<Vec<StoredEvent>, RepoError>;

    /// Records the outcome of a processing attempt: new status, the error
    /// if any, and when to try again. Always increments the attempt count.
    async fn update_gateway_event(
        &self,
        id: &str,
        status: EventStatus,
        last_error: Option<String>,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepoError>;
}

/// Shared handles implement the port too, so the HTTP server and the event
/// worker can run off one adapter instance.
#[async_trait::async_trait]
impl<T: BookingRepository + ?Sized> BookingRepository for Arc<T> {
    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        (**self).create_user(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        (**self).get_user(id).await
    }

    async fn create_space(&self, space: &Space) -> Result<(), RepoError> {
        (**self).create_space(space).await
    }

    async fn get_space(&self, id: SpaceId) -> Result<Option<Space>, RepoError> {
        (**self).get_space(id).await
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError> {
        (**self).create_booking(booking).await
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError> {
        (**self).get_booking(id).await
    }

    async fn list_bookings_for_renter(
        &self,
        renter_id: UserId,
        filter: BookingFilter,
    ) -> Result<Vec<(Booking, Space)>, RepoError> {
        (**self).list_bookings_for_renter(renter_id, filter).await
    }

    async fn find_booking_by_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<Booking>, RepoError> {
        (**self).find_booking_by_intent(intent_id).await
    }

    async fn set_payment_intent(&self, id: BookingId, intent_id: &str) -> Result<(), RepoError> {
        (**self).set_payment_intent(id, intent_id).await
    }

    async fn update_payment_state(
        &self,
        id: BookingId,
        state: PaymentState,
    ) -> Result<(), RepoError> {
        (**self).update_payment_state(id, state).await
    }

    async fn record_gateway_event(
        &self,
        id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, RepoError> {
        (**self).record_gateway_event(id, event_type, payload).await
    }

    async fn pending_gateway_events(&self, limit: i64) -> Result<Vec<StoredEvent>, RepoError> {
        (**self).pending_gateway_events(limit).await
    }

    async fn update_gateway_event(
        &self,
        id: &str,
        status: EventStatus,
        last_error: Option<String>,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepoError> {
        (**self)
            .update_gateway_event(id, status, last_error, next_attempt_at)
            .await
    }
}
