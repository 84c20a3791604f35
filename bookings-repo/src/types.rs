//! Shared database types with feature-gated fields for SQLite and PostgreSQL.
//!
//! SQLite stores UUIDs and timestamps as TEXT; PostgreSQL uses native types.
//! When both backend features are enabled, PostgreSQL wins, matching the
//! adapter selection in `lib.rs`.

use sqlx::FromRow;

use bookings_types::{
    Booking, BookingId, ConfirmationCode, Currency, DateRange, EventStatus, Money, PaymentState,
    RepoError, Space, SpaceId, StoredEvent, User, UserId, UserRole,
};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(feature = "postgres", not(feature = "sqlite")))]
use chrono::{DateTime, Utc};
#[cfg(any(feature = "postgres", not(feature = "sqlite")))]
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Timestamp helpers (SQLite stores text)
// ─────────────────────────────────────────────────────────────────────────────

/// Formats a timestamp as fixed-width RFC3339 UTC.
///
/// Fixed width matters: booking overlap and due-time checks compare these
/// strings in SQL, which is only correct when every stored value has the
/// same shape.
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub(crate) fn fmt_ts(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub(crate) fn parse_ts(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// User row from database.
#[derive(FromRow)]
pub struct DbUser {
    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub id: String,

    pub name: String,
    pub email: String,
    pub role: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub created_at: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub created_at: String,
}

/// Space row from database.
#[derive(FromRow)]
pub struct DbSpace {
    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub id: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub lister_id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub lister_id: String,

    pub name: String,
    pub day_rate: i64,
    pub currency: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub created_at: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub created_at: String,
}

/// Booking row from database.
#[derive(FromRow)]
pub struct DbBooking {
    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub id: String,

    pub confirmation_code: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub renter_id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub renter_id: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub space_id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub space_id: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub start_date: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub start_date: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub end_date: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub end_date: String,

    pub quantity: i64,
    pub unit_rate: i64,
    pub number_of_days: i64,
    pub service_fee: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: String,
    pub payment_intent_id: Option<String>,
    pub payment_state: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub created_at: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub created_at: String,
}

/// Booking row joined with its space.
#[derive(FromRow)]
pub struct DbBookingWithSpace {
    #[sqlx(flatten)]
    pub booking: DbBooking,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub space_lister_id: Uuid,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub space_lister_id: String,

    pub space_name: String,
    pub space_day_rate: i64,
    pub space_currency: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub space_created_at: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub space_created_at: String,
}

/// Gateway event row from database. Event ids are gateway strings
/// (`evt_...`) on both backends.
#[derive(FromRow)]
pub struct DbStoredEvent {
    pub id: String,
    pub event_type: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub payload: serde_json::Value,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub payload: String,

    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub received_at: DateTime<Utc>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub received_at: String,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub processed_at: Option<DateTime<Utc>>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub processed_at: Option<String>,

    #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub next_attempt_at: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    match s {
        "USD" => Ok(Currency::USD),
        "EUR" => Ok(Currency::EUR),
        "GBP" => Ok(Currency::GBP),
        "INR" => Ok(Currency::INR),
        _ => Err(RepoError::Database(format!("Unknown currency: {}", s))),
    }
}

pub fn parse_role(s: &str) -> Result<UserRole, RepoError> {
    match s {
        "RENTER" => Ok(UserRole::Renter),
        "LISTER" => Ok(UserRole::Lister),
        _ => Err(RepoError::Database(format!("Unknown user role: {}", s))),
    }
}

pub fn parse_payment_state(s: &str) -> Result<PaymentState, RepoError> {
    match s {
        "CREATED" => Ok(PaymentState::Created),
        "INITIATED" => Ok(PaymentState::Initiated),
        "SUCCEEDED" => Ok(PaymentState::Succeeded),
        "FAILED" => Ok(PaymentState::Failed),
        "CANCELED" => Ok(PaymentState::Canceled),
        "REFUNDED" => Ok(PaymentState::Refunded),
        _ => Err(RepoError::Database(format!("Unknown payment state: {}", s))),
    }
}

pub fn parse_event_status(s: &str) -> Result<EventStatus, RepoError> {
    match s {
        "PENDING" => Ok(EventStatus::Pending),
        "COMPLETED" => Ok(EventStatus::Completed),
        "FAILED" => Ok(EventStatus::Failed),
        _ => Err(RepoError::Database(format!("Unknown event status: {}", s))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain conversion (feature-gated implementations)
// ─────────────────────────────────────────────────────────────────────────────

impl DbUser {
    /// Convert database row to domain User.
    pub fn into_domain(self) -> Result<User, RepoError> {
        let role = parse_role(&self.role)?;

        #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
        let (id, created_at) = (UserId::from_uuid(self.id), self.created_at);

        #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
        let (id, created_at) = (
            UserId::from_uuid(parse_uuid(&self.id)?),
            parse_ts(&self.created_at)?,
        );

        Ok(User::from_parts(id, self.name, self.email, role, created_at))
    }
}

impl DbSpace {
    /// Convert database row to domain Space.
    pub fn into_domain(self) -> Result<Space, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let day_rate = Money::new(self.day_rate, currency).map_err(RepoError::Domain)?;

        #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
        let (id, lister_id, created_at) = (
            SpaceId::from_uuid(self.id),
            UserId::from_uuid(self.lister_id),
            self.created_at,
        );

        #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
        let (id, lister_id, created_at) = (
            SpaceId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.lister_id)?),
            parse_ts(&self.created_at)?,
        );

        Ok(Space::from_parts(
            id,
            lister_id,
            self.name,
            day_rate,
            created_at,
        ))
    }
}

impl DbBooking {
    /// Convert database row to domain Booking.
    pub fn into_domain(self) -> Result<Booking, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let payment_state = parse_payment_state(&self.payment_state)?;
        let unit_rate = Money::new(self.unit_rate, currency).map_err(RepoError::Domain)?;
        let service_fee = Money::new(self.service_fee, currency).map_err(RepoError::Domain)?;
        let tax = Money::new(self.tax, currency).map_err(RepoError::Domain)?;
        let total = Money::new(self.total, currency).map_err(RepoError::Domain)?;

        #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
        let (id, renter_id, space_id, start_date, end_date, created_at) = (
            BookingId::from_uuid(self.id),
            UserId::from_uuid(self.renter_id),
            SpaceId::from_uuid(self.space_id),
            self.start_date,
            self.end_date,
            self.created_at,
        );

        #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
        let (id, renter_id, space_id, start_date, end_date, created_at) = (
            BookingId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.renter_id)?),
            SpaceId::from_uuid(parse_uuid(&self.space_id)?),
            parse_ts(&self.start_date)?,
            parse_ts(&self.end_date)?,
            parse_ts(&self.created_at)?,
        );

        let dates =
            DateRange::new(start_date, end_date).map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(Booking::from_parts(
            id,
            ConfirmationCode::from_string(self.confirmation_code),
            renter_id,
            space_id,
            dates,
            self.quantity,
            unit_rate,
            self.number_of_days,
            service_fee,
            tax,
            total,
            self.payment_intent_id,
            payment_state,
            created_at,
        ))
    }
}

impl DbBookingWithSpace {
    /// Convert joined row to domain Booking and Space.
    pub fn into_domain(self) -> Result<(Booking, Space), RepoError> {
        let space_currency = parse_currency(&self.space_currency)?;
        let day_rate = Money::new(self.space_day_rate, space_currency).map_err(RepoError::Domain)?;

        #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
        let (lister_id, space_created_at) = (
            UserId::from_uuid(self.space_lister_id),
            self.space_created_at,
        );

        #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
        let (lister_id, space_created_at) = (
            UserId::from_uuid(parse_uuid(&self.space_lister_id)?),
            parse_ts(&self.space_created_at)?,
        );

        let booking = self.booking.into_domain()?;
        let space = Space::from_parts(
            booking.space_id,
            lister_id,
            self.space_name,
            day_rate,
            space_created_at,
        );

        Ok((booking, space))
    }
}

impl DbStoredEvent {
    /// Convert database row to domain StoredEvent.
    pub fn into_domain(self) -> Result<StoredEvent, RepoError> {
        let status = parse_event_status(&self.status)?;

        #[cfg(any(feature = "postgres", not(feature = "sqlite")))]
        let (payload, received_at, processed_at, next_attempt_at) = (
            self.payload,
            self.received_at,
            self.processed_at,
            self.next_attempt_at,
        );

        #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
        let (payload, received_at, processed_at, next_attempt_at) = {
            let payload: serde_json::Value = serde_json::from_str(&self.payload)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            let received_at = parse_ts(&self.received_at)?;
            let processed_at = self.processed_at.as_deref().map(parse_ts).transpose()?;
            let next_attempt_at = self.next_attempt_at.as_deref().map(parse_ts).transpose()?;
            (payload, received_at, processed_at, next_attempt_at)
        };

        Ok(StoredEvent::from_parts(
            self.id,
            self.event_type,
            payload,
            status,
            self.attempts,
            self.last_error,
            received_at,
            processed_at,
            next_attempt_at,
        ))
    }
}
