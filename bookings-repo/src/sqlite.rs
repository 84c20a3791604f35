//! SQLite repository adapter.
//!
//! UUIDs and timestamps are stored as TEXT. Timestamps use a fixed-width
//! RFC3339 format (see [`fmt_ts`]) so the overlap and due-time predicates
//! can compare them as strings.

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use bookings_types::{
    Booking, BookingFilter, BookingId, BookingRepository, EventStatus, PaymentState, RepoError,
    Space, SpaceId, StoredEvent, User, UserId,
};

use crate::types::{DbBooking, DbBookingWithSpace, DbSpace, DbStoredEvent, DbUser, fmt_ts};

/// Column list shared by every booking+space join.
const BOOKING_WITH_SPACE_SELECT: &str = r#"
    SELECT b.id, b.confirmation_code, b.renter_id, b.space_id, b.start_date, b.end_date,
           b.quantity, b.unit_rate, b.number_of_days, b.service_fee, b.tax, b.total,
           b.currency, b.payment_intent_id, b.payment_state, b.created_at,
           s.lister_id AS space_lister_id, s.name AS space_name,
           s.day_rate AS space_day_rate, s.currency AS space_currency,
           s.created_at AS space_created_at
    FROM bookings b
    JOIN spaces s ON s.id = b.space_id"#;

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        // Run migrations from migration files
        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;

        let ddl_events = include_str!("../migrations/0002_create_gateway_events.sql");
        sqlx::query(ddl_events).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl BookingRepository for SqliteRepo {
    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, role, created_at) VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_ref())
        .bind(fmt_ts(&user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let row: Option<DbUser> = sqlx::query_as(
            r#"SELECT id, name, email, role, created_at FROM users WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn create_space(&self, space: &Space) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO spaces (id, lister_id, name, day_rate, currency, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(space.id.to_string())
        .bind(space.lister_id.to_string())
        .bind(&space.name)
        .bind(space.day_rate.amount())
        .bind(space.day_rate.currency().to_string())
        .bind(fmt_ts(&space.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_space(&self, id: SpaceId) -> Result<Option<Space>, RepoError> {
        let row: Option<DbSpace> = sqlx::query_as(
            r#"SELECT id, lister_id, name, day_rate, currency, created_at
               FROM spaces WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbSpace::into_domain).transpose()
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError> {
        let start = fmt_ts(&booking.dates.start());
        let end = fmt_ts(&booking.dates.end());

        // Guard and insert are one statement, so SQLite's single-writer lock
        // makes the no-overlap check atomic: of two racing inserts for the
        // same space, the second sees the first's row and inserts nothing.
        let result = sqlx::query(
            r#"INSERT INTO bookings (id, confirmation_code, renter_id, space_id, start_date,
                                     end_date, quantity, unit_rate, number_of_days, service_fee,
                                     tax, total, currency, payment_intent_id, payment_state,
                                     created_at)
               SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
               WHERE NOT EXISTS (
                   SELECT 1 FROM bookings
                   WHERE space_id = ? AND start_date < ? AND end_date > ?
               )"#,
        )
        .bind(booking.id.to_string())
        .bind(booking.confirmation_code.as_str())
        .bind(booking.renter_id.to_string())
        .bind(booking.space_id.to_string())
        .bind(&start)
        .bind(&end)
        .bind(booking.quantity)
        .bind(booking.unit_rate.amount())
        .bind(booking.number_of_days)
        .bind(booking.service_fee.amount())
        .bind(booking.tax.amount())
        .bind(booking.total.amount())
        .bind(booking.total.currency().to_string())
        .bind(&booking.payment_intent_id)
        .bind(booking.payment_state.as_ref())
        .bind(fmt_ts(&booking.created_at))
        .bind(booking.space_id.to_string())
        .bind(&end)
        .bind(&start)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::Conflict(
                "space is already booked for the requested date range".into(),
            ));
        }

        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError> {
        let row: Option<DbBooking> = sqlx::query_as(
            r#"SELECT id, confirmation_code, renter_id, space_id, start_date, end_date,
                      quantity, unit_rate, number_of_days, service_fee, tax, total,
                      currency, payment_intent_id, payment_state, created_at
               FROM bookings WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbBooking::into_domain).transpose()
    }

    async fn list_bookings_for_renter(
        &self,
        renter_id: UserId,
        filter: BookingFilter,
    ) -> Result<Vec<(Booking, Space)>, RepoError> {
        let now = fmt_ts(&chrono::Utc::now());

        let mut sql = String::from(BOOKING_WITH_SPACE_SELECT);
        sql.push_str(" WHERE b.renter_id = ?");
        match filter {
            BookingFilter::Upcoming => sql.push_str(" AND b.start_date >= ?"),
            BookingFilter::Current => sql.push_str(" AND b.start_date <= ? AND b.end_date >= ?"),
            BookingFilter::Past => sql.push_str(" AND b.end_date < ?"),
            BookingFilter::All => {}
        }
        sql.push_str(" ORDER BY b.start_date DESC");

        let mut query =
            sqlx::query_as::<_, DbBookingWithSpace>(&sql).bind(renter_id.to_string());
        match filter {
            BookingFilter::Upcoming | BookingFilter::Past => query = query.bind(&now),
            BookingFilter::Current => query = query.bind(&now).bind(&now),
            BookingFilter::All => {}
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter()
            .map(DbBookingWithSpace::into_domain)
            .collect()
    }

    async fn find_booking_by_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<Booking>, RepoError> {
        let row: Option<DbBooking> = sqlx::query_as(
            r#"SELECT id, confirmation_code, renter_id, space_id, start_date, end_date,
                      quantity, unit_rate, number_of_days, service_fee, tax, total,
                      currency, payment_intent_id, payment_state, created_at
               FROM bookings WHERE payment_intent_id = ?"#,
        )
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbBooking::into_domain).transpose()
    }

    async fn set_payment_intent(&self, id: BookingId, intent_id: &str) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE bookings SET payment_intent_id = ?, payment_state = 'INITIATED'
               WHERE id = ?"#,
        )
        .bind(intent_id)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }

    async fn update_payment_state(
        &self,
        id: BookingId,
        state: PaymentState,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE bookings SET payment_state = ? WHERE id = ?"#)
            .bind(state.as_ref())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }

    async fn record_gateway_event(
        &self,
        id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, RepoError> {
        // The gateway event id is the primary key; a redelivered event
        // collapses into the existing row and reports `false`.
        let result = sqlx::query(
            r#"INSERT INTO gateway_events (id, event_type, payload, status, attempts, received_at)
               VALUES (?, ?, ?, 'PENDING', 0, ?)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(id)
        .bind(event_type)
        .bind(payload.to_string())
        .bind(fmt_ts(&chrono::Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending_gateway_events(&self, limit: i64) -> Result<Vec<StoredEvent>, RepoError> {
        let now = fmt_ts(&chrono::Utc::now());

        let rows: Vec<DbStoredEvent> = sqlx::query_as(
            r#"SELECT id, event_type, payload, status, attempts, last_error,
                      received_at, processed_at, next_attempt_at
               FROM gateway_events
               WHERE status = 'PENDING' AND (next_attempt_at IS NULL OR next_attempt_at <= ?)
               ORDER BY received_at ASC
               LIMIT ?"#,
        )
        .bind(&now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbStoredEvent::into_domain).collect()
    }

    async fn update_gateway_event(
        &self,
        id: &str,
        status: EventStatus,
        last_error: Option<String>,
        next_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE gateway_events
               SET status = ?, attempts = attempts + 1, last_error = ?,
                   processed_at = ?, next_attempt_at = ?
               WHERE id = ?"#,
        )
        .bind(status.as_ref())
        .bind(&last_error)
        .bind(fmt_ts(&chrono::Utc::now()))
        .bind(next_attempt_at.map(|dt| fmt_ts(&dt)))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}
