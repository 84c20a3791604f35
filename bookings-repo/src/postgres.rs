//! PostgreSQL repository adapter.
//!
//! Booking creation runs under SERIALIZABLE isolation: the overlap check
//! and the insert are one transaction, and a serialization failure from a
//! racing insert surfaces as the same conflict a found overlap does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use bookings_types::{
    Booking, BookingFilter, BookingId, BookingRepository, EventStatus, PaymentState, RepoError,
    Space, SpaceId, StoredEvent, User, UserId,
};

use crate::types::{DbBooking, DbBookingWithSpace, DbSpace, DbStoredEvent, DbUser};

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
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository implementation.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_gateway_events_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

/// Maps a SERIALIZABLE write that lost its race (SQLSTATE 40001) to the
/// booking conflict it was protecting against.
fn map_booking_tx_err(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("40001") {
            return RepoError::Conflict(
                "space is already booked for the requested date range".into(),
            );
        }
    }
    RepoError::Database(e.to_string())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl BookingRepository for PostgresRepo {
    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, role, created_at) VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(user.id.into_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_ref())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let row: Option<DbUser> = sqlx::query_as(
            r#"SELECT id, name, email, role, created_at FROM users WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn create_space(&self, space: &Space) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO spaces (id, lister_id, name, day_rate, currency, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(space.id.into_uuid())
        .bind(space.lister_id.into_uuid())
        .bind(&space.name)
        .bind(space.day_rate.amount())
        .bind(space.day_rate.currency().to_string())
        .bind(space.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_space(&self, id: SpaceId) -> Result<Option<Space>, RepoError> {
        let row: Option<DbSpace> = sqlx::query_as(
            r#"SELECT id, lister_id, name, day_rate, currency, created_at
               FROM spaces WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbSpace::into_domain).transpose()
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let existing: Option<(Uuid,)> = sqlx::query_as(
            r#"SELECT id FROM bookings
               WHERE space_id = $1 AND start_date < $2 AND end_date > $3
               LIMIT 1"#,
        )
        .bind(booking.space_id.into_uuid())
        .bind(booking.dates.end())
        .bind(booking.dates.start())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if existing.is_some() {
            return Err(RepoError::Conflict(
                "space is already booked for the requested date range".into(),
            ));
        }

        sqlx::query(
            r#"INSERT INTO bookings (id, confirmation_code, renter_id, space_id, start_date,
                                     end_date, quantity, unit_rate, number_of_days, service_fee,
                                     tax, total, currency, payment_intent_id, payment_state,
                                     created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#,
        )
        .bind(booking.id.into_uuid())
        .bind(booking.confirmation_code.as_str())
        .bind(booking.renter_id.into_uuid())
        .bind(booking.space_id.into_uuid())
        .bind(booking.dates.start())
        .bind(booking.dates.end())
        .bind(booking.quantity)
        .bind(booking.unit_rate.amount())
        .bind(booking.number_of_days)
        .bind(booking.service_fee.amount())
        .bind(booking.tax.amount())
        .bind(booking.total.amount())
        .bind(booking.total.currency().to_string())
        .bind(&booking.payment_intent_id)
        .bind(booking.payment_state.as_ref())
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_booking_tx_err)?;

        tx.commit().await.map_err(map_booking_tx_err)?;

        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError> {
        let row: Option<DbBooking> = sqlx::query_as(
            r#"SELECT id, confirmation_code, renter_id, space_id, start_date, end_date,
                      quantity, unit_rate, number_of_days, service_fee, tax, total,
                      currency, payment_intent_id, payment_state, created_at
               FROM bookings WHERE id = $1"#,
        )
        .bind(id.into_uuid())
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
        let now = Utc::now();

        let mut sql = String::from(BOOKING_WITH_SPACE_SELECT);
        sql.push_str(" WHERE b.renter_id = $1");
        match filter {
            BookingFilter::Upcoming => sql.push_str(" AND b.start_date >= $2"),
            BookingFilter::Current => sql.push_str(" AND b.start_date <= $2 AND b.end_date >= $2"),
            BookingFilter::Past => sql.push_str(" AND b.end_date < $2"),
            BookingFilter::All => {}
        }
        sql.push_str(" ORDER BY b.start_date DESC");

        let mut query =
            sqlx::query_as::<_, DbBookingWithSpace>(&sql).bind(renter_id.into_uuid());
        if filter != BookingFilter::All {
            query = query.bind(now);
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
               FROM bookings WHERE payment_intent_id = $1"#,
        )
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbBooking::into_domain).transpose()
    }

    async fn set_payment_intent(&self, id: BookingId, intent_id: &str) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE bookings SET payment_intent_id = $1, payment_state = 'INITIATED'
               WHERE id = $2"#,
        )
        .bind(intent_id)
        .bind(id.into_uuid())
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
        let result = sqlx::query(r#"UPDATE bookings SET payment_state = $1 WHERE id = $2"#)
            .bind(state.as_ref())
            .bind(id.into_uuid())
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
               VALUES ($1, $2, $3, 'PENDING', 0, $4)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(id)
        .bind(event_type)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending_gateway_events(&self, limit: i64) -> Result<Vec<StoredEvent>, RepoError> {
        // SKIP LOCKED lets several workers poll without handing out the same
        // rows twice (Postgres feature).
        let rows: Vec<DbStoredEvent> = sqlx::query_as(
            r#"SELECT id, event_type, payload, status, attempts, last_error,
                      received_at, processed_at, next_attempt_at
               FROM gateway_events
               WHERE status = 'PENDING' AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
               ORDER BY received_at ASC
               LIMIT $2
               FOR UPDATE SKIP LOCKED"#,
        )
        .bind(Utc::now())
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
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE gateway_events
               SET status = $1, attempts = attempts + 1, last_error = $2,
                   processed_at = $3, next_attempt_at = $4
               WHERE id = $5"#,
        )
        .bind(status.as_ref())
        .bind(&last_error)
        .bind(Utc::now())
        .bind(next_attempt_at)
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
