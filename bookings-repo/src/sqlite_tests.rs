//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use bookings_types::{
        Booking, BookingFilter, BookingId, BookingRepository, Currency, DateRange, EventStatus,
        Money, PaymentState, RepoError, Space, User, UserId, UserRole, ZeroFees, quote,
    };

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn renter() -> User {
        User::new(
            "Rama".to_string(),
            "rama@example.com".to_string(),
            UserRole::Renter,
        )
        .unwrap()
    }

    fn lister() -> User {
        User::new(
            "Lin".to_string(),
            "lin@example.com".to_string(),
            UserRole::Lister,
        )
        .unwrap()
    }

    fn space(lister_id: UserId) -> Space {
        Space::new(
            lister_id,
            "Studio 4B".to_string(),
            Money::new(100, Currency::USD).unwrap(),
        )
        .unwrap()
    }

    /// Range `start_days..end_days` relative to now.
    fn days_from_now(start_days: i64, end_days: i64) -> DateRange {
        let now = Utc::now();
        DateRange::new(
            now + Duration::days(start_days),
            now + Duration::days(end_days),
        )
        .unwrap()
    }

    fn booking(renter: &User, space: &Space, dates: DateRange) -> Booking {
        let q = quote(space.day_rate, 1, &dates, &ZeroFees).unwrap();
        Booking::new(renter.id, space.id, dates, q)
    }

    /// Seeds a renter, a lister and one space.
    async fn seed(repo: &SqliteRepo) -> (User, Space) {
        let user = renter();
        let owner = lister();
        let sp = space(owner.id);
        repo.create_user(&user).await.unwrap();
        repo.create_user(&owner).await.unwrap();
        repo.create_space(&sp).await.unwrap();
        (user, sp)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users & spaces
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_user_round_trip() {
        let repo = setup_repo().await;
        let user = renter();

        repo.create_user(&user).await.unwrap();
        let fetched = repo.get_user(user.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.email, "rama@example.com");
        assert_eq!(fetched.role, UserRole::Renter);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let repo = setup_repo().await;
        assert!(repo.get_user(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_space_round_trip() {
        let repo = setup_repo().await;
        let owner = lister();
        let sp = space(owner.id);

        repo.create_user(&owner).await.unwrap();
        repo.create_space(&sp).await.unwrap();
        let fetched = repo.get_space(sp.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, sp.id);
        assert_eq!(fetched.day_rate.amount(), 100);
        assert_eq!(fetched.day_rate.currency(), Currency::USD);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bookings and the no-overlap guarantee
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_booking_round_trip() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;
        let b = booking(&user, &sp, days_from_now(1, 3));

        repo.create_booking(&b).await.unwrap();
        let fetched = repo.get_booking(b.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, b.id);
        assert_eq!(fetched.confirmation_code, b.confirmation_code);
        assert_eq!(fetched.total.amount(), 200);
        assert_eq!(fetched.payment_state, PaymentState::Created);
        assert!(fetched.payment_intent_id.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_booking_rejected() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;

        repo.create_booking(&booking(&user, &sp, days_from_now(1, 5)))
            .await
            .unwrap();

        let result = repo
            .create_booking(&booking(&user, &sp, days_from_now(4, 6)))
            .await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));

        let stored = repo
            .list_bookings_for_renter(user.id, BookingFilter::All)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_touching_ranges_both_stored() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;

        // [1,3) and [3,5): the first ends exactly where the second starts.
        repo.create_booking(&booking(&user, &sp, days_from_now(1, 3)))
            .await
            .unwrap();
        repo.create_booking(&booking(&user, &sp, days_from_now(3, 5)))
            .await
            .unwrap();

        let stored = repo
            .list_bookings_for_renter(user.id, BookingFilter::All)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_overlap_on_other_space_allowed() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;
        let other = space(sp.lister_id);
        repo.create_space(&other).await.unwrap();

        repo.create_booking(&booking(&user, &sp, days_from_now(1, 5)))
            .await
            .unwrap();
        repo.create_booking(&booking(&user, &other, days_from_now(2, 4)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_slice_by_now() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;

        let past = booking(&user, &sp, days_from_now(-5, -2));
        let current = booking(&user, &sp, days_from_now(-1, 1));
        let upcoming = booking(&user, &sp, days_from_now(2, 4));
        for b in [&past, &current, &upcoming] {
            repo.create_booking(b).await.unwrap();
        }

        let got = |filter| repo.list_bookings_for_renter(user.id, filter);

        let upcoming_rows = got(BookingFilter::Upcoming).await.unwrap();
        assert_eq!(upcoming_rows.len(), 1);
        assert_eq!(upcoming_rows[0].0.id, upcoming.id);

        let current_rows = got(BookingFilter::Current).await.unwrap();
        assert_eq!(current_rows.len(), 1);
        assert_eq!(current_rows[0].0.id, current.id);

        let past_rows = got(BookingFilter::Past).await.unwrap();
        assert_eq!(past_rows.len(), 1);
        assert_eq!(past_rows[0].0.id, past.id);

        // All: newest range first.
        let all = got(BookingFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0.id, upcoming.id);
        assert_eq!(all[2].0.id, past.id);
        assert_eq!(all[0].1.id, sp.id);
    }

    #[tokio::test]
    async fn test_list_scoped_to_renter() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;
        let other = renter();
        repo.create_user(&other).await.unwrap();

        repo.create_booking(&booking(&other, &sp, days_from_now(1, 3)))
            .await
            .unwrap();

        let rows = repo
            .list_bookings_for_renter(user.id, BookingFilter::All)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payment intent linkage
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_set_payment_intent_moves_state_to_initiated() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;
        let b = booking(&user, &sp, days_from_now(1, 3));
        repo.create_booking(&b).await.unwrap();

        repo.set_payment_intent(b.id, "pi_123").await.unwrap();

        let updated = repo.get_booking(b.id).await.unwrap().unwrap();
        assert_eq!(updated.payment_intent_id.as_deref(), Some("pi_123"));
        assert_eq!(updated.payment_state, PaymentState::Initiated);

        let by_intent = repo.find_booking_by_intent("pi_123").await.unwrap().unwrap();
        assert_eq!(by_intent.id, b.id);
    }

    #[tokio::test]
    async fn test_set_payment_intent_unknown_booking() {
        let repo = setup_repo().await;
        let result = repo.set_payment_intent(BookingId::new(), "pi_123").await;
        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_payment_state() {
        let repo = setup_repo().await;
        let (user, sp) = seed(&repo).await;
        let b = booking(&user, &sp, days_from_now(1, 3));
        repo.create_booking(&b).await.unwrap();
        repo.set_payment_intent(b.id, "pi_123").await.unwrap();

        repo.update_payment_state(b.id, PaymentState::Succeeded)
            .await
            .unwrap();

        let updated = repo.get_booking(b.id).await.unwrap().unwrap();
        assert_eq!(updated.payment_state, PaymentState::Succeeded);
    }

    #[tokio::test]
    async fn test_find_booking_by_unknown_intent() {
        let repo = setup_repo().await;
        assert!(repo.find_booking_by_intent("pi_nope").await.unwrap().is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gateway event queue
    // ─────────────────────────────────────────────────────────────────────────

    fn event_payload(intent: &str) -> serde_json::Value {
        json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": intent, "metadata": {"email": "rama@example.com"}}}
        })
    }

    #[tokio::test]
    async fn test_redelivered_event_recorded_once() {
        let repo = setup_repo().await;
        let payload = event_payload("pi_123");

        let first = repo
            .record_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();
        let second = repo
            .record_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let pending = repo.pending_gateway_events(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "evt_1");
        assert_eq!(pending[0].status, EventStatus::Pending);
        assert_eq!(pending[0].attempts, 0);
        assert_eq!(pending[0].payload, payload);
    }

    #[tokio::test]
    async fn test_completed_event_leaves_the_queue() {
        let repo = setup_repo().await;
        let payload = event_payload("pi_123");
        repo.record_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();

        repo.update_gateway_event("evt_1", EventStatus::Completed, None, None)
            .await
            .unwrap();

        assert!(repo.pending_gateway_events(10).await.unwrap().is_empty());

        let (status, attempts): (String, i32) =
            sqlx::query_as("SELECT status, attempts FROM gateway_events WHERE id = ?")
                .bind("evt_1")
                .fetch_one(repo.pool())
                .await
                .unwrap();
        assert_eq!(status, "COMPLETED");
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_backoff_hides_event_until_due() {
        let repo = setup_repo().await;
        let payload = event_payload("pi_123");
        repo.record_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();

        // Failed attempt, retry scheduled a minute out: not due yet.
        repo.update_gateway_event(
            "evt_1",
            EventStatus::Pending,
            Some("no booking for intent pi_123".to_string()),
            Some(Utc::now() + Duration::seconds(60)),
        )
        .await
        .unwrap();
        assert!(repo.pending_gateway_events(10).await.unwrap().is_empty());

        // Reschedule into the past: due again, attempts accumulated.
        repo.update_gateway_event(
            "evt_1",
            EventStatus::Pending,
            Some("no booking for intent pi_123".to_string()),
            Some(Utc::now() - Duration::seconds(1)),
        )
        .await
        .unwrap();

        let pending = repo.pending_gateway_events(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(
            pending[0].last_error.as_deref(),
            Some("no booking for intent pi_123")
        );
    }

    #[tokio::test]
    async fn test_failed_event_keeps_last_error() {
        let repo = setup_repo().await;
        let payload = event_payload("pi_123");
        repo.record_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();

        repo.update_gateway_event(
            "evt_1",
            EventStatus::Failed,
            Some("gave up".to_string()),
            None,
        )
        .await
        .unwrap();

        assert!(repo.pending_gateway_events(10).await.unwrap().is_empty());

        let (status, last_error): (String, Option<String>) =
            sqlx::query_as("SELECT status, last_error FROM gateway_events WHERE id = ?")
                .bind("evt_1")
                .fetch_one(repo.pool())
                .await
                .unwrap();
        assert_eq!(status, "FAILED");
        assert_eq!(last_error.as_deref(), Some("gave up"));
    }

    #[tokio::test]
    async fn test_pending_events_oldest_first_with_limit() {
        let repo = setup_repo().await;
        let payload = event_payload("pi_123");

        for id in ["evt_a", "evt_b", "evt_c"] {
            repo.record_gateway_event(id, "payment_intent.succeeded", &payload)
                .await
                .unwrap();
            // Distinct received_at values keep the ordering assertion honest.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let pending = repo.pending_gateway_events(2).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "evt_a");
        assert_eq!(pending[1].id, "evt_b");
    }
}
