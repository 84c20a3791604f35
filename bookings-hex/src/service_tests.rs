//! BookingService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use bookings_types::{
        AppError, Booking, BookingFilter, BookingId, BookingRepository, CardDetails, Charge,
        CreateBookingRequest, CreateIntentRequest, Currency, Customer, DateRange, EventStatus,
        GatewayError, InitiatePaymentRequest, IntentStatus, Money, Notifier, NotifyError,
        PaymentDetailRequest, PaymentGateway, PaymentIntent, PaymentSource, PaymentState, Refund,
        RepoError, Space, SpaceId, StoredEvent, User, UserId, UserRole, ZeroFees, quote,
    };

    use crate::BookingService;

    // ─────────────────────────────────────────────────────────────────────────────
    // Mock ports, shared with the worker tests
    // ─────────────────────────────────────────────────────────────────────────────

    /// Simple in-memory repository for testing the application layer.
    pub struct MockRepo {
        users: Mutex<HashMap<UserId, User>>,
        spaces: Mutex<HashMap<SpaceId, Space>>,
        bookings: Mutex<Vec<Booking>>,
        events: Mutex<Vec<StoredEvent>>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                users: Mutex::new(HashMap::new()),
                spaces: Mutex::new(HashMap::new()),
                bookings: Mutex::new(Vec::new()),
                events: Mutex::new(Vec::new()),
            }
        }

        /// Inserts a queue row as-is, bypassing the dedup insert.
        pub fn seed_event(&self, event: StoredEvent) {
            self.events.lock().unwrap().push(event);
        }

        /// Clears a pending event's retry delay so it is due immediately.
        pub fn make_due(&self, id: &str) {
            let mut events = self.events.lock().unwrap();
            if let Some(event) = events.iter_mut().find(|e| e.id == id) {
                event.next_attempt_at = None;
            }
        }

        pub fn stored_event(&self, id: &str) -> Option<StoredEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == id)
                .cloned()
        }
    }

    #[async_trait]
    impl BookingRepository for MockRepo {
        async fn create_user(&self, user: &User) -> Result<(), RepoError> {
            self.users.lock().unwrap().insert(user.id, user.clone());
            Ok(())
        }

        async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn create_space(&self, space: &Space) -> Result<(), RepoError> {
            self.spaces.lock().unwrap().insert(space.id, space.clone());
            Ok(())
        }

        async fn get_space(&self, id: SpaceId) -> Result<Option<Space>, RepoError> {
            Ok(self.spaces.lock().unwrap().get(&id).cloned())
        }

        async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError> {
            let mut bookings = self.bookings.lock().unwrap();
            let clash = bookings
                .iter()
                .any(|b| b.space_id == booking.space_id && b.dates.overlaps(&booking.dates));
            if clash {
                return Err(RepoError::Conflict(
                    "space is already booked for the requested date range".into(),
                ));
            }
            bookings.push(booking.clone());
            Ok(())
        }

        async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError> {
            Ok(self
                .bookings
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.id == id)
                .cloned())
        }

        async fn list_bookings_for_renter(
            &self,
            renter_id: UserId,
            filter: BookingFilter,
        ) -> Result<Vec<(Booking, Space)>, RepoError> {
            let now = Utc::now();
            let spaces = self.spaces.lock().unwrap();
            let mut rows: Vec<(Booking, Space)> = self
                .bookings
                .lock()
                .unwrap()
                .iter()
                .filter(|b| b.renter_id == renter_id)
                .filter(|b| match filter {
                    BookingFilter::Upcoming => b.dates.start() >= now,
                    BookingFilter::Current => b.dates.start() <= now && b.dates.end() >= now,
                    BookingFilter::Past => b.dates.end() < now,
                    BookingFilter::All => true,
                })
                .map(|b| {
                    let space = spaces.get(&b.space_id).cloned().ok_or(RepoError::NotFound)?;
                    Ok((b.clone(), space))
                })
                .collect::<Result<_, RepoError>>()?;
            rows.sort_by_key(|(b, _)| std::cmp::Reverse(b.dates.start()));
            Ok(rows)
        }

        async fn find_booking_by_intent(
            &self,
            intent_id: &str,
        ) -> Result<Option<Booking>, RepoError> {
            Ok(self
                .bookings
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.payment_intent_id.as_deref() == Some(intent_id))
                .cloned())
        }

        async fn set_payment_intent(
            &self,
            id: BookingId,
            intent_id: &str,
        ) -> Result<(), RepoError> {
            let mut bookings = self.bookings.lock().unwrap();
            let booking = bookings
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or(RepoError::NotFound)?;
            booking.payment_intent_id = Some(intent_id.to_string());
            booking.payment_state = PaymentState::Initiated;
            Ok(())
        }

        async fn update_payment_state(
            &self,
            id: BookingId,
            state: PaymentState,
        ) -> Result<(), RepoError> {
            let mut bookings = self.bookings.lock().unwrap();
            let booking = bookings
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or(RepoError::NotFound)?;
            booking.payment_state = state;
            Ok(())
        }

        async fn record_gateway_event(
            &self,
            id: &str,
            event_type: &str,
            payload: &serde_json::Value,
        ) -> Result<bool, RepoError> {
            let mut events = self.events.lock().unwrap();
            if events.iter().any(|e| e.id == id) {
                return Ok(false);
            }
            events.push(StoredEvent::new(
                id.to_string(),
                event_type.to_string(),
                payload.clone(),
            ));
            Ok(true)
        }

        async fn pending_gateway_events(&self, limit: i64) -> Result<Vec<StoredEvent>, RepoError> {
            let now = Utc::now();
            let mut due: Vec<StoredEvent> = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.status == EventStatus::Pending)
                .filter(|e| e.next_attempt_at.is_none_or(|at| at <= now))
                .cloned()
                .collect();
            due.sort_by_key(|e| e.received_at);
            due.truncate(limit as usize);
            Ok(due)
        }

        async fn update_gateway_event(
            &self,
            id: &str,
            status: EventStatus,
            last_error: Option<String>,
            next_attempt_at: Option<DateTime<Utc>>,
        ) -> Result<(), RepoError> {
            let mut events = self.events.lock().unwrap();
            let event = events
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(RepoError::NotFound)?;
            event.status = status;
            event.attempts += 1;
            event.last_error = last_error;
            event.processed_at = Some(Utc::now());
            event.next_attempt_at = next_attempt_at;
            Ok(())
        }
    }

    /// In-memory payment gateway capturing every call.
    pub struct MockGateway {
        pub intents: Mutex<Vec<CreateIntentRequest>>,
        pub refunds: Mutex<Vec<(String, Option<String>)>>,
        pub fail_refunds: AtomicBool,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self {
                intents: Mutex::new(Vec::new()),
                refunds: Mutex::new(Vec::new()),
                fail_refunds: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_payment_intent(
            &self,
            req: CreateIntentRequest,
        ) -> Result<PaymentIntent, GatewayError> {
            let mut intents = self.intents.lock().unwrap();
            let intent = PaymentIntent {
                id: format!("pi_mock_{}", intents.len() + 1),
                amount: req.amount,
                currency: req.currency.code().to_string(),
                status: IntentStatus::Processing,
                payment_method: Some(req.payment_method.clone()),
                client_secret: None,
                latest_charge: None,
                metadata: None,
            };
            intents.push(req);
            Ok(intent)
        }

        async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
            Ok(PaymentIntent {
                id: id.to_string(),
                amount: 400,
                currency: "usd".to_string(),
                status: IntentStatus::Succeeded,
                payment_method: Some("pm_card_visa".to_string()),
                client_secret: None,
                latest_charge: Some("ch_mock_1".to_string()),
                metadata: None,
            })
        }

        async fn create_refund(
            &self,
            payment_intent_id: &str,
            idempotency_key: Option<&str>,
        ) -> Result<Refund, GatewayError> {
            if self.fail_refunds.load(Ordering::SeqCst) {
                return Err(GatewayError::Http("refund endpoint unavailable".into()));
            }
            let mut refunds = self.refunds.lock().unwrap();
            refunds.push((
                payment_intent_id.to_string(),
                idempotency_key.map(str::to_string),
            ));
            Ok(Refund {
                id: format!("re_mock_{}", refunds.len()),
                payment_intent: Some(payment_intent_id.to_string()),
                status: "succeeded".to_string(),
            })
        }

        async fn list_charges(&self, _limit: Option<u32>) -> Result<Vec<Charge>, GatewayError> {
            Ok(vec![
                Charge {
                    id: "ch_mock_1".to_string(),
                    amount: 400,
                    currency: "usd".to_string(),
                    status: "succeeded".to_string(),
                    payment_intent: Some("pi_mock_1".to_string()),
                },
                Charge {
                    id: "ch_mock_2".to_string(),
                    amount: 250,
                    currency: "usd".to_string(),
                    status: "succeeded".to_string(),
                    payment_intent: Some("pi_mock_2".to_string()),
                },
            ])
        }

        async fn create_customer(
            &self,
            email: Option<&str>,
            name: Option<&str>,
        ) -> Result<Customer, GatewayError> {
            Ok(Customer {
                id: "cus_mock_1".to_string(),
                email: email.map(str::to_string),
                name: name.map(str::to_string),
            })
        }

        async fn attach_payment_method(
            &self,
            customer_id: &str,
            card: CardDetails,
        ) -> Result<PaymentSource, GatewayError> {
            Ok(PaymentSource {
                id: "card_mock_1".to_string(),
                brand: Some("visa".to_string()),
                last4: Some(card.number.chars().rev().take(4).collect()),
                exp_month: Some(card.exp_month),
                exp_year: Some(card.exp_year),
                customer: Some(customer_id.to_string()),
            })
        }

        async fn list_payment_methods(
            &self,
            customer_id: &str,
        ) -> Result<Vec<PaymentSource>, GatewayError> {
            Ok(vec![PaymentSource {
                id: "pm_mock_1".to_string(),
                brand: Some("visa".to_string()),
                last4: Some("4242".to_string()),
                exp_month: Some(12),
                exp_year: Some(2033),
                customer: Some(customer_id.to_string()),
            }])
        }
    }

    /// Notifier that records (email, subject) pairs.
    #[derive(Default)]
    pub struct MockNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, email: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), subject.to_string()));
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────────

    pub type TestService = BookingService<std::sync::Arc<MockRepo>, std::sync::Arc<MockGateway>>;

    pub async fn setup() -> (
        TestService,
        std::sync::Arc<MockRepo>,
        std::sync::Arc<MockGateway>,
        User,
        Space,
    ) {
        let repo = std::sync::Arc::new(MockRepo::new());
        let gateway = std::sync::Arc::new(MockGateway::new());

        let renter =
            User::new("Asha".into(), "asha@example.com".into(), UserRole::Renter).unwrap();
        repo.create_user(&renter).await.unwrap();
        let lister = User::new("Noor".into(), "noor@example.com".into(), UserRole::Lister).unwrap();
        repo.create_user(&lister).await.unwrap();

        let rate = Money::new(100, Currency::USD).unwrap();
        let space = Space::new(lister.id, "Dock A".into(), rate).unwrap();
        repo.create_space(&space).await.unwrap();

        let service = BookingService::new(repo.clone(), gateway.clone());
        (service, repo, gateway, renter, space)
    }

    fn ymd(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn request(start: DateTime<Utc>, end: DateTime<Utc>, quantity: i64) -> CreateBookingRequest {
        CreateBookingRequest {
            start_date: start,
            end_date: end,
            quantity,
        }
    }

    /// A date range relative to now, for filter tests.
    fn days_from_now(start: i64, end: i64) -> DateRange {
        let now = Utc::now();
        DateRange::new(now + Duration::days(start), now + Duration::days(end)).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Booking creation
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_booking_success() {
        let (service, _repo, _gateway, renter, space) = setup().await;

        let booking = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 2),
            )
            .await
            .unwrap();

        assert_eq!(booking.number_of_days, 2);
        assert_eq!(booking.total.amount(), 400);
        assert_eq!(booking.payment_state, PaymentState::Created);
        assert_eq!(booking.confirmation_code.as_str().len(), 12);
        assert!(booking.payment_intent_id.is_none());
    }

    #[tokio::test]
    async fn test_create_booking_unknown_user_fails() {
        let (service, _repo, _gateway, _renter, space) = setup().await;

        let result = service
            .create_booking(
                UserId::new(),
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_lister_cannot_book() {
        let (service, _repo, _gateway, _renter, space) = setup().await;

        // The space's own lister tries to book it.
        let result = service
            .create_booking(
                space.lister_id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_booking_unknown_space_fails() {
        let (service, _repo, _gateway, renter, _space) = setup().await;

        let result = service
            .create_booking(
                renter.id,
                SpaceId::new(),
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_inverted_interval_fails() {
        let (service, _repo, _gateway, renter, space) = setup().await;

        let result = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 5), ymd(2030, 2, 1), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_sub_day_interval_fails() {
        let (service, _repo, _gateway, renter, space) = setup().await;

        let start = ymd(2030, 2, 1);
        let result = service
            .create_booking(
                renter.id,
                space.id,
                request(start, start + Duration::hours(6), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_past_dates_fail() {
        let (service, _repo, _gateway, renter, space) = setup().await;

        let result = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2020, 2, 1), ymd(2020, 2, 3), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_zero_quantity_fails() {
        let (service, _repo, _gateway, renter, space) = setup().await;

        let result = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 0),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_overlapping_booking_conflicts() {
        let (service, repo, _gateway, renter, space) = setup().await;

        service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 5), 1),
            )
            .await
            .unwrap();

        let result = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 3), ymd(2030, 2, 7), 1),
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));

        // Only the first booking was stored.
        let all = repo
            .list_bookings_for_renter(renter.id, BookingFilter::All)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_touching_bookings_allowed() {
        let (service, _repo, _gateway, renter, space) = setup().await;

        service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 5), 1),
            )
            .await
            .unwrap();

        // [start, end) means a range may begin exactly where another ends.
        let booking = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 5), ymd(2030, 2, 7), 1),
            )
            .await
            .unwrap();

        assert_eq!(booking.number_of_days, 2);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_bookings_filters() {
        let (service, repo, _gateway, renter, space) = setup().await;

        // Inserted through the repo directly; the service refuses past dates.
        let mut seeded = Vec::new();
        for range in [
            days_from_now(-10, -8),
            days_from_now(-1, 1),
            days_from_now(5, 7),
        ] {
            let priced = quote(space.day_rate, 1, &range, &ZeroFees).unwrap();
            let booking = Booking::new(renter.id, space.id, range, priced);
            repo.create_booking(&booking).await.unwrap();
            seeded.push(booking);
        }

        let past = service
            .list_bookings(renter.id, BookingFilter::Past)
            .await
            .unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].booking.id, seeded[0].id);

        let current = service
            .list_bookings(renter.id, BookingFilter::Current)
            .await
            .unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].booking.id, seeded[1].id);

        let upcoming = service
            .list_bookings(renter.id, BookingFilter::Upcoming)
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].booking.id, seeded[2].id);

        // Everything, newest range first, with the space attached.
        let all = service
            .list_bookings(renter.id, BookingFilter::All)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].booking.id, seeded[2].id);
        assert_eq!(all[2].booking.id, seeded[0].id);
        assert_eq!(all[0].space.id, space.id);
    }

    #[tokio::test]
    async fn test_list_bookings_scoped_to_renter() {
        let (service, repo, _gateway, renter, space) = setup().await;

        let other =
            User::new("Riya".into(), "riya@example.com".into(), UserRole::Renter).unwrap();
        repo.create_user(&other).await.unwrap();

        service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 1),
            )
            .await
            .unwrap();

        let theirs = service
            .list_bookings(other.id, BookingFilter::All)
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_initiate_payment_confirms_with_idempotency_key() {
        let (service, repo, gateway, renter, space) = setup().await;

        let booking = service
            .create_booking(
                renter.id,
                space.id,
                request(ymd(2030, 2, 1), ymd(2030, 2, 3), 2),
            )
            .await
            .unwrap();

        let response = service
            .initiate_payment(InitiatePaymentRequest {
                booking_id: booking.id,
                amount: booking.total.amount(),
                currency: Currency::USD,
                payment_method: "pm_card_visa".into(),
            })
            .await
            .unwrap();

        assert_eq!(response.message, "Payment initiated successfully");

        let intents = gateway.intents.lock().unwrap();
        assert_eq!(intents.len(), 1);
        assert!(intents[0].confirm);
        assert_eq!(intents[0].amount, 400);
        assert_eq!(
            intents[0].idempotency_key,
            Some(format!("booking-{}-intent", booking.id))
        );
        drop(intents);

        let stored = repo.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_state, PaymentState::Initiated);
        assert_eq!(
            stored.payment_intent_id,
            Some(response.payment_intent_id.clone())
        );
    }

    #[tokio::test]
    async fn test_initiate_payment_unknown_booking() {
        let (service, _repo, gateway, _renter, _space) = setup().await;

        let result = service
            .initiate_payment(InitiatePaymentRequest {
                booking_id: BookingId::new(),
                amount: 400,
                currency: Currency::USD,
                payment_method: "pm_card_visa".into(),
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        // The gateway was never called.
        assert!(gateway.intents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_detail_requires_id() {
        let (service, _repo, _gateway, _renter, _space) = setup().await;

        let result = service
            .payment_intent_details(PaymentDetailRequest {
                payment_intent_id: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_payment_detail_passthrough() {
        let (service, _repo, _gateway, _renter, _space) = setup().await;

        let intent = service
            .payment_intent_details(PaymentDetailRequest {
                payment_intent_id: Some("pi_77".into()),
            })
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_77");
        assert_eq!(intent.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_list_charges_passthrough() {
        let (service, _repo, _gateway, _renter, _space) = setup().await;

        let charges = service.list_charges().await.unwrap();

        assert_eq!(charges.len(), 2);
        assert_eq!(charges[0].id, "ch_mock_1");
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhook intake
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_enqueue_event_dedups() {
        let (service, repo, _gateway, _renter, _space) = setup().await;

        let payload = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1" } }
        });

        let first = service
            .enqueue_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();
        let second = service
            .enqueue_gateway_event("evt_1", "payment_intent.succeeded", &payload)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let pending = repo.pending_gateway_events(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 0);
    }
}
