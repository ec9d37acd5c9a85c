use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use ridepool_domain::{
    Booking, BookingStatus, BookingTransition, MarketplaceStore, NotificationKind, Notifier,
    Principal, SeatDelta, StoreError,
};

/// Errors surfaced by the booking lifecycle operations. Every variant
/// maps to one entry of the API error taxonomy; all precondition
/// failures are detected before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("ride not found: {0}")]
    RideNotFound(Uuid),

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("you cannot book a seat on your own ride")]
    SelfBookingDenied,

    #[error("you already have an active request for this ride")]
    DuplicateBookingRequest,

    #[error("this ride is not open for booking")]
    RideClosed,

    #[error("not enough seats available: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("you are not allowed to modify this booking")]
    NotAuthorized,

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("the booking was modified concurrently, please retry")]
    TransactionConflict,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(StoreError),
}

/// Owns the booking state machine and the seat-count invariant.
///
/// Stateless across calls: all durable state lives behind the store,
/// and every operation receives the acting principal explicitly. The
/// notifier is fired after the store transaction commits and its
/// failures are logged and swallowed.
pub struct BookingLifecycle {
    store: Arc<dyn MarketplaceStore>,
    notifier: Arc<dyn Notifier>,
    /// Retry budget for store serialization conflicts during a
    /// transition. Conflicts are expected under concurrent
    /// confirmations on the same ride.
    confirm_retry_attempts: u32,
    max_seats_per_booking: i32,
}

impl BookingLifecycle {
    pub fn new(store: Arc<dyn MarketplaceStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            confirm_retry_attempts: 3,
            max_seats_per_booking: 8,
        }
    }

    pub fn with_limits(mut self, confirm_retry_attempts: u32, max_seats_per_booking: i32) -> Self {
        self.confirm_retry_attempts = confirm_retry_attempts;
        self.max_seats_per_booking = max_seats_per_booking;
        self
    }

    /// Create a `PENDING_APPROVAL` booking for the acting user.
    ///
    /// Inventory is not committed here: several competing requests may
    /// be pending against the same seat pool, and the confirm step is
    /// the true gate. The seat check at this point is a courtesy
    /// rejection of requests that can no longer fit at all.
    pub async fn request_booking(
        &self,
        actor: &Principal,
        ride_id: Uuid,
        seats: i32,
    ) -> Result<Booking, BookingError> {
        if seats < 1 {
            return Err(BookingError::Validation(
                "seat count must be at least 1".to_string(),
            ));
        }
        if seats > self.max_seats_per_booking {
            return Err(BookingError::Validation(format!(
                "seat count must not exceed {}",
                self.max_seats_per_booking
            )));
        }

        let ride = self
            .store
            .get_ride(ride_id)
            .await
            .map_err(BookingError::Store)?
            .ok_or(BookingError::RideNotFound(ride_id))?;

        if !ride.is_open {
            return Err(BookingError::RideClosed);
        }
        if ride.driver_id == actor.user_id {
            return Err(BookingError::SelfBookingDenied);
        }
        if self
            .store
            .find_active_booking(actor.user_id, ride_id)
            .await
            .map_err(BookingError::Store)?
            .is_some()
        {
            return Err(BookingError::DuplicateBookingRequest);
        }
        if seats > ride.available_seats {
            return Err(BookingError::InsufficientSeats {
                requested: seats,
                available: ride.available_seats,
            });
        }

        let booking = Booking::new(ride_id, actor.user_id, seats);
        match self.store.create_booking(&booking).await {
            Ok(()) => {}
            // Two requests from the same user raced past the check
            // above; the store's uniqueness guard caught the second.
            Err(StoreError::ActiveBookingExists) => {
                return Err(BookingError::DuplicateBookingRequest)
            }
            Err(e) => return Err(BookingError::Store(e)),
        }

        self.emit(
            ride.driver_id,
            NotificationKind::BookingRequested,
            &json!({
                "booking_id": booking.id,
                "ride_id": ride_id,
                "passenger_id": actor.user_id,
                "seats": seats,
            }),
        )
        .await;

        Ok(booking)
    }

    /// Drive a booking to `CONFIRMED`, `REJECTED` or `CANCELLED`.
    ///
    /// The driver may perform any defined transition; the booking owner
    /// may only cancel their own booking. Seat accounting:
    /// confirmation reserves `booking.seats`, reversing a previously
    /// confirmed booking releases them, and both happen inside the same
    /// atomic store unit as the status write.
    pub async fn update_status(
        &self,
        actor: &Principal,
        booking_id: Uuid,
        new_status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        if new_status == BookingStatus::PendingApproval {
            return Err(BookingError::Validation(
                "a booking cannot be moved back to PENDING_APPROVAL".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            let booking = self
                .store
                .get_booking(booking_id)
                .await
                .map_err(BookingError::Store)?
                .ok_or(BookingError::BookingNotFound(booking_id))?;
            let ride = self
                .store
                .get_ride(booking.ride_id)
                .await
                .map_err(BookingError::Store)?
                .ok_or(BookingError::RideNotFound(booking.ride_id))?;

            // Authorization is derived from the durable records, never
            // from claims: the driver relationship comes off the ride
            // row, ownership off the booking row.
            let is_driver = ride.driver_id == actor.user_id;
            let is_owner = booking.passenger_id == actor.user_id;
            let allowed = is_driver || (is_owner && new_status == BookingStatus::Cancelled);
            if !allowed {
                return Err(BookingError::NotAuthorized);
            }

            if !booking.status.can_transition_to(new_status) {
                return Err(BookingError::InvalidTransition {
                    from: booking.status,
                    to: new_status,
                });
            }

            let seats = match (booking.status, new_status) {
                (BookingStatus::PendingApproval, BookingStatus::Confirmed) => {
                    // Re-checked here and again inside the atomic unit;
                    // other confirmations may have consumed seats since
                    // the request was made.
                    if ride.available_seats < booking.seats {
                        return Err(BookingError::InsufficientSeats {
                            requested: booking.seats,
                            available: ride.available_seats,
                        });
                    }
                    SeatDelta::Reserve(booking.seats)
                }
                (BookingStatus::Confirmed, _) => SeatDelta::Release(booking.seats),
                _ => SeatDelta::None,
            };

            let transition = BookingTransition {
                booking_id,
                ride_id: booking.ride_id,
                from: booking.status,
                to: new_status,
                seats,
            };

            match self.store.apply_transition(&transition).await {
                Ok(updated) => {
                    let recipient = if is_driver {
                        booking.passenger_id
                    } else {
                        ride.driver_id
                    };
                    if let Some(kind) = NotificationKind::for_status(new_status) {
                        self.emit(
                            recipient,
                            kind,
                            &json!({
                                "booking_id": booking_id,
                                "ride_id": booking.ride_id,
                                "seats": booking.seats,
                                "status": new_status,
                            }),
                        )
                        .await;
                    }
                    return Ok(updated);
                }
                Err(StoreError::Serialization) if attempt < self.confirm_retry_attempts => {
                    attempt += 1;
                    debug!(
                        booking_id = %booking_id,
                        attempt,
                        "transition serialization conflict, retrying"
                    );
                    continue;
                }
                Err(StoreError::Serialization) => return Err(BookingError::TransactionConflict),
                Err(StoreError::SeatConflict {
                    requested,
                    available,
                }) => {
                    return Err(BookingError::InsufficientSeats {
                        requested,
                        available,
                    })
                }
                Err(StoreError::StatusConflict { actual }) => {
                    return Err(BookingError::InvalidTransition {
                        from: actual,
                        to: new_status,
                    })
                }
                Err(e) => return Err(BookingError::Store(e)),
            }
        }
    }

    /// Fire-and-forget notification. Failures are not part of the
    /// correctness contract and never propagate to the caller.
    async fn emit(&self, user_id: Uuid, kind: NotificationKind, payload: &serde_json::Value) {
        if let Err(e) = self.notifier.notify(user_id, kind, payload).await {
            warn!(recipient = %user_id, kind = kind.as_str(), "notification delivery failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, NullNotifier};
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use ridepool_domain::{Location, Ride, Role};
    use std::sync::Mutex;

    struct RecordingNotifier {
        sent: Mutex<Vec<(Uuid, NotificationKind)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(Uuid, NotificationKind)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            user_id: Uuid,
            kind: NotificationKind,
            _payload: &serde_json::Value,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.sent.lock().unwrap().push((user_id, kind));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(
            &self,
            _user_id: Uuid,
            _kind: NotificationKind,
            _payload: &serde_json::Value,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("broker unreachable".into())
        }
    }

    /// Store that fails `apply_transition` with a scripted sequence of
    /// errors before handing over to the in-memory implementation.
    /// Stands in for a backend aborting transactions under contention.
    struct ScriptedStore {
        inner: MemoryStore,
        failures: Mutex<Vec<StoreError>>,
    }

    impl ScriptedStore {
        fn new(failures: Vec<StoreError>) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures: Mutex::new(failures),
            }
        }
    }

    #[async_trait]
    impl MarketplaceStore for ScriptedStore {
        async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError> {
            self.inner.create_ride(ride).await
        }

        async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>, StoreError> {
            self.inner.get_ride(id).await
        }

        async fn set_ride_open(&self, id: Uuid, open: bool) -> Result<(), StoreError> {
            self.inner.set_ride_open(id, open).await
        }

        async fn search_rides(
            &self,
            query: &ridepool_domain::RideQuery,
        ) -> Result<Vec<Ride>, StoreError> {
            self.inner.search_rides(query).await
        }

        async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
            self.inner.get_booking(id).await
        }

        async fn find_active_booking(
            &self,
            passenger_id: Uuid,
            ride_id: Uuid,
        ) -> Result<Option<Booking>, StoreError> {
            self.inner.find_active_booking(passenger_id, ride_id).await
        }

        async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
            self.inner.create_booking(booking).await
        }

        async fn apply_transition(
            &self,
            transition: &BookingTransition,
        ) -> Result<Booking, StoreError> {
            if let Some(err) = self.failures.lock().unwrap().pop() {
                return Err(err);
            }
            self.inner.apply_transition(transition).await
        }

        async fn list_bookings_for_passenger(
            &self,
            passenger_id: Uuid,
            status: Option<BookingStatus>,
        ) -> Result<Vec<Booking>, StoreError> {
            self.inner
                .list_bookings_for_passenger(passenger_id, status)
                .await
        }

        async fn list_bookings_for_ride(
            &self,
            ride_id: Uuid,
        ) -> Result<Vec<Booking>, StoreError> {
            self.inner.list_bookings_for_ride(ride_id).await
        }
    }

    fn test_ride(driver_id: Uuid, seats: i32) -> Ride {
        Ride::new(
            driver_id,
            Location {
                name: "Berlin".to_string(),
                lat: 52.52,
                lon: 13.405,
            },
            Location {
                name: "Hamburg".to_string(),
                lat: 53.551,
                lon: 9.994,
            },
            NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            1500,
            seats,
        )
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        lifecycle: BookingLifecycle,
        driver: Principal,
        ride_id: Uuid,
    }

    async fn fixture(seats: i32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let lifecycle = BookingLifecycle::new(store.clone(), notifier.clone());
        let driver = Principal::new(Uuid::new_v4(), Role::Driver);
        let ride = test_ride(driver.user_id, seats);
        let ride_id = ride.id;
        store.create_ride(&ride).await.unwrap();
        Fixture {
            store,
            notifier,
            lifecycle,
            driver,
            ride_id,
        }
    }

    fn passenger() -> Principal {
        Principal::new(Uuid::new_v4(), Role::Passenger)
    }

    async fn available_seats(store: &MemoryStore, ride_id: Uuid) -> i32 {
        store.get_ride(ride_id).await.unwrap().unwrap().available_seats
    }

    #[tokio::test]
    async fn request_then_confirm_consumes_seats() {
        let fx = fixture(2).await;
        let x = passenger();

        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 2)
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::PendingApproval);
        // Inventory is only committed at confirmation time.
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 2);

        let confirmed = fx
            .lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 0);
    }

    #[tokio::test]
    async fn request_on_full_ride_fails() {
        let fx = fixture(2).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 2)
            .await
            .unwrap();
        fx.lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();

        let y = passenger();
        let err = fx
            .lifecycle
            .request_booking(&y, fx.ride_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InsufficientSeats {
                requested: 1,
                available: 0
            }
        ));
    }

    #[tokio::test]
    async fn cancelling_confirmed_booking_restores_seats() {
        let fx = fixture(2).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 2)
            .await
            .unwrap();
        fx.lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 0);

        let cancelled = fx
            .lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 2);
    }

    #[tokio::test]
    async fn driver_cannot_book_own_ride() {
        let fx = fixture(3).await;
        let err = fx
            .lifecycle
            .request_booking(&fx.driver, fx.ride_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SelfBookingDenied));
    }

    #[tokio::test]
    async fn duplicate_pending_request_is_rejected() {
        let fx = fixture(3).await;
        let x = passenger();
        fx.lifecycle
            .request_booking(&x, fx.ride_id, 1)
            .await
            .unwrap();
        let err = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DuplicateBookingRequest));
    }

    #[tokio::test]
    async fn second_confirm_is_rejected_and_seats_decrement_once() {
        let fx = fixture(4).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 2)
            .await
            .unwrap();
        fx.lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Confirmed
            }
        ));
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 2);
    }

    #[tokio::test]
    async fn rejecting_pending_booking_leaves_inventory_untouched() {
        let fx = fixture(3).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 2)
            .await
            .unwrap();
        let rejected = fx
            .lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 3);
    }

    #[tokio::test]
    async fn no_transition_out_of_terminal_states() {
        let fx = fixture(3).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 1)
            .await
            .unwrap();
        fx.lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Rejected)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn owner_may_cancel_but_not_confirm() {
        let fx = fixture(3).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 1)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .update_status(&x, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotAuthorized));

        let cancelled = fx
            .lifecycle
            .update_status(&x, booking.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn stranger_cannot_transition_booking() {
        let fx = fixture(3).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 1)
            .await
            .unwrap();
        let stranger = passenger();
        let err = fx
            .lifecycle
            .update_status(&stranger, booking.id, BookingStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotAuthorized));
    }

    #[tokio::test]
    async fn closed_ride_rejects_new_requests() {
        let fx = fixture(3).await;
        fx.store.set_ride_open(fx.ride_id, false).await.unwrap();
        let err = fx
            .lifecycle
            .request_booking(&passenger(), fx.ride_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::RideClosed));
    }

    #[tokio::test]
    async fn non_positive_seat_count_is_invalid() {
        let fx = fixture(3).await;
        let err = fx
            .lifecycle
            .request_booking(&passenger(), fx.ride_id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_ride_is_not_found() {
        let fx = fixture(3).await;
        let err = fx
            .lifecycle
            .request_booking(&passenger(), Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::RideNotFound(_)));
        let err = fx
            .lifecycle
            .update_status(&fx.driver, Uuid::new_v4(), BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_confirmations_never_oversell() {
        let fx = fixture(3).await;
        let mut booking_ids = Vec::new();
        for _ in 0..3 {
            let p = passenger();
            let booking = fx
                .lifecycle
                .request_booking(&p, fx.ride_id, 2)
                .await
                .unwrap();
            booking_ids.push(booking.id);
        }

        let lifecycle = Arc::new(BookingLifecycle::new(
            fx.store.clone(),
            Arc::new(NullNotifier),
        ));
        let driver = fx.driver;
        let mut handles = Vec::new();
        for id in booking_ids {
            let lc = lifecycle.clone();
            handles.push(tokio::spawn(async move {
                lc.update_status(&driver, id, BookingStatus::Confirmed).await
            }));
        }

        let mut confirmed = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(b) => {
                    assert_eq!(b.status, BookingStatus::Confirmed);
                    confirmed += 1;
                }
                Err(BookingError::InsufficientSeats { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        // Three bookings of 2 seats against 3 available: exactly one
        // fits, the other two must fail the in-transaction seat check.
        assert_eq!(confirmed, 1);
        assert_eq!(insufficient, 2);
        assert_eq!(available_seats(&fx.store, fx.ride_id).await, 1);
    }

    #[tokio::test]
    async fn notifications_go_to_the_counterparty() {
        let fx = fixture(3).await;
        let x = passenger();
        let booking = fx
            .lifecycle
            .request_booking(&x, fx.ride_id, 1)
            .await
            .unwrap();
        fx.lifecycle
            .update_status(&fx.driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        fx.lifecycle
            .update_status(&x, booking.id, BookingStatus::Cancelled)
            .await
            .unwrap();

        let sent = fx.notifier.sent();
        assert_eq!(
            sent,
            vec![
                (fx.driver.user_id, NotificationKind::BookingRequested),
                (x.user_id, NotificationKind::BookingConfirmed),
                (fx.driver.user_id, NotificationKind::BookingCancelled),
            ]
        );
    }

    async fn scripted_fixture(
        failures: Vec<StoreError>,
    ) -> (Arc<ScriptedStore>, BookingLifecycle, Principal, Uuid) {
        let store = Arc::new(ScriptedStore::new(failures));
        let lifecycle = BookingLifecycle::new(store.clone(), Arc::new(NullNotifier));
        let driver = Principal::new(Uuid::new_v4(), Role::Driver);
        let ride = test_ride(driver.user_id, 3);
        let ride_id = ride.id;
        store.create_ride(&ride).await.unwrap();
        (store, lifecycle, driver, ride_id)
    }

    #[tokio::test]
    async fn serialization_conflicts_are_retried_within_budget() {
        // Three aborts, then the store cooperates: one initial attempt
        // plus three retries lands exactly on the default budget.
        let failures = vec![
            StoreError::Serialization,
            StoreError::Serialization,
            StoreError::Serialization,
        ];
        let (store, lifecycle, driver, ride_id) = scripted_fixture(failures).await;
        let booking = lifecycle
            .request_booking(&passenger(), ride_id, 2)
            .await
            .unwrap();

        let confirmed = lifecycle
            .update_status(&driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        // Seats committed exactly once despite the aborted attempts.
        assert_eq!(
            store.get_ride(ride_id).await.unwrap().unwrap().available_seats,
            1
        );
    }

    #[tokio::test]
    async fn exhausted_retry_budget_surfaces_conflict() {
        let failures = vec![
            StoreError::Serialization,
            StoreError::Serialization,
            StoreError::Serialization,
            StoreError::Serialization,
        ];
        let (store, lifecycle, driver, ride_id) = scripted_fixture(failures).await;
        let booking = lifecycle
            .request_booking(&passenger(), ride_id, 2)
            .await
            .unwrap();

        let err = lifecycle
            .update_status(&driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::TransactionConflict));

        // Nothing committed: booking still pending, inventory intact.
        let booking = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::PendingApproval);
        assert_eq!(
            store.get_ride(ride_id).await.unwrap().unwrap().available_seats,
            3
        );
    }

    #[tokio::test]
    async fn concurrent_status_change_surfaces_invalid_transition() {
        // The store saw a different status inside the atomic unit than
        // the manager validated against; the remap must report what the
        // store actually saw.
        let failures = vec![StoreError::StatusConflict {
            actual: BookingStatus::Confirmed,
        }];
        let (_, lifecycle, driver, ride_id) = scripted_fixture(failures).await;
        let booking = lifecycle
            .request_booking(&passenger(), ride_id, 2)
            .await
            .unwrap();

        let err = lifecycle
            .update_status(&driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Confirmed
            }
        ));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_transition() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = BookingLifecycle::new(store.clone(), Arc::new(FailingNotifier));
        let driver = Principal::new(Uuid::new_v4(), Role::Driver);
        let ride = test_ride(driver.user_id, 2);
        let ride_id = ride.id;
        store.create_ride(&ride).await.unwrap();

        let booking = lifecycle
            .request_booking(&passenger(), ride_id, 1)
            .await
            .unwrap();
        let confirmed = lifecycle
            .update_status(&driver, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(available_seats(&store, ride_id).await, 1);
    }
}
