use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::events::NotificationKind;
use crate::ride::{Ride, RideQuery};

/// Store-level failures. Typed (rather than boxed) so the lifecycle
/// manager can tell a retryable serialization conflict apart from a
/// genuine backend failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The (passenger, ride) pair already has a non-terminal booking.
    #[error("an active booking already exists for this passenger and ride")]
    ActiveBookingExists,

    /// The booking's status changed between the caller's read and the
    /// atomic transition; `actual` is what the store saw.
    #[error("booking status changed concurrently, now {actual}")]
    StatusConflict { actual: BookingStatus },

    /// The conditional seat update matched no row: another confirmation
    /// consumed the seats first.
    #[error("insufficient seats: requested {requested}, available {available}")]
    SeatConflict { requested: i32, available: i32 },

    /// The backend aborted the transaction (e.g. Postgres 40001). Safe
    /// to retry the whole operation.
    #[error("transaction serialization conflict")]
    Serialization,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// How `available_seats` moves inside an atomic transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatDelta {
    /// Decrement by `n`; fails with `SeatConflict` if fewer than `n`
    /// seats remain.
    Reserve(i32),
    /// Increment by `n`; must never push the count past `total_seats`.
    Release(i32),
    None,
}

/// One atomic status transition: status write plus seat adjustment,
/// observed either fully applied or not at all.
#[derive(Debug, Clone)]
pub struct BookingTransition {
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    /// The status the caller validated against. The store re-checks it
    /// inside the atomic unit and fails with `StatusConflict` on
    /// mismatch.
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub seats: SeatDelta,
}

/// Persistence interface for rides and bookings.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError>;

    async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>, StoreError>;

    async fn set_ride_open(&self, id: Uuid, open: bool) -> Result<(), StoreError>;

    /// Open rides with seats left, matching the query filters.
    async fn search_rides(&self, query: &RideQuery) -> Result<Vec<Ride>, StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// The non-terminal booking for (passenger, ride), if any.
    async fn find_active_booking(
        &self,
        passenger_id: Uuid,
        ride_id: Uuid,
    ) -> Result<Option<Booking>, StoreError>;

    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Apply a status transition and its seat adjustment as one atomic
    /// unit, returning the updated booking.
    async fn apply_transition(&self, transition: &BookingTransition)
        -> Result<Booking, StoreError>;

    async fn list_bookings_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>, StoreError>;
}

/// Best-effort outbound notification channel. Delivery failure must
/// never gate or roll back a state transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: &serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
