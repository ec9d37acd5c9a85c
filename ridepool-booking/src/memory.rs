use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use ridepool_domain::{
    Booking, BookingStatus, BookingTransition, MarketplaceStore, NotificationKind, Notifier, Ride,
    RideQuery, SeatDelta, StoreError,
};

/// In-memory `MarketplaceStore`. Backs the lifecycle tests and the API
/// integration tests; the durable implementation lives in
/// `ridepool-store`.
///
/// A single mutex over both maps gives the same atomicity the Postgres
/// implementation gets from its transaction: status check, seat
/// adjustment and status write all happen under one lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rides: HashMap<Uuid, Ride>,
    bookings: HashMap<Uuid, Booking>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.rides.get(&id).cloned())
    }

    async fn set_ride_open(&self, id: Uuid, open: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let ride = inner
            .rides
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("ride not found: {}", id)))?;
        ride.is_open = open;
        ride.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn search_rides(&self, query: &RideQuery) -> Result<Vec<Ride>, StoreError> {
        let inner = self.lock()?;
        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| r.is_open && r.available_seats > 0)
            .filter(|r| match &query.from {
                Some(from) => r.origin.name.to_lowercase().contains(&from.to_lowercase()),
                None => true,
            })
            .filter(|r| match &query.to {
                Some(to) => r
                    .destination
                    .name
                    .to_lowercase()
                    .contains(&to.to_lowercase()),
                None => true,
            })
            .filter(|r| match query.date {
                Some(date) => r.departure_date == date,
                None => true,
            })
            .cloned()
            .collect();
        rides.sort_by_key(|r| (r.departure_date, r.departure_time));
        Ok(rides)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.bookings.get(&id).cloned())
    }

    async fn find_active_booking(
        &self,
        passenger_id: Uuid,
        ride_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .bookings
            .values()
            .find(|b| b.passenger_id == passenger_id && b.ride_id == ride_id && b.is_active())
            .cloned())
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let duplicate = inner
            .bookings
            .values()
            .any(|b| {
                b.passenger_id == booking.passenger_id
                    && b.ride_id == booking.ride_id
                    && b.is_active()
            });
        if duplicate {
            return Err(StoreError::ActiveBookingExists);
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn apply_transition(
        &self,
        transition: &BookingTransition,
    ) -> Result<Booking, StoreError> {
        let mut inner = self.lock()?;

        let current = inner
            .bookings
            .get(&transition.booking_id)
            .ok_or_else(|| {
                StoreError::Backend(format!("booking not found: {}", transition.booking_id))
            })?
            .status;
        if current != transition.from {
            return Err(StoreError::StatusConflict { actual: current });
        }

        match transition.seats {
            SeatDelta::Reserve(n) => {
                let ride = inner.rides.get_mut(&transition.ride_id).ok_or_else(|| {
                    StoreError::Backend(format!("ride not found: {}", transition.ride_id))
                })?;
                if ride.available_seats < n {
                    return Err(StoreError::SeatConflict {
                        requested: n,
                        available: ride.available_seats,
                    });
                }
                ride.available_seats -= n;
                ride.updated_at = chrono::Utc::now();
            }
            SeatDelta::Release(n) => {
                let ride = inner.rides.get_mut(&transition.ride_id).ok_or_else(|| {
                    StoreError::Backend(format!("ride not found: {}", transition.ride_id))
                })?;
                if ride.available_seats + n > ride.total_seats {
                    return Err(StoreError::Backend(
                        "seat release would exceed ride capacity".to_string(),
                    ));
                }
                ride.available_seats += n;
                ride.updated_at = chrono::Utc::now();
            }
            SeatDelta::None => {}
        }

        let booking = inner
            .bookings
            .get_mut(&transition.booking_id)
            .ok_or_else(|| {
                StoreError::Backend(format!("booking not found: {}", transition.booking_id))
            })?;
        booking.update_status(transition.to);
        Ok(booking.clone())
    }

    async fn list_bookings_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.lock()?;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.passenger_id == passenger_id)
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let inner = self.lock()?;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }
}

/// Notifier that drops everything. For tests and local runs without a
/// broker.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(
        &self,
        _user_id: Uuid,
        _kind: NotificationKind,
        _payload: &serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
