use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::{
    Booking, BookingStatus, BookingTransition, Location, MarketplaceStore, Ride, RideQuery,
    SeatDelta, StoreError,
};

/// Postgres-backed `MarketplaceStore`.
///
/// `apply_transition` is the correctness-critical path: the booking row
/// is locked (`FOR UPDATE`), the seat adjustment is a conditional
/// update that fails the transaction instead of clamping, and the
/// status write commits in the same transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RideRow {
    id: Uuid,
    driver_id: Uuid,
    origin_name: String,
    origin_lat: f64,
    origin_lon: f64,
    destination_name: String,
    destination_lat: f64,
    destination_lon: f64,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    price_per_seat: i32,
    total_seats: i32,
    available_seats: i32,
    is_open: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RideRow> for Ride {
    fn from(row: RideRow) -> Self {
        Ride {
            id: row.id,
            driver_id: row.driver_id,
            origin: Location {
                name: row.origin_name,
                lat: row.origin_lat,
                lon: row.origin_lon,
            },
            destination: Location {
                name: row.destination_name,
                lat: row.destination_lat,
                lon: row.destination_lon,
            },
            departure_date: row.departure_date,
            departure_time: row.departure_time,
            price_per_seat: row.price_per_seat,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            is_open: row.is_open,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    passenger_id: Uuid,
    seats: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<BookingStatus>().map_err(StoreError::Backend)?;
        Ok(Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            seats: row.seats,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_sqlx_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            // 40001: serialization_failure, 40P01: deadlock_detected.
            if code == "40001" || code == "40P01" {
                return StoreError::Serialization;
            }
            // Only the partial uniqueness index means "duplicate active
            // booking"; any other 23505 (e.g. a primary-key collision)
            // is a backend error.
            if code == "23505"
                && db.constraint() == Some("bookings_one_active_per_passenger_ride")
            {
                return StoreError::ActiveBookingExists;
            }
        }
    }
    StoreError::Backend(e.to_string())
}

const RIDE_COLUMNS: &str = "id, driver_id, origin_name, origin_lat, origin_lon, \
     destination_name, destination_lat, destination_lon, departure_date, departure_time, \
     price_per_seat, total_seats, available_seats, is_open, created_at, updated_at";

const BOOKING_COLUMNS: &str =
    "id, ride_id, passenger_id, seats, status, created_at, updated_at";

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO rides (id, driver_id, origin_name, origin_lat, origin_lon,
                destination_name, destination_lat, destination_lon,
                departure_date, departure_time, price_per_seat,
                total_seats, available_seats, is_open, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(ride.id)
        .bind(ride.driver_id)
        .bind(&ride.origin.name)
        .bind(ride.origin.lat)
        .bind(ride.origin.lon)
        .bind(&ride.destination.name)
        .bind(ride.destination.lat)
        .bind(ride.destination.lon)
        .bind(ride.departure_date)
        .bind(ride.departure_time)
        .bind(ride.price_per_seat)
        .bind(ride.total_seats)
        .bind(ride.available_seats)
        .bind(ride.is_open)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>, StoreError> {
        let row = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {} FROM rides WHERE id = $1",
            RIDE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(Ride::from))
    }

    async fn set_ride_open(&self, id: Uuid, open: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE rides SET is_open = $1, updated_at = NOW() WHERE id = $2")
            .bind(open)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn search_rides(&self, query: &RideQuery) -> Result<Vec<Ride>, StoreError> {
        let from = query.from.as_ref().map(|s| format!("%{}%", s));
        let to = query.to.as_ref().map(|s| format!("%{}%", s));
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            r#"
            SELECT {} FROM rides
            WHERE is_open = TRUE
              AND available_seats > 0
              AND ($1::text IS NULL OR origin_name ILIKE $1)
              AND ($2::text IS NULL OR destination_name ILIKE $2)
              AND ($3::date IS NULL OR departure_date = $3)
            ORDER BY departure_date, departure_time
            "#,
            RIDE_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .bind(query.date)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_active_booking(
        &self,
        passenger_id: Uuid,
        ride_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings \
             WHERE passenger_id = $1 AND ride_id = $2 \
               AND status IN ('PENDING_APPROVAL', 'CONFIRMED')",
            BOOKING_COLUMNS
        ))
        .bind(passenger_id)
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, ride_id, passenger_id, seats, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(booking.passenger_id)
        .bind(booking.seats)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn apply_transition(
        &self,
        transition: &BookingTransition,
    ) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // Lock the booking row so the expected-status check holds until
        // commit; concurrent transitions on the same booking serialize
        // here.
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(transition.booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?
        .ok_or_else(|| {
            StoreError::Backend(format!("booking not found: {}", transition.booking_id))
        })?;

        let current = row.status.parse::<BookingStatus>().map_err(StoreError::Backend)?;
        if current != transition.from {
            return Err(StoreError::StatusConflict { actual: current });
        }

        match transition.seats {
            SeatDelta::Reserve(n) => {
                let result = sqlx::query(
                    "UPDATE rides SET available_seats = available_seats - $1, updated_at = NOW() \
                     WHERE id = $2 AND available_seats >= $1",
                )
                .bind(n)
                .bind(transition.ride_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                if result.rows_affected() == 0 {
                    // Another confirmation got there first; report what
                    // is actually left.
                    let available: i32 =
                        sqlx::query_scalar("SELECT available_seats FROM rides WHERE id = $1")
                            .bind(transition.ride_id)
                            .fetch_one(&mut *tx)
                            .await
                            .map_err(map_sqlx_err)?;
                    return Err(StoreError::SeatConflict {
                        requested: n,
                        available,
                    });
                }
            }
            SeatDelta::Release(n) => {
                let result = sqlx::query(
                    "UPDATE rides SET available_seats = available_seats + $1, updated_at = NOW() \
                     WHERE id = $2 AND available_seats + $1 <= total_seats",
                )
                .bind(n)
                .bind(transition.ride_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Backend(
                        "seat release would exceed ride capacity".to_string(),
                    ));
                }
            }
            SeatDelta::None => {}
        }

        let updated = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(transition.to.as_str())
        .bind(transition.booking_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        Booking::try_from(updated)
    }

    async fn list_bookings_for_passenger(
        &self,
        passenger_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings \
             WHERE passenger_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(passenger_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE ride_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(Booking::try_from).collect()
    }
}
