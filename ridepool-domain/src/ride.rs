use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named point on the map. Geocoding happens upstream; the core only
/// carries the result along.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// A published trip with a seat inventory.
///
/// `available_seats` is the one shared mutable counter in the system.
/// It is only ever adjusted inside the same atomic store unit as the
/// corresponding booking status write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: Location,
    pub destination: Location,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    /// Price per seat in minor currency units.
    pub price_per_seat: i32,
    pub total_seats: i32,
    pub available_seats: i32,
    /// Whether the ride currently accepts new booking requests.
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(
        driver_id: Uuid,
        origin: Location,
        destination: Location,
        departure_date: NaiveDate,
        departure_time: NaiveTime,
        price_per_seat: i32,
        total_seats: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            driver_id,
            origin,
            destination,
            departure_date,
            departure_time,
            price_per_seat,
            total_seats,
            available_seats: total_seats,
            is_open: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Search filter for open rides. All fields optional; name matches are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRideRequest {
    pub origin: Location,
    pub destination: Location,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub price_per_seat: i32,
    pub total_seats: i32,
}
