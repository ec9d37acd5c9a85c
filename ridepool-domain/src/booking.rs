use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the lifecycle.
///
/// `Rejected` and `Cancelled` are terminal. Re-entering the current
/// status is always an invalid transition: the confirm/reverse
/// transitions carry a seat adjustment that must fire exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingApproval,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingApproval => "PENDING_APPROVAL",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Rejected | BookingStatus::Cancelled)
    }

    /// Whether the state machine defines a transition from `self` to `to`.
    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        matches!(
            (*self, to),
            (
                BookingStatus::PendingApproval,
                BookingStatus::Confirmed | BookingStatus::Rejected | BookingStatus::Cancelled
            ) | (
                BookingStatus::Confirmed,
                BookingStatus::Rejected | BookingStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_APPROVAL" => Ok(BookingStatus::PendingApproval),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// A passenger's request to occupy seats on a ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(ride_id: Uuid, passenger_id: Uuid, seats: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ride_id,
            passenger_id,
            seats,
            status: BookingStatus::PendingApproval,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, new_status: BookingStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    /// Whether this booking still occupies the (passenger, ride) slot.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
    pub seats: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for to in [
            BookingStatus::PendingApproval,
            BookingStatus::Confirmed,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
        ] {
            assert!(!BookingStatus::Rejected.can_transition_to(to));
            assert!(!BookingStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn reentrant_transitions_are_invalid() {
        assert!(!BookingStatus::Confirmed.can_transition_to(BookingStatus::Confirmed));
        assert!(!BookingStatus::PendingApproval.can_transition_to(BookingStatus::PendingApproval));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            BookingStatus::PendingApproval,
            BookingStatus::Confirmed,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
    }
}
