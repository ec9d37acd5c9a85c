use serde::{Deserialize, Serialize};

use crate::booking::BookingStatus;

/// What happened to a booking, from the recipient's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingRequested,
    BookingConfirmed,
    BookingRejected,
    BookingCancelled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequested => "BOOKING_REQUESTED",
            NotificationKind::BookingConfirmed => "BOOKING_CONFIRMED",
            NotificationKind::BookingRejected => "BOOKING_REJECTED",
            NotificationKind::BookingCancelled => "BOOKING_CANCELLED",
        }
    }

    pub fn for_status(status: BookingStatus) -> Option<Self> {
        match status {
            BookingStatus::PendingApproval => None,
            BookingStatus::Confirmed => Some(NotificationKind::BookingConfirmed),
            BookingStatus::Rejected => Some(NotificationKind::BookingRejected),
            BookingStatus::Cancelled => Some(NotificationKind::BookingCancelled),
        }
    }
}
