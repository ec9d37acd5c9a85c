pub mod booking;
pub mod events;
pub mod principal;
pub mod repository;
pub mod ride;

pub use booking::{Booking, BookingStatus};
pub use events::NotificationKind;
pub use principal::{Principal, Role};
pub use repository::{BookingTransition, MarketplaceStore, Notifier, SeatDelta, StoreError};
pub use ride::{Location, Ride, RideQuery};
