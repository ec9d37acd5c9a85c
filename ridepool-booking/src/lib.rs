pub mod lifecycle;
pub mod memory;

pub use lifecycle::{BookingError, BookingLifecycle};
pub use memory::{MemoryStore, NullNotifier};
