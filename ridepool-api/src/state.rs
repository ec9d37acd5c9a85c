use std::sync::Arc;

use ridepool_booking::BookingLifecycle;
use ridepool_domain::MarketplaceStore;
use ridepool_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketplaceStore>,
    pub lifecycle: Arc<BookingLifecycle>,
    pub redis: Arc<RedisClient>,
    pub auth: AuthConfig,
}
