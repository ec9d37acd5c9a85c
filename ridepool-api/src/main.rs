use std::net::SocketAddr;
use std::sync::Arc;

use ridepool_api::{
    app,
    state::{AppState, AuthConfig},
};
use ridepool_booking::BookingLifecycle;
use ridepool_domain::MarketplaceStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ridepool_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Ridepool API on port {}", config.server.port);

    let db = ridepool_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let store: Arc<dyn MarketplaceStore> =
        Arc::new(ridepool_store::PgStore::new(db.pool.clone()));

    let redis = ridepool_store::RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");

    let notifier = ridepool_store::EventNotifier::new(
        &config.kafka.brokers,
        &config.kafka.notification_topic,
    )
    .expect("Failed to create Kafka producer");

    let lifecycle = BookingLifecycle::new(store.clone(), Arc::new(notifier)).with_limits(
        config.booking.confirm_retry_attempts,
        config.booking.max_seats_per_booking,
    );

    let app_state = AppState {
        store,
        lifecycle: Arc::new(lifecycle),
        redis: Arc::new(redis),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
