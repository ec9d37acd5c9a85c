use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use ridepool_domain::ride::PublishRideRequest;
use ridepool_domain::{Booking, Principal, Ride, RideQuery, Role};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/rides", post(publish_ride).get(search_rides))
        .route("/v1/rides/{id}", get(get_ride).patch(set_ride_open))
        .route("/v1/rides/{id}/bookings", get(list_ride_bookings))
}

async fn publish_ride(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<PublishRideRequest>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    if !matches!(principal.role, Role::Driver | Role::Admin) {
        return Err(AppError::AuthorizationError(
            "only drivers may publish rides".to_string(),
        ));
    }
    if req.total_seats < 1 {
        return Err(AppError::ValidationError(
            "a ride must have at least one seat".to_string(),
        ));
    }
    if req.price_per_seat < 0 {
        return Err(AppError::ValidationError(
            "price per seat must not be negative".to_string(),
        ));
    }

    let ride = Ride::new(
        principal.user_id,
        req.origin,
        req.destination,
        req.departure_date,
        req.departure_time,
        req.price_per_seat,
        req.total_seats,
    );
    state
        .store
        .create_ride(&ride)
        .await
        .map_err(AppError::store)?;

    tracing::info!(ride_id = %ride.id, driver_id = %principal.user_id, "ride published");
    Ok((StatusCode::CREATED, Json(ride)))
}

async fn search_rides(
    State(state): State<AppState>,
    Query(query): Query<RideQuery>,
) -> Result<Json<Vec<Ride>>, AppError> {
    let rides = state
        .store
        .search_rides(&query)
        .await
        .map_err(AppError::store)?;
    Ok(Json(rides))
}

async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .store
        .get_ride(id)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFoundError(format!("ride not found: {}", id)))?;
    Ok(Json(ride))
}

#[derive(Debug, Deserialize)]
struct SetRideOpenRequest {
    open: bool,
}

/// Toggle whether the ride accepts new booking requests. Driver-only,
/// authorized against the ride row.
async fn set_ride_open(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetRideOpenRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .store
        .get_ride(id)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFoundError(format!("ride not found: {}", id)))?;
    if ride.driver_id != principal.user_id {
        return Err(AppError::AuthorizationError(
            "only the ride's driver may change its schedule".to_string(),
        ));
    }

    state
        .store
        .set_ride_open(id, req.open)
        .await
        .map_err(AppError::store)?;
    let updated = state
        .store
        .get_ride(id)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFoundError(format!("ride not found: {}", id)))?;
    Ok(Json(updated))
}

async fn list_ride_bookings(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let ride = state
        .store
        .get_ride(id)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFoundError(format!("ride not found: {}", id)))?;
    if ride.driver_id != principal.user_id {
        return Err(AppError::AuthorizationError(
            "only the ride's driver may list its bookings".to_string(),
        ));
    }

    let bookings = state
        .store
        .list_bookings_for_ride(id)
        .await
        .map_err(AppError::store)?;
    Ok(Json(bookings))
}
