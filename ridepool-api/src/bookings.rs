use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use ridepool_domain::booking::{CreateBookingRequest, UpdateBookingStatusRequest};
use ridepool_domain::{Booking, BookingStatus, Principal};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(request_booking).get(list_my_bookings))
        .route(
            "/v1/bookings/{id}",
            patch(update_booking_status).get(get_booking),
        )
}

async fn request_booking(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .lifecycle
        .request_booking(&principal, req.ride_id, req.seats)
        .await
        .map_err(AppError::booking)?;

    tracing::info!(
        booking_id = %booking.id,
        ride_id = %req.ride_id,
        seats = req.seats,
        "booking requested"
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn update_booking_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .lifecycle
        .update_status(&principal, id, req.status)
        .await
        .map_err(AppError::booking)?;

    tracing::info!(booking_id = %id, status = %booking.status, "booking transitioned");
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .store
        .get_booking(id)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFoundError(format!("booking not found: {}", id)))?;

    // Visible to its passenger and to the ride's driver only.
    if booking.passenger_id != principal.user_id {
        let ride = state
            .store
            .get_ride(booking.ride_id)
            .await
            .map_err(AppError::store)?;
        let is_driver = ride.map_or(false, |r| r.driver_id == principal.user_id);
        if !is_driver {
            return Err(AppError::AuthorizationError(
                "you are not a party to this booking".to_string(),
            ));
        }
    }
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    status: Option<BookingStatus>,
}

async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .store
        .list_bookings_for_passenger(principal.user_id, query.status)
        .await
        .map_err(AppError::store)?;
    Ok(Json(bookings))
}
