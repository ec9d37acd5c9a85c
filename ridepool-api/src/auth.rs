use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ridepool_domain::Role;

use crate::{error::AppError, middleware::auth::Claims, state::AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GuestTokenRequest {
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

/// Issue a short-lived token for a fresh user id. Stands in for the
/// external identity provider in development and tests.
async fn login_guest(
    State(state): State<AppState>,
    Json(req): Json<GuestTokenRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let role = req.role.unwrap_or(Role::Passenger);
    let user_id = Uuid::new_v4();

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse { token, user_id }))
}
