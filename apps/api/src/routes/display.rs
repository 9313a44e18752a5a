//! Display pairing endpoints
//!
//! - `POST /qms/display/register` - issue a pairing code and client token
//! - `GET /qms/display/{code}/status` - poll whether the code was confirmed
//! - `DELETE /qms/display/pairing` - forget a display's pairing
//!
//! None of these require staff authentication: the display is anonymous
//! until a staff member confirms its code.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use qms_protocol::{PairingStatus, RegisterResponse, UnpairRequest};

use super::QmsState;
use crate::error::ApiResult;

/// Create display pairing router
pub fn display_router() -> Router<QmsState> {
    Router::new()
        .route("/display/register", post(register))
        .route("/display/:code/status", get(status))
        .route("/display/pairing", delete(unpair))
}

/// Issue a new pairing code
///
/// # Response
/// - 201 Created with `{code, client_token, expires_at}`
async fn register(State(state): State<QmsState>) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let response = state.pairing.register()?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Poll the pairing status of a code
///
/// Unknown and expired codes report `paired: false`.
async fn status(State(state): State<QmsState>, Path(code): Path<String>) -> Json<PairingStatus> {
    Json(state.pairing.poll(&code))
}

/// Forget a display's pairing; idempotent
async fn unpair(
    State(state): State<QmsState>,
    payload: Result<Json<UnpairRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(request) = payload?;
    if !state.pairing.unpair(&request.client_token) {
        tracing::debug!("Unpair requested for unknown client token");
    }
    Ok(StatusCode::NO_CONTENT)
}
