//! Station counter endpoints (staff only)
//!
//! - `POST /qms/stations/{station_id}/pair` - confirm a display's pairing code
//! - `POST /qms/stations/{station_id}/call-next` - call the next patient
//! - `POST /qms/stations/{station_id}/entries` - enqueue a patient
//! - `GET /qms/stations/{station_id}/queue` - current board snapshot

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use qms_protocol::{EnqueueRequest, PairRequest, PairingStatus, QueueSnapshot};

use super::{EntryResponse, QmsState};
use crate::error::{ApiError, ApiResult};
use crate::middleware::StaffUser;
use crate::models::queue::{NewEntry, QueueError};

/// Create station router
pub fn stations_router() -> Router<QmsState> {
    Router::new()
        .route("/stations/:station_id/pair", post(pair))
        .route("/stations/:station_id/call-next", post(call_next))
        .route("/stations/:station_id/entries", post(enqueue))
        .route("/stations/:station_id/queue", get(queue_snapshot))
}

/// Confirm a pairing code for this station
///
/// # Response
/// - 200 OK with the resulting pairing status
/// - 404 unknown code or station, 409 paired elsewhere, 410 expired
async fn pair(
    staff: StaffUser,
    State(state): State<QmsState>,
    Path(station_id): Path<String>,
    payload: Result<Json<PairRequest>, JsonRejection>,
) -> ApiResult<Json<PairingStatus>> {
    let Json(request) = payload?;
    let session = state.pairing.confirm(&request.code, &station_id)?;

    tracing::info!(
        staff = %staff.id(),
        station_id = %station_id,
        code = %session.code,
        "Pairing confirmed by staff"
    );

    let station = state
        .queue
        .station(&station_id)
        .ok_or_else(|| ApiError::not_found("station", station_id.clone()))?;
    Ok(Json(PairingStatus::paired(
        station.id.clone(),
        station.name.clone(),
    )))
}

/// Call the next patient
///
/// # Response
/// - 200 OK with the serving entry (unchanged if one was already serving)
/// - 204 No Content when nobody is waiting
async fn call_next(
    staff: StaffUser,
    State(state): State<QmsState>,
    Path(station_id): Path<String>,
) -> ApiResult<Response> {
    match state.queue.call_next(&station_id) {
        Ok(entry) => {
            tracing::debug!(staff = %staff.id(), station_id = %station_id, "Call next handled");
            Ok(Json(EntryResponse::new(&state, entry)).into_response())
        }
        Err(QueueError::QueueEmpty(_)) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e.into()),
    }
}

/// Add a patient to the station's line
///
/// # Response
/// - 201 Created with the new entry
/// - 400 on unknown source type, negative priority or oversized name
async fn enqueue(
    _staff: StaffUser,
    State(state): State<QmsState>,
    Path(station_id): Path<String>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EntryResponse>)> {
    let Json(request) = payload?;
    let new_entry = NewEntry::parse(&request.source_type, request.priority, request.patient_name)?;
    let entry = state.queue.enqueue(&station_id, new_entry)?;
    Ok((StatusCode::CREATED, Json(EntryResponse::new(&state, entry))))
}

/// Current board snapshot of the station
async fn queue_snapshot(
    _staff: StaffUser,
    State(state): State<QmsState>,
    Path(station_id): Path<String>,
) -> ApiResult<Json<QueueSnapshot>> {
    Ok(Json(state.queue.snapshot(&station_id)?))
}
