//! Queue entry endpoints (staff only)
//!
//! - `PATCH /qms/queue-entries/{id}` - complete, mark no-show, or requeue

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::patch,
    Json, Router,
};
use uuid::Uuid;

use qms_protocol::UpdateEntryRequest;

use super::{EntryResponse, QmsState};
use crate::error::ApiResult;
use crate::middleware::StaffUser;

/// Create queue entry router
pub fn entries_router() -> Router<QmsState> {
    Router::new().route("/queue-entries/:id", patch(update_entry))
}

/// Apply a status transition to an entry
///
/// # Response
/// - 200 OK with the updated entry
/// - 404 unknown entry, 409 transition not allowed from the current status
/// - 400 when asked to move an entry to SERVING
async fn update_entry(
    staff: StaffUser,
    State(state): State<QmsState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> ApiResult<Json<EntryResponse>> {
    let Json(request) = payload?;
    let entry = state.queue.update_status(id, request.status)?;
    tracing::debug!(staff = %staff.id(), entry_id = %id, status = %entry.status, "Entry updated");
    Ok(Json(EntryResponse::new(&state, entry)))
}
