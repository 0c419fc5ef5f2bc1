//! Handlers for `/schedule` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/schedule/:date` | Effective entries; `ETag`, honours `If-None-Match` |
//! | `GET`  | `/schedule/:date/overlaps` | [`OverlapReport`] over the effective entries |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use rota_core::{
  merge::effective_day,
  overlap::{OverlapReport, detect_overlaps},
  store::ScheduleStore,
};

use crate::{AppState, error::ApiError, etag::compute_etag};

/// `GET /schedule/:date`
pub async fn day<S: ScheduleStore>(
  State(state): State<AppState<S>>,
  Path(date): Path<NaiveDate>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let entries = effective_day(state.store.as_ref(), date)
    .await
    .map_err(ApiError::store)?;
  let etag = compute_etag(&entries);

  let unchanged = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.split(',').any(|t| t.trim() == etag || t.trim() == "*"));
  if unchanged {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(([(header::ETAG, etag)], Json(entries)).into_response())
}

/// `GET /schedule/:date/overlaps`
pub async fn overlaps<S: ScheduleStore>(
  State(state): State<AppState<S>>,
  Path(date): Path<NaiveDate>,
) -> Result<Json<OverlapReport>, ApiError> {
  let entries = effective_day(state.store.as_ref(), date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(detect_overlaps(&entries)))
}
