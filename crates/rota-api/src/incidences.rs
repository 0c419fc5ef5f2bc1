//! Handlers for `/incidences` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/incidences?from=&to=` | Incidence-bearing entries, inclusive range |
//! | `PATCH` | `/incidences` | Body: [`IncidenceOverride`]; 204, 403 or 404 |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use chrono::NaiveDate;
use rota_core::{
  access::update_incidence_checked,
  entry::{IncidenceOverride, ScheduleEntry},
  normalize::Slot,
  store::ScheduleStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct LogParams {
  pub from: NaiveDate,
  pub to:   NaiveDate,
}

/// `GET /incidences?from=<date>&to=<date>`
pub async fn log<S: ScheduleStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<LogParams>,
) -> Result<Json<Vec<ScheduleEntry>>, ApiError> {
  if params.from > params.to {
    return Err(ApiError::BadRequest(format!(
      "from {} is after to {}",
      params.from, params.to
    )));
  }
  let entries = state
    .store
    .incidence_log(params.from, params.to)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}

/// `PATCH /incidences`: only the supplied incidence fields are written.
pub async fn update<S: ScheduleStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<IncidenceOverride>,
) -> Result<StatusCode, ApiError> {
  let key = body.slot_key();
  update_incidence_checked(
    state.store.as_ref(),
    &state.may_write_incidence,
    &key,
    body.incidence,
  )
  .await?;
  Ok(StatusCode::NO_CONTENT)
}
