//! Handlers for `/versions` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::NaiveDate;
use rota_core::{entry::PublishedVersionPointer, store::ScheduleStore};

use crate::{AppState, error::ApiError};

/// `GET /versions/latest`: the most recently updated pointer.
pub async fn latest<S: ScheduleStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<PublishedVersionPointer>, ApiError> {
  state
    .store
    .latest_pointer()
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound("nothing has been published".into()))
}

/// `GET /versions/:date`
pub async fn for_date<S: ScheduleStore>(
  State(state): State<AppState<S>>,
  Path(date): Path<NaiveDate>,
) -> Result<Json<PublishedVersionPointer>, ApiError> {
  state
    .store
    .get_pointer(date)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("{date} is not published")))
}
