//! JSON API over a schedule store.
//!
//! Serves the merged effective day (the read-only input for downstream
//! consumers such as meeting matching), its overlap report, version pointers,
//! and the gated incidence update. Auth and transport are the caller's
//! responsibility; the caller decides the write capability up front.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rota_api::api_router(store.clone(), true))
//! ```

pub mod error;
pub mod etag;
pub mod incidences;
pub mod schedule;
pub mod versions;


use std::sync::Arc;

use axum::{Router, routing::get};
use rota_core::store::ScheduleStore;

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:               Arc<S>,
  pub may_write_incidence: bool,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:               Arc::clone(&self.store),
      may_write_incidence: self.may_write_incidence,
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, may_write_incidence: bool) -> Router<()>
where
  S: ScheduleStore + 'static,
{
  let state = AppState { store, may_write_incidence };
  Router::new()
    // Schedule
    .route("/schedule/{date}", get(schedule::day::<S>))
    .route("/schedule/{date}/overlaps", get(schedule::overlaps::<S>))
    // Incidences
    .route(
      "/incidences",
      get(incidences::log::<S>).patch(incidences::update::<S>),
    )
    // Versions
    .route("/versions/latest", get(versions::latest::<S>))
    .route("/versions/{date}", get(versions::for_date::<S>))
    .with_state(state)
}
