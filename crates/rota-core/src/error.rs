//! Error types for `rota-core`.

use thiserror::Error;

use crate::normalize::CompositeKey;

#[derive(Debug, Error)]
pub enum Error {
  /// An update or delete targeted a slot that was never published.
  #[error("no published entry for slot {0}; publish the date first")]
  SlotNotFound(CompositeKey),

  #[error("not permitted to write incidences")]
  PermissionDenied,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("local storage error: {0}")]
  LocalStorage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
