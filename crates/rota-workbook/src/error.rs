//! Error type for `rota-workbook`.

use thiserror::Error;

use crate::sync::SyncStep;

#[derive(Debug, Error)]
pub enum Error {
  /// A synchronizer step failed. Earlier steps are not rolled back.
  #[error("{step} failed: {source}")]
  Step {
    step:      SyncStep,
    completed: Vec<SyncStep>,
    #[source]
    source:    Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}: {body}")]
  Status {
    method: reqwest::Method,
    path:   String,
    status: reqwest::StatusCode,
    body:   String,
  },

  #[error("workbook {0:?} did not appear after copying the template")]
  CopyTimedOut(String),

  #[error("no workbook template configured")]
  NoTemplate,

  #[error("unknown {kind} id {id:?}")]
  UnknownId { kind: &'static str, id: String },

  #[error("no range written at {0:?}")]
  UnknownRange(String),

  /// Raised by [`MemoryWorkbook`](crate::MemoryWorkbook) for an operation
  /// marked as failing.
  #[error("{0} is unavailable")]
  Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
