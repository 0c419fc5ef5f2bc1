//! Capability check in front of incidence writes.

use crate::{
  entry::Incidence,
  normalize::SlotKey,
  store::ScheduleStore,
  Error, Result,
};

/// Answers whether the current actor may write incidence data. Supplied by
/// the embedding application's auth layer.
pub trait PermissionGate {
  fn may_write_incidence(&self) -> bool;
}

impl PermissionGate for bool {
  fn may_write_incidence(&self) -> bool { *self }
}

/// Write `changes` to the slot's incidence columns, after checking `gate`.
///
/// A slot that was never published yields [`Error::SlotNotFound`] rather
/// than a silent success.
pub async fn update_incidence_checked<S, G>(
  store: &S,
  gate: &G,
  key: &SlotKey,
  changes: Incidence,
) -> Result<()>
where
  S: ScheduleStore,
  G: PermissionGate + ?Sized,
{
  if !gate.may_write_incidence() {
    return Err(Error::PermissionDenied);
  }

  let changes = changes.normalized();
  if store.update_incidence(key, changes).await.map_err(Error::store)? {
    tracing::info!(slot = %key, "incidence updated");
    Ok(())
  } else {
    Err(Error::SlotNotFound(key.composite()))
  }
}
