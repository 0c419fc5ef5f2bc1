//! Publish/version tracking with self-write suppression and dismissal.
//!
//! Each date moves Unpublished → Published(v1) → Published(v2) → …, where a
//! version is a pointer id plus its `updated_at`. A client remembers which
//! version it accepted and which it dismissed, and is told about a remote
//! version only when it is newer than both.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  batch::WriteSummary,
  entry::{PublishedVersionPointer, ScheduleEntry},
  local::{LocalStorage, load_json, store_json},
  session::SessionState,
  store::{PublishWrite, ScheduleStore},
  Error, Result,
};

/// Local storage key for [`ClientVersionState`].
pub const VERSION_STATE_KEY: &str = "rota.version_state";

/// Dismissed ids kept before the oldest is evicted.
pub const MAX_DISMISSED_VERSIONS: usize = 20;

// ─── Client state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientVersionState {
  pub current_version_id:         Option<Uuid>,
  pub current_version_updated_at: Option<DateTime<Utc>>,
  /// Oldest first.
  #[serde(default)]
  pub dismissed_versions:         VecDeque<Uuid>,
}

impl ClientVersionState {
  pub fn accept(&mut self, pointer: &PublishedVersionPointer) {
    self.current_version_id = Some(pointer.id);
    self.current_version_updated_at = Some(pointer.updated_at);
  }

  pub fn dismiss(&mut self, id: Uuid, capacity: usize) {
    if self.is_dismissed(id) {
      return;
    }
    self.dismissed_versions.push_back(id);
    while self.dismissed_versions.len() > capacity {
      self.dismissed_versions.pop_front();
    }
  }

  pub fn is_dismissed(&self, id: Uuid) -> bool {
    self.dismissed_versions.contains(&id)
  }

  /// Whether `pointer` should be surfaced as an available update.
  pub fn is_update(&self, pointer: &PublishedVersionPointer) -> bool {
    if self.is_dismissed(pointer.id) {
      return false;
    }
    match (self.current_version_id, self.current_version_updated_at) {
      (Some(id), _) if id != pointer.id => true,
      (Some(_), Some(seen)) => pointer.updated_at > seen,
      (Some(_), None) | (None, _) => true,
    }
  }
}

// ─── Publish outcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishRefusal {
  NoActiveDate,
  NoEntries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublishOutcome {
  Published {
    pointer: PublishedVersionPointer,
    summary: WriteSummary,
  },
  /// The date is already published; retry with `overwrite` to replace it.
  Exists { pointer: PublishedVersionPointer },
  Refused { reason: PublishRefusal },
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Owns this client's [`ClientVersionState`] and keeps it persisted.
///
/// Methods take `&mut self`: the state has a single cooperative owner and is
/// never shared between tasks.
pub struct VersionTracker<S, L> {
  store:   S,
  storage: L,
  state:   ClientVersionState,
  pending: Option<PublishedVersionPointer>,
}

impl<S, L> VersionTracker<S, L>
where
  S: ScheduleStore,
  L: LocalStorage,
{
  /// Restore client state from `storage`, or start empty.
  pub fn new(store: S, storage: L) -> Result<Self> {
    let state = load_json(&storage, VERSION_STATE_KEY)?.unwrap_or_default();
    Ok(Self {
      store,
      storage,
      state,
      pending: None,
    })
  }

  pub fn state(&self) -> &ClientVersionState { &self.state }

  /// The update currently signalled, if any.
  pub fn pending(&self) -> Option<&PublishedVersionPointer> {
    self.pending.as_ref()
  }

  pub fn storage(&self) -> &L { &self.storage }

  pub fn storage_mut(&mut self) -> &mut L { &mut self.storage }

  /// Look up the most recently updated pointer and signal it if it is an
  /// update for this client.
  pub async fn check_for_updates(
    &mut self,
  ) -> Result<Option<PublishedVersionPointer>> {
    let latest = self.store.latest_pointer().await.map_err(Error::store)?;
    self.pending = latest.filter(|p| self.state.is_update(p));
    if let Some(p) = &self.pending {
      tracing::info!(
        id = %p.id,
        date = %p.schedule_date,
        published_by = %p.published_by,
        "schedule update available"
      );
    }
    Ok(self.pending.clone())
  }

  /// Run the update check once per session; later calls return the
  /// current signal without touching the store.
  pub async fn startup(
    &mut self,
    session: &mut SessionState,
  ) -> Result<Option<PublishedVersionPointer>> {
    if session.begin_initial_check() {
      self.check_for_updates().await
    } else {
      Ok(self.pending.clone())
    }
  }

  /// Publish `entries` as the durable schedule for `date`.
  ///
  /// Refuses without touching the store when there is no active date or
  /// nothing to publish. An existing pointer with `overwrite == false`
  /// yields [`PublishOutcome::Exists`], whether caught by the advisory
  /// pre-check or by the store's own check inside the write transaction.
  /// On success the new version is accepted immediately so this client is
  /// not notified of its own write.
  pub async fn publish(
    &mut self,
    date: Option<NaiveDate>,
    entries: Vec<ScheduleEntry>,
    actor: &str,
    overwrite: bool,
  ) -> Result<PublishOutcome> {
    let Some(date) = date else {
      return Ok(PublishOutcome::Refused { reason: PublishRefusal::NoActiveDate });
    };

    let total = entries.len();
    let entries: Vec<_> = entries.into_iter().filter(|e| e.date == date).collect();
    if entries.len() != total {
      tracing::warn!(
        %date,
        skipped = total - entries.len(),
        "ignoring draft entries dated outside the published date"
      );
    }
    if entries.is_empty() {
      return Ok(PublishOutcome::Refused { reason: PublishRefusal::NoEntries });
    }

    if !overwrite
      && let Some(pointer) =
        self.store.get_pointer(date).await.map_err(Error::store)?
    {
      return Ok(PublishOutcome::Exists { pointer });
    }

    let write = self
      .store
      .publish_date(date, entries, actor, overwrite)
      .await
      .map_err(Error::store)?;

    match write {
      PublishWrite::Exists { pointer } => {
        tracing::warn!(%date, "date was published concurrently");
        Ok(PublishOutcome::Exists { pointer })
      }
      PublishWrite::Written { pointer, summary } => {
        tracing::info!(
          %date,
          id = %pointer.id,
          upserted = summary.upserted_count,
          duplicates = summary.duplicates_skipped,
          "schedule published"
        );
        self.accept(&pointer)?;
        Ok(PublishOutcome::Published { pointer, summary })
      }
    }
  }

  /// Record `pointer` as loaded by this client.
  pub fn accept(&mut self, pointer: &PublishedVersionPointer) -> Result<()> {
    self.state.accept(pointer);
    if self.pending.as_ref().is_some_and(|p| p.id == pointer.id) {
      self.pending = None;
    }
    self.persist()
  }

  /// Stop signalling version `id` and clear the current signal.
  pub fn dismiss(&mut self, id: Uuid) -> Result<()> {
    self.state.dismiss(id, MAX_DISMISSED_VERSIONS);
    self.pending = None;
    self.persist()
  }

  /// Forget everything this client accepted or dismissed, then check again.
  pub async fn reset(&mut self) -> Result<Option<PublishedVersionPointer>> {
    self.state = ClientVersionState::default();
    self.pending = None;
    self.storage.remove(VERSION_STATE_KEY)?;
    self.check_for_updates().await
  }

  fn persist(&mut self) -> Result<()> {
    store_json(&mut self.storage, VERSION_STATE_KEY, &self.state)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn pointer(id: Uuid, secs: i64) -> PublishedVersionPointer {
    PublishedVersionPointer {
      id,
      schedule_date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
      updated_at: Utc.timestamp_opt(secs, 0).unwrap(),
      entries_count: 2,
      published_by: "admin".into(),
    }
  }

  #[test]
  fn empty_state_sees_any_pointer() {
    let state = ClientVersionState::default();
    assert!(state.is_update(&pointer(Uuid::new_v4(), 10)));
  }

  #[test]
  fn same_id_needs_strictly_newer_timestamp() {
    let id = Uuid::new_v4();
    let mut state = ClientVersionState::default();
    state.accept(&pointer(id, 10));

    assert!(!state.is_update(&pointer(id, 10)));
    assert!(!state.is_update(&pointer(id, 5)));
    assert!(state.is_update(&pointer(id, 11)));
    assert!(state.is_update(&pointer(Uuid::new_v4(), 1)));
  }

  #[test]
  fn dismissed_ids_are_suppressed() {
    let id = Uuid::new_v4();
    let mut state = ClientVersionState::default();
    state.dismiss(id, 5);
    assert!(!state.is_update(&pointer(id, 99)));
  }

  #[test]
  fn dismissals_are_fifo_bounded() {
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let mut state = ClientVersionState::default();
    for id in &ids {
      state.dismiss(*id, 3);
    }
    state.dismiss(ids[3], 3);

    assert_eq!(state.dismissed_versions.len(), 3);
    assert!(!state.is_dismissed(ids[0]));
    assert!(state.is_dismissed(ids[1]));
    assert!(state.is_dismissed(ids[3]));
  }

  #[test]
  fn state_uses_camel_case_keys() {
    let json = serde_json::to_value(ClientVersionState::default()).unwrap();
    assert!(json.get("currentVersionId").is_some());
    assert!(json.get("dismissedVersions").is_some());
  }
}
