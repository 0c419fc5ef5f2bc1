//! Client-local blob persistence.
//!
//! Local state (accepted/dismissed versions, draft autosave) is a plain
//! string-keyed blob store. Values are JSON.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};

use crate::{entry::ScheduleEntry, Result};

pub trait LocalStorage {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&mut self, key: &str, value: String) -> Result<()>;

  fn remove(&mut self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value; `None` if the key is unset.
pub fn load_json<T, L>(storage: &L, key: &str) -> Result<Option<T>>
where
  T: DeserializeOwned,
  L: LocalStorage + ?Sized,
{
  storage
    .get(key)?
    .map(|raw| serde_json::from_str(&raw))
    .transpose()
    .map_err(Into::into)
}

pub fn store_json<T, L>(storage: &mut L, key: &str, value: &T) -> Result<()>
where
  T: Serialize,
  L: LocalStorage + ?Sized,
{
  storage.set(key, serde_json::to_string(value)?)
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

fn draft_key(date: NaiveDate) -> String { format!("rota.draft.{date}") }

pub fn save_draft<L: LocalStorage + ?Sized>(
  storage: &mut L,
  date: NaiveDate,
  entries: &[ScheduleEntry],
) -> Result<()> {
  store_json(storage, &draft_key(date), &entries)
}

pub fn load_draft<L: LocalStorage + ?Sized>(
  storage: &L,
  date: NaiveDate,
) -> Result<Vec<ScheduleEntry>> {
  Ok(load_json(storage, &draft_key(date))?.unwrap_or_default())
}

pub fn discard_draft<L: LocalStorage + ?Sized>(
  storage: &mut L,
  date: NaiveDate,
) -> Result<()> {
  storage.remove(&draft_key(date))
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// Volatile storage; state is lost with the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
  blobs: HashMap<String, String>,
}

impl LocalStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.blobs.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: String) -> Result<()> {
    self.blobs.insert(key.to_owned(), value);
    Ok(())
  }

  fn remove(&mut self, key: &str) -> Result<()> {
    self.blobs.remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn draft_round_trip_per_date() {
    let mut storage = MemoryStorage::default();
    let day = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let other = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
    let entries = vec![ScheduleEntry::new(day, "Algebra", "08:00", "10:00", "Ana")];

    save_draft(&mut storage, day, &entries).unwrap();
    assert_eq!(load_draft(&storage, day).unwrap(), entries);
    assert!(load_draft(&storage, other).unwrap().is_empty());

    discard_draft(&mut storage, day).unwrap();
    assert!(load_draft(&storage, day).unwrap().is_empty());
  }
}
