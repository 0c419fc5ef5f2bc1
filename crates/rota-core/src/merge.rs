//! Base + override projection into the effective schedule.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  entry::{IncidenceOverride, ScheduleEntry},
  normalize::{Slot, SlotKey},
  store::ScheduleStore,
};

/// One date's stored rows, split into what was planned and what happened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaySnapshot {
  pub base:      Vec<ScheduleEntry>,
  pub overrides: Vec<IncidenceOverride>,
}

impl DaySnapshot {
  pub fn effective(&self) -> Vec<ScheduleEntry> {
    merge_base_with_overrides(&self.base, &self.overrides)
  }
}

/// Overlay each base entry with the override sharing its composite key.
///
/// The output has the same length and order as `base`. Overrides without a
/// matching base entry are dropped; when several overrides share a key the
/// first one wins.
pub fn merge_base_with_overrides(
  base: &[ScheduleEntry],
  overrides: &[IncidenceOverride],
) -> Vec<ScheduleEntry> {
  let mut by_key: HashMap<SlotKey, &IncidenceOverride> =
    HashMap::with_capacity(overrides.len());
  for o in overrides {
    by_key.entry(o.slot_key()).or_insert(o);
  }

  base
    .iter()
    .map(|entry| {
      let mut effective = entry.clone();
      if let Some(o) = by_key.get(&entry.slot_key()) {
        effective.incidence = entry.incidence.overlay(&o.incidence);
      }
      effective
    })
    .collect()
}

/// Read a date from the store and project its effective schedule.
pub async fn effective_day<S: ScheduleStore>(
  store: &S,
  date: NaiveDate,
) -> Result<Vec<ScheduleEntry>, S::Error> {
  Ok(store.day_snapshot(date).await?.effective())
}
