//! Batch preparation for the column-partitioned upsert writer.
//!
//! A multi-row upsert is flattened to the union of its rows' columns, and a
//! row that lacks a column present elsewhere in the batch writes NULL into it
//! on conflict. Batches are therefore normalised, de-duplicated by composite
//! key, and split into uniform-shape sub-batches before reaching the store.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{entry::ScheduleEntry, normalize::Slot};

/// Shape of a row as far as the writer is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRow {
  /// Carries no incidence field; only base columns may be written.
  BaseOnly(ScheduleEntry),
  /// Carries at least one incidence field; every incidence column is
  /// written, absent ones as NULL.
  WithIncidence(ScheduleEntry),
}

impl BatchRow {
  pub fn classify(entry: ScheduleEntry) -> Self {
    if entry.has_incidence() {
      Self::WithIncidence(entry)
    } else {
      Self::BaseOnly(entry)
    }
  }
}

/// Normalised rows with unique composite keys.
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch {
  pub rows:               Vec<ScheduleEntry>,
  pub duplicates_skipped: usize,
}

impl PreparedBatch {
  /// Normalise every entry and keep the first occurrence of each key.
  pub fn new(entries: Vec<ScheduleEntry>) -> Self {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut rows = Vec::with_capacity(entries.len());
    let mut duplicates_skipped = 0;

    for entry in entries.into_iter().map(ScheduleEntry::normalized) {
      let key = entry.slot_key();
      if seen.insert(key.clone()) {
        rows.push(entry);
      } else {
        tracing::warn!(%key, "dropping duplicate slot from batch");
        duplicates_skipped += 1;
      }
    }

    Self { rows, duplicates_skipped }
  }

  /// Split into the two uniform-shape sub-batches.
  pub fn partition(self) -> PartitionedBatch {
    let mut base_only = vec![];
    let mut with_incidence = vec![];
    for row in self.rows.into_iter().map(BatchRow::classify) {
      match row {
        BatchRow::BaseOnly(e) => base_only.push(e),
        BatchRow::WithIncidence(e) => with_incidence.push(e),
      }
    }
    PartitionedBatch {
      base_only,
      with_incidence,
      duplicates_skipped: self.duplicates_skipped,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct PartitionedBatch {
  pub base_only:          Vec<ScheduleEntry>,
  pub with_incidence:     Vec<ScheduleEntry>,
  pub duplicates_skipped: usize,
}

/// Outcome of a publish or import write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
  pub upserted_count:     usize,
  pub duplicates_skipped: usize,
  /// Rows written through the base-only upsert.
  pub base_only:          usize,
  /// Rows written through the with-incidence upsert.
  pub with_incidence:     usize,
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn entry(program: &str, start: &str, instructor: &str) -> ScheduleEntry {
    ScheduleEntry::new(
      NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
      program,
      start,
      "23:00",
      instructor,
    )
  }

  #[test]
  fn first_occurrence_wins() {
    let mut first = entry("Algebra", "8:00", "Ana");
    first.branch = Some("North".into());
    let mut second = entry("Algebra ", "08:00", "Ana");
    second.branch = Some("South".into());

    let batch = PreparedBatch::new(vec![first, second]);
    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.duplicates_skipped, 1);
    assert_eq!(batch.rows[0].branch.as_deref(), Some("North"));
    assert_eq!(batch.rows[0].start_time, "08:00");
  }

  #[test]
  fn separator_bearing_names_are_distinct_slots() {
    let a = entry("z", "08:00", "x|y");
    let b = entry("y|z", "08:00", "x");
    let batch = PreparedBatch::new(vec![a, b]);
    assert_eq!(batch.rows.len(), 2);
    assert_eq!(batch.duplicates_skipped, 0);
  }

  #[test]
  fn partition_by_incidence_presence() {
    let plain = entry("Algebra", "08:00", "Ana");
    let mut marked = entry("Physics", "10:00", "Ana");
    marked.incidence.kind = Some("absence".into());

    let parts = PreparedBatch::new(vec![plain, marked]).partition();
    assert_eq!(parts.base_only.len(), 1);
    assert_eq!(parts.with_incidence.len(), 1);
    assert_eq!(parts.with_incidence[0].program, "Physics");
  }

  #[test]
  fn blank_incidence_is_base_only() {
    let mut row = entry("Algebra", "08:00", "Ana");
    row.incidence.feedback = Some("  ".into());
    let parts = PreparedBatch::new(vec![row]).partition();
    assert_eq!(parts.base_only.len(), 1);
    assert!(parts.with_incidence.is_empty());
  }
}
