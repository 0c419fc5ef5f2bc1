//! The `ScheduleStore` trait and supporting result types.
//!
//! The trait is implemented by storage backends (e.g. `rota-store-sqlite`).
//! Higher layers (`rota-workbook`, `rota-api`, `rota-cli`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  batch::WriteSummary,
  entry::{Incidence, PublishedVersionPointer, ScheduleEntry},
  merge::DaySnapshot,
  normalize::SlotKey,
};

/// Result of an atomic store-level publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublishWrite {
  Written {
    pointer: PublishedVersionPointer,
    summary: WriteSummary,
  },
  /// A pointer already existed and overwrite was not requested. Nothing was
  /// written.
  Exists { pointer: PublishedVersionPointer },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store holding schedule rows and version
/// pointers.
///
/// Rows are unique on the normalised (date, program, start_time, instructor)
/// tuple. Writes are PATCH-like: each operation names the columns it owns and
/// never touches the others.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ScheduleStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Upsert base columns only. Incidence columns of existing rows survive.
  fn publish_entries<'a>(
    &'a self,
    entries: Vec<ScheduleEntry>,
    actor: &'a str,
  ) -> impl Future<Output = Result<WriteSummary, Self::Error>> + Send + 'a;

  /// Upsert a mixed batch as two uniform-shape sub-batches: base-only rows
  /// write base columns, incidence-bearing rows write base and all
  /// incidence columns.
  fn import_entries<'a>(
    &'a self,
    entries: Vec<ScheduleEntry>,
    actor: &'a str,
  ) -> impl Future<Output = Result<WriteSummary, Self::Error>> + Send + 'a;

  /// Write the supplied incidence fields of one existing row. Returns
  /// `false` (and writes nothing) if no row has this key.
  fn update_incidence<'a>(
    &'a self,
    key: &'a SlotKey,
    changes: Incidence,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Returns whether a row was deleted.
  fn delete_entry<'a>(
    &'a self,
    key: &'a SlotKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Delete many rows in a single store round trip. Returns the number
  /// deleted.
  fn delete_entries(
    &self,
    keys: Vec<SlotKey>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Publish a date atomically: refuse if a pointer exists and `overwrite`
  /// is false, otherwise upsert the base columns of `entries` and advance
  /// the pointer in the same transaction.
  fn publish_date<'a>(
    &'a self,
    date: NaiveDate,
    entries: Vec<ScheduleEntry>,
    actor: &'a str,
    overwrite: bool,
  ) -> impl Future<Output = Result<PublishWrite, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// A date's rows split into base entries and incidence overrides.
  fn day_snapshot(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<DaySnapshot, Self::Error>> + Send + '_;

  /// Every incidence-bearing row with `from <= date <= to`, effective view.
  fn incidence_log(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<ScheduleEntry>, Self::Error>> + Send + '_;

  fn get_pointer(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<PublishedVersionPointer>, Self::Error>>
  + Send
  + '_;

  /// The pointer with the greatest `updated_at`, across all dates.
  fn latest_pointer(
    &self,
  ) -> impl Future<Output = Result<Option<PublishedVersionPointer>, Self::Error>>
  + Send
  + '_;
}
