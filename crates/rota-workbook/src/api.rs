//! The spreadsheet operations the synchronizer relies on.
//!
//! Every object is addressed by the opaque id returned when it was listed or
//! created. Callers cache those ids for the length of a run instead of
//! resolving names again.

use std::future::Future;

use chrono::{Days, NaiveDate};
use rota_core::normalize::{normalize_date, normalize_text, normalize_time, normalize_time_serial};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A workbook, worksheet, or table as the service reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
  pub id:   String,
  pub name: String,
}

/// How a key cell is canonicalised before comparison. Spreadsheets turn
/// dates and times into serial numbers, so text comparison alone is not
/// enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
  Text,
  Date,
  Time,
}

/// The columns that identify a row for upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
  pub columns: Vec<(usize, CellKind)>,
}

impl KeySpec {
  /// Canonical key of `row`; missing cells count as empty.
  pub fn row_key(&self, row: &[Value]) -> String {
    self
      .columns
      .iter()
      .map(|&(index, kind)| normalize_cell(row.get(index).unwrap_or(&Value::Null), kind))
      .collect::<Vec<_>>()
      .join("|")
  }
}

pub fn normalize_cell(value: &Value, kind: CellKind) -> String {
  match (kind, value) {
    (_, Value::Null) => String::new(),
    (CellKind::Time, Value::Number(n)) => n
      .as_f64()
      .and_then(normalize_time_serial)
      .unwrap_or_else(|| n.to_string()),
    (CellKind::Time, Value::String(s)) => normalize_time(s),
    (CellKind::Date, Value::Number(n)) => n
      .as_f64()
      .and_then(serial_date)
      .map(normalize_date)
      .unwrap_or_else(|| n.to_string()),
    (_, Value::String(s)) => normalize_text(s),
    (_, other) => normalize_text(&other.to_string()),
  }
}

/// Days since the spreadsheet epoch, 1899-12-30.
fn serial_date(serial: f64) -> Option<NaiveDate> {
  if !serial.is_finite() || serial < 1.0 {
    return None;
  }
  NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWidth {
  /// Zero-based column index.
  pub column: usize,
  pub pixels: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
  pub name: String,
  pub size: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
  pub inserted: usize,
  pub updated:  usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Discrete workbook/worksheet/table operations of a spreadsheet service.
pub trait SpreadsheetApi: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Workbooks in the configured folder.
  fn list_workbooks(
    &self,
  ) -> impl Future<Output = Result<Vec<ItemRef>, Self::Error>> + Send + '_;

  fn create_workbook<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<ItemRef, Self::Error>> + Send + 'a;

  fn list_worksheets<'a>(
    &'a self,
    workbook: &'a str,
  ) -> impl Future<Output = Result<Vec<ItemRef>, Self::Error>> + Send + 'a;

  fn create_worksheet<'a>(
    &'a self,
    workbook: &'a str,
    name: &'a str,
  ) -> impl Future<Output = Result<ItemRef, Self::Error>> + Send + 'a;

  fn list_tables<'a>(
    &'a self,
    workbook: &'a str,
    worksheet: &'a str,
  ) -> impl Future<Output = Result<Vec<ItemRef>, Self::Error>> + Send + 'a;

  /// Write a rectangular block of values at `address` (e.g. `A1:C4`).
  fn write_range<'a>(
    &'a self,
    workbook: &'a str,
    worksheet: &'a str,
    address: &'a str,
    values: Vec<Vec<Value>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Promote a written range (first row as header) to a structured table.
  fn create_table<'a>(
    &'a self,
    workbook: &'a str,
    worksheet: &'a str,
    address: &'a str,
  ) -> impl Future<Output = Result<ItemRef, Self::Error>> + Send + 'a;

  /// Update rows whose key matches an incoming row; append the rest.
  fn upsert_rows<'a>(
    &'a self,
    workbook: &'a str,
    table: &'a str,
    key: &'a KeySpec,
    rows: Vec<Vec<Value>>,
  ) -> impl Future<Output = Result<UpsertCounts, Self::Error>> + Send + 'a;

  fn format_table_style<'a>(
    &'a self,
    workbook: &'a str,
    table: &'a str,
    style: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn format_column_widths<'a>(
    &'a self,
    workbook: &'a str,
    worksheet: &'a str,
    widths: &'a [ColumnWidth],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn format_font<'a>(
    &'a self,
    workbook: &'a str,
    worksheet: &'a str,
    address: &'a str,
    font: &'a FontSpec,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
