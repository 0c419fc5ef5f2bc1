//! Discover-or-create synchronisation of a sheet's table.
//!
//! A run walks workbook → worksheet → table strictly in order, reusing the
//! ids each level returns. A missing table is created from a fresh range and
//! styled; an existing one receives a key-based row upsert. A failing step
//! aborts the run and reports what already succeeded. Nothing is rolled back,
//! since re-running converges.

use std::{fmt, future::Future};

use chrono::{Datelike, NaiveDate};
use rota_core::{entry::ScheduleEntry, normalize::normalize_date};
use serde::Serialize;
use serde_json::Value;

use crate::{
  Error, Result,
  api::{ColumnWidth, FontSpec, ItemRef, SpreadsheetApi},
  config::WorkbookConfig,
  layout::SheetLayout,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
  ResolveWorkbook,
  CreateWorkbook,
  ResolveWorksheet,
  CreateWorksheet,
  ResolveTable,
  WriteRange,
  CreateTable,
  StyleTable,
  SizeColumns,
  SetFont,
  UpsertRows,
}

impl fmt::Display for SyncStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SyncStep::ResolveWorkbook => "resolve workbook",
      SyncStep::CreateWorkbook => "create workbook",
      SyncStep::ResolveWorksheet => "resolve worksheet",
      SyncStep::CreateWorksheet => "create worksheet",
      SyncStep::ResolveTable => "resolve table",
      SyncStep::WriteRange => "write range",
      SyncStep::CreateTable => "create table",
      SyncStep::StyleTable => "style table",
      SyncStep::SizeColumns => "size columns",
      SyncStep::SetFont => "set font",
      SyncStep::UpsertRows => "upsert rows",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
  pub workbook:      ItemRef,
  pub worksheet:     ItemRef,
  pub table_id:      String,
  pub table_created: bool,
  pub inserted:      usize,
  pub updated:       usize,
  /// Completed steps, in order.
  pub steps:         Vec<SyncStep>,
}

/// Steps completed so far in one run.
#[derive(Default)]
struct Run {
  completed: Vec<SyncStep>,
}

impl Run {
  async fn step<T, E, F>(&mut self, step: SyncStep, fut: F) -> Result<T>
  where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
  {
    tracing::info!(%step, "sync step");
    match fut.await {
      Ok(value) => {
        self.completed.push(step);
        Ok(value)
      }
      Err(e) => {
        tracing::error!(%step, error = %e, "sync step failed");
        Err(Error::Step {
          step,
          completed: std::mem::take(&mut self.completed),
          source: Box::new(e),
        })
      }
    }
  }
}

pub struct Synchronizer<A> {
  api:    A,
  config: WorkbookConfig,
}

impl<A: SpreadsheetApi> Synchronizer<A> {
  pub fn new(api: A, config: WorkbookConfig) -> Self { Self { api, config } }

  pub fn api(&self) -> &A { &self.api }

  pub fn config(&self) -> &WorkbookConfig { &self.config }

  /// Mirror `entries` (a date's effective schedule) into that date's
  /// worksheet of the month's workbook.
  pub async fn sync_day(
    &self,
    date: NaiveDate,
    entries: &[ScheduleEntry],
  ) -> Result<SyncReport> {
    let workbook = self.config.workbook_name(date.year(), date.month());
    let rows: Vec<_> = entries.iter().filter(|e| e.date == date).collect();
    self
      .sync_sheet(&workbook, &normalize_date(date), &SheetLayout::daily(), &rows)
      .await
  }

  /// Mirror the incidence-bearing `entries` into the month's incidence log.
  pub async fn sync_incidence_log(
    &self,
    year: i32,
    month: u32,
    entries: &[ScheduleEntry],
  ) -> Result<SyncReport> {
    let workbook = self.config.workbook_name(year, month);
    let rows: Vec<_> = entries.iter().filter(|e| e.has_incidence()).collect();
    self
      .sync_sheet(
        &workbook,
        &self.config.incidence_sheet,
        &SheetLayout::incidence_log(),
        &rows,
      )
      .await
  }

  async fn sync_sheet(
    &self,
    workbook_name: &str,
    sheet_name: &str,
    layout: &SheetLayout,
    entries: &[&ScheduleEntry],
  ) -> Result<SyncReport> {
    let mut run = Run::default();
    let api = &self.api;

    let found = run
      .step(SyncStep::ResolveWorkbook, api.list_workbooks())
      .await?
      .into_iter()
      .find(|w| w.name == workbook_name);
    let workbook = match found {
      Some(w) => {
        tracing::debug!(name = workbook_name, id = %w.id, "workbook found");
        w
      }
      None => run.step(SyncStep::CreateWorkbook, api.create_workbook(workbook_name)).await?,
    };

    let found = run
      .step(SyncStep::ResolveWorksheet, api.list_worksheets(&workbook.id))
      .await?
      .into_iter()
      .find(|s| s.name == sheet_name);
    let worksheet = match found {
      Some(s) => {
        tracing::debug!(name = sheet_name, id = %s.id, "worksheet found");
        s
      }
      None => {
        run
          .step(SyncStep::CreateWorksheet, api.create_worksheet(&workbook.id, sheet_name))
          .await?
      }
    };

    let existing = run
      .step(SyncStep::ResolveTable, api.list_tables(&workbook.id, &worksheet.id))
      .await?
      .into_iter()
      .next();

    let rows: Vec<Vec<Value>> = entries.iter().map(|e| layout.row(e)).collect();
    let (table_id, table_created, inserted, updated) = match existing {
      Some(table) => {
        let (inserted, updated) = if rows.is_empty() {
          (0, 0)
        } else {
          let key = layout.key_spec();
          let counts = run
            .step(SyncStep::UpsertRows, api.upsert_rows(&workbook.id, &table.id, &key, rows))
            .await?;
          (counts.inserted, counts.updated)
        };
        (table.id, false, inserted, updated)
      }
      None => {
        let inserted = rows.len();
        let address = layout.range_address(inserted + 1);
        let mut values = Vec::with_capacity(inserted + 1);
        values.push(layout.headers());
        values.extend(rows);

        run
          .step(
            SyncStep::WriteRange,
            api.write_range(&workbook.id, &worksheet.id, &address, values),
          )
          .await?;
        let table = run
          .step(SyncStep::CreateTable, api.create_table(&workbook.id, &worksheet.id, &address))
          .await?;
        self.style(&mut run, &workbook, &worksheet, &table, layout, &address).await?;
        (table.id, true, inserted, 0)
      }
    };

    tracing::info!(
      workbook = workbook_name,
      worksheet = sheet_name,
      table_created,
      inserted,
      updated,
      "sheet synchronised"
    );

    Ok(SyncReport {
      workbook,
      worksheet,
      table_id,
      table_created,
      inserted,
      updated,
      steps: run.completed,
    })
  }

  async fn style(
    &self,
    run: &mut Run,
    workbook: &ItemRef,
    worksheet: &ItemRef,
    table: &ItemRef,
    layout: &SheetLayout,
    address: &str,
  ) -> Result<()> {
    let api = &self.api;
    run
      .step(
        SyncStep::StyleTable,
        api.format_table_style(&workbook.id, &table.id, &self.config.table_style),
      )
      .await?;

    let widths: Vec<ColumnWidth> = layout
      .columns
      .iter()
      .enumerate()
      .map(|(column, field)| ColumnWidth {
        column,
        pixels: self.config.column_pixels(field.header()),
      })
      .collect();
    run
      .step(
        SyncStep::SizeColumns,
        api.format_column_widths(&workbook.id, &worksheet.id, &widths),
      )
      .await?;

    let font = FontSpec {
      name: self.config.font_name.clone(),
      size: self.config.font_size,
    };
    run
      .step(SyncStep::SetFont, api.format_font(&workbook.id, &worksheet.id, address, &font))
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::memory::MemoryWorkbook;

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 15).unwrap() }

  fn entry(program: &str, start: &str, instructor: &str) -> ScheduleEntry {
    ScheduleEntry::new(date(), program, start, "23:00", instructor)
  }

  fn sync() -> Synchronizer<MemoryWorkbook> {
    Synchronizer::new(MemoryWorkbook::new(), WorkbookConfig::default())
  }

  const BOOK: &str = "Schedule 2024-06.xlsx";

  #[tokio::test]
  async fn first_sync_creates_and_styles() {
    let s = sync();
    let entries = [entry("Algebra", "08:00", "Ana"), entry("Chem", "09:00", "Bo")];

    let report = s.sync_day(date(), &entries).await.unwrap();

    assert!(report.table_created);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.steps, [
      SyncStep::ResolveWorkbook,
      SyncStep::CreateWorkbook,
      SyncStep::ResolveWorksheet,
      SyncStep::CreateWorksheet,
      SyncStep::ResolveTable,
      SyncStep::WriteRange,
      SyncStep::CreateTable,
      SyncStep::StyleTable,
      SyncStep::SizeColumns,
      SyncStep::SetFont,
    ]);

    let api = s.api();
    assert_eq!(api.workbook_names(), [BOOK]);
    assert_eq!(api.worksheet_names(BOOK), ["2024-06-15"]);
    let table = api.table(BOOK, "2024-06-15").unwrap();
    assert_eq!(table.style.as_deref(), Some("TableStyleMedium2"));
    assert_eq!(table.header[0], json!("Date"));
    assert_eq!(table.rows.len(), 2);
    assert_eq!(api.column_widths(BOOK, "2024-06-15").len(), 17);
    assert_eq!(api.font(BOOK, "2024-06-15").unwrap().name, "Calibri");
  }

  #[tokio::test]
  async fn second_sync_reuses_structures_and_upserts() {
    let s = sync();
    s.sync_day(date(), &[entry("Algebra", "08:00", "Ana")]).await.unwrap();

    let mut changed = entry("Algebra", "8:00", "Ana");
    changed.incidence.status = Some("absent".into());
    let report = s
      .sync_day(date(), &[changed, entry("Chem", "09:00", "Bo")])
      .await
      .unwrap();

    assert!(!report.table_created);
    assert_eq!((report.inserted, report.updated), (1, 1));
    assert_eq!(report.steps, [
      SyncStep::ResolveWorkbook,
      SyncStep::ResolveWorksheet,
      SyncStep::ResolveTable,
      SyncStep::UpsertRows,
    ]);
    let table = s.api().table(BOOK, "2024-06-15").unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0][10], json!("absent"));
    assert_eq!(s.api().workbook_names().len(), 1);
  }

  #[tokio::test]
  async fn empty_rerun_skips_upsert() {
    let s = sync();
    s.sync_day(date(), &[entry("Algebra", "08:00", "Ana")]).await.unwrap();
    let report = s.sync_day(date(), &[]).await.unwrap();
    assert_eq!(report.steps.last(), Some(&SyncStep::ResolveTable));
    assert!(!s.api().calls().contains(&"upsert_rows".to_owned()));
  }

  #[tokio::test]
  async fn incidence_log_matches_on_date_and_program() {
    let s = sync();
    let mut first = entry("Algebra", "08:00", "Ana");
    first.incidence.kind = Some("absence".into());
    s.sync_incidence_log(2024, 6, &[first, entry("Chem", "09:00", "Bo")])
      .await
      .unwrap();

    let mut moved = entry("Algebra", "10:00", "Carla");
    moved.incidence.kind = Some("absence".into());
    moved.incidence.substitute = Some("Dan".into());
    let report = s.sync_incidence_log(2024, 6, &[moved]).await.unwrap();

    assert_eq!((report.inserted, report.updated), (0, 1));
    let table = s.api().table(BOOK, "Incidences").unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0][2], json!("10:00"));
    assert_eq!(table.rows[0][4], json!("Carla"));
  }

  #[tokio::test]
  async fn failure_aborts_with_failing_step() {
    let s = sync();
    s.api().fail_on("format_column_widths");

    let err = s.sync_day(date(), &[entry("Algebra", "08:00", "Ana")]).await.unwrap_err();
    let (step, completed) = match err {
      Error::Step { step, completed, .. } => (step, completed),
      other => panic!("expected a step error, got {other:?}"),
    };
    assert_eq!(step, SyncStep::SizeColumns);
    assert_eq!(completed.last(), Some(&SyncStep::StyleTable));
    assert!(!s.api().calls().contains(&"format_font".to_owned()));

    // The table survived; a rerun upserts into it.
    s.api().clear_failure();
    let report = s.sync_day(date(), &[entry("Algebra", "08:00", "Ana")]).await.unwrap();
    assert!(!report.table_created);
    assert_eq!(report.updated, 1);
  }
}
