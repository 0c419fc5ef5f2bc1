//! Subcommand implementations.

use std::{path::Path, sync::Arc};

use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use rota_core::{
  access::update_incidence_checked,
  entry::{Incidence, ScheduleEntry},
  ingest::{import_values, validate_values},
  local::{discard_draft, load_draft, save_draft},
  merge::effective_day,
  normalize::SlotKey,
  overlap::detect_overlaps,
  session::SessionState,
  store::ScheduleStore,
  version::{PublishOutcome, VersionTracker},
};
use rota_store_sqlite::SqliteStore;
use rota_workbook::{
  GraphClient, MemoryWorkbook, SpreadsheetApi, SyncReport, Synchronizer,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{Command, DraftAction, IncidenceArgs, config::RotaConfig, storage::FileStorage};

pub async fn run(command: Command, cfg: RotaConfig) -> Result<()> {
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match command {
    Command::Publish { date, file, overwrite } => {
      publish(store, &cfg, date, file.as_deref(), overwrite).await
    }
    Command::Import { file } => {
      let rows = read_rows(&file)?;
      let report = import_values(&store, rows, &cfg.actor).await?;
      print_json(&report)
    }
    Command::Overlaps { date, file } => {
      let entries = match file {
        Some(file) => validated(read_rows(&file)?),
        None => effective_day(&store, date).await?,
      };
      let day: Vec<_> = entries.into_iter().filter(|e| e.date == date).collect();
      let report = detect_overlaps(&day);
      if report.is_clean() {
        tracing::info!(%date, entries = day.len(), "no overlaps");
      } else {
        tracing::warn!(%date, count = report.overlap_count(), "overlapping entries");
      }
      print_json(&report)
    }
    Command::Incidence { slot, fields } => {
      let key = SlotKey::new(slot.date, &slot.start, &slot.instructor, &slot.program);
      update_incidence_checked(&store, &cfg.may_write_incidence, &key, fields.into())
        .await?;
      println!("updated {key}");
      Ok(())
    }
    Command::Delete { date, program, start, instructor, file } => {
      if let Some(file) = file {
        let raw = std::fs::read_to_string(&file)
          .with_context(|| format!("failed to read {file:?}"))?;
        let keys: Vec<SlotKey> = serde_json::from_str::<Vec<SlotKey>>(&raw)
          .context("deserialising slot keys")?
          .into_iter()
          .map(|k| SlotKey::new(k.date, &k.start_time, &k.instructor, &k.program))
          .collect();
        let deleted = store.delete_entries(keys).await?;
        println!("deleted {deleted} entries");
        return Ok(());
      }

      let (Some(date), Some(program), Some(start)) = (date, program, start) else {
        bail!("--date, --program and --start identify the slot to delete");
      };
      let key = SlotKey::new(date, &start, &instructor, &program);
      if !store.delete_entry(&key).await? {
        return Err(rota_core::Error::SlotNotFound(key.composite()).into());
      }
      println!("deleted {key}");
      Ok(())
    }
    Command::Sync { date, dry_run } => {
      let entries = effective_day(&store, date).await?;
      let report = if dry_run {
        sync_day(Synchronizer::new(MemoryWorkbook::new(), cfg.workbook), date, &entries)
          .await?
      } else {
        let api = GraphClient::new(cfg.workbook.clone())?;
        sync_day(Synchronizer::new(api, cfg.workbook), date, &entries).await?
      };
      print_json(&report)
    }
    Command::SyncLog { month: (year, month), dry_run } => {
      let (from, to) = month_bounds(year, month)?;
      let entries = store.incidence_log(from, to).await?;
      let report = if dry_run {
        let sync = Synchronizer::new(MemoryWorkbook::new(), cfg.workbook);
        sync.sync_incidence_log(year, month, &entries).await?
      } else {
        let sync = Synchronizer::new(GraphClient::new(cfg.workbook.clone())?, cfg.workbook);
        sync.sync_incidence_log(year, month, &entries).await?
      };
      print_json(&report)
    }
    Command::CheckUpdates => {
      let mut tracker = tracker(store, &cfg)?;
      let mut session = SessionState::new();
      match tracker.startup(&mut session).await? {
        Some(pointer) => print_json(&pointer),
        None => {
          println!("up to date");
          Ok(())
        }
      }
    }
    Command::Dismiss { id } => {
      tracker(store, &cfg)?.dismiss(id)?;
      println!("dismissed {id}");
      Ok(())
    }
    Command::Reset => {
      let pending = tracker(store, &cfg)?.reset().await?;
      print_json(&pending)
    }
    Command::Draft { action } => draft(&cfg, action),
    Command::Serve => serve(store, &cfg).await,
  }
}

// ─── Publish ──────────────────────────────────────────────────────────────────

async fn publish(
  store: SqliteStore,
  cfg: &RotaConfig,
  date: Option<NaiveDate>,
  file: Option<&Path>,
  overwrite: bool,
) -> Result<()> {
  let mut tracker = tracker(store, cfg)?;
  let entries = match (file, date) {
    (Some(file), _) => validated(read_rows(file)?),
    (None, Some(date)) => load_draft(tracker.storage(), date)?,
    (None, None) => vec![],
  };

  let outcome = tracker.publish(date, entries, &cfg.actor, overwrite).await?;
  if let (PublishOutcome::Published { .. }, Some(date)) = (&outcome, date) {
    discard_draft(tracker.storage_mut(), date)?;
  }
  if let PublishOutcome::Exists { pointer } = &outcome {
    tracing::warn!(
      date = %pointer.schedule_date,
      published_by = %pointer.published_by,
      "already published; pass --overwrite to replace it"
    );
  }
  print_json(&outcome)
}

// ─── Drafts ───────────────────────────────────────────────────────────────────

fn draft(cfg: &RotaConfig, action: DraftAction) -> Result<()> {
  let mut storage = FileStorage::open(&cfg.state_path)?;
  match action {
    DraftAction::Save { date, file } => {
      let entries = validated(read_rows(&file)?);
      save_draft(&mut storage, date, &entries)?;
      println!("saved {} entries for {date}", entries.len());
    }
    DraftAction::Show { date } => print_json(&load_draft(&storage, date)?)?,
    DraftAction::Discard { date } => {
      discard_draft(&mut storage, date)?;
      println!("discarded draft for {date}");
    }
  }
  Ok(())
}

// ─── Serve ────────────────────────────────────────────────────────────────────

async fn serve(store: SqliteStore, cfg: &RotaConfig) -> Result<()> {
  let app = axum::Router::new()
    .nest("/api", rota_api::api_router(Arc::new(store), cfg.may_write_incidence))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.server.host, cfg.server.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn tracker(
  store: SqliteStore,
  cfg: &RotaConfig,
) -> Result<VersionTracker<SqliteStore, FileStorage>> {
  let storage = FileStorage::open(&cfg.state_path)
    .with_context(|| format!("failed to open local state at {:?}", cfg.state_path))?;
  Ok(VersionTracker::new(store, storage)?)
}

async fn sync_day<A: SpreadsheetApi>(
  sync: Synchronizer<A>,
  date: NaiveDate,
  entries: &[ScheduleEntry],
) -> Result<SyncReport> {
  Ok(sync.sync_day(date, entries).await?)
}

/// The rows of a JSON array file, untyped so each row is checked on its own.
fn read_rows(path: &Path) -> Result<Vec<Value>> {
  let raw =
    std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
  serde_json::from_str(&raw).with_context(|| format!("deserialising rows in {path:?}"))
}

/// Valid entries of `rows`; rejected rows are logged and dropped.
fn validated(rows: Vec<Value>) -> Vec<ScheduleEntry> {
  let validated = validate_values(rows);
  if !validated.rejected.is_empty() {
    tracing::warn!(rejected = validated.rejected.len(), "some rows failed validation");
  }
  validated.entries
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
  let from = NaiveDate::from_ymd_opt(year, month, 1)
    .ok_or_else(|| anyhow!("invalid month {year}-{month:02}"))?;
  let next = if month == 12 {
    NaiveDate::from_ymd_opt(year + 1, 1, 1)
  } else {
    NaiveDate::from_ymd_opt(year, month + 1, 1)
  };
  let to = next
    .and_then(|d| d.pred_opt())
    .ok_or_else(|| anyhow!("invalid month {year}-{month:02}"))?;
  debug_assert_eq!(to.month(), month);
  Ok((from, to))
}

/// Parse `YYYY-MM`.
pub fn parse_month(s: &str) -> Result<(i32, u32), String> {
  let (y, m) = s.split_once('-').ok_or_else(|| format!("expected YYYY-MM, got {s:?}"))?;
  let year = y.parse().map_err(|_| format!("invalid year {y:?}"))?;
  let month = m.parse().map_err(|_| format!("invalid month {m:?}"))?;
  if !(1..=12).contains(&month) {
    return Err(format!("month {month} out of range"));
  }
  Ok((year, month))
}

impl From<IncidenceArgs> for Incidence {
  fn from(a: IncidenceArgs) -> Self {
    Incidence {
      status:      a.status,
      substitute:  a.substitute,
      kind:        a.kind,
      subtype:     a.subtype,
      description: a.description,
      department:  a.department,
      feedback:    a.feedback,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn month_arguments() {
    assert_eq!(parse_month("2024-06"), Ok((2024, 6)));
    assert!(parse_month("2024-13").is_err());
    assert!(parse_month("June").is_err());
  }

  #[test]
  fn month_bounds_cover_whole_month() {
    let (from, to) = month_bounds(2024, 2).unwrap();
    assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    assert_eq!(to, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    let (_, dec) = month_bounds(2023, 12).unwrap();
    assert_eq!(dec, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
  }
}
