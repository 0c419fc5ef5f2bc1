//! [`SqliteStore`], the SQLite implementation of [`ScheduleStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rota_core::{
  batch::{PreparedBatch, WriteSummary},
  entry::{Incidence, PublishedVersionPointer, ScheduleEntry},
  merge::DaySnapshot,
  normalize::SlotKey,
  store::{PublishWrite, ScheduleStore},
};

use crate::{
  encode::{
    ENTRY_COLUMNS, POINTER_COLUMNS, RawEntryRow, RawPointer, encode_date,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  Result,
};

// ─── SQL ─────────────────────────────────────────────────────────────────────

/// Base columns only. Incidence columns are never named, so a republish
/// cannot disturb them.
const UPSERT_BASE: &str = "
INSERT INTO schedule_entries (
  schedule_date, program, start_time, instructor,
  end_time, shift, branch, code, minutes, units,
  published_by, created_at, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
ON CONFLICT (schedule_date, program, start_time, instructor) DO UPDATE SET
  end_time     = excluded.end_time,
  shift        = excluded.shift,
  branch       = excluded.branch,
  code         = excluded.code,
  minutes      = excluded.minutes,
  units        = excluded.units,
  published_by = excluded.published_by,
  updated_at   = excluded.updated_at";

/// Base and every incidence column; absent incidence fields are written as
/// NULL.
const UPSERT_WITH_INCIDENCE: &str = "
INSERT INTO schedule_entries (
  schedule_date, program, start_time, instructor,
  end_time, shift, branch, code, minutes, units,
  status, substitute, incidence_type, incidence_subtype,
  description, department, feedback,
  published_by, created_at, updated_at, incidence_updated_at
) VALUES (
  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
  ?11, ?12, ?13, ?14, ?15, ?16, ?17,
  ?18, ?19, ?19, ?19
)
ON CONFLICT (schedule_date, program, start_time, instructor) DO UPDATE SET
  end_time             = excluded.end_time,
  shift                = excluded.shift,
  branch               = excluded.branch,
  code                 = excluded.code,
  minutes              = excluded.minutes,
  units                = excluded.units,
  status               = excluded.status,
  substitute           = excluded.substitute,
  incidence_type       = excluded.incidence_type,
  incidence_subtype    = excluded.incidence_subtype,
  description          = excluded.description,
  department           = excluded.department,
  feedback             = excluded.feedback,
  published_by         = excluded.published_by,
  updated_at           = excluded.updated_at,
  incidence_updated_at = excluded.incidence_updated_at";

const UPSERT_POINTER: &str = "
INSERT INTO published_versions (id, schedule_date, updated_at, entries_count, published_by)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (schedule_date) DO UPDATE SET
  updated_at    = excluded.updated_at,
  entries_count = excluded.entries_count,
  published_by  = excluded.published_by
RETURNING id, schedule_date, updated_at, entries_count, published_by";

const KEY_MATCH: &str =
  "schedule_date = ?1 AND program = ?2 AND start_time = ?3 AND instructor = ?4";

/// Incidence field name → column name, aligned with [`Incidence::FIELDS`].
const INCIDENCE_COLUMNS: [&str; 7] = [
  "status",
  "substitute",
  "incidence_type",
  "incidence_subtype",
  "description",
  "department",
  "feedback",
];

// ─── Statement helpers ───────────────────────────────────────────────────────

fn key_params(key: &SlotKey) -> [String; 4] {
  [
    encode_date(key.date),
    key.program.clone(),
    key.start_time.clone(),
    key.instructor.clone(),
  ]
}

fn upsert_base(
  conn: &rusqlite::Connection,
  rows: &[ScheduleEntry],
  actor: &str,
  now: &str,
) -> rusqlite::Result<usize> {
  let mut stmt = conn.prepare_cached(UPSERT_BASE)?;
  for e in rows {
    stmt.execute(rusqlite::params![
      encode_date(e.date),
      e.program,
      e.start_time,
      e.instructor,
      e.end_time,
      e.shift,
      e.branch,
      e.code,
      e.minutes,
      e.units,
      actor,
      now,
    ])?;
  }
  Ok(rows.len())
}

fn upsert_with_incidence(
  conn: &rusqlite::Connection,
  rows: &[ScheduleEntry],
  actor: &str,
  now: &str,
) -> rusqlite::Result<usize> {
  let mut stmt = conn.prepare_cached(UPSERT_WITH_INCIDENCE)?;
  for e in rows {
    let i = &e.incidence;
    stmt.execute(rusqlite::params![
      encode_date(e.date),
      e.program,
      e.start_time,
      e.instructor,
      e.end_time,
      e.shift,
      e.branch,
      e.code,
      e.minutes,
      e.units,
      i.status,
      i.substitute,
      i.kind,
      i.subtype,
      i.description,
      i.department,
      i.feedback,
      actor,
      now,
    ])?;
  }
  Ok(rows.len())
}

fn query_entries(
  conn: &rusqlite::Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawEntryRow>> {
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map(params, RawEntryRow::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rota schedule store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every stored row for `date`, incidence included, ordered by start time.
  pub async fn entries_for(&self, date: NaiveDate) -> Result<Vec<ScheduleEntry>> {
    let date_str = encode_date(date);
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ENTRY_COLUMNS} FROM schedule_entries
           WHERE schedule_date = ?1
           ORDER BY start_time, program, instructor"
        );
        Ok(query_entries(conn, &sql, rusqlite::params![date_str])?)
      })
      .await?;
    raws.into_iter().map(RawEntryRow::into_entry).collect()
  }
}

// ─── ScheduleStore impl ──────────────────────────────────────────────────────

impl ScheduleStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn publish_entries(
    &self,
    entries: Vec<ScheduleEntry>,
    actor: &str,
  ) -> Result<WriteSummary> {
    let batch = PreparedBatch::new(entries);
    let duplicates_skipped = batch.duplicates_skipped;
    let rows = batch.rows;
    let actor = actor.to_owned();
    let now = encode_dt(Utc::now());

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = upsert_base(&tx, &rows, &actor, &now)?;
        tx.commit()?;
        Ok(n)
      })
      .await?;

    Ok(WriteSummary {
      upserted_count: written,
      duplicates_skipped,
      base_only: written,
      with_incidence: 0,
    })
  }

  async fn import_entries(
    &self,
    entries: Vec<ScheduleEntry>,
    actor: &str,
  ) -> Result<WriteSummary> {
    let parts = PreparedBatch::new(entries).partition();
    let duplicates_skipped = parts.duplicates_skipped;
    let (base_rows, incidence_rows) = (parts.base_only, parts.with_incidence);
    let actor = actor.to_owned();
    let now = encode_dt(Utc::now());

    // Two independent upserts, each with a uniform column set.
    let (base_only, with_incidence) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let base_only = upsert_base(&tx, &base_rows, &actor, &now)?;
        tx.commit()?;

        let tx = conn.transaction()?;
        let with_incidence =
          upsert_with_incidence(&tx, &incidence_rows, &actor, &now)?;
        tx.commit()?;

        Ok((base_only, with_incidence))
      })
      .await?;

    tracing::info!(base_only, with_incidence, duplicates_skipped, "import written");

    Ok(WriteSummary {
      upserted_count: base_only + with_incidence,
      duplicates_skipped,
      base_only,
      with_incidence,
    })
  }

  async fn update_incidence(&self, key: &SlotKey, changes: Incidence) -> Result<bool> {
    // Blank values would make the row count as incidence-bearing.
    let changes = changes.normalized();
    let mut params: Vec<String> = key_params(key).into();
    let mut assignments: Vec<String> = vec![];
    for (column, value) in INCIDENCE_COLUMNS.iter().zip(changes.values()) {
      if let Some(v) = value {
        params.push(v.to_owned());
        assignments.push(format!("{column} = ?{}", params.len()));
      }
    }

    let sql = if assignments.is_empty() {
      format!("SELECT COUNT(*) FROM schedule_entries WHERE {KEY_MATCH}")
    } else {
      params.push(encode_dt(Utc::now()));
      assignments.push(format!("incidence_updated_at = ?{}", params.len()));
      format!(
        "UPDATE schedule_entries SET {} WHERE {KEY_MATCH}",
        assignments.join(", ")
      )
    };
    let is_update = !assignments.is_empty();

    let affected = self
      .conn
      .call(move |conn| {
        let params = rusqlite::params_from_iter(params.iter());
        let n = if is_update {
          conn.execute(&sql, params)?
        } else {
          conn.query_row(&sql, params, |r| r.get::<_, i64>(0))? as usize
        };
        Ok(n)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn delete_entry(&self, key: &SlotKey) -> Result<bool> {
    let params = key_params(key);
    let n = self
      .conn
      .call(move |conn| {
        let sql = format!("DELETE FROM schedule_entries WHERE {KEY_MATCH}");
        Ok(conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn delete_entries(&self, keys: Vec<SlotKey>) -> Result<usize> {
    let keys: Vec<[String; 4]> = keys.iter().map(key_params).collect();
    let n = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
          let sql = format!("DELETE FROM schedule_entries WHERE {KEY_MATCH}");
          let mut stmt = tx.prepare(&sql)?;
          for key in &keys {
            deleted += stmt.execute(rusqlite::params_from_iter(key.iter()))?;
          }
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;
    Ok(n)
  }

  async fn publish_date(
    &self,
    date: NaiveDate,
    entries: Vec<ScheduleEntry>,
    actor: &str,
    overwrite: bool,
  ) -> Result<PublishWrite> {
    let batch = PreparedBatch::new(entries);
    let duplicates_skipped = batch.duplicates_skipped;
    let rows = batch.rows;
    let actor = actor.to_owned();
    let now = Utc::now();
    let now_str = encode_dt(now);
    let date_str = encode_date(date);
    let new_id = encode_uuid(Uuid::new_v4());

    let (raw, written) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing = tx
          .query_row(
            &format!("SELECT {POINTER_COLUMNS} FROM published_versions WHERE schedule_date = ?1"),
            rusqlite::params![date_str],
            RawPointer::from_row,
          )
          .optional()?;

        if let Some(existing) = existing
          && !overwrite
        {
          // Dropping `tx` rolls back; nothing was written.
          return Ok((existing, None));
        }

        let written = upsert_base(&tx, &rows, &actor, &now_str)?;
        let pointer = tx.query_row(
          UPSERT_POINTER,
          rusqlite::params![new_id, date_str, now_str, written as i64, actor],
          RawPointer::from_row,
        )?;
        tx.commit()?;
        Ok((pointer, Some(written)))
      })
      .await?;

    let pointer: PublishedVersionPointer = raw.into_pointer()?;
    Ok(match written {
      None => PublishWrite::Exists { pointer },
      Some(written) => PublishWrite::Written {
        pointer,
        summary: WriteSummary {
          upserted_count: written,
          duplicates_skipped,
          base_only: written,
          with_incidence: 0,
        },
      },
    })
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn day_snapshot(&self, date: NaiveDate) -> Result<DaySnapshot> {
    let date_str = encode_date(date);
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ENTRY_COLUMNS} FROM schedule_entries
           WHERE schedule_date = ?1
           ORDER BY start_time, program, instructor"
        );
        Ok(query_entries(conn, &sql, rusqlite::params![date_str])?)
      })
      .await?;

    let mut snapshot = DaySnapshot::default();
    for raw in raws {
      let (base, over) = raw.into_parts()?;
      snapshot.base.push(base);
      snapshot.overrides.extend(over);
    }
    Ok(snapshot)
  }

  async fn incidence_log(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<Vec<ScheduleEntry>> {
    let (from_str, to_str) = (encode_date(from), encode_date(to));
    let raws = self
      .conn
      .call(move |conn| {
        let any_incidence = INCIDENCE_COLUMNS
          .iter()
          .map(|c| format!("{c} IS NOT NULL"))
          .collect::<Vec<_>>()
          .join(" OR ");
        let sql = format!(
          "SELECT {ENTRY_COLUMNS} FROM schedule_entries
           WHERE schedule_date BETWEEN ?1 AND ?2 AND ({any_incidence})
           ORDER BY schedule_date, start_time, program"
        );
        Ok(query_entries(conn, &sql, rusqlite::params![from_str, to_str])?)
      })
      .await?;
    raws.into_iter().map(RawEntryRow::into_entry).collect()
  }

  async fn get_pointer(&self, date: NaiveDate) -> Result<Option<PublishedVersionPointer>> {
    let date_str = encode_date(date);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {POINTER_COLUMNS} FROM published_versions WHERE schedule_date = ?1"),
            rusqlite::params![date_str],
            RawPointer::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawPointer::into_pointer).transpose()
  }

  async fn latest_pointer(&self) -> Result<Option<PublishedVersionPointer>> {
    let raw = self
      .conn
      .call(|conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {POINTER_COLUMNS} FROM published_versions
               ORDER BY updated_at DESC, id DESC LIMIT 1"
            ),
            [],
            RawPointer::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawPointer::into_pointer).transpose()
  }
}
