//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD`. Timestamps are RFC 3339 with fixed
//! microsecond precision and a `Z` suffix, so lexical order is chronological.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rota_core::entry::{
  Incidence, IncidenceOverride, PublishedVersionPointer, ScheduleEntry,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawEntryRow::from_row`].
pub const ENTRY_COLUMNS: &str = "schedule_date, program, start_time, instructor,
  end_time, shift, branch, code, minutes, units,
  status, substitute, incidence_type, incidence_subtype,
  description, department, feedback";

/// Raw values read directly from a `schedule_entries` row.
pub struct RawEntryRow {
  pub schedule_date: String,
  pub program:       String,
  pub start_time:    String,
  pub instructor:    String,
  pub end_time:      String,
  pub shift:         Option<String>,
  pub branch:        Option<String>,
  pub code:          Option<String>,
  pub minutes:       Option<i64>,
  pub units:         Option<f64>,
  pub incidence:     Incidence,
}

impl RawEntryRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      schedule_date: row.get(0)?,
      program:       row.get(1)?,
      start_time:    row.get(2)?,
      instructor:    row.get(3)?,
      end_time:      row.get(4)?,
      shift:         row.get(5)?,
      branch:        row.get(6)?,
      code:          row.get(7)?,
      minutes:       row.get(8)?,
      units:         row.get(9)?,
      incidence:     Incidence {
        status:      row.get(10)?,
        substitute:  row.get(11)?,
        kind:        row.get(12)?,
        subtype:     row.get(13)?,
        description: row.get(14)?,
        department:  row.get(15)?,
        feedback:    row.get(16)?,
      },
    })
  }

  /// The full row, incidence included.
  pub fn into_entry(self) -> Result<ScheduleEntry> {
    let minutes = self
      .minutes
      .map(|m| {
        u32::try_from(m).map_err(|_| Error::InvalidColumn {
          column: "minutes",
          value:  m.to_string(),
        })
      })
      .transpose()?;

    Ok(ScheduleEntry {
      date: decode_date(&self.schedule_date)?,
      program: self.program,
      start_time: self.start_time,
      end_time: self.end_time,
      instructor: self.instructor,
      shift: self.shift,
      branch: self.branch,
      code: self.code,
      minutes,
      units: self.units,
      incidence: self.incidence,
    })
  }

  /// Split into the planned entry and, if any incidence column is set, the
  /// override recorded against it.
  pub fn into_parts(self) -> Result<(ScheduleEntry, Option<IncidenceOverride>)> {
    let mut base = self.into_entry()?;
    let incidence = std::mem::take(&mut base.incidence);
    let over = (!incidence.is_empty()).then(|| IncidenceOverride {
      date: base.date,
      program: base.program.clone(),
      start_time: base.start_time.clone(),
      instructor: base.instructor.clone(),
      incidence,
    });
    Ok((base, over))
  }
}

/// Column list matching [`RawPointer::from_row`].
pub const POINTER_COLUMNS: &str =
  "id, schedule_date, updated_at, entries_count, published_by";

/// Raw strings read directly from a `published_versions` row.
pub struct RawPointer {
  pub id:            String,
  pub schedule_date: String,
  pub updated_at:    String,
  pub entries_count: i64,
  pub published_by:  String,
}

impl RawPointer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      schedule_date: row.get(1)?,
      updated_at:    row.get(2)?,
      entries_count: row.get(3)?,
      published_by:  row.get(4)?,
    })
  }

  pub fn into_pointer(self) -> Result<PublishedVersionPointer> {
    Ok(PublishedVersionPointer {
      id:            decode_uuid(&self.id)?,
      schedule_date: decode_date(&self.schedule_date)?,
      updated_at:    decode_dt(&self.updated_at)?,
      entries_count: u32::try_from(self.entries_count).map_err(|_| {
        Error::InvalidColumn {
          column: "entries_count",
          value:  self.entries_count.to_string(),
        }
      })?,
      published_by:  self.published_by,
    })
  }
}
