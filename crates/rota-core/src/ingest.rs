//! Validation of loosely-typed rows into strict [`ScheduleEntry`] values.
//!
//! Rows arrive from spreadsheets and JSON files with times as text or
//! fractional-day serials and dates as ISO strings or day serials. Each row
//! is validated on its own; a bad row is reported with per-field messages and
//! the rest of the batch proceeds.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  batch::WriteSummary,
  entry::{Incidence, ScheduleEntry},
  normalize::{
    format_minutes, normalize_instructor, normalize_text, normalize_time_serial,
    time_to_minutes,
  },
  store::ScheduleStore,
};

/// A spreadsheet-ish cell: either a number or some text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawCell {
  Number(f64),
  Text(String),
}

impl RawCell {
  /// The cell as text. Integral numbers render without a fraction, so a
  /// course code typed as `101` reads back as `"101"`.
  pub fn into_text(self) -> String {
    match self {
      Self::Number(n) => n.to_string(),
      Self::Text(t) => t,
    }
  }
}

fn text(cell: Option<RawCell>) -> Option<String> { cell.map(RawCell::into_text) }

/// A row as it arrives from an import source; nothing is trusted yet.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawScheduleRow {
  pub date:        Option<RawCell>,
  pub program:     Option<RawCell>,
  pub start_time:  Option<RawCell>,
  pub end_time:    Option<RawCell>,
  pub instructor:  Option<RawCell>,
  pub shift:       Option<RawCell>,
  pub branch:      Option<RawCell>,
  pub code:        Option<RawCell>,
  pub minutes:     Option<RawCell>,
  pub units:       Option<RawCell>,
  pub status:      Option<RawCell>,
  pub substitute:  Option<RawCell>,
  #[serde(rename = "type")]
  pub kind:        Option<RawCell>,
  pub subtype:     Option<RawCell>,
  pub description: Option<RawCell>,
  pub department:  Option<RawCell>,
  pub feedback:    Option<RawCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   &'static str,
  pub message: String,
}

/// A rejected row, by its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
  pub index:  usize,
  pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Default)]
pub struct Validated {
  pub entries:  Vec<ScheduleEntry>,
  pub rejected: Vec<RowError>,
}

impl Validated {
  fn push(&mut self, index: usize, row: Result<ScheduleEntry, Vec<FieldError>>) {
    match row {
      Ok(entry) => self.entries.push(entry),
      Err(errors) => {
        tracing::warn!(index, ?errors, "rejecting import row");
        self.rejected.push(RowError { index, errors });
      }
    }
  }
}

/// Validate every row, segregating the invalid ones.
pub fn validate_rows(rows: Vec<RawScheduleRow>) -> Validated {
  let mut out = Validated::default();
  for (index, row) in rows.into_iter().enumerate() {
    out.push(index, validate_row(row));
  }
  out
}

/// [`validate_rows`] over untyped JSON values. Each value is deserialised
/// on its own, so a row of the wrong shape is rejected at its index instead
/// of failing the batch.
pub fn validate_values(values: Vec<Value>) -> Validated {
  let mut out = Validated::default();
  for (index, value) in values.into_iter().enumerate() {
    let row = serde_json::from_value::<RawScheduleRow>(value)
      .map_err(|e| vec![FieldError { field: "row", message: e.to_string() }])
      .and_then(validate_row);
    out.push(index, row);
  }
  out
}

/// Outcome of [`import_rows`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
  pub summary:  WriteSummary,
  pub rejected: Vec<RowError>,
}

/// Validate `rows` and write the valid ones through
/// [`ScheduleStore::import_entries`]. Rejected rows are returned, not
/// raised.
pub async fn import_rows<S: ScheduleStore>(
  store: &S,
  rows: Vec<RawScheduleRow>,
  actor: &str,
) -> Result<ImportReport> {
  import_validated(store, validate_rows(rows), actor).await
}

/// [`import_rows`] over untyped JSON values; see [`validate_values`].
pub async fn import_values<S: ScheduleStore>(
  store: &S,
  values: Vec<Value>,
  actor: &str,
) -> Result<ImportReport> {
  import_validated(store, validate_values(values), actor).await
}

async fn import_validated<S: ScheduleStore>(
  store: &S,
  Validated { entries, rejected }: Validated,
  actor: &str,
) -> Result<ImportReport> {
  let summary = if entries.is_empty() {
    WriteSummary::default()
  } else {
    store.import_entries(entries, actor).await.map_err(Error::store)?
  };
  Ok(ImportReport { summary, rejected })
}

pub fn validate_row(row: RawScheduleRow) -> Result<ScheduleEntry, Vec<FieldError>> {
  let mut errors = vec![];
  let mut fail = |field: &'static str, message: String| {
    errors.push(FieldError { field, message });
  };

  let date = match row.date.as_ref().map(parse_date) {
    Some(Ok(d)) => Some(d),
    Some(Err(msg)) => {
      fail("date", msg);
      None
    }
    None => {
      fail("date", "missing".into());
      None
    }
  };

  let program = normalize_text(&text(row.program).unwrap_or_default());
  if program.is_empty() {
    fail("program", "missing".into());
  }

  let start = parse_time_field("start_time", row.start_time.as_ref(), &mut fail);
  let end = parse_time_field("end_time", row.end_time.as_ref(), &mut fail);
  if let (Some(s), Some(e)) = (start, end)
    && e <= s
  {
    fail("end_time", format!("{} is not after {}", format_minutes(e), format_minutes(s)));
  }

  let minutes = match row.minutes.as_ref().map(parse_count) {
    Some(Ok(m)) => Some(m as u32),
    Some(Err(msg)) => {
      fail("minutes", msg);
      None
    }
    None => None,
  };
  let units = match row.units.as_ref().map(parse_count) {
    Some(Ok(u)) => Some(u),
    Some(Err(msg)) => {
      fail("units", msg);
      None
    }
    None => None,
  };

  let (Some(date), Some(start), Some(end)) = (date, start, end) else {
    return Err(errors);
  };
  if !errors.is_empty() {
    return Err(errors);
  }

  let entry = ScheduleEntry {
    date,
    program,
    start_time: format_minutes(start),
    end_time: format_minutes(end),
    instructor: normalize_instructor(&text(row.instructor).unwrap_or_default()),
    shift: text(row.shift),
    branch: text(row.branch),
    code: text(row.code),
    minutes: minutes.or(Some(end - start)),
    units,
    incidence: Incidence {
      status:      text(row.status),
      substitute:  text(row.substitute),
      kind:        text(row.kind),
      subtype:     text(row.subtype),
      description: text(row.description),
      department:  text(row.department),
      feedback:    text(row.feedback),
    },
  };
  Ok(entry.normalized())
}

fn parse_time_field(
  field: &'static str,
  cell: Option<&RawCell>,
  fail: &mut impl FnMut(&'static str, String),
) -> Option<u32> {
  let parsed = match cell {
    None => {
      fail(field, "missing".into());
      return None;
    }
    Some(RawCell::Number(n)) => normalize_time_serial(*n).and_then(|t| time_to_minutes(&t)),
    Some(RawCell::Text(t)) => time_to_minutes(t),
  };
  if parsed.is_none() {
    fail(field, format!("unrecognised time {cell:?}"));
  }
  parsed
}

/// Days are counted from the spreadsheet epoch, 1899-12-30.
fn parse_date(cell: &RawCell) -> Result<NaiveDate, String> {
  let serial = match cell {
    RawCell::Number(n) => *n,
    RawCell::Text(t) => {
      let t = t.trim();
      for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
          return Ok(d);
        }
      }
      t.parse::<f64>().map_err(|_| format!("unrecognised date {t:?}"))?
    }
  };
  if !serial.is_finite() || serial < 1.0 {
    return Err(format!("invalid date serial {serial}"));
  }
  NaiveDate::from_ymd_opt(1899, 12, 30)
    .and_then(|epoch| epoch.checked_add_days(Days::new(serial.trunc() as u64)))
    .ok_or_else(|| format!("date serial {serial} out of range"))
}

fn parse_count(cell: &RawCell) -> Result<f64, String> {
  let n = match cell {
    RawCell::Number(n) => *n,
    RawCell::Text(t) => t
      .trim()
      .parse::<f64>()
      .map_err(|_| format!("not a number: {t:?}"))?,
  };
  if n.is_finite() && n >= 0.0 {
    Ok(n)
  } else {
    Err(format!("must be a non-negative number, got {n}"))
  }
}
