//! Column layouts for the daily sheet and the incidence log.

use rota_core::{entry::ScheduleEntry, normalize::normalize_date};
use serde_json::{Value, json};

use crate::api::{CellKind, KeySpec};

/// A spreadsheet column and the entry field it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Date,
  Program,
  Start,
  End,
  Instructor,
  Shift,
  Branch,
  Code,
  Minutes,
  Units,
  Status,
  Substitute,
  Type,
  Subtype,
  Description,
  Department,
  Feedback,
}

impl Field {
  pub fn header(self) -> &'static str {
    match self {
      Field::Date => "Date",
      Field::Program => "Program",
      Field::Start => "Start",
      Field::End => "End",
      Field::Instructor => "Instructor",
      Field::Shift => "Shift",
      Field::Branch => "Branch",
      Field::Code => "Code",
      Field::Minutes => "Minutes",
      Field::Units => "Units",
      Field::Status => "Status",
      Field::Substitute => "Substitute",
      Field::Type => "Type",
      Field::Subtype => "Subtype",
      Field::Description => "Description",
      Field::Department => "Department",
      Field::Feedback => "Feedback",
    }
  }

  fn kind(self) -> CellKind {
    match self {
      Field::Date => CellKind::Date,
      Field::Start | Field::End => CellKind::Time,
      _ => CellKind::Text,
    }
  }

  fn cell(self, e: &ScheduleEntry) -> Value {
    let text = |v: &Option<String>| v.as_deref().map_or(Value::Null, |s| json!(s));
    let i = &e.incidence;
    match self {
      Field::Date => json!(normalize_date(e.date)),
      Field::Program => json!(e.program),
      Field::Start => json!(e.start_time),
      Field::End => json!(e.end_time),
      Field::Instructor => json!(e.instructor),
      Field::Shift => text(&e.shift),
      Field::Branch => text(&e.branch),
      Field::Code => text(&e.code),
      Field::Minutes => e.minutes.map_or(Value::Null, |m| json!(m)),
      Field::Units => e.units.map_or(Value::Null, |u| json!(u)),
      Field::Status => text(&i.status),
      Field::Substitute => text(&i.substitute),
      Field::Type => text(&i.kind),
      Field::Subtype => text(&i.subtype),
      Field::Description => text(&i.description),
      Field::Department => text(&i.department),
      Field::Feedback => text(&i.feedback),
    }
  }
}

/// Which columns a sheet shows and which of them identify a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
  pub columns: Vec<Field>,
  pub key:     Vec<Field>,
}

impl SheetLayout {
  /// One day's effective schedule, matched on the store's natural key.
  pub fn daily() -> Self {
    use Field::*;
    Self {
      columns: vec![
        Date, Program, Start, End, Instructor, Shift, Branch, Code, Minutes,
        Units, Status, Substitute, Type, Subtype, Description, Department,
        Feedback,
      ],
      key: vec![Date, Program, Start, Instructor],
    }
  }

  /// The running incidence log. Start time and instructor can change
  /// between writes of the same incidence, so only (date, program) match.
  pub fn incidence_log() -> Self {
    use Field::*;
    Self {
      columns: vec![
        Date, Program, Start, End, Instructor, Branch, Status, Substitute,
        Type, Subtype, Description, Department, Feedback,
      ],
      key: vec![Date, Program],
    }
  }

  pub fn headers(&self) -> Vec<Value> {
    self.columns.iter().map(|f| json!(f.header())).collect()
  }

  pub fn row(&self, entry: &ScheduleEntry) -> Vec<Value> {
    self.columns.iter().map(|f| f.cell(entry)).collect()
  }

  pub fn key_spec(&self) -> KeySpec {
    KeySpec {
      columns: self
        .key
        .iter()
        .filter_map(|k| {
          self.columns.iter().position(|c| c == k).map(|i| (i, k.kind()))
        })
        .collect(),
    }
  }

  /// `A1:<last column><rows>` for a block of `rows` rows at the anchor.
  pub fn range_address(&self, rows: usize) -> String {
    format!("A1:{}{}", column_letter(self.columns.len().saturating_sub(1)), rows.max(1))
  }
}

/// Zero-based column index to spreadsheet letters (0 → A, 26 → AA).
pub fn column_letter(mut index: usize) -> String {
  let mut letters = vec![];
  loop {
    letters.push(b'A' + (index % 26) as u8);
    if index < 26 {
      break;
    }
    index = index / 26 - 1;
  }
  letters.reverse();
  String::from_utf8(letters).unwrap_or_default()
}
