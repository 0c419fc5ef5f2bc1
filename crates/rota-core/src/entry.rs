//! Schedule entries, incidence overrides, and the published version pointer.
//!
//! A [`ScheduleEntry`] is what was planned for a slot. An [`Incidence`] is
//! what actually happened. Both live on the same store row, but they are
//! written by different operations and must never clobber each other.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::{
  Slot, SlotKey, normalize_instructor, normalize_text, normalize_time,
};

// ─── Incidence ───────────────────────────────────────────────────────────────

/// Operational fields recorded against a slot. Every field is optional;
/// `None` means "not supplied", not "cleared".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incidence {
  /// Whether the class was taught.
  pub status:      Option<String>,
  pub substitute:  Option<String>,
  #[serde(rename = "type")]
  pub kind:        Option<String>,
  pub subtype:     Option<String>,
  pub description: Option<String>,
  pub department:  Option<String>,
  pub feedback:    Option<String>,
}

impl Incidence {
  /// Column names in the order the store and spreadsheet emit them.
  pub const FIELDS: [&'static str; 7] = [
    "status",
    "substitute",
    "type",
    "subtype",
    "description",
    "department",
    "feedback",
  ];

  pub fn is_empty(&self) -> bool { self.values().iter().all(Option::is_none) }

  /// Field values aligned with [`Incidence::FIELDS`].
  pub fn values(&self) -> [Option<&str>; 7] {
    [
      self.status.as_deref(),
      self.substitute.as_deref(),
      self.kind.as_deref(),
      self.subtype.as_deref(),
      self.description.as_deref(),
      self.department.as_deref(),
      self.feedback.as_deref(),
    ]
  }

  /// Layer `over` on top of `self`; each field of `over` that is set wins.
  pub fn overlay(&self, over: &Incidence) -> Incidence {
    fn pick(base: &Option<String>, over: &Option<String>) -> Option<String> {
      over.clone().or_else(|| base.clone())
    }
    Incidence {
      status:      pick(&self.status, &over.status),
      substitute:  pick(&self.substitute, &over.substitute),
      kind:        pick(&self.kind, &over.kind),
      subtype:     pick(&self.subtype, &over.subtype),
      description: pick(&self.description, &over.description),
      department:  pick(&self.department, &over.department),
      feedback:    pick(&self.feedback, &over.feedback),
    }
  }

  /// Trim every field and drop the ones left blank.
  pub fn normalized(self) -> Incidence {
    fn clean(v: Option<String>) -> Option<String> {
      v.map(|s| normalize_text(&s)).filter(|s| !s.is_empty())
    }
    Incidence {
      status:      clean(self.status),
      substitute:  clean(self.substitute),
      kind:        clean(self.kind),
      subtype:     clean(self.subtype),
      description: clean(self.description),
      department:  clean(self.department),
      feedback:    clean(self.feedback),
    }
  }
}

// ─── Schedule entry ──────────────────────────────────────────────────────────

/// A planned class slot, optionally carrying incidence data (imports and
/// effective views do; drafts usually do not).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  pub date:       NaiveDate,
  pub program:    String,
  /// `HH:MM`
  pub start_time: String,
  /// `HH:MM`
  pub end_time:   String,
  pub instructor: String,
  #[serde(default)]
  pub shift:      Option<String>,
  #[serde(default)]
  pub branch:     Option<String>,
  #[serde(default)]
  pub code:       Option<String>,
  #[serde(default)]
  pub minutes:    Option<u32>,
  #[serde(default)]
  pub units:      Option<f64>,
  #[serde(default, skip_serializing_if = "Incidence::is_empty")]
  pub incidence:  Incidence,
}

impl ScheduleEntry {
  pub fn new(
    date: NaiveDate,
    program: impl Into<String>,
    start_time: impl Into<String>,
    end_time: impl Into<String>,
    instructor: impl Into<String>,
  ) -> Self {
    Self {
      date,
      program: program.into(),
      start_time: start_time.into(),
      end_time: end_time.into(),
      instructor: instructor.into(),
      shift: None,
      branch: None,
      code: None,
      minutes: None,
      units: None,
      incidence: Incidence::default(),
    }
  }

  /// Canonicalise the key fields, times, and incidence text.
  pub fn normalized(self) -> Self {
    let clean = |v: Option<String>| {
      v.map(|s| normalize_text(&s)).filter(|s| !s.is_empty())
    };
    Self {
      date:       self.date,
      program:    normalize_text(&self.program),
      start_time: normalize_time(&self.start_time),
      end_time:   normalize_time(&self.end_time),
      instructor: normalize_instructor(&self.instructor),
      shift:      clean(self.shift),
      branch:     clean(self.branch),
      code:       clean(self.code),
      minutes:    self.minutes,
      units:      self.units,
      incidence:  self.incidence.normalized(),
    }
  }

  pub fn has_incidence(&self) -> bool { !self.incidence.is_empty() }
}

impl Slot for ScheduleEntry {
  fn slot_key(&self) -> SlotKey {
    SlotKey::new(self.date, &self.start_time, &self.instructor, &self.program)
  }
}

// ─── Incidence override ──────────────────────────────────────────────────────

/// An incidence addressed by slot identity; meaningless without a matching
/// scheduled entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceOverride {
  pub date:       NaiveDate,
  pub program:    String,
  pub start_time: String,
  pub instructor: String,
  #[serde(flatten)]
  pub incidence:  Incidence,
}

impl Slot for IncidenceOverride {
  fn slot_key(&self) -> SlotKey {
    SlotKey::new(self.date, &self.start_time, &self.instructor, &self.program)
  }
}

// ─── Version pointer ─────────────────────────────────────────────────────────

/// Marks that a date has been published. One per date; the id is stable
/// across republishes while `updated_at` advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedVersionPointer {
  pub id:            Uuid,
  pub schedule_date: NaiveDate,
  pub updated_at:    DateTime<Utc>,
  pub entries_count: u32,
  pub published_by:  String,
}
