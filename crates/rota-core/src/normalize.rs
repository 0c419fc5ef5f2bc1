//! Slot identity: text/time canonicalisation and the composite natural key.
//!
//! Every comparison between a draft row, a stored row, and a spreadsheet row
//! goes through these functions. The composite key layout backs the store's
//! unique constraint, so its field order and separator are fixed forever.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel stored in place of a missing instructor.
pub const NO_INSTRUCTOR: &str = "none";

const KEY_SEPARATOR: char = '|';
const KEY_ESCAPE: char = '\\';
const MINUTES_PER_DAY: u32 = 24 * 60;

// ─── Text ────────────────────────────────────────────────────────────────────

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_text(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalised instructor, with blanks (and any casing of the sentinel)
/// folded into [`NO_INSTRUCTOR`].
pub fn normalize_instructor(s: &str) -> String {
  let text = normalize_text(s);
  if text.is_empty() || text.eq_ignore_ascii_case(NO_INSTRUCTOR) {
    NO_INSTRUCTOR.to_owned()
  } else {
    text
  }
}

pub fn normalize_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// Canonicalise a time-of-day to zero-padded `HH:MM`.
///
/// Accepts `H:MM`, `HH:MM`, anything with trailing seconds or an `am`/`pm`
/// suffix, and fractional-day serials as written by spreadsheets (`0.5` is
/// noon; any integer day part is ignored). Input that is none of these is
/// returned whitespace-normalised but otherwise unchanged.
pub fn normalize_time(raw: &str) -> String {
  let text = normalize_text(raw);
  match parse_minutes(&text) {
    Some(minutes) => format_minutes(minutes),
    None => text,
  }
}

/// Canonicalise a numeric fractional-day serial. `None` for negative or
/// non-finite values.
pub fn normalize_time_serial(serial: f64) -> Option<String> {
  serial_to_minutes(serial).map(format_minutes)
}

/// Minutes since midnight, if `raw` is a recognisable time.
pub fn time_to_minutes(raw: &str) -> Option<u32> {
  parse_minutes(&normalize_text(raw))
}

pub fn format_minutes(minutes: u32) -> String {
  let minutes = minutes % MINUTES_PER_DAY;
  format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn parse_minutes(text: &str) -> Option<u32> {
  match text.split_once(':') {
    Some((hour, rest)) => parse_clock(hour, rest),
    None => text.parse::<f64>().ok().and_then(serial_to_minutes),
  }
}

fn parse_clock(hour: &str, rest: &str) -> Option<u32> {
  if hour.is_empty() || hour.len() > 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let minute = rest.get(..2)?;
  if !minute.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }

  let mut hour: u32 = hour.parse().ok()?;
  let minute: u32 = minute.parse().ok()?;

  let suffix = rest.trim_end().to_ascii_lowercase();
  if suffix.ends_with("pm") && hour < 12 {
    hour += 12;
  } else if suffix.ends_with("am") && hour == 12 {
    hour = 0;
  }

  (hour < 24 && minute < 60).then_some(hour * 60 + minute)
}

fn serial_to_minutes(serial: f64) -> Option<u32> {
  if !serial.is_finite() || serial < 0.0 {
    return None;
  }
  let minutes = (serial.fract() * f64::from(MINUTES_PER_DAY)).round() as u32;
  Some(minutes % MINUTES_PER_DAY)
}

// ─── Keys ────────────────────────────────────────────────────────────────────

/// The flattened natural key of a slot:
/// `date | start_time | instructor | program`, every part normalised.
///
/// Separator and escape characters inside a part are backslash-escaped, so
/// two keys are equal exactly when their four parts are.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CompositeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The (date, program, start_time, instructor) tuple, normalised.
///
/// Construct only through [`SlotKey::new`] so the parts are always canonical;
/// the store matches rows on exactly these four values.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SlotKey {
  pub date:       NaiveDate,
  pub start_time: String,
  pub instructor: String,
  pub program:    String,
}

impl SlotKey {
  pub fn new(
    date: NaiveDate,
    start_time: &str,
    instructor: &str,
    program: &str,
  ) -> Self {
    Self {
      date,
      start_time: normalize_time(start_time),
      instructor: normalize_instructor(instructor),
      program: normalize_text(program),
    }
  }

  pub fn composite(&self) -> CompositeKey {
    let mut key = normalize_date(self.date);
    for part in [&self.start_time, &self.instructor, &self.program] {
      key.push(KEY_SEPARATOR);
      for c in part.chars() {
        if c == KEY_SEPARATOR || c == KEY_ESCAPE {
          key.push(KEY_ESCAPE);
        }
        key.push(c);
      }
    }
    CompositeKey(key)
  }
}

impl fmt::Display for SlotKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.composite().fmt(f)
  }
}

/// Anything that occupies a schedule slot.
pub trait Slot {
  fn slot_key(&self) -> SlotKey;

  fn composite_key(&self) -> CompositeKey { self.slot_key().composite() }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 15).unwrap() }

  #[test]
  fn text_collapses_whitespace() {
    assert_eq!(normalize_text("  Math   101 \t A "), "Math 101 A");
  }

  #[test]
  fn time_pads_and_truncates() {
    assert_eq!(normalize_time("8:00"), "08:00");
    assert_eq!(normalize_time("08:00:00"), "08:00");
    assert_eq!(normalize_time(" 14:30 "), "14:30");
    assert_eq!(normalize_time("2:15 pm"), "14:15");
    assert_eq!(normalize_time("12:05 AM"), "00:05");
  }

  #[test]
  fn time_accepts_fractional_day_serials() {
    assert_eq!(normalize_time("0.5"), "12:00");
    assert_eq!(normalize_time("0.3333333"), "08:00");
    assert_eq!(normalize_time("45458.75"), "18:00");
    assert_eq!(normalize_time_serial(0.25).as_deref(), Some("06:00"));
    assert_eq!(normalize_time_serial(-1.0), None);
  }

  #[test]
  fn unrecognised_time_is_returned_unchanged() {
    assert_eq!(normalize_time("morning"), "morning");
    assert_eq!(normalize_time("25:00"), "25:00");
    assert_eq!(normalize_time("8:5"), "8:5");
  }

  #[test]
  fn normalization_is_idempotent() {
    for input in ["8:00", " 0.5", "morning  shift", "23:59:59", "7:30pm", ""] {
      let once = normalize_time(input);
      assert_eq!(normalize_time(&once), once, "time {input:?}");
      let once = normalize_text(input);
      assert_eq!(normalize_text(&once), once, "text {input:?}");
    }
    let once = normalize_instructor("  ");
    assert_eq!(normalize_instructor(&once), once);
  }

  #[test]
  fn key_ignores_padding_and_spacing() {
    let a = SlotKey::new(date(), "8:00", "Ana   Ruiz", " Algebra  I");
    let b = SlotKey::new(date(), "08:00", "Ana Ruiz", "Algebra I");
    assert_eq!(a.composite(), b.composite());
    assert_eq!(a.composite().as_str(), "2024-06-15|08:00|Ana Ruiz|Algebra I");
  }

  #[test]
  fn separators_inside_parts_keep_keys_distinct() {
    let a = SlotKey::new(date(), "08:00", "x|y", "z");
    let b = SlotKey::new(date(), "08:00", "x", "y|z");
    assert_ne!(a.composite(), b.composite());
    assert_eq!(a.composite().as_str(), r"2024-06-15|08:00|x\|y|z");

    let c = SlotKey::new(date(), "08:00", r"x\", "y");
    let d = SlotKey::new(date(), "08:00", "x", r"\y");
    assert_ne!(c.composite(), d.composite());
  }

  #[test]
  fn missing_instructor_uses_sentinel() {
    let key = SlotKey::new(date(), "09:00", "", "Chemistry");
    assert_eq!(key.instructor, NO_INSTRUCTOR);
    assert_eq!(SlotKey::new(date(), "09:00", "NONE", "Chemistry"), key);
  }
}
