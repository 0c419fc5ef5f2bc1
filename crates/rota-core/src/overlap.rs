//! Instructor double-bookings and duplicate class claims within a day.
//!
//! Entries are grouped first and only compared pairwise inside a group. A
//! group is bounded by one instructor's (or one class slot's) daily load, so
//! the quadratic inner loop stays small.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  entry::ScheduleEntry,
  normalize::{
    CompositeKey, NO_INSTRUCTOR, Slot, normalize_instructor, normalize_text,
    normalize_time, time_to_minutes,
  },
};

/// Composite keys of every entry involved in an overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlapReport {
  /// Entries sharing an instructor whose `[start, end)` intervals intersect.
  pub time_conflicts:   BTreeSet<CompositeKey>,
  /// Entries sharing (date, start, end, program) claimed by two or more
  /// distinct instructors.
  pub duplicate_classes: BTreeSet<CompositeKey>,
  pub all_overlaps:     BTreeSet<CompositeKey>,
}

impl OverlapReport {
  pub fn overlap_count(&self) -> usize { self.all_overlaps.len() }

  pub fn is_clean(&self) -> bool { self.all_overlaps.is_empty() }
}

struct Timed<'a> {
  key:   CompositeKey,
  start: u32,
  end:   u32,
  entry: &'a ScheduleEntry,
}

/// Scan a day's entries for time conflicts and duplicate class claims.
///
/// Entries whose times cannot be parsed never take part in a time conflict.
/// Unassigned entries (the `none` instructor) are not one person, so they
/// are never grouped as a double-booking. Two entries for the same
/// instructor in the identical slot do conflict, since interval overlap is
/// reflexive.
pub fn detect_overlaps(entries: &[ScheduleEntry]) -> OverlapReport {
  let mut by_instructor: HashMap<(NaiveDate, String), Vec<Timed<'_>>> =
    HashMap::new();
  let mut by_class: HashMap<(NaiveDate, String, String, String), Vec<&ScheduleEntry>> =
    HashMap::new();

  for entry in entries {
    let instructor = normalize_instructor(&entry.instructor);

    if instructor != NO_INSTRUCTOR
      && let (Some(start), Some(end)) =
        (time_to_minutes(&entry.start_time), time_to_minutes(&entry.end_time))
    {
      by_instructor
        .entry((entry.date, instructor))
        .or_default()
        .push(Timed { key: entry.composite_key(), start, end, entry });
    }

    by_class
      .entry((
        entry.date,
        normalize_time(&entry.start_time),
        normalize_time(&entry.end_time),
        normalize_text(&entry.program),
      ))
      .or_default()
      .push(entry);
  }

  let mut report = OverlapReport::default();

  for group in by_instructor.values() {
    for (i, a) in group.iter().enumerate() {
      for b in &group[i + 1..] {
        if a.start < b.end && b.start < a.end {
          tracing::debug!(
            first = %a.key,
            second = %b.key,
            instructor = %a.entry.instructor,
            "instructor double-booked"
          );
          report.time_conflicts.insert(a.key.clone());
          report.time_conflicts.insert(b.key.clone());
        }
      }
    }
  }

  for group in by_class.values().filter(|g| g.len() > 1) {
    let instructors: BTreeSet<String> = group
      .iter()
      .map(|e| normalize_instructor(&e.instructor))
      .collect();
    if instructors.len() > 1 {
      report
        .duplicate_classes
        .extend(group.iter().map(|e| e.composite_key()));
    }
  }

  report.all_overlaps = report
    .time_conflicts
    .union(&report.duplicate_classes)
    .cloned()
    .collect();
  report
}
