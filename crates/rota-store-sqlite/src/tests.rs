//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use rota_core::{
  entry::{Incidence, ScheduleEntry},
  ingest::{RawCell, RawScheduleRow, import_rows, import_values},
  local::MemoryStorage,
  normalize::{Slot, SlotKey},
  store::{PublishWrite, ScheduleStore},
  version::{PublishOutcome, PublishRefusal, VersionTracker},
};

use serde_json::json;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 15).unwrap() }

fn entry(program: &str, start: &str, end: &str, instructor: &str) -> ScheduleEntry {
  ScheduleEntry::new(day(), program, start, end, instructor)
}

fn absence() -> Incidence {
  Incidence {
    status:      Some("not taught".into()),
    substitute:  Some("Luis".into()),
    kind:        Some("absence".into()),
    subtype:     Some("medical".into()),
    description: Some("called in sick".into()),
    department:  Some("Science".into()),
    feedback:    Some("notify parents".into()),
  }
}

// ─── Publish ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_normalises_keys_and_skips_duplicates() {
  let s = store().await;
  let summary = s
    .publish_entries(
      vec![
        entry("Algebra  I", "8:00", "10:00", "Ana"),
        entry("Algebra I", "08:00", "10:00", " Ana "),
        entry("Physics", "10:00", "11:00", ""),
      ],
      "admin",
    )
    .await
    .unwrap();

  assert_eq!(summary.upserted_count, 2);
  assert_eq!(summary.duplicates_skipped, 1);

  let rows = s.entries_for(day()).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].start_time, "08:00");
  assert_eq!(rows[0].program, "Algebra I");
  assert_eq!(rows[1].instructor, "none");
}

#[tokio::test]
async fn separator_bearing_names_are_separate_slots() {
  let s = store().await;
  let summary = s
    .publish_entries(
      vec![
        entry("z", "08:00", "09:00", "x|y"),
        entry("y|z", "08:00", "09:00", "x"),
      ],
      "admin",
    )
    .await
    .unwrap();

  assert_eq!(summary.upserted_count, 2);
  assert_eq!(summary.duplicates_skipped, 0);
  assert_eq!(s.entries_for(day()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn republish_preserves_incidence_columns() {
  let s = store().await;
  let mut with_incidence = entry("Algebra", "08:00", "10:00", "Ana");
  with_incidence.incidence = absence();
  s.import_entries(vec![with_incidence], "admin").await.unwrap();

  let mut replanned = entry("Algebra", "08:00", "10:30", "Ana");
  replanned.branch = Some("North".into());
  s.publish_entries(vec![replanned], "admin").await.unwrap();

  let rows = s.entries_for(day()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].end_time, "10:30");
  assert_eq!(rows[0].branch.as_deref(), Some("North"));
  assert_eq!(rows[0].incidence, absence());
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_import_does_not_cross_contaminate() {
  let s = store().await;

  // Both slots already carry incidence data.
  let mut a = entry("Algebra", "08:00", "10:00", "Ana");
  a.incidence = absence();
  let mut b = entry("Physics", "10:00", "12:00", "Ana");
  b.incidence = Incidence { kind: Some("late start".into()), ..Default::default() };
  s.import_entries(vec![a, b], "admin").await.unwrap();

  // Re-import: `a` carries a partial incidence, `b` carries none.
  let mut a2 = entry("Algebra", "08:00", "10:00", "Ana");
  a2.incidence = Incidence { status: Some("taught".into()), ..Default::default() };
  let b2 = entry("Physics", "10:00", "12:30", "Ana");
  let summary = s.import_entries(vec![a2, b2], "admin").await.unwrap();

  assert_eq!(summary.base_only, 1);
  assert_eq!(summary.with_incidence, 1);

  let rows = s.entries_for(day()).await.unwrap();
  let a_row = rows.iter().find(|r| r.program == "Algebra").unwrap();
  let b_row = rows.iter().find(|r| r.program == "Physics").unwrap();

  // The incidence-bearing row is written in full, never nulled by its
  // incidence-free neighbour.
  assert_eq!(a_row.incidence.status.as_deref(), Some("taught"));
  assert_eq!(a_row.incidence.kind, None);

  // The incidence-free row keeps what it had.
  assert_eq!(b_row.end_time, "12:30");
  assert_eq!(b_row.incidence.kind.as_deref(), Some("late start"));
}

#[tokio::test]
async fn import_counts_in_batch_duplicates() {
  let s = store().await;
  let summary = s
    .import_entries(
      vec![
        entry("Algebra", "08:00", "10:00", "Ana"),
        entry("Algebra", "8:00", "10:00", "Ana"),
      ],
      "admin",
    )
    .await
    .unwrap();

  assert_eq!(summary.upserted_count, 1);
  assert_eq!(summary.duplicates_skipped, 1);
}

#[tokio::test]
async fn import_rows_writes_valid_and_reports_rejected() {
  let s = store().await;
  let good = RawScheduleRow {
    date: Some(RawCell::Text("2024-06-15".into())),
    program: Some(RawCell::Text("Algebra".into())),
    start_time: Some(RawCell::Number(1.0 / 3.0)),
    end_time: Some(RawCell::Text("10:00".into())),
    instructor: Some(RawCell::Text("Ana".into())),
    status: Some(RawCell::Text("not taught".into())),
    ..Default::default()
  };
  let bad = RawScheduleRow {
    date: Some(RawCell::Text("2024-06-15".into())),
    start_time: Some(RawCell::Text("09:00".into())),
    end_time: Some(RawCell::Text("08:00".into())),
    ..Default::default()
  };

  let report = import_rows(&s, vec![bad, good], "admin").await.unwrap();

  assert_eq!(report.summary.with_incidence, 1);
  assert_eq!(report.rejected.len(), 1);
  assert_eq!(report.rejected[0].index, 0);
  let fields: Vec<_> = report.rejected[0].errors.iter().map(|e| e.field).collect();
  assert!(fields.contains(&"program"));
  assert!(fields.contains(&"end_time"));

  let rows = s.entries_for(day()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].start_time, "08:00");
  assert_eq!(rows[0].incidence.status.as_deref(), Some("not taught"));
}

#[tokio::test]
async fn import_values_keeps_rows_beside_malformed_ones() {
  let s = store().await;
  let values = vec![
    json!({
      "date": "2024-06-15", "program": "Algebra", "start_time": "8:00",
      "end_time": "10:00", "instructor": "Ana", "code": 101,
    }),
    json!({ "date": "2024-06-15", "program": ["Physics"] }),
    json!({
      "date": "2024-06-15", "program": "Chemistry", "start_time": "11:00",
      "end_time": "12:00", "instructor": "Bo", "feedback": "late start",
    }),
  ];

  let report = import_values(&s, values, "admin").await.unwrap();
  assert_eq!(report.summary.upserted_count, 2);
  assert_eq!(report.summary.with_incidence, 1);
  assert_eq!(report.rejected.len(), 1);
  assert_eq!(report.rejected[0].index, 1);

  let rows = s.entries_for(day()).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].code.as_deref(), Some("101"));
}

// ─── Incidence updates ───────────────────────────────────────────────────────

#[tokio::test]
async fn update_incidence_touches_only_supplied_fields() {
  let s = store().await;
  let mut row = entry("Algebra", "08:00", "10:00", "Ana");
  row.incidence = absence();
  s.import_entries(vec![row.clone()], "admin").await.unwrap();

  let changed = s
    .update_incidence(
      &row.slot_key(),
      Incidence { feedback: Some("resolved".into()), ..Default::default() },
    )
    .await
    .unwrap();
  assert!(changed);

  let stored = &s.entries_for(day()).await.unwrap()[0];
  assert_eq!(stored.incidence.feedback.as_deref(), Some("resolved"));
  assert_eq!(stored.incidence.substitute.as_deref(), Some("Luis"));
  assert_eq!(stored.end_time, "10:00");
}

#[tokio::test]
async fn update_incidence_on_missing_slot_returns_false() {
  let s = store().await;
  let key = SlotKey::new(day(), "08:00", "Ana", "Algebra");
  let changed = s
    .update_incidence(&key, absence())
    .await
    .unwrap();

  assert!(!changed);
  assert!(s.entries_for(day()).await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_incidence_values_are_not_written() {
  let s = store().await;
  let row = entry("Algebra", "08:00", "10:00", "Ana");
  s.publish_entries(vec![row.clone()], "admin").await.unwrap();

  let changed = s
    .update_incidence(
      &row.slot_key(),
      Incidence { status: Some("  ".into()), feedback: Some(String::new()), ..Default::default() },
    )
    .await
    .unwrap();
  assert!(changed);

  assert!(s.entries_for(day()).await.unwrap()[0].incidence.is_empty());
  assert!(s.incidence_log(day(), day()).await.unwrap().is_empty());
}

#[tokio::test]
async fn gated_update_reports_missing_slot() {
  let s = store().await;
  let key = SlotKey::new(day(), "08:00", "Ana", "Algebra");

  let err = rota_core::access::update_incidence_checked(&s, &true, &key, absence())
    .await
    .unwrap_err();
  assert!(matches!(err, rota_core::Error::SlotNotFound(_)));

  let err = rota_core::access::update_incidence_checked(&s, &false, &key, absence())
    .await
    .unwrap_err();
  assert!(matches!(err, rota_core::Error::PermissionDenied));
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_single_and_batch() {
  let s = store().await;
  let rows = vec![
    entry("Algebra", "08:00", "10:00", "Ana"),
    entry("Physics", "10:00", "12:00", "Ana"),
    entry("Art", "12:00", "13:00", "Marta"),
  ];
  s.publish_entries(rows.clone(), "admin").await.unwrap();

  assert!(s.delete_entry(&rows[0].slot_key()).await.unwrap());
  assert!(!s.delete_entry(&rows[0].slot_key()).await.unwrap());

  let deleted = s
    .delete_entries(vec![
      rows[1].slot_key(),
      rows[2].slot_key(),
      SlotKey::new(day(), "07:00", "Nobody", "Ghost"),
    ])
    .await
    .unwrap();
  assert_eq!(deleted, 2);
  assert!(s.entries_for(day()).await.unwrap().is_empty());
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_splits_base_and_overrides() {
  let s = store().await;
  let mut marked = entry("Algebra", "08:00", "10:00", "Ana");
  marked.incidence = absence();
  s.import_entries(
    vec![marked, entry("Physics", "10:00", "12:00", "Ana")],
    "admin",
  )
  .await
  .unwrap();

  let snapshot = s.day_snapshot(day()).await.unwrap();
  assert_eq!(snapshot.base.len(), 2);
  assert!(snapshot.base.iter().all(|e| !e.has_incidence()));
  assert_eq!(snapshot.overrides.len(), 1);

  let effective = snapshot.effective();
  assert_eq!(effective[0].incidence, absence());
  assert!(effective[1].incidence.is_empty());
}

#[tokio::test]
async fn incidence_log_filters_by_range_and_presence() {
  let s = store().await;
  let mut inside = entry("Algebra", "08:00", "10:00", "Ana");
  inside.incidence = absence();
  let mut outside = inside.clone();
  outside.date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
  s.import_entries(
    vec![inside, outside, entry("Physics", "10:00", "12:00", "Ana")],
    "admin",
  )
  .await
  .unwrap();

  let log = s
    .incidence_log(
      NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
      NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].program, "Algebra");
}

// ─── Pointers ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_date_refuses_existing_pointer_without_overwrite() {
  let s = store().await;
  let first = s
    .publish_date(day(), vec![entry("Algebra", "08:00", "10:00", "Ana")], "admin", false)
    .await
    .unwrap();
  let PublishWrite::Written { pointer: first, .. } = first else {
    panic!("expected first publish to write");
  };

  let second = s
    .publish_date(day(), vec![entry("Physics", "10:00", "12:00", "Ana")], "admin", false)
    .await
    .unwrap();
  assert!(matches!(second, PublishWrite::Exists { ref pointer } if pointer.id == first.id));
  assert_eq!(s.entries_for(day()).await.unwrap().len(), 1);

  let third = s
    .publish_date(day(), vec![entry("Physics", "10:00", "12:00", "Ana")], "admin", true)
    .await
    .unwrap();
  let PublishWrite::Written { pointer, .. } = third else {
    panic!("expected overwrite to write");
  };
  assert_eq!(pointer.id, first.id);
  assert!(pointer.updated_at >= first.updated_at);
  assert_eq!(s.latest_pointer().await.unwrap(), Some(pointer));
}

// ─── Version tracking ────────────────────────────────────────────────────────

#[tokio::test]
async fn publishing_client_is_not_notified_of_own_write() {
  let s = store().await;
  let mut publisher = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();

  let outcome = publisher
    .publish(
      Some(day()),
      vec![
        entry("Algebra", "08:00", "10:00", "Ana"),
        entry("Physics", "10:00", "12:00", "Luis"),
      ],
      "admin",
      false,
    )
    .await
    .unwrap();
  let PublishOutcome::Published { pointer, summary } = outcome else {
    panic!("expected publish to succeed");
  };
  assert_eq!(summary.upserted_count, 2);
  assert_eq!(pointer.entries_count, 2);

  assert_eq!(publisher.check_for_updates().await.unwrap(), None);

  let mut fresh = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();
  let signalled = fresh.check_for_updates().await.unwrap();
  assert_eq!(signalled.map(|p| p.id), Some(pointer.id));
}

#[tokio::test]
async fn dismissed_version_stays_quiet_until_a_new_one() {
  let s = store().await;
  let mut admin = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();
  let mut viewer = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();

  admin
    .publish(Some(day()), vec![entry("Algebra", "08:00", "10:00", "Ana")], "admin", false)
    .await
    .unwrap();

  let first = viewer.check_for_updates().await.unwrap().unwrap();
  viewer.dismiss(first.id).unwrap();
  assert!(viewer.pending().is_none());
  assert_eq!(viewer.check_for_updates().await.unwrap(), None);

  let next_day = day().succ_opt().unwrap();
  admin
    .publish(
      Some(next_day),
      vec![ScheduleEntry::new(next_day, "Art", "09:00", "10:00", "Marta")],
      "admin",
      false,
    )
    .await
    .unwrap();

  let second = viewer.check_for_updates().await.unwrap().unwrap();
  assert_ne!(second.id, first.id);
  assert_eq!(second.schedule_date, next_day);
}

#[tokio::test]
async fn reset_resurfaces_latest_version() {
  let s = store().await;
  let mut admin = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();
  admin
    .publish(Some(day()), vec![entry("Algebra", "08:00", "10:00", "Ana")], "admin", false)
    .await
    .unwrap();
  assert_eq!(admin.check_for_updates().await.unwrap(), None);

  let resurfaced = admin.reset().await.unwrap();
  assert!(resurfaced.is_some());
  assert!(admin.state().current_version_id.is_none());
}

#[tokio::test]
async fn tracker_state_survives_restart() {
  let s = store().await;
  let mut admin = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();
  admin
    .publish(Some(day()), vec![entry("Algebra", "08:00", "10:00", "Ana")], "admin", false)
    .await
    .unwrap();

  let storage = admin.storage().clone();
  let mut restarted = VersionTracker::new(s.clone(), storage).unwrap();
  assert_eq!(restarted.check_for_updates().await.unwrap(), None);
}

#[tokio::test]
async fn publish_refusals_and_exists() {
  let s = store().await;
  let mut admin = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();

  let none = admin.publish(None, vec![], "admin", false).await.unwrap();
  assert_eq!(none, PublishOutcome::Refused { reason: PublishRefusal::NoActiveDate });

  let empty = admin.publish(Some(day()), vec![], "admin", false).await.unwrap();
  assert_eq!(empty, PublishOutcome::Refused { reason: PublishRefusal::NoEntries });

  let rows = vec![entry("Algebra", "08:00", "10:00", "Ana")];
  admin.publish(Some(day()), rows.clone(), "admin", false).await.unwrap();
  let again = admin.publish(Some(day()), rows, "admin", false).await.unwrap();
  assert!(matches!(again, PublishOutcome::Exists { .. }));
}

#[tokio::test]
async fn startup_checks_once_per_session() {
  let s = store().await;
  let mut admin = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();
  admin
    .publish(Some(day()), vec![entry("Algebra", "08:00", "10:00", "Ana")], "admin", false)
    .await
    .unwrap();

  let mut session = rota_core::session::SessionState::new();
  let mut viewer = VersionTracker::new(s.clone(), MemoryStorage::default()).unwrap();
  assert!(viewer.startup(&mut session).await.unwrap().is_some());

  viewer.dismiss(viewer.pending().unwrap().id).unwrap();
  assert!(viewer.startup(&mut session).await.unwrap().is_none());
}
