//! SQL schema for the Rota SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per slot. Base columns are owned by publish, incidence columns
-- by incidence updates; imports may write both.
CREATE TABLE IF NOT EXISTS schedule_entries (
    schedule_date         TEXT NOT NULL,   -- YYYY-MM-DD
    program               TEXT NOT NULL,   -- normalised
    start_time            TEXT NOT NULL,   -- HH:MM
    instructor            TEXT NOT NULL,   -- normalised; 'none' if unassigned
    end_time              TEXT NOT NULL,
    shift                 TEXT,
    branch                TEXT,
    code                  TEXT,
    minutes               INTEGER,
    units                 REAL,
    status                TEXT,
    substitute            TEXT,
    incidence_type        TEXT,
    incidence_subtype     TEXT,
    description           TEXT,
    department            TEXT,
    feedback              TEXT,
    published_by          TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    incidence_updated_at  TEXT,
    UNIQUE (schedule_date, program, start_time, instructor)
);

-- Marks a date as published; id is stable across republishes.
CREATE TABLE IF NOT EXISTS published_versions (
    id             TEXT PRIMARY KEY,
    schedule_date  TEXT NOT NULL UNIQUE,
    updated_at     TEXT NOT NULL,   -- RFC 3339, fixed micros, UTC
    entries_count  INTEGER NOT NULL,
    published_by   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS entries_date_idx     ON schedule_entries(schedule_date);
CREATE INDEX IF NOT EXISTS versions_updated_idx ON published_versions(updated_at);

PRAGMA user_version = 1;
";
