//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS countries (
    code    TEXT PRIMARY KEY COLLATE NOCASE,   -- ISO 3166 alpha-2
    name    TEXT NOT NULL,
    alpha3  TEXT NOT NULL
);

-- Names are the real identity of an organization; ids are local to this file.
CREATE TABLE IF NOT EXISTS organizations (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL COLLATE NOCASE UNIQUE
);

CREATE TABLE IF NOT EXISTS domains_organizations (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    domain           TEXT NOT NULL COLLATE NOCASE UNIQUE,
    is_top_domain    INTEGER NOT NULL DEFAULT 0,
    organization_id  INTEGER NOT NULL REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS matching_blacklist (
    excluded  TEXT PRIMARY KEY COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS uidentities (
    uuid           TEXT PRIMARY KEY,
    last_modified  TEXT              -- ISO 8601 UTC or NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    uuid          TEXT PRIMARY KEY REFERENCES uidentities(uuid) ON DELETE CASCADE,
    name          TEXT,
    email         TEXT,
    gender        TEXT,
    gender_acc    INTEGER,           -- 0..=100
    is_bot        INTEGER,
    country_code  TEXT REFERENCES countries(code) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS identities (
    id             TEXT PRIMARY KEY,
    name           TEXT,
    email          TEXT,
    username       TEXT,
    source         TEXT NOT NULL,
    uuid           TEXT REFERENCES uidentities(uuid) ON DELETE CASCADE,
    last_modified  TEXT
);

CREATE TABLE IF NOT EXISTS enrollments (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid             TEXT NOT NULL REFERENCES uidentities(uuid) ON DELETE CASCADE,
    organization_id  INTEGER NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    start_date       TEXT NOT NULL,
    end_date         TEXT NOT NULL,
    UNIQUE (uuid, organization_id, start_date, end_date)
);

CREATE INDEX IF NOT EXISTS identities_email_idx    ON identities(email);
CREATE INDEX IF NOT EXISTS identities_uuid_idx     ON identities(uuid);
CREATE INDEX IF NOT EXISTS enrollments_window_idx  ON enrollments(uuid, start_date, end_date);

PRAGMA user_version = 1;
";
