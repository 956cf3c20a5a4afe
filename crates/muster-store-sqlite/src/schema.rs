//! SQL schema for the Muster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS units (
    unit_id    INTEGER PRIMARY KEY,
    source_id  INTEGER NOT NULL UNIQUE,
    name       TEXT    NOT NULL,
    kind       TEXT    NOT NULL DEFAULT '',
    parent_id  INTEGER REFERENCES units(unit_id)
);

-- Display name is the natural key.
CREATE TABLE IF NOT EXISTS people (
    person_id            INTEGER PRIMARY KEY,
    name                 TEXT    NOT NULL UNIQUE,
    country              TEXT,
    status               TEXT,
    biography            TEXT,
    avatar_url           TEXT,
    steam_id             INTEGER,
    applied_at           TEXT,    -- RFC 3339 UTC
    admitted_at          TEXT,
    joined_on            TEXT,    -- YYYY-MM-DD
    profile_refreshed_at TEXT
);

-- valid_from NULL marks the roster-inferred placeholder entry.
CREATE TABLE IF NOT EXISTS ranks (
    rank_id     INTEGER PRIMARY KEY,
    person_id   INTEGER NOT NULL REFERENCES people(person_id),
    name_short  TEXT,
    name_long   TEXT,
    source_id   INTEGER UNIQUE,
    valid_from  TEXT,
    granted_by  INTEGER REFERENCES people(person_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS ranks_placeholder_idx
    ON ranks(person_id) WHERE valid_from IS NULL;

-- Rows are retired by setting removed_at, never deleted.
CREATE TABLE IF NOT EXISTS person_units (
    person_unit_id  INTEGER PRIMARY KEY,
    person_id       INTEGER NOT NULL REFERENCES people(person_id),
    unit_id         INTEGER NOT NULL REFERENCES units(unit_id),
    position_short  TEXT,
    joined_at       TEXT    NOT NULL,
    removed_at      TEXT,
    UNIQUE (person_id, unit_id)
);

CREATE TABLE IF NOT EXISTS events (
    event_id     INTEGER PRIMARY KEY,
    source_id    INTEGER NOT NULL UNIQUE,
    name         TEXT    NOT NULL DEFAULT '',
    description  TEXT    NOT NULL DEFAULT '',
    kind         TEXT    NOT NULL DEFAULT '',
    mandatory    INTEGER NOT NULL DEFAULT 0,
    cancelled    INTEGER NOT NULL DEFAULT 0,
    starts_at    TEXT,
    ends_at      TEXT
);

CREATE TABLE IF NOT EXISTS event_units (
    event_id  INTEGER NOT NULL REFERENCES events(event_id),
    unit_id   INTEGER NOT NULL REFERENCES units(unit_id),
    PRIMARY KEY (event_id, unit_id)
);

CREATE TABLE IF NOT EXISTS person_events (
    person_event_id  INTEGER PRIMARY KEY,
    person_id        INTEGER NOT NULL REFERENCES people(person_id),
    event_id         INTEGER NOT NULL REFERENCES events(event_id),
    attendance       TEXT    NOT NULL DEFAULT 'unknown',
    recorded_at      TEXT,
    UNIQUE (person_id, event_id)
);

CREATE INDEX IF NOT EXISTS units_parent_idx          ON units(parent_id);
CREATE INDEX IF NOT EXISTS ranks_person_idx          ON ranks(person_id);
CREATE INDEX IF NOT EXISTS person_units_unit_idx     ON person_units(unit_id);
CREATE INDEX IF NOT EXISTS person_events_event_idx   ON person_events(event_id);

PRAGMA user_version = 1;
";
