use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS revisions (
    revision_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    parent_revision INTEGER REFERENCES revisions(revision_id),
    kind TEXT NOT NULL CHECK (kind IN ('entity', 'redirect')),
    content BLOB NOT NULL,
    checksum BLOB NOT NULL CHECK (length(checksum) = 32),
    author BLOB NOT NULL CHECK (length(author) = 32),
    signature BLOB NOT NULL CHECK (length(signature) = 64),
    hlc BLOB NOT NULL CHECK (length(hlc) = 12),
    flags INTEGER NOT NULL,
    summary TEXT NOT NULL,
    received_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
CREATE INDEX IF NOT EXISTS idx_revisions_entity ON revisions (entity_id, revision_id);

CREATE TABLE IF NOT EXISTS entities (
    entity_id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    latest_revision INTEGER NOT NULL REFERENCES revisions(revision_id)
);

-- Not unique: writes with IGNORE_CONSTRAINTS may briefly hold a link on two entities.
CREATE TABLE IF NOT EXISTS sitelinks (
    site TEXT NOT NULL,
    page TEXT NOT NULL,
    entity_id TEXT NOT NULL REFERENCES entities(entity_id)
);
CREATE INDEX IF NOT EXISTS idx_sitelinks_page ON sitelinks (site, page);
CREATE INDEX IF NOT EXISTS idx_sitelinks_entity ON sitelinks (entity_id);

CREATE TABLE IF NOT EXISTS id_counters (
    entity_type TEXT PRIMARY KEY,
    last_number INTEGER NOT NULL
);
";
