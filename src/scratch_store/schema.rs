//! Database schema for a single scan's scratch store.

/// SQL schema for one scan's scratch database.
pub const SCRATCH_SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS scan_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scanned_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    size_bytes INTEGER NOT NULL,
    content_digest TEXT NOT NULL,

    tag_artist TEXT NOT NULL,
    tag_album_artist TEXT NOT NULL,
    tag_album TEXT NOT NULL,
    tag_title TEXT NOT NULL,
    tag_track_number INTEGER,
    tag_disc_number INTEGER,
    tag_year INTEGER,
    tag_genres TEXT NOT NULL, -- JSON array
    tag_is_compilation INTEGER NOT NULL,
    tag_duration_ms INTEGER NOT NULL,
    tag_bit_rate_kbps INTEGER,
    tag_sample_rate_hz INTEGER,
    tag_channels INTEGER,
    tag_bit_depth INTEGER,

    is_valid INTEGER NOT NULL,
    rejection_reason TEXT,

    group_id TEXT,

    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scanned_files_group ON scanned_files(group_id);
CREATE INDEX IF NOT EXISTS idx_scanned_files_valid ON scanned_files(is_valid);

CREATE TABLE IF NOT EXISTS album_groups (
    id TEXT PRIMARY KEY,
    artist_normalized TEXT NOT NULL,
    album_normalized TEXT NOT NULL,
    artist_display TEXT NOT NULL,
    album_display TEXT NOT NULL,
    year INTEGER,
    is_compilation INTEGER NOT NULL,
    genres TEXT NOT NULL, -- JSON array
    track_count INTEGER NOT NULL,
    total_size_bytes INTEGER NOT NULL,
    is_valid INTEGER NOT NULL,

    UNIQUE (artist_normalized, album_normalized, year)
);
"#;
