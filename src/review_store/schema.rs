//! Database schema for the review store.

pub const REVIEW_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS staging_items (
    id TEXT PRIMARY KEY,
    scan_id TEXT NOT NULL,
    group_id TEXT NOT NULL,
    staged_path TEXT NOT NULL UNIQUE,
    sidecar_path TEXT NOT NULL,
    sidecar_checksum TEXT NOT NULL,
    artist_display TEXT NOT NULL,
    album_display TEXT NOT NULL,
    year INTEGER,
    track_count INTEGER NOT NULL,
    total_size_bytes INTEGER NOT NULL,
    status TEXT NOT NULL,
    processed_at INTEGER NOT NULL,
    reviewer_id TEXT,
    reviewed_at INTEGER,
    reviewer_notes TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_staging_items_status ON staging_items(status);
"#;
