//! Per-scan scratch database (§4.2).
//!
//! One `SqliteScratchStore` owns one SQLite file for the lifetime of a scan.
//! A single writer connection is held behind a mutex; WAL mode lets the
//! review/processing stages take concurrent read snapshots while a scan is
//! still appending rows.

use super::models::{AlbumGroup, NewScannedFile, ScanStats, ScannedFile};
use super::schema::SCRATCH_SCHEMA_SQL;
use crate::tag_reader::TagRecord;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchStoreError {
    #[error("scratch store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("scratch store sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("scratch store json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
}

pub type Result<T> = std::result::Result<T, ScratchStoreError>;

/// Maximum rows accepted by a single `insert_files` call (§4.3 batch size B).
pub const INSERT_BATCH_LIMIT: usize = 1000;

/// Handle to one scan's SQLite scratch database.
///
/// Cloning shares the underlying connection; all clones serialize through
/// the same mutex, matching the single-writer model in §4.2.
#[derive(Clone)]
pub struct SqliteScratchStore {
    conn: Arc<Mutex<Connection>>,
    scan_id: String,
}

impl SqliteScratchStore {
    /// Opens (creating if absent) the scratch database at `path` and applies
    /// the schema. `scan_id` is stamped into `scan_meta` on first open and
    /// verified to match on subsequent opens of the same file.
    pub fn open(path: &Path, scan_id: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCRATCH_SCHEMA_SQL)?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM scan_meta WHERE key = 'scan_id'",
                [],
                |r| r.get(0),
            )
            .optional()?;

        match existing {
            Some(stored) if stored == scan_id => {}
            Some(stored) => {
                return Err(ScratchStoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("scratch db at {:?} belongs to scan {stored}, not {scan_id}", path),
                )))
            }
            None => {
                conn.execute(
                    "INSERT INTO scan_meta (key, value) VALUES ('scan_id', ?1)",
                    params![scan_id],
                )?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            scan_id: scan_id.to_string(),
        })
    }

    /// Opens an in-memory scratch store, for tests.
    pub fn open_in_memory(scan_id: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCRATCH_SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO scan_meta (key, value) VALUES ('scan_id', ?1)",
            params![scan_id],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            scan_id: scan_id.to_string(),
        })
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Inserts up to `INSERT_BATCH_LIMIT` scanned files in one transaction.
    /// Duplicate paths (already present from an earlier batch of the same
    /// scan) are skipped rather than erroring, so a restarted scan can
    /// safely re-walk a directory it partially processed.
    pub fn insert_files(&self, files: &[NewScannedFile]) -> Result<usize> {
        if files.len() > INSERT_BATCH_LIMIT {
            return Err(ScratchStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("batch of {} exceeds limit {}", files.len(), INSERT_BATCH_LIMIT),
            )));
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = now_unix();
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO scanned_files (
                    path, size_bytes, content_digest,
                    tag_artist, tag_album_artist, tag_album, tag_title,
                    tag_track_number, tag_disc_number, tag_year, tag_genres,
                    tag_is_compilation, tag_duration_ms, tag_bit_rate_kbps,
                    tag_sample_rate_hz, tag_channels, tag_bit_depth,
                    is_valid, rejection_reason, group_id, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,NULL,?20)",
            )?;
            for f in files {
                let changed = stmt.execute(params![
                    f.path,
                    f.size_bytes as i64,
                    f.content_digest,
                    f.tags.artist,
                    f.tags.album_artist,
                    f.tags.album,
                    f.tags.title,
                    f.tags.track_number,
                    f.tags.disc_number,
                    f.tags.year,
                    serde_json::to_string(&f.tags.genres)?,
                    f.tags.is_compilation as i64,
                    f.tags.duration_ms,
                    f.tags.bit_rate_kbps,
                    f.tags.sample_rate_hz,
                    f.tags.channels,
                    f.tags.bit_depth,
                    f.is_valid as i64,
                    f.rejection_reason,
                    now,
                ])?;
                inserted += changed;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Runs the grouping algorithm (§4.4) over all rows and (re)populates
    /// `album_groups`, stamping each valid `scanned_files` row with its
    /// `group_id`. Idempotent: safe to call again after a scan resumes.
    pub fn compute_grouping(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let rows = read_all_files(&conn)?;
        drop(conn);

        let groups = crate::grouper::group(&rows);

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM album_groups", [])?;
        tx.execute("UPDATE scanned_files SET group_id = NULL", [])?;
        {
            let mut insert_group = tx.prepare(
                "INSERT INTO album_groups (
                    id, artist_normalized, album_normalized, artist_display, album_display,
                    year, is_compilation, genres, track_count, total_size_bytes, is_valid
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            )?;
            let mut update_file = tx.prepare("UPDATE scanned_files SET group_id = ?1 WHERE id = ?2")?;
            for g in &groups.groups {
                insert_group.execute(params![
                    g.group.id,
                    g.group.artist_normalized,
                    g.group.album_normalized,
                    g.group.artist_display,
                    g.group.album_display,
                    g.group.year,
                    g.group.is_compilation as i64,
                    serde_json::to_string(&g.group.genres)?,
                    g.group.track_count,
                    g.group.total_size_bytes as i64,
                    g.group.is_valid as i64,
                ])?;
                for file_id in &g.member_file_ids {
                    update_file.execute(params![g.group.id, file_id])?;
                }
            }
        }
        tx.commit()?;
        Ok(groups.groups.len())
    }

    pub fn list_groups(&self) -> Result<Vec<AlbumGroup>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, artist_normalized, album_normalized, artist_display, album_display,
                    year, is_compilation, genres, track_count, total_size_bytes, is_valid
             FROM album_groups ORDER BY artist_normalized, album_normalized, year",
        )?;
        let rows = stmt
            .query_map([], map_group_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn group(&self, group_id: &str) -> Result<Option<AlbumGroup>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, artist_normalized, album_normalized, artist_display, album_display,
                    year, is_compilation, genres, track_count, total_size_bytes, is_valid
             FROM album_groups WHERE id = ?1",
            params![group_id],
            map_group_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Files belonging to a group, ordered by disc number then track number
    /// then filename — the deterministic ordering the Staging Processor
    /// relies on (§4.6).
    pub fn files_of_group(&self, group_id: &str) -> Result<Vec<ScannedFile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, path, size_bytes, content_digest,
                    tag_artist, tag_album_artist, tag_album, tag_title,
                    tag_track_number, tag_disc_number, tag_year, tag_genres,
                    tag_is_compilation, tag_duration_ms, tag_bit_rate_kbps,
                    tag_sample_rate_hz, tag_channels, tag_bit_depth,
                    is_valid, rejection_reason, group_id, created_at
             FROM scanned_files WHERE group_id = ?1
             ORDER BY tag_disc_number IS NULL, tag_disc_number,
                      tag_track_number IS NULL, tag_track_number, path",
        )?;
        let rows = stmt
            .query_map(params![group_id], map_file_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if rows.is_empty() && self.group(group_id)?.is_none() {
            return Err(ScratchStoreError::UnknownGroup(group_id.to_string()));
        }
        Ok(rows)
    }

    pub fn stats(&self) -> Result<ScanStats> {
        let conn = self.conn.lock().unwrap();
        let total_files: u64 = conn.query_row("SELECT COUNT(*) FROM scanned_files", [], |r| r.get(0))?;
        let valid_files: u64 = conn.query_row(
            "SELECT COUNT(*) FROM scanned_files WHERE is_valid = 1",
            [],
            |r| r.get(0),
        )?;
        let group_count: u64 = conn.query_row("SELECT COUNT(*) FROM album_groups", [], |r| r.get(0))?;

        let mut reasons = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT rejection_reason, COUNT(*) FROM scanned_files
             WHERE is_valid = 0 AND rejection_reason IS NOT NULL
             GROUP BY rejection_reason",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let reason: String = row.get(0)?;
            let count: u64 = row.get(1)?;
            reasons.insert(reason, count);
        }

        Ok(ScanStats {
            total_files,
            valid_files,
            invalid_files: total_files - valid_files,
            group_count,
            rejection_reasons: reasons,
        })
    }

    /// Flushes and releases the writer connection. After this call the
    /// scratch file can safely be read by another process under WAL.
    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| ())
            .and_then(|m| m.into_inner().map_err(|_| ()))
            .ok();
        if let Some(conn) = conn {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        }
        Ok(())
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Row shape the Grouper consumes: enough of `ScannedFile` to build groups,
/// decoupled from the sqlite row-mapping details.
pub(crate) struct FileForGrouping {
    pub id: i64,
    pub size_bytes: u64,
    pub tags: TagRecord,
    pub is_valid: bool,
}

fn read_all_files(conn: &Connection) -> Result<Vec<FileForGrouping>> {
    let mut stmt = conn.prepare(
        "SELECT id, size_bytes,
                tag_artist, tag_album_artist, tag_album, tag_title,
                tag_track_number, tag_disc_number, tag_year, tag_genres,
                tag_is_compilation, tag_duration_ms, tag_bit_rate_kbps,
                tag_sample_rate_hz, tag_channels, tag_bit_depth, is_valid
         FROM scanned_files",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let genres_json: String = row.get(9)?;
            let genres: Vec<String> = serde_json::from_str(&genres_json).unwrap_or_default();
            Ok(FileForGrouping {
                id: row.get(0)?,
                size_bytes: row.get::<_, i64>(1)? as u64,
                tags: TagRecord {
                    artist: row.get(2)?,
                    album_artist: row.get(3)?,
                    album: row.get(4)?,
                    title: row.get(5)?,
                    track_number: row.get(6)?,
                    disc_number: row.get(7)?,
                    year: row.get(8)?,
                    genres,
                    is_compilation: row.get::<_, i64>(10)? != 0,
                    duration_ms: row.get(11)?,
                    bit_rate_kbps: row.get(12)?,
                    sample_rate_hz: row.get(13)?,
                    channels: row.get(14)?,
                    bit_depth: row.get(15)?,
                },
                is_valid: row.get::<_, i64>(16)? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_group_row(row: &Row) -> rusqlite::Result<AlbumGroup> {
    let genres_json: String = row.get(7)?;
    Ok(AlbumGroup {
        id: row.get(0)?,
        artist_normalized: row.get(1)?,
        album_normalized: row.get(2)?,
        artist_display: row.get(3)?,
        album_display: row.get(4)?,
        year: row.get(5)?,
        is_compilation: row.get::<_, i64>(6)? != 0,
        genres: serde_json::from_str(&genres_json).unwrap_or_default(),
        track_count: row.get::<_, i64>(8)? as u32,
        total_size_bytes: row.get::<_, i64>(9)? as u64,
        is_valid: row.get::<_, i64>(10)? != 0,
    })
}

fn map_file_row(row: &Row) -> rusqlite::Result<ScannedFile> {
    let genres_json: String = row.get(11)?;
    Ok(ScannedFile {
        id: row.get(0)?,
        path: row.get(1)?,
        size_bytes: row.get::<_, i64>(2)? as u64,
        content_digest: row.get(3)?,
        tags: TagRecord {
            artist: row.get(4)?,
            album_artist: row.get(5)?,
            album: row.get(6)?,
            title: row.get(7)?,
            track_number: row.get(8)?,
            disc_number: row.get(9)?,
            year: row.get(10)?,
            genres: serde_json::from_str(&genres_json).unwrap_or_default(),
            is_compilation: row.get::<_, i64>(12)? != 0,
            duration_ms: row.get(13)?,
            bit_rate_kbps: row.get(14)?,
            sample_rate_hz: row.get(15)?,
            channels: row.get(16)?,
            bit_depth: row.get(17)?,
        },
        is_valid: row.get::<_, i64>(18)? != 0,
        rejection_reason: row.get(19)?,
        group_id: row.get(20)?,
        created_at: row.get(21)?,
    })
}
