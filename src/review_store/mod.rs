//! Review Store: tracks each staged album's lifecycle from arrival in
//! staging through approval/rejection to promotion or deletion (§4.7).
//!
//! Backed by SQLite, modeled on the scratch store's single-writer shape.
//! State transitions are guarded with a compare-and-swap `UPDATE ... WHERE
//! id = ?1 AND status = ?2`, so two concurrent callers racing to resolve
//! the same item can't both succeed (P6).

mod schema;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("review store sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unknown staging item: {0}")]
    UnknownItem(String),
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: StagingStatus, to: StagingStatus },
    #[error("concurrent transition lost the race for item {0}")]
    ConcurrentUpdate(String),
}

pub type Result<T> = std::result::Result<T, ReviewError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    PendingReview,
    Approved,
    Rejected,
    Promoted,
    Deleted,
}

impl StagingStatus {
    fn as_str(self) -> &'static str {
        match self {
            StagingStatus::PendingReview => "pending_review",
            StagingStatus::Approved => "approved",
            StagingStatus::Rejected => "rejected",
            StagingStatus::Promoted => "promoted",
            StagingStatus::Deleted => "deleted",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending_review" => StagingStatus::PendingReview,
            "approved" => StagingStatus::Approved,
            "rejected" => StagingStatus::Rejected,
            "promoted" => StagingStatus::Promoted,
            "deleted" => StagingStatus::Deleted,
            _ => return None,
        })
    }

    /// Valid next states for each status, per the review state machine.
    fn allowed_next(self) -> &'static [StagingStatus] {
        match self {
            StagingStatus::PendingReview => &[StagingStatus::Approved, StagingStatus::Rejected],
            StagingStatus::Approved => &[StagingStatus::Promoted],
            StagingStatus::Rejected => &[StagingStatus::Deleted],
            StagingStatus::Promoted => &[],
            StagingStatus::Deleted => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingItem {
    pub id: String,
    pub scan_id: String,
    pub group_id: String,
    pub staged_path: String,
    pub sidecar_path: String,
    pub sidecar_checksum: String,
    pub artist_display: String,
    pub album_display: String,
    pub year: Option<i32>,
    pub track_count: u32,
    pub total_size_bytes: u64,
    pub status: StagingStatus,
    pub processed_at: i64,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<i64>,
    pub reviewer_notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewStagingItem {
    pub id: String,
    pub scan_id: String,
    pub group_id: String,
    pub staged_path: String,
    pub sidecar_path: String,
    pub sidecar_checksum: String,
    pub artist_display: String,
    pub album_display: String,
    pub year: Option<i32>,
    pub track_count: u32,
    pub total_size_bytes: u64,
}

#[derive(Clone)]
pub struct SqliteReviewStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReviewStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::REVIEW_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::REVIEW_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert(&self, item: NewStagingItem) -> Result<StagingItem> {
        let conn = self.conn.lock().unwrap();
        let now = now_unix();
        conn.execute(
            "INSERT INTO staging_items (
                id, scan_id, group_id, staged_path, sidecar_path, sidecar_checksum,
                artist_display, album_display, year, track_count, total_size_bytes,
                status, processed_at, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?13,?13)",
            params![
                item.id,
                item.scan_id,
                item.group_id,
                item.staged_path,
                item.sidecar_path,
                item.sidecar_checksum,
                item.artist_display,
                item.album_display,
                item.year,
                item.track_count,
                item.total_size_bytes as i64,
                StagingStatus::PendingReview.as_str(),
                now,
            ],
        )?;
        self.get(&item.id)?.ok_or_else(|| ReviewError::UnknownItem(item.id.clone()))
    }

    pub fn get(&self, id: &str) -> Result<Option<StagingItem>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, scan_id, group_id, staged_path, sidecar_path, sidecar_checksum,
                    artist_display, album_display, year, track_count, total_size_bytes,
                    status, processed_at, reviewer_id, reviewed_at, reviewer_notes,
                    created_at, updated_at
             FROM staging_items WHERE id = ?1",
            params![id],
            map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list(&self, status: Option<StagingStatus>) -> Result<Vec<StagingItem>> {
        let conn = self.conn.lock().unwrap();
        let mut items = Vec::new();
        let mut collect = |mut rows: rusqlite::Rows| -> Result<()> {
            while let Some(row) = rows.next()? {
                items.push(map_row(row)?);
            }
            Ok(())
        };
        match status {
            Some(s) => {
                let mut stmt = conn.prepare(
                    "SELECT id, scan_id, group_id, staged_path, sidecar_path, sidecar_checksum,
                            artist_display, album_display, year, track_count, total_size_bytes,
                            status, processed_at, reviewer_id, reviewed_at, reviewer_notes,
                            created_at, updated_at
                     FROM staging_items WHERE status = ?1 ORDER BY created_at",
                )?;
                collect(stmt.query(params![s.as_str()])?)?;
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, scan_id, group_id, staged_path, sidecar_path, sidecar_checksum,
                            artist_display, album_display, year, track_count, total_size_bytes,
                            status, processed_at, reviewer_id, reviewed_at, reviewer_notes,
                            created_at, updated_at
                     FROM staging_items ORDER BY created_at",
                )?;
                collect(stmt.query([])?)?;
            }
        }
        Ok(items)
    }

    /// Transitions `id` from its current state to `to`, enforcing the state
    /// machine and using compare-and-swap so a second caller racing against
    /// a completed transition gets `ConcurrentUpdate` rather than silently
    /// clobbering it. `reviewer_id` and `notes` are recorded on the item
    /// (§4.7); both are optional since promotion transitions the item
    /// without a fresh reviewer action.
    pub fn transition(
        &self,
        id: &str,
        to: StagingStatus,
        reviewer_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<StagingItem> {
        let current = self.get(id)?.ok_or_else(|| ReviewError::UnknownItem(id.to_string()))?;
        if !current.status.allowed_next().contains(&to) {
            return Err(ReviewError::InvalidStateTransition { from: current.status, to });
        }

        let conn = self.conn.lock().unwrap();
        let now = now_unix();
        let changed = conn.execute(
            "UPDATE staging_items
             SET status = ?1, updated_at = ?2, reviewer_id = ?3, reviewed_at = ?2, reviewer_notes = ?4
             WHERE id = ?5 AND status = ?6",
            params![to.as_str(), now, reviewer_id, notes, id, current.status.as_str()],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(ReviewError::ConcurrentUpdate(id.to_string()));
        }
        self.get(id)?.ok_or_else(|| ReviewError::UnknownItem(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM staging_items WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

fn map_row(row: &Row) -> rusqlite::Result<StagingItem> {
    let status_str: String = row.get(11)?;
    Ok(StagingItem {
        id: row.get(0)?,
        scan_id: row.get(1)?,
        group_id: row.get(2)?,
        staged_path: row.get(3)?,
        sidecar_path: row.get(4)?,
        sidecar_checksum: row.get(5)?,
        artist_display: row.get(6)?,
        album_display: row.get(7)?,
        year: row.get(8)?,
        track_count: row.get::<_, i64>(9)? as u32,
        total_size_bytes: row.get::<_, i64>(10)? as u64,
        status: StagingStatus::from_str(&status_str).unwrap_or(StagingStatus::PendingReview),
        processed_at: row.get(12)?,
        reviewer_id: row.get(13)?,
        reviewed_at: row.get(14)?,
        reviewer_notes: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewStagingItem {
        NewStagingItem {
            id: "item-1".to_string(),
            scan_id: "scan-1".to_string(),
            group_id: "group-1".to_string(),
            staged_path: "/staging/TE/Artist/2021 - Album".to_string(),
            sidecar_path: "/staging/TE/Artist/2021 - Album/album.melodee.json".to_string(),
            sidecar_checksum: "deadbeef".to_string(),
            artist_display: "Artist".to_string(),
            album_display: "Album".to_string(),
            year: Some(2021),
            track_count: 10,
            total_size_bytes: 123_456,
        }
    }

    #[test]
    fn new_items_start_pending_review() {
        let store = SqliteReviewStore::open_in_memory().unwrap();
        let item = store.insert(sample()).unwrap();
        assert_eq!(item.status, StagingStatus::PendingReview);
        assert_eq!(item.sidecar_checksum, "deadbeef");
        assert!(item.reviewer_id.is_none());
    }

    #[test]
    fn approve_then_promote_is_allowed() {
        let store = SqliteReviewStore::open_in_memory().unwrap();
        store.insert(sample()).unwrap();
        store
            .transition("item-1", StagingStatus::Approved, Some("admin-1"), Some("looks good"))
            .unwrap();
        let item = store.transition("item-1", StagingStatus::Promoted, None, None).unwrap();
        assert_eq!(item.status, StagingStatus::Promoted);
    }

    #[test]
    fn approve_records_reviewer_id_and_notes() {
        let store = SqliteReviewStore::open_in_memory().unwrap();
        store.insert(sample()).unwrap();
        let item = store
            .transition("item-1", StagingStatus::Approved, Some("admin-1"), Some("looks good"))
            .unwrap();
        assert_eq!(item.reviewer_id.as_deref(), Some("admin-1"));
        assert_eq!(item.reviewer_notes.as_deref(), Some("looks good"));
        assert!(item.reviewed_at.is_some());
    }

    #[test]
    fn promote_without_approval_is_rejected() {
        let store = SqliteReviewStore::open_in_memory().unwrap();
        store.insert(sample()).unwrap();
        let err = store
            .transition("item-1", StagingStatus::Promoted, None, None)
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidStateTransition { .. }));
    }

    #[test]
    fn reject_then_delete_is_allowed() {
        let store = SqliteReviewStore::open_in_memory().unwrap();
        store.insert(sample()).unwrap();
        store
            .transition("item-1", StagingStatus::Rejected, Some("admin-1"), None)
            .unwrap();
        let item = store.transition("item-1", StagingStatus::Deleted, Some("admin-1"), None).unwrap();
        assert_eq!(item.status, StagingStatus::Deleted);
    }

    #[test]
    fn second_concurrent_transition_loses_the_race() {
        let store = SqliteReviewStore::open_in_memory().unwrap();
        store.insert(sample()).unwrap();
        store
            .transition("item-1", StagingStatus::Approved, Some("admin-1"), None)
            .unwrap();
        store.transition("item-1", StagingStatus::Promoted, None, None).unwrap();
        let err = store
            .transition("item-1", StagingStatus::Promoted, None, None)
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidStateTransition { .. }));
    }
}
