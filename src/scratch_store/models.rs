use crate::tag_reader::TagRecord;
use serde::{Deserialize, Serialize};

/// One row per candidate audio file discovered by the scan. Immutable once
/// inserted (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedFile {
    pub id: i64,
    pub path: String,
    pub size_bytes: u64,
    pub content_digest: String,
    pub tags: TagRecord,
    pub is_valid: bool,
    pub rejection_reason: Option<String>,
    pub group_id: Option<String>,
    pub created_at: i64,
}

/// A new scanned-file row, not yet assigned an id or group.
#[derive(Debug, Clone)]
pub struct NewScannedFile {
    pub path: String,
    pub size_bytes: u64,
    pub content_digest: String,
    pub tags: TagRecord,
    pub is_valid: bool,
    pub rejection_reason: Option<String>,
}

/// Derived aggregation of ScannedFiles judged to be one album (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumGroup {
    pub id: String,
    pub artist_normalized: String,
    pub album_normalized: String,
    pub artist_display: String,
    pub album_display: String,
    pub year: Option<i32>,
    pub is_compilation: bool,
    pub genres: Vec<String>,
    pub track_count: u32,
    pub total_size_bytes: u64,
    pub is_valid: bool,
}

/// Counts returned by `Stats()` (§4.2).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub total_files: u64,
    pub valid_files: u64,
    pub invalid_files: u64,
    pub group_count: u64,
    pub rejection_reasons: std::collections::BTreeMap<String, u64>,
}
