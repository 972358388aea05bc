//! Sidecar document: the `album.melodee.json` file written alongside every
//! staged album, recording exactly what the pipeline believed about it at
//! processing time (§3, §6).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

pub const SIDECAR_FILENAME: &str = "album.melodee.json";
pub const SIDECAR_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("sidecar io: {0}")]
    Io(#[from] io::Error),
    #[error("sidecar json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SidecarError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarArtist {
    pub name: String,
    pub name_normalized: String,
    pub directory_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarAlbum {
    pub name: String,
    pub name_normalized: String,
    pub album_type: String,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub is_compilation: bool,
}

/// One track entry. `file_path` is staging-root-relative so the document
/// stays valid if the staging root itself is remounted elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarTrack {
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub name: String,
    pub duration: i64,
    pub file_path: String,
    pub file_size: u64,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub checksum: String,
    pub original_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// The document written as `album.melodee.json` inside every staged album
/// directory. Field order here is the serialized order (struct field
/// order, via `serde_json::to_writer_pretty`), matching the deterministic
/// layout documented in the external interfaces (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumMelodeeDocument {
    pub version: String,
    pub processed_at: String,
    pub scan_id: String,
    pub group_id: String,
    pub artist: SidecarArtist,
    pub album: SidecarAlbum,
    pub tracks: Vec<SidecarTrack>,
    pub status: String,
    pub validation: SidecarValidation,
}

/// Crash-safe write: serialize to a temp file in the same directory,
/// fsync it, then atomically rename over the final path. A crash mid-write
/// leaves either the old sidecar (if any) or nothing — never a truncated
/// file (P4). Returns the hex SHA-256 checksum of the written bytes, which
/// the Review Store persists as the item's integrity checksum (§3) and the
/// Promotion Engine recomputes and compares at promotion time (§4.8).
pub fn write(dir: &Path, doc: &AlbumMelodeeDocument) -> Result<String> {
    std::fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(doc)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        use std::io::Write;
        tmp.write_all(&bytes)?;
    }
    tmp.as_file_mut().sync_all()?;
    tmp.persist(dir.join(SIDECAR_FILENAME))
        .map_err(|e| SidecarError::Io(e.error))?;
    Ok(hex_sha256(&bytes))
}

pub fn read(dir: &Path) -> Result<AlbumMelodeeDocument> {
    let bytes = std::fs::read(dir.join(SIDECAR_FILENAME))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Recomputes the checksum of the sidecar currently on disk, for
/// integrity validation at promotion time.
pub fn checksum_of_file(dir: &Path) -> Result<String> {
    let bytes = std::fs::read(dir.join(SIDECAR_FILENAME))?;
    Ok(hex_sha256(&bytes))
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AlbumMelodeeDocument {
        AlbumMelodeeDocument {
            version: SIDECAR_VERSION.to_string(),
            processed_at: "2026-01-01T00:00:00Z".to_string(),
            scan_id: "scan-1".to_string(),
            group_id: "group-1".to_string(),
            artist: SidecarArtist {
                name: "Artist".to_string(),
                name_normalized: "artist".to_string(),
                directory_code: "AR".to_string(),
            },
            album: SidecarAlbum {
                name: "Album".to_string(),
                name_normalized: "album".to_string(),
                album_type: "album".to_string(),
                year: Some(2020),
                genres: vec!["rock".to_string()],
                is_compilation: false,
            },
            tracks: vec![SidecarTrack {
                track_number: Some(1),
                disc_number: Some(1),
                name: "Track".to_string(),
                duration: 1000,
                file_path: "AR/Artist/2020 - Album/01 - Track.flac".to_string(),
                file_size: 4096,
                bitrate: Some(320),
                sample_rate: Some(44_100),
                checksum: "abc".to_string(),
                original_path: "/in/track.flac".to_string(),
            }],
            status: "pending_review".to_string(),
            validation: SidecarValidation {
                is_valid: true,
                errors: vec![],
                warnings: vec![],
            },
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample();
        write(dir.path(), &doc).unwrap();
        let read_back = read(dir.path()).unwrap();
        assert_eq!(read_back.group_id, doc.group_id);
        assert_eq!(read_back.tracks.len(), 1);
    }

    #[test]
    fn write_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample();
        write(dir.path(), &doc).unwrap();
        doc.status = "approved".to_string();
        write(dir.path(), &doc).unwrap();
        let read_back = read(dir.path()).unwrap();
        assert_eq!(read_back.status, "approved");
    }

    #[test]
    fn field_order_matches_struct_declaration() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), &sample()).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(SIDECAR_FILENAME)).unwrap();
        let version_pos = raw.find("\"version\"").unwrap();
        let status_pos = raw.find("\"status\"").unwrap();
        assert!(version_pos < status_pos);
    }

    #[test]
    fn status_is_written_pending_review() {
        assert_eq!(sample().status, "pending_review");
    }
}
