//! SQLite-backed catalog store. A single writer connection behind a mutex
//! serializes promotions (only one Promotion Engine runs at a time per
//! §4.9's single-cycle guard, but the lock makes that an enforced
//! invariant rather than an assumption); reads go through the same
//! connection since catalog read volume from the Review API is low.

use super::models::{Album, Artist, NewAlbumPromotion, Track};
use super::schema::CATALOG_SCHEMA;
use super::trait_def::{CatalogStore, CatalogStoreError, Result, WritableCatalogStore};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if user_version == 0 {
        CATALOG_SCHEMA.create(conn)?;
    }
    Ok(())
}

impl CatalogStore for SqliteCatalogStore {
    fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, name_normalized, directory_code, album_count, created_at FROM artists WHERE id = ?1",
            params![id],
            map_artist_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn find_artist_by_normalized_name(&self, name_normalized: &str) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, name_normalized, directory_code, album_count, created_at FROM artists WHERE name_normalized = ?1",
            params![name_normalized],
            map_artist_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn get_album(&self, id: &str) -> Result<Option<Album>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, artist_id, name, name_normalized, year, is_compilation, genres,
                    directory_path, track_count, created_at
             FROM albums WHERE id = ?1",
            params![id],
            map_album_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn list_tracks_of_album(&self, album_id: &str) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, album_id, title, track_number, disc_number, duration_ms,
                    file_path, content_digest, created_at
             FROM tracks WHERE album_id = ?1
             ORDER BY disc_number IS NULL, disc_number, track_number IS NULL, track_number",
        )?;
        let rows = stmt
            .query_map(params![album_id], map_track_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl WritableCatalogStore for SqliteCatalogStore {
    /// Upserts the artist, inserts the album and all of its tracks, and
    /// bumps the artist's cached album count, all inside one transaction.
    /// Grounded in the teacher's check-exists-then-insert album ingestion:
    /// an existing artist is reused rather than duplicated, and the whole
    /// promotion either lands atomically or not at all.
    fn promote_album(&self, promotion: NewAlbumPromotion) -> Result<Album> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = now_unix();

        let artist_id: String = tx
            .query_row(
                "SELECT id FROM artists WHERE name_normalized = ?1",
                params![promotion.artist_name_normalized],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tx.execute(
            "INSERT INTO artists (id, name, name_normalized, directory_code, album_count, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(id) DO NOTHING",
            params![
                artist_id,
                promotion.artist_name,
                promotion.artist_name_normalized,
                promotion.artist_directory_code,
                now
            ],
        )?;

        let album_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO albums (
                id, artist_id, name, name_normalized, year, is_compilation, genres,
                directory_path, track_count, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                album_id,
                artist_id,
                promotion.album_name,
                promotion.album_name_normalized,
                promotion.year,
                promotion.is_compilation as i64,
                serde_json::to_string(&promotion.genres).unwrap_or_else(|_| "[]".to_string()),
                promotion.directory_path,
                promotion.tracks.len() as i64,
                now,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO tracks (
                    id, album_id, title, track_number, disc_number, duration_ms,
                    file_path, content_digest, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            )?;
            for t in &promotion.tracks {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    album_id,
                    t.title,
                    t.track_number,
                    t.disc_number,
                    t.duration_ms,
                    t.file_path,
                    t.content_digest,
                    now,
                ])?;
            }
        }

        tx.execute(
            "UPDATE artists SET album_count = album_count + 1 WHERE id = ?1",
            params![artist_id],
        )?;

        tx.commit()?;

        self.get_album_locked(&conn, &album_id)?
            .ok_or_else(|| CatalogStoreError::UnknownAlbum(album_id))
    }
}

impl SqliteCatalogStore {
    fn get_album_locked(&self, conn: &Connection, id: &str) -> Result<Option<Album>> {
        conn.query_row(
            "SELECT id, artist_id, name, name_normalized, year, is_compilation, genres,
                    directory_path, track_count, created_at
             FROM albums WHERE id = ?1",
            params![id],
            map_album_row,
        )
        .optional()
        .map_err(Into::into)
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

fn map_artist_row(row: &Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        name_normalized: row.get(2)?,
        directory_code: row.get(3)?,
        album_count: row.get::<_, i64>(4)? as u32,
        created_at: row.get(5)?,
    })
}

fn map_album_row(row: &Row) -> rusqlite::Result<Album> {
    let genres_json: String = row.get(6)?;
    Ok(Album {
        id: row.get(0)?,
        artist_id: row.get(1)?,
        name: row.get(2)?,
        name_normalized: row.get(3)?,
        year: row.get(4)?,
        is_compilation: row.get::<_, i64>(5)? != 0,
        genres: serde_json::from_str(&genres_json).unwrap_or_default(),
        directory_path: row.get(7)?,
        track_count: row.get::<_, i64>(8)? as u32,
        created_at: row.get(9)?,
    })
}

fn map_track_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        album_id: row.get(1)?,
        title: row.get(2)?,
        track_number: row.get(3)?,
        disc_number: row.get(4)?,
        duration_ms: row.get(5)?,
        file_path: row.get(6)?,
        content_digest: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_promotion() -> NewAlbumPromotion {
        NewAlbumPromotion {
            artist_name: "Artist".to_string(),
            artist_name_normalized: "artist".to_string(),
            artist_directory_code: "ARTX".to_string(),
            album_name: "Album".to_string(),
            album_name_normalized: "album".to_string(),
            year: Some(2021),
            is_compilation: false,
            genres: vec!["rock".to_string()],
            directory_path: "/staging/ARTX Artist/[2021] Album".to_string(),
            tracks: vec![super::super::models::NewTrackPromotion {
                title: "Track".to_string(),
                track_number: Some(1),
                disc_number: Some(1),
                duration_ms: 1000,
                file_path: "/staging/ARTX Artist/[2021] Album/01 Track.flac".to_string(),
                content_digest: "abc".to_string(),
            }],
        }
    }

    #[test]
    fn promote_album_creates_artist_and_album() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let album = store.promote_album(sample_promotion()).unwrap();
        assert_eq!(album.track_count, 1);

        let artist = store.find_artist_by_normalized_name("artist").unwrap().unwrap();
        assert_eq!(artist.album_count, 1);

        let tracks = store.list_tracks_of_album(&album.id).unwrap();
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn second_album_reuses_existing_artist() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        store.promote_album(sample_promotion()).unwrap();
        let mut second = sample_promotion();
        second.album_name = "Second Album".to_string();
        second.album_name_normalized = "second album".to_string();
        store.promote_album(second).unwrap();

        let artist = store.find_artist_by_normalized_name("artist").unwrap().unwrap();
        assert_eq!(artist.album_count, 2);
    }
}
