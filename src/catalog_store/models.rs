use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub name_normalized: String,
    pub directory_code: String,
    pub album_count: u32,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub artist_id: String,
    pub name: String,
    pub name_normalized: String,
    pub year: Option<i32>,
    pub is_compilation: bool,
    pub genres: Vec<String>,
    pub directory_path: String,
    pub track_count: u32,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub album_id: String,
    pub title: String,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration_ms: i64,
    pub file_path: String,
    pub content_digest: String,
    pub created_at: i64,
}

/// Everything the Promotion Engine needs to write one staged album into the
/// catalog in a single transaction.
pub struct NewAlbumPromotion {
    pub artist_name: String,
    pub artist_name_normalized: String,
    pub artist_directory_code: String,
    pub album_name: String,
    pub album_name_normalized: String,
    pub year: Option<i32>,
    pub is_compilation: bool,
    pub genres: Vec<String>,
    pub directory_path: String,
    pub tracks: Vec<NewTrackPromotion>,
}

pub struct NewTrackPromotion {
    pub title: String,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration_ms: i64,
    pub file_path: String,
    pub content_digest: String,
}
