//! Production catalog schema: Artist, Album, Track and the per-artist
//! directory code assignments the Path Planner persists.

use crate::sqlite_persistence::versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};
use crate::sqlite_column;

const ARTISTS_COLUMNS: &[Column<'static, &'static str>] = &[
    sqlite_column!("id", &SqlType::Text, is_primary_key = true),
    sqlite_column!("name", &SqlType::Text, non_null = true),
    sqlite_column!("name_normalized", &SqlType::Text, non_null = true, is_unique = true),
    sqlite_column!("directory_code", &SqlType::Text, non_null = true, is_unique = true),
    sqlite_column!("album_count", &SqlType::Integer, non_null = true, default_value = Some("0")),
    sqlite_column!("created_at", &SqlType::Integer, non_null = true),
];

const ALBUMS_COLUMNS: &[Column<'static, &'static str>] = &[
    sqlite_column!("id", &SqlType::Text, is_primary_key = true),
    sqlite_column!(
        "artist_id",
        &SqlType::Text,
        non_null = true,
        foreign_key = Some(&ForeignKey {
            foreign_table: "artists",
            foreign_column: "id",
            on_delete: ForeignKeyOnChange::Cascade,
        })
    ),
    sqlite_column!("name", &SqlType::Text, non_null = true),
    sqlite_column!("name_normalized", &SqlType::Text, non_null = true),
    sqlite_column!("year", &SqlType::Integer),
    sqlite_column!("is_compilation", &SqlType::Integer, non_null = true, default_value = Some("0")),
    sqlite_column!("genres", &SqlType::Text, non_null = true, default_value = Some("'[]'")),
    sqlite_column!("directory_path", &SqlType::Text, non_null = true),
    sqlite_column!("track_count", &SqlType::Integer, non_null = true, default_value = Some("0")),
    sqlite_column!("created_at", &SqlType::Integer, non_null = true),
];

const TRACKS_COLUMNS: &[Column<'static, &'static str>] = &[
    sqlite_column!("id", &SqlType::Text, is_primary_key = true),
    sqlite_column!(
        "album_id",
        &SqlType::Text,
        non_null = true,
        foreign_key = Some(&ForeignKey {
            foreign_table: "albums",
            foreign_column: "id",
            on_delete: ForeignKeyOnChange::Cascade,
        })
    ),
    sqlite_column!("title", &SqlType::Text, non_null = true),
    sqlite_column!("track_number", &SqlType::Integer),
    sqlite_column!("disc_number", &SqlType::Integer),
    sqlite_column!("duration_ms", &SqlType::Integer, non_null = true),
    sqlite_column!("file_path", &SqlType::Text, non_null = true, is_unique = true),
    sqlite_column!("content_digest", &SqlType::Text, non_null = true),
    sqlite_column!("created_at", &SqlType::Integer, non_null = true),
];

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: ARTISTS_COLUMNS,
    indices: &[],
    unique_constraints: &[],
};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: ALBUMS_COLUMNS,
    indices: &[("idx_albums_artist", "artist_id")],
    unique_constraints: &[&["artist_id", "name_normalized", "year"]],
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: TRACKS_COLUMNS,
    indices: &[("idx_tracks_album", "album_id")],
    unique_constraints: &[],
};

pub const CATALOG_SCHEMA: VersionedSchema = VersionedSchema {
    version: 1,
    tables: &[ARTISTS_TABLE, ALBUMS_TABLE, TRACKS_TABLE],
    migration: None,
};
