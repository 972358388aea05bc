//! Audio tag extraction.
//!
//! Reads embedded tags and stream properties from an audio file. This is the
//! pipeline's only component that touches codec-specific parsing; everything
//! downstream works off the [`TagRecord`] it produces.

use lofty::config::ParseOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::Path;
use thiserror::Error;

/// Audio container formats the reader recognizes.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["flac", "mp3", "ogg", "oga", "m4a", "mp4", "aac", "wav", "wv", "opus"];

#[derive(Debug, Error)]
pub enum TagReaderError {
    #[error("unreadable media: {0}")]
    UnreadableMedia(String),
}

/// Per-file extracted tags plus stream properties. Mirrors the `ScannedFile`
/// tag fields from the data model (§3); the scanner wraps this in a row with
/// the path, size and digest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagRecord {
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub title: String,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub is_compilation: bool,
    pub duration_ms: i64,
    pub bit_rate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u8>,
    pub bit_depth: Option<u8>,
}

impl TagRecord {
    /// Album artist when tagged, falling back to the track artist. This is
    /// the identity the Grouper keys on (§4.4) since album artist is often
    /// left blank by rippers for single-artist albums.
    pub fn album_artist_or_artist(&self) -> String {
        if self.album_artist.trim().is_empty() {
            self.artist.clone()
        } else {
            self.album_artist.clone()
        }
    }
}

/// Returns true if `path`'s extension is one the deployment's media probe
/// recognizes. Scanner uses this to filter candidate paths before handing
/// them to [`read`].
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pure function of file contents: extract tags and stream properties.
///
/// On unreadable, truncated, or unsupported files this returns
/// `TagReaderError::UnreadableMedia`. On empty tag frames it returns a record
/// with empty strings — validation of "effectively missing" tags happens in
/// the Grouper, not here.
pub fn read(path: &Path) -> Result<TagRecord, TagReaderError> {
    let tagged_file = Probe::open(path)
        .map_err(|e| TagReaderError::UnreadableMedia(e.to_string()))?
        .options(ParseOptions::new())
        .read()
        .map_err(|e| TagReaderError::UnreadableMedia(e.to_string()))?;

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let properties = tagged_file.properties();
    let duration_ms = properties.duration().as_millis() as i64;

    Ok(TagRecord {
        artist: string_of(tag, |t| t.artist()),
        album_artist: album_artist_of(tag),
        album: string_of(tag, |t| t.album()),
        title: string_of(tag, |t| t.title()),
        track_number: tag.and_then(|t| t.track()),
        disc_number: tag.and_then(|t| t.disk()),
        year: tag.and_then(|t| t.year()).map(|y| y as i32),
        genres: genres_of(tag),
        is_compilation: compilation_of(tag),
        duration_ms,
        bit_rate_kbps: properties.audio_bitrate().or_else(|| properties.overall_bitrate()),
        sample_rate_hz: properties.sample_rate(),
        channels: properties.channels(),
        bit_depth: properties.bit_depth(),
    })
}

fn string_of<'a>(tag: Option<&'a Tag>, get: impl FnOnce(&'a Tag) -> Option<std::borrow::Cow<'a, str>>) -> String {
    tag.and_then(get).map(|s| s.to_string()).unwrap_or_default()
}

fn album_artist_of(tag: Option<&Tag>) -> String {
    tag.and_then(|t| t.get_string(&ItemKey::AlbumArtist))
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn compilation_of(tag: Option<&Tag>) -> bool {
    tag.and_then(|t| t.get_string(&ItemKey::FlagCompilation))
        .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn genres_of(tag: Option<&Tag>) -> Vec<String> {
    let Some(tag) = tag else { return Vec::new() };
    let mut genres: Vec<String> = tag
        .get_strings(&ItemKey::Genre)
        .flat_map(|s| s.split([';', '/']))
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    genres.sort();
    genres.dedup();
    genres
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_extensions() {
        assert!(is_supported(Path::new("/a/b/track.flac")));
        assert!(is_supported(Path::new("/a/b/track.MP3")));
        assert!(!is_supported(Path::new("/a/b/track.txt")));
        assert!(!is_supported(Path::new("/a/b/track")));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.flac");
        std::fs::write(&path, b"not actually audio").unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(err, TagReaderError::UnreadableMedia(_)));
    }
}
