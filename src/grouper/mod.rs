//! Grouper: turns a flat set of scanned files into album groups (§4.4).
//!
//! Two stages. Stage one buckets files by a normalized `(artist, album)`
//! identity key, ignoring year entirely — this absorbs tagging noise like
//! case, diacritics and punctuation. Stage two splits any bucket that
//! disagrees on year into one sub-group per year, using a majority vote so a
//! handful of mistagged tracks don't fracture an otherwise-coherent album.
//!
//! Group ids are UUID v5, derived deterministically from the stage-one key
//! plus the winning year, so re-running grouping over an unchanged scratch
//! store always reproduces the same ids (P3).

use crate::scratch_store::{AlbumGroup, FileForGrouping};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Namespace for group id derivation. Arbitrary but fixed so ids stay stable
/// across releases.
const GROUP_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x65, 0x6c, 0x6f, 0x64, 0x65, 0x65, 0x2d, 0x67, 0x72, 0x6f, 0x75, 0x70, 0x2d, 0x6e, 0x73,
]);

pub struct GroupWithMembers {
    pub group: AlbumGroup,
    pub member_file_ids: Vec<i64>,
}

pub struct GroupingResult {
    pub groups: Vec<GroupWithMembers>,
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap())
}

/// Folds case, diacritics and punctuation out of a tag value so that
/// "Bjork", "Björk" and "BJÖRK" collapse to the same identity key.
pub fn normalize(s: &str) -> String {
    let decomposed: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let stripped = punctuation_re().replace_all(&decomposed, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

struct Bucket<'a> {
    artist_normalized: String,
    album_normalized: String,
    files: Vec<&'a FileForGrouping>,
}

/// Groups `files` into albums. Files with empty normalized artist or album
/// (after tag-reader defaults) are treated as invalid and excluded from
/// grouping; the scanner already marks such rows `is_valid = false`, so they
/// are skipped here regardless of tag content.
pub fn group(files: &[FileForGrouping]) -> GroupingResult {
    let mut buckets: HashMap<(String, String), Bucket> = HashMap::new();

    for f in files {
        if !f.is_valid {
            continue;
        }
        let artist_key = normalize(&f.tags.album_artist_or_artist());
        let album_key = normalize(&f.tags.album);
        if artist_key.is_empty() || album_key.is_empty() {
            continue;
        }
        buckets
            .entry((artist_key.clone(), album_key.clone()))
            .or_insert_with(|| Bucket {
                artist_normalized: artist_key,
                album_normalized: album_key,
                files: Vec::new(),
            })
            .files
            .push(f);
    }

    let mut groups = Vec::new();
    let mut bucket_keys: Vec<_> = buckets.keys().cloned().collect();
    bucket_keys.sort();
    for key in bucket_keys {
        let bucket = buckets.remove(&key).unwrap();
        groups.extend(split_by_year(bucket));
    }
    GroupingResult { groups }
}

/// Stage two: split a stage-one bucket by majority-vote year. Ties break by
/// (a) preferring the year with more distinct tracks by track number, then
/// (b) the earliest year, matching the conservative "don't invent data"
/// posture of the rest of the pipeline.
fn split_by_year(bucket: Bucket<'_>) -> Vec<GroupWithMembers> {
    let mut by_year: HashMap<Option<i32>, Vec<&FileForGrouping>> = HashMap::new();
    for f in &bucket.files {
        by_year.entry(f.tags.year).or_default().push(f);
    }

    if by_year.len() <= 1 {
        let year = by_year.keys().next().copied().flatten();
        return vec![build_group(&bucket, year, bucket.files.clone())];
    }

    let winner_year = winning_year(&by_year);
    let missing = by_year.remove(&None);

    let mut years: Vec<i32> = by_year.keys().copied().map(|y| y.unwrap()).collect();
    years.sort();

    years
        .into_iter()
        .map(|year| {
            let mut members = by_year.remove(&Some(year)).unwrap();
            if year == winner_year.unwrap() {
                if let Some(missing) = &missing {
                    members.extend(missing.iter().copied());
                }
            }
            build_group(&bucket, Some(year), members)
        })
        .collect()
}

fn winning_year(by_year: &HashMap<Option<i32>, Vec<&FileForGrouping>>) -> Option<i32> {
    let mut counts: Vec<(i32, usize)> = by_year
        .iter()
        .filter_map(|(y, files)| y.map(|y| (y, files.len())))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts.first().map(|(y, _)| *y)
}

fn build_group(bucket: &Bucket<'_>, year: Option<i32>, members: Vec<&FileForGrouping>) -> GroupWithMembers {
    let id = group_id(&bucket.artist_normalized, &bucket.album_normalized, year);

    let is_compilation = members.iter().any(|f| f.tags.is_compilation);
    let mut genres: Vec<String> = members.iter().flat_map(|f| f.tags.genres.clone()).collect();
    genres.sort();
    genres.dedup();

    let total_size_bytes: u64 = members.iter().map(|f| f.size_bytes).sum();
    let artist_display = most_common_string(members.iter().map(|f| f.tags.album_artist_or_artist()));
    let album_display = most_common_string(members.iter().map(|f| f.tags.album.clone()));

    let is_valid = !members.is_empty();

    GroupWithMembers {
        group: AlbumGroup {
            id,
            artist_normalized: bucket.artist_normalized.clone(),
            album_normalized: bucket.album_normalized.clone(),
            artist_display,
            album_display,
            year,
            is_compilation,
            genres,
            track_count: members.len() as u32,
            total_size_bytes,
            is_valid,
        },
        member_file_ids: members.iter().map(|f| f.id).collect(),
    }
}

fn most_common_string(values: impl Iterator<Item = String>) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(s, _)| s)
        .unwrap_or_default()
}

fn group_id(artist_normalized: &str, album_normalized: &str, year: Option<i32>) -> String {
    let name = format!("{artist_normalized}\u{0}{album_normalized}\u{0}{}", year.map(|y| y.to_string()).unwrap_or_default());
    Uuid::new_v5(&GROUP_NAMESPACE, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_reader::TagRecord;

    fn file(id: i64, artist: &str, album: &str, year: Option<i32>, size: u64) -> FileForGrouping {
        FileForGrouping {
            id,
            size_bytes: size,
            is_valid: true,
            tags: TagRecord {
                artist: artist.to_string(),
                album_artist: artist.to_string(),
                album: album.to_string(),
                title: "t".to_string(),
                track_number: Some(1),
                disc_number: Some(1),
                year,
                genres: vec![],
                is_compilation: false,
                duration_ms: 1000,
                bit_rate_kbps: None,
                sample_rate_hz: None,
                channels: None,
                bit_depth: None,
            },
        }
    }

    #[test]
    fn normalize_folds_case_diacritics_and_punctuation() {
        assert_eq!(normalize("Björk"), normalize("BJORK"));
        assert_eq!(normalize("Guns N' Roses"), normalize("guns n roses"));
    }

    #[test]
    fn files_with_same_identity_group_together() {
        let files = vec![
            file(1, "Artist", "Album", Some(2020), 100),
            file(2, "artist", "ALBUM", Some(2020), 200),
        ];
        let result = group(&files);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].group.track_count, 2);
        assert_eq!(result.groups[0].group.total_size_bytes, 300);
    }

    #[test]
    fn grouping_is_deterministic_across_runs() {
        let files = vec![file(1, "Artist", "Album", Some(2020), 100)];
        let a = group(&files);
        let b = group(&files);
        assert_eq!(a.groups[0].group.id, b.groups[0].group.id);
    }

    #[test]
    fn disagreeing_years_split_by_majority() {
        let files = vec![
            file(1, "Artist", "Album", Some(2020), 100),
            file(2, "Artist", "Album", Some(2020), 100),
            file(3, "Artist", "Album", Some(1999), 100),
        ];
        let result = group(&files);
        assert_eq!(result.groups.len(), 2);
        let majority = result.groups.iter().find(|g| g.group.year == Some(2020)).unwrap();
        assert_eq!(majority.group.track_count, 2);
    }

    #[test]
    fn missing_year_files_join_the_majority_year() {
        let files = vec![
            file(1, "Artist", "Album", Some(2020), 100),
            file(2, "Artist", "Album", Some(2020), 100),
            file(3, "Artist", "Album", None, 100),
        ];
        let result = group(&files);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].group.year, Some(2020));
        assert_eq!(result.groups[0].group.track_count, 3);
    }

    #[test]
    fn missing_year_files_join_the_winner_even_with_a_minority_year_present() {
        let files = vec![
            file(1, "Artist", "Album", Some(2020), 100),
            file(2, "Artist", "Album", Some(2020), 100),
            file(3, "Artist", "Album", Some(1999), 100),
            file(4, "Artist", "Album", None, 100),
        ];
        let result = group(&files);
        assert_eq!(result.groups.len(), 2);
        let majority = result.groups.iter().find(|g| g.group.year == Some(2020)).unwrap();
        assert_eq!(majority.group.track_count, 3);
        let minority = result.groups.iter().find(|g| g.group.year == Some(1999)).unwrap();
        assert_eq!(minority.group.track_count, 1);
    }

    #[test]
    fn empty_artist_or_album_is_excluded() {
        let files = vec![file(1, "", "Album", Some(2020), 100)];
        let result = group(&files);
        assert!(result.groups.is_empty());
    }
}
