//! Path Planner: derives the staging directory layout for an album group
//! and assigns stable per-artist directory codes (§4.5).
//!
//! Directory codes are short, filesystem-safe tokens derived from the
//! artist's display name. They're persisted the first time an artist is
//! seen so that re-running the planner against the same catalog always
//! reuses the same code (P8), even if two different artists would
//! otherwise derive the same token.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Codes are capped at this many characters before a uniqueness suffix.
pub const MAX_CODE_LENGTH: usize = 10;

const LEADING_ARTICLES: &[&str] = &["the ", "a ", "an "];

#[derive(Debug, Error)]
pub enum PathPlannerError {
    #[error("path planner sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, PathPlannerError>;

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'A' | 'E' | 'I' | 'O' | 'U')
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_alphabetic() && !is_vowel(c)
}

/// Pure derivation of a directory code candidate from a display name:
/// strip a leading article, then keep leading consonant+vowel pairs until
/// the code reaches length 2, capping at `MAX_CODE_LENGTH`.
///
/// This never consults storage and never resolves collisions; callers
/// needing a unique, persisted code should go through
/// [`ArtistDirectoryCodes::get_or_assign`].
pub fn derive_code(display_name: &str) -> String {
    let without_article = strip_leading_article(display_name);
    let alnum: Vec<char> = without_article.chars().filter(|c| c.is_alphanumeric()).collect();
    if alnum.is_empty() {
        return "XX".to_string();
    }

    let mut code = String::new();
    let mut i = 0;
    while i < alnum.len() && code.chars().count() < MAX_CODE_LENGTH {
        let c = alnum[i];
        code.push(c);
        i += 1;
        if is_consonant(c) && i < alnum.len() && is_vowel(alnum[i]) && code.chars().count() < MAX_CODE_LENGTH {
            code.push(alnum[i]);
            i += 1;
        }
        if code.chars().count() >= 2 {
            break;
        }
    }

    if code.chars().count() < 2 {
        code.push('X');
    }

    code.to_uppercase()
}

fn strip_leading_article(name: &str) -> &str {
    let lower = name.to_lowercase();
    for article in LEADING_ARTICLES {
        if lower.starts_with(article) {
            return &name[article.len()..];
        }
    }
    name
}

/// Persists artist directory codes so the same artist always maps to the
/// same code, and distinct artists never collide.
#[derive(Clone)]
pub struct ArtistDirectoryCodes {
    conn: Arc<Mutex<Connection>>,
}

impl ArtistDirectoryCodes {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        conn.lock().unwrap().execute_batch(
            "CREATE TABLE IF NOT EXISTS artist_directory_codes (
                artist_key TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE
            );",
        )?;
        Ok(Self { conn })
    }

    /// Returns the persisted code for `artist_key` (the normalized artist
    /// identity, not the display name), assigning and persisting a new one
    /// on first sight. Collisions with another artist's code are resolved
    /// by appending `-2`, `-3`, ... to the candidate.
    pub fn get_or_assign(&self, artist_key: &str, display_name: &str) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        if let Some(code) = conn
            .query_row(
                "SELECT code FROM artist_directory_codes WHERE artist_key = ?1",
                params![artist_key],
                |r| r.get::<_, String>(0),
            )
            .optional()?
        {
            return Ok(code);
        }

        let base = derive_code(display_name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        loop {
            let taken: bool = conn
                .query_row(
                    "SELECT 1 FROM artist_directory_codes WHERE code = ?1",
                    params![candidate],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !taken {
                break;
            }
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }

        conn.execute(
            "INSERT INTO artist_directory_codes (artist_key, code) VALUES (?1, ?2)",
            params![artist_key, candidate],
        )?;
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ArtistDirectoryCodes {
        let conn = Connection::open_in_memory().unwrap();
        ArtistDirectoryCodes::new(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn derive_code_keeps_leading_consonant_vowel_pair() {
        assert_eq!(derive_code("Led Zeppelin"), "LE");
        assert_eq!(derive_code("The Beatles"), "BE");
    }

    #[test]
    fn derive_code_falls_back_when_no_pair_is_available() {
        assert_eq!(derive_code("U2"), "U2");
    }

    #[test]
    fn repeated_lookup_is_idempotent() {
        let codes = store();
        let a = codes.get_or_assign("beatles", "The Beatles").unwrap();
        let b = codes.get_or_assign("beatles", "The Beatles").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn colliding_candidates_get_distinct_codes() {
        let codes = store();
        let a = codes.get_or_assign("artist-one", "Beat Masters").unwrap();
        let b = codes.get_or_assign("artist-two", "Beatrice").unwrap();
        assert_ne!(a, b);
    }
}
