//! Filesystem primitives the Staging Processor builds on: sanitizing target
//! filenames and moving files atomically, even across a filesystem
//! boundary between the inbound and staging roots (§4.6).

use std::io;
use std::path::{Path, PathBuf};

/// Characters that are unsafe or ambiguous across the filesystems the
/// pipeline targets (ext4, APFS, NTFS via network shares).
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Replaces filesystem-unsafe characters with `_` and trims trailing dots
/// and whitespace, which Windows-derived shares reject.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim_end_matches(['.', ' ']).trim();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Appends ` (2)`, ` (3)`, ... before the extension until `candidate` does
/// not already exist in `dir`.
pub fn unique_target(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let ext = path.extension().and_then(|s| s.to_str());
    for n in 2.. {
        let next = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(&next);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

/// Moves `src` to `dst`, creating `dst`'s parent directory if needed.
/// Tries a same-filesystem rename first; on `EXDEV` (crossing a device
/// boundary, e.g. inbound and staging mounted separately) falls back to
/// copy, fsync, rename into place, then unlink the source. Either path
/// leaves the destination fully written or not present at all — a reader
/// never observes a partial file.
pub fn atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc_exdev()) => cross_device_move(src, dst),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV on Linux and most unix targets
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    -1
}

fn cross_device_move(src: &Path, dst: &Path) -> io::Result<()> {
    let tmp_dst = dst.with_extension(format!(
        "{}.tmp",
        dst.extension().and_then(|e| e.to_str()).unwrap_or("part")
    ));
    std::fs::copy(src, &tmp_dst)?;
    let f = std::fs::File::open(&tmp_dst)?;
    f.sync_all()?;
    drop(f);
    std::fs::rename(&tmp_dst, dst)?;
    std::fs::remove_file(src)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("a/b:c?.flac"), "a_b_c_.flac");
    }

    #[test]
    fn sanitize_trims_trailing_dots() {
        assert_eq!(sanitize_filename("track..."), "track");
    }

    #[test]
    fn unique_target_appends_suffix_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.flac"), b"x").unwrap();
        let target = unique_target(dir.path(), "a.flac");
        assert_eq!(target.file_name().unwrap().to_str().unwrap(), "a (2).flac");
    }

    #[test]
    fn atomic_move_relocates_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.flac");
        let dst = dir.path().join("nested").join("dst.flac");
        std::fs::write(&src, b"hello").unwrap();
        atomic_move(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");
    }
}
