//! Library roots: the three named filesystem locations the pipeline moves
//! files between — inbound, staging, and production (§3, §4.9 config).
//!
//! Exactly one root of each type must be active at a time; the pipeline has
//! no notion of routing a given scan to one of several candidate roots.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryRootKind {
    Inbound,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryRoot {
    pub name: String,
    pub kind: LibraryRootKind,
    pub path: PathBuf,
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum LibraryConfigError {
    #[error("no active {0:?} root configured")]
    NoActiveRoot(LibraryRootKind),
    #[error("multiple active {0:?} roots configured: {1:?}")]
    MultipleActiveRoots(LibraryRootKind, Vec<String>),
}

/// The resolved set of library roots, validated so exactly one of each kind
/// is active.
#[derive(Debug, Clone)]
pub struct LibraryRoots {
    pub inbound: PathBuf,
    pub staging: PathBuf,
    pub production: PathBuf,
}

impl LibraryRoots {
    pub fn resolve(roots: &[LibraryRoot]) -> Result<Self, LibraryConfigError> {
        Ok(Self {
            inbound: active_root(roots, LibraryRootKind::Inbound)?,
            staging: active_root(roots, LibraryRootKind::Staging)?,
            production: active_root(roots, LibraryRootKind::Production)?,
        })
    }
}

fn active_root(roots: &[LibraryRoot], kind: LibraryRootKind) -> Result<PathBuf, LibraryConfigError> {
    let active: Vec<&LibraryRoot> = roots.iter().filter(|r| r.kind == kind && r.active).collect();
    match active.len() {
        0 => Err(LibraryConfigError::NoActiveRoot(kind)),
        1 => Ok(active[0].path.clone()),
        _ => Err(LibraryConfigError::MultipleActiveRoots(
            kind,
            active.into_iter().map(|r| r.name.clone()).collect(),
        )),
    }
}
