//! Path resolution.

use crate::error::{FsError, FsResult};
use crate::path;
use crate::table::InodeTable;
use crate::types::{Ino, ROOT_INO};

/// Outcome of walking a path through the inode table.
///
/// Kept three-way because callers map the failures to different errnos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The path names this inode.
    Found(Ino),
    /// Some component before the last is not a directory.
    PrefixNotDir,
    /// Some component does not exist.
    NotFound,
}

impl Resolution {
    pub fn found(self) -> Option<Ino> {
        match self {
            Resolution::Found(ino) => Some(ino),
            _ => None,
        }
    }

    /// Standard mapping: NotFound is `ENOENT`, PrefixNotDir is `ENOTDIR`.
    pub fn into_result(self, path: &str) -> FsResult<Ino> {
        match self {
            Resolution::Found(ino) => Ok(ino),
            Resolution::PrefixNotDir => Err(FsError::not_a_directory(path)),
            Resolution::NotFound => Err(FsError::not_found(path)),
        }
    }
}

/// Walk `path` from the root.
pub fn resolve(table: &InodeTable, path: &str) -> Resolution {
    let mut current = ROOT_INO;
    for component in path::components(path) {
        let Some(dir) = table[current].dir() else {
            return Resolution::PrefixNotDir;
        };
        match dir.get(component) {
            Some(next) => current = next,
            None => return Resolution::NotFound,
        }
    }
    Resolution::Found(current)
}
