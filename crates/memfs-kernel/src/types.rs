//! Core filesystem types.
//!
//! These are the records that cross the transport boundary: attributes,
//! directory entries, caller identity and timestamp requests. They are
//! serializable so a transport can forward them as-is.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{FsError, FsResult};

/// Inode number. Index into the inode table.
pub type Ino = u64;

/// Inode number of the root directory.
pub const ROOT_INO: Ino = 0;

/// File type mask of a mode word.
pub const S_IFMT: u32 = 0o170000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;
/// Permission bits (rwx triplets plus setuid/setgid/sticky).
pub const PERM_MASK: u32 = 0o7777;

/// Longest permitted directory entry name, in bytes.
pub const NAME_MAX: usize = 255;

/// `tv_nsec` sentinel: set the timestamp to the current time.
pub const UTIME_NOW: i64 = (1 << 30) - 1;
/// `tv_nsec` sentinel: leave the timestamp unchanged.
pub const UTIME_OMIT: i64 = (1 << 30) - 2;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Type bits for a mode word.
    pub fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }
}

/// File attributes, as returned by `getattr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    /// Inode number.
    pub ino: Ino,
    /// File type.
    pub kind: FileType,
    /// Full mode word (type bits and permission bits).
    pub mode: u32,
    /// Number of hard links.
    pub nlink: u32,
    /// Owner user ID.
    pub uid: u32,
    /// Owner group ID.
    pub gid: u32,
    /// Byte length for files, entry count (including `.` and `..`) for directories.
    pub size: u64,
    /// Last access time.
    pub atime: SystemTime,
    /// Last content modification time.
    pub mtime: SystemTime,
    /// Last metadata change time.
    pub ctime: SystemTime,
}

impl FileAttr {
    /// Permission bits without the type.
    pub fn perm(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Inode the entry references.
    pub ino: Ino,
    /// Entry type.
    pub kind: FileType,
}

/// Filesystem statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatFs {
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Total inode slots.
    pub files: u64,
    /// Free inode slots.
    pub ffree: u64,
    /// Block size.
    pub bsize: u32,
    /// Maximum name length.
    pub namelen: u32,
    /// Fragment size.
    pub frsize: u32,
}

/// Identity of the process issuing a call.
///
/// The transport fills this in from its request context for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub uid: u32,
    pub gid: u32,
    /// Applied to the mode of newly created inodes.
    pub umask: u32,
}

impl CallerContext {
    /// Caller with the given identity and an empty umask.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid, umask: 0 }
    }

    /// The superuser.
    pub fn root() -> Self {
        Self::new(0, 0)
    }

    /// Set the umask.
    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask & PERM_MASK;
        self
    }
}

/// One half of a `utimens` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// Use the current time.
    Now,
    /// Leave the timestamp as it is.
    Omit,
    /// Use the given time.
    Set(SystemTime),
}

impl TimeSpec {
    /// Decode a raw `timespec`, honoring the `UTIME_NOW` and `UTIME_OMIT`
    /// sentinels in `nsec`.
    pub fn from_raw(sec: i64, nsec: i64) -> FsResult<Self> {
        match nsec {
            UTIME_NOW => return Ok(TimeSpec::Now),
            UTIME_OMIT => return Ok(TimeSpec::Omit),
            0..=999_999_999 => {}
            _ => {
                return Err(FsError::invalid_argument(format!(
                    "nanoseconds out of range: {nsec}"
                )));
            }
        }

        let nanos = Duration::from_nanos(nsec as u64);
        let time = if sec >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_secs(sec as u64))
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_secs(sec.unsigned_abs()))
        }
        .and_then(|t| t.checked_add(nanos))
        .ok_or_else(|| FsError::invalid_argument(format!("timestamp out of range: {sec}")))?;

        Ok(TimeSpec::Set(time))
    }

    /// Resolve against `now`. `None` means leave unchanged.
    pub fn resolve(self, now: SystemTime) -> Option<SystemTime> {
        match self {
            TimeSpec::Now => Some(now),
            TimeSpec::Omit => None,
            TimeSpec::Set(t) => Some(t),
        }
    }
}
