//! Inode records.
//!
//! An [`Inode`] owns its content directly: a [`Directory`] entry map or a
//! [`FileData`] byte buffer. Parents are referenced by inode number, never by
//! pointer, so the table can grow without invalidating anything.

use std::collections::{BTreeMap, TryReserveError};
use std::time::SystemTime;

use crate::types::{FileAttr, FileType, Ino, PERM_MASK, S_IFMT};

/// Access, modification and change times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    /// Last access.
    pub atime: SystemTime,
    /// Last content change.
    pub mtime: SystemTime,
    /// Last metadata change.
    pub ctime: SystemTime,
}

impl Timestamps {
    /// All three set to the current time.
    pub fn now() -> Self {
        let now = SystemTime::now();
        Self {
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Content was read.
    pub fn touch_access(&mut self) {
        self.atime = SystemTime::now();
    }

    /// Content changed. Content changes are metadata changes too.
    pub fn touch_content(&mut self) {
        let now = SystemTime::now();
        self.mtime = now;
        self.ctime = now;
    }

    /// Metadata (mode, owner, link count) changed.
    pub fn touch_meta(&mut self) {
        self.ctime = SystemTime::now();
    }
}

/// Directory content: entry name to inode number, ordered by name.
///
/// Always contains `.` and `..`.
#[derive(Debug, Clone)]
pub struct Directory {
    entries: BTreeMap<String, Ino>,
}

impl Directory {
    /// New directory with `.` pointing at `ino` and `..` at `parent`.
    pub fn new(ino: Ino, parent: Ino) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(".".to_string(), ino);
        entries.insert("..".to_string(), parent);
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<Ino> {
        self.entries.get(name).copied()
    }

    /// Add an entry.
    ///
    /// # Panics
    ///
    /// If `name` is already present: callers check for existence first.
    pub fn insert(&mut self, name: impl Into<String>, ino: Ino) {
        let name = name.into();
        assert!(
            !self.entries.contains_key(&name),
            "duplicate directory entry {name:?}"
        );
        self.entries.insert(name, ino);
    }

    /// Remove an entry, returning the inode it referenced.
    ///
    /// # Panics
    ///
    /// If `name` is absent.
    pub fn remove(&mut self, name: &str) -> Ino {
        match self.entries.remove(name) {
            Some(ino) => ino,
            None => panic!("removing missing directory entry {name:?}"),
        }
    }

    /// Point `..` at a new parent.
    pub fn set_parent(&mut self, parent: Ino) {
        self.entries.insert("..".to_string(), parent);
    }

    /// Number of entries, including `.` and `..`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if only `.` and `..` remain.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 2
    }

    /// Entries in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Ino)> {
        self.entries.iter().map(|(name, ino)| (name.as_str(), *ino))
    }
}

/// Regular file content.
#[derive(Debug, Clone, Default)]
pub struct FileData {
    bytes: Vec<u8>,
}

impl FileData {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Up to `size` bytes starting at `offset`; empty past the end.
    pub fn read_at(&self, offset: usize, size: usize) -> &[u8] {
        let start = offset.min(self.bytes.len());
        let end = start.saturating_add(size).min(self.bytes.len());
        &self.bytes[start..end]
    }

    /// Overwrite bytes below the current length and append the rest.
    ///
    /// # Panics
    ///
    /// If `offset` is past the end of the file: writes never leave holes.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<usize, TryReserveError> {
        assert!(
            offset <= self.bytes.len(),
            "write at {offset} past end of file ({})",
            self.bytes.len()
        );
        let overlap = (self.bytes.len() - offset).min(data.len());
        self.bytes.try_reserve(data.len() - overlap)?;
        self.bytes[offset..offset + overlap].copy_from_slice(&data[..overlap]);
        self.bytes.extend_from_slice(&data[overlap..]);
        Ok(data.len())
    }

    /// Grow with zeros or cut the tail. The buffer is untouched if growing
    /// fails to allocate.
    pub fn resize(&mut self, len: usize) -> Result<(), TryReserveError> {
        if let Some(extra) = len.checked_sub(self.bytes.len()) {
            self.bytes.try_reserve(extra)?;
        }
        self.bytes.resize(len, 0);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// What an inode holds.
#[derive(Debug, Clone)]
pub enum Content {
    Directory(Directory),
    File(FileData),
}

/// A live filesystem object.
#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: Ino,
    /// Containing directory. `None` only for the root.
    pub parent: Option<Ino>,
    /// Type and permission bits.
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// Open file or directory handles.
    pub open_count: u32,
    pub times: Timestamps,
    pub content: Content,
}

impl Inode {
    /// A fresh directory. Without a parent it is its own `..` (the root).
    pub fn directory(ino: Ino, parent: Option<Ino>, perm: u32, uid: u32, gid: u32) -> Self {
        Self {
            ino,
            parent,
            mode: FileType::Directory.mode_bits() | (perm & PERM_MASK),
            nlink: 2,
            uid,
            gid,
            open_count: 0,
            times: Timestamps::now(),
            content: Content::Directory(Directory::new(ino, parent.unwrap_or(ino))),
        }
    }

    /// A fresh, empty regular file with one link.
    pub fn new_file(ino: Ino, parent: Ino, perm: u32, uid: u32, gid: u32) -> Self {
        Self {
            ino,
            parent: Some(parent),
            mode: FileType::File.mode_bits() | (perm & PERM_MASK),
            nlink: 1,
            uid,
            gid,
            open_count: 0,
            times: Timestamps::now(),
            content: Content::File(FileData::default()),
        }
    }

    pub fn kind(&self) -> FileType {
        match self.content {
            Content::Directory(_) => FileType::Directory,
            Content::File(_) => FileType::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.content, Content::Directory(_))
    }

    pub fn dir(&self) -> Option<&Directory> {
        match &self.content {
            Content::Directory(dir) => Some(dir),
            Content::File(_) => None,
        }
    }

    pub fn dir_mut(&mut self) -> Option<&mut Directory> {
        match &mut self.content {
            Content::Directory(dir) => Some(dir),
            Content::File(_) => None,
        }
    }

    pub fn file(&self) -> Option<&FileData> {
        match &self.content {
            Content::File(data) => Some(data),
            Content::Directory(_) => None,
        }
    }

    pub fn file_mut(&mut self) -> Option<&mut FileData> {
        match &mut self.content {
            Content::File(data) => Some(data),
            Content::Directory(_) => None,
        }
    }

    /// Replace the permission bits, keeping the type bits.
    pub fn set_perm(&mut self, perm: u32) {
        self.mode = (self.mode & S_IFMT) | (perm & PERM_MASK);
    }

    /// Entry count for directories, byte length for files.
    pub fn size(&self) -> u64 {
        match &self.content {
            Content::Directory(dir) => dir.len() as u64,
            Content::File(data) => data.len() as u64,
        }
    }

    /// No names and no open handles: the inode may be released.
    pub fn is_unreferenced(&self) -> bool {
        self.nlink == 0 && self.open_count == 0
    }

    pub fn attr(&self) -> FileAttr {
        FileAttr {
            ino: self.ino,
            kind: self.kind(),
            mode: self.mode,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            size: self.size(),
            atime: self.times.atime,
            mtime: self.times.mtime,
            ctime: self.times.ctime,
        }
    }
}
