//! Handle lifecycle and content I/O.
//!
//! Handles carry `(ino, generation)`. Every handle operation first checks
//! the pair is still current, so a handle to a removed directory whose slot
//! was reused can never see the new occupant.

use tracing::{debug, warn};

use super::{FsState, canonical};
use crate::error::{FsError, FsResult};
use crate::inode::Inode;
use crate::perm::Access;
use crate::types::{CallerContext, DirEntry, FileAttr, Ino};

impl FsState {
    /// Live inode behind a handle.
    fn handle_inode(&self, ino: Ino, generation: u64) -> FsResult<&Inode> {
        if !self.table.is_current(ino, generation) {
            return Err(FsError::StaleHandle(ino));
        }
        Ok(&self.table[ino])
    }

    pub(crate) fn open(&mut self, ctx: &CallerContext, raw: &str) -> FsResult<(Ino, u64)> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) {
            return Err(FsError::permission_denied(path));
        }
        if self.table[ino].is_dir() {
            return Err(FsError::is_a_directory(path));
        }
        self.table[ino].open_count += 1;
        Ok((ino, self.table.generation(ino)))
    }

    pub(crate) fn opendir(&mut self, ctx: &CallerContext, raw: &str) -> FsResult<(Ino, u64)> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) {
            return Err(FsError::permission_denied(path));
        }
        if !self.table[ino].is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        self.table[ino].open_count += 1;
        Ok((ino, self.table.generation(ino)))
    }

    pub(crate) fn read(
        &mut self,
        ino: Ino,
        generation: u64,
        ctx: &CallerContext,
        size: usize,
        offset: u64,
    ) -> FsResult<Vec<u8>> {
        let inode = self.handle_inode(ino, generation)?;
        if !self.perms.allows(inode, ctx, Access::READ) {
            return Err(FsError::permission_denied(format!("inode {ino}")));
        }
        let Some(data) = inode.file() else {
            return Err(FsError::is_a_directory(format!("inode {ino}")));
        };
        let bytes = match usize::try_from(offset) {
            Ok(offset) => data.read_at(offset, size).to_vec(),
            Err(_) => Vec::new(),
        };
        self.table[ino].times.touch_access();
        Ok(bytes)
    }

    pub(crate) fn write(
        &mut self,
        ino: Ino,
        generation: u64,
        ctx: &CallerContext,
        bytes: &[u8],
        offset: u64,
    ) -> FsResult<usize> {
        let inode = self.handle_inode(ino, generation)?;
        if !self.perms.allows(inode, ctx, Access::WRITE) {
            return Err(FsError::permission_denied(format!("inode {ino}")));
        }
        let Some(data) = inode.file() else {
            return Err(FsError::is_a_directory(format!("inode {ino}")));
        };
        let len = data.len();
        let offset = match usize::try_from(offset) {
            Ok(offset) if offset <= len => offset,
            _ => {
                warn!(ino, offset, len, "write past end of file rejected");
                return Err(FsError::invalid_argument(format!(
                    "write at offset {offset} past end of file ({len} bytes)"
                )));
            }
        };

        let end = offset as u64 + bytes.len() as u64;
        self.reserve_growth(ino, len, end)?;

        let inode = &mut self.table[ino];
        let written = match inode.file_mut() {
            Some(data) => data.write_at(offset, bytes),
            None => unreachable!("inode {ino} changed type under the lock"),
        }
        .map_err(|e| FsError::no_space(format!("inode {ino}: {e}")))?;
        inode.times.touch_content();
        self.account_resize(len, len.max(offset + written));
        Ok(written)
    }

    pub(crate) fn truncate(&mut self, ctx: &CallerContext, raw: &str, size: u64) -> FsResult<()> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) || !self.allows(ino, ctx, Access::WRITE) {
            return Err(FsError::permission_denied(path));
        }
        let Some(current) = self.table[ino].file().map(|data| data.len()) else {
            return Err(FsError::is_a_directory(path));
        };
        self.reserve_growth(ino, current, size)?;
        let size = usize::try_from(size)
            .map_err(|_| FsError::no_space(format!("{path}: size {size} too large")))?;

        let inode = &mut self.table[ino];
        if let Some(data) = inode.file_mut() {
            data.resize(size)
                .map_err(|e| FsError::no_space(format!("{path}: {e}")))?;
        }
        inode.times.touch_content();
        self.account_resize(current, size);
        debug!(ino, size, "truncated");
        Ok(())
    }

    /// Drop one open reference to a file, reclaiming it if it was the last
    /// reference of any kind.
    pub(crate) fn close_file(&mut self, ino: Ino, generation: u64) {
        if !self.table.is_current(ino, generation) {
            warn!(ino, generation, "close of stale file handle");
            return;
        }
        let inode = &mut self.table[ino];
        assert!(inode.open_count > 0, "close of inode {ino} with no open handles");
        inode.open_count -= 1;
        inode.times.touch_access();
        inode.times.touch_meta();
        if self.reclaim_if_unreferenced(ino) {
            debug!(ino, "last handle closed on unlinked file");
        }
    }

    /// Drop one open reference to a directory. Directories are reclaimed by
    /// rmdir, never here.
    pub(crate) fn close_dir(&mut self, ino: Ino, generation: u64) {
        if !self.table.is_current(ino, generation) {
            debug!(ino, "closedir on removed directory");
            return;
        }
        let inode = &mut self.table[ino];
        assert!(inode.open_count > 0, "closedir of inode {ino} with no open handles");
        inode.open_count -= 1;
    }

    pub(crate) fn readdir(
        &mut self,
        ino: Ino,
        generation: u64,
        ctx: &CallerContext,
    ) -> FsResult<Vec<DirEntry>> {
        let inode = self.handle_inode(ino, generation)?;
        let Some(dir) = inode.dir() else {
            return Err(FsError::not_a_directory(format!("inode {ino}")));
        };
        if !self.perms.allows(inode, ctx, Access::READ) {
            return Err(FsError::permission_denied(format!("inode {ino}")));
        }
        let entries: Vec<DirEntry> = dir
            .iter()
            .map(|(name, child)| DirEntry {
                name: name.to_string(),
                ino: child,
                kind: self.table[child].kind(),
            })
            .collect();
        self.table[ino].times.touch_access();
        Ok(entries)
    }

    /// Attributes through a handle: no path, no permission check, no atime.
    pub(crate) fn handle_attr(&self, ino: Ino, generation: u64) -> FsResult<FileAttr> {
        Ok(self.handle_inode(ino, generation)?.attr())
    }
}
