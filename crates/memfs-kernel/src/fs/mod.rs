//! The filesystem engine.
//!
//! [`MemFs`] is a cloneable front for one [`FsState`] behind a single
//! `parking_lot::Mutex`. Every operation takes the lock for its whole
//! duration, which keeps multi-inode operations (rename, link) atomic and
//! makes link/open counter updates atomic with the decision to reclaim.
//!
//! Handlers live in submodules grouped by concern:
//!
//! - `namespace` - mknod, mkdir, link, unlink, rmdir, rename
//! - `io` - open, read, write, truncate, close, opendir, readdir
//! - `attr` - getattr, chmod, chown, utimens, access, statfs

mod attr;
mod io;
mod namespace;

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::handle::{DirHandle, FileHandle};
use crate::inode::{Directory, Inode};
use crate::ops::FsOps;
use crate::path;
use crate::perm::{Access, Permissions};
use crate::resolve::{self, Resolution};
use crate::table::InodeTable;
use crate::types::{CallerContext, FileAttr, Ino, NAME_MAX, StatFs, TimeSpec};

/// Everything the engine mutates. Only reachable through the lock in
/// [`MemFs`].
#[derive(Debug)]
pub(crate) struct FsState {
    pub(crate) table: InodeTable,
    perms: Permissions,
    block_size: u32,
    capacity_blocks: u64,
    /// Bytes held by regular file content, live and unlinked-but-open.
    used_bytes: u64,
}

impl FsState {
    fn new(config: &FsConfig) -> Self {
        let table = InodeTable::new(config.initial_capacity, |ino| {
            Inode::directory(ino, None, config.root_mode, config.root_uid, config.root_gid)
        });
        Self {
            table,
            perms: Permissions::new(config.root_group_privileged),
            block_size: config.block_size,
            capacity_blocks: config.capacity_blocks,
            used_bytes: 0,
        }
    }

    fn resolve(&self, path: &str) -> Resolution {
        resolve::resolve(&self.table, path)
    }

    /// Resolve with the standard error mapping.
    fn lookup(&self, path: &str) -> FsResult<Ino> {
        self.resolve(path).into_result(path)
    }

    /// Directory holding the final component of a resolvable path.
    /// `None` for the root.
    fn containing_dir(&self, path: &str) -> Option<Ino> {
        let (prefix, _) = path::split_parent(path)?;
        self.resolve(prefix).found()
    }

    /// Execute permission on every directory above the final component.
    fn can_reach(&self, path: &str, ctx: &CallerContext) -> bool {
        self.perms
            .can_traverse(&self.table, self.containing_dir(path), ctx)
    }

    /// Execute permission on `dir` and everything above it.
    fn can_traverse(&self, dir: Ino, ctx: &CallerContext) -> bool {
        self.perms.can_traverse(&self.table, Some(dir), ctx)
    }

    fn allows(&self, ino: Ino, ctx: &CallerContext, access: Access) -> bool {
        self.perms.allows(&self.table[ino], ctx, access)
    }

    /// Parent directory and final name for a path whose last component is
    /// about to be created, replaced or removed.
    fn entry_location<'p>(&self, path: &'p str) -> FsResult<(Ino, &'p str)> {
        let Some((prefix, name)) = path::split_parent(path) else {
            return Err(FsError::busy(path));
        };
        let parent = match self.resolve(prefix) {
            Resolution::Found(ino) => ino,
            Resolution::PrefixNotDir => return Err(FsError::not_a_directory(path)),
            Resolution::NotFound => return Err(FsError::not_found(path)),
        };
        if !self.table[parent].is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        if name == "." || name == ".." {
            return Err(FsError::invalid_argument(format!("{path}: dot entry")));
        }
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong(path.to_string()));
        }
        Ok((parent, name))
    }

    /// Whether `dir` is `ancestor` or sits below it, following `parent`
    /// links up to the root.
    fn is_within(&self, dir: Ino, ancestor: Ino) -> bool {
        let mut cur = Some(dir);
        while let Some(ino) = cur {
            if ino == ancestor {
                return true;
            }
            cur = self.table[ino].parent;
        }
        false
    }

    /// Entry map of a directory inode.
    ///
    /// # Panics
    ///
    /// If `ino` is not a directory. Callers establish that first.
    fn dir_mut(&mut self, ino: Ino) -> &mut Directory {
        match self.table[ino].dir_mut() {
            Some(dir) => dir,
            None => panic!("inode {ino} is not a directory"),
        }
    }

    /// Upper bound on total file content, `capacity_blocks * block_size`.
    fn byte_limit(&self) -> u64 {
        self.capacity_blocks
            .saturating_mul(u64::from(self.block_size.max(1)))
    }

    /// Check that file content may grow from `current` to `wanted` bytes.
    fn reserve_growth(&self, ino: Ino, current: usize, wanted: u64) -> FsResult<()> {
        let extra = wanted.saturating_sub(current as u64);
        if extra == 0 {
            return Ok(());
        }
        let limit = self.byte_limit();
        if self.used_bytes.saturating_add(extra) > limit {
            warn!(ino, wanted, used = self.used_bytes, limit, "file growth over capacity");
            return Err(FsError::no_space(format!(
                "inode {ino}: growing to {wanted} bytes exceeds capacity of {limit}"
            )));
        }
        Ok(())
    }

    /// Record a content length change of one file.
    fn account_resize(&mut self, before: usize, after: usize) {
        self.used_bytes = self.used_bytes - before as u64 + after as u64;
    }

    /// Release `ino` if nothing names it and nothing holds it open.
    fn reclaim_if_unreferenced(&mut self, ino: Ino) -> bool {
        if self.table[ino].is_unreferenced() {
            let freed = self.table[ino].file().map_or(0, |data| data.len());
            self.account_resize(freed, 0);
            self.table.release(ino);
            debug!(ino, "reclaimed unreferenced inode");
            true
        } else {
            false
        }
    }
}

/// Reject empty paths, canonicalize the rest.
fn canonical(raw: &str) -> FsResult<String> {
    if raw.is_empty() {
        return Err(FsError::not_found(raw));
    }
    Ok(path::canonicalize(raw))
}

/// In-memory filesystem.
///
/// Cheap to clone; clones share the same namespace. Thread-safe.
#[derive(Debug, Clone)]
pub struct MemFs {
    state: Arc<Mutex<FsState>>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new(FsConfig::default())
    }
}

impl MemFs {
    /// Create an empty filesystem holding only the root directory.
    pub fn new(config: FsConfig) -> Self {
        debug!(?config, "creating memfs");
        Self {
            state: Arc::new(Mutex::new(FsState::new(&config))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FsState> {
        self.state.lock()
    }

    /// Resolve a path without any permission checks.
    pub fn resolve(&self, path: &str) -> Resolution {
        self.lock().resolve(&path::canonicalize(path))
    }

    /// Number of live inodes, the root included.
    pub fn inode_count(&self) -> usize {
        self.lock().table.used()
    }
}

impl FsOps for MemFs {
    fn getattr(&self, ctx: &CallerContext, path: &str) -> FsResult<FileAttr> {
        self.lock().getattr(ctx, path)
    }

    fn access(&self, ctx: &CallerContext, path: &str, access: Access) -> FsResult<()> {
        self.lock().access(ctx, path, access)
    }

    fn mknod(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileAttr> {
        let mut state = self.lock();
        let ino = state.mknod(ctx, path, mode)?;
        Ok(state.table[ino].attr())
    }

    fn mkdir(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileAttr> {
        let mut state = self.lock();
        let ino = state.mkdir(ctx, path, mode)?;
        Ok(state.table[ino].attr())
    }

    fn create(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileHandle> {
        let mut state = self.lock();
        state.mknod(ctx, path, mode)?;
        let (ino, generation) = state.open(ctx, path)?;
        Ok(FileHandle::new(self.state.clone(), ino, generation, *ctx))
    }

    fn link(&self, ctx: &CallerContext, path: &str, newpath: &str) -> FsResult<FileAttr> {
        let mut state = self.lock();
        let ino = state.link(ctx, path, newpath)?;
        Ok(state.table[ino].attr())
    }

    fn unlink(&self, ctx: &CallerContext, path: &str) -> FsResult<()> {
        self.lock().unlink(ctx, path)
    }

    fn rmdir(&self, ctx: &CallerContext, path: &str) -> FsResult<()> {
        self.lock().rmdir(ctx, path)
    }

    fn rename(&self, ctx: &CallerContext, oldpath: &str, newpath: &str) -> FsResult<()> {
        self.lock().rename(ctx, oldpath, newpath)
    }

    fn open(&self, ctx: &CallerContext, path: &str) -> FsResult<FileHandle> {
        let (ino, generation) = self.lock().open(ctx, path)?;
        Ok(FileHandle::new(self.state.clone(), ino, generation, *ctx))
    }

    fn opendir(&self, ctx: &CallerContext, path: &str) -> FsResult<DirHandle> {
        let (ino, generation) = self.lock().opendir(ctx, path)?;
        Ok(DirHandle::new(self.state.clone(), ino, generation, *ctx))
    }

    fn truncate(&self, ctx: &CallerContext, path: &str, size: u64) -> FsResult<()> {
        self.lock().truncate(ctx, path, size)
    }

    fn chmod(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileAttr> {
        self.lock().chmod(ctx, path, mode)
    }

    fn chown(
        &self,
        ctx: &CallerContext,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> FsResult<FileAttr> {
        self.lock().chown(ctx, path, uid, gid)
    }

    fn utimens(
        &self,
        ctx: &CallerContext,
        path: &str,
        times: Option<[TimeSpec; 2]>,
    ) -> FsResult<()> {
        self.lock().utimens(ctx, path, times)
    }

    fn statfs(&self) -> FsResult<StatFs> {
        Ok(self.lock().statfs())
    }
}
