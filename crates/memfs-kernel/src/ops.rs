//! Filesystem operations trait.
//!
//! Path-based entry points for everything except content I/O and directory
//! listing, which go through the handles returned by `open`, `create` and
//! `opendir`. Every call carries the [`CallerContext`] it is checked
//! against.

use crate::error::FsResult;
use crate::handle::{DirHandle, FileHandle};
use crate::perm::Access;
use crate::types::{CallerContext, FileAttr, StatFs, TimeSpec};

/// Core filesystem operations.
///
/// Paths are absolute, canonicalized before use. An empty path is
/// `NotFound` for every operation.
pub trait FsOps: Send + Sync {
    // ========================================================================
    // Namespace
    // ========================================================================

    /// Create a regular file. Type bits in `mode` are ignored; the caller's
    /// umask applies.
    fn mknod(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileAttr>;

    /// Create a directory.
    fn mkdir(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileAttr>;

    /// Create a regular file and open it in one step.
    fn create(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileHandle>;

    /// Hard link `newpath` to the file at `path`.
    fn link(&self, ctx: &CallerContext, path: &str, newpath: &str) -> FsResult<FileAttr>;

    /// Remove a file name. The inode lives on while handles are open.
    fn unlink(&self, ctx: &CallerContext, path: &str) -> FsResult<()>;

    /// Remove an empty directory.
    fn rmdir(&self, ctx: &CallerContext, path: &str) -> FsResult<()>;

    /// Move `oldpath` to `newpath`, replacing a compatible target.
    fn rename(&self, ctx: &CallerContext, oldpath: &str, newpath: &str) -> FsResult<()>;

    // ========================================================================
    // Content
    // ========================================================================

    /// Open a regular file.
    fn open(&self, ctx: &CallerContext, path: &str) -> FsResult<FileHandle>;

    /// Open a directory for listing.
    fn opendir(&self, ctx: &CallerContext, path: &str) -> FsResult<DirHandle>;

    /// Set a file's length, zero-filling when it grows.
    fn truncate(&self, ctx: &CallerContext, path: &str, size: u64) -> FsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    fn getattr(&self, ctx: &CallerContext, path: &str) -> FsResult<FileAttr>;

    /// Check whether `ctx` may access `path` as requested.
    fn access(&self, ctx: &CallerContext, path: &str, access: Access) -> FsResult<()>;

    /// Replace permission bits.
    fn chmod(&self, ctx: &CallerContext, path: &str, mode: u32) -> FsResult<FileAttr>;

    /// Change owner and/or group. `None` leaves the field unchanged.
    fn chown(
        &self,
        ctx: &CallerContext,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> FsResult<FileAttr>;

    /// Set access and modification times. `None` means both to now.
    fn utimens(
        &self,
        ctx: &CallerContext,
        path: &str,
        times: Option<[TimeSpec; 2]>,
    ) -> FsResult<()>;

    fn statfs(&self) -> FsResult<StatFs>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists and is reachable by `ctx`.
    fn exists(&self, ctx: &CallerContext, path: &str) -> bool {
        self.getattr(ctx, path).is_ok()
    }

    /// Read entire file contents.
    fn read_all(&self, ctx: &CallerContext, path: &str) -> FsResult<Vec<u8>> {
        let handle = self.open(ctx, path)?;
        let size = handle.attr()?.size as usize;
        handle.read(size, 0)
    }

    /// Replace entire file contents, creating the file if needed.
    fn write_all(&self, ctx: &CallerContext, path: &str, data: &[u8]) -> FsResult<()> {
        let handle = if self.exists(ctx, path) {
            self.truncate(ctx, path, 0)?;
            self.open(ctx, path)?
        } else {
            self.create(ctx, path, 0o644)?
        };
        handle.write(data, 0)?;
        Ok(())
    }
}
