//! Attribute queries and changes.

use std::time::SystemTime;

use tracing::debug;

use super::{FsState, canonical};
use crate::error::{FsError, FsResult};
use crate::perm::Access;
use crate::types::{CallerContext, FileAttr, NAME_MAX, StatFs, TimeSpec};

impl FsState {
    /// Needs traversal of the ancestors only; the target's own bits don't
    /// matter. Counts as an access.
    pub(crate) fn getattr(&mut self, ctx: &CallerContext, raw: &str) -> FsResult<FileAttr> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) {
            return Err(FsError::permission_denied(path));
        }
        let inode = &mut self.table[ino];
        inode.times.touch_access();
        Ok(inode.attr())
    }

    /// Check `access` on the target. An empty set only checks existence and
    /// traversal.
    pub(crate) fn access(&self, ctx: &CallerContext, raw: &str, access: Access) -> FsResult<()> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) || !self.allows(ino, ctx, access) {
            return Err(FsError::permission_denied(path));
        }
        Ok(())
    }

    pub(crate) fn chmod(&mut self, ctx: &CallerContext, raw: &str, mode: u32) -> FsResult<FileAttr> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) {
            return Err(FsError::permission_denied(path));
        }
        if !self.perms.is_owner_or_privileged(&self.table[ino], ctx) {
            return Err(FsError::not_permitted(path));
        }
        let inode = &mut self.table[ino];
        inode.set_perm(mode);
        inode.times.touch_meta();
        debug!(ino, mode = inode.mode, "chmod");
        Ok(inode.attr())
    }

    /// Only a privileged caller may change ownership. `None` leaves a field
    /// as it is.
    pub(crate) fn chown(
        &mut self,
        ctx: &CallerContext,
        raw: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> FsResult<FileAttr> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) {
            return Err(FsError::permission_denied(path));
        }
        if !self.perms.is_privileged(ctx) {
            return Err(FsError::not_permitted(path));
        }
        let inode = &mut self.table[ino];
        if let Some(uid) = uid {
            inode.uid = uid;
        }
        if let Some(gid) = gid {
            inode.gid = gid;
        }
        if uid.is_some() || gid.is_some() {
            inode.times.touch_meta();
        }
        debug!(ino, uid = inode.uid, gid = inode.gid, "chown");
        Ok(inode.attr())
    }

    /// Set access and modification times. `None` sets both to now.
    ///
    /// Setting to "now" is open to the owner, a privileged caller, or anyone
    /// with write permission. Explicit times need owner or privilege. The
    /// change time is left alone.
    pub(crate) fn utimens(
        &mut self,
        ctx: &CallerContext,
        raw: &str,
        times: Option<[TimeSpec; 2]>,
    ) -> FsResult<()> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.can_reach(&path, ctx) {
            return Err(FsError::permission_denied(path));
        }

        let [atime, mtime] = times.unwrap_or([TimeSpec::Now, TimeSpec::Now]);
        if atime == TimeSpec::Omit && mtime == TimeSpec::Omit {
            return Ok(());
        }

        let inode = &self.table[ino];
        let owner_or_privileged = self.perms.is_owner_or_privileged(inode, ctx);
        let to_now = atime == TimeSpec::Now && mtime == TimeSpec::Now;
        let permitted = owner_or_privileged
            || (to_now && self.perms.allows(inode, ctx, Access::WRITE));
        if !permitted {
            return Err(FsError::permission_denied(path));
        }

        let now = SystemTime::now();
        let times = &mut self.table[ino].times;
        if let Some(t) = atime.resolve(now) {
            times.atime = t;
        }
        if let Some(t) = mtime.resolve(now) {
            times.mtime = t;
        }
        Ok(())
    }

    pub(crate) fn statfs(&self) -> StatFs {
        let bsize = u64::from(self.block_size.max(1));
        let used_blocks = self.used_bytes.div_ceil(bsize);
        let blocks = self.capacity_blocks.max(used_blocks);
        let free = blocks - used_blocks;
        StatFs {
            blocks,
            bfree: free,
            bavail: free,
            files: self.table.capacity() as u64,
            ffree: self.table.free_count() as u64,
            bsize: self.block_size,
            namelen: NAME_MAX as u32,
            frsize: self.block_size,
        }
    }
}
