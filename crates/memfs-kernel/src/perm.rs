//! Permission model.
//!
//! Classic owner/group/other triplets plus a superuser bypass. Traversal
//! walks `parent` references from a directory up to the root and requires
//! execute permission on every directory along the way.

use bitflags::bitflags;

use crate::inode::Inode;
use crate::table::InodeTable;
use crate::types::{CallerContext, Ino};

bitflags! {
    /// Requested access, laid out like one rwx triplet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u32 {
        const READ = 0o4;
        const WRITE = 0o2;
        const EXECUTE = 0o1;
    }
}

/// Evaluates access requests for a caller.
#[derive(Debug, Clone, Copy)]
pub struct Permissions {
    /// Treat callers in group 0 as privileged, like uid 0.
    pub root_group_privileged: bool,
}

impl Permissions {
    pub fn new(root_group_privileged: bool) -> Self {
        Self {
            root_group_privileged,
        }
    }

    /// Superuser check: uid 0, and gid 0 when so configured.
    pub fn is_privileged(&self, ctx: &CallerContext) -> bool {
        ctx.uid == 0 || (self.root_group_privileged && ctx.gid == 0)
    }

    /// Owner of the inode, or privileged.
    pub fn is_owner_or_privileged(&self, inode: &Inode, ctx: &CallerContext) -> bool {
        inode.uid == ctx.uid || self.is_privileged(ctx)
    }

    /// Check `access` against the triplet that applies to `ctx`.
    pub fn allows(&self, inode: &Inode, ctx: &CallerContext, access: Access) -> bool {
        if self.is_privileged(ctx) {
            return true;
        }
        let shift = if ctx.uid == inode.uid {
            6
        } else if ctx.gid == inode.gid {
            3
        } else {
            0
        };
        let granted = Access::from_bits_truncate(inode.mode >> shift);
        granted.contains(access)
    }

    /// Execute permission on `start` and every directory above it.
    ///
    /// `None` (the parent of the root) is trivially traversable.
    pub fn can_traverse(&self, table: &InodeTable, start: Option<Ino>, ctx: &CallerContext) -> bool {
        let mut current = start;
        while let Some(ino) = current {
            let inode = &table[ino];
            debug_assert!(inode.is_dir(), "traversal through non-directory {ino}");
            if !self.allows(inode, ctx, Access::EXECUTE) {
                return false;
            }
            current = inode.parent;
        }
        true
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ROOT_INO;

    fn file(perm: u32, uid: u32, gid: u32) -> Inode {
        Inode::new_file(1, ROOT_INO, perm, uid, gid)
    }

    #[test]
    fn test_owner_triplet() {
        let perms = Permissions::default();
        let inode = file(0o640, 1000, 100);
        let owner = CallerContext::new(1000, 555);
        assert!(perms.allows(&inode, &owner, Access::READ | Access::WRITE));
        assert!(!perms.allows(&inode, &owner, Access::EXECUTE));
    }

    #[test]
    fn test_group_triplet() {
        let perms = Permissions::default();
        let inode = file(0o640, 1000, 100);
        let member = CallerContext::new(2000, 100);
        assert!(perms.allows(&inode, &member, Access::READ));
        assert!(!perms.allows(&inode, &member, Access::WRITE));
    }

    #[test]
    fn test_other_triplet() {
        let perms = Permissions::default();
        let inode = file(0o604, 1000, 100);
        let stranger = CallerContext::new(2000, 200);
        assert!(perms.allows(&inode, &stranger, Access::READ));
        assert!(!perms.allows(&inode, &stranger, Access::READ | Access::WRITE));
    }

    #[test]
    fn test_owner_triplet_wins_over_other() {
        // Owner bits apply even when "other" would grant more.
        let perms = Permissions::default();
        let inode = file(0o007, 1000, 100);
        let owner = CallerContext::new(1000, 100);
        assert!(!perms.allows(&inode, &owner, Access::READ));
    }

    #[test]
    fn test_empty_access_always_passes() {
        let perms = Permissions::default();
        let inode = file(0o000, 1000, 100);
        assert!(perms.allows(&inode, &CallerContext::new(5, 5), Access::empty()));
    }

    #[test]
    fn test_privileged_bypass() {
        let inode = file(0o000, 1000, 100);
        let perms = Permissions::new(true);
        assert!(perms.allows(&inode, &CallerContext::root(), Access::all()));
        assert!(perms.allows(&inode, &CallerContext::new(1234, 0), Access::all()));

        let strict = Permissions::new(false);
        assert!(strict.allows(&inode, &CallerContext::new(0, 999), Access::all()));
        assert!(!strict.allows(&inode, &CallerContext::new(1234, 0), Access::READ));
    }

    #[test]
    fn test_can_traverse() {
        let mut table = InodeTable::new(4, |ino| Inode::directory(ino, None, 0o755, 0, 0));
        let locked = table.allocate(|ino| Inode::directory(ino, Some(ROOT_INO), 0o700, 0, 0));
        let inner = table.allocate(|ino| Inode::directory(ino, Some(locked), 0o777, 0, 0));

        let perms = Permissions::new(false);
        let user = CallerContext::new(1000, 1000);
        assert!(perms.can_traverse(&table, Some(ROOT_INO), &user));
        assert!(!perms.can_traverse(&table, Some(inner), &user));
        assert!(perms.can_traverse(&table, None, &user));
        assert!(perms.can_traverse(&table, Some(inner), &CallerContext::root()));
    }
}
