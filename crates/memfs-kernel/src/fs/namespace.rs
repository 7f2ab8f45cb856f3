//! Operations that change which names exist.

use tracing::debug;

use super::{FsState, canonical};
use crate::error::{FsError, FsResult};
use crate::inode::Inode;
use crate::path;
use crate::perm::Access;
use crate::resolve::Resolution;
use crate::types::{CallerContext, FileType, Ino, PERM_MASK, ROOT_INO};

impl FsState {
    pub(crate) fn mknod(&mut self, ctx: &CallerContext, raw: &str, mode: u32) -> FsResult<Ino> {
        self.make_node(ctx, raw, mode, FileType::File)
    }

    pub(crate) fn mkdir(&mut self, ctx: &CallerContext, raw: &str, mode: u32) -> FsResult<Ino> {
        self.make_node(ctx, raw, mode, FileType::Directory)
    }

    /// Shared body of mknod and mkdir. Type bits in `mode` are ignored.
    fn make_node(
        &mut self,
        ctx: &CallerContext,
        raw: &str,
        mode: u32,
        kind: FileType,
    ) -> FsResult<Ino> {
        let path = canonical(raw)?;
        if self.resolve(&path).found().is_some() {
            return Err(FsError::already_exists(path));
        }
        let (parent, name) = self.entry_location(&path)?;
        if !self.can_traverse(parent, ctx) || !self.allows(parent, ctx, Access::WRITE) {
            return Err(FsError::permission_denied(path));
        }

        let perm = mode & !ctx.umask & PERM_MASK;
        let ino = self.table.allocate(|ino| match kind {
            FileType::Directory => Inode::directory(ino, Some(parent), perm, ctx.uid, ctx.gid),
            FileType::File => Inode::new_file(ino, parent, perm, ctx.uid, ctx.gid),
        });

        let parent_inode = &mut self.table[parent];
        if kind.is_dir() {
            // The new `..` links back to the parent.
            parent_inode.nlink += 1;
        }
        parent_inode.times.touch_content();
        self.dir_mut(parent).insert(name, ino);

        debug!(ino, parent, name, ?kind, "created node");
        Ok(ino)
    }

    /// Hard link `newraw` to the file at `raw`. Returns the linked inode.
    pub(crate) fn link(&mut self, ctx: &CallerContext, raw: &str, newraw: &str) -> FsResult<Ino> {
        let path = canonical(raw)?;
        let newpath = canonical(newraw)?;
        if self.resolve(&newpath).found().is_some() {
            return Err(FsError::already_exists(newpath));
        }

        let target = match self.resolve(&path) {
            Resolution::Found(ino) => ino,
            Resolution::NotFound => return Err(FsError::not_found(path)),
            Resolution::PrefixNotDir => return Err(FsError::not_a_directory(path)),
        };
        let (parent, name) = self.entry_location(&newpath)?;
        if self.table[target].is_dir() {
            return Err(FsError::not_permitted(format!("{path}: cannot link a directory")));
        }
        if !self.can_reach(&path, ctx)
            || !self.can_traverse(parent, ctx)
            || !self.allows(parent, ctx, Access::WRITE)
        {
            return Err(FsError::permission_denied(newpath));
        }

        self.dir_mut(parent).insert(name, target);
        self.table[parent].times.touch_content();
        let inode = &mut self.table[target];
        inode.nlink += 1;
        inode.times.touch_meta();

        debug!(ino = target, nlink = inode.nlink, %newpath, "linked");
        Ok(target)
    }

    pub(crate) fn unlink(&mut self, ctx: &CallerContext, raw: &str) -> FsResult<()> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if self.table[ino].is_dir() {
            return Err(FsError::is_a_directory(path));
        }
        let (parent, name) = self.entry_location(&path)?;
        if !self.can_traverse(parent, ctx) || !self.allows(parent, ctx, Access::WRITE) {
            return Err(FsError::permission_denied(path));
        }

        self.dir_mut(parent).remove(name);
        self.table[parent].times.touch_content();
        let inode = &mut self.table[ino];
        inode.nlink -= 1;
        inode.times.touch_meta();
        debug!(ino, nlink = inode.nlink, open = inode.open_count, "unlinked");

        self.reclaim_if_unreferenced(ino);
        Ok(())
    }

    pub(crate) fn rmdir(&mut self, ctx: &CallerContext, raw: &str) -> FsResult<()> {
        let path = canonical(raw)?;
        let ino = self.lookup(&path)?;
        if !self.table[ino].is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        if ino == ROOT_INO {
            return Err(FsError::busy(path));
        }
        let (parent, name) = self.entry_location(&path)?;
        if !self.can_traverse(parent, ctx) || !self.allows(parent, ctx, Access::WRITE) {
            return Err(FsError::permission_denied(path));
        }
        if self.table[ino].dir().is_some_and(|dir| !dir.is_empty()) {
            return Err(FsError::directory_not_empty(path));
        }

        self.dir_mut(parent).remove(name);
        let parent_inode = &mut self.table[parent];
        parent_inode.nlink -= 1;
        parent_inode.times.touch_content();
        self.table.release(ino);

        debug!(ino, parent, "removed directory");
        Ok(())
    }

    pub(crate) fn rename(&mut self, ctx: &CallerContext, oldraw: &str, newraw: &str) -> FsResult<()> {
        let oldpath = canonical(oldraw)?;
        let newpath = canonical(newraw)?;

        let src = self.lookup(&oldpath)?;
        if src == ROOT_INO {
            return Err(FsError::busy(oldpath));
        }
        if newpath == "/" {
            return Err(FsError::busy(newpath));
        }
        if path::is_strict_ancestor(&oldpath, &newpath) {
            return Err(FsError::invalid_argument(format!(
                "cannot move {oldpath} into its own subtree {newpath}"
            )));
        }

        let dst = match self.resolve(&newpath) {
            Resolution::Found(ino) => Some(ino),
            Resolution::NotFound => None,
            Resolution::PrefixNotDir => return Err(FsError::not_a_directory(newpath)),
        };
        if dst == Some(src) {
            return Ok(());
        }

        let src_is_dir = self.table[src].is_dir();
        if let Some(dst) = dst {
            let existing = &self.table[dst];
            match (existing.is_dir(), src_is_dir) {
                (true, false) => return Err(FsError::is_a_directory(newpath)),
                (false, true) => return Err(FsError::not_a_directory(newpath)),
                (true, true) if existing.dir().is_some_and(|dir| !dir.is_empty()) => {
                    return Err(FsError::directory_not_empty(newpath));
                }
                _ => {}
            }
        }

        let (new_parent, new_name) = self.entry_location(&newpath)?;
        let (old_parent, old_name) = self.entry_location(&oldpath)?;
        // `..` components can reach the source without a textual prefix.
        if src_is_dir && self.is_within(new_parent, src) {
            return Err(FsError::invalid_argument(format!(
                "cannot move {oldpath} into its own subtree {newpath}"
            )));
        }

        let permitted = self.can_traverse(old_parent, ctx)
            && self.can_traverse(new_parent, ctx)
            && self.allows(old_parent, ctx, Access::WRITE)
            && self.allows(new_parent, ctx, Access::WRITE)
            // Moving a directory rewrites its `..` entry.
            && (!src_is_dir || self.allows(src, ctx, Access::WRITE));
        if !permitted {
            return Err(FsError::permission_denied(newpath));
        }

        if let Some(dst) = dst {
            self.dir_mut(new_parent).remove(new_name);
            if self.table[dst].is_dir() {
                // Already proven empty; its `..` no longer links the parent.
                self.table[new_parent].nlink -= 1;
                self.table.release(dst);
            } else {
                let replaced = &mut self.table[dst];
                replaced.nlink -= 1;
                replaced.times.touch_meta();
                self.reclaim_if_unreferenced(dst);
            }
        }

        self.dir_mut(new_parent).insert(new_name, src);
        self.dir_mut(old_parent).remove(old_name);

        self.table[src].parent = Some(new_parent);
        if src_is_dir {
            self.dir_mut(src).set_parent(new_parent);
            if old_parent != new_parent {
                self.table[old_parent].nlink -= 1;
                self.table[new_parent].nlink += 1;
            }
        }

        self.table[old_parent].times.touch_content();
        self.table[new_parent].times.touch_content();
        self.table[src].times.touch_meta();

        debug!(ino = src, %oldpath, %newpath, replaced = ?dst, "renamed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::FsConfig;
    use crate::error::FsError;
    use crate::fs::MemFs;
    use crate::ops::FsOps;
    use crate::resolve::Resolution;
    use crate::types::{CallerContext, ROOT_INO, S_IFDIR, S_IFREG};

    fn root() -> CallerContext {
        CallerContext::root()
    }

    fn nlink(fs: &MemFs, path: &str) -> u32 {
        fs.getattr(&root(), path).unwrap().nlink
    }

    #[test]
    fn test_mkdir_sets_up_dot_entries() {
        let fs = MemFs::default();
        let attr = fs.mkdir(&root(), "/d", 0o755).unwrap();
        assert_eq!(attr.mode, S_IFDIR | 0o755);
        assert_eq!(attr.nlink, 2);
        assert_eq!(attr.size, 2);

        let d = attr.ino;
        assert_eq!(fs.resolve("/d/."), Resolution::Found(d));
        assert_eq!(fs.resolve("/d/.."), Resolution::Found(ROOT_INO));
        assert_eq!(nlink(&fs, "/"), 3);
    }

    #[test]
    fn test_mkdir_twice_already_exists() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/dir", 0o755).unwrap();
        assert!(matches!(
            fs.mkdir(&root(), "/dir", 0o755),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mkdir_missing_parent() {
        let fs = MemFs::default();
        assert!(matches!(
            fs.mkdir(&root(), "/nope/d", 0o755),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_mknod_under_file_is_not_a_directory() {
        let fs = MemFs::default();
        fs.mknod(&root(), "/f", 0o644).unwrap();
        assert!(matches!(
            fs.mknod(&root(), "/f/g", 0o644),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            fs.mkdir(&root(), "/f/g/h", 0o755),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_mknod_applies_umask_and_ignores_type() {
        let fs = MemFs::default();
        let ctx = CallerContext::new(1000, 1000).with_umask(0o022);
        let attr = fs.mknod(&ctx, "/f", S_IFDIR | 0o666).unwrap();
        assert_eq!(attr.mode, S_IFREG | 0o644);
        assert_eq!(attr.uid, 1000);
        assert_eq!(attr.gid, 1000);
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn test_mkdir_does_not_touch_parent_atime() {
        let fs = MemFs::default();
        let p = fs.mkdir(&root(), "/p", 0o755).unwrap().ino;
        let before = fs.lock().table[p].times;
        std::thread::sleep(std::time::Duration::from_millis(5));
        fs.mkdir(&root(), "/p/c", 0o755).unwrap();
        let after = fs.lock().table[p].times;
        assert_eq!(before.atime, after.atime);
        assert!(after.mtime > before.mtime);
        assert!(after.ctime > before.ctime);
    }

    #[test]
    fn test_name_too_long() {
        let fs = MemFs::default();
        let name = format!("/{}", "x".repeat(256));
        assert!(matches!(
            fs.mknod(&root(), &name, 0o644),
            Err(FsError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_rmdir_updates_parent_link_count() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/a", 0o755).unwrap();
        fs.mkdir(&root(), "/a/b", 0o755).unwrap();
        assert_eq!(nlink(&fs, "/a"), 3);
        fs.rmdir(&root(), "/a/b").unwrap();
        assert_eq!(nlink(&fs, "/a"), 2);
    }

    #[test]
    fn test_rmdir_errors() {
        let fs = MemFs::default();
        fs.mknod(&root(), "/f", 0o644).unwrap();
        assert!(matches!(fs.rmdir(&root(), "/f"), Err(FsError::NotADirectory(_))));
        assert!(matches!(fs.rmdir(&root(), "/"), Err(FsError::Busy(_))));
        assert!(matches!(fs.rmdir(&root(), "/gone"), Err(FsError::NotFound(_))));

        fs.mkdir(&root(), "/d", 0o755).unwrap();
        assert!(matches!(
            fs.rmdir(&root(), "/d/."),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unlink_directory_is_eisdir() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/d", 0o755).unwrap();
        assert!(matches!(fs.unlink(&root(), "/d"), Err(FsError::IsADirectory(_))));
        assert!(matches!(fs.unlink(&root(), "/"), Err(FsError::IsADirectory(_))));
    }

    #[test]
    fn test_link_rules() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/d", 0o755).unwrap();
        fs.mknod(&root(), "/f", 0o644).unwrap();

        assert!(matches!(
            fs.link(&root(), "/d", "/d2"),
            Err(FsError::NotPermitted(_))
        ));
        assert!(matches!(
            fs.link(&root(), "/f", "/d"),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(
            fs.link(&root(), "/missing", "/x"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            fs.link(&root(), "/f", "/nope/x"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            fs.link(&root(), "/f", "/f/x"),
            Err(FsError::NotADirectory(_))
        ));

        let attr = fs.link(&root(), "/f", "/d/f2").unwrap();
        assert_eq!(attr.nlink, 2);
        assert_eq!(fs.resolve("/d/f2"), fs.resolve("/f"));
    }

    #[test]
    fn test_unlink_through_other_parent() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/d", 0o755).unwrap();
        fs.mknod(&root(), "/f", 0o644).unwrap();
        fs.link(&root(), "/f", "/d/g").unwrap();

        fs.unlink(&root(), "/d/g").unwrap();
        assert_eq!(fs.resolve("/d/g"), Resolution::NotFound);
        assert_eq!(nlink(&fs, "/f"), 1);
        assert_eq!(fs.getattr(&root(), "/d").unwrap().size, 2);
    }

    #[test]
    fn test_rename_moves_directory_between_parents() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/a", 0o755).unwrap();
        fs.mkdir(&root(), "/b", 0o755).unwrap();
        fs.mkdir(&root(), "/a/sub", 0o755).unwrap();
        let sub = fs.resolve("/a/sub").found().unwrap();
        let b = fs.resolve("/b").found().unwrap();

        fs.rename(&root(), "/a/sub", "/b/moved").unwrap();
        assert_eq!(fs.resolve("/b/moved"), Resolution::Found(sub));
        assert_eq!(fs.resolve("/b/moved/.."), Resolution::Found(b));
        assert_eq!(fs.resolve("/a/sub"), Resolution::NotFound);
        assert_eq!(nlink(&fs, "/a"), 2);
        assert_eq!(nlink(&fs, "/b"), 3);
        assert_eq!(fs.lock().table[sub].parent, Some(b));
    }

    #[test]
    fn test_rename_deep_directory_then_remove() {
        let fs = MemFs::default();
        for p in ["/1", "/1/2", "/1/2/3", "/1/2/3/4"] {
            fs.mkdir(&root(), p, 0o755).unwrap();
        }
        fs.rename(&root(), "/1/2/3", "/3").unwrap();
        fs.rmdir(&root(), "/3/4").unwrap();
        fs.rmdir(&root(), "/3").unwrap();
        assert_eq!(nlink(&fs, "/1/2"), 2);
        assert_eq!(nlink(&fs, "/"), 3);
    }

    #[test]
    fn test_rename_over_empty_directory() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/src", 0o755).unwrap();
        fs.mkdir(&root(), "/dst", 0o755).unwrap();
        let src = fs.resolve("/src").found().unwrap();
        let before = fs.inode_count();

        fs.rename(&root(), "/src", "/dst").unwrap();
        assert_eq!(fs.resolve("/dst"), Resolution::Found(src));
        assert_eq!(fs.resolve("/src"), Resolution::NotFound);
        assert_eq!(fs.inode_count(), before - 1);
        assert_eq!(nlink(&fs, "/"), 3);
    }

    #[test]
    fn test_rename_type_mismatch() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/d", 0o755).unwrap();
        fs.mknod(&root(), "/f", 0o644).unwrap();
        assert!(matches!(
            fs.rename(&root(), "/f", "/d"),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.rename(&root(), "/d", "/f"),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_rename_onto_non_empty_directory() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/a", 0o755).unwrap();
        fs.mkdir(&root(), "/b", 0o755).unwrap();
        fs.mknod(&root(), "/b/f", 0o644).unwrap();
        assert!(matches!(
            fs.rename(&root(), "/a", "/b"),
            Err(FsError::DirectoryNotEmpty(_))
        ));
    }

    #[test]
    fn test_rename_into_own_subtree() {
        let fs = MemFs::default();
        fs.mkdir(&root(), "/a", 0o755).unwrap();
        assert!(matches!(
            fs.rename(&root(), "/a", "/a/b"),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rename_into_own_subtree_through_dot_dot() {
        let fs = MemFs::default();
        let a = fs.mkdir(&root(), "/a", 0o755).unwrap().ino;
        fs.mkdir(&root(), "/b", 0o755).unwrap();
        fs.mkdir(&root(), "/a/inner", 0o755).unwrap();
        let root_links = nlink(&fs, "/");

        assert!(matches!(
            fs.rename(&root(), "/a", "/b/../a/c"),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            fs.rename(&root(), "/b/../a", "/a/inner/c"),
            Err(FsError::InvalidArgument(_))
        ));
        assert_eq!(fs.resolve("/a").found(), Some(a));
        assert!(fs.resolve("/a/c").found().is_none());
        assert_eq!(nlink(&fs, "/"), root_links);
    }

    #[test]
    fn test_rename_hard_links_to_same_inode_is_noop() {
        let fs = MemFs::default();
        fs.mknod(&root(), "/f", 0o644).unwrap();
        fs.link(&root(), "/f", "/g").unwrap();
        fs.rename(&root(), "/f", "/g").unwrap();
        assert!(fs.resolve("/f").found().is_some());
        assert!(fs.resolve("/g").found().is_some());
        assert_eq!(nlink(&fs, "/f"), 2);
    }

    #[test]
    fn test_rename_root_and_missing() {
        let fs = MemFs::default();
        assert!(matches!(fs.rename(&root(), "/", "/x"), Err(FsError::Busy(_))));
        fs.mkdir(&root(), "/d", 0o755).unwrap();
        assert!(matches!(fs.rename(&root(), "/d", "/"), Err(FsError::Busy(_))));
        assert!(matches!(fs.rename(&root(), "/d", "//"), Err(FsError::Busy(_))));
        assert!(matches!(
            fs.rename(&root(), "/missing", "/x"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(fs.rename(&root(), "", "/x"), Err(FsError::NotFound(_))));

        fs.mknod(&root(), "/f", 0o644).unwrap();
        assert!(matches!(
            fs.rename(&root(), "/f", "/nope/x"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            fs.rename(&root(), "/f", "/f/x"),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rename_within_same_directory_keeps_link_count() {
        let fs = MemFs::new(FsConfig::default());
        fs.mkdir(&root(), "/p", 0o755).unwrap();
        fs.mkdir(&root(), "/p/x", 0o755).unwrap();
        fs.rename(&root(), "/p/x", "/p/y").unwrap();
        assert_eq!(nlink(&fs, "/p"), 3);
        assert_eq!(fs.resolve("/p/y/.."), fs.resolve("/p"));
    }
}
