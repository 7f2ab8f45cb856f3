//! Open file and directory handles.
//!
//! A handle pins its inode: an unlinked file stays readable until the last
//! handle goes away. Dropping a handle closes it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FsResult;
use crate::fs::FsState;
use crate::types::{CallerContext, DirEntry, FileAttr, Ino};

/// An open regular file.
///
/// Permission checks on read and write use the caller identity captured
/// at open time.
pub struct FileHandle {
    state: Arc<Mutex<FsState>>,
    ino: Ino,
    generation: u64,
    ctx: CallerContext,
}

impl FileHandle {
    pub(crate) fn new(
        state: Arc<Mutex<FsState>>,
        ino: Ino,
        generation: u64,
        ctx: CallerContext,
    ) -> Self {
        Self {
            state,
            ino,
            generation,
            ctx,
        }
    }

    pub fn ino(&self) -> Ino {
        self.ino
    }

    /// Read up to `size` bytes at `offset`. Short at end of file, empty
    /// past it.
    pub fn read(&self, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        self.state
            .lock()
            .read(self.ino, self.generation, &self.ctx, size, offset)
    }

    /// Write `data` at `offset`, extending the file as needed. Writing
    /// beyond the current end of file is `InvalidArgument`.
    pub fn write(&self, data: &[u8], offset: u64) -> FsResult<usize> {
        self.state
            .lock()
            .write(self.ino, self.generation, &self.ctx, data, offset)
    }

    pub fn attr(&self) -> FsResult<FileAttr> {
        self.state.lock().handle_attr(self.ino, self.generation)
    }

    /// Close explicitly. Same as dropping.
    pub fn close(self) {}
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.state.lock().close_file(self.ino, self.generation);
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("ino", &self.ino)
            .field("generation", &self.generation)
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// An open directory.
pub struct DirHandle {
    state: Arc<Mutex<FsState>>,
    ino: Ino,
    generation: u64,
    ctx: CallerContext,
}

impl DirHandle {
    pub(crate) fn new(
        state: Arc<Mutex<FsState>>,
        ino: Ino,
        generation: u64,
        ctx: CallerContext,
    ) -> Self {
        Self {
            state,
            ino,
            generation,
            ctx,
        }
    }

    pub fn ino(&self) -> Ino {
        self.ino
    }

    /// All entries, `.` and `..` included, in name order.
    ///
    /// Fails with `StaleHandle` once the directory has been removed.
    pub fn readdir(&self) -> FsResult<Vec<DirEntry>> {
        self.state
            .lock()
            .readdir(self.ino, self.generation, &self.ctx)
    }

    pub fn close(self) {}
}

impl Drop for DirHandle {
    fn drop(&mut self) {
        self.state.lock().close_dir(self.ino, self.generation);
    }
}

impl fmt::Debug for DirHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirHandle")
            .field("ino", &self.ino)
            .field("generation", &self.generation)
            .finish()
    }
}
