//! # memfs-kernel
//!
//! In-memory POSIX-style filesystem engine.
//!
//! The engine keeps inodes in a growable slot table, resolves absolute
//! paths against it, and enforces owner/group/other permissions for the
//! caller identity passed with every request. A transport (FUSE, a test
//! harness, the `memfs` shell) translates host requests into [`FsOps`]
//! calls and hands [`FsError::errno`] back on failure.
//!
//! - [`MemFs`] - The engine. Clone it freely; clones share one namespace.
//! - [`FsOps`] - Path-based operations plus convenience helpers.
//! - [`FileHandle`] / [`DirHandle`] - Open handles; dropping one closes it.
//!
//! ```
//! use memfs_kernel::{CallerContext, FsOps, MemFs};
//!
//! let fs = MemFs::default();
//! let ctx = CallerContext::root();
//! fs.mkdir(&ctx, "/docs", 0o755).unwrap();
//! fs.write_all(&ctx, "/docs/readme", b"hello").unwrap();
//! assert_eq!(fs.read_all(&ctx, "/docs/readme").unwrap(), b"hello");
//! ```

pub mod config;
mod error;
mod fs;
mod handle;
pub mod inode;
mod ops;
pub mod path;
mod perm;
mod resolve;
pub mod table;
mod types;

pub use config::{ConfigError, FsConfig};
pub use error::{FsError, FsResult};
pub use fs::MemFs;
pub use handle::{DirHandle, FileHandle};
pub use ops::FsOps;
pub use perm::{Access, Permissions};
pub use resolve::Resolution;
pub use types::{
    CallerContext, DirEntry, FileAttr, FileType, Ino, NAME_MAX, PERM_MASK, ROOT_INO, S_IFDIR,
    S_IFMT, S_IFREG, StatFs, TimeSpec, UTIME_NOW, UTIME_OMIT,
};
