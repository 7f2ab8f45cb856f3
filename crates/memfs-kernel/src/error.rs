//! Filesystem error types.

use std::io;
use thiserror::Error;

/// Recoverable filesystem error.
///
/// Every variant corresponds to a POSIX errno that a transport hands back to
/// the host kernel (see [`FsError::errno`]). Engine invariant violations are
/// not represented here: they panic.
#[derive(Debug, Error)]
pub enum FsError {
    /// A path component does not exist (`ENOENT`).
    #[error("not found: {0}")]
    NotFound(String),

    /// A path prefix or the target is not a directory (`ENOTDIR`).
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The target is a directory where a file was required (`EISDIR`).
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// The target already exists (`EEXIST`).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Mode bits deny the requested access (`EACCES`).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The caller lacks ownership or privilege (`EPERM`).
    #[error("operation not permitted: {0}")]
    NotPermitted(String),

    /// Directory still has entries besides `.` and `..` (`ENOTEMPTY`).
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Malformed request (`EINVAL`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The root directory cannot be removed or moved (`EBUSY`).
    #[error("resource busy: {0}")]
    Busy(String),

    /// Final path component exceeds the name limit (`ENAMETOOLONG`).
    #[error("file name too long: {0}")]
    NameTooLong(String),

    /// File content would exceed the configured capacity (`ENOSPC`).
    #[error("no space left: {0}")]
    NoSpace(String),

    /// The handle's inode was removed underneath it (`ENOENT`).
    #[error("stale handle for inode {0}")]
    StaleHandle(u64),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotPermitted error.
    pub fn not_permitted(path: impl Into<String>) -> Self {
        Self::NotPermitted(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a Busy error.
    pub fn busy(path: impl Into<String>) -> Self {
        Self::Busy(path.into())
    }

    /// Create a NoSpace error.
    pub fn no_space(msg: impl Into<String>) -> Self {
        Self::NoSpace(msg.into())
    }

    /// Positive POSIX errno for this error. Transports negate it.
    #[cfg(unix)]
    pub fn errno(&self) -> i32 {
        use rustix::io::Errno;

        let errno = match self {
            FsError::NotFound(_) | FsError::StaleHandle(_) => Errno::NOENT,
            FsError::NotADirectory(_) => Errno::NOTDIR,
            FsError::IsADirectory(_) => Errno::ISDIR,
            FsError::AlreadyExists(_) => Errno::EXIST,
            FsError::PermissionDenied(_) => Errno::ACCESS,
            FsError::NotPermitted(_) => Errno::PERM,
            FsError::DirectoryNotEmpty(_) => Errno::NOTEMPTY,
            FsError::InvalidArgument(_) => Errno::INVAL,
            FsError::Busy(_) => Errno::BUSY,
            FsError::NameTooLong(_) => Errno::NAMETOOLONG,
            FsError::NoSpace(_) => Errno::NOSPC,
        };
        errno.raw_os_error()
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match &e {
            FsError::NotFound(_) | FsError::StaleHandle(_) => io::ErrorKind::NotFound,
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied(_) | FsError::NotPermitted(_) => {
                io::ErrorKind::PermissionDenied
            }
            FsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::InvalidArgument(_) | FsError::NameTooLong(_) => io::ErrorKind::InvalidInput,
            FsError::Busy(_) => io::ErrorKind::ResourceBusy,
            FsError::NoSpace(_) => io::ErrorKind::StorageFull,
        };
        io::Error::new(kind, e)
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
