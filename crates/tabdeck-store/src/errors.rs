//! Filesystem error classification and store error types.
//!
//! Every `std::io::Error` that reaches the writer or reader is reduced to an
//! [`ErrorClass`] once, at the boundary. Branching never looks at raw OS
//! codes. The stable code string from [`error_code`] is kept only for
//! reporting.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// How the store reacts to a filesystem error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The file does not exist.
    Absent,
    /// Permission denied, operation not permitted, or read-only filesystem.
    AccessDenied,
    /// Rename blocked by a cross-device link, an existing or busy target,
    /// or a stale handle. Worked around with copy-then-delete.
    RenameContention,
    /// Content was read but is not a manifest.
    Corruption,
    /// Anything else.
    Other,
}

impl ErrorClass {
    /// Classify an I/O error by its kind.
    pub fn classify(err: &io::Error) -> Self {
        use io::ErrorKind as K;
        match err.kind() {
            K::NotFound => Self::Absent,
            K::PermissionDenied | K::ReadOnlyFilesystem => Self::AccessDenied,
            K::CrossesDevices
            | K::AlreadyExists
            | K::DirectoryNotEmpty
            | K::ResourceBusy
            | K::StaleNetworkFileHandle => Self::RenameContention,
            K::InvalidData => Self::Corruption,
            _ => Self::Other,
        }
    }

    /// Short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::AccessDenied => "access_denied",
            Self::RenameContention => "rename_contention",
            Self::Corruption => "corruption",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable code string for an I/O error (`EACCES`, `EXDEV`, ...).
///
/// Uses the OS errno name when the error carries one, otherwise a
/// representative name for its kind.
pub fn error_code(err: &io::Error) -> &'static str {
    err.raw_os_error()
        .and_then(errno_name)
        .unwrap_or_else(|| kind_code(err.kind()))
}

#[cfg(unix)]
fn errno_name(raw: i32) -> Option<&'static str> {
    use rustix::io::Errno;

    const NAMES: &[(Errno, &str)] = &[
        (Errno::ACCESS, "EACCES"),
        (Errno::PERM, "EPERM"),
        (Errno::ROFS, "EROFS"),
        (Errno::NOENT, "ENOENT"),
        (Errno::XDEV, "EXDEV"),
        (Errno::EXIST, "EEXIST"),
        (Errno::NOTEMPTY, "ENOTEMPTY"),
        (Errno::BUSY, "EBUSY"),
        (Errno::STALE, "ESTALE"),
        (Errno::ISDIR, "EISDIR"),
        (Errno::NOTDIR, "ENOTDIR"),
        (Errno::NOSPC, "ENOSPC"),
        (Errno::IO, "EIO"),
        (Errno::INVAL, "EINVAL"),
    ];

    let errno = Errno::from_raw_os_error(raw);
    NAMES
        .iter()
        .find(|(known, _)| *known == errno)
        .map(|(_, name)| *name)
}

#[cfg(not(unix))]
fn errno_name(_raw: i32) -> Option<&'static str> {
    None
}

fn kind_code(kind: io::ErrorKind) -> &'static str {
    use io::ErrorKind as K;
    match kind {
        K::NotFound => "ENOENT",
        K::PermissionDenied => "EACCES",
        K::ReadOnlyFilesystem => "EROFS",
        K::CrossesDevices => "EXDEV",
        K::AlreadyExists => "EEXIST",
        K::DirectoryNotEmpty => "ENOTEMPTY",
        K::ResourceBusy => "EBUSY",
        K::StaleNetworkFileHandle => "ESTALE",
        K::IsADirectory => "EISDIR",
        K::NotADirectory => "ENOTDIR",
        K::StorageFull => "ENOSPC",
        K::InvalidData | K::InvalidInput => "EINVAL",
        _ => "EIO",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WriteError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from [`ManifestWriter::write`](crate::writer::ManifestWriter::write).
#[derive(Debug, Error)]
pub enum WriteError {
    /// The manifest could not be serialized.
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The primary manifest directory could not be created.
    #[error("unable to create manifest directory {}: {code}", path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Stable error code.
        code: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A tier failed with an error that does not allow escalation.
    #[error("manifest write to {} failed ({class}): {code}", path.display())]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Classification of the failure.
        class: ErrorClass,
        /// Stable error code.
        code: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Every tier was denied.
    #[error(
        "Unable to write manifest to {}. {}",
        path.display(),
        exhausted_hint(*fallback_configured)
    )]
    Exhausted {
        /// Last path attempted.
        path: PathBuf,
        /// Code of the last error.
        code: &'static str,
        /// Whether an alternate path was tried.
        fallback_configured: bool,
        /// Last underlying I/O error.
        #[source]
        source: io::Error,
    },
}

fn exhausted_hint(fallback_configured: bool) -> &'static str {
    if fallback_configured {
        "Neither the manifest path nor the alternate path is writable."
    } else {
        "The path is not writable and no fallback path is configured."
    }
}

impl WriteError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            class: ErrorClass::classify(&source),
            code: error_code(&source),
            source,
        }
    }

    /// Path the failure relates to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Serialize(_) => None,
            Self::CreateDir { path, .. } | Self::Io { path, .. } | Self::Exhausted { path, .. } => {
                Some(path)
            }
        }
    }

    /// Stable error code, if the failure came from the filesystem.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Serialize(_) => None,
            Self::CreateDir { code, .. } | Self::Io { code, .. } | Self::Exhausted { code, .. } => {
                Some(code)
            }
        }
    }

    /// Whether the message and details may be shown to a client.
    ///
    /// Only tier exhaustion is reported verbatim; everything else is an
    /// internal error.
    pub fn is_exposable(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReadError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from [`ManifestReader::read`](crate::reader::ManifestReader::read).
///
/// Missing and access-denied candidates are skipped, never reported.
#[derive(Debug, Error)]
pub enum ReadError {
    /// A candidate exists but does not hold valid JSON.
    #[error("manifest at {} is not valid JSON: {source}", path.display())]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// A candidate could not be read for a reason other than absence or
    /// access denial.
    #[error("failed to read manifest at {}: {code}", path.display())]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Stable error code.
        code: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ReadError {
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            code: error_code(&source),
            source,
        }
    }

    /// Path of the candidate that failed.
    pub fn path(&self) -> &Path {
        match self {
            Self::Corrupt { path, .. } | Self::Io { path, .. } => path,
        }
    }
}
