/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Error taxonomy shared by every filesystem in this crate.
//!
//! Operations fail with a [`PathError`], a [`LinkError`] or a
//! [`SyscallError`] envelope wrapping one of the canonical [`ErrorKind`]
//! values. Envelope paths are always the strings the caller supplied, never
//! the resolved form; decorators rewrite them into their own namespace.

use thiserror::Error;

/// Canonical error kinds, with Unix error texts.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The path does not resolve to an existing node.
    #[error("no such file or directory")]
    NotFound,
    /// A node already exists where one was to be created.
    #[error("file exists")]
    AlreadyExists,
    /// A non-directory was found where a directory is required.
    #[error("not a directory")]
    NotADirectory,
    /// A directory was found where a non-directory is required.
    #[error("is a directory")]
    IsADirectory,
    /// Removal target still has children.
    #[error("directory not empty")]
    DirNotEmpty,
    /// The caller lacks the permission bits the operation needs.
    #[error("permission denied")]
    PermissionDenied,
    /// The operation is reserved for the owner or the admin user.
    #[error("operation not permitted")]
    NotPermitted,
    /// The handle was opened without the capability the call requires.
    #[error("bad file descriptor")]
    BadFileDescriptor,
    /// A positioned read or write was given a negative offset.
    #[error("negative offset")]
    NegativeOffset,
    #[error("invalid argument")]
    InvalidArgument,
    /// Path resolution crossed more symbolic links than the hop bound.
    #[error("too many levels of symbolic links")]
    TooManySymlinks,
    /// The handle was closed before the call.
    #[error("file already closed")]
    Closed,
    /// The handle is shutting down concurrently with the call.
    #[error("use of closed file")]
    FileClosing,
    /// Glob pattern could not be parsed.
    #[error("syntax error in pattern")]
    BadPattern,
    #[error("unknown user")]
    UnknownUser,
    #[error("unknown group")]
    UnknownGroup,
    #[error("not implemented")]
    NotImplemented,
}

/// Error envelope for single-path operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} {path}: {kind}")]
pub struct PathError {
    /// Operation verb, e.g. `"mkdir"` or `"open"`.
    pub op: &'static str,
    /// Path as supplied by the caller.
    pub path: String,
    pub kind: ErrorKind,
}

impl PathError {
    pub fn new(op: &'static str, path: impl Into<String>, kind: ErrorKind) -> Self {
        PathError { op, path: path.into(), kind }
    }
}

/// Error envelope for two-path operations (`link`, `symlink`, `rename`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} {old} {new}: {kind}")]
pub struct LinkError {
    pub op: &'static str,
    pub old: String,
    pub new: String,
    pub kind: ErrorKind,
}

impl LinkError {
    pub fn new(
        op: &'static str,
        old: impl Into<String>,
        new: impl Into<String>,
        kind: ErrorKind,
    ) -> Self {
        LinkError { op, old: old.into(), new: new.into(), kind }
    }
}

/// Error envelope for directory-read primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{syscall}: {kind}")]
pub struct SyscallError {
    pub syscall: &'static str,
    pub kind: ErrorKind,
}

impl SyscallError {
    pub fn new(syscall: &'static str, kind: ErrorKind) -> Self {
        SyscallError { syscall, kind }
    }
}

/// Any error a [`crate::Vfs`] operation can return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Syscall(#[from] SyscallError),
    #[error(transparent)]
    Kind(#[from] ErrorKind),
}

impl VfsError {
    /// The canonical kind inside the envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::Path(e) => e.kind,
            VfsError::Link(e) => e.kind,
            VfsError::Syscall(e) => e.kind,
            VfsError::Kind(kind) => *kind,
        }
    }

    /// True when the error reports that a node already exists.
    pub fn is_exist(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    /// True when the error reports that a node does not exist.
    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type VfsResult<T> = Result<T, VfsError>;

pub(crate) fn path_err(op: &'static str, path: impl Into<String>, kind: ErrorKind) -> VfsError {
    VfsError::Path(PathError::new(op, path, kind))
}

pub(crate) fn link_err(
    op: &'static str,
    old: impl Into<String>,
    new: impl Into<String>,
    kind: ErrorKind,
) -> VfsError {
    VfsError::Link(LinkError::new(op, old, new, kind))
}
