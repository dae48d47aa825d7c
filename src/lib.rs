/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A virtual file system abstraction with a fully in-memory implementation.
//!
//! The [`Vfs`] trait is the path-string surface shared by every filesystem
//! in this crate. [`MemFs`] implements it with an in-memory node tree that
//! behaves like a POSIX hierarchy (hard links, symbolic links, permissions,
//! per-node locking). [`BasePathFs`] rebases absolute paths beneath a fixed
//! prefix and [`RoFs`] rejects every mutating operation.

pub mod basepathfs;
pub mod errors;
pub mod glob;
pub mod idm;
pub mod memfs;
pub mod path;
pub mod rofs;
pub mod vfs;

mod lockutil;

pub use basepathfs::BasePathFs;
pub use errors::{ErrorKind, LinkError, PathError, SyscallError, VfsError, VfsResult};
pub use glob::WalkStep;
pub use idm::{Group, IdentityMgr, MemIdm, NotImplementedIdm, User};
pub use memfs::{MemFile, MemFs, MemFsOptions};
pub use rofs::RoFs;
pub use vfs::{Features, FileInfo, FileMode, OpenFlags, OsType, Vfs, VfsFile};
