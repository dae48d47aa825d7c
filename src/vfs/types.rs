/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Value types shared by every filesystem: modes, open flags, feature bits
//! and metadata snapshots.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

/// Style of path and permission semantics a filesystem emulates. Only the
/// Unix style exists in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsType {
    Unix,
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsType::Unix => write!(f, "Unix"),
        }
    }
}

/// File mode and permission bits. The lower 12 bits are the permission
/// bits; the type of the node lives in the high bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct FileMode(u32);

impl FileMode {
    /// Directory type bit.
    pub const DIR: FileMode = FileMode(1 << 31);
    /// Symbolic link type bit.
    pub const SYMLINK: FileMode = FileMode(1 << 27);
    /// Mask selecting the type bits.
    pub const TYPE_MASK: FileMode = FileMode(FileMode::DIR.0 | FileMode::SYMLINK.0);
    /// Mask selecting the permission bits.
    pub const PERM_MASK: FileMode = FileMode(0o777);

    pub const fn new(bits: u32) -> FileMode {
        FileMode(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The permission bits only.
    pub const fn perm(self) -> FileMode {
        FileMode(self.0 & Self::PERM_MASK.0)
    }

    /// The type bits only.
    pub const fn type_bits(self) -> FileMode {
        FileMode(self.0 & Self::TYPE_MASK.0)
    }

    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }

    pub const fn is_symlink(self) -> bool {
        self.0 & Self::SYMLINK.0 != 0
    }

    pub const fn is_regular(self) -> bool {
        self.0 & Self::TYPE_MASK.0 == 0
    }

    pub const fn contains(self, other: FileMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FileMode {
    type Output = FileMode;

    fn bitor(self, rhs: FileMode) -> FileMode {
        FileMode(self.0 | rhs.0)
    }
}

impl BitAnd for FileMode {
    type Output = FileMode;

    fn bitand(self, rhs: FileMode) -> FileMode {
        FileMode(self.0 & rhs.0)
    }
}

impl fmt::Display for FileMode {
    /// `ls`-style rendering, e.g. `drwxr-xr-x`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() {
            'd'
        } else if self.is_symlink() {
            'l'
        } else {
            '-'
        };
        write!(f, "{}", kind)?;
        for shift in [6u32, 3, 0] {
            let triplet = (self.0 >> shift) & 0o7;
            write!(
                f,
                "{}{}{}",
                if triplet & 0o4 != 0 { 'r' } else { '-' },
                if triplet & 0o2 != 0 { 'w' } else { '-' },
                if triplet & 0o1 != 0 { 'x' } else { '-' },
            )?;
        }
        Ok(())
    }
}

/// Flags accepted by `open_file`, with their Linux values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const RDONLY: OpenFlags = OpenFlags(0o0);
    pub const WRONLY: OpenFlags = OpenFlags(0o1);
    pub const RDWR: OpenFlags = OpenFlags(0o2);
    pub const CREATE: OpenFlags = OpenFlags(0o100);
    pub const EXCL: OpenFlags = OpenFlags(0o200);
    pub const TRUNC: OpenFlags = OpenFlags(0o1000);
    pub const APPEND: OpenFlags = OpenFlags(0o2000);

    const ACCESS_MASK: u32 = 0o3;

    pub const fn new(bits: u32) -> OpenFlags {
        OpenFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The handle will support reads: read-only or read-write access.
    pub const fn wants_read(self) -> bool {
        self.0 & Self::ACCESS_MASK != Self::WRONLY.0
    }

    /// The handle will support writes: write-only or read-write access, or
    /// any of the append, create and truncate flags.
    pub const fn wants_write(self) -> bool {
        self.0 & Self::ACCESS_MASK != Self::RDONLY.0
            || self.0 & (Self::APPEND.0 | Self::CREATE.0 | Self::TRUNC.0) != 0
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

/// Optional capabilities a filesystem advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features(u64);

impl Features {
    pub const BASIC_FS: Features = Features(1 << 0);
    pub const CHROOT: Features = Features(1 << 1);
    pub const CLONABLE: Features = Features(1 << 2);
    pub const HARD_LINK: Features = Features(1 << 3);
    pub const SYMLINK: Features = Features(1 << 4);
    pub const IDENTITY_MGR: Features = Features(1 << 5);
    pub const MAIN_DIRS: Features = Features(1 << 6);
    pub const ABS_PATH: Features = Features(1 << 7);
    pub const READ_ONLY: Features = Features(1 << 8);
    pub const INESCAPABLE_CHROOT: Features = Features(1 << 9);

    pub const fn empty() -> Features {
        Features(0)
    }

    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Features) -> Features {
        Features(self.0 | other.0)
    }

    /// Features of `self` with the bits of `other` cleared.
    pub const fn difference(self, other: Features) -> Features {
        Features(self.0 & !other.0)
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Features) -> Features {
        self.union(rhs)
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Features, &str); 10] = [
            (Features::BASIC_FS, "BasicFs"),
            (Features::CHROOT, "Chroot"),
            (Features::CLONABLE, "Clonable"),
            (Features::HARD_LINK, "Hardlink"),
            (Features::SYMLINK, "Symlink"),
            (Features::IDENTITY_MGR, "IdentityMgr"),
            (Features::MAIN_DIRS, "MainDirs"),
            (Features::ABS_PATH, "AbsPath"),
            (Features::READ_ONLY, "ReadOnly"),
            (Features::INESCAPABLE_CHROOT, "InescapableChroot"),
        ];
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

/// Snapshot of a node's metadata at the point of query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Final path segment as supplied by the caller.
    pub name: String,
    /// Content length for files, child count for directories, 1 for
    /// symbolic links.
    pub size: u64,
    pub mode: FileMode,
    /// Modification time, nanoseconds since the Unix epoch.
    pub mtime_ns: i64,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u64,
    /// Node identifier, unique for the lifetime of the filesystem.
    pub file_id: u64,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// Reports whether both snapshots describe the same node.
    pub fn same_file(&self, other: &FileInfo) -> bool {
        self.file_id == other.file_id
    }
}
