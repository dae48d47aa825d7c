/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Node graph of the in-memory filesystem: tagged directory, file and
//! symbolic link variants sharing a metadata block, each behind its own
//! lock.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::ErrorKind;
use crate::idm::User;
use crate::lockutil::{read_lock, write_lock};
use crate::vfs::{FileInfo, FileMode};

/// Capability bits requested from [`Node::check_permission`]; they mirror
/// the permission triplet layout.
pub(crate) const WANT_READ: u32 = 0o4;
pub(crate) const WANT_WRITE: u32 = 0o2;
/// Execute on directories.
pub(crate) const WANT_LOOKUP: u32 = 0o1;

pub(crate) type NodeRef = Arc<Node>;
pub(crate) type Children = BTreeMap<String, NodeRef>;

/// Shared metadata of every node variant.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Metadata {
    pub mode: FileMode,
    /// Modification time, nanoseconds since the Unix epoch.
    pub mtime_ns: i64,
    pub uid: u32,
    pub gid: u32,
}

/// Variant payloads. Directory children and file bytes are mutable behind
/// their own locks; a symbolic link target never changes after creation.
#[derive(Debug)]
pub(crate) enum NodeKind {
    Dir(RwLock<Children>),
    File(RwLock<FileData>),
    Symlink { target: String },
}

#[derive(Debug)]
pub(crate) struct FileData {
    pub bytes: Vec<u8>,
    /// Number of directory entries referencing this node.
    pub nlink: u64,
}

#[derive(Debug)]
pub(crate) struct Node {
    /// Assigned at creation, never reused.
    pub id: u64,
    pub meta: RwLock<Metadata>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new_dir(id: u64, perm: FileMode, user: &User, mtime_ns: i64) -> NodeRef {
        Arc::new(Node {
            id,
            meta: RwLock::new(Metadata {
                mode: FileMode::DIR | perm.perm(),
                mtime_ns,
                uid: user.uid,
                gid: user.gid,
            }),
            kind: NodeKind::Dir(RwLock::new(Children::new())),
        })
    }

    pub fn new_file(id: u64, perm: FileMode, user: &User, mtime_ns: i64) -> NodeRef {
        Arc::new(Node {
            id,
            meta: RwLock::new(Metadata {
                mode: perm.perm(),
                mtime_ns,
                uid: user.uid,
                gid: user.gid,
            }),
            kind: NodeKind::File(RwLock::new(FileData { bytes: Vec::new(), nlink: 1 })),
        })
    }

    pub fn new_symlink(id: u64, target: String, user: &User, mtime_ns: i64) -> NodeRef {
        Arc::new(Node {
            id,
            meta: RwLock::new(Metadata {
                mode: FileMode::SYMLINK | FileMode::new(0o777),
                mtime_ns,
                uid: user.uid,
                gid: user.gid,
            }),
            kind: NodeKind::Symlink { target },
        })
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, NodeKind::Symlink { .. })
    }

    /// The directory child map, when this node is a directory.
    pub fn dir_children(&self) -> Option<&RwLock<Children>> {
        match &self.kind {
            NodeKind::Dir(children) => Some(children),
            _ => None,
        }
    }

    pub fn file_data(&self) -> Option<&RwLock<FileData>> {
        match &self.kind {
            NodeKind::File(data) => Some(data),
            _ => None,
        }
    }

    /// Reports whether `user` holds every capability in `want` on this
    /// node. The admin user holds them all; otherwise the triplet is
    /// selected by ownership.
    pub fn check_permission(&self, want: u32, user: &User) -> bool {
        if user.is_root() {
            return true;
        }
        let meta = read_lock(&self.meta);
        let mode = meta.mode.bits();
        let triplet = if meta.uid == user.uid {
            (mode >> 6) & 0o7
        } else if meta.gid == user.gid {
            (mode >> 3) & 0o7
        } else {
            mode & 0o7
        };
        want & triplet == want
    }

    /// Replaces the permission bits, preserving the type bits. Only the
    /// admin user or the owner may do so; symbolic links never accept it.
    pub fn set_mode(&self, mode: FileMode, user: &User) -> Result<(), ErrorKind> {
        if self.is_symlink() {
            return Err(ErrorKind::NotPermitted);
        }
        let mut meta = write_lock(&self.meta);
        if !user.is_root() && meta.uid != user.uid {
            return Err(ErrorKind::NotPermitted);
        }
        meta.mode = meta.mode.type_bits() | mode.perm();
        Ok(())
    }

    /// Sets the modification time; requires write permission.
    pub fn set_mod_time(&self, mtime_ns: i64, user: &User) -> Result<(), ErrorKind> {
        if !self.check_permission(WANT_WRITE, user) {
            return Err(ErrorKind::PermissionDenied);
        }
        let mut meta = write_lock(&self.meta);
        meta.mtime_ns = mtime_ns;
        Ok(())
    }

    /// Changes ownership; requires write permission.
    pub fn set_owner(&self, uid: u32, gid: u32, user: &User) -> Result<(), ErrorKind> {
        if !self.check_permission(WANT_WRITE, user) {
            return Err(ErrorKind::PermissionDenied);
        }
        let mut meta = write_lock(&self.meta);
        meta.uid = uid;
        meta.gid = gid;
        Ok(())
    }

    /// Unconditionally stamps the modification time.
    pub fn touch(&self, mtime_ns: i64) {
        let mut meta = write_lock(&self.meta);
        meta.mtime_ns = mtime_ns;
    }

    /// Content length for files, child count for directories, 1 for
    /// symbolic links.
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::Dir(children) => read_lock(children).len() as u64,
            NodeKind::File(data) => read_lock(data).bytes.len() as u64,
            NodeKind::Symlink { .. } => 1,
        }
    }

    /// Snapshots the metadata into a [`FileInfo`] carrying `name`.
    pub fn fill_stat(&self, name: &str) -> FileInfo {
        let meta = *read_lock(&self.meta);
        let (size, nlink) = match &self.kind {
            NodeKind::Dir(children) => (read_lock(children).len() as u64, 1),
            NodeKind::File(data) => {
                let data = read_lock(data);
                (data.bytes.len() as u64, data.nlink)
            }
            NodeKind::Symlink { .. } => (1, 1),
        };
        FileInfo {
            name: String::from(name),
            size,
            mode: meta.mode,
            mtime_ns: meta.mtime_ns,
            uid: meta.uid,
            gid: meta.gid,
            nlink,
            file_id: self.id,
        }
    }
}

/// Current time in nanoseconds since the Unix epoch.
pub(crate) fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(uid: u32, gid: u32) -> User {
        User { name: format!("u{}", uid), uid, gid }
    }

    #[test]
    fn test_variants() {
        let root = User::root();
        let dir = Node::new_dir(1, FileMode::new(0o755), &root, 0);
        let file = Node::new_file(2, FileMode::new(0o644), &root, 0);
        let link = Node::new_symlink(3, String::from("/t"), &root, 0);

        assert!(dir.is_dir() && !dir.is_file() && !dir.is_symlink());
        assert!(file.is_file());
        assert!(link.is_symlink());

        assert!(read_lock(&dir.meta).mode.is_dir());
        assert!(read_lock(&file.meta).mode.is_regular());
        let link_mode = read_lock(&link.meta).mode;
        assert!(link_mode.is_symlink());
        assert_eq!(FileMode::new(0o777), link_mode.perm());
    }

    #[test]
    fn test_sizes() {
        let root = User::root();
        let dir = Node::new_dir(1, FileMode::new(0o755), &root, 0);
        let file = Node::new_file(2, FileMode::new(0o644), &root, 0);
        let link = Node::new_symlink(3, String::from("/target"), &root, 0);

        assert_eq!(0, dir.size());
        if let Some(children) = dir.dir_children() {
            write_lock(children).insert(String::from("f"), file.clone());
        }
        assert_eq!(1, dir.size());

        assert_eq!(0, file.size());
        if let Some(data) = file.file_data() {
            write_lock(data).bytes.extend_from_slice(b"hello");
        }
        assert_eq!(5, file.size());

        assert_eq!(1, link.size());
    }

    #[test]
    fn test_check_permission() {
        let owner = user(100, 100);
        let file = Node::new_file(1, FileMode::new(0o640), &owner, 0);

        // admin passes everything
        assert!(file.check_permission(WANT_READ | WANT_WRITE | WANT_LOOKUP, &User::root()));
        // owner triplet: rw-
        assert!(file.check_permission(WANT_READ | WANT_WRITE, &owner));
        assert!(!file.check_permission(WANT_LOOKUP, &owner));
        // group triplet: r--
        let mate = user(101, 100);
        assert!(mate.gid == 100);
        assert!(file.check_permission(WANT_READ, &mate));
        assert!(!file.check_permission(WANT_WRITE, &mate));
        // other triplet: ---
        let other = user(102, 102);
        assert!(!file.check_permission(WANT_READ, &other));
    }

    #[test]
    fn test_set_mode() {
        let owner = user(100, 100);
        let file = Node::new_file(1, FileMode::new(0o644), &owner, 0);

        file.set_mode(FileMode::new(0o600), &owner).unwrap();
        assert_eq!(FileMode::new(0o600), read_lock(&file.meta).mode.perm());
        assert!(read_lock(&file.meta).mode.is_regular());

        // type bits survive even when the caller passes them
        let dir = Node::new_dir(2, FileMode::new(0o755), &owner, 0);
        dir.set_mode(FileMode::new(0o700), &owner).unwrap();
        assert!(read_lock(&dir.meta).mode.is_dir());

        let outsider = user(101, 101);
        assert_eq!(Err(ErrorKind::NotPermitted), file.set_mode(FileMode::new(0o666), &outsider));

        let link = Node::new_symlink(3, String::from("/t"), &owner, 0);
        assert_eq!(Err(ErrorKind::NotPermitted), link.set_mode(FileMode::new(0o600), &owner));
        assert_eq!(Err(ErrorKind::NotPermitted), link.set_mode(FileMode::new(0o600), &User::root()));
    }

    #[test]
    fn test_set_owner_and_time() {
        let owner = user(100, 100);
        let file = Node::new_file(1, FileMode::new(0o600), &owner, 0);

        let outsider = user(101, 101);
        assert_eq!(Err(ErrorKind::PermissionDenied), file.set_owner(1, 1, &outsider));
        assert_eq!(Err(ErrorKind::PermissionDenied), file.set_mod_time(42, &outsider));

        file.set_owner(200, 201, &owner).unwrap();
        let meta = *read_lock(&file.meta);
        assert_eq!((200, 201), (meta.uid, meta.gid));

        file.set_mod_time(42, &User::root()).unwrap();
        assert_eq!(42, read_lock(&file.meta).mtime_ns);
    }

    #[test]
    fn test_fill_stat() {
        let owner = user(100, 100);
        let file = Node::new_file(9, FileMode::new(0o640), &owner, 77);
        if let Some(data) = file.file_data() {
            let mut data = write_lock(data);
            data.bytes.extend_from_slice(b"abc");
            data.nlink = 2;
        }
        let info = file.fill_stat("f.txt");
        assert_eq!("f.txt", info.name);
        assert_eq!(3, info.size);
        assert_eq!(FileMode::new(0o640), info.mode);
        assert_eq!(77, info.mtime_ns);
        assert_eq!((100, 100), (info.uid, info.gid));
        assert_eq!(2, info.nlink);
        assert_eq!(9, info.file_id);
    }
}
