/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! File-level operations: opening, linking, metadata queries and
//! mutations.

use crate::errors::{link_err, path_err, ErrorKind, VfsResult};
use crate::lockutil::{read_lock, write_lock};
use crate::path;
use crate::vfs::{FileInfo, FileMode, OpenFlags};

use super::file::MemFile;
use super::node::{now_ns, Node, NodeKind, WANT_READ, WANT_WRITE};
use super::resolve::SlMode;
use super::MemFs;

impl MemFs {
    /// Opens `name` with the requested flags, creating it with permissions
    /// `perm & 0o777 & !umask` when `CREATE` applies.
    pub fn open_file(&self, name: &str, flags: OpenFlags, perm: FileMode) -> VfsResult<MemFile> {
        const OP: &str = "open";
        let user = self.user_snapshot();
        let can_read = flags.wants_read();
        let can_write = flags.wants_write();
        let append = flags.contains(OpenFlags::APPEND);

        let r = self.search_node(name, SlMode::Eval);
        match r.kind {
            ErrorKind::AlreadyExists => {
                let Some(child) = r.child.clone() else {
                    return Err(path_err(OP, name, ErrorKind::NotFound));
                };
                if child.is_dir() {
                    if can_write {
                        return Err(path_err(OP, name, ErrorKind::IsADirectory));
                    }
                    if !child.check_permission(WANT_READ, &user) {
                        return Err(path_err(OP, name, ErrorKind::PermissionDenied));
                    }
                    return Ok(MemFile::new(
                        self.same_view(),
                        child,
                        name,
                        r.abs_path,
                        true,
                        false,
                        false,
                        0,
                    ));
                }

                let Some(data) = child.file_data() else {
                    return Err(path_err(OP, name, ErrorKind::InvalidArgument));
                };
                if flags.contains(OpenFlags::CREATE) && flags.contains(OpenFlags::EXCL) {
                    return Err(path_err(OP, name, ErrorKind::AlreadyExists));
                }
                let mut want = 0;
                if can_read {
                    want |= WANT_READ;
                }
                if can_write {
                    want |= WANT_WRITE;
                }
                if !child.check_permission(want, &user) {
                    return Err(path_err(OP, name, ErrorKind::PermissionDenied));
                }
                let mut offset = 0u64;
                if can_write && flags.contains(OpenFlags::TRUNC) {
                    write_lock(data).bytes.clear();
                    child.touch(now_ns());
                }
                if append {
                    offset = read_lock(data).bytes.len() as u64;
                }
                Ok(MemFile::new(
                    self.same_view(),
                    child.clone(),
                    name,
                    r.abs_path,
                    can_read,
                    can_write,
                    append,
                    offset,
                ))
            }
            ErrorKind::NotFound => {
                if !flags.contains(OpenFlags::CREATE) || !can_write {
                    return Err(path_err(OP, name, ErrorKind::NotFound));
                }
                if !r.at_last_segment() || r.segment().is_empty() {
                    return Err(path_err(OP, name, ErrorKind::NotFound));
                }
                if !r.parent.check_permission(WANT_WRITE, &user) {
                    return Err(path_err(OP, name, ErrorKind::PermissionDenied));
                }
                let node =
                    Node::new_file(self.next_id(), self.effective_perm(perm), &user, now_ns());
                let attached = {
                    let Some(children) = r.parent.dir_children() else {
                        return Err(path_err(OP, name, ErrorKind::NotADirectory));
                    };
                    let mut children = write_lock(children);
                    match children.get(r.segment()) {
                        Some(existing) => {
                            // created concurrently since resolution
                            if flags.contains(OpenFlags::EXCL) || !existing.is_file() {
                                return Err(path_err(OP, name, ErrorKind::AlreadyExists));
                            }
                            existing.clone()
                        }
                        None => {
                            children.insert(String::from(r.segment()), node.clone());
                            node
                        }
                    }
                };
                r.parent.touch(now_ns());
                Ok(MemFile::new(
                    self.same_view(),
                    attached,
                    name,
                    r.abs_path,
                    can_read,
                    can_write,
                    append,
                    0,
                ))
            }
            kind => Err(path_err(OP, name, kind)),
        }
    }

    /// Opens `name` read-write, creating or truncating it.
    pub fn create(&self, name: &str) -> VfsResult<MemFile> {
        self.open_file(
            name,
            OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::TRUNC,
            FileMode::new(0o666),
        )
    }

    /// Opens `name` read-only.
    pub fn open(&self, name: &str) -> VfsResult<MemFile> {
        self.open_file(name, OpenFlags::RDONLY, FileMode::new(0))
    }

    /// Creates `newname` as a second directory entry for the regular file
    /// at `oldname`.
    pub fn link(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        const OP: &str = "link";
        let user = self.user_snapshot();

        let ro = self.search_node(oldname, SlMode::Eval);
        let (_, old_node) = match ro.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(link_err(OP, oldname, newname, kind)),
        };
        if !old_node.is_file() {
            return Err(link_err(OP, oldname, newname, ErrorKind::PermissionDenied));
        }

        let rn = self.search_node(newname, SlMode::Lstat);
        match rn.kind {
            ErrorKind::AlreadyExists => {
                return Err(link_err(OP, oldname, newname, ErrorKind::AlreadyExists));
            }
            ErrorKind::NotFound => {
                if !rn.at_last_segment() || rn.segment().is_empty() {
                    return Err(link_err(OP, oldname, newname, ErrorKind::NotFound));
                }
            }
            kind => return Err(link_err(OP, oldname, newname, kind)),
        }
        if !rn.parent.check_permission(WANT_WRITE, &user) {
            return Err(link_err(OP, oldname, newname, ErrorKind::PermissionDenied));
        }

        let Some(children) = rn.parent.dir_children() else {
            return Err(link_err(OP, oldname, newname, ErrorKind::NotADirectory));
        };
        {
            let mut children = write_lock(children);
            if children.contains_key(rn.segment()) {
                return Err(link_err(OP, oldname, newname, ErrorKind::AlreadyExists));
            }
            if let Some(data) = old_node.file_data() {
                write_lock(data).nlink += 1;
            }
            children.insert(String::from(rn.segment()), old_node.clone());
        }
        rn.parent.touch(now_ns());
        Ok(())
    }

    /// Creates a symbolic link at `newname` storing the cleaned `oldname`.
    /// The target is not required to exist.
    pub fn symlink(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        const OP: &str = "symlink";
        let user = self.user_snapshot();

        let rn = self.search_node(newname, SlMode::Lstat);
        match rn.kind {
            ErrorKind::AlreadyExists => {
                return Err(link_err(OP, oldname, newname, ErrorKind::AlreadyExists));
            }
            ErrorKind::NotFound => {
                if !rn.at_last_segment() || rn.segment().is_empty() {
                    return Err(link_err(OP, oldname, newname, ErrorKind::NotFound));
                }
            }
            kind => return Err(link_err(OP, oldname, newname, kind)),
        }
        if !rn.parent.check_permission(WANT_WRITE, &user) {
            return Err(link_err(OP, oldname, newname, ErrorKind::PermissionDenied));
        }
        let node =
            Node::new_symlink(self.next_id(), path::clean(oldname), &user, now_ns());
        self.attach(&rn.parent, rn.segment(), node)
            .map_err(|kind| link_err(OP, oldname, newname, kind))
    }

    /// The stored target of the symbolic link at `name`.
    pub fn readlink(&self, name: &str) -> VfsResult<String> {
        const OP: &str = "readlink";
        let r = self.search_node(name, SlMode::Lstat);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        match &child.kind {
            NodeKind::Symlink { target } => Ok(target.clone()),
            _ => Err(path_err(OP, name, ErrorKind::InvalidArgument)),
        }
    }

    /// The absolute path of `path` after resolving every symbolic link.
    pub fn eval_symlinks(&self, path: &str) -> VfsResult<String> {
        const OP: &str = "lstat";
        let r = self.search_node(path, SlMode::Eval);
        if r.found() {
            Ok(r.abs_path)
        } else {
            Err(path_err(OP, path, r.kind))
        }
    }

    /// Metadata of the node at `name`, following a terminal symbolic link.
    pub fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        self.stat_with(name, SlMode::Stat, "stat")
    }

    /// Metadata of the node at `name` itself, never following a terminal
    /// symbolic link.
    pub fn lstat(&self, name: &str) -> VfsResult<FileInfo> {
        self.stat_with(name, SlMode::Lstat, "lstat")
    }

    fn stat_with(&self, name: &str, mode: SlMode, op: &'static str) -> VfsResult<FileInfo> {
        let r = self.search_node(name, mode);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(op, name, kind)),
        };
        Ok(child.fill_stat(&path::base(name)))
    }

    /// Sorted metadata snapshots of the entries of the directory at
    /// `name`.
    pub fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>> {
        const OP: &str = "readdirent";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Eval);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        let Some(children) = child.dir_children() else {
            return Err(path_err(OP, name, ErrorKind::NotADirectory));
        };
        if !child.check_permission(WANT_READ, &user) {
            return Err(path_err(OP, name, ErrorKind::PermissionDenied));
        }
        let children = read_lock(children);
        Ok(children.iter().map(|(entry, node)| node.fill_stat(entry)).collect())
    }

    /// Replaces the permission bits of the node at `name`.
    pub fn chmod(&self, name: &str, mode: FileMode) -> VfsResult<()> {
        const OP: &str = "chmod";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Stat);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        child.set_mode(mode, &user).map_err(|kind| path_err(OP, name, kind))
    }

    /// Changes ownership of the node at `name`, following a terminal
    /// symbolic link.
    pub fn chown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        const OP: &str = "chown";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Stat);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        child.set_owner(uid, gid, &user).map_err(|kind| path_err(OP, name, kind))
    }

    /// Changes ownership of the node at `name` itself.
    pub fn lchown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        const OP: &str = "lchown";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Lstat);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        child.set_owner(uid, gid, &user).map_err(|kind| path_err(OP, name, kind))
    }

    /// Sets the modification time of the node at `name`. Nodes record no
    /// access time; `atime_ns` is accepted and ignored.
    pub fn chtimes(&self, name: &str, _atime_ns: i64, mtime_ns: i64) -> VfsResult<()> {
        const OP: &str = "chtimes";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Stat);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        child.set_mod_time(mtime_ns, &user).map_err(|kind| path_err(OP, name, kind))
    }

    /// Sets the length of the file at `name`, zero-filling on growth.
    pub fn truncate(&self, name: &str, size: i64) -> VfsResult<()> {
        const OP: &str = "truncate";
        if size < 0 {
            return Err(path_err(OP, name, ErrorKind::InvalidArgument));
        }
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Eval);
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        if child.is_dir() {
            return Err(path_err(OP, name, ErrorKind::IsADirectory));
        }
        let Some(data) = child.file_data() else {
            return Err(path_err(OP, name, ErrorKind::InvalidArgument));
        };
        if !child.check_permission(WANT_WRITE, &user) {
            return Err(path_err(OP, name, ErrorKind::PermissionDenied));
        }
        write_lock(data).bytes.resize(size as usize, 0);
        child.touch(now_ns());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VfsError;
    use crate::idm::{IdentityMgr, MemIdm};
    use crate::memfs::MemFsOptions;
    use crate::vfs::{Vfs, VfsFile};
    use std::sync::Arc;

    #[test]
    fn test_write_then_read_roundtrip() {
        let fs = MemFs::new();
        fs.mkdir_all("/a/b/c", FileMode::new(0o755)).unwrap();
        fs.write_file("/a/b/c/f", b"hello", FileMode::new(0o644)).unwrap();
        assert_eq!(b"hello".to_vec(), fs.read_file("/a/b/c/f").unwrap());
        assert_eq!(5, fs.stat("/a/b/c/f").unwrap().size);
    }

    #[test]
    fn test_open_missing_without_create() {
        let fs = MemFs::new();
        let err = fs.open("/nope").unwrap_err();
        assert!(err.is_not_exist());
        match err {
            VfsError::Path(e) => {
                assert_eq!("open", e.op);
                assert_eq!("/nope", e.path);
            }
            other => panic!("expected a path error, got {:?}", other),
        }
    }

    #[test]
    fn test_open_create_excl() {
        let fs = MemFs::new();
        let file = fs
            .open_file(
                "/f",
                OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::EXCL,
                FileMode::new(0o644),
            )
            .unwrap();
        file.close().unwrap();
        let err = fs
            .open_file(
                "/f",
                OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::EXCL,
                FileMode::new(0o644),
            )
            .unwrap_err();
        assert!(err.is_exist());
    }

    #[test]
    fn test_open_truncates() {
        let fs = MemFs::new();
        fs.write_file("/f", b"0123456789", FileMode::new(0o644)).unwrap();
        let file = fs
            .open_file("/f", OpenFlags::WRONLY | OpenFlags::TRUNC, FileMode::new(0))
            .unwrap();
        file.close().unwrap();
        assert_eq!(0, fs.stat("/f").unwrap().size);
    }

    #[test]
    fn test_open_append_seeds_offset() {
        let fs = MemFs::new();
        fs.write_file("/f", b"base", FileMode::new(0o644)).unwrap();
        let file = fs
            .open_file("/f", OpenFlags::WRONLY | OpenFlags::APPEND, FileMode::new(0))
            .unwrap();
        file.write_string("+more").unwrap();
        file.close().unwrap();
        assert_eq!(b"base+more".to_vec(), fs.read_file("/f").unwrap());
    }

    #[test]
    fn test_open_directory() {
        let fs = MemFs::new();
        fs.mkdir("/d", FileMode::new(0o755)).unwrap();
        // reading a directory handle is allowed
        let dir = fs.open("/d").unwrap();
        dir.close().unwrap();
        // any write intent is not
        let err = fs.open_file("/d", OpenFlags::RDWR, FileMode::new(0)).unwrap_err();
        assert_eq!(ErrorKind::IsADirectory, err.kind());
        let err = fs
            .open_file("/d", OpenFlags::RDONLY | OpenFlags::CREATE, FileMode::new(0o644))
            .unwrap_err();
        assert_eq!(ErrorKind::IsADirectory, err.kind());
    }

    #[test]
    fn test_open_creates_through_dangling_symlink() {
        let fs = MemFs::new();
        fs.symlink("/target", "/l").unwrap();
        let file = fs.create("/l").unwrap();
        file.write_string("via link").unwrap();
        file.close().unwrap();
        // the file came into being at the target, not at the link
        assert!(fs.lstat("/l").unwrap().mode.is_symlink());
        assert_eq!(b"via link".to_vec(), fs.read_file("/target").unwrap());
    }

    #[test]
    fn test_create_respects_umask() {
        let fs = MemFs::new();
        let file = fs.create("/f").unwrap();
        file.close().unwrap();
        // 0o666 & !0o022
        assert_eq!(FileMode::new(0o644), fs.stat("/f").unwrap().mode.perm());
    }

    #[test]
    fn test_hardlink_shares_content() {
        let fs = MemFs::new();
        fs.write_file("/a", b"1", FileMode::new(0o644)).unwrap();
        fs.link("/a", "/b").unwrap();
        assert_eq!(2, fs.stat("/a").unwrap().nlink);

        fs.write_file("/a", b"22", FileMode::new(0o644)).unwrap();
        assert_eq!(b"22".to_vec(), fs.read_file("/b").unwrap());

        // content survives removal of the original name
        fs.remove("/a").unwrap();
        assert_eq!(b"22".to_vec(), fs.read_file("/b").unwrap());
        assert_eq!(1, fs.stat("/b").unwrap().nlink);
    }

    #[test]
    fn test_link_errors() {
        let fs = MemFs::new();
        fs.mkdir("/d", FileMode::new(0o755)).unwrap();
        fs.write_file("/f", b"x", FileMode::new(0o644)).unwrap();

        // directories cannot be hard linked
        let err = fs.link("/d", "/d2").unwrap_err();
        assert_eq!(ErrorKind::PermissionDenied, err.kind());
        // destination exists
        let err = fs.link("/f", "/d").unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
        // source missing
        let err = fs.link("/missing", "/g").unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        match err {
            VfsError::Link(e) => assert_eq!("link", e.op),
            other => panic!("expected a link error, got {:?}", other),
        }
    }

    #[test]
    fn test_same_file() {
        let fs = MemFs::new();
        fs.write_file("/a", b"x", FileMode::new(0o644)).unwrap();
        fs.link("/a", "/b").unwrap();
        fs.write_file("/c", b"x", FileMode::new(0o644)).unwrap();

        let a = fs.stat("/a").unwrap();
        let b = fs.stat("/b").unwrap();
        let c = fs.stat("/c").unwrap();
        assert!(a.same_file(&b));
        assert!(!a.same_file(&c));
    }

    #[test]
    fn test_symlink_stat_vs_lstat() {
        let fs = MemFs::new();
        fs.mkdir_all("/x", FileMode::new(0o755)).unwrap();
        fs.write_file("/x/t", b"v", FileMode::new(0o644)).unwrap();
        fs.symlink("/x/t", "/x/u").unwrap();

        let followed = fs.stat("/x/u").unwrap();
        assert!(followed.mode.is_regular());
        assert_eq!(1, followed.size);
        assert_eq!("u", followed.name);

        let link = fs.lstat("/x/u").unwrap();
        assert!(link.mode.is_symlink());
        assert_eq!(FileMode::new(0o777), link.mode.perm());
        assert_eq!(1, link.size);

        assert_eq!(fs.read_file("/x/t").unwrap(), fs.read_file("/x/u").unwrap());
    }

    #[test]
    fn test_symlink_loop_errors() {
        let fs = MemFs::new();
        fs.symlink("/a", "/b").unwrap();
        fs.symlink("/b", "/a").unwrap();
        let err = fs.stat("/a").unwrap_err();
        assert_eq!(ErrorKind::TooManySymlinks, err.kind());
    }

    #[test]
    fn test_symlink_stores_cleaned_target() {
        let fs = MemFs::new();
        fs.symlink("/x//y/../t", "/l").unwrap();
        assert_eq!("/x/t", fs.readlink("/l").unwrap());
    }

    #[test]
    fn test_readlink_on_non_symlink() {
        let fs = MemFs::new();
        fs.write_file("/f", b"x", FileMode::new(0o644)).unwrap();
        let err = fs.readlink("/f").unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn test_eval_symlinks() {
        let fs = MemFs::new();
        fs.mkdir_all("/a/b", FileMode::new(0o755)).unwrap();
        fs.write_file("/a/b/f", b"x", FileMode::new(0o644)).unwrap();
        fs.symlink("/a", "/la").unwrap();
        fs.symlink("/la/b", "/lb").unwrap();

        assert_eq!("/a/b/f", fs.eval_symlinks("/lb/f").unwrap());
        assert_eq!("/a/b", fs.eval_symlinks("/lb").unwrap());
        assert!(fs.eval_symlinks("/lb/missing").unwrap_err().is_not_exist());
    }

    #[test]
    fn test_chmod() {
        let fs = MemFs::new();
        fs.write_file("/f", b"x", FileMode::new(0o644)).unwrap();
        fs.chmod("/f", FileMode::new(0o600)).unwrap();
        assert_eq!(FileMode::new(0o600), fs.stat("/f").unwrap().mode.perm());
        assert!(fs.stat("/f").unwrap().mode.is_regular());
    }

    #[test]
    fn test_chmod_symlink_follows_to_target() {
        let fs = MemFs::new();
        fs.write_file("/f", b"x", FileMode::new(0o644)).unwrap();
        fs.symlink("/f", "/l").unwrap();
        fs.chmod("/l", FileMode::new(0o600)).unwrap();
        // target changed, the link itself is untouched
        assert_eq!(FileMode::new(0o600), fs.stat("/f").unwrap().mode.perm());
        assert_eq!(FileMode::new(0o777), fs.lstat("/l").unwrap().mode.perm());
    }

    #[test]
    fn test_chmod_only_owner_or_admin() {
        let idm = Arc::new(MemIdm::new());
        idm.group_add("staff").unwrap();
        idm.user_add("alice", "staff").unwrap();
        let fs = MemFs::with_options(&MemFsOptions::default(), idm).unwrap();
        fs.write_file("/f", b"x", FileMode::new(0o666)).unwrap();

        fs.set_user("alice").unwrap();
        let err = fs.chmod("/f", FileMode::new(0o600)).unwrap_err();
        assert_eq!(ErrorKind::NotPermitted, err.kind());
    }

    #[test]
    fn test_chown_and_lchown() {
        let fs = MemFs::new();
        fs.write_file("/f", b"x", FileMode::new(0o644)).unwrap();
        fs.symlink("/f", "/l").unwrap();

        fs.chown("/l", 100, 101).unwrap();
        let target = fs.stat("/f").unwrap();
        assert_eq!((100, 101), (target.uid, target.gid));
        assert_eq!((0, 0), {
            let link = fs.lstat("/l").unwrap();
            (link.uid, link.gid)
        });

        fs.lchown("/l", 200, 201).unwrap();
        let link = fs.lstat("/l").unwrap();
        assert_eq!((200, 201), (link.uid, link.gid));
        // the target keeps its previous owner
        let target = fs.stat("/f").unwrap();
        assert_eq!((100, 101), (target.uid, target.gid));
    }

    #[test]
    fn test_chtimes() {
        let fs = MemFs::new();
        fs.write_file("/f", b"x", FileMode::new(0o644)).unwrap();
        fs.chtimes("/f", 0, 123_456_789).unwrap();
        assert_eq!(123_456_789, fs.stat("/f").unwrap().mtime_ns);
    }

    #[test]
    fn test_truncate() {
        let fs = MemFs::new();
        fs.write_file("/f", b"0123456789", FileMode::new(0o644)).unwrap();

        fs.truncate("/f", 4).unwrap();
        assert_eq!(b"0123".to_vec(), fs.read_file("/f").unwrap());

        // growth zero-fills
        fs.truncate("/f", 6).unwrap();
        assert_eq!(b"0123\0\0".to_vec(), fs.read_file("/f").unwrap());

        let err = fs.truncate("/f", -1).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());

        fs.mkdir("/d", FileMode::new(0o755)).unwrap();
        let err = fs.truncate("/d", 0).unwrap_err();
        assert_eq!(ErrorKind::IsADirectory, err.kind());
    }

    #[test]
    fn test_read_dir_sorted() {
        let fs = MemFs::new();
        fs.mkdir("/d", FileMode::new(0o755)).unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs.write_file(&format!("/d/{}", name), b"x", FileMode::new(0o644)).unwrap();
        }
        let names: Vec<String> =
            fs.read_dir("/d").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(vec!["alpha", "mid", "zeta"], names);

        let err = fs.read_dir("/d/alpha").unwrap_err();
        assert_eq!(ErrorKind::NotADirectory, err.kind());
    }

    #[test]
    fn test_stat_keeps_supplied_name() {
        let fs = MemFs::new();
        fs.mkdir_all("/a/b", FileMode::new(0o755)).unwrap();
        fs.write_file("/a/b/f", b"x", FileMode::new(0o644)).unwrap();
        fs.chdir("/a").unwrap();
        assert_eq!("f", fs.stat("b/f").unwrap().name);
        assert_eq!("/", fs.stat("/").unwrap().name);
    }

    #[test]
    fn test_write_file_permission_denied() {
        let idm = Arc::new(MemIdm::new());
        idm.group_add("staff").unwrap();
        idm.user_add("alice", "staff").unwrap();
        let fs = MemFs::with_options(&MemFsOptions::default(), idm).unwrap();
        fs.write_file("/secret", b"x", FileMode::new(0o600)).unwrap();

        fs.set_user("alice").unwrap();
        let err = fs.read_file("/secret").unwrap_err();
        assert_eq!(ErrorKind::PermissionDenied, err.kind());
        let err = fs.write_file("/new", b"x", FileMode::new(0o644)).unwrap_err();
        assert_eq!(ErrorKind::PermissionDenied, err.kind());
    }
}
