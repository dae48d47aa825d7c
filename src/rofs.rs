/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A decorator that rejects every mutating operation of an underlying
//! filesystem and delegates the rest verbatim.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::errors::{link_err, path_err, ErrorKind, VfsError, VfsResult};
use crate::glob::WalkStep;
use crate::idm::{IdentityMgr, User};
use crate::vfs::{Features, FileInfo, FileMode, OpenFlags, Vfs, VfsFile};

/// Read-only view of `under`: mutating operations fail with
/// "permission denied", reads return exactly what the underlying
/// filesystem returns.
pub struct RoFs {
    under: Box<dyn Vfs>,
}

impl RoFs {
    pub fn new(under: Box<dyn Vfs>) -> RoFs {
        RoFs { under }
    }
}

impl Vfs for RoFs {
    fn fs_type(&self) -> &'static str {
        "RoFs"
    }

    fn fs_name(&self) -> String {
        self.under.fs_name()
    }

    fn features(&self) -> Features {
        self.under
            .features()
            .union(Features::READ_ONLY)
            .difference(Features::IDENTITY_MGR)
    }

    fn clone_fs(&self) -> Box<dyn Vfs> {
        Box::new(RoFs { under: self.under.clone_fs() })
    }

    fn idm(&self) -> Arc<dyn IdentityMgr> {
        self.under.idm()
    }

    fn current_user(&self) -> User {
        self.under.current_user()
    }

    fn set_user(&self, _name: &str) -> VfsResult<()> {
        Err(ErrorKind::PermissionDenied.into())
    }

    fn chdir(&self, dir: &str) -> VfsResult<()> {
        self.under.chdir(dir)
    }

    fn getwd(&self) -> VfsResult<String> {
        self.under.getwd()
    }

    fn chmod(&self, name: &str, _mode: FileMode) -> VfsResult<()> {
        Err(path_err("chmod", name, ErrorKind::PermissionDenied))
    }

    fn chown(&self, name: &str, _uid: u32, _gid: u32) -> VfsResult<()> {
        Err(path_err("chown", name, ErrorKind::PermissionDenied))
    }

    fn lchown(&self, name: &str, _uid: u32, _gid: u32) -> VfsResult<()> {
        Err(path_err("lchown", name, ErrorKind::PermissionDenied))
    }

    fn chtimes(&self, name: &str, _atime_ns: i64, _mtime_ns: i64) -> VfsResult<()> {
        Err(path_err("chtimes", name, ErrorKind::PermissionDenied))
    }

    fn chroot(&self, path: &str) -> VfsResult<()> {
        self.under.chroot(path)
    }

    fn mkdir(&self, name: &str, _perm: FileMode) -> VfsResult<()> {
        Err(path_err("mkdir", name, ErrorKind::PermissionDenied))
    }

    fn mkdir_all(&self, path: &str, _perm: FileMode) -> VfsResult<()> {
        Err(path_err("mkdir", path, ErrorKind::PermissionDenied))
    }

    fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: FileMode,
    ) -> VfsResult<Box<dyn VfsFile>> {
        if flags.wants_write() {
            return Err(path_err("open", name, ErrorKind::PermissionDenied));
        }
        let inner = self.under.open_file(name, flags, perm)?;
        Ok(Box::new(RoFile { inner }))
    }

    fn get_umask(&self) -> FileMode {
        self.under.get_umask()
    }

    fn set_umask(&self, mask: FileMode) {
        self.under.set_umask(mask)
    }

    fn link(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        Err(link_err("link", oldname, newname, ErrorKind::PermissionDenied))
    }

    fn symlink(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        Err(link_err("symlink", oldname, newname, ErrorKind::PermissionDenied))
    }

    fn readlink(&self, name: &str) -> VfsResult<String> {
        self.under.readlink(name)
    }

    fn eval_symlinks(&self, path: &str) -> VfsResult<String> {
        self.under.eval_symlinks(path)
    }

    fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        self.under.stat(name)
    }

    fn lstat(&self, name: &str) -> VfsResult<FileInfo> {
        self.under.lstat(name)
    }

    fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>> {
        self.under.read_dir(name)
    }

    fn remove(&self, name: &str) -> VfsResult<()> {
        Err(path_err("remove", name, ErrorKind::PermissionDenied))
    }

    fn remove_all(&self, path: &str) -> VfsResult<()> {
        Err(path_err("removeall", path, ErrorKind::PermissionDenied))
    }

    fn rename(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        Err(link_err("rename", oldname, newname, ErrorKind::PermissionDenied))
    }

    fn truncate(&self, name: &str, _size: i64) -> VfsResult<()> {
        Err(path_err("truncate", name, ErrorKind::PermissionDenied))
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        crate::glob::glob(self, pattern)
    }

    fn walk(
        &self,
        root: &str,
        f: &mut dyn FnMut(&str, Result<&FileInfo, &VfsError>) -> VfsResult<WalkStep>,
    ) -> VfsResult<()> {
        crate::glob::walk(self, root, f)
    }
}

/// Handle wrapper denying every mutation.
struct RoFile {
    inner: Box<dyn VfsFile>,
}

impl VfsFile for RoFile {
    fn chdir(&self) -> VfsResult<()> {
        self.inner.chdir()
    }

    fn chmod(&self, _mode: FileMode) -> VfsResult<()> {
        Err(path_err("chmod", self.inner.name(), ErrorKind::PermissionDenied))
    }

    fn chown(&self, _uid: u32, _gid: u32) -> VfsResult<()> {
        Err(path_err("chown", self.inner.name(), ErrorKind::PermissionDenied))
    }

    fn close(&self) -> VfsResult<()> {
        self.inner.close()
    }

    fn fd(&self) -> u64 {
        self.inner.fd()
    }

    fn name(&self) -> String {
        self.inner.name()
    }

    fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf)
    }

    fn read_at(&self, buf: &mut [u8], off: i64) -> VfsResult<usize> {
        self.inner.read_at(buf, off)
    }

    fn readdir(&self, n: i32) -> VfsResult<Vec<FileInfo>> {
        self.inner.readdir(n)
    }

    fn readdirnames(&self, n: i32) -> VfsResult<Vec<String>> {
        self.inner.readdirnames(n)
    }

    fn seek(&self, pos: SeekFrom) -> VfsResult<u64> {
        self.inner.seek(pos)
    }

    fn stat(&self) -> VfsResult<FileInfo> {
        self.inner.stat()
    }

    fn sync(&self) -> VfsResult<()> {
        self.inner.sync()
    }

    fn truncate(&self, _size: i64) -> VfsResult<()> {
        Err(path_err("truncate", self.inner.name(), ErrorKind::PermissionDenied))
    }

    fn write(&self, _buf: &[u8]) -> VfsResult<usize> {
        Err(path_err("write", self.inner.name(), ErrorKind::PermissionDenied))
    }

    fn write_at(&self, _buf: &[u8], _off: i64) -> VfsResult<usize> {
        Err(path_err("writeat", self.inner.name(), ErrorKind::PermissionDenied))
    }
}
