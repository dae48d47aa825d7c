/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A decorator that rebases absolute paths beneath a fixed prefix of an
//! underlying filesystem, chroot-like, and rewrites paths appearing in
//! returned errors back into its own namespace.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::errors::{link_err, path_err, ErrorKind, LinkError, PathError, VfsError, VfsResult};
use crate::glob::WalkStep;
use crate::idm::{IdentityMgr, User};
use crate::path;
use crate::vfs::{Features, FileInfo, FileMode, OpenFlags, Vfs, VfsFile};

/// View of `under` where every absolute path is resolved beneath
/// `base_path`. Symbolic link support is not advertised and symbolic link
/// operations are denied: a link target could name a path outside the
/// base.
pub struct BasePathFs {
    under: Box<dyn Vfs>,
    /// Cleaned absolute prefix; empty when the prefix is the root.
    base: String,
}

impl BasePathFs {
    /// Wraps `under`. The prefix must already resolve to an existing
    /// directory there.
    pub fn new(under: Box<dyn Vfs>, base_path: &str) -> VfsResult<BasePathFs> {
        const OP: &str = "basepath";
        let abs = under
            .abs(base_path)
            .map_err(|err| path_err(OP, base_path, err.kind()))?;
        let info = under.stat(&abs).map_err(|err| path_err(OP, base_path, err.kind()))?;
        if !info.mode.is_dir() {
            return Err(path_err(OP, base_path, ErrorKind::NotADirectory));
        }
        let base = if abs == "/" { String::new() } else { abs };
        Ok(BasePathFs { under, base })
    }

    /// The prefix paths are rebased under.
    pub fn base_path(&self) -> &str {
        if self.base.is_empty() {
            "/"
        } else {
            &self.base
        }
    }

    /// Maps an incoming path into the underlying namespace. Relative paths
    /// pass through: the underlying current directory already lives below
    /// the base.
    fn to_base(&self, p: &str) -> String {
        if p.is_empty() {
            return String::new();
        }
        if !path::is_abs(p) {
            return String::from(p);
        }
        let cleaned = path::clean(p);
        if cleaned == "/" {
            if self.base.is_empty() {
                String::from("/")
            } else {
                self.base.clone()
            }
        } else {
            format!("{}{}", self.base, cleaned)
        }
    }

    fn restore(&self, err: VfsError) -> VfsError {
        restore_error(&self.base, err)
    }
}

impl std::fmt::Debug for BasePathFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasePathFs")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Maps a path of the underlying namespace back into the wrapper's.
fn strip_path(base: &str, p: &str) -> String {
    if base.is_empty() {
        return String::from(p);
    }
    match p.strip_prefix(base) {
        Some("") => String::from("/"),
        Some(rest) if rest.starts_with('/') => String::from(rest),
        _ => String::from(p),
    }
}

/// Rewrites every path inside an error envelope into the wrapper's
/// namespace.
fn restore_error(base: &str, err: VfsError) -> VfsError {
    match err {
        VfsError::Path(e) => VfsError::Path(PathError {
            op: e.op,
            path: strip_path(base, &e.path),
            kind: e.kind,
        }),
        VfsError::Link(e) => VfsError::Link(LinkError {
            op: e.op,
            old: strip_path(base, &e.old),
            new: strip_path(base, &e.new),
            kind: e.kind,
        }),
        other => other,
    }
}

impl Vfs for BasePathFs {
    fn fs_type(&self) -> &'static str {
        "BasePathFs"
    }

    fn fs_name(&self) -> String {
        self.under.fs_name()
    }

    fn features(&self) -> Features {
        self.under.features().difference(Features::SYMLINK)
    }

    fn clone_fs(&self) -> Box<dyn Vfs> {
        Box::new(BasePathFs { under: self.under.clone_fs(), base: self.base.clone() })
    }

    fn idm(&self) -> Arc<dyn IdentityMgr> {
        self.under.idm()
    }

    fn current_user(&self) -> User {
        self.under.current_user()
    }

    fn set_user(&self, name: &str) -> VfsResult<()> {
        self.under.set_user(name)
    }

    fn chdir(&self, dir: &str) -> VfsResult<()> {
        self.under.chdir(&self.to_base(dir)).map_err(|err| self.restore(err))
    }

    fn getwd(&self) -> VfsResult<String> {
        let wd = self.under.getwd().map_err(|err| self.restore(err))?;
        Ok(strip_path(&self.base, &wd))
    }

    fn chmod(&self, name: &str, mode: FileMode) -> VfsResult<()> {
        self.under.chmod(&self.to_base(name), mode).map_err(|err| self.restore(err))
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.under.chown(&self.to_base(name), uid, gid).map_err(|err| self.restore(err))
    }

    fn lchown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.under.lchown(&self.to_base(name), uid, gid).map_err(|err| self.restore(err))
    }

    fn chtimes(&self, name: &str, atime_ns: i64, mtime_ns: i64) -> VfsResult<()> {
        self.under
            .chtimes(&self.to_base(name), atime_ns, mtime_ns)
            .map_err(|err| self.restore(err))
    }

    fn chroot(&self, name: &str) -> VfsResult<()> {
        self.under.chroot(&self.to_base(name)).map_err(|err| self.restore(err))
    }

    fn mkdir(&self, name: &str, perm: FileMode) -> VfsResult<()> {
        self.under.mkdir(&self.to_base(name), perm).map_err(|err| self.restore(err))
    }

    fn mkdir_all(&self, name: &str, perm: FileMode) -> VfsResult<()> {
        self.under.mkdir_all(&self.to_base(name), perm).map_err(|err| self.restore(err))
    }

    fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: FileMode,
    ) -> VfsResult<Box<dyn VfsFile>> {
        let inner = self
            .under
            .open_file(&self.to_base(name), flags, perm)
            .map_err(|err| self.restore(err))?;
        Ok(Box::new(BasePathFile { inner, base: self.base.clone() }))
    }

    fn get_umask(&self) -> FileMode {
        self.under.get_umask()
    }

    fn set_umask(&self, mask: FileMode) {
        self.under.set_umask(mask)
    }

    fn link(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        self.under
            .link(&self.to_base(oldname), &self.to_base(newname))
            .map_err(|err| self.restore(err))
    }

    fn symlink(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        Err(link_err("symlink", oldname, newname, ErrorKind::PermissionDenied))
    }

    fn readlink(&self, name: &str) -> VfsResult<String> {
        Err(path_err("readlink", name, ErrorKind::PermissionDenied))
    }

    fn eval_symlinks(&self, name: &str) -> VfsResult<String> {
        Err(path_err("lstat", name, ErrorKind::PermissionDenied))
    }

    fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        self.under.stat(&self.to_base(name)).map_err(|err| self.restore(err))
    }

    fn lstat(&self, name: &str) -> VfsResult<FileInfo> {
        self.under.lstat(&self.to_base(name)).map_err(|err| self.restore(err))
    }

    fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>> {
        self.under.read_dir(&self.to_base(name)).map_err(|err| self.restore(err))
    }

    fn remove(&self, name: &str) -> VfsResult<()> {
        self.under.remove(&self.to_base(name)).map_err(|err| self.restore(err))
    }

    fn remove_all(&self, name: &str) -> VfsResult<()> {
        self.under.remove_all(&self.to_base(name)).map_err(|err| self.restore(err))
    }

    fn rename(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        self.under
            .rename(&self.to_base(oldname), &self.to_base(newname))
            .map_err(|err| self.restore(err))
    }

    fn truncate(&self, name: &str, size: i64) -> VfsResult<()> {
        self.under.truncate(&self.to_base(name), size).map_err(|err| self.restore(err))
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

/// Handle wrapper keeping names and error paths in the wrapper namespace.
struct BasePathFile {
    inner: Box<dyn VfsFile>,
    base: String,
}

impl BasePathFile {
    fn restore(&self, err: VfsError) -> VfsError {
        restore_error(&self.base, err)
    }
}

impl VfsFile for BasePathFile {
    fn chdir(&self) -> VfsResult<()> {
        self.inner.chdir().map_err(|err| self.restore(err))
    }

    fn chmod(&self, mode: FileMode) -> VfsResult<()> {
        self.inner.chmod(mode).map_err(|err| self.restore(err))
    }

    fn chown(&self, uid: u32, gid: u32) -> VfsResult<()> {
        self.inner.chown(uid, gid).map_err(|err| self.restore(err))
    }

    fn close(&self) -> VfsResult<()> {
        self.inner.close().map_err(|err| self.restore(err))
    }

    fn fd(&self) -> u64 {
        self.inner.fd()
    }

    fn name(&self) -> String {
        strip_path(&self.base, &self.inner.name())
    }

    fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf).map_err(|err| self.restore(err))
    }

    fn read_at(&self, buf: &mut [u8], off: i64) -> VfsResult<usize> {
        self.inner.read_at(buf, off).map_err(|err| self.restore(err))
    }

    fn readdir(&self, n: i32) -> VfsResult<Vec<FileInfo>> {
        self.inner.readdir(n).map_err(|err| self.restore(err))
    }

    fn readdirnames(&self, n: i32) -> VfsResult<Vec<String>> {
        self.inner.readdirnames(n).map_err(|err| self.restore(err))
    }

    fn seek(&self, pos: SeekFrom) -> VfsResult<u64> {
        self.inner.seek(pos).map_err(|err| self.restore(err))
    }

    fn stat(&self) -> VfsResult<FileInfo> {
        self.inner.stat().map_err(|err| self.restore(err))
    }

    fn sync(&self) -> VfsResult<()> {
        self.inner.sync().map_err(|err| self.restore(err))
    }

    fn truncate(&self, size: i64) -> VfsResult<()> {
        self.inner.truncate(size).map_err(|err| self.restore(err))
    }

    fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        self.inner.write(buf).map_err(|err| self.restore(err))
    }

    fn write_at(&self, buf: &[u8], off: i64) -> VfsResult<usize> {
        self.inner.write_at(buf, off).map_err(|err| self.restore(err))
    }
}
