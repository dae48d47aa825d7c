/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The virtual filesystem surface: the [`Vfs`] trait for path-string
//! operations and the [`VfsFile`] trait for open-file handles.

mod types;

use std::io::SeekFrom;
use std::sync::Arc;

use rand::Rng;

use crate::errors::{VfsError, VfsResult};
use crate::glob::WalkStep;
use crate::idm::{IdentityMgr, User};
use crate::path;

pub use types::{Features, FileInfo, FileMode, OpenFlags, OsType};

/// Permissions a freshly created temporary directory receives.
const TEMP_DIR_PERM: u32 = 0o700;
/// Permissions a freshly created temporary file receives.
const TEMP_FILE_PERM: u32 = 0o600;
/// Attempts at finding an unused random temporary name.
const TEMP_RETRIES: u32 = 10000;

/// A virtual filesystem addressed by slash-separated path strings.
///
/// Lexical helpers (`clean`, `join`, `rel`, …) are provided so every
/// implementation agrees on path algebra; utility operations
/// (`read_file`, `write_file`, `temp_file`, …) are provided in terms of
/// the core operations so decorators inherit them for free.
pub trait Vfs: Send + Sync {
    /// Name of the filesystem implementation, e.g. `"MemFs"`.
    fn fs_type(&self) -> &'static str;

    /// Name of this filesystem instance.
    fn fs_name(&self) -> String;

    fn os_type(&self) -> OsType {
        OsType::Unix
    }

    /// The capabilities this filesystem advertises.
    fn features(&self) -> Features;

    fn has_feature(&self, feature: Features) -> bool {
        self.features().contains(feature)
    }

    /// An independent filesystem value sharing the same tree but carrying
    /// its own current directory and user.
    fn clone_fs(&self) -> Box<dyn Vfs>;

    /// The identity manager backing this filesystem.
    fn idm(&self) -> Arc<dyn IdentityMgr>;

    /// The user on whose behalf operations are checked.
    fn current_user(&self) -> User;

    /// Switches the current user to the named account.
    fn set_user(&self, name: &str) -> VfsResult<()>;

    // Lexical operations. These never touch the tree.

    fn clean(&self, p: &str) -> String {
        path::clean(p)
    }

    fn base(&self, p: &str) -> String {
        path::base(p)
    }

    fn dir_name(&self, p: &str) -> String {
        path::dir_name(p)
    }

    fn split<'a>(&self, p: &'a str) -> (&'a str, &'a str) {
        path::split(p)
    }

    fn join(&self, elems: &[&str]) -> String {
        path::join(elems)
    }

    fn is_abs(&self, p: &str) -> bool {
        path::is_abs(p)
    }

    fn is_path_separator(&self, c: char) -> bool {
        path::is_path_separator(c)
    }

    fn from_slash(&self, p: &str) -> String {
        path::from_slash(p)
    }

    fn to_slash(&self, p: &str) -> String {
        path::to_slash(p)
    }

    fn rel(&self, basepath: &str, targpath: &str) -> VfsResult<String> {
        path::rel(basepath, targpath)
    }

    /// Absolute form of `p`: cleaned as-is when already rooted, otherwise
    /// joined to the current directory.
    fn abs(&self, p: &str) -> VfsResult<String> {
        if path::is_abs(p) {
            return Ok(path::clean(p));
        }
        let wd = self.getwd()?;
        Ok(path::join(&[&wd, p]))
    }

    // Core operations.

    fn chdir(&self, dir: &str) -> VfsResult<()>;

    fn getwd(&self) -> VfsResult<String>;

    fn chmod(&self, name: &str, mode: FileMode) -> VfsResult<()>;

    fn chown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()>;

    /// Like `chown` but does not follow a terminal symbolic link.
    fn lchown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()>;

    /// Sets the modification time. The access time is accepted for call
    /// shape compatibility and ignored: nodes do not record one.
    fn chtimes(&self, name: &str, atime_ns: i64, mtime_ns: i64) -> VfsResult<()>;

    /// Replaces the root this filesystem resolves paths from. Admin only.
    fn chroot(&self, path: &str) -> VfsResult<()>;

    fn mkdir(&self, name: &str, perm: FileMode) -> VfsResult<()>;

    fn mkdir_all(&self, path: &str, perm: FileMode) -> VfsResult<()>;

    fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: FileMode,
    ) -> VfsResult<Box<dyn VfsFile>>;

    fn create(&self, name: &str) -> VfsResult<Box<dyn VfsFile>> {
        self.open_file(
            name,
            OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::TRUNC,
            FileMode::new(0o666),
        )
    }

    fn open(&self, name: &str) -> VfsResult<Box<dyn VfsFile>> {
        self.open_file(name, OpenFlags::RDONLY, FileMode::new(0))
    }

    /// The creation mask applied to permissions of new nodes.
    fn get_umask(&self) -> FileMode;

    /// Replaces the creation mask.
    fn set_umask(&self, mask: FileMode);

    /// Directory used for temporary files.
    fn get_temp_dir(&self) -> String {
        String::from("/tmp")
    }

    fn link(&self, oldname: &str, newname: &str) -> VfsResult<()>;

    fn symlink(&self, oldname: &str, newname: &str) -> VfsResult<()>;

    fn readlink(&self, name: &str) -> VfsResult<String>;

    /// The path after resolving every symbolic link, lexically cleaned.
    fn eval_symlinks(&self, path: &str) -> VfsResult<String>;

    fn stat(&self, name: &str) -> VfsResult<FileInfo>;

    fn lstat(&self, name: &str) -> VfsResult<FileInfo>;

    /// Sorted metadata snapshots of the directory's entries.
    fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>>;

    fn remove(&self, name: &str) -> VfsResult<()>;

    fn remove_all(&self, path: &str) -> VfsResult<()>;

    fn rename(&self, oldname: &str, newname: &str) -> VfsResult<()>;

    fn same_file(&self, a: &FileInfo, b: &FileInfo) -> bool {
        a.same_file(b)
    }

    fn truncate(&self, name: &str, size: i64) -> VfsResult<()>;

    /// Names matching the shell pattern, in lexical order. Traversal errors
    /// are ignored; only a malformed pattern fails.
    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>>;

    /// Walks the tree rooted at `root` in lexical depth-first order without
    /// following symbolic links.
    fn walk(
        &self,
        root: &str,
        f: &mut dyn FnMut(&str, Result<&FileInfo, &VfsError>) -> VfsResult<WalkStep>,
    ) -> VfsResult<()>;

    // Utility operations implemented in terms of the core ones.

    fn read_file(&self, name: &str) -> VfsResult<Vec<u8>> {
        let file = self.open(name)?;
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        file.close()?;
        Ok(out)
    }

    fn write_file(&self, name: &str, data: &[u8], perm: FileMode) -> VfsResult<()> {
        let file = self.open_file(
            name,
            OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::TRUNC,
            perm,
        )?;
        let mut off = 0;
        while off < data.len() {
            off += file.write(&data[off..])?;
        }
        file.close()
    }

    /// Creates a new uniquely named directory under `dir` (the temporary
    /// directory when empty) and returns its path.
    fn temp_dir(&self, dir: &str, prefix: &str) -> VfsResult<String> {
        let dir = if dir.is_empty() { self.get_temp_dir() } else { String::from(dir) };
        let mut last = VfsError::Kind(crate::errors::ErrorKind::AlreadyExists);
        for _ in 0..TEMP_RETRIES {
            let name = path::join(&[&dir, &format!("{}{}", prefix, random_suffix())]);
            match self.mkdir(&name, FileMode::new(TEMP_DIR_PERM)) {
                Ok(()) => return Ok(name),
                Err(err) if err.is_exist() => last = err,
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }

    /// Creates a new uniquely named file under `dir` (the temporary
    /// directory when empty), opened for reading and writing. The last
    /// `*` in `pattern` is replaced by a random string; without one the
    /// random string is appended.
    fn temp_file(&self, dir: &str, pattern: &str) -> VfsResult<Box<dyn VfsFile>> {
        let dir = if dir.is_empty() { self.get_temp_dir() } else { String::from(dir) };
        let (prefix, suffix) = match pattern.rfind('*') {
            Some(i) => (&pattern[..i], &pattern[i + 1..]),
            None => (pattern, ""),
        };
        let mut last = VfsError::Kind(crate::errors::ErrorKind::AlreadyExists);
        for _ in 0..TEMP_RETRIES {
            let name =
                path::join(&[&dir, &format!("{}{}{}", prefix, random_suffix(), suffix)]);
            match self.open_file(
                &name,
                OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::EXCL,
                FileMode::new(TEMP_FILE_PERM),
            ) {
                Ok(file) => return Ok(file),
                Err(err) if err.is_exist() => last = err,
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }
}

fn random_suffix() -> String {
    format!("{}", rand::thread_rng().gen_range(0..=u32::MAX))
}

/// An open file handle. All methods take `&self`; every handle carries its
/// own lock, so handles may be shared between threads.
pub trait VfsFile: Send + Sync {
    /// Makes the handle's directory the filesystem's current directory.
    fn chdir(&self) -> VfsResult<()>;

    fn chmod(&self, mode: FileMode) -> VfsResult<()>;

    fn chown(&self, uid: u32, gid: u32) -> VfsResult<()>;

    /// Releases the handle. Any later call, including a second `close`,
    /// fails.
    fn close(&self) -> VfsResult<()>;

    /// Host descriptor number; in-memory files have none.
    fn fd(&self) -> u64;

    /// The name the file was opened with.
    fn name(&self) -> String;

    /// Reads at the current offset, advancing it. Returns `Ok(0)` at end
    /// of file.
    fn read(&self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Reads at `off` without touching the handle offset. A short count
    /// means end of file was reached.
    fn read_at(&self, buf: &mut [u8], off: i64) -> VfsResult<usize>;

    /// Next `n` directory entries, sorted by name; everything at once when
    /// `n <= 0`, which also resets the iteration.
    fn readdir(&self, n: i32) -> VfsResult<Vec<FileInfo>>;

    /// Like `readdir` but only the names.
    fn readdirnames(&self, n: i32) -> VfsResult<Vec<String>>;

    /// Moves the offset and returns its new value. On directories this is
    /// a no-op returning 0.
    fn seek(&self, pos: SeekFrom) -> VfsResult<u64>;

    fn stat(&self) -> VfsResult<FileInfo>;

    /// Flushes nothing: in-memory content is always durable for the life
    /// of the tree.
    fn sync(&self) -> VfsResult<()>;

    fn truncate(&self, size: i64) -> VfsResult<()>;

    /// Writes at the current offset, advancing it.
    fn write(&self, buf: &[u8]) -> VfsResult<usize>;

    /// Writes at `off` without touching the handle offset, zero-filling
    /// any gap past the current end.
    fn write_at(&self, buf: &[u8], off: i64) -> VfsResult<usize>;

    fn write_string(&self, s: &str) -> VfsResult<usize> {
        self.write(s.as_bytes())
    }
}

impl std::fmt::Debug for dyn VfsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn VfsFile").finish_non_exhaustive()
    }
}
