/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The in-memory filesystem.
//!
//! A [`MemFs`] value is a view onto a shared node tree: cloning produces an
//! independent view (own current directory, user and root reference) over
//! the same nodes. All mutation goes through per-node locks; there is no
//! global tree lock.

mod dir_ops;
mod file;
mod file_ops;
mod node;
mod resolve;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{VfsError, VfsResult};
use crate::glob::WalkStep;
use crate::idm::{IdentityMgr, NotImplementedIdm, User};
use crate::lockutil::{read_lock, write_lock};
use crate::vfs::{Features, FileInfo, FileMode, OpenFlags, Vfs, VfsFile};

pub use file::MemFile;

use node::{now_ns, Node, NodeRef};

/// Default creation mask of a fresh filesystem.
const DEFAULT_UMASK: u32 = 0o022;

/// Construction options for a [`MemFs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemFsOptions {
    /// Instance name reported by `fs_name`.
    pub name: String,
    /// Initial creation mask.
    pub umask: u32,
    /// Create `/home`, `/root` and `/tmp` at construction.
    pub main_dirs: bool,
    /// Initial user, looked up in the identity manager; the identity
    /// manager's current user when absent.
    pub user: Option<String>,
}

impl Default for MemFsOptions {
    fn default() -> Self {
        MemFsOptions {
            name: String::new(),
            umask: DEFAULT_UMASK,
            main_dirs: false,
            user: None,
        }
    }
}

/// State shared by every view of the same tree.
struct Shared {
    name: String,
    features: Features,
    next_id: AtomicU64,
    umask: AtomicU32,
    idm: Arc<dyn IdentityMgr>,
}

/// Per-view state: the piece of a filesystem that `clone` does not share.
struct View {
    root: RwLock<NodeRef>,
    cwd: RwLock<String>,
    user: RwLock<User>,
}

/// An in-memory filesystem behaving like a POSIX hierarchy.
pub struct MemFs {
    shared: Arc<Shared>,
    view: Arc<View>,
}

impl MemFs {
    /// A filesystem with default options and a null identity manager; the
    /// current user is the admin.
    pub fn new() -> MemFs {
        // default options name no user and create no directories, so
        // construction cannot fail
        Self::with_options(&MemFsOptions::default(), Arc::new(NotImplementedIdm))
            .unwrap_or_else(|_| unreachable!())
    }

    /// A filesystem built from `opts`, checked against `idm`.
    pub fn with_options(opts: &MemFsOptions, idm: Arc<dyn IdentityMgr>) -> VfsResult<MemFs> {
        let next_id = AtomicU64::new(1);
        let root_user = User::root();
        let root = Node::new_dir(
            next_id.fetch_add(1, Ordering::Relaxed),
            FileMode::new(0o755),
            &root_user,
            now_ns(),
        );

        let mut features = Features::BASIC_FS
            | Features::CHROOT
            | Features::CLONABLE
            | Features::HARD_LINK
            | Features::SYMLINK
            | Features::IDENTITY_MGR;
        if opts.main_dirs {
            features = features | Features::MAIN_DIRS;
        }

        let user = match &opts.user {
            Some(name) => idm.lookup_user(name)?,
            None => idm.current_user(),
        };

        let fs = MemFs {
            shared: Arc::new(Shared {
                name: opts.name.clone(),
                features,
                next_id,
                umask: AtomicU32::new(opts.umask & 0o777),
                idm,
            }),
            view: Arc::new(View {
                root: RwLock::new(root),
                cwd: RwLock::new(String::from("/")),
                user: RwLock::new(root_user),
            }),
        };

        if opts.main_dirs {
            for (dir, perm) in [("/home", 0o755), ("/root", 0o700), ("/tmp", 0o777)] {
                fs.mkdir(dir, FileMode::new(perm))?;
            }
        }
        *write_lock(&fs.view.user) = user;

        debug!("created in-memory filesystem '{}'", fs.shared.name);
        Ok(fs)
    }

    /// Switches the current user to the named account.
    pub fn set_user(&self, name: &str) -> VfsResult<()> {
        let user = self.shared.idm.lookup_user(name)?;
        *write_lock(&self.view.user) = user;
        Ok(())
    }

    pub fn current_user(&self) -> User {
        read_lock(&self.view.user).clone()
    }

    pub fn get_umask(&self) -> FileMode {
        FileMode::new(self.shared.umask.load(Ordering::Relaxed))
    }

    pub fn set_umask(&self, mask: FileMode) {
        self.shared.umask.store(mask.perm().bits(), Ordering::Relaxed);
    }

    /// A second handle onto the very same view; used by open files so that
    /// their `chdir` affects the filesystem they came from.
    fn same_view(&self) -> MemFs {
        MemFs { shared: Arc::clone(&self.shared), view: Arc::clone(&self.view) }
    }

    fn next_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn user_snapshot(&self) -> User {
        read_lock(&self.view.user).clone()
    }

    fn root_node(&self) -> NodeRef {
        read_lock(&self.view.root).clone()
    }

    fn cwd_string(&self) -> String {
        read_lock(&self.view.cwd).clone()
    }

    /// Permission bits a newly created node receives: the requested bits
    /// masked by the current umask.
    fn effective_perm(&self, perm: FileMode) -> FileMode {
        FileMode::new(perm.perm().bits() & !self.shared.umask.load(Ordering::Relaxed))
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemFs {
    /// An independent view of the same tree: the clone starts with the
    /// original's root, current directory and user, and diverges from
    /// there.
    fn clone(&self) -> Self {
        MemFs {
            shared: Arc::clone(&self.shared),
            view: Arc::new(View {
                root: RwLock::new(self.root_node()),
                cwd: RwLock::new(self.cwd_string()),
                user: RwLock::new(self.user_snapshot()),
            }),
        }
    }
}

impl Vfs for MemFs {
    fn fs_type(&self) -> &'static str {
        "MemFs"
    }

    fn fs_name(&self) -> String {
        self.shared.name.clone()
    }

    fn features(&self) -> Features {
        self.shared.features
    }

    fn clone_fs(&self) -> Box<dyn Vfs> {
        Box::new(self.clone())
    }

    fn idm(&self) -> Arc<dyn IdentityMgr> {
        Arc::clone(&self.shared.idm)
    }

    fn current_user(&self) -> User {
        MemFs::current_user(self)
    }

    fn set_user(&self, name: &str) -> VfsResult<()> {
        MemFs::set_user(self, name)
    }

    fn chdir(&self, dir: &str) -> VfsResult<()> {
        MemFs::chdir(self, dir)
    }

    fn getwd(&self) -> VfsResult<String> {
        MemFs::getwd(self)
    }

    fn chmod(&self, name: &str, mode: FileMode) -> VfsResult<()> {
        MemFs::chmod(self, name, mode)
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        MemFs::chown(self, name, uid, gid)
    }

    fn lchown(&self, name: &str, uid: u32, gid: u32) -> VfsResult<()> {
        MemFs::lchown(self, name, uid, gid)
    }

    fn chtimes(&self, name: &str, atime_ns: i64, mtime_ns: i64) -> VfsResult<()> {
        MemFs::chtimes(self, name, atime_ns, mtime_ns)
    }

    fn chroot(&self, path: &str) -> VfsResult<()> {
        MemFs::chroot(self, path)
    }

    fn mkdir(&self, name: &str, perm: FileMode) -> VfsResult<()> {
        MemFs::mkdir(self, name, perm)
    }

    fn mkdir_all(&self, path: &str, perm: FileMode) -> VfsResult<()> {
        MemFs::mkdir_all(self, path, perm)
    }

    fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: FileMode,
    ) -> VfsResult<Box<dyn VfsFile>> {
        let file = MemFs::open_file(self, name, flags, perm)?;
        Ok(Box::new(file))
    }

    fn get_umask(&self) -> FileMode {
        MemFs::get_umask(self)
    }

    fn set_umask(&self, mask: FileMode) {
        MemFs::set_umask(self, mask)
    }

    fn link(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        MemFs::link(self, oldname, newname)
    }

    fn symlink(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        MemFs::symlink(self, oldname, newname)
    }

    fn readlink(&self, name: &str) -> VfsResult<String> {
        MemFs::readlink(self, name)
    }

    fn eval_symlinks(&self, path: &str) -> VfsResult<String> {
        MemFs::eval_symlinks(self, path)
    }

    fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        MemFs::stat(self, name)
    }

    fn lstat(&self, name: &str) -> VfsResult<FileInfo> {
        MemFs::lstat(self, name)
    }

    fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>> {
        MemFs::read_dir(self, name)
    }

    fn remove(&self, name: &str) -> VfsResult<()> {
        MemFs::remove(self, name)
    }

    fn remove_all(&self, path: &str) -> VfsResult<()> {
        MemFs::remove_all(self, path)
    }

    fn rename(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        MemFs::rename(self, oldname, newname)
    }

    fn truncate(&self, name: &str, size: i64) -> VfsResult<()> {
        MemFs::truncate(self, name, size)
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
