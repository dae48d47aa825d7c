/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Directory-level operations: creation, removal, renaming and the
//! current-directory and root state.

use std::sync::Arc;

use log::debug;

use crate::errors::{link_err, path_err, ErrorKind, VfsResult};
use crate::lockutil::{read_lock, write_lock};
use crate::vfs::FileMode;

use super::node::{now_ns, Node, NodeKind, NodeRef, WANT_LOOKUP, WANT_WRITE};
use super::resolve::SlMode;
use super::MemFs;

impl MemFs {
    /// Creates a directory with permissions `perm & 0o777 & !umask`.
    pub fn mkdir(&self, name: &str, perm: FileMode) -> VfsResult<()> {
        const OP: &str = "mkdir";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Lstat);
        match r.kind {
            ErrorKind::AlreadyExists => Err(path_err(OP, name, ErrorKind::AlreadyExists)),
            ErrorKind::NotFound => {
                if !r.at_last_segment() || r.segment().is_empty() {
                    return Err(path_err(OP, name, ErrorKind::NotFound));
                }
                if !r.parent.check_permission(WANT_WRITE | WANT_LOOKUP, &user) {
                    return Err(path_err(OP, name, ErrorKind::PermissionDenied));
                }
                let node =
                    Node::new_dir(self.next_id(), self.effective_perm(perm), &user, now_ns());
                self.attach(&r.parent, r.segment(), node)
                    .map_err(|kind| path_err(OP, name, kind))
            }
            kind => Err(path_err(OP, name, kind)),
        }
    }

    /// Creates every missing directory along `path`. Succeeds when the
    /// whole path already names a directory.
    pub fn mkdir_all(&self, path: &str, perm: FileMode) -> VfsResult<()> {
        const OP: &str = "mkdir";
        let user = self.user_snapshot();
        let r = self.search_node(path, SlMode::Eval);
        match r.kind {
            ErrorKind::AlreadyExists => {
                match &r.child {
                    Some(child) if child.is_dir() => Ok(()),
                    _ => Err(path_err(OP, path, ErrorKind::NotADirectory)),
                }
            }
            ErrorKind::NotFound => {
                if r.segment().is_empty() {
                    return Err(path_err(OP, path, ErrorKind::NotFound));
                }
                // create every missing segment from the deepest existing
                // ancestor downward
                let abs = r.abs_path.clone();
                let mut parent = r.parent.clone();
                let mut pos = r.start;
                loop {
                    let (end, is_last) = crate::path::segment_path(&abs, pos);
                    let seg = &abs[pos..end];
                    if !parent.check_permission(WANT_WRITE | WANT_LOOKUP, &user) {
                        return Err(path_err(OP, path, ErrorKind::PermissionDenied));
                    }
                    let child = {
                        let Some(children) = parent.dir_children() else {
                            return Err(path_err(OP, path, ErrorKind::NotADirectory));
                        };
                        let mut children = write_lock(children);
                        match children.get(seg) {
                            Some(existing) => {
                                if !existing.is_dir() {
                                    return Err(path_err(OP, path, ErrorKind::NotADirectory));
                                }
                                existing.clone()
                            }
                            None => {
                                let node = Node::new_dir(
                                    self.next_id(),
                                    self.effective_perm(perm),
                                    &user,
                                    now_ns(),
                                );
                                children.insert(String::from(seg), node.clone());
                                parent.touch(now_ns());
                                node
                            }
                        }
                    };
                    if is_last {
                        return Ok(());
                    }
                    parent = child;
                    pos = end + 1;
                }
            }
            kind => Err(path_err(OP, path, kind)),
        }
    }

    /// Detaches the named entry. Directories must be empty; the last hard
    /// link of a file releases its content.
    pub fn remove(&self, name: &str) -> VfsResult<()> {
        const OP: &str = "remove";
        let user = self.user_snapshot();
        let r = self.search_node(name, SlMode::Lstat);
        let seg = String::from(r.segment());
        let (parent, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, name, kind)),
        };
        if seg.is_empty() {
            // the root directory always exists
            return Err(path_err(OP, name, ErrorKind::NotPermitted));
        }
        if !parent.check_permission(WANT_WRITE, &user) {
            return Err(path_err(OP, name, ErrorKind::PermissionDenied));
        }
        let Some(parent_children) = parent.dir_children() else {
            return Err(path_err(OP, name, ErrorKind::NotADirectory));
        };

        if let Some(child_children) = child.dir_children() {
            // both locks taken in node id order, held through the detach
            let mut parent_guard;
            let child_guard;
            if parent.id <= child.id {
                parent_guard = write_lock(parent_children);
                child_guard = read_lock(child_children);
            } else {
                child_guard = read_lock(child_children);
                parent_guard = write_lock(parent_children);
            }
            if !child_guard.is_empty() {
                return Err(path_err(OP, name, ErrorKind::DirNotEmpty));
            }
            parent_guard.remove(&seg);
        } else {
            let removed = write_lock(parent_children).remove(&seg);
            match removed {
                Some(node) => drop_link(&node),
                None => return Err(path_err(OP, name, ErrorKind::NotFound)),
            }
        }
        parent.touch(now_ns());
        Ok(())
    }

    /// Removes `path` and any descendants. A missing node or an empty path
    /// is a success.
    pub fn remove_all(&self, path: &str) -> VfsResult<()> {
        const OP: &str = "removeall";
        if path.is_empty() {
            return Ok(());
        }
        let user = self.user_snapshot();
        let r = self.search_node(path, SlMode::Lstat);
        let seg = String::from(r.segment());
        let (parent, _) = match r.take_found() {
            Ok(found) => found,
            Err(ErrorKind::NotFound) => return Ok(()),
            Err(kind) => return Err(path_err(OP, path, kind)),
        };
        if seg.is_empty() {
            return Err(path_err(OP, path, ErrorKind::NotPermitted));
        }
        if !parent.check_permission(WANT_WRITE, &user) {
            return Err(path_err(OP, path, ErrorKind::PermissionDenied));
        }
        let Some(parent_children) = parent.dir_children() else {
            return Err(path_err(OP, path, ErrorKind::NotADirectory));
        };
        let detached = write_lock(parent_children).remove(&seg);
        if let Some(node) = detached {
            release_tree(&node);
            parent.touch(now_ns());
        }
        Ok(())
    }

    /// Moves `oldname` to `newname`. Renaming a path onto itself is a
    /// no-op; a file may replace an existing file, a directory never
    /// replaces anything.
    pub fn rename(&self, oldname: &str, newname: &str) -> VfsResult<()> {
        const OP: &str = "rename";
        let user = self.user_snapshot();

        let ro = self.search_node(oldname, SlMode::Lstat);
        let old_seg = String::from(ro.segment());
        let old_abs = ro.abs_path.clone();
        let (old_parent, node) = match ro.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(link_err(OP, oldname, newname, kind)),
        };
        if old_seg.is_empty() {
            return Err(link_err(OP, oldname, newname, ErrorKind::NotPermitted));
        }

        let rn = self.search_node(newname, SlMode::Lstat);
        if old_abs == rn.abs_path {
            return Ok(());
        }
        if node.is_dir() && rn.abs_path.starts_with(&format!("{}/", old_abs)) {
            // renaming a directory into its own subtree
            return Err(link_err(OP, oldname, newname, ErrorKind::InvalidArgument));
        }
        let new_seg = String::from(rn.segment());
        match rn.kind {
            ErrorKind::AlreadyExists => {
                let existing_dir = rn.child.as_ref().is_some_and(|c| c.is_dir());
                if node.is_dir() {
                    return Err(link_err(OP, oldname, newname, ErrorKind::AlreadyExists));
                }
                if existing_dir {
                    return Err(link_err(OP, oldname, newname, ErrorKind::IsADirectory));
                }
            }
            ErrorKind::NotFound => {
                if !rn.at_last_segment() || new_seg.is_empty() {
                    return Err(link_err(OP, oldname, newname, ErrorKind::NotFound));
                }
            }
            kind => return Err(link_err(OP, oldname, newname, kind)),
        }
        let new_parent = rn.parent;

        if !old_parent.check_permission(WANT_WRITE, &user)
            || !new_parent.check_permission(WANT_WRITE, &user)
        {
            return Err(link_err(OP, oldname, newname, ErrorKind::PermissionDenied));
        }

        let Some(old_children) = old_parent.dir_children() else {
            return Err(link_err(OP, oldname, newname, ErrorKind::NotADirectory));
        };
        let Some(new_children) = new_parent.dir_children() else {
            return Err(link_err(OP, oldname, newname, ErrorKind::NotADirectory));
        };

        // attach and detach under both locks, taken in node id order
        let replaced = if Arc::ptr_eq(&old_parent, &new_parent) {
            let mut children = write_lock(old_children);
            match children.remove(&old_seg) {
                Some(moved) => children.insert(new_seg.clone(), moved),
                None => return Err(link_err(OP, oldname, newname, ErrorKind::NotFound)),
            }
        } else if old_parent.id < new_parent.id {
            let mut old_guard = write_lock(old_children);
            let mut new_guard = write_lock(new_children);
            match old_guard.remove(&old_seg) {
                Some(moved) => new_guard.insert(new_seg.clone(), moved),
                None => return Err(link_err(OP, oldname, newname, ErrorKind::NotFound)),
            }
        } else {
            let mut new_guard = write_lock(new_children);
            let mut old_guard = write_lock(old_children);
            match old_guard.remove(&old_seg) {
                Some(moved) => new_guard.insert(new_seg.clone(), moved),
                None => return Err(link_err(OP, oldname, newname, ErrorKind::NotFound)),
            }
        };
        if let Some(old_node) = replaced {
            drop_link(&old_node);
        }
        let now = now_ns();
        old_parent.touch(now);
        new_parent.touch(now);
        debug!("renamed '{}' to '{}'", old_abs, newname);
        Ok(())
    }

    /// Makes `dir` the current directory of this view.
    pub fn chdir(&self, dir: &str) -> VfsResult<()> {
        const OP: &str = "chdir";
        let user = self.user_snapshot();
        let r = self.search_node(dir, SlMode::Eval);
        let abs = r.abs_path.clone();
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, dir, kind)),
        };
        if !child.is_dir() {
            return Err(path_err(OP, dir, ErrorKind::NotADirectory));
        }
        if !child.check_permission(WANT_LOOKUP, &user) {
            return Err(path_err(OP, dir, ErrorKind::PermissionDenied));
        }
        *write_lock(&self.view.cwd) = abs;
        Ok(())
    }

    /// The current directory of this view, always absolute.
    pub fn getwd(&self) -> VfsResult<String> {
        Ok(self.cwd_string())
    }

    /// Replaces this view's root directory. Admin only; the current
    /// directory is reset to the new root.
    pub fn chroot(&self, path: &str) -> VfsResult<()> {
        const OP: &str = "chroot";
        let user = self.user_snapshot();
        if !user.is_root() {
            return Err(path_err(OP, path, ErrorKind::NotPermitted));
        }
        let r = self.search_node(path, SlMode::Eval);
        let abs = r.abs_path.clone();
        let (_, child) = match r.take_found() {
            Ok(found) => found,
            Err(kind) => return Err(path_err(OP, path, kind)),
        };
        if !child.is_dir() {
            return Err(path_err(OP, path, ErrorKind::NotADirectory));
        }
        *write_lock(&self.view.root) = child;
        *write_lock(&self.view.cwd) = String::from("/");
        debug!("chroot to '{}'", abs);
        Ok(())
    }

    /// Inserts `node` as `parent`'s child `seg`, re-checking for a
    /// concurrent creation.
    pub(super) fn attach(&self, parent: &NodeRef, seg: &str, node: NodeRef) -> Result<(), ErrorKind> {
        let Some(children) = parent.dir_children() else {
            return Err(ErrorKind::NotADirectory);
        };
        let mut children = write_lock(children);
        if children.contains_key(seg) {
            return Err(ErrorKind::AlreadyExists);
        }
        children.insert(String::from(seg), node);
        drop(children);
        parent.touch(now_ns());
        Ok(())
    }
}

/// Decrements the hard link count of a detached file entry.
fn drop_link(node: &NodeRef) {
    if let Some(data) = node.file_data() {
        let mut data = write_lock(data);
        data.nlink = data.nlink.saturating_sub(1);
    }
}

/// Detached-subtree cleanup: walks the tree decrementing file link counts.
fn release_tree(node: &NodeRef) {
    match &node.kind {
        NodeKind::Dir(children) => {
            let drained: Vec<NodeRef> = {
                let mut children = write_lock(children);
                std::mem::take(&mut *children).into_values().collect()
            };
            for child in drained {
                release_tree(&child);
            }
        }
        NodeKind::File(_) => drop_link(node),
        NodeKind::Symlink { .. } => {}
    }
}
