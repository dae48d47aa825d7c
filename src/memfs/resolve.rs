/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Path resolution over the node tree.
//!
//! [`MemFs::search_node`] walks an absolute path segment by segment from
//! the current root, following symbolic links according to the requested
//! mode and enforcing lookup permission on every traversed directory.

use crate::errors::ErrorKind;
use crate::lockutil::read_lock;
use crate::path;

use super::node::{NodeRef, WANT_LOOKUP};
use super::MemFs;

/// Maximum number of symbolic links a single resolution may cross.
pub(super) const SYMLINK_MAX: u32 = 64;

/// Symbolic link handling at the terminal path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SlMode {
    /// Do not follow a terminal symbolic link.
    Lstat,
    /// Follow a terminal symbolic link; the caller keeps naming the result
    /// after the unresolved final segment.
    Stat,
    /// Follow everything; the resolved absolute path is the result.
    Eval,
}

/// Outcome of a resolution. `kind` is [`ErrorKind::AlreadyExists`] when the
/// node was located; any other kind describes why it was not. On
/// [`ErrorKind::NotFound`], `parent` and `start..end` identify the deepest
/// existing directory and the missing segment, so creation sites know
/// where to attach.
pub(super) struct Resolved {
    /// Deepest directory successfully traversed.
    pub parent: NodeRef,
    /// The node at the final segment, when it exists.
    pub child: Option<NodeRef>,
    /// Fully resolved absolute path, after symbolic link substitutions.
    pub abs_path: String,
    /// Span of the final segment within `abs_path`.
    pub start: usize,
    pub end: usize,
    pub kind: ErrorKind,
}

impl Resolved {
    pub fn found(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }

    /// The final path segment.
    pub fn segment(&self) -> &str {
        &self.abs_path[self.start..self.end]
    }

    /// Whether the resolution stopped at the final segment of the path.
    pub fn at_last_segment(&self) -> bool {
        self.end >= self.abs_path.len()
    }

    /// The located node and its parent, or the error kind for the caller
    /// to wrap.
    pub fn take_found(self) -> Result<(NodeRef, NodeRef), ErrorKind> {
        match self.child {
            Some(child) if self.kind == ErrorKind::AlreadyExists => Ok((self.parent, child)),
            _ => Err(self.kind),
        }
    }
}

impl MemFs {
    /// Resolves `name` against the current directory and root.
    pub(super) fn search_node(&self, name: &str, mode: SlMode) -> Resolved {
        let root = self.root_node();
        if name.is_empty() {
            return Resolved {
                parent: root,
                child: None,
                abs_path: String::new(),
                start: 0,
                end: 0,
                kind: ErrorKind::NotFound,
            };
        }

        let user = self.user_snapshot();
        let mut abs = if path::is_abs(name) {
            path::clean(name)
        } else {
            path::join(&[&self.cwd_string(), name])
        };

        let mut parent = root.clone();
        let mut curr = root.clone();
        let mut pos: usize = 1;
        let mut sl_count: u32 = 0;

        loop {
            if abs == "/" {
                return Resolved {
                    parent,
                    child: Some(curr),
                    abs_path: abs,
                    start: 1,
                    end: 1,
                    kind: ErrorKind::AlreadyExists,
                };
            }

            let (end, is_last) = path::segment_path(&abs, pos);

            if !curr.check_permission(WANT_LOOKUP, &user) {
                return Resolved {
                    parent: curr,
                    child: None,
                    abs_path: abs,
                    start: pos,
                    end,
                    kind: ErrorKind::PermissionDenied,
                };
            }

            let child = match curr.dir_children() {
                Some(children) => read_lock(children).get(&abs[pos..end]).cloned(),
                None => None,
            };

            let Some(child) = child else {
                return Resolved {
                    parent: curr,
                    child: None,
                    abs_path: abs,
                    start: pos,
                    end,
                    kind: ErrorKind::NotFound,
                };
            };

            if child.is_dir() {
                if is_last {
                    return Resolved {
                        parent: curr,
                        child: Some(child),
                        abs_path: abs,
                        start: pos,
                        end,
                        kind: ErrorKind::AlreadyExists,
                    };
                }
                parent = curr;
                curr = child;
                pos = end + 1;
                continue;
            }

            if child.is_file() {
                let kind = if is_last {
                    ErrorKind::AlreadyExists
                } else {
                    // a file in the middle of the path
                    ErrorKind::NotADirectory
                };
                return Resolved {
                    parent: curr,
                    child: Some(child),
                    abs_path: abs,
                    start: pos,
                    end,
                    kind,
                };
            }

            // symbolic link
            sl_count += 1;
            if sl_count > SYMLINK_MAX {
                return Resolved {
                    parent: curr,
                    child: Some(child),
                    abs_path: abs,
                    start: pos,
                    end,
                    kind: ErrorKind::TooManySymlinks,
                };
            }
            if is_last && mode == SlMode::Lstat {
                return Resolved {
                    parent: curr,
                    child: Some(child),
                    abs_path: abs,
                    start: pos,
                    end,
                    kind: ErrorKind::AlreadyExists,
                };
            }

            let target = match &child.kind {
                super::node::NodeKind::Symlink { target } => target.as_str(),
                _ => "",
            };
            let remainder = &abs[end..];
            abs = if path::is_abs(target) {
                // absolute target replaces the walked prefix
                path::clean(&format!("{}{}", target, remainder))
            } else {
                // relative target is spliced in at the segment position
                path::clean(&format!("{}{}{}", &abs[..pos], target, remainder))
            };
            parent = root.clone();
            curr = root.clone();
            pos = 1;
        }
    }
}
