/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Open-file handles over in-memory nodes.
//!
//! A handle owns its offset and directory-iteration state behind its own
//! lock; the handle lock is always taken before the node lock. A handle
//! whose node has been unlinked stays usable until closed.

use std::cmp;
use std::io::SeekFrom;
use std::sync::RwLock;

use crate::errors::{path_err, ErrorKind, SyscallError, VfsError, VfsResult};
use crate::lockutil::{read_lock, write_lock};
use crate::vfs::{FileInfo, FileMode, VfsFile};

use super::node::{now_ns, NodeRef, WANT_LOOKUP};
use super::MemFs;

struct HandleState {
    /// Cleared on close; every operation on a cleared handle fails.
    node: Option<NodeRef>,
    offset: u64,
    /// Sorted entries snapshotted at the first paged `readdir`.
    dir_entries: Option<Vec<FileInfo>>,
    dir_pos: usize,
}

/// An open file of a [`MemFs`].
pub struct MemFile {
    fs: MemFs,
    /// The name the file was opened with, kept verbatim for errors.
    name: String,
    /// Resolved absolute path, used by `chdir`.
    abs_path: String,
    readable: bool,
    writable: bool,
    append: bool,
    state: RwLock<HandleState>,
}

impl MemFile {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        fs: MemFs,
        node: NodeRef,
        name: &str,
        abs_path: String,
        readable: bool,
        writable: bool,
        append: bool,
        offset: u64,
    ) -> MemFile {
        MemFile {
            fs,
            name: String::from(name),
            abs_path,
            readable,
            writable,
            append,
            state: RwLock::new(HandleState {
                node: Some(node),
                offset,
                dir_entries: None,
                dir_pos: 0,
            }),
        }
    }

    fn node_of(&self, state: &HandleState, op: &'static str) -> VfsResult<NodeRef> {
        state.node.clone().ok_or_else(|| path_err(op, &self.name, ErrorKind::Closed))
    }

    /// Sorted snapshot of the directory's entries.
    fn snapshot(&self, node: &NodeRef) -> VfsResult<Vec<FileInfo>> {
        let Some(children) = node.dir_children() else {
            return Err(VfsError::Syscall(SyscallError::new(
                "readdirent",
                ErrorKind::NotADirectory,
            )));
        };
        let children = read_lock(children);
        Ok(children.iter().map(|(name, child)| child.fill_stat(name)).collect())
    }

    /// Serves the next `n` entries (all of them when `n <= 0`, resetting
    /// the cursor).
    fn readdir_page(&self, n: i32) -> VfsResult<Vec<FileInfo>> {
        const OP: &str = "readdirent";
        let mut state = write_lock(&self.state);
        let node = self.node_of(&state, OP)?;

        if n <= 0 {
            state.dir_entries = None;
            state.dir_pos = 0;
            return self.snapshot(&node);
        }

        if state.dir_entries.is_none() {
            state.dir_entries = Some(self.snapshot(&node)?);
            state.dir_pos = 0;
        }
        let Some(entries) = &state.dir_entries else {
            return Ok(Vec::new());
        };
        let start = cmp::min(state.dir_pos, entries.len());
        let end = cmp::min(start + n as usize, entries.len());
        let page = entries[start..end].to_vec();
        state.dir_pos = end;
        Ok(page)
    }
}

impl std::fmt::Debug for MemFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemFile")
            .field("name", &self.name)
            .field("abs_path", &self.abs_path)
            .finish_non_exhaustive()
    }
}

impl VfsFile for MemFile {
    fn chdir(&self) -> VfsResult<()> {
        const OP: &str = "chdir";
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if !node.is_dir() {
            return Err(path_err(OP, &self.name, ErrorKind::NotADirectory));
        }
        let user = self.fs.current_user();
        if !node.check_permission(WANT_LOOKUP, &user) {
            return Err(path_err(OP, &self.name, ErrorKind::PermissionDenied));
        }
        drop(state);
        *write_lock(&self.fs.view.cwd) = self.abs_path.clone();
        Ok(())
    }

    fn chmod(&self, mode: FileMode) -> VfsResult<()> {
        const OP: &str = "chmod";
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        let user = self.fs.current_user();
        node.set_mode(mode, &user).map_err(|kind| path_err(OP, &self.name, kind))
    }

    fn chown(&self, uid: u32, gid: u32) -> VfsResult<()> {
        const OP: &str = "chown";
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        let user = self.fs.current_user();
        node.set_owner(uid, gid, &user).map_err(|kind| path_err(OP, &self.name, kind))
    }

    fn close(&self) -> VfsResult<()> {
        const OP: &str = "close";
        let mut state = write_lock(&self.state);
        if state.node.is_none() {
            return Err(path_err(OP, &self.name, ErrorKind::Closed));
        }
        state.node = None;
        state.dir_entries = None;
        state.dir_pos = 0;
        Ok(())
    }

    fn fd(&self) -> u64 {
        u64::MAX
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        const OP: &str = "read";
        let mut state = write_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if node.is_dir() {
            return Err(path_err(OP, &self.name, ErrorKind::IsADirectory));
        }
        if !self.readable {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        let Some(data) = node.file_data() else {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        };
        let n = {
            let data = read_lock(data);
            let off = state.offset as usize;
            if off >= data.bytes.len() {
                0
            } else {
                let n = cmp::min(buf.len(), data.bytes.len() - off);
                buf[..n].copy_from_slice(&data.bytes[off..off + n]);
                n
            }
        };
        state.offset += n as u64;
        Ok(n)
    }

    fn read_at(&self, buf: &mut [u8], off: i64) -> VfsResult<usize> {
        const OP: &str = "readat";
        if off < 0 {
            return Err(path_err(OP, &self.name, ErrorKind::NegativeOffset));
        }
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if node.is_dir() {
            return Err(path_err(OP, &self.name, ErrorKind::IsADirectory));
        }
        if !self.readable {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        let Some(data) = node.file_data() else {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        };
        let data = read_lock(data);
        let off = off as usize;
        if off >= data.bytes.len() {
            return Ok(0);
        }
        let n = cmp::min(buf.len(), data.bytes.len() - off);
        buf[..n].copy_from_slice(&data.bytes[off..off + n]);
        Ok(n)
    }

    fn readdir(&self, n: i32) -> VfsResult<Vec<FileInfo>> {
        self.readdir_page(n)
    }

    fn readdirnames(&self, n: i32) -> VfsResult<Vec<String>> {
        Ok(self.readdir_page(n)?.into_iter().map(|entry| entry.name).collect())
    }

    fn seek(&self, pos: SeekFrom) -> VfsResult<u64> {
        const OP: &str = "seek";
        let mut state = write_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if node.is_dir() {
            // seeking a directory is a no-op
            return Ok(0);
        }
        let size = match node.file_data() {
            Some(data) => read_lock(data).bytes.len() as i128,
            None => 0,
        };
        let target: i128 = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => state.offset as i128 + delta as i128,
            SeekFrom::End(delta) => size + delta as i128,
        };
        if target < 0 {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        }
        state.offset = target as u64;
        Ok(state.offset)
    }

    fn stat(&self) -> VfsResult<FileInfo> {
        const OP: &str = "stat";
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        Ok(node.fill_stat(&crate::path::base(&self.name)))
    }

    fn sync(&self) -> VfsResult<()> {
        const OP: &str = "sync";
        let state = read_lock(&self.state);
        self.node_of(&state, OP)?;
        Ok(())
    }

    fn truncate(&self, size: i64) -> VfsResult<()> {
        const OP: &str = "truncate";
        if size < 0 {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        }
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if node.is_dir() {
            return Err(path_err(OP, &self.name, ErrorKind::IsADirectory));
        }
        if !self.writable {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        let Some(data) = node.file_data() else {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        };
        write_lock(data).bytes.resize(size as usize, 0);
        node.touch(now_ns());
        Ok(())
    }

    fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        const OP: &str = "write";
        let mut state = write_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if node.is_dir() {
            return Err(path_err(OP, &self.name, ErrorKind::IsADirectory));
        }
        if !self.writable {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        let Some(data) = node.file_data() else {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        };
        let end = {
            let mut data = write_lock(data);
            // append mode always writes at the current end
            let off = if self.append { data.bytes.len() } else { state.offset as usize };
            let end = off + buf.len();
            if end > data.bytes.len() {
                data.bytes.resize(end, 0);
            }
            data.bytes[off..end].copy_from_slice(buf);
            end
        };
        node.touch(now_ns());
        state.offset = end as u64;
        Ok(buf.len())
    }

    fn write_at(&self, buf: &[u8], off: i64) -> VfsResult<usize> {
        const OP: &str = "writeat";
        if off < 0 {
            return Err(path_err(OP, &self.name, ErrorKind::NegativeOffset));
        }
        if self.append {
            // positioned writes make no sense on an append-only handle
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        }
        let state = read_lock(&self.state);
        let node = self.node_of(&state, OP)?;
        if node.is_dir() {
            return Err(path_err(OP, &self.name, ErrorKind::IsADirectory));
        }
        if !self.writable {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        let Some(data) = node.file_data() else {
            return Err(path_err(OP, &self.name, ErrorKind::InvalidArgument));
        };
        {
            let mut data = write_lock(data);
            let off = off as usize;
            let end = off + buf.len();
            if end > data.bytes.len() {
                // the gap between the old end and `off` stays zero
                data.bytes.resize(end, 0);
            }
            data.bytes[off..end].copy_from_slice(buf);
        }
        node.touch(now_ns());
        Ok(buf.len())
    }
}
