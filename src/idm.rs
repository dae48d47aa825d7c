/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! User and group identity capability consumed by the filesystems.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, VfsResult};
use crate::lockutil::{read_lock, write_lock};

/// Uid and gid of the admin user, for whom permission checks always pass.
pub const ADMIN_UID: u32 = 0;
pub const ADMIN_GID: u32 = 0;

/// First uid handed out to users created through an identity manager.
const FIRST_UID: u32 = 1000;
/// First gid handed out to groups created through an identity manager.
const FIRST_GID: u32 = 1000;

/// Name of the admin user and its primary group.
pub const ADMIN_NAME: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

impl User {
    /// The distinguished admin user.
    pub fn root() -> User {
        User { name: String::from(ADMIN_NAME), uid: ADMIN_UID, gid: ADMIN_GID }
    }

    pub fn is_root(&self) -> bool {
        self.uid == ADMIN_UID
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub gid: u32,
}

/// Narrow user/group capability. A filesystem only ever consults the
/// current user's name, uid, gid and admin status; everything else exists
/// for managing accounts.
pub trait IdentityMgr: Send + Sync {
    fn current_user(&self) -> User;
    fn lookup_user(&self, name: &str) -> VfsResult<User>;
    fn lookup_user_id(&self, uid: u32) -> VfsResult<User>;
    fn lookup_group(&self, name: &str) -> VfsResult<Group>;
    fn lookup_group_id(&self, gid: u32) -> VfsResult<Group>;
    fn user_add(&self, name: &str, group: &str) -> VfsResult<User>;
    fn user_del(&self, name: &str) -> VfsResult<()>;
    fn group_add(&self, name: &str) -> VfsResult<Group>;
    fn group_del(&self, name: &str) -> VfsResult<()>;
}

/// Null identity manager. The current user is the admin, lookups are not
/// implemented and every mutating call is denied.
#[derive(Debug, Default)]
pub struct NotImplementedIdm;

impl IdentityMgr for NotImplementedIdm {
    fn current_user(&self) -> User {
        User::root()
    }

    fn lookup_user(&self, name: &str) -> VfsResult<User> {
        if name == ADMIN_NAME {
            return Ok(User::root());
        }
        Err(ErrorKind::NotImplemented.into())
    }

    fn lookup_user_id(&self, uid: u32) -> VfsResult<User> {
        if uid == ADMIN_UID {
            return Ok(User::root());
        }
        Err(ErrorKind::NotImplemented.into())
    }

    fn lookup_group(&self, _name: &str) -> VfsResult<Group> {
        Err(ErrorKind::NotImplemented.into())
    }

    fn lookup_group_id(&self, _gid: u32) -> VfsResult<Group> {
        Err(ErrorKind::NotImplemented.into())
    }

    fn user_add(&self, _name: &str, _group: &str) -> VfsResult<User> {
        Err(ErrorKind::PermissionDenied.into())
    }

    fn user_del(&self, _name: &str) -> VfsResult<()> {
        Err(ErrorKind::PermissionDenied.into())
    }

    fn group_add(&self, _name: &str) -> VfsResult<Group> {
        Err(ErrorKind::PermissionDenied.into())
    }

    fn group_del(&self, _name: &str) -> VfsResult<()> {
        Err(ErrorKind::PermissionDenied.into())
    }
}

#[derive(Debug)]
struct IdmState {
    users: HashMap<String, User>,
    groups: HashMap<String, Group>,
    next_uid: u32,
    next_gid: u32,
}

/// In-memory identity manager with monotonically allocated ids. The admin
/// user and group are pre-created.
#[derive(Debug)]
pub struct MemIdm {
    state: RwLock<IdmState>,
}

impl Default for MemIdm {
    fn default() -> Self {
        Self::new()
    }
}

impl MemIdm {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(String::from(ADMIN_NAME), User::root());
        let mut groups = HashMap::new();
        groups.insert(
            String::from(ADMIN_NAME),
            Group { name: String::from(ADMIN_NAME), gid: ADMIN_GID },
        );
        MemIdm {
            state: RwLock::new(IdmState {
                users,
                groups,
                next_uid: FIRST_UID,
                next_gid: FIRST_GID,
            }),
        }
    }
}

impl IdentityMgr for MemIdm {
    fn current_user(&self) -> User {
        User::root()
    }

    fn lookup_user(&self, name: &str) -> VfsResult<User> {
        let state = read_lock(&self.state);
        state.users.get(name).cloned().ok_or_else(|| ErrorKind::UnknownUser.into())
    }

    fn lookup_user_id(&self, uid: u32) -> VfsResult<User> {
        let state = read_lock(&self.state);
        state
            .users
            .values()
            .find(|u| u.uid == uid)
            .cloned()
            .ok_or_else(|| ErrorKind::UnknownUser.into())
    }

    fn lookup_group(&self, name: &str) -> VfsResult<Group> {
        let state = read_lock(&self.state);
        state.groups.get(name).cloned().ok_or_else(|| ErrorKind::UnknownGroup.into())
    }

    fn lookup_group_id(&self, gid: u32) -> VfsResult<Group> {
        let state = read_lock(&self.state);
        state
            .groups
            .values()
            .find(|g| g.gid == gid)
            .cloned()
            .ok_or_else(|| ErrorKind::UnknownGroup.into())
    }

    fn user_add(&self, name: &str, group: &str) -> VfsResult<User> {
        let mut state = write_lock(&self.state);
        if state.users.contains_key(name) {
            return Err(ErrorKind::AlreadyExists.into());
        }
        let gid = match state.groups.get(group) {
            Some(g) => g.gid,
            None => return Err(ErrorKind::UnknownGroup.into()),
        };
        let uid = state.next_uid;
        state.next_uid += 1;
        let user = User { name: String::from(name), uid, gid };
        state.users.insert(String::from(name), user.clone());
        Ok(user)
    }

    fn user_del(&self, name: &str) -> VfsResult<()> {
        let mut state = write_lock(&self.state);
        if state.users.remove(name).is_none() {
            return Err(ErrorKind::UnknownUser.into());
        }
        Ok(())
    }

    fn group_add(&self, name: &str) -> VfsResult<Group> {
        let mut state = write_lock(&self.state);
        if state.groups.contains_key(name) {
            return Err(ErrorKind::AlreadyExists.into());
        }
        let gid = state.next_gid;
        state.next_gid += 1;
        let group = Group { name: String::from(name), gid };
        state.groups.insert(String::from(name), group.clone());
        Ok(group)
    }

    fn group_del(&self, name: &str) -> VfsResult<()> {
        let mut state = write_lock(&self.state);
        if name == ADMIN_NAME {
            return Err(ErrorKind::PermissionDenied.into());
        }
        if state.groups.remove(name).is_none() {
            return Err(ErrorKind::UnknownGroup.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_user() {
        let root = User::root();
        assert!(root.is_root());
        assert_eq!(ADMIN_UID, root.uid);
        assert_eq!(ADMIN_GID, root.gid);
    }

    #[test]
    fn test_not_implemented_idm() {
        let idm = NotImplementedIdm;
        assert_eq!(User::root(), idm.current_user());
        assert_eq!(Ok(User::root()), idm.lookup_user(ADMIN_NAME));
        assert_eq!(
            ErrorKind::PermissionDenied,
            idm.user_add("alice", "staff").unwrap_err().kind()
        );
        assert_eq!(ErrorKind::NotImplemented, idm.lookup_user("alice").unwrap_err().kind());
    }

    #[test]
    fn test_mem_idm_users_and_groups() {
        let idm = MemIdm::new();

        let staff = idm.group_add("staff").unwrap();
        assert_eq!(FIRST_GID, staff.gid);

        let alice = idm.user_add("alice", "staff").unwrap();
        assert_eq!(FIRST_UID, alice.uid);
        assert_eq!(staff.gid, alice.gid);
        assert!(!alice.is_root());

        let bob = idm.user_add("bob", "staff").unwrap();
        assert_eq!(FIRST_UID + 1, bob.uid);

        assert_eq!(alice, idm.lookup_user("alice").unwrap());
        assert_eq!(alice, idm.lookup_user_id(alice.uid).unwrap());
        assert_eq!(staff, idm.lookup_group("staff").unwrap());
        assert_eq!(staff, idm.lookup_group_id(staff.gid).unwrap());
    }

    #[test]
    fn test_mem_idm_errors() {
        let idm = MemIdm::new();
        idm.group_add("staff").unwrap();
        idm.user_add("alice", "staff").unwrap();

        assert_eq!(
            ErrorKind::AlreadyExists,
            idm.user_add("alice", "staff").unwrap_err().kind()
        );
        assert_eq!(
            ErrorKind::UnknownGroup,
            idm.user_add("carol", "nogroup").unwrap_err().kind()
        );
        assert_eq!(ErrorKind::UnknownUser, idm.lookup_user("carol").unwrap_err().kind());
        assert_eq!(ErrorKind::UnknownUser, idm.user_del("carol").unwrap_err().kind());
        assert_eq!(ErrorKind::UnknownGroup, idm.group_del("nogroup").unwrap_err().kind());
        assert_eq!(ErrorKind::PermissionDenied, idm.group_del(ADMIN_NAME).unwrap_err().kind());

        idm.user_del("alice").unwrap();
        assert_eq!(ErrorKind::UnknownUser, idm.lookup_user("alice").unwrap_err().kind());
    }
}
