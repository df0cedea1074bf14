//! One-way identity drop performed before a job body is exec'd
//!
//! Each step consumes the previous state and yields the next one, so the
//! sequence can only be written in order:
//!
//! `Elevated → Reniced → AtHome → GroupsInitialized → GidSet → UidDropped`
//!
//! Supplementary groups and the primary gid must be settled while the uid is
//! still privileged; once `set_uid` succeeds no further transition exists.
//!
//! These steps run between fork and exec with stdout and stderr already
//! redirected to the job's capture file, so nothing here may log.

use super::credentials::Credentials;
use crate::accounts::Account;
use crate::errors::{PrivilegeError, PrivilegeResult};
use std::marker::PhantomData;
use std::path::Path;

/// Full rights regained for the drop
pub struct Elevated;
/// Scheduling priority adjusted
pub struct Reniced;
/// Working directory is the owner's home
pub struct AtHome;
/// Supplementary groups replaced by the owner's
pub struct GroupsInitialized;
/// Primary group set
pub struct GidSet;
/// User id dropped; terminal
pub struct UidDropped;

/// A process identity in state `S`
#[must_use = "an unfinished identity drop leaves the process privileged"]
pub struct Transition<S, C: Credentials> {
    creds: C,
    _state: PhantomData<S>,
}

impl<S, C: Credentials> Transition<S, C> {
    fn advance<N>(self) -> Transition<N, C> {
        Transition {
            creds: self.creds,
            _state: PhantomData,
        }
    }
}

impl<C: Credentials> Transition<Elevated, C> {
    pub(super) fn new(creds: C) -> Self {
        Self {
            creds,
            _state: PhantomData,
        }
    }

    pub fn adjust_priority(self, increment: i32) -> PrivilegeResult<Transition<Reniced, C>> {
        self.creds
            .adjust_priority(increment)
            .map_err(|source| PrivilegeError::Priority { increment, source })?;
        Ok(self.advance())
    }
}

impl<C: Credentials> Transition<Reniced, C> {
    pub fn enter_home(self, home: &Path) -> PrivilegeResult<Transition<AtHome, C>> {
        self.creds
            .change_dir(home)
            .map_err(|source| PrivilegeError::HomeDirectory {
                path: home.to_path_buf(),
                source,
            })?;
        Ok(self.advance())
    }
}

impl<C: Credentials> Transition<AtHome, C> {
    pub fn init_groups(
        self,
        user: &str,
        login_gid: u32,
    ) -> PrivilegeResult<Transition<GroupsInitialized, C>> {
        self.creds
            .init_groups(user, login_gid)
            .map_err(|source| PrivilegeError::Groups {
                user: user.to_string(),
                source,
            })?;
        Ok(self.advance())
    }
}

impl<C: Credentials> Transition<GroupsInitialized, C> {
    pub fn set_gid(self, gid: u32) -> PrivilegeResult<Transition<GidSet, C>> {
        self.creds
            .set_gid(gid)
            .map_err(|source| PrivilegeError::SetGid { gid, source })?;
        Ok(self.advance())
    }
}

impl<C: Credentials> Transition<GidSet, C> {
    pub fn set_uid(self, uid: u32) -> PrivilegeResult<Transition<UidDropped, C>> {
        self.creds
            .set_uid(uid)
            .map_err(|source| PrivilegeError::SetUid { uid, source })?;
        Ok(self.advance())
    }
}

/// Who a job body runs as
#[derive(Debug, Clone)]
pub struct JobIdentity {
    pub account: Account,
    /// Owning uid of the job file
    pub uid: u32,
    /// Owning gid of the job file
    pub gid: u32,
    /// Added to the nice value before anything else
    pub nice_increment: i32,
}

impl<C: Credentials> Transition<Elevated, C> {
    /// Run the whole sequence for `target`
    pub fn drop_to(self, target: &JobIdentity) -> PrivilegeResult<Transition<UidDropped, C>> {
        self.adjust_priority(target.nice_increment)?
            .enter_home(&target.account.home)?
            .init_groups(&target.account.name, target.account.gid)?
            .set_gid(target.gid)?
            .set_uid(target.uid)
    }
}
