//! Scoped elevation of the effective identity
//!
//! The scanner starts with elevated rights, immediately lowers its effective
//! ids to the daemon account and only regains the elevated ids inside an
//! [`ElevationGuard`]. Restoration happens when the guard is restored or
//! dropped, so early returns cannot leave the process elevated.

use super::credentials::{Credentials, SystemCredentials};
use super::identity_drop::{Elevated, Transition};
use crate::errors::{PrivilegeError, PrivilegeResult};
use std::io;
use tracing::{debug, error};

/// A uid/gid pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

/// The elevated and lowered identities of this process.
#[derive(Debug, Clone)]
pub struct Privileges<C: Credentials = SystemCredentials> {
    creds: C,
    elevated: Identity,
    lowered: Identity,
}

impl<C: Credentials> Privileges<C> {
    /// Record the current effective identity as the elevated one and lower
    /// the effective ids to `lowered`.
    ///
    /// A process that is not running with effective uid 0 cannot re-elevate
    /// later, so it keeps its identity and every bracket becomes a no-op
    /// transition.
    pub fn relinquish(creds: C, lowered: Identity) -> PrivilegeResult<Self> {
        let elevated = Identity {
            uid: creds.effective_uid(),
            gid: creds.effective_gid(),
        };
        let lowered = if elevated.uid == 0 { lowered } else { elevated };

        let privileges = Self {
            creds,
            elevated,
            lowered,
        };
        privileges.lower()?;
        debug!(
            "Running as uid {} gid {} (elevated uid {} gid {})",
            lowered.uid, lowered.gid, elevated.uid, elevated.gid
        );
        Ok(privileges)
    }

    pub fn elevated(&self) -> Identity {
        self.elevated
    }

    pub fn lowered(&self) -> Identity {
        self.lowered
    }

    /// Regain the elevated identity until the guard is restored or dropped
    pub fn elevate(&self) -> PrivilegeResult<ElevationGuard<'_, C>> {
        self.raise()?;
        Ok(ElevationGuard {
            privileges: self,
            restored: false,
        })
    }

    /// Run exactly one operation with elevated rights.
    ///
    /// Rights are restored whether `op` succeeds or fails; a restoration
    /// failure takes precedence over the operation's own result.
    pub fn with_elevation<T, F>(&self, op: F) -> PrivilegeResult<io::Result<T>>
    where
        F: FnOnce() -> io::Result<T>,
    {
        let guard = self.elevate()?;
        let result = op();
        guard.restore()?;
        Ok(result)
    }

    /// Give up the ability to bracket and start the one-way drop sequence.
    ///
    /// Only ever called in the process that is about to exec a job body.
    pub fn into_permanent(self) -> PrivilegeResult<Transition<Elevated, C>> {
        self.raise()?;
        Ok(Transition::new(self.creds))
    }

    fn raise(&self) -> PrivilegeResult<()> {
        let Identity { uid, gid } = self.elevated;
        self.creds
            .set_effective_uid(uid)
            .map_err(|source| PrivilegeError::Elevate { uid, gid, source })?;
        if let Err(source) = self.creds.set_effective_gid(gid) {
            // Do not stay half-elevated
            self.lower()?;
            return Err(PrivilegeError::Elevate { uid, gid, source });
        }
        Ok(())
    }

    fn lower(&self) -> PrivilegeResult<()> {
        let Identity { uid, gid } = self.lowered;
        // The group must change while the effective uid can still do so
        self.creds
            .set_effective_gid(gid)
            .map_err(|source| PrivilegeError::Restore { uid, gid, source })?;
        self.creds
            .set_effective_uid(uid)
            .map_err(|source| PrivilegeError::Restore { uid, gid, source })?;
        Ok(())
    }
}

/// Elevated rights held for the lifetime of this value
#[must_use = "elevation is released as soon as the guard is dropped"]
pub struct ElevationGuard<'a, C: Credentials> {
    privileges: &'a Privileges<C>,
    restored: bool,
}

impl<C: Credentials> ElevationGuard<'_, C> {
    /// Return to the lowered identity, reporting failure
    pub fn restore(mut self) -> PrivilegeResult<()> {
        self.restored = true;
        self.privileges.lower()
    }
}

impl<C: Credentials> Drop for ElevationGuard<'_, C> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.privileges.lower() {
            // Continuing with rights that should be gone is never acceptable
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privileges::credentials::MockCredentials;
    use mockall::Sequence;
    use mockall::predicate::eq;

    const ROOT: Identity = Identity { uid: 0, gid: 0 };
    const DAEMON: Identity = Identity { uid: 1, gid: 1 };

    fn expect_effective(creds: &mut MockCredentials, id: Identity) {
        creds.expect_effective_uid().return_const(id.uid);
        creds.expect_effective_gid().return_const(id.gid);
    }

    fn expect_lower(creds: &mut MockCredentials, seq: &mut Sequence, id: Identity) {
        creds
            .expect_set_effective_gid()
            .with(eq(id.gid))
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
        creds
            .expect_set_effective_uid()
            .with(eq(id.uid))
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
    }

    fn expect_raise(creds: &mut MockCredentials, seq: &mut Sequence, id: Identity) {
        creds
            .expect_set_effective_uid()
            .with(eq(id.uid))
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
        creds
            .expect_set_effective_gid()
            .with(eq(id.gid))
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
    }

    #[test]
    fn test_relinquish_lowers_group_before_user() {
        let mut creds = MockCredentials::new();
        let mut seq = Sequence::new();
        expect_effective(&mut creds, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);

        let privileges = Privileges::relinquish(creds, DAEMON).unwrap();
        assert_eq!(privileges.elevated(), ROOT);
        assert_eq!(privileges.lowered(), DAEMON);
    }

    #[test]
    fn test_unprivileged_process_keeps_identity() {
        let user = Identity { uid: 1000, gid: 1000 };
        let mut creds = MockCredentials::new();
        let mut seq = Sequence::new();
        expect_effective(&mut creds, user);
        expect_lower(&mut creds, &mut seq, user);

        let privileges = Privileges::relinquish(creds, DAEMON).unwrap();
        assert_eq!(privileges.lowered(), user);
        assert_eq!(privileges.elevated(), user);
    }

    #[test]
    fn test_with_elevation_restores_after_success() {
        let mut creds = MockCredentials::new();
        let mut seq = Sequence::new();
        expect_effective(&mut creds, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);
        expect_raise(&mut creds, &mut seq, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);

        let privileges = Privileges::relinquish(creds, DAEMON).unwrap();
        let value = privileges.with_elevation(|| Ok(42)).unwrap().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_with_elevation_restores_after_error() {
        let mut creds = MockCredentials::new();
        let mut seq = Sequence::new();
        expect_effective(&mut creds, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);
        expect_raise(&mut creds, &mut seq, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);

        let privileges = Privileges::relinquish(creds, DAEMON).unwrap();
        let result: io::Result<()> = privileges
            .with_elevation(|| Err(io::Error::from(io::ErrorKind::PermissionDenied)))
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut creds = MockCredentials::new();
        let mut seq = Sequence::new();
        expect_effective(&mut creds, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);
        expect_raise(&mut creds, &mut seq, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);

        let privileges = Privileges::relinquish(creds, DAEMON).unwrap();
        {
            let _guard = privileges.elevate().unwrap();
        }
    }

    #[test]
    fn test_failed_group_elevation_falls_back() {
        let mut creds = MockCredentials::new();
        let mut seq = Sequence::new();
        expect_effective(&mut creds, ROOT);
        expect_lower(&mut creds, &mut seq, DAEMON);
        creds
            .expect_set_effective_uid()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        creds
            .expect_set_effective_gid()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        expect_lower(&mut creds, &mut seq, DAEMON);

        let privileges = Privileges::relinquish(creds, DAEMON).unwrap();
        let err = privileges.with_elevation(|| Ok(())).unwrap_err();
        assert!(matches!(err, PrivilegeError::Elevate { uid: 0, gid: 0, .. }));
    }
}
