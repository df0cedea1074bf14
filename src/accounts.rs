//! Passwd database lookups

use nix::unistd::{Uid, User};
use std::io;
use std::path::PathBuf;

/// The parts of a passwd entry atrun needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub uid: u32,
    /// Login group, used to seed supplementary group membership
    pub gid: u32,
    pub home: PathBuf,
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            home: user.dir,
        }
    }
}

/// Lookup of user accounts by id or login name
#[cfg_attr(test, mockall::automock)]
pub trait AccountLookup {
    fn by_uid(&self, uid: u32) -> io::Result<Option<Account>>;
    fn by_name(&self, name: &str) -> io::Result<Option<Account>>;
}

/// Account lookup backed by the system passwd database
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccounts;

impl AccountLookup for SystemAccounts {
    fn by_uid(&self, uid: u32) -> io::Result<Option<Account>> {
        Ok(User::from_uid(Uid::from_raw(uid))?.map(Account::from))
    }

    fn by_name(&self, name: &str) -> io::Result<Option<Account>> {
        Ok(User::from_name(name)?.map(Account::from))
    }
}
