//! OS identity primitives

use nix::errno::Errno;
use nix::libc;
use nix::unistd::{self, Gid, Uid};
use std::ffi::CString;
use std::io;
use std::path::Path;

/// Process identity operations used by the privilege layer.
///
/// Implementations make the raw system calls and nothing else; ordering and
/// restoration are the caller's responsibility.
#[cfg_attr(test, mockall::automock)]
pub trait Credentials {
    fn effective_uid(&self) -> u32;
    fn effective_gid(&self) -> u32;
    fn set_effective_uid(&self, uid: u32) -> io::Result<()>;
    fn set_effective_gid(&self, gid: u32) -> io::Result<()>;
    /// Add `increment` to the scheduling nice value
    fn adjust_priority(&self, increment: i32) -> io::Result<()>;
    fn change_dir(&self, dir: &Path) -> io::Result<()>;
    /// Replace supplementary groups with `user`'s memberships plus `gid`
    fn init_groups(&self, user: &str, gid: u32) -> io::Result<()>;
    fn set_gid(&self, gid: u32) -> io::Result<()>;
    fn set_uid(&self, uid: u32) -> io::Result<()>;
}

/// Credentials backed by the calling process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCredentials;

impl Credentials for SystemCredentials {
    fn effective_uid(&self) -> u32 {
        Uid::effective().as_raw()
    }

    fn effective_gid(&self) -> u32 {
        Gid::effective().as_raw()
    }

    fn set_effective_uid(&self, uid: u32) -> io::Result<()> {
        Ok(unistd::seteuid(Uid::from_raw(uid))?)
    }

    fn set_effective_gid(&self, gid: u32) -> io::Result<()> {
        Ok(unistd::setegid(Gid::from_raw(gid))?)
    }

    #[allow(unsafe_code)]
    fn adjust_priority(&self, increment: i32) -> io::Result<()> {
        // nice(2) may legitimately return -1, so errno is the only signal
        Errno::clear();
        // SAFETY: nice takes a plain integer and touches no memory we own.
        let result = unsafe { libc::nice(increment) };
        if result == -1 && Errno::last() != Errno::UnknownErrno {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn change_dir(&self, dir: &Path) -> io::Result<()> {
        Ok(unistd::chdir(dir)?)
    }

    fn init_groups(&self, user: &str, gid: u32) -> io::Result<()> {
        let user = CString::new(user)?;
        Ok(unistd::initgroups(&user, Gid::from_raw(gid))?)
    }

    fn set_gid(&self, gid: u32) -> io::Result<()> {
        Ok(unistd::setgid(Gid::from_raw(gid))?)
    }

    fn set_uid(&self, uid: u32) -> io::Result<()> {
        Ok(unistd::setuid(Uid::from_raw(uid))?)
    }
}
