//! Error type definitions for atrun
//!
//! Every variant here is fatal for the process that produced it: the scanner
//! or job child logs it and exits with failure status. Nothing is retried.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
#[derive(Error, Debug)]
pub enum AtrunError {
    /// The spool directory could not be listed
    #[error("Cannot read spool directory {path:?}: {source}")]
    SpoolUnreadable { path: PathBuf, source: io::Error },

    /// A spool entry could not be inspected
    #[error("Cannot stat {path:?}: {source}")]
    Status { path: PathBuf, source: io::Error },

    /// Clearing the execute bit on a job file failed
    #[error("Cannot change file permissions on {path:?}: {source}")]
    Claim { path: PathBuf, source: io::Error },

    /// The job script could not be opened for reading
    #[error("Cannot open input file {path:?}: {source}")]
    OpenScript { path: PathBuf, source: io::Error },

    /// The capture file could not be created or written
    #[error("Cannot create output file {path:?}: {source}")]
    CaptureCreate { path: PathBuf, source: io::Error },

    /// fork(2) failed
    #[error("Cannot fork: {0}")]
    Fork(#[source] nix::Error),

    /// The file owner has no passwd entry
    #[error("Userid {uid} not found - aborting job {job}")]
    UnknownOwner { uid: u32, job: String },

    /// A mail directive names a user other than the file owner
    #[error("Userid {uid} mismatch name {name} - aborting job {job}")]
    DirectiveMismatch { uid: u32, name: String, job: String },

    /// Spawning or exec'ing an external program failed
    #[error("Exec of {program:?} failed: {source}")]
    Exec { program: PathBuf, source: io::Error },

    /// Privilege transition failures
    #[error("Privilege transition failed: {0}")]
    Privilege(#[from] PrivilegeError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures of individual privilege transition steps
#[derive(Error, Debug)]
pub enum PrivilegeError {
    /// Regaining the elevated effective identity failed
    #[error("Cannot regain privileges (uid {uid}, gid {gid}): {source}")]
    Elevate { uid: u32, gid: u32, source: io::Error },

    /// Returning to the lowered effective identity failed
    #[error("Cannot relinquish privileges (uid {uid}, gid {gid}): {source}")]
    Restore { uid: u32, gid: u32, source: io::Error },

    /// Scheduling priority adjustment failed
    #[error("Cannot adjust priority by {increment}: {source}")]
    Priority { increment: i32, source: io::Error },

    /// The owner's home directory could not be entered
    #[error("Cannot change to home directory {path:?}: {source}")]
    HomeDirectory { path: PathBuf, source: io::Error },

    /// Supplementary group initialisation failed
    #[error("Cannot initialize groups for {user}: {source}")]
    Groups { user: String, source: io::Error },

    /// Setting the primary group failed
    #[error("Cannot change group to {gid}: {source}")]
    SetGid { gid: u32, source: io::Error },

    /// Setting the user id failed
    #[error("Cannot set user id to {uid}: {source}")]
    SetUid { uid: u32, source: io::Error },

    /// The permanent drop was attempted twice in one process
    #[error("Privileges already consumed by a permanent drop")]
    AlreadyDropped,
}

impl From<PrivilegeError> for io::Error {
    fn from(err: PrivilegeError) -> Self {
        io::Error::other(err)
    }
}
