//! Fork/exec pipeline for a single job
//!
//! The scanner process claims the file and forks. The child resolves the
//! owner and recipient, sets up capture, spawns the job body (which drops to
//! the owner's identity between fork and exec), waits for it, removes the
//! spent job file and finally becomes the mail transport if mail is due.

use super::cleanup;
use super::mail_directive::{MailDirective, resolve_recipient};
use super::notifier::{Notifier, OutputCapture};
use super::spool_scanner::JobLauncher;
use super::types::JobFile;
use crate::accounts::{Account, AccountLookup, SystemAccounts};
use crate::config::Config;
use crate::errors::{AtrunError, AtrunResult, PrivilegeError};
use crate::privileges::{Credentials, JobIdentity, Privileges, SystemCredentials};
use nix::unistd::{ForkResult, fork};
use std::ffi::OsString;
use std::fs::{self, File, Permissions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Mode of a job file once it has been handed to an executor
pub const CLAIMED_MODE: u32 = 0o400;

/// Mark a job file completed before any of its code runs.
///
/// The owner's file may not be writable by the daemon account, so the change
/// happens under elevation.
pub fn claim<C: Credentials>(privileges: &Privileges<C>, path: &Path) -> AtrunResult<()> {
    privileges
        .with_elevation(|| fs::set_permissions(path, Permissions::from_mode(CLAIMED_MODE)))?
        .map_err(|source| AtrunError::Claim {
            path: path.to_path_buf(),
            source,
        })
}

/// `argv[0]` for the interpreter: its file name, as a login shell would see it
pub fn shell_arg0(shell: &Path) -> OsString {
    shell
        .file_name()
        .unwrap_or(shell.as_os_str())
        .to_os_string()
}

/// The identity a job body runs under: the file's owner and group, niced by
/// its queue letter.
pub fn job_identity(job: &JobFile, owner: Account) -> JobIdentity {
    JobIdentity {
        account: owner,
        uid: job.uid,
        gid: job.gid,
        nice_increment: job.name.nice_increment(),
    }
}

/// Runs claimed jobs in forked children
pub struct JobExecutor<'a, C: Credentials = SystemCredentials, A: AccountLookup = SystemAccounts> {
    config: &'a Config,
    privileges: &'a Privileges<C>,
    accounts: A,
}

impl<'a, C, A> JobExecutor<'a, C, A>
where
    C: Credentials + Clone + Send + Sync + 'static,
    A: AccountLookup,
{
    pub fn new(config: &'a Config, privileges: &'a Privileges<C>, accounts: A) -> Self {
        Self {
            config,
            privileges,
            accounts,
        }
    }

    /// Everything that happens in the forked child. Only returns on failure
    /// or when no mail is due.
    fn run_child(&self, job: &JobFile) -> AtrunResult<()> {
        let name = job.name.as_str();
        let owner = self
            .accounts
            .by_uid(job.uid)?
            .ok_or_else(|| AtrunError::UnknownOwner {
                uid: job.uid,
                job: name.to_string(),
            })?;

        let mut script = self
            .privileges
            .with_elevation(|| File::open(&job.path))?
            .map_err(|source| AtrunError::OpenScript {
                path: job.path.clone(),
                source,
            })?;

        let directive = MailDirective::read_from(&script)?;
        let recipient = resolve_recipient(&self.accounts, &owner, directive, name)?;
        let capture = OutputCapture::create(&self.config.spool.output_dir, name)?;
        script.seek(SeekFrom::Start(0))?;

        self.run_body(job, owner, script, &capture)?;
        cleanup::remove_spent(&job.path);

        let output = capture.finish()?;
        Notifier::new(&self.config.mail).deliver(output, &recipient)
    }

    /// Spawn the interpreter over the script and wait for it
    fn run_body(
        &self,
        job: &JobFile,
        owner: Account,
        script: File,
        capture: &OutputCapture,
    ) -> AtrunResult<()> {
        let shell = &self.config.execution.shell;
        let identity = job_identity(job, owner);
        let mut privileges = Some(self.privileges.clone());

        let mut command = Command::new(shell);
        command
            .arg0(shell_arg0(shell))
            .env_clear()
            .current_dir(&self.config.spool.job_dir)
            .stdin(Stdio::from(script))
            .stdout(capture.stdio()?)
            .stderr(capture.stdio()?);

        debug!(
            "Running job {} as uid {} gid {} (nice +{})",
            job.name, identity.uid, identity.gid, identity.nice_increment
        );

        // SAFETY: the hook runs in the forked child before exec and only
        // issues credential, priority and chdir system calls. This process
        // is single-threaded. Its stderr is already the capture file, so it
        // must not log.
        unsafe {
            command.pre_exec(move || {
                let privileges = privileges.take().ok_or(PrivilegeError::AlreadyDropped)?;
                let _dropped = privileges.into_permanent()?.drop_to(&identity)?;
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|source| AtrunError::Exec {
            program: shell.clone(),
            source,
        })?;
        drop(command);
        let status = child.wait()?;
        debug!("Job {} finished with {}", job.name, status);
        Ok(())
    }
}

impl<C, A> JobLauncher for JobExecutor<'_, C, A>
where
    C: Credentials + Clone + Send + Sync + 'static,
    A: AccountLookup,
{
    fn launch(&mut self, job: &JobFile) -> AtrunResult<()> {
        claim(self.privileges, &job.path)?;

        // SAFETY: atrun never starts threads, so the child inherits a
        // consistent copy of the whole process.
        match unsafe { fork() }.map_err(AtrunError::Fork)? {
            ForkResult::Parent { child } => {
                info!("Started job {} for uid {} as pid {}", job.name, job.uid, child);
                Ok(())
            }
            ForkResult::Child => {
                let code = match self.run_child(job) {
                    Ok(()) => 0,
                    Err(e) => {
                        error!("{}", e);
                        1
                    }
                };
                std::process::exit(code);
            }
        }
    }
}
