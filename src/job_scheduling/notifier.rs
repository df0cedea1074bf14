//! Output capture and mail notification

use super::mail_directive::Recipient;
use crate::config::MailConfig;
use crate::errors::{AtrunError, AtrunResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// File receiving a job's stdout and stderr, preceded by a mail header.
///
/// The name is unlinked by `finish`, or when the capture is dropped on an
/// error path.
#[derive(Debug)]
pub struct OutputCapture {
    file: File,
    path: CapturePath,
    baseline: u64,
}

/// Capture file name, removed once when no longer needed
#[derive(Debug)]
struct CapturePath {
    path: PathBuf,
    linked: bool,
}

impl CapturePath {
    fn unlink(&mut self) {
        if !self.linked {
            return;
        }
        self.linked = false;
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Cannot remove output file {:?}: {}", self.path, e);
        }
    }
}

impl Drop for CapturePath {
    fn drop(&mut self) {
        self.unlink();
    }
}

impl OutputCapture {
    /// Create `<dir>/<job>` exclusively with mode 0600 and write the header.
    ///
    /// An existing file of that name is an error, never reused.
    pub fn create(dir: &Path, job: &str) -> AtrunResult<Self> {
        let path = dir.join(job);
        let capture_err = |source: io::Error| AtrunError::CaptureCreate {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(capture_err)?;
        // From here on the name is ours to remove
        let path = CapturePath {
            path: path.clone(),
            linked: true,
        };
        let capture_err = |source: io::Error| AtrunError::CaptureCreate {
            path: path.path.clone(),
            source,
        };
        write!(file, "Subject: Output from your job {job}\n\n").map_err(capture_err)?;
        let baseline = file.metadata().map_err(capture_err)?.len();

        Ok(Self {
            file,
            path,
            baseline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path.path
    }

    /// Size right after the header was written
    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    /// A handle suitable for a child's stdout or stderr
    pub fn stdio(&self) -> io::Result<Stdio> {
        Ok(Stdio::from(self.file.try_clone()?))
    }

    /// Measure the capture, unlink its name and keep only the open handle
    pub fn finish(self) -> AtrunResult<CapturedOutput> {
        let Self {
            file,
            mut path,
            baseline,
        } = self;
        let size = file.metadata()?.len();
        path.unlink();
        Ok(CapturedOutput {
            file,
            produced: size > baseline,
        })
    }
}

/// An unlinked capture file
#[derive(Debug)]
pub struct CapturedOutput {
    pub file: File,
    /// The job wrote something after the header
    pub produced: bool,
}

/// Whether a finished job results in mail
pub fn should_mail(produced: bool, forced: bool) -> bool {
    produced || forced
}

/// Hands captured output to the mail transport
pub struct Notifier<'a> {
    mail: &'a MailConfig,
}

impl<'a> Notifier<'a> {
    pub fn new(mail: &'a MailConfig) -> Self {
        Self { mail }
    }

    /// The transport invocation for `recipient`, without stdin attached
    pub fn command(&self, recipient: &str) -> Command {
        let mut command = Command::new(&self.mail.command);
        command.args(&self.mail.args).arg(recipient);
        command
    }

    /// Replace the current process with the mail transport when mail is due.
    ///
    /// Returns `Ok(())` only when nothing needs sending; on success the exec
    /// never returns.
    pub fn deliver(&self, output: CapturedOutput, recipient: &Recipient) -> AtrunResult<()> {
        if !should_mail(output.produced, recipient.forced) {
            debug!("No output for {}, not sending mail", recipient.name);
            return Ok(());
        }

        let mut file = output.file;
        file.seek(SeekFrom::Start(0))?;
        debug!("Mailing job output to {}", recipient.name);
        let source = self.command(&recipient.name).stdin(file).exec();
        Err(AtrunError::Exec {
            program: self.mail.command.clone(),
            source,
        })
    }
}
