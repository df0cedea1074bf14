//! Single pass over the job spool

use super::batch_selector::BatchSelector;
use super::cleanup;
use super::load_gate::{LoadGate, LoadProbe, SystemLoad};
use super::types::{Disposition, JobFile, JobName, QueueClass};
use crate::errors::{AtrunError, AtrunResult};
use crate::privileges::{Credentials, Privileges, SystemCredentials};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Something that can start a claimed job without waiting for it
pub trait JobLauncher {
    fn launch(&mut self, job: &JobFile) -> AtrunResult<()>;
}

/// What happened to the deferred queue in one scan
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// No deferred job was due
    None,
    /// A candidate existed but load was too high
    Deferred { name: String, load: f64 },
    /// The earliest deferred job was started
    Launched { name: String },
}

/// Summary of one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Immediate-queue jobs started, in directory order
    pub launched: Vec<String>,
    /// Stale completed files removed
    pub swept: Vec<String>,
    /// Regular files whose names are not job names
    pub ignored: usize,
    pub batch: BatchOutcome,
}

pub struct SpoolScanner<'a, C: Credentials = SystemCredentials, P: LoadProbe = SystemLoad> {
    job_dir: PathBuf,
    privileges: &'a Privileges<C>,
    gate: LoadGate<P>,
}

impl<'a, C: Credentials, P: LoadProbe> SpoolScanner<'a, C, P> {
    pub fn new(job_dir: impl AsRef<Path>, privileges: &'a Privileges<C>, gate: LoadGate<P>) -> Self {
        Self {
            job_dir: job_dir.as_ref().to_path_buf(),
            privileges,
            gate,
        }
    }

    /// Walk the spool once at `now`.
    ///
    /// Immediate jobs are launched as they are found. Among due deferred jobs
    /// only the one with the smallest name is kept, and it is launched after
    /// the walk if the load gate admits it.
    pub fn scan<L: JobLauncher>(&self, launcher: &mut L, now: DateTime<Utc>) -> AtrunResult<ScanReport> {
        let now = now.timestamp();
        let entries = fs::read_dir(&self.job_dir).map_err(|source| AtrunError::SpoolUnreadable {
            path: self.job_dir.clone(),
            source,
        })?;

        let mut report = ScanReport {
            launched: Vec::new(),
            swept: Vec::new(),
            ignored: 0,
            batch: BatchOutcome::None,
        };
        let mut selector = BatchSelector::new();

        for entry in entries {
            let entry = entry.map_err(|source| AtrunError::SpoolUnreadable {
                path: self.job_dir.clone(),
                source,
            })?;
            let path = entry.path();
            let metadata = fs::symlink_metadata(&path).map_err(|source| AtrunError::Status {
                path: path.clone(),
                source,
            })?;
            if !metadata.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().and_then(JobName::parse) else {
                report.ignored += 1;
                continue;
            };
            let job = JobFile::from_metadata(name, path, &metadata);

            match job.disposition(now) {
                Disposition::Run(QueueClass::Immediate) => {
                    debug!("Launching immediate job {}", job.name);
                    launcher.launch(&job)?;
                    report.launched.push(job.name.to_string());
                }
                Disposition::Run(QueueClass::Deferred) => selector.offer(job),
                Disposition::Delete => {
                    if cleanup::sweep_stale(self.privileges, &job.path) {
                        report.swept.push(job.name.to_string());
                    }
                }
                Disposition::Ignore => {}
            }
        }

        if let Some(job) = selector.into_choice() {
            let admission = self.gate.check();
            let name = job.name.to_string();
            report.batch = if admission.admitted {
                launcher.launch(&job)?;
                BatchOutcome::Launched { name }
            } else {
                info!(
                    "Load average {:.2} not below {:.2}, deferring {}",
                    admission.load, admission.threshold, name
                );
                BatchOutcome::Deferred {
                    name,
                    load: admission.load,
                }
            };
        }

        Ok(report)
    }
}
