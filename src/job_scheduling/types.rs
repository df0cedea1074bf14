//! Job scheduling type definitions

use regex::Regex;
use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::OnceLock;

const S_IXUSR: u32 = 0o100;
const S_IRUSR: u32 = 0o400;

fn job_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Fixed-width timestamps keep string order equal to chronological order
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z])([0-9A-Fa-f]{8})").expect("valid job name regex"))
}

/// Queue class encoded by the case of the queue letter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueClass {
    /// Lowercase: run as soon as the scheduled time arrives
    Immediate,
    /// Uppercase: at most one per scan, subject to the load gate
    Deferred,
}

/// A parsed spool file name: `<queue letter><8 hex digit minutes><suffix>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobName {
    raw: String,
    queue: char,
    minutes: u32,
}

impl JobName {
    /// Parse a directory entry name, returning `None` for anything that does
    /// not follow the spool naming convention.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = job_name_pattern().captures(name)?;
        let queue = caps.get(1)?.as_str().chars().next()?;
        let minutes = u32::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
        Some(Self {
            raw: name.to_string(),
            queue,
            minutes,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn queue(&self) -> char {
        self.queue
    }

    pub fn queue_class(&self) -> QueueClass {
        if self.queue.is_ascii_uppercase() {
            QueueClass::Deferred
        } else {
            QueueClass::Immediate
        }
    }

    /// Scheduled time in seconds since the epoch
    pub fn run_time(&self) -> i64 {
        i64::from(self.minutes) * 60
    }

    /// Nice increment: offset of the lowercased queue letter from `a`
    pub fn nice_increment(&self) -> i32 {
        i32::from(self.queue.to_ascii_lowercase() as u8 - b'a')
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Lifecycle state carried in the owner permission bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Execute bit set: waiting to run
    Pending,
    /// Execute bit clear, read bit set: claimed by a previous run
    Completed,
    /// Neither; left alone
    Unknown,
}

impl JobState {
    pub fn from_mode(mode: u32) -> Self {
        if mode & S_IXUSR != 0 {
            JobState::Pending
        } else if mode & S_IRUSR != 0 {
            JobState::Completed
        } else {
            JobState::Unknown
        }
    }
}

/// A regular file in the spool whose name parsed as a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFile {
    pub name: JobName,
    pub path: PathBuf,
    /// Owning uid; the job runs as this user
    pub uid: u32,
    /// Owning gid; the job's primary group
    pub gid: u32,
    pub mode: u32,
    pub size: u64,
}

impl JobFile {
    pub fn from_metadata(name: JobName, path: PathBuf, metadata: &Metadata) -> Self {
        Self {
            name,
            path,
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode: metadata.mode(),
            size: metadata.size(),
        }
    }

    pub fn state(&self) -> JobState {
        JobState::from_mode(self.mode)
    }

    /// Decide what a scan at `now` (seconds since the epoch) does with this file.
    ///
    /// Running uses `run_time <= now` while deleting uses `run_time < now`: a
    /// completed file stamped exactly `now` survives this pass.
    pub fn disposition(&self, now: i64) -> Disposition {
        let run_time = self.name.run_time();
        match self.state() {
            JobState::Pending if run_time <= now => Disposition::Run(self.name.queue_class()),
            JobState::Completed if run_time < now => Disposition::Delete,
            _ => Disposition::Ignore,
        }
    }
}

/// Outcome of classifying one spool entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Run(QueueClass),
    Delete,
    Ignore,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn job(name: &str, mode: u32) -> JobFile {
        JobFile {
            name: JobName::parse(name).unwrap(),
            path: PathBuf::from("/var/at/jobs").join(name),
            uid: 1000,
            gid: 1000,
            mode: 0o100000 | mode,
            size: 0,
        }
    }

    #[rstest]
    #[case("a0000000f.00001", 'a', 15 * 60)]
    #[case("Z01234567", 'Z', 0x01234567 * 60)]
    #[case("cFFFFFFFF.xyz", 'c', 0xFFFFFFFF * 60)]
    fn test_parse_valid_names(#[case] name: &str, #[case] queue: char, #[case] run_time: i64) {
        let parsed = JobName::parse(name).unwrap();
        assert_eq!(parsed.queue(), queue);
        assert_eq!(parsed.run_time(), run_time);
        assert_eq!(parsed.as_str(), name);
    }

    #[rstest]
    #[case("")]
    #[case(".SEQ")]
    #[case("a1234567")]
    #[case("a1234567g")]
    #[case("11234567a")]
    #[case("_12345678")]
    #[case("README")]
    fn test_parse_rejects_non_job_names(#[case] name: &str) {
        assert!(JobName::parse(name).is_none());
    }

    #[test]
    fn test_queue_class_and_nice() {
        let immediate = JobName::parse("c00000001").unwrap();
        assert_eq!(immediate.queue_class(), QueueClass::Immediate);
        assert_eq!(immediate.nice_increment(), 2);

        let batch = JobName::parse("E00000001").unwrap();
        assert_eq!(batch.queue_class(), QueueClass::Deferred);
        assert_eq!(batch.nice_increment(), 4);
    }

    #[test]
    fn test_job_state_from_mode() {
        assert_eq!(JobState::from_mode(0o700), JobState::Pending);
        assert_eq!(JobState::from_mode(0o100), JobState::Pending);
        assert_eq!(JobState::from_mode(0o400), JobState::Completed);
        assert_eq!(JobState::from_mode(0o200), JobState::Unknown);
    }

    #[rstest]
    // pending, due
    #[case(0o700, 11, 10, Disposition::Run(QueueClass::Immediate))]
    // pending, due exactly now
    #[case(0o700, 10, 10, Disposition::Run(QueueClass::Immediate))]
    // pending, in the future
    #[case(0o700, 9, 10, Disposition::Ignore)]
    // completed, older than now
    #[case(0o400, 11, 10, Disposition::Delete)]
    // completed, stamped exactly now
    #[case(0o400, 10, 10, Disposition::Ignore)]
    // neither readable nor executable
    #[case(0o200, 11, 10, Disposition::Ignore)]
    fn test_disposition_boundaries(
        #[case] mode: u32,
        #[case] now_minutes: i64,
        #[case] job_minutes: u32,
        #[case] expected: Disposition,
    ) {
        let file = job(&format!("a{job_minutes:08x}.00001"), mode);
        assert_eq!(file.disposition(now_minutes * 60), expected);
    }

    #[test]
    fn test_deferred_disposition() {
        let file = job("B00000001.00002", 0o700);
        assert_eq!(file.disposition(60), Disposition::Run(QueueClass::Deferred));
    }
}
