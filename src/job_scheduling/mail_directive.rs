//! Mail directive embedded at the top of a job script
//!
//! The submission tool writes a shebang line followed by
//! `# mail <recipient> <forced>`. The directive is only trusted after the
//! named account is confirmed to be the job file's owner.

use crate::accounts::{Account, AccountLookup};
use crate::errors::{AtrunError, AtrunResult};
use regex::Regex;
use std::io::{self, BufRead, Read};
use std::sync::OnceLock;
use tracing::warn;

/// Longest recipient name accepted from a directive
pub const MAX_RECIPIENT_LEN: usize = 32;

/// Bytes of script inspected when looking for a directive
const MAX_HEADER_BYTES: u64 = 1024;

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#\s*mail\s+(\S+)\s+([+-]?\d+)").expect("valid mail directive regex")
    })
}

/// Recipient override and forced-send flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDirective {
    pub recipient: String,
    pub forced: bool,
}

impl MailDirective {
    /// Parse a single directive line
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = directive_pattern().captures(line.trim_start())?;
        let recipient = caps.get(1)?.as_str();
        if recipient.len() > MAX_RECIPIENT_LEN {
            return None;
        }
        let forced = caps.get(2)?.as_str().parse::<i64>().ok()? != 0;
        Some(Self {
            recipient: recipient.to_string(),
            forced,
        })
    }

    /// Look for a directive at the start of a script, skipping a shebang
    pub fn read_from<R: Read>(reader: R) -> io::Result<Option<Self>> {
        let mut lines = io::BufReader::new(reader.take(MAX_HEADER_BYTES)).lines();
        let Some(first) = next_text_line(&mut lines)? else {
            return Ok(None);
        };
        if !first.starts_with("#!") {
            return Ok(Self::parse_line(&first));
        }
        Ok(next_text_line(&mut lines)?.and_then(|second| Self::parse_line(&second)))
    }
}

/// Next line of the header; a line that is not text ends the search
fn next_text_line<B: BufRead>(lines: &mut io::Lines<B>) -> io::Result<Option<String>> {
    match lines.next().transpose() {
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(None),
        other => other,
    }
}

/// Where a job's output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    /// Mail even when the job produced no output
    pub forced: bool,
}

/// Validate an optional directive against the job owner.
///
/// Without a directive the owner's login name is used. A directive naming an
/// unknown user or a different uid aborts the job.
pub fn resolve_recipient<A: AccountLookup + ?Sized>(
    accounts: &A,
    owner: &Account,
    directive: Option<MailDirective>,
    job: &str,
) -> AtrunResult<Recipient> {
    let Some(directive) = directive else {
        return Ok(Recipient {
            name: owner.name.clone(),
            forced: false,
        });
    };

    match accounts.by_name(&directive.recipient)? {
        Some(account) if account.uid == owner.uid => Ok(Recipient {
            name: directive.recipient,
            forced: directive.forced,
        }),
        _ => {
            warn!(
                "Mail directive in {} names {} which is not uid {}",
                job, directive.recipient, owner.uid
            );
            Err(AtrunError::DirectiveMismatch {
                uid: owner.uid,
                name: directive.recipient,
                job: job.to_string(),
            })
        }
    }
}
