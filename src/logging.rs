//! Logging setup
//!
//! Debug runs log to stderr. Otherwise every event is forwarded to the
//! system log under the `atrun` ident with the cron facility.

use nix::libc;
use std::ffi::CString;
use std::io::{self, Write};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
pub fn init(debug: bool) {
    let log_filter = if debug { "atrun=debug" } else { "atrun=info" };
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()));

    if debug {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(Syslog::open())
                    .with_ansi(false)
                    .without_time()
                    .with_target(false)
                    .with_level(false),
            )
            .init();
    }
}

/// Syslog priority for a tracing level
pub fn priority(level: &Level) -> libc::c_int {
    match *level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        _ => libc::LOG_DEBUG,
    }
}

/// Turn a formatted event into a syslog message: trailing newlines dropped,
/// interior NULs replaced. Empty events produce nothing.
fn message(buf: &[u8]) -> Option<CString> {
    let end = buf.iter().rposition(|&b| b != b'\n')? + 1;
    let bytes: Vec<u8> = buf[..end]
        .iter()
        .map(|&b| if b == 0 { b' ' } else { b })
        .collect();
    CString::new(bytes).ok()
}

/// Writer factory for the system log
#[derive(Debug)]
pub struct Syslog {
    _private: (),
}

impl Syslog {
    pub fn open() -> Self {
        // SAFETY: the ident is a static C string, as openlog requires.
        unsafe { libc::openlog(c"atrun".as_ptr(), libc::LOG_PID, libc::LOG_CRON) };
        Self { _private: () }
    }
}

impl<'a> MakeWriter<'a> for Syslog {
    type Writer = SyslogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter::new(libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter::new(priority(meta.level()))
    }
}

/// Buffers one event and sends it when dropped
pub struct SyslogWriter {
    priority: libc::c_int,
    buf: Vec<u8>,
}

impl SyslogWriter {
    fn new(priority: libc::c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        if let Some(msg) = message(&self.buf) {
            // SAFETY: a constant format string with one C string argument.
            unsafe { libc::syslog(self.priority, c"%s".as_ptr(), msg.as_ptr()) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(priority(&Level::ERROR), libc::LOG_ERR);
        assert_eq!(priority(&Level::WARN), libc::LOG_WARNING);
        assert_eq!(priority(&Level::INFO), libc::LOG_INFO);
        assert_eq!(priority(&Level::DEBUG), libc::LOG_DEBUG);
        assert_eq!(priority(&Level::TRACE), libc::LOG_DEBUG);
    }

    #[test]
    fn test_message_trims_and_sanitizes() {
        assert_eq!(
            message(b"Cannot fork: EAGAIN\n").unwrap().as_bytes(),
            b"Cannot fork: EAGAIN"
        );
        assert_eq!(message(b"a\0b\n\n").unwrap().as_bytes(), b"a b");
        assert!(message(b"").is_none());
        assert!(message(b"\n").is_none());
    }
}
