//! Directive reading from real script files and output capture lifecycle

use atrun::job_scheduling::notifier::should_mail;
use atrun::job_scheduling::{MailDirective, OutputCapture};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_read_leaves_script_rewindable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a00000001.00001");
        let body = "#!/bin/sh\n# mail alice 1\ncd /tmp\necho done\n";
        fs::write(&path, body).unwrap();

        let mut script = File::open(&path).unwrap();
        let directive = MailDirective::read_from(&script).unwrap().expect("directive present");
        assert_eq!(directive.recipient, "alice");
        assert!(directive.forced);

        script.seek(SeekFrom::Start(0)).unwrap();
        let mut content = String::new();
        script.read_to_string(&mut content).unwrap();
        assert_eq!(content, body);
    }

    #[test]
    fn test_directive_beyond_header_window_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a00000001.00001");
        let shebang = format!("#!{}\n", "x".repeat(2048));
        fs::write(&path, format!("{shebang}# mail alice 1\n")).unwrap();

        let directive = MailDirective::read_from(File::open(&path).unwrap()).unwrap();
        assert!(directive.is_none());
    }

    #[test]
    fn test_capture_lifecycle_with_output() {
        let spool = TempDir::new().unwrap();
        let capture = OutputCapture::create(spool.path(), "b00000001.00001").unwrap();

        {
            let mut job_stdout = OpenOptions::new().append(true).open(capture.path()).unwrap();
            writeln!(job_stdout, "job output").unwrap();
        }

        let output = capture.finish().unwrap();
        assert!(output.produced);
        assert!(should_mail(output.produced, false));
        assert!(fs::read_dir(spool.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_capture_lifecycle_silent_job() {
        let spool = TempDir::new().unwrap();
        let capture = OutputCapture::create(spool.path(), "b00000001.00001").unwrap();

        let output = capture.finish().unwrap();
        assert!(!output.produced);
        assert!(!should_mail(output.produced, false));
        assert!(should_mail(output.produced, true));
    }
}
