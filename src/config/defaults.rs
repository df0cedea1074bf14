/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Config file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/atrun.toml";

// Spool defaults
pub const DEFAULT_JOB_DIR: &str = "/var/at/jobs";
pub const DEFAULT_OUTPUT_DIR: &str = "/var/at/spool";

// Execution defaults
pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_DAEMON_USER: &str = "daemon";

// Mail transport defaults
pub const DEFAULT_MAIL_COMMAND: &str = "/usr/sbin/sendmail";
pub const DEFAULT_MAIL_ARGS: &[&str] = &["-F", "Atrun Service", "-odi", "-oem"];

// Load gate defaults
pub const DEFAULT_LOAD_THRESHOLD: f64 = 1.5;
