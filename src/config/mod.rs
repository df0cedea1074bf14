use crate::errors::{AtrunError, AtrunResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod defaults;

use defaults::*;

/// Spool directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Directory holding one file per submitted job
    #[serde(default = "default_job_dir")]
    pub job_dir: PathBuf,
    /// Directory where capture files are created while a job runs
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// How job bodies are executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Command interpreter exec'd over the job script
    #[serde(default = "default_shell")]
    pub shell: PathBuf,
    /// Account the scanner runs as between elevated operations
    #[serde(default = "default_daemon_user")]
    pub daemon_user: String,
}

/// Mail transport invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Mail transport program
    #[serde(default = "default_mail_command")]
    pub command: PathBuf,
    /// Arguments placed before the recipient
    #[serde(default = "default_mail_args")]
    pub args: Vec<String>,
}

/// Deferred-queue admission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Batch jobs run only while the one-minute load is strictly below this
    #[serde(default = "default_load_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spool: SpoolConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub load: LoadConfig,
    /// Diagnostics go to stderr instead of the system log
    #[serde(skip)]
    pub debug: bool,
}

fn default_job_dir() -> PathBuf { PathBuf::from(DEFAULT_JOB_DIR) }
fn default_output_dir() -> PathBuf { PathBuf::from(DEFAULT_OUTPUT_DIR) }
fn default_shell() -> PathBuf { PathBuf::from(DEFAULT_SHELL) }
fn default_daemon_user() -> String { DEFAULT_DAEMON_USER.to_string() }
fn default_mail_command() -> PathBuf { PathBuf::from(DEFAULT_MAIL_COMMAND) }
fn default_mail_args() -> Vec<String> { DEFAULT_MAIL_ARGS.iter().map(|a| a.to_string()).collect() }
fn default_load_threshold() -> f64 { DEFAULT_LOAD_THRESHOLD }

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            job_dir: default_job_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            daemon_user: default_daemon_user(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            command: default_mail_command(),
            args: default_mail_args(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            threshold: default_load_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spool: SpoolConfig::default(),
            execution: ExecutionConfig::default(),
            mail: MailConfig::default(),
            load: LoadConfig::default(),
            debug: false,
        }
    }
}

impl LoadConfig {
    /// Replace the threshold with a command-line value.
    ///
    /// Unparseable, non-positive or non-finite input silently falls back to
    /// the default.
    pub fn override_from_arg(&mut self, arg: &str) {
        self.threshold = sanitize_threshold(arg.trim().parse().unwrap_or(DEFAULT_LOAD_THRESHOLD));
    }
}

/// Clamp a threshold to a usable value
pub fn sanitize_threshold(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        DEFAULT_LOAD_THRESHOLD
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AtrunResult<Self> {
        let config_file = config_file.as_ref();
        let mut config = if config_file.exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Self::from_toml(&contents)?
        } else {
            debug!("No config file at {:?}, using defaults", config_file);
            Self::default()
        };
        config.load.threshold = sanitize_threshold(config.load.threshold);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> AtrunResult<Self> {
        toml::from_str(contents).map_err(|e| AtrunError::Configuration {
            message: e.to_string(),
        })
    }

    /// Check invariants the rest of the crate relies on
    pub fn validate(&self) -> AtrunResult<()> {
        for (name, path) in [
            ("spool.job_dir", &self.spool.job_dir),
            ("spool.output_dir", &self.spool.output_dir),
        ] {
            if !path.is_absolute() {
                return Err(AtrunError::Configuration {
                    message: format!("{name} must be an absolute path, got {path:?}"),
                });
            }
        }

        // Capture files reuse job file names
        if self.spool.job_dir == self.spool.output_dir {
            return Err(AtrunError::Configuration {
                message: format!(
                    "Duplicate spool directory detected! job_dir and output_dir both use path: {:?}",
                    self.spool.job_dir
                ),
            });
        }

        if self.execution.shell.as_os_str().is_empty() {
            return Err(AtrunError::Configuration {
                message: "execution.shell must not be empty".to_string(),
            });
        }
        if self.mail.command.as_os_str().is_empty() {
            return Err(AtrunError::Configuration {
                message: "mail.command must not be empty".to_string(),
            });
        }
        if self.execution.daemon_user.is_empty() {
            return Err(AtrunError::Configuration {
                message: "execution.daemon_user must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.load.threshold, 1.5);
        assert_eq!(config.execution.shell, PathBuf::from("/bin/sh"));
        assert_eq!(config.mail.args.last().map(String::as_str), Some("-oem"));
        assert!(!config.debug);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [spool]
            job_dir = "/srv/at/jobs"

            [load]
            threshold = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.spool.job_dir, PathBuf::from("/srv/at/jobs"));
        assert_eq!(config.spool.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.load.threshold, 0.8);
        assert_eq!(config.mail.command, PathBuf::from(DEFAULT_MAIL_COMMAND));
    }

    #[test]
    fn test_threshold_override_falls_back_silently() {
        let mut load = LoadConfig::default();

        load.override_from_arg("2.5");
        assert_eq!(load.threshold, 2.5);

        load.override_from_arg("garbled");
        assert_eq!(load.threshold, DEFAULT_LOAD_THRESHOLD);

        load.override_from_arg("0");
        assert_eq!(load.threshold, DEFAULT_LOAD_THRESHOLD);

        load.override_from_arg("-3");
        assert_eq!(load.threshold, DEFAULT_LOAD_THRESHOLD);

        load.override_from_arg("NaN");
        assert_eq!(load.threshold, DEFAULT_LOAD_THRESHOLD);
    }

    #[test]
    fn test_same_job_and_output_dir_rejected() {
        let mut config = Config::default();
        config.spool.output_dir = config.spool.job_dir.clone();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate spool directory"));
    }

    #[test]
    fn test_relative_spool_dir_rejected() {
        let mut config = Config::default();
        config.spool.job_dir = PathBuf::from("jobs");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.spool.job_dir, PathBuf::from(DEFAULT_JOB_DIR));
    }

    #[test]
    fn test_non_positive_file_threshold_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atrun.toml");
        std::fs::write(&path, "[load]\nthreshold = -1.0\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.load.threshold, DEFAULT_LOAD_THRESHOLD);
    }
}
