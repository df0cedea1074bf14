//! Removal of spent and orphaned job files

use crate::privileges::{Credentials, Privileges};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Remove a job file after its body ran. Failure is logged, not fatal.
pub fn remove_spent(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Cannot remove spent job file {:?}: {}", path, e);
            false
        }
    }
}

/// Remove a completed file left behind by a run that never finished.
///
/// The unlink happens with elevated rights since the file belongs to the job
/// owner. Any failure, including failing to elevate, only produces a warning.
pub fn sweep_stale<C: Credentials>(privileges: &Privileges<C>, path: &Path) -> bool {
    let result = privileges
        .with_elevation(|| fs::remove_file(path))
        .map_err(io::Error::from)
        .and_then(|inner| inner);
    match result {
        Ok(()) => {
            info!("Removed stale job file {:?}", path);
            true
        }
        Err(e) => {
            warn!("Cannot remove stale job file {:?}: {}", path, e);
            false
        }
    }
}
