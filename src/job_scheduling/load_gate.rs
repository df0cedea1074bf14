//! Load-average admission for deferred jobs

use crate::config::sanitize_threshold;
use sysinfo::System;
use tracing::debug;

/// Source of the one-minute load average
pub trait LoadProbe {
    fn one_minute(&self) -> f64;
}

/// Load average as reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLoad;

impl LoadProbe for SystemLoad {
    fn one_minute(&self) -> f64 {
        System::load_average().one
    }
}

/// Result of consulting the gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub load: f64,
    pub threshold: f64,
    pub admitted: bool,
}

/// Admits a deferred job only while load is strictly below the threshold
#[derive(Debug, Clone)]
pub struct LoadGate<P: LoadProbe = SystemLoad> {
    probe: P,
    threshold: f64,
}

impl<P: LoadProbe> LoadGate<P> {
    pub fn new(probe: P, threshold: f64) -> Self {
        Self {
            probe,
            threshold: sanitize_threshold(threshold),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Measure once and decide
    pub fn check(&self) -> Admission {
        let load = self.probe.one_minute();
        let admitted = load < self.threshold;
        debug!(
            "Load average {:.2} against threshold {:.2}: {}",
            load,
            self.threshold,
            if admitted { "admitted" } else { "deferred" }
        );
        Admission {
            load,
            threshold: self.threshold,
            admitted,
        }
    }
}

/// Probe returning a constant, for callers that already know the load
#[derive(Debug, Clone, Copy)]
pub struct FixedLoad(pub f64);

impl LoadProbe for FixedLoad {
    fn one_minute(&self) -> f64 {
        self.0
    }
}
