//! Earliest deferred-queue job across one scan

use super::types::JobFile;

/// Running choice of the lexicographically smallest eligible deferred job.
///
/// Starts empty, which compares greater than any real file name. String
/// order equals scheduling order only because the timestamp field is fixed
/// width, which `JobName::parse` enforces. The queue letter comes first, so
/// queue `A` always beats queue `B` regardless of time.
#[derive(Debug, Default)]
pub struct BatchSelector {
    best: Option<JobFile>,
}

impl BatchSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a run-eligible deferred job; keeps it if it sorts first so far
    pub fn offer(&mut self, job: JobFile) {
        let better = self
            .best
            .as_ref()
            .is_none_or(|best| job.name.as_str() < best.name.as_str());
        if better {
            self.best = Some(job);
        }
    }

    pub fn into_choice(self) -> Option<JobFile> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::types::JobName;
    use std::path::PathBuf;

    fn job(name: &str, uid: u32) -> JobFile {
        JobFile {
            name: JobName::parse(name).unwrap(),
            path: PathBuf::from(name),
            uid,
            gid: uid,
            mode: 0o100700,
            size: 0,
        }
    }

    #[test]
    fn test_empty_selector_has_no_choice() {
        assert!(BatchSelector::new().into_choice().is_none());
    }

    #[test]
    fn test_smallest_name_wins_regardless_of_order() {
        let mut selector = BatchSelector::new();
        selector.offer(job("A00000200.00003", 1));
        selector.offer(job("A00000100.00007", 2));
        selector.offer(job("A00000150.00001", 3));

        let choice = selector.into_choice().unwrap();
        assert_eq!(choice.name.as_str(), "A00000100.00007");
        assert_eq!(choice.uid, 2);
    }

    #[test]
    fn test_equal_name_does_not_replace() {
        let mut selector = BatchSelector::new();
        selector.offer(job("B00000001.00001", 1));
        selector.offer(job("B00000001.00001", 2));
        assert_eq!(selector.into_choice().unwrap().uid, 1);
    }

    #[test]
    fn test_queue_letter_dominates_time() {
        let mut selector = BatchSelector::new();
        selector.offer(job("B00000001.00001", 1));
        selector.offer(job("A000000ff.00001", 2));
        assert_eq!(selector.into_choice().unwrap().name.queue(), 'A');
    }
}
