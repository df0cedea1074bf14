//! Job scheduling subsystem for atrun
//!
//! One invocation makes a single pass over the job spool:
//! - Immediate-queue jobs that are due are started as soon as they are seen
//! - Due deferred-queue jobs compete for one slot per pass, earliest name first
//! - The deferred candidate only starts while the load average is low enough
//! - Completed files left behind by earlier runs are swept
//!
//! The system is built around these components:
//! - `SpoolScanner`: directory walk and eligibility decisions
//! - `BatchSelector` and `LoadGate`: deferred-queue selection and admission
//! - `JobExecutor`: claim, fork, privilege drop and exec of a job body
//! - `OutputCapture` and `Notifier`: output collection and mail delivery

pub mod batch_selector;
pub mod cleanup;
pub mod job_executor;
pub mod load_gate;
pub mod mail_directive;
pub mod notifier;
pub mod spool_scanner;
pub mod types;

pub use batch_selector::BatchSelector;
pub use job_executor::JobExecutor;
pub use load_gate::{Admission, FixedLoad, LoadGate, LoadProbe, SystemLoad};
pub use mail_directive::{MailDirective, Recipient};
pub use notifier::{Notifier, OutputCapture};
pub use spool_scanner::{BatchOutcome, JobLauncher, ScanReport, SpoolScanner};
pub use types::*;
