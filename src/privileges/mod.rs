//! Privilege transition engine
//!
//! Two regimes are provided:
//! - `Privileges::with_elevation` / `Privileges::elevate`: scoped elevation
//!   around single filesystem operations done on behalf of a job owner
//! - `Privileges::into_permanent` followed by the `Transition` chain: the
//!   irreversible drop to the job owner's identity before exec

pub mod credentials;
pub mod elevation;
pub mod identity_drop;

pub use credentials::{Credentials, SystemCredentials};
pub use elevation::{ElevationGuard, Identity, Privileges};
pub use identity_drop::{JobIdentity, Transition, UidDropped};
