//! Centralized error handling for atrun
//!
//! # Error Categories
//!
//! - **Spool Errors**: listing and inspecting the job directory
//! - **Job Errors**: claiming, opening, capturing and exec'ing a job
//! - **Security Errors**: unknown owners and forged mail directives
//! - **Privilege Errors**: any step of elevation, restoration or the permanent drop
//! - **Configuration Errors**: invalid settings

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AtrunError
pub type AtrunResult<T> = Result<T, AtrunError>;

/// Convenience type alias for privilege transition Results
pub type PrivilegeResult<T> = Result<T, PrivilegeError>;
