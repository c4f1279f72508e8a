// This module groups the infrastructure shared by all build stages: the error type, the
// read-only view of the module environment and the external command capability. None of
// these know anything about libsmm itself; the stages in the crate root build on them.

//! Shared smm-build infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - [`BuildError`] covering every fatal condition of a run
//! - [`VariantFailure`] entries for the end-of-run aggregate
//!
//! ## Environment (`env`)
//! - [`Environment`] trait with software root/version lookups
//! - Process-backed and in-memory implementations
//!
//! ## Commands (`command`)
//! - [`CommandRunner`] trait: run, wait, capture
//! - [`SystemRunner`] for real child processes

pub mod command;
pub mod env;
pub mod error;

pub use command::{BuildCommand, CommandOutput, CommandRunner, SystemRunner};
pub use env::{Environment, MapEnvironment, ProcessEnvironment};
pub use error::{BuildError, BuildResult, VariantFailure};
