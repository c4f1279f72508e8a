//! smm-build - configuration synthesis and multi-variant builds of libsmm.
//!
//! libsmm, the CP2K small matrix multiplication library, is generated by its
//! own scripts from a `config.in` file describing the compiler, the BLAS
//! fallback and the matrix sizes to specialise for. One build produces one
//! numeric representation, so a complete install is several builds in a row.
//! This crate resolves the toolchain from the module environment, renders the
//! config for each representation, runs the clean/build scripts per variant
//! and installs and checks the resulting static libraries.
//!
//! # Primary Usage
//!
//! ```ignore
//! use smm_build::core::{ProcessEnvironment, SystemRunner};
//! use smm_build::pipeline::BuildPlan;
//! use smm_build::planner::{VariantConfig, VariantPlanner};
//! use smm_build::runner::BuildLayout;
//!
//! let layout = BuildLayout::for_source_tree(source_dir);
//! let config = VariantConfig::with_tasks(8)?;
//! let plan = BuildPlan::configure(layout, &ProcessEnvironment, config,
//!                                 VariantPlanner::default(), smm_build::TOOL_VERSION)?;
//! let report = plan.run(&mut SystemRunner, install_dir)?;
//! println!("{}", report);
//! report.ensure_success()?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - errors, environment lookups, command execution
//! - [`toolchain`] - compiler and BLAS backend resolution
//! - [`planner`] - build parameters and variant planning
//! - [`render`] - `config.in` rendering
//! - [`runner`] - per-variant clean/build loop
//! - [`install`] - install and sanity check
//! - [`pipeline`] - lifecycle steps and the build report

pub mod core;
pub mod install;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod runner;
pub mod toolchain;

pub use crate::core::{
    BuildCommand, BuildError, BuildResult, CommandOutput, CommandRunner, Environment,
    MapEnvironment, ProcessEnvironment, SystemRunner, VariantFailure,
};
pub use pipeline::{BuildPlan, BuildReport};
pub use planner::{BuildVariant, Representation, TransposeFlavor, VariantConfig, VariantPlanner};
pub use render::RenderedConfig;
pub use runner::{BuildLayout, VariantResult};
pub use toolchain::{BlasBackend, CompilerFamily, ToolchainDescriptor};

/// Version written into generated config files.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
