// This module ties the stages together into the lifecycle an outer package driver calls:
// configure (locate the build directory, resolve the toolchain, plan the variants), build
// (the per-variant loop), install and sanity check. All state produced by configure lives in
// an immutable BuildPlan that the later steps borrow, so every step can also be called on
// its own. run() chains the four steps and returns a BuildReport that keeps every variant
// result, the install outcome and any missing artifacts; ensure_success() turns it into the
// final pass/fail, failing if any variant failed or the install is incomplete.

//! Lifecycle steps and the one-shot pipeline.

use crate::core::{BuildError, BuildResult, CommandRunner, Environment};
use crate::install;
use crate::planner::{BuildVariant, VariantConfig, VariantPlanner};
use crate::runner::{self, BuildLayout, BuildRunner, VariantResult};
use crate::toolchain::{self, ToolchainDescriptor};
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything the build, install and sanity check steps need.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    layout: BuildLayout,
    toolchain: ToolchainDescriptor,
    config: VariantConfig,
    planner: VariantPlanner,
    variants: Vec<BuildVariant>,
    tool_version: String,
}

impl BuildPlan {
    /// Configure step.
    ///
    /// Fails before anything runs when the build directory is missing or no
    /// toolchain can be resolved.
    pub fn configure(
        layout: BuildLayout,
        env: &dyn Environment,
        config: VariantConfig,
        planner: VariantPlanner,
        tool_version: impl Into<String>,
    ) -> BuildResult<Self> {
        if !layout.build_dir().is_dir() {
            return Err(BuildError::MissingBuildDir {
                path: layout.build_dir().to_path_buf(),
            });
        }
        log::debug!("Using build directory {}", layout.build_dir().display());

        let toolchain = toolchain::resolve(env)?;
        let variants = planner.plan(&config);

        Ok(Self {
            layout,
            toolchain,
            config,
            planner,
            variants,
            tool_version: tool_version.into(),
        })
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    pub fn toolchain(&self) -> &ToolchainDescriptor {
        &self.toolchain
    }

    pub fn config(&self) -> &VariantConfig {
        &self.config
    }

    pub fn variants(&self) -> &[BuildVariant] {
        &self.variants
    }

    /// Build step: every variant, in plan order.
    pub fn build(&self, runner: &mut dyn CommandRunner) -> BuildResult<Vec<VariantResult>> {
        BuildRunner::new(&self.layout, &self.toolchain, &self.config, &self.tool_version)
            .run_all(runner, &self.variants)
    }

    /// Install step.
    pub fn install(&self, runner: &mut dyn CommandRunner, destination_root: &Path) -> BuildResult<()> {
        install::install(&self.layout, runner, destination_root)
    }

    /// Sanity check step.
    pub fn verify(&self, destination_root: &Path) -> BuildResult<()> {
        install::verify(
            destination_root,
            self.planner.representations(),
            self.config.transpose_flavor(),
        )
    }

    /// Build, install and check, collecting every outcome.
    pub fn run(&self, runner: &mut dyn CommandRunner, destination_root: &Path) -> BuildResult<BuildReport> {
        let results = self.build(runner)?;

        let (install_error, missing) = match self.install(runner, destination_root) {
            Ok(()) => {
                let missing = install::missing_artifacts(
                    destination_root,
                    self.planner.representations(),
                    self.config.transpose_flavor(),
                );
                (None, missing)
            }
            Err(e) => {
                log::error!("{}", e);
                (Some(e), Vec::new())
            }
        };

        Ok(BuildReport {
            install_dir: destination_root.to_path_buf(),
            toolchain: self.toolchain.clone(),
            results,
            install_error,
            missing,
        })
    }
}

/// Outcome of a complete run.
#[derive(Debug)]
pub struct BuildReport {
    pub install_dir: PathBuf,
    pub toolchain: ToolchainDescriptor,
    pub results: Vec<VariantResult>,
    pub install_error: Option<BuildError>,
    /// Expected artifacts absent after install.
    pub missing: Vec<String>,
}

impl BuildReport {
    /// True if every variant built, the install worked and nothing is missing.
    pub fn is_success(&self) -> bool {
        runner::all_succeeded(&self.results) && self.install_error.is_none() && self.missing.is_empty()
    }

    /// Turn the report into the final status.
    ///
    /// Variant failures take precedence, then install errors, then missing artifacts.
    pub fn ensure_success(self) -> BuildResult<()> {
        let failures: Vec<_> = self.results.iter().filter_map(VariantResult::as_failure).collect();
        if !failures.is_empty() {
            return Err(BuildError::VariantBuildFailure { failures });
        }
        if let Some(e) = self.install_error {
            return Err(e);
        }
        if !self.missing.is_empty() {
            return Err(BuildError::Verification { missing: self.missing });
        }
        Ok(())
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "libsmm build report:")?;
        writeln!(
            f,
            "  Toolchain: {} ({}) with {}",
            self.toolchain.compiler_invocation(),
            self.toolchain.compiler_family(),
            self.toolchain.backend()
        )?;
        writeln!(f, "  Variants:")?;
        for result in &self.results {
            let status = if result.succeeded { "ok" } else { "FAILED" };
            writeln!(
                f,
                "    data_type {} ({}): {}",
                result.representation_code(),
                result.variant.representation_label(),
                status
            )?;
            if let Some(diagnostic) = &result.diagnostic {
                for line in diagnostic.lines() {
                    writeln!(f, "      {}", line)?;
                }
            }
        }

        match &self.install_error {
            Some(e) => writeln!(f, "  Install: FAILED ({})", e)?,
            None => writeln!(f, "  Install: {}", self.install_dir.display())?,
        }
        if !self.missing.is_empty() {
            writeln!(f, "  Missing: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}
