// This module drives the per-variant build loop. For every planned variant, in order, the
// rendered config.in is written into the build directory, the library's clean script is run
// and then its build script. Variants are independent: a failing clean is only logged, a
// failing build marks that variant as failed with the captured output, and the loop always
// moves on to the next variant. A config that could not be written is also recorded as a
// failure and neither script runs, so a stale config from the previous variant is never
// built under the wrong name. Rendering errors are the only thing that stops the loop.

//! Per-variant build loop.

use crate::core::{BuildCommand, BuildResult, CommandRunner, VariantFailure};
use crate::planner::{BuildVariant, VariantConfig};
use crate::render::{self, CONFIG_FILE_NAME};
use crate::toolchain::ToolchainDescriptor;
use std::path::{Path, PathBuf};

/// Outcome of one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantResult {
    pub variant: BuildVariant,
    pub succeeded: bool,
    pub diagnostic: Option<String>,
}

impl VariantResult {
    fn success(variant: BuildVariant) -> Self {
        Self {
            variant,
            succeeded: true,
            diagnostic: None,
        }
    }

    fn failure(variant: BuildVariant, diagnostic: String) -> Self {
        Self {
            variant,
            succeeded: false,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn representation_code(&self) -> u8 {
        self.variant.representation_code()
    }

    /// `Some` for failed variants.
    pub fn as_failure(&self) -> Option<VariantFailure> {
        if self.succeeded {
            return None;
        }
        Some(VariantFailure {
            label: self.variant.representation_label().to_string(),
            diagnostic: self.diagnostic.clone().unwrap_or_default(),
        })
    }
}

/// Where and how the library's build scripts are run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    build_dir: PathBuf,
    clean: BuildCommand,
    build: BuildCommand,
}

impl BuildLayout {
    /// Relative location of the build scripts inside the source tree.
    pub const BUILD_SUBDIR: &'static str = "tools/build_libsmm";

    /// Layout with the stock `./do_clean` and `./do_all` scripts.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            clean: BuildCommand::new("./do_clean"),
            build: BuildCommand::new("./do_all"),
        }
    }

    /// Layout for an unpacked libsmm source tree.
    pub fn for_source_tree(source_dir: &Path) -> Self {
        Self::new(source_dir.join(Self::BUILD_SUBDIR))
    }

    /// Use other clean/build commands.
    pub fn with_commands(mut self, clean: BuildCommand, build: BuildCommand) -> Self {
        self.clean = clean;
        self.build = build;
        self
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.build_dir.join(CONFIG_FILE_NAME)
    }

    /// Directory the build scripts leave their libraries in.
    pub fn output_lib_dir(&self) -> PathBuf {
        self.build_dir.join("lib")
    }

    pub fn clean_command(&self) -> &BuildCommand {
        &self.clean
    }

    pub fn build_command(&self) -> &BuildCommand {
        &self.build
    }

    /// Run the clean command, logging but otherwise ignoring failures.
    pub fn clean(&self, runner: &mut dyn CommandRunner) {
        match runner.run(&self.clean, &self.build_dir) {
            Ok(output) if output.succeeded() => {}
            Ok(output) => log::warn!("`{}` failed, continuing: {}", self.clean, output.diagnostic()),
            Err(e) => log::warn!("could not run `{}`, continuing: {}", self.clean, e),
        }
    }
}

/// Builds every variant in turn.
pub struct BuildRunner<'a> {
    layout: &'a BuildLayout,
    toolchain: &'a ToolchainDescriptor,
    config: &'a VariantConfig,
    tool_version: &'a str,
}

impl<'a> BuildRunner<'a> {
    pub fn new(
        layout: &'a BuildLayout,
        toolchain: &'a ToolchainDescriptor,
        config: &'a VariantConfig,
        tool_version: &'a str,
    ) -> Self {
        Self {
            layout,
            toolchain,
            config,
            tool_version,
        }
    }

    /// Build all `variants`, one after the other.
    pub fn run_all(
        &self,
        runner: &mut dyn CommandRunner,
        variants: &[BuildVariant],
    ) -> BuildResult<Vec<VariantResult>> {
        let mut results = Vec::with_capacity(variants.len());
        for variant in variants {
            let result = self.run_one(runner, variant)?;
            if result.succeeded {
                log::info!("Built {} variant", variant.representation_label());
            } else {
                log::error!(
                    "Building {} variant failed: {}",
                    variant.representation_label(),
                    result.diagnostic.as_deref().unwrap_or("")
                );
            }
            results.push(result);
        }
        Ok(results)
    }

    fn run_one(&self, runner: &mut dyn CommandRunner, variant: &BuildVariant) -> BuildResult<VariantResult> {
        let rendered = render::render(self.toolchain, self.config, variant, self.tool_version)?;

        let config_path = self.layout.config_path();
        if let Err(e) = rendered.write_to(&config_path) {
            return Ok(VariantResult::failure(*variant, e.to_string()));
        }
        log::debug!(
            "config file {} for datatype {} ('{}'):\n{}",
            config_path.display(),
            variant.representation_code(),
            variant.representation_label(),
            rendered
        );

        log::info!(
            "Building for datatype {} ('{}')...",
            variant.representation_code(),
            variant.representation_label()
        );
        self.layout.clean(runner);

        let build = self.layout.build_command();
        let result = match runner.run(build, self.layout.build_dir()) {
            Ok(output) if output.succeeded() => VariantResult::success(*variant),
            Ok(output) => VariantResult::failure(*variant, output.diagnostic()),
            Err(e) => VariantResult::failure(*variant, format!("could not run `{}`: {}", build, e)),
        };
        Ok(result)
    }
}

/// True if every variant succeeded.
pub fn all_succeeded(results: &[VariantResult]) -> bool {
    results.iter().all(|r| r.succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CommandOutput;
    use crate::planner::{Representation, VariantPlanner};
    use crate::render::config_value;
    use crate::toolchain::{BlasBackend, CompilerFamily};
    use std::collections::VecDeque;
    use std::fs;
    use std::io;

    /// Replays canned outputs and records what ran and which data_type was configured.
    struct ScriptedRunner {
        outputs: VecDeque<io::Result<CommandOutput>>,
        calls: Vec<(String, Option<String>)>,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<io::Result<CommandOutput>>) -> Self {
            Self {
                outputs: outputs.into(),
                calls: Vec::new(),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&mut self, command: &BuildCommand, cwd: &Path) -> io::Result<CommandOutput> {
            let config = fs::read_to_string(cwd.join(CONFIG_FILE_NAME)).ok();
            let data_type = config
                .as_deref()
                .and_then(|text| config_value(text, "data_type"))
                .map(str::to_string);
            self.calls.push((command.program.clone(), data_type));
            self.outputs
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::success("")))
        }
    }

    fn toolchain() -> ToolchainDescriptor {
        ToolchainDescriptor::new(
            CompilerFamily::Gcc,
            "gfortran",
            vec!["-O2".to_string()],
            BlasBackend::Atlas,
            "/apps/atlas",
            "-latlas",
        )
    }

    #[test]
    fn test_config_written_before_each_build() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path());
        let tc = toolchain();
        let config = VariantConfig::with_tasks(2).unwrap();
        let variants = VariantPlanner::default().plan(&config);

        let mut runner = ScriptedRunner::new(Vec::new());
        let results = BuildRunner::new(&layout, &tc, &config, "0.1.0")
            .run_all(&mut runner, &variants)
            .unwrap();

        assert!(all_succeeded(&results));
        let calls: Vec<(&str, Option<&str>)> = runner
            .calls
            .iter()
            .map(|(p, d)| (p.as_str(), d.as_deref()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("./do_clean", Some("1")),
                ("./do_all", Some("1")),
                ("./do_clean", Some("3")),
                ("./do_all", Some("3")),
            ]
        );
    }

    #[test]
    fn test_failed_clean_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path());
        let tc = toolchain();
        let config = VariantConfig::with_tasks(2).unwrap();
        let variants = [BuildVariant {
            representation: Representation::DoubleReal,
        }];

        let mut runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::failure(1, "rm: cannot remove")),
            Ok(CommandOutput::success("done")),
        ]);
        let results = BuildRunner::new(&layout, &tc, &config, "0.1.0")
            .run_all(&mut runner, &variants)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].succeeded);
        assert!(results[0].as_failure().is_none());
    }

    #[test]
    fn test_unspawnable_build_is_variant_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path());
        let tc = toolchain();
        let config = VariantConfig::with_tasks(2).unwrap();
        let variants = VariantPlanner::default().plan(&config);

        let mut runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::success("")),
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        ]);
        let results = BuildRunner::new(&layout, &tc, &config, "0.1.0")
            .run_all(&mut runner, &variants)
            .unwrap();

        assert!(!results[0].succeeded);
        assert!(results[0].diagnostic.as_deref().unwrap().contains("could not run `./do_all`"));
        assert!(results[1].succeeded);
        assert!(!all_succeeded(&results));
    }

    #[test]
    fn test_unwritable_config_skips_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path().join("does-not-exist"));
        let tc = toolchain();
        let config = VariantConfig::with_tasks(2).unwrap();
        let variants = VariantPlanner::default().plan(&config);

        let mut runner = ScriptedRunner::new(Vec::new());
        let results = BuildRunner::new(&layout, &tc, &config, "0.1.0")
            .run_all(&mut runner, &variants)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.succeeded));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_layout_paths() {
        let layout = BuildLayout::for_source_tree(Path::new("/src/libsmm"));
        assert_eq!(layout.build_dir(), Path::new("/src/libsmm/tools/build_libsmm"));
        assert_eq!(layout.config_path(), Path::new("/src/libsmm/tools/build_libsmm/config.in"));
        assert_eq!(layout.output_lib_dir(), Path::new("/src/libsmm/tools/build_libsmm/lib"));
    }
}
