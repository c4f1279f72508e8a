//! Shared fixtures for the integration tests.
//!
//! - A fake libsmm source tree in a temp directory
//! - A module environment with GCC and one BLAS backend loaded
//! - [`FakeScripts`], a command runner that behaves like `do_clean`/`do_all`
//!   by reading the `config.in` it finds in the build directory

#![allow(dead_code)]

use smm_build::core::{BuildCommand, CommandOutput, CommandRunner, MapEnvironment};
use smm_build::render::{config_value, CONFIG_FILE_NAME};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

/// Temp directory with `tools/build_libsmm/` inside.
pub fn source_tree() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temporary source tree");
    fs::create_dir_all(dir.path().join("tools/build_libsmm"))
        .expect("Failed to create build directory");
    dir
}

/// GCC 4.6.3 with gfortran and ATLAS loaded.
pub fn gcc_atlas_env() -> MapEnvironment {
    MapEnvironment::new()
        .with_package("GCC", "/apps/gcc/4.6.3", "4.6.3")
        .with_var("F90", "gfortran")
        .with_var("LDFLAGS", "-L/apps/atlas/lib")
        .with_var("LIBBLAS", "-lf77blas -latlas")
        .with_package("ATLAS", "/apps/atlas", "3.8.4")
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub config: Option<String>,
}

/// Emulates the libsmm scripts.
///
/// `./do_all` creates `lib/libsmm_<letter><flavour>.a` for the configured
/// data type unless that data type is listed in `failing`; `./do_clean`
/// always succeeds. Every call is recorded with the config text present at
/// the time.
#[derive(Debug, Default)]
pub struct FakeScripts {
    pub failing: HashSet<String>,
    pub invocations: Vec<Invocation>,
}

impl FakeScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make builds with `data_type=<code>` fail.
    pub fn failing_data_type(mut self, code: &str) -> Self {
        self.failing.insert(code.to_string());
        self
    }

    pub fn programs(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.program.as_str()).collect()
    }

    /// Config texts seen by `./do_all`, in order.
    pub fn built_configs(&self) -> Vec<&str> {
        self.invocations
            .iter()
            .filter(|i| i.program == "./do_all")
            .filter_map(|i| i.config.as_deref())
            .collect()
    }
}

impl CommandRunner for FakeScripts {
    fn run(&mut self, command: &BuildCommand, cwd: &Path) -> io::Result<CommandOutput> {
        let config = fs::read_to_string(cwd.join(CONFIG_FILE_NAME)).ok();
        self.invocations.push(Invocation {
            program: command.program.clone(),
            config: config.clone(),
        });

        if command.program != "./do_all" {
            return Ok(CommandOutput::success(""));
        }

        let config = config.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "config.in"))?;
        let data_type = config_value(&config, "data_type").unwrap_or("").to_string();
        if self.failing.contains(&data_type) {
            return Ok(CommandOutput::failure(
                2,
                format!("make: *** [smm_data_type_{}] Error 1", data_type),
            ));
        }

        let letter = match data_type.as_str() {
            "1" => "d",
            "2" => "s",
            "3" => "z",
            "4" => "c",
            other => return Ok(CommandOutput::failure(1, format!("bad data_type {}", other))),
        };
        let flavour = match config_value(&config, "transpose_flavor") {
            Some("2") => "tn",
            Some("3") => "nt",
            Some("4") => "tt",
            _ => "nn",
        };

        let lib = cwd.join("lib");
        fs::create_dir_all(&lib)?;
        fs::write(lib.join(format!("libsmm_{}{}.a", letter, flavour)), b"!<arch>\n")?;
        Ok(CommandOutput::success("Done."))
    }
}
