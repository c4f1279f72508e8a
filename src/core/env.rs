// This module abstracts the ambient module environment that smm-build reads its toolchain
// from. Environment modules publish every loaded package as a pair of variables: the
// installation root (EBROOT<NAME>, or SOFTROOT<NAME> for older module trees) and the version
// (EBVERSION<NAME> / SOFTVERSION<NAME>). The Environment trait exposes plain variable lookup
// plus these two package queries, ProcessEnvironment answers them from the real process
// environment, and MapEnvironment is an in-memory implementation used by tests and by callers
// that want to resolve a toolchain for an environment other than their own.

//! Module environment lookups.

use std::collections::HashMap;
use std::path::PathBuf;

/// Read-only view of the environment the build runs in.
pub trait Environment {
    /// Look up a single variable. Empty values count as unset.
    fn var(&self, name: &str) -> Option<String>;

    /// Installation root of a loaded software package, if any.
    fn software_root(&self, package: &str) -> Option<PathBuf> {
        let key = package_env_name(package);
        self.var(&format!("EBROOT{}", key))
            .or_else(|| self.var(&format!("SOFTROOT{}", key)))
            .map(PathBuf::from)
    }

    /// Version string of a loaded software package, if any.
    fn software_version(&self, package: &str) -> Option<String> {
        let key = package_env_name(package);
        self.var(&format!("EBVERSION{}", key))
            .or_else(|| self.var(&format!("SOFTVERSION{}", key)))
    }
}

/// Name fragment used in module variables: upper case, `-` spelled `MIN`.
pub fn package_env_name(package: &str) -> String {
    package.to_uppercase().replace('-', "MIN")
}

/// The environment of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// In-memory environment.
#[derive(Debug, Default, Clone)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Mark a package as loaded, the way a module file would.
    pub fn with_package(self, package: &str, root: impl Into<String>, version: &str) -> Self {
        let key = package_env_name(package);
        self.with_var(format!("EBROOT{}", key), root)
            .with_var(format!("EBVERSION{}", key), version)
    }
}

impl Environment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).filter(|v| !v.is_empty()).cloned()
    }
}
