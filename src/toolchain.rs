// This module resolves the toolchain used to compile every libsmm variant. Resolution is a
// pure read of the module environment: first a supported compiler family must be loaded
// (only GCC is supported; there is deliberately no fallback compiler), then the Fortran
// compiler from F90 is combined with the aggressive-but-no-loop-nest optimisation flags the
// library generator expects, with -flto added for GCC 4.6 and newer. Finally the ranked BLAS
// backend list is walked in order and the first loaded backend wins; its link line comes
// from LDFLAGS and LIBBLAS. The result is an immutable ToolchainDescriptor that names the
// chosen backend explicitly.

//! Compiler and BLAS backend resolution.

use crate::core::{BuildError, BuildResult, Environment};
use semver::Version;
use std::fmt;
use std::path::{Path, PathBuf};

/// Optimisation flags for the generated kernels.
///
/// Vectorisation and fast-math are wanted; inlining across the generated
/// routines is not.
pub const BASE_FLAGS: &[&str] = &[
    "-O2",
    "-funroll-loops",
    "-ffast-math",
    "-ftree-vectorize",
    "-march=native",
    "-fno-inline-functions",
];

/// Link-time optimisation flag, gated on [`LTO_MIN_VERSION`].
pub const LTO_FLAG: &str = "-flto";

/// First GCC release where `-flto` is usable.
pub const LTO_MIN_VERSION: &str = "4.6";

/// Supported compiler families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerFamily {
    Gcc,
}

impl CompilerFamily {
    /// All supported families, in probing order.
    pub const ALL: &'static [CompilerFamily] = &[CompilerFamily::Gcc];

    /// Module package name that marks the family as loaded.
    pub fn package(self) -> &'static str {
        match self {
            CompilerFamily::Gcc => "GCC",
        }
    }

    /// Whether `-flto` can be passed to this release.
    pub fn supports_lto(self, version: &CompilerVersion) -> bool {
        match self {
            CompilerFamily::Gcc => CompilerVersion::parse(LTO_MIN_VERSION)
                .map(|min| *version >= min)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.package())
    }
}

/// BLAS backends, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlasBackend {
    Acml,
    Atlas,
    Imkl,
}

impl BlasBackend {
    /// Ranked candidate list; the first loaded backend is used.
    pub const RANKED: &'static [BlasBackend] =
        &[BlasBackend::Acml, BlasBackend::Atlas, BlasBackend::Imkl];

    /// Module package name of the backend.
    pub fn package(self) -> &'static str {
        match self {
            BlasBackend::Acml => "ACML",
            BlasBackend::Atlas => "ATLAS",
            BlasBackend::Imkl => "IMKL",
        }
    }
}

impl fmt::Display for BlasBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.package())
    }
}

/// Compiler release, normalized to semver `major.minor.patch`.
///
/// Missing components are padded with zeros and everything after the third
/// numeric component is dropped, so `4.6` equals `4.6.0` and
/// `4.7.2-20121109` equals `4.7.2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompilerVersion(Version);

impl CompilerVersion {
    /// Parse a version string; `None` if it is not a dotted number.
    pub fn parse(text: &str) -> Option<Self> {
        let numeric = text
            .trim()
            .split(|c: char| c == '-' || c == '_' || c == '+')
            .next()
            .unwrap_or("");

        let mut parts: Vec<&str> = numeric.split('.').take(3).collect();
        if parts
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
        {
            return None;
        }
        while parts.len() < 3 {
            parts.push("0");
        }

        Version::parse(&parts.join(".")).ok().map(Self)
    }

    pub fn version(&self) -> &Version {
        &self.0
    }
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The resolved compiler + backend pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainDescriptor {
    compiler_family: CompilerFamily,
    compiler_invocation: String,
    compiler_flags: Vec<String>,
    backend: BlasBackend,
    backend_root: PathBuf,
    backend_link_flags: String,
}

impl ToolchainDescriptor {
    /// Assemble a descriptor from already-resolved parts.
    pub fn new(
        compiler_family: CompilerFamily,
        compiler_invocation: impl Into<String>,
        compiler_flags: Vec<String>,
        backend: BlasBackend,
        backend_root: impl Into<PathBuf>,
        backend_link_flags: impl Into<String>,
    ) -> Self {
        Self {
            compiler_family,
            compiler_invocation: compiler_invocation.into(),
            compiler_flags,
            backend,
            backend_root: backend_root.into(),
            backend_link_flags: backend_link_flags.into(),
        }
    }

    pub fn compiler_family(&self) -> CompilerFamily {
        self.compiler_family
    }

    /// Path or name of the Fortran compiler.
    pub fn compiler_invocation(&self) -> &str {
        &self.compiler_invocation
    }

    pub fn compiler_flags(&self) -> &[String] {
        &self.compiler_flags
    }

    pub fn backend(&self) -> BlasBackend {
        self.backend
    }

    pub fn backend_root(&self) -> &Path {
        &self.backend_root
    }

    pub fn backend_link_flags(&self) -> &str {
        &self.backend_link_flags
    }

    /// Compiler invocation followed by all flags, space separated.
    pub fn target_compile(&self) -> String {
        let mut line = self.compiler_invocation.clone();
        for flag in &self.compiler_flags {
            line.push(' ');
            line.push_str(flag);
        }
        line
    }
}

/// Resolve the toolchain from `env`.
pub fn resolve(env: &dyn Environment) -> BuildResult<ToolchainDescriptor> {
    let family = CompilerFamily::ALL
        .iter()
        .copied()
        .find(|family| env.software_root(family.package()).is_some())
        .ok_or_else(|| BuildError::ToolchainNotFound {
            tried: CompilerFamily::ALL.iter().map(|f| f.package()).collect(),
            detail: None,
        })?;

    let compiler_invocation = env.var("F90").ok_or_else(|| BuildError::ToolchainNotFound {
        tried: vec![family.package()],
        detail: Some(format!("{} is loaded but F90 is not set", family)),
    })?;

    let compiler_flags = compiler_flags(env, family);
    let (backend, backend_root) = resolve_backend(env)?;

    let backend_link_flags = ["LDFLAGS", "LIBBLAS"]
        .iter()
        .filter_map(|name| env.var(name))
        .collect::<Vec<_>>()
        .join(" ");
    if backend_link_flags.trim().is_empty() {
        return Err(BuildError::BackendNotFound {
            tried: vec![backend.package()],
            detail: Some(format!(
                "{} is loaded but neither LDFLAGS nor LIBBLAS is set",
                backend
            )),
        });
    }

    log::info!(
        "Using {} compiler {} with BLAS backend {} ({})",
        family,
        compiler_invocation,
        backend,
        backend_root.display()
    );

    Ok(ToolchainDescriptor {
        compiler_family: family,
        compiler_invocation,
        compiler_flags,
        backend,
        backend_root,
        backend_link_flags,
    })
}

fn compiler_flags(env: &dyn Environment, family: CompilerFamily) -> Vec<String> {
    let mut flags: Vec<String> = BASE_FLAGS.iter().map(|f| f.to_string()).collect();

    let raw_version = env.software_version(family.package());
    match raw_version.as_deref().and_then(CompilerVersion::parse) {
        Some(version) if family.supports_lto(&version) => {
            log::debug!("{} {} supports {}", family, version, LTO_FLAG);
            flags.push(LTO_FLAG.to_string());
        }
        Some(version) => {
            log::debug!("{} {} predates {}, not using {}", family, version, LTO_MIN_VERSION, LTO_FLAG);
        }
        None => {
            log::warn!(
                "Could not determine {} version ({:?}), not using {}",
                family,
                raw_version,
                LTO_FLAG
            );
        }
    }

    flags
}

/// First backend of [`BlasBackend::RANKED`] that is loaded.
pub fn resolve_backend(env: &dyn Environment) -> BuildResult<(BlasBackend, PathBuf)> {
    for &backend in BlasBackend::RANKED {
        match env.software_root(backend.package()) {
            Some(root) => return Ok((backend, root)),
            None => log::info!("BLAS library {} not found", backend),
        }
    }

    Err(BuildError::BackendNotFound {
        tried: BlasBackend::RANKED.iter().map(|b| b.package()).collect(),
        detail: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MapEnvironment;

    fn gcc_env(version: &str) -> MapEnvironment {
        MapEnvironment::new()
            .with_package("GCC", "/apps/gcc", version)
            .with_var("F90", "gfortran")
            .with_package("ATLAS", "/apps/atlas", "3.8.4")
            .with_var("LIBBLAS", "-lf77blas -latlas")
    }

    #[test]
    fn test_version_parse_and_order() {
        let v = CompilerVersion::parse("4.6.3").unwrap();
        assert_eq!(*v.version(), Version::new(4, 6, 3));
        assert!(v >= CompilerVersion::parse("4.6").unwrap());
        assert_eq!(CompilerVersion::parse("4.6").unwrap(), CompilerVersion::parse("4.6.0").unwrap());
        assert!(CompilerVersion::parse("4.5.9").unwrap() < CompilerVersion::parse("4.6").unwrap());
        assert!(CompilerVersion::parse("10.2").unwrap() > CompilerVersion::parse("4.6").unwrap());
        assert_eq!(*CompilerVersion::parse("4").unwrap().version(), Version::new(4, 0, 0));
        assert_eq!(
            *CompilerVersion::parse("4.7.2-20121109").unwrap().version(),
            Version::new(4, 7, 2)
        );
        assert_eq!(*CompilerVersion::parse("4.8.5.1").unwrap().version(), Version::new(4, 8, 5));
        assert!(CompilerVersion::parse("trunk").is_none());
        assert!(CompilerVersion::parse("4.x").is_none());
        assert!(CompilerVersion::parse("").is_none());
    }

    #[test]
    fn test_lto_at_threshold() {
        let tc = resolve(&gcc_env("4.6")).unwrap();
        assert_eq!(tc.compiler_flags().last().map(String::as_str), Some(LTO_FLAG));
    }

    #[test]
    fn test_no_lto_below_threshold() {
        let tc = resolve(&gcc_env("4.5.3")).unwrap();
        assert!(!tc.compiler_flags().iter().any(|f| f == LTO_FLAG));
        assert_eq!(tc.compiler_flags().len(), BASE_FLAGS.len());
    }

    #[test]
    fn test_unparseable_version_skips_lto() {
        let tc = resolve(&gcc_env("system")).unwrap();
        assert!(!tc.compiler_flags().iter().any(|f| f == LTO_FLAG));
    }

    #[test]
    fn test_missing_compiler_family() {
        let env = MapEnvironment::new()
            .with_var("F90", "gfortran")
            .with_package("ATLAS", "/apps/atlas", "3.8.4");
        let err = resolve(&env).unwrap_err();
        match err {
            BuildError::ToolchainNotFound { tried, detail: None } => {
                let expected: Vec<&str> = CompilerFamily::ALL.iter().map(|f| f.package()).collect();
                assert_eq!(tried, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_f90() {
        let env = MapEnvironment::new()
            .with_package("GCC", "/apps/gcc", "4.6.3")
            .with_package("ATLAS", "/apps/atlas", "3.8.4");
        let err = resolve(&env).unwrap_err();
        assert!(matches!(err, BuildError::ToolchainNotFound { detail: Some(_), .. }));
    }

    #[test]
    fn test_backend_without_link_line() {
        let env = MapEnvironment::new()
            .with_package("GCC", "/apps/gcc", "4.6.3")
            .with_var("F90", "gfortran")
            .with_package("ATLAS", "/apps/atlas", "3.8.4");
        let err = resolve(&env).unwrap_err();
        match err {
            BuildError::BackendNotFound { tried, detail } => {
                assert_eq!(tried, vec!["ATLAS"]);
                assert!(detail.unwrap().contains("LIBBLAS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_target_compile_line() {
        let tc = ToolchainDescriptor::new(
            CompilerFamily::Gcc,
            "gfortran",
            vec!["-O2".to_string(), "-flto".to_string()],
            BlasBackend::Imkl,
            "/apps/imkl",
            "-L/apps/imkl/lib -lmkl",
        );
        assert_eq!(tc.target_compile(), "gfortran -O2 -flto");
    }

    #[test]
    fn test_link_flags_skip_unset_parts() {
        let env = gcc_env("4.6.3").with_var("LIBBLAS", "-latlas -lf77blas");
        let tc = resolve(&env).unwrap();
        assert_eq!(tc.backend_link_flags(), "-latlas -lf77blas");

        let env = gcc_env("4.6.3")
            .with_var("LDFLAGS", "-L/apps/atlas/lib")
            .with_var("LIBBLAS", "-latlas");
        let tc = resolve(&env).unwrap();
        assert_eq!(tc.backend_link_flags(), "-L/apps/atlas/lib -latlas");
    }
}
