// This module defines the error type shared by every stage of smm-build using the thiserror
// crate. BuildError covers the fatal conditions of the pipeline: no supported compiler or
// BLAS backend in the module environment, an invalid user configuration, a config template
// that cannot be rendered, a missing build directory, install and verification failures,
// and I/O errors carrying the path they happened on. VariantBuildFailure is the aggregate
// produced at the very end of a run, after every variant had its chance to build, and
// lists each failed variant together with the output captured from its build step.
// BuildResult<T> is the usual alias for Result<T, BuildError>.

//! Error types for smm-build.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for configuration and build orchestration.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No supported compiler found (tried {}){}", .tried.join(", "), detail_suffix(.detail))]
    ToolchainNotFound {
        tried: Vec<&'static str>,
        detail: Option<String>,
    },

    #[error("No known BLAS library found (tried {}){}", .tried.join(", "), detail_suffix(.detail))]
    BackendNotFound {
        tried: Vec<&'static str>,
        detail: Option<String>,
    },

    #[error("Invalid build configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Cannot render config: required field `{field}` is missing")]
    Render {
        field: &'static str,
    },

    #[error("Build directory {} does not exist", .path.display())]
    MissingBuildDir {
        path: PathBuf,
    },

    #[error("{} variant(s) failed to build:\n{}", .failures.len(), FailureList(.failures))]
    VariantBuildFailure {
        failures: Vec<VariantFailure>,
    },

    #[error("Install failed: {reason}")]
    Install {
        reason: String,
    },

    #[error("Sanity check failed, missing: {}", .missing.join(", "))]
    Verification {
        missing: Vec<String>,
    },

    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One failed variant as reported by [`BuildError::VariantBuildFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFailure {
    /// Human-readable representation label, e.g. "double precision real".
    pub label: String,
    /// Captured output of the failing step.
    pub diagnostic: String,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

struct FailureList<'a>(&'a [VariantFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}: {}", failure.label, failure.diagnostic.trim_end())?;
        }
        Ok(())
    }
}

/// Result type alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;
