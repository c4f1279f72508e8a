// This module renders config.in, the file the libsmm build scripts source before generating
// and benchmarking kernels. Rendering is a pure function of the toolchain descriptor, the
// shared variant config, the variant being built and the version of this tool: the same
// inputs always produce byte-identical text. The format is shell-style key=value lines with
// quoted strings and # comments. Two quirks of the consumer are preserved exactly: the
// OMP_NUM_THREADS=1 line that pins benchmarking to one thread, and the space before the
// closing quote of host_compile.

//! Rendering of the libsmm `config.in` file.

use crate::core::{BuildError, BuildResult};
use crate::planner::{BuildVariant, VariantConfig};
use crate::toolchain::ToolchainDescriptor;
use std::fmt;
use std::fs;
use std::path::Path;

/// File name the build scripts read their configuration from.
pub const CONFIG_FILE_NAME: &str = "config.in";

/// Rendered contents of `config.in` for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    text: String,
}

impl RenderedConfig {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Write to `path`, replacing whatever was there.
    pub fn write_to(&self, path: &Path) -> BuildResult<()> {
        fs::write(path, &self.text).map_err(|e| BuildError::io(path, e))
    }
}

impl fmt::Display for RenderedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Space separated decimal list.
fn join_dims(dims: impl IntoIterator<Item = u32>) -> String {
    dims.into_iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render `config.in` for `variant`.
pub fn render(
    toolchain: &ToolchainDescriptor,
    config: &VariantConfig,
    variant: &BuildVariant,
    tool_version: &str,
) -> BuildResult<RenderedConfig> {
    if toolchain.compiler_invocation().trim().is_empty() {
        return Err(BuildError::Render {
            field: "compiler_invocation",
        });
    }
    if toolchain.backend_link_flags().trim().is_empty() {
        return Err(BuildError::Render {
            field: "backend_link_flags",
        });
    }
    if tool_version.trim().is_empty() {
        return Err(BuildError::Render {
            field: "tool_version",
        });
    }

    let text = format!(
        r#"# This config file was generated by smm-build v{tool_version}

# the build script can generate optimized routines packed in a library for
# 1) 'nn' => C=C+MATMUL(A,B)
# 2) 'tn' => C=C+MATMUL(TRANSPOSE(A),B)
# 3) 'nt' => C=C+MATMUL(A,TRANSPOSE(B))
# 4) 'tt' => C=C+MATMUL(TRANSPOSE(A),TRANSPOSE(B))
#
# select a transpose_flavor from the list 1 2 3 4
#
transpose_flavor={transpose_flavor}

# 1) d => double precision real
# 2) s => single precision real
# 3) z => double precision complex
# 4) c => single precision complex
#
# select a data_type from the list 1 2 3 4
#
# building: {label}
data_type={data_type}

# target compiler, used for the library itself.
# Vectorization for the host CPU and reordering of floating point expressions
# are wanted; loop nest optimization is not.
#
target_compile="{target_compile}"

# link line for the BLAS fallback ({backend}), used for sizes outside the library.
# Programs linking libsmm must link the same BLAS.
#
OMP_NUM_THREADS=1
blas_linking="{blas_linking}"

# matrix dimensions with dedicated routines, ascending.
# All M,N,K combinations are generated, so the library grows quickly with this list.
#
dims_small="{dims_small}"

# tiny dimensions, searched exhaustively and used as building blocks: 1 to N.
# 8 to 12 suits SSE-class CPUs; larger N mostly costs build time.
# The smallest N that builds is 4.
#
dims_tiny="{dims_tiny}"

# host compiler for the helper tools (needs Fortran 2003 support).
#
host_compile="{host_compile} "

# parallel processes for compiling and benchmarking; at most the number of physical cores.
#
tasks={tasks}
"#,
        tool_version = tool_version,
        transpose_flavor = config.transpose_flavor().code(),
        label = variant.representation_label(),
        data_type = variant.representation_code(),
        target_compile = toolchain.target_compile(),
        backend = toolchain.backend(),
        blas_linking = toolchain.backend_link_flags(),
        dims_small = join_dims(config.dims_small().iter().copied()),
        dims_tiny = join_dims(config.dims_tiny()),
        host_compile = toolchain.compiler_invocation(),
        tasks = config.task_count(),
    );

    Ok(RenderedConfig { text })
}

/// Value of `key=` in rendered text, with surrounding quotes removed.
pub fn config_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
        .map(|value| {
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
        })
}
