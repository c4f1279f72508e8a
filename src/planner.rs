// This module turns the user's build parameters into the list of variants to build. A
// VariantConfig bundles the transpose flavour, the explicitly optimised "small" dimensions,
// the exhaustively generated "tiny" dimension ceiling and the task count, and refuses values
// the libsmm generator cannot build with (a tiny ceiling below 4, unordered dimensions, zero
// tasks). The numeric representations form a closed enum carrying the data_type code of the
// config format and the letter used in artifact names. VariantPlanner holds the set of
// representations to emit (double real and double complex unless told otherwise) and emits
// them in a stable order.

//! Variant planning.

use crate::core::{BuildError, BuildResult};
use std::fmt;

/// Matrix dimensions optimised for by default.
pub const DEFAULT_DIMS: &[u32] = &[1, 4, 5, 6, 9, 13, 16, 17, 22];

/// Default ceiling of the tiny dimensions.
pub const DEFAULT_MAX_TINY_DIM: u32 = 12;

/// Smallest tiny ceiling the generator can build with.
pub const MIN_TINY_DIM: u32 = 4;

/// Which operands of `C = C + A*B` are transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransposeFlavor {
    /// `C = C + MATMUL(A, B)`
    #[default]
    Nn,
    /// `C = C + MATMUL(TRANSPOSE(A), B)`
    Tn,
    /// `C = C + MATMUL(A, TRANSPOSE(B))`
    Nt,
    /// `C = C + MATMUL(TRANSPOSE(A), TRANSPOSE(B))`
    Tt,
}

impl TransposeFlavor {
    /// Map the numeric config code (1-4).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TransposeFlavor::Nn),
            2 => Some(TransposeFlavor::Tn),
            3 => Some(TransposeFlavor::Nt),
            4 => Some(TransposeFlavor::Tt),
            _ => None,
        }
    }

    /// `transpose_flavor` value in config.in.
    pub fn code(self) -> u8 {
        match self {
            TransposeFlavor::Nn => 1,
            TransposeFlavor::Tn => 2,
            TransposeFlavor::Nt => 3,
            TransposeFlavor::Tt => 4,
        }
    }

    /// Two-letter suffix used in library names.
    pub fn suffix(self) -> &'static str {
        match self {
            TransposeFlavor::Nn => "nn",
            TransposeFlavor::Tn => "tn",
            TransposeFlavor::Nt => "nt",
            TransposeFlavor::Tt => "tt",
        }
    }
}

/// Numeric representation of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Representation {
    DoubleReal,
    SingleReal,
    DoubleComplex,
    SingleComplex,
}

impl Representation {
    /// Representations built when nothing else is requested.
    pub const DEFAULT_SET: &'static [Representation] =
        &[Representation::DoubleReal, Representation::DoubleComplex];

    /// `data_type` value in config.in.
    pub fn code(self) -> u8 {
        match self {
            Representation::DoubleReal => 1,
            Representation::SingleReal => 2,
            Representation::DoubleComplex => 3,
            Representation::SingleComplex => 4,
        }
    }

    /// BLAS-style type letter.
    pub fn letter(self) -> char {
        match self {
            Representation::DoubleReal => 'd',
            Representation::SingleReal => 's',
            Representation::DoubleComplex => 'z',
            Representation::SingleComplex => 'c',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Representation::DoubleReal => "double precision real",
            Representation::SingleReal => "single precision real",
            Representation::DoubleComplex => "double precision complex",
            Representation::SingleComplex => "single precision complex",
        }
    }

    /// Artifact tag, e.g. `dnn` for double real with no transposes.
    pub fn tag(self, flavor: TransposeFlavor) -> String {
        format!("{}{}", self.letter(), flavor.suffix())
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-supplied build parameters, shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantConfig {
    transpose_flavor: TransposeFlavor,
    dims_small: Vec<u32>,
    max_tiny_dim: u32,
    task_count: u32,
}

impl VariantConfig {
    /// Validate and build a config.
    ///
    /// `dims_small` must be strictly ascending positive integers, `max_tiny_dim`
    /// at least [`MIN_TINY_DIM`] and `task_count` positive.
    pub fn new(
        transpose_flavor: TransposeFlavor,
        dims_small: Vec<u32>,
        max_tiny_dim: u32,
        task_count: u32,
    ) -> BuildResult<Self> {
        if dims_small.is_empty() {
            return Err(invalid("dims must not be empty".to_string()));
        }
        if dims_small.contains(&0) {
            return Err(invalid("dims must be positive".to_string()));
        }
        if let Some(pair) = dims_small.windows(2).find(|w| w[0] >= w[1]) {
            return Err(invalid(format!(
                "dims must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            )));
        }
        if max_tiny_dim < MIN_TINY_DIM {
            return Err(invalid(format!(
                "max_tiny_dim must be at least {}, got {}",
                MIN_TINY_DIM, max_tiny_dim
            )));
        }
        if task_count == 0 {
            return Err(invalid("tasks must be at least 1".to_string()));
        }

        Ok(Self {
            transpose_flavor,
            dims_small,
            max_tiny_dim,
            task_count,
        })
    }

    /// Default dimensions and flavour with the given task count.
    pub fn with_tasks(task_count: u32) -> BuildResult<Self> {
        Self::new(
            TransposeFlavor::default(),
            DEFAULT_DIMS.to_vec(),
            DEFAULT_MAX_TINY_DIM,
            task_count,
        )
    }

    pub fn transpose_flavor(&self) -> TransposeFlavor {
        self.transpose_flavor
    }

    pub fn dims_small(&self) -> &[u32] {
        &self.dims_small
    }

    pub fn max_tiny_dim(&self) -> u32 {
        self.max_tiny_dim
    }

    /// `1..=max_tiny_dim`.
    pub fn dims_tiny(&self) -> impl Iterator<Item = u32> {
        1..=self.max_tiny_dim
    }

    pub fn task_count(&self) -> u32 {
        self.task_count
    }
}

fn invalid(reason: String) -> BuildError {
    BuildError::InvalidConfig { reason }
}

/// One representation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildVariant {
    pub representation: Representation,
}

impl BuildVariant {
    pub fn representation_code(&self) -> u8 {
        self.representation.code()
    }

    pub fn representation_label(&self) -> &'static str {
        self.representation.label()
    }
}

/// Expands a config into the ordered list of variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlanner {
    representations: Vec<Representation>,
}

impl Default for VariantPlanner {
    fn default() -> Self {
        Self {
            representations: Representation::DEFAULT_SET.to_vec(),
        }
    }
}

impl VariantPlanner {
    /// Planner for an explicit representation set. Duplicates are dropped,
    /// keeping the first occurrence; an empty set means the default set.
    pub fn new(representations: impl IntoIterator<Item = Representation>) -> Self {
        let mut unique: Vec<Representation> = Vec::new();
        for repr in representations {
            if !unique.contains(&repr) {
                unique.push(repr);
            }
        }
        if unique.is_empty() {
            return Self::default();
        }
        Self {
            representations: unique,
        }
    }

    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    /// Variants in build order.
    pub fn plan(&self, config: &VariantConfig) -> Vec<BuildVariant> {
        let variants: Vec<BuildVariant> = self
            .representations
            .iter()
            .map(|&representation| BuildVariant { representation })
            .collect();
        log::debug!(
            "Planned {} variant(s) for transpose flavour {}: {:?}",
            variants.len(),
            config.transpose_flavor().code(),
            variants.iter().map(BuildVariant::representation_label).collect::<Vec<_>>()
        );
        variants
    }
}
