//! Command line front end for smm-build.
//!
//! `smm-build build` runs the whole pipeline against an unpacked libsmm source
//! tree; `smm-build render` only prints the `config.in` one variant would get.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use smm_build::core::{ProcessEnvironment, SystemRunner};
use smm_build::pipeline::BuildPlan;
use smm_build::planner::{
    BuildVariant, Representation, TransposeFlavor, VariantConfig, VariantPlanner, DEFAULT_DIMS,
    DEFAULT_MAX_TINY_DIM,
};
use smm_build::render;
use smm_build::runner::BuildLayout;
use smm_build::{toolchain, TOOL_VERSION};
use std::path::PathBuf;
use std::process::ExitCode;

/// Configure, build and install the CP2K small matrix library
#[derive(Parser, Debug)]
#[command(name = "smm-build")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every variant and install the libraries
    Build {
        #[command(flatten)]
        params: BuildParams,

        /// Unpacked libsmm source tree
        #[arg(long, env = "SMM_BUILD_SOURCE_DIR", value_name = "DIR")]
        source_dir: PathBuf,

        /// Installation prefix; libraries go to <DIR>/lib
        #[arg(long, env = "SMM_BUILD_INSTALL_DIR", value_name = "DIR")]
        install_dir: PathBuf,

        /// Representations to build (repeatable; default: double-real, double-complex)
        #[arg(long = "representation", value_enum)]
        representations: Vec<DataType>,
    },

    /// Print the config.in for one representation without building
    Render {
        #[command(flatten)]
        params: BuildParams,

        /// Representation to render
        #[arg(long, value_enum, default_value = "double-real")]
        data_type: DataType,
    },
}

#[derive(Args, Debug)]
struct BuildParams {
    /// Transpose flavour of the routines (1=nn, 2=tn, 3=nt, 4=tt)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    transpose_flavour: u8,

    /// Maximum tiny dimension (at least 4)
    #[arg(long, default_value_t = DEFAULT_MAX_TINY_DIM)]
    max_tiny_dim: u32,

    /// Matrix dimensions to generate routines for, ascending
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_DIMS.to_vec())]
    dims: Vec<u32>,

    /// Parallel build tasks (default: available cores)
    #[arg(short = 'j', long)]
    tasks: Option<u32>,
}

impl BuildParams {
    fn variant_config(&self) -> Result<VariantConfig> {
        let flavor = TransposeFlavor::from_code(self.transpose_flavour)
            .context("transpose flavour must be 1, 2, 3 or 4")?;
        let tasks = match self.tasks {
            Some(tasks) => tasks,
            None => std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
        };
        Ok(VariantConfig::new(flavor, self.dims.clone(), self.max_tiny_dim, tasks)?)
    }
}

fn planner(representations: &[DataType]) -> VariantPlanner {
    VariantPlanner::new(representations.iter().map(|&d| Representation::from(d)))
}

/// Numeric representation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DataType {
    DoubleReal,
    SingleReal,
    DoubleComplex,
    SingleComplex,
}

impl From<DataType> for Representation {
    fn from(value: DataType) -> Self {
        match value {
            DataType::DoubleReal => Representation::DoubleReal,
            DataType::SingleReal => Representation::SingleReal,
            DataType::DoubleComplex => Representation::DoubleComplex,
            DataType::SingleComplex => Representation::SingleComplex,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            params,
            source_dir,
            install_dir,
            representations,
        } => {
            let layout = BuildLayout::for_source_tree(&source_dir);
            let plan = BuildPlan::configure(
                layout,
                &ProcessEnvironment,
                params.variant_config()?,
                planner(&representations),
                TOOL_VERSION,
            )
            .context("configure step failed")?;

            let report = plan
                .run(&mut SystemRunner, &install_dir)
                .context("build step failed")?;
            println!("{}", report);
            report.ensure_success()?;
            Ok(())
        }
        Commands::Render { params, data_type } => {
            let toolchain = toolchain::resolve(&ProcessEnvironment)?;
            let variant = BuildVariant {
                representation: data_type.into(),
            };
            let rendered = render::render(&toolchain, &params.variant_config()?, &variant, TOOL_VERSION)?;
            print!("{}", rendered);
            Ok(())
        }
    }
}
