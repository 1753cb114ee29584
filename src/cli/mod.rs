//! CLI command implementations
//!
//! All business logic for the `medir` commands lives here, extracted from
//! main.rs for testability. Handlers print human-oriented progress and
//! summaries; fatal errors propagate to main for a non-zero exit.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

pub mod handlers;

/// medir - benchmark orchestration for parallel kernel comparison
///
/// Sweeps pre-built kernel binaries over problem sizes, worker counts, and
/// repetitions; aggregates the raw run log into per-configuration tables;
/// derives speedup curves; and spot-checks kernel output for correctness.
#[derive(Debug, Parser)]
#[command(name = "medir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    /// Selected subcommand
    pub command: Commands,
}

/// Subcommands of the medir CLI
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a benchmark sweep over kernel binaries
    ///
    /// Examples:
    ///   medir sweep --algorithm matmul --sequential ./bin/seq --openmp ./bin/omp \
    ///       --sizes 675,911,1229 --workers 2,4,8,12 --repetitions 10 --output-dir results
    Sweep {
        /// Algorithm label recorded in every log row
        #[arg(long)]
        algorithm: String,

        /// Sequential kernel binary
        #[arg(long, value_name = "EXE")]
        sequential: Option<PathBuf>,

        /// Threaded kernel binary
        #[arg(long, value_name = "EXE")]
        threaded: Option<PathBuf>,

        /// Worker-process kernel binary
        #[arg(long, value_name = "EXE")]
        process: Option<PathBuf>,

        /// OpenMP kernel binary
        #[arg(long, value_name = "EXE")]
        openmp: Option<PathBuf>,

        /// Distributed kernel binary (started through the launcher)
        #[arg(long, value_name = "EXE")]
        distributed: Option<PathBuf>,

        /// Problem sizes, innermost sweep loop
        #[arg(long, value_delimiter = ',', required = true)]
        sizes: Vec<usize>,

        /// Worker counts for non-sequential variants
        #[arg(long, value_delimiter = ',', default_value = "2,4,8,12")]
        workers: Vec<usize>,

        /// Repetitions per configuration point
        #[arg(long, default_value = "10")]
        repetitions: usize,

        /// Directory receiving the run log (created if absent)
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Process launcher for the distributed variant
        #[arg(long, default_value = "mpiexec")]
        launcher: String,

        /// Host list handed to the launcher
        #[arg(long, value_delimiter = ',')]
        hosts: Vec<String>,

        /// Abort the sweep on the first failed point
        #[arg(long)]
        fail_fast: bool,

        /// Also record child CPU time and peak RSS per point
        #[arg(long)]
        profile: bool,
    },
    /// Fold a run log into per-(variant, workers) rectangular tables
    Aggregate {
        /// Run log produced by `medir sweep`
        #[arg(value_name = "LOG")]
        log: PathBuf,

        /// Directory receiving one table CSV per series
        #[arg(long, default_value = "results/tables")]
        output_dir: PathBuf,
    },
    /// Derive a speedup curve from two aggregated tables
    Speedup {
        /// Baseline table (typically the sequential series)
        #[arg(long)]
        baseline: PathBuf,

        /// Comparison table (a parallel series)
        #[arg(long)]
        comparison: PathBuf,

        /// Output CSV path
        #[arg(long)]
        output: PathBuf,
    },
    /// Verify a kernel-produced matrix product against recomputation
    Verify {
        /// Directory holding A.csv, B.csv, C.csv
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Fraction of elements spot-checked above the full-check threshold
        #[arg(long, default_value = "0.01")]
        sample_fraction: f64,

        /// Cap on spot-checked elements
        #[arg(long, default_value = "1000")]
        max_samples: usize,

        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Emit the report as JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },
    /// Run a kernel and check its printed estimate against a constant
    CheckEstimate {
        /// Kernel binary to run
        #[arg(value_name = "EXE")]
        binary: PathBuf,

        /// Arguments passed to the kernel verbatim
        #[arg(value_name = "ARGS", trailing_var_arg = true)]
        args: Vec<String>,

        /// Constant the estimate must approximate (default π)
        #[arg(long, default_value_t = std::f64::consts::PI)]
        expected: f64,

        /// Maximum accepted relative error
        #[arg(long, default_value = "0.01")]
        tolerance: f64,
    },
}

/// Main CLI entrypoint - dispatches commands to handlers
///
/// # Errors
///
/// Propagates handler failures; main renders them and exits non-zero.
pub fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sweep {
            algorithm,
            sequential,
            threaded,
            process,
            openmp,
            distributed,
            sizes,
            workers,
            repetitions,
            output_dir,
            launcher,
            hosts,
            fail_fast,
            profile,
        } => handlers::handle_sweep(handlers::SweepArgs {
            algorithm,
            sequential,
            threaded,
            process,
            openmp,
            distributed,
            sizes,
            workers,
            repetitions,
            output_dir,
            launcher,
            hosts,
            fail_fast,
            profile,
        }),
        Commands::Aggregate { log, output_dir } => handlers::handle_aggregate(&log, &output_dir),
        Commands::Speedup {
            baseline,
            comparison,
            output,
        } => handlers::handle_speedup(&baseline, &comparison, &output),
        Commands::Verify {
            dir,
            sample_fraction,
            max_samples,
            seed,
            json,
        } => handlers::handle_verify(&dir, sample_fraction, max_samples, seed, json),
        Commands::CheckEstimate {
            binary,
            args,
            expected,
            tolerance,
        } => handlers::handle_check_estimate(&binary, &args, expected, tolerance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sweep_args_parse_lists() {
        let cli = Cli::try_parse_from([
            "medir",
            "sweep",
            "--algorithm",
            "matmul",
            "--sequential",
            "./bin/seq",
            "--sizes",
            "500,675,911",
            "--workers",
            "2,4",
            "--repetitions",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Sweep {
                sizes,
                workers,
                repetitions,
                ..
            } => {
                assert_eq!(sizes, vec![500, 675, 911]);
                assert_eq!(workers, vec![2, 4]);
                assert_eq!(repetitions, 3);
            }
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn test_unknown_mode_is_usage_error() {
        assert!(Cli::try_parse_from(["medir", "frobnicate"]).is_err());
    }

    #[test]
    fn test_verify_defaults() {
        let cli = Cli::try_parse_from(["medir", "verify", "results/matrices"]).unwrap();
        match cli.command {
            Commands::Verify {
                sample_fraction,
                max_samples,
                seed,
                json,
                ..
            } => {
                assert!((sample_fraction - 0.01).abs() < 1e-12);
                assert_eq!(max_samples, 1000);
                assert_eq!(seed, None);
                assert!(!json);
            }
            _ => panic!("expected verify"),
        }
    }
}
