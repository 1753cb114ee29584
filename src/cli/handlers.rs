//! Handlers behind the medir subcommands

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::aggregate::{aggregate_records, read_run_log, RectangularTable, SpeedupCurve};
use crate::error::{MedirError, Result};
use crate::sweep::{ErrorPolicy, KernelSpec, SweepConfig, SweepScheduler};
use crate::variant::VariantKind;
use crate::verify::{load_matrix_artifacts, verify_product, SamplerConfig, VerificationMode};

/// Parsed arguments of the sweep subcommand
#[derive(Debug, Clone)]
pub struct SweepArgs {
    /// Algorithm label
    pub algorithm: String,
    /// Sequential kernel binary
    pub sequential: Option<PathBuf>,
    /// Threaded kernel binary
    pub threaded: Option<PathBuf>,
    /// Worker-process kernel binary
    pub process: Option<PathBuf>,
    /// OpenMP kernel binary
    pub openmp: Option<PathBuf>,
    /// Distributed kernel binary
    pub distributed: Option<PathBuf>,
    /// Problem sizes
    pub sizes: Vec<usize>,
    /// Worker counts
    pub workers: Vec<usize>,
    /// Repetitions per point
    pub repetitions: usize,
    /// Output directory
    pub output_dir: PathBuf,
    /// Distributed process launcher
    pub launcher: String,
    /// Launcher host list
    pub hosts: Vec<String>,
    /// Abort on first failed point
    pub fail_fast: bool,
    /// Record resource counters
    pub profile: bool,
}

impl SweepArgs {
    fn kernels(&self) -> Vec<KernelSpec> {
        let bindings = [
            (VariantKind::Sequential, &self.sequential),
            (VariantKind::Threaded, &self.threaded),
            (VariantKind::Process, &self.process),
            (VariantKind::OpenMp, &self.openmp),
            (VariantKind::Distributed, &self.distributed),
        ];
        bindings
            .into_iter()
            .filter_map(|(kind, binary)| {
                binary.as_ref().map(|binary| KernelSpec {
                    kind,
                    binary: binary.clone(),
                })
            })
            .collect()
    }
}

/// Run a full sweep and print the summary
///
/// # Errors
///
/// Returns configuration and I/O failures; with `--fail-fast`, the first
/// point failure as well.
pub fn handle_sweep(args: SweepArgs) -> Result<()> {
    let kernels = args.kernels();
    if kernels.is_empty() {
        return Err(MedirError::InvalidConfiguration(
            "no kernel binaries given; pass at least one of --sequential, --threaded, \
             --process, --openmp, --distributed"
                .to_string(),
        ));
    }

    let config = SweepConfig {
        algorithm: args.algorithm,
        kernels,
        sizes: args.sizes,
        workers: args.workers,
        repetitions: args.repetitions,
        output_dir: args.output_dir,
        launcher: args.launcher,
        hosts: args.hosts,
        policy: if args.fail_fast {
            ErrorPolicy::FailFast
        } else {
            ErrorPolicy::LogAndContinue
        },
        profile: args.profile,
    };

    let log_path = config.log_path();
    let scheduler = SweepScheduler::new(config)?;
    let summary = scheduler.execute()?;

    println!();
    println!("Sweep complete:");
    println!("  measured points: {}", summary.measured);
    println!("  failed points:   {}", summary.failed.len());
    if !summary.skipped_kernels.is_empty() {
        println!("  skipped kernels: {}", summary.skipped_kernels.join(", "));
    }
    println!("  run log:         {}", log_path.display());
    for point in &summary.failed {
        println!("    {} {}", "failed:".red(), point.configuration);
    }
    Ok(())
}

/// Aggregate a run log into per-series tables
///
/// # Errors
///
/// Returns I/O failures reading the log or writing the tables.
pub fn handle_aggregate(log: &Path, output_dir: &Path) -> Result<()> {
    let parsed = read_run_log(log)?;
    if parsed.skipped > 0 {
        eprintln!(
            "warning: skipped {} malformed row(s) in '{}'",
            parsed.skipped,
            log.display()
        );
    }
    if parsed.records.is_empty() {
        return Err(MedirError::InvalidConfiguration(format!(
            "run log '{}' holds no samples",
            log.display()
        )));
    }

    std::fs::create_dir_all(output_dir).map_err(|e| MedirError::IoError {
        message: format!(
            "failed to create output directory '{}': {e}",
            output_dir.display()
        ),
    })?;

    let tables = aggregate_records(&parsed.records);
    for (key, table) in &tables {
        let path = output_dir.join(key.table_file_name());
        table.write_csv(&path)?;
        println!(
            "{} {} ({} sizes x {} repetitions)",
            "wrote".green(),
            path.display(),
            table.sizes().len(),
            table.rows()
        );
    }
    Ok(())
}

/// Derive and write a speedup curve from two tables
///
/// # Errors
///
/// Returns I/O and parse failures on either input table.
pub fn handle_speedup(baseline: &Path, comparison: &Path, output: &Path) -> Result<()> {
    let baseline_table = RectangularTable::read_csv(baseline)?;
    let comparison_table = RectangularTable::read_csv(comparison)?;
    let curve = SpeedupCurve::between(&baseline_table, &comparison_table);

    if curve.is_empty() {
        eprintln!(
            "warning: no size has positive means in both '{}' and '{}'",
            baseline.display(),
            comparison.display()
        );
    }
    curve.write_csv(output)?;
    println!(
        "{} {} ({} sizes)",
        "wrote".green(),
        output.display(),
        curve.points.len()
    );
    Ok(())
}

/// Verify a matrix product and exit non-zero on mismatch
///
/// # Errors
///
/// Returns artifact-loading failures; a completed verification that found
/// mismatches exits the process with status 1 instead.
pub fn handle_verify(
    dir: &Path,
    sample_fraction: f64,
    max_samples: usize,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let (a, b, c) = load_matrix_artifacts(dir)?;
    let sampler = SamplerConfig {
        sample_fraction,
        max_samples,
        seed,
    };
    let report = verify_product(&a, &b, &c, &sampler)?;

    if json {
        let rendered = report.to_json().map_err(|e| MedirError::IoError {
            message: format!("failed to serialize report: {e}"),
        })?;
        println!("{rendered}");
    } else {
        let mode = match report.mode {
            VerificationMode::Full => "full check",
            VerificationMode::Sampled => "sampled check",
        };
        if report.passes() {
            println!(
                "{} {mode}: {} elements checked, no mismatches",
                "OK".green().bold(),
                report.checked
            );
        } else {
            println!(
                "{} {mode}: {} mismatches in {} elements checked ({:.4}%)",
                "FAIL".red().bold(),
                report.mismatches,
                report.checked,
                report.mismatch_percentage()
            );
        }
    }

    if !report.passes() {
        std::process::exit(1);
    }
    Ok(())
}

/// Run a kernel and check its printed estimate; exit non-zero on failure
///
/// # Errors
///
/// Returns launch, exit, and parse failures - all fatal in verification.
pub fn handle_check_estimate(
    binary: &Path,
    args: &[String],
    expected: f64,
    tolerance: f64,
) -> Result<()> {
    let report =
        crate::verify::verify_estimate(&binary.display().to_string(), args, expected, tolerance)?;

    if report.passes() {
        println!(
            "{} estimate {:.6} vs {:.6}, error {:.2}% within {:.2}%",
            "OK".green().bold(),
            report.estimate,
            report.expected,
            report.relative_error * 100.0,
            report.tolerance * 100.0
        );
        Ok(())
    } else {
        println!(
            "{} estimate {:.6} vs {:.6}, error {:.2}% exceeds {:.2}%",
            "FAIL".red().bold(),
            report.estimate,
            report.expected,
            report.relative_error * 100.0,
            report.tolerance * 100.0
        );
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> SweepArgs {
        SweepArgs {
            algorithm: "matmul".to_string(),
            sequential: None,
            threaded: None,
            process: None,
            openmp: None,
            distributed: None,
            sizes: vec![100],
            workers: vec![2],
            repetitions: 1,
            output_dir: PathBuf::from("results"),
            launcher: "mpiexec".to_string(),
            hosts: vec![],
            fail_fast: false,
            profile: false,
        }
    }

    #[test]
    fn test_kernels_follow_variant_order() {
        let mut args = base_args();
        args.openmp = Some(PathBuf::from("./bin/omp"));
        args.sequential = Some(PathBuf::from("./bin/seq"));
        let kernels = args.kernels();
        assert_eq!(kernels.len(), 2);
        assert_eq!(kernels[0].kind, VariantKind::Sequential);
        assert_eq!(kernels[1].kind, VariantKind::OpenMp);
    }

    #[test]
    fn test_sweep_without_kernels_rejected() {
        let err = handle_sweep(base_args()).unwrap_err();
        assert!(matches!(err, MedirError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_aggregate_missing_log_is_io_error() {
        let err = handle_aggregate(
            Path::new("/nonexistent/sweep.csv"),
            Path::new("/tmp/medir-tables"),
        )
        .unwrap_err();
        assert!(matches!(err, MedirError::IoError { .. }));
    }
}
