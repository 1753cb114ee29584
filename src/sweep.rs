//! Sweep scheduling and the append-only run log
//!
//! A sweep enumerates every (variant, worker count, repetition, size) point
//! in fixed nested order and drives one [`ProcessRunner`] invocation per
//! point. Each completed sample is appended to the run log and flushed
//! immediately, so an interrupted sweep leaves a valid partial log: exactly
//! one well-formed row per finished point, nothing else.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::runner::{ProcessRunner, RunMeasurement};
use crate::variant::{KernelVariant, VariantKind};

/// Column header of the run log CSV
pub const LOG_HEADER: [&str; 6] = [
    "mode",
    "algorithm",
    "size",
    "workers",
    "repetition",
    "elapsed_seconds",
];

/// Column header of the optional resource-profile CSV
pub const PROFILE_HEADER: [&str; 8] = [
    "mode",
    "algorithm",
    "size",
    "workers",
    "repetition",
    "user_seconds",
    "system_seconds",
    "max_rss_kb",
];

/// Placeholder written in the workers column for sequential rows
pub const NO_WORKERS: &str = "-";

/// What a non-zero child exit does to the rest of the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Record the failed point and continue with the next one
    #[default]
    LogAndContinue,
    /// Abort the sweep on the first failed point
    FailFast,
}

/// One kernel binary under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Variant family this binary implements
    pub kind: VariantKind,
    /// Path to the pre-built executable
    pub binary: PathBuf,
}

/// Full declaration of a sweep
///
/// All state the scheduler needs is here, threaded through explicitly;
/// there is no implicit global output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Algorithm label recorded in every log row (e.g. `matmul`)
    pub algorithm: String,
    /// Kernel binaries, one per variant family under test
    pub kernels: Vec<KernelSpec>,
    /// Problem sizes, innermost loop
    pub sizes: Vec<usize>,
    /// Worker counts applied to every non-sequential family
    pub workers: Vec<usize>,
    /// Repetitions per (variant, workers, size) point
    pub repetitions: usize,
    /// Directory receiving the run log (created at startup)
    pub output_dir: PathBuf,
    /// Process launcher for the distributed family
    pub launcher: String,
    /// Host list handed to the launcher
    pub hosts: Vec<String>,
    /// Failure policy for individual points
    pub policy: ErrorPolicy,
    /// Also record child CPU time and peak RSS per point
    pub profile: bool,
}

impl SweepConfig {
    /// Path of the run log inside the output directory
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_sweep.csv", self.algorithm))
    }

    /// Path of the resource-profile log inside the output directory
    #[must_use]
    pub fn profile_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_profile.csv", self.algorithm))
    }

    /// Reject sweeps that could not produce a single sample
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::InvalidConfiguration`] naming the first unusable
    /// field.
    pub fn validate(&self) -> Result<()> {
        if self.kernels.is_empty() {
            return Err(MedirError::InvalidConfiguration(
                "at least one kernel binary is required".to_string(),
            ));
        }
        if self.sizes.is_empty() {
            return Err(MedirError::InvalidConfiguration(
                "size list must not be empty".to_string(),
            ));
        }
        if self.repetitions == 0 {
            return Err(MedirError::InvalidConfiguration(
                "repetitions must be at least 1".to_string(),
            ));
        }
        let needs_workers = self.kernels.iter().any(|k| k.kind.takes_workers());
        if needs_workers && self.workers.is_empty() {
            return Err(MedirError::InvalidConfiguration(
                "worker list must not be empty for non-sequential variants".to_string(),
            ));
        }
        Ok(())
    }
}

/// Identity of exactly one invocation within a sweep
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Variant including worker count
    pub variant: KernelVariant,
    /// Algorithm label
    pub algorithm: String,
    /// Problem size N
    pub size: usize,
    /// 1-based repetition index
    pub repetition: usize,
}

impl std::fmt::Display for RunConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} size {} repetition {}",
            self.variant, self.algorithm, self.size, self.repetition
        )
    }
}

/// One raw measurement produced by a completed invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    /// The configuration this sample measures
    pub configuration: RunConfiguration,
    /// Wall time and optional resource counters
    pub measurement: RunMeasurement,
}

impl RunSample {
    /// Elapsed wall time in seconds
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.measurement.elapsed.as_secs_f64()
    }
}

/// A sweep point that produced an error record instead of a sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPoint {
    /// The configuration that failed
    pub configuration: RunConfiguration,
    /// Rendered error
    pub message: String,
}

/// Outcome of a whole sweep: measured points vs failed attempts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Points that produced a logged sample
    pub measured: usize,
    /// Points that produced an error record
    pub failed: Vec<FailedPoint>,
    /// Kernel binaries skipped wholesale (missing executable)
    pub skipped_kernels: Vec<String>,
}

/// Append-only, single-writer run log
///
/// Every append is flushed before returning, so a crash loses at most the
/// in-flight sample.
pub struct SweepLog {
    writer: csv::Writer<File>,
}

impl SweepLog {
    /// Create the log file and write the header row
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| MedirError::IoError {
            message: format!("failed to create run log '{}': {e}", path.display()),
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(LOG_HEADER)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| MedirError::IoError {
                message: format!("failed to write run log header: {e}"),
            })?;
        Ok(Self { writer })
    }

    /// Append one sample and flush
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] on write failure.
    pub fn append(&mut self, sample: &RunSample) -> Result<()> {
        let cfg = &sample.configuration;
        let workers = cfg
            .variant
            .workers()
            .map_or_else(|| NO_WORKERS.to_string(), |w| w.to_string());
        let size = cfg.size.to_string();
        let repetition = cfg.repetition.to_string();
        let elapsed = format!("{:.4}", sample.elapsed_seconds());
        self.writer
            .write_record([
                cfg.variant.kind().label(),
                cfg.algorithm.as_str(),
                size.as_str(),
                workers.as_str(),
                repetition.as_str(),
                elapsed.as_str(),
            ])
            .and_then(|()| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| MedirError::IoError {
                message: format!("failed to append run log row: {e}"),
            })
    }
}

/// Single-writer log for per-point resource counters
pub struct ProfileLog {
    writer: csv::Writer<File>,
}

impl ProfileLog {
    /// Create the profile file and write the header row
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| MedirError::IoError {
            message: format!("failed to create profile log '{}': {e}", path.display()),
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(PROFILE_HEADER)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| MedirError::IoError {
                message: format!("failed to write profile header: {e}"),
            })?;
        Ok(Self { writer })
    }

    /// Append counters for one point; rows without accounting are skipped
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] on write failure.
    pub fn append(&mut self, sample: &RunSample) -> Result<()> {
        let Some(resources) = sample.measurement.resources else {
            return Ok(());
        };
        let cfg = &sample.configuration;
        let workers = cfg
            .variant
            .workers()
            .map_or_else(|| NO_WORKERS.to_string(), |w| w.to_string());
        let size = cfg.size.to_string();
        let repetition = cfg.repetition.to_string();
        let user = format!("{:.4}", resources.user_time.as_secs_f64());
        let system = format!("{:.4}", resources.system_time.as_secs_f64());
        let max_rss = resources.max_rss_kb.to_string();
        self.writer
            .write_record([
                cfg.variant.kind().label(),
                cfg.algorithm.as_str(),
                size.as_str(),
                workers.as_str(),
                repetition.as_str(),
                user.as_str(),
                system.as_str(),
                max_rss.as_str(),
            ])
            .and_then(|()| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| MedirError::IoError {
                message: format!("failed to append profile row: {e}"),
            })
    }
}

/// Drives a full sweep: enumeration, execution, logging, summary
pub struct SweepScheduler {
    config: SweepConfig,
    runner: ProcessRunner,
}

impl SweepScheduler {
    /// Validate the configuration and build a scheduler
    ///
    /// # Errors
    ///
    /// Propagates [`SweepConfig::validate`] failures.
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runner: ProcessRunner::new(),
        })
    }

    /// Run every sweep point in fixed nested order
    ///
    /// Order is variant, then worker count, then repetition, then size -
    /// the same nesting the log is later grouped by. Progress is printed
    /// per point.
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] on output-directory or log failures,
    /// and the first point error when the policy is
    /// [`ErrorPolicy::FailFast`].
    pub fn execute(&self) -> Result<SweepSummary> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| MedirError::IoError {
            message: format!(
                "failed to create output directory '{}': {e}",
                self.config.output_dir.display()
            ),
        })?;

        let mut log = SweepLog::create(&self.config.log_path())?;
        let mut profile = if self.config.profile {
            Some(ProfileLog::create(&self.config.profile_path())?)
        } else {
            None
        };
        let mut summary = SweepSummary::default();

        for kernel in &self.config.kernels {
            if let Err(err) = self.runner.preflight(&kernel.binary) {
                match self.config.policy {
                    ErrorPolicy::FailFast => return Err(err),
                    ErrorPolicy::LogAndContinue => {
                        eprintln!(
                            "warning: skipping {} kernel: {err}",
                            kernel.kind.label()
                        );
                        summary.skipped_kernels.push(kernel.kind.label().to_string());
                        continue;
                    }
                }
            }
            self.run_kernel(kernel, &mut log, profile.as_mut(), &mut summary)?;
        }

        Ok(summary)
    }

    fn run_kernel(
        &self,
        kernel: &KernelSpec,
        log: &mut SweepLog,
        mut profile: Option<&mut ProfileLog>,
        summary: &mut SweepSummary,
    ) -> Result<()> {
        let worker_slots: Vec<Option<usize>> = if kernel.kind.takes_workers() {
            self.config.workers.iter().map(|w| Some(*w)).collect()
        } else {
            vec![None]
        };

        for workers in worker_slots {
            let variant = kernel.kind.instantiate(workers, &self.config.hosts);
            for repetition in 1..=self.config.repetitions {
                for &size in &self.config.sizes {
                    let configuration = RunConfiguration {
                        variant: variant.clone(),
                        algorithm: self.config.algorithm.clone(),
                        size,
                        repetition,
                    };
                    let (program, args) =
                        variant.build_command(&kernel.binary, size, &self.config.launcher);

                    match self.runner.run(&program, &args) {
                        Ok(measurement) => {
                            let sample = RunSample {
                                configuration,
                                measurement,
                            };
                            println!(
                                "[{}] size {}, repetition {}/{} -> {:.4} s",
                                sample.configuration.variant,
                                size,
                                repetition,
                                self.config.repetitions,
                                sample.elapsed_seconds()
                            );
                            log.append(&sample)?;
                            if let Some(profile) = profile.as_deref_mut() {
                                profile.append(&sample)?;
                            }
                            summary.measured += 1;
                        }
                        Err(err) => {
                            match self.config.policy {
                                ErrorPolicy::FailFast => return Err(err),
                                ErrorPolicy::LogAndContinue => {
                                    eprintln!("error: {configuration}: {err}");
                                    summary.failed.push(FailedPoint {
                                        configuration,
                                        message: err.to_string(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
