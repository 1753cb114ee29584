//! Scoped execution of one external kernel binary
//!
//! The orchestrator is single-threaded and synchronous: every run blocks
//! until the child exits. Parallelism under test lives inside the invoked
//! executable, never here. Wall time comes from a monotonic clock around the
//! wait; child CPU time and peak RSS come from OS process accounting where
//! the platform provides it.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};

/// Child CPU and memory counters from OS process accounting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPU time spent in user mode, summed over the child and its children
    pub user_time: Duration,
    /// CPU time spent in kernel mode
    pub system_time: Duration,
    /// Peak resident set size in kilobytes
    pub max_rss_kb: u64,
}

/// Result of one completed kernel invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMeasurement {
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
    /// CPU/memory counters, absent where the platform has no accounting
    pub resources: Option<ResourceUsage>,
}

/// Launches kernel binaries and measures them
///
/// Stateless; one instance can drive an entire sweep. Failures distinguish
/// a binary that could not be started ([`MedirError::LaunchError`]) from one
/// that ran and reported failure ([`MedirError::NonZeroExit`]). The caller
/// decides whether either aborts or merely skips a sweep point.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a runner
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run a program to completion, inheriting stdio
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::LaunchError`] if the program cannot be spawned
    /// and [`MedirError::NonZeroExit`] if it exits unsuccessfully.
    pub fn run(&self, program: &str, args: &[String]) -> Result<RunMeasurement> {
        let before = children_accounting();
        let start = Instant::now();

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| MedirError::LaunchError {
                binary: program.to_string(),
                message: e.to_string(),
            })?;

        let elapsed = start.elapsed();
        if !status.success() {
            return Err(MedirError::NonZeroExit {
                command: render_command(program, args),
                status,
            });
        }

        Ok(RunMeasurement {
            elapsed,
            resources: accounting_delta(before),
        })
    }

    /// Run a program to completion, capturing stdout
    ///
    /// Used by the verification flow, which must locate a numeric result
    /// embedded in the kernel's output. Stderr is passed through.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ProcessRunner::run`]; a non-zero exit is
    /// always an error here since verification is fail-fast.
    pub fn run_captured(&self, program: &str, args: &[String]) -> Result<(RunMeasurement, String)> {
        let before = children_accounting();
        let start = Instant::now();

        let output = Command::new(program)
            .args(args)
            .stderr(std::process::Stdio::inherit())
            .output()
            .map_err(|e| MedirError::LaunchError {
                binary: program.to_string(),
                message: e.to_string(),
            })?;

        let elapsed = start.elapsed();
        if !output.status.success() {
            return Err(MedirError::NonZeroExit {
                command: render_command(program, args),
                status: output.status,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok((
            RunMeasurement {
                elapsed,
                resources: accounting_delta(before),
            },
            stdout,
        ))
    }

    /// Check that a path exists and looks invocable before a sweep starts
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::LaunchError`] when the binary is absent.
    pub fn preflight(&self, binary: &Path) -> Result<()> {
        if binary.is_file() {
            Ok(())
        } else {
            Err(MedirError::LaunchError {
                binary: binary.display().to_string(),
                message: "no such file".to_string(),
            })
        }
    }
}

/// Locate the first decimal number embedded in kernel output
///
/// Kernels print human-oriented lines like `PI threads=4: 3.141592653`;
/// the verification flow needs just the number. Tokens are stripped of
/// surrounding punctuation and the first one containing a decimal point
/// that parses as `f64` wins. Bare integers are skipped so line counters
/// and worker counts never shadow the result.
#[must_use]
pub fn extract_numeric_result(output: &str) -> Option<f64> {
    for token in output.split_whitespace() {
        let trimmed = token.trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'));
        if !trimmed.contains('.') {
            continue;
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return Some(value);
        }
    }
    None
}

fn render_command(program: &str, args: &[String]) -> String {
    let mut cmd = program.to_string();
    for arg in args {
        cmd.push(' ');
        cmd.push_str(arg);
    }
    cmd
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
struct ChildrenAccounting {
    user: Duration,
    system: Duration,
}

#[cfg(unix)]
fn children_accounting() -> Option<ChildrenAccounting> {
    let usage = read_rusage_children()?;
    Some(ChildrenAccounting {
        user: timeval_to_duration(usage.ru_utime),
        system: timeval_to_duration(usage.ru_stime),
    })
}

#[cfg(unix)]
fn accounting_delta(before: Option<ChildrenAccounting>) -> Option<ResourceUsage> {
    let before = before?;
    let after = read_rusage_children()?;
    let user_after = timeval_to_duration(after.ru_utime);
    let system_after = timeval_to_duration(after.ru_stime);
    Some(ResourceUsage {
        user_time: user_after.saturating_sub(before.user),
        system_time: system_after.saturating_sub(before.system),
        // ru_maxrss is a high-water mark across all waited children, not a
        // per-child delta
        max_rss_kb: u64::try_from(after.ru_maxrss).unwrap_or(0),
    })
}

#[cfg(unix)]
fn read_rusage_children() -> Option<libc::rusage> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage fills the buffer on success; zeroed init is valid
    // for the plain-old-data rusage struct.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, usage.as_mut_ptr()) };
    if rc == 0 {
        // SAFETY: rc == 0 means the kernel initialized the struct.
        Some(unsafe { usage.assume_init() })
    } else {
        None
    }
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros)
}

#[cfg(not(unix))]
#[derive(Debug, Clone, Copy)]
struct ChildrenAccounting;

#[cfg(not(unix))]
fn children_accounting() -> Option<ChildrenAccounting> {
    None
}

#[cfg(not(unix))]
fn accounting_delta(_before: Option<ChildrenAccounting>) -> Option<ResourceUsage> {
    None
}
