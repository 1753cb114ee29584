//! # Medir
//!
//! Benchmark orchestration and result aggregation for parallel kernel
//! comparison.
//!
//! Medir (Spanish: "to measure") sweeps pre-built kernel executables -
//! matrix multiplication, Monte-Carlo estimation, cellular-automaton
//! simulation - over problem size, worker count, and repetition count;
//! captures wall-clock time (plus child CPU time and peak memory where the
//! OS accounts for them); folds the raw per-run samples into rectangular
//! per-configuration tables; and derives mean latency and speedup curves
//! for external plotting. A sampling-based oracle spot-checks kernel
//! correctness, trading exhaustive verification for statistical
//! spot-checking as problem size grows.
//!
//! The orchestrator itself is single-threaded and synchronous: all
//! parallelism under test lives inside the invoked executables.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use medir::aggregate::{RectangularTable, SpeedupCurve};
//!
//! // Ragged per-size repetition lists are padded, never truncated.
//! let mut baseline = BTreeMap::new();
//! baseline.insert(500, vec![10.0, 10.2]);
//! let mut threaded = BTreeMap::new();
//! threaded.insert(500, vec![2.0, 2.2, 2.1]);
//!
//! let baseline = RectangularTable::from_columns(baseline);
//! let threaded = RectangularTable::from_columns(threaded);
//! assert_eq!(threaded.rows(), 3);
//!
//! let curve = SpeedupCurve::between(&baseline, &threaded);
//! assert!((curve.points[&500] - 4.8).abs() < 0.1);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for means is fine at sweep scale
#![allow(clippy::cast_possible_truncation)] // sample-size arithmetic stays far below usize::MAX
#![allow(clippy::cast_sign_loss)] // sample sizes are non-negative by construction
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

/// Sample aggregation: rectangular tables, means, and speedup curves
pub mod aggregate;
/// CLI command implementations (extracted for testability)
pub mod cli;
pub mod error;
/// Scoped execution and measurement of one external kernel binary
pub mod runner;
/// Sweep scheduling and the append-only run log
pub mod sweep;
/// Kernel invocation variants and argv construction
pub mod variant;
/// Correctness verification of kernel-produced artifacts
pub mod verify;

pub use error::{MedirError, Result};
pub use runner::{ProcessRunner, ResourceUsage, RunMeasurement};
pub use sweep::{RunConfiguration, RunSample, SweepConfig, SweepScheduler, SweepSummary};
pub use variant::{KernelVariant, VariantKind};
pub use verify::{SamplerConfig, VerificationReport};
