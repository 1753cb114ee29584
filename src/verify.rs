//! Correctness verification of kernel-produced artifacts
//!
//! Two independent oracles: an integer matrix-product check that recomputes
//! either the full product or a random sample of cells depending on problem
//! size, and an estimate check that runs a kernel and compares the numeric
//! result embedded in its stdout against a known constant. Both are
//! stateless and invoked once per verification run; verification failures
//! are always fatal to the caller (fail-fast, unlike sweep points).

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::runner::{extract_numeric_result, ProcessRunner};

/// Largest element count (n²) verified exhaustively
pub const FULL_CHECK_THRESHOLD: usize = 90_000;

/// Default fraction of elements spot-checked above the threshold
pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.01;

/// Default cap on spot-checked elements
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Dense integer matrix loaded from a headerless CSV artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntMatrix {
    rows: usize,
    cols: usize,
    data: Vec<i64>,
}

impl IntMatrix {
    /// Build from row-major data
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::DimensionMismatch`] when the data length does
    /// not match the declared shape.
    pub fn from_rows(rows: usize, cols: usize, data: Vec<i64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(MedirError::DimensionMismatch {
                expected: format!("{rows}x{cols}"),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// n×n identity matrix
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0; n * n];
        for i in 0..n {
            data[i * n + i] = 1;
        }
        Self {
            rows: n,
            cols: n,
            data,
        }
    }

    /// Load from a headerless CSV file of integers
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] if the file cannot be read,
    /// [`MedirError::ParseError`] on non-integer cells or ragged rows.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| MedirError::IoError {
            message: format!("failed to open matrix '{}': {e}", path.display()),
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut data = Vec::new();
        let mut rows = 0;
        let mut cols = 0;
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| MedirError::IoError {
                message: format!("failed to read matrix '{}': {e}", path.display()),
            })?;
            if rows == 0 {
                cols = row.len();
            } else if row.len() != cols {
                return Err(MedirError::ParseError {
                    message: format!(
                        "matrix '{}': row {} has {} cells, expected {cols}",
                        path.display(),
                        line + 1,
                        row.len()
                    ),
                });
            }
            for cell in row.iter() {
                let value = cell.trim().parse::<i64>().map_err(|e| MedirError::ParseError {
                    message: format!(
                        "matrix '{}' row {}: bad integer '{cell}': {e}",
                        path.display(),
                        line + 1
                    ),
                })?;
                data.push(value);
            }
            rows += 1;
        }
        Ok(Self { rows, cols, data })
    }

    /// Row count
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at (row, col); row-major, no bounds slack
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.cols + col]
    }

    /// Mutable element access, used by tests to corrupt a product
    pub fn set(&mut self, row: usize, col: usize, value: i64) {
        self.data[row * self.cols + col] = value;
    }

    fn shape_label(&self) -> String {
        format!("{}x{}", self.rows, self.cols)
    }
}

/// Sampling parameters for the spot-check path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Fraction of n² to check, before the cap
    pub sample_fraction: f64,
    /// Hard cap on checked elements
    pub max_samples: usize,
    /// Explicit seed for reproducible sampling; OS entropy when absent
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_fraction: DEFAULT_SAMPLE_FRACTION,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed: None,
        }
    }
}

/// Which verification path ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMode {
    /// Every element recomputed
    Full,
    /// Random subset of elements recomputed
    Sampled,
}

/// Outcome of one matrix-product verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Path taken
    pub mode: VerificationMode,
    /// Elements recomputed and compared
    pub checked: usize,
    /// Elements that differed
    pub mismatches: usize,
}

impl VerificationReport {
    /// Passes iff no element differed
    #[must_use]
    pub fn passes(&self) -> bool {
        self.mismatches == 0
    }

    /// Mismatches as a percentage of checked elements
    #[must_use]
    pub fn mismatch_percentage(&self) -> f64 {
        if self.checked == 0 {
            0.0
        } else {
            self.mismatches as f64 / self.checked as f64 * 100.0
        }
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Verify a claimed product C = A·B by recomputation
///
/// Exhaustive below [`FULL_CHECK_THRESHOLD`] elements, sampled without
/// replacement above it: `min(sample_fraction · n², max_samples)` distinct
/// linear indices, each decoded to (row, column) and recomputed as a single
/// dot product. Comparison is exact integer equality; accumulation is done
/// in `i128` so the oracle itself cannot overflow.
///
/// # Errors
///
/// Returns [`MedirError::DimensionMismatch`] before any computation when
/// the three matrices are not square with identical shape.
pub fn verify_product(
    a: &IntMatrix,
    b: &IntMatrix,
    c: &IntMatrix,
    sampler: &SamplerConfig,
) -> Result<VerificationReport> {
    check_shapes(a, b, c)?;
    let n = a.rows();
    let total = n * n;

    if total <= FULL_CHECK_THRESHOLD {
        let mut mismatches = 0;
        for row in 0..n {
            for col in 0..n {
                if dot(a, b, row, col) != i128::from(c.get(row, col)) {
                    mismatches += 1;
                }
            }
        }
        return Ok(VerificationReport {
            mode: VerificationMode::Full,
            checked: total,
            mismatches,
        });
    }

    let requested = (sampler.sample_fraction * total as f64) as usize;
    let sample_size = requested.min(sampler.max_samples).clamp(1, total);
    let mut rng = match sampler.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let indices = rand::seq::index::sample(&mut rng, total, sample_size);

    let mut mismatches = 0;
    for idx in indices {
        let (row, col) = (idx / n, idx % n);
        if dot(a, b, row, col) != i128::from(c.get(row, col)) {
            mismatches += 1;
        }
    }
    Ok(VerificationReport {
        mode: VerificationMode::Sampled,
        checked: sample_size,
        mismatches,
    })
}

fn check_shapes(a: &IntMatrix, b: &IntMatrix, c: &IntMatrix) -> Result<()> {
    if a.rows() != a.cols() {
        return Err(MedirError::DimensionMismatch {
            expected: "square matrix".to_string(),
            actual: a.shape_label(),
        });
    }
    for other in [b, c] {
        if other.rows() != a.rows() || other.cols() != a.cols() {
            return Err(MedirError::DimensionMismatch {
                expected: a.shape_label(),
                actual: other.shape_label(),
            });
        }
    }
    Ok(())
}

fn dot(a: &IntMatrix, b: &IntMatrix, row: usize, col: usize) -> i128 {
    let n = a.cols();
    let mut acc = 0i128;
    for k in 0..n {
        acc += i128::from(a.get(row, k)) * i128::from(b.get(k, col));
    }
    acc
}

/// Load the A, B, C matrix artifacts a kernel wrote into `dir`
///
/// # Errors
///
/// Propagates load failures; a missing file is an [`MedirError::IoError`]
/// naming the path.
pub fn load_matrix_artifacts(dir: &Path) -> Result<(IntMatrix, IntMatrix, IntMatrix)> {
    let a = IntMatrix::from_csv(&dir.join("A.csv"))?;
    let b = IntMatrix::from_csv(&dir.join("B.csv"))?;
    let c = IntMatrix::from_csv(&dir.join("C.csv"))?;
    Ok((a, b, c))
}

/// Outcome of one estimate verification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateReport {
    /// Value extracted from the kernel's stdout
    pub estimate: f64,
    /// Constant the estimate is compared against
    pub expected: f64,
    /// |estimate − expected| / |expected|
    pub relative_error: f64,
    /// Maximum accepted relative error
    pub tolerance: f64,
}

impl EstimateReport {
    /// Passes iff the relative error is within tolerance
    #[must_use]
    pub fn passes(&self) -> bool {
        self.relative_error <= self.tolerance
    }
}

/// Run a kernel and compare its embedded numeric result to a constant
///
/// The kernel's stdout is scanned for the first embedded decimal number;
/// its absence is a [`MedirError::ParseError`] and counts as verification
/// failure. A non-zero kernel exit is fatal here - verification is
/// fail-fast.
///
/// # Errors
///
/// Launch and exit failures from [`ProcessRunner::run_captured`], plus
/// [`MedirError::ParseError`] when no number is found.
pub fn verify_estimate(
    program: &str,
    args: &[String],
    expected: f64,
    tolerance: f64,
) -> Result<EstimateReport> {
    let runner = ProcessRunner::new();
    let (_, stdout) = runner.run_captured(program, args)?;
    let estimate = extract_numeric_result(&stdout).ok_or_else(|| MedirError::ParseError {
        message: format!("no numeric result found in output of '{program}'"),
    })?;
    let relative_error = (estimate - expected).abs() / expected.abs();
    Ok(EstimateReport {
        estimate,
        expected,
        relative_error,
        tolerance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic small-value matrix so products stay tiny
    fn patterned(n: usize) -> IntMatrix {
        let data = (0..n * n).map(|i| (i % 7) as i64 - 3).collect();
        IntMatrix::from_rows(n, n, data).unwrap()
    }

    /// Reference product for small n
    fn product(a: &IntMatrix, b: &IntMatrix) -> IntMatrix {
        let n = a.rows();
        let mut data = vec![0i64; n * n];
        for i in 0..n {
            for j in 0..n {
                let mut acc = 0i64;
                for k in 0..n {
                    acc += a.get(i, k) * b.get(k, j);
                }
                data[i * n + j] = acc;
            }
        }
        IntMatrix::from_rows(n, n, data).unwrap()
    }

    #[test]
    fn test_full_check_detects_single_corruption() {
        let a = patterned(10);
        let b = patterned(10);
        let mut c = product(&a, &b);
        c.set(3, 7, c.get(3, 7) + 1);

        let report = verify_product(&a, &b, &c, &SamplerConfig::default()).unwrap();
        assert_eq!(report.mode, VerificationMode::Full);
        assert_eq!(report.checked, 100);
        assert_eq!(report.mismatches, 1);
        assert!(!report.passes());
        assert!((report.mismatch_percentage() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_check_passes_honest_product() {
        let a = patterned(10);
        let b = patterned(10);
        let c = product(&a, &b);
        let report = verify_product(&a, &b, &c, &SamplerConfig::default()).unwrap();
        assert!(report.passes());
        assert_eq!(report.checked, 100);
    }

    #[test]
    fn test_sampled_check_respects_cap() {
        // 1,000,000 elements > threshold; identity * B = B is cheap to build.
        let n = 1000;
        let a = IntMatrix::identity(n);
        let b = patterned(n);
        let c = b.clone();

        let sampler = SamplerConfig {
            seed: Some(42),
            ..SamplerConfig::default()
        };
        let report = verify_product(&a, &b, &c, &sampler).unwrap();
        assert_eq!(report.mode, VerificationMode::Sampled);
        assert_eq!(report.checked, 1000);
        assert_eq!(report.mismatches, 0);
        assert!(report.passes());
    }

    #[test]
    fn test_sampled_check_detects_uniform_corruption() {
        let n = 1000;
        let a = IntMatrix::identity(n);
        let b = patterned(n);
        let mut c = b.clone();
        // Shift every element; any sampled index must mismatch.
        for i in 0..n {
            for j in 0..n {
                c.set(i, j, c.get(i, j) + 1);
            }
        }
        let sampler = SamplerConfig {
            seed: Some(7),
            ..SamplerConfig::default()
        };
        let report = verify_product(&a, &b, &c, &sampler).unwrap();
        assert_eq!(report.checked, report.mismatches);
        assert!(!report.passes());
    }

    #[test]
    fn test_sampled_check_seed_is_reproducible() {
        let n = 400;
        let a = IntMatrix::identity(n);
        let b = patterned(n);
        let mut c = b.clone();
        c.set(123, 456, 999_999);

        let sampler = SamplerConfig {
            seed: Some(11),
            ..SamplerConfig::default()
        };
        let first = verify_product(&a, &b, &c, &sampler).unwrap();
        let second = verify_product(&a, &b, &c, &sampler).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dimension_mismatch_rejected_before_compute() {
        let a = patterned(4);
        let b = patterned(4);
        let c = patterned(5);
        let err = verify_product(&a, &b, &c, &SamplerConfig::default()).unwrap_err();
        assert!(matches!(err, MedirError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_non_square_rejected() {
        let a = IntMatrix::from_rows(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let err = verify_product(&a, &a, &a, &SamplerConfig::default()).unwrap_err();
        assert!(matches!(err, MedirError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_from_rows_validates_length() {
        assert!(IntMatrix::from_rows(2, 2, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_matrix_csv_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("A.csv");
        std::fs::write(&path, "1,2,3\n4,5,6\n7,8,9\n").unwrap();
        let m = IntMatrix::from_csv(&path).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.get(1, 2), 6);
    }

    #[test]
    fn test_matrix_csv_ragged_row_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("A.csv");
        std::fs::write(&path, "1,2,3\n4,5\n").unwrap();
        let err = IntMatrix::from_csv(&path).unwrap_err();
        assert!(matches!(err, MedirError::ParseError { .. }));
    }

    #[test]
    fn test_matrix_csv_bad_cell_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("A.csv");
        std::fs::write(&path, "1,x\n2,3\n").unwrap();
        let err = IntMatrix::from_csv(&path).unwrap_err();
        assert!(matches!(err, MedirError::ParseError { .. }));
    }

    #[test]
    fn test_report_json_shape() {
        let report = VerificationReport {
            mode: VerificationMode::Sampled,
            checked: 1000,
            mismatches: 2,
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"checked\": 1000"));
        assert!(json.contains("Sampled"));
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_estimate_within_tolerance() {
        let report = verify_estimate(
            "echo",
            &["PI estimate: 3.1415".to_string()],
            std::f64::consts::PI,
            1e-2,
        )
        .unwrap();
        assert!(report.passes());
        assert!(report.relative_error < 1e-4);
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_estimate_missing_number() {
        let err = verify_estimate("echo", &["no result".to_string()], 3.14, 1e-2).unwrap_err();
        assert!(matches!(err, MedirError::ParseError { .. }));
    }
}
