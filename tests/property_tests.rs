//! Property-based tests using proptest
//!
//! Tests the aggregation and verification invariants:
//! - Rectangular tables stay rectangular for arbitrary ragged input
//! - Means skip missing cells and are never fabricated from nothing
//! - Speedup curves contain only finite, positive ratios
//! - Run-log rows round-trip through the append/parse pair
//! - An honest matrix product never fails verification

use std::collections::BTreeMap;
use std::time::Duration;

use proptest::prelude::*;

use medir::aggregate::{read_run_log, RectangularTable, SpeedupCurve};
use medir::runner::RunMeasurement;
use medir::sweep::{RunConfiguration, RunSample, SweepLog};
use medir::variant::KernelVariant;
use medir::verify::{verify_product, IntMatrix, SamplerConfig};

fn ragged_columns() -> impl Strategy<Value = BTreeMap<usize, Vec<f64>>> {
    prop::collection::btree_map(
        1usize..5000,
        prop::collection::vec(0.0001f64..1000.0, 0..12),
        1..8,
    )
}

proptest! {
    /// Padding yields one cell per (size, repetition) pair, no exceptions
    #[test]
    fn prop_table_is_rectangular(groups in ragged_columns()) {
        let longest = groups.values().map(Vec::len).max().unwrap_or(0);
        let table = RectangularTable::from_columns(groups.clone());

        prop_assert_eq!(table.rows(), longest);
        for (size, values) in &groups {
            for row in 0..table.rows() {
                let cell = table.cell(*size, row);
                prop_assert!(cell.is_some());
                if row < values.len() {
                    prop_assert_eq!(cell.unwrap(), Some(values[row]));
                } else {
                    // Padding is the missing marker, never a number.
                    prop_assert_eq!(cell.unwrap(), None);
                }
            }
        }
    }

    /// Column means ignore padding: they equal the mean of the raw list
    #[test]
    fn prop_column_mean_matches_raw_mean(groups in ragged_columns()) {
        let table = RectangularTable::from_columns(groups.clone());
        for (size, values) in &groups {
            let mean = table.column_mean(*size);
            if values.is_empty() {
                prop_assert_eq!(mean, None);
            } else {
                let expected = values.iter().sum::<f64>() / values.len() as f64;
                prop_assert!((mean.unwrap() - expected).abs() < 1e-9);
            }
        }
    }

    /// Speedup curves never contain zero, infinity, or NaN
    #[test]
    fn prop_speedup_is_finite_and_positive(
        base in ragged_columns(),
        comp in ragged_columns(),
    ) {
        let baseline = RectangularTable::from_columns(base);
        let comparison = RectangularTable::from_columns(comp);
        let curve = SpeedupCurve::between(&baseline, &comparison);
        for ratio in curve.points.values() {
            prop_assert!(ratio.is_finite());
            prop_assert!(*ratio > 0.0);
        }
    }

    /// Every appended row parses back to the configuration that produced it
    #[test]
    fn prop_log_rows_round_trip(
        size in 1usize..100_000,
        repetition in 1usize..1000,
        workers in prop::option::of(1usize..128),
        secs in 0.0f64..10_000.0,
    ) {
        let variant = match workers {
            None => KernelVariant::Sequential,
            Some(w) => KernelVariant::Threaded { workers: w },
        };
        let sample = RunSample {
            configuration: RunConfiguration {
                variant,
                algorithm: "matmul".to_string(),
                size,
                repetition,
            },
            measurement: RunMeasurement {
                elapsed: Duration::from_secs_f64(secs),
                resources: None,
            },
        };

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sweep.csv");
        let mut log = SweepLog::create(&path).unwrap();
        log.append(&sample).unwrap();
        drop(log);

        let parsed = read_run_log(&path).unwrap();
        prop_assert_eq!(parsed.skipped, 0);
        prop_assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        prop_assert_eq!(record.size, size);
        prop_assert_eq!(record.repetition, repetition);
        prop_assert_eq!(record.workers, workers);
        // The log stores a fixed 4-decimal rendering.
        prop_assert!((record.elapsed_seconds - secs).abs() < 5e-5 + 1e-9 * secs);
    }

    /// An honest product passes the full check for any small matrices
    #[test]
    fn prop_honest_product_always_verifies(
        n in 1usize..12,
        seed_values in prop::collection::vec(-50i64..50, 288),
    ) {
        let take = |offset: usize| {
            (0..n * n).map(|i| seed_values[(offset + i) % seed_values.len()]).collect()
        };
        let a = IntMatrix::from_rows(n, n, take(0)).unwrap();
        let b = IntMatrix::from_rows(n, n, take(7)).unwrap();

        let mut data = vec![0i64; n * n];
        for (i, cell) in data.iter_mut().enumerate() {
            let (row, col) = (i / n, i % n);
            *cell = (0..n).map(|k| a.get(row, k) * b.get(k, col)).sum();
        }
        let c = IntMatrix::from_rows(n, n, data).unwrap();

        let report = verify_product(&a, &b, &c, &SamplerConfig::default()).unwrap();
        prop_assert!(report.passes());
        prop_assert_eq!(report.checked, n * n);
    }
}
