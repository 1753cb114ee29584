//! Sample aggregation: rectangular tables and speedup curves
//!
//! Raw log rows are grouped by (algorithm, mode, workers), then by size.
//! Each size's samples keep their repetition order - never value-sorted -
//! and ragged groups are padded into a rectangular table with an explicit
//! missing marker. Aggregation is a pure derivation from the log: running
//! it twice over an unchanged log produces byte-identical output.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::sweep::NO_WORKERS;

/// One parsed run-log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Variant label (`sequential`, `threaded`, ...)
    pub mode: String,
    /// Algorithm label
    pub algorithm: String,
    /// Problem size
    pub size: usize,
    /// Worker count, absent for sequential rows
    pub workers: Option<usize>,
    /// 1-based repetition index
    pub repetition: usize,
    /// Wall time in seconds
    pub elapsed_seconds: f64,
}

/// Result of reading a run log: parsed rows plus malformed-row count
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    /// Rows that parsed cleanly, in file order
    pub records: Vec<LogRecord>,
    /// Rows skipped as malformed
    pub skipped: usize,
}

/// Read a run log produced by the sweep scheduler
///
/// Grouping downstream is by explicit key, so row order does not matter for
/// correctness; malformed rows are counted and skipped rather than aborting
/// the aggregation.
///
/// # Errors
///
/// Returns [`MedirError::IoError`] if the file cannot be opened or read.
pub fn read_run_log(path: &Path) -> Result<ParsedLog> {
    let file = File::open(path).map_err(|e| MedirError::IoError {
        message: format!("failed to open run log '{}': {e}", path.display()),
    })?;
    // Flexible so a truncated or hand-edited row is skipped, not fatal.
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let mut parsed = ParsedLog::default();

    for row in reader.records() {
        let row = row.map_err(|e| MedirError::IoError {
            message: format!("failed to read run log '{}': {e}", path.display()),
        })?;
        match parse_record(&row) {
            Some(record) => parsed.records.push(record),
            None => parsed.skipped += 1,
        }
    }
    Ok(parsed)
}

fn parse_record(row: &csv::StringRecord) -> Option<LogRecord> {
    if row.len() != 6 {
        return None;
    }
    let workers = match row.get(3)? {
        NO_WORKERS => None,
        field => Some(field.parse().ok()?),
    };
    Some(LogRecord {
        mode: row.get(0)?.to_string(),
        algorithm: row.get(1)?.to_string(),
        size: row.get(2)?.parse().ok()?,
        workers,
        repetition: row.get(4)?.parse().ok()?,
        elapsed_seconds: row.get(5)?.parse().ok()?,
    })
}

/// Aggregation key: one table per (algorithm, mode, workers)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Algorithm label
    pub algorithm: String,
    /// Variant label
    pub mode: String,
    /// Worker count, absent for sequential
    pub workers: Option<usize>,
}

impl SeriesKey {
    /// File name of the aggregated table for this key
    #[must_use]
    pub fn table_file_name(&self) -> String {
        match self.workers {
            Some(w) => format!("{}_{}_{}.csv", self.algorithm, self.mode, w),
            None => format!("{}_{}.csv", self.algorithm, self.mode),
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.workers {
            Some(w) => write!(f, "{} {} x{w}", self.algorithm, self.mode),
            None => write!(f, "{} {}", self.algorithm, self.mode),
        }
    }
}

/// Rectangular per-size repetition table with an explicit missing marker
///
/// Columns are problem sizes in ascending order; every column holds exactly
/// `rows` cells. Ragged input is padded with `None`, never truncated and
/// never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RectangularTable {
    rows: usize,
    columns: BTreeMap<usize, Vec<Option<f64>>>,
}

impl RectangularTable {
    /// Build from per-size sample lists, padding the short ones
    #[must_use]
    pub fn from_columns(groups: BTreeMap<usize, Vec<f64>>) -> Self {
        let rows = groups.values().map(Vec::len).max().unwrap_or(0);
        let columns = groups
            .into_iter()
            .map(|(size, values)| {
                let mut cells: Vec<Option<f64>> = values.into_iter().map(Some).collect();
                cells.resize(rows, None);
                (size, cells)
            })
            .collect();
        Self { rows, columns }
    }

    /// Number of repetition rows
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Problem sizes, ascending
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.columns.keys().copied().collect()
    }

    /// True when the table holds no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Cell for (size, 0-based repetition row), if the column exists
    #[must_use]
    pub fn cell(&self, size: usize, row: usize) -> Option<Option<f64>> {
        self.columns.get(&size).and_then(|c| c.get(row)).copied()
    }

    /// Mean of one size column, skipping missing cells
    ///
    /// An all-missing column has a missing mean, never zero.
    #[must_use]
    pub fn column_mean(&self, size: usize) -> Option<f64> {
        let column = self.columns.get(&size)?;
        let present: Vec<f64> = column.iter().flatten().copied().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }

    /// Render as CSV: rows are repetition indices, columns are sizes
    ///
    /// Missing cells are empty. Fixed 4-decimal cell format keeps repeated
    /// aggregation byte-identical.
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from("repetition");
        for size in self.columns.keys() {
            out.push(',');
            out.push_str(&size.to_string());
        }
        out.push('\n');

        for row in 0..self.rows {
            out.push_str(&(row + 1).to_string());
            for cells in self.columns.values() {
                out.push(',');
                if let Some(value) = cells[row] {
                    out.push_str(&format!("{value:.4}"));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Write the CSV rendering to a file
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] on write failure.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_csv_string()).map_err(|e| MedirError::IoError {
            message: format!("failed to write table '{}': {e}", path.display()),
        })
    }

    /// Read a table back from its CSV rendering
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] if the file cannot be read and
    /// [`MedirError::ParseError`] on malformed headers or cells.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MedirError::IoError {
            message: format!("failed to read table '{}': {e}", path.display()),
        })?;
        Self::parse_csv(&contents).map_err(|message| MedirError::ParseError {
            message: format!("table '{}': {message}", path.display()),
        })
    }

    fn parse_csv(contents: &str) -> std::result::Result<Self, String> {
        let mut lines = contents.lines();
        let header = lines.next().ok_or("empty table")?;
        let mut fields = header.split(',');
        if fields.next() != Some("repetition") {
            return Err("missing 'repetition' header column".to_string());
        }
        let sizes: Vec<usize> = fields
            .map(|f| f.parse().map_err(|e| format!("bad size column '{f}': {e}")))
            .collect::<std::result::Result<_, _>>()?;

        let mut columns: BTreeMap<usize, Vec<Option<f64>>> =
            sizes.iter().map(|&s| (s, Vec::new())).collect();
        let mut rows = 0;
        for line in lines {
            let cells: Vec<&str> = line.split(',').collect();
            if cells.len() != sizes.len() + 1 {
                return Err(format!("row {} has {} cells", rows + 1, cells.len()));
            }
            for (&size, cell) in sizes.iter().zip(&cells[1..]) {
                let value = if cell.is_empty() {
                    None
                } else {
                    Some(
                        cell.parse::<f64>()
                            .map_err(|e| format!("bad cell '{cell}': {e}"))?,
                    )
                };
                if let Some(column) = columns.get_mut(&size) {
                    column.push(value);
                }
            }
            rows += 1;
        }
        Ok(Self { rows, columns })
    }
}

/// Group log rows into per-key, per-size sample lists
///
/// Repetition order within each (key, size) group follows file order, which
/// the scheduler guarantees to be production order.
#[must_use]
pub fn group_records(records: &[LogRecord]) -> BTreeMap<SeriesKey, BTreeMap<usize, Vec<f64>>> {
    let mut grouped: BTreeMap<SeriesKey, BTreeMap<usize, Vec<f64>>> = BTreeMap::new();
    for record in records {
        let key = SeriesKey {
            algorithm: record.algorithm.clone(),
            mode: record.mode.clone(),
            workers: record.workers,
        };
        grouped
            .entry(key)
            .or_default()
            .entry(record.size)
            .or_default()
            .push(record.elapsed_seconds);
    }
    grouped
}

/// Fold a parsed run log into one rectangular table per series key
#[must_use]
pub fn aggregate_records(records: &[LogRecord]) -> BTreeMap<SeriesKey, RectangularTable> {
    group_records(records)
        .into_iter()
        .map(|(key, groups)| (key, RectangularTable::from_columns(groups)))
        .collect()
}

/// Speedup per problem size: baseline mean over comparison mean
///
/// Defined only where both series have a strictly positive mean; every
/// other size is excluded, never coerced to zero or infinity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedupCurve {
    /// Size to speedup ratio, ascending by size
    pub points: BTreeMap<usize, f64>,
}

impl SpeedupCurve {
    /// Derive a curve from a baseline and a comparison table
    #[must_use]
    pub fn between(baseline: &RectangularTable, comparison: &RectangularTable) -> Self {
        let mut points = BTreeMap::new();
        for size in baseline.sizes() {
            let base = baseline.column_mean(size);
            let comp = comparison.column_mean(size);
            if let (Some(base), Some(comp)) = (base, comp) {
                if base > 0.0 && comp > 0.0 {
                    points.insert(size, base / comp);
                }
            }
        }
        Self { points }
    }

    /// True when no size qualified
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Render as CSV with header `size,speedup`
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from("size,speedup\n");
        for (size, ratio) in &self.points {
            out.push_str(&format!("{size},{ratio:.4}\n"));
        }
        out
    }

    /// Write the CSV rendering to a file
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] on write failure.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_csv_string()).map_err(|e| MedirError::IoError {
            message: format!("failed to write speedup curve '{}': {e}", path.display()),
        })
    }
}
