//! Medir CLI - benchmark orchestration for parallel kernel comparison
//!
//! # Commands
//!
//! - `sweep` - Run a benchmark sweep over kernel binaries
//! - `aggregate` - Fold a run log into per-configuration tables
//! - `speedup` - Derive a speedup curve from two tables
//! - `verify` - Check a matrix product against recomputation
//! - `check-estimate` - Check a kernel's printed estimate against a constant

use clap::Parser;
use medir::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli::entrypoint(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
