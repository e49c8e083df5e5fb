//! Defines the command-line arguments and subcommands for the conformance CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::settings::SuiteSelector;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "stylus-conformance",
    version,
    about = "Runs golden-fixture conformance suites against a Stylus-compatible compiler."
)]
pub struct ConformanceArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// YAML settings file; flags below override its values.
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Root of the fixture tree (contains cases/, converter/, ...).
    #[arg(long)]
    pub fixtures: Option<PathBuf>,
    /// Suite to include; repeat for several. Defaults to all.
    #[arg(long = "suite", value_enum)]
    pub suites: Vec<SuiteSelector>,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the selected suites and report per-case results.
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Fail any case that takes longer than this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Disable colored output.
        #[arg(long)]
        no_color: bool,
        /// Compiler command speaking the JSON-lines adapter protocol, after `--`.
        #[arg(last = true)]
        sut: Vec<String>,
    },
    /// List discovered case ids per suite without running anything.
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
}
