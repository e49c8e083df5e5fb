//! Golden-fixture conformance harness for a Stylus-compatible CSS preprocessor.
//!
//! The compiler itself is external: the harness drives it through the
//! [`adapter::SystemUnderTest`] contract, discovers golden cases from a
//! fixture tree, derives each case's options from its file name, and records
//! one [`report::ComparisonResult`] per case.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stylus_conformance::adapter::process::ProcessAdapter;
//! use stylus_conformance::fixtures::{standard_runner, FixtureLayout};
//! use stylus_conformance::settings::SuiteSelector;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = Arc::new(ProcessAdapter::new(&["node", "adapter.js"])?);
//! let layout = FixtureLayout::new("test");
//! let runner = standard_runner(&layout, adapter.clone(), &[SuiteSelector::Integration])?;
//! let report = runner.run().await;
//! adapter.shutdown().await?;
//! assert!(!report.has_failures());
//! # Ok(())
//! # }
//! ```

pub use crate::diagnostics::{AdapterError, ErrorKind, HarnessError};

pub mod adapter;
pub mod cli;
pub mod compare;
pub mod configuration;
pub mod derive;
pub mod diagnostics;
pub mod discovery;
pub mod fixtures;
pub mod normalize;
pub mod report;
pub mod scenarios;
pub mod settings;
pub mod suite;
