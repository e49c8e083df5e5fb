//! Per-case results and their aggregation.

use std::error::Error as _;

use crate::compare::Mismatch;
use crate::diagnostics::ErrorKind;
use crate::normalize::normalize_name;
use crate::HarnessError;

/// Why a case failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureDetail {
    Mismatch(Mismatch),
    Error { kind: ErrorKind, message: String },
}

/// Outcome of one case. Exactly one is recorded per executed case.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub case_id: String,
    /// Reporting name (see [`normalize_name`]).
    pub name: String,
    pub passed: bool,
    pub diff: Option<FailureDetail>,
}

impl ComparisonResult {
    pub fn pass(case_id: &str) -> Self {
        Self {
            case_id: case_id.to_string(),
            name: normalize_name(case_id),
            passed: true,
            diff: None,
        }
    }

    pub fn mismatch(case_id: &str, mismatch: Mismatch) -> Self {
        Self {
            passed: false,
            diff: Some(FailureDetail::Mismatch(mismatch)),
            ..Self::pass(case_id)
        }
    }

    pub fn error(case_id: &str, error: &HarnessError) -> Self {
        Self {
            passed: false,
            diff: Some(FailureDetail::Error {
                kind: error.kind(),
                message: error_chain(error),
            }),
            ..Self::pass(case_id)
        }
    }

    pub fn from_outcome(case_id: &str, outcome: Result<(), Mismatch>) -> Self {
        match outcome {
            Ok(()) => Self::pass(case_id),
            Err(mismatch) => Self::mismatch(case_id, mismatch),
        }
    }
}

/// `error: cause: cause`, following `source()` links.
fn error_chain(error: &HarnessError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Pass/fail/skip counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TestSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Executed cases; skipped ones are not counted.
    pub fn total_tests(&self) -> usize {
        self.passed + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_tests() == 0 {
            return 0.0;
        }
        (self.passed as f64 / self.total_tests() as f64) * 100.0
    }

    fn absorb(&mut self, other: TestSummary) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Results of one suite, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteReport {
    pub name: String,
    pub results: Vec<ComparisonResult>,
    /// Case ids skipped because of the ignore list.
    pub ignored: Vec<String>,
}

impl SuiteReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn summary(&self) -> TestSummary {
        let passed = self.results.iter().filter(|r| r.passed).count();
        TestSummary {
            passed,
            failed: self.results.len() - passed,
            skipped: self.ignored.len(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn result(&self, case_id: &str) -> Option<&ComparisonResult> {
        self.results.iter().find(|r| r.case_id == case_id)
    }
}

/// Every suite of a run, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub suites: Vec<SuiteReport>,
}

impl RunReport {
    pub fn summary(&self) -> TestSummary {
        let mut total = TestSummary::default();
        for suite in &self.suites {
            total.absorb(suite.summary());
        }
        total
    }

    pub fn has_failures(&self) -> bool {
        self.summary().has_failures()
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteReport> {
        self.suites.iter().find(|s| s.name == name)
    }
}
