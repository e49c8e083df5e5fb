//! Sequential suite execution.
//!
//! Suites run in registration order and cases in discovery order. A case is
//! fully resolved (execute, compare, record) before the next one starts, and
//! a failing case never stops its suite.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::compare::Mismatch;
use crate::discovery::Case;
use crate::normalize::normalize_name;
use crate::report::{ComparisonResult, RunReport, SuiteReport};
use crate::{err_msg, HarnessError};

/// What a case comparison produced.
pub type CaseOutcome = Result<(), Mismatch>;

/// Runs a single case: drive the system under test and compare.
///
/// `Err` means the case could not be evaluated at all (unreadable fixture,
/// compile failure); it is recorded as a failed result, never propagated.
#[async_trait]
pub trait CaseExecutor: Send + Sync {
    async fn execute(&self, case: &Case) -> Result<CaseOutcome, HarnessError>;
}

/// A named collection of cases sharing one executor and ignore list.
pub struct Suite {
    pub name: String,
    pub cases: Vec<Case>,
    /// Normalized case names that are never executed.
    pub ignore: BTreeSet<String>,
    executor: Arc<dyn CaseExecutor>,
}

impl Suite {
    pub fn is_ignored(&self, case: &Case) -> bool {
        self.ignore.contains(&case.display_name())
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("cases", &self.cases.len())
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SuiteRunner {
    suites: Vec<Suite>,
    case_timeout: Option<Duration>,
}

impl SuiteRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails a case that has not completed after `timeout`. Without one the
    /// runner waits indefinitely.
    pub fn with_case_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.case_timeout = timeout;
        self
    }

    /// Adds a suite. Ignore entries may be given as ids or as normalized
    /// names; both are stored normalized.
    pub fn register<I, S>(
        &mut self,
        name: impl Into<String>,
        cases: Vec<Case>,
        executor: Arc<dyn CaseExecutor>,
        ignore: I,
    ) where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.suites.push(Suite {
            name: name.into(),
            cases,
            ignore: ignore
                .into_iter()
                .map(|entry| normalize_name(entry.as_ref()))
                .collect(),
            executor,
        });
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Runs every suite. Per-case failures end up in the report; nothing
    /// escapes this call.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        for suite in &self.suites {
            report.suites.push(self.run_suite(suite).await);
        }
        report
    }

    pub async fn run_suite(&self, suite: &Suite) -> SuiteReport {
        info!(suite = %suite.name, cases = suite.cases.len(), "running suite");
        let mut report = SuiteReport::new(&suite.name);
        for case in &suite.cases {
            if suite.is_ignored(case) {
                debug!(suite = %suite.name, case = %case.id, "ignored");
                report.ignored.push(case.id.clone());
                continue;
            }
            let result = self.execute_case(suite, case).await;
            if !result.passed {
                warn!(suite = %suite.name, case = %case.id, "case failed");
            }
            report.results.push(result);
        }
        let summary = report.summary();
        info!(
            suite = %suite.name,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "suite finished"
        );
        report
    }

    /// Runs on its own task: a panic is recorded as an internal error, and a
    /// timed-out case is aborted before the next one starts.
    async fn execute_case(&self, suite: &Suite, case: &Case) -> ComparisonResult {
        debug!(suite = %suite.name, case = %case.id, kind = %case.kind, "executing case");
        let executor = Arc::clone(&suite.executor);
        let owned = case.clone();
        let mut handle = tokio::spawn(async move { executor.execute(&owned).await });

        let joined = match self.case_timeout {
            Some(after) => match tokio::time::timeout(after, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    let _ = handle.await;
                    Ok(Err(HarnessError::Timeout {
                        case: case.id.clone(),
                        after,
                    }))
                }
            },
            None => handle.await,
        };
        let outcome = joined.unwrap_or_else(|error| {
            Err(err_msg!(Internal, "case {} did not complete: {}", case.id, error))
        });
        match outcome {
            Ok(outcome) => ComparisonResult::from_outcome(&case.id, outcome),
            Err(error) => ComparisonResult::error(&case.id, &error),
        }
    }
}
