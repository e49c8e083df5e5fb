//! Error taxonomy for the conformance harness.
//!
//! Two layers of failure exist:
//!
//! - [`AdapterError`] is what a system under test reports back through the
//!   adapter contract (compile failures, unsupported capabilities, broken
//!   process protocol).
//! - [`HarnessError`] is what the harness itself produces. Only
//!   [`HarnessError::Discovery`] and [`HarnessError::Settings`] abort a run;
//!   every other variant is recorded against a single case by the suite runner.
//!
//! Golden mismatches are not errors. They are [`crate::compare::Mismatch`]
//! values carried inside a failed [`crate::report::ComparisonResult`].
//!
//! Use [`err_msg!`](crate::err_msg) for message-only variants:
//!
//! - `err_msg!(Internal, "runner has no suites")`
//! - `err_msg!(Internal, "unknown suite '{}'", name)`

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Type-safe classification of a [`HarnessError`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fixture directory missing or unreadable
    Discovery,
    /// A single fixture file could not be read
    Fixture,
    /// The system under test rejected the input
    Compile,
    /// Any other adapter failure (protocol, io, unsupported capability)
    Adapter,
    /// The adapter did not complete within the configured budget
    Timeout,
    /// Harness settings could not be loaded
    Settings,
    /// Bugs and invariant violations inside the harness
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Discovery => "Discovery",
            ErrorKind::Fixture => "Fixture",
            ErrorKind::Compile => "Compile",
            ErrorKind::Adapter => "Adapter",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Settings => "Settings",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by a system under test.
#[derive(Debug, Error, Diagnostic)]
pub enum AdapterError {
    #[error("compile error: {0}")]
    #[diagnostic(code(stylus_conformance::adapter::compile))]
    Compile(String),

    #[error("unsupported by this adapter: {0}")]
    #[diagnostic(
        code(stylus_conformance::adapter::unsupported),
        help("native functions cannot cross a process boundary; use a builtin or a plugin that defines variables")
    )]
    Unsupported(String),

    #[error("adapter io failure: {0}")]
    #[diagnostic(code(stylus_conformance::adapter::io))]
    Io(#[from] io::Error),

    #[error("malformed adapter response: {0}")]
    #[diagnostic(code(stylus_conformance::adapter::protocol))]
    Protocol(String),

    #[error("adapter call aborted: {0}")]
    #[diagnostic(code(stylus_conformance::adapter::aborted))]
    Aborted(String),
}

/// Unified error type for every harness failure mode.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("cannot discover cases in '{}'", path.display())]
    #[diagnostic(
        code(stylus_conformance::discovery),
        help("check that the fixture root exists and contains the expected suite directories")
    )]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read fixture '{}'", path.display())]
    #[diagnostic(code(stylus_conformance::fixture))]
    Fixture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Adapter(#[from] AdapterError),

    #[error("case '{case}' did not complete within {after:?}")]
    #[diagnostic(
        code(stylus_conformance::timeout),
        help("raise the case timeout or investigate a hung compiler call")
    )]
    Timeout { case: String, after: Duration },

    #[error("invalid settings in '{}': {message}", path.display())]
    #[diagnostic(code(stylus_conformance::settings))]
    Settings { path: PathBuf, message: String },

    #[error("internal error: {message}")]
    #[diagnostic(code(stylus_conformance::internal))]
    Internal { message: String },
}

impl HarnessError {
    /// Returns the classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::Discovery { .. } => ErrorKind::Discovery,
            HarnessError::Fixture { .. } => ErrorKind::Fixture,
            HarnessError::Adapter(AdapterError::Compile(_)) => ErrorKind::Compile,
            HarnessError::Adapter(_) => ErrorKind::Adapter,
            HarnessError::Timeout { .. } => ErrorKind::Timeout,
            HarnessError::Settings { .. } => ErrorKind::Settings,
            HarnessError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// True for errors that must abort the whole run rather than one case.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Discovery | ErrorKind::Settings)
    }
}

/// Constructs a message-only [`HarnessError`] variant.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:expr, $($arg:expr),+ $(,)?) => {
        $crate::HarnessError::$variant {
            message: format!($msg, $($arg),+),
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::HarnessError::$variant {
            message: format!("{}", $msg),
        }
    };
}
