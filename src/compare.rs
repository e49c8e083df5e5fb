//! Per-kind checks of actual output against golden fixtures.
//!
//! Every check returns `Err(Mismatch)` rather than a harness error: a
//! mismatch is an ordinary, recorded outcome of a case.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use crate::adapter::{CompileOutput, SourceMapDocument, INLINE_SOURCEMAP_MARKER};
use crate::normalize::normalize;

/// Which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Normalized text equality (render, convert, deps).
    Text,
    /// Structural equality of an external source map.
    SourceMap,
    /// Inline map must carry `sourcesContent`.
    SourcesContent,
    /// Inline css must embed the base64 map marker.
    InlineMarker,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::Text => "text",
            Check::SourceMap => "sourcemap",
            Check::SourcesContent => "sourcesContent",
            Check::InlineMarker => "inline marker",
        }
    }
}

/// Actual vs. expected for a failed check.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub check: Check,
    pub expected: String,
    pub actual: String,
    pub detail: Option<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mismatch", self.check.as_str())?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        write!(f, "\nExpected: {:?}\nActual: {:?}", self.expected, self.actual)
    }
}

/// Exact equality after normalizing both sides.
pub fn compare_text(actual: &str, expected: &str) -> Result<(), Mismatch> {
    let (actual, expected) = (normalize(actual), normalize(expected));
    if actual == expected {
        return Ok(());
    }
    Err(Mismatch {
        check: Check::Text,
        expected,
        actual,
        detail: None,
    })
}

/// Dependency paths are compared as one newline-joined text.
pub fn compare_dependencies<P: AsRef<std::path::Path>>(
    actual: &[P],
    expected: &str,
) -> Result<(), Mismatch> {
    let joined = actual
        .iter()
        .map(|p| p.as_ref().display().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    compare_text(&joined, expected)
}

/// Deep field equality between an emitted map and the golden document.
pub fn compare_sourcemap(actual: &SourceMapDocument, expected: &Value) -> Result<(), Mismatch> {
    let actual_json = actual.to_json();
    if &actual_json == expected {
        return Ok(());
    }
    let fields = differing_fields(&actual_json, expected);
    Err(Mismatch {
        check: Check::SourceMap,
        expected: pretty(expected),
        actual: pretty(&actual_json),
        detail: (!fields.is_empty()).then(|| format!("fields differ: {}", fields.join(", "))),
    })
}

/// The two checks applied to an inline source map.
pub fn check_inline_sourcemap(output: &CompileOutput) -> Result<(), Mismatch> {
    if !output.map.has_sources_content() {
        return Err(Mismatch {
            check: Check::SourcesContent,
            expected: "non-empty sourcesContent".to_string(),
            actual: output
                .map
                .get("sourcesContent")
                .map_or_else(|| "<missing>".to_string(), Value::to_string),
            detail: None,
        });
    }
    if !output.css.contains(INLINE_SOURCEMAP_MARKER) {
        return Err(Mismatch {
            check: Check::InlineMarker,
            expected: format!("output containing '{INLINE_SOURCEMAP_MARKER}'"),
            actual: normalize(&output.css),
            detail: None,
        });
    }
    Ok(())
}

/// Top-level keys whose values differ, sorted. Non-object values report as `$`.
pub fn differing_fields(actual: &Value, expected: &Value) -> Vec<String> {
    let (Value::Object(a), Value::Object(e)) = (actual, expected) else {
        return if actual == expected {
            Vec::new()
        } else {
            vec!["$".to_string()]
        };
    };
    let keys: BTreeSet<&String> = a.keys().chain(e.keys()).collect();
    keys.into_iter()
        .filter(|key| a.get(*key) != e.get(*key))
        .cloned()
        .collect()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
