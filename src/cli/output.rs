//! Handles all user-facing output for the CLI.
//!
//! Writers are generic over `WriteColor` so reports can be rendered to a
//! terminal or captured in a buffer.

use std::io::{self, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::report::{ComparisonResult, FailureDetail, RunReport, SuiteReport};

pub fn color_choice(use_colors: bool) -> ColorChoice {
    if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Prints a run report to stdout.
pub fn print_report(report: &RunReport, use_colors: bool) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(use_colors));
    write_report(&mut stdout, report)
}

pub fn write_report<W: WriteColor>(out: &mut W, report: &RunReport) -> io::Result<()> {
    for suite in &report.suites {
        write_suite(out, suite)?;
    }

    let summary = report.summary();
    writeln!(out)?;
    write!(out, "Test summary: total {}, ", summary.total_tests() + summary.skipped)?;
    write_colored(out, Color::Green, "passed")?;
    write!(out, " {}, ", summary.passed)?;
    write_colored(out, Color::Red, "failed")?;
    write!(out, " {}, ", summary.failed)?;
    write_colored(out, Color::Yellow, "skipped")?;
    writeln!(out, " {}", summary.skipped)?;

    if summary.has_failures() {
        writeln!(out, "\nFailed tests:")?;
        for suite in &report.suites {
            for failure in suite.failures() {
                writeln!(out, "  - {} > {}", suite.name, failure.name)?;
            }
        }
    }
    Ok(())
}

fn write_suite<W: WriteColor>(out: &mut W, suite: &SuiteReport) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    writeln!(out, "--- {} ---", suite.name)?;
    out.reset()?;

    for result in &suite.results {
        write_result(out, result)?;
    }
    for id in &suite.ignored {
        write_colored(out, Color::Yellow, "SKIP")?;
        writeln!(out, ": {} (ignored)", crate::normalize::normalize_name(id))?;
    }
    Ok(())
}

fn write_result<W: WriteColor>(out: &mut W, result: &ComparisonResult) -> io::Result<()> {
    if result.passed {
        write_colored(out, Color::Green, "PASS")?;
        return writeln!(out, ": {}", result.name);
    }
    write_colored(out, Color::Red, "FAIL")?;
    writeln!(out, ": {} [{}]", result.name, result.case_id)?;
    match &result.diff {
        Some(FailureDetail::Mismatch(mismatch)) => {
            write!(out, "  {} mismatch", mismatch.check.as_str())?;
            if let Some(detail) = &mismatch.detail {
                write!(out, " ({detail})")?;
            }
            writeln!(out)?;
            let changeset = Changeset::new(&mismatch.expected, &mismatch.actual, "\n");
            write_diff(out, &changeset.diffs)?;
        }
        Some(FailureDetail::Error { kind, message }) => {
            writeln!(out, "  {kind} error: {message}")?;
        }
        None => {}
    }
    Ok(())
}

/// Line diff: `-` expected only, `+` actual only.
fn write_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    for diff in diffs {
        let (prefix, color, text) = match diff {
            Difference::Same(text) => (' ', None, text),
            Difference::Rem(text) => ('-', Some(Color::Green), text),
            Difference::Add(text) => ('+', Some(Color::Red), text),
        };
        for line in text.lines() {
            match color {
                Some(color) => out.set_color(ColorSpec::new().set_fg(Some(color)))?,
                None => out.reset()?,
            }
            writeln!(out, "  {prefix}{line}")?;
        }
    }
    out.reset()
}

fn write_colored<W: WriteColor>(out: &mut W, color: Color, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{text}")?;
    out.reset()
}

/// Prints case ids grouped by suite, marking ignored ones.
pub fn write_listing<W: Write>(
    out: &mut W,
    suite: &str,
    ids: &[String],
    is_ignored: impl Fn(&str) -> bool,
) -> io::Result<()> {
    writeln!(out, "{suite} ({} cases)", ids.len())?;
    for id in ids {
        if is_ignored(id) {
            writeln!(out, "  {id} (ignored)")?;
        } else {
            writeln!(out, "  {id}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod output_tests {
    use termcolor::NoColor;

    use super::*;
    use crate::compare::compare_text;

    fn render(report: &RunReport) -> String {
        let mut out = NoColor::new(Vec::new());
        write_report(&mut out, report).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn report_lists_results_diff_and_summary() {
        let mut suite = SuiteReport::new("integration");
        suite.results.push(ComparisonResult::pass("compress.comments"));
        suite.results.push(ComparisonResult::from_outcome(
            "regression.1",
            compare_text("a {\n  color: blue;\n}", "a {\n  color: red;\n}"),
        ));
        suite.ignored.push("index".into());
        let text = render(&RunReport { suites: vec![suite] });

        assert!(text.contains("--- integration ---"));
        assert!(text.contains("PASS: compress comments"));
        assert!(text.contains("FAIL: regression 1 [regression.1]"));
        assert!(text.contains("  -  color: red;"));
        assert!(text.contains("  +  color: blue;"));
        assert!(text.contains("SKIP: index (ignored)"));
        assert!(text.contains("Test summary: total 3, passed 1, failed 1, skipped 1"));
        assert!(text.contains("  - integration > regression 1"));
    }

    #[test]
    fn listing_marks_ignored_cases() {
        let mut out = Vec::new();
        write_listing(&mut out, "integration", &["index".into(), "a".into()], |id| id == "index").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "integration (2 cases)\n  index (ignored)\n  a\n"
        );
    }
}
