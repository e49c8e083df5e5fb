//! The four golden-file suites and the executor that drives them.
//!
//! Directory layout under the fixture root:
//!
//! | directory | discovered by | input | golden |
//! |---|---|---|---|
//! | `cases/` | `.styl` | `id.styl` | `id.css` |
//! | `converter/` | `.css` | `id.css` | `id.styl` |
//! | `deps-resolver/` | `.styl` | `id.styl` | `id.deps` |
//! | `sourcemap/` | `.styl` | `id.styl` | `id.css` (inline) or `id.map` |

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::SystemUnderTest;
use crate::compare::{check_inline_sourcemap, compare_dependencies, compare_sourcemap, compare_text};
use crate::derive::ConfigDeriver;
use crate::discovery::{discover_cases, Case, CaseKind, DEFAULT_SOURCE_EXTENSION};
use crate::normalize::read_fixture;
use crate::settings::SuiteSelector;
use crate::suite::{CaseExecutor, CaseOutcome, SuiteRunner};
use crate::HarnessError;

/// Case ids of the integration suite that are never run.
pub const INTEGRATION_IGNORE: &[&str] = &["index"];

/// Paths of every fixture directory, derived from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayout {
    root: PathBuf,
}

impl FixtureLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.root.join("cases")
    }

    pub fn converter_dir(&self) -> PathBuf {
        self.root.join("converter")
    }

    pub fn deps_dir(&self) -> PathBuf {
        self.root.join("deps-resolver")
    }

    pub fn sourcemap_dir(&self) -> PathBuf {
        self.root.join("sourcemap")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Search path for the import fixtures, also used by the import scenarios.
    pub fn import_dir(&self) -> PathBuf {
        self.cases_dir().join("import.basic")
    }

    /// Directory and discovery extension of a golden suite.
    pub fn suite_dir(&self, selector: SuiteSelector) -> Option<(PathBuf, &'static str)> {
        match selector {
            SuiteSelector::Integration => Some((self.cases_dir(), DEFAULT_SOURCE_EXTENSION)),
            SuiteSelector::Converter => Some((self.converter_dir(), ".css")),
            SuiteSelector::Deps => Some((self.deps_dir(), DEFAULT_SOURCE_EXTENSION)),
            SuiteSelector::Sourcemap => Some((self.sourcemap_dir(), DEFAULT_SOURCE_EXTENSION)),
            SuiteSelector::Scenarios => None,
        }
    }
}

/// Executes golden cases of every kind against one system under test.
pub struct FixtureExecutor {
    sut: Arc<dyn SystemUnderTest>,
    deriver: ConfigDeriver,
}

impl FixtureExecutor {
    pub fn new(sut: Arc<dyn SystemUnderTest>, deriver: ConfigDeriver) -> Self {
        Self { sut, deriver }
    }

    async fn render(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        let source = read_fixture(&case.source_path)?;
        let expected = read_fixture(&case.expected_path)?;
        let mut config = self.deriver.derive(&case.id);
        config.filename = Some(case.source_path.clone());
        let css = self.sut.compile(&source, &config).await?;
        Ok(compare_text(&css, &expected))
    }

    async fn convert(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        let css = read_fixture(&case.source_path)?;
        let expected = read_fixture(&case.expected_path)?;
        let styl = self.sut.convert(&css).await?;
        Ok(compare_text(&styl, &expected))
    }

    async fn deps(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        let source = read_fixture(&case.source_path)?;
        let expected = read_fixture(&case.expected_path)?;
        let mut config = self.deriver.derive(&case.id);
        config.filename = Some(case.source_path.clone());
        let deps = self.sut.dependencies(&source, &config).await?;
        Ok(compare_dependencies(&deps, &expected))
    }

    async fn sourcemap(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        let source = read_fixture(&case.source_path)?;
        let mut config = self.deriver.derive(&case.id);
        config.filename = Some(case.source_path.clone());
        let inline = config.sourcemap.as_ref().is_some_and(|options| options.inline);
        let output = self.sut.compile_with_sourcemap(&source, &config).await?;
        if inline {
            return Ok(check_inline_sourcemap(&output));
        }
        let expected = read_fixture(&case.expected_path)?;
        let expected: Value = serde_json::from_str(&expected).map_err(|e| HarnessError::Fixture {
            path: case.expected_path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        Ok(compare_sourcemap(&output.map, &expected))
    }
}

#[async_trait]
impl CaseExecutor for FixtureExecutor {
    async fn execute(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        match case.kind {
            CaseKind::Render => self.render(case).await,
            CaseKind::Convert => self.convert(case).await,
            CaseKind::Deps => self.deps(case).await,
            CaseKind::SourceMap => self.sourcemap(case).await,
        }
    }
}

/// Config deriver for a golden suite.
pub fn deriver_for(selector: SuiteSelector, layout: &FixtureLayout) -> ConfigDeriver {
    match selector {
        SuiteSelector::Integration => {
            ConfigDeriver::integration(layout.images_dir(), layout.import_dir())
        }
        SuiteSelector::Sourcemap => {
            ConfigDeriver::sourcemap(layout.sourcemap_dir().display().to_string())
        }
        SuiteSelector::Converter | SuiteSelector::Deps | SuiteSelector::Scenarios => {
            ConfigDeriver::default()
        }
    }
}

/// Discovers the cases of a golden suite. Returns an empty list for
/// [`SuiteSelector::Scenarios`], which has no fixture directory.
pub fn discover_suite_cases(
    selector: SuiteSelector,
    layout: &FixtureLayout,
) -> Result<Vec<Case>, HarnessError> {
    let Some((dir, extension)) = layout.suite_dir(selector) else {
        return Ok(Vec::new());
    };
    let file = |id: &str, ext: &str| dir.join(format!("{id}{ext}"));
    match selector {
        SuiteSelector::Integration => discover_cases(&dir, extension, CaseKind::Render, |id| {
            (file(id, ".styl"), file(id, ".css"))
        }),
        SuiteSelector::Converter => discover_cases(&dir, extension, CaseKind::Convert, |id| {
            (file(id, ".css"), file(id, ".styl"))
        }),
        SuiteSelector::Deps => discover_cases(&dir, extension, CaseKind::Deps, |id| {
            (file(id, ".styl"), file(id, ".deps"))
        }),
        SuiteSelector::Sourcemap => {
            let deriver = deriver_for(selector, layout);
            discover_cases(&dir, extension, CaseKind::SourceMap, |id| {
                let inline = deriver
                    .derive(id)
                    .sourcemap
                    .is_some_and(|options| options.inline);
                let golden = if inline { ".css" } else { ".map" };
                (file(id, ".styl"), file(id, golden))
            })
        }
        SuiteSelector::Scenarios => Ok(Vec::new()),
    }
}

/// Built-in ignore list of a golden suite.
pub fn default_ignore(selector: SuiteSelector) -> &'static [&'static str] {
    match selector {
        SuiteSelector::Integration => INTEGRATION_IGNORE,
        _ => &[],
    }
}

/// Discovers and registers one golden suite. A missing or unreadable
/// directory aborts with [`HarnessError::Discovery`].
pub fn register_fixture_suite(
    runner: &mut SuiteRunner,
    selector: SuiteSelector,
    layout: &FixtureLayout,
    sut: Arc<dyn SystemUnderTest>,
    extra_ignore: &[String],
) -> Result<(), HarnessError> {
    if selector == SuiteSelector::Scenarios {
        return Ok(());
    }
    let cases = discover_suite_cases(selector, layout)?;
    let executor = Arc::new(FixtureExecutor::new(sut, deriver_for(selector, layout)));
    let ignore = default_ignore(selector)
        .iter()
        .map(|s| s.to_string())
        .chain(extra_ignore.iter().cloned())
        .collect::<Vec<_>>();
    runner.register(selector.suite_name(), cases, executor, ignore);
    Ok(())
}

/// Builds a runner with every selected golden suite, in selection order.
pub fn standard_runner(
    layout: &FixtureLayout,
    sut: Arc<dyn SystemUnderTest>,
    selection: &[SuiteSelector],
) -> Result<SuiteRunner, HarnessError> {
    let mut runner = SuiteRunner::new();
    for selector in selection {
        register_fixture_suite(&mut runner, *selector, layout, Arc::clone(&sut), &[])?;
    }
    Ok(runner)
}
