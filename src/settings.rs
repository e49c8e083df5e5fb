//! Harness settings, loaded from an optional YAML file.
//!
//! ```yaml
//! fixture_root: test
//! suites: [integration, converter, deps, sourcemap, scenarios]
//! case_timeout_ms: 10000
//! sut_command: [node, tools/stylus-adapter.js]
//! extra_ignore:
//!   integration: [regression 1112]
//! ```
//!
//! Every field is optional. Command-line flags override file values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::HarnessError;

/// A runnable suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SuiteSelector {
    Integration,
    Converter,
    Deps,
    Sourcemap,
    Scenarios,
}

impl SuiteSelector {
    pub const ALL: [SuiteSelector; 5] = [
        SuiteSelector::Integration,
        SuiteSelector::Converter,
        SuiteSelector::Deps,
        SuiteSelector::Sourcemap,
        SuiteSelector::Scenarios,
    ];

    /// Name used in reports.
    pub fn suite_name(&self) -> &'static str {
        match self {
            SuiteSelector::Integration => "integration",
            SuiteSelector::Converter => "converter",
            SuiteSelector::Deps => "dependency resolver",
            SuiteSelector::Sourcemap => "sourcemap",
            SuiteSelector::Scenarios => "JS API",
        }
    }

    /// Key used in settings files and on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            SuiteSelector::Integration => "integration",
            SuiteSelector::Converter => "converter",
            SuiteSelector::Deps => "deps",
            SuiteSelector::Sourcemap => "sourcemap",
            SuiteSelector::Scenarios => "scenarios",
        }
    }
}

fn default_fixture_root() -> PathBuf {
    PathBuf::from("test")
}

fn default_suites() -> Vec<SuiteSelector> {
    SuiteSelector::ALL.to_vec()
}

fn default_use_colors() -> bool {
    atty::is(atty::Stream::Stdout)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    #[serde(default = "default_fixture_root")]
    pub fixture_root: PathBuf,
    #[serde(default = "default_suites")]
    pub suites: Vec<SuiteSelector>,
    #[serde(default)]
    pub case_timeout_ms: Option<u64>,
    #[serde(default)]
    pub sut_command: Vec<String>,
    #[serde(default = "default_use_colors")]
    pub use_colors: bool,
    /// Extra ignore entries keyed by suite key.
    #[serde(default)]
    pub extra_ignore: BTreeMap<String, Vec<String>>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            fixture_root: default_fixture_root(),
            suites: default_suites(),
            case_timeout_ms: None,
            sut_command: Vec::new(),
            use_colors: default_use_colors(),
            extra_ignore: BTreeMap::new(),
        }
    }
}

impl HarnessSettings {
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let content = fs::read_to_string(path).map_err(|e| HarnessError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|message| HarnessError::Settings {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn case_timeout(&self) -> Option<Duration> {
        self.case_timeout_ms.map(Duration::from_millis)
    }

    pub fn extra_ignore_for(&self, selector: SuiteSelector) -> &[String] {
        self.extra_ignore
            .get(selector.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Selected suites, deduplicated, in canonical order.
    pub fn selected_suites(&self) -> Vec<SuiteSelector> {
        let mut suites = self.suites.clone();
        suites.sort();
        suites.dedup();
        suites
    }
}
