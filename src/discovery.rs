use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::HarnessError;

/// Primary source extension.
pub const DEFAULT_SOURCE_EXTENSION: &str = ".styl";

/// What a case checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseKind {
    /// compile(source) == expected css
    Render,
    /// convert(css) == expected source
    Convert,
    /// dependencies(source) == expected newline list
    Deps,
    /// compile_with_sourcemap(source) checked against a map or inline marker
    SourceMap,
}

impl CaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseKind::Render => "render",
            CaseKind::Convert => "convert",
            CaseKind::Deps => "deps",
            CaseKind::SourceMap => "sourcemap",
        }
    }
}

impl std::fmt::Display for CaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A golden fixture pair identified by its shared base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub id: String,
    /// File fed to the system under test.
    pub source_path: PathBuf,
    /// Golden file compared against.
    pub expected_path: PathBuf,
    pub kind: CaseKind,
}

impl Case {
    pub fn new(
        id: impl Into<String>,
        source_path: impl Into<PathBuf>,
        expected_path: impl Into<PathBuf>,
        kind: CaseKind,
    ) -> Self {
        Self {
            id: id.into(),
            source_path: source_path.into(),
            expected_path: expected_path.into(),
            kind,
        }
    }

    /// Reporting name: separators shown as spaces.
    pub fn display_name(&self) -> String {
        crate::normalize::normalize_name(&self.id)
    }
}

/// Lists the case ids in `dir`: every file whose name contains `extension`,
/// with the first occurrence of the extension removed.
///
/// Only the directory's immediate entries are considered. Ids are sorted so
/// runs are reproducible across platforms.
pub fn discover_case_ids(dir: &Path, extension: &str) -> Result<Vec<String>, HarnessError> {
    let discovery_error = |source: io::Error| HarnessError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(dir).map_err(discovery_error)?;
    if !metadata.is_dir() {
        return Err(discovery_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut ids = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            discovery_error(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message)),
            )
        })?;
        // Symlinked fixtures count; dangling links and directories do not.
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.contains(extension) {
            continue;
        }
        ids.push(name.replacen(extension, "", 1));
    }
    ids.sort();
    ids.dedup();

    debug!(dir = %dir.display(), extension, count = ids.len(), "discovered cases");
    Ok(ids)
}

/// Discovers `dir` and pairs each id with its source and golden file.
pub fn discover_cases(
    dir: &Path,
    discover_extension: &str,
    kind: CaseKind,
    paths_for: impl Fn(&str) -> (PathBuf, PathBuf),
) -> Result<Vec<Case>, HarnessError> {
    Ok(discover_case_ids(dir, discover_extension)?
        .into_iter()
        .map(|id| {
            let (source_path, expected_path) = paths_for(&id);
            Case::new(id, source_path, expected_path, kind)
        })
        .collect())
}
