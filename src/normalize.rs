//! Text normalization applied before every comparison.

use std::fs;
use std::path::Path;

use crate::HarnessError;

/// Removes every carriage return and trims surrounding whitespace.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    text.replace('\r', "").trim().to_string()
}

/// Display name for a case id: `-` and `.` become spaces.
///
/// Used for reporting and ignore-list matching only. Case ids stay the
/// lookup key everywhere else.
pub fn normalize_name(id: &str) -> String {
    id.chars()
        .map(|c| if c == '-' || c == '.' { ' ' } else { c })
        .collect()
}

/// Reads a fixture file and normalizes its content.
pub fn read_fixture(path: &Path) -> Result<String, HarnessError> {
    let raw = read_fixture_raw(path)?;
    Ok(normalize(&raw))
}

/// Reads a fixture file with carriage returns removed but surrounding
/// whitespace preserved.
pub fn read_fixture_raw(path: &Path) -> Result<String, HarnessError> {
    fs::read_to_string(path)
        .map(|content| content.replace('\r', ""))
        .map_err(|source| HarnessError::Fixture {
            path: path.to_path_buf(),
            source,
        })
}
