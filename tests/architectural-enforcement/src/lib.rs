//! Architectural Enforcement
//!
//! Source scanning helpers shared by the structural tests in `tests/`:
//! - The engine never sleeps; it waits on channels
//! - The engine stays headless (no UI or terminal crates)
//! - Production code propagates errors instead of unwrapping
//!
//! Scans are line based. Everything after a file's first `#[cfg(test)]` is
//! treated as test code, which matches how the workspace lays out its modules.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// A line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Code with any trailing `//` comment removed
    pub code: String,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// All `.rs` files under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production lines of one file
///
/// Comment lines are skipped, trailing comments stripped, and scanning stops
/// at the first `#[cfg(test)]`.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        let code = line.split("//").next().unwrap_or(line);
        out.push(SourceLine {
            path: path.to_path_buf(),
            number: idx + 1,
            code: code.to_string(),
        });
    }
    out
}

/// Production lines under `dir` for which `predicate` holds
#[must_use]
pub fn find_in_production<F>(dir: &str, predicate: F) -> Vec<SourceLine>
where
    F: Fn(&str) -> bool,
{
    rust_files(dir)
        .iter()
        .flat_map(|path| production_lines(path))
        .filter(|line| predicate(&line.code))
        .collect()
}

/// Dependency names declared in a manifest's `[dependencies]` table
#[must_use]
pub fn manifest_dependencies(manifest: &Path) -> Vec<String> {
    manifest_dependency_specs(manifest)
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// `(name, spec)` pairs from a manifest's `[dependencies]` table
///
/// The spec is the raw text after `=`, e.g. `{ version = "1", features = [..] }`.
#[must_use]
pub fn manifest_dependency_specs(manifest: &Path) -> Vec<(String, String)> {
    let Ok(content) = fs::read_to_string(manifest) else {
        return Vec::new();
    };

    let mut in_deps = false;
    let mut deps = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_deps = line == "[dependencies]";
            continue;
        }
        if !in_deps || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, spec)) = line.split_once('=') {
            deps.push((name.trim().to_string(), spec.trim().to_string()));
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }

    #[test]
    fn test_manifest_dependencies_reads_core() {
        let deps = manifest_dependencies(&workspace_root().join("solver/core/Cargo.toml"));
        assert!(deps.iter().any(|d| d == "tokio"));
        assert!(deps.iter().any(|d| d == "pulldown-cmark"));
        assert!(!deps.iter().any(|d| d == "tempfile"), "dev-dependencies leaked");
    }

    #[test]
    fn test_manifest_dependency_specs_keep_features() {
        let specs = manifest_dependency_specs(&workspace_root().join("solver/core/Cargo.toml"));
        let tokio = specs.iter().find(|(name, _)| name == "tokio");
        assert!(tokio.is_some_and(|(_, spec)| spec.contains("features")));
    }
}
