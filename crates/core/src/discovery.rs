//! Migration script discovery with gitignore-aware filtering
//!
//! This module locates candidate migration scripts under a versions
//! directory while respecting .gitignore patterns. The walk is deliberately
//! forgiving: a bad root or an unreadable subtree yields fewer files, never
//! an error, so one broken checkout cannot abort a whole scan.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Discover files matching glob patterns under a root directory
///
/// # Arguments
/// * `root` - Root directory to search
/// * `patterns` - Glob patterns relative to `root` (e.g., &["**/*.py"])
///
/// # Returns
/// Vector of absolute paths to matching files, excluding anything matched by
/// .gitignore. A missing root or an invalid pattern yields an empty vector.
pub fn discover_files(root: &Path, patterns: &[&str]) -> Vec<PathBuf> {
    // Canonicalize upfront so every returned path is absolute regardless of
    // how the caller spelled the root
    let canonical_root = match root.canonicalize() {
        Ok(path) => path,
        Err(_) => return Vec::new(),
    };

    let glob_matcher = match build_glob_matcher(patterns) {
        Ok(matcher) => matcher,
        Err(_) => return Vec::new(),
    };

    let mut files = Vec::new();
    for result in build_walker(&canonical_root) {
        match result {
            Ok(entry) => {
                if let Some(ft) = entry.file_type() {
                    if ft.is_file() {
                        // Match globs against the path relative to the root
                        if let Ok(rel_path) = entry.path().strip_prefix(&canonical_root) {
                            if glob_matcher.is_match(rel_path) {
                                files.push(entry.into_path());
                            }
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "error walking migrations directory");
            }
        }
    }

    files
}

/// Discover migration scripts in a versions directory (convenience wrapper)
///
/// Alembic-style version scripts are Python files; scripts that carry no
/// revision declaration are filtered out later by the parser, not here.
///
/// # Example
/// ```no_run
/// use revgraph_core::discovery;
///
/// let scripts = discovery::discover_migration_scripts(std::path::Path::new("migrations/versions"));
/// println!("found {} candidate scripts", scripts.len());
/// ```
pub fn discover_migration_scripts(root: &Path) -> Vec<PathBuf> {
    discover_files(root, &["**/*.py"])
}

/// Build a glob matcher from the provided patterns
fn build_glob_matcher(patterns: &[&str]) -> Result<globset::GlobSet, globset::Error> {
    use globset::GlobSetBuilder;

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(globset::Glob::new(pattern)?);
    }
    builder.build()
}

/// Build a WalkBuilder with proper ignore configuration
fn build_walker(root: &Path) -> ignore::Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .git_exclude(true)
        .hidden(false)
        .parents(true);

    // Explicitly add .gitignore if it exists (needed for test environments
    // where WalkBuilder may not automatically discover it)
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        let _ = builder.add_ignore(gitignore_path);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_discover_basic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        File::create(root.join("8f3e1a2b9c4d_create_accounts.py")).unwrap();
        File::create(root.join("a1b2c3d4e5f6_add_email.py")).unwrap();

        let files = discover_migration_scripts(root);

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.is_absolute()));
        assert!(files.iter().any(|p| p.ends_with("8f3e1a2b9c4d_create_accounts.py")));
        assert!(files.iter().any(|p| p.ends_with("a1b2c3d4e5f6_add_email.py")));
    }

    #[test]
    fn test_respect_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let mut gitignore = File::create(root.join(".gitignore")).unwrap();
        gitignore.write_all(b"__pycache__/\n*.pyc\n").unwrap();

        fs::create_dir_all(root.join("__pycache__")).unwrap();
        File::create(root.join("__pycache__/cached.py")).unwrap();
        File::create(root.join("0c9d8e7f6a5b_add_orders.py")).unwrap();
        File::create(root.join("0c9d8e7f6a5b_add_orders.pyc")).unwrap();

        let files = discover_migration_scripts(root);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("0c9d8e7f6a5b_add_orders.py"));
        assert!(!files.iter().any(|p| p.to_string_lossy().contains("__pycache__")));
    }

    #[test]
    fn test_custom_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("versions")).unwrap();
        fs::create_dir_all(root.join("archive")).unwrap();
        File::create(root.join("versions/a1_one.py")).unwrap();
        File::create(root.join("archive/b2_two.py")).unwrap();
        File::create(root.join("env.py")).unwrap();

        // Only discover the live versions directory
        let files = discover_files(root, &["versions/**/*.py"]);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("versions/a1_one.py"));
    }

    #[test]
    fn test_missing_root_yields_empty() {
        let files = discover_migration_scripts(Path::new("/no/such/versions/dir"));
        assert!(files.is_empty());
    }

    #[test]
    fn test_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("versions/archived")).unwrap();
        File::create(root.join("versions/a1_one.py")).unwrap();
        File::create(root.join("versions/archived/b2_two.py")).unwrap();

        let files = discover_migration_scripts(root);

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.is_absolute()));
    }
}
