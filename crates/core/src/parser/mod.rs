//! Parser module for extracting revision declarations from migration scripts
//!
//! [`revision`] owns the per-script extraction; this module owns the scan
//! orchestration that turns a directory (or an explicit file list) into the
//! node sequence the graph engine consumes.
//!
//! # Scan semantics
//!
//! - Paths are sorted before parsing, so the resulting node sequence — and
//!   therefore the built graph — is deterministic for a given file set.
//! - Scripts that cannot be read are logged and skipped; scripts that carry
//!   no revision declaration are skipped silently. A scan never aborts on a
//!   single bad file.
//! - The full node sequence is materialized before any graph is built, so
//!   the engine never observes a partially scanned set.
//!
//! # Example
//! ```no_run
//! use revgraph_core::{parser, RevisionGraph};
//!
//! let revisions = parser::scan_directory(std::path::Path::new("migrations/versions"));
//! let graph = RevisionGraph::build(revisions);
//! println!("{}", graph.summary());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::discovery;
use crate::graph::Revision;

pub mod revision;

pub use revision::parse_script;

/// Parse a sequence of already-loaded `(text, source)` blobs.
///
/// Blobs without a revision declaration yield no node. Order is preserved;
/// callers that need determinism across filesystem enumeration order should
/// sort first (as [`scan_files`] does).
pub fn parse_scripts<'a, I>(blobs: I) -> Vec<Revision>
where
    I: IntoIterator<Item = (&'a str, &'a Path)>,
{
    blobs
        .into_iter()
        .filter_map(|(text, source)| parse_script(text, source))
        .collect()
}

/// Read and parse the given script files.
///
/// Paths are sorted for a deterministic node sequence. Unreadable files are
/// logged and skipped rather than failing the scan.
pub fn scan_files(paths: &[PathBuf]) -> Vec<Revision> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut revisions = Vec::new();
    for path in sorted {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable script");
                continue;
            }
        };
        if let Some(parsed) = parse_script(&text, path) {
            revisions.push(parsed);
        }
    }
    debug!(scripts = paths.len(), revisions = revisions.len(), "scanned migration scripts");
    revisions
}

/// Discover and parse every migration script under a versions directory.
pub fn scan_directory(root: &Path) -> Vec<Revision> {
    let files = discovery::discover_migration_scripts(root);
    scan_files(&files)
}
