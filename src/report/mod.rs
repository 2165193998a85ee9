//! Report renderers for resolution results.
//!
//! - [`terminal`] — colored summary and per-ecosystem tables; respects `--verbose`, `--quiet` and `--tree`.
//! - [`json`] — machine-readable dump of every subproject with its dependencies.

pub mod json;
pub mod terminal;

use std::path::Path;

/// `path` relative to the scanned project, `.` for the project itself.
pub(crate) fn relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}
