use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::ignore::FileIgnore;
use crate::matcher::{filter_dependency_source_files, Matcher};

/// Directories never descended into.
const SKIPPED_DIRS: [&str; 1] = [".git"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d)
}

/// Walk `root` and return the files the matchers recognize as dependency
/// sources. Ignored directories are pruned without being entered.
pub fn collect_candidates(root: &Path, ignore: &FileIgnore, matchers: &[Matcher]) -> BTreeSet<PathBuf> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            !is_skipped_dir(e) && (e.depth() == 0 || ignore.survives(e.path(), e.file_type().is_dir()))
        })
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .collect();

    let kept = ignore.filter_paths(files).kept;
    let candidates = filter_dependency_source_files(&kept, root, matchers);
    debug!(
        "{} dependency source files among {} files under {}",
        candidates.len(),
        kept.len(),
        root.display()
    );
    candidates
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::ignore::IGNORE_FILE_NAME;
    use crate::matcher::default_matchers;
    use crate::models::{Ecosystem, Transitivity};
    use crate::resolve::{ResolveOptions, Resolver};

    const PACKAGE_LOCK: &str = r#"{
  "name": "app",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "app", "dependencies": { "left-pad": "^1.3.0" } },
    "node_modules/left-pad": { "version": "1.3.0" }
  }
}"#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "package.json", r#"{ "dependencies": { "left-pad": "^1.3.0" } }"#);
        write(root, "package-lock.json", PACKAGE_LOCK);
        write(root, "node_modules/left-pad/package.json", r#"{ "name": "left-pad" }"#);
        write(root, "node_modules/left-pad/package-lock.json", PACKAGE_LOCK);
        write(root, ".git/package-lock.json", PACKAGE_LOCK);
        write(root, "src/index.js", "");
        write(root, "requirements.txt", "requests==2.31.0\n");
        dir
    }

    #[test]
    fn test_collect_candidates_prunes_ignored_directories() {
        let dir = project();
        let root = dir.path();
        write(root, IGNORE_FILE_NAME, "node_modules/\n");
        let ignore = FileIgnore::from_file(root, &root.join(IGNORE_FILE_NAME), 0).unwrap();

        let candidates = collect_candidates(root, &ignore, &default_matchers());
        let names: Vec<_> = candidates
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("package-lock.json"),
                PathBuf::from("package.json"),
                PathBuf::from("requirements.txt")
            ]
        );
    }

    #[test]
    fn test_without_ignore_rules_nested_packages_are_found() {
        let dir = project();
        let root = dir.path();
        let ignore = FileIgnore::from_file(root, &root.join(IGNORE_FILE_NAME), 0).unwrap();
        let candidates = collect_candidates(root, &ignore, &default_matchers());
        assert_eq!(candidates.len(), 5);
        assert!(candidates.iter().all(|p| !p.starts_with(root.join(".git"))));
    }

    #[test]
    fn test_end_to_end_npm_and_pip_subprojects() {
        let dir = project();
        let root = dir.path();
        write(root, IGNORE_FILE_NAME, "node_modules/\n");
        let ignore = FileIgnore::from_file(root, &root.join(IGNORE_FILE_NAME), 0).unwrap();
        let matchers = default_matchers();

        let candidates = collect_candidates(root, &ignore, &matchers);
        let outcome = Resolver::new(Default::default(), ResolveOptions::default())
            .resolve_subprojects(candidates, root, &matchers);

        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.resolved_count(), 2);
        let npm = &outcome.resolved[&Ecosystem::Npm];
        assert_eq!(npm.len(), 1);
        let subproject = &npm[0];
        assert_eq!(subproject.root_dir(), root);
        let deps: Vec<_> = subproject.found_dependencies.iter().collect();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].package, "left-pad");
        assert_eq!(deps[0].transitivity, Transitivity::Direct);

        let pip = &outcome.resolved[&Ecosystem::Pypi];
        assert_eq!(pip.len(), 1);
        assert_eq!(pip[0].root_dir(), root);
        let deps: Vec<_> = pip[0].found_dependencies.iter().collect();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].package, "requests");
        assert_eq!(deps[0].version, "2.31.0");

        assert_eq!(
            outcome.dependency_targets,
            vec![root.join("requirements.txt"), root.join("package-lock.json")]
        );
    }
}
