//! Classification of dependency source files into subprojects.
//!
//! Matchers run in a fixed order over the candidate set; a file consumed by
//! one matcher is never offered to a later one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::models::{LockfileKind, ManifestKind};
use crate::subproject::Subproject;

pub mod gradle;
pub mod pair;
pub mod pip;

pub use gradle::GradleMatcher;
pub use pair::{ExactPairMatcher, ManifestOnlyMatcher, PatternPairMatcher};
pub use pip::PipRequirementsMatcher;

/// fnmatch semantics: `*` also matches `/`.
const FNMATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    ExactPair(ExactPairMatcher),
    PatternPair(PatternPairMatcher),
    ManifestOnly(ManifestOnlyMatcher),
    PipRequirements(PipRequirementsMatcher),
    Gradle(GradleMatcher),
}

impl Matcher {
    /// Whether `path`, found below the scan `root`, is a file this matcher
    /// cares about.
    pub fn is_match(&self, path: &Path, root: &Path) -> bool {
        match self {
            Matcher::ExactPair(m) => m.is_match(path),
            Matcher::PatternPair(m) => m.is_match(path),
            Matcher::ManifestOnly(m) => m.is_match(path),
            Matcher::PipRequirements(m) => m.is_match(path, root),
            Matcher::Gradle(m) => m.is_match(path),
        }
    }

    /// Build as many subprojects as possible from `candidates`, returning them
    /// with the files they consumed.
    pub fn make_subprojects(
        &self,
        candidates: &BTreeSet<PathBuf>,
        root: &Path,
    ) -> (Vec<Subproject>, BTreeSet<PathBuf>) {
        match self {
            Matcher::ExactPair(m) => m.make_subprojects(candidates),
            Matcher::PatternPair(m) => m.make_subprojects(candidates),
            Matcher::ManifestOnly(m) => m.make_subprojects(candidates),
            Matcher::PipRequirements(m) => m.make_subprojects(candidates, root),
            Matcher::Gradle(m) => m.make_subprojects(candidates),
        }
    }
}

fn exact(
    lockfile_name: &'static str,
    manifest_name: &'static str,
    lockfile_kind: LockfileKind,
    manifest_kind: ManifestKind,
) -> Matcher {
    Matcher::ExactPair(ExactPairMatcher {
        lockfile_name,
        manifest_name: Some(manifest_name),
        lockfile_kind,
        manifest_kind,
    })
}

/// The matcher registry, in priority order.
pub fn default_matchers() -> Vec<Matcher> {
    use LockfileKind as L;
    use ManifestKind as M;

    vec![
        Matcher::PipRequirements(PipRequirementsMatcher::default()),
        exact("package-lock.json", "package.json", L::NpmPackageLockJson, M::PackageJson),
        exact("yarn.lock", "package.json", L::YarnLock, M::PackageJson),
        exact("pnpm-lock.yaml", "package.json", L::PnpmLock, M::PackageJson),
        exact("Gemfile.lock", "Gemfile", L::GemfileLock, M::Gemfile),
        exact("go.mod", "go.mod", L::GoMod, M::GoMod),
        exact("Cargo.lock", "Cargo.toml", L::CargoLock, M::CargoToml),
        exact("maven_dep_tree.txt", "pom.xml", L::MavenDepTree, M::PomXml),
        Matcher::ManifestOnly(ManifestOnlyMatcher {
            manifest_name: "pom.xml",
            manifest_kind: M::PomXml,
        }),
        Matcher::Gradle(GradleMatcher),
        exact("composer.lock", "composer.json", L::ComposerLock, M::ComposerJson),
        exact(
            "packages.lock.json",
            "nuget.manifest.json",
            L::NugetPackagesLockJson,
            M::NugetManifestJson,
        ),
        exact("pubspec.lock", "pubspec.yaml", L::PubspecLock, M::PubspecYaml),
        exact("Package.resolved", "Package.swift", L::SwiftPackageResolved, M::PackageSwift),
        exact("mix.lock", "mix.exs", L::MixLock, M::MixExs),
        exact("Pipfile.lock", "Pipfile", L::PipfileLock, M::Pipfile),
        exact("poetry.lock", "pyproject.toml", L::PoetryLock, M::PyprojectToml),
        exact("uv.lock", "pyproject.toml", L::UvLock, M::PyprojectToml),
        Matcher::PatternPair(PatternPairMatcher {
            lockfile_pattern: "*conan*.lock",
            manifest_name: "conanfile.txt",
            lockfile_kind: L::ConanLock,
            manifest_kind: M::ConanfileTxt,
        }),
    ]
}

/// The candidates below `root` that any matcher recognizes.
pub fn filter_dependency_source_files<'a, I>(
    candidates: I,
    root: &Path,
    matchers: &[Matcher],
) -> BTreeSet<PathBuf>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    candidates
        .into_iter()
        .filter(|path| matchers.iter().any(|m| m.is_match(path, root)))
        .cloned()
        .collect()
}

/// Fold the matchers over the candidate set, each one seeing only the files
/// not consumed by the matchers before it.
pub fn find_subprojects(
    dependency_source_files: BTreeSet<PathBuf>,
    root: &Path,
    matchers: &[Matcher],
) -> Vec<Subproject> {
    let (subprojects, leftover) = matchers.iter().fold(
        (Vec::new(), dependency_source_files),
        |(mut found, remaining), matcher| {
            let (subprojects, consumed) = matcher.make_subprojects(&remaining, root);
            found.extend(subprojects);
            let remaining = remaining.difference(&consumed).cloned().collect();
            (found, remaining)
        },
    );
    if !leftover.is_empty() {
        debug!("{} dependency source files not used by any matcher", leftover.len());
    }
    subprojects
}

pub(crate) fn file_name_is(path: &Path, name: &str) -> bool {
    path.file_name().is_some_and(|n| n == name)
}

pub(crate) fn fnmatch(path: &Path, pattern: &str) -> bool {
    Pattern::new(pattern).is_ok_and(|p| p.matches_with(&path.to_string_lossy(), FNMATCH_OPTIONS))
}

pub(crate) fn file_name_matches(path: &Path, pattern: &str) -> bool {
    path.file_name().is_some_and(|name| fnmatch(Path::new(name), pattern))
}

/// `path` below the scan root. Paths outside it are returned whole.
pub(crate) fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subproject::DependencySource;

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_filter_dependency_source_files() {
        let files = set(&[
            "/r/package.json",
            "/r/src/index.js",
            "/r/Cargo.lock",
            "/r/README.md",
            "/r/requirements-dev.txt",
        ]);
        let kept = filter_dependency_source_files(&files, Path::new("/r"), &default_matchers());
        assert_eq!(
            kept,
            set(&["/r/Cargo.lock", "/r/package.json", "/r/requirements-dev.txt"])
        );
    }

    #[test]
    fn test_checkout_location_does_not_affect_matching() {
        let root = Path::new("/home/u/requirements-tracker/app");
        let files = set(&[
            "/home/u/requirements-tracker/app/LICENSE.txt",
            "/home/u/requirements-tracker/app/CMakeLists.txt",
            "/home/u/requirements-tracker/app/docs/notes.txt",
            "/home/u/requirements-tracker/app/Cargo.lock",
        ]);
        let kept = filter_dependency_source_files(&files, root, &default_matchers());
        assert_eq!(kept, set(&["/home/u/requirements-tracker/app/Cargo.lock"]));

        let subprojects = find_subprojects(files, root, &default_matchers());
        assert_eq!(subprojects.len(), 1);
        assert_eq!(subprojects[0].root_dir, root);
    }

    #[test]
    fn test_each_file_is_used_by_one_subproject_at_most() {
        // package.json pairs with package-lock.json; yarn.lock then only
        // sees the unconsumed files and stays lockfile-only.
        let files = set(&[
            "/r/package-lock.json",
            "/r/yarn.lock",
            "/r/package.json",
            "/r/Gemfile.lock",
        ]);
        let subprojects = find_subprojects(files, Path::new("/r"), &default_matchers());
        assert_eq!(subprojects.len(), 3);

        let mut seen = BTreeSet::new();
        for subproject in &subprojects {
            for file in subproject.dependency_source.source_files() {
                assert!(seen.insert(file.path), "file used twice");
            }
        }
        assert!(matches!(
            subprojects[1].dependency_source,
            DependencySource::LockfileOnly(_)
        ));
    }

    #[test]
    fn test_root_is_manifest_dir_or_lockfile_dir() {
        let files = set(&[
            "/proj/Cargo.toml",
            "/proj/Cargo.lock",
            "/proj/tools/Pipfile.lock",
        ]);
        let subprojects = find_subprojects(files, Path::new("/proj"), &default_matchers());
        let roots: BTreeSet<PathBuf> = subprojects.iter().map(|s| s.root_dir.clone()).collect();
        assert_eq!(roots, set(&["/proj", "/proj/tools"]));
    }

    #[test]
    fn test_go_mod_is_lockfile_and_manifest() {
        let subprojects = find_subprojects(set(&["/svc/go.mod"]), Path::new("/svc"), &default_matchers());
        assert_eq!(subprojects.len(), 1);
        assert!(matches!(
            subprojects[0].dependency_source,
            DependencySource::ManifestAndLockfile(..)
        ));
    }

    #[test]
    fn test_pom_with_dep_tree_is_not_manifest_only() {
        let files = set(&["/m/pom.xml", "/m/maven_dep_tree.txt", "/n/pom.xml"]);
        let subprojects = find_subprojects(files, Path::new("/"), &default_matchers());
        assert_eq!(subprojects.len(), 2);
        assert!(matches!(
            subprojects[0].dependency_source,
            DependencySource::ManifestAndLockfile(..)
        ));
        assert!(matches!(
            subprojects[1].dependency_source,
            DependencySource::ManifestOnly(_)
        ));
    }
}
