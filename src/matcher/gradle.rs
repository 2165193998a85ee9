use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::models::{Lockfile, LockfileKind, Manifest, ManifestKind};
use crate::subproject::{DependencySource, Subproject};

use super::{file_name_is, parent_dir};

const BUILD_FILENAMES: [&str; 2] = ["build.gradle", "build.gradle.kts"];
const SETTINGS_FILENAMES: [&str; 2] = ["settings.gradle", "settings.gradle.kts"];
const LOCKFILE_FILENAME: &str = "gradle.lockfile";

/// Gradle project roots, found from `gradle.lockfile`, `settings.gradle` or a
/// lone `build.gradle`.
///
/// A build file below an already recognized root is treated as a module of
/// that project. Roots must hold their lockfile/settings/build file directly;
/// `include` customisations of the project layout are not followed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradleMatcher;

fn is_build_file(path: &Path) -> bool {
    BUILD_FILENAMES.iter().any(|name| file_name_is(path, name))
}

fn is_settings_file(path: &Path) -> bool {
    SETTINGS_FILENAMES.iter().any(|name| file_name_is(path, name))
}

fn first_candidate(
    dir: &Path,
    names: &[&str],
    candidates: &BTreeSet<PathBuf>,
) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| candidates.contains(path))
}

impl GradleMatcher {
    pub fn is_match(&self, path: &Path) -> bool {
        is_build_file(path) || is_settings_file(path) || file_name_is(path, LOCKFILE_FILENAME)
    }

    pub fn make_subprojects(
        &self,
        candidates: &BTreeSet<PathBuf>,
    ) -> (Vec<Subproject>, BTreeSet<PathBuf>) {
        let mut subprojects = Vec::new();
        let mut roots: BTreeSet<PathBuf> = BTreeSet::new();
        let mut used_settings: BTreeSet<PathBuf> = BTreeSet::new();
        let mut used_build: BTreeSet<PathBuf> = BTreeSet::new();
        let mut lockfiles: BTreeSet<PathBuf> = BTreeSet::new();

        for lockfile_path in candidates.iter().filter(|p| file_name_is(p, LOCKFILE_FILENAME)) {
            let root = parent_dir(lockfile_path);
            let build = first_candidate(&root, &BUILD_FILENAMES, candidates);
            let settings = first_candidate(&root, &SETTINGS_FILENAMES, candidates);

            // build.gradle is the closer thing to a manifest; a settings file
            // paired with a lockfile is reported as a build file too.
            let manifest = build
                .clone()
                .or_else(|| settings.clone())
                .map(|path| Manifest::new(ManifestKind::BuildGradle, path));

            used_build.extend(build);
            used_settings.extend(settings);
            lockfiles.insert(lockfile_path.clone());
            roots.insert(root.clone());

            let lockfile = Lockfile::new(LockfileKind::GradleLockfile, lockfile_path);
            subprojects.push(Subproject::new(
                root,
                DependencySource::from_pair(manifest, lockfile),
            ));
        }

        // A settings file always marks the root of a (multi-project) build.
        for settings_path in candidates.iter().filter(|p| is_settings_file(p)) {
            if used_settings.contains(settings_path) {
                continue;
            }
            let root = parent_dir(settings_path);
            let manifest = match first_candidate(&root, &BUILD_FILENAMES, candidates) {
                Some(build) => {
                    used_build.insert(build.clone());
                    Manifest::new(ManifestKind::BuildGradle, build)
                }
                None => Manifest::new(ManifestKind::SettingsGradle, settings_path),
            };
            used_settings.insert(settings_path.clone());
            roots.insert(root.clone());
            subprojects.push(Subproject::new(root, DependencySource::ManifestOnly(manifest)));
        }

        // Shallow build files first, so nested modules see their parent root.
        let mut build_files: Vec<&PathBuf> =
            candidates.iter().filter(|p| is_build_file(p)).collect();
        build_files.sort_by_key(|p| p.components().count());

        for build_path in build_files {
            if used_build.contains(build_path) {
                continue;
            }
            if build_path.ancestors().skip(1).any(|dir| roots.contains(dir)) {
                continue;
            }
            let root = parent_dir(build_path);
            roots.insert(root.clone());
            used_build.insert(build_path.clone());
            subprojects.push(Subproject::new(
                root,
                DependencySource::ManifestOnly(Manifest::new(ManifestKind::BuildGradle, build_path)),
            ));
        }

        let consumed = lockfiles
            .into_iter()
            .chain(used_settings)
            .chain(used_build)
            .collect();
        (subprojects, consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_lockfile_prefers_build_file_as_manifest() {
        let candidates = set(&[
            "/g/gradle.lockfile",
            "/g/build.gradle",
            "/g/settings.gradle",
        ]);
        let (subprojects, consumed) = GradleMatcher.make_subprojects(&candidates);
        assert_eq!(subprojects.len(), 1);
        match &subprojects[0].dependency_source {
            DependencySource::ManifestAndLockfile(manifest, _) => {
                assert_eq!(manifest.path, PathBuf::from("/g/build.gradle"));
                assert_eq!(manifest.kind, ManifestKind::BuildGradle);
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(consumed, candidates);
    }

    #[test]
    fn test_settings_without_build_file() {
        let candidates = set(&["/g/settings.gradle.kts"]);
        let (subprojects, _) = GradleMatcher.make_subprojects(&candidates);
        assert_eq!(
            subprojects[0].dependency_source,
            DependencySource::ManifestOnly(Manifest::new(
                ManifestKind::SettingsGradle,
                "/g/settings.gradle.kts"
            ))
        );
    }

    #[test]
    fn test_nested_build_files_belong_to_enclosing_root() {
        let candidates = set(&[
            "/g/settings.gradle",
            "/g/app/build.gradle",
            "/g/lib/build.gradle.kts",
            "/other/build.gradle",
            "/other/sub/build.gradle",
        ]);
        let (subprojects, consumed) = GradleMatcher.make_subprojects(&candidates);

        let roots: Vec<PathBuf> = subprojects.iter().map(|s| s.root_dir.clone()).collect();
        assert_eq!(roots, vec![PathBuf::from("/g"), PathBuf::from("/other")]);
        assert!(!consumed.contains(Path::new("/g/app/build.gradle")));
        assert!(!consumed.contains(Path::new("/other/sub/build.gradle")));
        assert!(consumed.contains(Path::new("/other/build.gradle")));
    }
}
