use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::models::{Lockfile, LockfileKind, Manifest, ManifestKind};
use crate::subproject::{DependencySource, Subproject};

use super::{file_name_is, file_name_matches, parent_dir};

/// Lockfile recognized by exact file name, manifest (if any) by exact file
/// name in the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactPairMatcher {
    pub lockfile_name: &'static str,
    pub manifest_name: Option<&'static str>,
    pub lockfile_kind: LockfileKind,
    pub manifest_kind: ManifestKind,
}

impl ExactPairMatcher {
    pub fn is_match(&self, path: &Path) -> bool {
        self.is_lockfile(path) || self.manifest_name.is_some_and(|name| file_name_is(path, name))
    }

    fn is_lockfile(&self, path: &Path) -> bool {
        file_name_is(path, self.lockfile_name)
    }

    pub fn make_subprojects(
        &self,
        candidates: &BTreeSet<PathBuf>,
    ) -> (Vec<Subproject>, BTreeSet<PathBuf>) {
        make_pairs(
            candidates,
            |p| self.is_lockfile(p),
            self.manifest_name,
            self.lockfile_kind,
            self.manifest_kind,
        )
    }
}

/// Lockfile recognized by a glob over its file name, manifest by exact file
/// name next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternPairMatcher {
    pub lockfile_pattern: &'static str,
    pub manifest_name: &'static str,
    pub lockfile_kind: LockfileKind,
    pub manifest_kind: ManifestKind,
}

impl PatternPairMatcher {
    pub fn is_match(&self, path: &Path) -> bool {
        self.is_lockfile(path) || file_name_is(path, self.manifest_name)
    }

    fn is_lockfile(&self, path: &Path) -> bool {
        file_name_matches(path, self.lockfile_pattern)
    }

    pub fn make_subprojects(
        &self,
        candidates: &BTreeSet<PathBuf>,
    ) -> (Vec<Subproject>, BTreeSet<PathBuf>) {
        make_pairs(
            candidates,
            |p| self.is_lockfile(p),
            Some(self.manifest_name),
            self.lockfile_kind,
            self.manifest_kind,
        )
    }
}

/// A lone manifest. Registered after the pair matchers of its ecosystem so a
/// manifest with a lockfile is never picked up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOnlyMatcher {
    pub manifest_name: &'static str,
    pub manifest_kind: ManifestKind,
}

impl ManifestOnlyMatcher {
    pub fn is_match(&self, path: &Path) -> bool {
        file_name_is(path, self.manifest_name)
    }

    pub fn make_subprojects(
        &self,
        candidates: &BTreeSet<PathBuf>,
    ) -> (Vec<Subproject>, BTreeSet<PathBuf>) {
        let manifests: BTreeSet<PathBuf> = candidates
            .iter()
            .filter(|p| self.is_match(p))
            .cloned()
            .collect();
        let subprojects = manifests
            .iter()
            .map(|path| {
                Subproject::new(
                    parent_dir(path),
                    DependencySource::ManifestOnly(Manifest::new(self.manifest_kind, path)),
                )
            })
            .collect();
        (subprojects, manifests)
    }
}

/// One subproject per lockfile, paired with `lockfile_dir/manifest_name` when
/// that file is a candidate. Unpaired manifests are left unconsumed.
fn make_pairs<F>(
    candidates: &BTreeSet<PathBuf>,
    is_lockfile: F,
    manifest_name: Option<&str>,
    lockfile_kind: LockfileKind,
    manifest_kind: ManifestKind,
) -> (Vec<Subproject>, BTreeSet<PathBuf>)
where
    F: Fn(&Path) -> bool,
{
    let mut subprojects = Vec::new();
    let mut consumed = BTreeSet::new();

    for lockfile_path in candidates.iter().filter(|p| is_lockfile(p.as_path())) {
        let manifest_path = manifest_name
            .map(|name| parent_dir(lockfile_path).join(name))
            .filter(|path| candidates.contains(path));

        let root_dir = parent_dir(manifest_path.as_deref().unwrap_or(lockfile_path));
        let lockfile = Lockfile::new(lockfile_kind, lockfile_path);
        let manifest = manifest_path.map(|path| {
            consumed.insert(path.clone());
            Manifest::new(manifest_kind, path)
        });

        consumed.insert(lockfile_path.clone());
        subprojects.push(Subproject::new(
            root_dir,
            DependencySource::from_pair(manifest, lockfile),
        ));
    }
    (subprojects, consumed)
}
