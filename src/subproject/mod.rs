//! Subprojects before and after resolution.
//!
//! - [`DependencySource`] — the manifest/lockfile files backing a subproject.
//! - [`Subproject`] — a root directory plus its dependency source.
//! - [`ResolvedSubproject`] / [`UnresolvedSubproject`] — the outcome of resolving one.
//! - [`graph`] — the dependency graph attached to a resolved subproject.

pub mod graph;

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{
    Ecosystem, FoundDependency, Lockfile, LockfileKind, Manifest, ManifestKind, ResolutionError,
    ResolutionMethod,
};
pub use graph::{DependencyTree, ResolvedDependencies, TreeEntry};

/// A lockfile, optionally paired with the manifest next to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockfileSource {
    pub lockfile: Lockfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

impl LockfileSource {
    pub fn new(lockfile: Lockfile, manifest: Option<Manifest>) -> Self {
        Self { lockfile, manifest }
    }

    pub fn to_source(&self) -> DependencySource {
        match &self.manifest {
            Some(manifest) => {
                DependencySource::ManifestAndLockfile(manifest.clone(), self.lockfile.clone())
            }
            None => DependencySource::LockfileOnly(self.lockfile.clone()),
        }
    }
}

/// The files a subproject's dependencies are read from.
///
/// `MultiLockfile` is only built by matchers that aggregate several
/// lockfiles under one root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencySource {
    ManifestOnly(Manifest),
    LockfileOnly(Lockfile),
    ManifestAndLockfile(Manifest, Lockfile),
    MultiLockfile(Vec<LockfileSource>),
}

impl DependencySource {
    pub fn from_pair(manifest: Option<Manifest>, lockfile: Lockfile) -> Self {
        LockfileSource::new(lockfile, manifest).to_source()
    }

    /// The lockfile view of a single-lockfile source.
    pub fn as_lockfile_source(&self) -> Option<LockfileSource> {
        match self {
            DependencySource::LockfileOnly(lockfile) => {
                Some(LockfileSource::new(lockfile.clone(), None))
            }
            DependencySource::ManifestAndLockfile(manifest, lockfile) => Some(LockfileSource::new(
                lockfile.clone(),
                Some(manifest.clone()),
            )),
            _ => None,
        }
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        match self {
            DependencySource::ManifestOnly(manifest)
            | DependencySource::ManifestAndLockfile(manifest, _) => Some(manifest),
            _ => None,
        }
    }

    /// Paths identifying the source in reports. For a manifest/lockfile pair
    /// only the lockfile is shown.
    pub fn display_paths(&self) -> Vec<PathBuf> {
        match self {
            DependencySource::ManifestOnly(manifest) => vec![manifest.path.clone()],
            DependencySource::LockfileOnly(lockfile)
            | DependencySource::ManifestAndLockfile(_, lockfile) => vec![lockfile.path.clone()],
            DependencySource::MultiLockfile(sources) => sources
                .iter()
                .flat_map(|s| s.to_source().display_paths())
                .collect(),
        }
    }

    /// Every backing file with its kind, lockfile before manifest.
    pub fn source_files(&self) -> Vec<DependencySourceFile> {
        match self {
            DependencySource::ManifestOnly(manifest) => vec![DependencySourceFile::manifest(manifest)],
            DependencySource::LockfileOnly(lockfile) => vec![DependencySourceFile::lockfile(lockfile)],
            DependencySource::ManifestAndLockfile(manifest, lockfile) => vec![
                DependencySourceFile::lockfile(lockfile),
                DependencySourceFile::manifest(manifest),
            ],
            DependencySource::MultiLockfile(sources) => sources
                .iter()
                .flat_map(|s| s.to_source().source_files())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum DependencySourceFileKind {
    Manifest(ManifestKind),
    Lockfile(LockfileKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySourceFile {
    pub kind: DependencySourceFileKind,
    pub path: PathBuf,
}

impl DependencySourceFile {
    fn manifest(manifest: &Manifest) -> Self {
        Self {
            kind: DependencySourceFileKind::Manifest(manifest.kind),
            path: manifest.path.clone(),
        }
    }

    fn lockfile(lockfile: &Lockfile) -> Self {
        Self {
            kind: DependencySourceFileKind::Lockfile(lockfile.kind),
            path: lockfile.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyResolutionStats {
    pub ecosystem: Ecosystem,
    pub resolution_method: ResolutionMethod,
    pub dependency_count: usize,
}

/// Export view of a subproject, resolved or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubprojectStats {
    pub subproject_id: String,
    pub dependency_sources: Vec<DependencySourceFile>,
    pub resolved_stats: Option<DependencyResolutionStats>,
}

/// One unit of dependency analysis: a root directory and the files its
/// dependencies come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subproject {
    pub root_dir: PathBuf,
    pub dependency_source: DependencySource,
}

impl Subproject {
    pub fn new(root_dir: impl Into<PathBuf>, dependency_source: DependencySource) -> Self {
        Self {
            root_dir: root_dir.into(),
            dependency_source,
        }
    }

    /// Stable identifier: SHA-256 over the sorted, trimmed display paths.
    /// Two subprojects backed by the same files share an id.
    pub fn id(&self) -> String {
        let mut paths: Vec<String> = self
            .dependency_source
            .display_paths()
            .iter()
            .map(|p| p.to_string_lossy().trim().to_string())
            .collect();
        paths.sort();

        let mut hasher = Sha256::new();
        hasher.update(paths.concat().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn to_stats(&self) -> SubprojectStats {
        SubprojectStats {
            subproject_id: self.id(),
            dependency_sources: self.dependency_source.source_files(),
            resolved_stats: None,
        }
    }
}

/// A subproject whose resolution produced no result.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedSubproject {
    pub subproject: Subproject,
    pub resolution_errors: Vec<ResolutionError>,
}

impl UnresolvedSubproject {
    pub fn from_subproject(subproject: Subproject, resolution_errors: Vec<ResolutionError>) -> Self {
        Self {
            subproject,
            resolution_errors,
        }
    }

    pub fn to_stats(&self) -> SubprojectStats {
        self.subproject.to_stats()
    }
}

/// A subproject plus its dependency graph. `resolution_errors` may be
/// non-empty next to found dependencies when resolution partly failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubproject {
    pub subproject: Subproject,
    pub ecosystem: Ecosystem,
    pub resolution_method: ResolutionMethod,
    pub resolution_errors: Vec<ResolutionError>,
    pub found_dependencies: ResolvedDependencies,
}

impl ResolvedSubproject {
    pub fn from_unresolved(
        subproject: Subproject,
        resolution_method: ResolutionMethod,
        resolution_errors: Vec<ResolutionError>,
        found_dependencies: Vec<FoundDependency>,
        ecosystem: Ecosystem,
    ) -> Self {
        Self {
            subproject,
            ecosystem,
            resolution_method,
            resolution_errors,
            found_dependencies: ResolvedDependencies::from_found_dependencies(found_dependencies),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.subproject.root_dir
    }

    pub fn to_stats(&self) -> SubprojectStats {
        SubprojectStats {
            resolved_stats: Some(DependencyResolutionStats {
                ecosystem: self.ecosystem,
                resolution_method: self.resolution_method,
                dependency_count: self.found_dependencies.count(),
            }),
            ..self.subproject.to_stats()
        }
    }
}

/// Find the resolved subproject whose root is the deepest ancestor of `path`.
///
/// All `candidates` are expected to share `ecosystem`.
pub fn find_closest_subproject<'a>(
    path: &Path,
    ecosystem: Ecosystem,
    candidates: &'a [ResolvedSubproject],
) -> Option<&'a ResolvedSubproject> {
    let mut sorted: Vec<&ResolvedSubproject> = candidates.iter().collect();
    sorted.sort_by_key(|c| Reverse(c.root_dir().components().count()));

    sorted.into_iter().find(|candidate| {
        candidate.ecosystem == ecosystem && path.ancestors().any(|parent| candidate.root_dir() == parent)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npm_subproject(root: &str) -> ResolvedSubproject {
        let lockfile = Lockfile::new(
            LockfileKind::NpmPackageLockJson,
            format!("{}/package-lock.json", root),
        );
        ResolvedSubproject::from_unresolved(
            Subproject::new(root, DependencySource::LockfileOnly(lockfile)),
            ResolutionMethod::LockfileParsing,
            Vec::new(),
            Vec::new(),
            Ecosystem::Npm,
        )
    }

    #[test]
    fn test_closest_subproject_prefers_deepest_root() {
        let candidates = vec![npm_subproject("/repo"), npm_subproject("/repo/services/api")];
        let found = find_closest_subproject(
            Path::new("/repo/services/api/src/main"),
            Ecosystem::Npm,
            &candidates,
        )
        .unwrap();
        assert_eq!(found.root_dir(), Path::new("/repo/services/api"));

        let found =
            find_closest_subproject(Path::new("/repo/web/index.js"), Ecosystem::Npm, &candidates)
                .unwrap();
        assert_eq!(found.root_dir(), Path::new("/repo"));
    }

    #[test]
    fn test_closest_subproject_none_outside_roots() {
        let candidates = vec![npm_subproject("/repo")];
        assert!(find_closest_subproject(Path::new("/other/x"), Ecosystem::Npm, &candidates).is_none());
        assert!(find_closest_subproject(Path::new("/repo/x"), Ecosystem::Pypi, &candidates).is_none());
    }

    #[test]
    fn test_closest_subproject_does_not_match_sibling_prefix() {
        let candidates = vec![npm_subproject("/repo/app")];
        assert!(
            find_closest_subproject(Path::new("/repo/application/x"), Ecosystem::Npm, &candidates)
                .is_none()
        );
    }

    #[test]
    fn test_id_depends_only_on_backing_files() {
        let a = Lockfile::new(LockfileKind::PipRequirementsTxt, "/r/requirements.txt");
        let b = Lockfile::new(LockfileKind::PipRequirementsTxt, "/r/requirements-dev.txt");

        let forward = Subproject::new(
            "/r",
            DependencySource::MultiLockfile(vec![
                LockfileSource::new(a.clone(), None),
                LockfileSource::new(b.clone(), None),
            ]),
        );
        let backward = Subproject::new(
            "/elsewhere",
            DependencySource::MultiLockfile(vec![
                LockfileSource::new(b, None),
                LockfileSource::new(a, None),
            ]),
        );
        assert_eq!(forward.id(), backward.id());
        assert_eq!(forward.id().len(), 64);
    }

    #[test]
    fn test_pair_stats_list_lockfile_then_manifest() {
        let source = DependencySource::from_pair(
            Some(Manifest::new(ManifestKind::CargoToml, "/r/Cargo.toml")),
            Lockfile::new(LockfileKind::CargoLock, "/r/Cargo.lock"),
        );
        assert_eq!(source.display_paths(), vec![PathBuf::from("/r/Cargo.lock")]);

        let stats = Subproject::new("/r", source).to_stats();
        assert_eq!(stats.dependency_sources.len(), 2);
        assert_eq!(
            stats.dependency_sources[0].kind,
            DependencySourceFileKind::Lockfile(LockfileKind::CargoLock)
        );
        assert!(stats.resolved_stats.is_none());
    }

    #[test]
    fn test_resolved_stats_count_dependencies() {
        let mut resolved = npm_subproject("/repo");
        resolved.found_dependencies = ResolvedDependencies::from_found_dependencies(vec![
            FoundDependency::new("a", "1", Ecosystem::Npm, crate::models::Transitivity::Direct),
            FoundDependency::new("a", "1", Ecosystem::Npm, crate::models::Transitivity::Direct),
        ]);
        let stats = resolved.to_stats().resolved_stats.unwrap();
        assert_eq!(stats.dependency_count, 2);
        assert_eq!(stats.resolution_method, ResolutionMethod::LockfileParsing);
    }
}
