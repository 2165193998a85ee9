use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::models::{Lockfile, LockfileKind, Manifest, ManifestKind};
use crate::subproject::{DependencySource, LockfileSource, Subproject};

use super::{fnmatch, parent_dir, relative_to};

const REQUIREMENTS_DIR: &str = "requirements";

/// pip requirement files, possibly several per project and possibly kept in
/// a `requirements/` folder below the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipRequirementsMatcher {
    /// Glob for the file name without extension, matched over the path below
    /// the scan root.
    pub base_file_pattern: &'static str,
    pub requirements_file_extensions: &'static [&'static str],
    pub manifest_file_extension: &'static str,
    pub default_manifest_file_base: &'static str,
}

impl Default for PipRequirementsMatcher {
    fn default() -> Self {
        Self {
            base_file_pattern: "*requirement*",
            requirements_file_extensions: &["txt", "pip"],
            manifest_file_extension: "in",
            default_manifest_file_base: "requirements",
        }
    }
}

impl PipRequirementsMatcher {
    pub fn is_match(&self, path: &Path, root: &Path) -> bool {
        self.is_requirements(path, root) || self.is_manifest(path, root)
    }

    fn is_requirements(&self, path: &Path, root: &Path) -> bool {
        let rel = relative_to(path, root);
        self.requirements_file_extensions
            .iter()
            .any(|ext| fnmatch(rel, &format!("{}.{}", self.base_file_pattern, ext)))
    }

    fn is_manifest(&self, path: &Path, root: &Path) -> bool {
        let rel = relative_to(path, root);
        fnmatch(
            rel,
            &format!("{}.{}", self.base_file_pattern, self.manifest_file_extension),
        ) || rel == Path::new(&self.default_manifest_name())
    }

    fn default_manifest_name(&self) -> String {
        format!(
            "{}.{}",
            self.default_manifest_file_base, self.manifest_file_extension
        )
    }

    /// `requirements/base.txt` belongs to the directory holding the
    /// `requirements` folder; anything else to its own directory. Only the
    /// part below the scan root is searched for the folder.
    fn requirements_root(&self, path: &Path, root: &Path) -> PathBuf {
        let rel = relative_to(path, root);
        let depth = rel.components().count();
        rel.components()
            .position(|c| c.as_os_str() == OsStr::new(REQUIREMENTS_DIR))
            .and_then(|idx| path.ancestors().nth(depth - idx))
            .map(Path::to_path_buf)
            .unwrap_or_else(|| parent_dir(path))
    }

    /// Same-stem manifest next to the requirements file first
    /// (`requirements-dev.txt` → `requirements-dev.in`), then the default
    /// manifest at the project root.
    fn manifest_for(
        &self,
        path: &Path,
        root: &Path,
        candidates: &BTreeSet<PathBuf>,
    ) -> Option<PathBuf> {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned())?;
        let sibling = path.with_file_name(format!("{}.{}", stem, self.manifest_file_extension));
        if candidates.contains(&sibling) {
            return Some(sibling);
        }
        let at_root = self.requirements_root(path, root).join(self.default_manifest_name());
        candidates.contains(&at_root).then_some(at_root)
    }

    pub fn make_subprojects(
        &self,
        candidates: &BTreeSet<PathBuf>,
        root: &Path,
    ) -> (Vec<Subproject>, BTreeSet<PathBuf>) {
        let mut consumed = BTreeSet::new();
        let mut by_root: BTreeMap<PathBuf, Vec<&PathBuf>> = BTreeMap::new();
        for path in candidates {
            if self.is_manifest(path, root) {
                consumed.insert(path.clone());
            }
            if self.is_requirements(path, root) {
                consumed.insert(path.clone());
                by_root.entry(self.requirements_root(path, root)).or_default().push(path);
            }
        }

        let subprojects = by_root
            .into_iter()
            .map(|(subproject_root, requirement_files)| {
                let mut sources: Vec<LockfileSource> = requirement_files
                    .into_iter()
                    .map(|path| {
                        let manifest = self
                            .manifest_for(path, root, candidates)
                            .map(|m| Manifest::new(ManifestKind::RequirementsIn, m));
                        LockfileSource::new(
                            Lockfile::new(LockfileKind::PipRequirementsTxt, path),
                            manifest,
                        )
                    })
                    .collect();

                let source = if sources.len() == 1 {
                    sources.remove(0).to_source()
                } else {
                    DependencySource::MultiLockfile(sources)
                };
                Subproject::new(subproject_root, source)
            })
            .collect();

        (subprojects, consumed)
    }
}
