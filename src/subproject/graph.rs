//! The resolved dependency graph of one subproject.
//!
//! Records are indexed by their `(package, version)` key. A key can hold
//! several records when the same package/version is declared in more than
//! one place of a lockfile; children refer to keys, never to records.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::models::{DependencyChild, FoundDependency, Transitivity};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDependencies {
    by_key: BTreeMap<DependencyChild, Vec<FoundDependency>>,
}

impl ResolvedDependencies {
    pub fn from_found_dependencies(found: Vec<FoundDependency>) -> Self {
        let mut by_key: BTreeMap<DependencyChild, Vec<FoundDependency>> = BTreeMap::new();
        for dep in found {
            by_key.entry(dep.key()).or_default().push(dep);
        }
        Self { by_key }
    }

    /// All records, grouped by key.
    pub fn iter(&self) -> impl Iterator<Item = &FoundDependency> {
        self.by_key.values().flatten()
    }

    pub fn get(&self, key: &DependencyChild) -> Option<&[FoundDependency]> {
        self.by_key.get(key).map(Vec::as_slice)
    }

    pub fn count(&self) -> usize {
        self.by_key.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Group records by the lockfile they came from. Records without a known
    /// lockfile are returned separately.
    pub fn by_lockfile_path(&self) -> (HashMap<PathBuf, Vec<&FoundDependency>>, Vec<&FoundDependency>) {
        let mut by_path: HashMap<PathBuf, Vec<&FoundDependency>> = HashMap::new();
        let mut unknown = Vec::new();
        for dep in self.iter() {
            match &dep.lockfile_path {
                Some(path) => by_path.entry(path.clone()).or_default().push(dep),
                None => unknown.push(dep),
            }
        }
        (by_path, unknown)
    }

    /// Depth-first walk from every direct dependency.
    ///
    /// Each direct dependency starts with a fresh visited set; a key seen
    /// again inside that walk is emitted once more as `already_shown` and not
    /// expanded. When a child key has several records the first one is used.
    pub fn tree(&self) -> DependencyTree<'_> {
        let mut tree = DependencyTree::default();
        let mut reached: HashSet<DependencyChild> = HashSet::new();

        for direct in self.iter().filter(|d| d.transitivity == Transitivity::Direct) {
            let mut visited = HashSet::new();
            self.walk(direct, 0, &mut visited, &mut tree.entries);
            reached.extend(visited);
        }

        for (key, deps) in &self.by_key {
            if reached.contains(key) {
                continue;
            }
            for dep in deps {
                match dep.transitivity {
                    Transitivity::Transitive => tree.other_transitive.push(dep),
                    Transitivity::Unknown => tree.other_unknown.push(dep),
                    Transitivity::Direct => {}
                }
            }
        }
        tree
    }

    fn walk<'a>(
        &'a self,
        dep: &'a FoundDependency,
        depth: usize,
        visited: &mut HashSet<DependencyChild>,
        out: &mut Vec<TreeEntry<'a>>,
    ) {
        let key = dep.key();
        if !visited.insert(key) {
            out.push(TreeEntry {
                dependency: dep,
                depth,
                already_shown: true,
            });
            return;
        }
        out.push(TreeEntry {
            dependency: dep,
            depth,
            already_shown: false,
        });

        for child in dep.children.iter().flatten() {
            match self.by_key.get(child).and_then(|deps| deps.first()) {
                Some(child_dep) => self.walk(child_dep, depth + 1, visited, out),
                None => debug!("Child {} of {} is not in the graph", child, dep.key()),
            }
        }
    }
}

/// One line of a [`DependencyTree`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeEntry<'a> {
    pub dependency: &'a FoundDependency,
    pub depth: usize,
    pub already_shown: bool,
}

/// Output of [`ResolvedDependencies::tree`].
#[derive(Debug, Default)]
pub struct DependencyTree<'a> {
    pub entries: Vec<TreeEntry<'a>>,
    pub other_transitive: Vec<&'a FoundDependency>,
    pub other_unknown: Vec<&'a FoundDependency>,
}

impl fmt::Display for DependencyTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Direct dependencies (plus children if available)")?;
        for entry in &self.entries {
            let indent = "  ".repeat(entry.depth);
            writeln!(f, "{}- {}", indent, entry.dependency.key())?;
            if entry.already_shown {
                writeln!(f, "{}   (previously shown)", indent)?;
            }
        }
        writeln!(f, "Other transitive dependencies:")?;
        for dep in &self.other_transitive {
            writeln!(f, "- {}", dep.key())?;
        }
        writeln!(f, "Other dependencies of unknown transitivity:")?;
        for dep in &self.other_unknown {
            writeln!(f, "- {}", dep.key())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ecosystem;
    use std::path::Path;

    fn dep(name: &str, version: &str, t: Transitivity) -> FoundDependency {
        FoundDependency::new(name, version, Ecosystem::Npm, t)
    }

    fn key(name: &str, version: &str) -> DependencyChild {
        DependencyChild::new(name, version)
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let graph = ResolvedDependencies::from_found_dependencies(vec![
            dep("a", "1", Transitivity::Direct).with_line(3),
            dep("a", "1", Transitivity::Direct).with_line(9),
            dep("b", "2", Transitivity::Transitive),
        ]);
        assert_eq!(graph.count(), 3);
        assert_eq!(graph.get(&key("a", "1")).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_group_by_lockfile_path() {
        let lock = Path::new("/repo/package-lock.json");
        let graph = ResolvedDependencies::from_found_dependencies(vec![
            dep("a", "1", Transitivity::Direct).with_lockfile(lock),
            dep("b", "1", Transitivity::Direct).with_lockfile(lock),
            dep("c", "1", Transitivity::Unknown),
        ]);
        let (by_path, unknown) = graph.by_lockfile_path();
        assert_eq!(by_path[lock].len(), 2);
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].package, "c");
    }

    #[test]
    fn test_cycle_is_walked_once() {
        let graph = ResolvedDependencies::from_found_dependencies(vec![
            dep("a", "1", Transitivity::Direct).with_children(vec![key("b", "1")]),
            dep("b", "1", Transitivity::Transitive).with_children(vec![key("a", "1")]),
        ]);
        let tree = graph.tree();

        let lines: Vec<(String, usize, bool)> = tree
            .entries
            .iter()
            .map(|e| (e.dependency.key().to_string(), e.depth, e.already_shown))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("a@1".to_string(), 0, false),
                ("b@1".to_string(), 1, false),
                ("a@1".to_string(), 2, true),
            ]
        );
        let expanded_a = tree
            .entries
            .iter()
            .filter(|e| e.dependency.package == "a" && !e.already_shown)
            .count();
        assert_eq!(expanded_a, 1);
        assert!(tree.other_transitive.is_empty());

        let rendered = tree.to_string();
        assert!(rendered.contains("(previously shown)"));
    }

    #[test]
    fn test_unreached_keys_are_partitioned() {
        let graph = ResolvedDependencies::from_found_dependencies(vec![
            dep("root", "1", Transitivity::Direct).with_children(vec![key("used", "1")]),
            dep("used", "1", Transitivity::Transitive),
            dep("orphan", "1", Transitivity::Transitive),
            dep("mystery", "0.1", Transitivity::Unknown),
        ]);
        let tree = graph.tree();
        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.other_transitive.len(), 1);
        assert_eq!(tree.other_transitive[0].package, "orphan");
        assert_eq!(tree.other_unknown.len(), 1);
        assert_eq!(tree.other_unknown[0].package, "mystery");
    }

    #[test]
    fn test_missing_child_is_skipped() {
        let graph = ResolvedDependencies::from_found_dependencies(vec![
            dep("a", "1", Transitivity::Direct).with_children(vec![key("ghost", "9")]),
        ]);
        let tree = graph.tree();
        assert_eq!(tree.entries.len(), 1);
    }
}
