use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use lockscan::models::{FoundDependency, ResolutionError};
use lockscan::resolve::ResolutionOutcome;
use lockscan::subproject::SubprojectStats;

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub project: &'a Path,
    pub subprojects: Vec<JsonSubproject<'a>>,
    pub dependency_targets: &'a [PathBuf],
}

#[derive(Debug, Serialize)]
pub struct JsonSubproject<'a> {
    pub root_dir: &'a Path,
    #[serde(flatten)]
    pub stats: SubprojectStats,
    pub errors: &'a [ResolutionError],
    pub dependencies: Vec<&'a FoundDependency>,
}

/// Resolved subprojects first, by ecosystem, then the unresolved ones.
pub fn build<'a>(outcome: &'a ResolutionOutcome, path: &'a Path) -> JsonReport<'a> {
    let resolved = outcome.all_resolved().map(|s| JsonSubproject {
        root_dir: s.root_dir(),
        stats: s.to_stats(),
        errors: &s.resolution_errors,
        dependencies: s.found_dependencies.iter().collect(),
    });
    let unresolved = outcome.unresolved.iter().map(|u| JsonSubproject {
        root_dir: &u.subproject.root_dir,
        stats: u.to_stats(),
        errors: &u.resolution_errors,
        dependencies: Vec::new(),
    });

    JsonReport {
        project: path,
        subprojects: resolved.chain(unresolved).collect(),
        dependency_targets: &outcome.dependency_targets,
    }
}

pub fn render(outcome: &ResolutionOutcome, path: &Path) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&build(outcome, path))?);
    Ok(())
}
