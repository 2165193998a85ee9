//! Turning subprojects into dependency graphs.
//!
//! - [`registry`] — which parser and ecosystem belong to each lockfile kind.
//! - [`dynamic`] — resolution through an external resolver command.
//! - [`Resolver`] — picks a strategy per dependency source and aggregates
//!   the results of a whole project.

pub mod dynamic;
pub mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::matcher::{find_subprojects, Matcher};
use crate::models::{
    DependencyResolutionError, Ecosystem, FoundDependency, Manifest, ManifestKind,
    ResolutionError, ResolutionMethod,
};
use crate::subproject::{
    DependencySource, LockfileSource, ResolvedSubproject, Subproject, UnresolvedSubproject,
};
pub use dynamic::{CommandResolver, DynamicResolver, ResolutionResult};
pub use registry::{ParserEntry, ParserRegistry};

/// Manifests for which a dynamically built graph beats the lockfile.
pub const DEPENDENCY_GRAPH_SUPPORTED_MANIFEST_KINDS: [ManifestKind; 2] =
    [ManifestKind::PomXml, ManifestKind::BuildGradle];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub enable_dynamic_resolution: bool,
    pub prioritize_dependency_graph_generation: bool,
}

/// Dependencies obtained for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInfo {
    pub ecosystem: Ecosystem,
    pub method: ResolutionMethod,
    pub dependencies: Vec<FoundDependency>,
}

/// Outcome of resolving one dependency source. Errors may accompany a
/// result; `targets` are the files the dependencies were read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceResolution {
    pub resolved: Option<ResolvedInfo>,
    pub errors: Vec<ResolutionError>,
    pub targets: Vec<PathBuf>,
}

/// Everything a project resolves to.
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub unresolved: Vec<UnresolvedSubproject>,
    pub resolved: BTreeMap<Ecosystem, Vec<ResolvedSubproject>>,
    /// Every file dependencies were read from, in resolution order.
    pub dependency_targets: Vec<PathBuf>,
}

impl ResolutionOutcome {
    pub fn resolved_count(&self) -> usize {
        self.resolved.values().map(Vec::len).sum()
    }

    pub fn all_resolved(&self) -> impl Iterator<Item = &ResolvedSubproject> {
        self.resolved.values().flatten()
    }
}

pub struct Resolver {
    registry: ParserRegistry,
    options: ResolveOptions,
    dynamic: Option<Box<dyn DynamicResolver>>,
}

impl Resolver {
    pub fn new(registry: ParserRegistry, options: ResolveOptions) -> Self {
        Self {
            registry,
            options,
            dynamic: None,
        }
    }

    pub fn with_dynamic_resolver(mut self, resolver: Box<dyn DynamicResolver>) -> Self {
        self.dynamic = Some(resolver);
        self
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Resolve one dependency source. Never fails: problems end up in the
    /// returned error list, or as a missing result.
    pub fn resolve_dependency_source(&self, source: &DependencySource) -> SourceResolution {
        match source {
            DependencySource::LockfileOnly(_) | DependencySource::ManifestAndLockfile(..) => {
                match source.as_lockfile_source() {
                    Some(lockfile_source) => self.handle_lockfile_source(source, &lockfile_source),
                    None => SourceResolution::default(),
                }
            }
            DependencySource::ManifestOnly(manifest) => self.handle_manifest_only(source, manifest),
            DependencySource::MultiLockfile(sources) => self.handle_multi_lockfile(sources),
        }
    }

    fn handle_lockfile_source(
        &self,
        source: &DependencySource,
        lockfile_source: &LockfileSource,
    ) -> SourceResolution {
        let lockfile = &lockfile_source.lockfile;
        let manifest = lockfile_source.manifest.as_ref();

        if let Some(manifest) = manifest {
            if self.options.enable_dynamic_resolution
                && self.options.prioritize_dependency_graph_generation
                && DEPENDENCY_GRAPH_SUPPORTED_MANIFEST_KINDS.contains(&manifest.kind)
            {
                let dynamic = self.dynamic_resolve(manifest, source);
                if dynamic.resolved.is_some() {
                    return dynamic;
                }
                debug!(
                    "Dynamic resolution of {} failed, falling back to {}",
                    manifest.path.display(),
                    lockfile.path.display()
                );
            }
        }

        let Some((parser, ecosystem)) = self.registry.lookup(lockfile.kind) else {
            debug!("No parser for {} ({})", lockfile.path.display(), lockfile.kind);
            return SourceResolution::default();
        };

        let (dependencies, errors) = parser(&lockfile.path, manifest.map(|m| m.path.as_path()));
        SourceResolution {
            resolved: Some(ResolvedInfo {
                ecosystem,
                method: ResolutionMethod::LockfileParsing,
                dependencies,
            }),
            errors: errors.into_iter().map(ResolutionError::from).collect(),
            targets: vec![lockfile.path.clone()],
        }
    }

    fn handle_manifest_only(&self, source: &DependencySource, manifest: &Manifest) -> SourceResolution {
        if !self.options.enable_dynamic_resolution {
            debug!("Skipping {}: dynamic resolution disabled", manifest.path.display());
            return SourceResolution::default();
        }
        self.dynamic_resolve(manifest, source)
    }

    fn handle_multi_lockfile(&self, sources: &[LockfileSource]) -> SourceResolution {
        let mut merged = SourceResolution::default();
        let mut ecosystem = None;
        let mut method = ResolutionMethod::LockfileParsing;
        let mut dependencies = Vec::new();

        for nested in sources {
            let result = self.resolve_dependency_source(&nested.to_source());
            if let Some(info) = result.resolved {
                ecosystem = Some(info.ecosystem);
                if info.method == ResolutionMethod::Dynamic {
                    method = ResolutionMethod::Dynamic;
                }
                dependencies.extend(info.dependencies);
            }
            merged.errors.extend(result.errors);
            merged.targets.extend(result.targets);
        }

        merged.resolved = ecosystem.map(|ecosystem| ResolvedInfo {
            ecosystem,
            method,
            dependencies,
        });
        merged
    }

    /// Ask the dynamic resolver about exactly one source.
    fn dynamic_resolve(&self, manifest: &Manifest, source: &DependencySource) -> SourceResolution {
        let Some(resolver) = self.dynamic.as_deref() else {
            debug!("No dynamic resolver configured for {}", manifest.path.display());
            return SourceResolution::default();
        };
        let Some(mut responses) = resolver.resolve_dependencies(std::slice::from_ref(source)) else {
            return SourceResolution::default();
        };
        if responses.len() > 1 {
            warn!(
                "Dynamic resolver returned {} results for {}, using the first",
                responses.len(),
                manifest.path.display()
            );
        }
        if responses.is_empty() {
            return SourceResolution::default();
        }
        let (_, result) = responses.swap_remove(0);

        let wrap = |kinds: Vec<_>| -> Vec<ResolutionError> {
            kinds
                .into_iter()
                .map(|kind| {
                    ResolutionError::from(DependencyResolutionError {
                        kind,
                        source_file: manifest.path.clone(),
                    })
                })
                .collect()
        };

        match result {
            ResolutionResult::Ok {
                dependencies,
                errors,
            } => match manifest.kind.ecosystem() {
                Some(ecosystem) => SourceResolution {
                    resolved: Some(ResolvedInfo {
                        ecosystem,
                        method: ResolutionMethod::Dynamic,
                        dependencies,
                    }),
                    errors: wrap(errors),
                    targets: vec![manifest.path.clone()],
                },
                None => {
                    warn!("{} has no ecosystem, dropping resolved dependencies", manifest.kind);
                    SourceResolution {
                        errors: wrap(errors),
                        ..SourceResolution::default()
                    }
                }
            },
            ResolutionResult::Error(errors) => SourceResolution {
                errors: wrap(errors),
                ..SourceResolution::default()
            },
        }
    }

    /// Discover the subprojects among `files` found below `root` and resolve
    /// each of them.
    pub fn resolve_subprojects(
        &self,
        files: BTreeSet<PathBuf>,
        root: &Path,
        matchers: &[Matcher],
    ) -> ResolutionOutcome {
        self.resolve_all(find_subprojects(files, root, matchers), |_| {})
    }

    /// Resolve already discovered subprojects, calling `on_subproject` before
    /// each one.
    pub fn resolve_all<F>(&self, subprojects: Vec<Subproject>, mut on_subproject: F) -> ResolutionOutcome
    where
        F: FnMut(&Subproject),
    {
        let mut outcome = ResolutionOutcome::default();

        for subproject in subprojects {
            on_subproject(&subproject);
            let result = self.resolve_dependency_source(&subproject.dependency_source);
            outcome.dependency_targets.extend(result.targets);

            match result.resolved {
                Some(info) => {
                    info!(
                        "Resolved {} ({}, {}): {} dependencies",
                        subproject.root_dir.display(),
                        info.ecosystem,
                        info.method,
                        info.dependencies.len()
                    );
                    let resolved = ResolvedSubproject::from_unresolved(
                        subproject,
                        info.method,
                        result.errors,
                        info.dependencies,
                        info.ecosystem,
                    );
                    outcome.resolved.entry(info.ecosystem).or_default().push(resolved);
                }
                None => {
                    debug!("Could not resolve {}", subproject.root_dir.display());
                    outcome
                        .unresolved
                        .push(UnresolvedSubproject::from_subproject(subproject, result.errors));
                }
            }
        }

        outcome
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ParserRegistry::default(), ResolveOptions::default())
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("dynamic", &self.dynamic.is_some())
            .finish()
    }
}
