use std::collections::BTreeMap;
use std::fmt;

use crate::models::{Ecosystem, LockfileKind};
use crate::parsers::{self, LockfileParser};

/// What is known about one lockfile kind. A missing parser or ecosystem
/// means the format is recognized but cannot be resolved yet.
#[derive(Clone, Copy)]
pub struct ParserEntry {
    pub parser: Option<LockfileParser>,
    pub ecosystem: Option<Ecosystem>,
}

/// Lockfile kind → parser and ecosystem. A plain value, so callers can swap
/// entries before handing it to the resolver.
#[derive(Clone)]
pub struct ParserRegistry {
    entries: BTreeMap<LockfileKind, ParserEntry>,
}

impl ParserRegistry {
    /// A registry that knows no lockfile kinds.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register (or replace) the entry for `kind`.
    pub fn register(
        &mut self,
        kind: LockfileKind,
        parser: Option<LockfileParser>,
        ecosystem: Option<Ecosystem>,
    ) -> &mut Self {
        self.entries.insert(kind, ParserEntry { parser, ecosystem });
        self
    }

    pub fn entry(&self, kind: LockfileKind) -> Option<&ParserEntry> {
        self.entries.get(&kind)
    }

    /// Parser and ecosystem for `kind`, only when both are registered.
    pub fn lookup(&self, kind: LockfileKind) -> Option<(LockfileParser, Ecosystem)> {
        let entry = self.entries.get(&kind)?;
        Some((entry.parser?, entry.ecosystem?))
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        use Ecosystem as E;
        use LockfileKind as L;

        let mut registry = Self::empty();
        registry
            .register(L::PipfileLock, Some(parsers::python::parse_pipfile_lock), Some(E::Pypi))
            .register(L::PipRequirementsTxt, Some(parsers::python::parse_requirements), Some(E::Pypi))
            .register(L::PoetryLock, Some(parsers::python::parse_poetry_lock), Some(E::Pypi))
            .register(L::UvLock, None, Some(E::Pypi))
            .register(L::NpmPackageLockJson, Some(parsers::node::parse_package_lock), Some(E::Npm))
            .register(L::YarnLock, Some(parsers::node::parse_yarn_lock), Some(E::Npm))
            .register(L::PnpmLock, None, Some(E::Npm))
            .register(L::GemfileLock, None, Some(E::Gem))
            .register(L::ComposerLock, Some(parsers::composer::parse), Some(E::Composer))
            .register(L::GoMod, Some(parsers::golang::parse), Some(E::Gomod))
            .register(L::CargoLock, Some(parsers::cargo::parse), Some(E::Cargo))
            .register(L::MavenDepTree, Some(parsers::maven::parse), Some(E::Maven))
            .register(L::GradleLockfile, Some(parsers::gradle::parse), Some(E::Maven))
            .register(L::NugetPackagesLockJson, None, Some(E::Nuget))
            .register(L::PubspecLock, None, Some(E::Pub))
            .register(L::SwiftPackageResolved, None, Some(E::SwiftPM))
            .register(L::MixLock, None, Some(E::Mix))
            .register(L::ConanLock, None, None);
        registry
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(kind, entry)| {
                (kind, (entry.parser.is_some(), entry.ecosystem))
            }))
            .finish()
    }
}
