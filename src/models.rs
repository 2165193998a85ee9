use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A package-manager universe that resolved dependencies belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Pypi,
    Npm,
    Gem,
    Composer,
    Gomod,
    Cargo,
    Maven,
    Nuget,
    Pub,
    #[serde(rename = "swiftpm")]
    SwiftPM,
    Mix,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ecosystem::Pypi => write!(f, "pypi"),
            Ecosystem::Npm => write!(f, "npm"),
            Ecosystem::Gem => write!(f, "gem"),
            Ecosystem::Composer => write!(f, "composer"),
            Ecosystem::Gomod => write!(f, "gomod"),
            Ecosystem::Cargo => write!(f, "cargo"),
            Ecosystem::Maven => write!(f, "maven"),
            Ecosystem::Nuget => write!(f, "nuget"),
            Ecosystem::Pub => write!(f, "pub"),
            Ecosystem::SwiftPM => write!(f, "swiftpm"),
            Ecosystem::Mix => write!(f, "mix"),
        }
    }
}

/// Tool-generated files pinning exact versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockfileKind {
    PipfileLock,
    PipRequirementsTxt,
    PoetryLock,
    UvLock,
    NpmPackageLockJson,
    YarnLock,
    PnpmLock,
    GemfileLock,
    ComposerLock,
    GoMod,
    CargoLock,
    MavenDepTree,
    GradleLockfile,
    NugetPackagesLockJson,
    PubspecLock,
    SwiftPackageResolved,
    MixLock,
    ConanLock,
}

impl fmt::Display for LockfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockfileKind::PipfileLock => "Pipfile.lock",
            LockfileKind::PipRequirementsTxt => "requirements.txt",
            LockfileKind::PoetryLock => "poetry.lock",
            LockfileKind::UvLock => "uv.lock",
            LockfileKind::NpmPackageLockJson => "package-lock.json",
            LockfileKind::YarnLock => "yarn.lock",
            LockfileKind::PnpmLock => "pnpm-lock.yaml",
            LockfileKind::GemfileLock => "Gemfile.lock",
            LockfileKind::ComposerLock => "composer.lock",
            LockfileKind::GoMod => "go.mod",
            LockfileKind::CargoLock => "Cargo.lock",
            LockfileKind::MavenDepTree => "maven_dep_tree.txt",
            LockfileKind::GradleLockfile => "gradle.lockfile",
            LockfileKind::NugetPackagesLockJson => "packages.lock.json",
            LockfileKind::PubspecLock => "pubspec.lock",
            LockfileKind::SwiftPackageResolved => "Package.resolved",
            LockfileKind::MixLock => "mix.lock",
            LockfileKind::ConanLock => "conan.lock",
        };
        write!(f, "{}", name)
    }
}

/// Human-authored dependency declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestKind {
    RequirementsIn,
    PackageJson,
    Gemfile,
    GoMod,
    CargoToml,
    PomXml,
    BuildGradle,
    SettingsGradle,
    ComposerJson,
    NugetManifestJson,
    PubspecYaml,
    PackageSwift,
    MixExs,
    Pipfile,
    PyprojectToml,
    ConanfileTxt,
}

impl ManifestKind {
    /// Ecosystem a dynamically resolved manifest of this kind belongs to.
    pub fn ecosystem(&self) -> Option<Ecosystem> {
        match self {
            ManifestKind::RequirementsIn | ManifestKind::Pipfile | ManifestKind::PyprojectToml => {
                Some(Ecosystem::Pypi)
            }
            ManifestKind::PackageJson => Some(Ecosystem::Npm),
            ManifestKind::Gemfile => Some(Ecosystem::Gem),
            ManifestKind::GoMod => Some(Ecosystem::Gomod),
            ManifestKind::CargoToml => Some(Ecosystem::Cargo),
            ManifestKind::PomXml | ManifestKind::BuildGradle | ManifestKind::SettingsGradle => {
                Some(Ecosystem::Maven)
            }
            ManifestKind::ComposerJson => Some(Ecosystem::Composer),
            ManifestKind::NugetManifestJson => Some(Ecosystem::Nuget),
            ManifestKind::PubspecYaml => Some(Ecosystem::Pub),
            ManifestKind::PackageSwift => Some(Ecosystem::SwiftPM),
            ManifestKind::MixExs => Some(Ecosystem::Mix),
            ManifestKind::ConanfileTxt => None,
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManifestKind::RequirementsIn => "requirements.in",
            ManifestKind::PackageJson => "package.json",
            ManifestKind::Gemfile => "Gemfile",
            ManifestKind::GoMod => "go.mod",
            ManifestKind::CargoToml => "Cargo.toml",
            ManifestKind::PomXml => "pom.xml",
            ManifestKind::BuildGradle => "build.gradle",
            ManifestKind::SettingsGradle => "settings.gradle",
            ManifestKind::ComposerJson => "composer.json",
            ManifestKind::NugetManifestJson => "nuget.manifest.json",
            ManifestKind::PubspecYaml => "pubspec.yaml",
            ManifestKind::PackageSwift => "Package.swift",
            ManifestKind::MixExs => "mix.exs",
            ManifestKind::Pipfile => "Pipfile",
            ManifestKind::PyprojectToml => "pyproject.toml",
            ManifestKind::ConanfileTxt => "conanfile.txt",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Manifest {
    pub kind: ManifestKind,
    pub path: PathBuf,
}

impl Manifest {
    pub fn new(kind: ManifestKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lockfile {
    pub kind: LockfileKind,
    pub path: PathBuf,
}

impl Lockfile {
    pub fn new(kind: LockfileKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transitivity {
    Direct,
    Transitive,
    Unknown,
}

impl fmt::Display for Transitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transitivity::Direct => write!(f, "direct"),
            Transitivity::Transitive => write!(f, "transitive"),
            Transitivity::Unknown => write!(f, "unknown"),
        }
    }
}

/// Lookup key of a dependency inside one resolution result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyChild {
    pub package: String,
    pub version: String,
}

impl DependencyChild {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DependencyChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.version)
    }
}

/// A single dependency record produced by a parser or the dynamic resolver.
///
/// `children` refer to other records of the same result by key, so they can
/// be shared between records and can form cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundDependency {
    pub package: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    pub transitivity: Transitivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockfile_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DependencyChild>>,
}

impl FoundDependency {
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        ecosystem: Ecosystem,
        transitivity: Transitivity,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            ecosystem,
            transitivity,
            lockfile_path: None,
            line_number: None,
            children: None,
        }
    }

    pub fn with_lockfile(mut self, path: &Path) -> Self {
        self.lockfile_path = Some(path.to_path_buf());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }

    pub fn with_children(mut self, children: Vec<DependencyChild>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn key(&self) -> DependencyChild {
        DependencyChild::new(self.package.clone(), self.version.clone())
    }
}

/// How the dependencies of a subproject were determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// A lockfile committed to the repository was parsed.
    LockfileParsing,
    /// An external resolver talked to the package manager.
    Dynamic,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMethod::LockfileParsing => write!(f, "lockfile parsing"),
            ResolutionMethod::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A parser failure attributed to one lockfile or manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyParserError {
    pub path: PathBuf,
    pub parser: LockfileKind,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl fmt::Display for DependencyParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "failed to parse {} ({} parser, line {}): {}",
                self.path.display(),
                self.parser,
                line,
                self.reason
            ),
            None => write!(
                f,
                "failed to parse {} ({} parser): {}",
                self.path.display(),
                self.parser,
                self.reason
            ),
        }
    }
}

/// Error payloads reported by the dynamic resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionErrorKind {
    UnsupportedManifest,
    MissingRequirement(String),
    ResolutionCmdFailed { command: String, message: String },
    ParseDependenciesFailed(String),
}

impl fmt::Display for ResolutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionErrorKind::UnsupportedManifest => write!(f, "unsupported manifest"),
            ResolutionErrorKind::MissingRequirement(req) => {
                write!(f, "missing requirement: {}", req)
            }
            ResolutionErrorKind::ResolutionCmdFailed { command, message } => {
                write!(f, "`{}` failed: {}", command, message)
            }
            ResolutionErrorKind::ParseDependenciesFailed(msg) => {
                write!(f, "could not parse resolved dependencies: {}", msg)
            }
        }
    }
}

/// A dynamic-resolution failure attributed to the manifest it was run for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyResolutionError {
    pub kind: ResolutionErrorKind,
    pub source_file: PathBuf,
}

impl fmt::Display for DependencyResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_file.display(), self.kind)
    }
}

/// Anything that can go wrong while resolving one subproject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ResolutionError {
    Parser(DependencyParserError),
    Resolution(DependencyResolutionError),
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::Parser(e) => write!(f, "{}", e),
            ResolutionError::Resolution(e) => write!(f, "{}", e),
        }
    }
}

impl From<DependencyParserError> for ResolutionError {
    fn from(e: DependencyParserError) -> Self {
        ResolutionError::Parser(e)
    }
}

impl From<DependencyResolutionError> for ResolutionError {
    fn from(e: DependencyResolutionError) -> Self {
        ResolutionError::Resolution(e)
    }
}
