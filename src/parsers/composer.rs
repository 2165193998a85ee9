use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::models::{DependencyChild, Ecosystem, FoundDependency, LockfileKind};

use super::{merge, parse_lockfile, read_direct_names, transitivity, DirectNames, ParserOutput};

#[derive(Debug, Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<ComposerPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<ComposerPackage>,
}

#[derive(Debug, Deserialize)]
struct ComposerPackage {
    name: String,
    version: String,
    #[serde(default)]
    require: BTreeMap<String, Value>,
}

/// Platform requirements, not installable packages.
fn is_platform(name: &str) -> bool {
    name == "php" || name.starts_with("ext-") || name.starts_with("lib-")
}

/// Parse `composer.lock`. Direct dependencies come from the `require` and
/// `require-dev` sections of `composer.json`.
pub fn parse(lockfile: &Path, manifest: Option<&Path>) -> ParserOutput {
    let (direct, manifest_errors) =
        read_direct_names(LockfileKind::ComposerLock, manifest, parse_manifest);
    let output = parse_lockfile(LockfileKind::ComposerLock, lockfile, |content| {
        parse_content(content, &direct)
    });
    merge(output, manifest_errors)
}

fn parse_manifest(content: &str) -> Result<HashSet<String>, ParseError> {
    let json: Value = serde_json::from_str(content)?;
    let mut names = HashSet::new();
    for section in ["require", "require-dev"] {
        if let Some(require) = json.get(section).and_then(|v| v.as_object()) {
            names.extend(require.keys().filter(|n| !is_platform(n)).cloned());
        }
    }
    Ok(names)
}

fn parse_content(content: &str, direct: &DirectNames) -> Result<Vec<FoundDependency>, ParseError> {
    let lock: ComposerLock = serde_json::from_str(content)?;
    let packages: Vec<ComposerPackage> = lock
        .packages
        .into_iter()
        .chain(lock.packages_dev)
        .collect();
    let versions: HashMap<&str, &str> = packages
        .iter()
        .map(|p| (p.name.as_str(), p.version.as_str()))
        .collect();

    let deps = packages
        .iter()
        .map(|p| {
            let children = p
                .require
                .keys()
                .filter(|name| !is_platform(name))
                .filter_map(|name| {
                    versions
                        .get(name.as_str())
                        .map(|version| DependencyChild::new(name.clone(), *version))
                })
                .collect();
            FoundDependency::new(
                p.name.clone(),
                p.version.clone(),
                Ecosystem::Composer,
                transitivity(direct, &p.name),
            )
            .with_children(children)
        })
        .collect();
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transitivity;
    use crate::parsers::testing::file_with;

    const LOCK: &str = r#"{
  "packages": [
    { "name": "monolog/monolog", "version": "3.5.0",
      "require": { "php": ">=8.1", "psr/log": "^2.0 || ^3.0" } },
    { "name": "psr/log", "version": "3.0.0", "require": { "php": ">=8.0.0" } }
  ],
  "packages-dev": [
    { "name": "phpunit/phpunit", "version": "10.5.0" }
  ]
}"#;

    #[test]
    fn test_parse_composer_lock_with_manifest() {
        let lock = file_with(LOCK);
        let manifest = file_with(
            r#"{ "require": { "php": "^8.1", "monolog/monolog": "^3.0" },
                 "require-dev": { "phpunit/phpunit": "^10" } }"#,
        );
        let (deps, errors) = parse(lock.path(), Some(manifest.path()));
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].transitivity, Transitivity::Direct);
        assert_eq!(
            deps[0].children,
            Some(vec![DependencyChild::new("psr/log", "3.0.0")])
        );
        assert_eq!(deps[1].transitivity, Transitivity::Transitive);
        assert_eq!(deps[2].transitivity, Transitivity::Direct);
    }

    #[test]
    fn test_broken_manifest_keeps_lockfile_results() {
        let lock = file_with(LOCK);
        let manifest = file_with("{ not json");
        let (deps, errors) = parse(lock.path(), Some(manifest.path()));
        assert_eq!(deps.len(), 3);
        assert!(deps.iter().all(|d| d.transitivity == Transitivity::Unknown));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, manifest.path());
    }
}
