use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ParseError;
use crate::models::{DependencyChild, Ecosystem, FoundDependency, LockfileKind, Transitivity};

use super::{parse_lockfile, ParserOutput};

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoLockPackage>,
}

#[derive(Debug, Deserialize)]
struct CargoLockPackage {
    name: String,
    version: String,
    /// Packages without a `source` field are local workspace members.
    source: Option<String>,
    /// `"name"`, `"name version"` or `"name version (source)"`.
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Parse `Cargo.lock`.
///
/// Workspace members are not reported; the packages they depend on are
/// direct, everything else is transitive. The manifest is not needed.
pub fn parse(lockfile: &Path, _manifest: Option<&Path>) -> ParserOutput {
    parse_lockfile(LockfileKind::CargoLock, lockfile, parse_content)
}

fn parse_content(content: &str) -> Result<Vec<FoundDependency>, ParseError> {
    let lock: CargoLock = toml::from_str(content)?;

    let mut versions_by_name: HashMap<&str, Vec<&str>> = HashMap::new();
    for p in &lock.package {
        versions_by_name.entry(&p.name).or_default().push(&p.version);
    }

    let mut direct: Vec<DependencyChild> = Vec::new();
    for member in lock.package.iter().filter(|p| p.source.is_none()) {
        direct.extend(
            member
                .dependencies
                .iter()
                .filter_map(|d| resolve_spec(d, &versions_by_name)),
        );
    }

    let deps = lock
        .package
        .iter()
        .filter(|p| p.source.is_some())
        .map(|p| {
            let key = DependencyChild::new(p.name.clone(), p.version.clone());
            let transitivity = if direct.contains(&key) {
                Transitivity::Direct
            } else {
                Transitivity::Transitive
            };
            let children = p
                .dependencies
                .iter()
                .filter_map(|d| resolve_spec(d, &versions_by_name))
                .collect();
            FoundDependency::new(p.name.clone(), p.version.clone(), Ecosystem::Cargo, transitivity)
                .with_children(children)
        })
        .collect();

    Ok(deps)
}

fn resolve_spec(spec: &str, versions_by_name: &HashMap<&str, Vec<&str>>) -> Option<DependencyChild> {
    let mut parts = spec.split_whitespace();
    let name = parts.next()?;
    match parts.next() {
        Some(version) => Some(DependencyChild::new(name, version)),
        // A bare name is only written when the name is unambiguous.
        None => versions_by_name
            .get(name)
            .and_then(|v| v.first())
            .map(|version| DependencyChild::new(name, *version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::file_with;

    #[test]
    fn test_parse_cargo_lock() {
        let content = r#"
version = 3

[[package]]
name = "my-app"
version = "0.1.0"
dependencies = [
 "serde",
]

[[package]]
name = "serde"
version = "1.0.150"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "abc123"
dependencies = [
 "serde_derive 1.0.150",
]

[[package]]
name = "serde_derive"
version = "1.0.150"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "def456"
"#;
        let f = file_with(content);
        let (deps, errors) = parse(f.path(), None);
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 2);

        assert_eq!(deps[0].package, "serde");
        assert_eq!(deps[0].ecosystem, Ecosystem::Cargo);
        assert_eq!(deps[0].transitivity, Transitivity::Direct);
        assert_eq!(
            deps[0].children,
            Some(vec![DependencyChild::new("serde_derive", "1.0.150")])
        );
        assert_eq!(deps[1].transitivity, Transitivity::Transitive);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let f = file_with("[[package]\nname = ");
        let (deps, errors) = parse(f.path(), None);
        assert!(deps.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("TOML"));
    }
}
