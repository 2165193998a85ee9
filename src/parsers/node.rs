use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::models::{DependencyChild, Ecosystem, FoundDependency, LockfileKind, Transitivity};

use super::{merge, parse_lockfile, read_direct_names, transitivity, DirectNames, ParserOutput};

const DEPENDENCY_SECTIONS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

/// Package names declared in `package.json`.
fn parse_package_json(content: &str) -> Result<HashSet<String>, ParseError> {
    let json: Value = serde_json::from_str(content)?;
    Ok(declared_names(&json))
}

fn declared_names(entry: &Value) -> HashSet<String> {
    DEPENDENCY_SECTIONS
        .iter()
        .filter_map(|section| entry.get(section).and_then(|v| v.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

/// Parse `package-lock.json` (lockfile versions 1 to 3).
///
/// Top-level packages declared by the manifest are direct. Without a
/// manifest the root entry of a v2/v3 lockfile stands in for it.
pub fn parse_package_lock(lockfile: &Path, manifest: Option<&Path>) -> ParserOutput {
    let (direct, manifest_errors) =
        read_direct_names(LockfileKind::NpmPackageLockJson, manifest, parse_package_json);
    let output = parse_lockfile(LockfileKind::NpmPackageLockJson, lockfile, |content| {
        let json: Value = serde_json::from_str(content)?;
        match json.get("packages").and_then(|v| v.as_object()) {
            Some(packages) => {
                let direct = direct
                    .clone()
                    .or_else(|| packages.get("").map(declared_names));
                Ok(parse_packages_map(packages, &direct))
            }
            None => {
                let deps = json
                    .get("dependencies")
                    .and_then(|v| v.as_object())
                    .map(|top| parse_v1(top, &direct))
                    .unwrap_or_default();
                Ok(deps)
            }
        }
    });
    merge(output, manifest_errors)
}

/// `node_modules/a/node_modules/@s/b` → `@s/b`
fn package_name(key: &str) -> &str {
    key.rsplit_once("node_modules/").map_or(key, |(_, name)| name)
}

/// Resolve `name` the way node does from the package installed at `key`:
/// nested `node_modules` first, then each enclosing level up to the root.
fn resolve_installed(packages: &Map<String, Value>, key: &str, name: &str) -> Option<String> {
    let mut base = key;
    loop {
        let candidate = if base.is_empty() {
            format!("node_modules/{}", name)
        } else {
            format!("{}/node_modules/{}", base, name)
        };
        if let Some(version) = packages
            .get(&candidate)
            .and_then(|info| info.get("version"))
            .and_then(|v| v.as_str())
        {
            return Some(version.to_string());
        }
        if base.is_empty() {
            return None;
        }
        base = base.rfind("/node_modules/").map_or("", |idx| &base[..idx]);
    }
}

fn parse_packages_map(packages: &Map<String, Value>, direct: &DirectNames) -> Vec<FoundDependency> {
    let mut deps = Vec::new();
    for (key, info) in packages {
        if !key.contains("node_modules/") || info.get("link").and_then(|v| v.as_bool()) == Some(true) {
            continue;
        }
        let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
            continue;
        };
        let name = package_name(key);
        let top_level = key == &format!("node_modules/{}", name);
        let transitivity = match transitivity(direct, name) {
            Transitivity::Direct if !top_level => Transitivity::Transitive,
            t => t,
        };

        let mut children: Vec<DependencyChild> = ["dependencies", "optionalDependencies"]
            .iter()
            .filter_map(|section| info.get(section).and_then(|v| v.as_object()))
            .flat_map(|section| section.keys())
            .filter_map(|child| {
                resolve_installed(packages, key, child)
                    .map(|version| DependencyChild::new(child.clone(), version))
            })
            .collect();
        children.sort();
        children.dedup();

        deps.push(
            FoundDependency::new(name, version, Ecosystem::Npm, transitivity).with_children(children),
        );
    }
    deps
}

/// Lockfile v1: a tree of `dependencies` maps whose entries list their own
/// `requires` by name.
fn parse_v1(top: &Map<String, Value>, direct: &DirectNames) -> Vec<FoundDependency> {
    let mut deps = Vec::new();
    let mut scopes = vec![top];
    walk_v1(top, &mut scopes, direct, &mut deps);
    deps
}

fn walk_v1<'a>(
    level: &'a Map<String, Value>,
    scopes: &mut Vec<&'a Map<String, Value>>,
    direct: &DirectNames,
    out: &mut Vec<FoundDependency>,
) {
    let top_level = scopes.len() == 1;
    for (name, info) in level {
        let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
            continue;
        };
        let nested = info.get("dependencies").and_then(|v| v.as_object());

        let children: Vec<DependencyChild> = info
            .get("requires")
            .and_then(|v| v.as_object())
            .map(|requires| {
                requires
                    .keys()
                    .filter_map(|req| {
                        nested
                            .into_iter()
                            .chain(scopes.iter().rev().copied())
                            .find_map(|scope| scope.get(req))
                            .and_then(|entry| entry.get("version"))
                            .and_then(|v| v.as_str())
                            .map(|v| DependencyChild::new(req.clone(), v))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let transitivity = match transitivity(direct, name) {
            Transitivity::Direct if !top_level => Transitivity::Transitive,
            t => t,
        };
        out.push(
            FoundDependency::new(name.clone(), version, Ecosystem::Npm, transitivity)
                .with_children(children),
        );

        if let Some(nested) = nested {
            scopes.push(nested);
            walk_v1(nested, scopes, direct, out);
            scopes.pop();
        }
    }
}

#[derive(Debug, Default)]
struct YarnEntry {
    specs: Vec<String>,
    line: usize,
    version: Option<String>,
    dependencies: Vec<(String, String)>,
}

/// Parse `yarn.lock`, both the classic v1 format and the YAML-like format of
/// newer yarn releases.
pub fn parse_yarn_lock(lockfile: &Path, manifest: Option<&Path>) -> ParserOutput {
    let (direct, manifest_errors) =
        read_direct_names(LockfileKind::YarnLock, manifest, parse_package_json);
    let output = parse_lockfile(LockfileKind::YarnLock, lockfile, |content| {
        parse_yarn_content(content, &direct)
    });
    merge(output, manifest_errors)
}

/// `"@scope/pkg@^1.0.0"` → (`@scope/pkg`, `^1.0.0`)
fn split_spec(spec: &str) -> Option<(&str, &str)> {
    let spec = spec.trim().trim_matches('"');
    let at = spec.rfind('@').filter(|&idx| idx > 0)?;
    Some((&spec[..at], &spec[at + 1..]))
}

/// `  lodash "^4.0.0"` or `    lodash: "npm:^4.0.0"` → (`lodash`, range)
fn split_dependency_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let (name, rest) = match line.strip_prefix('"') {
        Some(quoted) => {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        }
        None => {
            let end = line.find(|c: char| c.is_whitespace() || c == ':')?;
            (&line[..end], &line[end..])
        }
    };
    let range = rest
        .trim_start_matches(':')
        .trim()
        .trim_matches('"')
        .to_string();
    Some((name.to_string(), range))
}

fn parse_yarn_content(content: &str, direct: &DirectNames) -> Result<Vec<FoundDependency>, ParseError> {
    let mut entries: Vec<YarnEntry> = Vec::new();
    let mut in_dependencies = false;

    for (idx, raw) in content.lines().enumerate() {
        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }
        let indent = raw.len() - raw.trim_start().len();
        let line = raw.trim();

        if indent == 0 {
            let header = line.strip_suffix(':').ok_or_else(|| ParseError::Syntax {
                line: idx + 1,
                message: format!("expected an entry header, got '{}'", line),
            })?;
            let specs = header
                .split(", ")
                .map(|s| s.trim().trim_matches('"').to_string())
                .collect();
            entries.push(YarnEntry {
                specs,
                line: idx + 1,
                ..YarnEntry::default()
            });
            in_dependencies = false;
            continue;
        }

        let Some(entry) = entries.last_mut() else {
            return Err(ParseError::Syntax {
                line: idx + 1,
                message: "indented line before the first entry".to_string(),
            });
        };
        if indent <= 2 {
            in_dependencies = matches!(line, "dependencies:" | "optionalDependencies:");
            if let Some(version) = line
                .strip_prefix("version")
                .filter(|rest| rest.starts_with([' ', ':']))
            {
                entry.version = Some(version.trim_start_matches(':').trim().trim_matches('"').to_string());
            }
        } else if in_dependencies {
            if let Some(dep) = split_dependency_line(line) {
                entry.dependencies.push(dep);
            }
        }
    }

    let mut resolved: HashMap<String, String> = HashMap::new();
    for entry in &entries {
        if let Some(version) = &entry.version {
            for spec in &entry.specs {
                resolved.insert(spec.clone(), version.clone());
            }
        }
    }

    let mut deps = Vec::new();
    for entry in &entries {
        let (Some(version), Some((name, _))) = (
            &entry.version,
            entry.specs.first().and_then(|s| split_spec(s)),
        ) else {
            continue;
        };
        let children = entry
            .dependencies
            .iter()
            .filter_map(|(dep, range)| {
                resolved
                    .get(&format!("{}@{}", dep, range))
                    .map(|v| DependencyChild::new(dep.clone(), v.clone()))
            })
            .collect();
        deps.push(
            FoundDependency::new(name, version.clone(), Ecosystem::Npm, transitivity(direct, name))
                .with_line(entry.line)
                .with_children(children),
        );
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::file_with;

    const PACKAGE_JSON: &str = r#"{
  "name": "my-app",
  "dependencies": { "express": "^4.18.2" },
  "devDependencies": { "jest": "^29.0.0" }
}"#;

    #[test]
    fn test_parse_package_lock_v3() {
        let lock = file_with(
            r#"{
  "name": "my-app",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "my-app", "dependencies": { "express": "^4.18.2" } },
    "node_modules/express": {
      "version": "4.18.2",
      "dependencies": { "debug": "2.6.9" }
    },
    "node_modules/debug": { "version": "4.3.4" },
    "node_modules/express/node_modules/debug": { "version": "2.6.9" },
    "packages/local": { "version": "0.0.1" }
  }
}"#,
        );
        let (deps, errors) = parse_package_lock(lock.path(), None);
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);

        let express = deps.iter().find(|d| d.package == "express").unwrap();
        assert_eq!(express.transitivity, Transitivity::Direct);
        assert_eq!(
            express.children,
            Some(vec![DependencyChild::new("debug", "2.6.9")])
        );
        let nested_debug = deps.iter().find(|d| d.version == "2.6.9").unwrap();
        assert_eq!(nested_debug.package, "debug");
        assert_eq!(nested_debug.transitivity, Transitivity::Transitive);
    }

    #[test]
    fn test_parse_package_lock_v1() {
        let lock = file_with(
            r#"{
  "lockfileVersion": 1,
  "dependencies": {
    "express": {
      "version": "4.18.2",
      "requires": { "debug": "2.6.9", "ms": "2.0.0" },
      "dependencies": { "debug": { "version": "2.6.9" } }
    },
    "ms": { "version": "2.0.0" }
  }
}"#,
        );
        let manifest = file_with(PACKAGE_JSON);
        let (deps, errors) = parse_package_lock(lock.path(), Some(manifest.path()));
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);

        let express = deps.iter().find(|d| d.package == "express").unwrap();
        assert_eq!(express.transitivity, Transitivity::Direct);
        assert_eq!(
            express.children,
            Some(vec![
                DependencyChild::new("debug", "2.6.9"),
                DependencyChild::new("ms", "2.0.0"),
            ])
        );
        let ms = deps.iter().find(|d| d.package == "ms").unwrap();
        assert_eq!(ms.transitivity, Transitivity::Transitive);
    }

    #[test]
    fn test_parse_yarn_lock_classic() {
        let lock = file_with(
            r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


express@^4.18.2:
  version "4.18.2"
  resolved "https://registry.yarnpkg.com/express/-/express-4.18.2.tgz"
  dependencies:
    debug "2.6.9"

"@types/node@^20.0.0", "@types/node@^20.1.0":
  version "20.4.5"

debug@2.6.9:
  version "2.6.9"
"#,
        );
        let manifest = file_with(PACKAGE_JSON);
        let (deps, errors) = parse_yarn_lock(lock.path(), Some(manifest.path()));
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);

        assert_eq!(deps[0].package, "express");
        assert_eq!(deps[0].line_number, Some(5));
        assert_eq!(deps[0].transitivity, Transitivity::Direct);
        assert_eq!(
            deps[0].children,
            Some(vec![DependencyChild::new("debug", "2.6.9")])
        );
        assert_eq!(deps[1].package, "@types/node");
        assert_eq!(deps[1].version, "20.4.5");
        assert_eq!(deps[2].transitivity, Transitivity::Transitive);
    }

    #[test]
    fn test_parse_yarn_lock_berry() {
        let lock = file_with(
            r#"__metadata:
  version: 6

"js-tokens@npm:^4.0.0":
  version: 4.0.0
  resolution: "js-tokens@npm:4.0.0"

"loose-envify@npm:^1.1.0":
  version: 1.4.0
  dependencies:
    js-tokens: "npm:^4.0.0"
"#,
        );
        let (deps, errors) = parse_yarn_lock(lock.path(), None);
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].package, "loose-envify");
        assert_eq!(deps[1].transitivity, Transitivity::Unknown);
        assert_eq!(
            deps[1].children,
            Some(vec![DependencyChild::new("js-tokens", "4.0.0")])
        );
    }

    #[test]
    fn test_yarn_lock_garbage_header() {
        let lock = file_with("not a header\n");
        let (deps, errors) = parse_yarn_lock(lock.path(), None);
        assert!(deps.is_empty());
        assert_eq!(errors[0].line, Some(1));
    }
}
