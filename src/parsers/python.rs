use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::ParseError;
use crate::models::{DependencyChild, Ecosystem, FoundDependency, LockfileKind};

use super::{merge, parse_lockfile, read_direct_names, transitivity, DirectNames, ParserOutput};

/// PEP 503 normalization: lowercase, runs of `-_.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

fn requirement_name_re() -> Result<Regex, ParseError> {
    Ok(Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._\-]*)")?)
}

/// Logical lines of a requirements file: comments removed, `\` continuations
/// joined. Each line keeps the number it started on.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    for (idx, raw) in content.lines().enumerate() {
        let without_comment = match raw.find(" #") {
            Some(pos) => &raw[..pos],
            None if raw.trim_start().starts_with('#') => "",
            None => raw,
        };
        let (text, continues) = match without_comment.trim_end().strip_suffix('\\') {
            Some(text) => (text, true),
            None => (without_comment, false),
        };
        let (start, mut acc) = pending.take().unwrap_or((idx + 1, String::new()));
        acc.push_str(text);
        acc.push(' ');
        if continues {
            pending = Some((start, acc));
        } else {
            lines.push((start, acc.trim().to_string()));
        }
    }
    if let Some((start, acc)) = pending {
        lines.push((start, acc.trim().to_string()));
    }
    lines
}

/// Names listed in a `requirements.in`; options and includes are skipped.
fn parse_requirements_in(content: &str) -> Result<HashSet<String>, ParseError> {
    let re = requirement_name_re()?;
    Ok(logical_lines(content)
        .into_iter()
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('-'))
        .filter_map(|(_, line)| re.captures(&line).map(|caps| normalize_name(&caps[1])))
        .collect())
}

/// Parse a pinned requirements file (`name==version`).
///
/// Only exact pins are reported; ranges, URLs and editable installs are
/// skipped. With a `requirements.in` next to it, packages listed there are
/// direct and the rest transitive.
pub fn parse_requirements(lockfile: &Path, manifest: Option<&Path>) -> ParserOutput {
    let (direct, manifest_errors) =
        read_direct_names(LockfileKind::PipRequirementsTxt, manifest, parse_requirements_in);
    let output = parse_lockfile(LockfileKind::PipRequirementsTxt, lockfile, |content| {
        let re = Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._\-]*)\s*(?:\[[^\]]*\])?\s*===?\s*([^\s;,]+)")?;
        let deps = logical_lines(content)
            .into_iter()
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('-'))
            .filter_map(|(line_no, line)| {
                let caps = re.captures(&line)?;
                let name = normalize_name(&caps[1]);
                let transitivity = transitivity(&direct, &name);
                Some(
                    FoundDependency::new(name, &caps[2], Ecosystem::Pypi, transitivity)
                        .with_line(line_no),
                )
            })
            .collect();
        Ok(deps)
    });
    merge(output, manifest_errors)
}

#[derive(Debug, Deserialize)]
struct Pipfile {
    #[serde(default)]
    packages: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "dev-packages")]
    dev_packages: BTreeMap<String, toml::Value>,
}

fn parse_pipfile(content: &str) -> Result<HashSet<String>, ParseError> {
    let pipfile: Pipfile = toml::from_str(content)?;
    Ok(pipfile
        .packages
        .keys()
        .chain(pipfile.dev_packages.keys())
        .map(|name| normalize_name(name))
        .collect())
}

/// Parse `Pipfile.lock`, JSON with `default` and `develop` sections.
pub fn parse_pipfile_lock(lockfile: &Path, manifest: Option<&Path>) -> ParserOutput {
    let (direct, manifest_errors) =
        read_direct_names(LockfileKind::PipfileLock, manifest, parse_pipfile);
    let output = parse_lockfile(LockfileKind::PipfileLock, lockfile, |content| {
        let json: serde_json::Value = serde_json::from_str(content)?;
        let mut deps = Vec::new();
        for section in ["default", "develop"] {
            let Some(pkgs) = json.get(section).and_then(|v| v.as_object()) else {
                continue;
            };
            for (name, info) in pkgs {
                // VCS and path installs carry no version
                let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
                    continue;
                };
                let name = normalize_name(name);
                let transitivity = transitivity(&direct, &name);
                deps.push(FoundDependency::new(
                    name,
                    version.trim_start_matches("=="),
                    Ecosystem::Pypi,
                    transitivity,
                ));
            }
        }
        Ok(deps)
    });
    merge(output, manifest_errors)
}

#[derive(Debug, Deserialize)]
struct PoetryLock {
    #[serde(default)]
    package: Vec<PoetryPackage>,
}

#[derive(Debug, Deserialize)]
struct PoetryPackage {
    name: String,
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct Pyproject {
    project: Option<PyprojectProject>,
    tool: Option<PyprojectTool>,
}

#[derive(Debug, Deserialize)]
struct PyprojectProject {
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PyprojectTool {
    poetry: Option<PoetrySection>,
}

#[derive(Debug, Deserialize)]
struct PoetrySection {
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: BTreeMap<String, toml::Value>,
    #[serde(default)]
    group: BTreeMap<String, PoetryGroup>,
}

#[derive(Debug, Deserialize)]
struct PoetryGroup {
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

/// Direct names from `pyproject.toml`: PEP 621 `[project].dependencies` and
/// every poetry dependency table.
fn parse_pyproject(content: &str) -> Result<HashSet<String>, ParseError> {
    let pyproject: Pyproject = toml::from_str(content)?;
    let re = requirement_name_re()?;
    let mut names = HashSet::new();

    if let Some(project) = pyproject.project {
        for spec in &project.dependencies {
            if let Some(caps) = re.captures(spec.trim()) {
                names.insert(normalize_name(&caps[1]));
            }
        }
    }
    if let Some(poetry) = pyproject.tool.and_then(|t| t.poetry) {
        let tables = std::iter::once(&poetry.dependencies)
            .chain(std::iter::once(&poetry.dev_dependencies))
            .chain(poetry.group.values().map(|g| &g.dependencies));
        for table in tables {
            names.extend(
                table
                    .keys()
                    .filter(|name| name.as_str() != "python")
                    .map(|name| normalize_name(name)),
            );
        }
    }
    Ok(names)
}

/// Parse `poetry.lock`. Children come from each package's dependency table;
/// poetry pins one version per package so they resolve by name.
pub fn parse_poetry_lock(lockfile: &Path, manifest: Option<&Path>) -> ParserOutput {
    let (direct, manifest_errors) =
        read_direct_names(LockfileKind::PoetryLock, manifest, parse_pyproject);
    let output = parse_lockfile(LockfileKind::PoetryLock, lockfile, |content| {
        poetry_content(content, &direct)
    });
    merge(output, manifest_errors)
}

fn poetry_content(content: &str, direct: &DirectNames) -> Result<Vec<FoundDependency>, ParseError> {
    let lock: PoetryLock = toml::from_str(content)?;
    let versions: HashMap<String, &str> = lock
        .package
        .iter()
        .map(|p| (normalize_name(&p.name), p.version.as_str()))
        .collect();

    let deps = lock
        .package
        .iter()
        .map(|p| {
            let name = normalize_name(&p.name);
            let children = p
                .dependencies
                .keys()
                .map(|dep| normalize_name(dep))
                .filter_map(|dep| {
                    let version = versions.get(&dep)?.to_string();
                    Some(DependencyChild::new(dep, version))
                })
                .collect();
            let transitivity = transitivity(direct, &name);
            FoundDependency::new(name, p.version.clone(), Ecosystem::Pypi, transitivity)
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

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Django_REST.framework"), "django-rest-framework");
        assert_eq!(normalize_name("a__b"), "a-b");
    }

    #[test]
    fn test_parse_requirements() {
        let lock = file_with(
            "\
# pinned by pip-compile
requests==2.28.1 \\
    --hash=sha256:abc
flask>=2.0.0
-r base.txt
Charset_Normalizer[unicode]==3.1.0  # via requests
numpy==1.24.0 ; python_version >= '3.8'
",
        );
        let (deps, errors) = parse_requirements(lock.path(), None);
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].package, "requests");
        assert_eq!(deps[0].version, "2.28.1");
        assert_eq!(deps[0].line_number, Some(2));
        assert_eq!(deps[0].transitivity, Transitivity::Unknown);
        assert_eq!(deps[1].package, "charset-normalizer");
        assert_eq!(deps[1].line_number, Some(6));
        assert_eq!(deps[2].version, "1.24.0");
    }

    #[test]
    fn test_requirements_with_manifest() {
        let lock = file_with("requests==2.28.1\nurllib3==2.0.4\n");
        let manifest = file_with("# top level\nRequests>=2\n-c constraints.txt\n");
        let (deps, errors) = parse_requirements(lock.path(), Some(manifest.path()));
        assert!(errors.is_empty());
        assert_eq!(deps[0].transitivity, Transitivity::Direct);
        assert_eq!(deps[1].transitivity, Transitivity::Transitive);
    }

    #[test]
    fn test_parse_pipfile_lock() {
        let lock = file_with(
            r#"{
  "_meta": { "hash": { "sha256": "x" } },
  "default": {
    "requests": { "version": "==2.31.0" },
    "idna": { "version": "==3.4" },
    "mylib": { "git": "https://example.com/mylib.git" }
  },
  "develop": { "pytest": { "version": "==7.4.0" } }
}"#,
        );
        let manifest = file_with("[packages]\nrequests = \"*\"\n\n[dev-packages]\npytest = \"*\"\n");
        let (deps, errors) = parse_pipfile_lock(lock.path(), Some(manifest.path()));
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);
        let idna = deps.iter().find(|d| d.package == "idna").unwrap();
        assert_eq!(idna.version, "3.4");
        assert_eq!(idna.transitivity, Transitivity::Transitive);
        let pytest = deps.iter().find(|d| d.package == "pytest").unwrap();
        assert_eq!(pytest.transitivity, Transitivity::Direct);
    }

    #[test]
    fn test_parse_poetry_lock() {
        let lock = file_with(
            r#"
[[package]]
name = "requests"
version = "2.31.0"

[package.dependencies]
idna = ">=2.5,<4"
charset-normalizer = ">=2,<4"

[[package]]
name = "idna"
version = "3.4"

[[package]]
name = "charset-normalizer"
version = "3.2.0"
"#,
        );
        let manifest = file_with(
            r#"
[tool.poetry.dependencies]
python = "^3.10"
requests = "^2.31"
"#,
        );
        let (deps, errors) = parse_poetry_lock(lock.path(), Some(manifest.path()));
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].transitivity, Transitivity::Direct);
        assert_eq!(
            deps[0].children,
            Some(vec![
                DependencyChild::new("charset-normalizer", "3.2.0"),
                DependencyChild::new("idna", "3.4"),
            ])
        );
        assert_eq!(deps[1].transitivity, Transitivity::Transitive);
    }
}
