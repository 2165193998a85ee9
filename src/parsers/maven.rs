use std::path::Path;

use regex::Regex;

use crate::error::ParseError;
use crate::models::{DependencyChild, Ecosystem, FoundDependency, LockfileKind, Transitivity};

use super::{parse_lockfile, ParserOutput};

/// Parse the output of `mvn dependency:tree -DoutputFile=maven_dep_tree.txt`.
///
/// The first line is the project itself. Every other entry sits below a
/// `+- ` or `\- ` marker indented three columns per level; top-level entries
/// are direct, the rest transitive. Lines copied from a console log may keep
/// their `[INFO] ` prefix.
pub fn parse(lockfile: &Path, _manifest: Option<&Path>) -> ParserOutput {
    parse_lockfile(LockfileKind::MavenDepTree, lockfile, parse_content)
}

fn parse_content(content: &str) -> Result<Vec<FoundDependency>, ParseError> {
    let re = Regex::new(r"^((?:\|  |   )*)[+\\]- (\S+)")?;
    let mut deps: Vec<FoundDependency> = Vec::new();
    let mut children: Vec<Vec<DependencyChild>> = Vec::new();
    // Indices into `deps` of the entries enclosing the current line.
    let mut ancestors: Vec<usize> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.strip_prefix("[INFO] ").unwrap_or(raw).trim_end();
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let depth = caps[1].len() / 3;
        let (name, version) = coordinate(&caps[2]).ok_or_else(|| ParseError::Syntax {
            line: idx + 1,
            message: format!("expected group:artifact:type:version, got '{}'", &caps[2]),
        })?;

        let transitivity = if depth == 0 {
            Transitivity::Direct
        } else {
            Transitivity::Transitive
        };
        let dep = FoundDependency::new(name, version, Ecosystem::Maven, transitivity).with_line(idx + 1);

        ancestors.truncate(depth);
        if let Some(&parent) = ancestors.last() {
            children[parent].push(dep.key());
        }
        ancestors.push(deps.len());
        deps.push(dep);
        children.push(Vec::new());
    }

    Ok(deps
        .into_iter()
        .zip(children)
        .map(|(dep, children)| {
            if children.is_empty() {
                dep
            } else {
                dep.with_children(children)
            }
        })
        .collect())
}

/// `group:artifact:type[:classifier]:version[:scope]` → (`group:artifact`, version)
fn coordinate(text: &str) -> Option<(String, &str)> {
    let parts: Vec<&str> = text.split(':').collect();
    let version = match parts.len() {
        4 | 5 => parts[3],
        6 => parts[4],
        _ => return None,
    };
    Some((format!("{}:{}", parts[0], parts[1]), version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::file_with;

    const TREE: &str = "\
com.example:app:jar:1.0.0
+- org.slf4j:slf4j-api:jar:2.0.7:compile
+- com.google.guava:guava:jar:31.1-jre:compile
|  +- com.google.guava:failureaccess:jar:1.0.1:compile
|  \\- org.checkerframework:checker-qual:jar:3.12.0:compile
\\- junit:junit:jar:4.13.2:test
   \\- org.hamcrest:hamcrest-core:jar:1.3:test
";

    #[test]
    fn test_parse_dependency_tree() {
        let f = file_with(TREE);
        let (deps, errors) = parse(f.path(), None);
        assert!(errors.is_empty());

        let names: Vec<_> = deps.iter().map(|d| d.package.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "org.slf4j:slf4j-api",
                "com.google.guava:guava",
                "com.google.guava:failureaccess",
                "org.checkerframework:checker-qual",
                "junit:junit",
                "org.hamcrest:hamcrest-core",
            ]
        );
        assert_eq!(deps[1].version, "31.1-jre");
        assert_eq!(deps[1].transitivity, Transitivity::Direct);
        assert_eq!(deps[2].transitivity, Transitivity::Transitive);
        assert_eq!(deps[2].line_number, Some(4));
        assert_eq!(deps[0].children, None);
        assert_eq!(
            deps[1].children,
            Some(vec![
                DependencyChild::new("com.google.guava:failureaccess", "1.0.1"),
                DependencyChild::new("org.checkerframework:checker-qual", "3.12.0"),
            ])
        );
        assert_eq!(
            deps[4].children,
            Some(vec![DependencyChild::new("org.hamcrest:hamcrest-core", "1.3")])
        );
        assert!(deps.iter().all(|d| d.lockfile_path.as_deref() == Some(f.path())));
    }

    #[test]
    fn test_console_prefix_and_classifier() {
        let content = "\
[INFO] com.example:app:jar:1.0.0
[INFO] \\- io.netty:netty-transport-native-epoll:jar:linux-x86_64:4.1.100.Final:runtime
";
        let f = file_with(content);
        let (deps, errors) = parse(f.path(), None);
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].package, "io.netty:netty-transport-native-epoll");
        assert_eq!(deps[0].version, "4.1.100.Final");
    }

    #[test]
    fn test_bad_coordinate_reports_its_line() {
        let f = file_with("com.example:app:jar:1.0.0\n+- not-a-coordinate\n");
        let (deps, errors) = parse(f.path(), None);
        assert!(deps.is_empty());
        assert_eq!(errors[0].line, Some(2));
        assert_eq!(errors[0].parser, LockfileKind::MavenDepTree);
    }
}
