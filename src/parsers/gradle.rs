use std::path::Path;

use regex::Regex;

use crate::error::ParseError;
use crate::models::{Ecosystem, FoundDependency, LockfileKind, Transitivity};

use super::{parse_lockfile, ParserOutput};

/// Parse `gradle.lockfile`, format: `group:artifact:version=configurations`.
///
/// Gradle lockfiles do not say which dependencies are declared directly, so
/// every record has unknown transitivity.
pub fn parse(lockfile: &Path, _manifest: Option<&Path>) -> ParserOutput {
    parse_lockfile(LockfileKind::GradleLockfile, lockfile, parse_content)
}

fn parse_content(content: &str) -> Result<Vec<FoundDependency>, ParseError> {
    let re = Regex::new(r"^([^:=\s]+):([^:=\s]+):([^=\s]+)=")?;
    let mut deps = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("empty=") {
            continue;
        }
        let caps = re.captures(line).ok_or_else(|| ParseError::Syntax {
            line: idx + 1,
            message: format!("expected group:artifact:version=..., got '{}'", line),
        })?;
        let name = format!("{}:{}", &caps[1], &caps[2]);
        deps.push(
            FoundDependency::new(name, &caps[3], Ecosystem::Maven, Transitivity::Unknown)
                .with_line(idx + 1),
        );
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::file_with;

    #[test]
    fn test_parse_gradle_lockfile() {
        let content = "\
# This is a Gradle generated file for dependency locking.
# Manual edits can break the build and are not advised.
com.google.guava:guava:31.1-jre=compileClasspath,runtimeClasspath
org.slf4j:slf4j-api:2.0.7=runtimeClasspath
empty=annotationProcessor
";
        let f = file_with(content);
        let (deps, errors) = parse(f.path(), None);
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].package, "com.google.guava:guava");
        assert_eq!(deps[0].version, "31.1-jre");
        assert_eq!(deps[0].line_number, Some(3));
        assert_eq!(deps[1].ecosystem, Ecosystem::Maven);
    }

    #[test]
    fn test_malformed_line_reports_its_number() {
        let f = file_with("a:b:1=x\nnot a coordinate\n");
        let (_, errors) = parse(f.path(), None);
        assert_eq!(errors[0].line, Some(2));
    }
}
