use std::path::Path;

use regex::Regex;

use crate::error::ParseError;
use crate::models::{Ecosystem, FoundDependency, LockfileKind, Transitivity};

use super::{parse_lockfile, ParserOutput};

/// Parse the `require` directives of `go.mod`, which is both the manifest and
/// the lockfile of a Go module. `// indirect` requirements are transitive.
pub fn parse(lockfile: &Path, _manifest: Option<&Path>) -> ParserOutput {
    parse_lockfile(LockfileKind::GoMod, lockfile, parse_content)
}

fn parse_content(content: &str) -> Result<Vec<FoundDependency>, ParseError> {
    let block_re = Regex::new(r"^(\w+)\s*\($")?;
    let single_re = Regex::new(r"^require\s+(\S+)\s+(\S+)(.*)$")?;
    let entry_re = Regex::new(r"^(\S+)\s+(\S+)(.*)$")?;

    let mut deps = Vec::new();
    let mut block: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if let Some(current) = &block {
            if line == ")" {
                block = None;
                continue;
            }
            if current != "require" {
                continue;
            }
            let caps = entry_re.captures(line).ok_or_else(|| ParseError::Syntax {
                line: line_no,
                message: format!("malformed requirement '{}'", line),
            })?;
            deps.push(make_dep(&caps[1], &caps[2], &caps[3], line_no));
            continue;
        }

        if let Some(caps) = block_re.captures(line) {
            block = Some(caps[1].to_string());
        } else if let Some(caps) = single_re.captures(line) {
            deps.push(make_dep(&caps[1], &caps[2], &caps[3], line_no));
        }
    }

    if block.is_some() {
        return Err(ParseError::Syntax {
            line: content.lines().count(),
            message: "unterminated block".to_string(),
        });
    }
    Ok(deps)
}

fn make_dep(module: &str, version: &str, rest: &str, line: usize) -> FoundDependency {
    let transitivity = if rest.contains("// indirect") {
        Transitivity::Transitive
    } else {
        Transitivity::Direct
    };
    FoundDependency::new(module, version, Ecosystem::Gomod, transitivity).with_line(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::file_with;

    #[test]
    fn test_parse_go_mod() {
        let content = r#"module example.com/app

go 1.21

require github.com/pkg/errors v0.9.1

require (
	golang.org/x/sys v0.15.0 // indirect
	github.com/spf13/cobra v1.8.0
)

replace (
	github.com/old/mod => github.com/new/mod v1.0.0
)
"#;
        let f = file_with(content);
        let (deps, errors) = parse(f.path(), Some(f.path()));
        assert!(errors.is_empty());
        assert_eq!(deps.len(), 3);

        assert_eq!(deps[0].package, "github.com/pkg/errors");
        assert_eq!(deps[0].version, "v0.9.1");
        assert_eq!(deps[0].line_number, Some(5));
        assert_eq!(deps[1].transitivity, Transitivity::Transitive);
        assert_eq!(deps[2].transitivity, Transitivity::Direct);
        assert_eq!(deps[2].line_number, Some(9));
    }

    #[test]
    fn test_unterminated_block_is_an_error() {
        let f = file_with("module x\n\nrequire (\n\tgithub.com/a/b v1.0.0\n");
        let (deps, errors) = parse(f.path(), None);
        assert!(deps.is_empty());
        assert_eq!(errors[0].parser, LockfileKind::GoMod);
        assert_eq!(errors[0].line, Some(4));
    }
}
