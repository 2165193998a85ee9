//! Static lockfile parsers.
//!
//! Every parser has the [`LockfileParser`] shape: it reads the lockfile and,
//! when given, the manifest next to it, and returns what it found together
//! with per-file error records. Parsers never fail as a whole; a broken
//! manifest still lets the lockfile contribute dependencies.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::{DependencyParserError, FoundDependency, LockfileKind, Transitivity};

pub mod cargo;
pub mod composer;
pub mod golang;
pub mod gradle;
pub mod maven;
pub mod node;
pub mod python;

/// Dependencies plus the errors hit while reading them.
pub type ParserOutput = (Vec<FoundDependency>, Vec<DependencyParserError>);

/// `(lockfile, manifest) -> (dependencies, errors)`
pub type LockfileParser = fn(&Path, Option<&Path>) -> ParserOutput;

/// Names declared directly in a manifest, if one was read successfully.
pub(crate) type DirectNames = Option<HashSet<String>>;

/// Read `lockfile` and run `parse` over its content. Every returned record is
/// tagged with the lockfile path; a failure becomes a single error record.
pub(crate) fn parse_lockfile<F>(kind: LockfileKind, lockfile: &Path, parse: F) -> ParserOutput
where
    F: FnOnce(&str) -> Result<Vec<FoundDependency>, ParseError>,
{
    let result = std::fs::read_to_string(lockfile)
        .map_err(ParseError::from)
        .and_then(|content| parse(&content));

    match result {
        Ok(deps) => {
            debug!("{} dependencies in {}", deps.len(), lockfile.display());
            let deps = deps.into_iter().map(|d| d.with_lockfile(lockfile)).collect();
            (deps, Vec::new())
        }
        Err(e) => (Vec::new(), vec![parser_error(kind, lockfile, &e)]),
    }
}

/// Read the direct dependency names out of an optional manifest.
///
/// No manifest gives `None` and no error; an unreadable manifest gives `None`
/// plus an error record attributed to the manifest.
pub(crate) fn read_direct_names<F>(
    kind: LockfileKind,
    manifest: Option<&Path>,
    parse: F,
) -> (DirectNames, Vec<DependencyParserError>)
where
    F: FnOnce(&str) -> Result<HashSet<String>, ParseError>,
{
    let Some(manifest) = manifest else {
        return (None, Vec::new());
    };
    let result = std::fs::read_to_string(manifest)
        .map_err(ParseError::from)
        .and_then(|content| parse(&content));
    match result {
        Ok(names) => (Some(names), Vec::new()),
        Err(e) => (None, vec![parser_error(kind, manifest, &e)]),
    }
}

pub(crate) fn transitivity(direct: &DirectNames, name: &str) -> Transitivity {
    match direct {
        Some(names) if names.contains(name) => Transitivity::Direct,
        Some(_) => Transitivity::Transitive,
        None => Transitivity::Unknown,
    }
}

fn parser_error(kind: LockfileKind, path: &Path, e: &ParseError) -> DependencyParserError {
    warn!("Failed to parse {}: {}", path.display(), e);
    DependencyParserError {
        path: path.to_path_buf(),
        parser: kind,
        reason: e.to_string(),
        line: e.line(),
    }
}

/// Combine the outputs of a manifest read and a lockfile parse.
pub(crate) fn merge(mut output: ParserOutput, errors: Vec<DependencyParserError>) -> ParserOutput {
    output.1.extend(errors);
    output
}


#[cfg(test)]
mod tests {
    use super::testing::file_with;
    use super::*;
    use crate::models::Ecosystem;

    #[test]
    fn test_read_failure_becomes_error_record() {
        let (deps, errors) = parse_lockfile(
            LockfileKind::CargoLock,
            Path::new("/definitely/not/here/Cargo.lock"),
            |_| Ok(Vec::new()),
        );
        assert!(deps.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].parser, LockfileKind::CargoLock);
    }

    #[test]
    fn test_records_are_tagged_with_lockfile() {
        let f = file_with("x");
        let (deps, errors) = parse_lockfile(LockfileKind::GoMod, f.path(), |_| {
            Ok(vec![FoundDependency::new(
                "a",
                "1",
                Ecosystem::Gomod,
                Transitivity::Direct,
            )])
        });
        assert!(errors.is_empty());
        assert_eq!(deps[0].lockfile_path.as_deref(), Some(f.path()));
    }

    #[test]
    fn test_syntax_error_keeps_line() {
        let f = file_with("x");
        let (_, errors) = parse_lockfile(LockfileKind::GoMod, f.path(), |_| {
            Err(ParseError::Syntax {
                line: 7,
                message: "bad".to_string(),
            })
        });
        assert_eq!(errors[0].line, Some(7));
    }

    #[test]
    fn test_transitivity_without_manifest_is_unknown() {
        let names: DirectNames = Some(["a".to_string()].into_iter().collect());
        assert_eq!(transitivity(&names, "a"), Transitivity::Direct);
        assert_eq!(transitivity(&names, "b"), Transitivity::Transitive);
        assert_eq!(transitivity(&None, "a"), Transitivity::Unknown);
    }
}
