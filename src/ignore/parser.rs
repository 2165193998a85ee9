//! Parsing of ignore rule files into glob patterns.
//!
//! The syntax mirrors gitignore with these differences:
//! - negated patterns (`!foo`) and character classes (`[abc]`) are dropped,
//!   so that a generic `.gitignore` can be included without errors;
//! - `:include <path>` splices in another rule file, resolved relative to
//!   the directory of the file containing the directive;
//! - any other line beginning with `:` is an error, `\:` escapes a literal
//!   leading colon.
//!
//! [`RuleParser`] produces raw gitignore tokens; [`to_globs`] and
//! [`unescape`] turn each token into the glob patterns actually matched.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::IgnoreError;

/// Hard limit on `:include` nesting.
pub const MAX_INCLUDE_DEPTH: usize = 32;

const INCLUDE_DIRECTIVE: &str = ":include ";

/// Parser for one rule file.
///
/// `base_path` is the directory `:include` targets are resolved against.
/// `stack` holds the canonical paths of the files currently being parsed,
/// outermost first.
#[derive(Debug, Clone)]
pub struct RuleParser {
    file_path: PathBuf,
    base_path: PathBuf,
    stack: Vec<PathBuf>,
}

impl RuleParser {
    pub fn new(file_path: impl Into<PathBuf>, base_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let stack = file_path.canonicalize().into_iter().collect();
        Self {
            file_path,
            base_path: base_path.into(),
            stack,
        }
    }

    /// Parse rule lines into raw gitignore tokens, in file order.
    pub fn parse<'a, I>(&self, lines: I) -> Result<Vec<String>, IgnoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = Vec::new();
        for (idx, line) in lines.into_iter().enumerate() {
            let pattern = remove_comment(line);
            if !is_supported(pattern) {
                continue;
            }
            tokens.extend(self.expand_directive(pattern, idx + 1)?);
        }
        Ok(tokens)
    }

    fn expand_directive(&self, line: &str, line_no: usize) -> Result<Vec<String>, IgnoreError> {
        if let Some(target) = line.strip_prefix(INCLUDE_DIRECTIVE) {
            return self.include(target.trim());
        }
        if line == ":" {
            return Ok(Vec::new());
        }
        if line.starts_with(':') {
            return Err(IgnoreError::UnknownDirective {
                path: self.file_path.clone(),
                line: line_no,
                directive: line.to_string(),
            });
        }
        Ok(vec![line.to_string()])
    }

    fn include(&self, target: &str) -> Result<Vec<String>, IgnoreError> {
        let include_path = self.base_path.join(target);
        if !include_path.is_file() {
            debug!(
                "Skipping `:include {}` directive, file not found",
                include_path.display()
            );
            return Ok(Vec::new());
        }

        let canonical = include_path
            .canonicalize()
            .map_err(|source| IgnoreError::Io {
                path: include_path.clone(),
                source,
            })?;
        if self.stack.contains(&canonical) {
            let chain = self
                .stack
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(IgnoreError::IncludeCycle {
                path: include_path,
                chain,
            });
        }
        if self.stack.len() >= MAX_INCLUDE_DEPTH {
            return Err(IgnoreError::IncludeTooDeep {
                path: include_path,
                limit: MAX_INCLUDE_DEPTH,
            });
        }

        let content = std::fs::read_to_string(&include_path).map_err(|source| IgnoreError::Io {
            path: include_path.clone(),
            source,
        })?;
        let sub_base = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_path.clone());
        let mut stack = self.stack.clone();
        stack.push(canonical);
        let sub_parser = RuleParser {
            file_path: include_path,
            base_path: sub_base,
            stack,
        };
        debug!("Including ignore rules from {}", sub_parser.file_path.display());
        sub_parser.parse(content.lines())
    }
}

/// Strip a trailing comment. A `#` starts a comment at the beginning of the
/// line or after whitespace; anything else is part of the pattern.
pub fn remove_comment(line: &str) -> &str {
    let mut prev: Option<char> = None;
    for (i, c) in line.char_indices() {
        if c == '#' && prev.map_or(true, char::is_whitespace) {
            return line[..i].trim_end();
        }
        prev = Some(c);
    }
    line.trim_end()
}

fn is_supported(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    let has_class = line
        .find('[')
        .is_some_and(|open| line[open + 1..].contains(']'));
    if line.starts_with('!') || has_class {
        debug!("Skipping unsupported gitignore pattern '{}'", line);
        return false;
    }
    true
}

/// Drop escaping backslashes, keeping the escaped character.
pub fn unescape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut escaped = false;
    for c in token.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert one gitignore token into glob patterns.
///
/// | token  | globs                      |
/// |--------|----------------------------|
/// | `a`    | `a`, `a/**`, `**/a`, `**/a/**` |
/// | `a/`   | `a/**`, `**/a/**`          |
/// | `/a`   | `a`, `a/**`                |
/// | `/a/`  | `a/**`                     |
/// | `a/b`  | `a/b`, `a/b/**`            |
pub fn to_globs(token: &str) -> Vec<String> {
    let is_folder = token.ends_with('/');
    let trimmed = token.trim_end_matches('/');
    let is_anchored = trimmed.contains('/');

    let pat = if is_anchored {
        trimmed
            .strip_prefix("./")
            .unwrap_or(trimmed)
            .trim_start_matches('/')
    } else {
        trimmed
    };
    if pat.is_empty() {
        return Vec::new();
    }

    let mut globs = vec![format!("{}/**", pat)];
    if !is_folder {
        globs.push(pat.to_string());
    }
    if !is_anchored {
        globs.push(format!("**/{}/**", pat));
        if !is_folder {
            globs.push(format!("**/{}", pat));
        }
    }
    globs
}
