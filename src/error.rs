use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while compiling ignore rules. These abort the run.
#[derive(Error, Debug)]
pub enum IgnoreError {
    #[error("unknown ignore directive in {}, line {line}: '{directive}'", path.display())]
    UnknownDirective {
        path: PathBuf,
        line: usize,
        directive: String,
    },

    #[error("{} includes itself (include chain: {})", path.display(), chain)]
    IncludeCycle { path: PathBuf, chain: String },

    #[error("include nesting deeper than {limit} levels at {}", path.display())]
    IncludeTooDeep { path: PathBuf, limit: usize },

    #[error("failed to read ignore file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised inside a single lockfile parser.
///
/// These never escape the parser registry: they are turned into
/// [`DependencyParserError`](crate::models::DependencyParserError) records.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

impl ParseError {
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. } => Some(*line),
            ParseError::Json(e) => Some(e.line()),
            _ => None,
        }
    }
}

/// Transport failures of the dynamic resolver. Logged, then treated as
/// "no response".
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("no resolver command configured")]
    NotConfigured,

    #[error("failed to run resolver `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("resolver `{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("could not decode resolver output: {0}")]
    Decode(#[from] serde_json::Error),
}
