//! Gitignore-style path filtering.
//!
//! - [`parser`] — turns rule files (with `:include` directives) into glob patterns.
//! - [`FileIgnore`] — the compiled filter, answering whether a path survives.

pub mod parser;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::error::IgnoreError;
use parser::{to_globs, unescape, RuleParser};

/// Default name of the ignore file looked up at the project root.
pub const IGNORE_FILE_NAME: &str = ".lockscanignore";

const TOO_MUCH_DATA: &str = "<SKIPPED DATA: too many entries to list>";

/// Shell-style matching: `*` may cross `/`, `**` spans whole components.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Result of [`FileIgnore::filter_paths`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilteredFiles {
    pub kept: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
}

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    pattern: Pattern,
}

/// A compiled ignore filter rooted at `base_path`.
#[derive(Debug)]
pub struct FileIgnore {
    base_path: PathBuf,
    patterns: Vec<CompiledPattern>,
    max_log_list_entries: usize,
    cache: Mutex<HashMap<(PathBuf, bool), bool>>,
}

impl FileIgnore {
    /// Compile a filter from raw rule lines as they appear in an ignore file
    /// located in `base_path`.
    pub fn from_unprocessed_patterns<'a, I>(
        base_path: &Path,
        lines: I,
        max_log_list_entries: usize,
    ) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let base_path = absolutize(base_path);
        let rule_file = base_path.join(IGNORE_FILE_NAME);
        let tokens = RuleParser::new(rule_file, &base_path).parse(lines)?;
        Ok(Self::from_tokens(base_path, tokens, max_log_list_entries))
    }

    /// Load the rule file at `ignore_file`. A missing file yields a filter
    /// that keeps everything.
    pub fn from_file(
        base_path: &Path,
        ignore_file: &Path,
        max_log_list_entries: usize,
    ) -> Result<Self, IgnoreError> {
        let base_path = absolutize(base_path);
        if !ignore_file.is_file() {
            debug!("No ignore file at {}", ignore_file.display());
            return Ok(Self::from_tokens(base_path, Vec::new(), max_log_list_entries));
        }
        let content = std::fs::read_to_string(ignore_file).map_err(|source| IgnoreError::Io {
            path: ignore_file.to_path_buf(),
            source,
        })?;
        let include_base = ignore_file
            .parent()
            .map(absolutize)
            .unwrap_or_else(|| base_path.clone());
        let tokens = RuleParser::new(ignore_file, include_base).parse(content.lines())?;
        Ok(Self::from_tokens(base_path, tokens, max_log_list_entries))
    }

    fn from_tokens(base_path: PathBuf, tokens: Vec<String>, max_log_list_entries: usize) -> Self {
        let globs: BTreeSet<String> = tokens
            .iter()
            .flat_map(|token| to_globs(&unescape(token)))
            .collect();
        let patterns = globs.into_iter().filter_map(compile).collect();
        Self {
            base_path,
            patterns,
            max_log_list_entries,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The compiled glob patterns, sorted.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.source.as_str())
    }

    /// Whether `path` is kept by the filter. `is_dir` makes folder-only
    /// patterns (`build/`) apply.
    pub fn survives(&self, path: &Path, is_dir: bool) -> bool {
        let path = absolutize(path);
        let key = (path, is_dir);
        if let Ok(cache) = self.cache.lock() {
            if let Some(&hit) = cache.get(&key) {
                return hit;
            }
        }
        let result = self.compute_survives(&key.0, is_dir);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, result);
        }
        result
    }

    fn compute_survives(&self, path: &Path, is_dir: bool) -> bool {
        let (mut matchable, inside_base) = match path.strip_prefix(&self.base_path) {
            Ok(rel) => (slash_joined(rel), true),
            Err(_) => (path.to_string_lossy().into_owned(), false),
        };
        if inside_base && matchable.is_empty() {
            return true;
        }
        if is_dir {
            matchable.push('/');
        }

        !self
            .patterns
            .iter()
            .filter(|p| inside_base || p.source.starts_with("**/"))
            .any(|p| p.pattern.matches_with(&matchable, MATCH_OPTIONS))
    }

    /// Partition existing paths into kept and removed, in sorted order.
    pub fn filter_paths<I>(&self, candidates: I) -> FilteredFiles
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let sorted: BTreeSet<PathBuf> = candidates.into_iter().collect();
        let mut filtered = FilteredFiles::default();
        for path in sorted {
            if self.keeps(&path) {
                filtered.kept.insert(path);
            } else {
                filtered.removed.insert(path);
            }
        }

        let limit = self.max_log_list_entries;
        if limit > 0 && filtered.removed.len() > limit {
            debug!("Ignoring {} paths due to ignore rules:", filtered.removed.len());
            debug!("{}", TOO_MUCH_DATA);
        } else {
            for path in &filtered.removed {
                debug!("Ignoring {} due to ignore rules", path.display());
            }
        }
        filtered
    }

    fn keeps(&self, path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        let absolute = absolutize(path);
        absolute == self.base_path || self.survives(&absolute, absolute.is_dir())
    }
}

fn compile(glob: String) -> Option<CompiledPattern> {
    let pattern = Pattern::new(&glob).or_else(|_| Pattern::new(&glob.replace("**", "*")));
    match pattern {
        Ok(pattern) => Some(CompiledPattern {
            source: glob,
            pattern,
        }),
        Err(e) => {
            warn!("Dropping ignore pattern '{}': {}", glob, e);
            None
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn slash_joined(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
