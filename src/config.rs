use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use lockscan::ignore::IGNORE_FILE_NAME;
use lockscan::resolve::ResolveOptions;

/// Root configuration structure, deserialized from `.lockscan/config.toml`.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub resolution: ResolutionConfig,
    pub resolver: ResolverConfig,
    pub ignore: IgnoreConfig,
}

/// How subprojects without a usable lockfile are handled.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Run the resolver command for manifests without a lockfile.
    pub allow_dynamic: bool,
    /// Prefer the resolver over the lockfile for Maven and Gradle projects.
    pub prioritize_dependency_graph: bool,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Command line of the external resolver.
    pub command: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Ignore file, relative to the project root unless absolute.
    pub file: Option<PathBuf>,
    /// Past this many ignored paths, log a single notice instead of each path.
    /// `0` lists every path.
    pub max_log_list_entries: usize,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        IgnoreConfig {
            file: None,
            max_log_list_entries: 100,
        }
    }
}

impl Config {
    /// Resolution options after applying command-line flags, which can only
    /// switch features on.
    pub fn resolve_options(&self, allow_dynamic: bool, prioritize: bool) -> ResolveOptions {
        ResolveOptions {
            enable_dynamic_resolution: allow_dynamic || self.resolution.allow_dynamic,
            prioritize_dependency_graph_generation: prioritize
                || self.resolution.prioritize_dependency_graph,
        }
    }

    /// The resolver command, the flag taking precedence over the config.
    pub fn resolver_command<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.resolver.command.as_deref())
            .filter(|cmd| !cmd.trim().is_empty())
    }

    /// The ignore file to load for `project_path`.
    pub fn ignore_file(&self, project_path: &Path, flag: Option<&Path>) -> PathBuf {
        match flag.or(self.ignore.file.as_deref()) {
            Some(file) if file.is_absolute() => file.to_path_buf(),
            Some(file) => project_path.join(file),
            None => project_path.join(IGNORE_FILE_NAME),
        }
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.lockscan/config.toml`
/// 3. `~/.config/lockscan/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".lockscan").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("lockscan").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}
