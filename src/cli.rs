use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "lockscan",
    about = "Find dependency manifests and lockfiles and resolve their dependency graphs",
    version
)]
pub struct Cli {
    /// Project path to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file [default: ./.lockscan/config.toml, fallback ~/.config/lockscan/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ignore file [default: <PATH>/.lockscanignore]
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,

    /// Resolve manifests without a lockfile through the resolver command
    #[arg(long)]
    pub allow_dynamic_resolution: bool,

    /// Prefer a dynamically built graph over the lockfile for pom.xml and build.gradle
    #[arg(long = "prioritize-dependency-graph")]
    pub prioritize_dependency_graph: bool,

    /// Command used for dynamic resolution (reads a JSON request on stdin)
    #[arg(long, value_name = "COMMAND")]
    pub resolver_cmd: Option<String>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Print the dependency tree of every resolved subproject
    #[arg(long)]
    pub tree: bool,

    /// Exit with code 1 when a subproject could not be resolved
    #[arg(long)]
    pub fail_on_unresolved: bool,

    /// Show debug logs and every dependency
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
