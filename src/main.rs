//! `lockscan` — find dependency manifests and lockfiles and resolve their
//! dependency graphs.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`config::load_config`]) and the project's ignore file.
//! 3. Collect dependency source files ([`lockscan::targets::collect_candidates`]).
//! 4. Group them into subprojects and resolve each one ([`lockscan::resolve`]).
//! 5. Render the requested report ([`report`]).
//! 6. Exit `0`, or `1` with `--fail-on-unresolved` when a subproject is left unresolved.

mod cli;
mod config;
mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use config::load_config;
use lockscan::ignore::FileIgnore;
use lockscan::matcher::{default_matchers, find_subprojects};
use lockscan::resolve::{CommandResolver, ParserRegistry, Resolver};
use lockscan::targets::collect_candidates;

fn init_logging(verbose: bool) {
    let default = if verbose { "lockscan=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .with_context(|| format!("cannot scan {}", cli.path.display()))?;

    let config = load_config(&path, cli.config.as_deref())?;
    let options = config.resolve_options(cli.allow_dynamic_resolution, cli.prioritize_dependency_graph);

    let ignore_file = config.ignore_file(&path, cli.ignore_file.as_deref());
    let ignore = FileIgnore::from_file(&path, &ignore_file, config.ignore.max_log_list_entries)?;
    debug!("{} ignore patterns from {}", ignore.patterns().count(), ignore_file.display());

    let mut resolver = Resolver::new(ParserRegistry::default(), options);
    match config.resolver_command(cli.resolver_cmd.as_deref()) {
        Some(command) => {
            resolver = resolver.with_dynamic_resolver(Box::new(CommandResolver::from_command_line(command)?));
        }
        None if options.enable_dynamic_resolution => {
            warn!("Dynamic resolution is enabled but no resolver command is configured");
        }
        None => {}
    }

    let matchers = default_matchers();
    let candidates = collect_candidates(&path, &ignore, &matchers);
    let subprojects = find_subprojects(candidates, &path, &matchers);

    if subprojects.is_empty() {
        eprintln!("No dependency manifests or lockfiles found in {}", path.display());
        std::process::exit(1);
    }

    let show_progress = !cli.quiet && cli.report == ReportFormat::Terminal;
    let pb = if show_progress {
        let pb = ProgressBar::new(subprojects.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let outcome = resolver.resolve_all(subprojects, |subproject| {
        if let Some(pb) = &pb {
            pb.set_message(subproject.root_dir.display().to_string());
            pb.inc(1);
        }
    });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !cli.quiet && cli.report == ReportFormat::Terminal {
        for (ecosystem, subprojects) in &outcome.resolved {
            eprintln!("  {} {} {} subprojects", "→".cyan(), ecosystem, subprojects.len());
        }
    }

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&outcome, &path, cli.verbose, cli.quiet, cli.tree)?;
        }
        ReportFormat::Json => {
            report::json::render(&outcome, &path)?;
        }
    }

    // Exit code: 1 if asked to fail on unresolved subprojects
    if cli.fail_on_unresolved && !outcome.unresolved.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
