use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use lockscan::models::{ResolutionMethod, Transitivity};
use lockscan::resolve::ResolutionOutcome;
use lockscan::subproject::{ResolvedSubproject, Subproject};

use super::relative;

/// Render a colored terminal report.
pub fn render(outcome: &ResolutionOutcome, path: &Path, verbose: bool, quiet: bool, tree: bool) -> Result<()> {
    let resolved_count = outcome.resolved_count();
    let unresolved_count = outcome.unresolved.len();
    let dependency_count: usize = outcome
        .all_resolved()
        .map(|s| s.found_dependencies.count())
        .sum();

    if quiet {
        println!(
            "Subprojects: {}  Resolved: {}  Unresolved: {}  Dependencies: {}",
            resolved_count + unresolved_count,
            resolved_count.to_string().green(),
            unresolved_count.to_string().red(),
            dependency_count,
        );
        return Ok(());
    }

    println!("\n {} v{}", "lockscan".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Scanning: {}\n", path.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Subprojects        : {}", resolved_count + unresolved_count)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Resolved        : {:>4}  {}", "✓".green(), resolved_count, ecosystem_summary(outcome))
    );
    println!(
        " │  {:<48} │",
        format!("{}  Unresolved      : {:>4}", "✗".red(), unresolved_count)
    );
    println!(
        " │  {:<48} │",
        format!("Dependencies       : {}", dependency_count)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    for (ecosystem, subprojects) in &outcome.resolved {
        println!(" {} {} subprojects:\n", "[RESOLVED]".green().bold(), ecosystem);
        println!("{}", subproject_table(subprojects, path));
        println!();

        for subproject in subprojects {
            if verbose && !subproject.found_dependencies.is_empty() {
                println!(" {}", relative(subproject.root_dir(), path).bold());
                println!("{}", dependency_table(subproject, path));
                println!();
            }
            if tree {
                println!(" {}", relative(subproject.root_dir(), path).bold());
                print!("{}", indent(&subproject.found_dependencies.tree().to_string()));
                println!();
            }
        }
    }

    if unresolved_count > 0 {
        println!(" {} Subprojects that could not be resolved:\n", "[UNRESOLVED]".red().bold());
        for unresolved in &outcome.unresolved {
            println!("  {} {}", "✗".red(), sources(&unresolved.subproject, path));
            if unresolved.resolution_errors.is_empty() {
                println!("      {}", "no supported parser or resolver".dimmed());
            }
            for error in &unresolved.resolution_errors {
                println!("      {}", error.to_string().red());
            }
        }
        println!();
    }

    let with_errors: Vec<&ResolvedSubproject> = outcome
        .all_resolved()
        .filter(|s| !s.resolution_errors.is_empty())
        .collect();
    if !with_errors.is_empty() {
        println!(" {} Resolved with errors:\n", "[WARN]".yellow().bold());
        for subproject in with_errors {
            println!("  {} {}", "⚠".yellow(), sources(&subproject.subproject, path));
            for error in &subproject.resolution_errors {
                println!("      {}", error.to_string().yellow());
            }
        }
        println!();
    }

    Ok(())
}

fn subproject_table(subprojects: &[ResolvedSubproject], root: &Path) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Root").add_attribute(Attribute::Bold),
            Cell::new("Sources").add_attribute(Attribute::Bold),
            Cell::new("Method").add_attribute(Attribute::Bold),
            Cell::new("Dependencies").add_attribute(Attribute::Bold),
            Cell::new("Errors").add_attribute(Attribute::Bold),
        ]);

    for subproject in subprojects {
        let method_color = match subproject.resolution_method {
            ResolutionMethod::LockfileParsing => Color::Green,
            ResolutionMethod::Dynamic => Color::Cyan,
        };
        let errors = subproject.resolution_errors.len();
        let error_color = if errors > 0 { Color::Yellow } else { Color::DarkGrey };

        table.add_row(vec![
            Cell::new(relative(subproject.root_dir(), root)),
            Cell::new(sources(&subproject.subproject, root)),
            Cell::new(subproject.resolution_method.to_string()).fg(method_color),
            Cell::new(subproject.found_dependencies.count()).set_alignment(CellAlignment::Right),
            Cell::new(errors)
                .fg(error_color)
                .set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

fn dependency_table(subproject: &ResolvedSubproject, root: &Path) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Transitivity").add_attribute(Attribute::Bold),
            Cell::new("Location").add_attribute(Attribute::Bold),
        ]);

    for dep in subproject.found_dependencies.iter() {
        let transitivity_color = match dep.transitivity {
            Transitivity::Direct => Color::Green,
            Transitivity::Transitive => Color::Blue,
            Transitivity::Unknown => Color::DarkGrey,
        };
        let location = match (&dep.lockfile_path, dep.line_number) {
            (Some(lockfile), Some(line)) => format!("{}:{}", relative(lockfile, root), line),
            (Some(lockfile), None) => relative(lockfile, root),
            (None, _) => "-".to_string(),
        };

        table.add_row(vec![
            Cell::new(&dep.package),
            Cell::new(&dep.version),
            Cell::new(dep.transitivity.to_string()).fg(transitivity_color),
            Cell::new(location),
        ]);
    }

    table
}

fn sources(subproject: &Subproject, root: &Path) -> String {
    subproject
        .dependency_source
        .source_files()
        .iter()
        .map(|f| relative(&f.path, root))
        .collect::<Vec<_>>()
        .join(", ")
}

fn ecosystem_summary(outcome: &ResolutionOutcome) -> String {
    let summary: Vec<String> = outcome
        .resolved
        .iter()
        .take(3)
        .map(|(ecosystem, subprojects)| format!("{} ({})", ecosystem, subprojects.len()))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("   {}\n", line)).collect()
}
