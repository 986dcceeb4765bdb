//! The full repair pipeline: dump + report in, ordered change list out.

use crate::cli::OutputFormat;
use crate::dataflow::cfg::build_cfg;
use crate::dataflow::depgraph::DependencyGraph;
use crate::errors::UnifixResult;
use crate::parse::ast::build_functions;
use crate::parse::dump::Dump;
use crate::parse::tokens::statement_to_string;
use crate::repair::emit::{changes_to_json, highlighted_statement, print_summary};
use crate::repair::link::{LinkedError, connected_error_groups, elect_root, link_errors};
use crate::repair::report::{UnitEnv, UnitReport};
use crate::repair::strategies::{Change, repair_error};
use crate::utils::Config;
use console::style;
use rayon::prelude::*;
use std::fs;

pub fn handle(
    dump_path: &str,
    report_path: &str,
    output: Option<&str>,
    format: Option<OutputFormat>,
    config: &Config,
) -> UnifixResult<()> {
    // When JSON goes to stdout it has to stay machine-parseable, so every
    // human-facing line is either suppressed or routed to stderr.
    let wants_json = matches!(format, Some(OutputFormat::Json))
        || (format.is_none() && config.output.default_format == "json");

    if !wants_json {
        println!(
            "{} {}...\n",
            style("Checking").green().bold(),
            style(dump_path).white().bold()
        );
    }

    let mut dump = Dump::from_file(dump_path)?;
    let report = UnitReport::from_file(report_path)?;
    let env = UnitEnv::from_report(&report);

    // Per-function analysis is independent once the ASTs exist; fan out.
    let functions = build_functions(&mut dump)?;
    let graphs: Vec<DependencyGraph> = functions
        .par_iter()
        .map(|f| build_cfg(&dump, f).map(|cfg| DependencyGraph::build(&dump, cfg)))
        .collect::<UnifixResult<Vec<_>>>()?;

    let (linked, unlinked) = link_errors(&dump, &report.errors, &graphs);
    for e in &unlinked {
        eprintln!(
            "{}: could not locate error site {} ({})",
            style("warning").yellow().bold(),
            e.root_token_id,
            e.error_type
        );
    }

    // One repair per connected error group, rooted at its most ancestral
    // error.
    let groups = connected_error_groups(&linked, &graphs);
    let roots: Vec<usize> = groups.iter().map(|g| elect_root(&linked, g, &graphs)).collect();

    let mut changes: Vec<Change> = Vec::new();
    for &r in &roots {
        let error = linked[r].clone();
        let mut produced = repair_error(
            &mut dump,
            &error,
            &graphs,
            &env,
            config.fixer.max_fixes,
            config.fixer.search_depth,
        );
        if produced.is_empty() {
            continue;
        }
        if config.fixer.interactive {
            produced = select_interactively(&dump, &error, produced)?;
        }
        changes.extend(produced);
    }

    let json_out = changes_to_json(&dump, &changes);
    if let Some(path) = output {
        fs::write(path, serde_json::to_string_pretty(&json_out)?)?;
        eprintln!(
            "{}: change list written to {}\n",
            style("note").green().bold(),
            style(path).underlined()
        );
    }

    if wants_json && output.is_none() {
        println!("{}", serde_json::to_string_pretty(&json_out)?);
    } else if !config.output.quiet {
        let shown = match config.output.max_results {
            Some(n) => &changes[..changes.len().min(n as usize)],
            None => &changes[..],
        };
        print_summary(&dump, shown);
        println!(
            "{} '{}' produced {} change(s) for {} linked error(s).",
            style("summary").green().bold(),
            style(dump_path).white().bold(),
            style(changes.len()).bold(),
            linked.len()
        );
    }

    Ok(())
}

/// Interactive narrowing, driver-side only: for comparisons first pick the
/// side, then pick the candidate to keep.
fn select_interactively(
    dump: &Dump,
    error: &LinkedError,
    mut changes: Vec<Change>,
) -> UnifixResult<Vec<Change>> {
    let line = dump.token(error.error_token).linenr;

    if changes.len() > 1 {
        println!("_______");
        println!("Error statement (line {line}) has two possible sides to fix.");
        println!("Which would you like to fix?");
        for (i, c) in changes.iter().enumerate() {
            println!("{}. {}", i + 1, highlighted_statement(dump, c));
        }
        let pick = prompt_index("Input which statement to fix", changes.len())?;
        changes = vec![changes.remove(pick)];
    }

    let mut change = changes.pop().expect("one change left");
    println!("_______");
    println!("Error statement (line {line}):");
    println!("{}", highlighted_statement(dump, &change));

    if change.candidates.is_empty() {
        println!("{}", style("no candidate found within depth bound").dim());
        return Ok(vec![change]);
    }

    for (i, &cand) in change.candidates.iter().enumerate() {
        println!("{}. {}", i + 1, statement_to_string(dump, cand));
    }
    let pick = prompt_index("Input which change to use", change.candidates.len())?;
    change.candidates = vec![change.candidates.remove(pick)];

    Ok(vec![change])
}

fn prompt_index(prompt: &str, n: usize) -> UnifixResult<usize> {
    let term = console::Term::stdout();
    loop {
        print!("{prompt}: ");
        use std::io::Write;
        std::io::stdout().flush()?;
        let line = term.read_line()?;
        if let Ok(k) = line.trim().parse::<usize>() {
            if (1..=n).contains(&k) {
                return Ok(k - 1);
            }
        }
    }
}
