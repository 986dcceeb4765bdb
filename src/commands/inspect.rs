//! Prints an intermediate pipeline stage for debugging and for golden
//! files: the statement AST, the CFG, or the dependency graph.

use crate::cli::Stage;
use crate::dataflow::cfg::build_cfg;
use crate::dataflow::depgraph::DependencyGraph;
use crate::errors::UnifixResult;
use crate::parse::ast::{FunctionAst, build_functions, render_ast};
use crate::parse::dump::Dump;
use serde_json::json;

pub fn handle(
    dump_path: &str,
    stage: Stage,
    function: Option<&str>,
    text: bool,
) -> UnifixResult<()> {
    let mut dump = Dump::from_file(dump_path)?;
    let functions = build_functions(&mut dump)?;
    let selected: Vec<&FunctionAst> = functions
        .iter()
        .filter(|f| function.is_none_or(|n| f.name == n))
        .collect();

    match stage {
        Stage::Ast => {
            if text {
                for f in &selected {
                    println!("{}", render_ast(&dump, f));
                }
            } else {
                let v: Vec<_> = selected.iter().map(|f| f.to_json(&dump)).collect();
                println!("{}", serde_json::to_string_pretty(&json!(v))?);
            }
        }
        Stage::Cfg => {
            let mut out = serde_json::Map::new();
            for f in &selected {
                let cfg = build_cfg(&dump, f)?;
                out.insert(f.name.clone(), cfg.to_json(&dump));
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Stage::Deps => {
            let mut out = serde_json::Map::new();
            for f in &selected {
                let cfg = build_cfg(&dump, f)?;
                let deps = DependencyGraph::build(&dump, cfg);
                out.insert(f.name.clone(), deps.to_json(&dump));
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
