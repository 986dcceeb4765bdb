//! Turns `Change`s into machine output for the downstream rewriter and a
//! styled console summary for humans.

use crate::parse::dump::{Dump, TokenIdx};
use crate::parse::tokens::{root_of, statement_tokens, statement_to_string};
use crate::repair::strategies::Change;
use console::style;
use serde_json::{Value, json};
use std::collections::HashSet;

/// Recursive token-tree serialization. Fresh candidate trees and the
/// preserved original subtree serialize the same way, so the rewriter can
/// splice either.
pub fn expr_to_json(dump: &Dump, root: TokenIdx) -> Value {
    let tok = dump.token(root);
    json!({
        "id": tok.id,
        "str": tok.text,
        "variable": tok.variable.map(|v| dump.variable(v).id.clone()),
        "left": tok.ast_operand1.map(|t| expr_to_json(dump, t)),
        "right": tok.ast_operand2.map(|t| expr_to_json(dump, t)),
    })
}

/// The ordered change list as handed to the rewriter.
pub fn changes_to_json(dump: &Dump, changes: &[Change]) -> Value {
    let entries: Vec<Value> = changes
        .iter()
        .map(|c| {
            let tok = dump.token(c.token_to_fix);
            let statement_root = root_of(dump, c.token_to_fix);
            json!({
                "token_to_fix": {
                    "id": tok.id,
                    "str": tok.text,
                    "linenr": tok.linenr,
                },
                "statement": statement_to_string(dump, statement_root),
                "candidates": c.candidates.iter().map(|&cand| json!({
                    "expr": statement_to_string(dump, cand),
                    "tree": expr_to_json(dump, cand),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "changes": entries })
}

/// The offending statement with the span to be replaced highlighted.
pub fn highlighted_statement(dump: &Dump, change: &Change) -> String {
    let statement_root = root_of(dump, change.token_to_fix);
    let marked: HashSet<TokenIdx> = statement_tokens(dump, change.token_to_fix)
        .into_iter()
        .collect();

    statement_tokens(dump, statement_root)
        .into_iter()
        .map(|t| {
            let text = dump.token(t).text.as_str();
            if marked.contains(&t) {
                style(text).red().bold().to_string()
            } else {
                text.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-facing summary of every change and its candidates.
pub fn print_summary(dump: &Dump, changes: &[Change]) {
    for (i, change) in changes.iter().enumerate() {
        let line = dump.token(change.token_to_fix).linenr;
        println!(
            "{} {} (line {}):",
            style(format!("fix {}", i + 1)).green().bold(),
            highlighted_statement(dump, change),
            line
        );
        if change.candidates.is_empty() {
            println!("  {}", style("no candidate found within depth bound").dim());
        }
        for (j, &cand) in change.candidates.iter().enumerate() {
            println!(
                "  {:>2}. {}",
                j + 1,
                style(statement_to_string(dump, cand)).bold()
            );
        }
        println!();
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[test]
fn serializes_candidate_trees_with_operands() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    let u = d.var("u");
    let u_ref = d.dump.synth_variable_ref(u);
    let mul = d.dump.synth_token("*");
    d.dump.set_operands(mul, Some(u_ref), Some(x));

    let v = expr_to_json(&d.dump, mul);
    assert_eq!(v["str"], "*");
    assert_eq!(v["left"]["str"], "u");
    assert_eq!(v["left"]["variable"], "u");
    assert_eq!(v["right"]["str"], "x");
    assert!(v["left"]["left"].is_null());
}

#[test]
fn change_list_keeps_order_and_statements() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let eq = d.assign_binop("v", "t", "+", "x");
    let x_use = d.dump.token(eq).ast_operand2.and_then(|plus| {
        d.dump.token(plus).ast_operand2
    }).unwrap();

    let changes = vec![Change {
        token_to_fix: x_use,
        candidates: vec![],
    }];
    let v = changes_to_json(&d.dump, &changes);
    assert_eq!(v["changes"][0]["statement"], "v = t + x");
    assert_eq!(v["changes"][0]["token_to_fix"]["str"], "x");
    assert_eq!(v["changes"][0]["candidates"], json!([]));
}
