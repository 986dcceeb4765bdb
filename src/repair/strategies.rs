//! Per-error-type repair strategies. Each produces `Change`s: the token to
//! replace and a ranked list of candidate replacement subtrees.

use crate::dataflow::depgraph::DependencyGraph;
use crate::parse::dump::{Dump, TokenIdx};
use crate::parse::tokens::{lhs_of, statement_tokens, vars_of};
use crate::repair::link::LinkedError;
use crate::repair::report::{ErrorKind, UnitEnv};
use crate::repair::search::apply_unit_multiplication;
use crate::repair::units::UnitMap;
use tracing::debug;

/// A repair directive: replace `token_to_fix` by one of `candidates`.
#[derive(Debug, Clone)]
pub struct Change {
    pub token_to_fix: TokenIdx,
    pub candidates: Vec<TokenIdx>,
}

/// Dispatches on the error type. Unsupported types yield no changes; a
/// supported error that admits no rewrite within the depth bound yields a
/// `Change` with an empty candidate list.
pub fn repair_error(
    dump: &mut Dump,
    error: &LinkedError,
    graphs: &[DependencyGraph],
    env: &UnitEnv,
    max_fixes: usize,
    search_depth: usize,
) -> Vec<Change> {
    match error.kind {
        ErrorKind::AdditionOfIncompatibleUnits => {
            fix_addition_subtraction(dump, error, graphs, env, max_fixes, search_depth)
                .into_iter()
                .collect()
        }
        ErrorKind::ComparisonIncompatibleUnits => {
            fix_comparison(dump, error, graphs, env, max_fixes, search_depth)
        }
        _ => {
            debug!(target: "fix", kind = %error.kind, "unsupported error type, skipping");
            Vec::new()
        }
    }
}

/// `ADDITION_OF_INCOMPATIBLE_UNITS`: find the assignment's LHS unit, walk
/// the inverse-unit chain down to the offending `+`/`-`, pick the operand
/// whose unit misses the target, descend through nested additions on that
/// side, and search for a rewrite of the stopping token.
fn fix_addition_subtraction(
    dump: &mut Dump,
    error: &LinkedError,
    graphs: &[DependencyGraph],
    env: &UnitEnv,
    max_fixes: usize,
    search_depth: usize,
) -> Option<Change> {
    let tokens = statement_tokens(dump, error.root_token);
    let lhs = lhs_of(dump, &tokens)?;
    let lhs_var = vars_of(dump, lhs).into_iter().next()?;
    let lhs_unit = env.variable_unit(dump, lhs_var)?.clone();

    let target = env.inverse_unit(dump, &lhs_unit, error.error_token);

    let etok = dump.token(error.error_token);
    let left = etok.ast_operand1?;
    let right = etok.ast_operand2?;
    let left_unit = env.operand_unit(dump, left);
    let right_unit = env.operand_unit(dump, right);

    // Only one operand is assumed wrong; the right one is checked first.
    let (mut cur, fallback_unit, wrong_on_right) = if right_unit.as_ref() != Some(&target) {
        (right, right_unit, true)
    } else {
        (left, left_unit, false)
    };

    // Descend nested `+`/`-` on the same side; variables, calls, products
    // and quotients are rewrite targets, as is any leaf.
    loop {
        let tok = dump.token(cur);
        if tok.variable.is_some() || matches!(tok.text.as_str(), "(" | "*" | "/") {
            break;
        }
        if matches!(tok.text.as_str(), "+" | "-") {
            let next = if wrong_on_right {
                tok.ast_operand2
            } else {
                tok.ast_operand1
            };
            if let Some(n) = next {
                cur = n;
                continue;
            }
        }
        break;
    }
    let token_to_fix = cur;

    let cur_unit = env
        .operand_unit(dump, token_to_fix)
        .or(fallback_unit)
        .unwrap_or_else(UnitMap::new);

    let reach = graphs[error.graph].reach[&error.cfg_node].clone();
    let mut candidates = apply_unit_multiplication(
        dump,
        token_to_fix,
        &cur_unit,
        &target,
        env,
        &reach,
        search_depth,
    );
    candidates.truncate(max_fixes);

    debug!(
        target: "fix",
        candidates = candidates.len(),
        "addition/subtraction fix computed"
    );
    Some(Change {
        token_to_fix,
        candidates,
    })
}

/// `COMPARISON_INCOMPATIBLE_UNITS`: both sides are equally plausible, so
/// emit one `Change` per side, each targeting the other side's unit.
fn fix_comparison(
    dump: &mut Dump,
    error: &LinkedError,
    graphs: &[DependencyGraph],
    env: &UnitEnv,
    max_fixes: usize,
    search_depth: usize,
) -> Vec<Change> {
    let etok = dump.token(error.error_token);
    let (Some(left), Some(right)) = (etok.ast_operand1, etok.ast_operand2) else {
        return Vec::new();
    };

    let left_unit = env.operand_unit(dump, left).unwrap_or_default();
    let right_unit = env.operand_unit(dump, right).unwrap_or_default();
    let reach = graphs[error.graph].reach[&error.cfg_node].clone();

    let mut changes = Vec::new();
    for (token, cur, target) in [
        (left, &left_unit, &right_unit),
        (right, &right_unit, &left_unit),
    ] {
        let mut candidates =
            apply_unit_multiplication(dump, token, cur, target, env, &reach, search_depth);
        candidates.truncate(max_fixes);
        changes.push(Change {
            token_to_fix: token,
            candidates,
        });
    }

    changes
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
fn test_env(vars: &[(&str, UnitMap)]) -> UnitEnv {
    use crate::repair::report::PhysVar;
    let mut env = UnitEnv::default();
    for (name, unit) in vars {
        env.vars.insert(
            name.to_string(),
            PhysVar {
                var_name: name.to_string(),
                var_id: name.to_string(),
                units: vec![unit.clone()],
            },
        );
    }
    env
}

#[test]
fn addition_fix_multiplies_in_a_reaching_variable() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::parse::tokens::statement_to_string;
    use crate::repair::link::link_errors;
    use crate::repair::report::ReportedError;
    use crate::testkit::TestDump;

    // u = 5; v = t + x;  with v: m, t: m, x: s, u: m/s; the search finds
    // `x -> u * x`.
    let mut d = TestDump::new();
    let u_stmt = d.assign_lit("u", "5");
    let v_tok = d.var_tok("v");
    let eq = d.tok("=");
    let t_use = d.var_tok("t");
    let plus = d.tok("+");
    let x_use = d.var_tok("x");
    d.wire(plus, t_use, x_use);
    d.wire(eq, v_tok, plus);

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: u_stmt },
        Statement::Block { root: eq },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let env = test_env(&[
        ("v", UnitMap::of(&[("m", 1.0)])),
        ("t", UnitMap::of(&[("m", 1.0)])),
        ("x", UnitMap::of(&[("s", 1.0)])),
        ("u", UnitMap::of(&[("m", 1.0), ("s", -1.0)])),
    ]);

    let reported = vec![ReportedError {
        root_token_id: d.dump.token(eq).id.clone(),
        token_id: d.dump.token(plus).id.clone(),
        error_type: ErrorKind::AdditionOfIncompatibleUnits,
    }];
    let (linked, _) = link_errors(&d.dump, &reported, &graphs);
    assert_eq!(linked.len(), 1);

    let changes = repair_error(&mut d.dump, &linked[0], &graphs, &env, 5, 5);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].token_to_fix, x_use);
    assert!(!changes[0].candidates.is_empty());
    assert_eq!(
        statement_to_string(&d.dump, changes[0].candidates[0]),
        "u * x"
    );
}

#[test]
fn comparison_fix_emits_one_change_per_side() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::parse::tokens::statement_to_string;
    use crate::repair::link::link_errors;
    use crate::repair::report::ReportedError;
    use crate::testkit::TestDump;

    // a = 1; b = 2; w = 3; if (a < b) ... with a: m, b: s, w: m/s:
    // fixing `a` divides by w, fixing `b` multiplies by w.
    let mut d = TestDump::new();
    let a_stmt = d.assign_lit("a", "1");
    let b_stmt = d.assign_lit("b", "2");
    let w_stmt = d.assign_lit("w", "3");
    let if_kw = d.tok("if");
    let if_paren = d.tok("(");
    let a_use = d.var_tok("a");
    let lt = d.tok("<");
    let b_use = d.var_tok("b");
    d.wire(lt, a_use, b_use);
    d.wire(if_paren, if_kw, lt);
    let body = d.assign_lit("y", "4");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a_stmt },
        Statement::Block { root: b_stmt },
        Statement::Block { root: w_stmt },
        Statement::If {
            condition: lt,
            condition_true: vec![Statement::Block { root: body }],
            condition_false: vec![],
        },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let env = test_env(&[
        ("a", UnitMap::of(&[("m", 1.0)])),
        ("b", UnitMap::of(&[("s", 1.0)])),
        ("w", UnitMap::of(&[("m", 1.0), ("s", -1.0)])),
    ]);

    let reported = vec![ReportedError {
        root_token_id: d.dump.token(if_paren).id.clone(),
        token_id: d.dump.token(lt).id.clone(),
        error_type: ErrorKind::ComparisonIncompatibleUnits,
    }];
    let (linked, _) = link_errors(&d.dump, &reported, &graphs);
    assert_eq!(linked.len(), 1);

    let changes = repair_error(&mut d.dump, &linked[0], &graphs, &env, 5, 5);
    assert_eq!(changes.len(), 2);

    assert_eq!(changes[0].token_to_fix, a_use);
    assert!(!changes[0].candidates.is_empty());
    assert_eq!(
        statement_to_string(&d.dump, changes[0].candidates[0]),
        "a / w"
    );

    assert_eq!(changes[1].token_to_fix, b_use);
    assert!(!changes[1].candidates.is_empty());
    assert_eq!(
        statement_to_string(&d.dump, changes[1].candidates[0]),
        "b * w"
    );
}

#[test]
fn unsupported_error_types_yield_no_changes() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::repair::link::link_errors;
    use crate::repair::report::ReportedError;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let a_stmt = d.assign_lit("a", "1");
    let ast = test_ast(&mut d, vec![Statement::Block { root: a_stmt }]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let reported = vec![ReportedError {
        root_token_id: d.dump.token(a_stmt).id.clone(),
        token_id: d.dump.token(a_stmt).id.clone(),
        error_type: ErrorKind::Other("UNIT_SMELL".to_owned()),
    }];
    let (linked, _) = link_errors(&d.dump, &reported, &graphs);

    let env = UnitEnv::default();
    let changes = repair_error(&mut d.dump, &linked[0], &graphs, &env, 5, 5);
    assert!(changes.is_empty());
}
