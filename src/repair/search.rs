//! Bounded breadth-first search for a unit-balancing rewrite.
//!
//! States are `(mults, divs, unit)`: the variables multiplied in so far,
//! the variables divided by, and the unit the rewritten subtree would
//! have. Expansion draws from the definitions reaching the error site.

use crate::dataflow::reach::ReachDef;
use crate::parse::dump::{Dump, TokenIdx, VarIdx};
use crate::repair::report::UnitEnv;
use crate::repair::units::UnitMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone)]
struct SearchState {
    mults: Vec<VarIdx>,
    divs: Vec<VarIdx>,
    unit: UnitMap,
}

/// Searches for sequences of `t -> t * v` / `t -> t / v` rewrites that
/// take `cur_unit` to `target_unit`, where `v` ranges over variables with
/// a known top-ranked unit whose definitions reach the error site. Returns
/// the candidate replacement subtrees, shortest first.
///
/// A unit value already reached at a shallower level is not expanded
/// again; same-level alternatives all survive, so no single-step candidate
/// is lost to pruning.
pub fn apply_unit_multiplication(
    dump: &mut Dump,
    token_to_fix: TokenIdx,
    cur_unit: &UnitMap,
    target_unit: &UnitMap,
    env: &UnitEnv,
    reach: &HashSet<ReachDef>,
    depth: usize,
) -> Vec<TokenIdx> {
    // Reach variables, deduplicated, with known units, in (name, id) order
    // so candidate order is stable.
    let reach_vars: BTreeSet<VarIdx> = reach.iter().map(|r| r.variable).collect();
    let mut vars: Vec<(VarIdx, UnitMap)> = reach_vars
        .into_iter()
        .filter_map(|v| {
            let unit = env.variable_unit(dump, v)?;
            if unit.is_dimensionless() {
                return None;
            }
            Some((v, unit.clone()))
        })
        .collect();
    vars.sort_by(|(a, _), (b, _)| {
        let va = dump.variable(*a);
        let vb = dump.variable(*b);
        va.name.cmp(&vb.name).then_with(|| va.id.cmp(&vb.id))
    });

    let mut picked: Vec<(Vec<VarIdx>, Vec<VarIdx>)> = Vec::new();
    let mut picked_keys: HashSet<(Vec<VarIdx>, Vec<VarIdx>)> = HashSet::new();
    let mut states = vec![SearchState {
        mults: Vec::new(),
        divs: Vec::new(),
        unit: cur_unit.clone(),
    }];
    let mut seen: HashMap<String, usize> = HashMap::from([(cur_unit.key(), 0)]);

    for level in 0..=depth {
        for s in &states {
            if s.unit == *target_unit {
                // Commutatively equal candidates collapse to one.
                let mut key = (s.mults.clone(), s.divs.clone());
                key.0.sort_unstable();
                key.1.sort_unstable();
                if picked_keys.insert(key) {
                    picked.push((s.mults.clone(), s.divs.clone()));
                }
            }
        }
        if level == depth || states.is_empty() {
            break;
        }

        let mut next_states = Vec::new();
        for s in &states {
            for (v, unit) in &vars {
                if !s.divs.contains(v) {
                    let mut mults = s.mults.clone();
                    mults.push(*v);
                    enqueue(
                        &mut next_states,
                        &mut seen,
                        level + 1,
                        SearchState {
                            mults,
                            divs: s.divs.clone(),
                            unit: s.unit.multiply(unit),
                        },
                    );
                }
                if !s.mults.contains(v) {
                    let mut divs = s.divs.clone();
                    divs.push(*v);
                    enqueue(
                        &mut next_states,
                        &mut seen,
                        level + 1,
                        SearchState {
                            mults: s.mults.clone(),
                            divs,
                            unit: s.unit.divide(unit),
                        },
                    );
                }
            }
        }
        states = next_states;
    }

    debug!(
        target: "fix",
        candidates = picked.len(),
        depth,
        "unit search finished"
    );

    picked
        .iter()
        .map(|(mults, divs)| build_candidate(dump, token_to_fix, mults, divs))
        .collect()
}

fn enqueue(
    states: &mut Vec<SearchState>,
    seen: &mut HashMap<String, usize>,
    level: usize,
    state: SearchState,
) {
    let key = state.unit.key();
    match seen.get(&key) {
        Some(&l) if l < level => {}
        Some(_) => states.push(state),
        None => {
            seen.insert(key, level);
            states.push(state);
        }
    }
}

/// Materializes one candidate: divisions chain left-associated under the
/// preserved `token_to_fix` subtree, the multipliers fold left-associated
/// on top with the divided subtree as the rightmost operand. Injected
/// operators and variable references get fresh ids; the original subtree
/// is referenced, not copied.
fn build_candidate(
    dump: &mut Dump,
    token_to_fix: TokenIdx,
    mults: &[VarIdx],
    divs: &[VarIdx],
) -> TokenIdx {
    let mut node = token_to_fix;
    for &v in divs {
        let var_ref = dump.synth_variable_ref(v);
        let div = dump.synth_token("/");
        dump.set_operands(div, Some(node), Some(var_ref));
        dump.token_mut(var_ref).ast_parent = Some(div);
        if node != token_to_fix {
            dump.token_mut(node).ast_parent = Some(div);
        }
        node = div;
    }

    let Some((&first, rest)) = mults.split_first() else {
        return node;
    };

    let mut acc = dump.synth_variable_ref(first);
    for &v in rest {
        let var_ref = dump.synth_variable_ref(v);
        let mul = dump.synth_token("*");
        dump.set_operands(mul, Some(acc), Some(var_ref));
        dump.token_mut(acc).ast_parent = Some(mul);
        dump.token_mut(var_ref).ast_parent = Some(mul);
        acc = mul;
    }

    let top = dump.synth_token("*");
    dump.set_operands(top, Some(acc), Some(node));
    dump.token_mut(acc).ast_parent = Some(top);
    if node != token_to_fix {
        dump.token_mut(node).ast_parent = Some(top);
    }
    top
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

#[cfg(test)]
fn reach_of(d: &crate::testkit::TestDump, names: &[&str]) -> HashSet<ReachDef> {
    use petgraph::graph::NodeIndex;
    names
        .iter()
        .map(|n| ReachDef {
            def_node: NodeIndex::new(0),
            variable: d.dump.variable_by_id(n).unwrap(),
        })
        .collect()
}

#[test]
fn finds_single_multiplication_within_depth_one() {
    use crate::parse::tokens::statement_to_string;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    d.var("u");

    let env = test_env(&[
        ("x", UnitMap::of(&[("s", 1.0)])),
        ("u", UnitMap::of(&[("m", 1.0), ("s", -1.0)])),
    ]);
    let reach = reach_of(&d, &["u"]);

    let candidates = apply_unit_multiplication(
        &mut d.dump,
        x,
        &UnitMap::of(&[("s", 1.0)]),
        &UnitMap::of(&[("m", 1.0)]),
        &env,
        &reach,
        1,
    );

    assert_eq!(candidates.len(), 1);
    assert_eq!(statement_to_string(&d.dump, candidates[0]), "u * x");
}

#[test]
fn finds_division_candidates() {
    use crate::parse::tokens::statement_to_string;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    d.var("w");

    let env = test_env(&[("w", UnitMap::of(&[("s", 1.0)]))]);
    let reach = reach_of(&d, &["w"]);

    let candidates = apply_unit_multiplication(
        &mut d.dump,
        x,
        &UnitMap::of(&[("m", 1.0), ("s", 1.0)]),
        &UnitMap::of(&[("m", 1.0)]),
        &env,
        &reach,
        3,
    );

    assert!(!candidates.is_empty());
    assert_eq!(statement_to_string(&d.dump, candidates[0]), "x / w");
}

#[test]
fn candidate_products_balance_the_unit() {
    use crate::testkit::TestDump;

    // Soundness: every returned candidate's net unit takes cur to target.
    let mut d = TestDump::new();
    let x = d.var_tok("x");
    d.var("u");
    d.var("w");

    let u_unit = UnitMap::of(&[("m", 1.0), ("s", -1.0)]);
    let w_unit = UnitMap::of(&[("s", 1.0)]);
    let env = test_env(&[("u", u_unit.clone()), ("w", w_unit.clone())]);
    let reach = reach_of(&d, &["u", "w"]);

    let cur = UnitMap::of(&[("s", 1.0)]);
    let target = UnitMap::of(&[("m", 1.0), ("s", 1.0)]);

    let before = d.dump.tokens.len();
    let candidates =
        apply_unit_multiplication(&mut d.dump, x, &cur, &target, &env, &reach, 3);
    assert!(!candidates.is_empty());

    let unit_of = |name: &str| {
        if name == "u" { u_unit.clone() } else { w_unit.clone() }
    };
    for &root in &candidates {
        let mut unit = cur.clone();
        let mut stack = vec![root];
        while let Some(t) = stack.pop() {
            let tok = d.dump.token(t).clone();
            if t != x && tok.variable.is_some() {
                let applied = unit_of(&tok.text);
                // Position under a `/` decides the direction.
                let parent = d.dump.token(tok.ast_parent.unwrap()).clone();
                unit = if parent.text == "/" && parent.ast_operand2 == Some(t) {
                    unit.divide(&applied)
                } else {
                    unit.multiply(&applied)
                };
            }
            if t != x {
                if let Some(l) = tok.ast_operand1 {
                    stack.push(l);
                }
                if let Some(r) = tok.ast_operand2 {
                    stack.push(r);
                }
            }
        }
        assert_eq!(unit, target, "candidate does not balance");
    }

    // Freshness: injected tokens only, all with new ids.
    let input_ids: HashSet<&str> = d.dump.tokens[..before]
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    for t in &d.dump.tokens[before..] {
        assert!(!input_ids.contains(t.id.as_str()));
    }
}

#[test]
fn depth_bound_limits_the_search() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    d.var("u");

    // Reaching the target needs two multiplications; depth 1 cannot.
    let env = test_env(&[("u", UnitMap::of(&[("m", 1.0)]))]);
    let reach = reach_of(&d, &["u"]);

    let candidates = apply_unit_multiplication(
        &mut d.dump,
        x,
        &UnitMap::new(),
        &UnitMap::of(&[("m", 2.0)]),
        &env,
        &reach,
        1,
    );
    assert!(candidates.is_empty());
}

#[test]
fn unknown_units_are_skipped_not_fatal() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    d.var("mystery");

    let env = test_env(&[]);
    let reach = reach_of(&d, &["mystery"]);

    let candidates = apply_unit_multiplication(
        &mut d.dump,
        x,
        &UnitMap::of(&[("s", 1.0)]),
        &UnitMap::of(&[("m", 1.0)]),
        &env,
        &reach,
        3,
    );
    assert!(candidates.is_empty());
}
