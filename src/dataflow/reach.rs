//! Def/use sets and the reaching-definitions fixpoint.

use crate::dataflow::cfg::{CfgNode, FunctionCfg};
use crate::parse::dump::{Dump, VarIdx};
use crate::parse::tokens::{lhs_of, rhs_of, statement_tokens, vars_of};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Variables written and read by one CFG node.
#[derive(Debug, Clone, Default)]
pub struct DefUse {
    pub defines: BTreeSet<VarIdx>,
    pub uses: BTreeSet<VarIdx>,
}

/// A definition of `variable` at `def_node` that survives to the point of
/// interest. Plain value identity: two pairs are the same reach-def.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReachDef {
    pub def_node: NodeIndex,
    pub variable: VarIdx,
}

/// Def/use for every node. `Entry` defines the formal arguments; a basic
/// block splits at its first `=`; a conditional only reads its condition.
pub fn def_use_pairs(dump: &Dump, cfg: &FunctionCfg) -> HashMap<NodeIndex, DefUse> {
    let mut pairs = HashMap::new();

    for idx in cfg.graph.node_indices() {
        let mut du = DefUse::default();
        match &cfg.graph[idx] {
            CfgNode::Entry => {
                du.defines.extend(cfg.arguments.iter().copied());
            }
            CfgNode::Basic { token } => {
                let tokens = statement_tokens(dump, *token);
                match (lhs_of(dump, &tokens), rhs_of(dump, &tokens)) {
                    (Some(lhs), Some(rhs)) => {
                        du.defines.extend(vars_of(dump, lhs));
                        du.uses.extend(vars_of(dump, rhs));
                    }
                    _ => {
                        du.uses.extend(vars_of(dump, &tokens));
                    }
                }
            }
            CfgNode::Conditional { condition } => {
                du.uses
                    .extend(vars_of(dump, &statement_tokens(dump, *condition)));
            }
            CfgNode::Exit | CfgNode::Join | CfgNode::Empty => {}
        }
        pairs.insert(idx, du);
    }

    pairs
}

/// Classic forward iterative dataflow. Returns the set of definitions
/// flowing *into* every node. The lattice is the power set of the finite
/// reach-def universe and the transfer is monotone, so the worklist
/// terminates.
pub fn reaching_definitions(
    cfg: &FunctionCfg,
    def_use: &HashMap<NodeIndex, DefUse>,
) -> HashMap<NodeIndex, HashSet<ReachDef>> {
    let mut reach_out: HashMap<NodeIndex, HashSet<ReachDef>> = HashMap::new();
    let mut reach_in: HashMap<NodeIndex, HashSet<ReachDef>> = HashMap::new();
    for n in cfg.graph.node_indices() {
        reach_out.insert(n, HashSet::new());
        reach_in.insert(n, HashSet::new());
    }

    let mut queue: VecDeque<NodeIndex> = cfg.graph.node_indices().collect();
    let mut rounds = 0usize;

    while let Some(cur) = queue.pop_front() {
        rounds += 1;

        let mut incoming = HashSet::new();
        for p in cfg.graph.neighbors_directed(cur, Incoming) {
            incoming.extend(reach_out[&p].iter().copied());
        }

        let du = &def_use[&cur];
        let new_out = if du.defines.is_empty() {
            incoming.clone()
        } else {
            let mut out: HashSet<ReachDef> = du
                .defines
                .iter()
                .map(|&variable| ReachDef {
                    def_node: cur,
                    variable,
                })
                .collect();
            out.extend(
                incoming
                    .iter()
                    .filter(|r| !du.defines.contains(&r.variable))
                    .copied(),
            );
            out
        };

        reach_in.insert(cur, incoming);

        if new_out != reach_out[&cur] {
            reach_out.insert(cur, new_out);
            queue.extend(cfg.graph.neighbors_directed(cur, Outgoing));
        }
    }

    debug!(target: "reach", rounds, nodes = cfg.graph.node_count(), "fixpoint reached");
    reach_in
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
fn basic_node_of(
    cfg: &FunctionCfg,
    token: crate::parse::dump::TokenIdx,
) -> NodeIndex {
    cfg.graph
        .node_indices()
        .find(|&i| matches!(cfg.graph[i], CfgNode::Basic { token: t } if t == token))
        .expect("basic node")
}

#[test]
fn def_use_splits_assignments() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let root = d.assign_binop("x", "a", "+", "b");
    let ast = test_ast(&mut d, vec![Statement::Block { root }]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();

    let pairs = def_use_pairs(&d.dump, &cfg);
    let du = &pairs[&basic_node_of(&cfg, root)];

    let x = d.dump.variable_by_id("x").unwrap();
    let a = d.dump.variable_by_id("a").unwrap();
    let b = d.dump.variable_by_id("b").unwrap();
    assert_eq!(du.defines, BTreeSet::from([x]));
    assert_eq!(du.uses, BTreeSet::from([a, b]));
}

#[test]
fn both_branch_definitions_reach_a_use() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // a = 1; if (c) { a = 2; } use(a);
    let mut d = TestDump::new();
    let a1 = d.assign_lit("a", "1");
    let c = d.var_tok("c");
    let a2 = d.assign_lit("a", "2");
    let call = d.call_stmt("use", "a");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a1 },
        Statement::If {
            condition: c,
            condition_true: vec![Statement::Block { root: a2 }],
            condition_false: vec![],
        },
        Statement::Block { root: call },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();

    let pairs = def_use_pairs(&d.dump, &cfg);
    let reach = reaching_definitions(&cfg, &pairs);

    let a = d.dump.variable_by_id("a").unwrap();
    let n1 = basic_node_of(&cfg, a1);
    let n2 = basic_node_of(&cfg, a2);
    let use_node = basic_node_of(&cfg, call);

    let at_use = &reach[&use_node];
    assert!(at_use.contains(&ReachDef { def_node: n1, variable: a }));
    assert!(at_use.contains(&ReachDef { def_node: n2, variable: a }));
}

#[test]
fn redefinition_kills_the_earlier_one() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // a = 1; a = 2; use(a);
    let mut d = TestDump::new();
    let a1 = d.assign_lit("a", "1");
    let a2 = d.assign_lit("a", "2");
    let call = d.call_stmt("use", "a");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a1 },
        Statement::Block { root: a2 },
        Statement::Block { root: call },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();

    let pairs = def_use_pairs(&d.dump, &cfg);
    let reach = reaching_definitions(&cfg, &pairs);

    let a = d.dump.variable_by_id("a").unwrap();
    let n2 = basic_node_of(&cfg, a2);
    let use_node = basic_node_of(&cfg, call);

    assert_eq!(
        reach[&use_node],
        HashSet::from([ReachDef { def_node: n2, variable: a }])
    );
}

#[test]
fn entry_defines_the_formal_arguments() {
    use crate::dataflow::cfg::build_cfg;
    use crate::parse::ast::{FunctionAst, Statement};
    use crate::parse::dump::ScopeKind;
    use crate::parse::scope_tree::ScopeNode;
    use crate::testkit::TestDump;

    // f(p) { q = p + p; }
    let mut d = TestDump::new();
    let p = d.var("p");
    let func = d.function("f", &[p]);
    let q_stmt = d.assign_binop("q", "p", "+", "p");
    let anchor = d.tok("{");
    let close = d.tok("}");
    let scope = d.scope(ScopeKind::Function, None);
    d.scope_bounds(scope, anchor, close);

    let ast = FunctionAst {
        name: "f".to_owned(),
        token_start: anchor,
        token_end: close,
        scope,
        function: Some(func),
        scope_tree: ScopeNode {
            scope,
            children: Vec::new(),
        },
        body: vec![Statement::Block { root: q_stmt }],
    };
    let cfg = build_cfg(&d.dump, &ast).unwrap();

    let pairs = def_use_pairs(&d.dump, &cfg);
    assert_eq!(pairs[&cfg.entry].defines, BTreeSet::from([p]));

    let reach = reaching_definitions(&cfg, &pairs);
    let n_q = basic_node_of(&cfg, q_stmt);
    assert!(reach[&n_q].contains(&ReachDef {
        def_node: cfg.entry,
        variable: p
    }));
}

#[test]
fn loop_carried_definitions_reach_the_header() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // i = 0; while (i < n) { i = i + 1; }
    let mut d = TestDump::new();
    let init = d.assign_lit("i", "0");
    let i2 = d.var_tok("i");
    let lt = d.tok("<");
    let n = d.var_tok("n");
    d.wire(lt, i2, n);
    let upd = d.assign_binop("i", "i", "+", "k");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: init },
        Statement::While {
            condition: lt,
            body: vec![Statement::Block { root: upd }],
        },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();

    let pairs = def_use_pairs(&d.dump, &cfg);
    let reach = reaching_definitions(&cfg, &pairs);

    let i = d.dump.variable_by_id("i").unwrap();
    let n_init = basic_node_of(&cfg, init);
    let n_upd = basic_node_of(&cfg, upd);
    let header = cfg
        .graph
        .node_indices()
        .find(|&ix| matches!(cfg.graph[ix], CfgNode::Conditional { condition } if condition == lt))
        .unwrap();

    // Both the initial and the loop-carried definition flow into the
    // loop condition.
    let at_header = &reach[&header];
    assert!(at_header.contains(&ReachDef { def_node: n_init, variable: i }));
    assert!(at_header.contains(&ReachDef { def_node: n_upd, variable: i }));
}
