//! Binds reported error sites to CFG/dependency-graph nodes, groups
//! connected errors, and elects the root error of each group.

use crate::dataflow::cfg::CfgNode;
use crate::dataflow::depgraph::DependencyGraph;
use crate::parse::dump::{Dump, TokenIdx};
use crate::parse::tokens::{root_of, statement_tokens};
use crate::repair::report::{ErrorKind, ReportedError};
use petgraph::Direction::Incoming;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A reported error resolved against one function's graphs.
#[derive(Debug, Clone)]
pub struct LinkedError {
    pub kind: ErrorKind,
    pub root_token_id: String,
    pub error_token_id: String,
    /// Index into the per-function dependency-graph list.
    pub graph: usize,
    /// The defining dependency node at the error site. Conditionals (and
    /// statements that define nothing) have none; such errors still repair
    /// through the CFG node's reach set but join no dependency group.
    pub dep_node: Option<NodeIndex>,
    pub cfg_node: NodeIndex,
    pub root_token: TokenIdx,
    pub error_token: TokenIdx,
}

/// Resolves every reported error against an index over all CFG nodes,
/// keyed by statement-root token id (the node token for basics, the
/// parent-chain root of the condition for conditionals). Errors whose ids
/// cannot be bound are returned separately and skipped; they never abort
/// the run.
pub fn link_errors(
    dump: &Dump,
    reported: &[ReportedError],
    graphs: &[DependencyGraph],
) -> (Vec<LinkedError>, Vec<ReportedError>) {
    let mut by_root: HashMap<&str, (usize, NodeIndex)> = HashMap::new();
    for (gi, g) in graphs.iter().enumerate() {
        for cfg_node in g.cfg.graph.node_indices() {
            let key = match &g.cfg.graph[cfg_node] {
                CfgNode::Basic { token } => dump.token(*token).id.as_str(),
                CfgNode::Conditional { condition } => {
                    dump.token(root_of(dump, *condition)).id.as_str()
                }
                _ => continue,
            };
            by_root.entry(key).or_insert((gi, cfg_node));
        }
    }

    let mut linked = Vec::new();
    let mut unlinked = Vec::new();

    'next_error: for e in reported {
        let Some(&(graph, cfg_node)) = by_root.get(e.root_token_id.as_str()) else {
            unlinked.push(e.clone());
            continue;
        };

        let (root_token, error_token) = match &graphs[graph].cfg.graph[cfg_node] {
            CfgNode::Basic { token } => {
                let root = *token;
                let Some(error_token) = statement_tokens(dump, root)
                    .into_iter()
                    .find(|&t| dump.token(t).id == e.token_id)
                else {
                    unlinked.push(e.clone());
                    continue 'next_error;
                };
                (root, error_token)
            }
            CfgNode::Conditional { condition } => {
                let stmt_root = root_of(dump, *condition);
                let Some(cond_root) = dump.token(stmt_root).ast_operand2 else {
                    unlinked.push(e.clone());
                    continue 'next_error;
                };
                (cond_root, cond_root)
            }
            _ => unreachable!("index only holds basics and conditionals"),
        };

        let dep_node = graphs[graph].nodes_of_cfg(cfg_node).into_iter().next();

        linked.push(LinkedError {
            kind: e.error_type.clone(),
            root_token_id: e.root_token_id.clone(),
            error_token_id: e.token_id.clone(),
            graph,
            dep_node,
            cfg_node,
            root_token,
            error_token,
        });
    }

    debug!(
        target: "fix",
        linked = linked.len(),
        unlinked = unlinked.len(),
        "error linking done"
    );
    (linked, unlinked)
}

/// Groups linked errors by dependency-graph connectivity. Errors with no
/// dependency node form singleton groups. Groups are ordered by their
/// first error's input position; members keep input order.
pub fn connected_error_groups(
    errors: &[LinkedError],
    graphs: &[DependencyGraph],
) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut assigned = vec![false; errors.len()];

    for i in 0..errors.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut group = vec![i];

        if let Some(dep) = errors[i].dep_node {
            let component = graphs[errors[i].graph].component_of(dep);
            for (j, e) in errors.iter().enumerate().skip(i + 1) {
                if assigned[j] || e.graph != errors[i].graph {
                    continue;
                }
                if e.dep_node.is_some_and(|d| component.contains(&d)) {
                    group.push(j);
                    assigned[j] = true;
                }
            }
        }

        groups.push(group);
    }

    groups
}

/// Elects the root error of one connected group by walking predecessors
/// from the first error's dependency node. Every error-carrying node
/// visited updates the choice, so the most ancestral one wins; at a single
/// node, non-`VARIABLE_MULTIPLE_UNITS` errors are preferred. Running into
/// an already-visited node (a dependency cycle) falls back to the starting
/// error.
pub fn elect_root(errors: &[LinkedError], group: &[usize], graphs: &[DependencyGraph]) -> usize {
    let start = group[0];
    let Some(start_dep) = errors[start].dep_node else {
        return start;
    };
    let graph = &graphs[errors[start].graph];

    let mut at_node: HashMap<NodeIndex, Vec<usize>> = HashMap::new();
    for &i in group {
        if let Some(dep) = errors[i].dep_node {
            at_node.entry(dep).or_default().push(i);
        }
    }

    let mut root = start;
    let mut seen: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![start_dep];

    while let Some(cur) = stack.pop() {
        if !seen.insert(cur) {
            return start;
        }

        if let Some(here) = at_node.get(&cur) {
            let mut best = here[0];
            for &e in here {
                if errors[e].kind != ErrorKind::VariableMultipleUnits {
                    best = e;
                }
            }
            root = best;
        }

        let mut preds: Vec<NodeIndex> = graph.graph.neighbors_directed(cur, Incoming).collect();
        preds.sort_unstable();
        preds.dedup();
        stack.extend(preds);
    }

    root
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
fn reported(root: &str, token: &str, kind: &str) -> ReportedError {
    ReportedError {
        root_token_id: root.to_owned(),
        token_id: token.to_owned(),
        error_type: ErrorKind::from(kind.to_owned()),
    }
}

#[test]
fn binds_basic_statement_errors() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // a = 1; b = a + c;
    let mut d = TestDump::new();
    let a1 = d.assign_lit("a", "1");
    let b_tok = d.var_tok("b");
    let eq = d.tok("=");
    let a_use = d.var_tok("a");
    let plus = d.tok("+");
    let c_use = d.var_tok("c");
    d.wire(plus, a_use, c_use);
    d.wire(eq, b_tok, plus);

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a1 },
        Statement::Block { root: eq },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let root_id = d.dump.token(eq).id.clone();
    let plus_id = d.dump.token(plus).id.clone();
    let errors = vec![
        reported(&root_id, &plus_id, "ADDITION_OF_INCOMPATIBLE_UNITS"),
        reported("nope", "nope", "ADDITION_OF_INCOMPATIBLE_UNITS"),
    ];

    let (linked, unlinked) = link_errors(&d.dump, &errors, &graphs);
    assert_eq!(linked.len(), 1);
    assert_eq!(unlinked.len(), 1);
    assert_eq!(linked[0].root_token, eq);
    assert_eq!(linked[0].error_token, plus);
    assert!(linked[0].dep_node.is_some());
    assert_eq!(unlinked[0].root_token_id, "nope");
}

#[test]
fn binds_conditional_errors_to_the_condition() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // x = 1; if (a < b) { x = 2; }. The checker reports the statement
    // root of the condition, which resolves to the condition subtree.
    let mut d = TestDump::new();
    let x1 = d.assign_lit("x", "1");
    let if_kw = d.tok("if");
    let if_paren = d.tok("(");
    let a = d.var_tok("a");
    let lt = d.tok("<");
    let b = d.var_tok("b");
    d.wire(lt, a, b);
    d.wire(if_paren, if_kw, lt);
    let x2 = d.assign_lit("x", "2");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: x1 },
        Statement::If {
            condition: lt,
            condition_true: vec![Statement::Block { root: x2 }],
            condition_false: vec![],
        },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let root_id = d.dump.token(if_paren).id.clone();
    let errors = vec![reported(&root_id, &root_id, "COMPARISON_INCOMPATIBLE_UNITS")];

    let (linked, unlinked) = link_errors(&d.dump, &errors, &graphs);
    assert!(unlinked.is_empty());
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].root_token, lt);
    assert_eq!(linked[0].error_token, lt);
    assert!(linked[0].dep_node.is_none());
    assert!(matches!(
        graphs[0].cfg.graph[linked[0].cfg_node],
        CfgNode::Conditional { .. }
    ));
}

#[test]
fn root_election_walks_to_the_most_ancestral_error() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // a = q + r; b = a + s; gives two linked errors along one dependency
    // chain; the upstream one is the root.
    let mut d = TestDump::new();
    let a_stmt = d.assign_binop("a", "q", "+", "r");
    let b_stmt = d.assign_binop("b", "a", "+", "s");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a_stmt },
        Statement::Block { root: b_stmt },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let a_id = d.dump.token(a_stmt).id.clone();
    let b_id = d.dump.token(b_stmt).id.clone();
    let errors = vec![
        reported(&b_id, &b_id, "ADDITION_OF_INCOMPATIBLE_UNITS"),
        reported(&a_id, &a_id, "ADDITION_OF_INCOMPATIBLE_UNITS"),
    ];

    let (linked, unlinked) = link_errors(&d.dump, &errors, &graphs);
    assert!(unlinked.is_empty());
    assert_eq!(linked.len(), 2);

    let groups = connected_error_groups(&linked, &graphs);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0], vec![0, 1]);

    let root = elect_root(&linked, &groups[0], &graphs);
    assert_eq!(linked[root].root_token_id, a_id);
}

#[test]
fn vmu_errors_lose_ties() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let a_stmt = d.assign_binop("a", "q", "+", "r");
    let ast = test_ast(&mut d, vec![Statement::Block { root: a_stmt }]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let graphs = vec![DependencyGraph::build(&d.dump, cfg)];

    let a_id = d.dump.token(a_stmt).id.clone();
    let errors = vec![
        reported(&a_id, &a_id, "VARIABLE_MULTIPLE_UNITS"),
        reported(&a_id, &a_id, "ADDITION_OF_INCOMPATIBLE_UNITS"),
    ];

    let (linked, _) = link_errors(&d.dump, &errors, &graphs);
    let groups = connected_error_groups(&linked, &graphs);
    let root = elect_root(&linked, &groups[0], &graphs);
    assert_eq!(linked[root].kind, ErrorKind::AdditionOfIncompatibleUnits);
}
