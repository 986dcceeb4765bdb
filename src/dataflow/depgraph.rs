//! Variable-level data-dependency graph over one function's CFG.
//!
//! One node per (CFG node, variable defined there); an edge runs from the
//! producer of a value to every definition that consumes it, following the
//! reaching-definitions table.

use crate::dataflow::cfg::FunctionCfg;
use crate::dataflow::reach::{DefUse, ReachDef, def_use_pairs, reaching_definitions};
use crate::parse::dump::{Dump, VarIdx};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepNode {
    pub cfg_node: NodeIndex,
    pub variable: VarIdx,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub cfg: FunctionCfg,
    pub graph: DiGraph<DepNode, ()>,
    index: HashMap<(NodeIndex, VarIdx), NodeIndex>,
    pub reach: HashMap<NodeIndex, HashSet<ReachDef>>,
    pub def_use: HashMap<NodeIndex, DefUse>,
}

impl DependencyGraph {
    pub fn build(dump: &Dump, cfg: FunctionCfg) -> DependencyGraph {
        let def_use = def_use_pairs(dump, &cfg);
        let reach = reaching_definitions(&cfg, &def_use);

        let mut graph: DiGraph<DepNode, ()> = DiGraph::new();
        let mut index: HashMap<(NodeIndex, VarIdx), NodeIndex> = HashMap::new();

        // Nodes first: one per defined variable per defining CFG node, in
        // (node, variable) order so identity is deterministic.
        for cfg_node in cfg.graph.node_indices() {
            for &variable in &def_use[&cfg_node].defines {
                let dep = graph.add_node(DepNode { cfg_node, variable });
                index.insert((cfg_node, variable), dep);
            }
        }

        // Then edges: a reaching definition that is read, and not killed by
        // the statement itself, feeds every variable the statement defines.
        for cfg_node in cfg.graph.node_indices() {
            let du = &def_use[&cfg_node];
            if du.defines.is_empty() {
                continue;
            }

            let mut feeding: Vec<&ReachDef> = reach[&cfg_node]
                .iter()
                .filter(|r| du.uses.contains(&r.variable) && !du.defines.contains(&r.variable))
                .collect();
            feeding.sort_by_key(|r| (r.def_node, r.variable));

            for r in feeding {
                let producer = index[&(r.def_node, r.variable)];
                for &defined in &du.defines {
                    let consumer = index[&(cfg_node, defined)];
                    graph.add_edge(producer, consumer, ());
                }
            }
        }

        debug!(
            target: "deps",
            function = %cfg.name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "dependency graph built"
        );

        DependencyGraph {
            cfg,
            graph,
            index,
            reach,
            def_use,
        }
    }

    /// The dependency node for a (CFG node, defined variable) pair.
    pub fn node_for(&self, cfg_node: NodeIndex, variable: VarIdx) -> Option<NodeIndex> {
        self.index.get(&(cfg_node, variable)).copied()
    }

    /// Dependency nodes attached to a CFG node, ordered by variable.
    pub fn nodes_of_cfg(&self, cfg_node: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&i| self.graph[i].cfg_node == cfg_node)
            .collect();
        out.sort_unstable();
        out
    }

    /// Undirected connected component containing `start`.
    pub fn component_of(&self, start: NodeIndex) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(cur) = queue.pop_front() {
            if !seen.insert(cur) {
                continue;
            }
            queue.extend(self.graph.neighbors_directed(cur, Outgoing));
            queue.extend(self.graph.neighbors_directed(cur, Incoming));
        }
        seen
    }

    /// All undirected connected components, ordered by their smallest node.
    pub fn connected_components(&self) -> Vec<HashSet<NodeIndex>> {
        let mut out = Vec::new();
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        for n in self.graph.node_indices() {
            if seen.contains(&n) {
                continue;
            }
            let component = self.component_of(n);
            seen.extend(component.iter().copied());
            out.push(component);
        }
        out
    }

    /// Deterministic serialization. Dependency nodes are renumbered by
    /// (CFG node index, variable name); adjacency lists are sorted.
    pub fn to_json(&self, dump: &Dump) -> Value {
        let order = self.serialization_order(dump);
        let position: HashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut nodes = serde_json::Map::new();
        for (i, &dep) in order.iter().enumerate() {
            let DepNode { cfg_node, variable } = self.graph[dep];

            let mut next: Vec<usize> = self
                .graph
                .neighbors_directed(dep, Outgoing)
                .map(|n| position[&n])
                .collect();
            next.sort_unstable();
            next.dedup();
            let mut previous: Vec<usize> = self
                .graph
                .neighbors_directed(dep, Incoming)
                .map(|n| position[&n])
                .collect();
            previous.sort_unstable();
            previous.dedup();

            nodes.insert(
                i.to_string(),
                json!({
                    "cfg_node": cfg_node.index(),
                    "variable": dump.variable(variable).name,
                    "next": next,
                    "previous": previous,
                }),
            );
        }

        Value::Object(nodes)
    }

    fn serialization_order(&self, dump: &Dump) -> Vec<NodeIndex> {
        let mut order: Vec<NodeIndex> = self.graph.node_indices().collect();
        order.sort_by(|&a, &b| {
            let na = &self.graph[a];
            let nb = &self.graph[b];
            na.cfg_node
                .cmp(&nb.cfg_node)
                .then_with(|| dump.variable(na.variable).name.cmp(&dump.variable(nb.variable).name))
        });
        order
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
fn basic_node_of(cfg: &FunctionCfg, token: crate::parse::dump::TokenIdx) -> NodeIndex {
    use crate::dataflow::cfg::CfgNode;
    cfg.graph
        .node_indices()
        .find(|&i| matches!(cfg.graph[i], CfgNode::Basic { token: t } if t == token))
        .expect("basic node")
}

#[test]
fn producers_feed_consumers() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // a = 1; b = a + k; c = b + b;
    let mut d = TestDump::new();
    let a1 = d.assign_lit("a", "1");
    let b1 = d.assign_binop("b", "a", "+", "k");
    let c1 = d.assign_binop("c", "b", "+", "b");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a1 },
        Statement::Block { root: b1 },
        Statement::Block { root: c1 },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let n_a = basic_node_of(&cfg, a1);
    let n_b = basic_node_of(&cfg, b1);
    let n_c = basic_node_of(&cfg, c1);

    let deps = DependencyGraph::build(&d.dump, cfg);
    let a = d.dump.variable_by_id("a").unwrap();
    let b = d.dump.variable_by_id("b").unwrap();
    let c = d.dump.variable_by_id("c").unwrap();

    let da = deps.node_for(n_a, a).unwrap();
    let db = deps.node_for(n_b, b).unwrap();
    let dc = deps.node_for(n_c, c).unwrap();

    assert!(deps.graph.contains_edge(da, db));
    assert!(deps.graph.contains_edge(db, dc));
    assert!(!deps.graph.contains_edge(da, dc));
}

#[test]
fn unrelated_chains_form_separate_components() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // a = 1; b = a + k; x = 2; y = x + m;
    let mut d = TestDump::new();
    let a1 = d.assign_lit("a", "1");
    let b1 = d.assign_binop("b", "a", "+", "k");
    let x1 = d.assign_lit("x", "2");
    let y1 = d.assign_binop("y", "x", "+", "m");

    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a1 },
        Statement::Block { root: b1 },
        Statement::Block { root: x1 },
        Statement::Block { root: y1 },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let n_a = basic_node_of(&cfg, a1);
    let n_y = basic_node_of(&cfg, y1);

    let deps = DependencyGraph::build(&d.dump, cfg);
    let a = d.dump.variable_by_id("a").unwrap();
    let y = d.dump.variable_by_id("y").unwrap();

    let da = deps.node_for(n_a, a).unwrap();
    let dy = deps.node_for(n_y, y).unwrap();

    let components = deps.connected_components();
    assert_eq!(components.len(), 2);
    assert!(deps.component_of(da).contains(&da));
    assert!(!deps.component_of(da).contains(&dy));
}

#[test]
fn self_dependency_needs_a_loop() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    // Straight-line `i = i + k` kills its own use: no self edge.
    let mut d = TestDump::new();
    let init = d.assign_lit("i", "0");
    let upd = d.assign_binop("i", "i", "+", "k");
    let ast = test_ast(&mut d, vec![
        Statement::Block { root: init },
        Statement::Block { root: upd },
    ]);
    let cfg = build_cfg(&d.dump, &ast).unwrap();
    let n_upd = basic_node_of(&cfg, upd);

    let deps = DependencyGraph::build(&d.dump, cfg);
    let i = d.dump.variable_by_id("i").unwrap();
    let du = deps.node_for(n_upd, i).unwrap();
    assert!(!deps.graph.contains_edge(du, du));
}

#[test]
fn serialization_is_deterministic() {
    use crate::dataflow::cfg::{build_cfg, test_ast};
    use crate::parse::ast::Statement;
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let a1 = d.assign_lit("a", "1");
    let b1 = d.assign_binop("b", "a", "+", "a");
    let body = vec![
        Statement::Block { root: a1 },
        Statement::Block { root: b1 },
    ];
    let ast1 = test_ast(&mut d, body.clone());
    let ast2 = test_ast(&mut d, body);

    let one = DependencyGraph::build(&d.dump, build_cfg(&d.dump, &ast1).unwrap());
    let two = DependencyGraph::build(&d.dump, build_cfg(&d.dump, &ast2).unwrap());
    assert_eq!(one.to_json(&d.dump), two.to_json(&d.dump));
}
