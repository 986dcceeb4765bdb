//! Lowers a function body into a control-flow graph.
//!
//! The graph is a `petgraph::DiGraph`; node identity is the `NodeIndex`
//! handle, edges carry their flavour (`Seq`/`True`/`False`/`Back`).
//! Lowering runs under a stack of frames so `break`/`continue`/`return`
//! can be wired to the enclosing loop exit, loop header, or function exit.

use crate::errors::{UnifixError, UnifixResult};
use crate::parse::ast::{FunctionAst, Statement};
use crate::parse::dump::{Dump, TokenIdx, VarIdx};
use crate::parse::tokens::{statement_mentions, statement_to_string};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgNode {
    Entry,
    Exit,
    Basic { token: TokenIdx },
    Conditional { condition: TokenIdx },
    Join,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Ordinary fall-through.
    Seq,
    /// `cond == true` branch.
    True,
    /// `cond == false` branch.
    False,
    /// Back-edge that closes a loop.
    Back,
}

pub type Cfg = DiGraph<CfgNode, EdgeKind>;

#[derive(Debug, Clone)]
pub struct FunctionCfg {
    pub name: String,
    pub arguments: Vec<VarIdx>,
    pub graph: Cfg,
    pub entry: NodeIndex,
    pub exit: NodeIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    If,
    While,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    header: NodeIndex,
    exit: NodeIndex,
}

#[derive(Debug, Clone, Copy)]
enum Jump {
    Break,
    Continue,
    Return,
}

/// Builds the CFG of one function. Exactly one `Entry` and one `Exit` are
/// created; the `Exit` may end up unreachable when every path returns
/// early, but it always exists.
pub fn build_cfg(dump: &Dump, ast: &FunctionAst) -> UnifixResult<FunctionCfg> {
    let mut graph = Cfg::new();
    let entry = graph.add_node(CfgNode::Entry);
    let exit = graph.add_node(CfgNode::Exit);

    let mut lowerer = Lowerer {
        dump,
        graph,
        frames: vec![Frame {
            kind: FrameKind::Function,
            header: entry,
            exit,
        }],
    };

    let head = lowerer.lower_block(&ast.body)?;
    lowerer.graph.add_edge(entry, head, EdgeKind::Seq);

    debug!(
        target: "cfg",
        function = %ast.name,
        nodes = lowerer.graph.node_count(),
        edges = lowerer.graph.edge_count(),
        "cfg built"
    );

    Ok(FunctionCfg {
        name: ast.name.clone(),
        arguments: ast
            .function
            .map(|f| dump.function(f).arguments.clone())
            .unwrap_or_default(),
        graph: lowerer.graph,
        entry,
        exit,
    })
}

struct Lowerer<'a> {
    dump: &'a Dump,
    graph: Cfg,
    frames: Vec<Frame>,
}

impl Lowerer<'_> {
    /// Lowers a statement list and returns its head node. An empty list
    /// lowers to a fresh `Empty` node. Statements after an unconditional
    /// jump are unreachable and dropped.
    fn lower_block(&mut self, statements: &[Statement]) -> UnifixResult<NodeIndex> {
        let mut head: Option<NodeIndex> = None;
        let mut cur: Option<NodeIndex> = None;

        for stmt in statements {
            match stmt {
                Statement::Block { root } => {
                    let n = self.graph.add_node(CfgNode::Basic { token: *root });
                    self.link(&mut head, cur, n);
                    cur = Some(n);

                    if let Some(jump) = self.find_jump(*root) {
                        match jump {
                            Jump::Break => {
                                let frame = self.innermost_loop("break")?;
                                self.graph.add_edge(n, frame.exit, EdgeKind::Seq);
                            }
                            Jump::Continue => {
                                let frame = self.innermost_loop("continue")?;
                                self.graph.add_edge(n, frame.header, EdgeKind::Back);
                            }
                            Jump::Return => {
                                let outermost = self.frames[0];
                                if outermost.kind != FrameKind::Function {
                                    return Err(UnifixError::Structure(
                                        "return outside of a function".to_owned(),
                                    ));
                                }
                                self.graph.add_edge(n, outermost.exit, EdgeKind::Seq);
                            }
                        }
                        return Ok(head.expect("jump node was linked"));
                    }
                }

                Statement::If {
                    condition,
                    condition_true,
                    condition_false,
                } => {
                    let cond = self
                        .graph
                        .add_node(CfgNode::Conditional { condition: *condition });
                    self.link(&mut head, cur, cond);
                    let join = self.graph.add_node(CfgNode::Join);

                    self.frames.push(Frame {
                        kind: FrameKind::If,
                        header: cond,
                        exit: join,
                    });
                    let true_head = self.lower_block(condition_true)?;
                    let false_head = self.lower_block(condition_false)?;
                    self.frames.pop();

                    self.graph.add_edge(cond, true_head, EdgeKind::True);
                    self.graph.add_edge(cond, false_head, EdgeKind::False);

                    if let Some(t_end) = self.terminal(true_head) {
                        self.graph.add_edge(t_end, join, EdgeKind::Seq);
                    }
                    if let Some(f_end) = self.terminal(false_head) {
                        self.graph.add_edge(f_end, join, EdgeKind::Seq);
                    }

                    cur = Some(join);
                }

                Statement::While { condition, body } => {
                    let cond = self
                        .graph
                        .add_node(CfgNode::Conditional { condition: *condition });
                    self.link(&mut head, cur, cond);
                    let join = self.graph.add_node(CfgNode::Join);

                    self.frames.push(Frame {
                        kind: FrameKind::While,
                        header: cond,
                        exit: join,
                    });
                    let body_head = self.lower_block(body)?;
                    self.frames.pop();

                    let false_empty = self.graph.add_node(CfgNode::Empty);
                    self.graph.add_edge(cond, body_head, EdgeKind::True);
                    self.graph.add_edge(cond, false_empty, EdgeKind::False);

                    if let Some(b_end) = self.terminal(body_head) {
                        self.graph.add_edge(b_end, cond, EdgeKind::Back);
                    }
                    self.graph.add_edge(false_empty, join, EdgeKind::Seq);

                    cur = Some(join);
                }
            }
        }

        // Top-level statement list: fall through into the function exit,
        // unless the tail is a join nothing ever reaches.
        if self.frames.len() == 1 {
            if let Some(c) = cur {
                let unreached_join = matches!(self.graph[c], CfgNode::Join)
                    && self.graph.neighbors_directed(c, Incoming).next().is_none();
                if !unreached_join {
                    let exit = self.frames[0].exit;
                    self.graph.add_edge(c, exit, EdgeKind::Seq);
                }
            }
        }

        Ok(match head {
            Some(h) => h,
            None => self.graph.add_node(CfgNode::Empty),
        })
    }

    fn link(&mut self, head: &mut Option<NodeIndex>, cur: Option<NodeIndex>, n: NodeIndex) {
        match cur {
            Some(p) => {
                self.graph.add_edge(p, n, EdgeKind::Seq);
            }
            None => *head = Some(n),
        }
    }

    fn find_jump(&self, root: TokenIdx) -> Option<Jump> {
        use crate::parse::tokens::statement_tokens;
        for t in statement_tokens(self.dump, root) {
            match self.dump.token(t).text.as_str() {
                "break" => return Some(Jump::Break),
                "continue" => return Some(Jump::Continue),
                "return" => return Some(Jump::Return),
                _ => {}
            }
        }
        None
    }

    fn innermost_loop(&self, what: &str) -> UnifixResult<Frame> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.kind == FrameKind::While)
            .copied()
            .ok_or_else(|| UnifixError::Structure(format!("{what} outside of a loop")))
    }

    /// Walks forward from `start` looking for a node where straight-line
    /// flow ends. Jump-carrying basics and the function exit are dead ends;
    /// cycles are not followed.
    fn terminal(&self, start: NodeIndex) -> Option<NodeIndex> {
        let mut path = vec![start];
        self.traverse(&mut path).then(|| *path.last().unwrap())
    }

    fn traverse(&self, path: &mut Vec<NodeIndex>) -> bool {
        let cur = *path.last().unwrap();
        if self.graph.neighbors_directed(cur, Outgoing).next().is_none() {
            return true;
        }
        match &self.graph[cur] {
            CfgNode::Basic { token }
                if statement_mentions(self.dump, *token, &["return", "break", "continue"]) =>
            {
                return false;
            }
            CfgNode::Exit => return false,
            _ => {}
        }

        let mut successors: Vec<NodeIndex> =
            self.graph.neighbors_directed(cur, Outgoing).collect();
        successors.sort();
        successors.dedup();
        for s in successors {
            if path.contains(&s) {
                continue;
            }
            path.push(s);
            if self.traverse(path) {
                return true;
            }
            path.pop();
        }
        false
    }
}

// ---------------------------------------------------------------------------
//  Successor helpers / serialization
// ---------------------------------------------------------------------------

pub fn true_successor(graph: &Cfg, n: NodeIndex) -> Option<NodeIndex> {
    graph
        .edges_directed(n, Outgoing)
        .find(|e| *e.weight() == EdgeKind::True)
        .map(|e| e.target())
}

pub fn false_successor(graph: &Cfg, n: NodeIndex) -> Option<NodeIndex> {
    graph
        .edges_directed(n, Outgoing)
        .find(|e| *e.weight() == EdgeKind::False)
        .map(|e| e.target())
}

impl FunctionCfg {
    /// Deterministic serialization: nodes keyed by insertion index, edge
    /// lists sorted. Serializing twice yields identical values.
    pub fn to_json(&self, dump: &Dump) -> Value {
        let mut nodes = serde_json::Map::new();

        for idx in self.graph.node_indices() {
            let mut next: Vec<usize> = self
                .graph
                .neighbors_directed(idx, Outgoing)
                .map(|n| n.index())
                .collect();
            next.sort_unstable();
            next.dedup();
            let mut previous: Vec<usize> = self
                .graph
                .neighbors_directed(idx, Incoming)
                .map(|n| n.index())
                .collect();
            previous.sort_unstable();
            previous.dedup();

            let payload = match &self.graph[idx] {
                CfgNode::Entry => json!({
                    "entry": {
                        "name": self.name,
                        "arguments": self.arguments.iter()
                            .map(|&v| dump.variable(v).name.clone())
                            .collect::<Vec<_>>(),
                    }
                }),
                CfgNode::Exit => json!({ "exit": { "name": self.name } }),
                CfgNode::Basic { token } => json!({
                    "basic": { "token": statement_to_string(dump, *token) }
                }),
                CfgNode::Conditional { condition } => json!({
                    "conditional": {
                        "condition": statement_to_string(dump, *condition),
                        "condition_true": true_successor(&self.graph, idx).map(|n| n.index()),
                        "condition_false": false_successor(&self.graph, idx).map(|n| n.index()),
                    }
                }),
                CfgNode::Join => json!({ "join": {} }),
                CfgNode::Empty => json!({ "empty": {} }),
            };

            let mut obj = payload.as_object().cloned().unwrap_or_default();
            obj.insert("next".to_owned(), json!(next));
            obj.insert("previous".to_owned(), json!(previous));
            nodes.insert(idx.index().to_string(), Value::Object(obj));
        }

        Value::Object(nodes)
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn test_ast(d: &mut crate::testkit::TestDump, body: Vec<Statement>) -> FunctionAst {
    use crate::parse::dump::ScopeKind;
    use crate::parse::scope_tree::ScopeNode;

    let anchor = d.tok("{");
    let close = d.tok("}");
    let scope = d.scope(ScopeKind::Function, None);
    d.scope_bounds(scope, anchor, close);
    FunctionAst {
        name: "f".to_owned(),
        token_start: anchor,
        token_end: close,
        scope,
        function: None,
        scope_tree: ScopeNode {
            scope,
            children: Vec::new(),
        },
        body,
    }
}

#[cfg(test)]
fn find_node(cfg: &FunctionCfg, pred: impl Fn(&CfgNode) -> bool) -> NodeIndex {
    cfg.graph
        .node_indices()
        .find(|&i| pred(&cfg.graph[i]))
        .expect("node not found")
}

#[test]
fn straight_line_chains_through_exit() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let a = d.assign_lit("a", "1");
    let b = d.assign_binop("b", "a", "+", "a");
    let ast = test_ast(&mut d, vec![
        Statement::Block { root: a },
        Statement::Block { root: b },
    ]);

    let cfg = build_cfg(&d.dump, &ast).expect("lowers");
    let na = find_node(&cfg, |n| matches!(n, CfgNode::Basic { token } if *token == a));
    let nb = find_node(&cfg, |n| matches!(n, CfgNode::Basic { token } if *token == b));

    assert!(cfg.graph.contains_edge(cfg.entry, na));
    assert!(cfg.graph.contains_edge(na, nb));
    assert!(cfg.graph.contains_edge(nb, cfg.exit));
}

#[test]
fn break_in_else_wires_to_loop_join() {
    use crate::testkit::TestDump;

    // while (true) { if (x > 0) { x = 1; } else { break; } }
    let mut d = TestDump::new();
    let tr = d.tok("true");
    let x = d.var_tok("x");
    let gt = d.tok(">");
    let zero = d.tok("0");
    d.wire(gt, x, zero);
    let eq = d.assign_lit("x", "1");
    let brk = d.tok("break");

    let ast = test_ast(&mut d, vec![Statement::While {
        condition: tr,
        body: vec![Statement::If {
            condition: gt,
            condition_true: vec![Statement::Block { root: eq }],
            condition_false: vec![Statement::Block { root: brk }],
        }],
    }]);

    let cfg = build_cfg(&d.dump, &ast).expect("lowers");

    let while_cond = find_node(&cfg, |n| matches!(n, CfgNode::Conditional { condition } if *condition == tr));
    let if_cond = find_node(&cfg, |n| matches!(n, CfgNode::Conditional { condition } if *condition == gt));
    let n_eq = find_node(&cfg, |n| matches!(n, CfgNode::Basic { token } if *token == eq));
    let n_brk = find_node(&cfg, |n| matches!(n, CfgNode::Basic { token } if *token == brk));

    assert_eq!(true_successor(&cfg.graph, if_cond), Some(n_eq));
    assert_eq!(false_successor(&cfg.graph, if_cond), Some(n_brk));

    // The break jumps straight to the while's join.
    let loop_join: Vec<NodeIndex> = cfg.graph.neighbors_directed(n_brk, Outgoing).collect();
    assert_eq!(loop_join.len(), 1);
    assert!(matches!(cfg.graph[loop_join[0]], CfgNode::Join));

    // The if's join is only reached by the true branch, and flows back to
    // the loop header.
    let if_join = cfg
        .graph
        .neighbors_directed(n_eq, Outgoing)
        .next()
        .expect("x = 1 falls through");
    assert!(matches!(cfg.graph[if_join], CfgNode::Join));
    let preds: Vec<NodeIndex> = cfg.graph.neighbors_directed(if_join, Incoming).collect();
    assert_eq!(preds, vec![n_eq]);
    assert!(cfg.graph.contains_edge(if_join, while_cond));

    // The loop join reaches the function exit.
    assert!(cfg.graph.contains_edge(loop_join[0], cfg.exit));

    // Edge symmetry comes with the arena: every edge endpoint agrees.
    for e in cfg.graph.edge_indices() {
        let (s, t) = cfg.graph.edge_endpoints(e).unwrap();
        assert!(cfg.graph.neighbors_directed(s, Outgoing).any(|n| n == t));
        assert!(cfg.graph.neighbors_directed(t, Incoming).any(|n| n == s));
    }
}

#[test]
fn return_truncates_unreachable_tail() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let ret = d.tok("return");
    let dead = d.assign_lit("a", "1");
    let ast = test_ast(&mut d, vec![
        Statement::Block { root: ret },
        Statement::Block { root: dead },
    ]);

    let cfg = build_cfg(&d.dump, &ast).expect("lowers");
    let n_ret = find_node(&cfg, |n| matches!(n, CfgNode::Basic { token } if *token == ret));
    assert!(cfg.graph.contains_edge(n_ret, cfg.exit));

    // The statement after the return is never lowered.
    assert!(
        !cfg.graph
            .node_indices()
            .any(|i| matches!(cfg.graph[i], CfgNode::Basic { token } if token == dead))
    );
}

#[test]
fn break_outside_loop_is_structural() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let brk = d.tok("break");
    let ast = test_ast(&mut d, vec![Statement::Block { root: brk }]);

    let err = build_cfg(&d.dump, &ast).unwrap_err();
    assert!(matches!(err, UnifixError::Structure(_)));
}

#[test]
fn serialization_is_stable() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let c = d.var_tok("c");
    let a1 = d.assign_lit("a", "1");
    let a2 = d.assign_lit("a", "2");
    let body = vec![
        Statement::Block { root: a1 },
        Statement::If {
            condition: c,
            condition_true: vec![Statement::Block { root: a2 }],
            condition_false: vec![],
        },
    ];
    let ast1 = test_ast(&mut d, body.clone());
    let ast2 = test_ast(&mut d, body);

    let one = build_cfg(&d.dump, &ast1).unwrap().to_json(&d.dump);
    let two = build_cfg(&d.dump, &ast2).unwrap().to_json(&d.dump);
    assert_eq!(one, two);
}
