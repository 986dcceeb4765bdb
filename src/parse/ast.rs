//! Recovers statement structure from the flat token stream of a dump.
//!
//! Each function body becomes a list of [`Statement`]s. `for` loops and
//! `switch` statements only exist inside the builder; both are desugared
//! before anything is emitted, so downstream passes deal with three shapes
//! only: straight-line blocks, `if`/`else`, and `while`.

use crate::errors::{UnifixError, UnifixResult};
use crate::parse::dump::{Dump, FuncIdx, ScopeIdx, ScopeKind, TokenIdx};
use crate::parse::scope_tree::ScopeNode;
use crate::parse::tokens::{root_tokens, statement_to_string};
use serde_json::{Value, json};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Block {
        root: TokenIdx,
    },
    If {
        condition: TokenIdx,
        condition_true: Vec<Statement>,
        condition_false: Vec<Statement>,
    },
    While {
        condition: TokenIdx,
        body: Vec<Statement>,
    },
}

#[derive(Debug, Clone)]
pub struct FunctionAst {
    pub name: String,
    pub token_start: TokenIdx,
    pub token_end: TokenIdx,
    pub scope: ScopeIdx,
    pub function: Option<FuncIdx>,
    pub scope_tree: ScopeNode,
    pub body: Vec<Statement>,
}

/// Builds the AST of every function scope in the dump. Parsing consumes a
/// copy of the function's scope tree; the pristine tree stays on the result.
pub fn build_functions(dump: &mut Dump) -> UnifixResult<Vec<FunctionAst>> {
    let scopes: Vec<ScopeIdx> = dump.function_scopes().collect();
    let mut out = Vec::new();

    for scope_idx in scopes {
        let scope = dump.scope(scope_idx).clone();
        let (Some(start), Some(end)) = (scope.class_start, scope.class_end) else {
            return Err(UnifixError::Structure(format!(
                "function scope {} has no token bounds",
                scope.id
            )));
        };
        let name = scope
            .name
            .clone()
            .or_else(|| scope.function.map(|f| dump.function(f).name.clone()))
            .unwrap_or_else(|| "<anon>".to_owned());

        let scope_tree = ScopeNode::build(dump, scope_idx);
        let mut roots: VecDeque<TokenIdx> = root_tokens(dump, start, end).into();
        debug!(target: "ast", function = %name, roots = roots.len(), "parsing function body");

        let mut consumable = scope_tree.clone();
        let body = Parser { dump: &mut *dump }.parse(&mut roots, &mut consumable)?;

        out.push(FunctionAst {
            name,
            token_start: start,
            token_end: end,
            scope: scope_idx,
            function: scope.function,
            scope_tree,
            body,
        });
    }

    Ok(out)
}

struct Parser<'a> {
    dump: &'a mut Dump,
}

/// One arm of a switch while it is being desugared.
#[derive(Debug, Clone)]
struct SwitchArm {
    match_expr: Option<TokenIdx>,
    body: Vec<Statement>,
    has_break: bool,
    is_default: bool,
}

impl Parser<'_> {
    fn parse(
        &mut self,
        roots: &mut VecDeque<TokenIdx>,
        scope_tree: &mut ScopeNode,
    ) -> UnifixResult<Vec<Statement>> {
        let mut blocks = Vec::new();

        while let Some(t) = roots.pop_front() {
            let keyword = self
                .dump
                .token(t)
                .ast_operand1
                .map(|o| self.dump.token(o).text.clone());

            match keyword.as_deref() {
                Some("if") => {
                    let stmt = self.parse_if(t, roots, scope_tree)?;
                    blocks.push(stmt);
                }
                Some("while") => {
                    let stmt = self.parse_while(t, roots, scope_tree)?;
                    blocks.push(stmt);
                }
                Some("for") => {
                    let stmts = self.parse_for(t, roots, scope_tree)?;
                    blocks.extend(stmts);
                }
                Some("switch") => {
                    let stmts = self.parse_switch(t, roots, scope_tree)?;
                    blocks.extend(stmts);
                }
                _ => blocks.push(Statement::Block { root: t }),
            }
        }

        Ok(blocks)
    }

    fn parse_if(
        &mut self,
        t: TokenIdx,
        roots: &mut VecDeque<TokenIdx>,
        scope_tree: &mut ScopeNode,
    ) -> UnifixResult<Statement> {
        let mut if_node = self.pop_scope_child(scope_tree, ScopeKind::If, "if")?;
        let (start, end) = self.scope_bounds(if_node.scope)?;
        let condition = self.dump.token(t).ast_operand2.ok_or_else(|| {
            UnifixError::Structure("if statement without a condition".to_owned())
        })?;

        let mut true_roots = self.collect_scope_roots(roots, start, end);
        let mut condition_true = self.parse(&mut true_roots, &mut if_node)?;
        if let Some(jump) = self.trailing_jump(end) {
            condition_true.push(Statement::Block { root: jump });
        }

        let mut condition_false = Vec::new();
        let has_else = scope_tree
            .children
            .first()
            .map(|c| self.dump.scope(c.scope).kind == ScopeKind::Else)
            .unwrap_or(false);
        if has_else {
            let mut else_node = scope_tree.children.remove(0);
            let (estart, eend) = self.scope_bounds(else_node.scope)?;

            let mut false_roots = self.collect_scope_roots(roots, estart, eend);
            if !false_roots.is_empty() {
                condition_false = self.parse(&mut false_roots, &mut else_node)?;
            }
            if let Some(jump) = self.trailing_jump(eend) {
                condition_false.push(Statement::Block { root: jump });
            }
        }

        Ok(Statement::If {
            condition,
            condition_true,
            condition_false,
        })
    }

    fn parse_while(
        &mut self,
        t: TokenIdx,
        roots: &mut VecDeque<TokenIdx>,
        scope_tree: &mut ScopeNode,
    ) -> UnifixResult<Statement> {
        let mut while_node = self.pop_scope_child(scope_tree, ScopeKind::While, "while")?;
        let (start, end) = self.scope_bounds(while_node.scope)?;
        let condition = self.dump.token(t).ast_operand2.ok_or_else(|| {
            UnifixError::Structure("while statement without a condition".to_owned())
        })?;

        let mut body_roots = self.collect_scope_roots(roots, start, end);
        let mut body = self.parse(&mut body_roots, &mut while_node)?;
        if let Some(jump) = self.trailing_jump(end) {
            body.push(Statement::Block { root: jump });
        }

        Ok(Statement::While { condition, body })
    }

    /// `for (init; cond; upd) body` is parsed like a while and immediately
    /// desugared to `init; while (cond) { body; upd; }`.
    fn parse_for(
        &mut self,
        t: TokenIdx,
        roots: &mut VecDeque<TokenIdx>,
        scope_tree: &mut ScopeNode,
    ) -> UnifixResult<Vec<Statement>> {
        let mut for_node = self.pop_scope_child(scope_tree, ScopeKind::For, "for")?;
        let (start, end) = self.scope_bounds(for_node.scope)?;
        let header = self.dump.token(t).ast_operand2.ok_or_else(|| {
            UnifixError::Structure("for statement without a header".to_owned())
        })?;

        let mut body_roots = self.collect_scope_roots(roots, start, end);
        let mut body = self.parse(&mut body_roots, &mut for_node)?;
        if let Some(jump) = self.trailing_jump(end) {
            body.push(Statement::Block { root: jump });
        }

        let missing =
            || UnifixError::Structure("for header missing init/condition/update".to_owned());
        let init = self.dump.token(header).ast_operand1.ok_or_else(missing)?;
        let rest = self.dump.token(header).ast_operand2.ok_or_else(missing)?;
        let condition = self.dump.token(rest).ast_operand1.ok_or_else(missing)?;
        let update = self.dump.token(rest).ast_operand2.ok_or_else(missing)?;

        body.push(Statement::Block { root: update });
        Ok(vec![
            Statement::Block { root: init },
            Statement::While { condition, body },
        ])
    }

    fn parse_switch(
        &mut self,
        t: TokenIdx,
        roots: &mut VecDeque<TokenIdx>,
        scope_tree: &mut ScopeNode,
    ) -> UnifixResult<Vec<Statement>> {
        let mut switch_node = self.pop_scope_child(scope_tree, ScopeKind::Switch, "switch")?;
        let switch_scope = switch_node.scope;
        let (start, end) = self.scope_bounds(switch_scope)?;
        let scrutinee = self.dump.token(t).ast_operand2.ok_or_else(|| {
            UnifixError::Structure("switch statement without a scrutinee".to_owned())
        })?;

        let mut body_roots = self.collect_scope_roots(roots, start, end);

        // Lexical sweep for case/default labels (they carry no operator
        // tree, so they never show up as root tokens).
        let mut case_tokens = Vec::new();
        let mut cur = Some(t);
        while let Some(c) = cur {
            if c == end {
                break;
            }
            let tok = self.dump.token(c);
            if tok.text == "switch" {
                return Err(UnifixError::Structure(
                    "nested switch statements are not supported".to_owned(),
                ));
            }
            if tok.scope == Some(switch_scope) && (tok.text == "case" || tok.text == "default") {
                case_tokens.push(c);
            }
            cur = tok.next;
        }

        let mut arms: Vec<SwitchArm> = Vec::new();
        for (i, &case_tok) in case_tokens.iter().enumerate() {
            let boundary = case_tokens.get(i + 1).copied().unwrap_or(end);

            let mut arm_roots = VecDeque::new();
            while let Some(&front) = body_roots.front() {
                // Handle indices follow lexical order, so this slices the
                // body roots at the next label.
                if front >= boundary {
                    break;
                }
                arm_roots.push_back(body_roots.pop_front().unwrap());
            }

            let mut body = self.parse(&mut arm_roots, &mut switch_node)?;
            if let Some(jump) = self.backward_jump_in_range(boundary, case_tok) {
                body.push(Statement::Block { root: jump });
            }

            let is_default = self.dump.token(case_tok).text == "default";
            let match_expr = if is_default {
                None
            } else {
                self.dump.token(case_tok).next
            };
            let has_break = matches!(
                body.last(),
                Some(Statement::Block { root })
                    if matches!(self.dump.token(*root).text.as_str(), "break" | "continue")
            );

            arms.push(SwitchArm {
                match_expr,
                body,
                has_break,
                is_default,
            });
        }

        if arms.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.desugar_switch(scrutinee, arms))
    }

    /// Desugars the collected arms: fallthrough bodies absorb their
    /// successor (propagated from the last arm backwards), then the arms
    /// fold right into nested `if (scrutinee == match) ... else ...` with
    /// `default` as the final else.
    fn desugar_switch(&mut self, scrutinee: TokenIdx, mut arms: Vec<SwitchArm>) -> Vec<Statement> {
        if let Some(last) = arms.last_mut() {
            last.has_break = true;
        }
        for i in (0..arms.len().saturating_sub(1)).rev() {
            if !arms[i].has_break {
                let absorbed = arms[i + 1].body.clone();
                arms[i].body.extend(absorbed);
            }
        }

        let mut else_branch: Vec<Statement> = Vec::new();
        for arm in arms.into_iter().rev() {
            let mut body = arm.body;
            if matches!(
                body.last(),
                Some(Statement::Block { root }) if self.dump.token(*root).text == "break"
            ) {
                body.pop();
            }

            if arm.is_default {
                else_branch = body;
                continue;
            }
            let Some(match_expr) = arm.match_expr else {
                // A case label at the very end of the scope; nothing to
                // compare against, so it contributes nothing.
                continue;
            };

            let eq = self.dump.synth_token("==");
            self.dump.set_operands(eq, Some(scrutinee), Some(match_expr));
            else_branch = vec![Statement::If {
                condition: eq,
                condition_true: body,
                condition_false: else_branch,
            }];
        }

        else_branch
    }

    // -- shared helpers -----------------------------------------------------

    fn pop_scope_child(
        &self,
        scope_tree: &mut ScopeNode,
        expected: ScopeKind,
        what: &str,
    ) -> UnifixResult<ScopeNode> {
        if scope_tree.children.is_empty() {
            return Err(UnifixError::Structure(format!(
                "no scope left for {what} statement"
            )));
        }
        let kind = self.dump.scope(scope_tree.children[0].scope).kind;
        if kind != expected {
            return Err(UnifixError::Structure(format!(
                "expected {expected:?} scope for {what} statement, got {kind:?}"
            )));
        }
        Ok(scope_tree.children.remove(0))
    }

    fn scope_bounds(&self, scope: ScopeIdx) -> UnifixResult<(TokenIdx, TokenIdx)> {
        let s = self.dump.scope(scope);
        match (s.class_start, s.class_end) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(UnifixError::Structure(format!(
                "scope {} has no token bounds",
                s.id
            ))),
        }
    }

    /// Pulls the root tokens lying lexically between `start` and `end` off
    /// the front of `roots`.
    fn collect_scope_roots(
        &self,
        roots: &mut VecDeque<TokenIdx>,
        start: TokenIdx,
        end: TokenIdx,
    ) -> VecDeque<TokenIdx> {
        let mut out = VecDeque::new();
        let mut cur = Some(start);
        while let Some(c) = cur {
            if c == end || roots.is_empty() {
                break;
            }
            if roots.front() == Some(&c) {
                out.push_back(roots.pop_front().unwrap());
            }
            cur = self.dump.token(c).next;
        }
        out
    }

    /// Scans backwards from a scope's closing token for a trailing
    /// `break`/`continue` in the same scope. Jumps carry no operator tree,
    /// so this is the only way they surface.
    fn trailing_jump(&self, scope_end: TokenIdx) -> Option<TokenIdx> {
        let end_scope = self.dump.token(scope_end).scope;
        let mut cur = Some(scope_end);
        while let Some(c) = cur {
            let tok = self.dump.token(c);
            if tok.scope != end_scope {
                break;
            }
            if matches!(tok.text.as_str(), "break" | "continue") {
                return Some(c);
            }
            cur = tok.previous;
        }
        None
    }

    /// Backward scan between two lexical positions (switch-arm variant).
    fn backward_jump_in_range(&self, from: TokenIdx, to: TokenIdx) -> Option<TokenIdx> {
        let mut cur = Some(from);
        while let Some(c) = cur {
            if c < to {
                break;
            }
            let tok = self.dump.token(c);
            if matches!(tok.text.as_str(), "break" | "continue") {
                return Some(c);
            }
            cur = tok.previous;
        }
        None
    }
}

// ---------------------------------------------------------------------------
//  Serialization / display
// ---------------------------------------------------------------------------

impl Statement {
    pub fn to_json(&self, dump: &Dump) -> Value {
        match self {
            Statement::Block { root } => json!({ "block": statement_to_string(dump, *root) }),
            Statement::If {
                condition,
                condition_true,
                condition_false,
            } => json!({
                "if": {
                    "condition": statement_to_string(dump, *condition),
                    "condition_true": condition_true.iter().map(|s| s.to_json(dump)).collect::<Vec<_>>(),
                    "condition_false": condition_false.iter().map(|s| s.to_json(dump)).collect::<Vec<_>>(),
                }
            }),
            Statement::While { condition, body } => json!({
                "while": {
                    "condition": statement_to_string(dump, *condition),
                    "body": body.iter().map(|s| s.to_json(dump)).collect::<Vec<_>>(),
                }
            }),
        }
    }
}

impl FunctionAst {
    pub fn to_json(&self, dump: &Dump) -> Value {
        json!({
            "function": {
                "name": self.name,
                "body": self.body.iter().map(|s| s.to_json(dump)).collect::<Vec<_>>(),
            }
        })
    }
}

/// Indented text rendering of a function body, for `inspect --text`.
pub fn render_ast(dump: &Dump, ast: &FunctionAst) -> String {
    let mut out = format!("FUNCTION {}:\n", ast.name);
    render_statements(dump, &ast.body, 1, &mut out);
    out
}

fn render_statements(dump: &Dump, statements: &[Statement], depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    for s in statements {
        match s {
            Statement::Block { root } => {
                out.push_str(&format!("{pad}{}\n", statement_to_string(dump, *root)));
            }
            Statement::If {
                condition,
                condition_true,
                condition_false,
            } => {
                out.push_str(&format!("{pad}IF {}:\n", statement_to_string(dump, *condition)));
                render_statements(dump, condition_true, depth + 1, out);
                if !condition_false.is_empty() {
                    out.push_str(&format!("{pad}ELSE:\n"));
                    render_statements(dump, condition_false, depth + 1, out);
                }
            }
            Statement::While { condition, body } => {
                out.push_str(&format!("{pad}WHILE {}:\n", statement_to_string(dump, *condition)));
                render_statements(dump, body, depth + 1, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
fn stmt_text(dump: &Dump, s: &Statement) -> String {
    match s {
        Statement::Block { root } => statement_to_string(dump, *root),
        _ => panic!("expected a block statement"),
    }
}

#[test]
fn parses_if_else_bodies() {
    use crate::testkit::TestDump;

    // f ( ) { if ( c > 0 ) { x = 1 ; } else { x = 2 ; } }
    let mut d = TestDump::new();
    let _f = d.tok("f");
    let _po = d.tok("(");
    let _pc = d.tok(")");
    let f_open = d.tok("{");
    let if_kw = d.tok("if");
    let if_paren = d.tok("(");
    let c = d.var_tok("c");
    let gt = d.tok(">");
    let zero = d.tok("0");
    let _cp = d.tok(")");
    let t_open = d.tok("{");
    let eq1 = d.assign_lit("x", "1");
    let _s1 = d.tok(";");
    let t_close = d.tok("}");
    let _else_kw = d.tok("else");
    let e_open = d.tok("{");
    let eq2 = d.assign_lit("x", "2");
    let _s2 = d.tok(";");
    let e_close = d.tok("}");
    let f_close = d.tok("}");

    d.wire(gt, c, zero);
    d.wire(if_paren, if_kw, gt);

    use crate::parse::dump::ScopeKind;
    let fs = d.scope(ScopeKind::Function, None);
    let if_s = d.scope(ScopeKind::If, Some(fs));
    let else_s = d.scope(ScopeKind::Else, Some(fs));
    d.scope_bounds(fs, f_open, f_close);
    d.scope_bounds(if_s, t_open, t_close);
    d.scope_bounds(else_s, e_open, e_close);

    let functions = build_functions(&mut d.dump).expect("parses");
    assert_eq!(functions.len(), 1);
    let body = &functions[0].body;
    assert_eq!(body.len(), 1);

    let Statement::If {
        condition,
        condition_true,
        condition_false,
    } = &body[0]
    else {
        panic!("expected an if statement");
    };
    assert_eq!(statement_to_string(&d.dump, *condition), "c > 0");
    assert_eq!(condition_true.len(), 1);
    assert_eq!(stmt_text(&d.dump, &condition_true[0]), "x = 1");
    assert_eq!(condition_false.len(), 1);
    assert_eq!(stmt_text(&d.dump, &condition_false[0]), "x = 2");
    assert_eq!(body[0], Statement::If {
        condition: gt,
        condition_true: vec![Statement::Block { root: eq1 }],
        condition_false: vec![Statement::Block { root: eq2 }],
    });
}

#[test]
fn for_loop_desugars_to_init_plus_while() {
    use crate::testkit::TestDump;

    // f ( ) { for ( i = 0 ; i < n ; i = i + 1 ) { s = s + i ; } }
    let mut d = TestDump::new();
    let _f = d.tok("f");
    let _po = d.tok("(");
    let _pc = d.tok(")");
    let f_open = d.tok("{");
    let for_kw = d.tok("for");
    let for_paren = d.tok("(");
    let init = d.assign_lit("i", "0");
    let semi1 = d.tok(";");
    let i2 = d.var_tok("i");
    let lt = d.tok("<");
    let n = d.var_tok("n");
    let semi2 = d.tok(";");
    let upd_i = d.var_tok("i");
    let update = d.tok("=");
    let upd_i2 = d.var_tok("i");
    let upd_plus = d.tok("+");
    let upd_one = d.tok("1");
    d.wire(upd_plus, upd_i2, upd_one);
    d.wire(update, upd_i, upd_plus);
    let _cp = d.tok(")");
    let b_open = d.tok("{");
    let body_stmt = d.assign_binop("s", "s", "+", "i");
    let _s1 = d.tok(";");
    let b_close = d.tok("}");
    let f_close = d.tok("}");

    d.wire(lt, i2, n);
    d.wire(semi2, lt, update);
    d.wire(semi1, init, semi2);
    d.wire(for_paren, for_kw, semi1);

    use crate::parse::dump::ScopeKind;
    let fs = d.scope(ScopeKind::Function, None);
    let for_s = d.scope(ScopeKind::For, Some(fs));
    d.scope_bounds(fs, f_open, f_close);
    d.scope_bounds(for_s, b_open, b_close);

    let functions = build_functions(&mut d.dump).expect("parses");
    let body = &functions[0].body;

    assert_eq!(body.len(), 2);
    assert_eq!(stmt_text(&d.dump, &body[0]), "i = 0");
    let Statement::While { condition, body } = &body[1] else {
        panic!("expected the desugared while");
    };
    assert_eq!(statement_to_string(&d.dump, *condition), "i < n");
    assert_eq!(body.len(), 2);
    assert_eq!(stmt_text(&d.dump, &body[0]), "s = s + i");
    assert_eq!(body[0], Statement::Block { root: body_stmt });
    assert_eq!(body[1], Statement::Block { root: update });
}

#[test]
fn while_body_recovers_trailing_break() {
    use crate::testkit::TestDump;

    // f ( ) { while ( c ) { break ; } }
    let mut d = TestDump::new();
    let _f = d.tok("f");
    let _po = d.tok("(");
    let _pc = d.tok(")");
    let f_open = d.tok("{");
    let while_kw = d.tok("while");
    let while_paren = d.tok("(");
    let c = d.var_tok("c");
    let _cp = d.tok(")");
    let b_open = d.tok("{");
    let brk = d.tok("break");
    let semi = d.tok(";");
    let b_close = d.tok("}");
    let f_close = d.tok("}");

    d.wire(while_paren, while_kw, c);

    use crate::parse::dump::ScopeKind;
    let fs = d.scope(ScopeKind::Function, None);
    let while_s = d.scope(ScopeKind::While, Some(fs));
    d.scope_bounds(fs, f_open, f_close);
    d.scope_bounds(while_s, b_open, b_close);
    d.set_scope(&[b_open, brk, semi, b_close], while_s);

    let functions = build_functions(&mut d.dump).expect("parses");
    let body = &functions[0].body;
    assert_eq!(body.len(), 1);
    let Statement::While { condition, body } = &body[0] else {
        panic!("expected a while statement");
    };
    assert_eq!(statement_to_string(&d.dump, *condition), "c");
    assert_eq!(body, &vec![Statement::Block { root: brk }]);
}

#[test]
fn switch_fallthrough_absorbs_successor_case() {
    use crate::testkit::TestDump;

    // f ( ) { switch ( x ) { case 1 : a = 1 ; break ; case 2 : a = 2 ;
    //         default : a = 3 ; } }
    let mut d = TestDump::new();
    let _f = d.tok("f");
    let _po = d.tok("(");
    let _pc = d.tok(")");
    let f_open = d.tok("{");
    let sw_kw = d.tok("switch");
    let sw_paren = d.tok("(");
    let x = d.var_tok("x");
    let _cp = d.tok(")");
    let b_open = d.tok("{");
    let case1 = d.tok("case");
    let one = d.tok("1");
    let _c1 = d.tok(":");
    let a1 = d.assign_lit("a", "1");
    let _s1 = d.tok(";");
    let brk = d.tok("break");
    let _sb = d.tok(";");
    let case2 = d.tok("case");
    let two = d.tok("2");
    let _c2 = d.tok(":");
    let a2 = d.assign_lit("a", "2");
    let _s2 = d.tok(";");
    let default_tok = d.tok("default");
    let _c3 = d.tok(":");
    let a3 = d.assign_lit("a", "3");
    let _s3 = d.tok(";");
    let b_close = d.tok("}");
    let f_close = d.tok("}");

    d.wire(sw_paren, sw_kw, x);

    use crate::parse::dump::ScopeKind;
    let fs = d.scope(ScopeKind::Function, None);
    let sw_s = d.scope(ScopeKind::Switch, Some(fs));
    d.scope_bounds(fs, f_open, f_close);
    d.scope_bounds(sw_s, b_open, b_close);
    d.set_scope(&[case1, case2, default_tok], sw_s);

    let functions = build_functions(&mut d.dump).expect("parses");
    let body = &functions[0].body;
    assert_eq!(body.len(), 1);

    // case 1 keeps its own body (break stripped); case 2 falls through and
    // absorbs the default body; default is the final else.
    let Statement::If {
        condition: c1,
        condition_true: t1,
        condition_false: f1,
    } = &body[0]
    else {
        panic!("expected the folded if chain");
    };
    assert_eq!(statement_to_string(&d.dump, *c1), "x == 1");
    assert_eq!(t1, &vec![Statement::Block { root: a1 }]);
    let _ = (one, two, brk);

    assert_eq!(f1.len(), 1);
    let Statement::If {
        condition: c2,
        condition_true: t2,
        condition_false: f2,
    } = &f1[0]
    else {
        panic!("expected the second case as nested if");
    };
    assert_eq!(statement_to_string(&d.dump, *c2), "x == 2");
    assert_eq!(
        t2,
        &vec![
            Statement::Block { root: a2 },
            Statement::Block { root: a3 }
        ]
    );
    assert_eq!(f2, &vec![Statement::Block { root: a3 }]);
}
