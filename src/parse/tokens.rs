//! Walks over the token arena: inorder statement traversal, lhs/rhs
//! splitting, root-token discovery.

use crate::parse::dump::{Dump, TokenIdx, VarIdx};
use std::collections::BTreeSet;

/// Tokens of the operator tree rooted at `root`, inorder.
pub fn statement_tokens(dump: &Dump, root: TokenIdx) -> Vec<TokenIdx> {
    let mut out = Vec::new();
    inorder(dump, Some(root), &mut out);
    out
}

fn inorder(dump: &Dump, token: Option<TokenIdx>, out: &mut Vec<TokenIdx>) {
    let Some(t) = token else { return };
    let tok = dump.token(t);
    if tok.ast_operand1.is_none() && tok.ast_operand2.is_none() {
        out.push(t);
        return;
    }
    inorder(dump, tok.ast_operand1, out);
    out.push(t);
    inorder(dump, tok.ast_operand2, out);
}

/// Variables occurring in `tokens`, in token order, deduplicated.
pub fn vars_of(dump: &Dump, tokens: &[TokenIdx]) -> Vec<VarIdx> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for &t in tokens {
        if let Some(v) = dump.token(t).variable {
            if seen.insert(v) {
                out.push(v);
            }
        }
    }
    out
}

/// Tokens before the first `=`, or `None` when the statement is not an
/// assignment.
pub fn lhs_of<'a>(dump: &Dump, tokens: &'a [TokenIdx]) -> Option<&'a [TokenIdx]> {
    tokens
        .iter()
        .position(|&t| dump.token(t).text == "=")
        .map(|i| &tokens[..i])
}

/// Tokens from the first `=` on (the `=` itself included, as it carries no
/// variable), or `None` for non-assignments.
pub fn rhs_of<'a>(dump: &Dump, tokens: &'a [TokenIdx]) -> Option<&'a [TokenIdx]> {
    tokens
        .iter()
        .position(|&t| dump.token(t).text == "=")
        .map(|i| &tokens[i..])
}

pub fn tokens_to_string(dump: &Dump, tokens: &[TokenIdx]) -> String {
    tokens
        .iter()
        .map(|&t| dump.token(t).text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rendered inorder walk of the tree rooted at `root`.
pub fn statement_to_string(dump: &Dump, root: TokenIdx) -> String {
    tokens_to_string(dump, &statement_tokens(dump, root))
}

/// Root of the operator tree containing `t`.
pub fn root_of(dump: &Dump, mut t: TokenIdx) -> TokenIdx {
    while let Some(p) = dump.token(t).ast_parent {
        t = p;
    }
    t
}

/// Walks the lexical stream from `start` to `end` and collects, in order of
/// first encounter, the root of every operator tree touched. Statement-level
/// parsing starts from this list.
pub fn root_tokens(dump: &Dump, start: TokenIdx, end: TokenIdx) -> Vec<TokenIdx> {
    let mut seen = BTreeSet::new();
    let mut roots = Vec::new();

    let mut cur = Some(start);
    while let Some(t) = cur {
        if t == end {
            break;
        }
        if dump.token(t).ast_parent.is_some() {
            let root = root_of(dump, t);
            if seen.insert(root) {
                roots.push(root);
            }
        }
        cur = dump.token(t).next;
    }

    roots
}

/// Whether the statement rooted at `root` mentions any of `words`.
pub fn statement_mentions(dump: &Dump, root: TokenIdx, words: &[&str]) -> bool {
    statement_tokens(dump, root)
        .iter()
        .any(|&t| words.contains(&dump.token(t).text.as_str()))
}

#[test]
fn inorder_walk_is_left_root_right() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    let eq = d.tok("=");
    let a = d.var_tok("a");
    let plus = d.tok("+");
    let b = d.var_tok("b");
    d.wire(plus, a, b);
    d.wire(eq, x, plus);

    assert_eq!(statement_to_string(&d.dump, eq), "x = a + b");
    assert_eq!(root_of(&d.dump, a), eq);
}

#[test]
fn lhs_rhs_split_at_first_assign() {
    use crate::testkit::TestDump;

    let mut d = TestDump::new();
    let x = d.var_tok("x");
    let eq = d.tok("=");
    let y = d.var_tok("y");
    d.wire(eq, x, y);

    let toks = statement_tokens(&d.dump, eq);
    let lhs = lhs_of(&d.dump, &toks).unwrap();
    let rhs = rhs_of(&d.dump, &toks).unwrap();
    assert_eq!(tokens_to_string(&d.dump, lhs), "x");
    assert_eq!(tokens_to_string(&d.dump, rhs), "= y");

    let bare = statement_tokens(&d.dump, y);
    assert!(lhs_of(&d.dump, &bare).is_none());
}

#[test]
fn root_tokens_follow_first_encounter_order() {
    use crate::testkit::TestDump;

    // Two statements: `x = 1 ; y = 2 ;`: the walk must yield both roots
    // exactly once, in lexical order.
    let mut d = TestDump::new();
    let x = d.var_tok("x");
    let eq1 = d.tok("=");
    let one = d.tok("1");
    let _semi1 = d.tok(";");
    let y = d.var_tok("y");
    let eq2 = d.tok("=");
    let two = d.tok("2");
    let end = d.tok("}");
    d.wire(eq1, x, one);
    d.wire(eq2, y, two);

    let roots = root_tokens(&d.dump, x, end);
    assert_eq!(roots, vec![eq1, eq2]);
}
