//! Builders for hand-made dumps. Tests construct the token stream in
//! lexical order, then wire operator trees on top of it, mirroring what the
//! XML loader produces.

use crate::parse::dump::{
    Dump, FuncIdx, Function, Scope, ScopeIdx, ScopeKind, Token, TokenIdx, VarIdx, Variable,
};

pub(crate) struct TestDump {
    pub dump: Dump,
    last: Option<TokenIdx>,
}

impl TestDump {
    pub fn new() -> Self {
        TestDump {
            dump: Dump::default(),
            last: None,
        }
    }

    /// Appends a token to the lexical stream.
    pub fn tok(&mut self, text: &str) -> TokenIdx {
        let idx = TokenIdx(self.dump.tokens.len() as u32);
        let id = format!("t{}", idx.0);
        self.dump.token_ids.insert(id.clone(), idx);
        self.dump.tokens.push(Token {
            id,
            text: text.to_owned(),
            linenr: 1,
            scope: None,
            ast_operand1: None,
            ast_operand2: None,
            ast_parent: None,
            next: None,
            previous: self.last,
            variable: None,
        });
        if let Some(prev) = self.last {
            self.dump.token_mut(prev).next = Some(idx);
        }
        self.last = Some(idx);
        idx
    }

    /// Get-or-create a variable; the external id is the name itself.
    pub fn var(&mut self, name: &str) -> VarIdx {
        if let Some(&v) = self.dump.variable_ids.get(name) {
            return v;
        }
        let idx = VarIdx(self.dump.variables.len() as u32);
        self.dump.variable_ids.insert(name.to_owned(), idx);
        self.dump.variables.push(Variable {
            id: name.to_owned(),
            name_token: None,
            name: name.to_owned(),
        });
        idx
    }

    /// Appends a token that is an occurrence of the named variable.
    pub fn var_tok(&mut self, name: &str) -> TokenIdx {
        let v = self.var(name);
        let t = self.tok(name);
        self.dump.token_mut(t).variable = Some(v);
        t
    }

    /// Wires `parent` over two operands (and the operands' parent links).
    pub fn wire(&mut self, parent: TokenIdx, op1: TokenIdx, op2: TokenIdx) {
        self.dump.set_operands(parent, Some(op1), Some(op2));
        self.dump.token_mut(op1).ast_parent = Some(parent);
        self.dump.token_mut(op2).ast_parent = Some(parent);
    }

    pub fn scope(&mut self, kind: ScopeKind, nested_in: Option<ScopeIdx>) -> ScopeIdx {
        let idx = ScopeIdx(self.dump.scopes.len() as u32);
        self.dump.scopes.push(Scope {
            id: format!("s{}", idx.0),
            kind,
            name: None,
            class_start: None,
            class_end: None,
            nested_in,
            function: None,
        });
        idx
    }

    pub fn scope_bounds(&mut self, scope: ScopeIdx, start: TokenIdx, end: TokenIdx) {
        let s = &mut self.dump.scopes[scope.0 as usize];
        s.class_start = Some(start);
        s.class_end = Some(end);
    }

    pub fn set_scope(&mut self, tokens: &[TokenIdx], scope: ScopeIdx) {
        for &t in tokens {
            self.dump.token_mut(t).scope = Some(scope);
        }
    }

    pub fn function(&mut self, name: &str, arguments: &[VarIdx]) -> FuncIdx {
        let idx = FuncIdx(self.dump.functions.len() as u32);
        self.dump.functions.push(Function {
            id: format!("fn{}", idx.0),
            name: name.to_owned(),
            arguments: arguments.to_vec(),
        });
        idx
    }

    /// Convenience: tokens and tree for `<name> = <rhs-literal>`.
    /// Returns the `=` root.
    pub fn assign_lit(&mut self, name: &str, lit: &str) -> TokenIdx {
        let lhs = self.var_tok(name);
        let eq = self.tok("=");
        let rhs = self.tok(lit);
        self.wire(eq, lhs, rhs);
        eq
    }

    /// Convenience: `<name> = <a> <op> <b>` with variable operands.
    /// Returns the `=` root.
    pub fn assign_binop(&mut self, name: &str, a: &str, op: &str, b: &str) -> TokenIdx {
        let lhs = self.var_tok(name);
        let eq = self.tok("=");
        let left = self.var_tok(a);
        let o = self.tok(op);
        let right = self.var_tok(b);
        self.wire(o, left, right);
        self.wire(eq, lhs, o);
        eq
    }

    /// Convenience: a call statement `use ( <name> )` rooted at the paren.
    pub fn call_stmt(&mut self, callee: &str, name: &str) -> TokenIdx {
        let f = self.tok(callee);
        let paren = self.tok("(");
        let arg = self.var_tok(name);
        let _close = self.tok(")");
        self.wire(paren, f, arg);
        paren
    }
}
