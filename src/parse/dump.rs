use crate::errors::{UnifixError, UnifixResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
//  Arena handles
// ---------------------------------------------------------------------------

/// Index of a token in [`Dump::tokens`]. Ordering follows document order,
/// which is lexical order for everything read from a dump file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenIdx(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeIdx(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarIdx(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncIdx(pub u32);

// ---------------------------------------------------------------------------
//  Resolved model
// ---------------------------------------------------------------------------

/// One token of the parsed translation unit. Tokens form two overlapping
/// structures: an operator tree (`ast_operand1/2`, `ast_parent`) and the
/// lexical stream (`next`/`previous`).
#[derive(Debug, Clone)]
pub struct Token {
    pub id: String,
    pub text: String,
    pub linenr: u32,
    pub scope: Option<ScopeIdx>,
    pub ast_operand1: Option<TokenIdx>,
    pub ast_operand2: Option<TokenIdx>,
    pub ast_parent: Option<TokenIdx>,
    pub next: Option<TokenIdx>,
    pub previous: Option<TokenIdx>,
    pub variable: Option<VarIdx>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    If,
    Else,
    While,
    For,
    Switch,
    Other,
}

impl From<&str> for ScopeKind {
    fn from(s: &str) -> Self {
        match s {
            "Global" => ScopeKind::Global,
            "Function" => ScopeKind::Function,
            "If" => ScopeKind::If,
            "Else" => ScopeKind::Else,
            "While" => ScopeKind::While,
            "For" => ScopeKind::For,
            "Switch" => ScopeKind::Switch,
            _ => ScopeKind::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: String,
    pub kind: ScopeKind,
    pub name: Option<String>,
    pub class_start: Option<TokenIdx>,
    pub class_end: Option<TokenIdx>,
    pub nested_in: Option<ScopeIdx>,
    pub function: Option<FuncIdx>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub id: String,
    pub name_token: Option<TokenIdx>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub id: String,
    pub name: String,
    pub arguments: Vec<VarIdx>,
}

/// Arena for the whole dump. All cross-references are integer handles into
/// the owning vectors, so the cyclic token graph needs no shared ownership.
#[derive(Debug, Default, Clone)]
pub struct Dump {
    pub tokens: Vec<Token>,
    pub scopes: Vec<Scope>,
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    pub(crate) token_ids: HashMap<String, TokenIdx>,
    pub(crate) variable_ids: HashMap<String, VarIdx>,
}

impl Dump {
    pub fn token(&self, idx: TokenIdx) -> &Token {
        &self.tokens[idx.0 as usize]
    }

    pub fn token_mut(&mut self, idx: TokenIdx) -> &mut Token {
        &mut self.tokens[idx.0 as usize]
    }

    pub fn scope(&self, idx: ScopeIdx) -> &Scope {
        &self.scopes[idx.0 as usize]
    }

    pub fn variable(&self, idx: VarIdx) -> &Variable {
        &self.variables[idx.0 as usize]
    }

    pub fn function(&self, idx: FuncIdx) -> &Function {
        &self.functions[idx.0 as usize]
    }

    pub fn token_by_id(&self, id: &str) -> Option<TokenIdx> {
        self.token_ids.get(id).copied()
    }

    pub fn variable_by_id(&self, id: &str) -> Option<VarIdx> {
        self.variable_ids.get(id).copied()
    }

    /// Scopes of kind `Function`, in dump order.
    pub fn function_scopes(&self) -> impl Iterator<Item = ScopeIdx> + '_ {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == ScopeKind::Function)
            .map(|(i, _)| ScopeIdx(i as u32))
    }

    /// Append a synthesized token with a fresh id. Used for the `==` tokens
    /// of desugared switches and for candidate-fix trees.
    pub fn synth_token(&mut self, text: &str) -> TokenIdx {
        let idx = TokenIdx(self.tokens.len() as u32);
        let id = Uuid::new_v4().to_string();
        self.token_ids.insert(id.clone(), idx);
        self.tokens.push(Token {
            id,
            text: text.to_owned(),
            linenr: 0,
            scope: None,
            ast_operand1: None,
            ast_operand2: None,
            ast_parent: None,
            next: None,
            previous: None,
            variable: None,
        });
        idx
    }

    /// Synthesized reference to an existing variable (fresh token id).
    pub fn synth_variable_ref(&mut self, var: VarIdx) -> TokenIdx {
        let name = self.variable(var).name.clone();
        let idx = self.synth_token(&name);
        self.token_mut(idx).variable = Some(var);
        idx
    }

    /// Wire the operand links of `parent`. Parent links of the children are
    /// left alone; callers that build fresh trees set them explicitly.
    pub fn set_operands(&mut self, parent: TokenIdx, op1: Option<TokenIdx>, op2: Option<TokenIdx>) {
        let t = self.token_mut(parent);
        t.ast_operand1 = op1;
        t.ast_operand2 = op2;
    }

    // -- loading ------------------------------------------------------------

    pub fn from_file<P: AsRef<Path>>(path: P) -> UnifixResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_xml(&text)
    }

    pub fn from_xml(xml: &str) -> UnifixResult<Self> {
        let raw: RawDump = quick_xml::de::from_str(xml)?;
        Self::resolve(raw)
    }

    fn resolve(raw: RawDump) -> UnifixResult<Self> {
        let mut dump = Dump::default();

        // First pass: allocate everything so ids can be resolved in any order.
        for (i, t) in raw.tokenlist.tokens.iter().enumerate() {
            dump.token_ids.insert(t.id.clone(), TokenIdx(i as u32));
        }
        for (i, v) in raw.variables.vars.iter().enumerate() {
            dump.variable_ids.insert(v.id.clone(), VarIdx(i as u32));
        }
        let scope_ids: HashMap<&str, ScopeIdx> = raw
            .scopes
            .scopes
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), ScopeIdx(i as u32)))
            .collect();
        let function_ids: HashMap<&str, FuncIdx> = raw
            .functions
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.as_str(), FuncIdx(i as u32)))
            .collect();

        let lookup_token = |ids: &HashMap<String, TokenIdx>,
                            id: &Option<String>,
                            what: &str|
         -> UnifixResult<Option<TokenIdx>> {
            match id {
                None => Ok(None),
                Some(id) => ids
                    .get(id)
                    .copied()
                    .map(Some)
                    .ok_or_else(|| UnifixError::Dump(format!("dangling {what} id {id}"))),
            }
        };

        let n = raw.tokenlist.tokens.len();
        for (i, t) in raw.tokenlist.tokens.iter().enumerate() {
            let token = Token {
                id: t.id.clone(),
                text: t.str_.clone(),
                linenr: t.linenr.unwrap_or(0),
                scope: t.scope.as_deref().and_then(|s| scope_ids.get(s).copied()),
                ast_operand1: lookup_token(&dump.token_ids, &t.ast_operand1, "astOperand1")?,
                ast_operand2: lookup_token(&dump.token_ids, &t.ast_operand2, "astOperand2")?,
                ast_parent: lookup_token(&dump.token_ids, &t.ast_parent, "astParent")?,
                next: (i + 1 < n).then(|| TokenIdx(i as u32 + 1)),
                previous: (i > 0).then(|| TokenIdx(i as u32 - 1)),
                variable: match &t.variable {
                    None => None,
                    Some(v) => Some(
                        dump.variable_ids
                            .get(v)
                            .copied()
                            .ok_or_else(|| UnifixError::Dump(format!("dangling variable id {v}")))?,
                    ),
                },
            };
            dump.tokens.push(token);
        }

        for f in &raw.functions.functions {
            let mut arguments = Vec::new();
            for a in &f.args {
                let var = dump
                    .variable_ids
                    .get(&a.variable)
                    .copied()
                    .ok_or_else(|| UnifixError::Dump(format!("dangling arg variable {}", a.variable)))?;
                arguments.push(var);
            }
            dump.functions.push(Function {
                id: f.id.clone(),
                name: f.name.clone().unwrap_or_default(),
                arguments,
            });
        }

        for s in &raw.scopes.scopes {
            dump.scopes.push(Scope {
                id: s.id.clone(),
                kind: ScopeKind::from(s.kind.as_str()),
                name: s.class_name.clone(),
                class_start: lookup_token(&dump.token_ids, &s.class_start, "classStart")?,
                class_end: lookup_token(&dump.token_ids, &s.class_end, "classEnd")?,
                nested_in: s.nested_in.as_deref().and_then(|id| scope_ids.get(id).copied()),
                function: s.function.as_deref().and_then(|id| function_ids.get(id).copied()),
            });
        }

        for v in &raw.variables.vars {
            let name_token = lookup_token(&dump.token_ids, &v.name_token, "nameToken")?;
            let name = name_token
                .map(|t| dump.tokens[t.0 as usize].text.clone())
                .unwrap_or_else(|| "<anon>".to_owned());
            dump.variables.push(Variable {
                id: v.id.clone(),
                name_token,
                name,
            });
        }

        debug!(
            target: "dump",
            tokens = dump.tokens.len(),
            scopes = dump.scopes.len(),
            variables = dump.variables.len(),
            functions = dump.functions.len(),
            "dump resolved"
        );

        Ok(dump)
    }
}

// ---------------------------------------------------------------------------
//  Raw XML layer (quick-xml serde view of the dump file)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDump {
    tokenlist: RawTokenList,
    #[serde(default)]
    scopes: RawScopes,
    #[serde(default)]
    functions: RawFunctions,
    #[serde(default)]
    variables: RawVariables,
}

#[derive(Debug, Default, Deserialize)]
struct RawTokenList {
    #[serde(rename = "token", default)]
    tokens: Vec<RawToken>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@str")]
    str_: String,
    #[serde(rename = "@linenr")]
    linenr: Option<u32>,
    #[serde(rename = "@scope")]
    scope: Option<String>,
    #[serde(rename = "@astOperand1")]
    ast_operand1: Option<String>,
    #[serde(rename = "@astOperand2")]
    ast_operand2: Option<String>,
    #[serde(rename = "@astParent")]
    ast_parent: Option<String>,
    #[serde(rename = "@variable")]
    variable: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScopes {
    #[serde(rename = "scope", default)]
    scopes: Vec<RawScope>,
}

#[derive(Debug, Deserialize)]
struct RawScope {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@className")]
    class_name: Option<String>,
    #[serde(rename = "@classStart")]
    class_start: Option<String>,
    #[serde(rename = "@classEnd")]
    class_end: Option<String>,
    #[serde(rename = "@nestedIn")]
    nested_in: Option<String>,
    #[serde(rename = "@function")]
    function: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFunctions {
    #[serde(rename = "function", default)]
    functions: Vec<RawFunction>,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "arg", default)]
    args: Vec<RawArg>,
}

#[derive(Debug, Deserialize)]
struct RawArg {
    #[serde(rename = "@variable")]
    variable: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawVariables {
    #[serde(rename = "var", default)]
    vars: Vec<RawVariable>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@nameToken")]
    name_token: Option<String>,
}

#[test]
fn resolves_links_from_xml() {
    let xml = r#"
        <dump>
          <tokenlist>
            <token id="t1" str="x" linenr="3" scope="s1" astParent="t2" variable="v1"/>
            <token id="t2" str="=" linenr="3" scope="s1" astOperand1="t1" astOperand2="t3"/>
            <token id="t3" str="1" linenr="3" scope="s1" astParent="t2"/>
          </tokenlist>
          <scopes>
            <scope id="s1" type="Function" className="f" classStart="t1" classEnd="t3" function="f1"/>
          </scopes>
          <functions>
            <function id="f1" name="f"><arg nr="1" variable="v1"/></function>
          </functions>
          <variables>
            <var id="v1" nameToken="t1"/>
          </variables>
        </dump>"#;

    let dump = Dump::from_xml(xml).expect("well-formed dump");
    assert_eq!(dump.tokens.len(), 3);

    let eq = dump.token_by_id("t2").unwrap();
    let x = dump.token_by_id("t1").unwrap();
    assert_eq!(dump.token(eq).ast_operand1, Some(x));
    assert_eq!(dump.token(x).ast_parent, Some(eq));
    assert_eq!(dump.token(x).next, Some(eq));
    assert_eq!(dump.token(eq).previous, Some(x));

    let v = dump.token(x).variable.unwrap();
    assert_eq!(dump.variable(v).name, "x");

    let scope = dump.token(x).scope.unwrap();
    assert_eq!(dump.scope(scope).kind, ScopeKind::Function);
    let f = dump.scope(scope).function.unwrap();
    assert_eq!(dump.function(f).arguments, vec![v]);
}

#[test]
fn dangling_reference_is_rejected() {
    let xml = r#"
        <dump>
          <tokenlist>
            <token id="t1" str="x" astParent="missing"/>
          </tokenlist>
        </dump>"#;

    let err = Dump::from_xml(xml).unwrap_err();
    assert!(matches!(err, UnifixError::Dump(_)));
}

#[test]
fn synthesized_tokens_get_fresh_ids() {
    let mut dump = Dump::default();
    let a = dump.synth_token("*");
    let b = dump.synth_token("*");
    assert_ne!(dump.token(a).id, dump.token(b).id);
    assert_eq!(dump.token_by_id(&dump.token(a).id.clone()), Some(a));
}
