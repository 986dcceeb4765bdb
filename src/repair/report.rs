//! The unit checker's JSON report: error sites, per-variable ranked unit
//! hypotheses, per-token units. Everything the repair stage knows about
//! units funnels through [`UnitEnv`].

use crate::parse::dump::{Dump, TokenIdx, VarIdx};
use crate::repair::units::UnitMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ErrorKind {
    AdditionOfIncompatibleUnits,
    ComparisonIncompatibleUnits,
    VariableMultipleUnits,
    /// Anything else passes through unrepaired.
    Other(String),
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ADDITION_OF_INCOMPATIBLE_UNITS" => ErrorKind::AdditionOfIncompatibleUnits,
            "COMPARISON_INCOMPATIBLE_UNITS" => ErrorKind::ComparisonIncompatibleUnits,
            "VARIABLE_MULTIPLE_UNITS" => ErrorKind::VariableMultipleUnits,
            _ => ErrorKind::Other(s),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AdditionOfIncompatibleUnits => {
                write!(f, "ADDITION_OF_INCOMPATIBLE_UNITS")
            }
            ErrorKind::ComparisonIncompatibleUnits => {
                write!(f, "COMPARISON_INCOMPATIBLE_UNITS")
            }
            ErrorKind::VariableMultipleUnits => write!(f, "VARIABLE_MULTIPLE_UNITS"),
            ErrorKind::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportedError {
    pub root_token_id: String,
    pub token_id: String,
    pub error_type: ErrorKind,
}

/// `units` entries may be a plain unit-map or a ranked list; the checker
/// emits both shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum UnitsEntry {
    One(UnitMap),
    Ranked(Vec<UnitMap>),
}

#[derive(Debug, Clone, Deserialize)]
struct ReportedVariable {
    var_name: String,
    var_id: String,
    #[serde(default)]
    units: Vec<UnitsEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitReport {
    #[serde(default)]
    pub errors: Vec<ReportedError>,
    #[serde(default)]
    variables: Vec<ReportedVariable>,
    #[serde(default)]
    token_units: HashMap<String, UnitMap>,
}

impl UnitReport {
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::errors::UnifixResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// A variable with the checker's ranked unit hypotheses. Element 0 is the
/// most likely and the only one current strategies consult; the rest stays
/// available for later multi-unit search.
#[derive(Debug, Clone)]
pub struct PhysVar {
    pub var_name: String,
    pub var_id: String,
    pub units: Vec<UnitMap>,
}

/// Unit lookups for the repair stage.
#[derive(Debug, Clone, Default)]
pub struct UnitEnv {
    /// Keyed by the variable's external id.
    pub vars: HashMap<String, PhysVar>,
    /// Keyed by the token's external id.
    pub token_units: HashMap<String, UnitMap>,
}

impl UnitEnv {
    pub fn from_report(report: &UnitReport) -> UnitEnv {
        let mut vars = HashMap::new();
        for v in &report.variables {
            let units = v
                .units
                .iter()
                .filter_map(|u| match u {
                    UnitsEntry::One(m) => Some(m.clone()),
                    UnitsEntry::Ranked(list) => list.first().cloned(),
                })
                .collect();
            vars.insert(
                v.var_id.clone(),
                PhysVar {
                    var_name: v.var_name.clone(),
                    var_id: v.var_id.clone(),
                    units,
                },
            );
        }
        UnitEnv {
            vars,
            token_units: report.token_units.clone(),
        }
    }

    /// Top-ranked unit of a variable, if the checker knows one.
    pub fn variable_unit(&self, dump: &Dump, var: VarIdx) -> Option<&UnitMap> {
        self.vars
            .get(&dump.variable(var).id)
            .and_then(|p| p.units.first())
    }

    /// Unit of an operand token: the variable's top-ranked unit for
    /// variable occurrences, the token-unit table otherwise.
    pub fn operand_unit(&self, dump: &Dump, token: TokenIdx) -> Option<UnitMap> {
        let tok = dump.token(token);
        match tok.variable {
            Some(v) => self.variable_unit(dump, v).cloned(),
            None => self.token_units.get(&tok.id).cloned(),
        }
    }

    /// Walks from `token` up to the expression root, inverting each
    /// operator to find the unit `token` must have for the statement's LHS
    /// (with unit `lhs_unit`) to balance.
    ///
    /// Through `a * b` the sibling's unit multiplies the target. Through
    /// `a / b` the direction matters: walking out of the numerator divides
    /// by the sibling, walking out of the denominator multiplies by it.
    /// A `sqrt(...)` call squares the target. Operands with unknown units
    /// are treated as dimensionless.
    pub fn inverse_unit(&self, dump: &Dump, lhs_unit: &UnitMap, token: TokenIdx) -> UnitMap {
        let mut target = lhs_unit.clone();
        let mut cur = token;

        while let Some(parent) = dump.token(cur).ast_parent {
            let ptok = dump.token(parent);
            match ptok.text.as_str() {
                "*" => {
                    if let Some(unit) = self.sibling_unit(dump, parent, cur) {
                        target = target.multiply(&unit);
                    }
                }
                "/" => {
                    let from_numerator = ptok.ast_operand1 == Some(cur);
                    if let Some(unit) = self.sibling_unit(dump, parent, cur) {
                        target = if from_numerator {
                            target.divide(&unit)
                        } else {
                            target.multiply(&unit)
                        };
                    }
                }
                "(" => {
                    let callee = ptok
                        .ast_operand1
                        .map(|c| dump.token(c).text.as_str() == "sqrt")
                        .unwrap_or(false);
                    if callee {
                        target = target.pow(2.0);
                    }
                }
                _ => {}
            }
            cur = parent;
        }

        target
    }

    fn sibling_unit(&self, dump: &Dump, parent: TokenIdx, child: TokenIdx) -> Option<UnitMap> {
        let ptok = dump.token(parent);
        let sibling = if ptok.ast_operand2 == Some(child) {
            ptok.ast_operand1
        } else {
            ptok.ast_operand2
        }?;
        self.operand_unit(dump, sibling)
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[test]
fn report_parses_both_unit_shapes() {
    let text = r#"{
        "errors": [
            { "root_token_id": "t9", "token_id": "t5",
              "error_type": "ADDITION_OF_INCOMPATIBLE_UNITS" },
            { "root_token_id": "t2", "token_id": "t2",
              "error_type": "SOMETHING_NEW" }
        ],
        "variables": [
            { "var_name": "v", "var_id": "id-v", "units": [ { "m": 1 } ] },
            { "var_name": "w", "var_id": "id-w",
              "units": [ [ { "s": -1 }, { "s": -2 } ], { "m": 1 } ] }
        ],
        "token_units": { "t7": { "m": 1, "s": -1 } }
    }"#;

    let report: UnitReport = serde_json::from_str(text).expect("parses");
    assert_eq!(report.errors.len(), 2);
    assert_eq!(
        report.errors[0].error_type,
        ErrorKind::AdditionOfIncompatibleUnits
    );
    assert_eq!(
        report.errors[1].error_type,
        ErrorKind::Other("SOMETHING_NEW".to_owned())
    );

    let env = UnitEnv::from_report(&report);
    // Ranked lists flatten to their first element.
    assert_eq!(env.vars["id-w"].units[0], UnitMap::of(&[("s", -1.0)]));
    assert_eq!(env.vars["id-w"].units[1], UnitMap::of(&[("m", 1.0)]));
    assert_eq!(env.token_units["t7"], UnitMap::of(&[("m", 1.0), ("s", -1.0)]));
}

#[cfg(test)]
fn env_with(vars: &[(&str, UnitMap)]) -> UnitEnv {
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
fn inverse_walk_through_multiplication() {
    use crate::testkit::TestDump;

    // v = a * (t + x): the target for the `+` subtree is U_v multiplied by
    // unit(a).
    let mut d = TestDump::new();
    let v = d.var_tok("v");
    let eq = d.tok("=");
    let a = d.var_tok("a");
    let mul = d.tok("*");
    let t = d.var_tok("t");
    let plus = d.tok("+");
    let x = d.var_tok("x");
    d.wire(plus, t, x);
    d.wire(mul, a, plus);
    d.wire(eq, v, mul);

    let env = env_with(&[("a", UnitMap::of(&[("s", 1.0)]))]);
    let lhs = UnitMap::of(&[("m", 1.0)]);
    let target = env.inverse_unit(&d.dump, &lhs, plus);
    assert_eq!(target, UnitMap::of(&[("m", 1.0), ("s", 1.0)]));
}

#[test]
fn inverse_walk_divides_for_the_numerator_only() {
    use crate::testkit::TestDump;

    // v = t / u
    let mut d = TestDump::new();
    let v = d.var_tok("v");
    let eq = d.tok("=");
    let t = d.var_tok("t");
    let div = d.tok("/");
    let u = d.var_tok("u");
    d.wire(div, t, u);
    d.wire(eq, v, div);

    let env = env_with(&[
        ("t", UnitMap::of(&[("m", 1.0)])),
        ("u", UnitMap::of(&[("s", 1.0)])),
    ]);
    let lhs = UnitMap::of(&[("m", 1.0), ("s", -1.0)]);

    // Walking out of the numerator: target = lhs / unit(u).
    assert_eq!(
        env.inverse_unit(&d.dump, &lhs, t),
        UnitMap::of(&[("m", 1.0), ("s", -2.0)])
    );
    // Walking out of the denominator: target = lhs * unit(t).
    assert_eq!(
        env.inverse_unit(&d.dump, &lhs, u),
        UnitMap::of(&[("m", 2.0), ("s", -1.0)])
    );
}

#[test]
fn inverse_walk_squares_through_sqrt() {
    use crate::testkit::TestDump;

    // v = sqrt ( x )
    let mut d = TestDump::new();
    let v = d.var_tok("v");
    let eq = d.tok("=");
    let sqrt = d.tok("sqrt");
    let paren = d.tok("(");
    let x = d.var_tok("x");
    d.wire(paren, sqrt, x);
    d.wire(eq, v, paren);

    let env = UnitEnv::default();
    let lhs = UnitMap::of(&[("m", 1.0)]);
    assert_eq!(
        env.inverse_unit(&d.dump, &lhs, x),
        UnitMap::of(&[("m", 2.0)])
    );
}
