//! Physical units as a free abelian group: a map from base-unit name to
//! exponent. Equality, emptiness and the canonical key all ignore zero
//! exponents, so `multiply(u, inverse(u))` is dimensionless without any
//! eager cleanup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitMap(pub BTreeMap<String, f64>);

impl UnitMap {
    pub fn new() -> Self {
        UnitMap(BTreeMap::new())
    }

    pub fn of(entries: &[(&str, f64)]) -> Self {
        UnitMap(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    pub fn exponent(&self, unit: &str) -> f64 {
        self.0.get(unit).copied().unwrap_or(0.0)
    }

    /// No non-zero exponents.
    pub fn is_dimensionless(&self) -> bool {
        self.0.values().all(|&e| e == 0.0)
    }

    pub fn multiply(&self, other: &UnitMap) -> UnitMap {
        let mut out = self.0.clone();
        for (unit, expt) in &other.0 {
            *out.entry(unit.clone()).or_insert(0.0) += expt;
        }
        UnitMap(out)
    }

    pub fn divide(&self, other: &UnitMap) -> UnitMap {
        let mut out = self.0.clone();
        for (unit, expt) in &other.0 {
            *out.entry(unit.clone()).or_insert(0.0) -= expt;
        }
        UnitMap(out)
    }

    pub fn pow(&self, power: f64) -> UnitMap {
        UnitMap(
            self.0
                .iter()
                .map(|(unit, expt)| (unit.clone(), expt * power))
                .collect(),
        )
    }

    /// The unit `self` must be multiplied by to become `other`.
    pub fn diff(&self, other: &UnitMap) -> UnitMap {
        let mut out = BTreeMap::new();
        for (unit, expt) in &other.0 {
            let delta = expt - self.exponent(unit);
            if delta != 0.0 {
                out.insert(unit.clone(), delta);
            }
        }
        for (unit, expt) in &self.0 {
            if !other.0.contains_key(unit) && *expt != 0.0 {
                out.insert(unit.clone(), -expt);
            }
        }
        UnitMap(out)
    }

    /// Canonical form with zero entries dropped; stable across maps that
    /// compare equal. Used as a visited-state key by the fix search.
    pub fn key(&self) -> String {
        let mut out = String::new();
        for (unit, expt) in &self.0 {
            if *expt == 0.0 {
                continue;
            }
            if !out.is_empty() {
                out.push(';');
            }
            out.push_str(unit);
            out.push(':');
            out.push_str(&format!("{expt}"));
        }
        out
    }
}

impl PartialEq for UnitMap {
    fn eq(&self, other: &Self) -> bool {
        for (unit, expt) in &self.0 {
            if *expt != other.exponent(unit) {
                return false;
            }
        }
        for (unit, expt) in &other.0 {
            if *expt != self.exponent(unit) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for UnitMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "1");
        }
        let mut first = true;
        for (unit, expt) in &self.0 {
            if *expt == 0.0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if *expt == 1.0 {
                write!(f, "{unit}")?;
            } else {
                write!(f, "{unit}^{expt}")?;
            }
        }
        Ok(())
    }
}

#[test]
fn multiply_adds_exponents() {
    let metres = UnitMap::of(&[("m", 1.0)]);
    let speed = UnitMap::of(&[("m", 1.0), ("s", -1.0)]);
    let product = metres.multiply(&speed);
    assert_eq!(product, UnitMap::of(&[("m", 2.0), ("s", -1.0)]));
}

#[test]
fn divide_is_the_inverse_of_multiply() {
    let a = UnitMap::of(&[("m", 1.0), ("s", -2.0)]);
    let b = UnitMap::of(&[("kg", 1.0), ("s", 1.0)]);
    assert_eq!(a.multiply(&b).divide(&b), a);
}

#[test]
fn equality_ignores_zero_entries() {
    let explicit = UnitMap::of(&[("m", 1.0), ("s", 0.0)]);
    let implicit = UnitMap::of(&[("m", 1.0)]);
    assert_eq!(explicit, implicit);
    assert_eq!(explicit.key(), implicit.key());
    assert!(UnitMap::of(&[("s", 0.0)]).is_dimensionless());
}

#[test]
fn diff_finds_the_multiplier() {
    let seconds = UnitMap::of(&[("s", 1.0)]);
    let metres = UnitMap::of(&[("m", 1.0)]);
    let delta = seconds.diff(&metres);
    assert_eq!(seconds.multiply(&delta), metres);
}

#[test]
fn pow_scales_every_exponent() {
    let speed = UnitMap::of(&[("m", 1.0), ("s", -1.0)]);
    assert_eq!(speed.pow(2.0), UnitMap::of(&[("m", 2.0), ("s", -2.0)]));
}

#[test]
fn display_is_compact() {
    assert_eq!(UnitMap::new().to_string(), "1");
    assert_eq!(
        UnitMap::of(&[("m", 1.0), ("s", -2.0)]).to_string(),
        "m s^-2"
    );
}
