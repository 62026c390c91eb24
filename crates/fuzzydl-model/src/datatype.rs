//! Concrete features and value restrictions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::fuzzy::TriangularFuzzyNumber;

/// Range of a concrete feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Ranked to Integer before expansion
    String,
    Integer { lower: f64, upper: f64 },
    Real { lower: f64, upper: f64 },
    Boolean,
}

impl FeatureKind {
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            FeatureKind::String => (0.0, 0.0),
            FeatureKind::Integer { lower, upper } | FeatureKind::Real { lower, upper } => (*lower, *upper),
            FeatureKind::Boolean => (0.0, 1.0),
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, FeatureKind::Integer { .. } | FeatureKind::Boolean | FeatureKind::String)
    }

    /// Gap that turns a strict comparison into a non-strict one
    pub fn strictness_gap(&self, epsilon: f64) -> f64 {
        if self.is_integral() {
            1.0
        } else {
            epsilon
        }
    }

    pub fn definition(&self, feature: &str) -> String {
        match self {
            FeatureKind::String => format!("(functional {feature})\n(range {feature} *string*)"),
            FeatureKind::Integer { lower, upper } => {
                format!("(functional {feature})\n(range {feature} *integer* {lower} {upper})")
            }
            FeatureKind::Real { lower, upper } => {
                format!("(functional {feature})\n(range {feature} *real* {lower} {upper})")
            }
            FeatureKind::Boolean => format!("(functional {feature})\n(range {feature} *boolean*)"),
        }
    }
}

/// Linear combination of feature values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureFunction {
    Feature(String),
    Number(f64),
    Sum(Vec<FeatureFunction>),
    Difference(Box<FeatureFunction>, Box<FeatureFunction>),
    Product(f64, Box<FeatureFunction>),
}

impl FeatureFunction {
    /// Every feature the function reads, in name order
    pub fn features(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_features(&mut names);
        names
    }

    fn collect_features(&self, names: &mut BTreeSet<String>) {
        match self {
            FeatureFunction::Feature(f) => {
                names.insert(f.clone());
            }
            FeatureFunction::Number(_) => {}
            FeatureFunction::Sum(parts) => parts.iter().for_each(|p| p.collect_features(names)),
            FeatureFunction::Difference(a, b) => {
                a.collect_features(names);
                b.collect_features(names);
            }
            FeatureFunction::Product(_, inner) => inner.collect_features(names),
        }
    }
}

impl fmt::Display for FeatureFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureFunction::Feature(name) => write!(f, "{name}"),
            FeatureFunction::Number(n) => write!(f, "{n}"),
            FeatureFunction::Sum(parts) => {
                write!(f, "(+")?;
                for part in parts {
                    write!(f, " {part}")?;
                }
                write!(f, ")")
            }
            FeatureFunction::Difference(a, b) => write!(f, "(- {a} {b})"),
            FeatureFunction::Product(k, inner) => write!(f, "(* {k} {inner})"),
        }
    }
}

/// Right-hand side of a value restriction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RestrictionValue {
    Number(f64),
    Literal(String),
    Boolean(bool),
    Function(FeatureFunction),
    FuzzyNumber(TriangularFuzzyNumber),
}

impl fmt::Display for RestrictionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestrictionValue::Number(n) => write!(f, "{n}"),
            RestrictionValue::Literal(s) => write!(f, "\"{s}\""),
            RestrictionValue::Boolean(b) => write!(f, "{b}"),
            RestrictionValue::Function(func) => write!(f, "{func}"),
            RestrictionValue::FuzzyNumber(n) => write!(f, "{n}"),
        }
    }
}

/// Comparison of a value restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestrictionKind {
    AtLeast,
    AtMost,
    Exact,
}

impl RestrictionKind {
    pub fn symbol(self) -> &'static str {
        match self {
            RestrictionKind::AtLeast => ">=",
            RestrictionKind::AtMost => "<=",
            RestrictionKind::Exact => "=",
        }
    }
}

/// `(>= f v)`, `(<= f v)` or `(= f v)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatatypeRestriction {
    pub kind: RestrictionKind,
    pub feature: String,
    pub value: RestrictionValue,
}

impl DatatypeRestriction {
    pub fn new(kind: RestrictionKind, feature: impl Into<String>, value: RestrictionValue) -> Self {
        Self {
            kind,
            feature: feature.into(),
            value,
        }
    }
}

impl fmt::Display for DatatypeRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.kind.symbol(), self.feature, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_features() {
        let func = FeatureFunction::Difference(
            Box::new(FeatureFunction::Feature("hasIncome".into())),
            Box::new(FeatureFunction::Product(0.3, Box::new(FeatureFunction::Feature("hasTax".into())))),
        );
        let names: Vec<_> = func.features().into_iter().collect();
        assert_eq!(names, vec!["hasIncome".to_string(), "hasTax".to_string()]);
        assert_eq!(func.to_string(), "(- hasIncome (* 0.3 hasTax))");
    }

    #[test]
    fn test_strictness_gap() {
        assert_eq!(FeatureKind::Integer { lower: 0.0, upper: 9.0 }.strictness_gap(1e-3), 1.0);
        assert_eq!(FeatureKind::Real { lower: 0.0, upper: 9.0 }.strictness_gap(1e-3), 1e-3);
    }
}
