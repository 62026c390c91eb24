//! Truth degrees attached to assertions and relations

use fuzzydl_milp::{Expression, VarId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of an assertion: a number in [0,1] or a symbolic MILP term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Degree {
    Numeric(f64),
    Variable(VarId),
    Expression(Expression),
}

impl Degree {
    pub const ONE: Degree = Degree::Numeric(1.0);

    pub fn numeric(value: f64) -> Self {
        Degree::Numeric(value)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Degree::Numeric(v) => Some(*v),
            Degree::Expression(expr) if expr.is_constant() => Some(expr.constant_term()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.value().is_some()
    }

    /// A numeric zero degree makes its assertion trivially true
    pub fn is_zero(&self) -> bool {
        matches!(self.value(), Some(v) if v <= 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self.value(), Some(v) if v >= 1.0)
    }

    pub fn to_expression(&self) -> Expression {
        match self {
            Degree::Numeric(v) => Expression::constant(*v),
            Degree::Variable(var) => Expression::var(*var),
            Degree::Expression(expr) => expr.clone(),
        }
    }

    /// Keeps the larger of two numeric degrees; symbolic degrees never compare
    pub fn is_stronger_than(&self, other: &Degree) -> bool {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a > b,
            _ => self != other,
        }
    }
}

impl From<f64> for Degree {
    fn from(value: f64) -> Self {
        Degree::Numeric(value)
    }
}

impl From<VarId> for Degree {
    fn from(var: VarId) -> Self {
        Degree::Variable(var)
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degree::Numeric(v) => write!(f, "{v}"),
            Degree::Variable(var) => write!(f, "{var}"),
            Degree::Expression(expr) => write!(f, "{expr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_detection() {
        assert!(Degree::numeric(0.0).is_zero());
        assert!(!Degree::numeric(0.2).is_zero());
        assert!(!Degree::Variable(VarId(0)).is_zero());
        assert!(Degree::Expression(Expression::constant(0.0)).is_zero());
    }

    #[test]
    fn test_stronger() {
        assert!(Degree::numeric(0.8).is_stronger_than(&Degree::numeric(0.5)));
        assert!(!Degree::numeric(0.5).is_stronger_than(&Degree::numeric(0.5)));
    }
}
