//! Linear expressions over MILP variables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Stable handle of a MILP variable inside one [`crate::MilpModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Constant plus a sparse sum of `coefficient * variable` terms.
///
/// Like terms are merged on insertion and zero coefficients are dropped,
/// so two expressions built in a different order compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    constant: f64,
    terms: BTreeMap<VarId, f64>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: BTreeMap::new(),
        }
    }

    pub fn var(var: VarId) -> Self {
        Self::term(1.0, var)
    }

    pub fn term(coefficient: f64, var: VarId) -> Self {
        let mut expr = Self::new();
        expr.add_term(coefficient, var);
        expr
    }

    /// Builds `Σ coefficient_i * var_i`
    pub fn sum<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (f64, VarId)>,
    {
        let mut expr = Self::new();
        for (coefficient, var) in terms {
            expr.add_term(coefficient, var);
        }
        expr
    }

    pub fn add_term(&mut self, coefficient: f64, var: VarId) {
        let entry = self.terms.entry(var).or_insert(0.0);
        *entry += coefficient;
        if entry.abs() < 1e-12 {
            self.terms.remove(&var);
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(var, coefficient)| (*var, *coefficient))
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().copied()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns `factor * self`
    pub fn scaled(&self, factor: f64) -> Self {
        let mut expr = Self::constant(self.constant * factor);
        for (var, coefficient) in &self.terms {
            expr.add_term(coefficient * factor, *var);
        }
        expr
    }

    /// Evaluates the expression under an assignment
    pub fn evaluate<F>(&self, value_of: F) -> f64
    where
        F: Fn(VarId) -> f64,
    {
        self.terms
            .iter()
            .fold(self.constant, |acc, (var, coefficient)| acc + coefficient * value_of(*var))
    }
}

impl From<VarId> for Expression {
    fn from(var: VarId) -> Self {
        Expression::var(var)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::constant(value)
    }
}

impl AddAssign<&Expression> for Expression {
    fn add_assign(&mut self, rhs: &Expression) {
        self.constant += rhs.constant;
        for (var, coefficient) in &rhs.terms {
            self.add_term(*coefficient, *var);
        }
    }
}

impl SubAssign<&Expression> for Expression {
    fn sub_assign(&mut self, rhs: &Expression) {
        self.constant -= rhs.constant;
        for (var, coefficient) in &rhs.terms {
            self.add_term(-coefficient, *var);
        }
    }
}

impl Add for Expression {
    type Output = Expression;

    fn add(mut self, rhs: Expression) -> Expression {
        self += &rhs;
        self
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: Expression) -> Expression {
        self -= &rhs;
        self
    }
}

impl Add<f64> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: f64) -> Expression {
        self.constant += rhs;
        self
    }
}

impl Sub<f64> for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: f64) -> Expression {
        self.constant -= rhs;
        self
    }
}

impl Add<VarId> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: VarId) -> Expression {
        self.add_term(1.0, rhs);
        self
    }
}

impl Sub<VarId> for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: VarId) -> Expression {
        self.add_term(-1.0, rhs);
        self
    }
}

impl Mul<f64> for Expression {
    type Output = Expression;

    fn mul(self, rhs: f64) -> Expression {
        self.scaled(rhs)
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.scaled(-1.0)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (var, coefficient) in &self.terms {
            if first {
                write!(f, "{coefficient} {var}")?;
                first = false;
            } else if *coefficient < 0.0 {
                write!(f, " - {} {var}", -coefficient)?;
            } else {
                write!(f, " + {coefficient} {var}")?;
            }
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant < 0.0 {
            write!(f, " - {}", -self.constant)
        } else if self.constant > 0.0 {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_terms_merge() {
        let x = VarId(0);
        let y = VarId(1);
        let expr = Expression::var(x) + Expression::term(2.0, y) - Expression::var(x);
        assert_eq!(expr.coefficient(x), 0.0);
        assert_eq!(expr.coefficient(y), 2.0);
        assert_eq!(expr.variables().count(), 1);
    }

    #[test]
    fn test_constant_arithmetic() {
        let x = VarId(3);
        let expr = (Expression::var(x) + 1.5) * 2.0 - 1.0;
        assert_eq!(expr.constant_term(), 2.0);
        assert_eq!(expr.coefficient(x), 2.0);
        assert_eq!(expr.evaluate(|_| 0.25), 2.5);
    }

    #[test]
    fn test_negation() {
        let x = VarId(1);
        let expr = -(Expression::var(x) - 1.0);
        assert_eq!(expr.constant_term(), 1.0);
        assert_eq!(expr.coefficient(x), -1.0);
    }
}
