//! Piecewise-linear membership functions: modifiers, fuzzy concrete concepts,
//! triangular fuzzy numbers and fuzzy quantifiers.
//!
//! Every shape exposes its membership function as a list of closed
//! [`Segment`]s. The reasoner encodes a segment list with one selector binary
//! per segment, so shapes never need their own MILP code.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ModelError;

/// Linear piece `y = y0 + (x - x0) * (y1 - y0) / (x1 - x0)` on `[x0, x1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl Segment {
    pub fn new(x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        Self { x0, x1, y0, y1 }
    }

    pub fn slope(&self) -> f64 {
        if (self.x1 - self.x0).abs() < f64::EPSILON {
            0.0
        } else {
            (self.y1 - self.y0) / (self.x1 - self.x0)
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.x0 && x <= self.x1
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.y0 + (x - self.x0) * self.slope()
    }
}

/// Builds segments through consecutive points, skipping zero-width pieces
fn polyline(points: &[(f64, f64)]) -> Vec<Segment> {
    points
        .windows(2)
        .filter(|w| w[1].0 > w[0].0)
        .map(|w| Segment::new(w[0].0, w[1].0, w[0].1, w[1].1))
        .collect()
}

/// Evaluates a segment list; the first matching segment wins
pub fn evaluate_segments(segments: &[Segment], x: f64) -> f64 {
    segments
        .iter()
        .find(|s| s.contains(x))
        .map(|s| s.evaluate(x))
        .unwrap_or(0.0)
}

/// Fuzzy modifier (hedge) applied to a degree in [0,1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Modifier {
    /// Linear hedge with knee at `(c / (c + 1), 1 / (c + 1))`
    Linear { name: String, c: f64 },
    /// Triangular hedge `(a, b, c)` over [0,1]
    Triangular { name: String, a: f64, b: f64, c: f64 },
}

impl Modifier {
    pub fn linear(name: impl Into<String>, c: f64) -> Result<Self, ModelError> {
        if !(c > 0.0) {
            return Err(ModelError::InvalidShape(format!("linear modifier needs c > 0, got {c}")));
        }
        Ok(Modifier::Linear { name: name.into(), c })
    }

    pub fn triangular(name: impl Into<String>, a: f64, b: f64, c: f64) -> Result<Self, ModelError> {
        if !(0.0 <= a && a <= b && b <= c && c <= 1.0) {
            return Err(ModelError::InvalidShape(format!(
                "triangular modifier needs 0 <= a <= b <= c <= 1, got ({a}, {b}, {c})"
            )));
        }
        Ok(Modifier::Triangular { name: name.into(), a, b, c })
    }

    pub fn name(&self) -> &str {
        match self {
            Modifier::Linear { name, .. } | Modifier::Triangular { name, .. } => name,
        }
    }

    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Modifier::Linear { c, .. } => {
                let a = c / (c + 1.0);
                let b = 1.0 / (c + 1.0);
                polyline(&[(0.0, 0.0), (a, b), (1.0, 1.0)])
            }
            Modifier::Triangular { a, b, c, .. } => {
                polyline(&[(0.0, 0.0), (*a, 0.0), (*b, 1.0), (*c, 0.0), (1.0, 0.0)])
            }
        }
    }

    pub fn apply(&self, degree: f64) -> f64 {
        evaluate_segments(&self.segments(), degree)
    }

    /// Definition in the textual knowledge-base dialect
    pub fn definition(&self) -> String {
        match self {
            Modifier::Linear { name, c } => format!("(define-modifier {name} linear-modifier({c}))"),
            Modifier::Triangular { name, a, b, c } => {
                format!("(define-modifier {name} triangular-modifier({a}, {b}, {c}))")
            }
        }
    }
}

/// Membership shape of a fuzzy concrete concept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConcreteShape {
    Crisp { a: f64, b: f64 },
    LeftShoulder { a: f64, b: f64 },
    RightShoulder { a: f64, b: f64 },
    Linear { a: f64, b: f64 },
    Triangular { a: f64, b: f64, c: f64 },
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
}

impl ConcreteShape {
    fn keyword(&self) -> &'static str {
        match self {
            ConcreteShape::Crisp { .. } => "crisp",
            ConcreteShape::LeftShoulder { .. } => "left-shoulder",
            ConcreteShape::RightShoulder { .. } => "right-shoulder",
            ConcreteShape::Linear { .. } => "linear",
            ConcreteShape::Triangular { .. } => "triangular",
            ConcreteShape::Trapezoidal { .. } => "trapezoidal",
        }
    }

    fn parameters(&self) -> Vec<f64> {
        match *self {
            ConcreteShape::Crisp { a, b }
            | ConcreteShape::LeftShoulder { a, b }
            | ConcreteShape::RightShoulder { a, b }
            | ConcreteShape::Linear { a, b } => vec![a, b],
            ConcreteShape::Triangular { a, b, c } => vec![a, b, c],
            ConcreteShape::Trapezoidal { a, b, c, d } => vec![a, b, c, d],
        }
    }
}

/// Named fuzzy set over a concrete domain `[k1, k2]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConcreteConcept {
    pub name: String,
    pub k1: f64,
    pub k2: f64,
    pub shape: ConcreteShape,
}

impl FuzzyConcreteConcept {
    pub fn new(name: impl Into<String>, k1: f64, k2: f64, shape: ConcreteShape) -> Result<Self, ModelError> {
        let name = name.into();
        if k1 > k2 {
            return Err(ModelError::InvalidShape(format!("{name}: empty domain [{k1}, {k2}]")));
        }
        let params = shape.parameters();
        if params.windows(2).any(|w| w[0] > w[1]) {
            return Err(ModelError::InvalidShape(format!(
                "{name}: {} parameters must be non-decreasing",
                shape.keyword()
            )));
        }
        // Linear shapes take a degree as their second parameter.
        let points_in_domain = match shape {
            ConcreteShape::Linear { a, b } => (k1..=k2).contains(&a) && (0.0..=1.0).contains(&b),
            _ => params.iter().all(|p| (k1..=k2).contains(p)),
        };
        if !points_in_domain {
            return Err(ModelError::InvalidShape(format!(
                "{name}: parameters outside domain [{k1}, {k2}]"
            )));
        }
        Ok(Self { name, k1, k2, shape })
    }

    pub fn segments(&self) -> Vec<Segment> {
        let (k1, k2) = (self.k1, self.k2);
        match self.shape {
            ConcreteShape::Crisp { a, b } => {
                let mut segments = Vec::new();
                if a > k1 {
                    segments.push(Segment::new(k1, a, 0.0, 0.0));
                }
                segments.push(Segment::new(a, b, 1.0, 1.0));
                if b < k2 {
                    segments.push(Segment::new(b, k2, 0.0, 0.0));
                }
                segments
            }
            ConcreteShape::LeftShoulder { a, b } => polyline(&[(k1, 1.0), (a, 1.0), (b, 0.0), (k2, 0.0)]),
            ConcreteShape::RightShoulder { a, b } => polyline(&[(k1, 0.0), (a, 0.0), (b, 1.0), (k2, 1.0)]),
            ConcreteShape::Linear { a, b } => polyline(&[(k1, 0.0), (a, b), (k2, 1.0)]),
            ConcreteShape::Triangular { a, b, c } => {
                polyline(&[(k1, 0.0), (a, 0.0), (b, 1.0), (c, 0.0), (k2, 0.0)])
            }
            ConcreteShape::Trapezoidal { a, b, c, d } => {
                polyline(&[(k1, 0.0), (a, 0.0), (b, 1.0), (c, 1.0), (d, 0.0), (k2, 0.0)])
            }
        }
    }

    pub fn membership(&self, x: f64) -> f64 {
        evaluate_segments(&self.segments(), x)
    }

    /// Definition in the textual knowledge-base dialect
    pub fn definition(&self) -> String {
        let params = std::iter::once(self.k1)
            .chain(std::iter::once(self.k2))
            .chain(self.shape.parameters())
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("(define-fuzzy-concept {} {}({params}))", self.name, self.shape.keyword())
    }
}

/// Triangular fuzzy number `(a, b, c)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangularFuzzyNumber {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl TriangularFuzzyNumber {
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, ModelError> {
        if !(a <= b && b <= c) {
            return Err(ModelError::InvalidShape(format!("fuzzy number ({a}, {b}, {c}) is not ordered")));
        }
        Ok(Self { a, b, c })
    }

    /// Crisp number `n` as the degenerate triangle `(n, n, n)`
    pub fn crisp(n: f64) -> Self {
        Self { a: n, b: n, c: n }
    }

    pub fn is_crisp(&self) -> bool {
        self.a == self.b && self.b == self.c
    }

    pub fn add(&self, other: &Self) -> Self {
        Self {
            a: self.a + other.a,
            b: self.b + other.b,
            c: self.c + other.c,
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self {
            a: self.a - other.c,
            b: self.b - other.b,
            c: self.c - other.a,
        }
    }

    /// Membership segments over the fuzzy-number range `[k1, k2]`
    pub fn segments(&self, k1: f64, k2: f64) -> Vec<Segment> {
        if self.is_crisp() {
            let mut segments = Vec::new();
            if self.b > k1 {
                segments.push(Segment::new(k1, self.b, 0.0, 0.0));
            }
            segments.push(Segment::new(self.b, self.b, 1.0, 1.0));
            if self.b < k2 {
                segments.push(Segment::new(self.b, k2, 0.0, 0.0));
            }
            return segments;
        }
        polyline(&[
            (k1.min(self.a), 0.0),
            (self.a, 0.0),
            (self.b, 1.0),
            (self.c, 0.0),
            (k2.max(self.c), 0.0),
        ])
    }

    pub fn membership(&self, x: f64) -> f64 {
        if x == self.b {
            return 1.0;
        }
        if x <= self.a || x >= self.c {
            return 0.0;
        }
        if x < self.b {
            (x - self.a) / (self.b - self.a)
        } else {
            (self.c - x) / (self.c - self.b)
        }
    }
}

impl fmt::Display for TriangularFuzzyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.c)
    }
}

/// Fuzzy quantifier `Q: [0,1] -> [0,1]` used by quantifier-guided OWA
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FuzzyQuantifier {
    RightShoulder { a: f64, b: f64 },
    Linear { a: f64, b: f64 },
}

impl FuzzyQuantifier {
    pub fn evaluate(&self, x: f64) -> f64 {
        let segments = match *self {
            FuzzyQuantifier::RightShoulder { a, b } => polyline(&[(0.0, 0.0), (a, 0.0), (b, 1.0), (1.0, 1.0)]),
            FuzzyQuantifier::Linear { a, b } => polyline(&[(0.0, 0.0), (a, b), (1.0, 1.0)]),
        };
        evaluate_segments(&segments, x)
    }

    /// OWA weights `w_j = Q(j/n) - Q((j-1)/n)`
    pub fn owa_weights(&self, n: usize) -> Vec<f64> {
        let n_f = n as f64;
        (1..=n)
            .map(|j| self.evaluate(j as f64 / n_f) - self.evaluate((j - 1) as f64 / n_f))
            .collect()
    }
}

impl fmt::Display for FuzzyQuantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuzzyQuantifier::RightShoulder { a, b } => write!(f, "right-shoulder({a}, {b})"),
            FuzzyQuantifier::Linear { a, b } => write!(f, "linear({a}, {b})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_linear_modifier_knee() {
        let very = Modifier::linear("very", 3.0).unwrap();
        assert!((very.apply(0.75) - 0.25).abs() < 1e-12);
        assert_eq!(very.apply(1.0), 1.0);
        assert_eq!(very.apply(0.0), 0.0);
    }

    #[test]
    fn test_trapezoid_membership() {
        let warm = FuzzyConcreteConcept::new(
            "Warm",
            0.0,
            40.0,
            ConcreteShape::Trapezoidal { a: 15.0, b: 20.0, c: 25.0, d: 30.0 },
        )
        .unwrap();
        assert_eq!(warm.membership(22.0), 1.0);
        assert!((warm.membership(17.5) - 0.5).abs() < 1e-12);
        assert_eq!(warm.membership(35.0), 0.0);
        assert_eq!(warm.segments().len(), 5);
    }

    #[test]
    fn test_invalid_shape_rejected() {
        let bad = FuzzyConcreteConcept::new("Bad", 0.0, 10.0, ConcreteShape::LeftShoulder { a: 8.0, b: 2.0 });
        assert!(bad.is_err());
    }

    #[test]
    fn test_quantifier_weights_sum_to_one() {
        let most = FuzzyQuantifier::RightShoulder { a: 0.3, b: 0.8 };
        let weights = most.owa_weights(4);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_number_arithmetic() {
        let x = TriangularFuzzyNumber::new(1.0, 2.0, 3.0).unwrap();
        let y = TriangularFuzzyNumber::new(0.0, 1.0, 4.0).unwrap();
        assert_eq!(x.add(&y), TriangularFuzzyNumber { a: 1.0, b: 3.0, c: 7.0 });
        assert_eq!(x.sub(&y), TriangularFuzzyNumber { a: -3.0, b: 1.0, c: 3.0 });
    }

    proptest! {
        #[test]
        fn membership_stays_in_unit_interval(x in 0.0f64..100.0) {
            let young = FuzzyConcreteConcept::new(
                "Young", 0.0, 100.0, ConcreteShape::LeftShoulder { a: 20.0, b: 35.0 }
            ).unwrap();
            let m = young.membership(x);
            prop_assert!((0.0..=1.0).contains(&m));
        }

        #[test]
        fn segments_agree_with_closed_form(x in 0.5f64..9.5) {
            let n = TriangularFuzzyNumber::new(2.0, 5.0, 7.0).unwrap();
            let by_segments = evaluate_segments(&n.segments(0.0, 10.0), x);
            prop_assert!((by_segments - n.membership(x)).abs() < 1e-9);
        }
    }
}
