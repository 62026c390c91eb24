//! Fuzzy concept expressions
//!
//! `Concept` is a closed sum type. Its `Display` form is the canonical
//! s-expression, which doubles as structural identity inside the reasoner.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::datatype::DatatypeRestriction;
use crate::fuzzy::{FuzzyConcreteConcept, FuzzyQuantifier, Modifier, TriangularFuzzyNumber};
use crate::logic::{ConnectiveKind, ImplicationKind};
use crate::ModelError;

/// Direction of a threshold concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdKind {
    /// `[>= w] C`: 1 if the degree of C is at least w, 0 otherwise
    AtLeast,
    /// `[<= w] C`: 1 if the degree of C is at most w, 0 otherwise
    AtMost,
}

impl ThresholdKind {
    pub fn symbol(self) -> &'static str {
        match self {
            ThresholdKind::AtLeast => ">=",
            ThresholdKind::AtMost => "<=",
        }
    }
}

/// Fuzzy DL concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Concept {
    /// ⊤
    Top,
    /// ⊥
    Bottom,
    /// Concept name
    Atomic(String),
    /// ¬C (involutive negation)
    Not(Box<Concept>),
    /// C1 ⊓ ... ⊓ Cn
    And { kind: ConnectiveKind, operands: Vec<Concept> },
    /// C1 ⊔ ... ⊔ Cn
    Or { kind: ConnectiveKind, operands: Vec<Concept> },
    /// ∃R.C
    Exists { role: String, filler: Box<Concept> },
    /// ∀R.C
    ForAll { role: String, filler: Box<Concept> },
    /// ∃R.{a}
    HasValue { role: String, individual: String },
    /// ∃R.Self
    SelfRestriction(String),
    /// Crisp threshold with a numeric weight
    Threshold {
        kind: ThresholdKind,
        weight: f64,
        concept: Box<Concept>,
    },
    /// Crisp threshold whose weight is the MILP variable `variable`
    ExtThreshold {
        kind: ThresholdKind,
        variable: String,
        concept: Box<Concept>,
    },
    /// Σ wᵢ·Cᵢ with Σ wᵢ ≤ 1
    WeightedSum { weights: Vec<f64>, concepts: Vec<Concept> },
    /// Weighted sum that drops to 0 as soon as one operand is 0
    WeightedSumZero { weights: Vec<f64>, concepts: Vec<Concept> },
    /// minᵢ max(1 − wᵢ, Cᵢ)
    WeightedMin { weights: Vec<f64>, concepts: Vec<Concept> },
    /// maxᵢ min(wᵢ, Cᵢ)
    WeightedMax { weights: Vec<f64>, concepts: Vec<Concept> },
    /// Ordered weighted average
    Owa { weights: Vec<f64>, concepts: Vec<Concept> },
    /// OWA with weights induced by a fuzzy quantifier
    QuantifiedOwa {
        quantifier: FuzzyQuantifier,
        concepts: Vec<Concept>,
    },
    /// Choquet integral
    Choquet { weights: Vec<f64>, concepts: Vec<Concept> },
    /// Sugeno integral
    Sugeno { weights: Vec<f64>, concepts: Vec<Concept> },
    /// Sugeno integral with the Łukasiewicz t-norm in place of min
    QuasiSugeno { weights: Vec<f64>, concepts: Vec<Concept> },
    /// mod(C)
    Modified { modifier: Modifier, concept: Box<Concept> },
    /// Fuzzy concrete concept over a feature value
    Concrete(FuzzyConcreteConcept),
    /// Membership of a feature value in a triangular fuzzy number
    FuzzyNumber(TriangularFuzzyNumber),
    /// Value restriction over a concrete feature
    Datatype(DatatypeRestriction),
    /// C → D as a concept
    Implies {
        kind: ImplicationKind,
        antecedent: Box<Concept>,
        consequent: Box<Concept>,
    },
}

fn check_weights(what: &str, weights: &[f64], concepts: &[Concept]) -> Result<(), ModelError> {
    if weights.len() != concepts.len() {
        return Err(ModelError::ArityMismatch {
            constructor: what.to_string(),
            weights: weights.len(),
            concepts: concepts.len(),
        });
    }
    if concepts.is_empty() {
        return Err(ModelError::InvalidWeights(format!("{what} needs at least one operand")));
    }
    if let Some(w) = weights.iter().find(|w| !(0.0..=1.0).contains(*w)) {
        return Err(ModelError::InvalidWeights(format!("{what} weight {w} outside [0,1]")));
    }
    Ok(())
}

fn check_weight_sum(what: &str, weights: &[f64], exact: bool) -> Result<(), ModelError> {
    let sum: f64 = weights.iter().sum();
    let ok = if exact {
        (sum - 1.0).abs() < 1e-6
    } else {
        sum <= 1.0 + 1e-6
    };
    if ok {
        Ok(())
    } else {
        Err(ModelError::InvalidWeights(format!("{what} weights sum to {sum}")))
    }
}

fn check_max_weight_one(what: &str, weights: &[f64]) -> Result<(), ModelError> {
    let max = weights.iter().copied().fold(0.0, f64::max);
    if (max - 1.0).abs() < 1e-6 {
        Ok(())
    } else {
        Err(ModelError::InvalidWeights(format!("{what} needs a weight equal to 1, maximum is {max}")))
    }
}

impl Concept {
    pub fn atomic(name: impl Into<String>) -> Self {
        Concept::Atomic(name.into())
    }

    /// Negation pushed through the constructors that have a dual
    pub fn not(concept: Concept) -> Self {
        concept.complement()
    }

    /// Conjunction with ⊤ operands removed and same-kind nesting flattened
    pub fn and(kind: ConnectiveKind, operands: Vec<Concept>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Concept::Top => {}
                Concept::Bottom => return Concept::Bottom,
                Concept::And { kind: inner, operands } if inner == kind => flat.extend(operands),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Concept::Top,
            1 => flat.remove(0),
            _ => Concept::And { kind, operands: flat },
        }
    }

    /// Disjunction with ⊥ operands removed and same-kind nesting flattened
    pub fn or(kind: ConnectiveKind, operands: Vec<Concept>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Concept::Bottom => {}
                Concept::Top => return Concept::Top,
                Concept::Or { kind: inner, operands } if inner == kind => flat.extend(operands),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Concept::Bottom,
            1 => flat.remove(0),
            _ => Concept::Or { kind, operands: flat },
        }
    }

    pub fn exists(role: impl Into<String>, filler: Concept) -> Self {
        Concept::Exists {
            role: role.into(),
            filler: Box::new(filler),
        }
    }

    pub fn for_all(role: impl Into<String>, filler: Concept) -> Self {
        Concept::ForAll {
            role: role.into(),
            filler: Box::new(filler),
        }
    }

    pub fn has_value(role: impl Into<String>, individual: impl Into<String>) -> Self {
        Concept::HasValue {
            role: role.into(),
            individual: individual.into(),
        }
    }

    pub fn implies(kind: ImplicationKind, antecedent: Concept, consequent: Concept) -> Self {
        Concept::Implies {
            kind,
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        }
    }

    pub fn threshold(kind: ThresholdKind, weight: f64, concept: Concept) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(ModelError::InvalidWeights(format!("threshold weight {weight} outside [0,1]")));
        }
        Ok(Concept::Threshold {
            kind,
            weight,
            concept: Box::new(concept),
        })
    }

    pub fn modified(modifier: Modifier, concept: Concept) -> Self {
        Concept::Modified {
            modifier,
            concept: Box::new(concept),
        }
    }

    pub fn weighted_sum(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("w-sum", &weights, &concepts)?;
        check_weight_sum("w-sum", &weights, false)?;
        Ok(Concept::WeightedSum { weights, concepts })
    }

    pub fn weighted_sum_zero(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("w-sum-zero", &weights, &concepts)?;
        check_weight_sum("w-sum-zero", &weights, false)?;
        Ok(Concept::WeightedSumZero { weights, concepts })
    }

    pub fn weighted_min(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("w-min", &weights, &concepts)?;
        check_max_weight_one("w-min", &weights)?;
        Ok(Concept::WeightedMin { weights, concepts })
    }

    pub fn weighted_max(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("w-max", &weights, &concepts)?;
        check_max_weight_one("w-max", &weights)?;
        Ok(Concept::WeightedMax { weights, concepts })
    }

    pub fn owa(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("owa", &weights, &concepts)?;
        check_weight_sum("owa", &weights, true)?;
        Ok(Concept::Owa { weights, concepts })
    }

    pub fn quantified_owa(quantifier: FuzzyQuantifier, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        if concepts.is_empty() {
            return Err(ModelError::InvalidWeights("q-owa needs at least one operand".into()));
        }
        Ok(Concept::QuantifiedOwa { quantifier, concepts })
    }

    pub fn choquet(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("choquet", &weights, &concepts)?;
        Ok(Concept::Choquet { weights, concepts })
    }

    pub fn sugeno(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("sugeno", &weights, &concepts)?;
        Ok(Concept::Sugeno { weights, concepts })
    }

    pub fn quasi_sugeno(weights: Vec<f64>, concepts: Vec<Concept>) -> Result<Self, ModelError> {
        check_weights("q-sugeno", &weights, &concepts)?;
        Ok(Concept::QuasiSugeno { weights, concepts })
    }

    /// Involutive complement. De Morgan duals are used where they exist
    /// (⊤/⊥, ⊓/⊔, ∃/∀, double negation); everything else is wrapped in `Not`.
    pub fn complement(&self) -> Concept {
        match self {
            Concept::Top => Concept::Bottom,
            Concept::Bottom => Concept::Top,
            Concept::Not(inner) => (**inner).clone(),
            Concept::And { kind, operands } => Concept::Or {
                kind: *kind,
                operands: operands.iter().map(Concept::complement).collect(),
            },
            Concept::Or { kind, operands } => Concept::And {
                kind: *kind,
                operands: operands.iter().map(Concept::complement).collect(),
            },
            Concept::Exists { role, filler } => Concept::ForAll {
                role: role.clone(),
                filler: Box::new(filler.complement()),
            },
            Concept::ForAll { role, filler } => Concept::Exists {
                role: role.clone(),
                filler: Box::new(filler.complement()),
            },
            other => Concept::Not(Box::new(other.clone())),
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Concept::Top)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Concept::Bottom)
    }

    pub fn atomic_name(&self) -> Option<&str> {
        match self {
            Concept::Atomic(name) => Some(name),
            _ => None,
        }
    }

    /// Name of `A` when the concept is `¬A`
    pub fn complemented_atomic_name(&self) -> Option<&str> {
        match self {
            Concept::Not(inner) => inner.atomic_name(),
            _ => None,
        }
    }

    /// Concepts applied to a concrete filler rather than an abstract individual
    pub fn is_concrete(&self) -> bool {
        match self {
            Concept::Concrete(_) | Concept::FuzzyNumber(_) => true,
            Concept::Not(inner) => inner.is_concrete(),
            _ => false,
        }
    }

    /// Immediate sub-concepts
    pub fn children(&self) -> Vec<&Concept> {
        match self {
            Concept::Top
            | Concept::Bottom
            | Concept::Atomic(_)
            | Concept::HasValue { .. }
            | Concept::SelfRestriction(_)
            | Concept::Concrete(_)
            | Concept::FuzzyNumber(_)
            | Concept::Datatype(_) => Vec::new(),
            Concept::Not(c)
            | Concept::Threshold { concept: c, .. }
            | Concept::ExtThreshold { concept: c, .. }
            | Concept::Modified { concept: c, .. }
            | Concept::Exists { filler: c, .. }
            | Concept::ForAll { filler: c, .. } => vec![c.as_ref()],
            Concept::And { operands, .. } | Concept::Or { operands, .. } => operands.iter().collect(),
            Concept::WeightedSum { concepts, .. }
            | Concept::WeightedSumZero { concepts, .. }
            | Concept::WeightedMin { concepts, .. }
            | Concept::WeightedMax { concepts, .. }
            | Concept::Owa { concepts, .. }
            | Concept::QuantifiedOwa { concepts, .. }
            | Concept::Choquet { concepts, .. }
            | Concept::Sugeno { concepts, .. }
            | Concept::QuasiSugeno { concepts, .. } => concepts.iter().collect(),
            Concept::Implies {
                antecedent,
                consequent,
                ..
            } => vec![antecedent.as_ref(), consequent.as_ref()],
        }
    }

    /// Every atomic concept name occurring in the expression
    pub fn atomic_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(concept) = stack.pop() {
            if let Concept::Atomic(name) = concept {
                names.insert(name.clone());
            }
            stack.extend(concept.children());
        }
        names
    }

    /// Every abstract role occurring in the expression
    pub fn roles(&self) -> BTreeSet<String> {
        let mut roles = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(concept) = stack.pop() {
            match concept {
                Concept::Exists { role, .. }
                | Concept::ForAll { role, .. }
                | Concept::HasValue { role, .. }
                | Concept::SelfRestriction(role) => {
                    roles.insert(role.clone());
                }
                _ => {}
            }
            stack.extend(concept.children());
        }
        roles
    }
}

fn write_weighted(f: &mut fmt::Formatter<'_>, keyword: &str, weights: &[f64], concepts: &[Concept]) -> fmt::Result {
    write!(f, "({keyword}")?;
    for (w, c) in weights.iter().zip(concepts) {
        write!(f, " ({w} {c})")?;
    }
    write!(f, ")")
}

fn write_listed(f: &mut fmt::Formatter<'_>, keyword: &str, weights: &[f64], concepts: &[Concept]) -> fmt::Result {
    write!(
        f,
        "({keyword} ({}) ({}))",
        weights.iter().join(" "),
        concepts.iter().join(" ")
    )
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concept::Top => write!(f, "*top*"),
            Concept::Bottom => write!(f, "*bottom*"),
            Concept::Atomic(name) => write!(f, "{name}"),
            Concept::Not(inner) => write!(f, "(not {inner})"),
            Concept::And { kind, operands } => {
                write!(f, "({} {})", kind.and_keyword(), operands.iter().join(" "))
            }
            Concept::Or { kind, operands } => {
                write!(f, "({} {})", kind.or_keyword(), operands.iter().join(" "))
            }
            Concept::Exists { role, filler } => write!(f, "(some {role} {filler})"),
            Concept::ForAll { role, filler } => write!(f, "(all {role} {filler})"),
            Concept::HasValue { role, individual } => write!(f, "(b-some {role} {individual})"),
            Concept::SelfRestriction(role) => write!(f, "(self {role})"),
            Concept::Threshold { kind, weight, concept } => write!(f, "([{} {weight}] {concept})", kind.symbol()),
            Concept::ExtThreshold {
                kind,
                variable,
                concept,
            } => write!(f, "([{} {variable}] {concept})", kind.symbol()),
            Concept::WeightedSum { weights, concepts } => write_weighted(f, "w-sum", weights, concepts),
            Concept::WeightedSumZero { weights, concepts } => write_weighted(f, "w-sum-zero", weights, concepts),
            Concept::WeightedMin { weights, concepts } => write_weighted(f, "w-min", weights, concepts),
            Concept::WeightedMax { weights, concepts } => write_weighted(f, "w-max", weights, concepts),
            Concept::Owa { weights, concepts } => write_listed(f, "owa", weights, concepts),
            Concept::QuantifiedOwa { quantifier, concepts } => {
                write!(f, "(q-owa {quantifier} {})", concepts.iter().join(" "))
            }
            Concept::Choquet { weights, concepts } => write_listed(f, "choquet", weights, concepts),
            Concept::Sugeno { weights, concepts } => write_listed(f, "sugeno", weights, concepts),
            Concept::QuasiSugeno { weights, concepts } => write_listed(f, "q-sugeno", weights, concepts),
            Concept::Modified { modifier, concept } => write!(f, "({} {concept})", modifier.name()),
            Concept::Concrete(concrete) => write!(f, "{}", concrete.name),
            Concept::FuzzyNumber(number) => write!(f, "{number}"),
            Concept::Datatype(restriction) => write!(f, "{restriction}"),
            Concept::Implies {
                kind,
                antecedent,
                consequent,
            } => write!(f, "({} {antecedent} {consequent})", kind.keyword()),
        }
    }
}
