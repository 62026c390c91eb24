//! Terminological axioms

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::concept::Concept;
use crate::logic::ImplicationKind;

/// `A ⊑ C` with a degree and an implication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveConceptDefinition {
    pub defined: String,
    pub definition: Concept,
    pub implication: ImplicationKind,
    pub degree: f64,
}

impl PrimitiveConceptDefinition {
    pub fn new(defined: impl Into<String>, definition: Concept, implication: ImplicationKind, degree: f64) -> Self {
        Self {
            defined: defined.into(),
            definition,
            implication: implication.normalize(degree),
            degree,
        }
    }

    /// Canonical identity used for deduplication
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PrimitiveConceptDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {} {} {})",
            self.implication.keyword(),
            self.defined,
            self.definition,
            self.degree
        )
    }
}

/// `C ≡ D`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEquivalence {
    pub left: Concept,
    pub right: Concept,
}

impl ConceptEquivalence {
    pub fn new(left: Concept, right: Concept) -> Self {
        Self { left, right }
    }
}

impl fmt::Display for ConceptEquivalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(equivalent-concepts {} {})", self.left, self.right)
    }
}

/// General concept inclusion `C ⊑ D`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConceptInclusion {
    pub subsumed: Concept,
    pub subsumer: Concept,
    pub degree: f64,
    pub implication: ImplicationKind,
}

impl GeneralConceptInclusion {
    pub fn new(subsumed: Concept, subsumer: Concept, degree: f64, implication: ImplicationKind) -> Self {
        Self {
            subsumed,
            subsumer,
            degree,
            implication: implication.normalize(degree),
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    /// `⊤ ⊑ (C → D)`, the form in which unabsorbable axioms are applied
    pub fn as_goal(&self) -> Concept {
        Concept::implies(self.implication, self.subsumed.clone(), self.subsumer.clone())
    }
}

impl fmt::Display for GeneralConceptInclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {} {} {})",
            self.implication.keyword(),
            self.subsumed,
            self.subsumer,
            self.degree
        )
    }
}
