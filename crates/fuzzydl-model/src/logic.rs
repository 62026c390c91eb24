//! Fuzzy logics and operator families

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Semantics under which a knowledge base is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FuzzyLogic {
    /// Crisp semantics: every degree variable is binary
    Classical,
    /// Zadeh: min / max, Kleene-Dienes implication
    Zadeh,
    /// Łukasiewicz t-norm and residuum
    #[default]
    Lukasiewicz,
    /// Gödel: min / max, Gödel residuum
    Goedel,
}

impl FuzzyLogic {
    /// Implication used for axioms that do not name one explicitly
    pub fn default_implication(self) -> ImplicationKind {
        match self {
            FuzzyLogic::Classical | FuzzyLogic::Lukasiewicz => ImplicationKind::Lukasiewicz,
            FuzzyLogic::Goedel => ImplicationKind::Goedel,
            FuzzyLogic::Zadeh => ImplicationKind::KleeneDienes,
        }
    }

    /// Connective family that a plain `and` / `or` denotes under this logic
    pub fn connective(self) -> ConnectiveKind {
        match self {
            FuzzyLogic::Lukasiewicz => ConnectiveKind::Lukasiewicz,
            FuzzyLogic::Goedel | FuzzyLogic::Zadeh => ConnectiveKind::Goedel,
            FuzzyLogic::Classical => ConnectiveKind::Default,
        }
    }

    /// t-norm evaluated on numbers
    pub fn t_norm(self, a: f64, b: f64) -> f64 {
        match self {
            FuzzyLogic::Lukasiewicz => (a + b - 1.0).max(0.0),
            FuzzyLogic::Goedel | FuzzyLogic::Zadeh => a.min(b),
            FuzzyLogic::Classical => {
                if a >= 1.0 && b >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// t-conorm evaluated on numbers
    pub fn t_conorm(self, a: f64, b: f64) -> f64 {
        match self {
            FuzzyLogic::Lukasiewicz => (a + b).min(1.0),
            FuzzyLogic::Goedel | FuzzyLogic::Zadeh => a.max(b),
            FuzzyLogic::Classical => {
                if a > 0.0 || b > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for FuzzyLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FuzzyLogic::Classical => "classical",
            FuzzyLogic::Zadeh => "zadeh",
            FuzzyLogic::Lukasiewicz => "lukasiewicz",
            FuzzyLogic::Goedel => "goedel",
        };
        f.write_str(name)
    }
}

impl FromStr for FuzzyLogic {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classical" | "crisp" => Ok(FuzzyLogic::Classical),
            "zadeh" => Ok(FuzzyLogic::Zadeh),
            "lukasiewicz" | "l" => Ok(FuzzyLogic::Lukasiewicz),
            "goedel" | "godel" | "g" => Ok(FuzzyLogic::Goedel),
            other => Err(ModelError::UnknownLogic(other.to_string())),
        }
    }
}

/// Operator family attached to a conjunction or disjunction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectiveKind {
    /// Follows the knowledge base logic
    #[default]
    Default,
    Goedel,
    Lukasiewicz,
}

impl ConnectiveKind {
    /// Resolves `Default` against the active logic
    pub fn resolve(self, logic: FuzzyLogic) -> ConnectiveKind {
        match self {
            ConnectiveKind::Default => logic.connective(),
            other => other,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ConnectiveKind::Default => "",
            ConnectiveKind::Goedel => "g-",
            ConnectiveKind::Lukasiewicz => "l-",
        }
    }

    pub fn and_keyword(self) -> String {
        format!("{}and", self.prefix())
    }

    pub fn or_keyword(self) -> String {
        format!("{}or", self.prefix())
    }
}

/// Fuzzy implication function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImplicationKind {
    /// `min(1, 1 - a + b)`
    Lukasiewicz,
    /// `1` if `a <= b`, otherwise `b`
    Goedel,
    /// `max(1 - a, b)`
    KleeneDienes,
    /// `1` if `a <= b`, otherwise `0`
    Zadeh,
}

impl ImplicationKind {
    pub fn evaluate(self, a: f64, b: f64) -> f64 {
        match self {
            ImplicationKind::Lukasiewicz => (1.0 - a + b).min(1.0),
            ImplicationKind::Goedel => {
                if a <= b {
                    1.0
                } else {
                    b
                }
            }
            ImplicationKind::KleeneDienes => (1.0 - a).max(b),
            ImplicationKind::Zadeh => {
                if a <= b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Residuated implications coincide at degree 1, so such axioms are
    /// rewritten to Łukasiewicz. Kleene-Dienes is kept.
    pub fn normalize(self, degree: f64) -> ImplicationKind {
        if degree >= 1.0 && self != ImplicationKind::KleeneDienes {
            ImplicationKind::Lukasiewicz
        } else {
            self
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ImplicationKind::Lukasiewicz => "l-implies",
            ImplicationKind::Goedel => "g-implies",
            ImplicationKind::KleeneDienes => "kd-implies",
            ImplicationKind::Zadeh => "z-implies",
        }
    }

    /// Connective matching the implication, used when absorption rewrites
    /// `(A ⊓ C) ⊑ D` into `A ⊑ (¬C ⊔ D)`
    pub fn matching_connective(self) -> ConnectiveKind {
        match self {
            ImplicationKind::Lukasiewicz => ConnectiveKind::Lukasiewicz,
            ImplicationKind::Goedel | ImplicationKind::KleeneDienes | ImplicationKind::Zadeh => {
                ConnectiveKind::Goedel
            }
        }
    }
}
