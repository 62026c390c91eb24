//! # fuzzydl-model
//!
//! ファジィ記述論理のデータモデル
//!
//! ## 提供する型
//! - 概念 (`Concept`): ⊤/⊥, 原子概念, 否定, 論理積・論理和, 量化, 閾値, 集約演算子,
//!   修飾子, 具体概念, ファジィ数, データ型制約, 含意
//! - 真理度 (`Degree`): 数値または MILP 変数
//! - 公理: 原始概念定義, 概念同値, 一般概念包含
//! - ファジィ論理と演算子の種類

pub mod axiom;
pub mod concept;
pub mod datatype;
pub mod degree;
pub mod fuzzy;
pub mod logic;

pub use axiom::{ConceptEquivalence, GeneralConceptInclusion, PrimitiveConceptDefinition};
pub use concept::{Concept, ThresholdKind};
pub use datatype::{DatatypeRestriction, FeatureFunction, FeatureKind, RestrictionKind, RestrictionValue};
pub use degree::Degree;
pub use fuzzy::{ConcreteShape, FuzzyConcreteConcept, FuzzyQuantifier, Modifier, Segment, TriangularFuzzyNumber};
pub use logic::{ConnectiveKind, FuzzyLogic, ImplicationKind};

use thiserror::Error;

/// Errors raised while building model values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("{constructor}: {weights} weights for {concepts} concepts")]
    ArityMismatch {
        constructor: String,
        weights: usize,
        concepts: usize,
    },

    #[error("Invalid membership shape: {0}")]
    InvalidShape(String),

    #[error("Unknown fuzzy logic: {0}")]
    UnknownLogic(String),
}
