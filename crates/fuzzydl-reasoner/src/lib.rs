//! # fuzzydl-reasoner
//!
//! ファジィ記述論理の推論エンジン
//!
//! ## 機能
//! - TBox の吸収 (absorption) と遅延展開
//! - ロール階層の閉包 (包含度の最大値, 逆ロール, 推移性)
//! - テーブロー展開 (∃/∀ 規則, 関数的ロールのマージ, 7 種のブロッキング)
//! - 各ファジィ論理 (Łukasiewicz, Gödel, Zadeh, 古典) の MILP 符号化
//! - 具体ドメイン (文字列, 整数, 実数, 真偽値, ファジィ数)
//! - 問い合わせ: 無矛盾性, インスタンス度の下限・上限, 包含度, 充足度

pub mod absorption;
pub mod blocking;
pub mod config;
pub mod datatypes;
pub mod individuals;
pub mod kb;
pub mod queries;
pub mod roles;
pub mod semantics;
pub mod serializer;
pub mod tableau;

pub use absorption::{AbsorptionReport, DeclaredAxiom, RoleRestriction, TBox};
pub use config::{BlockingType, ReasonerConfig};
pub use individuals::{Assertion, BlockingStatus, Individual, IndividualId, IndividualKind, IndividualStore, Relation};
pub use kb::{KnowledgeBase, ReasoningStats};
pub use roles::{RoleHierarchy, RoleInfo};
pub use serializer::{knowledge_base_to_string, write_knowledge_base};

use fuzzydl_milp::MilpError;
use fuzzydl_model::ModelError;
use thiserror::Error;

/// Reasoner errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasonerError {
    #[error("Inconsistent ontology: {0}")]
    InconsistentOntology(String),

    #[error("Maximum number of individuals exceeded ({0})")]
    MaxIndividualsExceeded(usize),

    #[error("Definition error: {0}")]
    Definition(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("MILP error: {0}")]
    Milp(#[from] MilpError),
}

impl From<ModelError> for ReasonerError {
    fn from(err: ModelError) -> Self {
        ReasonerError::Definition(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReasonerError>;
