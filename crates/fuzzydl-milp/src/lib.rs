//! # fuzzydl-milp
//!
//! ファジィ記述論理推論のための混合整数線形計画 (MILP) サービス
//!
//! 推論器が生成する線形制約を保持し、差し替え可能なソルバーで最適化します。
//!
//! ## 機能
//! - 名前付き変数 (バイナリ / [0,1] 連続 / 有界連続 / 整数)
//! - 線形式と制約の構築
//! - 実行可能性判定と目的関数の最小化・最大化
//! - 参照実装: 二段階単体法 + 分枝限定法

pub mod expression;
pub mod model;
pub mod simplex;

pub use expression::{Expression, VarId};
pub use model::{
    Constraint, Inequality, MilpModel, MilpSolver, Objective, Solution, SolverConfig, Variable,
    VariableKind,
};
pub use simplex::SimplexSolver;

/// MILP layer errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MilpError {
    #[error("Unknown MILP variable: {0}")]
    UnknownVariable(String),

    #[error("Invalid variable bounds: {0}")]
    InvalidBounds(String),

    #[error("Branch-and-bound node limit exceeded ({0} nodes)")]
    NodeLimitExceeded(usize),

    #[error("Simplex pivot limit exceeded ({0} pivots)")]
    IterationLimit(usize),

    #[error("Objective is unbounded")]
    Unbounded,
}

pub type Result<T> = std::result::Result<T, MilpError>;
