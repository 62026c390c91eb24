//! 推論器の設定

use fuzzydl_milp::SolverConfig;
use fuzzydl_model::FuzzyLogic;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ReasonerError, Result};

/// Termination discipline of the tableau
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockingType {
    NoBlocking,
    /// Label of a node is a subset of an ancestor's label
    Subset,
    /// Label of a node equals an ancestor's label
    Set,
    /// Pairwise: node and parent match an ancestor and its parent
    Double,
    AnywhereSubset,
    AnywhereSet,
    AnywhereDouble,
}

impl BlockingType {
    /// Shallowest created individual that may be directly blocked
    pub fn min_depth(self) -> usize {
        match self {
            BlockingType::NoBlocking => usize::MAX,
            BlockingType::Subset | BlockingType::Set => 3,
            BlockingType::Double => 4,
            BlockingType::AnywhereSubset => 2,
            BlockingType::AnywhereSet | BlockingType::AnywhereDouble => 3,
        }
    }

    pub fn is_anywhere(self) -> bool {
        matches!(
            self,
            BlockingType::AnywhereSubset | BlockingType::AnywhereSet | BlockingType::AnywhereDouble
        )
    }

    pub fn is_pairwise(self) -> bool {
        matches!(self, BlockingType::Double | BlockingType::AnywhereDouble)
    }

    /// Subset strategies compare by inclusion, the others by equality
    pub fn is_subset(self) -> bool {
        matches!(self, BlockingType::Subset | BlockingType::AnywhereSubset)
    }

    /// Anywhere counterpart of an ancestor-based strategy
    pub fn anywhere(self) -> BlockingType {
        match self {
            BlockingType::Subset => BlockingType::AnywhereSubset,
            BlockingType::Set => BlockingType::AnywhereSet,
            BlockingType::Double => BlockingType::AnywhereDouble,
            other => other,
        }
    }
}

impl fmt::Display for BlockingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockingType::NoBlocking => "no-blocking",
            BlockingType::Subset => "subset",
            BlockingType::Set => "set",
            BlockingType::Double => "double",
            BlockingType::AnywhereSubset => "anywhere-subset",
            BlockingType::AnywhereSet => "anywhere-set",
            BlockingType::AnywhereDouble => "anywhere-double",
        };
        f.write_str(name)
    }
}

/// 推論設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// ファジィ論理の種類
    pub logic: FuzzyLogic,
    /// ブロッキング戦略 (None なら TBox の特徴から自動選択)
    pub blocking: Option<BlockingType>,
    /// 祖先だけでなくフォレスト全体からブロッカーを探す
    pub anywhere_blocking: bool,
    /// 生成される個体数の上限
    pub max_individuals: Option<usize>,
    /// 順序統計量の代数的再定式化を使う
    pub optimizations: bool,
    /// 厳密不等式 (<, >) のための間隔
    pub epsilon: f64,
    /// MILP ソルバーの設定
    pub solver: SolverConfig,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            logic: FuzzyLogic::Lukasiewicz,
            blocking: None,
            anywhere_blocking: true,
            max_individuals: Some(10_000),
            optimizations: true,
            epsilon: 1e-3,
            solver: SolverConfig::default(),
        }
    }
}

impl ReasonerConfig {
    pub fn with_logic(logic: FuzzyLogic) -> Self {
        Self {
            logic,
            ..Self::default()
        }
    }

    /// JSON から設定を読み込む (欠けているフィールドはデフォルト値)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReasonerConfig =
            serde_json::from_str(json).map_err(|e| ReasonerError::InvalidArgument(format!("configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.0 && self.epsilon < 0.5) {
            return Err(ReasonerError::InvalidArgument(format!(
                "epsilon must lie in (0, 0.5), got {}",
                self.epsilon
            )));
        }
        if self.max_individuals == Some(0) {
            return Err(ReasonerError::InvalidArgument(
                "max_individuals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_depths() {
        assert_eq!(BlockingType::Subset.min_depth(), 3);
        assert_eq!(BlockingType::Set.min_depth(), 3);
        assert_eq!(BlockingType::Double.min_depth(), 4);
        assert_eq!(BlockingType::AnywhereSubset.min_depth(), 2);
        assert_eq!(BlockingType::AnywhereSet.min_depth(), 3);
        assert_eq!(BlockingType::AnywhereDouble.min_depth(), 3);
    }

    #[test]
    fn test_json_overrides_defaults() {
        let config = ReasonerConfig::from_json_str(
            r#"{"logic": "Goedel", "blocking": "Double", "max_individuals": 50}"#,
        )
        .unwrap();
        assert_eq!(config.logic, FuzzyLogic::Goedel);
        assert_eq!(config.blocking, Some(BlockingType::Double));
        assert_eq!(config.max_individuals, Some(50));
        assert!(config.anywhere_blocking);
        assert_eq!(config.epsilon, 1e-3);
    }

    #[test]
    fn test_invalid_epsilon_rejected() {
        assert!(ReasonerConfig::from_json_str(r#"{"epsilon": 0.0}"#).is_err());
    }
}
