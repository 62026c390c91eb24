//! 集約演算子 (重み付き和, 重み付き最小・最大, OWA, Choquet, Sugeno)
//!
//! 正の制約 `agg >= v` ではオペランドの下限変数を、否定
//! `agg <= 1 - v` では上限式 `1 - v(x:¬C)` を使います。集約は各
//! オペランドについて単調なので、どちらも健全な緩和になります。

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::Concept;

use super::order::{bottom_k_lower, select_one, sorted_descending, top_k_upper, SortedOperands};
use crate::individuals::IndividualId;
use crate::kb::KnowledgeBase;

fn weighted(weights: &[f64], operands: &[Expression]) -> Expression {
    let mut sum = Expression::new();
    for (w, operand) in weights.iter().zip(operands) {
        sum += &operand.scaled(*w);
    }
    sum
}

fn non_increasing(weights: &[f64]) -> bool {
    weights.windows(2).all(|w| w[0] >= w[1])
}

fn non_decreasing(weights: &[f64]) -> bool {
    weights.windows(2).all(|w| w[0] <= w[1])
}

/// Weight of the coalition of the top-j operands, `Σᵢ pᵢⱼ·wᵢ`
fn position_weight(sorted: &SortedOperands, weights: &[f64], j: usize) -> Expression {
    Expression::sum(weights.iter().enumerate().map(|(i, w)| (*w, sorted.permutation[i][j])))
}

impl KnowledgeBase {
    pub(crate) fn compile_aggregation(&mut self, x: IndividualId, concept: &Concept, v: VarId, positive: bool) {
        let (weights, concepts) = match concept {
            Concept::WeightedSum { weights, concepts }
            | Concept::WeightedSumZero { weights, concepts }
            | Concept::WeightedMin { weights, concepts }
            | Concept::WeightedMax { weights, concepts }
            | Concept::Owa { weights, concepts }
            | Concept::Choquet { weights, concepts }
            | Concept::Sugeno { weights, concepts }
            | Concept::QuasiSugeno { weights, concepts } => (weights.clone(), concepts),
            Concept::QuantifiedOwa { quantifier, concepts } => (quantifier.owa_weights(concepts.len()), concepts),
            _ => return,
        };
        let operands: Vec<Expression> = concepts
            .iter()
            .map(|c| {
                if positive {
                    Expression::var(self.require(x, c))
                } else {
                    self.upper_bound(x, c)
                }
            })
            .collect();

        match concept {
            Concept::WeightedSum { .. } => {
                let sum = weighted(&weights, &operands);
                self.bound_aggregate(sum, v, positive);
            }
            Concept::WeightedSumZero { .. } => self.weighted_sum_zero(&weights, &operands, v, positive),
            Concept::WeightedMin { .. } => self.weighted_min(&weights, &operands, v, positive),
            Concept::WeightedMax { .. } => self.weighted_max(&weights, &operands, v, positive),
            Concept::Owa { .. } | Concept::QuantifiedOwa { .. } => self.owa(&weights, &operands, v, positive),
            Concept::Choquet { .. } => self.choquet(&weights, &operands, v, positive),
            Concept::Sugeno { .. } => self.sugeno(&weights, &operands, v, positive),
            Concept::QuasiSugeno { .. } => self.quasi_sugeno(&weights, &operands, v, positive),
            _ => {}
        }
    }

    /// `aggregate >= v`, or `aggregate <= 1 - v` for the negation
    fn bound_aggregate(&mut self, aggregate: Expression, v: VarId, positive: bool) {
        if positive {
            self.milp
                .add_constraint(aggregate - v, Inequality::GreaterEqual);
        } else {
            self.milp
                .add_constraint(aggregate + v - 1.0, Inequality::LessEqual);
        }
    }

    /// Weighted sum that collapses to 0 as soon as one operand is 0
    fn weighted_sum_zero(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        let epsilon = self.config.epsilon;
        let sum = weighted(weights, operands);
        if positive {
            let s = self.milp.new_variable(VariableKind::Binary);
            self.milp
                .add_constraint(Expression::var(s) - v, Inequality::GreaterEqual);
            for operand in operands {
                self.milp.add_constraint(
                    operand.clone() - Expression::term(epsilon, s),
                    Inequality::GreaterEqual,
                );
            }
            self.bound_aggregate(sum, v, true);
        } else {
            // z = 0: the sum is small enough, z = 1: some operand is 0
            let z = self.milp.new_variable(VariableKind::Binary);
            self.milp
                .add_constraint(sum + v - z - 1.0, Inequality::LessEqual);
            let mismatches = select_one(&mut self.milp, operands.len());
            for (operand, mismatch) in operands.iter().zip(mismatches) {
                self.milp.add_constraint(
                    operand.clone() - mismatch + z - 1.0,
                    Inequality::LessEqual,
                );
            }
        }
    }

    /// `minᵢ max(1 − wᵢ, cᵢ)`
    fn weighted_min(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        if positive {
            for (w, operand) in weights.iter().zip(operands) {
                if *w <= 0.0 {
                    continue;
                }
                if *w >= 1.0 {
                    self.milp
                        .add_constraint(operand.clone() - v, Inequality::GreaterEqual);
                    continue;
                }
                let b = self.milp.new_variable(VariableKind::Binary);
                self.milp
                    .add_constraint(operand.clone() - v + b, Inequality::GreaterEqual);
                self.milp.add_constraint_with_bound(
                    Expression::var(v) + b,
                    Inequality::LessEqual,
                    2.0 - w,
                );
            }
        } else {
            let mismatches = select_one(&mut self.milp, operands.len());
            for ((w, operand), mismatch) in weights.iter().zip(operands).zip(mismatches) {
                self.milp.add_constraint(
                    Expression::var(v) - *w - mismatch.clone(),
                    Inequality::LessEqual,
                );
                self.milp.add_constraint(
                    operand.clone() + v - 1.0 - mismatch,
                    Inequality::LessEqual,
                );
            }
        }
    }

    /// `maxᵢ min(wᵢ, cᵢ)`
    fn weighted_max(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        if positive {
            let mismatches = select_one(&mut self.milp, operands.len());
            for ((w, operand), mismatch) in weights.iter().zip(operands).zip(mismatches) {
                self.milp.add_constraint(
                    Expression::constant(*w) - v + mismatch.clone(),
                    Inequality::GreaterEqual,
                );
                self.milp
                    .add_constraint(operand.clone() - v + mismatch, Inequality::GreaterEqual);
            }
        } else {
            for (w, operand) in weights.iter().zip(operands) {
                let b = self.milp.new_variable(VariableKind::Binary);
                // b = 0: wᵢ <= 1 - v, b = 1: cᵢ <= 1 - v
                self.milp.add_constraint(
                    Expression::constant(*w) + v - b - 1.0,
                    Inequality::LessEqual,
                );
                self.milp
                    .add_constraint(operand.clone() + v + b - 2.0, Inequality::LessEqual);
            }
        }
    }

    fn owa(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        let n = operands.len();
        if self.config.optimizations && !positive && non_increasing(weights) {
            // Σₖ (wₖ − wₖ₊₁)·(sum of the k largest)
            let mut bound = Expression::new();
            for k in 1..=n {
                let next = weights.get(k).copied().unwrap_or(0.0);
                let step = weights[k - 1] - next;
                if step > 0.0 {
                    bound += &top_k_upper(&mut self.milp, operands, k).scaled(step);
                }
            }
            self.bound_aggregate(bound, v, false);
            return;
        }
        if self.config.optimizations && positive && non_decreasing(weights) {
            // Weights of the ascending order are non-increasing
            let ascending: Vec<f64> = weights.iter().rev().copied().collect();
            let mut bound = Expression::new();
            for k in 1..=n {
                let next = ascending.get(k).copied().unwrap_or(0.0);
                let step = ascending[k - 1] - next;
                if step > 0.0 {
                    bound += &bottom_k_lower(&mut self.milp, operands, k).scaled(step);
                }
            }
            self.bound_aggregate(bound, v, true);
            return;
        }

        let sorted = sorted_descending(&mut self.milp, operands);
        let sum = Expression::sum(weights.iter().zip(&sorted.values).map(|(w, z)| (*w, *z)));
        self.bound_aggregate(sum, v, positive);
    }

    /// `Σⱼ (z₍ⱼ₎ − z₍ⱼ₊₁₎)·w_σ(j)`
    fn choquet(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        let n = operands.len();
        let sorted = sorted_descending(&mut self.milp, operands);
        let mut sum = Expression::new();
        for j in 0..n {
            let mut difference = Expression::var(sorted.values[j]);
            if let Some(next) = sorted.values.get(j + 1) {
                difference.add_term(-1.0, *next);
            }
            for (i, w) in weights.iter().enumerate() {
                // q = p·d
                let p = sorted.permutation[i][j];
                let q = self.milp.new_variable(VariableKind::SemiContinuous);
                self.milp
                    .add_constraint(Expression::var(q) - p, Inequality::LessEqual);
                self.milp
                    .add_constraint(Expression::var(q) - difference.clone(), Inequality::LessEqual);
                self.milp.add_constraint(
                    Expression::var(q) - difference.clone() - p + 1.0,
                    Inequality::GreaterEqual,
                );
                sum.add_term(*w, q);
            }
        }
        self.bound_aggregate(sum, v, positive);
    }

    /// `maxⱼ min(z₍ⱼ₎, w_σ(j))`
    fn sugeno(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        let n = operands.len();
        let sorted = sorted_descending(&mut self.milp, operands);
        if positive {
            let mismatches = select_one(&mut self.milp, n);
            for (j, mismatch) in mismatches.into_iter().enumerate() {
                let measure = position_weight(&sorted, weights, j);
                self.milp.add_constraint(
                    Expression::var(sorted.values[j]) - v + mismatch.clone(),
                    Inequality::GreaterEqual,
                );
                self.milp
                    .add_constraint(measure - v + mismatch, Inequality::GreaterEqual);
            }
        } else {
            for j in 0..n {
                let measure = position_weight(&sorted, weights, j);
                let b = self.milp.new_variable(VariableKind::Binary);
                self.milp.add_constraint(
                    Expression::var(sorted.values[j]) + v - b - 1.0,
                    Inequality::LessEqual,
                );
                self.milp
                    .add_constraint(measure + v + b - 2.0, Inequality::LessEqual);
            }
        }
    }

    /// `maxⱼ (z₍ⱼ₎ ⊗ w_σ(j))` with the Łukasiewicz t-norm
    fn quasi_sugeno(&mut self, weights: &[f64], operands: &[Expression], v: VarId, positive: bool) {
        let n = operands.len();
        let sorted = sorted_descending(&mut self.milp, operands);
        if positive {
            let mismatches = select_one(&mut self.milp, n);
            for (j, mismatch) in mismatches.into_iter().enumerate() {
                let measure = position_weight(&sorted, weights, j);
                self.milp.add_constraint(
                    Expression::var(sorted.values[j]) + measure - 1.0 - v + mismatch.scaled(2.0),
                    Inequality::GreaterEqual,
                );
            }
        } else {
            for j in 0..n {
                let measure = position_weight(&sorted, weights, j);
                self.milp.add_constraint(
                    Expression::var(sorted.values[j]) + measure + v - 2.0,
                    Inequality::LessEqual,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::kb::KnowledgeBase;
    use crate::semantics::tests::max_degree;
    use fuzzydl_model::{Concept, FuzzyLogic, FuzzyQuantifier};

    fn facts(values: &[(&str, f64)]) -> Vec<(Concept, f64)> {
        values
            .iter()
            .flat_map(|(name, d)| {
                [
                    (Concept::atomic(*name), *d),
                    (Concept::not(Concept::atomic(*name)), 1.0 - d),
                ]
            })
            .collect()
    }

    fn operands() -> Vec<Concept> {
        vec![Concept::atomic("A"), Concept::atomic("B"), Concept::atomic("C")]
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-4, "{actual} != {expected}");
    }

    #[test]
    fn test_weighted_sum() {
        let facts = facts(&[("A", 0.6), ("B", 0.2), ("C", 1.0)]);
        let concept = Concept::weighted_sum(vec![0.5, 0.3, 0.2], operands()).unwrap();
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, concept), 0.56);
    }

    #[test]
    fn test_weighted_sum_zero() {
        let zero = facts(&[("A", 0.6), ("B", 0.0), ("C", 1.0)]);
        let concept = Concept::weighted_sum_zero(vec![0.5, 0.3, 0.2], operands()).unwrap();
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &zero, concept), 0.0);
    }

    #[test]
    fn test_weighted_min_and_max() {
        let facts = facts(&[("A", 0.6), ("B", 0.2), ("C", 1.0)]);
        let min = Concept::weighted_min(vec![1.0, 0.5, 1.0], operands()).unwrap();
        assert_close(max_degree(FuzzyLogic::Zadeh, &facts, min), 0.5);
        let max = Concept::weighted_max(vec![0.4, 1.0, 0.3], operands()).unwrap();
        assert_close(max_degree(FuzzyLogic::Zadeh, &facts, max), 0.4);
    }

    #[test]
    fn test_owa_sorts_operands() {
        let facts = facts(&[("A", 0.2), ("B", 0.8), ("C", 0.5)]);
        let concept = Concept::owa(vec![0.5, 0.3, 0.2], operands()).unwrap();
        // 0.5·0.8 + 0.3·0.5 + 0.2·0.2
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, concept), 0.59);
    }

    #[test]
    fn test_owa_bottom_k_reformulation() {
        let facts = facts(&[("A", 0.2), ("B", 0.8), ("C", 0.5)]);
        let concept = Concept::owa(vec![0.2, 0.3, 0.5], operands()).unwrap();
        // 0.2·0.8 + 0.3·0.5 + 0.5·0.2
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, concept), 0.41);
    }

    #[test]
    fn test_quantified_owa() {
        let facts = facts(&[("A", 1.0), ("B", 0.0), ("C", 1.0)]);
        // Q(x) = x gives the arithmetic mean
        let quantifier = FuzzyQuantifier::RightShoulder { a: 0.0, b: 1.0 };
        let concept = Concept::quantified_owa(quantifier, operands()).unwrap();
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, concept), 2.0 / 3.0);
    }

    #[test]
    fn test_choquet_and_sugeno() {
        let facts = facts(&[("A", 0.9), ("B", 0.4), ("C", 0.1)]);
        let choquet = Concept::choquet(vec![0.5, 0.8, 1.0], operands()).unwrap();
        // 0.5·0.5 + 0.3·0.8 + 0.1·1.0
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, choquet), 0.59);
        let sugeno = Concept::sugeno(vec![0.5, 0.8, 1.0], operands()).unwrap();
        // max(min(0.9, 0.5), min(0.4, 0.8), min(0.1, 1))
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, sugeno), 0.5);
        let quasi = Concept::quasi_sugeno(vec![0.5, 0.8, 1.0], operands()).unwrap();
        // max(0.4, 0.2, 0.1)
        assert_close(max_degree(FuzzyLogic::Lukasiewicz, &facts, quasi), 0.4);
    }

    #[test]
    fn test_negated_owa_choquet_and_sugeno() {
        let facts = facts(&[("A", 0.9), ("B", 0.4), ("C", 0.1)]);
        let negated = |concept: Concept| max_degree(FuzzyLogic::Lukasiewicz, &facts, Concept::not(concept));

        // owa = 0.5·0.9 + 0.3·0.4 + 0.2·0.1
        let owa = Concept::owa(vec![0.5, 0.3, 0.2], operands()).unwrap();
        assert_close(negated(owa), 1.0 - 0.59);
        let choquet = Concept::choquet(vec![0.5, 0.8, 1.0], operands()).unwrap();
        assert_close(negated(choquet), 1.0 - 0.59);
        let sugeno = Concept::sugeno(vec![0.5, 0.8, 1.0], operands()).unwrap();
        assert_close(negated(sugeno), 0.5);
        let quasi = Concept::quasi_sugeno(vec![0.5, 0.8, 1.0], operands()).unwrap();
        assert_close(negated(quasi), 0.6);
    }

    #[test]
    fn test_negated_sugeno_assertion_conflicts_with_facts() {
        let sugeno = Concept::sugeno(vec![0.5, 0.8, 1.0], operands()).unwrap();
        let mut kb = KnowledgeBase::default();
        for (fact, degree) in facts(&[("A", 0.9), ("B", 0.4), ("C", 0.1)]) {
            kb.add_assertion("a", fact, degree).unwrap();
        }
        // sugeno ≤ 0.4 while its value is 0.5
        kb.add_assertion("a", Concept::not(sugeno), 0.6).unwrap();
        assert!(!kb.is_consistent().unwrap());
    }
}
