//! 概念ごとの MILP 制約生成
//!
//! `x : C >= v` の変数 `v` を受け取り、構成子とファジィ論理に応じた
//! 制約と新しいアサーションを生成します。否定形 `x : ¬C >= v` は
//! `deg(C) <= 1 - v` として扱います。

pub mod aggregation;
pub mod connectives;
pub mod order;
pub mod quantifiers;
pub mod shapes;

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::{Concept, Degree};

use crate::individuals::{Assertion, IndividualId, RestrictionFiller};
use crate::kb::KnowledgeBase;
use crate::Result;

impl KnowledgeBase {
    /// Compiles `x : concept >= v`
    pub(crate) fn compile(&mut self, x: IndividualId, concept: &Concept, v: VarId) -> Result<()> {
        let logic = self.config.logic;
        match concept {
            Concept::Top => {}
            Concept::Bottom => {
                self.milp
                    .add_constraint_with_bound(Expression::var(v), Inequality::LessEqual, 0.0);
            }
            Concept::Atomic(name) => self.unfold_atomic(x, name, v, true),
            Concept::Not(inner) => self.compile_negated(x, inner, v)?,
            Concept::And { kind, operands } => self.compile_and(x, kind.resolve(logic), operands, v),
            Concept::Or { kind, operands } => self.compile_or(x, kind.resolve(logic), operands, v),
            Concept::Exists { .. } => {
                self.existentials
                    .push_back(Assertion::new(x, concept.clone(), Degree::Variable(v)));
            }
            Concept::ForAll { role, filler } => {
                self.add_restriction(x, role, RestrictionFiller::Concept((**filler).clone()), v)?;
            }
            Concept::HasValue { role, individual } => {
                let (object, _) = self.store.add_named(individual);
                self.add_relation_between(x, role, object, Degree::Variable(v))?;
            }
            Concept::SelfRestriction(role) => {
                self.add_relation_between(x, role, x, Degree::Variable(v))?;
            }
            Concept::Threshold {
                kind,
                weight,
                concept: inner,
            } => self.compile_threshold(x, *kind, Expression::constant(*weight), inner, v, true),
            Concept::ExtThreshold {
                kind,
                variable,
                concept: inner,
            } => {
                let weight = self.milp.variable(variable, VariableKind::SemiContinuous);
                self.compile_threshold(x, *kind, Expression::var(weight), inner, v, true)
            }
            Concept::WeightedSum { .. }
            | Concept::WeightedSumZero { .. }
            | Concept::WeightedMin { .. }
            | Concept::WeightedMax { .. }
            | Concept::Owa { .. }
            | Concept::QuantifiedOwa { .. }
            | Concept::Choquet { .. }
            | Concept::Sugeno { .. }
            | Concept::QuasiSugeno { .. } => self.compile_aggregation(x, concept, v, true),
            Concept::Modified { modifier, concept: inner } => self.compile_modified(x, modifier, inner, v, true),
            Concept::Concrete(fuzzy) => self.compile_fuzzy_concrete(x, fuzzy, v, true)?,
            Concept::FuzzyNumber(number) => self.compile_fuzzy_number(x, number, v, true)?,
            Concept::Datatype(restriction) => {
                self.pending_datatypes.push((x, restriction.clone(), v));
            }
            Concept::Implies {
                kind,
                antecedent,
                consequent,
            } => self.compile_implies(x, *kind, antecedent, consequent, v),
        }
        Ok(())
    }

    /// Compiles `x : ¬inner >= v`
    fn compile_negated(&mut self, x: IndividualId, inner: &Concept, v: VarId) -> Result<()> {
        match inner {
            Concept::Top => {
                self.milp
                    .add_constraint_with_bound(Expression::var(v), Inequality::LessEqual, 0.0);
            }
            Concept::Bottom => {}
            Concept::Atomic(name) => self.unfold_atomic(x, name, v, false),
            Concept::HasValue { role, individual } => {
                let (object, _) = self.store.add_named(individual);
                self.add_restriction(x, role, RestrictionFiller::NotIndividual(object), v)?;
            }
            Concept::SelfRestriction(role) => {
                self.add_restriction(x, role, RestrictionFiller::NotIndividual(x), v)?;
            }
            Concept::Threshold { kind, weight, concept } => {
                self.compile_threshold(x, *kind, Expression::constant(*weight), concept, v, false)
            }
            Concept::ExtThreshold { kind, variable, concept } => {
                let weight = self.milp.variable(variable, VariableKind::SemiContinuous);
                self.compile_threshold(x, *kind, Expression::var(weight), concept, v, false)
            }
            Concept::WeightedSum { .. }
            | Concept::WeightedSumZero { .. }
            | Concept::WeightedMin { .. }
            | Concept::WeightedMax { .. }
            | Concept::Owa { .. }
            | Concept::QuantifiedOwa { .. }
            | Concept::Choquet { .. }
            | Concept::Sugeno { .. }
            | Concept::QuasiSugeno { .. } => self.compile_aggregation(x, inner, v, false),
            Concept::Modified { modifier, concept } => self.compile_modified(x, modifier, concept, v, false),
            Concept::Concrete(fuzzy) => self.compile_fuzzy_concrete(x, fuzzy, v, false)?,
            Concept::FuzzyNumber(number) => self.compile_fuzzy_number(x, number, v, false)?,
            Concept::Datatype(restriction) => {
                self.store
                    .get_mut(x)
                    .negative_datatypes
                    .push((restriction.clone(), v));
            }
            Concept::Implies {
                kind,
                antecedent,
                consequent,
            } => self.compile_negated_implies(x, *kind, antecedent, consequent, v),
            // Constructors with a De Morgan dual
            Concept::Not(_)
            | Concept::And { .. }
            | Concept::Or { .. }
            | Concept::Exists { .. }
            | Concept::ForAll { .. } => {
                self.assertions
                    .push_back(Assertion::new(x, inner.complement(), Degree::Variable(v)));
            }
        }
        Ok(())
    }

    /// Degree upper bound `1 - v(x:¬C)` of `x : C`
    pub(crate) fn upper_bound(&mut self, x: IndividualId, concept: &Concept) -> Expression {
        let negated = self.require(x, &concept.complement());
        Expression::constant(1.0) - negated
    }
}

#[cfg(test)]
mod tests {
    use crate::kb::KnowledgeBase;
    use fuzzydl_milp::SimplexSolver;
    use fuzzydl_model::{Concept, ConnectiveKind, FuzzyLogic};

    /// Maximum degree of `a : concept` after asserting `facts`
    pub(crate) fn max_degree(logic: FuzzyLogic, facts: &[(Concept, f64)], concept: Concept) -> f64 {
        let mut kb = KnowledgeBase::with_logic(logic);
        for (fact, degree) in facts {
            kb.add_assertion("a", fact.clone(), *degree).unwrap();
        }
        kb.max_instance_degree("a", &concept).unwrap()
    }

    #[test]
    fn test_negated_conjunction_uses_dual() {
        let and = Concept::and(
            ConnectiveKind::Goedel,
            vec![Concept::atomic("A"), Concept::atomic("B")],
        );
        let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Goedel);
        kb.add_assertion("a", Concept::Not(Box::new(and)), 1.0).unwrap();
        kb.solve_abox().unwrap();
        let a = kb.store().find("a").unwrap();
        assert!(kb.store().has_label(a, "(g-or (not A) (not B))"));
        let solution = kb
            .milp()
            .optimize(&SimplexSolver::new(), None)
            .unwrap();
        assert!(solution.feasible);
    }

    #[test]
    fn test_bottom_is_unsatisfiable() {
        let mut kb = KnowledgeBase::default();
        kb.add_assertion("a", Concept::Bottom, 0.3).unwrap();
        assert!(!kb.is_consistent().unwrap());
    }

    #[test]
    fn test_max_degree_helper() {
        let degree = max_degree(
            FuzzyLogic::Lukasiewicz,
            &[(Concept::atomic("A"), 0.4)],
            Concept::atomic("A"),
        );
        assert!((degree - 1.0).abs() < 1e-6);
    }
}
