//! 全称制限の保存と関係への適用

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::{Concept, Degree, FuzzyLogic};
use tracing::trace;

use super::order::exact_min;
use crate::individuals::{Assertion, IndividualId, RestrictionFiller, UniversalRestriction};
use crate::kb::KnowledgeBase;
use crate::Result;

impl KnowledgeBase {
    /// Stores a restriction on `x` and applies it to the current objects of `role`
    pub(crate) fn add_restriction(
        &mut self,
        x: IndividualId,
        role: &str,
        filler: RestrictionFiller,
        v: VarId,
    ) -> Result<()> {
        let x = self.store.resolve(x);
        let restriction = UniversalRestriction {
            role: role.to_string(),
            filler,
            variable: v,
        };
        if self.store.get(x).restrictions.contains(&restriction) {
            return Ok(());
        }
        self.store.get_mut(x).restrictions.push(restriction.clone());

        for y in self.store.successors(x, role) {
            let Some(r) = self.store.relation(x, role, y).map(|rel| rel.variable) else {
                continue;
            };
            self.apply_restriction(x, y, r, &restriction)?;
        }
        Ok(())
    }

    /// Applies a stored restriction of `x` to the relation `(x, y)` with variable `r`
    pub(crate) fn apply_restriction(
        &mut self,
        x: IndividualId,
        y: IndividualId,
        r: VarId,
        restriction: &UniversalRestriction,
    ) -> Result<()> {
        let v = restriction.variable;
        match &restriction.filler {
            RestrictionFiller::NotIndividual(a) => {
                if self.store.resolve(*a) == y {
                    self.milp
                        .add_constraint_with_bound(Expression::var(r) + v, Inequality::LessEqual, 1.0);
                }
            }
            RestrictionFiller::Concept(filler) => {
                self.apply_universal(y, r, filler, Expression::var(v));

                // ∀T.C travels along transitive sub-roles, weakened by T ⊑ R
                for transitive in self.roles.transitive_subroles(&restriction.role) {
                    let Some(rel) = self.store.relation(x, &transitive, y).map(|rel| rel.variable) else {
                        continue;
                    };
                    let propagated = Concept::for_all(transitive.clone(), filler.clone());
                    let key = format!("{x}|{y}|{transitive}|{filler}|{v}");
                    if !self.propagation_memo.insert(key) {
                        continue;
                    }
                    let inclusion = self.roles.inclusion_degree(&transitive, &restriction.role);
                    trace!(from = %x, to = %y, role = %transitive, inclusion, "universal propagated");
                    let weakened = self.weaken_restriction(v, inclusion);
                    self.apply_universal(y, rel, &propagated, weakened);
                }
            }
        }
        Ok(())
    }

    /// Restriction degree `v ⊗ d` carried down a sub-role included at `d`
    fn weaken_restriction(&mut self, v: VarId, inclusion: f64) -> Expression {
        if inclusion >= 1.0 {
            return Expression::var(v);
        }
        match self.config.logic {
            FuzzyLogic::Lukasiewicz => Expression::var(v) + (inclusion - 1.0),
            _ => Expression::var(exact_min(
                &mut self.milp,
                &Expression::var(v),
                &Expression::constant(inclusion),
            )),
        }
    }

    /// `y : concept >= r ⇒ v` under the current logic
    fn apply_universal(&mut self, y: IndividualId, r: VarId, concept: &Concept, v: Expression) {
        let degree = match self.config.logic {
            FuzzyLogic::Lukasiewicz => Degree::Expression(Expression::var(r) + v - 1.0),
            FuzzyLogic::Goedel => Degree::Variable(exact_min(&mut self.milp, &Expression::var(r), &v)),
            FuzzyLogic::Zadeh | FuzzyLogic::Classical => {
                // b = 0: r <= 1 - v, b = 1: concept >= v
                let b = self.milp.new_variable(VariableKind::Binary);
                self.milp.add_constraint(
                    Expression::var(r) + v.clone() - b - 1.0,
                    Inequality::LessEqual,
                );
                Degree::Expression(v + b - 1.0)
            }
        };
        self.assertions
            .push_back(Assertion::new(y, concept.clone(), degree));
    }
}

#[cfg(test)]
mod tests {
    use crate::kb::KnowledgeBase;
    use fuzzydl_model::{Concept, FuzzyLogic};

    #[test]
    fn test_lukasiewicz_universal() {
        let mut kb = KnowledgeBase::default();
        kb.add_relation("x", "R", "y", 0.8).unwrap();
        kb.add_assertion("x", Concept::for_all("R", Concept::atomic("A")), 0.7)
            .unwrap();
        let degree = kb.min_instance_degree("y", &Concept::atomic("A")).unwrap();
        assert!((degree - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_universal_reaches_late_relation() {
        let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Zadeh);
        kb.add_assertion("x", Concept::for_all("R", Concept::atomic("A")), 0.6)
            .unwrap();
        kb.add_relation("x", "R", "y", 1.0).unwrap();
        let degree = kb.min_instance_degree("y", &Concept::atomic("A")).unwrap();
        assert!((degree - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_transitive_goedel_propagation() {
        let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Goedel);
        kb.role_is_transitive("R").unwrap();
        kb.add_relation("x", "R", "y", 1.0).unwrap();
        kb.add_relation("y", "R", "z", 1.0).unwrap();
        kb.add_assertion("x", Concept::for_all("R", Concept::atomic("B")), 1.0)
            .unwrap();
        let degree = kb.min_instance_degree("z", &Concept::atomic("B")).unwrap();
        assert!((degree - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_graded_transitive_subrole_weakens_propagation() {
        let mut kb = KnowledgeBase::default();
        kb.role_is_transitive("T").unwrap();
        kb.role_implies("T", "R", 0.5).unwrap();
        kb.add_relation("x", "T", "y", 1.0).unwrap();
        kb.add_relation("y", "T", "z", 1.0).unwrap();
        kb.add_assertion("x", Concept::for_all("R", Concept::atomic("C")), 1.0)
            .unwrap();
        let near = kb.min_instance_degree("y", &Concept::atomic("C")).unwrap();
        let far = kb.min_instance_degree("z", &Concept::atomic("C")).unwrap();
        assert!((near - 0.5).abs() < 1e-6, "got {near}");
        assert!((far - 0.5).abs() < 1e-6, "got {far}");
    }

    #[test]
    fn test_graded_transitive_subrole_under_goedel() {
        let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Goedel);
        kb.role_is_transitive("T").unwrap();
        kb.role_implies("T", "R", 0.6).unwrap();
        kb.add_relation("x", "T", "y", 1.0).unwrap();
        kb.add_relation("y", "T", "z", 1.0).unwrap();
        kb.add_assertion("x", Concept::for_all("R", Concept::atomic("C")), 0.9)
            .unwrap();
        let far = kb.min_instance_degree("z", &Concept::atomic("C")).unwrap();
        assert!((far - 0.6).abs() < 1e-6, "got {far}");
    }

    #[test]
    fn test_negated_has_value() {
        let mut kb = KnowledgeBase::default();
        kb.add_relation("x", "R", "a", 0.7).unwrap();
        kb.add_assertion("x", Concept::not(Concept::has_value("R", "a")), 0.5)
            .unwrap();
        assert!(!kb.is_consistent().unwrap());
    }
}
