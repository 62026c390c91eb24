//! 区分線形な形状: 修飾子, ファジィ具体概念, 三角ファジィ数

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::{Concept, FuzzyConcreteConcept, Modifier, Segment, TriangularFuzzyNumber};

use super::order::pin_piecewise;
use crate::individuals::IndividualId;
use crate::kb::KnowledgeBase;
use crate::{ReasonerError, Result};

impl KnowledgeBase {
    /// `output = f(input)`, then `output >= v` or `output <= 1 - v`
    fn bound_shape(&mut self, input: Expression, domain: (f64, f64), segments: &[Segment], v: VarId, positive: bool) {
        let output = self.milp.new_variable(VariableKind::SemiContinuous);
        pin_piecewise(&mut self.milp, &input, domain, segments, &Expression::var(output));
        if positive {
            self.milp
                .add_constraint(Expression::var(output) - v, Inequality::GreaterEqual);
        } else {
            self.milp
                .add_constraint_with_bound(Expression::var(output) + v, Inequality::LessEqual, 1.0);
        }
    }

    pub(crate) fn compile_modified(
        &mut self,
        x: IndividualId,
        modifier: &Modifier,
        concept: &Concept,
        v: VarId,
        positive: bool,
    ) {
        // Hedges need not be monotone, so the degree of C is pinned from both sides
        let c = self.require(x, concept);
        self.require(x, &concept.complement());
        self.bound_shape(Expression::var(c), (0.0, 1.0), &modifier.segments(), v, positive);
    }

    /// Range of the value variable of a concrete individual
    fn concrete_value(&self, x: IndividualId, shape: &str) -> Result<(VarId, (f64, f64))> {
        let individual = self.store.get(x);
        let value = individual.value.ok_or_else(|| {
            ReasonerError::InvalidArgument(format!(
                "{shape} applied to {}, which is not a concrete individual",
                individual.name
            ))
        })?;
        let bounds = self.milp.variable_info(value)?.kind.bounds();
        Ok((value, bounds))
    }

    pub(crate) fn compile_fuzzy_concrete(
        &mut self,
        x: IndividualId,
        fuzzy: &FuzzyConcreteConcept,
        v: VarId,
        positive: bool,
    ) -> Result<()> {
        let (value, (lo, hi)) = self.concrete_value(x, &fuzzy.name)?;
        let domain = (lo.min(fuzzy.k1), hi.max(fuzzy.k2));
        self.bound_shape(Expression::var(value), domain, &fuzzy.segments(), v, positive);
        Ok(())
    }

    pub(crate) fn compile_fuzzy_number(
        &mut self,
        x: IndividualId,
        number: &TriangularFuzzyNumber,
        v: VarId,
        positive: bool,
    ) -> Result<()> {
        let (k1, k2) = self
            .fuzzy_number_range
            .ok_or_else(|| ReasonerError::Definition(format!("fuzzy number {number} used without a range")))?;
        let (value, (lo, hi)) = self.concrete_value(x, &number.to_string())?;
        let domain = (lo.min(k1), hi.max(k2));
        self.bound_shape(Expression::var(value), domain, &number.segments(k1, k2), v, positive);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::kb::KnowledgeBase;
    use crate::semantics::tests::max_degree;
    use crate::ReasonerError;
    use fuzzydl_model::{
        ConcreteShape, Concept, DatatypeRestriction, FuzzyConcreteConcept, FuzzyLogic, Modifier, RestrictionKind,
        RestrictionValue,
    };

    #[test]
    fn test_linear_modifier() {
        let very = Modifier::linear("very", 3.0).unwrap();
        let facts = vec![
            (Concept::atomic("A"), 0.75),
            (Concept::not(Concept::atomic("A")), 0.25),
        ];
        let degree = max_degree(
            FuzzyLogic::Lukasiewicz,
            &facts,
            Concept::modified(very.clone(), Concept::atomic("A")),
        );
        assert!((degree - very.apply(0.75)).abs() < 1e-6);
    }

    #[test]
    fn test_fuzzy_concrete_concept() {
        let young = FuzzyConcreteConcept::new("young", 0.0, 100.0, ConcreteShape::LeftShoulder { a: 20.0, b: 40.0 })
            .unwrap();
        let mut kb = KnowledgeBase::default();
        kb.define_real_concrete_feature("hasAge", 0.0, 100.0).unwrap();
        kb.define_fuzzy_concept(young.clone()).unwrap();
        let age = DatatypeRestriction::new(RestrictionKind::Exact, "hasAge", RestrictionValue::Number(30.0));
        kb.add_assertion("john", Concept::Datatype(age), 1.0).unwrap();
        let degree = kb
            .max_instance_degree("john", &Concept::exists("hasAge", Concept::Concrete(young)))
            .unwrap();
        assert!((degree - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_shape_on_abstract_individual() {
        let tall = FuzzyConcreteConcept::new("tall", 0.0, 250.0, ConcreteShape::RightShoulder { a: 170.0, b: 190.0 })
            .unwrap();
        let mut kb = KnowledgeBase::default();
        kb.add_assertion("a", Concept::Concrete(tall), 0.5).unwrap();
        assert!(matches!(kb.solve_abox(), Err(ReasonerError::InvalidArgument(_))));
    }
}
