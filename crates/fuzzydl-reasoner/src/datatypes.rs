//! 具体ドメイン
//!
//! 具体特徴の値は具体個体の MILP 変数として表されます。
//! 文字列リテラルは前処理で整数の順位に置き換えられます。
//! データ型制約は、抽象部分の展開が落ち着いた後の具体値パスで
//! まとめて符号化されます。

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::{
    Concept, DatatypeRestriction, Degree, FeatureFunction, FeatureKind, RestrictionKind, RestrictionValue, Segment,
    TriangularFuzzyNumber,
};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::individuals::{Assertion, IndividualId, IndividualKind};
use crate::kb::KnowledgeBase;
use crate::semantics::order::pin_piecewise;
use crate::{ReasonerError, Result};

/// Polyline through `points`, dropping vertical steps
fn polyline(points: &[(f64, f64)]) -> Vec<Segment> {
    points
        .windows(2)
        .filter(|w| w[1].0 > w[0].0)
        .map(|w| Segment::new(w[0].0, w[1].0, w[0].1, w[1].1))
        .collect()
}

/// Membership of "value compares to `number`" over `[lo, hi]`
fn comparison_shape(kind: RestrictionKind, number: &TriangularFuzzyNumber, lo: f64, hi: f64) -> Vec<Segment> {
    let lo = lo.min(number.a);
    let hi = hi.max(number.c);
    match kind {
        RestrictionKind::AtLeast => polyline(&[(lo, 0.0), (number.a, 0.0), (number.b, 1.0), (hi, 1.0)]),
        RestrictionKind::AtMost => polyline(&[(lo, 1.0), (number.b, 1.0), (number.c, 0.0), (hi, 0.0)]),
        RestrictionKind::Exact => polyline(&[
            (lo, 0.0),
            (number.a, 0.0),
            (number.b, 1.0),
            (number.c, 0.0),
            (hi, 0.0),
        ]),
    }
}

fn collect_literals<'a>(concept: &'a Concept, found: &mut Vec<(&'a str, &'a str)>) {
    if let Concept::Datatype(DatatypeRestriction {
        feature,
        value: RestrictionValue::Literal(literal),
        ..
    }) = concept
    {
        found.push((feature.as_str(), literal.as_str()));
    }
    for child in concept.children() {
        collect_literals(child, found);
    }
}

impl KnowledgeBase {
    /// Replaces string features by integer ranks of their literals.
    ///
    /// Ranks follow the sorted literals until a constraint uses them. After
    /// that, literals seen for the first time are appended after the highest
    /// rank and existing value variables are widened to the new range.
    pub(crate) fn rank_string_literals(&mut self) -> Result<()> {
        let literals: HashMap<String, Vec<String>> = {
            let mut found = Vec::new();
            for concept in self.all_concepts() {
                collect_literals(concept, &mut found);
            }
            if let Some((feature, literal)) = found.iter().find(|(f, _)| !self.string_ranks.contains_key(*f)) {
                return Err(ReasonerError::InvalidArgument(format!(
                    "literal \"{literal}\" compared with {feature}, which is not a string feature"
                )));
            }
            found
                .into_iter()
                .map(|(f, l)| (f.to_string(), l.to_string()))
                .into_group_map()
        };

        let mut widened = Vec::new();
        for (feature, ranks) in self.string_ranks.iter_mut() {
            let seen = literals.get(feature).into_iter().flatten().sorted().dedup();
            if self.frozen_ranks.contains(feature) {
                let before = ranks.len();
                for literal in seen {
                    if !ranks.contains_key(literal) {
                        let rank = ranks.len();
                        ranks.insert(literal.clone(), rank);
                    }
                }
                if ranks.len() == before {
                    continue;
                }
                widened.push(feature.clone());
            } else {
                *ranks = seen
                    .enumerate()
                    .map(|(rank, literal)| (literal.clone(), rank))
                    .collect();
            }
            let upper = ranks.len().saturating_sub(1) as f64;
            self.features
                .insert(feature.clone(), FeatureKind::Integer { lower: 0.0, upper });
            debug!(%feature, literals = ranks.len(), "string feature ranked");
        }

        for feature in widened {
            let Some(kind) = self.features.get(&feature).copied() else {
                continue;
            };
            let (lower, upper) = kind.bounds();
            for x in self.store.live_ids() {
                let Some(y) = self.store.get(x).features.get(&feature).copied() else {
                    continue;
                };
                if let Some(value) = self.store.get(self.store.resolve(y)).value {
                    self.milp.set_kind(value, VariableKind::Integer { lower, upper })?;
                }
            }
        }
        Ok(())
    }

    /// Concrete individual holding the value of `feature` for `x`, created on
    /// first use. `None` at the individual limit.
    pub(crate) fn feature_filler(&mut self, x: IndividualId, feature: &str) -> Result<Option<IndividualId>> {
        let x = self.store.resolve(x);
        if let Some(y) = self.store.get(x).features.get(feature) {
            return Ok(Some(self.store.resolve(*y)));
        }
        let kind = *self
            .features
            .get(feature)
            .ok_or_else(|| ReasonerError::Definition(format!("{feature} is not a concrete feature")))?;
        let Some(y) = self.new_successor(x, feature, IndividualKind::Concrete) else {
            return Ok(None);
        };

        let (lower, upper) = kind.bounds();
        let var_kind = match kind {
            FeatureKind::String | FeatureKind::Integer { .. } => VariableKind::Integer { lower, upper },
            FeatureKind::Real { .. } => VariableKind::Continuous { lower, upper },
            FeatureKind::Boolean => VariableKind::Binary,
        };
        let name = format!("{}#value", self.store.get(y).name);
        let value = self.milp.variable(&name, var_kind);
        self.store.get_mut(y).value = Some(value);
        self.store.get_mut(x).features.insert(feature.to_string(), y);
        self.add_relation_between(x, feature, y, Degree::ONE)?;
        trace!(individual = %x, feature, filler = %y, "feature filler created");
        Ok(Some(y))
    }

    /// `x : ∃F.C >= v` for a concrete feature `F`
    pub(crate) fn expand_feature_existential(
        &mut self,
        x: IndividualId,
        feature: &str,
        filler: &Concept,
        v: VarId,
    ) -> Result<()> {
        let Some(y) = self.feature_filler(x, feature)? else {
            return Ok(());
        };
        self.stats.existentials_expanded += 1;
        if !filler.is_top() {
            self.assertions
                .push_back(Assertion::new(y, filler.clone(), Degree::Variable(v)));
        }
        Ok(())
    }

    fn feature_value(&mut self, x: IndividualId, feature: &str) -> Result<Option<Expression>> {
        let Some(y) = self.feature_filler(x, feature)? else {
            return Ok(None);
        };
        Ok(self.store.get(y).value.map(Expression::var))
    }

    /// Linear expression of a feature function evaluated at `x`
    pub(crate) fn feature_function_expression(
        &mut self,
        x: IndividualId,
        function: &FeatureFunction,
    ) -> Result<Option<Expression>> {
        let expression = match function {
            FeatureFunction::Feature(feature) => return self.feature_value(x, feature),
            FeatureFunction::Number(n) => Expression::constant(*n),
            FeatureFunction::Sum(terms) => {
                let mut sum = Expression::new();
                for term in terms {
                    let Some(e) = self.feature_function_expression(x, term)? else {
                        return Ok(None);
                    };
                    sum += &e;
                }
                sum
            }
            FeatureFunction::Difference(a, b) => {
                let (Some(a), Some(b)) = (
                    self.feature_function_expression(x, a)?,
                    self.feature_function_expression(x, b)?,
                ) else {
                    return Ok(None);
                };
                a - b
            }
            FeatureFunction::Product(k, inner) => match self.feature_function_expression(x, inner)? {
                Some(e) => e.scaled(*k),
                None => return Ok(None),
            },
        };
        Ok(Some(expression))
    }

    /// Interval an expression may take given the domains of its variables
    pub(crate) fn expression_bounds(&self, expression: &Expression) -> (f64, f64) {
        let constant = expression.constant_term();
        let (mut lo, mut hi) = (constant, constant);
        for (var, coefficient) in expression.terms() {
            let (vlo, vhi) = self
                .milp
                .variable_info(var)
                .map(|info| info.kind.bounds())
                .unwrap_or((0.0, 1.0));
            if coefficient >= 0.0 {
                lo += coefficient * vlo;
                hi += coefficient * vhi;
            } else {
                lo += coefficient * vhi;
                hi += coefficient * vlo;
            }
        }
        (lo, hi)
    }

    fn big_m(&self, value: &Expression, rhs: &Expression) -> f64 {
        let (vlo, vhi) = self.expression_bounds(value);
        let (rlo, rhi) = self.expression_bounds(rhs);
        (vhi - rlo).max(rhi - vlo).max(0.0) + 1.0
    }

    /// Right-hand side of a crisp value restriction
    fn restriction_rhs(&mut self, x: IndividualId, restriction: &DatatypeRestriction) -> Result<Option<Expression>> {
        let rhs = match &restriction.value {
            RestrictionValue::Number(n) => Expression::constant(*n),
            RestrictionValue::Boolean(b) => Expression::constant(if *b { 1.0 } else { 0.0 }),
            RestrictionValue::Literal(literal) => {
                self.frozen_ranks.insert(restriction.feature.clone());
                let rank = self
                    .string_ranks
                    .get(&restriction.feature)
                    .and_then(|ranks| ranks.get(literal))
                    .ok_or_else(|| {
                        ReasonerError::InvalidArgument(format!(
                            "literal \"{literal}\" of {} was not ranked",
                            restriction.feature
                        ))
                    })?;
                Expression::constant(*rank as f64)
            }
            RestrictionValue::Function(function) => return self.feature_function_expression(x, function),
            RestrictionValue::FuzzyNumber(number) => Expression::constant(number.b),
        };
        Ok(Some(rhs))
    }

    /// `value kind rhs` whenever `s = 1`
    fn add_comparison(&mut self, kind: RestrictionKind, value: &Expression, rhs: &Expression, s: VarId, gap: f64) {
        let m = self.big_m(value, rhs);
        let difference = value.clone() - rhs.clone();
        // M·(1 - s)
        let relax = Expression::constant(m) - Expression::term(m, s);
        match kind {
            RestrictionKind::AtLeast => {
                self.milp.add_constraint(
                    difference + relax - gap,
                    Inequality::GreaterEqual,
                );
            }
            RestrictionKind::AtMost => {
                self.milp
                    .add_constraint(difference - relax + gap, Inequality::LessEqual);
            }
            RestrictionKind::Exact => {
                self.milp
                    .add_constraint(difference.clone() + relax.clone(), Inequality::GreaterEqual);
                self.milp
                    .add_constraint(difference - relax, Inequality::LessEqual);
            }
        }
    }

    fn compile_positive_datatype(&mut self, x: IndividualId, restriction: &DatatypeRestriction, v: VarId) -> Result<()> {
        let x = self.store.resolve(x);
        let Some(value) = self.feature_value(x, &restriction.feature)? else {
            return Ok(());
        };
        let s = self.milp.new_variable(VariableKind::Binary);
        self.milp
            .add_constraint(Expression::var(s) - v, Inequality::GreaterEqual);

        if let RestrictionValue::FuzzyNumber(number) = &restriction.value {
            let representative = self.fuzzy_representative(x, restriction, number)?;
            let Some(rhs) = self.store.get(representative).value.map(Expression::var) else {
                return Ok(());
            };
            self.add_comparison(restriction.kind, &value, &rhs, s, 0.0);
            return Ok(());
        }

        let Some(rhs) = self.restriction_rhs(x, restriction)? else {
            return Ok(());
        };
        self.add_comparison(restriction.kind, &value, &rhs, s, 0.0);
        Ok(())
    }

    /// Concrete individual standing for a value of `number`, one per
    /// individual and restriction
    fn fuzzy_representative(
        &mut self,
        x: IndividualId,
        restriction: &DatatypeRestriction,
        number: &TriangularFuzzyNumber,
    ) -> Result<IndividualId> {
        let key = format!("{x}|{}|{}|{number}", restriction.kind.symbol(), restriction.feature);
        if let Some(r) = self.representatives.get(&key) {
            return Ok(*r);
        }
        let (k1, k2) = self
            .fuzzy_number_range
            .ok_or_else(|| ReasonerError::Definition(format!("fuzzy number {number} used without a range")))?;
        let r = self.store.create_detached(IndividualKind::Concrete);
        let name = format!("{}#value", self.store.get(r).name);
        let value = self
            .milp
            .variable(&name, VariableKind::Continuous { lower: k1, upper: k2 });
        self.store.get_mut(r).value = Some(value);
        self.representatives.insert(key, r);
        Ok(r)
    }

    fn compile_negative_datatype(&mut self, x: IndividualId, restriction: &DatatypeRestriction, v: VarId) -> Result<()> {
        let Some(&filler) = self.store.get(x).features.get(&restriction.feature) else {
            return Ok(());
        };
        let filler = self.store.resolve(filler);
        let Some(value) = self.store.get(filler).value.map(Expression::var) else {
            return Ok(());
        };

        if let RestrictionValue::FuzzyNumber(number) = &restriction.value {
            let (lo, hi) = self.expression_bounds(&value);
            let segments = comparison_shape(restriction.kind, number, lo, hi);
            let output = self.milp.new_variable(VariableKind::SemiContinuous);
            let domain = (lo.min(number.a), hi.max(number.c));
            pin_piecewise(&mut self.milp, &value, domain, &segments, &Expression::var(output));
            self.milp
                .add_constraint_with_bound(Expression::var(output) + v, Inequality::LessEqual, 1.0);
            return Ok(());
        }

        let Some(rhs) = self.restriction_rhs(x, restriction)? else {
            return Ok(());
        };
        let gap = self
            .features
            .get(&restriction.feature)
            .map(|kind| kind.strictness_gap(self.config.epsilon))
            .unwrap_or(self.config.epsilon);
        let s = self.milp.new_variable(VariableKind::Binary);
        self.milp
            .add_constraint(Expression::var(s) - v, Inequality::GreaterEqual);

        match restriction.kind {
            // value < rhs
            RestrictionKind::AtLeast => self.add_comparison(RestrictionKind::AtMost, &value, &rhs, s, gap),
            // value > rhs
            RestrictionKind::AtMost => self.add_comparison(RestrictionKind::AtLeast, &value, &rhs, s, gap),
            RestrictionKind::Exact => {
                // Below or above, picked by c
                let c = self.milp.new_variable(VariableKind::Binary);
                let m = self.big_m(&value, &rhs);
                let difference = value - rhs;
                let relax = Expression::constant(m) - Expression::term(m, s);
                self.milp.add_constraint(
                    difference.clone() + gap - relax.clone() - Expression::term(m, c),
                    Inequality::LessEqual,
                );
                self.milp.add_constraint(
                    difference - gap + relax + Expression::constant(m) - Expression::term(m, c),
                    Inequality::GreaterEqual,
                );
            }
        }
        Ok(())
    }

    /// Encodes the value restrictions collected so far. Returns true when
    /// anything new was produced.
    pub(crate) fn concrete_pass(&mut self) -> Result<bool> {
        let pending = std::mem::take(&mut self.pending_datatypes);
        let mut progress = !pending.is_empty();
        for (x, restriction, v) in pending {
            if let RestrictionValue::FuzzyNumber(number) = &restriction.value {
                let x = self.store.resolve(x);
                let representative = self.fuzzy_representative(x, &restriction, number)?;
                self.assertions.push_back(Assertion::new(
                    representative,
                    Concept::FuzzyNumber(*number),
                    Degree::Variable(v),
                ));
            }
            self.compile_positive_datatype(x, &restriction, v)?;
        }

        for x in self.store.live_ids() {
            let negatives = self.store.get(x).negative_datatypes.clone();
            for (restriction, v) in negatives {
                if !self.store.get(x).features.contains_key(&restriction.feature) {
                    continue;
                }
                let key = format!("{x}|{restriction}|{v}");
                if !self.compiled_negatives.insert(key) {
                    continue;
                }
                self.compile_negative_datatype(x, &restriction, v)?;
                progress = true;
            }
        }

        if progress {
            debug!(queued = self.assertions.len(), "concrete pass produced new constraints");
        }
        Ok(progress || !self.assertions.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::kb::KnowledgeBase;
    use crate::ReasonerError;
    use fuzzydl_model::{
        Concept, DatatypeRestriction, FeatureFunction, FeatureKind, RestrictionKind, RestrictionValue,
        TriangularFuzzyNumber,
    };

    fn restriction(kind: RestrictionKind, feature: &str, value: RestrictionValue) -> Concept {
        Concept::Datatype(DatatypeRestriction::new(kind, feature, value))
    }

    #[test]
    fn test_string_literals_are_ranked() {
        let mut kb = KnowledgeBase::default();
        kb.define_string_concrete_feature("colour").unwrap();
        for literal in ["red", "blue", "green"] {
            kb.add_assertion(
                "a",
                restriction(RestrictionKind::Exact, "colour", RestrictionValue::Literal(literal.into())),
                0.0,
            )
            .unwrap();
        }
        kb.preprocess().unwrap();
        assert_eq!(kb.string_ranks["colour"]["blue"], 0);
        assert_eq!(kb.string_ranks["colour"]["red"], 2);
        assert_eq!(kb.feature("colour"), Some(&FeatureKind::Integer { lower: 0.0, upper: 2.0 }));
    }

    #[test]
    fn test_literal_first_seen_after_solving() {
        let mut kb = KnowledgeBase::default();
        kb.define_string_concrete_feature("name").unwrap();
        let named = |literal: &str| restriction(RestrictionKind::Exact, "name", RestrictionValue::Literal(literal.into()));
        kb.add_assertion("a", named("bob"), 1.0).unwrap();
        assert!(kb.is_consistent().unwrap());

        kb.add_assertion("b", named("alice"), 1.0).unwrap();
        assert!(kb.is_consistent().unwrap());
        // Ranks already in constraints keep their value
        assert_eq!(kb.string_ranks["name"]["bob"], 0);
        assert_eq!(kb.string_ranks["name"]["alice"], 1);
        assert_eq!(kb.feature("name"), Some(&FeatureKind::Integer { lower: 0.0, upper: 1.0 }));

        let a = kb.store().find("a").unwrap();
        let filler = kb.store().get(a).features["name"];
        let value = kb.store().get(filler).value.unwrap();
        assert_eq!(kb.milp().variable_info(value).unwrap().kind.bounds(), (0.0, 1.0));

        kb.add_assertion("a", named("alice"), 1.0).unwrap();
        assert!(!kb.is_consistent().unwrap());
    }

    #[test]
    fn test_literal_on_numeric_feature_rejected() {
        let mut kb = KnowledgeBase::default();
        kb.define_integer_concrete_feature("age", 0, 120).unwrap();
        kb.add_assertion(
            "a",
            restriction(RestrictionKind::Exact, "age", RestrictionValue::Literal("old".into())),
            1.0,
        )
        .unwrap();
        assert!(matches!(kb.preprocess(), Err(ReasonerError::InvalidArgument(_))));
    }

    #[test]
    fn test_conflicting_bounds_are_inconsistent() {
        let mut kb = KnowledgeBase::default();
        kb.define_integer_concrete_feature("age", 0, 120).unwrap();
        kb.add_assertion("a", restriction(RestrictionKind::AtLeast, "age", RestrictionValue::Number(30.0)), 1.0)
            .unwrap();
        kb.add_assertion("a", restriction(RestrictionKind::AtMost, "age", RestrictionValue::Number(20.0)), 1.0)
            .unwrap();
        assert!(!kb.is_consistent().unwrap());
    }

    #[test]
    fn test_negated_restriction_is_strict() {
        let mut kb = KnowledgeBase::default();
        kb.define_integer_concrete_feature("age", 0, 120).unwrap();
        kb.add_assertion("a", restriction(RestrictionKind::Exact, "age", RestrictionValue::Number(30.0)), 1.0)
            .unwrap();
        let at_least = restriction(RestrictionKind::AtLeast, "age", RestrictionValue::Number(30.0));
        kb.add_assertion("a", Concept::not(at_least), 1.0).unwrap();
        assert!(!kb.is_consistent().unwrap());
    }

    #[test]
    fn test_feature_function() {
        let mut kb = KnowledgeBase::default();
        kb.define_real_concrete_feature("price", 0.0, 1000.0).unwrap();
        kb.define_real_concrete_feature("tax", 0.0, 1000.0).unwrap();
        kb.add_assertion("a", restriction(RestrictionKind::Exact, "price", RestrictionValue::Number(100.0)), 1.0)
            .unwrap();
        let total = FeatureFunction::Sum(vec![
            FeatureFunction::Feature("price".into()),
            FeatureFunction::Product(0.2, Box::new(FeatureFunction::Feature("price".into()))),
        ]);
        kb.add_assertion("a", restriction(RestrictionKind::Exact, "tax", RestrictionValue::Function(total)), 1.0)
            .unwrap();
        let cheap = restriction(RestrictionKind::AtMost, "tax", RestrictionValue::Number(100.0));
        let degree = kb.max_instance_degree("a", &cheap).unwrap();
        assert!(degree.abs() < 1e-6);
    }

    #[test]
    fn test_fuzzy_number_restriction() {
        let mut kb = KnowledgeBase::default();
        kb.define_real_concrete_feature("speed", 0.0, 200.0).unwrap();
        kb.define_fuzzy_number_range(0.0, 200.0).unwrap();
        let about_ninety = TriangularFuzzyNumber::new(80.0, 90.0, 100.0).unwrap();
        kb.add_assertion("car", restriction(RestrictionKind::Exact, "speed", RestrictionValue::Number(85.0)), 1.0)
            .unwrap();
        let query = restriction(RestrictionKind::Exact, "speed", RestrictionValue::FuzzyNumber(about_ninety));
        let degree = kb.max_instance_degree("car", &query).unwrap();
        assert!((degree - 0.5).abs() < 1e-4);
    }
}
