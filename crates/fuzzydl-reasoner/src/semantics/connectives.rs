//! 原子概念の遅延展開, 論理積・論理和, 含意, 閾値

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::{Concept, ConnectiveKind, Degree, FuzzyLogic, ImplicationKind, ThresholdKind};

use super::order::{exact_min, select_one};
use crate::individuals::{Assertion, IndividualId};
use crate::kb::KnowledgeBase;

impl KnowledgeBase {
    /// Lazy unfolding of `x : A >= v` (or `x : ¬A >= v`)
    pub(crate) fn unfold_atomic(&mut self, x: IndividualId, name: &str, v: VarId, positive: bool) {
        let polarity = |c: Concept| if positive { c } else { c.complement() };

        let synonyms: Vec<String> = self
            .tbox
            .synonyms(name)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        for synonym in synonyms {
            self.assertions
                .push_back(Assertion::new(x, polarity(Concept::atomic(synonym)), Degree::Variable(v)));
        }

        for definition in self.tbox.definitions(name).to_vec() {
            self.assertions
                .push_back(Assertion::new(x, polarity(definition), Degree::Variable(v)));
        }

        if !positive {
            return;
        }

        for inclusion in self.tbox.inclusions(name).to_vec() {
            let degree = self.implication_consequent(v, inclusion.degree, inclusion.implication);
            self.assertions
                .push_back(Assertion::new(x, inclusion.definition, degree));
        }

        let disjoint: Vec<String> = self
            .tbox
            .disjoint_with(name)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        let individual = self.store.get(x).name.clone();
        for other in disjoint {
            let Some(w) = self.milp.find_variable(&format!("{individual}:{other}")) else {
                continue;
            };
            match self.config.logic {
                FuzzyLogic::Lukasiewicz => {
                    self.milp
                        .add_constraint_with_bound(Expression::var(v) + w, Inequality::LessEqual, 1.0);
                }
                _ => {
                    let yv = self.disjoint_indicator(v);
                    let yw = self.disjoint_indicator(w);
                    self.milp
                        .add_constraint_with_bound(Expression::var(yv) + yw, Inequality::LessEqual, 1.0);
                }
            }
        }
    }

    /// Binary `y` with `v <= 0.5 + 0.5·y`
    fn disjoint_indicator(&mut self, v: VarId) -> VarId {
        let name = match self.milp.variable_info(v) {
            Ok(info) => format!("{}#disjoint", info.name),
            Err(_) => format!("{v}#disjoint"),
        };
        if let Some(y) = self.milp.find_variable(&name) {
            return y;
        }
        let y = self.milp.variable(&name, VariableKind::Binary);
        self.milp.add_constraint(
            Expression::var(v) - Expression::term(0.5, y) - 0.5,
            Inequality::LessEqual,
        );
        y
    }

    /// Lower bound on the consequent of `a → C >= degree`, where `a` is the
    /// degree variable of the antecedent
    pub(crate) fn implication_consequent(&mut self, a: VarId, degree: f64, implication: ImplicationKind) -> Degree {
        match implication {
            ImplicationKind::Lukasiewicz if degree >= 1.0 => Degree::Variable(a),
            ImplicationKind::Lukasiewicz => Degree::Expression(Expression::var(a) + (degree - 1.0)),
            ImplicationKind::Goedel if degree >= 1.0 => Degree::Variable(a),
            ImplicationKind::Goedel => {
                let m = exact_min(&mut self.milp, &Expression::var(a), &Expression::constant(degree));
                Degree::Variable(m)
            }
            ImplicationKind::KleeneDienes => {
                // Either a <= 1 - n or the consequent reaches n
                let s = self.milp.new_variable(VariableKind::Binary);
                self.milp.add_constraint_with_bound(
                    Expression::var(a) + Expression::term(degree, s),
                    Inequality::LessEqual,
                    1.0,
                );
                Degree::Expression(Expression::constant(degree) - Expression::term(degree, s))
            }
            ImplicationKind::Zadeh => Degree::Variable(a),
        }
    }

    pub(crate) fn compile_and(&mut self, x: IndividualId, kind: ConnectiveKind, operands: &[Concept], v: VarId) {
        match kind {
            ConnectiveKind::Lukasiewicz => {
                let n = operands.len() as f64;
                let vars: Vec<VarId> = operands.iter().map(|c| self.require(x, c)).collect();
                let s = self.milp.new_variable(VariableKind::Binary);
                // Σ vᵢ − (n−1) ≥ v − (n−1)·s
                let mut sum = Expression::sum(vars.iter().map(|vi| (1.0, *vi)));
                sum.add_term(-1.0, v);
                sum.add_term(n - 1.0, s);
                self.milp
                    .add_constraint_with_bound(sum, Inequality::GreaterEqual, n - 1.0);
                self.milp
                    .add_constraint_with_bound(Expression::var(v) + s, Inequality::LessEqual, 1.0);
            }
            // Gödel, Zadeh and classical conjunctions are minima
            ConnectiveKind::Goedel | ConnectiveKind::Default => {
                for operand in operands {
                    self.assertions
                        .push_back(Assertion::new(x, operand.clone(), Degree::Variable(v)));
                }
            }
        }
    }

    pub(crate) fn compile_or(&mut self, x: IndividualId, kind: ConnectiveKind, operands: &[Concept], v: VarId) {
        let vars: Vec<VarId> = operands.iter().map(|c| self.require(x, c)).collect();
        match kind {
            // Classical disjunction shares the Łukasiewicz encoding
            ConnectiveKind::Lukasiewicz | ConnectiveKind::Default => {
                let mut sum = Expression::sum(vars.iter().map(|vi| (1.0, *vi)));
                sum.add_term(-1.0, v);
                self.milp.add_constraint(sum, Inequality::GreaterEqual);
            }
            ConnectiveKind::Goedel => {
                let mismatches = select_one(&mut self.milp, vars.len());
                for (vi, mismatch) in vars.iter().zip(mismatches) {
                    self.milp.add_constraint(
                        Expression::var(*vi) - v + mismatch,
                        Inequality::GreaterEqual,
                    );
                }
            }
        }
    }

    pub(crate) fn compile_implies(
        &mut self,
        x: IndividualId,
        kind: ImplicationKind,
        antecedent: &Concept,
        consequent: &Concept,
        v: VarId,
    ) {
        let b = self.require(x, consequent);
        match kind {
            ImplicationKind::Lukasiewicz => {
                let na = self.require(x, &antecedent.complement());
                self.milp
                    .add_constraint(Expression::var(na) + b - v, Inequality::GreaterEqual);
            }
            ImplicationKind::Goedel => {
                let a = self.require(x, antecedent);
                let s = self.milp.new_variable(VariableKind::Binary);
                // s = 0: a <= b
                self.milp
                    .add_constraint(Expression::var(a) - b - s, Inequality::LessEqual);
                // s = 1: b >= v
                self.milp.add_constraint(
                    Expression::var(b) - v - s + 1.0,
                    Inequality::GreaterEqual,
                );
            }
            ImplicationKind::KleeneDienes => {
                let na = self.require(x, &antecedent.complement());
                let s = self.milp.new_variable(VariableKind::Binary);
                self.milp
                    .add_constraint(Expression::var(na) - v + s, Inequality::GreaterEqual);
                self.milp.add_constraint(
                    Expression::var(b) - v - s + 1.0,
                    Inequality::GreaterEqual,
                );
            }
            ImplicationKind::Zadeh => {
                let a = self.require(x, antecedent);
                let s = self.milp.new_variable(VariableKind::Binary);
                self.milp
                    .add_constraint(Expression::var(a) - b - s, Inequality::LessEqual);
                self.milp
                    .add_constraint_with_bound(Expression::var(v) + s, Inequality::LessEqual, 1.0);
            }
        }
    }

    /// `x : ¬(A → B) >= v`, that is `(A → B) <= 1 - v`
    pub(crate) fn compile_negated_implies(
        &mut self,
        x: IndividualId,
        kind: ImplicationKind,
        antecedent: &Concept,
        consequent: &Concept,
        v: VarId,
    ) {
        let epsilon = self.config.epsilon;
        match kind {
            ImplicationKind::Lukasiewicz => {
                // A ⊗ ¬B >= v
                let a = self.require(x, antecedent);
                let nb = self.require(x, &consequent.complement());
                self.milp
                    .add_constraint(Expression::var(a) + nb - 1.0 - v, Inequality::GreaterEqual);
            }
            ImplicationKind::KleeneDienes => {
                self.assertions
                    .push_back(Assertion::new(x, antecedent.clone(), Degree::Variable(v)));
                self.assertions
                    .push_back(Assertion::new(x, consequent.complement(), Degree::Variable(v)));
            }
            ImplicationKind::Goedel | ImplicationKind::Zadeh => {
                let a = self.require(x, antecedent);
                let nb = self.require(x, &consequent.complement());
                if kind == ImplicationKind::Goedel {
                    self.milp
                        .add_constraint(Expression::var(nb) - v, Inequality::GreaterEqual);
                }
                // s >= v forces a - b >= ε
                let s = self.milp.new_variable(VariableKind::Binary);
                self.milp
                    .add_constraint(Expression::var(s) - v, Inequality::GreaterEqual);
                self.milp.add_constraint(
                    Expression::var(a) + nb - Expression::term(1.0 + epsilon, s),
                    Inequality::GreaterEqual,
                );
            }
        }
    }

    /// Crisp thresholds `[>= w]C` and `[<= w]C`, or their negations
    pub(crate) fn compile_threshold(
        &mut self,
        x: IndividualId,
        kind: ThresholdKind,
        weight: Expression,
        concept: &Concept,
        v: VarId,
        positive: bool,
    ) {
        let epsilon = self.config.epsilon;
        let s = self.milp.new_variable(VariableKind::Binary);
        self.milp
            .add_constraint(Expression::var(s) - v, Inequality::GreaterEqual);
        let big_m = 1.0 + epsilon;
        // Active when s = 1
        let relax = Expression::constant(big_m) - Expression::term(big_m, s);

        match (kind, positive) {
            // C >= w
            (ThresholdKind::AtLeast, true) => {
                let c = self.require(x, concept);
                self.milp
                    .add_constraint(Expression::var(c) - weight + relax, Inequality::GreaterEqual);
            }
            // C <= w
            (ThresholdKind::AtMost, true) => {
                let upper = self.upper_bound(x, concept);
                self.milp
                    .add_constraint(upper - weight - relax, Inequality::LessEqual);
            }
            // C < w
            (ThresholdKind::AtLeast, false) => {
                let upper = self.upper_bound(x, concept);
                self.milp
                    .add_constraint(upper - weight + epsilon - relax, Inequality::LessEqual);
            }
            // C > w
            (ThresholdKind::AtMost, false) => {
                let c = self.require(x, concept);
                self.milp.add_constraint(
                    Expression::var(c) - weight - epsilon + relax,
                    Inequality::GreaterEqual,
                );
            }
        }
    }
}
