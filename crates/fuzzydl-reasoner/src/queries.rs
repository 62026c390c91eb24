//! 問い合わせ
//!
//! 各問い合わせは知識ベースを複製し、問い合わせ用のアサーションと
//! 変数 `q` を追加して展開し直し、`q` を最小化または最大化します。
//! 元の知識ベースは変更されません。

use fuzzydl_milp::{Expression, Objective, SimplexSolver, VariableKind};
use fuzzydl_model::{Concept, Degree, ImplicationKind};
use tracing::{debug, info};

use crate::individuals::{Assertion, IndividualId};
use crate::kb::KnowledgeBase;
use crate::{ReasonerError, Result};

const QUERY_INDIVIDUAL: &str = "*query*";

impl KnowledgeBase {
    fn solver(&self) -> SimplexSolver {
        SimplexSolver::with_config(self.config.solver.clone())
    }

    /// Whether the knowledge base has a model
    pub fn is_consistent(&mut self) -> Result<bool> {
        if let Some(consistent) = self.consistent {
            return Ok(consistent);
        }
        if self.inconsistency.is_some() {
            self.consistent = Some(false);
            return Ok(false);
        }
        match self.solve_abox() {
            Ok(()) => {}
            Err(ReasonerError::InconsistentOntology(_)) => {
                self.consistent = Some(false);
                return Ok(false);
            }
            Err(other) => return Err(other),
        }

        let solution = self.milp.optimize(&self.solver(), None)?;
        self.consistent = Some(solution.feasible);
        if !solution.feasible {
            self.inconsistency = Some("the constraint system has no solution".to_string());
        }
        info!(consistent = solution.feasible, "consistency checked");
        Ok(solution.feasible)
    }

    fn ensure_consistent(&mut self) -> Result<()> {
        if self.is_consistent()? {
            return Ok(());
        }
        let reason = self
            .inconsistency
            .clone()
            .unwrap_or_else(|| "knowledge base is inconsistent".to_string());
        Err(ReasonerError::InconsistentOntology(reason))
    }

    fn query_individual(&self, name: &str) -> Result<IndividualId> {
        self.store
            .find(name)
            .map(|id| self.store.resolve(id))
            .ok_or_else(|| ReasonerError::InvalidArgument(format!("unknown individual {name}")))
    }

    /// Expands the query copy and optimises the objective
    fn optimize_query(&mut self, objective: Objective) -> Result<f64> {
        self.solve_abox()?;
        let solution = self.milp.optimize(&self.solver(), Some(&objective))?;
        if !solution.feasible {
            return Err(ReasonerError::InconsistentOntology(
                "query constraints have no solution".to_string(),
            ));
        }
        debug!(objective = solution.objective, "query optimised");
        Ok(solution.objective.clamp(0.0, 1.0))
    }

    /// Copy of the knowledge base for a query, checked for consistency first
    fn query_copy(&mut self) -> Result<KnowledgeBase> {
        self.ensure_consistent()?;
        Ok(self.clone())
    }

    /// Infimum of the degree of `individual : concept` over all models
    pub fn min_instance_degree(&mut self, individual: &str, concept: &Concept) -> Result<f64> {
        let mut query = self.query_copy()?;
        let x = query.query_individual(individual)?;
        let q = query.milp.new_variable(VariableKind::SemiContinuous);
        // x : ¬C >= 1 - q
        query.assertions.push_back(Assertion::new(
            x,
            concept.complement(),
            Degree::Expression(Expression::constant(1.0) - q),
        ));
        let degree = query.optimize_query(Objective::Minimize(Expression::var(q)))?;
        info!(individual, %concept, degree, "minimal instance degree");
        Ok(degree)
    }

    /// Supremum of the degree of `individual : concept` over all models
    pub fn max_instance_degree(&mut self, individual: &str, concept: &Concept) -> Result<f64> {
        let mut query = self.query_copy()?;
        let x = query.query_individual(individual)?;
        let q = query.milp.new_variable(VariableKind::SemiContinuous);
        query
            .assertions
            .push_back(Assertion::new(x, concept.clone(), Degree::Variable(q)));
        let degree = query.optimize_query(Objective::Maximize(Expression::var(q)))?;
        info!(individual, %concept, degree, "maximal instance degree");
        Ok(degree)
    }

    /// `(min, max)` degree of `individual : concept`
    pub fn instance_degree_interval(&mut self, individual: &str, concept: &Concept) -> Result<(f64, f64)> {
        let min = self.min_instance_degree(individual, concept)?;
        let max = self.max_instance_degree(individual, concept)?;
        Ok((min, max))
    }

    /// Supremum of the degree of `(subject, object) : role`
    pub fn max_related_degree(&mut self, subject: &str, object: &str, role: &str) -> Result<f64> {
        let mut query = self.query_copy()?;
        let a = query.query_individual(subject)?;
        let b = query.query_individual(object)?;
        let r = query.add_relation_between(a, role, b, Degree::Numeric(0.0))?;
        query.optimize_query(Objective::Maximize(Expression::var(r)))
    }

    /// Supremum of the degree of `concept` on a fresh individual
    pub fn concept_satisfiability_degree(&mut self, concept: &Concept) -> Result<f64> {
        let mut query = self.query_copy()?;
        let (x, _) = query.store.add_named(QUERY_INDIVIDUAL);
        let q = query.milp.new_variable(VariableKind::SemiContinuous);
        query
            .assertions
            .push_back(Assertion::new(x, concept.clone(), Degree::Variable(q)));
        query.optimize_query(Objective::Maximize(Expression::var(q)))
    }

    /// Infimum of the degree of `subsumed → subsumer` on a fresh individual
    pub fn min_subsumption_degree(
        &mut self,
        subsumed: &Concept,
        subsumer: &Concept,
        implication: ImplicationKind,
    ) -> Result<f64> {
        let mut query = self.query_copy()?;
        let (x, _) = query.store.add_named(QUERY_INDIVIDUAL);
        let q = query.milp.new_variable(VariableKind::SemiContinuous);
        let implies = Concept::implies(implication, subsumed.clone(), subsumer.clone());
        query.assertions.push_back(Assertion::new(
            x,
            implies.complement(),
            Degree::Expression(Expression::constant(1.0) - q),
        ));
        let degree = query.optimize_query(Objective::Minimize(Expression::var(q)))?;
        info!(%subsumed, %subsumer, degree, "minimal subsumption degree");
        Ok(degree)
    }
}
