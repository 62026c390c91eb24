//! テーブロー展開
//!
//! アサーションキューを FIFO で処理し、空になったら存在量化を
//! 1 つだけ展開します。両方のキューが空になると具体値パスを実行し、
//! 進展がなくなるまで繰り返します。

use fuzzydl_milp::{Expression, Inequality, VarId, VariableKind};
use fuzzydl_model::{Concept, Degree, FuzzyLogic};
use tracing::{debug, error, info, trace};

use crate::individuals::{Assertion, BlockingStatus, IndividualId, IndividualKind, Relation};
use crate::kb::KnowledgeBase;
use crate::semantics::order::exact_min;
use crate::{ReasonerError, Result};

impl KnowledgeBase {
    /// Expands the ABox until no rule applies
    pub fn solve_abox(&mut self) -> Result<()> {
        if let Some(reason) = &self.inconsistency {
            return Err(ReasonerError::InconsistentOntology(reason.clone()));
        }
        if !self.preprocessed || self.tbox.has_pending() {
            self.preprocess()?;
        } else {
            self.rank_string_literals()?;
        }
        self.seed_abox()?;

        loop {
            let mut progress = self.initialise_individuals()?;

            // Assertions first, in FIFO order
            while let Some(assertion) = self.assertions.pop_front() {
                self.process_assertion(assertion)?;
                progress = true;
            }

            // Then exactly one existential
            if let Some(existential) = self.existentials.pop_front() {
                self.expand_existential(existential)?;
                continue;
            }
            if progress {
                continue;
            }
            if !self.concrete_pass()? {
                break;
            }
        }

        let stats = self.stats();
        info!(
            individuals = self.store.len(),
            variables = stats.variables,
            constraints = stats.constraints,
            merges = stats.merges,
            "ABox expanded"
        );
        if self.exhausted {
            let limit = self.config.max_individuals.unwrap_or_default();
            return Err(ReasonerError::MaxIndividualsExceeded(limit));
        }
        Ok(())
    }

    /// Moves ABox declarations not seen yet into the forest and the queue
    fn seed_abox(&mut self) -> Result<()> {
        let individuals = self.declared_individuals[self.seeded_individuals..].to_vec();
        for name in individuals {
            self.store.add_named(&name);
        }
        self.seeded_individuals = self.declared_individuals.len();

        let relations = self.declared_relations[self.seeded_relations..].to_vec();
        for relation in relations {
            let (subject, _) = self.store.add_named(&relation.subject);
            let (object, _) = self.store.add_named(&relation.object);
            self.add_relation_between(subject, &relation.role, object, relation.degree)?;
        }
        self.seeded_relations = self.declared_relations.len();

        let assertions = self.declared_assertions[self.seeded_assertions..].to_vec();
        for assertion in assertions {
            let (id, _) = self.store.add_named(&assertion.individual);
            self.assertions
                .push_back(Assertion::new(id, assertion.concept, assertion.degree));
        }
        self.seeded_assertions = self.declared_assertions.len();
        Ok(())
    }

    /// Applies terminology goals and reflexive roles to individuals that
    /// have not received them yet
    fn initialise_individuals(&mut self) -> Result<bool> {
        let goals = self.tbox.goals().to_vec();
        let reflexive: Vec<String> = self
            .roles
            .roles()
            .filter(|(_, info)| info.reflexive)
            .map(|(name, _)| name.clone())
            .collect();

        let mut progress = false;
        for id in self.store.live_ids() {
            if self.store.get(id).is_concrete() {
                continue;
            }
            let applied = self.store.get(id).goals_applied;
            for goal in goals.iter().skip(applied) {
                self.assertions
                    .push_back(Assertion::new(id, goal.as_goal(), Degree::Numeric(goal.degree)));
                progress = true;
            }
            self.store.get_mut(id).goals_applied = goals.len();

            if !self.store.get(id).initialised {
                self.store.get_mut(id).initialised = true;
                for role in &reflexive {
                    self.add_relation_between(id, role, id, Degree::ONE)?;
                    progress = true;
                }
            }
        }
        Ok(progress)
    }

    pub(crate) fn process_assertion(&mut self, assertion: Assertion) -> Result<()> {
        if assertion.degree.is_zero() {
            return Ok(());
        }
        let x = self.store.resolve(assertion.individual);
        if self.is_indirectly_blocked(x) {
            trace!(individual = %x, concept = %assertion.concept, "assertion deferred");
            self.stats.blocked_deferrals += 1;
            self.store
                .get_mut(x)
                .blocked_assertions
                .push(Assertion::new(x, assertion.concept, assertion.degree));
            return Ok(());
        }
        if assertion.concept.is_top() {
            return Ok(());
        }

        let v = self.concept_variable(x, &assertion.concept);
        self.add_lower_bound(v, &assertion.degree);
        self.stats.assertions_processed += 1;
        if self.store.add_label(x, &assertion.concept) {
            self.on_label_added(x);
            self.compile(x, &assertion.concept, v)?;
        }
        Ok(())
    }

    fn degree_kind(&self) -> VariableKind {
        if self.config.logic == FuzzyLogic::Classical {
            VariableKind::Binary
        } else {
            VariableKind::SemiContinuous
        }
    }

    /// Degree variable of `x : concept`, linked to the variable of the
    /// complement when both exist
    pub(crate) fn concept_variable(&mut self, x: IndividualId, concept: &Concept) -> VarId {
        let individual = self.store.get(x).name.clone();
        let name = format!("{individual}:{concept}");
        if let Some(v) = self.milp.find_variable(&name) {
            return v;
        }
        let kind = self.degree_kind();
        let v = self.milp.variable(&name, kind);
        match concept {
            Concept::Top => self.milp.add_constraint_with_bound(Expression::var(v), Inequality::Equal, 1.0),
            Concept::Bottom => self.milp.add_constraint_with_bound(Expression::var(v), Inequality::Equal, 0.0),
            _ => {
                let complement = format!("{individual}:{}", concept.complement());
                if let Some(w) = self.milp.find_variable(&complement) {
                    self.milp
                        .add_constraint_with_bound(Expression::var(v) + w, Inequality::Equal, 1.0);
                }
            }
        }
        v
    }

    pub(crate) fn relation_variable(&mut self, subject: IndividualId, role: &str, object: IndividualId) -> VarId {
        let name = format!(
            "({},{}):{role}",
            self.store.get(subject).name,
            self.store.get(object).name
        );
        let kind = self.degree_kind();
        self.milp.variable(&name, kind)
    }

    /// `v >= degree`
    pub(crate) fn add_lower_bound(&mut self, v: VarId, degree: &Degree) {
        if matches!(degree, Degree::Variable(d) if *d == v) || degree.is_zero() {
            return;
        }
        self.milp
            .add_constraint(Expression::var(v) - degree.to_expression(), Inequality::GreaterEqual);
    }

    /// Degree variable of `x : concept`, with the concept queued for expansion
    pub(crate) fn require(&mut self, x: IndividualId, concept: &Concept) -> VarId {
        let v = self.concept_variable(x, concept);
        self.assertions
            .push_back(Assertion::new(x, concept.clone(), Degree::Variable(v)));
        v
    }

    /// Adds `(subject, object) : role >= degree`. Returns the relation variable.
    pub(crate) fn add_relation_between(
        &mut self,
        subject: IndividualId,
        role: &str,
        object: IndividualId,
        degree: Degree,
    ) -> Result<VarId> {
        let subject = self.store.resolve(subject);
        let object = self.store.resolve(object);

        if let Some(existing) = self.store.relation(subject, role, object) {
            let var = existing.variable;
            if let (Some(new), Some(old)) = (degree.value(), existing.degree.value()) {
                if new <= old {
                    return Ok(var);
                }
            }
            if degree.is_numeric() {
                if let Some(relation) = self.store.relation_mut(subject, role, object) {
                    relation.degree = degree.clone();
                }
            }
            self.add_lower_bound(var, &degree);
            return Ok(var);
        }

        let var = self.relation_variable(subject, role, object);
        self.add_lower_bound(var, &degree);
        self.store.insert_relation(Relation {
            subject,
            role: role.to_string(),
            object,
            degree,
            variable: var,
        });
        trace!(%subject, role, %object, "new relation");
        self.on_new_relation(subject, role, object, var)?;
        Ok(var)
    }

    fn on_new_relation(&mut self, subject: IndividualId, role: &str, object: IndividualId, var: VarId) -> Result<()> {
        // Inverse roles
        for inverse in self.roles.inverses(role) {
            self.add_relation_between(object, &inverse, subject, Degree::Variable(var))?;
        }

        // Super roles
        for (parent, degree) in self.roles.ancestors(role) {
            let implied = self.scaled_relation_degree(var, degree);
            self.add_relation_between(subject, &parent, object, implied)?;
        }

        // Domain and range
        for restriction in self.tbox.domains(role).to_vec() {
            let degree = self.implication_consequent(var, restriction.degree, restriction.implication);
            self.assertions
                .push_back(Assertion::new(subject, restriction.concept, degree));
        }
        for restriction in self.tbox.ranges(role).to_vec() {
            let degree = self.implication_consequent(var, restriction.degree, restriction.implication);
            self.assertions
                .push_back(Assertion::new(object, restriction.concept, degree));
        }

        // Universal restrictions already stored on the subject
        let restrictions: Vec<_> = self
            .store
            .get(subject)
            .restrictions
            .iter()
            .filter(|r| r.role == role)
            .cloned()
            .collect();
        for restriction in restrictions {
            self.apply_restriction(subject, object, var, &restriction)?;
        }

        if self.roles.is_functional(role) && !self.roles.is_concrete(role) {
            self.merge_functional_fillers(subject, role)?;
        }
        Ok(())
    }

    /// Degree of `R ⊑ S ≥ d` applied to a relation variable
    fn scaled_relation_degree(&mut self, var: VarId, degree: f64) -> Degree {
        if degree >= 1.0 {
            return Degree::Variable(var);
        }
        match self.config.logic {
            FuzzyLogic::Lukasiewicz => Degree::Expression(Expression::var(var) + (degree - 1.0)),
            _ => {
                let m = exact_min(&mut self.milp, &Expression::var(var), &Expression::constant(degree));
                Degree::Variable(m)
            }
        }
    }

    /// Merges every filler of a functional role into one individual. Named
    /// fillers are preferred, then the oldest one.
    fn merge_functional_fillers(&mut self, subject: IndividualId, role: &str) -> Result<()> {
        loop {
            let subject = self.store.resolve(subject);
            let fillers = self.store.successors(subject, role);
            if fillers.len() < 2 {
                return Ok(());
            }
            let keep = fillers
                .iter()
                .copied()
                .find(|f| self.store.get(*f).is_named())
                .unwrap_or(fillers[0]);
            let Some(other) = fillers.iter().copied().find(|f| *f != keep) else {
                return Ok(());
            };
            self.merge(keep, other)?;
        }
    }

    /// Merges `from` into `into`: every relation, assertion and restriction
    /// of `from` is redirected to `into`, and `from` is pruned
    pub fn merge(&mut self, into: IndividualId, from: IndividualId) -> Result<()> {
        let into = self.store.resolve(into);
        let from = self.store.resolve(from);
        if into == from {
            return Ok(());
        }
        debug!(
            into = %self.store.get(into).name,
            from = %self.store.get(from).name,
            "merging individuals"
        );

        // Keep the forest a tree when `into` hangs below `from`
        if self.store.ancestors(into).contains(&from) {
            match self.store.get(from).parent.clone() {
                Some((parent, _)) => self.store.reparent(into, parent),
                None => self.store.detach(into),
            }
        }

        let outgoing = self.store.outgoing(from);
        let incoming: Vec<Relation> = self
            .store
            .incoming(from)
            .into_iter()
            .filter(|r| r.subject != from)
            .collect();
        for relation in outgoing.iter().chain(incoming.iter()) {
            self.store
                .remove_relation(relation.subject, &relation.role, relation.object);
        }

        let individual = self.store.get(from);
        let labels: Vec<Concept> = individual.labels.values().cloned().collect();
        let restrictions = individual.restrictions.clone();
        let features = individual.features.clone();
        let negatives = individual.negative_datatypes.clone();
        let children: Vec<IndividualId> = individual.children.iter().copied().collect();
        let links = individual.blocking_links.clone();

        for concept in &labels {
            let v = self.concept_variable(from, concept);
            self.assertions
                .push_back(Assertion::new(into, concept.clone(), Degree::Variable(v)));
        }
        self.requeue_deferred(from);

        for child in children {
            if child != into {
                self.store.reparent(child, into);
            }
        }
        for dependent in links {
            self.unblock(dependent);
        }
        if self.store.get(from).direct_blocking == BlockingStatus::Blocked {
            self.unblock(from);
        }
        self.store.mark_merged(from, into);
        self.stats.merges += 1;

        for relation in outgoing {
            let object = if relation.object == from { into } else { relation.object };
            self.add_relation_between(into, &relation.role, object, Degree::Variable(relation.variable))?;
        }
        for relation in incoming {
            self.add_relation_between(relation.subject, &relation.role, into, Degree::Variable(relation.variable))?;
        }

        for restriction in restrictions {
            self.add_restriction(into, &restriction.role, restriction.filler, restriction.variable)?;
        }

        for (feature, filler) in features {
            match self.store.get(into).features.get(&feature).copied() {
                Some(existing) => self.equate_values(existing, filler),
                None => {
                    self.store.get_mut(into).features.insert(feature, filler);
                }
            }
        }
        self.store.get_mut(into).negative_datatypes.extend(negatives);

        if self.store.get(into).direct_blocking == BlockingStatus::Blocked {
            self.unblock(into);
        }
        Ok(())
    }

    fn equate_values(&mut self, a: IndividualId, b: IndividualId) {
        if let (Some(va), Some(vb)) = (self.store.get(a).value, self.store.get(b).value) {
            self.milp
                .add_constraint(Expression::var(va) - vb, Inequality::Equal);
        }
    }

    fn individual_limit_reached(&self) -> bool {
        self.config
            .max_individuals
            .is_some_and(|limit| self.store.created_count() >= limit)
    }

    /// Records a skipped expansion at the individual limit
    pub(crate) fn exhaust(&mut self, x: IndividualId, what: &str) {
        error!(
            individual = %self.store.get(x).name,
            limit = ?self.config.max_individuals,
            what,
            "maximum number of individuals reached, expansion skipped"
        );
        self.exhausted = true;
        self.stats.exhausted_branches += 1;
    }

    /// Fresh successor of `x`, or `None` at the individual limit
    pub(crate) fn new_successor(&mut self, x: IndividualId, role: &str, kind: IndividualKind) -> Option<IndividualId> {
        if self.individual_limit_reached() {
            self.exhaust(x, role);
            return None;
        }
        self.stats.individuals_created += 1;
        Some(self.store.create_successor(x, role, kind))
    }

    fn expand_existential(&mut self, assertion: Assertion) -> Result<()> {
        let x = self.store.resolve(assertion.individual);
        let Concept::Exists { role, filler } = &assertion.concept else {
            return Ok(());
        };
        let key = (x, assertion.concept.to_string());
        if self.expanded_existentials.contains(&key) {
            return Ok(());
        }
        if self.is_blocked(x) {
            trace!(individual = %x, concept = %assertion.concept, "existential deferred");
            self.stats.blocked_deferrals += 1;
            self.store
                .get_mut(x)
                .blocked_existentials
                .push(Assertion::new(x, assertion.concept.clone(), assertion.degree.clone()));
            return Ok(());
        }
        self.expanded_existentials.insert(key);

        let v = match &assertion.degree {
            Degree::Variable(v) => *v,
            _ => self.concept_variable(x, &assertion.concept),
        };

        if self.roles.is_concrete(role) {
            return self.expand_feature_existential(x, role, filler, v);
        }

        let reused = if self.roles.is_functional(role) {
            self.store.successors(x, role).first().copied()
        } else {
            None
        };
        let y = match reused {
            Some(y) => y,
            None => match self.new_successor(x, role, IndividualKind::Created) {
                Some(y) => y,
                None => return Ok(()),
            },
        };
        self.stats.existentials_expanded += 1;

        match self.config.logic {
            FuzzyLogic::Lukasiewicz => {
                // r ⊗ y:C >= v
                let r = self.add_relation_between(x, role, y, Degree::Numeric(0.0))?;
                let vy = self.require(y, filler);
                self.milp.add_constraint(
                    Expression::var(r) + vy - 1.0 - v,
                    Inequality::GreaterEqual,
                );
            }
            _ => {
                self.add_relation_between(x, role, y, Degree::Variable(v))?;
                self.assertions
                    .push_back(Assertion::new(y, (**filler).clone(), Degree::Variable(v)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockingType, ReasonerConfig};

    #[test]
    fn test_zero_degree_assertion_adds_nothing() {
        let mut kb = KnowledgeBase::default();
        kb.add_assertion("a", Concept::atomic("A"), 0.0).unwrap();
        kb.solve_abox().unwrap();
        assert_eq!(kb.milp().num_constraints(), 0);
        let a = kb.store().find("a").unwrap();
        assert!(kb.store().get(a).labels.is_empty());
    }

    #[test]
    fn test_relation_degree_only_grows() {
        let mut kb = KnowledgeBase::default();
        kb.add_relation("a", "R", "b", 0.8).unwrap();
        kb.add_relation("a", "R", "b", 0.5).unwrap();
        kb.solve_abox().unwrap();
        let a = kb.store().find("a").unwrap();
        let b = kb.store().find("b").unwrap();
        let relation = kb.store().relation(a, "R", b).unwrap();
        assert_eq!(relation.degree, Degree::Numeric(0.8));
        assert_eq!(kb.milp().num_constraints(), 1);
    }

    #[test]
    fn test_inverse_relation_mirrored() {
        let mut kb = KnowledgeBase::default();
        kb.add_inverse_roles("hasChild", "hasParent").unwrap();
        kb.add_relation("a", "hasChild", "b", 1.0).unwrap();
        kb.solve_abox().unwrap();
        let a = kb.store().find("a").unwrap();
        let b = kb.store().find("b").unwrap();
        assert!(kb.store().relation(b, "hasParent", a).is_some());
    }

    #[test]
    fn test_existential_creates_successor() {
        let mut kb = KnowledgeBase::default();
        kb.add_assertion("a", Concept::exists("R", Concept::atomic("B")), 0.7)
            .unwrap();
        kb.solve_abox().unwrap();
        assert_eq!(kb.stats().individuals_created, 1);
        assert_eq!(kb.stats().existentials_expanded, 1);
        let a = kb.store().find("a").unwrap();
        let successors = kb.store().successors(a, "R");
        assert_eq!(successors.len(), 1);
        assert!(kb.store().has_label(successors[0], "B"));
    }

    #[test]
    fn test_functional_role_merges_fillers() {
        let mut kb = KnowledgeBase::default();
        kb.role_is_functional("hasMother");
        kb.add_relation("a", "hasMother", "m1", 1.0).unwrap();
        kb.add_assertion(
            "a",
            Concept::exists("hasMother", Concept::atomic("Teacher")),
            1.0,
        )
        .unwrap();
        kb.solve_abox().unwrap();
        let a = kb.store().find("a").unwrap();
        let m1 = kb.store().find("m1").unwrap();
        assert_eq!(kb.store().successors(a, "hasMother"), vec![m1]);
        assert!(kb.store().has_label(m1, "Teacher"));
        assert_eq!(kb.stats().individuals_created, 0);
    }

    #[test]
    fn test_merge_moves_everything() {
        let mut kb = KnowledgeBase::default();
        kb.add_relation("a", "R", "b", 1.0).unwrap();
        kb.add_relation("c", "S", "b", 1.0).unwrap();
        kb.add_assertion("b", Concept::atomic("B"), 0.6).unwrap();
        kb.solve_abox().unwrap();

        let a = kb.store().find("a").unwrap();
        let b = kb.store().find("b").unwrap();
        let c = kb.store().find("c").unwrap();
        kb.merge(a, b).unwrap();
        kb.solve_abox().unwrap();

        assert!(kb.store().outgoing(b).is_empty());
        assert!(kb.store().incoming(b).is_empty());
        assert!(kb.store().get(b).labels.is_empty());
        assert_eq!(kb.store().find("b"), Some(a));
        assert!(kb.store().relation(a, "R", a).is_some());
        assert!(kb.store().relation(c, "S", a).is_some());
        assert!(kb.store().has_label(a, "B"));
        assert_eq!(kb.stats().merges, 1);
    }

    #[test]
    fn test_individual_limit_reported() {
        let mut kb = KnowledgeBase::new(ReasonerConfig {
            max_individuals: Some(2),
            blocking: Some(BlockingType::NoBlocking),
            ..ReasonerConfig::default()
        });
        kb.define_atomic_concept(
            "A",
            Concept::exists("R", Concept::atomic("A")),
            fuzzydl_model::ImplicationKind::Lukasiewicz,
            1.0,
        )
        .unwrap();
        kb.add_assertion("a", Concept::atomic("A"), 1.0).unwrap();
        assert_eq!(kb.solve_abox(), Err(ReasonerError::MaxIndividualsExceeded(2)));
        assert_eq!(kb.stats().individuals_created, 2);
        assert!(kb.stats().exhausted_branches >= 1);
    }

    #[test]
    fn test_goals_reach_created_individuals() {
        let mut kb = KnowledgeBase::default();
        kb.add_gci(
            Concept::exists("R", Concept::atomic("A")),
            Concept::exists("S", Concept::atomic("B")),
            1.0,
            fuzzydl_model::ImplicationKind::Lukasiewicz,
        )
        .unwrap();
        kb.add_individual("a");
        kb.solve_abox().unwrap();
        assert_eq!(kb.tbox().goals().len(), 1);
        assert!(kb.blocking_type() != BlockingType::NoBlocking);
        assert!(kb.stats().individuals_created > 0);
        for id in kb.store().live_ids() {
            assert_eq!(kb.store().get(id).goals_applied, 1);
        }
    }
}
