//! ファジィ知識ベース
//!
//! ローダーが呼び出す API (個体, アサーション, 公理, ロールの性質,
//! 具体特徴, 真理定数, 修飾子) と、推論セッションの状態を保持します。
//! MILP のカウンタを含むすべての状態はこの構造体が所有します。

use fuzzydl_milp::{MilpModel, VarId};
use fuzzydl_model::{
    Concept, ConceptEquivalence, DatatypeRestriction, Degree, FeatureKind, FuzzyConcreteConcept, FuzzyLogic,
    GeneralConceptInclusion, ImplicationKind, Modifier, PrimitiveConceptDefinition,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::absorption::{AbsorptionReport, TBox};
use crate::config::{BlockingType, ReasonerConfig};
use crate::individuals::{Assertion, IndividualId, IndividualStore};
use crate::roles::{inverse_functional_name, RoleHierarchy};
use crate::{ReasonerError, Result};

/// Counters collected while reasoning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStats {
    pub individuals_created: usize,
    pub assertions_processed: usize,
    pub existentials_expanded: usize,
    pub blocked_deferrals: usize,
    pub merges: usize,
    pub variables: usize,
    pub constraints: usize,
    /// Existential or concrete expansions skipped at the individual limit
    pub exhausted_branches: usize,
}

/// ABox relation as declared by the loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DeclaredRelation {
    pub subject: String,
    pub role: String,
    pub object: String,
    pub degree: Degree,
}

/// ABox assertion as declared by the loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DeclaredAssertion {
    pub individual: String,
    pub concept: Concept,
    pub degree: Degree,
}

/// Fuzzy knowledge base and its reasoning session
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    pub(crate) config: ReasonerConfig,
    pub(crate) tbox: TBox,
    pub(crate) roles: RoleHierarchy,
    pub(crate) store: IndividualStore,
    pub(crate) milp: MilpModel,

    pub(crate) assertions: VecDeque<Assertion>,
    pub(crate) existentials: VecDeque<Assertion>,
    pub(crate) expanded_existentials: HashSet<(IndividualId, String)>,

    /// 具体特徴とその値域
    pub(crate) features: BTreeMap<String, FeatureKind>,
    /// String feature -> literal -> rank
    pub(crate) string_ranks: BTreeMap<String, BTreeMap<String, usize>>,
    /// String features whose ranks already appear in constraints
    pub(crate) frozen_ranks: BTreeSet<String>,
    pub(crate) truth_constants: BTreeMap<String, f64>,
    pub(crate) modifiers: BTreeMap<String, Modifier>,
    pub(crate) fuzzy_concepts: BTreeMap<String, FuzzyConcreteConcept>,
    pub(crate) fuzzy_number_range: Option<(f64, f64)>,
    pub(crate) abstract_roles: BTreeSet<String>,

    pub(crate) declared_individuals: Vec<String>,
    pub(crate) declared_assertions: Vec<DeclaredAssertion>,
    pub(crate) declared_relations: Vec<DeclaredRelation>,
    pub(crate) seeded_individuals: usize,
    pub(crate) seeded_assertions: usize,
    pub(crate) seeded_relations: usize,

    /// 具体値パスで処理する正のデータ型制約
    pub(crate) pending_datatypes: Vec<(IndividualId, DatatypeRestriction, VarId)>,
    pub(crate) compiled_negatives: HashSet<String>,
    /// ファジィ数制約の代表個体
    pub(crate) representatives: HashMap<String, IndividualId>,
    /// (x, y, T, restriction) already propagated along a transitive role
    pub(crate) propagation_memo: HashSet<String>,

    pub(crate) blocking: BlockingType,
    pub(crate) dynamic_blocking: bool,

    pub(crate) stats: ReasoningStats,
    pub(crate) inconsistency: Option<String>,
    pub(crate) preprocessed: bool,
    pub(crate) exhausted: bool,
    pub(crate) consistent: Option<bool>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(ReasonerConfig::default())
    }
}

fn check_degree(degree: &Degree) -> Result<()> {
    match degree.value() {
        Some(v) if !(0.0..=1.0).contains(&v) => {
            Err(ReasonerError::InvalidArgument(format!("degree {v} outside [0,1]")))
        }
        _ => Ok(()),
    }
}

fn check_axiom_degree(degree: f64) -> Result<()> {
    check_degree(&Degree::Numeric(degree))
}

impl KnowledgeBase {
    pub fn new(config: ReasonerConfig) -> Self {
        Self {
            config,
            tbox: TBox::new(),
            roles: RoleHierarchy::new(),
            store: IndividualStore::new(),
            milp: MilpModel::new(),
            assertions: VecDeque::new(),
            existentials: VecDeque::new(),
            expanded_existentials: HashSet::new(),
            features: BTreeMap::new(),
            string_ranks: BTreeMap::new(),
            frozen_ranks: BTreeSet::new(),
            truth_constants: BTreeMap::new(),
            modifiers: BTreeMap::new(),
            fuzzy_concepts: BTreeMap::new(),
            fuzzy_number_range: None,
            abstract_roles: BTreeSet::new(),
            declared_individuals: Vec::new(),
            declared_assertions: Vec::new(),
            declared_relations: Vec::new(),
            seeded_individuals: 0,
            seeded_assertions: 0,
            seeded_relations: 0,
            pending_datatypes: Vec::new(),
            compiled_negatives: HashSet::new(),
            representatives: HashMap::new(),
            propagation_memo: HashSet::new(),
            blocking: BlockingType::NoBlocking,
            dynamic_blocking: false,
            stats: ReasoningStats::default(),
            inconsistency: None,
            preprocessed: false,
            exhausted: false,
            consistent: None,
        }
    }

    pub fn with_logic(logic: FuzzyLogic) -> Self {
        Self::new(ReasonerConfig::with_logic(logic))
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn logic(&self) -> FuzzyLogic {
        self.config.logic
    }

    pub fn tbox(&self) -> &TBox {
        &self.tbox
    }

    pub fn roles(&self) -> &RoleHierarchy {
        &self.roles
    }

    pub fn store(&self) -> &IndividualStore {
        &self.store
    }

    pub fn milp(&self) -> &MilpModel {
        &self.milp
    }

    /// Blocking strategy chosen by the last preprocessing run
    pub fn blocking_type(&self) -> BlockingType {
        self.blocking
    }

    pub fn is_dynamic_blocking(&self) -> bool {
        self.dynamic_blocking
    }

    pub fn stats(&self) -> ReasoningStats {
        ReasoningStats {
            variables: self.milp.num_variables(),
            constraints: self.milp.num_constraints(),
            ..self.stats.clone()
        }
    }

    /// Invalidates cached query answers after a modification
    fn touch(&mut self) {
        self.consistent = None;
    }

    pub fn set_logic(&mut self, logic: FuzzyLogic) -> Result<()> {
        if self.preprocessed && logic != self.config.logic {
            return Err(ReasonerError::InvalidArgument(
                "the fuzzy logic cannot change after reasoning started".to_string(),
            ));
        }
        self.config.logic = logic;
        Ok(())
    }

    // ---- ABox ----

    pub fn add_individual(&mut self, name: &str) {
        if !self.declared_individuals.iter().any(|n| n == name) {
            self.declared_individuals.push(name.to_string());
            self.touch();
        }
    }

    /// `individual : concept >= degree`
    pub fn add_assertion(&mut self, individual: &str, concept: Concept, degree: impl Into<Degree>) -> Result<()> {
        let degree = degree.into();
        check_degree(&degree)?;
        self.add_individual(individual);
        self.declared_assertions.push(DeclaredAssertion {
            individual: individual.to_string(),
            concept,
            degree,
        });
        self.touch();
        Ok(())
    }

    /// `(subject, object) : role >= degree`
    pub fn add_relation(&mut self, subject: &str, role: &str, object: &str, degree: impl Into<Degree>) -> Result<()> {
        let degree = degree.into();
        check_degree(&degree)?;
        self.mark_abstract(role)?;
        self.add_individual(subject);
        self.add_individual(object);
        self.declared_relations.push(DeclaredRelation {
            subject: subject.to_string(),
            role: role.to_string(),
            object: object.to_string(),
            degree,
        });
        self.touch();
        Ok(())
    }

    // ---- TBox ----

    /// `A ≡ C`
    pub fn define_concept(&mut self, name: &str, concept: Concept) {
        self.tbox.add_definition(name, concept);
        self.touch();
    }

    /// `A ⊑ C` with an implication and a degree
    pub fn define_atomic_concept(
        &mut self,
        name: &str,
        concept: Concept,
        implication: ImplicationKind,
        degree: f64,
    ) -> Result<()> {
        check_axiom_degree(degree)?;
        self.tbox
            .add_primitive(PrimitiveConceptDefinition::new(name, concept, implication, degree));
        self.touch();
        Ok(())
    }

    /// `C ⊑ D` with a degree and an implication
    pub fn add_gci(&mut self, subsumed: Concept, subsumer: Concept, degree: f64, implication: ImplicationKind) -> Result<()> {
        check_axiom_degree(degree)?;
        self.tbox
            .add_gci(GeneralConceptInclusion::new(subsumed, subsumer, degree, implication));
        self.touch();
        Ok(())
    }

    /// `C ≡ D`
    pub fn add_equivalence(&mut self, left: Concept, right: Concept) {
        self.tbox.add_equivalence(ConceptEquivalence::new(left, right));
        self.touch();
    }

    pub fn add_concepts_disjoint(&mut self, names: &[&str]) -> Result<()> {
        if names.len() < 2 {
            return Err(ReasonerError::InvalidArgument(
                "disjointness needs at least two concepts".to_string(),
            ));
        }
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.tbox.add_disjoint(&names);
        self.touch();
        Ok(())
    }

    // ---- RBox ----

    fn mark_abstract(&mut self, role: &str) -> Result<()> {
        if self.roles.is_concrete(role) {
            return Err(ReasonerError::Definition(format!(
                "{role} is a concrete feature and cannot be used as an abstract role"
            )));
        }
        self.abstract_roles.insert(role.to_string());
        self.roles.info_mut(role);
        Ok(())
    }

    pub fn role_is_functional(&mut self, role: &str) {
        self.roles.info_mut(role).functional = true;
        self.touch();
    }

    pub fn role_is_transitive(&mut self, role: &str) -> Result<()> {
        self.mark_abstract(role)?;
        self.roles.info_mut(role).transitive = true;
        self.touch();
        Ok(())
    }

    pub fn role_is_reflexive(&mut self, role: &str) -> Result<()> {
        self.mark_abstract(role)?;
        self.roles.info_mut(role).reflexive = true;
        self.touch();
        Ok(())
    }

    /// A symmetric role is its own inverse
    pub fn role_is_symmetric(&mut self, role: &str) -> Result<()> {
        self.mark_abstract(role)?;
        self.roles.info_mut(role).symmetric = true;
        self.roles.add_inverse(role, role);
        self.touch();
        Ok(())
    }

    /// Declares `role` inverse functional through a functional inverse role
    pub fn role_is_inverse_functional(&mut self, role: &str) -> Result<()> {
        self.mark_abstract(role)?;
        self.roles.info_mut(role).inverse_functional = true;
        let inverse = inverse_functional_name(role);
        self.roles.add_inverse(role, &inverse);
        self.roles.info_mut(&inverse).functional = true;
        self.abstract_roles.insert(inverse);
        self.touch();
        Ok(())
    }

    pub fn add_inverse_roles(&mut self, role: &str, inverse: &str) -> Result<()> {
        self.mark_abstract(role)?;
        self.mark_abstract(inverse)?;
        self.roles.add_inverse(role, inverse);
        self.touch();
        Ok(())
    }

    /// `child ⊑ parent` with a degree
    pub fn role_implies(&mut self, child: &str, parent: &str, degree: f64) -> Result<()> {
        check_axiom_degree(degree)?;
        self.mark_abstract(child)?;
        self.mark_abstract(parent)?;
        self.roles.add_inclusion(child, parent, degree);
        self.touch();
        Ok(())
    }

    pub fn role_domain(&mut self, role: &str, concept: Concept) -> Result<()> {
        self.mark_abstract(role)?;
        self.tbox.add_domain(role, concept);
        self.touch();
        Ok(())
    }

    pub fn role_range(&mut self, role: &str, concept: Concept) -> Result<()> {
        self.mark_abstract(role)?;
        self.tbox.add_range(role, concept);
        self.touch();
        Ok(())
    }

    // ---- Concrete domains ----

    fn define_feature(&mut self, name: &str, kind: FeatureKind) -> Result<()> {
        if self.abstract_roles.contains(name) {
            return Err(ReasonerError::Definition(format!(
                "{name} is an abstract role and cannot be a concrete feature"
            )));
        }
        if let Some(existing) = self.features.get(name) {
            let restated_string = kind == FeatureKind::String && self.string_ranks.contains_key(name);
            if *existing != kind && !restated_string {
                return Err(ReasonerError::Definition(format!("feature {name} is already defined")));
            }
            return Ok(());
        }
        let (lower, upper) = kind.bounds();
        if lower > upper {
            return Err(ReasonerError::InvalidArgument(format!(
                "feature {name} has an empty range [{lower}, {upper}]"
            )));
        }
        let info = self.roles.info_mut(name);
        info.concrete = true;
        info.functional = true;
        self.features.insert(name.to_string(), kind);
        self.touch();
        Ok(())
    }

    pub fn define_string_concrete_feature(&mut self, name: &str) -> Result<()> {
        self.define_feature(name, FeatureKind::String)?;
        self.string_ranks.entry(name.to_string()).or_default();
        Ok(())
    }

    pub fn define_integer_concrete_feature(&mut self, name: &str, lower: i64, upper: i64) -> Result<()> {
        self.define_feature(
            name,
            FeatureKind::Integer {
                lower: lower as f64,
                upper: upper as f64,
            },
        )
    }

    pub fn define_real_concrete_feature(&mut self, name: &str, lower: f64, upper: f64) -> Result<()> {
        self.define_feature(name, FeatureKind::Real { lower, upper })
    }

    pub fn define_boolean_concrete_feature(&mut self, name: &str) -> Result<()> {
        self.define_feature(name, FeatureKind::Boolean)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureKind> {
        self.features.get(name)
    }

    /// Range of the values that triangular fuzzy numbers may take
    pub fn define_fuzzy_number_range(&mut self, k1: f64, k2: f64) -> Result<()> {
        if k1 > k2 {
            return Err(ReasonerError::InvalidArgument(format!(
                "empty fuzzy number range [{k1}, {k2}]"
            )));
        }
        self.fuzzy_number_range = Some((k1, k2));
        self.touch();
        Ok(())
    }

    // ---- Named values ----

    pub fn define_truth_constant(&mut self, name: &str, value: f64) -> Result<()> {
        check_axiom_degree(value)?;
        if self.truth_constants.contains_key(name) {
            return Err(ReasonerError::Definition(format!("truth constant {name} is already defined")));
        }
        self.truth_constants.insert(name.to_string(), value);
        Ok(())
    }

    /// Degree denoted by a truth constant
    pub fn constant_degree(&self, name: &str) -> Result<Degree> {
        self.truth_constants
            .get(name)
            .map(|v| Degree::Numeric(*v))
            .ok_or_else(|| ReasonerError::Definition(format!("undefined truth constant {name}")))
    }

    pub fn define_modifier(&mut self, modifier: Modifier) -> Result<()> {
        let name = modifier.name().to_string();
        if self.modifiers.contains_key(&name) {
            return Err(ReasonerError::Definition(format!("modifier {name} is already defined")));
        }
        self.modifiers.insert(name, modifier);
        Ok(())
    }

    pub fn modifier(&self, name: &str) -> Option<&Modifier> {
        self.modifiers.get(name)
    }

    pub fn define_fuzzy_concept(&mut self, concept: FuzzyConcreteConcept) -> Result<()> {
        if self.fuzzy_concepts.contains_key(&concept.name) {
            return Err(ReasonerError::Definition(format!(
                "fuzzy concept {} is already defined",
                concept.name
            )));
        }
        self.fuzzy_concepts.insert(concept.name.clone(), concept);
        Ok(())
    }

    pub fn fuzzy_concept(&self, name: &str) -> Option<&FuzzyConcreteConcept> {
        self.fuzzy_concepts.get(name)
    }

    // ---- Lifecycle ----

    /// Absorbs the terminology, closes the role hierarchy and selects the
    /// blocking strategy
    pub fn preprocess(&mut self) -> Result<AbsorptionReport> {
        if let Some(reason) = &self.inconsistency {
            return Err(ReasonerError::InconsistentOntology(reason.clone()));
        }
        self.config.validate()?;
        self.rank_string_literals()?;
        self.roles.close(self.config.logic);

        let report = match self.tbox.absorb(self.config.logic) {
            Ok(report) => report,
            Err(ReasonerError::InconsistentOntology(reason)) => {
                self.inconsistency = Some(reason.clone());
                self.consistent = Some(false);
                return Err(ReasonerError::InconsistentOntology(reason));
            }
            Err(other) => return Err(other),
        };

        self.warn_name_collisions();
        let (blocking, dynamic) = self.select_blocking();
        self.blocking = blocking;
        self.dynamic_blocking = dynamic;
        self.preprocessed = true;
        info!(
            logic = %self.config.logic,
            %blocking,
            dynamic,
            goals = self.tbox.goals().len(),
            "knowledge base preprocessed"
        );
        Ok(report)
    }

    /// Concept names that are also role names
    fn warn_name_collisions(&self) {
        let mut concept_names: BTreeSet<String> = BTreeSet::new();
        for concept in self.tbox.concepts() {
            concept_names.extend(concept.atomic_names());
        }
        for assertion in &self.declared_assertions {
            concept_names.extend(assertion.concept.atomic_names());
        }
        for (role, _) in self.roles.roles() {
            if concept_names.contains(role) {
                warn!(name = %role, "name is used both as a concept and as a role");
            }
        }
    }

    /// Every concept mentioned by the knowledge base
    pub(crate) fn all_concepts(&self) -> Vec<&Concept> {
        let mut concepts = self.tbox.concepts();
        concepts.extend(self.declared_assertions.iter().map(|a| &a.concept));
        concepts
    }

    /// Deep copy that keeps the terminology and role axioms but no ABox
    pub fn clone_without_abox(&self) -> KnowledgeBase {
        let mut copy = KnowledgeBase::new(self.config.clone());
        copy.tbox = self.tbox.clone();
        copy.roles = self.roles.clone();
        copy.features = self.features.clone();
        copy.string_ranks = self.string_ranks.clone();
        copy.truth_constants = self.truth_constants.clone();
        copy.modifiers = self.modifiers.clone();
        copy.fuzzy_concepts = self.fuzzy_concepts.clone();
        copy.fuzzy_number_range = self.fuzzy_number_range;
        copy.abstract_roles = self.abstract_roles.clone();
        copy.inconsistency = self.inconsistency.clone();
        copy.blocking = self.blocking;
        copy.dynamic_blocking = self.dynamic_blocking;
        copy.preprocessed = self.preprocessed;
        debug!("knowledge base cloned without ABox");
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_truth_constant_rejected() {
        let mut kb = KnowledgeBase::default();
        kb.define_truth_constant("high", 0.8).unwrap();
        assert!(matches!(
            kb.define_truth_constant("high", 0.9),
            Err(ReasonerError::Definition(_))
        ));
        assert_eq!(kb.constant_degree("high").unwrap(), Degree::Numeric(0.8));
        assert!(kb.constant_degree("low").is_err());
    }

    #[test]
    fn test_duplicate_modifier_rejected() {
        let mut kb = KnowledgeBase::default();
        kb.define_modifier(Modifier::linear("very", 0.8).unwrap()).unwrap();
        assert!(kb.define_modifier(Modifier::linear("very", 0.5).unwrap()).is_err());
        assert!(kb.modifier("very").is_some());
    }

    #[test]
    fn test_role_cannot_be_abstract_and_concrete() {
        let mut kb = KnowledgeBase::default();
        kb.define_real_concrete_feature("hasAge", 0.0, 150.0).unwrap();
        assert!(matches!(
            kb.add_relation("a", "hasAge", "b", 1.0),
            Err(ReasonerError::Definition(_))
        ));

        kb.add_relation("a", "hasFriend", "b", 1.0).unwrap();
        assert!(kb.define_integer_concrete_feature("hasFriend", 0, 10).is_err());
    }

    #[test]
    fn test_degree_outside_unit_interval_rejected() {
        let mut kb = KnowledgeBase::default();
        assert!(matches!(
            kb.add_assertion("a", Concept::atomic("A"), 1.5),
            Err(ReasonerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clone_without_abox_keeps_terminology() {
        let mut kb = KnowledgeBase::default();
        kb.define_concept("Parent", Concept::exists("hasChild", Concept::Top));
        kb.add_assertion("a", Concept::atomic("Parent"), 1.0).unwrap();
        let copy = kb.clone_without_abox();
        assert!(copy.declared_assertions.is_empty());
        assert_eq!(copy.tbox().declared().len(), 1);
    }

    #[test]
    fn test_inverse_functional_declares_functional_inverse() {
        let mut kb = KnowledgeBase::default();
        kb.role_is_inverse_functional("hasSSN").unwrap();
        assert!(kb.roles().is_functional("hasSSN^-"));
        assert!(kb.roles().inverses("hasSSN").contains(&"hasSSN^-".to_string()));
    }
}
