//! TBox 前処理 (吸収)
//!
//! 一般概念包含を原子概念で索引付けされた形に書き換え、
//! 展開中に遅延展開 (lazy unfolding) できるようにします。
//!
//! - 高速経路: すでに遅延展開可能な TBox はそのまま写す
//! - フェーズ A: 同値公理を相互包含に展開
//! - フェーズ B: C ⊑ (D1 ⊓ D2), (C1 ⊔ C2) ⊑ D の分割 (不動点まで)
//! - フェーズ C: 同義語, 概念吸収, ロール吸収, 定義吸収
//! - 吸収できない公理は ⊤ ⊑ (C → D) の目標として残る

use fuzzydl_model::{
    Concept, ConceptEquivalence, ConnectiveKind, FuzzyLogic, GeneralConceptInclusion, ImplicationKind,
    PrimitiveConceptDefinition,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use tracing::{debug, info, trace};

use crate::{ReasonerError, Result};

/// Domain or range restriction attached to a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRestriction {
    pub concept: Concept,
    pub degree: f64,
    pub implication: ImplicationKind,
}

/// Axiom as declared by the loader, kept for serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclaredAxiom {
    Definition { defined: String, concept: Concept },
    Primitive(PrimitiveConceptDefinition),
    Equivalence(ConceptEquivalence),
    Inclusion(GeneralConceptInclusion),
    Disjoint(Vec<String>),
    Domain { role: String, concept: Concept },
    Range { role: String, concept: Concept },
}

/// Counts reported by one absorption run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbsorptionReport {
    pub fast_path: bool,
    pub synonyms: usize,
    pub definitions: usize,
    pub inclusions: usize,
    pub role_restrictions: usize,
    pub goals: usize,
}

/// Terminology: raw axioms waiting for absorption plus the absorbed structures
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TBox {
    declared: Vec<DeclaredAxiom>,

    pending_definitions: Vec<(String, Concept)>,
    pending_primitives: Vec<PrimitiveConceptDefinition>,
    pending_equivalences: Vec<ConceptEquivalence>,
    pending_gcis: Vec<GeneralConceptInclusion>,
    pending_domains: Vec<(String, RoleRestriction)>,
    pending_ranges: Vec<(String, RoleRestriction)>,

    /// 同義語: A -> {B | A ≡ B}
    synonyms: BTreeMap<String, BTreeSet<String>>,
    /// 定義: A ≡ C
    definitions: BTreeMap<String, Vec<Concept>>,
    /// 包含: A ⊑ C
    inclusions: BTreeMap<String, Vec<PrimitiveConceptDefinition>>,
    domains: BTreeMap<String, Vec<RoleRestriction>>,
    ranges: BTreeMap<String, Vec<RoleRestriction>>,
    /// 吸収できなかった公理
    goals: Vec<GeneralConceptInclusion>,
    disjoint: BTreeMap<String, BTreeSet<String>>,

    absorbed_keys: HashSet<String>,
}

fn crisp_inclusion(subsumed: Concept, subsumer: Concept) -> GeneralConceptInclusion {
    GeneralConceptInclusion::new(subsumed, subsumer, 1.0, ImplicationKind::Lukasiewicz)
}

/// Whether a conjunction of this kind is the minimum t-norm under `logic`
fn is_min_connective(kind: ConnectiveKind, logic: FuzzyLogic) -> bool {
    matches!(kind.resolve(logic), ConnectiveKind::Goedel | ConnectiveKind::Default)
}

fn is_sum_disjunction(kind: ConnectiveKind, logic: FuzzyLogic) -> bool {
    matches!(kind.resolve(logic), ConnectiveKind::Lukasiewicz)
        || (kind.resolve(logic) == ConnectiveKind::Default && logic == FuzzyLogic::Classical)
}

/// Implication used by the universal restriction of each logic
fn universal_implication(logic: FuzzyLogic) -> Option<ImplicationKind> {
    match logic {
        FuzzyLogic::Lukasiewicz | FuzzyLogic::Classical => Some(ImplicationKind::Lukasiewicz),
        FuzzyLogic::Goedel => Some(ImplicationKind::Goedel),
        FuzzyLogic::Zadeh => None,
    }
}

impl TBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declared(&self) -> &[DeclaredAxiom] {
        &self.declared
    }

    /// A ≡ C
    pub fn add_definition(&mut self, defined: &str, concept: Concept) {
        self.declared.push(DeclaredAxiom::Definition {
            defined: defined.to_string(),
            concept: concept.clone(),
        });
        self.pending_definitions.push((defined.to_string(), concept));
    }

    /// A ⊑ C
    pub fn add_primitive(&mut self, axiom: PrimitiveConceptDefinition) {
        self.declared.push(DeclaredAxiom::Primitive(axiom.clone()));
        self.pending_primitives.push(axiom);
    }

    /// C ≡ D
    pub fn add_equivalence(&mut self, axiom: ConceptEquivalence) {
        self.declared.push(DeclaredAxiom::Equivalence(axiom.clone()));
        self.pending_equivalences.push(axiom);
    }

    /// C ⊑ D
    pub fn add_gci(&mut self, axiom: GeneralConceptInclusion) {
        self.declared.push(DeclaredAxiom::Inclusion(axiom.clone()));
        self.pending_gcis.push(axiom);
    }

    pub fn add_disjoint(&mut self, names: &[String]) {
        self.declared.push(DeclaredAxiom::Disjoint(names.to_vec()));
        for a in names {
            for b in names {
                if a != b {
                    self.disjoint.entry(a.clone()).or_default().insert(b.clone());
                }
            }
        }
    }

    pub fn add_domain(&mut self, role: &str, concept: Concept) {
        self.declared.push(DeclaredAxiom::Domain {
            role: role.to_string(),
            concept: concept.clone(),
        });
        self.pending_domains.push((
            role.to_string(),
            RoleRestriction {
                concept,
                degree: 1.0,
                implication: ImplicationKind::Lukasiewicz,
            },
        ));
    }

    pub fn add_range(&mut self, role: &str, concept: Concept) {
        self.declared.push(DeclaredAxiom::Range {
            role: role.to_string(),
            concept: concept.clone(),
        });
        self.pending_ranges.push((
            role.to_string(),
            RoleRestriction {
                concept,
                degree: 1.0,
                implication: ImplicationKind::Lukasiewicz,
            },
        ));
    }

    pub fn synonyms(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.synonyms.get(name)
    }

    pub fn definitions(&self, name: &str) -> &[Concept] {
        self.definitions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn inclusions(&self, name: &str) -> &[PrimitiveConceptDefinition] {
        self.inclusions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn domains(&self, role: &str) -> &[RoleRestriction] {
        self.domains.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ranges(&self, role: &str) -> &[RoleRestriction] {
        self.ranges.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn goals(&self) -> &[GeneralConceptInclusion] {
        &self.goals
    }

    pub fn disjoint_with(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.disjoint.get(name)
    }

    pub fn has_domain_or_range(&self) -> bool {
        !self.domains.is_empty() || !self.ranges.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !(self.pending_definitions.is_empty()
            && self.pending_primitives.is_empty()
            && self.pending_equivalences.is_empty()
            && self.pending_gcis.is_empty()
            && self.pending_domains.is_empty()
            && self.pending_ranges.is_empty())
    }

    /// Every concept mentioned by the terminology
    pub fn concepts(&self) -> Vec<&Concept> {
        let mut concepts = Vec::new();
        for axiom in &self.declared {
            match axiom {
                DeclaredAxiom::Definition { concept, .. } => concepts.push(concept),
                DeclaredAxiom::Primitive(p) => concepts.push(&p.definition),
                DeclaredAxiom::Equivalence(e) => {
                    concepts.push(&e.left);
                    concepts.push(&e.right);
                }
                DeclaredAxiom::Inclusion(g) => {
                    concepts.push(&g.subsumed);
                    concepts.push(&g.subsumer);
                }
                DeclaredAxiom::Disjoint(_) => {}
                DeclaredAxiom::Domain { concept, .. } | DeclaredAxiom::Range { concept, .. } => concepts.push(concept),
            }
        }
        concepts
    }

    /// Whether lazy unfolding through definitions and inclusions can loop
    pub fn has_cycles(&self) -> bool {
        let mut edges: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (name, defs) in &self.definitions {
            let targets = edges.entry(name.as_str()).or_default();
            for def in defs {
                targets.extend(def.atomic_names());
            }
        }
        for (name, incs) in &self.inclusions {
            let targets = edges.entry(name.as_str()).or_default();
            for inc in incs {
                targets.extend(inc.definition.atomic_names());
            }
        }
        for (name, syns) in &self.synonyms {
            edges.entry(name.as_str()).or_default().extend(syns.iter().cloned());
        }

        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: BTreeMap<String, u8> = BTreeMap::new();
        for start in edges.keys() {
            if state.get(*start).copied().unwrap_or(0) != 0 {
                continue;
            }
            let mut stack: Vec<(String, Vec<String>)> = vec![(
                start.to_string(),
                edges.get(start).map(|t| t.iter().cloned().collect()).unwrap_or_default(),
            )];
            state.insert(start.to_string(), 1);
            while let Some((node, mut pending)) = stack.pop() {
                match pending.pop() {
                    None => {
                        state.insert(node, 2);
                    }
                    Some(next) => {
                        stack.push((node, pending));
                        match state.get(&next).copied().unwrap_or(0) {
                            1 => {
                                // a synonym pair points back at itself without being a real cycle
                                let is_synonym = self.synonyms.get(&next).map_or(false, |s| {
                                    stack.last().map_or(false, |(n, _)| s.contains(n))
                                });
                                if !is_synonym {
                                    return true;
                                }
                            }
                            0 => {
                                state.insert(next.clone(), 1);
                                let targets = edges
                                    .get(next.as_str())
                                    .map(|t| t.iter().cloned().collect())
                                    .unwrap_or_default();
                                stack.push((next, targets));
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        false
    }

    /// True when nothing but unique, unreused atomic definitions, atomic
    /// inclusions and role restrictions is pending
    fn is_lazily_unfoldable(&self) -> bool {
        if !self.pending_gcis.is_empty() || !self.pending_equivalences.is_empty() {
            return false;
        }
        let mut defined = BTreeSet::new();
        for (name, _) in &self.pending_definitions {
            if !defined.insert(name.as_str()) || self.definitions.contains_key(name) || self.inclusions.contains_key(name)
            {
                return false;
            }
        }
        self.pending_primitives
            .iter()
            .all(|p| !defined.contains(p.defined.as_str()) && !self.definitions.contains_key(&p.defined))
    }

    /// Absorbs every pending axiom. Running it again without new axioms
    /// changes nothing.
    pub fn absorb(&mut self, logic: FuzzyLogic) -> Result<AbsorptionReport> {
        let mut report = AbsorptionReport::default();

        for (role, restriction) in std::mem::take(&mut self.pending_domains) {
            if self.insert_role_restriction(true, &role, restriction) {
                report.role_restrictions += 1;
            }
        }
        for (role, restriction) in std::mem::take(&mut self.pending_ranges) {
            if self.insert_role_restriction(false, &role, restriction) {
                report.role_restrictions += 1;
            }
        }

        if self.is_lazily_unfoldable() {
            report.fast_path = true;
            for (name, concept) in std::mem::take(&mut self.pending_definitions) {
                if self.insert_definition(&name, concept) {
                    report.definitions += 1;
                }
            }
            for axiom in std::mem::take(&mut self.pending_primitives) {
                if self.insert_inclusion(axiom) {
                    report.inclusions += 1;
                }
            }
            debug!(?report, "TBox already lazily unfoldable");
            return Ok(report);
        }

        // Phase A
        let mut todo: VecDeque<GeneralConceptInclusion> = VecDeque::new();
        let definitions = std::mem::take(&mut self.pending_definitions);
        let mut definition_count: BTreeMap<String, usize> = BTreeMap::new();
        for (name, _) in &definitions {
            *definition_count.entry(name.clone()).or_default() += 1;
        }
        let primitive_names: BTreeSet<String> = self.pending_primitives.iter().map(|p| p.defined.clone()).collect();
        for (name, concept) in definitions {
            let unique = definition_count.get(&name) == Some(&1)
                && !primitive_names.contains(&name)
                && !self.definitions.contains_key(&name)
                && !self.inclusions.contains_key(&name);
            if unique {
                if self.insert_definition(&name, concept) {
                    report.definitions += 1;
                }
            } else {
                todo.push_back(crisp_inclusion(Concept::Atomic(name.clone()), concept.clone()));
                todo.push_back(crisp_inclusion(concept, Concept::Atomic(name)));
            }
        }
        for eq in std::mem::take(&mut self.pending_equivalences) {
            todo.push_back(crisp_inclusion(eq.left.clone(), eq.right.clone()));
            todo.push_back(crisp_inclusion(eq.right, eq.left));
        }
        for p in std::mem::take(&mut self.pending_primitives) {
            todo.push_back(GeneralConceptInclusion::new(
                Concept::Atomic(p.defined),
                p.definition,
                p.degree,
                p.implication,
            ));
        }
        todo.extend(std::mem::take(&mut self.pending_gcis));

        // Phase B
        let mut normalized: Vec<GeneralConceptInclusion> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(gci) = todo.pop_front() {
            if !seen.insert(gci.key()) {
                continue;
            }
            match (&gci.subsumed, &gci.subsumer) {
                (_, Concept::And { kind, operands }) if is_min_connective(*kind, logic) => {
                    trace!(axiom = %gci, "splitting conjunctive subsumer");
                    for operand in operands {
                        todo.push_back(GeneralConceptInclusion::new(
                            gci.subsumed.clone(),
                            operand.clone(),
                            gci.degree,
                            gci.implication,
                        ));
                    }
                }
                (Concept::Or { kind, operands }, _) if !is_sum_disjunction(*kind, logic) => {
                    trace!(axiom = %gci, "splitting disjunctive subsumed concept");
                    for operand in operands {
                        todo.push_back(GeneralConceptInclusion::new(
                            operand.clone(),
                            gci.subsumer.clone(),
                            gci.degree,
                            gci.implication,
                        ));
                    }
                }
                _ => normalized.push(gci),
            }
        }

        // Phase C
        let mut consumed = vec![false; normalized.len()];
        self.absorb_synonyms_and_definitions(&normalized, &mut consumed, &mut report);
        for (index, gci) in normalized.into_iter().enumerate() {
            if consumed[index] {
                continue;
            }
            self.absorb_one(gci, logic, &mut report)?;
        }

        info!(
            synonyms = report.synonyms,
            definitions = report.definitions,
            inclusions = report.inclusions,
            role_restrictions = report.role_restrictions,
            goals = report.goals,
            "TBox absorbed"
        );
        Ok(report)
    }

    /// Synonym absorption (A ⊑ B, B ⊑ A) and definition absorption (A ⊑ C, C ⊑ A)
    fn absorb_synonyms_and_definitions(
        &mut self,
        normalized: &[GeneralConceptInclusion],
        consumed: &mut [bool],
        report: &mut AbsorptionReport,
    ) {
        for i in 0..normalized.len() {
            if consumed[i] || normalized[i].degree < 1.0 {
                continue;
            }
            let Some(a) = normalized[i].subsumed.atomic_name() else {
                continue;
            };
            let reverse = (0..normalized.len()).find(|&j| {
                j != i
                    && !consumed[j]
                    && normalized[j].degree >= 1.0
                    && normalized[j].subsumed == normalized[i].subsumer
                    && normalized[j].subsumer == normalized[i].subsumed
            });
            let Some(j) = reverse else {
                continue;
            };
            match normalized[i].subsumer.atomic_name() {
                Some(b) => {
                    if self.insert_synonym(a, b) {
                        report.synonyms += 1;
                    }
                }
                None => {
                    if self.definitions.contains_key(a) {
                        continue;
                    }
                    if self.insert_definition(a, normalized[i].subsumer.clone()) {
                        report.definitions += 1;
                    }
                }
            }
            consumed[i] = true;
            consumed[j] = true;
        }
    }

    fn absorb_one(&mut self, gci: GeneralConceptInclusion, logic: FuzzyLogic, report: &mut AbsorptionReport) -> Result<()> {
        if gci.subsumed.is_top() && gci.subsumer.is_bottom() && gci.degree > 0.0 {
            return Err(ReasonerError::InconsistentOntology(format!("{gci} makes the top concept empty")));
        }
        if gci.degree <= 0.0 || gci.subsumed.is_bottom() || gci.subsumer.is_top() || gci.subsumed == gci.subsumer {
            trace!(axiom = %gci, "dropping trivial axiom");
            return Ok(());
        }

        // A ⊑ D
        if let Some(a) = gci.subsumed.atomic_name() {
            let axiom = PrimitiveConceptDefinition::new(a, gci.subsumer.clone(), gci.implication, gci.degree);
            if self.insert_inclusion(axiom) {
                report.inclusions += 1;
            }
            return Ok(());
        }

        // C ⊑ ¬A  =>  A ⊑ ¬C
        if let Some(a) = gci.subsumer.complemented_atomic_name() {
            if matches!(
                gci.implication,
                ImplicationKind::Lukasiewicz | ImplicationKind::KleeneDienes | ImplicationKind::Zadeh
            ) {
                let axiom =
                    PrimitiveConceptDefinition::new(a, gci.subsumed.complement(), gci.implication, gci.degree);
                if self.insert_inclusion(axiom) {
                    report.inclusions += 1;
                }
                return Ok(());
            }
        }

        // (A ⊓ C) ⊑ D
        if let Concept::And { kind, operands } = &gci.subsumed {
            if let Some(position) = operands.iter().position(|c| c.atomic_name().is_some()) {
                let resolved = kind.resolve(logic);
                let rest: Vec<Concept> = operands
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != position)
                    .map(|(_, c)| c.clone())
                    .collect();
                let rest = Concept::and(*kind, rest);
                let head = operands[position].atomic_name().map(str::to_string);
                let rewritten = match (gci.implication, resolved) {
                    (ImplicationKind::Lukasiewicz, ConnectiveKind::Lukasiewicz) => Some(Concept::or(
                        ConnectiveKind::Lukasiewicz,
                        vec![rest.complement(), gci.subsumer.clone()],
                    )),
                    (ImplicationKind::Goedel, ConnectiveKind::Goedel) => {
                        Some(Concept::implies(ImplicationKind::Goedel, rest, gci.subsumer.clone()))
                    }
                    (ImplicationKind::KleeneDienes, ConnectiveKind::Goedel | ConnectiveKind::Default) => Some(
                        Concept::or(ConnectiveKind::Goedel, vec![rest.complement(), gci.subsumer.clone()]),
                    ),
                    (ImplicationKind::Lukasiewicz, ConnectiveKind::Default) => Some(Concept::or(
                        ConnectiveKind::Lukasiewicz,
                        vec![rest.complement(), gci.subsumer.clone()],
                    )),
                    _ => None,
                };
                if let (Some(head), Some(definition)) = (head, rewritten) {
                    let axiom = PrimitiveConceptDefinition::new(head, definition, gci.implication, gci.degree);
                    if self.insert_inclusion(axiom) {
                        report.inclusions += 1;
                    }
                    return Ok(());
                }
            }
        }

        // C ⊑ (D ⊔ ¬A)  =>  A ⊑ (¬C ⊔ D)
        if let Concept::Or { kind, operands } = &gci.subsumer {
            if let Some(position) = operands.iter().position(|c| c.complemented_atomic_name().is_some()) {
                let resolved = kind.resolve(logic);
                let matching = matches!(
                    (gci.implication, resolved),
                    (ImplicationKind::Lukasiewicz, ConnectiveKind::Lukasiewicz)
                        | (ImplicationKind::Lukasiewicz, ConnectiveKind::Default)
                        | (ImplicationKind::KleeneDienes, ConnectiveKind::Goedel)
                );
                if matching {
                    let head = operands[position].complemented_atomic_name().map(str::to_string);
                    let mut rest: Vec<Concept> = vec![gci.subsumed.complement()];
                    rest.extend(
                        operands
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != position)
                            .map(|(_, c)| c.clone()),
                    );
                    if let Some(head) = head {
                        let axiom = PrimitiveConceptDefinition::new(
                            head,
                            Concept::or(*kind, rest),
                            gci.implication,
                            gci.degree,
                        );
                        if self.insert_inclusion(axiom) {
                            report.inclusions += 1;
                        }
                        return Ok(());
                    }
                }
            }
        }

        // ∃R.⊤ ⊑ D  =>  domain(R, D)
        if let Concept::Exists { role, filler } = &gci.subsumed {
            if filler.is_top() && matches!(gci.implication, ImplicationKind::Lukasiewicz | ImplicationKind::Goedel) {
                let restriction = RoleRestriction {
                    concept: gci.subsumer.clone(),
                    degree: gci.degree,
                    implication: gci.implication,
                };
                if self.insert_role_restriction(true, role, restriction) {
                    report.role_restrictions += 1;
                }
                return Ok(());
            }
        }

        // ⊤ ⊑ ∀R.D  =>  range(R, D)
        if gci.subsumed.is_top() {
            let subsumer = match &gci.subsumer {
                Concept::Not(inner) if matches!(**inner, Concept::Exists { .. }) => inner.complement(),
                other => other.clone(),
            };
            if let (Concept::ForAll { role, filler }, Some(implication)) = (&subsumer, universal_implication(logic)) {
                if gci.implication == ImplicationKind::Lukasiewicz {
                    let restriction = RoleRestriction {
                        concept: (**filler).clone(),
                        degree: gci.degree,
                        implication,
                    };
                    if self.insert_role_restriction(false, role, restriction) {
                        report.role_restrictions += 1;
                    }
                    return Ok(());
                }
            }
        }

        if self.absorbed_keys.insert(format!("goal {}", gci.key())) {
            trace!(axiom = %gci, "kept as goal");
            self.goals.push(gci);
            report.goals += 1;
        }
        Ok(())
    }

    fn insert_synonym(&mut self, a: &str, b: &str) -> bool {
        let fresh = self.synonyms.entry(a.to_string()).or_default().insert(b.to_string());
        self.synonyms.entry(b.to_string()).or_default().insert(a.to_string());
        fresh
    }

    fn insert_definition(&mut self, name: &str, concept: Concept) -> bool {
        if !self.absorbed_keys.insert(format!("define {name} {concept}")) {
            return false;
        }
        self.definitions.entry(name.to_string()).or_default().push(concept);
        true
    }

    fn insert_inclusion(&mut self, axiom: PrimitiveConceptDefinition) -> bool {
        if !self.absorbed_keys.insert(format!("include {}", axiom.key())) {
            return false;
        }
        self.inclusions.entry(axiom.defined.clone()).or_default().push(axiom);
        true
    }

    fn insert_role_restriction(&mut self, domain: bool, role: &str, restriction: RoleRestriction) -> bool {
        let key = format!(
            "{} {role} {} {} {}",
            if domain { "domain" } else { "range" },
            restriction.concept,
            restriction.degree,
            restriction.implication.keyword()
        );
        if !self.absorbed_keys.insert(key) {
            return false;
        }
        let map = if domain { &mut self.domains } else { &mut self.ranges };
        map.entry(role.to_string()).or_default().push(restriction);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str) -> Concept {
        Concept::atomic(name)
    }

    #[test]
    fn test_fast_path_copies_definitions() {
        let mut tbox = TBox::new();
        tbox.add_definition("Parent", Concept::exists("hasChild", Concept::Top));
        tbox.add_primitive(PrimitiveConceptDefinition::new(
            "Father",
            atom("Parent"),
            ImplicationKind::Lukasiewicz,
            1.0,
        ));
        let report = tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert!(report.fast_path);
        assert_eq!(tbox.definitions("Parent").len(), 1);
        assert_eq!(tbox.inclusions("Father").len(), 1);
        assert!(tbox.goals().is_empty());
    }

    #[test]
    fn test_conjunctive_subsumer_is_split_under_goedel() {
        let mut tbox = TBox::new();
        tbox.add_gci(GeneralConceptInclusion::new(
            atom("A"),
            Concept::and(ConnectiveKind::Default, vec![atom("B"), atom("C")]),
            0.8,
            ImplicationKind::Goedel,
        ));
        tbox.absorb(FuzzyLogic::Goedel).unwrap();
        let heads: Vec<String> = tbox.inclusions("A").iter().map(|p| p.definition.to_string()).collect();
        assert_eq!(heads, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_lukasiewicz_conjunction_is_not_split() {
        let mut tbox = TBox::new();
        tbox.add_gci(GeneralConceptInclusion::new(
            atom("A"),
            Concept::and(ConnectiveKind::Default, vec![atom("B"), atom("C")]),
            1.0,
            ImplicationKind::Lukasiewicz,
        ));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert_eq!(tbox.inclusions("A").len(), 1);
        assert_eq!(tbox.inclusions("A")[0].definition.to_string(), "(and B C)");
    }

    #[test]
    fn test_contraposition() {
        let mut tbox = TBox::new();
        tbox.add_gci(crisp_inclusion(
            Concept::exists("R", atom("B")),
            Concept::Not(Box::new(atom("A"))),
        ));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert_eq!(tbox.inclusions("A")[0].definition.to_string(), "(all R (not B))");
    }

    #[test]
    fn test_conjunction_absorption() {
        let mut tbox = TBox::new();
        tbox.add_gci(crisp_inclusion(
            Concept::and(ConnectiveKind::Default, vec![atom("A"), Concept::exists("R", atom("B"))]),
            atom("D"),
        ));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert_eq!(
            tbox.inclusions("A")[0].definition.to_string(),
            "(l-or (all R (not B)) D)"
        );
        assert!(tbox.goals().is_empty());
    }

    #[test]
    fn test_kleene_dienes_conjunction_absorption() {
        let mut tbox = TBox::new();
        tbox.add_gci(GeneralConceptInclusion::new(
            Concept::and(ConnectiveKind::Goedel, vec![atom("A"), Concept::exists("R", atom("B"))]),
            atom("D"),
            0.8,
            ImplicationKind::KleeneDienes,
        ));
        let report = tbox.absorb(FuzzyLogic::Zadeh).unwrap();
        assert_eq!(report.inclusions, 1);
        let inclusion = &tbox.inclusions("A")[0];
        assert_eq!(inclusion.definition.to_string(), "(g-or (all R (not B)) D)");
        assert_eq!(inclusion.implication, ImplicationKind::KleeneDienes);
        assert_eq!(inclusion.degree, 0.8);
        assert!(tbox.goals().is_empty());
    }

    #[test]
    fn test_kleene_dienes_disjunction_absorption() {
        let mut tbox = TBox::new();
        tbox.add_gci(GeneralConceptInclusion::new(
            Concept::exists("R", atom("B")),
            Concept::or(ConnectiveKind::Goedel, vec![atom("D"), Concept::not(atom("A"))]),
            0.7,
            ImplicationKind::KleeneDienes,
        ));
        tbox.absorb(FuzzyLogic::Zadeh).unwrap();
        let inclusion = &tbox.inclusions("A")[0];
        assert_eq!(inclusion.definition.to_string(), "(g-or (all R (not B)) D)");
        assert_eq!(inclusion.implication, ImplicationKind::KleeneDienes);
        assert!(tbox.goals().is_empty());
    }

    #[test]
    fn test_kleene_dienes_with_lukasiewicz_connective_stays_a_goal() {
        let mut tbox = TBox::new();
        tbox.add_gci(GeneralConceptInclusion::new(
            Concept::and(ConnectiveKind::Lukasiewicz, vec![atom("A"), Concept::exists("R", atom("B"))]),
            atom("D"),
            0.8,
            ImplicationKind::KleeneDienes,
        ));
        tbox.absorb(FuzzyLogic::Zadeh).unwrap();
        assert!(tbox.inclusions("A").is_empty());
        assert_eq!(tbox.goals().len(), 1);
    }

    #[test]
    fn test_role_absorption() {
        let mut tbox = TBox::new();
        tbox.add_gci(crisp_inclusion(Concept::exists("teaches", Concept::Top), atom("Teacher")));
        tbox.add_gci(crisp_inclusion(Concept::Top, Concept::for_all("teaches", atom("Course"))));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert_eq!(tbox.domains("teaches")[0].concept, atom("Teacher"));
        assert_eq!(tbox.ranges("teaches")[0].concept, atom("Course"));
    }

    #[test]
    fn test_synonyms_and_definitions() {
        let mut tbox = TBox::new();
        tbox.add_equivalence(ConceptEquivalence::new(atom("Human"), atom("Person")));
        tbox.add_gci(crisp_inclusion(atom("Car"), Concept::exists("has", atom("Wheel"))));
        tbox.add_gci(crisp_inclusion(Concept::exists("has", atom("Wheel")), atom("Car")));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert!(tbox.synonyms("Human").unwrap().contains("Person"));
        assert_eq!(tbox.definitions("Car").len(), 1);
        assert!(tbox.goals().is_empty());
    }

    #[test]
    fn test_unabsorbable_axiom_becomes_goal() {
        let mut tbox = TBox::new();
        tbox.add_gci(crisp_inclusion(Concept::exists("R", atom("A")), Concept::exists("S", atom("B"))));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert_eq!(tbox.goals().len(), 1);
        assert_eq!(tbox.goals()[0].as_goal().to_string(), "(l-implies (some R A) (some S B))");
    }

    #[test]
    fn test_top_below_bottom_is_inconsistent() {
        let mut tbox = TBox::new();
        tbox.add_gci(crisp_inclusion(Concept::Top, Concept::Bottom));
        assert!(matches!(
            tbox.absorb(FuzzyLogic::Zadeh),
            Err(ReasonerError::InconsistentOntology(_))
        ));
    }

    #[test]
    fn test_absorption_is_idempotent() {
        let mut tbox = TBox::new();
        tbox.add_gci(crisp_inclusion(
            Concept::and(ConnectiveKind::Default, vec![atom("A"), atom("B")]),
            atom("C"),
        ));
        tbox.add_gci(crisp_inclusion(Concept::exists("R", atom("A")), Concept::exists("S", atom("B"))));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        let inclusions = tbox.inclusions.clone();
        let goals = tbox.goals.clone();
        let report = tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert_eq!(report.inclusions + report.goals + report.definitions + report.synonyms, 0);
        assert_eq!(tbox.inclusions, inclusions);
        assert_eq!(tbox.goals, goals);
    }

    #[test]
    fn test_cycle_detection() {
        let mut tbox = TBox::new();
        tbox.add_primitive(PrimitiveConceptDefinition::new(
            "Node",
            Concept::exists("next", atom("Node")),
            ImplicationKind::Lukasiewicz,
            1.0,
        ));
        tbox.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert!(tbox.has_cycles());

        let mut acyclic = TBox::new();
        acyclic.add_equivalence(ConceptEquivalence::new(atom("Human"), atom("Person")));
        acyclic.absorb(FuzzyLogic::Lukasiewicz).unwrap();
        assert!(!acyclic.has_cycles());
    }
}
