//! 個体とロール関係のアリーナ
//!
//! 個体は安定した整数 ID で参照されます。マージされた個体は
//! `merged_into` で転送先を指し、`resolve` で正規の ID に変換されます。

use fuzzydl_milp::VarId;
use fuzzydl_model::{Concept, DatatypeRestriction, Degree};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::trace;

/// Stable arena index of an individual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndividualId(pub usize);

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndividualKind {
    /// Declared by the user
    Named,
    /// Generated by the expansion of an existential restriction
    Created,
    /// Holds the value of a concrete feature
    Concrete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingStatus {
    #[default]
    Unchecked,
    Blocked,
    NotBlocked,
}

/// `individual : concept >= degree`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub individual: IndividualId,
    pub concept: Concept,
    pub degree: Degree,
}

impl Assertion {
    pub fn new(individual: IndividualId, concept: Concept, degree: Degree) -> Self {
        Self {
            individual,
            concept,
            degree,
        }
    }
}

/// `(subject, object) : role`, with the MILP variable holding its degree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub subject: IndividualId,
    pub role: String,
    pub object: IndividualId,
    /// Strongest numeric lower bound asserted so far
    pub degree: Degree,
    pub variable: VarId,
}

/// What a stored restriction requires of the objects of a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RestrictionFiller {
    /// ∀R.C
    Concept(Concept),
    /// ¬∃R.{a}, and ¬∃R.Self when `a` is the subject itself
    NotIndividual(IndividualId),
}

/// Restriction applied to every present and future relation of a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversalRestriction {
    pub role: String,
    pub filler: RestrictionFiller,
    /// Degree variable of the restriction assertion
    pub variable: VarId,
}

/// 完成フォレストの節点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,
    pub name: String,
    pub kind: IndividualKind,
    /// 生成元の個体と入力ロール
    pub parent: Option<(IndividualId, String)>,
    pub depth: usize,
    /// 展開済みの概念 (正準文字列 -> 概念)
    pub labels: BTreeMap<String, Concept>,
    /// ロール -> 後続個体
    pub successors: BTreeMap<String, BTreeSet<IndividualId>>,
    /// (主語, ロール) of every incoming relation
    pub predecessors: BTreeSet<(IndividualId, String)>,
    pub children: SmallVec<[IndividualId; 4]>,
    pub direct_blocking: BlockingStatus,
    pub indirect_blocking: BlockingStatus,
    pub blocker: Option<IndividualId>,
    /// Individuals whose blocking verdict depends on this one's label
    pub blocking_links: Vec<IndividualId>,
    /// Individuals holding this one in their `blocking_links`
    pub watched_by: SmallVec<[IndividualId; 3]>,
    pub merged_into: Option<IndividualId>,
    pub restrictions: Vec<UniversalRestriction>,
    /// 具体個体の値を表す MILP 変数
    pub value: Option<VarId>,
    /// 特徴 -> 具体個体
    pub features: BTreeMap<String, IndividualId>,
    pub negative_datatypes: Vec<(DatatypeRestriction, VarId)>,
    pub blocked_assertions: Vec<Assertion>,
    pub blocked_existentials: Vec<Assertion>,
    /// Number of terminology goals already asserted on this individual
    pub goals_applied: usize,
    /// Reflexive roles applied
    pub initialised: bool,
}

impl Individual {
    fn new(id: IndividualId, name: String, kind: IndividualKind) -> Self {
        Self {
            id,
            name,
            kind,
            parent: None,
            depth: 0,
            labels: BTreeMap::new(),
            successors: BTreeMap::new(),
            predecessors: BTreeSet::new(),
            children: SmallVec::new(),
            direct_blocking: BlockingStatus::Unchecked,
            indirect_blocking: BlockingStatus::Unchecked,
            blocker: None,
            blocking_links: Vec::new(),
            watched_by: SmallVec::new(),
            merged_into: None,
            restrictions: Vec::new(),
            value: None,
            features: BTreeMap::new(),
            negative_datatypes: Vec::new(),
            blocked_assertions: Vec::new(),
            blocked_existentials: Vec::new(),
            goals_applied: 0,
            initialised: false,
        }
    }

    pub fn is_named(&self) -> bool {
        self.kind == IndividualKind::Named
    }

    pub fn is_created(&self) -> bool {
        self.kind == IndividualKind::Created
    }

    pub fn is_concrete(&self) -> bool {
        self.kind == IndividualKind::Concrete
    }

    /// Merged into another individual and no longer part of the forest
    pub fn is_pruned(&self) -> bool {
        self.merged_into.is_some()
    }
}

type RelationKey = (IndividualId, String, IndividualId);

/// Arena of individuals and the relations between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndividualStore {
    individuals: Vec<Individual>,
    by_name: HashMap<String, IndividualId>,
    /// 概念 -> その概念をラベルに持つ個体 (anywhere ブロッキング用)
    by_concept: HashMap<String, BTreeSet<IndividualId>>,
    /// ロール -> そのロールで生成された個体 (生成順)
    successors_by_role: BTreeMap<String, Vec<IndividualId>>,
    relations: BTreeMap<RelationKey, Relation>,
    created: usize,
    fresh: usize,
}

impl IndividualStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn get(&self, id: IndividualId) -> &Individual {
        &self.individuals[id.0]
    }

    pub fn get_mut(&mut self, id: IndividualId) -> &mut Individual {
        &mut self.individuals[id.0]
    }

    /// Follows merge forwarding to the canonical individual
    pub fn resolve(&self, mut id: IndividualId) -> IndividualId {
        while let Some(target) = self.individuals[id.0].merged_into {
            id = target;
        }
        id
    }

    pub fn find(&self, name: &str) -> Option<IndividualId> {
        self.by_name.get(name).map(|id| self.resolve(*id))
    }

    /// Individuals still part of the forest, in creation order
    pub fn live_ids(&self) -> Vec<IndividualId> {
        self.individuals
            .iter()
            .filter(|i| !i.is_pruned())
            .map(|i| i.id)
            .collect()
    }

    /// Number of individuals generated by expansion, concrete fillers included
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Returns the named individual, creating it when needed. The flag tells
    /// whether it is new.
    pub fn add_named(&mut self, name: &str) -> (IndividualId, bool) {
        if let Some(id) = self.find(name) {
            return (id, false);
        }
        let id = IndividualId(self.individuals.len());
        self.individuals.push(Individual::new(id, name.to_string(), IndividualKind::Named));
        self.by_name.insert(name.to_string(), id);
        (id, true)
    }

    fn fresh_name(&mut self, kind: IndividualKind) -> String {
        loop {
            let prefix = if kind == IndividualKind::Concrete { "v" } else { "i" };
            let name = format!("_:{prefix}{}", self.fresh);
            self.fresh += 1;
            if !self.by_name.contains_key(&name) {
                return name;
            }
        }
    }

    /// Creates a successor of `parent` reached through `role`
    pub fn create_successor(&mut self, parent: IndividualId, role: &str, kind: IndividualKind) -> IndividualId {
        let id = IndividualId(self.individuals.len());
        let name = self.fresh_name(kind);
        let depth = self.get(parent).depth + 1;
        let mut individual = Individual::new(id, name.clone(), kind);
        individual.parent = Some((parent, role.to_string()));
        individual.depth = depth;
        self.individuals.push(individual);
        self.by_name.insert(name, id);
        self.get_mut(parent).children.push(id);
        if kind == IndividualKind::Created {
            self.successors_by_role.entry(role.to_string()).or_default().push(id);
        }
        self.created += 1;
        trace!(%id, %parent, role, depth, "created individual");
        id
    }

    /// Creates an individual outside the forest, such as a representative value
    pub fn create_detached(&mut self, kind: IndividualKind) -> IndividualId {
        let id = IndividualId(self.individuals.len());
        let name = self.fresh_name(kind);
        self.individuals.push(Individual::new(id, name.clone(), kind));
        self.by_name.insert(name, id);
        self.created += 1;
        id
    }

    /// Records an expanded concept. Returns false when it was already there.
    pub fn add_label(&mut self, id: IndividualId, concept: &Concept) -> bool {
        let key = concept.to_string();
        let labels = &mut self.get_mut(id).labels;
        if labels.contains_key(&key) {
            return false;
        }
        labels.insert(key.clone(), concept.clone());
        self.by_concept.entry(key).or_default().insert(id);
        true
    }

    pub fn has_label(&self, id: IndividualId, key: &str) -> bool {
        self.get(id).labels.contains_key(key)
    }

    pub fn with_concept(&self, key: &str) -> Option<&BTreeSet<IndividualId>> {
        self.by_concept.get(key)
    }

    pub fn successors_with_role(&self, role: &str) -> &[IndividualId] {
        self.successors_by_role.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn relation(&self, subject: IndividualId, role: &str, object: IndividualId) -> Option<&Relation> {
        self.relations.get(&(subject, role.to_string(), object))
    }

    pub fn relation_mut(&mut self, subject: IndividualId, role: &str, object: IndividualId) -> Option<&mut Relation> {
        self.relations.get_mut(&(subject, role.to_string(), object))
    }

    /// Stores a relation that does not exist yet
    pub fn insert_relation(&mut self, relation: Relation) {
        let (subject, object, role) = (relation.subject, relation.object, relation.role.clone());
        self.get_mut(subject).successors.entry(role.clone()).or_default().insert(object);
        self.get_mut(object).predecessors.insert((subject, role.clone()));
        self.relations.insert((subject, role, object), relation);
    }

    pub fn remove_relation(&mut self, subject: IndividualId, role: &str, object: IndividualId) -> Option<Relation> {
        let relation = self.relations.remove(&(subject, role.to_string(), object))?;
        if let Some(objects) = self.get_mut(subject).successors.get_mut(role) {
            objects.remove(&object);
            if objects.is_empty() {
                self.get_mut(subject).successors.remove(role);
            }
        }
        self.get_mut(object).predecessors.remove(&(subject, role.to_string()));
        Some(relation)
    }

    /// Objects related to `subject` through exactly `role`
    pub fn successors(&self, subject: IndividualId, role: &str) -> Vec<IndividualId> {
        self.get(subject)
            .successors
            .get(role)
            .map(|objects| objects.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn outgoing(&self, subject: IndividualId) -> Vec<Relation> {
        let individual = self.get(subject);
        individual
            .successors
            .iter()
            .flat_map(|(role, objects)| objects.iter().map(move |o| (role, *o)))
            .filter_map(|(role, object)| self.relation(subject, role, object).cloned())
            .collect()
    }

    pub fn incoming(&self, object: IndividualId) -> Vec<Relation> {
        self.get(object)
            .predecessors
            .iter()
            .filter_map(|(subject, role)| self.relation(*subject, role, object).cloned())
            .collect()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Strict ancestors through parent links, nearest first
    pub fn ancestors(&self, id: IndividualId) -> Vec<IndividualId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).parent.as_ref().map(|(p, _)| *p);
        while let Some(parent) = current {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = self.get(parent).parent.as_ref().map(|(p, _)| *p);
        }
        chain
    }

    /// Live descendants through child links
    pub fn descendants(&self, id: IndividualId) -> Vec<IndividualId> {
        let mut found = Vec::new();
        let mut stack: Vec<IndividualId> = self.get(id).children.iter().copied().collect();
        while let Some(child) = stack.pop() {
            if found.contains(&child) || self.get(child).is_pruned() {
                continue;
            }
            found.push(child);
            stack.extend(self.get(child).children.iter().copied());
        }
        found
    }

    /// Moves `child` under `parent`, keeping depths consistent
    pub fn reparent(&mut self, child: IndividualId, parent: IndividualId) {
        let role = self.get(child).parent.as_ref().map(|(_, r)| r.clone()).unwrap_or_default();
        if let Some((old, _)) = self.get(child).parent.clone() {
            self.get_mut(old).children.retain(|c| *c != child);
        }
        self.get_mut(child).parent = Some((parent, role));
        self.get_mut(parent).children.push(child);
        let mut stack = vec![child];
        while let Some(node) = stack.pop() {
            let depth = self
                .get(node)
                .parent
                .as_ref()
                .map(|(p, _)| self.get(*p).depth + 1)
                .unwrap_or(0);
            self.get_mut(node).depth = depth;
            stack.extend(self.get(node).children.iter().copied());
        }
    }

    /// Turns `child` into a root of the forest
    pub fn detach(&mut self, child: IndividualId) {
        if let Some((old, _)) = self.get_mut(child).parent.take() {
            self.get_mut(old).children.retain(|c| *c != child);
        }
        let mut stack = vec![(child, 0)];
        while let Some((node, depth)) = stack.pop() {
            self.get_mut(node).depth = depth;
            stack.extend(self.get(node).children.iter().map(|c| (*c, depth + 1)));
        }
    }

    /// Forwards `from` to `into` once its relations have been moved away
    pub fn mark_merged(&mut self, from: IndividualId, into: IndividualId) {
        let labels = std::mem::take(&mut self.get_mut(from).labels);
        for key in labels.keys() {
            if let Some(holders) = self.by_concept.get_mut(key) {
                holders.remove(&from);
            }
        }
        let name = self.get(from).name.clone();
        self.by_name.insert(name, into);
        let individual = self.get_mut(from);
        individual.merged_into = Some(into);
        individual.restrictions.clear();
        individual.children.clear();
        individual.features.clear();
        individual.negative_datatypes.clear();
        individual.blocker = None;
        individual.blocking_links.clear();
        individual.watched_by.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(subject: IndividualId, role: &str, object: IndividualId, var: usize) -> Relation {
        Relation {
            subject,
            role: role.to_string(),
            object,
            degree: Degree::ONE,
            variable: VarId(var),
        }
    }

    #[test]
    fn test_named_individuals_are_unique() {
        let mut store = IndividualStore::new();
        let (a, fresh) = store.add_named("alice");
        assert!(fresh);
        let (again, fresh) = store.add_named("alice");
        assert!(!fresh);
        assert_eq!(a, again);
        assert_eq!(store.find("alice"), Some(a));
    }

    #[test]
    fn test_successor_depth_and_ancestors() {
        let mut store = IndividualStore::new();
        let (root, _) = store.add_named("root");
        let child = store.create_successor(root, "R", IndividualKind::Created);
        let grandchild = store.create_successor(child, "S", IndividualKind::Created);
        assert_eq!(store.get(grandchild).depth, 2);
        assert_eq!(store.ancestors(grandchild), vec![child, root]);
        assert_eq!(store.descendants(root).len(), 2);
        assert_eq!(store.successors_with_role("S"), &[grandchild]);
        assert_eq!(store.created_count(), 2);
    }

    #[test]
    fn test_relation_bookkeeping() {
        let mut store = IndividualStore::new();
        let (a, _) = store.add_named("a");
        let (b, _) = store.add_named("b");
        store.insert_relation(relation(a, "R", b, 0));
        assert_eq!(store.successors(a, "R"), vec![b]);
        assert_eq!(store.incoming(b).len(), 1);
        assert!(store.remove_relation(a, "R", b).is_some());
        assert!(store.outgoing(a).is_empty());
        assert!(store.incoming(b).is_empty());
    }

    #[test]
    fn test_merge_forwarding() {
        let mut store = IndividualStore::new();
        let (a, _) = store.add_named("a");
        let (b, _) = store.add_named("b");
        assert!(store.add_label(b, &Concept::atomic("A")));
        assert!(!store.add_label(b, &Concept::atomic("A")));
        store.mark_merged(b, a);
        assert_eq!(store.resolve(b), a);
        assert_eq!(store.find("b"), Some(a));
        assert!(store.with_concept("A").map_or(true, |s| s.is_empty()));
        assert_eq!(store.live_ids(), vec![a]);
    }
}
