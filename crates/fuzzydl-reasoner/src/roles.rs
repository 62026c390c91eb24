//! Role hierarchy: inclusion closure, inverses and role properties

use fuzzydl_model::FuzzyLogic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Axioms known about one role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleInfo {
    /// 直接の親ロールと包含度
    pub parents: BTreeMap<String, f64>,
    /// 推移的閉包: 祖先ロールと全経路上の最大包含度
    pub ancestors: BTreeMap<String, f64>,
    pub inverses: BTreeSet<String>,
    pub transitive: bool,
    pub reflexive: bool,
    pub symmetric: bool,
    pub functional: bool,
    pub inverse_functional: bool,
    /// Concrete feature rather than abstract role
    pub concrete: bool,
}

/// Role hierarchy of a knowledge base
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleHierarchy {
    roles: BTreeMap<String, RoleInfo>,
    /// 推移的な下位ロール: 親ロール -> 推移的な子孫ロール
    transitive_subroles: BTreeMap<String, BTreeSet<String>>,
}

/// Name of the functional inverse that stands in for an inverse-functional role
pub fn inverse_functional_name(role: &str) -> String {
    format!("{role}^-")
}

impl RoleHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, role: &str) -> Option<&RoleInfo> {
        self.roles.get(role)
    }

    pub fn info_mut(&mut self, role: &str) -> &mut RoleInfo {
        self.roles.entry(role.to_string()).or_default()
    }

    pub fn roles(&self) -> impl Iterator<Item = (&String, &RoleInfo)> {
        self.roles.iter()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    /// Records `child ⊑ parent` with a degree, keeping the larger degree
    pub fn add_inclusion(&mut self, child: &str, parent: &str, degree: f64) {
        self.info_mut(parent);
        let entry = self.info_mut(child).parents.entry(parent.to_string()).or_insert(0.0);
        if degree > *entry {
            *entry = degree;
        }
    }

    pub fn add_inverse(&mut self, role: &str, inverse: &str) {
        self.info_mut(role).inverses.insert(inverse.to_string());
        self.info_mut(inverse).inverses.insert(role.to_string());
    }

    pub fn is_transitive(&self, role: &str) -> bool {
        self.roles.get(role).map_or(false, |r| r.transitive)
    }

    pub fn is_functional(&self, role: &str) -> bool {
        self.roles.get(role).map_or(false, |r| r.functional)
    }

    pub fn is_reflexive(&self, role: &str) -> bool {
        self.roles.get(role).map_or(false, |r| r.reflexive)
    }

    pub fn is_concrete(&self, role: &str) -> bool {
        self.roles.get(role).map_or(false, |r| r.concrete)
    }

    pub fn inverses(&self, role: &str) -> Vec<String> {
        self.roles
            .get(role)
            .map(|r| r.inverses.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_inverse_roles(&self) -> bool {
        self.roles.values().any(|r| !r.inverses.is_empty())
    }

    pub fn has_reflexive_roles(&self) -> bool {
        self.roles.values().any(|r| r.reflexive)
    }

    /// Degree of `role ⊑ ancestor` after closure: 1 for the role itself,
    /// 0 for unrelated roles
    pub fn inclusion_degree(&self, role: &str, ancestor: &str) -> f64 {
        if role == ancestor {
            return 1.0;
        }
        self.roles
            .get(role)
            .and_then(|r| r.ancestors.get(ancestor))
            .copied()
            .unwrap_or(0.0)
    }

    /// Strict ancestors of a role with their inclusion degrees
    pub fn ancestors(&self, role: &str) -> Vec<(String, f64)> {
        self.roles
            .get(role)
            .map(|r| r.ancestors.iter().map(|(p, d)| (p.clone(), *d)).collect())
            .unwrap_or_default()
    }

    /// Transitive roles included in `role` (the role itself when transitive)
    pub fn transitive_subroles(&self, role: &str) -> BTreeSet<String> {
        self.transitive_subroles.get(role).cloned().unwrap_or_default()
    }

    /// Closes the hierarchy: inverse propagation, transitivity of inverses,
    /// then the ancestor closure with maximal degrees. Path degrees compose
    /// with the t-norm of `logic`.
    pub fn close(&mut self, logic: FuzzyLogic) {
        self.propagate_transitivity_to_inverses();
        self.propagate_inverses();

        let names: Vec<String> = self.roles.keys().cloned().collect();
        for name in &names {
            let mut ancestors = BTreeMap::new();
            self.visit_parents(logic, name, name, 1.0, &mut ancestors);
            ancestors.remove(name);
            if let Some(info) = self.roles.get_mut(name) {
                for (ancestor, degree) in ancestors {
                    let entry = info.ancestors.entry(ancestor).or_insert(0.0);
                    if degree > *entry {
                        *entry = degree;
                    }
                }
            }
        }

        self.transitive_subroles.clear();
        for name in &names {
            if !self.is_transitive(name) {
                continue;
            }
            self.transitive_subroles
                .entry(name.clone())
                .or_default()
                .insert(name.clone());
            for (ancestor, _) in self.ancestors(name) {
                self.transitive_subroles
                    .entry(ancestor)
                    .or_default()
                    .insert(name.clone());
            }
        }
        debug!(roles = names.len(), %logic, "role hierarchy closed");
    }

    /// Recursion stops as soon as a proposed degree does not improve the
    /// recorded one.
    fn visit_parents(
        &self,
        logic: FuzzyLogic,
        start: &str,
        current: &str,
        degree: f64,
        ancestors: &mut BTreeMap<String, f64>,
    ) {
        let Some(info) = self.roles.get(current) else {
            return;
        };
        for (parent, inclusion) in &info.parents {
            let proposed = if degree >= 1.0 {
                *inclusion
            } else {
                logic.t_norm(degree, *inclusion)
            };
            if parent == start {
                continue;
            }
            let recorded = ancestors.get(parent).copied().unwrap_or(0.0);
            if proposed > recorded {
                ancestors.insert(parent.clone(), proposed);
                self.visit_parents(logic, start, parent, proposed, ancestors);
            }
        }
    }

    /// `R ⊑ S` implies `R⁻ ⊑ S⁻`, iterated to a fixpoint
    pub fn propagate_inverses(&mut self) {
        loop {
            let mut additions = Vec::new();
            for (role, info) in &self.roles {
                for (parent, degree) in &info.parents {
                    let Some(parent_info) = self.roles.get(parent) else {
                        continue;
                    };
                    for inverse in &info.inverses {
                        for parent_inverse in &parent_info.inverses {
                            if inverse == role && parent_inverse == parent {
                                continue;
                            }
                            let known = self
                                .roles
                                .get(inverse)
                                .and_then(|r| r.parents.get(parent_inverse))
                                .copied()
                                .unwrap_or(0.0);
                            if *degree > known {
                                additions.push((inverse.clone(), parent_inverse.clone(), *degree));
                            }
                        }
                    }
                }
            }
            if additions.is_empty() {
                break;
            }
            for (child, parent, degree) in additions {
                self.add_inclusion(&child, &parent, degree);
            }
        }
    }

    /// An inverse of a transitive role is transitive
    pub fn propagate_transitivity_to_inverses(&mut self) {
        let transitive: Vec<String> = self
            .roles
            .iter()
            .filter(|(_, r)| r.transitive)
            .map(|(name, _)| name.clone())
            .collect();
        for role in transitive {
            for inverse in self.inverses(&role) {
                self.info_mut(&inverse).transitive = true;
            }
        }
    }
}
