//! ブロッキング
//!
//! 生成個体ごとに直接ブロックと間接ブロックの状態
//! (`Unchecked` / `Blocked` / `NotBlocked`) をキャッシュします。
//! 直接ブロックされた個体の子孫は即座に間接ブロックされます。

use fuzzydl_model::FuzzyLogic;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::config::BlockingType;
use crate::individuals::{BlockingStatus, IndividualId, IndividualKind};
use crate::kb::KnowledgeBase;

/// Whether the label `node` is matched by the label `candidate`: inclusion
/// for subset strategies, equality otherwise
pub fn label_matches<V>(node: &BTreeMap<String, V>, candidate: &BTreeMap<String, V>, subset: bool) -> bool {
    if subset {
        node.keys().all(|k| candidate.contains_key(k))
    } else {
        node.len() == candidate.len() && node.keys().all(|k| candidate.contains_key(k))
    }
}

impl KnowledgeBase {
    /// Chooses the blocking strategy and whether blocking is dynamic
    pub(crate) fn select_blocking(&self) -> (BlockingType, bool) {
        let inverses = self.roles.has_inverse_roles();
        let dynamic = inverses || self.tbox.has_domain_or_range();
        if let Some(blocking) = self.config.blocking {
            return (blocking, dynamic);
        }

        let finite = self.tbox.goals().is_empty()
            && !self.tbox.has_cycles()
            && !inverses
            && !self.roles.has_reflexive_roles()
            && !self.tbox.has_domain_or_range();
        if finite {
            return (BlockingType::NoBlocking, dynamic);
        }

        let base = if inverses {
            BlockingType::Double
        } else if self.config.logic == FuzzyLogic::Lukasiewicz {
            BlockingType::Set
        } else {
            BlockingType::Subset
        };
        let blocking = if self.config.anywhere_blocking {
            base.anywhere()
        } else {
            base
        };
        (blocking, dynamic)
    }

    fn blockable(&self, x: IndividualId) -> bool {
        let individual = self.store.get(x);
        self.blocking != BlockingType::NoBlocking
            && individual.kind == IndividualKind::Created
            && !individual.is_pruned()
    }

    pub(crate) fn is_blocked(&mut self, x: IndividualId) -> bool {
        self.is_directly_blocked(x) || self.is_indirectly_blocked(x)
    }

    pub(crate) fn is_directly_blocked(&mut self, x: IndividualId) -> bool {
        if !self.blockable(x) || self.store.get(x).depth < self.blocking.min_depth() {
            return false;
        }
        let status = self.store.get(x).direct_blocking;
        match status {
            BlockingStatus::Blocked => true,
            BlockingStatus::NotBlocked => false,
            BlockingStatus::Unchecked => match self.find_blocker(x) {
                Some(blocker) => {
                    self.mark_blocked(x, blocker);
                    true
                }
                None => {
                    self.store.get_mut(x).direct_blocking = BlockingStatus::NotBlocked;
                    false
                }
            },
        }
    }

    pub(crate) fn is_indirectly_blocked(&mut self, x: IndividualId) -> bool {
        if !self.blockable(x) {
            return false;
        }
        let status = self.store.get(x).indirect_blocking;
        match status {
            BlockingStatus::Blocked => true,
            BlockingStatus::NotBlocked => false,
            BlockingStatus::Unchecked => {
                let mut blocked = false;
                for ancestor in self.store.ancestors(x) {
                    if self.is_directly_blocked(ancestor) {
                        blocked = true;
                        break;
                    }
                }
                self.store.get_mut(x).indirect_blocking = if blocked {
                    BlockingStatus::Blocked
                } else {
                    BlockingStatus::NotBlocked
                };
                blocked
            }
        }
    }

    /// Candidate blockers of `x`, nearest ancestors first or in creation order
    fn blocking_candidates(&self, x: IndividualId) -> Vec<IndividualId> {
        if !self.blocking.is_anywhere() {
            return self.store.ancestors(x);
        }
        let node = self.store.get(x);
        let earlier = |y: &IndividualId| *y < x && !self.store.get(*y).is_pruned();
        if self.blocking.is_pairwise() {
            let Some((_, role)) = &node.parent else {
                return Vec::new();
            };
            return self
                .store
                .successors_with_role(role)
                .iter()
                .copied()
                .filter(earlier)
                .collect();
        }
        // Every label of x is in the label of a subset or set blocker.
        match node.labels.keys().next() {
            Some(key) => self
                .store
                .with_concept(key)
                .map(|holders| holders.iter().copied().filter(earlier).collect())
                .unwrap_or_default(),
            None => self.store.live_ids().into_iter().filter(earlier).collect(),
        }
    }

    fn find_blocker(&mut self, x: IndividualId) -> Option<IndividualId> {
        let subset = self.blocking.is_subset();
        for y in self.blocking_candidates(x) {
            if y == x || self.store.get(y).kind != IndividualKind::Created {
                continue;
            }
            if self.blocking.is_anywhere() && self.store.ancestors(y).contains(&x) {
                continue;
            }
            let matched = if self.blocking.is_pairwise() {
                self.pairwise_match(x, y)
            } else {
                label_matches(&self.store.get(x).labels, &self.store.get(y).labels, subset)
            };
            if !matched {
                continue;
            }
            // An anywhere blocker must not be blocked itself.
            if self.blocking.is_anywhere() && self.is_blocked(y) {
                continue;
            }
            return Some(y);
        }
        None
    }

    /// Node and parent of `x` match `y` and its parent on the same incoming role
    fn pairwise_match(&self, x: IndividualId, y: IndividualId) -> bool {
        let (Some((px, rx)), Some((py, ry))) = (&self.store.get(x).parent, &self.store.get(y).parent) else {
            return false;
        };
        rx == ry
            && label_matches(&self.store.get(x).labels, &self.store.get(y).labels, false)
            && label_matches(&self.store.get(*px).labels, &self.store.get(*py).labels, false)
    }

    fn mark_blocked(&mut self, x: IndividualId, blocker: IndividualId) {
        debug!(individual = %x, %blocker, strategy = %self.blocking, "individual directly blocked");
        let node = self.store.get_mut(x);
        node.direct_blocking = BlockingStatus::Blocked;
        node.blocker = Some(blocker);

        let mut watched = vec![blocker];
        if self.blocking.is_pairwise() {
            watched.extend(self.store.get(blocker).parent.as_ref().map(|(p, _)| *p));
            watched.extend(self.store.get(x).parent.as_ref().map(|(p, _)| *p));
        }
        for w in watched {
            let links = &mut self.store.get_mut(w).blocking_links;
            if !links.contains(&x) {
                links.push(x);
            }
            let watched_by = &mut self.store.get_mut(x).watched_by;
            if !watched_by.contains(&w) {
                watched_by.push(w);
            }
        }

        for descendant in self.store.descendants(x) {
            self.store.get_mut(descendant).indirect_blocking = BlockingStatus::Blocked;
        }
    }

    /// Invalidates blocking verdicts that depended on the label of `x`
    pub(crate) fn on_label_added(&mut self, x: IndividualId) {
        if self.blocking == BlockingType::NoBlocking {
            return;
        }
        let status = self.store.get(x).direct_blocking;
        match status {
            BlockingStatus::Blocked => self.unblock(x),
            BlockingStatus::NotBlocked => self.store.get_mut(x).direct_blocking = BlockingStatus::Unchecked,
            BlockingStatus::Unchecked => {}
        }

        // Growing a blocker keeps a subset match valid
        if !self.dynamic_blocking && self.blocking.is_subset() {
            return;
        }
        let links = std::mem::take(&mut self.store.get_mut(x).blocking_links);
        for dependent in links {
            if self.store.get(dependent).direct_blocking == BlockingStatus::Blocked {
                self.unblock(dependent);
            }
        }
    }

    /// Resets the verdicts of `x` and its descendants and requeues whatever
    /// was deferred while they were blocked
    pub(crate) fn unblock(&mut self, x: IndividualId) {
        trace!(individual = %x, "unblocking");
        let node = self.store.get_mut(x);
        node.direct_blocking = BlockingStatus::Unchecked;
        node.blocker = None;
        let watchers = std::mem::take(&mut node.watched_by);
        for w in watchers {
            self.store.get_mut(w).blocking_links.retain(|d| *d != x);
        }
        self.requeue_deferred(x);

        for descendant in self.store.descendants(x) {
            self.store.get_mut(descendant).indirect_blocking = BlockingStatus::Unchecked;
            self.requeue_deferred(descendant);
        }
    }

    pub(crate) fn requeue_deferred(&mut self, x: IndividualId) {
        let node = self.store.get_mut(x);
        let assertions = std::mem::take(&mut node.blocked_assertions);
        let existentials = std::mem::take(&mut node.blocked_existentials);
        self.assertions.extend(assertions);
        self.existentials.extend(existentials);
    }
}
