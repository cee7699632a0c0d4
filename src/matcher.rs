//! The cascading substitution engine.
//!
//! For every stated relationship marked as missing from the inferred view,
//! five matching strategies run in fixed priority order behind one interface.
//! A generic first-safe-wins driver applies the [`ReplacementPolicy`] to each
//! strategy's ordered candidate list and stops at the first acceptance; a
//! strategy can fail even with non-empty candidates when every one is
//! rejected as unsafe. When a winning replacement lands in a different group,
//! the cohesion post-pass drags the stated group's remaining marked siblings
//! into the target group, overwriting prior selections — keeping a stated
//! group together trumps individually better matches.
//!
//! The pass mutates only stated-side replacement state and returns its
//! counters as a [`MatchStats`] value; there is no ambient state.

use serde::Serialize;

use crate::graph::ViewGraph;
use crate::relationship::{Algorithm, RelId, SctId};

// ---------------------------------------------------------------------------
// Safety policy
// ---------------------------------------------------------------------------

/// Decides whether a stated relationship may safely be replaced by an
/// inferred candidate. The exact rule is an authoring-policy concern, so the
/// cascade depends only on this interface.
pub trait ReplacementPolicy {
    fn is_safe(
        &self,
        stated: &ViewGraph,
        inferred: &ViewGraph,
        rel: RelId,
        candidate: RelId,
    ) -> bool;
}

/// The shipped policy, parameterized on the hierarchy relationship type.
///
/// A candidate is rejected when, against the post-substitution shape of the
/// source concept's stated attributes, it would either duplicate another
/// edge's (type, destination, group) triple, or land in a role group that
/// already holds a different destination under the same non-hierarchy type.
/// Siblings still awaiting replacement are ignored: a duplicate that is
/// itself going to be deactivated or moved does not block.
#[derive(Debug, Clone)]
pub struct RoleGroupPolicy {
    hierarchy_type: SctId,
}

impl RoleGroupPolicy {
    pub fn new(hierarchy_type: SctId) -> Self {
        Self { hierarchy_type }
    }
}

impl Default for RoleGroupPolicy {
    fn default() -> Self {
        Self::new(SctId::IS_A)
    }
}

impl ReplacementPolicy for RoleGroupPolicy {
    fn is_safe(
        &self,
        stated: &ViewGraph,
        inferred: &ViewGraph,
        rel: RelId,
        candidate: RelId,
    ) -> bool {
        let source = stated.rel(rel).source;
        let cand = inferred.rel(candidate);
        let cand_triple = cand.triple();

        for &sibling_id in stated.attributes(source) {
            if sibling_id == rel {
                continue;
            }
            let sibling = stated.rel(sibling_id);
            // The sibling's triple as it will appear in the output feed.
            let effective = match sibling.replacement() {
                Some((target, _)) => inferred.rel(target).triple(),
                None if sibling.needs_replacement() => continue,
                None => sibling.triple(),
            };

            if effective == cand_triple {
                return false;
            }
            // Role-group exclusivity: one destination per non-hierarchy type
            // within a group.
            if cand.group != 0
                && cand.type_id != self.hierarchy_type
                && effective.2 == cand.group
                && effective.0 == cand.type_id
                && effective.1 != cand.destination
            {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate counters from one matching pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MatchStats {
    /// Edges marked as missing from the inferred view.
    pub marked: u64,
    pub alg1: u64,
    pub alg2: u64,
    pub alg3: u64,
    pub alg4: u64,
    pub alg5: u64,
    /// Algorithm 3 breakdown: exact-destination candidates examined.
    pub alg3_exact_candidates: u64,
    /// Algorithm 3 breakdown: descendant-destination candidates examined.
    pub alg3_proximate_candidates: u64,
    /// Siblings dragged into a moved group by the cohesion pass.
    pub cohesion_moves: u64,
    /// Candidates rejected by the safety policy.
    pub unsafe_skips: u64,
    /// Selections made while further candidates remained.
    pub multiple_candidate_warnings: u64,
}

impl MatchStats {
    fn record(&mut self, algorithm: Algorithm) {
        match algorithm {
            Algorithm::GroupProximateDestination => self.alg1 += 1,
            Algorithm::GroupTriples => self.alg2 += 1,
            Algorithm::CompatibleGroups => self.alg3 += 1,
            Algorithm::LooseCrossGroup => self.alg4 += 1,
            Algorithm::ProximateTypeExactDestination
            | Algorithm::ProximateTypeProximateDestination => self.alg5 += 1,
            Algorithm::GroupCohesion => self.cohesion_moves += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// The five matching strategies, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Same group, same type, equal-or-descendant destination.
    GroupProximateDestination,
    /// Any inferred group whose triples hash equals the stated group's.
    GroupTriples,
    /// Groups whose type set contains the stated group's types.
    CompatibleGroups,
    /// Same type in any group, equal-or-descendant destination.
    LooseCrossGroup,
    /// Descendant type, preferring an exact destination.
    ProximateType,
}

const CASCADE: [Strategy; 5] = [
    Strategy::GroupProximateDestination,
    Strategy::GroupTriples,
    Strategy::CompatibleGroups,
    Strategy::LooseCrossGroup,
    Strategy::ProximateType,
];

impl Strategy {
    /// Ordered candidate list for one orphaned stated relationship, each
    /// tagged with the algorithm that would claim it.
    fn candidates(
        self,
        rel: RelId,
        stated: &ViewGraph,
        inferred: &ViewGraph,
        stats: &mut MatchStats,
    ) -> Vec<(RelId, Algorithm)> {
        let r = stated.rel(rel);
        match self {
            Strategy::GroupProximateDestination => inferred
                .find_in_group(r.source, r.type_id, r.destination, r.group, true, false)
                .into_iter()
                .map(|id| (id, Algorithm::GroupProximateDestination))
                .collect(),

            Strategy::GroupTriples => {
                let hash = stated.triples_hash(r.source, r.group);
                inferred
                    .find_groups_by_hash(r.source, hash, r.type_id)
                    .into_iter()
                    .map(|id| (id, Algorithm::GroupTriples))
                    .collect()
            }

            Strategy::CompatibleGroups => {
                // All the stated group's types must at least be present in
                // the target group (more may have been added, so the triples
                // hash cannot be used). Hierarchy edges sit outside groups.
                let mut required: Vec<SctId> = stated
                    .group_members(r.source, r.group, true)
                    .into_iter()
                    .map(|id| stated.rel(id).type_id)
                    .collect();
                required.sort_unstable();
                required.dedup();

                let pool = inferred.find_groups_containing_types(r.source, &required);
                let exact: Vec<RelId> = pool
                    .iter()
                    .copied()
                    .filter(|&id| {
                        let c = inferred.rel(id);
                        c.type_id == r.type_id && c.destination == r.destination
                    })
                    .collect();
                stats.alg3_exact_candidates += exact.len() as u64;
                if !exact.is_empty() {
                    return exact
                        .into_iter()
                        .map(|id| (id, Algorithm::CompatibleGroups))
                        .collect();
                }

                let proximate: Vec<RelId> = pool
                    .into_iter()
                    .filter(|&id| {
                        let c = inferred.rel(id);
                        c.type_id == r.type_id
                            && inferred.is_descendant(c.destination, r.destination)
                    })
                    .collect();
                stats.alg3_proximate_candidates += proximate.len() as u64;
                proximate
                    .into_iter()
                    .map(|id| (id, Algorithm::CompatibleGroups))
                    .collect()
            }

            Strategy::LooseCrossGroup => inferred
                .find_by_type(r.source, r.type_id, r.destination)
                .into_iter()
                .map(|id| (id, Algorithm::LooseCrossGroup))
                .collect(),

            Strategy::ProximateType => {
                let pool = inferred.find_by_proximate_type(r.source, r.type_id);
                let mut candidates: Vec<(RelId, Algorithm)> = pool
                    .iter()
                    .copied()
                    .filter(|&id| inferred.rel(id).destination == r.destination)
                    .map(|id| (id, Algorithm::ProximateTypeExactDestination))
                    .collect();
                candidates.extend(
                    pool.into_iter()
                        .filter(|&id| {
                            inferred.is_descendant(inferred.rel(id).destination, r.destination)
                        })
                        .map(|id| (id, Algorithm::ProximateTypeProximateDestination)),
                );
                candidates
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// First pass: mark every active stated relationship whose identity key is
/// absent from the inferred view. Marking happens before any matching so a
/// duplicate that is itself about to change does not block a replacement.
pub fn mark_missing(stated: &mut ViewGraph, inferred: &ViewGraph) -> u64 {
    let mut marked = 0;
    for index in 0..stated.len() {
        let id = RelId::from_index(index);
        if !inferred.contains_identity(&stated.rel(id).identity()) {
            stated.rel_mut(id).mark_needs_replacement();
            marked += 1;
        }
    }
    marked
}

/// Second pass: run the cascade over every still-unresolved stated
/// relationship in stable (source, natural) order. Relationships already
/// replaced by an earlier group move are skipped.
pub fn run_cascade(
    stated: &mut ViewGraph,
    inferred: &ViewGraph,
    policy: &dyn ReplacementPolicy,
) -> MatchStats {
    let mut stats = MatchStats::default();
    for rel in stated.ordered_rel_ids() {
        if !stated.rel(rel).is_unresolved() {
            continue;
        }
        for strategy in CASCADE {
            let candidates = strategy.candidates(rel, stated, inferred, &mut stats);
            if attempt_replacement(stated, inferred, rel, &candidates, policy, &mut stats) {
                break;
            }
        }
    }
    stats
}

/// Walk one strategy's candidate list in order, selecting the first safe
/// candidate. Returns whether a selection was made.
fn attempt_replacement(
    stated: &mut ViewGraph,
    inferred: &ViewGraph,
    rel: RelId,
    candidates: &[(RelId, Algorithm)],
    policy: &dyn ReplacementPolicy,
    stats: &mut MatchStats,
) -> bool {
    let mut examined = 0;
    let mut chosen = None;
    for &(candidate, algorithm) in candidates {
        examined += 1;
        if policy.is_safe(stated, inferred, rel, candidate) {
            chosen = Some((candidate, algorithm));
            break;
        }
        stats.unsafe_skips += 1;
        tracing::warn!(
            stated = %stated.rel(rel).identity(),
            candidate = %inferred.rel(candidate).identity(),
            %algorithm,
            "avoided unsafe replacement candidate"
        );
    }
    let Some((candidate, algorithm)) = chosen else {
        return false;
    };

    let stated_group = stated.rel(rel).group;
    let target_group = inferred.rel(candidate).group;
    let selected = stated.rel_mut(rel).set_replacement(candidate, algorithm);
    debug_assert!(selected, "cascade only visits unresolved relationships");
    stats.record(algorithm);

    if candidates.len() > examined {
        stats.multiple_candidate_warnings += 1;
        tracing::warn!(
            stated = %stated.rel(rel).identity(),
            %algorithm,
            candidates = candidates.len(),
            "multiple potential replacements, first safe candidate selected"
        );
    }

    if stated_group != target_group {
        move_group_siblings(stated, inferred, rel, target_group, stats);
    }
    true
}

/// Cohesion post-pass: when one relationship of a stated group moves, every
/// other marked sibling is re-attempted against the target group, allowing
/// proximate destinations and proximate types. A hit overwrites any prior
/// selection. Triggered once per group move; sibling moves never recurse.
fn move_group_siblings(
    stated: &mut ViewGraph,
    inferred: &ViewGraph,
    rel: RelId,
    target_group: u32,
    stats: &mut MatchStats,
) {
    let (source, group) = {
        let r = stated.rel(rel);
        (r.source, r.group)
    };
    for sibling_id in stated.group_members(source, group, true) {
        if sibling_id == rel || !stated.rel(sibling_id).needs_replacement() {
            continue;
        }
        let sibling = stated.rel(sibling_id);
        let matches = inferred.find_in_group(
            source,
            sibling.type_id,
            sibling.destination,
            target_group,
            true,
            true,
        );
        if let Some(&target) = matches.first() {
            tracing::debug!(
                sibling = %stated.rel(sibling_id).identity(),
                group = target_group,
                "cohesion: moving group sibling with its replaced peer"
            );
            stated
                .rel_mut(sibling_id)
                .override_replacement(target, Algorithm::GroupCohesion);
            stats.cohesion_moves += 1;
        }
    }
}
