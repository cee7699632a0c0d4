//! Per-characteristic concept graph.
//!
//! A [`ViewGraph`] holds one view (stated or inferred) of the relationship
//! set: a slab of [`Relationship`]s, an identity-key index for cross-view
//! existence checks, a concept index from source id to ordered attribute
//! list, and a `petgraph` hierarchy of `|Is a|` edges for ancestry tests.
//!
//! Concepts and relationships are exclusively owned by their view and never
//! shared across the stated/inferred boundary; the matching engine compares
//! them by value only. All query methods live here rather than on the thin
//! [`Concept`] record, so borrowing stays simple while the matching pass
//! mutates relationship state.

use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::error::GraphError;
use crate::relationship::{Characteristic, IdentityKey, RelId, Relationship, SctId};

/// A node of one view: the concept id plus its ordered outgoing edges.
#[derive(Debug, Clone)]
pub struct Concept {
    id: SctId,
    attributes: Vec<RelId>,
}

impl Concept {
    fn new(id: SctId) -> Self {
        Self {
            id,
            attributes: Vec::new(),
        }
    }

    pub fn id(&self) -> SctId {
        self.id
    }

    /// Outgoing relationships in natural order (type, destination, group)
    /// once the view is finalised.
    pub fn attributes(&self) -> &[RelId] {
        &self.attributes
    }
}

/// One view of the concept graph.
#[derive(Debug, Clone)]
pub struct ViewGraph {
    characteristic: Characteristic,
    /// Relationship slab; `RelId` indexes into it.
    rels: Vec<Relationship>,
    /// Cross-view existence index.
    by_identity: HashMap<IdentityKey, RelId>,
    /// Concepts appearing as a source, plus destinations of hierarchy edges
    /// (so the root, which is never a source, is still a node).
    concepts: HashMap<SctId, Concept>,
    /// Child → parent `|Is a|` edges.
    hierarchy: DiGraph<SctId, ()>,
    node_index: HashMap<SctId, NodeIndex>,
}

impl ViewGraph {
    pub fn new(characteristic: Characteristic) -> Self {
        Self {
            characteristic,
            rels: Vec::new(),
            by_identity: HashMap::new(),
            concepts: HashMap::new(),
            hierarchy: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    pub fn characteristic(&self) -> Characteristic {
        self.characteristic
    }

    fn ensure_node(&mut self, id: SctId) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&id) {
            return idx;
        }
        let idx = self.hierarchy.add_node(id);
        self.node_index.insert(id, idx);
        idx
    }

    /// Insert a relationship, indexing it by identity and source concept.
    pub fn insert(&mut self, rel: Relationship) -> RelId {
        debug_assert_eq!(rel.characteristic, self.characteristic);
        let id = RelId::from_index(self.rels.len());
        self.by_identity.insert(rel.identity(), id);
        self.concepts
            .entry(rel.source)
            .or_insert_with(|| Concept::new(rel.source))
            .attributes
            .push(id);
        if rel.is_hierarchy() {
            let child = self.ensure_node(rel.source);
            let parent = self.ensure_node(rel.destination);
            self.hierarchy.add_edge(child, parent, ());
            self.concepts
                .entry(rel.destination)
                .or_insert_with(|| Concept::new(rel.destination));
        }
        self.rels.push(rel);
        id
    }

    /// Sort every concept's attribute list into natural order. Call once
    /// after loading, before any query.
    pub fn finalise(&mut self) {
        let rels = &self.rels;
        for concept in self.concepts.values_mut() {
            concept
                .attributes
                .sort_by_key(|&id| (rels[id.index()].triple(), id));
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn rel(&self, id: RelId) -> &Relationship {
        &self.rels[id.index()]
    }

    pub fn rel_mut(&mut self, id: RelId) -> &mut Relationship {
        &mut self.rels[id.index()]
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn contains_identity(&self, key: &IdentityKey) -> bool {
        self.by_identity.contains_key(key)
    }

    pub fn concept(&self, id: SctId) -> Option<&Concept> {
        self.concepts.get(&id)
    }

    /// Ordered outgoing relationships of a concept; empty if unknown.
    pub fn attributes(&self, source: SctId) -> &[RelId] {
        self.concepts
            .get(&source)
            .map(|c| c.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// Every relationship id, ordered by source concept id and then natural
    /// attribute order. This is the stable iteration order of the matching
    /// and output passes.
    pub fn ordered_rel_ids(&self) -> Vec<RelId> {
        let mut sources: Vec<SctId> = self
            .concepts
            .values()
            .filter(|c| !c.attributes.is_empty())
            .map(|c| c.id)
            .collect();
        sources.sort_unstable();
        sources
            .into_iter()
            .flat_map(|s| self.attributes(s).iter().copied())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Group queries
    // -----------------------------------------------------------------------

    /// All relationships of `source` sharing `group`, optionally excluding
    /// hierarchy edges (which never participate in group semantics).
    pub fn group_members(&self, source: SctId, group: u32, exclude_hierarchy: bool) -> Vec<RelId> {
        self.attributes(source)
            .iter()
            .copied()
            .filter(|&id| {
                let r = self.rel(id);
                r.group == group && !(exclude_hierarchy && r.is_hierarchy())
            })
            .collect()
    }

    /// Order-independent fingerprint of the (type, destination) pairs within
    /// one group of `source`. Two groups with equal member triples hash
    /// equal, whatever their group numbers.
    pub fn triples_hash(&self, source: SctId, group: u32) -> u64 {
        let mut pairs: Vec<(u64, u64)> = self
            .group_members(source, group, false)
            .into_iter()
            .map(|id| {
                let r = self.rel(id);
                (r.type_id.get(), r.destination.get())
            })
            .collect();
        pairs.sort_unstable();
        let mut hasher = DefaultHasher::new();
        pairs.hash(&mut hasher);
        hasher.finish()
    }

    /// The distinct group numbers used by `source`, ascending.
    fn groups_of(&self, source: SctId) -> Vec<u32> {
        let mut groups: Vec<u32> = self
            .attributes(source)
            .iter()
            .map(|&id| self.rel(id).group)
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    // -----------------------------------------------------------------------
    // Matching query surface
    // -----------------------------------------------------------------------

    /// Relationships of `source` in `group` matching `type_id` and
    /// `destination`, where either side may proximately match (a hierarchical
    /// descendant of the requested value) when the corresponding flag is set.
    /// Exact matches come before proximate ones; ties keep natural order.
    pub fn find_in_group(
        &self,
        source: SctId,
        type_id: SctId,
        destination: SctId,
        group: u32,
        allow_proximate_destination: bool,
        allow_proximate_type: bool,
    ) -> Vec<RelId> {
        let mut matches: Vec<RelId> = self
            .attributes(source)
            .iter()
            .copied()
            .filter(|&id| {
                let r = self.rel(id);
                if r.group != group {
                    return false;
                }
                let type_ok = r.type_id == type_id
                    || (allow_proximate_type && self.is_descendant(r.type_id, type_id));
                let dest_ok = r.destination == destination
                    || (allow_proximate_destination
                        && self.is_descendant(r.destination, destination));
                type_ok && dest_ok
            })
            .collect();
        matches.sort_by_key(|&id| {
            let r = self.rel(id);
            (r.destination != destination, r.type_id != type_id, r.triple(), id)
        });
        matches
    }

    /// Members of any group of `source` whose triples hash equals `hash`,
    /// filtered to `type_id`.
    pub fn find_groups_by_hash(&self, source: SctId, hash: u64, type_id: SctId) -> Vec<RelId> {
        let mut matches = Vec::new();
        for group in self.groups_of(source) {
            if self.triples_hash(source, group) != hash {
                continue;
            }
            for id in self.group_members(source, group, false) {
                if self.rel(id).type_id == type_id {
                    matches.push(id);
                }
            }
        }
        matches
    }

    /// Members of every group of `source` whose (non-hierarchy) type set
    /// contains at least `required_types`.
    pub fn find_groups_containing_types(
        &self,
        source: SctId,
        required_types: &[SctId],
    ) -> Vec<RelId> {
        let mut matches = Vec::new();
        for group in self.groups_of(source) {
            let members = self.group_members(source, group, false);
            let present: HashSet<SctId> = members
                .iter()
                .filter(|&&id| !self.rel(id).is_hierarchy())
                .map(|&id| self.rel(id).type_id)
                .collect();
            if required_types.iter().all(|t| present.contains(t)) {
                matches.extend(members);
            }
        }
        matches
    }

    /// Relationships of `source` with `type_id` in any group, destination
    /// equal to or a descendant of `destination`. Exact destinations first.
    pub fn find_by_type(&self, source: SctId, type_id: SctId, destination: SctId) -> Vec<RelId> {
        let mut matches: Vec<RelId> = self
            .attributes(source)
            .iter()
            .copied()
            .filter(|&id| {
                let r = self.rel(id);
                r.type_id == type_id
                    && (r.destination == destination
                        || self.is_descendant(r.destination, destination))
            })
            .collect();
        matches.sort_by_key(|&id| {
            let r = self.rel(id);
            (r.destination != destination, r.triple(), id)
        });
        matches
    }

    /// Relationships of `source` whose type is a strict descendant of
    /// `type_id` in this view's hierarchy.
    pub fn find_by_proximate_type(&self, source: SctId, type_id: SctId) -> Vec<RelId> {
        self.attributes(source)
            .iter()
            .copied()
            .filter(|&id| self.is_descendant(self.rel(id).type_id, type_id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------------

    /// Strict transitive ancestry test within this view only: true when
    /// `concept` lies below `ancestor` in the `|Is a|` hierarchy. A concept
    /// is not its own descendant.
    pub fn is_descendant(&self, concept: SctId, ancestor: SctId) -> bool {
        if concept == ancestor {
            return false;
        }
        let (Some(&start), Some(&target)) = (
            self.node_index.get(&concept),
            self.node_index.get(&ancestor),
        ) else {
            return false;
        };
        let mut bfs = Bfs::new(&self.hierarchy, start);
        while let Some(node) = bfs.next(&self.hierarchy) {
            if node == target {
                return true;
            }
        }
        false
    }

    /// Validate the single-root invariant: exactly one concept in the view
    /// has no `|Is a|` parent. Returns the root on success. This is a fatal
    /// precondition of the matching pass.
    pub fn validate_single_root(&self) -> Result<SctId, GraphError> {
        let mut roots: Vec<SctId> = self
            .concepts
            .values()
            .filter(|c| {
                !c.attributes
                    .iter()
                    .any(|&id| self.rel(id).is_hierarchy())
            })
            .map(|c| c.id)
            .collect();
        match roots.len() {
            0 => Err(GraphError::NoRoot {
                characteristic: self.characteristic,
            }),
            1 => Ok(roots.pop().expect("one root")),
            count => Err(GraphError::MultipleRoots {
                characteristic: self.characteristic,
                count,
            }),
        }
    }
}
