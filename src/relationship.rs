//! Core relationship types for the reconciliation engine.
//!
//! A [`Relationship`] is one edge of the concept graph as loaded from an RF2
//! row, plus the replacement-tracking state the matching pass mutates. The
//! [`IdentityKey`] is the (source, destination, group, type) tuple that is
//! stable across the stated and inferred views and is used for the "does this
//! stated edge still exist inferred" test.

use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique, niche-optimized SNOMED CT concept identifier.
///
/// Uses `NonZeroU64` so that `Option<SctId>` is the same size as `SctId`.
/// SCTIDs are never zero by the identifier specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SctId(NonZeroU64);

impl SctId {
    /// The `116680003 |Is a|` relationship type. Hierarchy edges carry this
    /// type and do not participate in role-group semantics.
    pub const IS_A: SctId = SctId(match NonZeroU64::new(116_680_003) {
        Some(v) => v,
        None => unreachable!(),
    });

    /// Create an `SctId` from a raw `u64`. Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(SctId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for SctId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SctId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s.parse()?;
        // Force the zero case through the integer parser's error type.
        SctId::new(raw).ok_or_else(|| "0".parse::<NonZeroU64>().unwrap_err())
    }
}

/// Which view of the concept graph a relationship or concept belongs to.
///
/// A concept id exists as two independent graph nodes, one per view; ancestry
/// and group queries never cross this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Characteristic {
    /// The manually authored relationship set.
    Stated,
    /// The machine-classified relationship set.
    Inferred,
}

impl Characteristic {
    /// The RF2 `characteristicTypeId` SCTID for this view.
    pub fn sctid(self) -> &'static str {
        match self {
            Characteristic::Stated => "900000000000010007",
            Characteristic::Inferred => "900000000000011006",
        }
    }
}

impl std::fmt::Display for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Characteristic::Stated => write!(f, "stated"),
            Characteristic::Inferred => write!(f, "inferred"),
        }
    }
}

/// Index of a relationship within its view's slab.
///
/// Only valid for the [`crate::graph::ViewGraph`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RelId(u32);

impl RelId {
    pub(crate) fn from_index(index: usize) -> Self {
        RelId(index as u32)
    }

    /// Slab index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The (source, destination, group, type) tuple that identifies an edge
/// independently of its per-view RF2 row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IdentityKey {
    pub source: SctId,
    pub destination: SctId,
    pub group: u32,
    pub type_id: SctId,
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.source, self.destination, self.group, self.type_id
        )
    }
}

/// Which matching algorithm produced a replacement selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Algorithm {
    /// Same group, same type, equal-or-descendant destination.
    GroupProximateDestination,
    /// Whole-group triples-hash match in another group.
    GroupTriples,
    /// Type-superset ("compatible") group, exact or descendant destination.
    CompatibleGroups,
    /// Same type anywhere, exact or descendant destination.
    LooseCrossGroup,
    /// Descendant type, exact destination.
    ProximateTypeExactDestination,
    /// Descendant type, descendant destination.
    ProximateTypeProximateDestination,
    /// Sibling dragged into a moved group by the cohesion post-pass.
    GroupCohesion,
}

impl Algorithm {
    /// Short tag used in logs and the run report.
    pub fn tag(self) -> &'static str {
        match self {
            Algorithm::GroupProximateDestination => "Alg1",
            Algorithm::GroupTriples => "Alg2",
            Algorithm::CompatibleGroups => "Alg3",
            Algorithm::LooseCrossGroup => "Alg4",
            Algorithm::ProximateTypeExactDestination => "Alg5.1",
            Algorithm::ProximateTypeProximateDestination => "Alg5.2",
            Algorithm::GroupCohesion => "AlgMGS",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Replacement-tracking state of one stated relationship.
///
/// Transitions are one-way: `Unmarked → NeedsReplacement → Replaced`. Marking
/// happens exactly once, selection at most once, and only the group-cohesion
/// post-pass may overwrite an existing selection. A relationship still in
/// `NeedsReplacement` when the run ends is unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementState {
    Unmarked,
    NeedsReplacement,
    Replaced { target: RelId, algorithm: Algorithm },
}

/// One edge of the concept graph: the immutable RF2 row fields plus the
/// mutable replacement state.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// RF2 relationship id of the row this edge was loaded from.
    pub row_id: String,
    /// Effective time of the input row. Output rows are re-stamped.
    pub effective_time: String,
    pub active: bool,
    pub module_id: String,
    pub source: SctId,
    pub destination: SctId,
    /// Role group: 0 means ungrouped; all same-numbered edges of one source
    /// concept form a conjunctive group.
    pub group: u32,
    pub type_id: SctId,
    pub characteristic: Characteristic,
    pub modifier_id: String,
    state: ReplacementState,
}

impl Relationship {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        row_id: impl Into<String>,
        effective_time: impl Into<String>,
        active: bool,
        module_id: impl Into<String>,
        source: SctId,
        destination: SctId,
        group: u32,
        type_id: SctId,
        characteristic: Characteristic,
        modifier_id: impl Into<String>,
    ) -> Self {
        Self {
            row_id: row_id.into(),
            effective_time: effective_time.into(),
            active,
            module_id: module_id.into(),
            source,
            destination,
            group,
            type_id,
            characteristic,
            modifier_id: modifier_id.into(),
            state: ReplacementState::Unmarked,
        }
    }

    /// The cross-view identity of this edge.
    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            source: self.source,
            destination: self.destination,
            group: self.group,
            type_id: self.type_id,
        }
    }

    /// The (type, destination, group) tuple. Doubles as the natural sort key
    /// for a concept's attributes, so enumeration order is deterministic.
    pub fn triple(&self) -> (SctId, SctId, u32) {
        (self.type_id, self.destination, self.group)
    }

    /// Whether this is a `116680003 |Is a|` hierarchy edge.
    pub fn is_hierarchy(&self) -> bool {
        self.type_id == SctId::IS_A
    }

    pub fn state(&self) -> ReplacementState {
        self.state
    }

    /// True once the edge has been found absent from the inferred view.
    /// Stays true after a replacement is selected; the output pass
    /// deactivates every such row.
    pub fn needs_replacement(&self) -> bool {
        !matches!(self.state, ReplacementState::Unmarked)
    }

    /// True while the edge is marked but has no selection yet.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.state, ReplacementState::NeedsReplacement)
    }

    /// The selected replacement, if any.
    pub fn replacement(&self) -> Option<(RelId, Algorithm)> {
        match self.state {
            ReplacementState::Replaced { target, algorithm } => Some((target, algorithm)),
            _ => None,
        }
    }

    /// Mark this edge as missing from the inferred view. No-op after the
    /// first call.
    pub fn mark_needs_replacement(&mut self) {
        if matches!(self.state, ReplacementState::Unmarked) {
            self.state = ReplacementState::NeedsReplacement;
        }
    }

    /// Select a replacement. Returns `false` (and changes nothing) if the
    /// edge is unmarked or already has a selection: the first successful
    /// algorithm wins.
    pub fn set_replacement(&mut self, target: RelId, algorithm: Algorithm) -> bool {
        match self.state {
            ReplacementState::NeedsReplacement => {
                self.state = ReplacementState::Replaced { target, algorithm };
                true
            }
            _ => false,
        }
    }

    /// Overwrite any prior selection. Reserved for the group-cohesion
    /// post-pass, which trumps individually better matches. Unmarked edges
    /// are left alone.
    pub fn override_replacement(&mut self, target: RelId, algorithm: Algorithm) -> bool {
        match self.state {
            ReplacementState::Unmarked => false,
            _ => {
                self.state = ReplacementState::Replaced { target, algorithm };
                true
            }
        }
    }
}
