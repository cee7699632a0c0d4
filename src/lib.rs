//! # rf2-reconcile
//!
//! Reconciles the two parallel views of a SNOMED CT concept-relationship
//! graph: the manually authored ("stated") view and the classifier-computed
//! ("inferred") view. For every active stated relationship with no identical
//! counterpart in the inferred file, a cascade of five matching algorithms
//! searches the inferred view for a semantically equivalent or
//! safely-more-specific replacement, so the emitted stated feed stays
//! traceable into the inferred graph.
//!
//! ## Architecture
//!
//! - **Graph model** (`graph`, `relationship`): per-view concept graphs with
//!   an `|Is a|` hierarchy for ancestry and role-group queries
//! - **Matching engine** (`matcher`): the five-algorithm cascade, a pluggable
//!   safety policy, and the group-cohesion post-pass
//! - **Driver** (`engine`): load → validate → match → emit → report
//! - **I/O plumbing** (`rf2`, `descriptions`, `report`): RF2 row codec,
//!   FSN diagnostics, JSON run report
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use rf2_reconcile::engine::Reconciler;
//!
//! let mut reconciler = Reconciler::load(
//!     Path::new("sct2_StatedRelationship_Snapshot_INT_20230131.txt"),
//!     Path::new("sct2_Relationship_Snapshot_INT_20230131.txt"),
//!     None,
//! ).unwrap();
//! let report = reconciler
//!     .substitute(Path::new("out/sct2_StatedRelationship_Delta_INT_20230131.txt"), "20230131")
//!     .unwrap();
//! println!("{} unresolved", report.unresolved);
//! ```

pub mod descriptions;
pub mod engine;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod relationship;
pub mod report;
pub mod rf2;
