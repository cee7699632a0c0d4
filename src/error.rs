//! Diagnostic error types for the reconciliation engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so operators know exactly
//! what went wrong and how to fix it. Structural and precondition failures
//! abort the whole run; per-relationship matching failures are never errors
//! (they accumulate as unresolved entries in the run report).

use miette::Diagnostic;
use thiserror::Error;

use crate::relationship::Characteristic;

/// Top-level error type for the reconciliation engine.
#[derive(Debug, Error, Diagnostic)]
pub enum ReconcileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Emit(#[from] EmitError),
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("unable to read file {path}")]
    #[diagnostic(
        code(reconcile::load::not_a_file),
        help(
            "The path must point to an existing RF2 relationship file, \
             not a directory. Check the stated/inferred file arguments."
        )
    )]
    NotAFile { path: String },

    #[error("I/O error reading {path}: {source}")]
    #[diagnostic(
        code(reconcile::load::io),
        help("Check the file exists, is readable, and is not truncated mid-row.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row at {path}:{line}: {message}")]
    #[diagnostic(
        code(reconcile::load::malformed_row),
        help(
            "RF2 relationship rows are tab-delimited with ten fields: \
             id, effectiveTime, active, moduleId, sourceId, destinationId, \
             relationshipGroup, typeId, characteristicTypeId, modifierId."
        )
    )]
    MalformedRow {
        path: String,
        line: usize,
        message: String,
    },

    #[error("unable to parse an effective time from {path}")]
    #[diagnostic(
        code(reconcile::load::no_effective_time),
        help(
            "The output file path must contain an 8-digit effective date, \
             e.g. sct2_StatedRelationship_Delta_INT_20230131.txt."
        )
    )]
    NoEffectiveTime { path: String },
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("{characteristic} view has no root concept")]
    #[diagnostic(
        code(reconcile::graph::no_root),
        help(
            "Every concept in the view has a parent, so the hierarchy has no \
             root. The relationship file is incomplete or not a full snapshot."
        )
    )]
    NoRoot { characteristic: Characteristic },

    #[error("{characteristic} view has {count} rootless concepts, expected exactly 1")]
    #[diagnostic(
        code(reconcile::graph::multiple_roots),
        help(
            "More than one concept has no |Is a| parent. Either the file is a \
             delta rather than a snapshot, or hierarchy rows are missing. \
             Matching is not attempted against a fragmented hierarchy."
        )
    )]
    MultipleRoots {
        characteristic: Characteristic,
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Emit errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    #[error("I/O error writing {path}: {source}")]
    #[diagnostic(
        code(reconcile::emit::io),
        help(
            "The output file could not be written. Check directory permissions \
             and free disk space. Matching work is not persisted on failure."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize run report: {message}")]
    #[diagnostic(code(reconcile::emit::report))]
    Report { message: String },
}

/// Convenience alias for functions returning reconciliation results.
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;
