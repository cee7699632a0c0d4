//! Serializable run report.
//!
//! Summarizes one substitution run: overall counts, per-algorithm hit rates,
//! and the identity keys of relationships no algorithm could resolve. Written
//! as JSON when the CLI is given `--report`, for triage tooling downstream.

use std::path::Path;

use serde::Serialize;

use crate::error::EmitError;
use crate::graph::ViewGraph;
use crate::matcher::MatchStats;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub effective_time: String,
    pub total_stated: usize,
    pub needed_replacement: u64,
    pub replaced: u64,
    pub unresolved: u64,
    pub stats: MatchStats,
    /// Identity keys of unresolved relationships, in stable order.
    pub unresolved_keys: Vec<String>,
}

impl RunReport {
    /// Summarize the stated view after a matching pass.
    pub fn from_run(stated: &ViewGraph, stats: MatchStats, effective_time: &str) -> Self {
        let mut needed_replacement = 0;
        let mut replaced = 0;
        let mut unresolved_keys = Vec::new();
        for id in stated.ordered_rel_ids() {
            let rel = stated.rel(id);
            if rel.needs_replacement() {
                needed_replacement += 1;
            }
            if rel.replacement().is_some() {
                replaced += 1;
            } else if rel.is_unresolved() {
                unresolved_keys.push(rel.identity().to_string());
            }
        }
        Self {
            effective_time: effective_time.to_string(),
            total_stated: stated.len(),
            needed_replacement,
            replaced,
            unresolved: needed_replacement - replaced,
            stats,
            unresolved_keys,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), EmitError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| EmitError::Report {
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|source| EmitError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
