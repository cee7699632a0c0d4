//! The substitution driver.
//!
//! [`Reconciler`] owns both views for the duration of one run and
//! orchestrates load → validate → mark → match → emit → report. It also
//! backs the lookup and interactive modes, which dump one concept's
//! relationships from both views.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::descriptions::DescriptionCache;
use crate::error::{EmitError, ReconcileResult};
use crate::graph::ViewGraph;
use crate::matcher::{self, RoleGroupPolicy};
use crate::relationship::{Characteristic, RelId, Relationship, SctId};
use crate::report::RunReport;
use crate::rf2;

/// Drives one reconciliation run over a stated/inferred file pair.
#[derive(Debug)]
pub struct Reconciler {
    stated: ViewGraph,
    inferred: ViewGraph,
    descriptions: DescriptionCache,
}

impl Reconciler {
    /// Load both views (and optionally a description file for diagnostics).
    pub fn load(
        stated: &Path,
        inferred: &Path,
        descriptions: Option<&Path>,
    ) -> ReconcileResult<Self> {
        let stated = rf2::load_view(stated, Characteristic::Stated)?;
        let inferred = rf2::load_view(inferred, Characteristic::Inferred)?;
        let descriptions = match descriptions {
            Some(path) => DescriptionCache::load(path)?,
            None => DescriptionCache::new(),
        };
        tracing::debug!("loading complete");
        Ok(Self {
            stated,
            inferred,
            descriptions,
        })
    }

    pub fn stated(&self) -> &ViewGraph {
        &self.stated
    }

    pub fn inferred(&self) -> &ViewGraph {
        &self.inferred
    }

    /// Run the full substitution pipeline and write the reconciled stated
    /// feed to `output`. Precondition failures abort before any matching;
    /// unresolved relationships are an expected outcome and are reported,
    /// not errors.
    pub fn substitute(&mut self, output: &Path, effective_time: &str) -> ReconcileResult<RunReport> {
        let stated_root = self.stated.validate_single_root()?;
        let inferred_root = self.inferred.validate_single_root()?;
        tracing::debug!(%stated_root, %inferred_root, "single-root invariant holds");

        let marked = matcher::mark_missing(&mut self.stated, &self.inferred);
        let mut stats =
            matcher::run_cascade(&mut self.stated, &self.inferred, &RoleGroupPolicy::default());
        stats.marked = marked;

        let report = RunReport::from_run(&self.stated, stats, effective_time);
        self.report_progress(&report);
        self.emit(output, effective_time)?;
        self.report_failures();
        Ok(report)
    }

    fn report_progress(&self, report: &RunReport) {
        tracing::info!(
            "of the {} stated relationships, {} needed replaced, {} have been replaced, leaving {} to work with",
            report.total_stated,
            report.needed_replacement,
            report.replaced,
            report.unresolved
        );
        let s = &report.stats;
        tracing::info!(
            "algorithm success rates 1: {}, 2: {}, 3: {}, 4: {}, 5: {}, cohesion: {}",
            s.alg1,
            s.alg2,
            s.alg3,
            s.alg4,
            s.alg5,
            s.cohesion_moves
        );
        tracing::info!(
            "algorithm 3 breakdown - exact match candidates: {}, more proximate: {}",
            s.alg3_exact_candidates,
            s.alg3_proximate_candidates
        );
    }

    /// Write the reconciled stated feed: every relationship needing
    /// replacement goes out inactive, immediately followed by its selected
    /// replacement re-stamped as a stated-view row, both at the run's
    /// effective time.
    fn emit(&self, output: &Path, effective_time: &str) -> Result<(), EmitError> {
        let io_err = |source| EmitError::Io {
            path: output.display().to_string(),
            source,
        };
        let mut writer = BufWriter::new(File::create(output).map_err(io_err)?);
        writer
            .write_all(rf2::HEADER_ROW.as_bytes())
            .and_then(|()| writer.write_all(rf2::LINE_DELIMITER.as_bytes()))
            .map_err(io_err)?;

        let stated_sctid = Characteristic::Stated.sctid();
        for id in self.stated.ordered_rel_ids() {
            let rel = self.stated.rel(id);
            if rel.needs_replacement() {
                let row = rf2::format_row(rel, effective_time, false, stated_sctid);
                writer.write_all(row.as_bytes()).map_err(io_err)?;
            }
            if let Some((target, _)) = rel.replacement() {
                let row =
                    rf2::format_row(self.inferred.rel(target), effective_time, true, stated_sctid);
                writer.write_all(row.as_bytes()).map_err(io_err)?;
            }
        }
        writer.flush().map_err(io_err)
    }

    /// Log the first 10 unresolved relationships, then a full dual-view dump
    /// of the last one's source concept as a triage aid.
    fn report_failures(&self) {
        let mut reported = 0;
        let mut last: Option<&Relationship> = None;
        for id in self.stated.ordered_rel_ids() {
            let rel = self.stated.rel(id);
            if rel.is_unresolved() {
                if reported == 0 {
                    tracing::info!("first 10 failures:");
                }
                tracing::info!("{}", self.render(rel, true));
                last = Some(rel);
                reported += 1;
                if reported >= 10 {
                    break;
                }
            }
        }
        if let Some(rel) = last {
            self.lookup(rel.source);
        }
    }

    /// Dump one concept's relationships from both views, sorted naturally.
    /// Stated rows needing replacement and inferred rows chosen as
    /// replacements are starred.
    pub fn lookup(&self, concept: SctId) {
        let Some(stated) = self.stated.concept(concept) else {
            tracing::info!("concept {} not found", self.format_concept(concept));
            return;
        };

        tracing::info!("{} stated view:", self.format_concept(concept));
        for &id in stated.attributes() {
            let rel = self.stated.rel(id);
            tracing::info!("{}", self.render(rel, rel.needs_replacement()));
        }

        let chosen: Vec<RelId> = stated
            .attributes()
            .iter()
            .filter_map(|&id| self.stated.rel(id).replacement())
            .map(|(target, _)| target)
            .collect();

        tracing::info!("{} inferred view:", self.format_concept(concept));
        for &id in self.inferred.attributes(concept) {
            self.render_inferred(id, &chosen);
        }
    }

    fn render_inferred(&self, id: RelId, chosen: &[RelId]) {
        let rel = self.inferred.rel(id);
        tracing::info!("{}", self.render(rel, chosen.contains(&id)));
    }

    /// `id|term|` when an FSN is cached, else the bare id.
    pub fn format_concept(&self, id: SctId) -> String {
        self.descriptions.format(id)
    }

    /// One-line rendering of a relationship for diagnostics, with an
    /// optional leading star.
    pub fn render(&self, rel: &Relationship, star: bool) -> String {
        format!(
            "{}{}: G{} {} -> {}",
            if star { "* " } else { "  " },
            self.format_concept(rel.source),
            rel.group,
            self.format_concept(rel.type_id),
            self.format_concept(rel.destination),
        )
    }
}
