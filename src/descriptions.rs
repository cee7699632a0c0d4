//! Fully-specified-name cache for diagnostic output.
//!
//! Loads an RF2 description file and caches the active FSN of each concept,
//! so diagnostics can print `id|term|` instead of a bare SCTID. The matching
//! engine never consults this; it exists purely for humans reading logs and
//! the lookup/interactive modes.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use dashmap::DashMap;

use crate::error::LoadError;
use crate::relationship::SctId;

const IDX_ACTIVE: usize = 2;
const IDX_CONCEPT_ID: usize = 4;
const IDX_TYPE_ID: usize = 6;
const IDX_TERM: usize = 7;
const FIELD_COUNT: usize = 9;

/// The `900000000000003001 |Fully specified name|` description type.
const FSN_TYPE: &str = "900000000000003001";

/// Concept id → fully specified name cache.
#[derive(Debug, Default)]
pub struct DescriptionCache {
    fsns: DashMap<SctId, String>,
}

impl DescriptionCache {
    /// An empty cache; every concept formats as its bare id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load active FSN rows from an RF2 description file. Rows that are
    /// inactive, non-FSN, or too short are skipped without complaint; this
    /// is best-effort diagnostic garnish.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotAFile {
                path: path.display().to_string(),
            });
        }
        let io_err = |source| LoadError::Io {
            path: path.display().to_string(),
            source,
        };

        let cache = Self::new();
        let reader = BufReader::new(File::open(path).map_err(io_err)?);
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(io_err)?;
            if index == 0 {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < FIELD_COUNT
                || fields[IDX_ACTIVE] != "1"
                || fields[IDX_TYPE_ID] != FSN_TYPE
            {
                continue;
            }
            if let Ok(concept) = fields[IDX_CONCEPT_ID].parse::<SctId>() {
                cache.fsns.insert(concept, fields[IDX_TERM].to_string());
            }
        }
        tracing::debug!(path = %path.display(), terms = cache.len(), "loaded descriptions");
        Ok(cache)
    }

    /// Format a concept as `id|term|`, or the bare id when no FSN is cached.
    pub fn format(&self, id: SctId) -> String {
        match self.fsns.get(&id) {
            Some(term) => format!("{id}|{}|", term.value()),
            None => id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.fsns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fsns.is_empty()
    }
}
