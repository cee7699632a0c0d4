//! RF2 relationship row format.
//!
//! Rows are tab-delimited with ten positional fields. Nothing beyond the
//! fixed positions is validated; this is deliberately thin I/O plumbing
//! around the in-memory graph. Only active rows are loaded, the header row
//! is skipped, and output rows use RF2's CRLF line endings.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LoadError;
use crate::graph::ViewGraph;
use crate::relationship::{Characteristic, Relationship, SctId};

pub const FIELD_DELIMITER: char = '\t';
pub const LINE_DELIMITER: &str = "\r\n";
pub const HEADER_ROW: &str = "id\teffectiveTime\tactive\tmoduleId\tsourceId\tdestinationId\trelationshipGroup\ttypeId\tcharacteristicTypeId\tmodifierId";

pub const ACTIVE_FLAG: &str = "1";
pub const INACTIVE_FLAG: &str = "0";

pub const IDX_ID: usize = 0;
pub const IDX_EFFECTIVE_TIME: usize = 1;
pub const IDX_ACTIVE: usize = 2;
pub const IDX_MODULE_ID: usize = 3;
pub const IDX_SOURCE_ID: usize = 4;
pub const IDX_DESTINATION_ID: usize = 5;
pub const IDX_RELATIONSHIP_GROUP: usize = 6;
pub const IDX_TYPE_ID: usize = 7;
pub const IDX_CHARACTERISTIC_TYPE_ID: usize = 8;
pub const IDX_MODIFIER_ID: usize = 9;
pub const FIELD_COUNT: usize = 10;

static EFFECTIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{8}").expect("valid pattern"));

/// Extract the run's effective time: the first 8-digit run in the output
/// path. Checked before any file is loaded so a bad path fails fast.
pub fn extract_effective_time(path: &str) -> Result<String, LoadError> {
    EFFECTIVE_TIME_RE
        .find(path)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| LoadError::NoEffectiveTime { path: path.into() })
}

/// Parse one data row. Returns `Ok(None)` for inactive rows, which are not
/// loaded.
pub fn parse_row(
    line: &str,
    characteristic: Characteristic,
) -> Result<Option<Relationship>, String> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < FIELD_COUNT {
        return Err(format!(
            "expected {FIELD_COUNT} fields, found {}",
            fields.len()
        ));
    }
    if fields[IDX_ACTIVE] != ACTIVE_FLAG {
        return Ok(None);
    }

    let concept = |idx: usize, name: &str| -> Result<SctId, String> {
        fields[idx]
            .parse::<SctId>()
            .map_err(|_| format!("invalid {name} '{}'", fields[idx]))
    };

    let group: u32 = fields[IDX_RELATIONSHIP_GROUP]
        .parse()
        .map_err(|_| format!("invalid relationshipGroup '{}'", fields[IDX_RELATIONSHIP_GROUP]))?;

    Ok(Some(Relationship::new(
        fields[IDX_ID],
        fields[IDX_EFFECTIVE_TIME],
        true,
        fields[IDX_MODULE_ID],
        concept(IDX_SOURCE_ID, "sourceId")?,
        concept(IDX_DESTINATION_ID, "destinationId")?,
        group,
        concept(IDX_TYPE_ID, "typeId")?,
        characteristic,
        fields[IDX_MODIFIER_ID],
    )))
}

/// Serialize a relationship back to an RF2 row, re-stamped with the given
/// effective time, active flag, and characteristic-type SCTID.
pub fn format_row(
    rel: &Relationship,
    effective_time: &str,
    active: bool,
    characteristic_sctid: &str,
) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}{}",
        rel.row_id,
        effective_time,
        if active { ACTIVE_FLAG } else { INACTIVE_FLAG },
        rel.module_id,
        rel.source,
        rel.destination,
        rel.group,
        rel.type_id,
        characteristic_sctid,
        rel.modifier_id,
        LINE_DELIMITER,
    )
}

/// Load one view from an RF2 relationship file. The header row is skipped
/// and inactive rows are dropped; the returned graph is finalised and ready
/// to query.
pub fn load_view(path: &Path, characteristic: Characteristic) -> Result<ViewGraph, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotAFile {
            path: path.display().to_string(),
        });
    }
    let io_err = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };

    tracing::debug!(path = %path.display(), %characteristic, "loading relationship file");

    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut graph = ViewGraph::new(characteristic);
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if index == 0 || line.is_empty() {
            continue;
        }
        match parse_row(&line, characteristic) {
            Ok(Some(rel)) => {
                graph.insert(rel);
            }
            Ok(None) => {}
            Err(message) => {
                return Err(LoadError::MalformedRow {
                    path: path.display().to_string(),
                    line: index + 1,
                    message,
                });
            }
        }
    }
    graph.finalise();

    tracing::debug!(
        %characteristic,
        relationships = graph.len(),
        concepts = graph.concept_count(),
        "loaded view"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_row(active: &str) -> String {
        format!(
            "3187444025\t20220131\t{active}\t900000000000207008\t100\t200\t0\t116680003\t900000000000010007\t900000000000451002"
        )
    }

    #[test]
    fn effective_time_extraction() {
        assert_eq!(
            extract_effective_time("out/sct2_Relationship_Delta_INT_20230131.txt").unwrap(),
            "20230131"
        );
        assert!(matches!(
            extract_effective_time("out/relationships.txt"),
            Err(LoadError::NoEffectiveTime { .. })
        ));
    }

    #[test]
    fn parses_active_row() {
        let rel = parse_row(&sample_row("1"), Characteristic::Stated)
            .unwrap()
            .unwrap();
        assert_eq!(rel.row_id, "3187444025");
        assert_eq!(rel.source.get(), 100);
        assert_eq!(rel.destination.get(), 200);
        assert_eq!(rel.group, 0);
        assert!(rel.is_hierarchy());
        assert_eq!(rel.characteristic, Characteristic::Stated);
    }

    #[test]
    fn drops_inactive_row() {
        assert!(parse_row(&sample_row("0"), Characteristic::Stated)
            .unwrap()
            .is_none());
    }

    #[test]
    fn rejects_short_row() {
        let err = parse_row("1\t2\t1", Characteristic::Stated).unwrap_err();
        assert!(err.contains("expected 10 fields"));
    }

    #[test]
    fn rejects_zero_concept_id() {
        let row = sample_row("1").replace("\t100\t", "\t0\t");
        let err = parse_row(&row, Characteristic::Stated).unwrap_err();
        assert!(err.contains("sourceId"));
    }

    #[test]
    fn format_row_restamps_fields() {
        let rel = parse_row(&sample_row("1"), Characteristic::Inferred)
            .unwrap()
            .unwrap();
        let row = format_row(&rel, "20230131", true, Characteristic::Stated.sctid());
        assert_eq!(
            row,
            "3187444025\t20230131\t1\t900000000000207008\t100\t200\t0\t116680003\t900000000000010007\t900000000000451002\r\n"
        );
        let inactive = format_row(&rel, "20230131", false, Characteristic::Stated.sctid());
        assert!(inactive.contains("\t20230131\t0\t"));
    }

    #[test]
    fn load_view_skips_header_and_inactive_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sct2_StatedRelationship_20220131.txt");
        let mut f = File::create(&path).unwrap();
        write!(
            f,
            "{}{}{}{}{}{}",
            HEADER_ROW,
            LINE_DELIMITER,
            sample_row("1"),
            LINE_DELIMITER,
            sample_row("0"),
            LINE_DELIMITER
        )
        .unwrap();
        drop(f);

        let graph = load_view(&path, Characteristic::Stated).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn load_view_rejects_missing_file_and_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            load_view(&dir.path().join("absent.txt"), Characteristic::Stated),
            Err(LoadError::NotAFile { .. })
        ));
        assert!(matches!(
            load_view(dir.path(), Characteristic::Stated),
            Err(LoadError::NotAFile { .. })
        ));
    }
}
