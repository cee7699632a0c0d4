//! End-to-end tests for the reconciliation pipeline.
//!
//! These exercise the full path from RF2 files on disk through matching to
//! the emitted output feed, validating the substitution, round-trip,
//! determinism, and precondition behaviors together.

use std::fs;
use std::path::{Path, PathBuf};

use rf2_reconcile::engine::Reconciler;
use rf2_reconcile::error::{GraphError, ReconcileError};
use rf2_reconcile::relationship::SctId;
use rf2_reconcile::rf2;

const ROOT: u64 = 138_875_005;
const IS_A: u64 = 116_680_003;
const FINDING_SITE: u64 = 363_698_007;
const MODULE: &str = "900000000000207008";
const MODIFIER: &str = "900000000000451002";

fn row(id: u64, source: u64, type_id: u64, destination: u64, group: u32, char_sctid: &str) -> String {
    format!(
        "{id}\t20220131\t1\t{MODULE}\t{source}\t{destination}\t{group}\t{type_id}\t{char_sctid}\t{MODIFIER}"
    )
}

fn stated_row(id: u64, source: u64, type_id: u64, destination: u64, group: u32) -> String {
    row(id, source, type_id, destination, group, "900000000000010007")
}

fn inferred_row(id: u64, source: u64, type_id: u64, destination: u64, group: u32) -> String {
    row(id, source, type_id, destination, group, "900000000000011006")
}

fn write_rf2(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = String::from(rf2::HEADER_ROW);
    content.push_str(rf2::LINE_DELIMITER);
    for row in rows {
        content.push_str(row);
        content.push_str(rf2::LINE_DELIMITER);
    }
    fs::write(&path, content).unwrap();
    path
}

fn sct(id: u64) -> SctId {
    SctId::new(id).unwrap()
}

/// Shared hierarchy rows: ROOT ← 200 ← 250, with concept 100 below 250 in
/// the inferred view.
fn inferred_hierarchy() -> Vec<String> {
    vec![
        inferred_row(11, 200, IS_A, ROOT, 0),
        inferred_row(12, 250, IS_A, 200, 0),
    ]
}

#[test]
fn proximate_destination_substitution_end_to_end() {
    // The motivating case: stated (100 |Is a| 200) is absent from the
    // inferred view, which instead holds (100 |Is a| 250) with 250 a
    // descendant of 200. Algorithm 1 must select it and the output must
    // deactivate the original and emit a stated-tagged copy of the
    // replacement, both at the effective time taken from the output path.
    let dir = tempfile::TempDir::new().unwrap();
    let stated = write_rf2(
        dir.path(),
        "stated.txt",
        &[
            stated_row(1, 200, IS_A, ROOT, 0),
            stated_row(2, 250, IS_A, 200, 0),
            stated_row(3, 100, IS_A, 200, 0),
        ],
    );
    let mut inferred_rows = inferred_hierarchy();
    inferred_rows.push(inferred_row(13, 100, IS_A, 250, 0));
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_rows);

    let output = dir.path().join("sct2_StatedRelationship_Delta_INT_20230131.txt");
    let effective_time = rf2::extract_effective_time(output.to_str().unwrap()).unwrap();
    assert_eq!(effective_time, "20230131");

    let mut reconciler = Reconciler::load(&stated, &inferred, None).unwrap();
    let report = reconciler.substitute(&output, &effective_time).unwrap();

    assert_eq!(report.total_stated, 3);
    assert_eq!(report.needed_replacement, 1);
    assert_eq!(report.replaced, 1);
    assert_eq!(report.unresolved, 0);
    assert_eq!(report.stats.alg1, 1);

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.split(rf2::LINE_DELIMITER).collect();
    assert_eq!(lines[0], rf2::HEADER_ROW);
    // Deactivated original, then the replacement re-stamped as stated.
    assert_eq!(
        lines[1],
        format!("3\t20230131\t0\t{MODULE}\t100\t200\t0\t{IS_A}\t900000000000010007\t{MODIFIER}")
    );
    assert_eq!(
        lines[2],
        format!("13\t20230131\t1\t{MODULE}\t100\t250\t0\t{IS_A}\t900000000000010007\t{MODIFIER}")
    );
    assert_eq!(lines[3], "");
    assert_eq!(lines.len(), 4);
}

#[test]
fn round_trip_produces_no_rows() {
    // Every stated edge exists inferred by identity: nothing is deactivated,
    // nothing is replaced.
    let dir = tempfile::TempDir::new().unwrap();
    let rows = [
        (1, 200, IS_A, ROOT, 0),
        (2, 250, IS_A, 200, 0),
        (3, 100, IS_A, 250, 0),
    ];
    let stated_rows: Vec<String> = rows
        .iter()
        .map(|&(id, s, t, d, g)| stated_row(id, s, t, d, g))
        .collect();
    let inferred_rows: Vec<String> = rows
        .iter()
        .map(|&(id, s, t, d, g)| inferred_row(id + 10, s, t, d, g))
        .collect();
    let stated = write_rf2(dir.path(), "stated.txt", &stated_rows);
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_rows);

    let output = dir.path().join("delta_20230131.txt");
    let mut reconciler = Reconciler::load(&stated, &inferred, None).unwrap();
    let report = reconciler.substitute(&output, "20230131").unwrap();

    assert_eq!(report.needed_replacement, 0);
    assert_eq!(report.replaced, 0);
    let content = fs::read_to_string(&output).unwrap();
    assert_eq!(content, format!("{}{}", rf2::HEADER_ROW, rf2::LINE_DELIMITER));
}

#[test]
fn unresolved_relationships_are_deactivated_but_not_replaced() {
    // No structural candidate at all: the orphan is retained inactive in the
    // output and enumerated in the report.
    let dir = tempfile::TempDir::new().unwrap();
    let stated = write_rf2(
        dir.path(),
        "stated.txt",
        &[
            stated_row(1, 200, IS_A, ROOT, 0),
            stated_row(2, 250, IS_A, 200, 0),
            stated_row(3, 100, IS_A, 250, 0),
            stated_row(4, 100, FINDING_SITE, 200, 1),
        ],
    );
    let mut inferred_rows = inferred_hierarchy();
    inferred_rows.push(inferred_row(13, 100, IS_A, 250, 0));
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_rows);

    let output = dir.path().join("delta_20230131.txt");
    let mut reconciler = Reconciler::load(&stated, &inferred, None).unwrap();
    let report = reconciler.substitute(&output, "20230131").unwrap();

    assert_eq!(report.needed_replacement, 1);
    assert_eq!(report.replaced, 0);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.unresolved_keys, vec![format!("100_200_1_{FINDING_SITE}")]);

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.split(rf2::LINE_DELIMITER).collect();
    assert_eq!(lines.len(), 3); // header + deactivation + trailing empty
    assert!(lines[1].starts_with("4\t20230131\t0\t"));
}

#[test]
fn reruns_are_byte_identical() {
    let dir = tempfile::TempDir::new().unwrap();
    let stated = write_rf2(
        dir.path(),
        "stated.txt",
        &[
            stated_row(1, 200, IS_A, ROOT, 0),
            stated_row(2, 250, IS_A, 200, 0),
            stated_row(3, 100, IS_A, 200, 0),
            stated_row(4, 100, FINDING_SITE, 200, 1),
        ],
    );
    let mut inferred_rows = inferred_hierarchy();
    inferred_rows.push(inferred_row(13, 100, IS_A, 250, 0));
    inferred_rows.push(inferred_row(14, 100, FINDING_SITE, 250, 1));
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_rows);

    let run = |name: &str| -> String {
        let output = dir.path().join(name);
        let mut reconciler = Reconciler::load(&stated, &inferred, None).unwrap();
        reconciler.substitute(&output, "20230131").unwrap();
        fs::read_to_string(&output).unwrap()
    };

    assert_eq!(run("first_20230131.txt"), run("second_20230131.txt"));
}

#[test]
fn multiple_roots_abort_before_any_output() {
    let dir = tempfile::TempDir::new().unwrap();
    let stated = write_rf2(
        dir.path(),
        "stated.txt",
        &[
            stated_row(1, 200, IS_A, ROOT, 0),
            // 300 hangs off a second root (999 never gets a parent row).
            stated_row(2, 300, IS_A, 999, 0),
        ],
    );
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_hierarchy());

    let output = dir.path().join("delta_20230131.txt");
    let mut reconciler = Reconciler::load(&stated, &inferred, None).unwrap();
    let err = reconciler.substitute(&output, "20230131").unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Graph(GraphError::MultipleRoots { count: 2, .. })
    ));
    assert!(!output.exists());
}

#[test]
fn missing_input_is_a_load_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_hierarchy());
    let err = Reconciler::load(&dir.path().join("absent.txt"), &inferred, None).unwrap_err();
    assert!(matches!(err, ReconcileError::Load(_)));
}

#[test]
fn lookup_views_stay_independent() {
    // The same concept id loads as two distinct graph nodes; ancestry in one
    // view says nothing about the other.
    let dir = tempfile::TempDir::new().unwrap();
    let stated = write_rf2(
        dir.path(),
        "stated.txt",
        &[
            stated_row(1, 200, IS_A, ROOT, 0),
            stated_row(3, 100, IS_A, 200, 0),
        ],
    );
    let mut inferred_rows = inferred_hierarchy();
    inferred_rows.push(inferred_row(13, 100, IS_A, 250, 0));
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_rows);

    let reconciler = Reconciler::load(&stated, &inferred, None).unwrap();
    assert!(reconciler.inferred().is_descendant(sct(100), sct(200)));
    assert!(!reconciler.stated().is_descendant(sct(100), sct(250)));
    // Lookup of an unknown concept must not panic.
    reconciler.lookup(sct(424_242));
}

#[test]
fn descriptions_feed_diagnostic_formatting() {
    let dir = tempfile::TempDir::new().unwrap();
    let stated = write_rf2(
        dir.path(),
        "stated.txt",
        &[stated_row(1, 200, IS_A, ROOT, 0)],
    );
    let inferred = write_rf2(dir.path(), "inferred.txt", &inferred_hierarchy());

    let desc_path = dir.path().join("descriptions.txt");
    fs::write(
        &desc_path,
        "id\teffectiveTime\tactive\tmoduleId\tconceptId\tlanguageCode\ttypeId\tterm\tcaseSignificanceId\n\
         101\t20220131\t1\tm\t200\ten\t900000000000003001\tPneumonia (disorder)\tc\n",
    )
    .unwrap();

    let reconciler = Reconciler::load(&stated, &inferred, Some(&desc_path)).unwrap();
    assert_eq!(
        reconciler.format_concept(sct(200)),
        "200|Pneumonia (disorder)|"
    );
    assert_eq!(reconciler.format_concept(sct(100)), "100");
}
