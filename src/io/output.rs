use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::aggregate::{AggregatedResult, CompartmentMatrix};
use crate::batch::BatchOutcome;
use crate::error::AggregationWarning;

pub const DAY_INDEX_LABEL: &str = "days since first case";

/// Write one matrix as CSV: a header row of scenario ids, then one row per
/// day. Missing cells are left empty.
pub fn write_matrix_csv<W: Write>(writer: W, matrix: &CompartmentMatrix) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(matrix.columns() + 1);
    header.push(DAY_INDEX_LABEL.to_string());
    header.extend(matrix.scenarios.iter().cloned());
    wtr.write_record(&header)?;

    for (day, row) in matrix.days.iter().zip(&matrix.values) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(day.to_string());
        record.extend(row.iter().map(|v| v.map(|x| format!("{:.6}", x)).unwrap_or_default()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `<compartment>.csv` for every matrix into `out_dir`.
pub fn write_matrices_csv(out_dir: impl AsRef<Path>, result: &AggregatedResult) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir.as_ref()).context("create output dir failed")?;
    let mut paths = Vec::with_capacity(result.matrices.len());
    for matrix in &result.matrices {
        let path = out_dir.as_ref().join(format!("{}.csv", matrix.compartment));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create matrix file failed (path={:?})", path))?;
        write_matrix_csv(file, matrix).with_context(|| format!("write matrix failed (path={:?})", path))?;
        paths.push(path);
    }
    Ok(paths)
}

#[derive(Serialize)]
struct MatrixDocument<'a> {
    index_label: &'static str,
    tables: &'a [CompartmentMatrix],
}

/// All matrices in one JSON document.
pub fn write_matrices_json(path: impl AsRef<Path>, result: &AggregatedResult) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).with_context(|| format!("create json file failed (path={:?})", path))?;
    let doc = MatrixDocument { index_label: DAY_INDEX_LABEL, tables: &result.matrices };
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &doc)?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct FailureRecord {
    pub scenario: String,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failures: Vec<FailureRecord>,
    pub warnings: Vec<AggregationWarning>,
}

impl RunSummary {
    pub fn new(outcome: &BatchOutcome, warnings: &[AggregationWarning]) -> Self {
        Self {
            succeeded: outcome.trajectories.iter().map(|t| t.scenario.clone()).collect(),
            failures: outcome
                .failures
                .iter()
                .map(|f| FailureRecord {
                    scenario: f.scenario.clone(),
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
            warnings: warnings.to_vec(),
        }
    }
}

pub fn write_run_summary(
    path: impl AsRef<Path>,
    outcome: &BatchOutcome,
    warnings: &[AggregationWarning],
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).with_context(|| format!("create summary file failed (path={:?})", path))?;
    serde_json::to_writer_pretty(file, &RunSummary::new(outcome, warnings))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seir::Compartment;

    fn matrix() -> CompartmentMatrix {
        CompartmentMatrix {
            compartment: Compartment::Infected,
            days: vec![0, 1, 3],
            scenarios: vec!["north".into(), "south".into()],
            values: vec![
                vec![Some(10.0), Some(5.0)],
                vec![Some(9.8312), Some(6.25)],
                vec![None, Some(7.5)],
            ],
        }
    }

    #[test]
    fn matrix_csv_layout() {
        let mut buf = Vec::new();
        write_matrix_csv(&mut buf, &matrix()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        insta::assert_snapshot!(text, @r"
        days since first case,north,south
        0,10.000000,5.000000
        1,9.831200,6.250000
        3,,7.500000
        ");
    }

    #[test]
    fn writes_one_file_per_compartment_and_json() {
        let mut exposed = matrix();
        exposed.compartment = Compartment::Exposed;
        let result = AggregatedResult { matrices: vec![matrix(), exposed], warnings: Vec::new() };

        let tmp = tempfile::tempdir().unwrap();
        let paths = write_matrices_csv(tmp.path(), &result).unwrap();
        assert_eq!(paths, vec![tmp.path().join("infected.csv"), tmp.path().join("exposed.csv")]);

        let json_path = tmp.path().join("matrices.json");
        write_matrices_json(&json_path, &result).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(doc["index_label"], DAY_INDEX_LABEL);
        assert_eq!(doc["tables"][1]["compartment"], "exposed");
        assert!(doc["tables"][0]["values"][2][0].is_null());
    }
}
