//! JSON output formatting
//!
//! One report per run: the job parameters, the product matrix as nested rows
//! and the coordinator's dispatch statistics.

use crate::distributed::{DispatchStats, Product, Schedule};
use crate::matrix::{Element, Matrix};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub dimension: usize,
    pub workers: usize,
    pub schedule: Schedule,
    pub elapsed_ms: u64,
    pub matrix_c: Vec<Vec<Element>>,
    pub stats: DispatchStats,
}

impl JsonReport {
    pub fn new(product: &Product, schedule: Schedule, elapsed: Duration) -> Self {
        Self {
            generated_at: Utc::now(),
            dimension: product.matrix.dimension(),
            workers: product.stats.per_worker.len(),
            schedule,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            matrix_c: matrix_rows(&product.matrix),
            stats: product.stats.clone(),
        }
    }
}

fn matrix_rows(matrix: &Matrix) -> Vec<Vec<Element>> {
    matrix.rows().map(<[Element]>::to_vec).collect()
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::WorkerDispatch;

    fn product() -> Product {
        Product {
            matrix: Matrix::from_rows(vec![vec![0, 1], vec![0, 2]]).unwrap(),
            stats: DispatchStats {
                units_dispatched: 4,
                results_received: 4,
                per_worker: vec![WorkerDispatch {
                    worker: 0,
                    units_dispatched: 4,
                    results_received: 4,
                    terminated: true,
                }],
            },
        }
    }

    #[test]
    fn test_report_fields() {
        let report = JsonReport::new(&product(), Schedule::Dynamic, Duration::from_millis(12));
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["dimension"], 2);
        assert_eq!(value["workers"], 1);
        assert_eq!(value["schedule"], "dynamic");
        assert_eq!(value["elapsed_ms"], 12);
        assert_eq!(value["matrix_c"], serde_json::json!([[0, 1], [0, 2]]));
        assert_eq!(value["stats"]["units_dispatched"], 4);
        assert_eq!(value["stats"]["per_worker"][0]["terminated"], true);
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = JsonReport::new(&product(), Schedule::Static, Duration::ZERO);

        write_json_output(&path, &report, true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: JsonReport = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.schedule, Schedule::Static);
        assert_eq!(parsed.matrix_c, vec![vec![0, 1], vec![0, 2]]);
        assert_eq!(parsed.stats, report.stats);
    }

    #[test]
    fn test_write_json_output_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let report = JsonReport::new(&product(), Schedule::Dynamic, Duration::ZERO);
        assert!(write_json_output(&dir.path().join("missing/report.json"), &report, false).is_err());
    }
}
