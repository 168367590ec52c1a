// ============================================================
// Layer 6 — Result Reports
// ============================================================
// Two append-only files that outlive a single run:
//
//   results/<run>-sc.csv — one row per evaluated dataset view.
//                          The header is written only when the file
//                          is created, so repeated runs append rows
//                          under the first run's header.
//   performance.txt      — one "Training time for <model>: <secs>"
//                          line per seq2seq training run.
//
// Column order is the union of the rows' metric names in first-seen
// order, with `dataset` last. A metric missing from a row is written
// as an empty field, and so is NaN.
//
// Example CSV output:
//   eval_loss,eval_accuracy,eval_f1,...,epoch,dataset
//   0.412,0.85,0.81,...,3.0,train
//   0.733,0.7,0.64,...,3.0,valid

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::result_row::{ResultRow, DATASET_COLUMN};

pub struct ResultsReport {
    csv_path: PathBuf,
}

impl ResultsReport {
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self { csv_path: csv_path.into() }
    }

    /// `<dir>/<run_name>-sc.csv`
    pub fn for_run(dir: &Path, run_name: &str) -> Self {
        Self::new(dir.join(format!("{run_name}-sc.csv")))
    }

    /// Append `rows`, writing the header first if the file is new.
    pub fn append(&self, rows: &[ResultRow]) -> Result<()> {
        if let Some(parent) = self.csv_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let print_header = !self.csv_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        let mut writer = csv::Writer::from_writer(file);

        let metric_columns = metric_columns(rows);
        if print_header {
            let mut header: Vec<&str> = metric_columns.iter().map(String::as_str).collect();
            header.push(DATASET_COLUMN);
            writer.write_record(&header)?;
        }

        for row in rows {
            let mut record: Vec<String> = metric_columns
                .iter()
                .map(|name| row.get(name).map(format_value).unwrap_or_default())
                .collect();
            record.push(row.dataset.clone());
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .with_context(|| format!("Cannot write '{}'", self.csv_path.display()))?;

        tracing::info!("Appended {} rows to '{}'", rows.len(), self.csv_path.display());
        Ok(())
    }
}

fn metric_columns(rows: &[ResultRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for (name, _) in &row.metrics {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

/// Whole numbers keep one decimal ("3.0"); NaN becomes empty.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub struct PerformanceLog {
    path: PathBuf,
}

impl PerformanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append_training_time(&self, model_name: &str, seconds: f64) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;
        writeln!(f, "Training time for {model_name}: {seconds}")?;
        tracing::debug!("Recorded training time in '{}'", self.path.display());
        Ok(())
    }
}
