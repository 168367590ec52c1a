// ============================================================
// Layer 3 — Result Row
// ============================================================
// One evaluation outcome: an ordered list of (metric, value)
// pairs plus the name of the dataset view that produced it.
//
// Order matters: the first row written to a new report decides
// the CSV column order, so metrics keep insertion order instead
// of being stored in a HashMap.

use serde::{Deserialize, Serialize};

/// Column name of the dataset tag in every report.
pub const DATASET_COLUMN: &str = "dataset";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Metric name → value, in the order the evaluator produced them
    pub metrics: Vec<(String, f64)>,

    /// Which dataset view these metrics describe (e.g. "test_better")
    pub dataset: String,
}

impl ResultRow {
    pub fn new(metrics: Vec<(String, f64)>, dataset: impl Into<String>) -> Self {
        Self {
            metrics,
            dataset: dataset.into(),
        }
    }

    /// Look up a metric by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_metric() {
        let row = ResultRow::new(vec![("eval_f1".into(), 0.4)], "test");
        assert_eq!(row.get("eval_f1"), Some(0.4));
        assert_eq!(row.get("eval_loss"), None);
    }
}
