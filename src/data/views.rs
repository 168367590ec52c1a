// ============================================================
// Layer 4 — Classifier Dataset Views
// ============================================================
// Builds the six views the classifier is evaluated on:
//
//   train        — every row of train.csv
//   valid        — every row of val.csv
//   test_none    — test rows with label 0
//   test_better  — test rows with label 2
//   test_worse   — test rows with label 3
//   test         — every row of test.csv, whatever its label
//
// The label-conditioned subsets are plain filters over the test
// split: no shuffling, so the same files always give the same
// assignment, and each labelled row lands in exactly one subset.
// Rows with any other label (e.g. 1) only appear in `test`.

use crate::domain::example::LabeledText;

/// Label-conditioned test subsets: (view name, label value)
pub const TEST_SUBSETS: [(&str, i64); 3] = [
    ("test_none",   0),
    ("test_better", 2),
    ("test_worse",  3),
];

#[derive(Debug, Clone)]
pub struct DatasetView {
    /// Tag written to the `dataset` column of the report
    pub name: &'static str,
    pub rows: Vec<LabeledText>,
}

impl DatasetView {
    fn new(name: &'static str, rows: Vec<LabeledText>) -> Self {
        Self { name, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierViews {
    pub train:       DatasetView,
    pub validation:  DatasetView,
    pub test:        DatasetView,
    pub test_better: DatasetView,
    pub test_worse:  DatasetView,
    pub test_none:   DatasetView,
}

impl ClassifierViews {
    pub fn build(
        train:      Vec<LabeledText>,
        validation: Vec<LabeledText>,
        test:       Vec<LabeledText>,
    ) -> Self {
        let subset = |label: i64| -> Vec<LabeledText> {
            test.iter().filter(|row| row.label == label).cloned().collect()
        };
        let [(none_name, none), (better_name, better), (worse_name, worse)] = TEST_SUBSETS;

        let views = Self {
            train:       DatasetView::new("train", train),
            validation:  DatasetView::new("valid", validation),
            test_none:   DatasetView::new(none_name, subset(none)),
            test_better: DatasetView::new(better_name, subset(better)),
            test_worse:  DatasetView::new(worse_name, subset(worse)),
            test:        DatasetView::new("test", test),
        };

        tracing::info!(
            "Views: train={} valid={} test={} (better={} worse={} none={})",
            views.train.len(), views.validation.len(), views.test.len(),
            views.test_better.len(), views.test_worse.len(), views.test_none.len(),
        );
        views
    }

    /// Views in the order they are evaluated and reported
    pub fn evaluation_order(&self) -> [&DatasetView; 6] {
        [
            &self.train,
            &self.validation,
            &self.test,
            &self.test_better,
            &self.test_worse,
            &self.test_none,
        ]
    }

    /// Every row of every view, used to check labels up front
    pub fn all_rows(&self) -> impl Iterator<Item = &LabeledText> {
        self.train.rows.iter()
            .chain(self.validation.rows.iter())
            .chain(self.test.rows.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(labels: &[i64]) -> Vec<LabeledText> {
        labels
            .iter()
            .enumerate()
            .map(|(i, &label)| LabeledText::new(format!("text {i}"), label))
            .collect()
    }

    #[test]
    fn test_report_order_and_names() {
        let views = ClassifierViews::build(rows(&[0; 10]), rows(&[1, 2]), rows(&[0, 2, 3, 1]));
        let names: Vec<&str> = views.evaluation_order().iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["train", "valid", "test", "test_better", "test_worse", "test_none"]);
    }

    #[test]
    fn test_subsets_pick_matching_labels() {
        let views = ClassifierViews::build(rows(&[0; 10]), rows(&[1, 2]), rows(&[0, 2, 3, 1]));

        assert_eq!(views.test_better.rows, vec![LabeledText::new("text 1", 2)]);
        assert_eq!(views.test_worse.rows,  vec![LabeledText::new("text 2", 3)]);
        assert_eq!(views.test_none.rows,   vec![LabeledText::new("text 0", 0)]);
        assert_eq!(views.test.len(), 4);
    }

    #[test]
    fn test_subsets_partition_labelled_rows() {
        let test  = rows(&[0, 3, 3, 2, 1, 0, 2, 5, 0]);
        let views = ClassifierViews::build(Vec::new(), Vec::new(), test.clone());

        for row in &test {
            let hits = [&views.test_none, &views.test_better, &views.test_worse]
                .iter()
                .filter(|v| v.rows.contains(row))
                .count();
            let expected = usize::from(matches!(row.label, 0 | 2 | 3));
            assert_eq!(hits, expected, "row {:?}", row);
        }
        assert_eq!(views.test.rows, test);
    }

    #[test]
    fn test_views_are_deterministic() {
        let build = || ClassifierViews::build(rows(&[1, 0, 2]), rows(&[3]), rows(&[2, 0, 3, 3]));
        let (a, b) = (build(), build());
        for (left, right) in a.evaluation_order().iter().zip(b.evaluation_order()) {
            assert_eq!(left.rows, right.rows);
        }
    }
}
