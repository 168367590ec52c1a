// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Runs a model over a data loader without gradients and turns
// the per-batch results into one flat metric map:
//
//   eval_loss                 — sample-weighted mean loss
//   eval_<metric>             — task metrics (accuracy, f1, ...)
//   eval_runtime              — wall-clock seconds
//   eval_samples_per_second
//   eval_steps_per_second
//   epoch                     — fractional epoch at evaluation time
//
// Classification metrics are macro-averaged over the labels seen
// in either the references or the predictions, so a subset that
// only holds one label still gets a meaningful score.

use std::{collections::BTreeSet, time::Instant};

use burn::{data::dataloader::DataLoader, prelude::*};

use crate::ml::trainer::Objective;

/// Metric name → value, insertion ordered
pub type MetricMap = Vec<(String, f64)>;

/// Task metrics computed from (predictions, references)
pub type MetricsFn = fn(&[i64], &[i64]) -> MetricMap;

/// What one evaluation batch contributes
#[derive(Debug, Clone, Default)]
pub struct EvalStep {
    pub loss:        f64,
    pub samples:     usize,
    pub predictions: Vec<i64>,
    pub references:  Vec<i64>,
}

impl EvalStep {
    pub fn loss_only(loss: f64, samples: usize) -> Self {
        Self { loss, samples, ..Default::default() }
    }
}

/// Seq2seq evaluation only reports the loss
pub fn no_metrics(_predictions: &[i64], _references: &[i64]) -> MetricMap {
    Vec::new()
}

pub fn classification_metrics(predictions: &[i64], references: &[i64]) -> MetricMap {
    let total = references.len();
    if total == 0 {
        return ["accuracy", "f1", "precision", "recall"]
            .iter()
            .map(|name| (name.to_string(), f64::NAN))
            .collect();
    }

    let correct = predictions.iter().zip(references).filter(|(p, r)| p == r).count();
    let labels: BTreeSet<i64> = predictions.iter().chain(references).copied().collect();

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let (mut precision_sum, mut recall_sum, mut f1_sum) = (0.0, 0.0, 0.0);
    for &label in &labels {
        let tp = predictions.iter().zip(references).filter(|(&p, &r)| p == label && r == label).count();
        let predicted = predictions.iter().filter(|&&p| p == label).count();
        let actual    = references.iter().filter(|&&r| r == label).count();

        let precision = ratio(tp, predicted);
        let recall    = ratio(tp, actual);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        precision_sum += precision;
        recall_sum    += recall;
        f1_sum        += f1;
    }

    let n = labels.len() as f64;
    vec![
        ("accuracy".to_string(),  correct as f64 / total as f64),
        ("f1".to_string(),        f1_sum / n),
        ("precision".to_string(), precision_sum / n),
        ("recall".to_string(),    recall_sum / n),
    ]
}

/// Evaluate `model` on every batch of `loader`.
pub fn evaluate<B, M, T>(
    model:   &M,
    loader:  &dyn DataLoader<B, T>,
    metrics: MetricsFn,
    epoch:   f64,
) -> MetricMap
where
    B: Backend,
    M: Objective<B, T>,
{
    let started = Instant::now();
    let mut loss_sum    = 0.0f64;
    let mut samples     = 0usize;
    let mut steps       = 0usize;
    let mut predictions = Vec::new();
    let mut references  = Vec::new();

    for batch in loader.iter() {
        let step = model.evaluate(batch);
        loss_sum += step.loss * step.samples as f64;
        samples  += step.samples;
        steps    += 1;
        predictions.extend(step.predictions);
        references.extend(step.references);
    }

    let runtime = started.elapsed().as_secs_f64();
    let loss = if samples > 0 { loss_sum / samples as f64 } else { f64::NAN };

    let mut out: MetricMap = vec![("eval_loss".to_string(), loss)];
    out.extend(
        metrics(&predictions, &references)
            .into_iter()
            .map(|(name, value)| (format!("eval_{name}"), value)),
    );

    let per_second = |count: usize| if runtime > 0.0 { count as f64 / runtime } else { 0.0 };
    out.push(("eval_runtime".to_string(), runtime));
    out.push(("eval_samples_per_second".to_string(), per_second(samples)));
    out.push(("eval_steps_per_second".to_string(), per_second(steps)));
    out.push(("epoch".to_string(), epoch));

    tracing::debug!("Evaluated {} samples in {:.2}s, loss={:.4}", samples, runtime, loss);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(map: &MetricMap, name: &str) -> f64 {
        map.iter().find(|(k, _)| k == name).map(|(_, v)| *v).unwrap()
    }

    #[test]
    fn test_perfect_predictions() {
        let m = classification_metrics(&[0, 2, 3, 1], &[0, 2, 3, 1]);
        for name in ["accuracy", "f1", "precision", "recall"] {
            assert!((metric(&m, name) - 1.0).abs() < 1e-12, "{name}");
        }
    }

    #[test]
    fn test_macro_average() {
        // label 0: tp=1 fp=1 fn=0 → p=0.5 r=1.0 f1=2/3
        // label 1: tp=0 fp=0 fn=1 → p=0   r=0   f1=0
        let m = classification_metrics(&[0, 0], &[0, 1]);
        assert!((metric(&m, "accuracy") - 0.5).abs() < 1e-12);
        assert!((metric(&m, "precision") - 0.25).abs() < 1e-12);
        assert!((metric(&m, "recall") - 0.5).abs() < 1e-12);
        assert!((metric(&m, "f1") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_view_gives_nan() {
        let m = classification_metrics(&[], &[]);
        assert_eq!(m.len(), 4);
        assert!(m.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn test_no_metrics_is_empty() {
        assert!(no_metrics(&[1], &[1]).is_empty());
    }
}
