// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One generic loop shared by the seq2seq and classifier
// pipelines. The model decides what a batch means through the
// `Objective` trait; the loop only knows about steps.
//
// Per optimizer step:
//   1. forward + loss on `gradient_accumulation_steps` batches,
//      each loss divided by the accumulation count
//   2. gradients summed with GradientsAccumulator
//   3. AdamW step at the scheduled learning rate
//   4. hooks: log → evaluate → save, each on its own strategy
//
// Burn split:
//   - Training runs on B (an AutodiffBackend)
//   - Evaluation runs on model.valid(), i.e. B::InnerBackend,
//     so the eval loader must batch for the inner backend
//
// Outputs under `output_dir`:
//   checkpoint-<step>/        model artifacts + trainer_state.json
//   trainer_state.json        final state (log history, best metric)

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    path::Path,
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::Serialize;

use crate::data::dataset::SampleDataset;
use crate::ml::arguments::{IntervalStrategy, OptimizerKind, TrainingArguments};
use crate::ml::evaluation::{evaluate, EvalStep, MetricMap, MetricsFn};
use crate::ml::scheduler::LrSchedule;

pub const TRAINER_STATE_FILE: &str = "trainer_state.json";

/// What a model computes for one batch of type `T`
pub trait Objective<B: Backend, T> {
    /// Scalar training loss, still attached to the autodiff graph
    fn loss(&self, batch: T) -> Tensor<B, 1>;

    /// Loss plus predictions, detached
    fn evaluate(&self, batch: T) -> EvalStep;
}

/// Where checkpoints go. Implemented by the model store so the
/// loop stays free of file formats.
pub trait CheckpointSink<B: Backend, M> {
    fn save_checkpoint(&self, model: &M, dir: &Path) -> Result<()>;
}

// ─── Loaders ──────────────────────────────────────────────────────────────────

/// Build a data loader over `samples`. `shuffle_seed = None` keeps
/// the dataset order, which evaluation relies on.
pub fn build_loader<B, Bt, I, O>(
    batcher:      Bt,
    samples:      Vec<I>,
    batch_size:   usize,
    shuffle_seed: Option<u64>,
    device:       &B::Device,
) -> Arc<dyn DataLoader<B, O>>
where
    B:  Backend,
    Bt: Batcher<B, I, O> + 'static,
    I:  Send + Sync + Clone + Debug + 'static,
    O:  Send + Clone + Debug + 'static,
{
    let builder = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size.max(1))
        .num_workers(1)
        .set_device(device.clone());

    let builder = match shuffle_seed {
        Some(seed) => builder.shuffle(seed),
        None       => builder,
    };
    builder.build(SampleDataset::new(samples))
}

// ─── State ────────────────────────────────────────────────────────────────────

/// One line of the log history: the step plus whatever was measured
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub step: usize,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainerState {
    pub global_step:   usize,
    pub max_steps:     usize,
    pub epoch:         f64,
    pub best_metric:   Option<f64>,
    pub best_step:     Option<usize>,
    pub log_history:   Vec<LogEntry>,
    pub train_runtime: f64,
}

impl TrainerState {
    fn push(&mut self, values: impl IntoIterator<Item = (String, f64)>) {
        self.log_history.push(LogEntry {
            step:   self.global_step,
            values: values.into_iter().collect(),
        });
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create {}", dir.display()))?;
        let path = dir.join(TRAINER_STATE_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write {}", path.display()))
    }
}

pub struct TrainOutcome<M> {
    pub model: M,
    pub state: TrainerState,
}

// ─── Loop ─────────────────────────────────────────────────────────────────────

pub struct Trainer<'a, B: AutodiffBackend, M> {
    args:    &'a TrainingArguments,
    sink:    &'a dyn CheckpointSink<B, M>,
    metrics: MetricsFn,
}

impl<'a, B, M> Trainer<'a, B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    pub fn new(args: &'a TrainingArguments, sink: &'a dyn CheckpointSink<B, M>, metrics: MetricsFn) -> Self {
        Self { args, sink, metrics }
    }

    /// Run the full training loop and return the final (or best) model.
    pub fn train<TB, VB>(
        &self,
        mut model:    M,
        train_loader: Arc<dyn DataLoader<B, TB>>,
        eval_loader:  Option<Arc<dyn DataLoader<B::InnerBackend, VB>>>,
    ) -> Result<TrainOutcome<M>>
    where
        M: Objective<B, TB>,
        M::InnerModule: Objective<B::InnerBackend, VB>,
    {
        let args = self.args;
        args.validate()?;
        B::seed(args.seed);
        self.prepare_output_dir()?;
        self.warn_unsupported_reporters();

        let accumulation      = args.gradient_accumulation_steps;
        let batches_per_epoch = train_loader.num_items().div_ceil(args.per_device_train_batch_size).max(1);
        let steps_per_epoch   = batches_per_epoch.div_ceil(accumulation);
        let max_steps         = steps_per_epoch * args.num_train_epochs;
        let schedule = LrSchedule::new(args.lr_scheduler, args.learning_rate, args.warmup_steps, max_steps);

        tracing::info!("***** Running training *****");
        if let Some(run_name) = &args.run_name {
            tracing::info!("  Run name                    = {}", run_name);
        }
        tracing::info!("  Num examples                = {}", train_loader.num_items());
        tracing::info!("  Num epochs                  = {}", args.num_train_epochs);
        tracing::info!("  Batch size per device       = {}", args.per_device_train_batch_size);
        tracing::info!("  Gradient accumulation steps = {}", accumulation);
        tracing::info!("  Total optimization steps    = {}", max_steps);

        let mut optim = match args.optimizer {
            OptimizerKind::AdamW => AdamWConfig::new()
                .with_weight_decay(args.weight_decay as f32)
                .with_grad_clipping(Some(GradientClippingConfig::Norm(args.max_grad_norm as f32)))
                .init(),
        };
        let mut accumulator = GradientsAccumulator::<M>::new();

        let mut state = TrainerState { max_steps, ..Default::default() };
        let mut best_model: Option<M> = None;
        let started = Instant::now();

        // Loss summed since the last log line, counted in batches
        let mut loss_since_log    = 0.0f64;
        let mut batches_since_log = 0usize;

        for epoch in 0..args.num_train_epochs {
            let mut pending = 0usize;

            for (index, batch) in train_loader.iter().enumerate() {
                let loss = model.loss(batch);
                loss_since_log    += loss.clone().into_scalar().elem::<f64>();
                batches_since_log += 1;

                let scaled = loss.div_scalar(accumulation as f64);
                let grads  = GradientsParams::from_grads(scaled.backward(), &model);
                accumulator.accumulate(&model, grads);
                pending += 1;

                let last_batch = index + 1 == batches_per_epoch;
                if pending < accumulation && !last_batch {
                    continue;
                }

                let lr = schedule.lr_at(state.global_step);
                model = optim.step(lr, model, accumulator.grads());
                pending = 0;
                state.global_step += 1;
                state.epoch = epoch as f64 + (index + 1) as f64 / batches_per_epoch as f64;

                let step = state.global_step;
                let log_now = (args.logging_first_step && step == 1)
                    || (args.logging_strategy == IntervalStrategy::Steps && step % args.logging_steps == 0);
                if log_now {
                    self.log_training(&mut state, &mut loss_since_log, &mut batches_since_log, lr);
                }

                if args.eval_strategy == IntervalStrategy::Steps
                    && step % args.eval_steps == 0
                    && step as f64 >= args.eval_delay
                {
                    self.evaluate_and_track(&model, eval_loader.as_ref(), &mut state, &mut best_model);
                }

                if args.save_strategy == IntervalStrategy::Steps && step % args.save_steps == 0 {
                    self.save(&model, &state)?;
                }
            }

            // ── Epoch-end hooks ────────────────────────────────────────────────
            state.epoch = (epoch + 1) as f64;
            let lr = schedule.lr_at(state.global_step);

            if args.logging_strategy == IntervalStrategy::Epoch && batches_since_log > 0 {
                self.log_training(&mut state, &mut loss_since_log, &mut batches_since_log, lr);
            }
            if args.eval_strategy == IntervalStrategy::Epoch && state.epoch >= args.eval_delay {
                self.evaluate_and_track(&model, eval_loader.as_ref(), &mut state, &mut best_model);
            }
            if args.save_strategy == IntervalStrategy::Epoch {
                self.save(&model, &state)?;
            }
        }

        state.train_runtime = started.elapsed().as_secs_f64();
        state.push([
            ("train_runtime".to_string(), state.train_runtime),
            ("epoch".to_string(), state.epoch),
        ]);
        tracing::info!(
            "Training finished: {} steps in {:.1}s",
            state.global_step,
            state.train_runtime,
        );

        if args.load_best_model_at_end {
            if let (Some(best), Some(step)) = (best_model, state.best_step) {
                tracing::info!(
                    "Loading best model from step {} ({} = {:?})",
                    step,
                    args.best_metric_key().unwrap_or_default(),
                    state.best_metric,
                );
                model = best;
            }
        }

        state.write(&args.output_dir)?;
        Ok(TrainOutcome { model, state })
    }

    fn log_training(&self, state: &mut TrainerState, loss_sum: &mut f64, batches: &mut usize, lr: f64) {
        let loss = if *batches > 0 { *loss_sum / *batches as f64 } else { f64::NAN };
        tracing::info!(
            "step {:>6} | epoch {:.2} | loss {:.4} | lr {:.3e}",
            state.global_step,
            state.epoch,
            loss,
            lr,
        );
        state.push([
            ("loss".to_string(), loss),
            ("learning_rate".to_string(), lr),
            ("epoch".to_string(), state.epoch),
        ]);
        *loss_sum = 0.0;
        *batches  = 0;
    }

    fn evaluate_and_track<VB>(
        &self,
        model:      &M,
        loader:     Option<&Arc<dyn DataLoader<B::InnerBackend, VB>>>,
        state:      &mut TrainerState,
        best_model: &mut Option<M>,
    ) where
        M::InnerModule: Objective<B::InnerBackend, VB>,
    {
        let Some(loader) = loader else {
            tracing::warn!("Evaluation requested but no evaluation dataset was given");
            return;
        };

        let metrics: MetricMap = evaluate(&model.valid(), loader.as_ref(), self.metrics, state.epoch);
        tracing::info!("step {:>6} | {}", state.global_step, format_metrics(&metrics));

        if let Some(key) = self.args.best_metric_key() {
            match metrics.iter().find(|(name, _)| *name == key).map(|(_, v)| *v) {
                Some(value) if self.improves(value, state.best_metric) => {
                    state.best_metric = Some(value);
                    state.best_step   = Some(state.global_step);
                    if self.args.load_best_model_at_end {
                        *best_model = Some(model.clone());
                    }
                }
                Some(_) => {}
                None => tracing::warn!("Metric '{}' not found in evaluation output", key),
            }
        }

        state.push(metrics);
    }

    fn improves(&self, value: f64, best: Option<f64>) -> bool {
        if value.is_nan() {
            return false;
        }
        match best {
            None => true,
            Some(best) if self.args.greater_is_better() => value > best,
            Some(best) => value < best,
        }
    }

    fn save(&self, model: &M, state: &TrainerState) -> Result<()> {
        let dir = self.args.output_dir.join(format!("checkpoint-{}", state.global_step));
        self.sink.save_checkpoint(model, &dir)?;
        state.write(&dir)?;
        tracing::info!("Checkpoint saved to {}", dir.display());
        Ok(())
    }

    fn prepare_output_dir(&self) -> Result<()> {
        let dir = &self.args.output_dir;
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create output directory {}", dir.display()))?;

        let checkpoints: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("checkpoint-"))
            })
            .collect();

        if checkpoints.is_empty() {
            return Ok(());
        }
        if self.args.overwrite_output_dir {
            for path in &checkpoints {
                fs::remove_dir_all(path)
                    .with_context(|| format!("Cannot remove {}", path.display()))?;
            }
            tracing::info!("Removed {} old checkpoints from {}", checkpoints.len(), dir.display());
        } else {
            tracing::warn!(
                "{} already holds {} checkpoints; matching steps will be overwritten",
                dir.display(),
                checkpoints.len(),
            );
        }
        Ok(())
    }

    fn warn_unsupported_reporters(&self) {
        for target in &self.args.report_to {
            if target != "none" {
                tracing::warn!(
                    "report_to '{}' is not available; metrics go to the log and {}",
                    target,
                    TRAINER_STATE_FILE,
                );
            }
        }
    }
}

pub fn format_metrics(metrics: &MetricMap) -> String {
    metrics
        .iter()
        .map(|(name, value)| format!("{name}={value:.4}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;
    use std::cell::RefCell;

    use crate::data::batcher::{ClassifierBatch, ClassifierBatcher};
    use crate::data::dataset::ClassifierSample;
    use crate::ml::evaluation::classification_metrics;
    use crate::ml::model::{ClassifierConfig, ClassifierModel};

    type B = Autodiff<NdArray>;
    type Inner = NdArray;

    struct RecordingSink {
        saved: RefCell<Vec<String>>,
    }

    impl CheckpointSink<B, ClassifierModel<B>> for RecordingSink {
        fn save_checkpoint(&self, _model: &ClassifierModel<B>, dir: &Path) -> Result<()> {
            fs::create_dir_all(dir)?;
            let name = dir.file_name().unwrap().to_string_lossy().to_string();
            self.saved.borrow_mut().push(name);
            Ok(())
        }
    }

    fn samples(n: usize) -> Vec<ClassifierSample> {
        (0..n)
            .map(|i| ClassifierSample {
                input_ids:      vec![2 + (i % 5) as u32, 3, 0, 0],
                attention_mask: vec![1, 1, 0, 0],
                label:          i % 4,
            })
            .collect()
    }

    /// Token `2 + k` always carries label `(k + shift) % 4`
    fn shifted_samples(n: usize, shift: usize) -> Vec<ClassifierSample> {
        (0..n)
            .map(|i| ClassifierSample {
                input_ids:      vec![2 + (i % 4) as u32, 3, 0, 0],
                attention_mask: vec![1, 1, 0, 0],
                label:          (i + shift) % 4,
            })
            .collect()
    }

    fn last_eval(state: &TrainerState) -> Option<&BTreeMap<String, f64>> {
        state
            .log_history
            .iter()
            .rev()
            .map(|entry| &entry.values)
            .find(|values| values.contains_key("eval_loss"))
    }

    fn tiny_model(device: &<B as Backend>::Device) -> ClassifierModel<B> {
        ClassifierConfig::new(16, 0)
            .with_max_seq_len(4)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(16)
            .with_dropout(0.0)
            .init(device)
    }

    #[test]
    fn test_steps_logging_eval_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let mut args = TrainingArguments::new(dir.path());
        args.set_training(2, 2)
            .set_evaluate(IntervalStrategy::Steps, 2, 0.0, 4)
            .set_logging(IntervalStrategy::Steps, 1, vec![], false, "info")
            .set_save(IntervalStrategy::Steps, 3);
        args.load_best_model_at_end = true;
        args.metric_for_best_model  = Some("loss".into());

        let train = build_loader::<B, _, _, ClassifierBatch<B>>(ClassifierBatcher, samples(8), 2, Some(1), &device);
        let eval  = build_loader::<Inner, _, _, ClassifierBatch<Inner>>(ClassifierBatcher, samples(4), 4, None, &device);

        let sink = RecordingSink { saved: RefCell::new(Vec::new()) };
        let trainer = Trainer::<B, ClassifierModel<B>>::new(&args, &sink, classification_metrics);
        let outcome = trainer.train(tiny_model(&device), train, Some(eval)).unwrap();

        // 8 samples / batch 2 = 4 steps per epoch, 2 epochs
        assert_eq!(outcome.state.global_step, 8);
        assert_eq!(outcome.state.max_steps, 8);
        assert_eq!(*sink.saved.borrow(), vec!["checkpoint-3", "checkpoint-6"]);

        let evals = outcome.state.log_history.iter().filter(|e| e.values.contains_key("eval_loss")).count();
        assert_eq!(evals, 4);
        let logs = outcome.state.log_history.iter().filter(|e| e.values.contains_key("loss")).count();
        assert_eq!(logs, 8);

        assert!(outcome.state.best_metric.is_some());
        assert!(last_eval(&outcome.state).unwrap().contains_key("eval_accuracy"));
        assert!(dir.path().join(TRAINER_STATE_FILE).exists());
        assert!(dir.path().join("checkpoint-3").join(TRAINER_STATE_FILE).exists());
    }

    #[test]
    fn test_best_model_replaces_final_model() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let mut args = TrainingArguments::new(dir.path());
        args.set_training(10, 2)
            .set_optimizer(OptimizerKind::AdamW, 1e-2, 0.0)
            .set_evaluate(IntervalStrategy::Steps, 1, 0.0, 8)
            .set_save(IntervalStrategy::No, 0);
        args.load_best_model_at_end = true;
        args.metric_for_best_model  = Some("loss".into());

        // Training pushes the model away from the evaluation labels,
        // so eval loss only gets worse and the best step is an early one.
        let train = build_loader::<B, _, _, ClassifierBatch<B>>(ClassifierBatcher, shifted_samples(8, 0), 2, Some(1), &device);
        let eval  = build_loader::<Inner, _, _, ClassifierBatch<Inner>>(ClassifierBatcher, shifted_samples(8, 1), 8, None, &device);

        let sink = RecordingSink { saved: RefCell::new(Vec::new()) };
        let outcome = Trainer::<B, ClassifierModel<B>>::new(&args, &sink, classification_metrics)
            .train(tiny_model(&device), train, Some(eval.clone()))
            .unwrap();

        let best = outcome.state.best_metric.unwrap();
        let last = last_eval(&outcome.state).unwrap()["eval_loss"];
        assert!(outcome.state.best_step.unwrap() < outcome.state.global_step);
        assert!(best < last);

        let metrics = evaluate(&outcome.model.valid(), eval.as_ref(), classification_metrics, 0.0);
        let returned = metrics.iter().find(|(name, _)| name == "eval_loss").unwrap().1;
        assert!((returned - best).abs() < 1e-6, "returned {returned}, best {best}");
    }

    #[test]
    fn test_gradient_accumulation_counts_optimizer_steps() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let mut args = TrainingArguments::new(dir.path());
        args.set_training(1, 1).set_save(IntervalStrategy::No, 0);
        args.gradient_accumulation_steps = 4;

        // 6 batches → one full accumulation + one partial at epoch end
        let train = build_loader::<B, _, _, ClassifierBatch<B>>(ClassifierBatcher, samples(6), 1, None, &device);
        let sink = RecordingSink { saved: RefCell::new(Vec::new()) };
        let outcome = Trainer::<B, ClassifierModel<B>>::new(&args, &sink, classification_metrics)
            .train::<ClassifierBatch<B>, ClassifierBatch<Inner>>(tiny_model(&device), train, None)
            .unwrap();

        assert_eq!(outcome.state.global_step, 2);
        assert!(sink.saved.borrow().is_empty());
    }

    #[test]
    fn test_overwrite_clears_old_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("checkpoint-999")).unwrap();
        let device = Default::default();

        let mut args = TrainingArguments::new(dir.path());
        args.overwrite_output_dir = true;
        args.set_training(1, 4).set_save(IntervalStrategy::Epoch, 0);

        let train = build_loader::<B, _, _, ClassifierBatch<B>>(ClassifierBatcher, samples(4), 4, None, &device);
        let sink = RecordingSink { saved: RefCell::new(Vec::new()) };
        Trainer::<B, ClassifierModel<B>>::new(&args, &sink, classification_metrics)
            .train::<ClassifierBatch<B>, ClassifierBatch<Inner>>(tiny_model(&device), train, None)
            .unwrap();

        assert!(!dir.path().join("checkpoint-999").exists());
        assert_eq!(*sink.saved.borrow(), vec!["checkpoint-1"]);
    }

    #[test]
    fn test_batcher_is_usable_on_inner_backend() {
        let device = Default::default();
        let batch: ClassifierBatch<Inner> = ClassifierBatcher.batch(samples(2), &device);
        assert_eq!(batch.labels.dims(), [2]);
    }

    #[test]
    fn test_format_metrics() {
        let line = format_metrics(&vec![("eval_loss".into(), 0.5), ("epoch".into(), 1.0)]);
        assert_eq!(line, "eval_loss=0.5000 | epoch=1.0000");
    }
}
