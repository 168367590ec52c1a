// ============================================================
// Layer 2 — ClassifierTrainUseCase
// ============================================================
// Fine-tunes a pretrained classifier and reports per-view metrics:
//
//   Step 1:  Tracking env vars, RNG seed, log level
//   Step 2:  Load train / val / test TSV splits     (Layer 4 - data)
//   Step 3:  Build the six dataset views            (Layer 4 - data)
//   Step 4:  Load tokenizer + model                 (Layer 6 - infra)
//   Step 5:  Tokenise every view at fixed length    (Layer 4 - data)
//   Step 6:  Train                                  (Layer 5 - ml)
//   Step 7:  Evaluate train, valid, test, test_better,
//            test_worse, test_none in that order
//   Step 8:  Append the six rows to results/<run>-sc.csv
//   Step 9:  Save the final model to ./<run>-best/
//
// Training arguments are assembled and validated first, so a bad
// strategy or optimizer name fails before any data is read.
//
// Any failure aborts the run; views after a failing one are not
// evaluated and nothing is appended to the report.

use anyhow::{bail, Result};
use std::path::PathBuf;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::data::{
    batcher::ClassifierBatcher,
    features::{classifier_features, fixed_length_tokenizer},
    loader::TsvSplitLoader,
    views::ClassifierViews,
};
use crate::domain::{result_row::ResultRow, traits::ExampleSource};
use crate::infra::{
    config::RunConfig,
    logging::{LogHandle, LogLevel},
    model_store::{self, ArtifactWriter, ModelStore},
    report::ResultsReport,
};
use crate::ml::{
    arguments::{IntervalStrategy, OptimizerKind, TrainingArguments},
    evaluation::{classification_metrics, evaluate},
    model::{ClassifierModel, ModelConfig},
    scheduler::SchedulerKind,
    trainer::{build_loader, format_metrics, Trainer},
};

#[derive(Debug, Clone)]
pub struct ClassifierPaths {
    pub data_dir:    PathBuf,
    pub results_dir: PathBuf,
    /// Parent of `<run>-finetuned-obj/` and `<run>-best/`
    pub output_root: PathBuf,
}

impl Default for ClassifierPaths {
    fn default() -> Self {
        Self {
            data_dir:    PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            output_root: PathBuf::from("."),
        }
    }
}

impl ClassifierPaths {
    pub fn checkpoint_dir(&self, run_name: &str) -> PathBuf {
        self.output_root.join(format!("{run_name}-finetuned-obj"))
    }

    pub fn best_dir(&self, run_name: &str) -> PathBuf {
        self.output_root.join(format!("{run_name}-best"))
    }
}

/// Experiment-tracking variables exported before training
pub fn tracking_env(run_name: &str) -> [(&'static str, String); 4] {
    [
        ("WANDB_PROJECT",   format!("train-cs-{run_name}")),
        ("WANDB_LOG_MODEL", "end".to_string()),
        ("WANDB_WATCH",     "all".to_string()),
        ("WANDB_SILENT",    "false".to_string()),
    ]
}

/// Training arguments from the run config, one setter group per section.
pub fn classifier_training_arguments(run: &RunConfig, output_dir: PathBuf) -> Result<TrainingArguments> {
    let eval_strategy: IntervalStrategy = run.eval.strategy.parse()?;
    let log_strategy:  IntervalStrategy = run.log.strategy.parse()?;
    let save_strategy: IntervalStrategy = run.save.strategy.parse()?;
    let optimizer:     OptimizerKind    = run.optimizer.name.parse()?;
    let scheduler:     SchedulerKind    = run.learning_rate_scheduler.name.parse()?;
    run.log.level.parse::<LogLevel>()?;

    let mut args = TrainingArguments::new(output_dir);
    args.overwrite_output_dir   = true;
    args.seed                   = run.seed;
    args.run_name               = Some(run.log.run_name.clone());
    args.load_best_model_at_end = true;
    args.metric_for_best_model  = Some(run.model.metric_for_best.clone());

    args.set_dataloader(run.seed, run.train.batch_size, run.eval.batch_size)
        .set_evaluate(eval_strategy, run.eval.steps, run.eval.delay, run.eval.batch_size)
        .set_logging(
            log_strategy,
            run.log.steps,
            run.log.report_to.to_vec(),
            run.log.first_step,
            run.log.level.clone(),
        )
        .set_lr_scheduler(scheduler, run.learning_rate_scheduler.warmup_steps)
        .set_optimizer(optimizer, run.optimizer.learning_rate, run.optimizer.weight_decay)
        .set_save(save_strategy, run.save.steps)
        .set_testing(run.test.batch_size)
        .set_training(run.train.num_epochs, run.train.batch_size);

    args.validate()?;
    Ok(args)
}

pub struct ClassifierTrainUseCase<B: AutodiffBackend> {
    run:    RunConfig,
    paths:  ClassifierPaths,
    store:  ModelStore,
    device: B::Device,
    log:    Option<LogHandle>,
}

impl<B: AutodiffBackend> ClassifierTrainUseCase<B> {
    pub fn new(run: RunConfig, paths: ClassifierPaths, store: ModelStore, device: B::Device) -> Self {
        Self { run, paths, store, device, log: None }
    }

    /// Let `log.level` re-level the process logger
    pub fn with_log_handle(mut self, handle: LogHandle) -> Self {
        self.log = Some(handle);
        self
    }

    /// Returns the six report rows, in report order.
    pub fn execute(&self) -> Result<Vec<ResultRow>> {
        let run = &self.run;
        let run_name = run.log.run_name.as_str();

        // Configuration problems surface before any data is read
        let args = classifier_training_arguments(run, self.paths.checkpoint_dir(run_name))?;

        // ── Step 1: Environment ───────────────────────────────────────────────
        for (key, value) in tracking_env(run_name) {
            std::env::set_var(key, value);
        }
        B::seed(run.seed);
        if let Some(handle) = &self.log {
            handle.apply(args.log_level.parse()?)?;
        }

        // ── Step 2 + 3: Splits and views ──────────────────────────────────────
        let data_dir = &self.paths.data_dir;
        let views = ClassifierViews::build(
            TsvSplitLoader::new(data_dir.join("train.csv")).load_all()?,
            TsvSplitLoader::new(data_dir.join("val.csv")).load_all()?,
            TsvSplitLoader::new(data_dir.join("test.csv")).load_all()?,
        );

        // ── Step 4: Model ─────────────────────────────────────────────────────
        let dir = self.store.resolve(&run.model.name)?;
        let tokenizer = model_store::load_tokenizer(&dir)?;
        let (model_config, model) = model_store::load_classifier::<B>(&dir, &self.device)?;

        if let Some(row) = views
            .all_rows()
            .find(|row| row.label < 0 || row.label as usize >= model_config.num_labels)
        {
            bail!(
                "Label {} of '{}' is outside the model's {} labels",
                row.label, row.text, model_config.num_labels,
            );
        }

        // ── Step 5: Features ──────────────────────────────────────────────────
        let fixed = fixed_length_tokenizer(&tokenizer, model_config.max_seq_len, model_config.pad_token_id)?;
        let train_samples = classifier_features(&fixed, &views.train.rows)?;
        let valid_samples = classifier_features(&fixed, &views.validation.rows)?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        tracing::info!("Training");
        let train_loader = build_loader::<B, _, _, _>(
            ClassifierBatcher,
            train_samples,
            args.per_device_train_batch_size,
            Some(args.data_seed),
            &self.device,
        );
        let eval_loader = build_loader::<B::InnerBackend, _, _, _>(
            ClassifierBatcher,
            valid_samples,
            args.per_device_eval_batch_size,
            None,
            &self.device,
        );

        let writer  = ArtifactWriter::new(ModelConfig::Classifier(model_config), tokenizer);
        let trainer = Trainer::<B, ClassifierModel<B>>::new(&args, &writer, classification_metrics);
        let outcome = trainer.train(model, train_loader, Some(eval_loader))?;

        // ── Step 7: Evaluate every view ───────────────────────────────────────
        tracing::info!("Inference");
        let model_valid = outcome.model.valid();
        let mut rows = Vec::with_capacity(6);
        for view in views.evaluation_order() {
            if view.is_empty() {
                tracing::warn!("View '{}' has no rows; its metrics will be empty", view.name);
            }
            let loader = build_loader::<B::InnerBackend, _, _, _>(
                ClassifierBatcher,
                classifier_features(&fixed, &view.rows)?,
                args.per_device_test_batch_size,
                None,
                &self.device,
            );
            let metrics = evaluate(&model_valid, loader.as_ref(), classification_metrics, outcome.state.epoch);
            tracing::info!("{:<11} | {}", view.name, format_metrics(&metrics));
            rows.push(ResultRow::new(metrics, view.name));
        }

        // ── Step 8: Report ────────────────────────────────────────────────────
        ResultsReport::for_run(&self.paths.results_dir, run_name).append(&rows)?;

        // ── Step 9: Save ──────────────────────────────────────────────────────
        tracing::info!("Save the model");
        writer.save::<B, _>(&outcome.model, &self.paths.best_dir(run_name))?;

        Ok(rows)
    }
}
