// ============================================================
// Layer 2 — Seq2SeqTrainUseCase
// ============================================================
// Fine-tunes a pretrained seq2seq model on JSON splits:
//
//   Step 1: Load train / val / test splits   (Layer 4 - data)
//   Step 2: Load tokenizer + model           (Layer 6 - infra)
//   Step 3: Convert examples to features     (Layer 4 - data)
//   Step 4: Build data loaders with the
//           dynamic-padding collator         (Layer 4/5)
//   Step 5: Train with fixed arguments       (Layer 5 - ml)
//   Step 6: Append wall-clock training time  (Layer 6 - infra)
//
// The training arguments are fixed; only paths and the model
// name come from the command line.

use anyhow::Result;
use std::{path::PathBuf, time::Instant};
use burn::tensor::backend::AutodiffBackend;

use crate::data::{
    batcher::Seq2SeqBatcher,
    features::{Seq2SeqFeaturizer, MAX_SOURCE_TOKENS, MAX_TARGET_TOKENS},
    loader::JsonSplitLoader,
};
use crate::domain::traits::ExampleSource;
use crate::infra::{
    model_store::{self, ArtifactWriter, ModelStore},
    report::PerformanceLog,
};
use crate::ml::{
    arguments::{IntervalStrategy, OptimizerKind, TrainingArguments},
    evaluation::no_metrics,
    model::{ModelConfig, Seq2SeqModel},
    scheduler::SchedulerKind,
    trainer::{build_loader, TrainOutcome, Trainer},
};

pub const DEFAULT_MODEL: &str = "google/mt5-small";

#[derive(Debug, Clone)]
pub struct Seq2SeqTrainConfig {
    pub model_name:      String,
    pub data_dir:        PathBuf,
    pub output_dir:      PathBuf,
    pub performance_log: PathBuf,
}

impl Default for Seq2SeqTrainConfig {
    fn default() -> Self {
        Self {
            model_name:      DEFAULT_MODEL.to_string(),
            data_dir:        PathBuf::from("data-prep"),
            output_dir:      PathBuf::from("output/t5"),
            performance_log: PathBuf::from("performance.txt"),
        }
    }
}

/// The fixed fine-tuning recipe.
pub fn seq2seq_training_arguments(output_dir: impl Into<PathBuf>) -> TrainingArguments {
    let mut args = TrainingArguments::new(output_dir);
    args.set_training(8, 1)
        .set_dataloader(42, 1, 1)
        .set_optimizer(OptimizerKind::AdamW, 5e-5, 0.01)
        .set_lr_scheduler(SchedulerKind::Linear, 500)
        .set_evaluate(IntervalStrategy::Steps, 100, 0.0, 1)
        .set_logging(IntervalStrategy::Steps, 10, Vec::new(), false, "passive")
        .set_save(IntervalStrategy::Steps, 50);
    args.gradient_accumulation_steps = 16;
    args
}

pub struct Seq2SeqTrainUseCase<B: AutodiffBackend> {
    config: Seq2SeqTrainConfig,
    store:  ModelStore,
    device: B::Device,
}

impl<B: AutodiffBackend> Seq2SeqTrainUseCase<B> {
    pub fn new(config: Seq2SeqTrainConfig, store: ModelStore, device: B::Device) -> Self {
        Self { config, store, device }
    }

    pub fn execute(&self) -> Result<()> {
        let args = seq2seq_training_arguments(&self.config.output_dir);
        self.execute_with(&args).map(|_| ())
    }

    /// Same pipeline with caller-supplied arguments; returns the
    /// trained model and its trainer state.
    pub fn execute_with(&self, args: &TrainingArguments) -> Result<TrainOutcome<Seq2SeqModel<B>>> {
        // ── Step 1: Load splits ───────────────────────────────────────────────
        let data_dir = &self.config.data_dir;
        let train = JsonSplitLoader::new(data_dir.join("train.json")).load_all()?;
        let val   = JsonSplitLoader::new(data_dir.join("val.json")).load_all()?;
        let test  = JsonSplitLoader::new(data_dir.join("test.json")).load_all()?;
        tracing::info!("Splits: train={} val={} test={}", train.len(), val.len(), test.len());

        // ── Step 2: Load tokenizer + model ────────────────────────────────────
        let dir = self.store.resolve(&self.config.model_name)?;
        let tokenizer = model_store::load_tokenizer(&dir)?;
        let (model_config, model) = model_store::load_seq2seq::<B>(&dir, &self.device)?;

        // ── Step 3: Features ──────────────────────────────────────────────────
        let featurizer = Seq2SeqFeaturizer::new(&tokenizer, Some(model_config.eos_token_id)).with_limits(
            MAX_SOURCE_TOKENS.min(model_config.max_source_len),
            MAX_TARGET_TOKENS.min(model_config.max_target_len),
        );
        let train_samples = featurizer.convert(&train)?;
        let val_samples   = featurizer.convert(&val)?;
        let test_samples  = featurizer.convert(&test)?;
        tracing::info!(
            "Features: train={} val={} test={}",
            train_samples.len(), val_samples.len(), test_samples.len(),
        );

        // ── Step 4: Loaders ───────────────────────────────────────────────────
        let batcher = Seq2SeqBatcher::new(model_config.pad_token_id, model_config.decoder_start_token_id);
        let train_loader = build_loader::<B, _, _, _>(
            batcher.clone(),
            train_samples,
            args.per_device_train_batch_size,
            Some(args.data_seed),
            &self.device,
        );
        let eval_loader = build_loader::<B::InnerBackend, _, _, _>(
            batcher,
            val_samples,
            args.per_device_eval_batch_size,
            None,
            &self.device,
        );

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let writer  = ArtifactWriter::new(ModelConfig::Seq2seq(model_config), tokenizer);
        let trainer = Trainer::<B, Seq2SeqModel<B>>::new(args, &writer, no_metrics);

        let started = Instant::now();
        let outcome = trainer.train(model, train_loader, Some(eval_loader))?;
        let training_time = started.elapsed().as_secs_f64();

        // ── Step 6: Record time ───────────────────────────────────────────────
        PerformanceLog::new(&self.config.performance_log)
            .append_training_time(&self.config.model_name, training_time)?;
        tracing::info!("Training time for {}: {:.1}s", self.config.model_name, training_time);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use std::fs;

    use crate::infra::tokenizer_store::{build_word_level, vocab_extent};
    use crate::ml::model::Seq2SeqConfig;

    type B = Autodiff<NdArray>;

    #[test]
    fn test_fixed_recipe() {
        let args = seq2seq_training_arguments("output/t5");
        assert_eq!(args.output_dir, PathBuf::from("output/t5"));
        assert_eq!(args.num_train_epochs, 8);
        assert_eq!(args.warmup_steps, 500);
        assert_eq!(args.lr_scheduler, SchedulerKind::Linear);
        assert_eq!(args.per_device_train_batch_size, 1);
        assert_eq!(args.per_device_eval_batch_size, 1);
        assert_eq!(args.gradient_accumulation_steps, 16);
        assert_eq!(args.weight_decay, 0.01);
        assert_eq!(args.learning_rate, 5e-5);
        assert_eq!((args.eval_strategy, args.eval_steps), (IntervalStrategy::Steps, 100));
        assert_eq!(args.logging_steps, 10);
        assert_eq!(args.save_steps, 50);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_small_run_records_training_time() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data-prep");
        fs::create_dir_all(&data_dir).unwrap();
        let rows = r#"[{"input": "the cat sat", "output": "cat"}, {"input": "the dog ran", "output": "dog"}]"#;
        for split in ["train.json", "val.json", "test.json"] {
            fs::write(data_dir.join(split), rows).unwrap();
        }

        let tokenizer = build_word_level(&["the cat sat the dog ran".to_string()], 16).unwrap();
        let model_config = Seq2SeqConfig::new(vocab_extent(&tokenizer), 0, 102, 0)
            .with_max_source_len(16)
            .with_max_target_len(8)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_encoder_layers(1)
            .with_num_decoder_layers(1)
            .with_d_ff(16);
        let model: Seq2SeqModel<B> = model_config.init(&Default::default());
        let home = root.path().join("models");
        model_store::save_pretrained::<B, _>(
            &home.join("tiny"),
            &model,
            &ModelConfig::Seq2seq(model_config),
            &tokenizer,
        )
        .unwrap();

        let config = Seq2SeqTrainConfig {
            model_name:      "tiny".to_string(),
            data_dir,
            output_dir:      root.path().join("output"),
            performance_log: root.path().join("performance.txt"),
        };
        let mut args = seq2seq_training_arguments(&config.output_dir);
        args.set_training(1, 1).set_save(IntervalStrategy::Steps, 1);
        args.gradient_accumulation_steps = 1;

        let use_case = Seq2SeqTrainUseCase::<B>::new(config, ModelStore::new(&home), Default::default());
        let outcome = use_case.execute_with(&args).unwrap();

        assert_eq!(outcome.state.global_step, 2);
        assert!(root.path().join("output/checkpoint-2/model.mpk.gz").exists());
        let perf = fs::read_to_string(root.path().join("performance.txt")).unwrap();
        assert!(perf.starts_with("Training time for tiny: "));
        assert_eq!(perf.lines().count(), 1);
    }

    #[test]
    fn test_missing_split_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let config = Seq2SeqTrainConfig {
            data_dir: root.path().to_path_buf(),
            ..Default::default()
        };
        let use_case = Seq2SeqTrainUseCase::<B>::new(config, ModelStore::new(root.path()), Default::default());
        assert!(use_case.execute().is_err());
    }
}
