// ============================================================
// Layer 5 — Training Arguments
// ============================================================
// Everything the training loop needs to know, assembled by
// small setter groups:
//
//   set_dataloader   → sampler seed, train/eval batch sizes
//   set_evaluate     → evaluation strategy, cadence, delay
//   set_logging      → logging strategy, cadence, sinks, level
//   set_lr_scheduler → schedule name and warmup
//   set_optimizer    → optimizer name, learning rate, decay
//   set_save         → checkpoint strategy and cadence
//   set_testing      → batch size for post-training evaluation
//   set_training     → epoch count and train batch size
//
// Each setter touches its own fields only, so the order they are
// applied in does not matter. `validate()` runs once, right
// before training, and reports every inconsistency up front.

use anyhow::{bail, Result};
use std::{path::PathBuf, str::FromStr};

use crate::ml::scheduler::SchedulerKind;

/// When an action (evaluate, log, save) fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalStrategy {
    No,
    Steps,
    Epoch,
}

impl FromStr for IntervalStrategy {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "no" | "none" => IntervalStrategy::No,
            "steps"       => IntervalStrategy::Steps,
            "epoch"       => IntervalStrategy::Epoch,
            other => bail!("Unknown interval strategy '{other}' (expected no, steps or epoch)"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    AdamW,
}

impl FromStr for OptimizerKind {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "adamw" | "adamw_torch" | "adamw_hf" | "adamw_torch_fused" => Ok(OptimizerKind::AdamW),
            other => bail!("Unsupported optimizer '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingArguments {
    pub output_dir:           PathBuf,
    pub overwrite_output_dir: bool,
    pub run_name:             Option<String>,

    pub seed:      u64,
    pub data_seed: u64,

    pub num_train_epochs:            usize,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size:  usize,
    pub per_device_test_batch_size:  usize,
    pub gradient_accumulation_steps: usize,

    pub optimizer:     OptimizerKind,
    pub learning_rate: f64,
    pub weight_decay:  f64,
    pub max_grad_norm: f64,
    pub lr_scheduler:  SchedulerKind,
    pub warmup_steps:  usize,

    pub eval_strategy: IntervalStrategy,
    pub eval_steps:    usize,
    pub eval_delay:    f64,

    pub logging_strategy:   IntervalStrategy,
    pub logging_steps:      usize,
    pub logging_first_step: bool,
    pub report_to:          Vec<String>,
    pub log_level:          String,

    pub save_strategy: IntervalStrategy,
    pub save_steps:    usize,

    pub load_best_model_at_end: bool,
    pub metric_for_best_model:  Option<String>,
}

impl TrainingArguments {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir:           output_dir.into(),
            overwrite_output_dir: false,
            run_name:             None,
            seed:                        42,
            data_seed:                   42,
            num_train_epochs:            3,
            per_device_train_batch_size: 8,
            per_device_eval_batch_size:  8,
            per_device_test_batch_size:  8,
            gradient_accumulation_steps: 1,
            optimizer:     OptimizerKind::AdamW,
            learning_rate: 5e-5,
            weight_decay:  0.0,
            max_grad_norm: 1.0,
            lr_scheduler:  SchedulerKind::Linear,
            warmup_steps:  0,
            eval_strategy: IntervalStrategy::No,
            eval_steps:    500,
            eval_delay:    0.0,
            logging_strategy:   IntervalStrategy::Steps,
            logging_steps:      500,
            logging_first_step: false,
            report_to:          Vec::new(),
            log_level:          "passive".to_string(),
            save_strategy: IntervalStrategy::Steps,
            save_steps:    500,
            load_best_model_at_end: false,
            metric_for_best_model:  None,
        }
    }

    pub fn set_dataloader(&mut self, sampler_seed: u64, train_batch_size: usize, eval_batch_size: usize) -> &mut Self {
        self.data_seed = sampler_seed;
        self.per_device_train_batch_size = train_batch_size;
        self.per_device_eval_batch_size  = eval_batch_size;
        self
    }

    pub fn set_evaluate(&mut self, strategy: IntervalStrategy, steps: usize, delay: f64, batch_size: usize) -> &mut Self {
        self.eval_strategy = strategy;
        self.eval_steps    = steps;
        self.eval_delay    = delay;
        self.per_device_eval_batch_size = batch_size;
        self
    }

    pub fn set_logging(
        &mut self,
        strategy:   IntervalStrategy,
        steps:      usize,
        report_to:  Vec<String>,
        first_step: bool,
        level:      impl Into<String>,
    ) -> &mut Self {
        self.logging_strategy   = strategy;
        self.logging_steps      = steps;
        self.report_to          = report_to;
        self.logging_first_step = first_step;
        self.log_level          = level.into();
        self
    }

    pub fn set_lr_scheduler(&mut self, kind: SchedulerKind, warmup_steps: usize) -> &mut Self {
        self.lr_scheduler = kind;
        self.warmup_steps = warmup_steps;
        self
    }

    pub fn set_optimizer(&mut self, kind: OptimizerKind, learning_rate: f64, weight_decay: f64) -> &mut Self {
        self.optimizer     = kind;
        self.learning_rate = learning_rate;
        self.weight_decay  = weight_decay;
        self
    }

    pub fn set_save(&mut self, strategy: IntervalStrategy, steps: usize) -> &mut Self {
        self.save_strategy = strategy;
        self.save_steps    = steps;
        self
    }

    pub fn set_testing(&mut self, batch_size: usize) -> &mut Self {
        self.per_device_test_batch_size = batch_size;
        self
    }

    pub fn set_training(&mut self, num_epochs: usize, batch_size: usize) -> &mut Self {
        self.num_train_epochs = num_epochs;
        self.per_device_train_batch_size = batch_size;
        self
    }

    /// Metric name as it appears in evaluation output (`eval_` prefixed)
    pub fn best_metric_key(&self) -> Option<String> {
        self.metric_for_best_model.as_ref().map(|name| {
            if name.starts_with("eval_") {
                name.clone()
            } else {
                format!("eval_{name}")
            }
        })
    }

    /// Loss-like metrics improve downwards, everything else upwards
    pub fn greater_is_better(&self) -> bool {
        self.best_metric_key()
            .map(|key| !key.ends_with("loss"))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.per_device_train_batch_size == 0 { problems.push("train batch size must be > 0".to_string()); }
        if self.per_device_eval_batch_size == 0  { problems.push("eval batch size must be > 0".to_string()); }
        if self.per_device_test_batch_size == 0  { problems.push("test batch size must be > 0".to_string()); }
        if self.gradient_accumulation_steps == 0 { problems.push("gradient accumulation steps must be > 0".to_string()); }
        if self.learning_rate < 0.0              { problems.push("learning rate must be >= 0".to_string()); }
        if self.eval_delay < 0.0                 { problems.push("eval delay must be >= 0".to_string()); }

        let cadences = [
            ("eval",    self.eval_strategy,    self.eval_steps),
            ("logging", self.logging_strategy, self.logging_steps),
            ("save",    self.save_strategy,    self.save_steps),
        ];
        for (what, strategy, steps) in cadences {
            if strategy == IntervalStrategy::Steps && steps == 0 {
                problems.push(format!("{what} strategy is 'steps' but {what} steps is 0"));
            }
        }

        if self.load_best_model_at_end {
            if self.eval_strategy == IntervalStrategy::No {
                problems.push("load_best_model_at_end needs an evaluation strategy".to_string());
            }
            if self.metric_for_best_model.is_none() {
                problems.push("load_best_model_at_end needs metric_for_best_model".to_string());
            }
        }

        if !problems.is_empty() {
            bail!("Invalid training arguments: {}", problems.join("; "));
        }
        Ok(())
    }
}
