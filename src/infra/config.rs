// ============================================================
// Layer 6 — Run Configuration
// ============================================================
// The classifier run is driven by a YAML file. Every key is
// required: a missing key is an error naming it, never a silent
// default.
//
//   seed: 42
//   gpu: 0
//   model:   { name: bert-base-uncased, metric_for_best: f1 }
//   log:     { run_name: sc, strategy: steps, steps: 50,
//              report_to: wandb, first_step: true, level: info }
//   eval:    { strategy: steps, steps: 100, delay: 0, batch_size: 16 }
//   save:    { strategy: steps, steps: 100 }
//   train:   { batch_size: 16, num_epochs: 3 }
//   test:    { batch_size: 32 }
//   optimizer: { name: adamw_torch, learning_rate: 5.0e-5, weight_decay: 0.01 }
//   learning_rate_scheduler: { name: linear, warmup_steps: 0 }
//
// Names (strategies, optimizer, scheduler) stay strings here and
// are parsed when the training arguments are assembled.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub seed:  u64,
    pub gpu:   usize,
    pub model: ModelSection,
    pub log:   LogSection,
    pub eval:  EvalSection,
    pub save:  SaveSection,
    pub train: TrainSection,
    pub test:  TestSection,
    pub optimizer: OptimizerSection,
    pub learning_rate_scheduler: SchedulerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    pub name:            String,
    pub metric_for_best: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    pub run_name:   String,
    pub strategy:   String,
    pub steps:      usize,
    pub report_to:  ReportTo,
    pub first_step: bool,
    pub level:      String,
}

/// `report_to: wandb` or `report_to: [wandb, tensorboard]`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReportTo {
    One(String),
    Many(Vec<String>),
}

impl ReportTo {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ReportTo::One(target)   => vec![target.clone()],
            ReportTo::Many(targets) => targets.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalSection {
    pub strategy:   String,
    pub steps:      usize,
    pub delay:      f64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveSection {
    pub strategy: String,
    pub steps:    usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainSection {
    pub batch_size: usize,
    pub num_epochs: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestSection {
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerSection {
    pub name:          String,
    pub learning_rate: f64,
    pub weight_decay:  f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    pub name:         String,
    pub warmup_steps: usize,
}

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config '{}'", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config '{}'", path.display()))
}

pub fn parse_config(text: &str) -> Result<RunConfig> {
    Ok(serde_yaml::from_str(text)?)
}
