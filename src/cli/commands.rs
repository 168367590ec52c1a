// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and their flags:
//
//   summarize        — generate a summary from text fragments
//   train-seq2seq    — fine-tune the seq2seq model
//   train-classifier — fine-tune the classifier from config.yaml
//   init-model       — create a freshly initialised model directory
//
// Defaults mirror the fixed paths the pipelines were built around,
// so running a subcommand with no flags uses the usual layout.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::init_model_use_case::{InitModelConfig, ModelKind};
use crate::application::seq2seq_use_case::Seq2SeqTrainConfig;
use crate::application::classifier_use_case::ClassifierPaths;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize argument fragments with a seq2seq model
    Summarize(SummarizeArgs),

    /// Fine-tune a seq2seq model on data-prep/{train,val,test}.json
    TrainSeq2seq(TrainSeq2SeqArgs),

    /// Fine-tune a classifier configured by config.yaml
    TrainClassifier(TrainClassifierArgs),

    /// Create a model directory with freshly initialised weights
    InitModel(InitModelArgs),
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Text fragment to summarize; repeat for several fragments
    #[arg(long = "fragment", required = true)]
    pub fragments: Vec<String>,

    /// Model name or directory
    #[arg(long, default_value = "production-model")]
    pub model: String,

    /// First compared object (accepted, not used for generation)
    #[arg(long, default_value = "")]
    pub first_object: String,

    /// Second compared object (accepted, not used for generation)
    #[arg(long, default_value = "")]
    pub second_object: String,
}

#[derive(Args, Debug)]
pub struct TrainSeq2SeqArgs {
    /// Pretrained model name or directory
    #[arg(long, default_value = "google/mt5-small")]
    pub model: String,

    /// Directory holding train.json, val.json and test.json
    #[arg(long, default_value = "data-prep")]
    pub data_dir: PathBuf,

    /// Where checkpoints are written
    #[arg(long, default_value = "output/t5")]
    pub output_dir: PathBuf,

    /// File the training time is appended to
    #[arg(long, default_value = "performance.txt")]
    pub performance_log: PathBuf,
}

impl From<TrainSeq2SeqArgs> for Seq2SeqTrainConfig {
    fn from(a: TrainSeq2SeqArgs) -> Self {
        Seq2SeqTrainConfig {
            model_name:      a.model,
            data_dir:        a.data_dir,
            output_dir:      a.output_dir,
            performance_log: a.performance_log,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainClassifierArgs {
    /// YAML run configuration
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Directory holding train.csv, val.csv and test.csv
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory of the per-run results CSV
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Parent of <run>-finetuned-obj/ and <run>-best/
    #[arg(long, default_value = ".")]
    pub output_root: PathBuf,
}

impl From<&TrainClassifierArgs> for ClassifierPaths {
    fn from(a: &TrainClassifierArgs) -> Self {
        ClassifierPaths {
            data_dir:    a.data_dir.clone(),
            results_dir: a.results_dir.clone(),
            output_root: a.output_root.clone(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    Seq2seq,
    Classifier,
}

#[derive(Args, Debug)]
pub struct InitModelArgs {
    /// Which architecture to create
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Directory to create
    #[arg(long)]
    pub output: PathBuf,

    /// Existing tokenizer.json to reuse
    #[arg(long, conflicts_with = "corpus")]
    pub tokenizer: Option<PathBuf>,

    /// Text file(s) to build a word-level vocabulary from
    #[arg(long)]
    pub corpus: Vec<PathBuf>,

    /// Upper bound on vocabulary entries when building from a corpus
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Maximum source / sequence length
    #[arg(long, default_value_t = 512)]
    pub max_len: usize,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Attention heads; d_model must be divisible by this
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Layers per stack
    #[arg(long, default_value_t = 6)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Output classes (classifier only)
    #[arg(long, default_value_t = 4)]
    pub num_labels: usize,
}

impl From<InitModelArgs> for InitModelConfig {
    fn from(a: InitModelArgs) -> Self {
        InitModelConfig {
            kind: match a.kind {
                KindArg::Seq2seq    => ModelKind::Seq2seq,
                KindArg::Classifier => ModelKind::Classifier,
            },
            output:     a.output,
            tokenizer:  a.tokenizer,
            corpus:     a.corpus,
            vocab_size: a.vocab_size,
            max_len:    a.max_len,
            d_model:    a.d_model,
            num_heads:  a.num_heads,
            num_layers: a.num_layers,
            d_ff:       a.d_ff,
            dropout:    a.dropout,
            num_labels: a.num_labels,
        }
    }
}
