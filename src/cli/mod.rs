// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with `clap` and routes each
// subcommand to its use case in Layer 2. This is also the only
// place that picks concrete Burn backends:
//
//   training  → Autodiff<Wgpu>
//   inference → Wgpu
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
use clap::Parser;
use std::path::PathBuf;

use commands::{Commands, InitModelArgs, SummarizeArgs, TrainClassifierArgs, TrainSeq2SeqArgs};
use crate::domain::traits::Summarizer;
use crate::infra::{config::load_config, logging::LogHandle, model_store::{ModelStore, DEFAULT_MODEL_HOME}};

type TrainBackend = Autodiff<Wgpu>;
type InferBackend = Wgpu;

#[derive(Parser, Debug)]
#[command(
    name = "finetune",
    version = "0.1.0",
    about = "Summarize text and fine-tune seq2seq / classifier transformers."
)]
pub struct Cli {
    /// Directory model names are resolved against
    #[arg(long, global = true, env = "FINETUNE_MODEL_HOME", default_value = DEFAULT_MODEL_HOME)]
    pub model_home: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case; the CLI only routes.
    pub fn run(self, log: LogHandle) -> Result<()> {
        let store = ModelStore::new(&self.model_home);
        match self.command {
            Commands::Summarize(args)       => run_summarize(store, args),
            Commands::TrainSeq2seq(args)    => run_train_seq2seq(store, args),
            Commands::TrainClassifier(args) => run_train_classifier(store, args, log),
            Commands::InitModel(args)       => run_init_model(args),
        }
    }
}

fn run_summarize(store: ModelStore, args: SummarizeArgs) -> Result<()> {
    use crate::application::summarize_use_case::SummarizeUseCase;

    let use_case = SummarizeUseCase::<InferBackend>::new(store, args.model, WgpuDevice::default());
    let summary = use_case.summarize(&args.first_object, &args.second_object, &args.fragments)?;
    println!("{summary}");
    Ok(())
}

fn run_train_seq2seq(store: ModelStore, args: TrainSeq2SeqArgs) -> Result<()> {
    use crate::application::seq2seq_use_case::Seq2SeqTrainUseCase;

    tracing::info!("Fine-tuning '{}' on splits in '{}'", args.model, args.data_dir.display());
    let use_case = Seq2SeqTrainUseCase::<TrainBackend>::new(args.into(), store, WgpuDevice::default());
    use_case.execute()?;

    println!("Training complete.");
    Ok(())
}

fn run_train_classifier(store: ModelStore, args: TrainClassifierArgs, log: LogHandle) -> Result<()> {
    use crate::application::classifier_use_case::ClassifierTrainUseCase;

    let run = load_config(&args.config)?;
    let device = classifier_device(run.gpu);
    tracing::info!("Run '{}' on {:?}", run.log.run_name, device);

    let rows = ClassifierTrainUseCase::<TrainBackend>::new(run, (&args).into(), store, device)
        .with_log_handle(log)
        .execute()?;

    println!("Evaluated {} dataset views.", rows.len());
    Ok(())
}

/// `gpu` is advisory: the default adapter is always used.
/// `DiscreteGpu(n)` panics when no such adapter exists.
fn classifier_device(gpu: usize) -> WgpuDevice {
    if gpu != 0 {
        tracing::warn!("gpu: {} cannot be pinned; using the best available adapter", gpu);
    }
    WgpuDevice::default()
}

fn run_init_model(args: InitModelArgs) -> Result<()> {
    use crate::application::init_model_use_case::InitModelUseCase;

    let output = args.output.clone();
    let config = InitModelUseCase::<InferBackend>::new(args.into(), WgpuDevice::default()).execute()?;
    println!("Created {} model in {}", config.kind(), output.display());
    Ok(())
}
