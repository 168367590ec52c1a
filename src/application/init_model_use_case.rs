// ============================================================
// Layer 2 — InitModelUseCase
// ============================================================
// Creates a model directory with freshly initialised weights so
// the other commands have something to load:
//
//   Step 1: Tokenizer — load tokenizer.json, or build a word-level
//           vocabulary from corpus files     (Layer 6 - infra)
//   Step 2: Resolve pad / eos / start ids    (Layer 6 - infra)
//   Step 3: Build the architecture config    (Layer 5 - ml)
//   Step 4: Initialise and save_pretrained   (Layer 6 - infra)

use anyhow::{bail, Context, Result};
use std::{fs, path::PathBuf};
use burn::prelude::*;

use crate::infra::{
    model_store::save_pretrained,
    tokenizer_store::{self, build_word_level, vocab_extent, SpecialTokens},
};
use crate::ml::model::{ClassifierConfig, ClassifierModel, ModelConfig, Seq2SeqConfig, Seq2SeqModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Seq2seq,
    Classifier,
}

#[derive(Debug, Clone)]
pub struct InitModelConfig {
    pub kind:       ModelKind,
    pub output:     PathBuf,
    pub tokenizer:  Option<PathBuf>,
    pub corpus:     Vec<PathBuf>,
    pub vocab_size: usize,
    pub max_len:    usize,
    pub d_model:    usize,
    pub num_heads:  usize,
    pub num_layers: usize,
    pub d_ff:       usize,
    pub dropout:    f64,
    pub num_labels: usize,
}

pub struct InitModelUseCase<B: Backend> {
    config: InitModelConfig,
    device: B::Device,
}

impl<B: Backend> InitModelUseCase<B> {
    pub fn new(config: InitModelConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    pub fn execute(&self) -> Result<ModelConfig> {
        let cfg = &self.config;

        // ── Step 1 + 2: Tokenizer and special ids ─────────────────────────────
        let tokenizer = match (&cfg.tokenizer, cfg.corpus.is_empty()) {
            (Some(path), _) => tokenizer_store::load_file(path)?,
            (None, false) => {
                let mut texts = Vec::new();
                for path in &cfg.corpus {
                    let text = fs::read_to_string(path)
                        .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
                    texts.extend(text.lines().map(str::to_string));
                }
                build_word_level(&texts, cfg.vocab_size)?
            }
            (None, true) => bail!("Either a tokenizer file or at least one corpus file is required"),
        };
        let special = SpecialTokens::resolve(&tokenizer)?;
        let vocab_size = vocab_extent(&tokenizer);

        // ── Step 3 + 4: Config, weights, save ─────────────────────────────────
        let model_config = match cfg.kind {
            ModelKind::Seq2seq => {
                let eos = special
                    .eos
                    .context("Tokenizer has no end-of-sequence token (</s> or [SEP])")?;
                let config = Seq2SeqConfig::new(vocab_size, special.pad, eos, special.start)
                    .with_max_source_len(cfg.max_len)
                    .with_d_model(cfg.d_model)
                    .with_num_heads(cfg.num_heads)
                    .with_num_encoder_layers(cfg.num_layers)
                    .with_num_decoder_layers(cfg.num_layers)
                    .with_d_ff(cfg.d_ff)
                    .with_dropout(cfg.dropout);
                let model: Seq2SeqModel<B> = config.init(&self.device);
                let model_config = ModelConfig::Seq2seq(config);
                save_pretrained::<B, _>(&cfg.output, &model, &model_config, &tokenizer)?;
                model_config
            }
            ModelKind::Classifier => {
                let config = ClassifierConfig::new(vocab_size, special.pad)
                    .with_num_labels(cfg.num_labels)
                    .with_max_seq_len(cfg.max_len)
                    .with_d_model(cfg.d_model)
                    .with_num_heads(cfg.num_heads)
                    .with_num_layers(cfg.num_layers)
                    .with_d_ff(cfg.d_ff)
                    .with_dropout(cfg.dropout);
                let model: ClassifierModel<B> = config.init(&self.device);
                let model_config = ModelConfig::Classifier(config);
                save_pretrained::<B, _>(&cfg.output, &model, &model_config, &tokenizer)?;
                model_config
            }
        };

        tracing::info!(
            "Initialised {} model (vocab {}) in '{}'",
            model_config.kind(),
            vocab_size,
            cfg.output.display(),
        );
        Ok(model_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::infra::model_store::{load_classifier, load_seq2seq};

    type B = NdArray;

    fn config(kind: ModelKind, output: PathBuf, corpus: Vec<PathBuf>) -> InitModelConfig {
        InitModelConfig {
            kind,
            output,
            tokenizer:  None,
            corpus,
            vocab_size: 50,
            max_len:    16,
            d_model:    8,
            num_heads:  2,
            num_layers: 1,
            d_ff:       16,
            dropout:    0.1,
            num_labels: 4,
        }
    }

    #[test]
    fn test_seq2seq_from_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "python is faster\njava is safer\n").unwrap();

        let out = dir.path().join("production-model");
        let made = InitModelUseCase::<B>::new(config(ModelKind::Seq2seq, out.clone(), vec![corpus]), Default::default())
            .execute()
            .unwrap();
        assert_eq!(made.kind(), "seq2seq");

        let (loaded, _model) = load_seq2seq::<B>(&out, &Default::default()).unwrap();
        assert_eq!(loaded.pad_token_id, 0);
        assert_eq!(loaded.eos_token_id, 102);
        assert_eq!(loaded.decoder_start_token_id, 101);
        assert_eq!(loaded.max_source_len, 16);
    }

    #[test]
    fn test_classifier_reuses_existing_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "good bad\n").unwrap();
        let first = dir.path().join("first");
        InitModelUseCase::<B>::new(config(ModelKind::Classifier, first.clone(), vec![corpus]), Default::default())
            .execute()
            .unwrap();

        let second = dir.path().join("second");
        let mut cfg = config(ModelKind::Classifier, second.clone(), Vec::new());
        cfg.tokenizer = Some(first.join("tokenizer.json"));
        InitModelUseCase::<B>::new(cfg, Default::default()).execute().unwrap();

        let (loaded, _model) = load_classifier::<B>(&second, &Default::default()).unwrap();
        assert_eq!(loaded.num_labels, 4);
    }

    #[test]
    fn test_needs_tokenizer_or_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(ModelKind::Classifier, dir.path().join("m"), Vec::new());
        assert!(InitModelUseCase::<B>::new(cfg, Default::default()).execute().is_err());
    }
}
