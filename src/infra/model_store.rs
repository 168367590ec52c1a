// ============================================================
// Layer 6 — Model Store
// ============================================================
// Pretrained model directories: resolve a name, load the three
// artifacts, save them back.
//
//   <dir>/
//     tokenizer.json   ← Hugging Face tokenizer
//     config.json      ← ModelConfig, tagged with its kind
//     model.mpk.gz     ← weights (half-precision, gzipped MessagePack)
//
// The config is needed before the weights: Burn can only load a
// record into a model of exactly the same architecture, so the
// model is rebuilt from config.json and the record is loaded
// into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{anyhow, bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder},
};
use tokenizers::Tokenizer;

use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::model::{ClassifierConfig, ClassifierModel, ModelConfig, Seq2SeqConfig, Seq2SeqModel};
use crate::ml::trainer::CheckpointSink;

type WeightsRecorder = NamedMpkGzFileRecorder<HalfPrecisionSettings>;

pub const CONFIG_FILE: &str = "config.json";

/// Weights file stem; the recorder appends `.mpk.gz`
pub const WEIGHTS_STEM: &str = "model";
pub const WEIGHTS_FILE: &str = "model.mpk.gz";

pub const DEFAULT_MODEL_HOME: &str = "models";

/// Resolves model names to directories under a model home.
#[derive(Debug, Clone)]
pub struct ModelStore {
    home: PathBuf,
}

impl ModelStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// An existing directory path wins; otherwise `<home>/<name>`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_dir() {
            return Ok(direct);
        }
        let under_home = self.home.join(name);
        if under_home.is_dir() {
            return Ok(under_home);
        }
        bail!(
            "Model '{}' not found (looked for '{}' and '{}')",
            name,
            direct.display(),
            under_home.display(),
        )
    }
}

// ─── Loading ──────────────────────────────────────────────────────────────────

pub fn load_tokenizer(dir: &Path) -> Result<Tokenizer> {
    TokenizerStore::new(dir).load()
}

pub fn load_config(dir: &Path) -> Result<ModelConfig> {
    let path = dir.join(CONFIG_FILE);
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed model config '{}'", path.display()))
}

pub fn load_seq2seq<B: Backend>(dir: &Path, device: &B::Device) -> Result<(Seq2SeqConfig, Seq2SeqModel<B>)> {
    match load_config(dir)? {
        ModelConfig::Seq2seq(config) => {
            let model = load_weights(config.init::<B>(device), dir, device)?;
            Ok((config, model))
        }
        other => bail!("'{}' holds a {} model, expected seq2seq", dir.display(), other.kind()),
    }
}

pub fn load_classifier<B: Backend>(dir: &Path, device: &B::Device) -> Result<(ClassifierConfig, ClassifierModel<B>)> {
    match load_config(dir)? {
        ModelConfig::Classifier(config) => {
            let model = load_weights(config.init::<B>(device), dir, device)?;
            Ok((config, model))
        }
        other => bail!("'{}' holds a {} model, expected classifier", dir.display(), other.kind()),
    }
}

fn load_weights<B: Backend, M: Module<B>>(model: M, dir: &Path, device: &B::Device) -> Result<M> {
    let file = dir.join(WEIGHTS_FILE);
    let model = model
        .load_file(dir.join(WEIGHTS_STEM), &WeightsRecorder::new(), device)
        .map_err(|e| anyhow!("Cannot load weights '{}': {e:?}", file.display()))?;
    tracing::debug!("Loaded weights from '{}'", file.display());
    Ok(model)
}

// ─── Saving ───────────────────────────────────────────────────────────────────

/// Write tokenizer, config and weights into `dir`, creating it.
pub fn save_pretrained<B: Backend, M: Module<B>>(
    dir:       &Path,
    model:     &M,
    config:    &ModelConfig,
    tokenizer: &Tokenizer,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;

    TokenizerStore::new(dir).save(tokenizer)?;

    let config_path = dir.join(CONFIG_FILE);
    fs::write(&config_path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Cannot write '{}'", config_path.display()))?;

    model
        .clone()
        .save_file(dir.join(WEIGHTS_STEM), &WeightsRecorder::new())
        .map_err(|e| anyhow!("Cannot save weights to '{}': {e:?}", dir.join(WEIGHTS_FILE).display()))?;

    tracing::info!("Saved {} model to '{}'", config.kind(), dir.display());
    Ok(())
}

/// Writes full model directories as training checkpoints.
pub struct ArtifactWriter {
    config:    ModelConfig,
    tokenizer: Tokenizer,
}

impl ArtifactWriter {
    pub fn new(config: ModelConfig, tokenizer: Tokenizer) -> Self {
        Self { config, tokenizer }
    }

    pub fn save<B: Backend, M: Module<B>>(&self, model: &M, dir: &Path) -> Result<()> {
        save_pretrained::<B, M>(dir, model, &self.config, &self.tokenizer)
    }
}

impl<B: Backend, M: Module<B>> CheckpointSink<B, M> for ArtifactWriter {
    fn save_checkpoint(&self, model: &M, dir: &Path) -> Result<()> {
        self.save::<B, M>(model, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::infra::tokenizer_store::{build_word_level, TOKENIZER_FILE};

    type B = NdArray;

    fn tiny_classifier() -> ClassifierConfig {
        ClassifierConfig::new(120, 0)
            .with_max_seq_len(8)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(16)
    }

    #[test]
    fn test_resolve_prefers_existing_path_then_home() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join("production-model")).unwrap();
        let store = ModelStore::new(home.path());

        assert_eq!(store.resolve("production-model").unwrap(), home.path().join("production-model"));
        let direct = home.path().to_string_lossy().to_string();
        assert_eq!(store.resolve(&direct).unwrap(), PathBuf::from(&direct));
        assert!(store.resolve("missing-model").is_err());
    }

    #[test]
    fn test_save_then_load_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let tokenizer = build_word_level(&["one two three".to_string()], 10).unwrap();
        let config = tiny_classifier();
        let model: ClassifierModel<B> = config.init(&device);

        save_pretrained::<B, _>(dir.path(), &model, &ModelConfig::Classifier(config.clone()), &tokenizer).unwrap();
        assert!(dir.path().join(TOKENIZER_FILE).exists());
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert!(dir.path().join(WEIGHTS_FILE).exists());
        assert!(!dir.path().join("model.mpk").exists());

        let (loaded_config, _model) = load_classifier::<B>(dir.path(), &device).unwrap();
        assert_eq!(loaded_config.num_labels, config.num_labels);
        assert_eq!(load_tokenizer(dir.path()).unwrap().token_to_id("two"), tokenizer.token_to_id("two"));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let tokenizer = build_word_level(&["one".to_string()], 10).unwrap();
        let config = tiny_classifier();
        let model: ClassifierModel<B> = config.init(&device);
        save_pretrained::<B, _>(dir.path(), &model, &ModelConfig::Classifier(config), &tokenizer).unwrap();

        let err = load_seq2seq::<B>(dir.path(), &device).unwrap_err();
        assert!(err.to_string().contains("expected seq2seq"));
    }

    #[test]
    fn test_missing_config_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_missing_weights_names_the_gz_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_classifier();
        fs::write(
            dir.path().join(CONFIG_FILE),
            serde_json::to_string(&ModelConfig::Classifier(config)).unwrap(),
        )
        .unwrap();

        let err = load_classifier::<B>(dir.path(), &Default::default()).unwrap_err();
        assert!(err.to_string().contains("model.mpk.gz"));
    }
}
