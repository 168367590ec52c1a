// ============================================================
// Layer 2 — SummarizeUseCase
// ============================================================
// Condenses argument fragments into one abstractive summary:
//
//   Step 1: Build the prompt "Summarize: " + fragments (one per line)
//   Step 2: Resolve and load tokenizer + seq2seq model (Layer 6)
//   Step 3: Tokenise, truncated and padded to 1024 tokens
//   Step 4: Greedy generation, at most 256 tokens      (Layer 5)
//   Step 5: Decode without special tokens, clean up spacing
//
// The model is loaded fresh on every call; nothing is cached
// between summaries.

use anyhow::{anyhow, bail, Result};
use burn::prelude::*;

use crate::data::features::fixed_length_tokenizer;
use crate::domain::traits::Summarizer;
use crate::infra::model_store::{self, ModelStore};
use crate::ml::generation::{greedy_generate, GenerationConfig};

pub const DEFAULT_MODEL: &str = "production-model";
pub const PROMPT_PREFIX: &str = "Summarize: ";
pub const MAX_PROMPT_TOKENS: usize = 1024;
pub const MAX_SUMMARY_TOKENS: usize = 256;

/// Spacing fixes applied after decoding, in this order
const CLEAN_UP_RULES: [(&str, &str); 10] = [
    (" .",   "."),
    (" ?",   "?"),
    (" !",   "!"),
    (" ,",   ","),
    (" ' ",  "'"),
    (" n't", "n't"),
    (" 'm",  "'m"),
    (" 's",  "'s"),
    (" 've", "'ve"),
    (" 're", "'re"),
];

pub fn build_prompt(fragments: &[String]) -> String {
    format!("{PROMPT_PREFIX}{}", fragments.join("\n"))
}

pub fn clean_up_tokenization(text: &str) -> String {
    CLEAN_UP_RULES
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

pub struct SummarizeUseCase<B: Backend> {
    store:      ModelStore,
    model_name: String,
    device:     B::Device,
}

impl<B: Backend> SummarizeUseCase<B> {
    pub fn new(store: ModelStore, model_name: impl Into<String>, device: B::Device) -> Self {
        Self {
            store,
            model_name: model_name.into(),
            device,
        }
    }
}

impl<B: Backend> Summarizer for SummarizeUseCase<B> {
    fn summarize(&self, _first_object: &str, _second_object: &str, fragments: &[String]) -> Result<String> {
        if fragments.is_empty() {
            bail!("Nothing to summarize: no fragments given");
        }
        let prompt = build_prompt(fragments);

        // ── Load ──────────────────────────────────────────────────────────────
        let dir = self.store.resolve(&self.model_name)?;
        let tokenizer = model_store::load_tokenizer(&dir)?;
        let (config, model) = model_store::load_seq2seq::<B>(&dir, &self.device)?;
        tracing::debug!("Loaded '{}' from '{}'", self.model_name, dir.display());

        // ── Tokenise ──────────────────────────────────────────────────────────
        let max_len = MAX_PROMPT_TOKENS.min(config.max_source_len);
        let tokenizer = fixed_length_tokenizer(&tokenizer, max_len, config.pad_token_id)?;
        let encoding = tokenizer
            .encode(prompt.as_str(), true)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

        let ids: Vec<i64>  = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let len = ids.len();
        let input_ids      = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [1, len]), &self.device);
        let attention_mask = Tensor::<B, 2, Int>::from_data(TensorData::new(mask, [1, len]), &self.device);

        // ── Generate ──────────────────────────────────────────────────────────
        let generation = GenerationConfig {
            max_length:             MAX_SUMMARY_TOKENS,
            decoder_start_token_id: config.decoder_start_token_id,
            eos_token_id:           config.eos_token_id,
            pad_token_id:           config.pad_token_id,
        };
        let sequences = greedy_generate(&model, input_ids, attention_mask, generation);
        let first = sequences
            .first()
            .ok_or_else(|| anyhow!("Generation returned no sequence"))?;

        // ── Decode ────────────────────────────────────────────────────────────
        let text = tokenizer
            .decode(first, true)
            .map_err(|e| anyhow!("Decoding error: {e}"))?;
        let summary = clean_up_tokenization(&text);

        tracing::info!("Summarised {} fragments into {} tokens", fragments.len(), first.len());
        Ok(summary)
    }
}
