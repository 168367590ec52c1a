// ============================================================
// Layer 4 — Feature Conversion
// ============================================================
// Turns domain examples into token-id samples.
//
// Seq2seq (dynamic length):
//   input  → tokenised, truncated to 512 tokens
//   output → tokenised in target mode, truncated to 256 tokens
//   Both sequences always end with the EOS token when the model
//   defines one, even after truncation cut it off.
//   The attention mask covers every real token; padding is left
//   to the batcher so each batch only pads to its own longest row.
//
// Classification (fixed length):
//   The tokenizer itself is configured to truncate and pad every
//   text to the same length, so samples stack without a collator.
//
// Reference: tokenizers crate (TruncationParams, PaddingParams)

use anyhow::{anyhow, Context, Result};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::data::dataset::{ClassifierSample, Seq2SeqSample};
use crate::domain::example::{LabeledText, Seq2SeqExample};

pub const MAX_SOURCE_TOKENS: usize = 512;
pub const MAX_TARGET_TOKENS: usize = 256;

/// Clone `tokenizer` with truncation and fixed-length padding at
/// `max_length` tokens.
pub fn fixed_length_tokenizer(tokenizer: &Tokenizer, max_length: usize, pad_id: u32) -> Result<Tokenizer> {
    let mut tokenizer = tokenizer.clone();
    let pad_token = tokenizer
        .id_to_token(pad_id)
        .unwrap_or_else(|| "[PAD]".to_string());

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| anyhow!("Cannot configure truncation: {e}"))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_length),
        pad_id,
        pad_token,
        ..Default::default()
    }));

    Ok(tokenizer)
}

// ─── Seq2seq ──────────────────────────────────────────────────────────────────
pub struct Seq2SeqFeaturizer<'a> {
    tokenizer:      &'a Tokenizer,
    eos_id:         Option<u32>,
    max_source_len: usize,
    max_target_len: usize,
}

impl<'a> Seq2SeqFeaturizer<'a> {
    pub fn new(tokenizer: &'a Tokenizer, eos_id: Option<u32>) -> Self {
        Self {
            tokenizer,
            eos_id,
            max_source_len: MAX_SOURCE_TOKENS,
            max_target_len: MAX_TARGET_TOKENS,
        }
    }

    pub fn with_limits(mut self, max_source_len: usize, max_target_len: usize) -> Self {
        self.max_source_len = max_source_len;
        self.max_target_len = max_target_len;
        self
    }

    /// Convert a whole split in one batched tokenizer call per side.
    /// Output has exactly one sample per input example, in order.
    pub fn convert(&self, examples: &[Seq2SeqExample]) -> Result<Vec<Seq2SeqSample>> {
        let inputs:  Vec<&str> = examples.iter().map(|e| e.input.as_str()).collect();
        let targets: Vec<&str> = examples.iter().map(|e| e.output.as_str()).collect();

        let input_encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow!("Tokenisation error (inputs): {e}"))?;
        let target_encodings = self
            .tokenizer
            .encode_batch(targets, true)
            .map_err(|e| anyhow!("Tokenisation error (targets): {e}"))?;

        let samples = input_encodings
            .iter()
            .zip(target_encodings.iter())
            .map(|(input, target)| {
                let input_ids = self.terminate(input.get_ids(), self.max_source_len);
                let labels    = self.terminate(target.get_ids(), self.max_target_len);
                Seq2SeqSample {
                    attention_mask: vec![1; input_ids.len()],
                    input_ids,
                    labels,
                }
            })
            .collect();

        Ok(samples)
    }

    /// Truncate to `max_len` and make sure the sequence ends in EOS
    fn terminate(&self, ids: &[u32], max_len: usize) -> Vec<u32> {
        let mut ids: Vec<u32> = ids.iter().copied().take(max_len).collect();
        if let Some(eos) = self.eos_id {
            if ids.last() != Some(&eos) && max_len > 0 {
                if ids.len() == max_len {
                    ids.pop();
                }
                ids.push(eos);
            }
        }
        ids
    }
}

// ─── Classification ───────────────────────────────────────────────────────────
/// Tokenise labelled texts with a fixed-length tokenizer
/// (see [`fixed_length_tokenizer`]).
pub fn classifier_features(tokenizer: &Tokenizer, rows: &[LabeledText]) -> Result<Vec<ClassifierSample>> {
    let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
    let encodings = tokenizer
        .encode_batch(texts, true)
        .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

    rows.iter()
        .zip(encodings.iter())
        .map(|(row, enc)| {
            let label = usize::try_from(row.label)
                .with_context(|| format!("Negative label {} for '{}'", row.label, row.text))?;
            Ok(ClassifierSample {
                input_ids:      enc.get_ids().to_vec(),
                attention_mask: enc.get_attention_mask().to_vec(),
                label,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::build_word_level;

    fn tokenizer() -> Tokenizer {
        let corpus = vec!["the quick brown fox jumps over the lazy dog".to_string()];
        build_word_level(&corpus, 64).unwrap()
    }

    #[test]
    fn test_one_sample_per_example() {
        let tok = tokenizer();
        let featurizer = Seq2SeqFeaturizer::new(&tok, Some(102));
        let examples = vec![
            Seq2SeqExample::new("the quick fox", "lazy dog"),
            Seq2SeqExample::new("over", "the brown fox jumps"),
            Seq2SeqExample::new("dog", "fox"),
        ];

        let samples = featurizer.convert(&examples).unwrap();
        assert_eq!(samples.len(), 3);
        for s in &samples {
            assert_eq!(s.input_ids.len(), s.attention_mask.len());
            assert!(s.attention_mask.iter().all(|&m| m == 1));
            assert_eq!(s.labels.last(), Some(&102));
        }
        // "the quick fox" + EOS
        assert_eq!(samples[0].input_ids.len(), 4);
    }

    #[test]
    fn test_truncation_keeps_eos() {
        let tok = tokenizer();
        let featurizer = Seq2SeqFeaturizer::new(&tok, Some(102)).with_limits(4, 2);
        let examples = vec![Seq2SeqExample::new(
            "the quick brown fox jumps over",
            "the lazy dog",
        )];

        let sample = &featurizer.convert(&examples).unwrap()[0];
        assert_eq!(sample.input_ids.len(), 4);
        assert_eq!(sample.labels.len(), 2);
        assert_eq!(sample.input_ids[3], 102);
        assert_eq!(sample.labels[1], 102);
    }

    #[test]
    fn test_classifier_features_are_fixed_length() {
        let tok = fixed_length_tokenizer(&tokenizer(), 6, 0).unwrap();
        let rows = vec![
            LabeledText::new("the dog", 0),
            LabeledText::new("the quick brown fox jumps over the lazy dog", 3),
        ];

        let samples = classifier_features(&tok, &rows).unwrap();
        assert!(samples.iter().all(|s| s.input_ids.len() == 6));
        assert_eq!(samples[0].attention_mask, vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(samples[0].input_ids[2..], [0, 0, 0, 0]);
        assert_eq!(samples[1].attention_mask, vec![1; 6]);
        assert_eq!(samples[1].label, 3);
    }

    #[test]
    fn test_negative_label_is_rejected() {
        let tok = fixed_length_tokenizer(&tokenizer(), 4, 0).unwrap();
        assert!(classifier_features(&tok, &[LabeledText::new("dog", -1)]).is_err());
    }
}
