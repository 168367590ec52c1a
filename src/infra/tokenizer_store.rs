// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads, saves and (for `init-model`) builds tokenizers.
//
// A built tokenizer is a word-level vocabulary written directly
// as Hugging Face tokenizer JSON and parsed back, so it goes
// through exactly the same code path as a downloaded
// tokenizer.json:
//
//   [PAD]=0  [UNK]=1  [CLS]=101  [SEP]=102  [MASK]=103
//   BertNormalizer (lowercase) + Whitespace pre-tokenizer
//   remaining ids from 104 upwards, most frequent words first
//
// Special ids a model needs are looked up by token text so
// mt5-style (`<pad>`, `</s>`) and BERT-style (`[PAD]`, `[SEP]`)
// vocabularies both work.

use anyhow::{anyhow, Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]",  0),
    ("[UNK]",  1),
    ("[CLS]",  101),
    ("[SEP]",  102),
    ("[MASK]", 103),
];
const FIRST_WORD_ID: usize = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn load(&self) -> Result<Tokenizer> {
        load_file(&self.path())
    }

    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, true)
            .map_err(|e| anyhow!("Cannot save tokenizer to '{}': {e}", path.display()))?;
        tracing::debug!("Tokenizer saved to '{}'", path.display());
        Ok(())
    }
}

pub fn load_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {e}", path.display()))
}

/// Build a word-level tokenizer from `texts`, keeping at most
/// `vocab_size - 5` words besides the special tokens.
pub fn build_word_level(texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
    // ── Step 1: word frequencies ──────────────────────────────────────────────
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.split_whitespace() {
            let w = word.to_lowercase();
            let w = w.trim_matches(|c: char| !c.is_alphanumeric());
            if !w.is_empty() {
                *freq.entry(w.to_string()).or_insert(0) += 1;
            }
        }
    }

    // Most frequent first; ties alphabetical so the ids are reproducible
    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

    // ── Step 2: vocab ─────────────────────────────────────────────────────────
    let mut vocab = serde_json::Map::new();
    for (token, id) in SPECIAL_TOKENS {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }
    let mut next_id = FIRST_WORD_ID;
    for (word, _) in words {
        if !vocab.contains_key(&word) {
            vocab.insert(word, serde_json::json!(next_id));
            next_id += 1;
        }
    }

    // ── Step 3: tokenizer JSON ────────────────────────────────────────────────
    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .map(|(content, id)| serde_json::json!({
            "id": id, "content": content,
            "single_word": false, "lstrip": false, "rstrip": false,
            "normalized": false, "special": true
        }))
        .collect();

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    });

    tracing::info!("Built word-level tokenizer, highest id {}", next_id - 1);
    Tokenizer::from_str(&tokenizer_json.to_string())
        .map_err(|e| anyhow!("Cannot build tokenizer: {e}"))
}

/// Ids the models need, resolved by token text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad:   u32,
    pub eos:   Option<u32>,
    pub start: u32,
}

impl SpecialTokens {
    pub fn resolve(tokenizer: &Tokenizer) -> Result<Self> {
        let first = |names: &[&str]| names.iter().find_map(|name| tokenizer.token_to_id(name));

        let pad = first(&["<pad>", "[PAD]"])
            .context("Tokenizer has no padding token (<pad> or [PAD])")?;
        let eos   = first(&["</s>", "[SEP]"]);
        let start = first(&["<s>", "[CLS]"]).unwrap_or(pad);

        Ok(Self { pad, eos, start })
    }
}

/// Embedding rows a model needs for this tokenizer: highest id + 1.
/// Ids need not be contiguous ([CLS] sits at 101).
pub fn vocab_extent(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .max()
        .map(|&id| id as usize + 1)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "The cat sat on the mat.".to_string(),
            "The dog sat, too!".to_string(),
        ]
    }

    #[test]
    fn test_special_ids_are_fixed() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        assert_eq!(tok.token_to_id("[PAD]"), Some(0));
        assert_eq!(tok.token_to_id("[SEP]"), Some(102));
        // "the" is the most frequent word
        assert_eq!(tok.token_to_id("the"), Some(104));
    }

    #[test]
    fn test_vocab_size_caps_words() {
        let tok = build_word_level(&corpus(), 7).unwrap();
        // 5 specials + 2 words
        assert_eq!(tok.get_vocab(true).len(), 7);
        assert_eq!(vocab_extent(&tok), 106);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        let enc = tok.encode("the zebra", false).unwrap();
        assert_eq!(enc.get_ids(), &[104, 1]);
    }

    #[test]
    fn test_special_tokens_resolve_bert_style() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        let special = SpecialTokens::resolve(&tok).unwrap();
        assert_eq!(special, SpecialTokens { pad: 0, eos: Some(102), start: 101 });
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        store.save(&build_word_level(&corpus(), 100).unwrap()).unwrap();
        assert_eq!(store.load().unwrap().token_to_id("mat"), build_word_level(&corpus(), 100).unwrap().token_to_id("mat"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokenizerStore::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }
}
