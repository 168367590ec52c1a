// ============================================================
// Layer 3 — Example Domain Types
// ============================================================
// The two kinds of supervised example the trainers consume:
//
//   Seq2SeqExample — (input text, expected output text)
//   LabeledText    — (text, integer class label)
//
// Field names mirror the on-disk column names so serde can
// read them directly: `input`/`output` in the JSON splits.

use serde::{Deserialize, Serialize};

/// One input → target pair for sequence-to-sequence fine-tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seq2SeqExample {
    /// Source text fed to the encoder
    pub input: String,

    /// Target text the decoder should learn to produce
    pub output: String,
}

impl Seq2SeqExample {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input:  input.into(),
            output: output.into(),
        }
    }
}

/// One text with its integer class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledText {
    pub text:  String,
    pub label: i64,
}

impl LabeledText {
    pub fn new(text: impl Into<String>, label: i64) -> Self {
        Self { text: text.into(), label }
    }
}
