// ============================================================
// Layer 4 — Split Loaders
// ============================================================
// Reads dataset splits from disk into domain examples.
//
//   JsonSplitLoader — seq2seq splits. Accepts either a JSON
//                     array of {"input", "output"} objects or
//                     JSON Lines (one object per line).
//   TsvSplitLoader  — classification splits. Tab-separated with
//                     a header row; the `x` column holds the text
//                     and `y` the integer label. Extra columns are
//                     ignored, missing ones are fatal.
//
// Every failure carries the offending path (and line/record
// where known) so a bad split is easy to find.

use anyhow::{anyhow, bail, Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::example::{LabeledText, Seq2SeqExample};
use crate::domain::traits::ExampleSource;

pub const TEXT_COLUMN:  &str = "x";
pub const LABEL_COLUMN: &str = "y";

// ─── JSON ─────────────────────────────────────────────────────────────────────
pub struct JsonSplitLoader {
    path: PathBuf,
}

impl JsonSplitLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExampleSource<Seq2SeqExample> for JsonSplitLoader {
    fn load_all(&self) -> Result<Vec<Seq2SeqExample>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read split '{}'", self.path.display()))?;

        let examples = parse_json_examples(&raw)
            .with_context(|| format!("Malformed JSON split '{}'", self.path.display()))?;

        tracing::debug!("Loaded {} examples from '{}'", examples.len(), self.path.display());
        Ok(examples)
    }
}

/// Parse a JSON array, or fall back to JSON Lines when the
/// document does not start with `[`.
fn parse_json_examples(raw: &str) -> Result<Vec<Seq2SeqExample>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", idx + 1))
        })
        .collect()
}

// ─── TSV ──────────────────────────────────────────────────────────────────────
pub struct TsvSplitLoader {
    path: PathBuf,
}

impl TsvSplitLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExampleSource<LabeledText> for TsvSplitLoader {
    fn load_all(&self) -> Result<Vec<LabeledText>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&self.path)
            .with_context(|| format!("Cannot open split '{}'", self.path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Cannot read header of '{}'", self.path.display()))?
            .clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| anyhow!("Column '{}' missing in '{}'", name, self.path.display()))
        };
        let text_idx  = column(TEXT_COLUMN)?;
        let label_idx = column(LABEL_COLUMN)?;

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Bad record {} in '{}'", idx + 1, self.path.display()))?;

            let (Some(text), Some(label)) = (record.get(text_idx), record.get(label_idx)) else {
                bail!("Record {} in '{}' is missing fields", idx + 1, self.path.display());
            };
            let label: i64 = label.trim().parse().with_context(|| {
                format!("Label '{}' of record {} in '{}' is not an integer",
                    label, idx + 1, self.path.display())
            })?;

            rows.push(LabeledText::new(text, label));
        }

        tracing::debug!("Loaded {} rows from '{}'", rows.len(), self.path.display());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_array() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("train.json");
        fs::write(&path, r#"[{"input": "a b", "output": "c"}, {"input": "d", "output": "e f"}]"#).unwrap();

        let examples = JsonSplitLoader::new(&path).load_all().unwrap();
        assert_eq!(examples, vec![
            Seq2SeqExample::new("a b", "c"),
            Seq2SeqExample::new("d", "e f"),
        ]);
    }

    #[test]
    fn test_json_lines() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("val.json");
        fs::write(&path, "{\"input\": \"a\", \"output\": \"b\"}\n\n{\"input\": \"c\", \"output\": \"d\"}\n").unwrap();

        let examples = JsonSplitLoader::new(&path).load_all().unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1].output, "d");
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("test.json");
        fs::write(&path, r#"[{"input": "a"}]"#).unwrap();

        assert!(JsonSplitLoader::new(&path).load_all().is_err());
    }

    #[test]
    fn test_missing_json_file_is_fatal() {
        assert!(JsonSplitLoader::new("/nonexistent/train.json").load_all().is_err());
    }

    #[test]
    fn test_tsv_reads_x_and_y() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "x\ty\nfirst text\t0\nsecond, with comma\t3\n").unwrap();

        let rows = TsvSplitLoader::new(&path).load_all().unwrap();
        assert_eq!(rows, vec![
            LabeledText::new("first text", 0),
            LabeledText::new("second, with comma", 3),
        ]);
    }

    #[test]
    fn test_tsv_extra_columns_are_ignored() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("val.csv");
        fs::write(&path, "id\ty\tx\n7\t2\thello\n").unwrap();

        let rows = TsvSplitLoader::new(&path).load_all().unwrap();
        assert_eq!(rows, vec![LabeledText::new("hello", 2)]);
    }

    #[test]
    fn test_tsv_missing_column_is_fatal() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("test.csv");
        fs::write(&path, "text\ty\nhello\t1\n").unwrap();

        let err = TsvSplitLoader::new(&path).load_all().unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_tsv_non_integer_label_is_fatal() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("test.csv");
        fs::write(&path, "x\ty\nhello\tgood\n").unwrap();

        assert!(TsvSplitLoader::new(&path).load_all().is_err());
    }
}
