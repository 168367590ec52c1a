// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits rather
// than concrete loaders, so a JSON split, a TSV split, or an
// in-memory fixture can all feed the same pipeline.

use anyhow::Result;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can load one dataset split.
///
/// Implementations:
///   - JsonSplitLoader → `{input, output}` records from JSON / JSON Lines
///   - TsvSplitLoader  → `x`/`y` columns from a tab-separated file
pub trait ExampleSource<T> {
    /// Load every example of the split, in file order.
    fn load_all(&self) -> Result<Vec<T>>;
}

// ─── Summarizer ───────────────────────────────────────────────────────────────
/// Any component that condenses text fragments into one summary.
pub trait Summarizer {
    /// The two identifier strings are part of the call contract
    /// but do not influence the summary.
    fn summarize(
        &self,
        first_object:  &str,
        second_object: &str,
        fragments:     &[String],
    ) -> Result<String>;
}
