// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the pipelines
// work with: labelled examples, evaluation result rows, and the
// abstractions the other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Seq2seq and classification examples
pub mod example;

// One evaluation result row of the classifier report
pub mod result_row;

// Core abstractions (traits) that other layers implement
pub mod traits;
