// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between files on disk and tensor batches:
//
//   JSON / TSV split
//       │
//       ▼
//   loader            → reads splits into domain examples
//       │
//       ▼
//   views             → classifier train/valid/test(+subsets)
//       │
//       ▼
//   features          → tokenises examples into samples
//       │
//       ▼
//   SampleDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   batchers          → pad and stack samples into tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads JSON and TSV dataset splits
pub mod loader;

/// Builds the six classifier evaluation views
pub mod views;

/// Converts examples into token-id samples
pub mod features;

/// Implements Burn's Dataset trait for samples
pub mod dataset;

/// Implements Burn's Batcher trait for both tasks
pub mod batcher;
