// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per subcommand. Each orchestrates the lower
// layers to accomplish a single goal:
//
//   summarize_use_case   — fragments → one generated summary
//   seq2seq_use_case     — fine-tune a seq2seq model on JSON splits
//   classifier_use_case  — fine-tune a classifier, report six views
//   init_model_use_case  — create a model directory from scratch
//
// Rules for this layer:
//   - No tensor math here (that's Layer 5)
//   - No argument parsing or printing (that's Layer 1)
//   - File formats belong to Layers 4 and 6
//
// Use cases are generic over the Burn backend, so the CLI runs
// them on WGPU and the tests run them on NdArray.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Summary generation workflow
pub mod summarize_use_case;

/// Seq2seq fine-tuning workflow
pub mod seq2seq_use_case;

/// Classifier fine-tuning and per-view evaluation workflow
pub mod classifier_use_case;

/// Model directory bootstrap
pub mod init_model_use_case;
