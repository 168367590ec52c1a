// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the process
// environment, shared by the use cases:
//
//   model_store.rs     — Pretrained model directories
//                        Resolves a model name, loads and saves
//                        tokenizer.json + config.json + weights.
//                        Also acts as the trainer's checkpoint sink.
//
//   tokenizer_store.rs — Tokenizer persistence
//                        Loads/saves tokenizer.json, builds a
//                        word-level tokenizer from a corpus and
//                        resolves special token ids.
//
//   report.rs          — Append-only result files
//                        Per-view metrics CSV and the seq2seq
//                        training-time log.
//
//   config.rs          — Typed YAML run configuration
//
//   logging.rs         — tracing subscriber with a reloadable filter
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model directory resolution, loading and saving
pub mod model_store;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Results CSV and performance log
pub mod report;

/// YAML run configuration
pub mod config;

/// Subscriber setup and runtime log level
pub mod logging;
