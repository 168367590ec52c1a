// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches tensors lives here. Data preparation
// hands this layer tokenised samples and batchers; the
// application layer hands it training arguments. Nothing above
// this layer builds tensors itself.
//
//   model.rs      — encoder-decoder and encoder-classifier
//                   transformers, plus their tagged config
//   generation.rs — greedy autoregressive decoding
//   arguments.rs  — TrainingArguments and its setter groups
//   scheduler.rs  — learning rate warmup and decay
//   evaluation.rs — eval loop and classification metrics
//   trainer.rs    — the shared training loop with gradient
//                   accumulation, logging, eval and checkpoints
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Transformer architectures and their configs
pub mod model;

/// Greedy decoding for the seq2seq model
pub mod generation;

/// Training arguments with grouped setters
pub mod arguments;

/// Learning rate schedules
pub mod scheduler;

/// Evaluation loop and metrics
pub mod evaluation;

/// Generic training loop
pub mod trainer;
