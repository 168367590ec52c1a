use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, log_softmax},
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{ClassifierBatch, Seq2SeqBatch};
use crate::ml::evaluation::EvalStep;
use crate::ml::trainer::Objective;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally. Do NOT add them again, or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub vocab_size:             usize,
    pub pad_token_id:           u32,
    pub eos_token_id:           u32,
    pub decoder_start_token_id: u32,
    #[config(default = 1024)]
    pub max_source_len: usize,
    #[config(default = 256)]
    pub max_target_len: usize,
    #[config(default = 256)]
    pub d_model: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 6)]
    pub num_encoder_layers: usize,
    #[config(default = 6)]
    pub num_decoder_layers: usize,
    #[config(default = 1024)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub vocab_size:   usize,
    pub pad_token_id: u32,
    #[config(default = 4)]
    pub num_labels: usize,
    #[config(default = 512)]
    pub max_seq_len: usize,
    #[config(default = 256)]
    pub d_model: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 6)]
    pub num_layers: usize,
    #[config(default = 1024)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

/// Architecture stored as `config.json` next to the weights.
/// The `kind` tag lets a loader refuse the wrong model type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    Seq2seq(Seq2SeqConfig),
    Classifier(ClassifierConfig),
}

impl ModelConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelConfig::Seq2seq(_)    => "seq2seq",
            ModelConfig::Classifier(_) => "classifier",
        }
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
struct StackDims {
    vocab_size: usize,
    max_len:    usize,
    d_model:    usize,
    num_heads:  usize,
    num_layers: usize,
    d_ff:       usize,
    dropout:    f64,
}

impl StackDims {
    fn attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device)
    }

    fn encoder<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let layers = (0..self.num_layers)
            .map(|_| EncoderBlock {
                self_attn:   self.attention(device),
                ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
                ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
                norm1:       LayerNormConfig::new(self.d_model).init(device),
                norm2:       LayerNormConfig::new(self.d_model).init(device),
                dropout:     DropoutConfig::new(self.dropout).init(),
            })
            .collect();

        Encoder {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position_embedding: EmbeddingConfig::new(self.max_len, self.d_model).init(device),
            layers,
            final_norm: LayerNormConfig::new(self.d_model).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }

    fn decoder<B: Backend>(&self, device: &B::Device) -> Decoder<B> {
        let layers = (0..self.num_layers)
            .map(|_| DecoderBlock {
                self_attn:   self.attention(device),
                cross_attn:  self.attention(device),
                ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
                ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
                norm1:       LayerNormConfig::new(self.d_model).init(device),
                norm2:       LayerNormConfig::new(self.d_model).init(device),
                norm3:       LayerNormConfig::new(self.d_model).init(device),
                dropout:     DropoutConfig::new(self.dropout).init(),
            })
            .collect();

        Decoder {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position_embedding: EmbeddingConfig::new(self.max_len, self.d_model).init(device),
            layers,
            final_norm: LayerNormConfig::new(self.d_model).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> Encoder<B> {
    /// input_ids: [batch, seq_len], mask_pad: true on padding → [batch, seq_len, d_model]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let mut x = self.dropout.forward(embed(&self.token_embedding, &self.position_embedding, input_ids));
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        self.final_norm.forward(x)
    }
}

// Self-attention is permutation-invariant, so position must be injected explicitly.
fn embed<B: Backend>(
    tokens:    &Embedding<B>,
    positions: &Embedding<B>,
    input_ids: Tensor<B, 2, Int>,
) -> Tensor<B, 3> {
    let [batch_size, seq_len] = input_ids.dims();
    let tok_emb = tokens.forward(input_ids);
    let pos_ids = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
        .unsqueeze::<2>()
        .expand([batch_size, seq_len]);
    tok_emb + positions.forward(pos_ids)
}

// ─── Decoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        causal_mask: Tensor<B, 3, Bool>,
        memory_pad:  Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let attn = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_attn(causal_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn));

        let cross = self
            .cross_attn
            .forward(MhaInput::new(x.clone(), memory.clone(), memory).mask_pad(memory_pad))
            .context;
        let x = self.norm2.forward(x + self.dropout.forward(cross));

        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm3.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<DecoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
}

// ─── Seq2seq model ────────────────────────────────────────────────────────────
impl Seq2SeqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let encoder_dims = StackDims {
            vocab_size: self.vocab_size,
            max_len:    self.max_source_len,
            d_model:    self.d_model,
            num_heads:  self.num_heads,
            num_layers: self.num_encoder_layers,
            d_ff:       self.d_ff,
            dropout:    self.dropout,
        };
        let decoder_dims = StackDims {
            max_len:    self.max_target_len,
            num_layers: self.num_decoder_layers,
            ..encoder_dims
        };

        Seq2SeqModel {
            encoder: encoder_dims.encoder(device),
            decoder: decoder_dims.decoder(device),
            lm_head: LinearConfig::new(self.d_model, self.vocab_size).init(device),
            pad_token_id:   self.pad_token_id as usize,
            max_target_len: self.max_target_len,
        }
    }
}

#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub encoder:        Encoder<B>,
    pub decoder:        Decoder<B>,
    pub lm_head:        Linear<B>,
    pub pad_token_id:   usize,
    pub max_target_len: usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// Encode the source once; reused for every decoding step.
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> EncoderState<B> {
        let memory_pad = attention_mask.equal_elem(0);
        let memory     = self.encoder.forward(input_ids, memory_pad.clone());
        EncoderState { memory, memory_pad }
    }

    /// decoder_input_ids: [batch, tgt_len] → logits [batch, tgt_len, vocab]
    pub fn decode(&self, decoder_input_ids: Tensor<B, 2, Int>, state: &EncoderState<B>) -> Tensor<B, 3> {
        let [batch_size, tgt_len] = decoder_input_ids.dims();
        let device = decoder_input_ids.device();

        let mut x = self.decoder.dropout.forward(embed(
            &self.decoder.token_embedding,
            &self.decoder.position_embedding,
            decoder_input_ids,
        ));
        let causal_mask = generate_autoregressive_mask::<B>(batch_size, tgt_len, &device);
        for layer in &self.decoder.layers {
            x = layer.forward(x, state.memory.clone(), causal_mask.clone(), state.memory_pad.clone());
        }
        self.lm_head.forward(self.decoder.final_norm.forward(x))
    }

    pub fn forward(&self, batch: &Seq2SeqBatch<B>) -> Tensor<B, 3> {
        let state = self.encode(batch.input_ids.clone(), batch.attention_mask.clone());
        self.decode(batch.decoder_input_ids.clone(), &state)
    }

    /// Token-level cross entropy, averaged over non-pad label positions.
    /// Returns (loss, number of counted tokens).
    fn token_loss(&self, batch: Seq2SeqBatch<B>) -> (Tensor<B, 1>, usize) {
        let logits = self.forward(&batch);
        let [batch_size, tgt_len, vocab] = logits.dims();
        let n = batch_size * tgt_len;

        let log_probs = log_softmax(logits.reshape([n, vocab]), 1);
        let targets   = batch.labels.reshape([n]);
        let keep      = targets.clone().not_equal_elem(self.pad_token_id as i64).float();
        let picked    = log_probs.gather(1, targets.unsqueeze_dim::<2>(1)).reshape([n]);

        let count: f64 = keep.clone().sum().into_scalar().elem::<f64>();
        let loss = (picked * keep).sum().neg() / count.max(1.0);
        (loss, count as usize)
    }
}

pub struct EncoderState<B: Backend> {
    pub memory:     Tensor<B, 3>,
    pub memory_pad: Tensor<B, 2, Bool>,
}

impl<B: Backend> Objective<B, Seq2SeqBatch<B>> for Seq2SeqModel<B> {
    fn loss(&self, batch: Seq2SeqBatch<B>) -> Tensor<B, 1> {
        self.token_loss(batch).0
    }

    fn evaluate(&self, batch: Seq2SeqBatch<B>) -> EvalStep {
        let samples = batch.input_ids.dims()[0];
        let (loss, _) = self.token_loss(batch);
        EvalStep::loss_only(loss.into_scalar().elem::<f64>(), samples)
    }
}

// ─── Classifier model ─────────────────────────────────────────────────────────
impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierModel<B> {
        let dims = StackDims {
            vocab_size: self.vocab_size,
            max_len:    self.max_seq_len,
            d_model:    self.d_model,
            num_heads:  self.num_heads,
            num_layers: self.num_layers,
            d_ff:       self.d_ff,
            dropout:    self.dropout,
        };

        ClassifierModel {
            encoder: dims.encoder(device),
            head:    LinearConfig::new(self.d_model, self.num_labels).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ClassifierModel<B: Backend> {
    pub encoder: Encoder<B>,
    pub head:    Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> ClassifierModel<B> {
    /// input_ids, attention_mask: [batch, seq_len] → logits [batch, num_labels]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, _] = input_ids.dims();
        let hidden = self.encoder.forward(input_ids, attention_mask.clone().equal_elem(0));
        let [_, _, d_model] = hidden.dims();

        // Mean over real tokens only
        let mask   = attention_mask.float().unsqueeze_dim::<3>(2);
        let summed = (hidden * mask.clone()).sum_dim(1);
        let counts = mask.sum_dim(1).clamp_min(1.0);
        let pooled = (summed / counts).reshape([batch_size, d_model]);

        self.head.forward(self.dropout.forward(pooled))
    }
}

impl<B: Backend> Objective<B, ClassifierBatch<B>> for ClassifierModel<B> {
    fn loss(&self, batch: ClassifierBatch<B>) -> Tensor<B, 1> {
        let logits = self.forward(batch.input_ids, batch.attention_mask);
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, batch.labels)
    }

    fn evaluate(&self, batch: ClassifierBatch<B>) -> EvalStep {
        let logits = self.forward(batch.input_ids, batch.attention_mask);
        let [batch_size, _] = logits.dims();

        let loss: f64 = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.labels.clone())
            .into_scalar()
            .elem::<f64>();

        let predictions = logits.argmax(1).reshape([batch_size]).into_data().iter::<i64>().collect();
        let references  = batch.labels.into_data().iter::<i64>().collect();

        EvalStep {
            loss,
            samples: batch_size,
            predictions,
            references,
        }
    }
}
