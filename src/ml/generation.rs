// ============================================================
// Layer 5 — Greedy Generation
// ============================================================
// Autoregressive decoding for the seq2seq model:
//
//   1. encode the source once
//   2. start every row with the decoder start token
//   3. repeatedly run the decoder, take argmax of the last
//      position, append it
//   4. a row is finished once it emits EOS; finished rows keep
//      receiving pad so the batch stays rectangular
//
// `max_length` counts the start token, so the longest output
// holds max_length - 1 generated tokens.

use burn::prelude::*;

use crate::ml::model::Seq2SeqModel;

#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    pub max_length:             usize,
    pub decoder_start_token_id: u32,
    pub eos_token_id:           u32,
    pub pad_token_id:           u32,
}

/// Returns one token list per input row, start token included,
/// trailing pad removed.
pub fn greedy_generate<B: Backend>(
    model:          &Seq2SeqModel<B>,
    input_ids:      Tensor<B, 2, Int>,
    attention_mask: Tensor<B, 2, Int>,
    config:         GenerationConfig,
) -> Vec<Vec<u32>> {
    let [batch_size, _] = input_ids.dims();
    let device = input_ids.device();
    let state  = model.encode(input_ids, attention_mask);

    let mut sequences: Vec<Vec<u32>> = vec![vec![config.decoder_start_token_id]; batch_size];
    let mut finished = vec![false; batch_size];
    let max_length = config.max_length.min(model.max_target_len).max(1);

    while sequences[0].len() < max_length && !finished.iter().all(|&done| done) {
        let len  = sequences[0].len();
        let flat: Vec<i64> = sequences.iter().flatten().map(|&t| t as i64).collect();
        let decoder_input = Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [batch_size, len]), &device);

        let logits = model.decode(decoder_input, &state);
        let [_, _, vocab] = logits.dims();
        let last = logits.slice([0..batch_size, len - 1..len, 0..vocab]).reshape([batch_size, vocab]);
        let next: Vec<i64> = last.argmax(1).into_data().iter::<i64>().collect();

        for (row, token) in next.into_iter().enumerate() {
            let token = if finished[row] { config.pad_token_id } else { token as u32 };
            sequences[row].push(token);
            if token == config.eos_token_id {
                finished[row] = true;
            }
        }
    }

    for (row, sequence) in sequences.iter_mut().enumerate() {
        if finished[row] {
            if let Some(eos_at) = sequence.iter().skip(1).position(|&t| t == config.eos_token_id) {
                sequence.truncate(eos_at + 2);
            }
        }
    }
    sequences
}
