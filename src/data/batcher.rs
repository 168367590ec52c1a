// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implement Burn's Batcher trait to stack samples into tensors.
//
// Seq2SeqBatcher — dynamic padding collator:
//   - input_ids padded with the pad id to the longest input
//   - attention_mask padded with 0
//   - labels padded with the pad id to the longest label; the
//     loss ignores pad positions, so padding never counts
//   - decoder_input_ids = labels shifted one step right behind
//     the decoder start token (teacher forcing)
//
//   Example, pad=0, start=0, two samples:
//     labels            [[5, 6, 1], [7, 1, 0]]
//     decoder_input_ids [[0, 5, 6], [0, 7, 1]]
//
// ClassifierBatcher — samples are already fixed length, so it
// only flattens and reshapes, like a plain stack.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::{ClassifierSample, Seq2SeqSample};

// ─── Seq2seq ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// [batch_size, source_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// [batch_size, source_len], 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,

    /// [batch_size, target_len]
    pub decoder_input_ids: Tensor<B, 2, Int>,

    /// [batch_size, target_len]
    pub labels: Tensor<B, 2, Int>,
}

/// Padded, flattened batch before it becomes tensors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collated {
    pub batch_size:        usize,
    pub source_len:        usize,
    pub target_len:        usize,
    pub input_ids:         Vec<i64>,
    pub attention_mask:    Vec<i64>,
    pub decoder_input_ids: Vec<i64>,
    pub labels:            Vec<i64>,
}

#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher {
    pub pad_id:           u32,
    pub decoder_start_id: u32,
}

impl Seq2SeqBatcher {
    pub fn new(pad_id: u32, decoder_start_id: u32) -> Self {
        Self { pad_id, decoder_start_id }
    }

    pub fn collate(&self, items: &[Seq2SeqSample]) -> Collated {
        let batch_size = items.len();
        let source_len = items.iter().map(|s| s.input_ids.len()).max().unwrap_or(0).max(1);
        let target_len = items.iter().map(|s| s.labels.len()).max().unwrap_or(0).max(1);
        let pad = self.pad_id as i64;

        let mut collated = Collated {
            batch_size,
            source_len,
            target_len,
            input_ids:         Vec::with_capacity(batch_size * source_len),
            attention_mask:    Vec::with_capacity(batch_size * source_len),
            decoder_input_ids: Vec::with_capacity(batch_size * target_len),
            labels:            Vec::with_capacity(batch_size * target_len),
        };

        for sample in items {
            extend_padded(&mut collated.input_ids, &sample.input_ids, source_len, pad);
            extend_padded(&mut collated.attention_mask, &sample.attention_mask, source_len, 0);
            extend_padded(&mut collated.labels, &sample.labels, target_len, pad);

            // Shift right: [start, l0, l1, ..., l(n-2)], padded
            let shifted: Vec<u32> = std::iter::once(self.decoder_start_id)
                .chain(sample.labels.iter().copied())
                .take(target_len)
                .collect();
            extend_padded(&mut collated.decoder_input_ids, &shifted, target_len, pad);
        }

        collated
    }
}

fn extend_padded(out: &mut Vec<i64>, values: &[u32], len: usize, pad: i64) {
    out.extend(values.iter().take(len).map(|&v| v as i64));
    out.extend(std::iter::repeat(pad).take(len.saturating_sub(values.len())));
}

impl<B: Backend> Batcher<B, Seq2SeqSample, Seq2SeqBatch<B>> for Seq2SeqBatcher {
    fn batch(&self, items: Vec<Seq2SeqSample>, device: &B::Device) -> Seq2SeqBatch<B> {
        let c = self.collate(&items);
        let source = [c.batch_size, c.source_len];
        let target = [c.batch_size, c.target_len];

        Seq2SeqBatch {
            input_ids:         int_tensor(c.input_ids, source, device),
            attention_mask:    int_tensor(c.attention_mask, source, device),
            decoder_input_ids: int_tensor(c.decoder_input_ids, target, device),
            labels:            int_tensor(c.labels, target, device),
        }
    }
}

// ─── Classification ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ClassifierBatch<B: Backend> {
    /// [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug, Default)]
pub struct ClassifierBatcher;

impl<B: Backend> Batcher<B, ClassifierSample, ClassifierBatch<B>> for ClassifierBatcher {
    fn batch(&self, items: Vec<ClassifierSample>, device: &B::Device) -> ClassifierBatch<B> {
        let batch_size = items.len();
        // All samples share the tokenizer's fixed length
        let seq_len = items.first().map(|s| s.input_ids.len()).unwrap_or(0);

        let input_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i64))
            .collect();
        let mask_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i64))
            .collect();
        let labels: Vec<i64> = items.iter().map(|s| s.label as i64).collect();

        ClassifierBatch {
            input_ids:      int_tensor(input_flat, [batch_size, seq_len], device),
            attention_mask: int_tensor(mask_flat, [batch_size, seq_len], device),
            labels:         Tensor::from_data(TensorData::new(labels, [batch_size]), device),
        }
    }
}

fn int_tensor<B: Backend>(values: Vec<i64>, shape: [usize; 2], device: &B::Device) -> Tensor<B, 2, Int> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn sample(input: &[u32], labels: &[u32]) -> Seq2SeqSample {
        Seq2SeqSample {
            input_ids:      input.to_vec(),
            attention_mask: vec![1; input.len()],
            labels:         labels.to_vec(),
        }
    }

    #[test]
    fn test_collate_pads_to_longest() {
        let batcher = Seq2SeqBatcher::new(0, 0);
        let c = batcher.collate(&[sample(&[4, 5, 1], &[5, 6, 1]), sample(&[9, 1], &[7, 1])]);

        assert_eq!((c.batch_size, c.source_len, c.target_len), (2, 3, 3));
        assert_eq!(c.input_ids,         vec![4, 5, 1, 9, 1, 0]);
        assert_eq!(c.attention_mask,    vec![1, 1, 1, 1, 1, 0]);
        assert_eq!(c.labels,            vec![5, 6, 1, 7, 1, 0]);
        assert_eq!(c.decoder_input_ids, vec![0, 5, 6, 0, 7, 1]);
    }

    #[test]
    fn test_decoder_start_differs_from_pad() {
        let batcher = Seq2SeqBatcher::new(1, 2);
        let c = batcher.collate(&[sample(&[4], &[5, 2]), sample(&[4], &[2])]);
        assert_eq!(c.decoder_input_ids, vec![2, 5, 2, 2]);
        assert_eq!(c.labels,            vec![5, 2, 2, 1]);
    }

    #[test]
    fn test_seq2seq_batch_shapes() {
        let device = Default::default();
        let batch: Seq2SeqBatch<NdArray> = Seq2SeqBatcher::new(0, 0).batch(
            vec![sample(&[4, 5, 6, 1], &[5, 1]), sample(&[9, 1], &[7, 8, 1])],
            &device,
        );
        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(batch.attention_mask.dims(), [2, 4]);
        assert_eq!(batch.labels.dims(), [2, 3]);
        assert_eq!(batch.decoder_input_ids.dims(), [2, 3]);
    }

    #[test]
    fn test_classifier_batch_shapes() {
        let device = Default::default();
        let items = vec![
            ClassifierSample { input_ids: vec![3, 4, 0], attention_mask: vec![1, 1, 0], label: 2 },
            ClassifierSample { input_ids: vec![5, 6, 7], attention_mask: vec![1, 1, 1], label: 0 },
        ];
        let batch: ClassifierBatch<NdArray> = ClassifierBatcher.batch(items, &device);
        assert_eq!(batch.input_ids.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(), [2]);
    }
}
