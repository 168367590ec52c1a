use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised seq2seq example. Exactly the three columns the
/// trainer consumes; padding happens later, per batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seq2SeqSample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels:         Vec<u32>,
}

/// One tokenised classification example, already padded to the
/// tokenizer's fixed length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierSample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub label:          usize,
}

pub struct SampleDataset<T> {
    samples: Vec<T>,
}

impl<T> SampleDataset<T> {
    pub fn new(samples: Vec<T>) -> Self { Self { samples } }
}

impl<T: Clone + Send + Sync> Dataset<T> for SampleDataset<T> {
    fn get(&self, index: usize) -> Option<T> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
